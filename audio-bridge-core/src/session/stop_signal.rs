use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// One-shot stop flag: raised by the control thread, polled by the worker.
#[derive(Debug, Default)]
pub struct StopSignal {
    raised: Mutex<bool>,
    cond: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        *self.raised.lock() = true;
        self.cond.notify_all();
    }

    pub fn is_raised(&self) -> bool {
        *self.raised.lock()
    }

    /// Block for at most `timeout`. Returns `true` once the signal is raised.
    pub fn wait(&self, timeout: Duration) -> bool {
        let mut raised = self.raised.lock();
        if !*raised {
            self.cond.wait_for(&mut raised, timeout);
        }
        *raised
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    use super::*;

    #[test]
    fn times_out_when_not_raised() {
        let signal = StopSignal::new();
        let start = Instant::now();
        assert!(!signal.wait(Duration::from_millis(10)));
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn raised_signal_returns_immediately() {
        let signal = StopSignal::new();
        signal.raise();
        assert!(signal.is_raised());
        assert!(signal.wait(Duration::from_secs(10)));
    }

    #[test]
    fn wakes_a_waiting_thread() {
        let signal = Arc::new(StopSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || {
                let start = Instant::now();
                while !signal.wait(Duration::from_millis(10)) {
                    assert!(start.elapsed() < Duration::from_secs(5));
                }
            })
        };
        signal.raise();
        waiter.join().unwrap();
    }
}
