use std::time::Duration;

use crate::models::audio_models::AudioFormatDescriptor;
use crate::models::error::CaptureError;
use crate::models::source::SourceSelector;

/// Upper bound on asynchronous, process-scoped source activation.
pub const ACTIVATION_TIMEOUT: Duration = Duration::from_secs(5);

/// One packet of native audio as pulled from an endpoint.
#[derive(Debug, Clone, Copy)]
pub struct RawBatch<'a> {
    /// Interleaved f32 samples, `frames * channel_count` long.
    pub samples: &'a [f32],
    pub frames: usize,
    /// The platform marked this packet as silence; it carries no real data.
    pub silent: bool,
}

/// Resolves a `SourceSelector` into a live platform endpoint.
///
/// Asynchronous platform activation is hidden behind this blocking call,
/// which must give up after `activation_timeout`.
pub trait SourceNegotiator: Send + Sync {
    fn negotiate(
        &self,
        selector: &SourceSelector,
        activation_timeout: Duration,
    ) -> Result<Box<dyn CaptureEndpoint>, CaptureError>;
}

/// A negotiated, initialized capture endpoint.
///
/// Owned by the session until the worker starts, then moved onto the worker
/// thread and handed back on exit. Dropping it releases the native resources.
pub trait CaptureEndpoint: Send {
    /// Native format of the samples handed to `drain`.
    fn format(&self) -> &AudioFormatDescriptor;

    /// Start the native stream.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Stop the native stream. Safe to call more than once.
    fn stop(&mut self);

    /// Deliver every packet currently available, oldest first.
    fn drain(&mut self, on_batch: &mut dyn FnMut(RawBatch<'_>)) -> Result<(), CaptureError>;

    /// Acquire the thread-scoped platform context for the calling worker.
    fn worker_scope(&self) -> WorkerScope {
        WorkerScope::none()
    }
}

/// Guard for thread-scoped platform state; releases on drop.
#[must_use]
pub struct WorkerScope {
    release: Option<Box<dyn FnOnce()>>,
}

impl WorkerScope {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn none() -> Self {
        Self { release: None }
    }
}

impl Drop for WorkerScope {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn worker_scope_releases_once_on_drop() {
        let released = Rc::new(Cell::new(0));
        {
            let counter = Rc::clone(&released);
            let _scope = WorkerScope::new(move || counter.set(counter.get() + 1));
            assert_eq!(released.get(), 0);
        }
        assert_eq!(released.get(), 1);
    }
}
