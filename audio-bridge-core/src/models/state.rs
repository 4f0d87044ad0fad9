/// Capture session lifecycle.
///
/// ```text
/// idle → initializing → running → stopping → idle
///             ↓
///            idle (on any start failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Initializing,
    Running,
    Stopping,
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Lifecycle notification delivered to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    Started,
    Stopped,
    Error(String),
}

impl CaptureEvent {
    /// Event type code reported across the C boundary.
    pub fn code(&self) -> i32 {
        match self {
            Self::Started => 0,
            Self::Stopped => 1,
            Self::Error(_) => 2,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_errors_carry_a_message() {
        assert_eq!(CaptureEvent::Started.message(), None);
        assert_eq!(CaptureEvent::Stopped.message(), None);
        assert_eq!(CaptureEvent::Error("boom".into()).message(), Some("boom"));
    }

    #[test]
    fn event_codes() {
        assert_eq!(CaptureEvent::Started.code(), 0);
        assert_eq!(CaptureEvent::Stopped.code(), 1);
        assert_eq!(CaptureEvent::Error(String::new()).code(), 2);
    }
}
