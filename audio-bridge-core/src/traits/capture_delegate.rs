use crate::models::audio_models::AudioFormatDescriptor;
use crate::models::state::CaptureEvent;

/// Receiver for everything a capture session produces.
///
/// `on_data` runs on the capture worker thread and inline with the capture
/// loop: a slow implementation stalls capture. `on_event` and `on_metadata`
/// run on whichever thread drives the lifecycle.
pub trait CaptureHost: Send + Sync {
    /// One complete chunk of output samples as little-endian f32 bytes.
    fn on_data(&self, chunk: &[u8]);

    /// Lifecycle notification.
    fn on_event(&self, event: &CaptureEvent);

    /// Output format, reported once per successful start before any data.
    fn on_metadata(&self, format: &AudioFormatDescriptor);
}
