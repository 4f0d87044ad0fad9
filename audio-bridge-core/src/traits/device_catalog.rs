use crate::models::audio_models::{AudioDeviceInfo, PermissionStatus};
use crate::models::error::CaptureError;

/// Device queries. Short synchronous calls on the caller's thread; not part
/// of any session's state.
pub trait DeviceCatalog {
    /// Active input and output endpoints.
    fn list_devices(&self) -> Result<Vec<AudioDeviceInfo>, CaptureError>;

    fn default_input_device_id(&self) -> Result<Option<String>, CaptureError>;

    fn default_output_device_id(&self) -> Result<Option<String>, CaptureError>;
}

/// Authorization queries for each capture kind.
pub trait PermissionProvider {
    fn system_audio_status(&self) -> PermissionStatus;

    fn microphone_status(&self) -> PermissionStatus;

    /// Whether the platform exposes a system audio permission at all.
    fn system_audio_available(&self) -> bool {
        true
    }

    /// Open the platform's audio privacy or sound settings. Returns `false`
    /// when the platform has no such page.
    fn open_system_settings(&self) -> bool {
        false
    }
}
