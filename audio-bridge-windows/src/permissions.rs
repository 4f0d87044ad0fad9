//! Windows audio permission status.
//!
//! WASAPI loopback is unrestricted: no entitlement or consent is needed for
//! system audio. Microphone access is governed by Settings > Privacy >
//! Microphone; unpackaged desktop apps get no consent prompt, so access is
//! inferred from whether any active capture endpoint is visible.

use windows::core::{w, PCWSTR};
use windows::Win32::UI::Shell::ShellExecuteW;
use windows::Win32::UI::WindowsAndMessaging::SW_SHOW;

use audio_bridge_core::models::audio_models::PermissionStatus;
use audio_bridge_core::traits::device_catalog::PermissionProvider;

use crate::device_enumerator::DeviceEnumerator;

#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsPermissions;

impl PermissionProvider for WindowsPermissions {
    fn system_audio_status(&self) -> PermissionStatus {
        PermissionStatus::Authorized
    }

    fn microphone_status(&self) -> PermissionStatus {
        match DeviceEnumerator::new().and_then(|e| e.capture_device_count()) {
            Ok(0) => PermissionStatus::Denied,
            Ok(_) => PermissionStatus::Authorized,
            Err(e) => {
                log::warn!("Microphone permission check failed: {}", e);
                PermissionStatus::Unknown
            }
        }
    }

    /// Opens the Sound page of the Settings app.
    fn open_system_settings(&self) -> bool {
        let instance =
            unsafe { ShellExecuteW(None, w!("open"), w!("ms-settings:sound"), PCWSTR::null(), PCWSTR::null(), SW_SHOW) };
        // Values above 32 indicate success.
        instance.0 as isize > 32
    }
}
