//! Resolves a `SourceSelector` to an initialized WASAPI endpoint.

use std::time::Duration;

use windows::Win32::Media::Audio::{
    eCapture, eRender, IAudioClient, IMMDevice, AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM, AUDCLNT_STREAMFLAGS_LOOPBACK,
};
use windows::Win32::System::Com::CLSCTX_ALL;

use audio_bridge_core::models::error::CaptureError;
use audio_bridge_core::models::source::SourceSelector;
use audio_bridge_core::traits::capture_provider::{CaptureEndpoint, SourceNegotiator};

use crate::activation::{activate_process_loopback, ProcessScope};
use crate::apartment;
use crate::device_enumerator::DeviceEnumerator;
use crate::endpoint::WasapiEndpoint;

/// WASAPI shared-mode negotiator.
///
/// - `SystemLoopback`: default render endpoint with `AUDCLNT_STREAMFLAGS_LOOPBACK`.
/// - `ProcessInclude/ExcludeLoopback`: the process loopback virtual device,
///   activated asynchronously (Windows 10 2004+).
/// - `Microphone`: the given capture endpoint, or the default one.
#[derive(Debug, Default, Clone, Copy)]
pub struct WasapiNegotiator;

impl WasapiNegotiator {
    pub fn new() -> Self {
        Self
    }
}

impl SourceNegotiator for WasapiNegotiator {
    fn negotiate(
        &self,
        selector: &SourceSelector,
        activation_timeout: Duration,
    ) -> Result<Box<dyn CaptureEndpoint>, CaptureError> {
        apartment::ensure_mta()?;

        let endpoint = match selector {
            SourceSelector::SystemLoopback => {
                let device = DeviceEnumerator::new()?.endpoint(eRender, None)?;
                WasapiEndpoint::open(activate(&device)?, AUDCLNT_STREAMFLAGS_LOOPBACK, false)?
            }
            SourceSelector::ProcessIncludeLoopback(pid) => process_loopback(*pid, ProcessScope::Include, activation_timeout)?,
            SourceSelector::ProcessExcludeLoopback(pid) => process_loopback(*pid, ProcessScope::Exclude, activation_timeout)?,
            SourceSelector::Microphone(device_id) => {
                let device = DeviceEnumerator::new()?.endpoint(eCapture, device_id.as_deref())?;
                WasapiEndpoint::open(activate(&device)?, 0, false)?
            }
        };
        Ok(Box::new(endpoint))
    }
}

fn activate(device: &IMMDevice) -> Result<IAudioClient, CaptureError> {
    unsafe { device.Activate(CLSCTX_ALL, None) }
        .map_err(|e| CaptureError::FormatNegotiationFailure(format!("IMMDevice::Activate failed: {}", e)))
}

fn process_loopback(pid: u32, scope: ProcessScope, timeout: Duration) -> Result<WasapiEndpoint, CaptureError> {
    let client = activate_process_loopback(pid, scope, timeout)?;
    WasapiEndpoint::open(
        client,
        AUDCLNT_STREAMFLAGS_LOOPBACK | AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM,
        true,
    )
}
