//! Windows audio device enumeration via the MMDevice API.
//!
//! Wraps `IMMDeviceEnumerator` to list active capture (microphone) and render
//! (speaker/headphone) endpoints with friendly names, device descriptions and
//! the native mix format.

use windows::core::PCWSTR;
use windows::Win32::Devices::FunctionDiscovery::{PKEY_Device_DeviceDesc, PKEY_Device_FriendlyName};
use windows::Win32::Media::Audio::{
    eCapture, eConsole, eRender, EDataFlow, IAudioClient, IMMDevice, IMMDeviceEnumerator, MMDeviceEnumerator,
    DEVICE_STATE_ACTIVE,
};
use windows::Win32::System::Com::StructuredStorage::PropVariantClear;
use windows::Win32::System::Com::{CoCreateInstance, CoTaskMemFree, CLSCTX_ALL, STGM_READ};
use windows::Win32::System::Variant::VT_LPWSTR;
use windows::Win32::UI::Shell::PropertiesSystem::{IPropertyStore, PROPERTYKEY};

use audio_bridge_core::models::audio_models::AudioDeviceInfo;
use audio_bridge_core::models::error::CaptureError;
use audio_bridge_core::traits::device_catalog::DeviceCatalog;

use crate::apartment;

/// Audio device enumerator using the Windows MMDevice API.
pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceEnumerator {
    /// Create a new device enumerator, joining the process MTA if needed.
    pub fn new() -> Result<Self, CaptureError> {
        apartment::ensure_mta()?;
        unsafe {
            let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                .map_err(|e| CaptureError::SourceUnavailable(format!("failed to create enumerator: {}", e)))?;
            Ok(Self { enumerator })
        }
    }

    /// Resolve an endpoint by id, or the console default for `data_flow`.
    /// An empty id means the default.
    pub fn endpoint(&self, data_flow: EDataFlow, id: Option<&str>) -> Result<IMMDevice, CaptureError> {
        unsafe {
            match id.filter(|id| !id.is_empty()) {
                Some(id) => {
                    let wide: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
                    self.enumerator
                        .GetDevice(PCWSTR(wide.as_ptr()))
                        .map_err(|e| CaptureError::SourceUnavailable(format!("device {} not found: {}", id, e)))
                }
                None => self
                    .enumerator
                    .GetDefaultAudioEndpoint(data_flow, eConsole)
                    .map_err(|e| CaptureError::SourceUnavailable(format!("no default endpoint: {}", e))),
            }
        }
    }

    /// Number of active capture endpoints.
    pub fn capture_device_count(&self) -> Result<u32, CaptureError> {
        unsafe {
            self.enumerator
                .EnumAudioEndpoints(eCapture, DEVICE_STATE_ACTIVE)
                .and_then(|collection| collection.GetCount())
                .map_err(|e| CaptureError::SourceUnavailable(format!("EnumAudioEndpoints failed: {}", e)))
        }
    }

    fn default_device_id(&self, data_flow: EDataFlow) -> Option<String> {
        unsafe {
            self.enumerator
                .GetDefaultAudioEndpoint(data_flow, eConsole)
                .ok()
                .and_then(|device| device_id(&device))
        }
    }

    fn list_flow(&self, data_flow: EDataFlow) -> Result<Vec<AudioDeviceInfo>, CaptureError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(data_flow, DEVICE_STATE_ACTIVE)
                .map_err(|e| CaptureError::SourceUnavailable(format!("EnumAudioEndpoints failed: {}", e)))?;

            let count = collection
                .GetCount()
                .map_err(|e| CaptureError::SourceUnavailable(format!("GetCount failed: {}", e)))?;

            let default_id = self.default_device_id(data_flow);
            let is_input = data_flow == eCapture;
            let mut devices = Vec::new();

            for i in 0..count {
                let device = match collection.Item(i) {
                    Ok(d) => d,
                    Err(_) => continue,
                };
                let Some(id) = device_id(&device) else {
                    continue;
                };

                let store = device.OpenPropertyStore(STGM_READ).ok();
                let name = store
                    .as_ref()
                    .and_then(|s| string_property(s, &PKEY_Device_FriendlyName))
                    .unwrap_or_else(|| format!("Device {}", i));
                let manufacturer = store
                    .as_ref()
                    .and_then(|s| string_property(s, &PKEY_Device_DeviceDesc))
                    .filter(|m| !m.is_empty());
                let (sample_rate, channel_count) = mix_format_summary(&device).unwrap_or((0.0, 0));

                devices.push(AudioDeviceInfo {
                    is_default: default_id.as_deref() == Some(id.as_str()),
                    id,
                    name,
                    manufacturer,
                    is_input,
                    is_output: !is_input,
                    sample_rate,
                    channel_count,
                });
            }

            Ok(devices)
        }
    }
}

impl DeviceCatalog for DeviceEnumerator {
    /// Capture endpoints first, then render endpoints.
    fn list_devices(&self) -> Result<Vec<AudioDeviceInfo>, CaptureError> {
        let mut devices = self.list_flow(eCapture)?;
        devices.extend(self.list_flow(eRender)?);
        Ok(devices)
    }

    fn default_input_device_id(&self) -> Result<Option<String>, CaptureError> {
        Ok(self.default_device_id(eCapture))
    }

    fn default_output_device_id(&self) -> Result<Option<String>, CaptureError> {
        Ok(self.default_device_id(eRender))
    }
}

fn device_id(device: &IMMDevice) -> Option<String> {
    unsafe {
        let id = device.GetId().ok()?;
        let value = id.to_string().ok();
        CoTaskMemFree(Some(id.0 as *const _));
        value
    }
}

/// Native rate and channel count from the device's shared-mode mix format.
fn mix_format_summary(device: &IMMDevice) -> Option<(f64, u32)> {
    unsafe {
        let client: IAudioClient = device.Activate(CLSCTX_ALL, None).ok()?;
        let format = client.GetMixFormat().ok()?;
        if format.is_null() {
            return None;
        }
        let summary = (f64::from((*format).nSamplesPerSec), u32::from((*format).nChannels));
        CoTaskMemFree(Some(format as *const _));
        Some(summary)
    }
}

/// Read a `VT_LPWSTR` property.
fn string_property(store: &IPropertyStore, key: &PROPERTYKEY) -> Option<String> {
    unsafe {
        let mut value = store.GetValue(key).ok()?;
        let inner = &value.Anonymous.Anonymous;
        let text = if inner.vt == VT_LPWSTR && !inner.Anonymous.pwszVal.is_null() {
            inner.Anonymous.pwszVal.to_string().ok()
        } else {
            None
        };
        PropVariantClear(&mut value).ok();
        text
    }
}
