//! Initialized WASAPI capture stream.

use std::ffi::c_void;
use std::ptr;

use windows::core::w;
use windows::Win32::Foundation::HANDLE;
use windows::Win32::Media::Audio::{
    IAudioCaptureClient, IAudioClient, AUDCLNT_BUFFERFLAGS_SILENT, AUDCLNT_SHAREMODE_SHARED, WAVEFORMATEX,
    WAVEFORMATEXTENSIBLE,
};
use windows::Win32::Media::KernelStreaming::WAVE_FORMAT_EXTENSIBLE;
use windows::Win32::Media::Multimedia::{KSDATAFORMAT_SUBTYPE_IEEE_FLOAT, WAVE_FORMAT_IEEE_FLOAT};
use windows::Win32::System::Com::CoTaskMemFree;
use windows::Win32::System::Threading::{AvRevertMmThreadCharacteristics, AvSetMmThreadCharacteristicsW};

use audio_bridge_core::models::audio_models::{AudioFormatDescriptor, SampleEncoding};
use audio_bridge_core::models::error::CaptureError;
use audio_bridge_core::traits::capture_provider::{CaptureEndpoint, RawBatch, WorkerScope};

use crate::apartment::ComGuard;
use crate::pcm;

/// Shared-mode buffer duration, 1 s in 100 ns units.
const BUFFER_DURATION: i64 = 10_000_000;

/// Format used when the client cannot report a mix format (process
/// loopback clients do not implement `GetMixFormat`).
const FALLBACK_RATE: u32 = 48_000;
const FALLBACK_CHANNELS: u16 = 2;

/// The format passed to `IAudioClient::Initialize`.
enum MixFormat {
    /// Allocated by `GetMixFormat`; freed with `CoTaskMemFree`.
    Device(*mut WAVEFORMATEX),
    Fixed(WAVEFORMATEX),
}

impl MixFormat {
    fn query(client: &IAudioClient) -> Option<Self> {
        // SAFETY: the returned pointer is owned by us until CoTaskMemFree.
        match unsafe { client.GetMixFormat() } {
            Ok(format) if !format.is_null() => Some(Self::Device(format)),
            Ok(_) => None,
            Err(e) => {
                log::debug!("GetMixFormat failed: {}", e);
                None
            }
        }
    }

    fn fallback() -> Self {
        let block_align = FALLBACK_CHANNELS * 4;
        Self::Fixed(WAVEFORMATEX {
            wFormatTag: WAVE_FORMAT_IEEE_FLOAT as u16,
            nChannels: FALLBACK_CHANNELS,
            nSamplesPerSec: FALLBACK_RATE,
            nAvgBytesPerSec: FALLBACK_RATE * block_align as u32,
            nBlockAlign: block_align,
            wBitsPerSample: 32,
            cbSize: 0,
        })
    }

    fn as_ptr(&self) -> *const WAVEFORMATEX {
        match self {
            Self::Device(format) => *format as *const WAVEFORMATEX,
            Self::Fixed(format) => format as *const WAVEFORMATEX,
        }
    }

    /// Describe the native layout, or fail for encodings we cannot convert.
    fn describe(&self) -> Result<(AudioFormatDescriptor, usize), CaptureError> {
        // SAFETY: `as_ptr` is valid for the lifetime of `self`. WAVEFORMATEX is
        // packed, so every field is read by value.
        let (tag, channels, rate, bits, block_align, is_float) = unsafe {
            let format = self.as_ptr();
            let tag = (*format).wFormatTag;
            let is_float = if u32::from(tag) == WAVE_FORMAT_EXTENSIBLE {
                let extensible = format as *const WAVEFORMATEXTENSIBLE;
                let sub_format = ptr::read_unaligned(ptr::addr_of!((*extensible).SubFormat));
                sub_format == KSDATAFORMAT_SUBTYPE_IEEE_FLOAT
            } else {
                u32::from(tag) == WAVE_FORMAT_IEEE_FLOAT
            };
            (
                tag,
                (*format).nChannels,
                (*format).nSamplesPerSec,
                (*format).wBitsPerSample,
                (*format).nBlockAlign,
                is_float,
            )
        };

        let encoding = SampleEncoding::from_layout(bits, is_float).ok_or_else(|| {
            CaptureError::FormatNegotiationFailure(format!(
                "unsupported mix format: tag {:#x}, {} bits, float={}",
                tag, bits, is_float
            ))
        })?;
        let descriptor = AudioFormatDescriptor {
            sample_rate: f64::from(rate),
            channel_count: channels,
            bits_per_channel: bits,
            is_float,
            encoding,
        };
        Ok((descriptor, usize::from(block_align)))
    }
}

impl Drop for MixFormat {
    fn drop(&mut self) {
        if let Self::Device(format) = *self {
            unsafe { CoTaskMemFree(Some(format as *const c_void)) };
        }
    }
}

/// A shared-mode capture stream on an activated `IAudioClient`.
///
/// Dropping the endpoint stops the stream and releases the COM objects.
pub struct WasapiEndpoint {
    client: IAudioClient,
    capture: IAudioCaptureClient,
    _mix_format: MixFormat,
    format: AudioFormatDescriptor,
    block_align: usize,
    samples: Vec<f32>,
    started: bool,
}

// SAFETY: the COM objects live in the process MTA (kept alive by
// `apartment::ensure_mta`) and are used by one thread at a time: the control
// thread until start, then the capture worker.
unsafe impl Send for WasapiEndpoint {}

impl WasapiEndpoint {
    /// Initialize `client` in shared mode with `stream_flags` and fetch its
    /// capture service. With `allow_fallback`, a client without a mix format
    /// is initialized with 48 kHz stereo float.
    pub fn open(client: IAudioClient, stream_flags: u32, allow_fallback: bool) -> Result<Self, CaptureError> {
        let mix_format = match MixFormat::query(&client) {
            Some(format) => format,
            None if allow_fallback => MixFormat::fallback(),
            None => {
                return Err(CaptureError::FormatNegotiationFailure(
                    "device did not report a mix format".into(),
                ))
            }
        };
        let (format, block_align) = mix_format.describe()?;

        unsafe {
            client
                .Initialize(
                    AUDCLNT_SHAREMODE_SHARED,
                    stream_flags,
                    BUFFER_DURATION,
                    0,
                    mix_format.as_ptr(),
                    None,
                )
                .map_err(|e| {
                    CaptureError::FormatNegotiationFailure(format!("IAudioClient::Initialize failed: {}", e))
                })?;
        }

        let capture: IAudioCaptureClient = unsafe { client.GetService() }
            .map_err(|e| CaptureError::FormatNegotiationFailure(format!("GetService failed: {}", e)))?;

        log::debug!(
            "Mix format {} Hz x{}, {} bits, {}",
            format.sample_rate,
            format.channel_count,
            format.bits_per_channel,
            format.encoding.as_str()
        );

        Ok(Self {
            client,
            capture,
            _mix_format: mix_format,
            format,
            block_align,
            samples: Vec::new(),
            started: false,
        })
    }
}

impl CaptureEndpoint for WasapiEndpoint {
    fn format(&self) -> &AudioFormatDescriptor {
        &self.format
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        unsafe { self.client.Start() }
            .map_err(|e| CaptureError::StartFailure(format!("IAudioClient::Start failed: {}", e)))?;
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {
        if !self.started {
            return;
        }
        if let Err(e) = unsafe { self.client.Stop() } {
            log::warn!("IAudioClient::Stop failed: {}", e);
        }
        self.started = false;
    }

    fn drain(&mut self, on_batch: &mut dyn FnMut(RawBatch<'_>)) -> Result<(), CaptureError> {
        loop {
            let pending = unsafe { self.capture.GetNextPacketSize() }
                .map_err(|e| CaptureError::CaptureFailed(format!("GetNextPacketSize failed: {}", e)))?;
            if pending == 0 {
                return Ok(());
            }

            let mut data: *mut u8 = ptr::null_mut();
            let mut frames: u32 = 0;
            let mut flags: u32 = 0;
            unsafe {
                self.capture
                    .GetBuffer(&mut data, &mut frames, &mut flags, None, None)
                    .map_err(|e| CaptureError::CaptureFailed(format!("GetBuffer failed: {}", e)))?;
            }

            let silent = flags & AUDCLNT_BUFFERFLAGS_SILENT.0 as u32 != 0;
            if frames > 0 && !data.is_null() {
                if silent {
                    self.samples.clear();
                } else {
                    // SAFETY: GetBuffer returned `frames` frames of `block_align`
                    // bytes, valid until ReleaseBuffer.
                    let bytes = unsafe { std::slice::from_raw_parts(data, frames as usize * self.block_align) };
                    pcm::decode_into(bytes, self.format.encoding, &mut self.samples);
                }
                on_batch(RawBatch {
                    samples: &self.samples,
                    frames: frames as usize,
                    silent,
                });
            }

            unsafe { self.capture.ReleaseBuffer(frames) }
                .map_err(|e| CaptureError::CaptureFailed(format!("ReleaseBuffer failed: {}", e)))?;
        }
    }

    fn worker_scope(&self) -> WorkerScope {
        let com = ComGuard::enter();
        let mut task_index = 0u32;
        let mmcss = match unsafe { AvSetMmThreadCharacteristicsW(w!("Pro Audio"), &mut task_index) } {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("MMCSS registration failed: {}", e);
                None
            }
        };
        WorkerScope::new(move || {
            if let Some(handle) = mmcss {
                revert_mmcss(handle);
            }
            drop(com);
        })
    }
}

fn revert_mmcss(handle: HANDLE) {
    if let Err(e) = unsafe { AvRevertMmThreadCharacteristics(handle) } {
        log::warn!("AvRevertMmThreadCharacteristics failed: {}", e);
    }
}

impl Drop for WasapiEndpoint {
    fn drop(&mut self) {
        self.stop();
    }
}
