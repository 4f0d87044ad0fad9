//! # audio-bridge-windows
//!
//! Windows WASAPI backend and C ABI for audio-bridge.
//!
//! Provides:
//! - `WasapiNegotiator`: default render loopback, process loopback and
//!   microphone endpoints in shared mode
//! - `WasapiEndpoint`: packet draining with conversion to f32, MMCSS
//!   registration on the capture thread
//! - `DeviceEnumerator`: audio device enumeration via the MMDevice API
//! - `WindowsPermissions`: system audio and microphone permission status
//! - `bridge`: the exported `audio_*` C functions
//!
//! ## Platform Requirements
//! - Windows 8+ for `CoIncrementMTAUsage`
//! - Windows 10 2004 (build 19041) for process loopback
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use audio_bridge_core::{CaptureSession, SystemAudioParams};
//! use audio_bridge_windows::WasapiNegotiator;
//!
//! let session = CaptureSession::new(WasapiNegotiator::new(), host);
//! session.start_system_audio(&SystemAudioParams::default())?;
//! ```

pub mod pcm;

#[cfg(target_os = "windows")]
pub mod activation;
#[cfg(target_os = "windows")]
pub mod apartment;
#[cfg(target_os = "windows")]
pub mod bridge;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod endpoint;
#[cfg(target_os = "windows")]
pub mod negotiator;
#[cfg(target_os = "windows")]
pub mod permissions;

#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use endpoint::WasapiEndpoint;
#[cfg(target_os = "windows")]
pub use negotiator::WasapiNegotiator;
#[cfg(target_os = "windows")]
pub use permissions::WindowsPermissions;
