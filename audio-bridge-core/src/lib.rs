//! # audio-bridge-core
//!
//! Platform-agnostic real-time audio capture engine.
//!
//! A `CaptureSession` captures from one source at a time (system loopback,
//! a single process tree, or a microphone) and hands fixed-duration chunks
//! of little-endian f32 PCM to a `CaptureHost`. Platform backends implement
//! `SourceNegotiator` and `CaptureEndpoint`; everything after the raw packet
//! (gain, downmix, resampling, chunking, silence fill) lives here.
//!
//! ## Architecture
//!
//! ```text
//! audio-bridge-core (this crate)
//! ├── traits/       ← SourceNegotiator, CaptureEndpoint, CaptureHost, DeviceCatalog, PermissionProvider
//! ├── models/       ← CaptureError, SessionState, CaptureEvent, SourceSelector, params, formats
//! ├── processing/   ← StreamLayout, StreamProcessor, ChunkAccumulator, SilenceWatchdog
//! ├── session/      ← CaptureSession (lifecycle) + capture worker thread
//! └── ffi           ← C callback host, handles, device list marshalling
//! ```

pub mod ffi;
pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

#[cfg(test)]
mod test_support;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{AudioDeviceInfo, AudioFormatDescriptor, PermissionStatus, SampleEncoding};
pub use models::config::{CaptureSettings, MicrophoneParams, SystemAudioParams};
pub use models::error::CaptureError;
pub use models::source::SourceSelector;
pub use models::state::{CaptureEvent, SessionState};
pub use processing::stream_layout::StreamLayout;
pub use session::capture_session::CaptureSession;
pub use traits::capture_delegate::CaptureHost;
pub use traits::capture_provider::{CaptureEndpoint, RawBatch, SourceNegotiator, WorkerScope, ACTIVATION_TIMEOUT};
pub use traits::device_catalog::{DeviceCatalog, PermissionProvider};
