use serde::{Deserialize, Serialize};

use super::error::CaptureError;
use super::source::SourceSelector;

/// Chunk duration used when the caller passes zero, a negative, or a non-finite value.
pub const DEFAULT_CHUNK_DURATION_MS: f64 = 200.0;

/// Parameters for system audio (loopback) capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemAudioParams {
    /// Output sample rate in Hz. Zero or negative keeps the native rate.
    pub sample_rate: f64,

    /// Duration of each emitted chunk in milliseconds.
    pub chunk_duration_ms: f64,

    /// Mute the captured output. Not supported by WASAPI loopback; ignored.
    pub mute: bool,

    /// Downmix to a single channel.
    pub mono: bool,

    /// Emit silent chunks when nothing is playing.
    pub emit_silence: bool,

    /// Capture only these processes (first id is honored).
    pub include_processes: Vec<u32>,

    /// Capture everything except these processes (first id is honored).
    pub exclude_processes: Vec<u32>,
}

impl Default for SystemAudioParams {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            chunk_duration_ms: DEFAULT_CHUNK_DURATION_MS,
            mute: false,
            mono: true,
            emit_silence: true,
            include_processes: Vec::new(),
            exclude_processes: Vec::new(),
        }
    }
}

impl SystemAudioParams {
    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        serde_json::from_str(json)
            .map_err(|e| CaptureError::InvalidConfiguration(format!("failed to parse system audio params: {}", e)))
    }

    pub fn selector(&self) -> SourceSelector {
        SourceSelector::from_process_lists(&self.include_processes, &self.exclude_processes)
    }

    pub fn settings(&self) -> CaptureSettings {
        CaptureSettings::new(self.sample_rate, self.chunk_duration_ms, self.mono, self.emit_silence, None)
    }
}

/// Parameters for microphone capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MicrophoneParams {
    /// Output sample rate in Hz. Zero or negative keeps the native rate.
    pub sample_rate: f64,

    /// Duration of each emitted chunk in milliseconds.
    pub chunk_duration_ms: f64,

    /// Downmix to a single channel.
    pub mono: bool,

    /// Emit silent chunks when the device delivers nothing.
    pub emit_silence: bool,

    /// Capture endpoint id, or `None` for the default input.
    pub device_id: Option<String>,

    /// Linear gain, 1.0 = unity. No clipping is applied.
    pub gain: f64,
}

impl Default for MicrophoneParams {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            chunk_duration_ms: DEFAULT_CHUNK_DURATION_MS,
            mono: true,
            emit_silence: true,
            device_id: None,
            gain: 1.0,
        }
    }
}

impl MicrophoneParams {
    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        serde_json::from_str(json)
            .map_err(|e| CaptureError::InvalidConfiguration(format!("failed to parse microphone params: {}", e)))
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if !self.gain.is_finite() || self.gain < 0.0 {
            return Err(CaptureError::InvalidConfiguration(format!("gain must be finite and >= 0, got {}", self.gain)));
        }
        Ok(())
    }

    pub fn selector(&self) -> SourceSelector {
        SourceSelector::microphone(self.device_id.as_deref())
    }

    pub fn settings(&self) -> CaptureSettings {
        CaptureSettings::new(
            self.sample_rate,
            self.chunk_duration_ms,
            self.mono,
            self.emit_silence,
            Some(self.gain as f32),
        )
    }
}

/// Normalized processing settings shared by both capture kinds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSettings {
    /// `None` keeps the native sample rate.
    pub target_sample_rate: Option<f64>,
    pub chunk_duration_ms: f64,
    pub mono: bool,
    pub emit_silence: bool,
    /// Microphone gain; `None` on loopback paths.
    pub gain: Option<f32>,
}

impl CaptureSettings {
    pub fn new(sample_rate: f64, chunk_duration_ms: f64, mono: bool, emit_silence: bool, gain: Option<f32>) -> Self {
        let target_sample_rate = (sample_rate.is_finite() && sample_rate > 0.0).then_some(sample_rate);
        let chunk_duration_ms = if chunk_duration_ms.is_finite() && chunk_duration_ms > 0.0 {
            chunk_duration_ms
        } else {
            DEFAULT_CHUNK_DURATION_MS
        };
        Self {
            target_sample_rate,
            chunk_duration_ms,
            mono,
            emit_silence,
            gain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_chunk_duration_falls_back() {
        let settings = CaptureSettings::new(48000.0, 0.0, true, true, None);
        assert_eq!(settings.chunk_duration_ms, DEFAULT_CHUNK_DURATION_MS);

        let settings = CaptureSettings::new(48000.0, f64::NAN, true, true, None);
        assert_eq!(settings.chunk_duration_ms, DEFAULT_CHUNK_DURATION_MS);
    }

    #[test]
    fn non_positive_rate_keeps_native() {
        assert_eq!(CaptureSettings::new(0.0, 100.0, true, true, None).target_sample_rate, None);
        assert_eq!(CaptureSettings::new(-1.0, 100.0, true, true, None).target_sample_rate, None);
        assert_eq!(CaptureSettings::new(16000.0, 100.0, true, true, None).target_sample_rate, Some(16000.0));
    }

    #[test]
    fn negative_gain_is_rejected() {
        let params = MicrophoneParams { gain: -0.5, ..Default::default() };
        assert!(matches!(params.validate(), Err(CaptureError::InvalidConfiguration(_))));

        let params = MicrophoneParams { gain: f64::INFINITY, ..Default::default() };
        assert!(params.validate().is_err());

        assert!(MicrophoneParams { gain: 0.0, ..Default::default() }.validate().is_ok());
    }

    #[test]
    fn loopback_settings_carry_no_gain() {
        assert_eq!(SystemAudioParams::default().settings().gain, None);
        assert_eq!(MicrophoneParams::default().settings().gain, Some(1.0));
    }

    #[test]
    fn params_from_json_fill_defaults() {
        let params = MicrophoneParams::from_json(r#"{ "sample_rate": 16000, "gain": 2.0 }"#).unwrap();
        assert_eq!(params.sample_rate, 16000.0);
        assert_eq!(params.gain, 2.0);
        assert_eq!(params.chunk_duration_ms, DEFAULT_CHUNK_DURATION_MS);
        assert!(params.mono);

        let params = SystemAudioParams::from_json(r#"{ "include_processes": [1234], "mono": false }"#).unwrap();
        assert_eq!(params.include_processes, vec![1234]);
        assert!(!params.mono);
    }

    #[test]
    fn malformed_json_is_a_configuration_error() {
        let err = SystemAudioParams::from_json("{ not json").unwrap_err();
        assert!(matches!(err, CaptureError::InvalidConfiguration(_)));
    }
}
