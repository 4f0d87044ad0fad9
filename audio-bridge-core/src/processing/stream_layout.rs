use std::time::Duration;

use crate::models::audio_models::AudioFormatDescriptor;
use crate::models::config::CaptureSettings;
use crate::models::error::CaptureError;

/// Rates closer than this are treated as equal and never resampled.
pub const SAME_RATE_TOLERANCE: f64 = 0.01;

/// Upper bound on interleaved samples per chunk (64 MiB of f32).
pub const MAX_CHUNK_SAMPLES: usize = 1 << 24;

/// Output geometry of a capture run, fixed once the native format is known.
///
/// `samples_per_chunk = round(chunk_ms / 1000 * output_rate)` frames; a chunk
/// carries `samples_per_chunk * output_channels` interleaved samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamLayout {
    pub native: AudioFormatDescriptor,
    pub output: AudioFormatDescriptor,
    pub samples_per_chunk: usize,
    pub chunk_interval: Duration,
}

impl StreamLayout {
    /// Compute the output format and chunk sizing for a negotiated source.
    pub fn finalize(native: &AudioFormatDescriptor, settings: &CaptureSettings) -> Result<Self, CaptureError> {
        if !native.sample_rate.is_finite() || native.sample_rate <= 0.0 {
            return Err(CaptureError::FinalizeFailure(format!(
                "native sample rate {} is not usable",
                native.sample_rate
            )));
        }
        if native.channel_count == 0 {
            return Err(CaptureError::FinalizeFailure("native format has no channels".into()));
        }

        let output_rate = settings.target_sample_rate.unwrap_or(native.sample_rate);
        let output_channels = if settings.mono { 1 } else { native.channel_count };

        let chunk_interval = Duration::try_from_secs_f64(settings.chunk_duration_ms / 1000.0).map_err(|_| {
            CaptureError::FinalizeFailure(format!("chunk duration {} ms is out of range", settings.chunk_duration_ms))
        })?;

        let frames = ((settings.chunk_duration_ms / 1000.0) * output_rate).round();
        if frames < 1.0 {
            return Err(CaptureError::FinalizeFailure(format!(
                "{} ms at {} Hz is shorter than one sample",
                settings.chunk_duration_ms, output_rate
            )));
        }
        if !frames.is_finite() || frames * f64::from(output_channels) > MAX_CHUNK_SAMPLES as f64 {
            return Err(CaptureError::FinalizeFailure(format!(
                "{} ms at {} Hz x{} exceeds {} samples per chunk",
                settings.chunk_duration_ms, output_rate, output_channels, MAX_CHUNK_SAMPLES
            )));
        }

        Ok(Self {
            native: *native,
            output: AudioFormatDescriptor::output(output_rate, output_channels),
            samples_per_chunk: frames as usize,
            chunk_interval,
        })
    }

    /// Interleaved samples in one emitted chunk.
    pub fn samples_needed(&self) -> usize {
        self.samples_per_chunk * self.output.channel_count as usize
    }

    pub fn needs_downmix(&self) -> bool {
        self.output.channel_count == 1 && self.native.channel_count > 1
    }

    pub fn needs_resample(&self) -> bool {
        (self.output.sample_rate - self.native.sample_rate).abs() >= SAME_RATE_TOLERANCE
    }
}
