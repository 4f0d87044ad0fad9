//! Per-batch signal path: gain → downmix → resample.
//!
//! All operations work on interleaved `&[f32]` buffers with no platform
//! dependencies. Sample arithmetic is single precision; only resampler
//! positions are tracked in `f64`.

use std::borrow::Cow;

use super::stream_layout::StreamLayout;

/// Transforms native frame batches into output-format samples.
///
/// Stateless between batches: every batch is resampled on its own, so a
/// batch boundary is never interpolated across.
#[derive(Debug, Clone)]
pub struct StreamProcessor {
    gain: Option<f32>,
    native_channels: usize,
    downmix: bool,
    resample: bool,
    native_sample_rate: f64,
    output_sample_rate: f64,
}

impl StreamProcessor {
    /// `gain` is only ever set for microphone captures; unity gain is skipped.
    pub fn new(layout: &StreamLayout, gain: Option<f32>) -> Self {
        Self {
            gain: gain.filter(|g| *g != 1.0),
            native_channels: layout.native.channel_count as usize,
            downmix: layout.needs_downmix(),
            resample: layout.needs_resample(),
            native_sample_rate: layout.native.sample_rate,
            output_sample_rate: layout.output.sample_rate,
        }
    }

    /// Run one batch of interleaved native samples through the pipeline.
    ///
    /// Trailing samples that do not form a whole frame are dropped.
    pub fn process<'a>(&self, input: &'a [f32]) -> Cow<'a, [f32]> {
        let whole = input.len() - input.len() % self.native_channels;
        let mut samples = Cow::Borrowed(&input[..whole]);
        let mut channels = self.native_channels;

        if let Some(gain) = self.gain {
            samples = Cow::Owned(apply_gain(&samples, gain));
        }

        if self.downmix {
            samples = Cow::Owned(downmix_to_mono(&samples, channels));
            channels = 1;
        }

        if self.resample {
            samples = Cow::Owned(resample_linear(
                &samples,
                channels,
                self.native_sample_rate,
                self.output_sample_rate,
            ));
        }

        samples
    }
}

/// Multiply every sample by `gain`. No clipping.
pub fn apply_gain(samples: &[f32], gain: f32) -> Vec<f32> {
    samples.iter().map(|s| s * gain).collect()
}

/// Downmix interleaved multi-channel audio to mono by averaging channels per frame.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let scale = 1.0 / channels as f32;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

/// Linear interpolation resampling for interleaved audio.
///
/// Callers decide whether the rates differ (`StreamLayout::needs_resample`).
/// For output frame `i`, the source position is `i / ratio` with
/// `ratio = target / source`. Past the last input frame the final frame is
/// held; positions beyond the input entirely produce silence. No
/// anti-aliasing filter is applied.
pub fn resample_linear(samples: &[f32], channels: usize, source_sample_rate: f64, target_sample_rate: f64) -> Vec<f32> {
    if channels == 0 || samples.is_empty() {
        return samples.to_vec();
    }

    let frame_count = samples.len() / channels;
    let ratio = target_sample_rate / source_sample_rate;
    let output_frames = (frame_count as f64 * ratio) as usize;
    if output_frames == 0 {
        return Vec::new();
    }

    let mut output = vec![0.0f32; output_frames * channels];
    for (i, frame) in output.chunks_exact_mut(channels).enumerate() {
        let source_index = i as f64 / ratio;
        let index = source_index as usize;
        let fraction = (source_index - index as f64) as f32;

        for (ch, sample) in frame.iter_mut().enumerate() {
            if index + 1 < frame_count {
                let current = samples[index * channels + ch];
                let next = samples[(index + 1) * channels + ch];
                *sample = current * (1.0 - fraction) + next * fraction;
            } else if index < frame_count {
                *sample = samples[index * channels + ch];
            }
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::models::audio_models::AudioFormatDescriptor;
    use crate::models::config::CaptureSettings;

    fn layout(native_rate: f64, native_channels: u16, target_rate: f64, mono: bool) -> StreamLayout {
        let settings = CaptureSettings::new(target_rate, 200.0, mono, false, None);
        StreamLayout::finalize(&AudioFormatDescriptor::output(native_rate, native_channels), &settings).unwrap()
    }

    #[test]
    fn downmix_averages_channels() {
        assert_eq!(downmix_to_mono(&[1.0, 1.0], 2), vec![1.0]);
        assert_eq!(downmix_to_mono(&[1.0, -1.0], 2), vec![0.0]);
        assert_eq!(downmix_to_mono(&[0.3, 0.6, 0.9, 0.0, 0.0, 0.3], 3).len(), 2);
    }

    #[test]
    fn downmix_mono_is_passthrough() {
        assert_eq!(downmix_to_mono(&[0.1, 0.2, 0.3], 1), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn gain_does_not_clip() {
        assert_eq!(apply_gain(&[0.75, -0.75], 2.0), vec![1.5, -1.5]);
    }

    #[test]
    fn resample_unit_ratio_is_identity() {
        let samples = vec![1.0, 2.0, 3.0];
        assert_eq!(resample_linear(&samples, 1, 48000.0, 48000.0), samples);
    }

    #[test]
    fn resample_upsample_2x() {
        let result = resample_linear(&[0.0, 1.0], 1, 24000.0, 48000.0);

        // 2 samples at 24kHz → 4 samples at 48kHz
        assert_eq!(result.len(), 4);
        assert_relative_eq!(result[0], 0.0);
        assert_relative_eq!(result[1], 0.5);
        assert_relative_eq!(result[2], 1.0);
        // past the last input frame the final sample is held
        assert_relative_eq!(result[3], 1.0);
    }

    #[test]
    fn resample_downsample() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let result = resample_linear(&samples, 1, 48000.0, 24000.0);
        assert_eq!(result.len(), 50);
        assert_relative_eq!(result[10], samples[20]);
    }

    #[test]
    fn resample_44100_to_48000_length_and_bounds() {
        let samples: Vec<f32> = (0..4410).map(|i| ((i as f32) * 0.01).sin()).collect();
        let result = resample_linear(&samples, 1, 44100.0, 48000.0);

        let expected = samples.len() as f64 * 48000.0 / 44100.0;
        assert!((result.len() as f64 - expected).abs() <= 1.0);

        let ratio = 48000.0 / 44100.0;
        for (i, value) in result.iter().enumerate() {
            let index = (i as f64 / ratio) as usize;
            let next = (index + 1).min(samples.len() - 1);
            let lo = samples[index].min(samples[next]);
            let hi = samples[index].max(samples[next]);
            assert!(*value >= lo - 1e-6 && *value <= hi + 1e-6, "sample {} out of bounds", i);
        }
    }

    #[test]
    fn resample_stereo_keeps_channels_apart() {
        // left ramps up, right is constant
        let samples = vec![0.0, 0.5, 1.0, 0.5];
        let result = resample_linear(&samples, 2, 24000.0, 48000.0);

        assert_eq!(result.len(), 8);
        assert_relative_eq!(result[2], 0.5); // L at frame 0.5
        assert_relative_eq!(result[3], 0.5); // R stays constant
        assert_relative_eq!(result[5], 0.5);
    }

    #[test]
    fn processor_downmixes_and_resamples() {
        let processor = StreamProcessor::new(&layout(24000.0, 2, 48000.0, true), None);
        let out = processor.process(&[1.0, 1.0, 1.0, -1.0]);
        // mono [1.0, 0.0] upsampled 2x
        assert_eq!(out.len(), 4);
        assert_relative_eq!(out[0], 1.0);
        assert_relative_eq!(out[1], 0.5);
        assert_relative_eq!(out[2], 0.0);
    }

    #[test]
    fn processor_applies_gain_without_resampling() {
        let processor = StreamProcessor::new(&layout(48000.0, 2, 48000.0, false), Some(2.0));
        let input = [0.1, -0.2, 0.3, 0.4];
        let out = processor.process(&input);

        assert_eq!(out.len(), input.len());
        for (o, i) in out.iter().zip(input.iter()) {
            assert_relative_eq!(*o, i * 2.0);
        }
    }

    #[test]
    fn unity_path_borrows_input() {
        let processor = StreamProcessor::new(&layout(48000.0, 1, 48000.0, true), Some(1.0));
        let input = [0.1, 0.2];
        assert!(matches!(processor.process(&input), Cow::Borrowed(_)));
    }

    #[test]
    fn partial_frames_are_dropped() {
        let processor = StreamProcessor::new(&layout(48000.0, 2, 48000.0, false), None);
        assert_eq!(processor.process(&[0.1, 0.2, 0.3]).len(), 2);
    }
}
