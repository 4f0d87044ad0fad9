//! Conversion of native packet bytes to interleaved f32.
//!
//! Shared-mode mix formats are almost always 32-bit float, but some drivers
//! expose integer PCM. 24-bit samples in a 32-bit container are left-justified
//! and decode correctly as `PcmS32Le`.

use audio_bridge_core::models::audio_models::SampleEncoding;

/// Decode `bytes` into `out`, replacing its contents. A trailing partial
/// sample is ignored.
pub fn decode_into(bytes: &[u8], encoding: SampleEncoding, out: &mut Vec<f32>) {
    out.clear();
    match encoding {
        SampleEncoding::PcmF32Le => {
            out.extend(bytes.chunks_exact(4).map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])));
        }
        SampleEncoding::PcmS16Le => {
            out.extend(
                bytes
                    .chunks_exact(2)
                    .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32_768.0),
            );
        }
        SampleEncoding::PcmS24Le => {
            // Shift into the top of an i32, then back down to sign-extend.
            out.extend(
                bytes
                    .chunks_exact(3)
                    .map(|b| (i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8) as f32 / 8_388_608.0),
            );
        }
        SampleEncoding::PcmS32Le => {
            out.extend(
                bytes
                    .chunks_exact(4)
                    .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2_147_483_648.0),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn float_passes_through() {
        let bytes: Vec<u8> = [0.5f32, -0.25].iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut out = Vec::new();
        decode_into(&bytes, SampleEncoding::PcmF32Le, &mut out);
        assert_eq!(out, vec![0.5, -0.25]);
    }

    #[test]
    fn int16_scales_to_unit_range() {
        let bytes: Vec<u8> = [i16::MIN, 0, 16_384].iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut out = Vec::new();
        decode_into(&bytes, SampleEncoding::PcmS16Le, &mut out);
        assert_relative_eq!(out[0], -1.0);
        assert_relative_eq!(out[1], 0.0);
        assert_relative_eq!(out[2], 0.5);
    }

    #[test]
    fn int24_sign_extends() {
        // -4_194_304 (0xC00000) and +4_194_304 (0x400000)
        let bytes = [0x00, 0x00, 0xC0, 0x00, 0x00, 0x40];
        let mut out = Vec::new();
        decode_into(&bytes, SampleEncoding::PcmS24Le, &mut out);
        assert_relative_eq!(out[0], -0.5);
        assert_relative_eq!(out[1], 0.5);
    }

    #[test]
    fn int32_scales_to_unit_range() {
        let bytes: Vec<u8> = [i32::MIN, i32::MAX / 2].iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut out = Vec::new();
        decode_into(&bytes, SampleEncoding::PcmS32Le, &mut out);
        assert_relative_eq!(out[0], -1.0);
        assert_relative_eq!(out[1], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn partial_trailing_sample_is_dropped_and_buffer_reused() {
        let mut out = vec![9.0; 8];
        decode_into(&[0, 0, 0x80, 0x3F, 0xAA], SampleEncoding::PcmF32Le, &mut out);
        assert_eq!(out, vec![1.0]);
    }
}
