use std::ops::ControlFlow;

/// Rolling buffer that turns a stream of processed samples into
/// fixed-size chunks.
///
/// After every `push` the buffer holds fewer than `samples_needed`
/// samples: each complete chunk is emitted (oldest first) and drained
/// before `push` returns. Leftovers carry over to the next batch.
#[derive(Debug)]
pub struct ChunkAccumulator {
    buffer: Vec<f32>,
    samples_needed: usize,
    bytes: Vec<u8>,
}

impl ChunkAccumulator {
    pub fn new(samples_needed: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(samples_needed * 2),
            samples_needed,
            bytes: Vec::with_capacity(samples_needed * std::mem::size_of::<f32>()),
        }
    }

    /// Append `samples` and emit every complete chunk as little-endian f32 bytes.
    ///
    /// `emit` runs inline; returning `Break` refuses that chunk, which stays
    /// buffered along with everything after it. Returns the number of chunks emitted.
    pub fn push(&mut self, samples: &[f32], emit: &mut dyn FnMut(&[u8]) -> ControlFlow<()>) -> usize {
        if self.samples_needed == 0 {
            return 0;
        }
        self.buffer.extend_from_slice(samples);

        let mut consumed = 0;
        let mut emitted = 0;
        while self.buffer.len() - consumed >= self.samples_needed {
            let chunk = &self.buffer[consumed..consumed + self.samples_needed];
            encode_f32le(chunk, &mut self.bytes);
            if emit(&self.bytes).is_break() {
                break;
            }
            consumed += self.samples_needed;
            emitted += 1;
        }

        if consumed > 0 {
            self.buffer.drain(..consumed);
        }
        emitted
    }

    /// Samples not yet emitted.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Serialize f32 samples as `pcm_f32le` into `out`, replacing its contents.
pub fn encode_f32le(samples: &[f32], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(samples.len() * std::mem::size_of::<f32>());
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    fn collect(chunks: &mut Vec<Vec<f32>>, bytes: &[u8]) -> ControlFlow<()> {
        chunks.push(decode(bytes));
        ControlFlow::Continue(())
    }

    #[test]
    fn holds_until_a_chunk_is_complete() {
        let mut acc = ChunkAccumulator::new(4);
        let mut chunks = Vec::new();

        let emitted = acc.push(&[1.0, 2.0, 3.0], &mut |c| collect(&mut chunks, c));

        assert_eq!(emitted, 0);
        assert!(chunks.is_empty());
        assert_eq!(acc.pending(), 3);
    }

    #[test]
    fn leftovers_carry_into_next_chunk() {
        let mut acc = ChunkAccumulator::new(4);
        let mut chunks = Vec::new();

        acc.push(&[1.0, 2.0, 3.0], &mut |c| collect(&mut chunks, c));
        acc.push(&[4.0, 5.0], &mut |c| collect(&mut chunks, c));

        assert_eq!(chunks, vec![vec![1.0, 2.0, 3.0, 4.0]]);
        assert_eq!(acc.pending(), 1);
    }

    #[test]
    fn large_batch_emits_every_complete_chunk_in_order() {
        let mut acc = ChunkAccumulator::new(3);
        let mut chunks = Vec::new();
        let samples: Vec<f32> = (0..10).map(|i| i as f32).collect();

        let emitted = acc.push(&samples, &mut |c| collect(&mut chunks, c));

        assert_eq!(emitted, 3);
        assert_eq!(
            chunks,
            vec![vec![0.0, 1.0, 2.0], vec![3.0, 4.0, 5.0], vec![6.0, 7.0, 8.0]]
        );
        assert_eq!(acc.pending(), 1);
    }

    #[test]
    fn chunk_bytes_are_exact() {
        let mut acc = ChunkAccumulator::new(9600);
        let mut sizes = Vec::new();

        acc.push(&vec![0.25; 20000], &mut |c| {
            sizes.push(c.len());
            ControlFlow::Continue(())
        });

        assert_eq!(sizes, vec![38400, 38400]);
        assert_eq!(acc.pending(), 800);
    }

    #[test]
    fn break_stops_emission_mid_batch() {
        let mut acc = ChunkAccumulator::new(2);
        let mut chunks = Vec::new();

        // accept the first chunk, refuse the second
        let emitted = acc.push(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &mut |c| {
            if !chunks.is_empty() {
                return ControlFlow::Break(());
            }
            collect(&mut chunks, c)
        });

        assert_eq!(emitted, 1);
        assert_eq!(chunks, vec![vec![1.0, 2.0]]);
        assert_eq!(acc.pending(), 4);
    }

    #[test]
    fn encode_is_little_endian() {
        let mut out = vec![0xff; 3];
        encode_f32le(&[1.0, -0.5], &mut out);
        assert_eq!(out.len(), 8);
        assert_eq!(&out[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&out[4..8], &(-0.5f32).to_le_bytes());
    }
}
