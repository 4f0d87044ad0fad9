//! Scripted negotiator, endpoint and host for exercising sessions without
//! audio hardware.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::audio_models::AudioFormatDescriptor;
use crate::models::error::CaptureError;
use crate::models::source::SourceSelector;
use crate::models::state::CaptureEvent;
use crate::traits::capture_delegate::CaptureHost;
use crate::traits::capture_provider::{CaptureEndpoint, RawBatch, SourceNegotiator, WorkerScope};

struct Packet {
    samples: Vec<f32>,
    frames: usize,
    silent: bool,
}

/// Shared control surface for scripted endpoints.
pub struct Script {
    format: AudioFormatDescriptor,
    packets: Mutex<VecDeque<Packet>>,
    negotiate_error: Mutex<Option<CaptureError>>,
    start_error: Mutex<Option<CaptureError>>,
    drain_error: Mutex<Option<CaptureError>>,
    selectors: Mutex<Vec<SourceSelector>>,
    timeouts: Mutex<Vec<Duration>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
    releases: AtomicUsize,
    scopes_entered: AtomicUsize,
    open_scopes: AtomicIsize,
}

impl Script {
    pub fn new(format: AudioFormatDescriptor) -> Arc<Self> {
        Arc::new(Self {
            format,
            packets: Mutex::new(VecDeque::new()),
            negotiate_error: Mutex::new(None),
            start_error: Mutex::new(None),
            drain_error: Mutex::new(None),
            selectors: Mutex::new(Vec::new()),
            timeouts: Mutex::new(Vec::new()),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            scopes_entered: AtomicUsize::new(0),
            open_scopes: AtomicIsize::new(0),
        })
    }

    pub fn negotiator(self: &Arc<Self>) -> ScriptedNegotiator {
        ScriptedNegotiator(Arc::clone(self))
    }

    pub fn endpoint(self: &Arc<Self>) -> Box<dyn CaptureEndpoint> {
        Box::new(ScriptedEndpoint {
            script: Arc::clone(self),
            format: self.format,
        })
    }

    /// Queue a packet of interleaved samples.
    pub fn push(&self, samples: Vec<f32>) {
        let channels = self.format.channel_count.max(1) as usize;
        let frames = samples.len() / channels;
        self.packets.lock().push_back(Packet {
            samples,
            frames,
            silent: false,
        });
    }

    /// Queue a packet the platform flagged as silent.
    pub fn push_silent(&self, frames: usize) {
        let channels = self.format.channel_count.max(1) as usize;
        self.packets.lock().push_back(Packet {
            samples: vec![0.0; frames * channels],
            frames,
            silent: true,
        });
    }

    pub fn fail_negotiation(&self, error: CaptureError) {
        *self.negotiate_error.lock() = Some(error);
    }

    pub fn fail_start(&self, error: CaptureError) {
        *self.start_error.lock() = Some(error);
    }

    pub fn fail_next_drain(&self, error: CaptureError) {
        *self.drain_error.lock() = Some(error);
    }

    pub fn selectors(&self) -> Vec<SourceSelector> {
        self.selectors.lock().clone()
    }

    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().clone()
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn scopes_entered(&self) -> usize {
        self.scopes_entered.load(Ordering::SeqCst)
    }

    pub fn open_scopes(&self) -> isize {
        self.open_scopes.load(Ordering::SeqCst)
    }
}

pub struct ScriptedNegotiator(pub Arc<Script>);

impl SourceNegotiator for ScriptedNegotiator {
    fn negotiate(
        &self,
        selector: &SourceSelector,
        activation_timeout: Duration,
    ) -> Result<Box<dyn CaptureEndpoint>, CaptureError> {
        self.0.selectors.lock().push(selector.clone());
        self.0.timeouts.lock().push(activation_timeout);
        if let Some(error) = self.0.negotiate_error.lock().clone() {
            return Err(error);
        }
        Ok(self.0.endpoint())
    }
}

struct ScriptedEndpoint {
    script: Arc<Script>,
    format: AudioFormatDescriptor,
}

impl CaptureEndpoint for ScriptedEndpoint {
    fn format(&self) -> &AudioFormatDescriptor {
        &self.format
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        if let Some(error) = self.script.start_error.lock().clone() {
            return Err(error);
        }
        self.script.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.script.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn drain(&mut self, on_batch: &mut dyn FnMut(RawBatch<'_>)) -> Result<(), CaptureError> {
        if let Some(error) = self.script.drain_error.lock().take() {
            return Err(error);
        }
        loop {
            let packet = self.script.packets.lock().pop_front();
            let Some(packet) = packet else {
                return Ok(());
            };
            on_batch(RawBatch {
                samples: &packet.samples,
                frames: packet.frames,
                silent: packet.silent,
            });
        }
    }

    fn worker_scope(&self) -> WorkerScope {
        self.script.scopes_entered.fetch_add(1, Ordering::SeqCst);
        self.script.open_scopes.fetch_add(1, Ordering::SeqCst);
        let script = Arc::clone(&self.script);
        WorkerScope::new(move || {
            script.open_scopes.fetch_sub(1, Ordering::SeqCst);
        })
    }
}

impl Drop for ScriptedEndpoint {
    fn drop(&mut self) {
        self.script.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Recorded {
    chunks: Vec<Vec<u8>>,
    events: Vec<CaptureEvent>,
    metadata: Vec<AudioFormatDescriptor>,
    /// Index into `events` at which each chunk arrived.
    chunk_event_marks: Vec<usize>,
}

/// Host that records every callback.
#[derive(Default)]
pub struct RecordingHost {
    recorded: Mutex<Recorded>,
    changed: Condvar,
}

impl RecordingHost {
    pub fn chunks(&self) -> Vec<Vec<u8>> {
        self.recorded.lock().chunks.clone()
    }

    pub fn events(&self) -> Vec<CaptureEvent> {
        self.recorded.lock().events.clone()
    }

    pub fn metadata(&self) -> Vec<AudioFormatDescriptor> {
        self.recorded.lock().metadata.clone()
    }

    /// Number of events that had been delivered when the first chunk arrived.
    pub fn events_before_first_chunk(&self) -> Option<usize> {
        self.recorded.lock().chunk_event_marks.first().copied()
    }

    /// Wait until at least `count` chunks have arrived.
    pub fn wait_for_chunks(&self, count: usize, timeout: Duration) -> Vec<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut recorded = self.recorded.lock();
        while recorded.chunks.len() < count {
            if self.changed.wait_until(&mut recorded, deadline).timed_out() {
                break;
            }
        }
        recorded.chunks.clone()
    }

    /// Wait until an event matching `predicate` has arrived.
    pub fn wait_for_event(&self, predicate: impl Fn(&CaptureEvent) -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut recorded = self.recorded.lock();
        loop {
            if recorded.events.iter().any(&predicate) {
                return true;
            }
            if self.changed.wait_until(&mut recorded, deadline).timed_out() {
                return recorded.events.iter().any(&predicate);
            }
        }
    }
}

impl CaptureHost for RecordingHost {
    fn on_data(&self, chunk: &[u8]) {
        let mut recorded = self.recorded.lock();
        let mark = recorded.events.len();
        recorded.chunks.push(chunk.to_vec());
        recorded.chunk_event_marks.push(mark);
        self.changed.notify_all();
    }

    fn on_event(&self, event: &CaptureEvent) {
        self.recorded.lock().events.push(event.clone());
        self.changed.notify_all();
    }

    fn on_metadata(&self, format: &AudioFormatDescriptor) {
        self.recorded.lock().metadata.push(*format);
        self.changed.notify_all();
    }
}

/// Decode `pcm_f32le` bytes.
pub fn decode_f32le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
