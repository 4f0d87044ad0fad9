use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::config::CaptureSettings;
use crate::models::error::CaptureError;
use crate::processing::chunk_accumulator::ChunkAccumulator;
use crate::processing::silence_watchdog::SilenceWatchdog;
use crate::processing::stream_layout::StreamLayout;
use crate::processing::stream_processor::StreamProcessor;
use crate::traits::capture_delegate::CaptureHost;
use crate::traits::capture_provider::CaptureEndpoint;

use super::stop_signal::StopSignal;

/// Longest the worker sleeps between polls of the endpoint.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Everything the capture thread owns while a session is running.
///
/// Nothing here is shared: the only cross-thread value is the stop signal.
pub(crate) struct CaptureWorker {
    endpoint: Box<dyn CaptureEndpoint>,
    processor: StreamProcessor,
    accumulator: ChunkAccumulator,
    watchdog: SilenceWatchdog,
    host: Arc<dyn CaptureHost>,
    stop: Arc<StopSignal>,
}

impl CaptureWorker {
    pub fn new(
        endpoint: Box<dyn CaptureEndpoint>,
        layout: &StreamLayout,
        settings: &CaptureSettings,
        host: Arc<dyn CaptureHost>,
        stop: Arc<StopSignal>,
    ) -> Self {
        Self {
            endpoint,
            processor: StreamProcessor::new(layout, settings.gain),
            accumulator: ChunkAccumulator::new(layout.samples_needed()),
            watchdog: SilenceWatchdog::new(
                settings.emit_silence,
                layout.chunk_interval,
                layout.samples_needed(),
                Instant::now(),
            ),
            host,
            stop,
        }
    }

    /// Capture until the stop signal is raised or the endpoint fails.
    ///
    /// The endpoint is handed back either way; any partial chunk is dropped.
    pub fn run(mut self) -> (Box<dyn CaptureEndpoint>, Result<(), CaptureError>) {
        let scope = self.endpoint.worker_scope();
        self.watchdog.record_data(Instant::now());

        let outcome = loop {
            if self.stop.wait(POLL_INTERVAL) {
                break Ok(());
            }
            if let Err(e) = self.poll_once() {
                break Err(e);
            }
        };

        drop(scope);
        if self.accumulator.pending() > 0 {
            log::debug!("Dropping {} buffered samples", self.accumulator.pending());
        }
        (self.endpoint, outcome)
    }

    /// One loop iteration: drain the endpoint, then check for silence.
    ///
    /// The stop signal is checked before every `on_data`, so a stop raised
    /// from inside a callback suppresses the rest of the batch.
    pub fn poll_once(&mut self) -> Result<(), CaptureError> {
        let Self {
            endpoint,
            processor,
            accumulator,
            watchdog,
            host,
            stop,
        } = self;

        let mut received = false;
        endpoint.drain(&mut |batch| {
            if batch.silent || batch.frames == 0 || stop.is_raised() {
                return;
            }
            received = true;
            let processed = processor.process(batch.samples);
            accumulator.push(&processed, &mut |chunk| {
                if stop.is_raised() {
                    return ControlFlow::Break(());
                }
                host.on_data(chunk);
                ControlFlow::Continue(())
            });
        })?;

        let now = Instant::now();
        if received {
            watchdog.record_data(now);
        } else if let Some(silence) = watchdog.poll(now) {
            if !stop.is_raised() {
                host.on_data(silence);
            }
        }
        Ok(())
    }
}
