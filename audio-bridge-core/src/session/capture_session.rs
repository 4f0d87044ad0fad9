use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use uuid::Uuid;

use crate::models::config::{CaptureSettings, MicrophoneParams, SystemAudioParams};
use crate::models::error::CaptureError;
use crate::models::source::SourceSelector;
use crate::models::state::{CaptureEvent, SessionState};
use crate::processing::stream_layout::StreamLayout;
use crate::traits::capture_delegate::CaptureHost;
use crate::traits::capture_provider::{CaptureEndpoint, SourceNegotiator, ACTIVATION_TIMEOUT};

use super::stop_signal::StopSignal;
use super::worker::CaptureWorker;

/// The running capture thread and its stop flag.
///
/// The thread hands the endpoint back when a joining stop is waiting for it;
/// `None` means it already released the endpoint itself.
struct WorkerHandle {
    stop: Arc<StopSignal>,
    thread: JoinHandle<Option<Box<dyn CaptureEndpoint>>>,
}

impl WorkerHandle {
    fn is_current_thread(&self) -> bool {
        self.thread.thread().id() == thread::current().id()
    }

    /// Raise the stop flag and wait for the thread, then stop its endpoint.
    ///
    /// Never called on the worker's own thread.
    fn shutdown(self) {
        self.stop.raise();
        match self.thread.join() {
            Ok(Some(mut endpoint)) => endpoint.stop(),
            Ok(None) => {}
            Err(_) => log::error!("Capture thread panicked"),
        }
    }
}

struct Lifecycle {
    state: SessionState,
    worker: Option<WorkerHandle>,
}

impl Lifecycle {
    /// The worker handle, when the caller is running on that worker's thread.
    fn own_worker(&self) -> Option<&WorkerHandle> {
        self.worker.as_ref().filter(|worker| worker.is_current_thread())
    }

    /// A host callback already stopped the session from the capture thread.
    fn stopped_from_worker(&self) -> bool {
        matches!(self.state, SessionState::Stopping) && self.own_worker().is_some()
    }
}

/// State shared between the control API and the capture thread.
struct Shared {
    id: Uuid,
    lifecycle: Mutex<Lifecycle>,
    changed: Condvar,
    host: Arc<dyn CaptureHost>,
}

impl Shared {
    fn finish(&self) {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.state = SessionState::Idle;
        lifecycle.worker = None;
        self.changed.notify_all();
    }

    /// Roll a failed start back to idle and report it.
    fn settle(&self, error: CaptureError) -> CaptureError {
        log::error!("Session {} failed to start: {}", self.id, error);
        self.finish();
        self.host.on_event(&CaptureEvent::Error(error.to_string()));
        error
    }

    /// Last step of the capture thread.
    ///
    /// A stop joining from another thread gets the endpoint back. Otherwise
    /// the worker tears the session down itself: after a runtime failure, or
    /// after a stop requested from one of its own callbacks.
    fn exit(&self, mut endpoint: Box<dyn CaptureEndpoint>, outcome: Result<(), CaptureError>) -> Option<Box<dyn CaptureEndpoint>> {
        if let Err(e) = &outcome {
            log::error!("Session {} capture failed: {}", self.id, e);
            let stopped = self.lifecycle.lock().stopped_from_worker();
            if !stopped {
                self.host.on_event(&CaptureEvent::Error(e.to_string()));
            }
        }

        let (own, report_stop) = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.own_worker().is_none() {
                return Some(endpoint);
            }
            // Running here means no stop was requested; Stopped is still owed.
            let report_stop = lifecycle.state.is_running();
            lifecycle.state = SessionState::Stopping;
            (lifecycle.worker.take(), report_stop)
        };
        // Dropping our own handle detaches the thread.
        drop(own);

        endpoint.stop();
        drop(endpoint);
        if report_stop {
            self.host.on_event(&CaptureEvent::Stopped);
        }
        self.finish();
        log::info!("Session {} stopped by the capture thread", self.id);
        None
    }
}

/// One capture engine instance: a single source at a time, fixed-size chunks
/// delivered to a `CaptureHost` from a dedicated thread.
///
/// ```text
/// [SourceNegotiator] → [CaptureEndpoint] → worker thread
///     drain → gain → downmix → resample → ChunkAccumulator → host.on_data
///                                 SilenceWatchdog ─────────↗
/// ```
///
/// All methods take `&self` and may be called from any thread.
pub struct CaptureSession<N: SourceNegotiator> {
    negotiator: N,
    shared: Arc<Shared>,
}

impl<N: SourceNegotiator> CaptureSession<N> {
    pub fn new(negotiator: N, host: Arc<dyn CaptureHost>) -> Self {
        Self {
            negotiator,
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                lifecycle: Mutex::new(Lifecycle {
                    state: SessionState::Idle,
                    worker: None,
                }),
                changed: Condvar::new(),
                host,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn state(&self) -> SessionState {
        self.shared.lifecycle.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Start loopback capture of the default render device, or of a single
    /// process tree when `include_processes`/`exclude_processes` are set.
    pub fn start_system_audio(&self, params: &SystemAudioParams) -> Result<(), CaptureError> {
        if params.mute {
            log::warn!("Muting captured output is not supported, ignoring mute");
        }
        self.start(params.selector(), params.settings(), Ok(()))
    }

    /// Start capture from a microphone, the default one when no device id is given.
    pub fn start_microphone(&self, params: &MicrophoneParams) -> Result<(), CaptureError> {
        self.start(params.selector(), params.settings(), params.validate())
    }

    /// Stop capture. Returns once the capture thread has exited; no host
    /// callback fires afterwards. Stopping an idle session is a no-op.
    ///
    /// Called from a host callback on the capture thread, it cannot join:
    /// `Stopped` is reported, no further data is delivered, and the session
    /// stays `Stopping` until the worker has released the endpoint.
    pub fn stop(&self) -> Result<(), CaptureError> {
        let worker = {
            let mut lifecycle = self.shared.lifecycle.lock();
            loop {
                match lifecycle.state {
                    SessionState::Running => break,
                    SessionState::Stopping if lifecycle.own_worker().is_some() => return Ok(()),
                    SessionState::Stopping => self.shared.changed.wait(&mut lifecycle),
                    SessionState::Idle | SessionState::Initializing => return Ok(()),
                }
            }
            lifecycle.state = SessionState::Stopping;
            let own_stop = lifecycle.own_worker().map(|own| Arc::clone(&own.stop));
            if let Some(stop) = own_stop {
                stop.raise();
                drop(lifecycle);
                self.shared.host.on_event(&CaptureEvent::Stopped);
                log::info!("Session {} stopping from the capture thread", self.shared.id);
                return Ok(());
            }
            lifecycle.worker.take()
        };

        if let Some(worker) = worker {
            worker.shutdown();
        }
        self.shared.host.on_event(&CaptureEvent::Stopped);
        self.shared.finish();
        log::info!("Session {} stopped", self.shared.id);
        Ok(())
    }

    /// Stop capture and release the session.
    pub fn destroy(self) {
        drop(self);
    }

    fn start(
        &self,
        selector: SourceSelector,
        settings: CaptureSettings,
        validation: Result<(), CaptureError>,
    ) -> Result<(), CaptureError> {
        self.begin()?;
        if let Err(e) = validation.and_then(|()| self.launch(&selector, &settings)) {
            return Err(self.shared.settle(e));
        }
        Ok(())
    }

    /// Idle → initializing, or `AlreadyRunning` with nothing touched.
    fn begin(&self) -> Result<(), CaptureError> {
        let mut lifecycle = self.shared.lifecycle.lock();
        if !lifecycle.state.is_idle() {
            return Err(CaptureError::AlreadyRunning);
        }
        lifecycle.state = SessionState::Initializing;
        Ok(())
    }

    fn launch(&self, selector: &SourceSelector, settings: &CaptureSettings) -> Result<(), CaptureError> {
        log::info!("Session {} starting {:?}", self.shared.id, selector);
        let mut endpoint = self.negotiator.negotiate(selector, ACTIVATION_TIMEOUT)?;

        let layout = StreamLayout::finalize(endpoint.format(), settings)?;
        log::debug!(
            "Native {} Hz x{}, output {} Hz x{}, {} samples per chunk",
            layout.native.sample_rate,
            layout.native.channel_count,
            layout.output.sample_rate,
            layout.output.channel_count,
            layout.samples_per_chunk
        );
        self.shared.host.on_metadata(&layout.output);

        endpoint.start()?;
        self.shared.host.on_event(&CaptureEvent::Started);

        let stop = Arc::new(StopSignal::new());
        let worker = CaptureWorker::new(endpoint, &layout, settings, Arc::clone(&self.shared.host), Arc::clone(&stop));
        let shared = Arc::clone(&self.shared);

        // Held across the spawn so a failing worker cannot observe the
        // session before it is marked running.
        let mut lifecycle = self.shared.lifecycle.lock();
        let thread = thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || {
                let (endpoint, outcome) = worker.run();
                shared.exit(endpoint, outcome)
            })
            .map_err(|e| CaptureError::StartFailure(format!("failed to spawn capture thread: {}", e)))?;

        lifecycle.worker = Some(WorkerHandle { stop, thread });
        lifecycle.state = SessionState::Running;
        self.shared.changed.notify_all();
        log::info!("Session {} running", self.shared.id);
        Ok(())
    }
}

impl<N: SourceNegotiator> Drop for CaptureSession<N> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("Session {} failed to stop on drop: {}", self.shared.id, e);
        }
    }
}
