//! Process-scoped loopback activation.
//!
//! `ActivateAudioInterfaceAsync` completes on a COM worker thread by calling
//! back into an `IActivateAudioInterfaceCompletionHandler`. The handler here
//! only fills a slot; `activate_process_loopback` blocks on that slot for at
//! most the caller's timeout and owns the async operation until it returns.

use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use windows::core::{implement, Interface, IUnknown, Ref, HRESULT};
use windows::Win32::Media::Audio::{
    ActivateAudioInterfaceAsync, IActivateAudioInterfaceAsyncOperation, IActivateAudioInterfaceCompletionHandler,
    IActivateAudioInterfaceCompletionHandler_Impl, IAudioClient, AUDIOCLIENT_ACTIVATION_PARAMS,
    AUDIOCLIENT_ACTIVATION_PARAMS_0, AUDIOCLIENT_ACTIVATION_TYPE_PROCESS_LOOPBACK,
    AUDIOCLIENT_PROCESS_LOOPBACK_PARAMS, PROCESS_LOOPBACK_MODE, PROCESS_LOOPBACK_MODE_EXCLUDE_TARGET_PROCESS_TREE,
    PROCESS_LOOPBACK_MODE_INCLUDE_TARGET_PROCESS_TREE, VIRTUAL_AUDIO_DEVICE_PROCESS_LOOPBACK,
};
use windows::Win32::System::Com::StructuredStorage::PROPVARIANT;
use windows::Win32::System::Com::BLOB;
use windows::Win32::System::Variant::VT_BLOB;

use audio_bridge_core::models::error::CaptureError;

/// Whether the target process tree is captured alone or left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessScope {
    Include,
    Exclude,
}

impl ProcessScope {
    fn mode(self) -> PROCESS_LOOPBACK_MODE {
        match self {
            Self::Include => PROCESS_LOOPBACK_MODE_INCLUDE_TARGET_PROCESS_TREE,
            Self::Exclude => PROCESS_LOOPBACK_MODE_EXCLUDE_TARGET_PROCESS_TREE,
        }
    }
}

type Completion = windows::core::Result<IAudioClient>;

#[derive(Default)]
struct CompletionSlot {
    result: Mutex<Option<Completion>>,
    ready: Condvar,
}

impl CompletionSlot {
    fn fill(&self, result: Completion) {
        *self.result.lock() = Some(result);
        self.ready.notify_all();
    }

    fn wait(&self, timeout: Duration) -> Option<Completion> {
        let deadline = Instant::now() + timeout;
        let mut result = self.result.lock();
        while result.is_none() {
            if self.ready.wait_until(&mut result, deadline).timed_out() {
                break;
            }
        }
        result.take()
    }
}

#[implement(IActivateAudioInterfaceCompletionHandler)]
struct ActivationHandler {
    slot: Arc<CompletionSlot>,
}

impl IActivateAudioInterfaceCompletionHandler_Impl for ActivationHandler_Impl {
    fn ActivateCompleted(&self, operation: Ref<'_, IActivateAudioInterfaceAsyncOperation>) -> windows::core::Result<()> {
        let result = operation.ok().and_then(|operation| {
            let mut activate_result = HRESULT(0);
            let mut activated: Option<IUnknown> = None;
            // SAFETY: both out-pointers are valid for the duration of the call.
            unsafe { operation.GetActivateResult(&mut activate_result, &mut activated)? };
            activate_result.ok()?;
            activated
                .ok_or_else(|| windows::core::Error::from(windows::Win32::Foundation::E_NOINTERFACE))?
                .cast::<IAudioClient>()
        });
        self.slot.fill(result);
        Ok(())
    }
}

/// Activate an `IAudioClient` on the process loopback virtual device.
///
/// Returns `ActivationTimeout` if the platform has not completed within
/// `timeout`; a late completion is discarded.
pub fn activate_process_loopback(
    process_id: u32,
    scope: ProcessScope,
    timeout: Duration,
) -> Result<IAudioClient, CaptureError> {
    let params = AUDIOCLIENT_ACTIVATION_PARAMS {
        ActivationType: AUDIOCLIENT_ACTIVATION_TYPE_PROCESS_LOOPBACK,
        Anonymous: AUDIOCLIENT_ACTIVATION_PARAMS_0 {
            ProcessLoopbackParams: AUDIOCLIENT_PROCESS_LOOPBACK_PARAMS {
                TargetProcessId: process_id,
                ProcessLoopbackMode: scope.mode(),
            },
        },
    };

    // The blob borrows `params`; the variant is never cleared.
    let mut variant = PROPVARIANT::default();
    unsafe {
        let inner = &mut variant.Anonymous.Anonymous;
        inner.vt = VT_BLOB;
        inner.Anonymous.blob = BLOB {
            cbSize: mem::size_of::<AUDIOCLIENT_ACTIVATION_PARAMS>() as u32,
            pBlobData: &params as *const AUDIOCLIENT_ACTIVATION_PARAMS as *mut u8,
        };
    }

    let slot = Arc::new(CompletionSlot::default());
    let handler: IActivateAudioInterfaceCompletionHandler = ActivationHandler {
        slot: Arc::clone(&slot),
    }
    .into();

    log::debug!("Activating process loopback for pid {} ({:?})", process_id, scope);
    // SAFETY: `variant` and `params` outlive the call; activation copies the blob.
    let operation = unsafe {
        ActivateAudioInterfaceAsync(
            VIRTUAL_AUDIO_DEVICE_PROCESS_LOOPBACK,
            &IAudioClient::IID,
            Some(&variant),
            &handler,
        )
    }
    .map_err(|e| CaptureError::SourceUnavailable(format!("ActivateAudioInterfaceAsync failed: {}", e)))?;

    let completion = slot.wait(timeout);
    drop(operation);

    match completion {
        None => Err(CaptureError::ActivationTimeout),
        Some(Ok(client)) => Ok(client),
        Some(Err(e)) => Err(CaptureError::SourceUnavailable(format!(
            "process loopback activation for pid {} failed: {}",
            process_id, e
        ))),
    }
}
