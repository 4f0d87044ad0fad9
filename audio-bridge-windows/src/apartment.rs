//! COM apartment management.
//!
//! Hosts often call in from an STA thread (a UI thread), where a second
//! `CoInitializeEx(COINIT_MULTITHREADED)` fails with `RPC_E_CHANGED_MODE`.
//! Instead the process keeps the MTA alive with `CoIncrementMTAUsage`, which
//! makes COM usable from any thread that has not picked an apartment.

use std::sync::OnceLock;

use windows::Win32::System::Com::{
    CoIncrementMTAUsage, CoInitializeEx, CoUninitialize, CO_MTA_USAGE_COOKIE, COINIT_MULTITHREADED,
};

use audio_bridge_core::models::error::CaptureError;

struct MtaCookie(#[allow(dead_code)] CO_MTA_USAGE_COOKIE);

// SAFETY: the cookie is an opaque token that is never dereferenced.
unsafe impl Send for MtaCookie {}
unsafe impl Sync for MtaCookie {}

static MTA: OnceLock<Result<MtaCookie, String>> = OnceLock::new();

/// Keep the process MTA alive for the rest of the process lifetime.
pub fn ensure_mta() -> Result<(), CaptureError> {
    let usage = MTA.get_or_init(|| {
        // SAFETY: no preconditions; the cookie is intentionally never released.
        unsafe { CoIncrementMTAUsage() }
            .map(MtaCookie)
            .map_err(|e| e.to_string())
    });
    match usage {
        Ok(_) => Ok(()),
        Err(e) => Err(CaptureError::SourceUnavailable(format!("CoIncrementMTAUsage failed: {}", e))),
    }
}

/// Joins the calling thread to the MTA; leaves it on drop.
///
/// Holds nothing when the thread already belongs to another apartment.
pub struct ComGuard {
    initialized: bool,
}

impl ComGuard {
    pub fn enter() -> Self {
        // SAFETY: paired with CoUninitialize in Drop only when it succeeded.
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr.is_err() {
            log::debug!("CoInitializeEx on worker thread failed: {}", hr.message());
        }
        Self {
            initialized: hr.is_ok(),
        }
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.initialized {
            unsafe {
                CoUninitialize();
            }
        }
    }
}
