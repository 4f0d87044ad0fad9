//! C ABI glue shared by the platform bridges.
//!
//! The exported `extern "C"` symbols live in the platform crate; everything
//! here is generic over the negotiator so it can be exercised without audio
//! hardware. A handle is a boxed `CaptureSession<N>` behind `*mut c_void`,
//! and every function taking a handle must be called with the same `N` that
//! created it.

use std::ffi::{c_char, c_void, CStr, CString};
use std::ptr;
use std::slice;
use std::sync::Arc;

use crate::models::audio_models::{AudioDeviceInfo, AudioFormatDescriptor, PermissionStatus};
use crate::models::config::{MicrophoneParams, SystemAudioParams};
use crate::models::error::CaptureError;
use crate::models::state::CaptureEvent;
use crate::session::capture_session::CaptureSession;
use crate::traits::capture_delegate::CaptureHost;
use crate::traits::capture_provider::SourceNegotiator;

/// Opaque session handle handed to C callers.
pub type RecorderHandle = *mut c_void;

pub type AudioDataCallback = Option<unsafe extern "C" fn(data: *const u8, length: i32, context: *mut c_void)>;

pub type AudioEventCallback =
    Option<unsafe extern "C" fn(event_type: i32, message: *const c_char, context: *mut c_void)>;

pub type AudioMetadataCallback = Option<
    unsafe extern "C" fn(
        sample_rate: f64,
        channels_per_frame: u32,
        bits_per_channel: u32,
        is_float: bool,
        encoding: *const c_char,
        context: *mut c_void,
    ),
>;

pub type PermissionCallback = Option<unsafe extern "C" fn(granted: bool, context: *mut c_void)>;

/// Device record as laid out for C callers. Strings are owned by the list
/// and released by `free_device_list`.
#[repr(C)]
#[derive(Debug)]
pub struct FfiDeviceInfo {
    pub uid: *mut c_char,
    pub name: *mut c_char,
    /// Null when the device reports no manufacturer.
    pub manufacturer: *mut c_char,
    pub is_default: bool,
    pub is_input: bool,
    pub is_output: bool,
    pub sample_rate: f64,
    pub channel_count: u32,
}

/// `CaptureHost` that forwards to C function pointers.
pub struct CallbackHost {
    data: AudioDataCallback,
    event: AudioEventCallback,
    metadata: AudioMetadataCallback,
    context: *mut c_void,
}

// SAFETY: the caller of `create` guarantees the callbacks and their context
// may be invoked from any thread for the lifetime of the handle.
unsafe impl Send for CallbackHost {}
unsafe impl Sync for CallbackHost {}

impl CallbackHost {
    pub fn new(
        data: AudioDataCallback,
        event: AudioEventCallback,
        metadata: AudioMetadataCallback,
        context: *mut c_void,
    ) -> Self {
        Self {
            data,
            event,
            metadata,
            context,
        }
    }
}

impl CaptureHost for CallbackHost {
    fn on_data(&self, chunk: &[u8]) {
        let Some(callback) = self.data else {
            return;
        };
        let Ok(length) = i32::try_from(chunk.len()) else {
            log::error!("Dropping chunk of {} bytes, too large for the data callback", chunk.len());
            return;
        };
        // SAFETY: `chunk` outlives the call; the callback contract is upheld by the creator.
        unsafe { callback(chunk.as_ptr(), length, self.context) }
    }

    fn on_event(&self, event: &CaptureEvent) {
        let Some(callback) = self.event else {
            return;
        };
        let message = event.message().map(to_c_string);
        let message_ptr = message.as_ref().map_or(ptr::null(), |m| m.as_ptr());
        // SAFETY: `message` lives until after the call returns.
        unsafe { callback(event.code(), message_ptr, self.context) }
    }

    fn on_metadata(&self, format: &AudioFormatDescriptor) {
        let Some(callback) = self.metadata else {
            return;
        };
        let encoding = to_c_string(format.encoding.as_str());
        // SAFETY: `encoding` lives until after the call returns.
        unsafe {
            callback(
                format.sample_rate,
                u32::from(format.channel_count),
                u32::from(format.bits_per_channel),
                format.is_float,
                encoding.as_ptr(),
                self.context,
            )
        }
    }
}

/// Map a lifecycle result to its C return code.
pub fn status_code(result: Result<(), CaptureError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.code(),
    }
}

/// Box a new session behind an opaque handle.
pub fn create<N: SourceNegotiator + 'static>(
    negotiator: N,
    data: AudioDataCallback,
    event: AudioEventCallback,
    metadata: AudioMetadataCallback,
    context: *mut c_void,
) -> RecorderHandle {
    let host: Arc<dyn CaptureHost> = Arc::new(CallbackHost::new(data, event, metadata, context));
    let session = CaptureSession::new(negotiator, host);
    log::debug!("Created session {}", session.id());
    Box::into_raw(Box::new(session)).cast()
}

/// # Safety
/// `handle` must be null or a live handle returned by `create::<N>`.
unsafe fn session_ref<'a, N: SourceNegotiator>(handle: RecorderHandle) -> Result<&'a CaptureSession<N>, CaptureError> {
    handle
        .cast::<CaptureSession<N>>()
        .as_ref()
        .ok_or(CaptureError::InvalidHandle)
}

/// # Safety
/// `handle` must be null or a live handle returned by `create::<N>`.
/// `include`/`exclude` must be null or point to `*_count` readable ids.
#[allow(clippy::too_many_arguments)]
pub unsafe fn start_system_audio<N: SourceNegotiator>(
    handle: RecorderHandle,
    sample_rate: f64,
    chunk_duration_ms: f64,
    mute: bool,
    mono: bool,
    emit_silence: bool,
    include: *const i32,
    include_count: i32,
    exclude: *const i32,
    exclude_count: i32,
) -> i32 {
    let session = match session_ref::<N>(handle) {
        Ok(session) => session,
        Err(e) => return e.code(),
    };
    let params = SystemAudioParams {
        sample_rate,
        chunk_duration_ms,
        mute,
        mono,
        emit_silence,
        include_processes: process_ids(include, include_count),
        exclude_processes: process_ids(exclude, exclude_count),
    };
    status_code(session.start_system_audio(&params))
}

/// # Safety
/// `handle` must be null or a live handle returned by `create::<N>`.
/// `device_uid` must be null or a NUL-terminated string.
pub unsafe fn start_microphone<N: SourceNegotiator>(
    handle: RecorderHandle,
    sample_rate: f64,
    chunk_duration_ms: f64,
    mono: bool,
    emit_silence: bool,
    device_uid: *const c_char,
    gain: f64,
) -> i32 {
    let session = match session_ref::<N>(handle) {
        Ok(session) => session,
        Err(e) => return e.code(),
    };
    let params = MicrophoneParams {
        sample_rate,
        chunk_duration_ms,
        mono,
        emit_silence,
        device_id: from_c_str(device_uid),
        gain,
    };
    status_code(session.start_microphone(&params))
}

/// # Safety
/// `handle` must be null or a live handle returned by `create::<N>`.
pub unsafe fn stop<N: SourceNegotiator>(handle: RecorderHandle) -> i32 {
    status_code(session_ref::<N>(handle).and_then(|s| s.stop()))
}

/// # Safety
/// `handle` must be null or a live handle returned by `create::<N>`.
pub unsafe fn is_running<N: SourceNegotiator>(handle: RecorderHandle) -> bool {
    session_ref::<N>(handle).is_ok_and(|s| s.is_running())
}

/// Stop the session and free the handle.
///
/// # Safety
/// `handle` must be null or a live handle returned by `create::<N>`; it is
/// dangling afterwards.
pub unsafe fn destroy<N: SourceNegotiator>(handle: RecorderHandle) {
    if handle.is_null() {
        return;
    }
    let session = *Box::from_raw(handle.cast::<CaptureSession<N>>());
    session.destroy();
}

/// Decode a C array of process ids. Negative ids are dropped.
///
/// # Safety
/// `ids` must be null or point to `count` readable values.
pub unsafe fn process_ids(ids: *const i32, count: i32) -> Vec<u32> {
    if ids.is_null() || count <= 0 {
        return Vec::new();
    }
    slice::from_raw_parts(ids, count as usize)
        .iter()
        .filter_map(|&id| match u32::try_from(id) {
            Ok(id) => Some(id),
            Err(_) => {
                log::warn!("Ignoring invalid process id {}", id);
                None
            }
        })
        .collect()
}

/// # Safety
/// `value` must be null or a NUL-terminated string.
pub unsafe fn from_c_str(value: *const c_char) -> Option<String> {
    if value.is_null() {
        return None;
    }
    Some(CStr::from_ptr(value).to_string_lossy().into_owned())
}

fn to_c_string(value: &str) -> CString {
    CString::new(value.replace('\0', " ")).unwrap_or_default()
}

/// Hand a string to C; release with `free_string`.
pub fn into_raw_string(value: &str) -> *mut c_char {
    to_c_string(value).into_raw()
}

/// # Safety
/// `value` must be null or come from `into_raw_string` and not be freed yet.
pub unsafe fn free_string(value: *mut c_char) {
    if !value.is_null() {
        drop(CString::from_raw(value));
    }
}

/// Turn a default-device lookup into an owned C string, or null.
pub fn default_device_string(lookup: Result<Option<String>, CaptureError>) -> *mut c_char {
    match lookup {
        Ok(Some(id)) if !id.is_empty() => into_raw_string(&id),
        Ok(_) => ptr::null_mut(),
        Err(e) => {
            log::warn!("Default device lookup failed: {}", e);
            ptr::null_mut()
        }
    }
}

/// Write a device list to C out-parameters. An enumeration failure yields an
/// empty list. Returns -1 when an out-pointer is null.
///
/// # Safety
/// `devices` and `count` must be null or valid for writes.
pub unsafe fn write_device_list(
    listing: Result<Vec<AudioDeviceInfo>, CaptureError>,
    devices: *mut *mut FfiDeviceInfo,
    count: *mut i32,
) -> i32 {
    if devices.is_null() || count.is_null() {
        return CaptureError::InvalidHandle.code();
    }
    let listing = listing.unwrap_or_else(|e| {
        log::warn!("Device enumeration failed: {}", e);
        Vec::new()
    });
    let len = match i32::try_from(listing.len()) {
        Ok(len) if len > 0 => len,
        _ => {
            *devices = ptr::null_mut();
            *count = 0;
            return 0;
        }
    };

    let records: Box<[FfiDeviceInfo]> = listing
        .iter()
        .map(|device| FfiDeviceInfo {
            uid: into_raw_string(&device.id),
            name: into_raw_string(&device.name),
            manufacturer: device.manufacturer.as_deref().map_or(ptr::null_mut(), into_raw_string),
            is_default: device.is_default,
            is_input: device.is_input,
            is_output: device.is_output,
            sample_rate: device.sample_rate,
            channel_count: device.channel_count,
        })
        .collect();
    *devices = Box::into_raw(records).cast::<FfiDeviceInfo>();
    *count = len;
    0
}

/// # Safety
/// `devices` must be null or a list from `write_device_list` with its `count`.
pub unsafe fn free_device_list(devices: *mut FfiDeviceInfo, count: i32) {
    if devices.is_null() || count <= 0 {
        return;
    }
    let records = Box::from_raw(ptr::slice_from_raw_parts_mut(devices, count as usize));
    for record in records.iter() {
        free_string(record.uid);
        free_string(record.name);
        free_string(record.manufacturer);
    }
}

/// Complete a permission request synchronously with the current status.
///
/// # Safety
/// `callback`, if set, must be safe to call with `context`.
pub unsafe fn complete_permission_request(status: PermissionStatus, callback: PermissionCallback, context: *mut c_void) {
    if let Some(callback) = callback {
        callback(status.is_authorized(), context);
    }
}
