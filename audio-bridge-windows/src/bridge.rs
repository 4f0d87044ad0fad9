//! Exported C ABI.
//!
//! Handles are `CaptureSession<WasapiNegotiator>` boxes created by
//! `audio_create`. Strings and device lists returned here are owned by the
//! caller and must go back through the matching `audio_free_*` function.

use std::ffi::{c_char, c_void};

use audio_bridge_core::ffi::{
    self, AudioDataCallback, AudioEventCallback, AudioMetadataCallback, FfiDeviceInfo, PermissionCallback,
    RecorderHandle,
};
use audio_bridge_core::traits::device_catalog::{DeviceCatalog, PermissionProvider};

use crate::apartment;
use crate::device_enumerator::DeviceEnumerator;
use crate::negotiator::WasapiNegotiator;
use crate::permissions::WindowsPermissions;

/// Create a capture session. Never returns null.
///
/// # Safety
/// The callbacks, if set, must be callable from any thread with
/// `user_context` until `audio_destroy` returns.
#[no_mangle]
pub unsafe extern "C" fn audio_create(
    data_callback: AudioDataCallback,
    event_callback: AudioEventCallback,
    metadata_callback: AudioMetadataCallback,
    user_context: *mut c_void,
) -> RecorderHandle {
    if let Err(e) = apartment::ensure_mta() {
        log::warn!("{}", e);
    }
    ffi::create(
        WasapiNegotiator::new(),
        data_callback,
        event_callback,
        metadata_callback,
        user_context,
    )
}

/// # Safety
/// `handle` must be null or come from `audio_create`. The process arrays
/// must be null or hold `*_count` entries.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn audio_start_system_audio(
    handle: RecorderHandle,
    sample_rate: f64,
    chunk_duration_ms: f64,
    mute: bool,
    is_mono: bool,
    emit_silence: bool,
    include_processes: *const i32,
    include_process_count: i32,
    exclude_processes: *const i32,
    exclude_process_count: i32,
) -> i32 {
    ffi::start_system_audio::<WasapiNegotiator>(
        handle,
        sample_rate,
        chunk_duration_ms,
        mute,
        is_mono,
        emit_silence,
        include_processes,
        include_process_count,
        exclude_processes,
        exclude_process_count,
    )
}

/// # Safety
/// `handle` must be null or come from `audio_create`; `device_uid` must be
/// null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn audio_start_microphone(
    handle: RecorderHandle,
    sample_rate: f64,
    chunk_duration_ms: f64,
    is_mono: bool,
    emit_silence: bool,
    device_uid: *const c_char,
    gain: f64,
) -> i32 {
    ffi::start_microphone::<WasapiNegotiator>(
        handle,
        sample_rate,
        chunk_duration_ms,
        is_mono,
        emit_silence,
        device_uid,
        gain,
    )
}

/// # Safety
/// `handle` must be null or come from `audio_create`.
#[no_mangle]
pub unsafe extern "C" fn audio_stop(handle: RecorderHandle) -> i32 {
    ffi::stop::<WasapiNegotiator>(handle)
}

/// # Safety
/// `handle` must be null or come from `audio_create`; it is invalid afterwards.
#[no_mangle]
pub unsafe extern "C" fn audio_destroy(handle: RecorderHandle) {
    ffi::destroy::<WasapiNegotiator>(handle)
}

/// # Safety
/// `handle` must be null or come from `audio_create`.
#[no_mangle]
pub unsafe extern "C" fn audio_is_running(handle: RecorderHandle) -> bool {
    ffi::is_running::<WasapiNegotiator>(handle)
}

/// # Safety
/// `devices` and `count` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn audio_list_devices(devices: *mut *mut FfiDeviceInfo, count: *mut i32) -> i32 {
    let listing = DeviceEnumerator::new().and_then(|e| e.list_devices());
    ffi::write_device_list(listing, devices, count)
}

/// # Safety
/// `devices` must come from `audio_list_devices` with its `count`.
#[no_mangle]
pub unsafe extern "C" fn audio_free_device_list(devices: *mut FfiDeviceInfo, count: i32) {
    ffi::free_device_list(devices, count)
}

/// Default capture endpoint id, or null. Free with `audio_free_string`.
#[no_mangle]
pub extern "C" fn audio_get_default_input_device() -> *mut c_char {
    ffi::default_device_string(DeviceEnumerator::new().and_then(|e| e.default_input_device_id()))
}

/// Default render endpoint id, or null. Free with `audio_free_string`.
#[no_mangle]
pub extern "C" fn audio_get_default_output_device() -> *mut c_char {
    ffi::default_device_string(DeviceEnumerator::new().and_then(|e| e.default_output_device_id()))
}

/// # Safety
/// `value` must be null or a string returned by this library.
#[no_mangle]
pub unsafe extern "C" fn audio_free_string(value: *mut c_char) {
    ffi::free_string(value)
}

/// 0 = unknown, 1 = denied, 2 = authorized.
#[no_mangle]
pub extern "C" fn audio_system_permission_status() -> i32 {
    WindowsPermissions.system_audio_status().code()
}

/// # Safety
/// `callback`, if set, must be callable with `context`.
#[no_mangle]
pub unsafe extern "C" fn audio_system_permission_request(callback: PermissionCallback, context: *mut c_void) {
    ffi::complete_permission_request(WindowsPermissions.system_audio_status(), callback, context)
}

#[no_mangle]
pub extern "C" fn audio_system_permission_available() -> bool {
    WindowsPermissions.system_audio_available()
}

#[no_mangle]
pub extern "C" fn audio_open_system_settings() -> bool {
    WindowsPermissions.open_system_settings()
}

/// 0 = unknown, 1 = denied, 2 = authorized.
#[no_mangle]
pub extern "C" fn audio_mic_permission_status() -> i32 {
    WindowsPermissions.microphone_status().code()
}

/// # Safety
/// `callback`, if set, must be callable with `context`.
#[no_mangle]
pub unsafe extern "C" fn audio_mic_permission_request(callback: PermissionCallback, context: *mut c_void) {
    ffi::complete_permission_request(WindowsPermissions.microphone_status(), callback, context)
}
