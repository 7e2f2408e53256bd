// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! C ABI for the epfmu co-simulation slave.
//!
//! One shared library exports the FMI 1.0 (`fmi*`), FMI 2.0 (`fmi2*`) and
//! FMI 3.0 (`fmi3*`) co-simulation entry points. All three revisions drive the
//! same [`epfmu::Instance`]; the modules here only convert arguments, map
//! statuses and forward log records to the master's callback.
//!
//! # Handles
//!
//! An FMI component is a pointer to a [`HandleCell`] holding the
//! [`InstanceId`] of a registry slot. Cells are never released, so a handle
//! used after `FreeInstance` still resolves to an id whose generation no
//! longer matches, and the call fails with a stale-handle status instead of
//! touching freed memory.
//!
//! # Panics
//!
//! Every entry point runs inside [`guarded`]; a panic turns into a Fatal
//! status and never unwinds into the master.

#![allow(clippy::missing_safety_doc)]

pub mod fmi1;
pub mod fmi2;
pub mod fmi3;
pub mod logging;
mod sink;

use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, OnceLock};

use epfmu::{
    AdapterConfig, Error, Instance, InstanceContext, InstanceId, InstantiateRequest, LogSink,
    Registry, Result, Status,
};

pub use logging::EpfmuLogLevel;

// ============================================================================
// Registry
// ============================================================================

/// Live instance plus the name it was created with.
struct Slot {
    name: String,
    instance: Arc<Mutex<Instance>>,
}

fn registry() -> &'static Mutex<Registry<Slot>> {
    static REGISTRY: OnceLock<Mutex<Registry<Slot>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(Registry::new()))
}

/// Opaque cell behind every component pointer.
#[derive(Debug, Default)]
pub struct HandleCell {
    id: OnceLock<InstanceId>,
}

impl HandleCell {
    /// Registry id, once the instance was registered.
    pub fn id(&self) -> Option<InstanceId> {
        self.id.get().copied()
    }
}

/// Fresh, unregistered handle. Its address is valid for the process lifetime
/// unless passed to [`discard_handle`].
pub(crate) fn allocate_handle() -> *mut HandleCell {
    Box::into_raw(Box::new(HandleCell::default()))
}

/// Release a handle that was never registered.
///
/// # Safety
/// `handle` must come from [`allocate_handle`] and must not have been
/// returned to a master.
pub(crate) unsafe fn discard_handle(handle: *mut HandleCell) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Build an instance with the callback sink and store it under `handle`.
///
/// Returns `handle` on success and null on failure. Failures were already
/// reported through `sink`.
///
/// # Safety
/// `handle` must come from [`allocate_handle`].
pub(crate) unsafe fn instantiate_into(
    handle: *mut HandleCell,
    request: &InstantiateRequest<'_>,
    sink: Arc<dyn LogSink>,
) -> *mut HandleCell {
    {
        let reg = registry().lock().unwrap_or_else(|err| err.into_inner());
        if reg.iter().any(|(_, slot)| slot.name == request.name) {
            let err = Error::InvalidName(format!("{} (an instance with this name is live)", request.name));
            sink.log(&epfmu::LogRecord::from_error(request.name, &err));
            discard_handle(handle);
            return std::ptr::null_mut();
        }
    }

    let ctx = InstanceContext::native(AdapterConfig::from_env(), sink);
    let Ok(instance) = Instance::instantiate(request, ctx) else {
        discard_handle(handle);
        return std::ptr::null_mut();
    };

    let id = registry()
        .lock()
        .unwrap_or_else(|err| err.into_inner())
        .insert(Slot {
            name: request.name.to_string(),
            instance: Arc::new(Mutex::new(instance)),
        });
    let _ = (*handle).id.set(id);
    log::debug!("[epfmu-c] registered {} as {}", request.name, id);
    handle
}

/// Look the instance of `handle` up without holding the registry lock.
unsafe fn lookup(handle: *const HandleCell) -> Result<Arc<Mutex<Instance>>> {
    if handle.is_null() {
        return Err(Error::StaleHandle);
    }
    let id = (*handle).id().ok_or(Error::StaleHandle)?;
    registry()
        .lock()
        .unwrap_or_else(|err| err.into_inner())
        .get(id)
        .map(|slot| Arc::clone(&slot.instance))
        .ok_or(Error::StaleHandle)
}

/// Run `op` on the instance behind `handle`.
///
/// # Safety
/// `handle` must be null or a pointer returned by an instantiate function.
pub(crate) unsafe fn with_instance<F>(handle: *const HandleCell, operation: &str, op: F) -> Status
where
    F: FnOnce(&mut Instance) -> Status,
{
    let instance = match lookup(handle) {
        Ok(instance) => instance,
        Err(e) => {
            log::error!("[epfmu-c] {}: {}", operation, e);
            return e.status();
        }
    };
    guarded(operation, || {
        let mut guard = instance.lock().unwrap_or_else(|err| err.into_inner());
        op(&mut guard)
    })
}

/// Free the instance behind `handle` and empty its registry slot.
///
/// A handle that no longer resolves yields a warning.
///
/// # Safety
/// `handle` must be null or a pointer returned by an instantiate function.
pub(crate) unsafe fn free_instance(handle: *const HandleCell, operation: &str) -> Status {
    let instance = match lookup(handle) {
        Ok(instance) => instance,
        Err(_) => {
            log::warn!("[epfmu-c] {}: instance already freed", operation);
            return Status::Warning;
        }
    };
    let status = guarded(operation, || {
        let mut guard = instance.lock().unwrap_or_else(|err| err.into_inner());
        epfmu::status_of(&guard.free())
    });
    if let Some(id) = (*handle).id() {
        registry()
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .remove(id);
    }
    status
}

/// Catch a panic in `f` and report it as Fatal.
pub(crate) fn guarded<F>(operation: &str, f: F) -> Status
where
    F: FnOnce() -> Status,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(status) => status,
        Err(_) => {
            log::error!("[epfmu-c] {}: panic inside the adapter", operation);
            Status::Fatal
        }
    }
}

/// Number of live instances.
#[no_mangle]
pub extern "C" fn epfmu_instance_count() -> usize {
    registry()
        .lock()
        .unwrap_or_else(|err| err.into_inner())
        .len()
}

// ============================================================================
// Argument helpers
// ============================================================================

/// Borrow a C string; null and invalid UTF-8 become `None`.
///
/// # Safety
/// `ptr` must be null or a valid NUL-terminated string outliving `'a`.
pub(crate) unsafe fn opt_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

/// Borrow `len` elements; a null pointer is only accepted with `len == 0`.
///
/// # Safety
/// `ptr` must point to `len` readable elements when non-null.
pub(crate) unsafe fn slice<'a, T>(ptr: *const T, len: usize) -> Option<&'a [T]> {
    if len == 0 {
        Some(&[])
    } else if ptr.is_null() {
        None
    } else {
        Some(std::slice::from_raw_parts(ptr, len))
    }
}

/// Mutable counterpart of [`slice`].
///
/// # Safety
/// `ptr` must point to `len` writable elements when non-null.
pub(crate) unsafe fn slice_mut<'a, T>(ptr: *mut T, len: usize) -> Option<&'a mut [T]> {
    if len == 0 {
        Some(&mut [])
    } else if ptr.is_null() {
        None
    } else {
        Some(std::slice::from_raw_parts_mut(ptr, len))
    }
}

/// Log a null array argument and return Error.
pub(crate) fn null_argument(instance: &Instance, operation: &str) -> Status {
    log::error!("[epfmu-c] {}: {} got a null array", instance.name(), operation);
    Status::Error
}

// ============================================================================
// Version
// ============================================================================

/// Library version string.
///
/// # Safety
/// The returned pointer is valid for the lifetime of the process (static storage).
#[no_mangle]
pub unsafe extern "C" fn epfmu_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr().cast::<c_char>()
}

/// `"default"`, the platform string every revision reports.
pub(crate) const TYPES_PLATFORM: &[u8] = b"default\0";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handle_is_stale() {
        let status = unsafe { with_instance(std::ptr::null(), "probe", |_| Status::Ok) };
        assert_eq!(status, Status::Error);
    }

    #[test]
    fn test_unregistered_handle_is_stale() {
        let handle = allocate_handle();
        let status = unsafe { with_instance(handle, "probe", |_| Status::Ok) };
        assert_eq!(status, Status::Error);
        assert_eq!(unsafe { free_instance(handle, "probe") }, Status::Warning);
        unsafe { discard_handle(handle) };
    }

    #[test]
    fn test_guarded_catches_panic() {
        let status = guarded("probe", || panic!("boom"));
        assert_eq!(status, Status::Fatal);
    }

    #[test]
    fn test_slices() {
        let empty: Option<&[u32]> = unsafe { slice(std::ptr::null(), 0) };
        assert_eq!(empty, Some(&[][..]));
        let missing: Option<&[u32]> = unsafe { slice(std::ptr::null(), 2) };
        assert!(missing.is_none());
        let data = [1u32, 2];
        assert_eq!(unsafe { slice(data.as_ptr(), 2) }, Some(&data[..]));
    }

    #[test]
    fn test_version_string() {
        let version = unsafe { CStr::from_ptr(epfmu_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }
}
