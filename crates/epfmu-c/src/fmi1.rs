// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! FMI 1.0 co-simulation entry points.
//!
//! FMI 1.0 has no separate setup or initialization mode:
//! [`fmiInitializeSlave`] runs setup, enter and exit in one call and stops at
//! the first failure.

#![allow(non_snake_case)]

use std::os::raw::{c_char, c_int, c_uint, c_void};
use std::sync::Arc;

use epfmu::{Error, FmiVersion, Instance, InstantiateRequest, LogSink, Status, VariableKind};

use crate::logging::ensure_default_logger;
use crate::sink::CallbackSink;
use crate::{
    allocate_handle, free_instance, guarded, instantiate_into, null_argument, opt_str, slice,
    slice_mut, with_instance, HandleCell, TYPES_PLATFORM,
};

pub type FmiComponent = *mut c_void;
pub type FmiValueReference = c_uint;
pub type FmiReal = f64;
pub type FmiInteger = c_int;
pub type FmiBoolean = c_char;
pub type FmiString = *const c_char;

pub const FMI_TRUE: FmiBoolean = 1;
pub const FMI_FALSE: FmiBoolean = 0;

/// Status returned by every FMI 1.0 function.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fmi1Status {
    FmiOk = 0,
    FmiWarning = 1,
    FmiDiscard = 2,
    FmiError = 3,
    FmiFatal = 4,
    FmiPending = 5,
}

impl From<Status> for Fmi1Status {
    fn from(status: Status) -> Self {
        match status {
            Status::Ok => Fmi1Status::FmiOk,
            Status::Warning => Fmi1Status::FmiWarning,
            Status::Discard => Fmi1Status::FmiDiscard,
            Status::Error => Fmi1Status::FmiError,
            Status::Fatal => Fmi1Status::FmiFatal,
            Status::Pending => Fmi1Status::FmiPending,
        }
    }
}

pub type Fmi1CallbackLogger =
    unsafe extern "C" fn(FmiComponent, FmiString, c_int, FmiString, FmiString, ...);

/// Callbacks passed by value to [`fmiInstantiateSlave`].
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Fmi1CallbackFunctions {
    pub logger: Option<Fmi1CallbackLogger>,
    pub allocate_memory: Option<unsafe extern "C" fn(usize, usize) -> *mut c_void>,
    pub free_memory: Option<unsafe extern "C" fn(*mut c_void)>,
    pub step_finished: Option<unsafe extern "C" fn(FmiComponent, c_int)>,
}

fn handle(c: FmiComponent) -> *const HandleCell {
    c.cast::<HandleCell>().cast_const()
}

unsafe fn run<F>(c: FmiComponent, operation: &str, op: F) -> Fmi1Status
where
    F: FnOnce(&mut Instance) -> Status,
{
    with_instance(handle(c), operation, op).into()
}

unsafe fn unsupported(c: FmiComponent, operation: &str) -> Fmi1Status {
    run(c, operation, |instance| instance.unsupported(operation))
}

#[no_mangle]
pub extern "C" fn fmiGetTypesPlatform() -> *const c_char {
    TYPES_PLATFORM.as_ptr().cast::<c_char>()
}

#[no_mangle]
pub extern "C" fn fmiGetVersion() -> *const c_char {
    b"1.0\0".as_ptr().cast::<c_char>()
}

/// Create a slave from an unpacked FMU.
///
/// `timeout` is logged but not enforced; `mimeType` and `interactive` are
/// logged only.
///
/// # Safety
/// String arguments must be NULL or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn fmiInstantiateSlave(
    instance_name: FmiString,
    fmu_guid: FmiString,
    fmu_location: FmiString,
    mime_type: FmiString,
    timeout: FmiReal,
    visible: FmiBoolean,
    interactive: FmiBoolean,
    functions: Fmi1CallbackFunctions,
    logging_on: FmiBoolean,
) -> FmiComponent {
    ensure_default_logger();

    let name = opt_str(instance_name).unwrap_or_default();
    log::info!(
        "[epfmu-c] fmiInstantiateSlave {}: mimeType={:?} timeout={} interactive={}",
        name,
        opt_str(mime_type).unwrap_or_default(),
        timeout,
        interactive != FMI_FALSE
    );

    let cell = allocate_handle();
    let sink: Arc<dyn LogSink> = Arc::new(CallbackSink::fmi1(functions.logger, cell.cast()));
    let request = InstantiateRequest {
        name,
        token: opt_str(fmu_guid).unwrap_or_default(),
        resource_location: opt_str(fmu_location).unwrap_or_default(),
        version: FmiVersion::V1,
        visible: visible != FMI_FALSE,
        logging_on: logging_on != FMI_FALSE,
    };

    let mut created = std::ptr::null_mut();
    guarded("fmiInstantiateSlave", || {
        created = instantiate_into(cell, &request, sink);
        Status::Ok
    });
    created.cast::<c_void>()
}

/// Set up the experiment, start the simulation and leave initialization.
///
/// # Safety
/// `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
#[no_mangle]
pub unsafe extern "C" fn fmiInitializeSlave(
    c: FmiComponent,
    t_start: FmiReal,
    stop_time_defined: FmiBoolean,
    t_stop: FmiReal,
) -> Fmi1Status {
    run(c, "fmiInitializeSlave", |instance| {
        initialize(instance, t_start, stop_time_defined != FMI_FALSE, t_stop)
    })
}

fn initialize(instance: &mut Instance, start: f64, stop_defined: bool, stop: f64) -> Status {
    let setup = epfmu::status_of(&instance.setup_experiment(None, start, stop, stop_defined));
    if setup >= Status::Error {
        return setup;
    }
    let enter = epfmu::status_of(&instance.enter_initialization_mode());
    if enter >= Status::Error {
        return enter;
    }
    let exit = epfmu::status_of(&instance.exit_initialization_mode());
    setup.max(enter).max(exit)
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
#[no_mangle]
pub unsafe extern "C" fn fmiTerminateSlave(c: FmiComponent) -> Fmi1Status {
    run(c, "fmiTerminateSlave", |instance| {
        epfmu::status_of(&instance.terminate())
    })
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
#[no_mangle]
pub unsafe extern "C" fn fmiResetSlave(c: FmiComponent) -> Fmi1Status {
    unsupported(c, "fmiResetSlave")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
#[no_mangle]
pub unsafe extern "C" fn fmiFreeSlaveInstance(c: FmiComponent) {
    let _ = free_instance(handle(c), "fmiFreeSlaveInstance");
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
#[no_mangle]
pub unsafe extern "C" fn fmiSetDebugLogging(c: FmiComponent, logging_on: FmiBoolean) -> Fmi1Status {
    run(c, "fmiSetDebugLogging", |instance| {
        instance.set_debug_logging(logging_on != FMI_FALSE)
    })
}

/// # Safety
/// - `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
/// - `vr` and `value` must each hold `nvr` elements.
#[no_mangle]
pub unsafe extern "C" fn fmiSetReal(
    c: FmiComponent,
    vr: *const FmiValueReference,
    nvr: usize,
    value: *const FmiReal,
) -> Fmi1Status {
    run(c, "fmiSetReal", |instance| {
        match (slice(vr, nvr), slice(value, nvr)) {
            (Some(vr), Some(value)) => epfmu::status_of(&instance.set_real(vr, value)),
            _ => null_argument(instance, "fmiSetReal"),
        }
    })
}

/// # Safety
/// - `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
/// - `vr` must hold `nvr` elements and `value` must have room for `nvr`.
#[no_mangle]
pub unsafe extern "C" fn fmiGetReal(
    c: FmiComponent,
    vr: *const FmiValueReference,
    nvr: usize,
    value: *mut FmiReal,
) -> Fmi1Status {
    run(c, "fmiGetReal", |instance| {
        match (slice(vr, nvr), slice_mut(value, nvr)) {
            (Some(vr), Some(value)) => epfmu::status_of(&instance.get_real(vr, value)),
            _ => null_argument(instance, "fmiGetReal"),
        }
    })
}

unsafe fn non_real(c: FmiComponent, operation: &str, kind: VariableKind, nvr: usize) -> Fmi1Status {
    run(c, operation, |instance| {
        epfmu::status_of(&instance.access_non_real(kind, nvr))
    })
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
#[no_mangle]
pub unsafe extern "C" fn fmiSetInteger(
    c: FmiComponent,
    _vr: *const FmiValueReference,
    nvr: usize,
    _value: *const FmiInteger,
) -> Fmi1Status {
    non_real(c, "fmiSetInteger", VariableKind::Integer, nvr)
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
#[no_mangle]
pub unsafe extern "C" fn fmiGetInteger(
    c: FmiComponent,
    _vr: *const FmiValueReference,
    nvr: usize,
    _value: *mut FmiInteger,
) -> Fmi1Status {
    non_real(c, "fmiGetInteger", VariableKind::Integer, nvr)
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
#[no_mangle]
pub unsafe extern "C" fn fmiSetBoolean(
    c: FmiComponent,
    _vr: *const FmiValueReference,
    nvr: usize,
    _value: *const FmiBoolean,
) -> Fmi1Status {
    non_real(c, "fmiSetBoolean", VariableKind::Boolean, nvr)
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
#[no_mangle]
pub unsafe extern "C" fn fmiGetBoolean(
    c: FmiComponent,
    _vr: *const FmiValueReference,
    nvr: usize,
    _value: *mut FmiBoolean,
) -> Fmi1Status {
    non_real(c, "fmiGetBoolean", VariableKind::Boolean, nvr)
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
#[no_mangle]
pub unsafe extern "C" fn fmiSetString(
    c: FmiComponent,
    _vr: *const FmiValueReference,
    nvr: usize,
    _value: *const FmiString,
) -> Fmi1Status {
    non_real(c, "fmiSetString", VariableKind::String, nvr)
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
#[no_mangle]
pub unsafe extern "C" fn fmiGetString(
    c: FmiComponent,
    _vr: *const FmiValueReference,
    nvr: usize,
    _value: *mut FmiString,
) -> Fmi1Status {
    non_real(c, "fmiGetString", VariableKind::String, nvr)
}

/// Advance the simulation by one communication step.
///
/// `new_step == false` asks to repeat the last step, which the simulation
/// cannot do; the call fails with Error.
///
/// # Safety
/// `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
#[no_mangle]
pub unsafe extern "C" fn fmiDoStep(
    c: FmiComponent,
    current_communication_point: FmiReal,
    communication_step_size: FmiReal,
    new_step: FmiBoolean,
) -> Fmi1Status {
    run(c, "fmiDoStep", |instance| {
        if new_step == FMI_FALSE {
            return instance.report(&Error::InvalidState(
                "fmiDoStep with newStep = false; steps cannot be repeated".to_string(),
            ));
        }
        epfmu::status_of(&instance.do_step(current_communication_point, communication_step_size, true))
    })
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
#[no_mangle]
pub unsafe extern "C" fn fmiCancelStep(c: FmiComponent) -> Fmi1Status {
    unsupported(c, "fmiCancelStep")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
#[no_mangle]
pub unsafe extern "C" fn fmiSetRealInputDerivatives(
    c: FmiComponent,
    _vr: *const FmiValueReference,
    _nvr: usize,
    _order: *const FmiInteger,
    _value: *const FmiReal,
) -> Fmi1Status {
    unsupported(c, "fmiSetRealInputDerivatives")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
#[no_mangle]
pub unsafe extern "C" fn fmiGetRealOutputDerivatives(
    c: FmiComponent,
    _vr: *const FmiValueReference,
    _nvr: usize,
    _order: *const FmiInteger,
    _value: *mut FmiReal,
) -> Fmi1Status {
    unsupported(c, "fmiGetRealOutputDerivatives")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
#[no_mangle]
pub unsafe extern "C" fn fmiGetStatus(c: FmiComponent, _kind: c_int, _value: *mut c_int) -> Fmi1Status {
    unsupported(c, "fmiGetStatus")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
#[no_mangle]
pub unsafe extern "C" fn fmiGetRealStatus(c: FmiComponent, _kind: c_int, _value: *mut FmiReal) -> Fmi1Status {
    unsupported(c, "fmiGetRealStatus")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
#[no_mangle]
pub unsafe extern "C" fn fmiGetIntegerStatus(
    c: FmiComponent,
    _kind: c_int,
    _value: *mut FmiInteger,
) -> Fmi1Status {
    unsupported(c, "fmiGetIntegerStatus")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
#[no_mangle]
pub unsafe extern "C" fn fmiGetBooleanStatus(
    c: FmiComponent,
    _kind: c_int,
    _value: *mut FmiBoolean,
) -> Fmi1Status {
    unsupported(c, "fmiGetBooleanStatus")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmiInstantiateSlave`].
#[no_mangle]
pub unsafe extern "C" fn fmiGetStringStatus(
    c: FmiComponent,
    _kind: c_int,
    _value: *mut FmiString,
) -> Fmi1Status {
    unsupported(c, "fmiGetStringStatus")
}
