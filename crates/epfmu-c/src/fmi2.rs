// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! FMI 2.0 co-simulation entry points.

#![allow(non_snake_case)]

use std::os::raw::{c_char, c_int, c_uint, c_void};
use std::sync::Arc;

use epfmu::{FmiVersion, InstantiateRequest, LogRecord, LogSink, Status, VariableKind};

use crate::logging::ensure_default_logger;
use crate::sink::CallbackSink;
use crate::{
    allocate_handle, free_instance, guarded, instantiate_into, null_argument, opt_str, slice,
    slice_mut, with_instance, HandleCell, TYPES_PLATFORM,
};

pub type Fmi2Component = *mut c_void;
pub type Fmi2ComponentEnvironment = *mut c_void;
pub type Fmi2FMUstate = *mut c_void;
pub type Fmi2ValueReference = c_uint;
pub type Fmi2Real = f64;
pub type Fmi2Integer = c_int;
pub type Fmi2Boolean = c_int;
pub type Fmi2String = *const c_char;
pub type Fmi2Byte = c_char;

pub const FMI2_TRUE: Fmi2Boolean = 1;
pub const FMI2_FALSE: Fmi2Boolean = 0;

/// Status returned by every FMI 2.0 function.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fmi2Status {
    Fmi2Ok = 0,
    Fmi2Warning = 1,
    Fmi2Discard = 2,
    Fmi2Error = 3,
    Fmi2Fatal = 4,
    Fmi2Pending = 5,
}

impl From<Status> for Fmi2Status {
    fn from(status: Status) -> Self {
        match status {
            Status::Ok => Fmi2Status::Fmi2Ok,
            Status::Warning => Fmi2Status::Fmi2Warning,
            Status::Discard => Fmi2Status::Fmi2Discard,
            Status::Error => Fmi2Status::Fmi2Error,
            Status::Fatal => Fmi2Status::Fmi2Fatal,
            Status::Pending => Fmi2Status::Fmi2Pending,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fmi2Type {
    Fmi2ModelExchange = 0,
    Fmi2CoSimulation = 1,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fmi2StatusKind {
    Fmi2DoStepStatus = 0,
    Fmi2PendingStatus = 1,
    Fmi2LastSuccessfulTime = 2,
    Fmi2Terminated = 3,
}

pub type Fmi2CallbackLogger = unsafe extern "C" fn(
    Fmi2ComponentEnvironment,
    Fmi2String,
    c_int,
    Fmi2String,
    Fmi2String,
    ...
);

/// Callbacks a master passes to [`fmi2Instantiate`].
#[repr(C)]
pub struct Fmi2CallbackFunctions {
    pub logger: Option<Fmi2CallbackLogger>,
    pub allocate_memory: Option<unsafe extern "C" fn(usize, usize) -> *mut c_void>,
    pub free_memory: Option<unsafe extern "C" fn(*mut c_void)>,
    pub step_finished: Option<unsafe extern "C" fn(Fmi2ComponentEnvironment, c_int)>,
    pub component_environment: Fmi2ComponentEnvironment,
}

fn handle(c: Fmi2Component) -> *const HandleCell {
    c.cast::<HandleCell>().cast_const()
}

unsafe fn run<F>(c: Fmi2Component, operation: &str, op: F) -> Fmi2Status
where
    F: FnOnce(&mut epfmu::Instance) -> Status,
{
    with_instance(handle(c), operation, op).into()
}

unsafe fn unsupported(c: Fmi2Component, operation: &str) -> Fmi2Status {
    run(c, operation, |instance| instance.unsupported(operation))
}

// ============================================================================
// Inquiry
// ============================================================================

#[no_mangle]
pub extern "C" fn fmi2GetTypesPlatform() -> *const c_char {
    TYPES_PLATFORM.as_ptr().cast::<c_char>()
}

#[no_mangle]
pub extern "C" fn fmi2GetVersion() -> *const c_char {
    b"2.0\0".as_ptr().cast::<c_char>()
}

// ============================================================================
// Creation and destruction
// ============================================================================

/// Create an instance from an unpacked FMU.
///
/// Returns NULL when instantiation fails; the reason goes to the logger.
///
/// # Safety
/// - String arguments must be NULL or valid NUL-terminated strings.
/// - `functions` must be NULL or point to a valid callback struct.
#[no_mangle]
pub unsafe extern "C" fn fmi2Instantiate(
    instance_name: Fmi2String,
    fmu_type: c_int,
    fmu_guid: Fmi2String,
    fmu_resource_location: Fmi2String,
    functions: *const Fmi2CallbackFunctions,
    visible: Fmi2Boolean,
    logging_on: Fmi2Boolean,
) -> Fmi2Component {
    ensure_default_logger();

    let (logger, environment) = match functions.as_ref() {
        Some(f) => (f.logger, f.component_environment),
        None => (None, std::ptr::null_mut()),
    };
    let sink: Arc<dyn LogSink> = Arc::new(CallbackSink::fmi2(logger, environment));
    let name = opt_str(instance_name).unwrap_or_default();

    if fmu_type != Fmi2Type::Fmi2CoSimulation as c_int {
        sink.log(&LogRecord::new(
            Status::Error,
            name,
            "fmi2Instantiate: only co-simulation is supported",
        ));
        return std::ptr::null_mut();
    }

    let request = InstantiateRequest {
        name,
        token: opt_str(fmu_guid).unwrap_or_default(),
        resource_location: opt_str(fmu_resource_location).unwrap_or_default(),
        version: FmiVersion::V2,
        visible: visible != FMI2_FALSE,
        logging_on: logging_on != FMI2_FALSE,
    };

    let cell = allocate_handle();
    let mut created = std::ptr::null_mut();
    guarded("fmi2Instantiate", || {
        created = instantiate_into(cell, &request, sink);
        Status::Ok
    });
    created.cast::<c_void>()
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2FreeInstance(c: Fmi2Component) {
    let _ = free_instance(handle(c), "fmi2FreeInstance");
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2SetDebugLogging(
    c: Fmi2Component,
    logging_on: Fmi2Boolean,
    _n_categories: usize,
    _categories: *const Fmi2String,
) -> Fmi2Status {
    run(c, "fmi2SetDebugLogging", |instance| {
        instance.set_debug_logging(logging_on != FMI2_FALSE)
    })
}

// ============================================================================
// Initialization
// ============================================================================

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2SetupExperiment(
    c: Fmi2Component,
    tolerance_defined: Fmi2Boolean,
    tolerance: Fmi2Real,
    start_time: Fmi2Real,
    stop_time_defined: Fmi2Boolean,
    stop_time: Fmi2Real,
) -> Fmi2Status {
    let tolerance = (tolerance_defined != FMI2_FALSE).then_some(tolerance);
    run(c, "fmi2SetupExperiment", |instance| {
        epfmu::status_of(&instance.setup_experiment(
            tolerance,
            start_time,
            stop_time,
            stop_time_defined != FMI2_FALSE,
        ))
    })
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2EnterInitializationMode(c: Fmi2Component) -> Fmi2Status {
    run(c, "fmi2EnterInitializationMode", |instance| {
        epfmu::status_of(&instance.enter_initialization_mode())
    })
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2ExitInitializationMode(c: Fmi2Component) -> Fmi2Status {
    run(c, "fmi2ExitInitializationMode", |instance| {
        epfmu::status_of(&instance.exit_initialization_mode())
    })
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2Terminate(c: Fmi2Component) -> Fmi2Status {
    run(c, "fmi2Terminate", |instance| {
        epfmu::status_of(&instance.terminate())
    })
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2Reset(c: Fmi2Component) -> Fmi2Status {
    unsupported(c, "fmi2Reset")
}

// ============================================================================
// Variable access
// ============================================================================

/// # Safety
/// - `c` must be NULL or a component returned by [`fmi2Instantiate`].
/// - `vr` and `value` must each hold `nvr` elements.
#[no_mangle]
pub unsafe extern "C" fn fmi2SetReal(
    c: Fmi2Component,
    vr: *const Fmi2ValueReference,
    nvr: usize,
    value: *const Fmi2Real,
) -> Fmi2Status {
    run(c, "fmi2SetReal", |instance| {
        match (slice(vr, nvr), slice(value, nvr)) {
            (Some(vr), Some(value)) => epfmu::status_of(&instance.set_real(vr, value)),
            _ => null_argument(instance, "fmi2SetReal"),
        }
    })
}

/// # Safety
/// - `c` must be NULL or a component returned by [`fmi2Instantiate`].
/// - `vr` must hold `nvr` elements and `value` must have room for `nvr`.
#[no_mangle]
pub unsafe extern "C" fn fmi2GetReal(
    c: Fmi2Component,
    vr: *const Fmi2ValueReference,
    nvr: usize,
    value: *mut Fmi2Real,
) -> Fmi2Status {
    run(c, "fmi2GetReal", |instance| {
        match (slice(vr, nvr), slice_mut(value, nvr)) {
            (Some(vr), Some(value)) => epfmu::status_of(&instance.get_real(vr, value)),
            _ => null_argument(instance, "fmi2GetReal"),
        }
    })
}

unsafe fn non_real(c: Fmi2Component, operation: &str, kind: VariableKind, nvr: usize) -> Fmi2Status {
    run(c, operation, |instance| {
        epfmu::status_of(&instance.access_non_real(kind, nvr))
    })
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2SetInteger(
    c: Fmi2Component,
    _vr: *const Fmi2ValueReference,
    nvr: usize,
    _value: *const Fmi2Integer,
) -> Fmi2Status {
    non_real(c, "fmi2SetInteger", VariableKind::Integer, nvr)
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2GetInteger(
    c: Fmi2Component,
    _vr: *const Fmi2ValueReference,
    nvr: usize,
    _value: *mut Fmi2Integer,
) -> Fmi2Status {
    non_real(c, "fmi2GetInteger", VariableKind::Integer, nvr)
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2SetBoolean(
    c: Fmi2Component,
    _vr: *const Fmi2ValueReference,
    nvr: usize,
    _value: *const Fmi2Boolean,
) -> Fmi2Status {
    non_real(c, "fmi2SetBoolean", VariableKind::Boolean, nvr)
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2GetBoolean(
    c: Fmi2Component,
    _vr: *const Fmi2ValueReference,
    nvr: usize,
    _value: *mut Fmi2Boolean,
) -> Fmi2Status {
    non_real(c, "fmi2GetBoolean", VariableKind::Boolean, nvr)
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2SetString(
    c: Fmi2Component,
    _vr: *const Fmi2ValueReference,
    nvr: usize,
    _value: *const Fmi2String,
) -> Fmi2Status {
    non_real(c, "fmi2SetString", VariableKind::String, nvr)
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2GetString(
    c: Fmi2Component,
    _vr: *const Fmi2ValueReference,
    nvr: usize,
    _value: *mut Fmi2String,
) -> Fmi2Status {
    non_real(c, "fmi2GetString", VariableKind::String, nvr)
}

// ============================================================================
// Stepping
// ============================================================================

/// Advance the simulation by one communication step.
///
/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2DoStep(
    c: Fmi2Component,
    current_communication_point: Fmi2Real,
    communication_step_size: Fmi2Real,
    no_set_fmu_state_prior_to_current_point: Fmi2Boolean,
) -> Fmi2Status {
    run(c, "fmi2DoStep", |instance| {
        epfmu::status_of(&instance.do_step(
            current_communication_point,
            communication_step_size,
            no_set_fmu_state_prior_to_current_point != FMI2_FALSE,
        ))
    })
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2CancelStep(c: Fmi2Component) -> Fmi2Status {
    unsupported(c, "fmi2CancelStep")
}

// ============================================================================
// Unsupported capabilities
// ============================================================================

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2SetRealInputDerivatives(
    c: Fmi2Component,
    _vr: *const Fmi2ValueReference,
    _nvr: usize,
    _order: *const Fmi2Integer,
    _value: *const Fmi2Real,
) -> Fmi2Status {
    unsupported(c, "fmi2SetRealInputDerivatives")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2GetRealOutputDerivatives(
    c: Fmi2Component,
    _vr: *const Fmi2ValueReference,
    _nvr: usize,
    _order: *const Fmi2Integer,
    _value: *mut Fmi2Real,
) -> Fmi2Status {
    unsupported(c, "fmi2GetRealOutputDerivatives")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2GetDirectionalDerivative(
    c: Fmi2Component,
    _v_unknown_ref: *const Fmi2ValueReference,
    _n_unknown: usize,
    _v_known_ref: *const Fmi2ValueReference,
    _n_known: usize,
    _dv_known: *const Fmi2Real,
    _dv_unknown: *mut Fmi2Real,
) -> Fmi2Status {
    unsupported(c, "fmi2GetDirectionalDerivative")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2GetFMUstate(c: Fmi2Component, _state: *mut Fmi2FMUstate) -> Fmi2Status {
    unsupported(c, "fmi2GetFMUstate")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2SetFMUstate(c: Fmi2Component, _state: Fmi2FMUstate) -> Fmi2Status {
    unsupported(c, "fmi2SetFMUstate")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2FreeFMUstate(c: Fmi2Component, _state: *mut Fmi2FMUstate) -> Fmi2Status {
    unsupported(c, "fmi2FreeFMUstate")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2SerializedFMUstateSize(
    c: Fmi2Component,
    _state: Fmi2FMUstate,
    _size: *mut usize,
) -> Fmi2Status {
    unsupported(c, "fmi2SerializedFMUstateSize")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2SerializeFMUstate(
    c: Fmi2Component,
    _state: Fmi2FMUstate,
    _serialized: *mut Fmi2Byte,
    _size: usize,
) -> Fmi2Status {
    unsupported(c, "fmi2SerializeFMUstate")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2DeSerializeFMUstate(
    c: Fmi2Component,
    _serialized: *const Fmi2Byte,
    _size: usize,
    _state: *mut Fmi2FMUstate,
) -> Fmi2Status {
    unsupported(c, "fmi2DeSerializeFMUstate")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2GetStatus(
    c: Fmi2Component,
    _kind: Fmi2StatusKind,
    _value: *mut c_int,
) -> Fmi2Status {
    unsupported(c, "fmi2GetStatus")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2GetRealStatus(
    c: Fmi2Component,
    _kind: Fmi2StatusKind,
    _value: *mut Fmi2Real,
) -> Fmi2Status {
    unsupported(c, "fmi2GetRealStatus")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2GetIntegerStatus(
    c: Fmi2Component,
    _kind: Fmi2StatusKind,
    _value: *mut Fmi2Integer,
) -> Fmi2Status {
    unsupported(c, "fmi2GetIntegerStatus")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2GetBooleanStatus(
    c: Fmi2Component,
    _kind: Fmi2StatusKind,
    _value: *mut Fmi2Boolean,
) -> Fmi2Status {
    unsupported(c, "fmi2GetBooleanStatus")
}

/// # Safety
/// `c` must be NULL or a component returned by [`fmi2Instantiate`].
#[no_mangle]
pub unsafe extern "C" fn fmi2GetStringStatus(
    c: Fmi2Component,
    _kind: Fmi2StatusKind,
    _value: *mut Fmi2String,
) -> Fmi2Status {
    unsupported(c, "fmi2GetStringStatus")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_status_values() {
        assert_eq!(Fmi2Status::from(Status::Ok) as c_int, 0);
        assert_eq!(Fmi2Status::from(Status::Warning) as c_int, 1);
        assert_eq!(Fmi2Status::from(Status::Error) as c_int, 3);
        assert_eq!(Fmi2Status::from(Status::Fatal) as c_int, 4);
    }

    #[test]
    fn test_inquiry_strings() {
        let platform = unsafe { CStr::from_ptr(fmi2GetTypesPlatform()) };
        let version = unsafe { CStr::from_ptr(fmi2GetVersion()) };
        assert_eq!(platform.to_str().unwrap(), "default");
        assert_eq!(version.to_str().unwrap(), "2.0");
    }

    #[test]
    fn test_null_component() {
        let status = unsafe { fmi2DoStep(std::ptr::null_mut(), 0.0, 900.0, FMI2_TRUE) };
        assert_eq!(status, Fmi2Status::Fmi2Error);
        unsafe { fmi2FreeInstance(std::ptr::null_mut()) };
    }
}
