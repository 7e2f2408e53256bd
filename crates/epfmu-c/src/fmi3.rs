// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! FMI 3.0 co-simulation entry points.
//!
//! Only `Float64` variables are exchanged. Event mode, early return and
//! intermediate updates are not available: instances created with
//! `eventModeUsed` or `earlyReturnAllowed` get a warning and run without them.

#![allow(non_snake_case)]

use std::os::raw::{c_char, c_int, c_uint, c_void};
use std::sync::Arc;

use epfmu::{
    FmiVersion, Instance, InstantiateRequest, LogRecord, LogSink, Status, VariableKind,
};

use crate::logging::ensure_default_logger;
use crate::sink::CallbackSink;
use crate::{
    allocate_handle, free_instance, guarded, instantiate_into, null_argument, opt_str, slice,
    slice_mut, with_instance, HandleCell,
};

pub type Fmi3Instance = *mut c_void;
pub type Fmi3InstanceEnvironment = *mut c_void;
pub type Fmi3FMUState = *mut c_void;
pub type Fmi3ValueReference = c_uint;
pub type Fmi3Float64 = f64;
pub type Fmi3Boolean = bool;
pub type Fmi3String = *const c_char;
pub type Fmi3Byte = u8;
pub type Fmi3Binary = *const Fmi3Byte;

/// Status returned by every FMI 3.0 function.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fmi3Status {
    Fmi3Ok = 0,
    Fmi3Warning = 1,
    Fmi3Discard = 2,
    Fmi3Error = 3,
    Fmi3Fatal = 4,
}

impl From<Status> for Fmi3Status {
    fn from(status: Status) -> Self {
        match status {
            Status::Ok => Fmi3Status::Fmi3Ok,
            Status::Warning | Status::Pending => Fmi3Status::Fmi3Warning,
            Status::Discard => Fmi3Status::Fmi3Discard,
            Status::Error => Fmi3Status::Fmi3Error,
            Status::Fatal => Fmi3Status::Fmi3Fatal,
        }
    }
}

pub type Fmi3LogMessageCallback =
    unsafe extern "C" fn(Fmi3InstanceEnvironment, c_int, Fmi3String, Fmi3String);

pub type Fmi3IntermediateUpdateCallback = unsafe extern "C" fn(
    Fmi3InstanceEnvironment,
    Fmi3Float64,
    Fmi3Boolean,
    Fmi3Boolean,
    Fmi3Boolean,
    Fmi3Boolean,
    *mut Fmi3Boolean,
    *mut Fmi3Float64,
);

fn handle(instance: Fmi3Instance) -> *const HandleCell {
    instance.cast::<HandleCell>().cast_const()
}

unsafe fn run<F>(instance: Fmi3Instance, operation: &str, op: F) -> Fmi3Status
where
    F: FnOnce(&mut Instance) -> Status,
{
    with_instance(handle(instance), operation, op).into()
}

unsafe fn unsupported(instance: Fmi3Instance, operation: &str) -> Fmi3Status {
    run(instance, operation, |inst| inst.unsupported(operation))
}

#[no_mangle]
pub extern "C" fn fmi3GetVersion() -> *const c_char {
    b"3.0\0".as_ptr().cast::<c_char>()
}

// ============================================================================
// Creation and destruction
// ============================================================================

/// Create a co-simulation instance from an unpacked FMU.
///
/// # Safety
/// - String arguments must be NULL or valid NUL-terminated strings.
/// - `log_message` must be NULL or a valid callback.
#[no_mangle]
pub unsafe extern "C" fn fmi3InstantiateCoSimulation(
    instance_name: Fmi3String,
    instantiation_token: Fmi3String,
    resource_path: Fmi3String,
    visible: Fmi3Boolean,
    logging_on: Fmi3Boolean,
    event_mode_used: Fmi3Boolean,
    early_return_allowed: Fmi3Boolean,
    _required_intermediate_variables: *const Fmi3ValueReference,
    n_required_intermediate_variables: usize,
    instance_environment: Fmi3InstanceEnvironment,
    log_message: Option<Fmi3LogMessageCallback>,
    _intermediate_update: Option<Fmi3IntermediateUpdateCallback>,
) -> Fmi3Instance {
    ensure_default_logger();

    let sink: Arc<dyn LogSink> = Arc::new(CallbackSink::fmi3(log_message, instance_environment));
    let name = opt_str(instance_name).unwrap_or_default();
    if event_mode_used || early_return_allowed || n_required_intermediate_variables > 0 {
        sink.log(&LogRecord::new(
            Status::Warning,
            name,
            "event mode, early return and intermediate updates are not supported",
        ));
    }

    let request = InstantiateRequest {
        name,
        token: opt_str(instantiation_token).unwrap_or_default(),
        resource_location: opt_str(resource_path).unwrap_or_default(),
        version: FmiVersion::V3,
        visible,
        logging_on,
    };

    let cell = allocate_handle();
    let mut created = std::ptr::null_mut();
    guarded("fmi3InstantiateCoSimulation", || {
        created = instantiate_into(cell, &request, sink);
        Status::Ok
    });
    created.cast::<c_void>()
}

/// Model exchange is not provided; always returns NULL.
///
/// # Safety
/// String arguments must be NULL or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn fmi3InstantiateModelExchange(
    instance_name: Fmi3String,
    _instantiation_token: Fmi3String,
    _resource_path: Fmi3String,
    _visible: Fmi3Boolean,
    _logging_on: Fmi3Boolean,
    instance_environment: Fmi3InstanceEnvironment,
    log_message: Option<Fmi3LogMessageCallback>,
) -> Fmi3Instance {
    ensure_default_logger();
    let sink = CallbackSink::fmi3(log_message, instance_environment);
    sink.log(&LogRecord::new(
        Status::Error,
        opt_str(instance_name).unwrap_or_default(),
        "fmi3InstantiateModelExchange: only co-simulation is supported",
    ));
    std::ptr::null_mut()
}

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3FreeInstance(instance: Fmi3Instance) {
    let _ = free_instance(handle(instance), "fmi3FreeInstance");
}

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3SetDebugLogging(
    instance: Fmi3Instance,
    logging_on: Fmi3Boolean,
    _n_categories: usize,
    _categories: *const Fmi3String,
) -> Fmi3Status {
    run(instance, "fmi3SetDebugLogging", |inst| inst.set_debug_logging(logging_on))
}

// ============================================================================
// Initialization
// ============================================================================

/// Store the experiment and start the simulation.
///
/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3EnterInitializationMode(
    instance: Fmi3Instance,
    tolerance_defined: Fmi3Boolean,
    tolerance: Fmi3Float64,
    start_time: Fmi3Float64,
    stop_time_defined: Fmi3Boolean,
    stop_time: Fmi3Float64,
) -> Fmi3Status {
    let tolerance = tolerance_defined.then_some(tolerance);
    run(instance, "fmi3EnterInitializationMode", |inst| {
        let setup = epfmu::status_of(&inst.setup_experiment(
            tolerance,
            start_time,
            stop_time,
            stop_time_defined,
        ));
        if setup >= Status::Error {
            return setup;
        }
        setup.max(epfmu::status_of(&inst.enter_initialization_mode()))
    })
}

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3ExitInitializationMode(instance: Fmi3Instance) -> Fmi3Status {
    run(instance, "fmi3ExitInitializationMode", |inst| {
        epfmu::status_of(&inst.exit_initialization_mode())
    })
}

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3Terminate(instance: Fmi3Instance) -> Fmi3Status {
    run(instance, "fmi3Terminate", |inst| epfmu::status_of(&inst.terminate()))
}

// ============================================================================
// Float64 access
// ============================================================================

/// # Safety
/// - `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
/// - `vr` must hold `nvr` elements and `values` must hold `n_values`.
#[no_mangle]
pub unsafe extern "C" fn fmi3SetFloat64(
    instance: Fmi3Instance,
    vr: *const Fmi3ValueReference,
    nvr: usize,
    values: *const Fmi3Float64,
    n_values: usize,
) -> Fmi3Status {
    run(instance, "fmi3SetFloat64", |inst| {
        match (slice(vr, nvr), slice(values, n_values)) {
            (Some(vr), Some(values)) => epfmu::status_of(&inst.set_real(vr, values)),
            _ => null_argument(inst, "fmi3SetFloat64"),
        }
    })
}

/// # Safety
/// - `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
/// - `vr` must hold `nvr` elements and `values` must have room for `n_values`.
#[no_mangle]
pub unsafe extern "C" fn fmi3GetFloat64(
    instance: Fmi3Instance,
    vr: *const Fmi3ValueReference,
    nvr: usize,
    values: *mut Fmi3Float64,
    n_values: usize,
) -> Fmi3Status {
    run(instance, "fmi3GetFloat64", |inst| {
        match (slice(vr, nvr), slice_mut(values, n_values)) {
            (Some(vr), Some(values)) => epfmu::status_of(&inst.get_real(vr, values)),
            _ => null_argument(inst, "fmi3GetFloat64"),
        }
    })
}

unsafe fn non_real(instance: Fmi3Instance, operation: &str, kind: VariableKind, nvr: usize) -> Fmi3Status {
    run(instance, operation, |inst| {
        epfmu::status_of(&inst.access_non_real(kind, nvr))
    })
}

macro_rules! non_real_accessors {
    ($($get:ident / $set:ident: $ty:ty => $kind:expr;)*) => {
        $(
            /// Unsupported type; Error unless `nvr == 0`.
            ///
            /// # Safety
            /// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
            #[no_mangle]
            pub unsafe extern "C" fn $get(
                instance: Fmi3Instance,
                _vr: *const Fmi3ValueReference,
                nvr: usize,
                _values: *mut $ty,
                _n_values: usize,
            ) -> Fmi3Status {
                non_real(instance, stringify!($get), $kind, nvr)
            }

            /// Unsupported type; Error unless `nvr == 0`.
            ///
            /// # Safety
            /// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
            #[no_mangle]
            pub unsafe extern "C" fn $set(
                instance: Fmi3Instance,
                _vr: *const Fmi3ValueReference,
                nvr: usize,
                _values: *const $ty,
                _n_values: usize,
            ) -> Fmi3Status {
                non_real(instance, stringify!($set), $kind, nvr)
            }
        )*
    };
}

non_real_accessors! {
    fmi3GetFloat32 / fmi3SetFloat32: f32 => VariableKind::Other;
    fmi3GetInt8 / fmi3SetInt8: i8 => VariableKind::Integer;
    fmi3GetUInt8 / fmi3SetUInt8: u8 => VariableKind::Integer;
    fmi3GetInt16 / fmi3SetInt16: i16 => VariableKind::Integer;
    fmi3GetUInt16 / fmi3SetUInt16: u16 => VariableKind::Integer;
    fmi3GetInt32 / fmi3SetInt32: i32 => VariableKind::Integer;
    fmi3GetUInt32 / fmi3SetUInt32: u32 => VariableKind::Integer;
    fmi3GetInt64 / fmi3SetInt64: i64 => VariableKind::Integer;
    fmi3GetUInt64 / fmi3SetUInt64: u64 => VariableKind::Integer;
    fmi3GetBoolean / fmi3SetBoolean: Fmi3Boolean => VariableKind::Boolean;
    fmi3GetString / fmi3SetString: Fmi3String => VariableKind::String;
}

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3GetBinary(
    instance: Fmi3Instance,
    _vr: *const Fmi3ValueReference,
    nvr: usize,
    _value_sizes: *mut usize,
    _values: *mut Fmi3Binary,
    _n_values: usize,
) -> Fmi3Status {
    non_real(instance, "fmi3GetBinary", VariableKind::Other, nvr)
}

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3SetBinary(
    instance: Fmi3Instance,
    _vr: *const Fmi3ValueReference,
    nvr: usize,
    _value_sizes: *const usize,
    _values: *const Fmi3Binary,
    _n_values: usize,
) -> Fmi3Status {
    non_real(instance, "fmi3SetBinary", VariableKind::Other, nvr)
}

// ============================================================================
// Stepping
// ============================================================================

/// Advance the simulation by one communication step.
///
/// On return the event and early-return flags are always false and
/// `last_successful_time` is the end of the requested step.
///
/// # Safety
/// - `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
/// - Output pointers must be NULL or writable.
#[no_mangle]
pub unsafe extern "C" fn fmi3DoStep(
    instance: Fmi3Instance,
    current_communication_point: Fmi3Float64,
    communication_step_size: Fmi3Float64,
    no_set_fmu_state_prior_to_current_point: Fmi3Boolean,
    event_handling_needed: *mut Fmi3Boolean,
    terminate_simulation: *mut Fmi3Boolean,
    early_return: *mut Fmi3Boolean,
    last_successful_time: *mut Fmi3Float64,
) -> Fmi3Status {
    if let Some(flag) = event_handling_needed.as_mut() {
        *flag = false;
    }
    if let Some(flag) = terminate_simulation.as_mut() {
        *flag = false;
    }
    if let Some(flag) = early_return.as_mut() {
        *flag = false;
    }
    if let Some(time) = last_successful_time.as_mut() {
        *time = current_communication_point + communication_step_size;
    }
    run(instance, "fmi3DoStep", |inst| {
        epfmu::status_of(&inst.do_step(
            current_communication_point,
            communication_step_size,
            no_set_fmu_state_prior_to_current_point,
        ))
    })
}

// ============================================================================
// Unsupported capabilities
// ============================================================================

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3Reset(instance: Fmi3Instance) -> Fmi3Status {
    unsupported(instance, "fmi3Reset")
}

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3EnterEventMode(instance: Fmi3Instance) -> Fmi3Status {
    unsupported(instance, "fmi3EnterEventMode")
}

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3EnterStepMode(instance: Fmi3Instance) -> Fmi3Status {
    unsupported(instance, "fmi3EnterStepMode")
}

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3EnterConfigurationMode(instance: Fmi3Instance) -> Fmi3Status {
    unsupported(instance, "fmi3EnterConfigurationMode")
}

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3ExitConfigurationMode(instance: Fmi3Instance) -> Fmi3Status {
    unsupported(instance, "fmi3ExitConfigurationMode")
}

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3UpdateDiscreteStates(
    instance: Fmi3Instance,
    _discrete_states_need_update: *mut Fmi3Boolean,
    _terminate_simulation: *mut Fmi3Boolean,
    _nominals_changed: *mut Fmi3Boolean,
    _values_changed: *mut Fmi3Boolean,
    _next_event_time_defined: *mut Fmi3Boolean,
    _next_event_time: *mut Fmi3Float64,
) -> Fmi3Status {
    unsupported(instance, "fmi3UpdateDiscreteStates")
}

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3GetOutputDerivatives(
    instance: Fmi3Instance,
    _vr: *const Fmi3ValueReference,
    _nvr: usize,
    _orders: *const i32,
    _values: *mut Fmi3Float64,
    _n_values: usize,
) -> Fmi3Status {
    unsupported(instance, "fmi3GetOutputDerivatives")
}

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3GetDirectionalDerivative(
    instance: Fmi3Instance,
    _unknowns: *const Fmi3ValueReference,
    _n_unknowns: usize,
    _knowns: *const Fmi3ValueReference,
    _n_knowns: usize,
    _seed: *const Fmi3Float64,
    _n_seed: usize,
    _sensitivity: *mut Fmi3Float64,
    _n_sensitivity: usize,
) -> Fmi3Status {
    unsupported(instance, "fmi3GetDirectionalDerivative")
}

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3GetAdjointDerivative(
    instance: Fmi3Instance,
    _unknowns: *const Fmi3ValueReference,
    _n_unknowns: usize,
    _knowns: *const Fmi3ValueReference,
    _n_knowns: usize,
    _seed: *const Fmi3Float64,
    _n_seed: usize,
    _sensitivity: *mut Fmi3Float64,
    _n_sensitivity: usize,
) -> Fmi3Status {
    unsupported(instance, "fmi3GetAdjointDerivative")
}

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3GetFMUState(instance: Fmi3Instance, _state: *mut Fmi3FMUState) -> Fmi3Status {
    unsupported(instance, "fmi3GetFMUState")
}

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3SetFMUState(instance: Fmi3Instance, _state: Fmi3FMUState) -> Fmi3Status {
    unsupported(instance, "fmi3SetFMUState")
}

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3FreeFMUState(instance: Fmi3Instance, _state: *mut Fmi3FMUState) -> Fmi3Status {
    unsupported(instance, "fmi3FreeFMUState")
}

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3SerializedFMUStateSize(
    instance: Fmi3Instance,
    _state: Fmi3FMUState,
    _size: *mut usize,
) -> Fmi3Status {
    unsupported(instance, "fmi3SerializedFMUStateSize")
}

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3SerializeFMUState(
    instance: Fmi3Instance,
    _state: Fmi3FMUState,
    _serialized: *mut Fmi3Byte,
    _size: usize,
) -> Fmi3Status {
    unsupported(instance, "fmi3SerializeFMUState")
}

/// # Safety
/// `instance` must be NULL or an instance returned by [`fmi3InstantiateCoSimulation`].
#[no_mangle]
pub unsafe extern "C" fn fmi3DeserializeFMUState(
    instance: Fmi3Instance,
    _serialized: *const Fmi3Byte,
    _size: usize,
    _state: *mut Fmi3FMUState,
) -> Fmi3Status {
    unsupported(instance, "fmi3DeserializeFMUState")
}
