// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Drives the exported FMI entry points through the paths that need no
// simulation installed: instantiation, setup, window validation, unsupported
// calls and handle release.

use std::ffi::{CStr, CString};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use epfmu_c::fmi1::{fmiInstantiateSlave, Fmi1CallbackFunctions, FMI_FALSE};
use epfmu_c::fmi2::*;
use epfmu_c::{epfmu_instance_count, epfmu_version};

const MODEL_DESCRIPTION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<fmiModelDescription fmiVersion="2.0" modelName="House" guid="T1">
  <CoSimulation modelIdentifier="House" needsExecutionTool="true"/>
  <ModelVariables>
    <ScalarVariable name="TSetHea" valueReference="1" causality="input"><Real start="20"/></ScalarVariable>
    <ScalarVariable name="TRoo" valueReference="100001" causality="output"><Real/></ScalarVariable>
  </ModelVariables>
</fmiModelDescription>
"#;

/// Every instance of this test binary writes below one shared output root.
fn output_root() -> &'static Path {
    static ROOT: OnceLock<tempfile::TempDir> = OnceLock::new();
    ROOT.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("EPFMU_OUTPUT_ROOT", dir.path());
        dir
    })
    .path()
}

fn unpacked_fmu() -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    let resources = root.path().join("resources");
    fs::create_dir(&resources).unwrap();
    fs::write(root.path().join("modelDescription.xml"), MODEL_DESCRIPTION).unwrap();
    fs::write(resources.join("variables.cfg"), "<BCVTB-variables/>\n").unwrap();
    fs::write(resources.join("House.idf"), "Version,9.6;\n").unwrap();
    root
}

fn instantiate(fmu: &Path, name: &str, guid: &str, fmu_type: Fmi2Type) -> Fmi2Component {
    output_root();
    let name = CString::new(name).unwrap();
    let guid = CString::new(guid).unwrap();
    let location = CString::new(format!("file://{}/resources", fmu.display())).unwrap();
    let functions = Fmi2CallbackFunctions {
        logger: None,
        allocate_memory: None,
        free_memory: None,
        step_finished: None,
        component_environment: std::ptr::null_mut(),
    };
    unsafe {
        fmi2Instantiate(
            name.as_ptr(),
            fmu_type as i32,
            guid.as_ptr(),
            location.as_ptr(),
            &functions,
            FMI2_FALSE,
            FMI2_FALSE,
        )
    }
}

#[test]
fn test_inquiry_strings() {
    unsafe {
        assert_eq!(CStr::from_ptr(fmi2GetVersion()).to_str().unwrap(), "2.0");
        assert_eq!(CStr::from_ptr(fmi2GetTypesPlatform()).to_str().unwrap(), "default");
        assert!(!CStr::from_ptr(epfmu_version()).to_bytes().is_empty());
    }
}

#[test]
fn test_window_rejected_then_terminate_and_free() {
    let fmu = unpacked_fmu();
    let c = instantiate(fmu.path(), "abi-window", "T1", Fmi2Type::Fmi2CoSimulation);
    assert!(!c.is_null());
    assert!(output_root().join("Output_EPExport_abi-window").join("variables.cfg").is_file());
    assert!(epfmu_instance_count() >= 1);

    unsafe {
        assert_eq!(fmi2SetupExperiment(c, FMI2_FALSE, 0.0, 0.0, FMI2_TRUE, 3000.0), Fmi2Status::Fmi2Ok);
        assert_eq!(fmi2EnterInitializationMode(c), Fmi2Status::Fmi2Error);
        assert_eq!(fmi2Terminate(c), Fmi2Status::Fmi2Ok);
        assert_eq!(fmi2Terminate(c), Fmi2Status::Fmi2Warning);
        fmi2FreeInstance(c);

        // the handle is stale now
        assert_eq!(fmi2DoStep(c, 0.0, 900.0, FMI2_TRUE), Fmi2Status::Fmi2Error);
        assert_eq!(fmi2Terminate(c), Fmi2Status::Fmi2Error);
        fmi2FreeInstance(c);
    }
}

#[test]
fn test_calls_out_of_order() {
    let fmu = unpacked_fmu();
    let c = instantiate(fmu.path(), "abi-setup", "T1", Fmi2Type::Fmi2CoSimulation);
    assert!(!c.is_null());
    unsafe {
        assert_eq!(fmi2SetupExperiment(c, FMI2_TRUE, 1e-6, 0.0, FMI2_TRUE, 86_400.0), Fmi2Status::Fmi2Warning);
        assert_eq!(fmi2ExitInitializationMode(c), Fmi2Status::Fmi2Error);
        assert_eq!(fmi2DoStep(c, 0.0, 900.0, FMI2_TRUE), Fmi2Status::Fmi2Error);
        fmi2FreeInstance(c);
    }
}

#[test]
fn test_unsupported_types_and_calls() {
    let fmu = unpacked_fmu();
    let c = instantiate(fmu.path(), "abi-types", "T1", Fmi2Type::Fmi2CoSimulation);
    assert!(!c.is_null());
    let vr = [1u32];
    let mut ints = [0i32];
    let mut bools = [0i32];

    unsafe {
        assert_eq!(fmi2SetInteger(c, vr.as_ptr(), 0, ints.as_ptr()), Fmi2Status::Fmi2Ok);
        assert_eq!(fmi2SetInteger(c, vr.as_ptr(), 1, ints.as_ptr()), Fmi2Status::Fmi2Error);
        assert_eq!(fmi2GetInteger(c, vr.as_ptr(), 1, ints.as_mut_ptr()), Fmi2Status::Fmi2Error);
        assert_eq!(fmi2GetBoolean(c, vr.as_ptr(), 1, bools.as_mut_ptr()), Fmi2Status::Fmi2Error);
        assert_eq!(fmi2SetString(c, vr.as_ptr(), 0, std::ptr::null()), Fmi2Status::Fmi2Ok);

        assert_eq!(fmi2Reset(c), Fmi2Status::Fmi2Warning);
        assert_eq!(fmi2CancelStep(c), Fmi2Status::Fmi2Warning);
        assert_eq!(fmi2SetDebugLogging(c, FMI2_TRUE, 0, std::ptr::null()), Fmi2Status::Fmi2Warning);
        let mut state: Fmi2FMUstate = std::ptr::null_mut();
        assert_eq!(fmi2GetFMUstate(c, &mut state), Fmi2Status::Fmi2Warning);
        let mut value = 0;
        assert_eq!(
            fmi2GetStatus(c, Fmi2StatusKind::Fmi2DoStepStatus, &mut value),
            Fmi2Status::Fmi2Warning
        );

        // reals are accepted but ignored before initialization
        let mut room = [-1.0];
        assert_eq!(fmi2SetReal(c, vr.as_ptr(), 1, [21.0].as_ptr()), Fmi2Status::Fmi2Ok);
        assert_eq!(fmi2GetReal(c, [100_001].as_ptr(), 1, room.as_mut_ptr()), Fmi2Status::Fmi2Ok);
        assert_eq!(room[0], -1.0);
        assert_eq!(fmi2SetReal(c, vr.as_ptr(), 1, std::ptr::null()), Fmi2Status::Fmi2Error);

        fmi2FreeInstance(c);
    }
}

#[test]
fn test_rejected_instantiations() {
    let fmu = unpacked_fmu();
    assert!(instantiate(fmu.path(), "abi-guid", "T2", Fmi2Type::Fmi2CoSimulation).is_null());
    assert!(instantiate(fmu.path(), "abi-me", "T1", Fmi2Type::Fmi2ModelExchange).is_null());
    assert!(instantiate(fmu.path(), "", "T1", Fmi2Type::Fmi2CoSimulation).is_null());

    // FMI 1.0 entry point on an FMI 2.0 model
    let location = CString::new(format!("file://{}/resources", fmu.path().display())).unwrap();
    let functions = Fmi1CallbackFunctions {
        logger: None,
        allocate_memory: None,
        free_memory: None,
        step_finished: None,
    };
    let c = unsafe {
        fmiInstantiateSlave(
            b"abi-v1\0".as_ptr().cast(),
            b"T1\0".as_ptr().cast(),
            location.as_ptr(),
            std::ptr::null(),
            0.0,
            FMI_FALSE,
            FMI_FALSE,
            functions,
            FMI_FALSE,
        )
    };
    assert!(c.is_null());
}

#[test]
fn test_duplicate_name_while_live() {
    let fmu = unpacked_fmu();
    let first = instantiate(fmu.path(), "abi-dup", "T1", Fmi2Type::Fmi2CoSimulation);
    assert!(!first.is_null());
    assert!(instantiate(fmu.path(), "abi-dup", "T1", Fmi2Type::Fmi2CoSimulation).is_null());

    unsafe { fmi2FreeInstance(first) };
    let second = instantiate(fmu.path(), "abi-dup", "T1", Fmi2Type::Fmi2CoSimulation);
    assert!(!second.is_null());
    assert_ne!(first, second);
    unsafe { fmi2FreeInstance(second) };
}
