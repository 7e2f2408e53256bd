// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # epfmu - EnergyPlus co-simulation slave
//!
//! Runs an EnergyPlus model as an FMI co-simulation slave. The simulation is
//! started as a child process and exchanges one vector of doubles per step
//! with the adapter over a local TCP socket.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use epfmu::{Instance, InstanceContext, InstantiateRequest, FmiVersion, Result};
//!
//! fn main() -> Result<()> {
//!     let request = InstantiateRequest {
//!         name: "house",
//!         token: "{8c4e810f-3df3-4a00-8276-176fa3c9f000}",
//!         resource_location: "file:///tmp/House/resources",
//!         version: FmiVersion::V2,
//!         visible: false,
//!         logging_on: false,
//!     };
//!     let mut instance = Instance::instantiate(&request, InstanceContext::default())?;
//!     instance.setup_experiment(None, 0.0, 86_400.0, true)?;
//!     instance.enter_initialization_mode()?;
//!     instance.exit_initialization_mode()?;
//!
//!     let step = instance.step_size();
//!     let mut room = [0.0];
//!     let mut t = 0.0;
//!     while t < 86_400.0 {
//!         instance.set_real(&[1], &[21.0])?;
//!         instance.do_step(t, step, true)?;
//!         instance.get_real(&[100_001], &mut room)?;
//!         t += step;
//!     }
//!
//!     instance.terminate()?;
//!     instance.free()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |  C surfaces (epfmu-c: fmi1 / fmi2 / fmi3)  |  epfmu-run CLI  |
//! +--------------------------------------------------------------+
//! |  Instance: lifecycle, step checks, Set/Get real     registry |
//! +--------------------------------------------------------------+
//! |  transport (socket2, peek, framing)  |  codec (text vector)  |
//! +--------------------------------------------------------------+
//! |  platform (spawn, files, host)  |  prepare  |  model (XML)   |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Value references
//!
//! Inputs use references starting at 1, outputs at 100001; the simulation's
//! `variables.cfg` orders them the same way.

/// Vector codec for the wire line.
pub mod codec;
/// Constants and runtime configuration.
pub mod config;
/// Error taxonomy and status codes.
pub mod error;
/// Co-simulation instance and its lifecycle.
pub mod instance;
/// Resource location parsing and instance folders.
pub mod location;
/// Per-instance log sink.
pub mod logger;
/// `modelDescription.xml` parsing.
pub mod model;
/// Process, file and host capabilities.
pub mod platform;
/// Model-input preparation.
pub mod prepare;
/// Generational instance registry.
pub mod registry;
/// Socket transport to the simulation.
pub mod transport;

pub use config::AdapterConfig;
pub use error::{Error, Result, Severity, Status};
pub use instance::{
    Experiment, Instance, InstanceContext, InstantiateRequest, LifecycleState, Operation,
};
pub use logger::{LogFacadeSink, LogRecord, LogSink, MemorySink};
pub use model::{Causality, FmiVersion, ModelDescription, ModelVariable, VariableKind};
pub use platform::{NativePlatform, Platform, SimulationLaunch, SimulationProcess};
pub use prepare::{ExportPrepTool, PrepareRequest, PreparedRun, RunPreparer};
pub use registry::{InstanceId, Registry};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Map an operation result to the status a master receives.
pub fn status_of(result: &Result<Status>) -> Status {
    match result {
        Ok(status) => *status,
        Err(e) => e.status(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_of() {
        assert_eq!(status_of(&Ok(Status::Ok)), Status::Ok);
        assert_eq!(status_of(&Ok(Status::Warning)), Status::Warning);
        assert_eq!(status_of(&Err(Error::AlreadyTerminated)), Status::Warning);
        assert_eq!(status_of(&Err(Error::NoIOVariables)), Status::Error);
    }
}
