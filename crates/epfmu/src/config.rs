// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Adapter constants and runtime configuration.
//!
//! - **Level 1 (Static)**: wire constants, value-reference offsets and the file
//!   names shared with the simulation peer. These are an external contract and
//!   must not drift.
//! - **Level 2 (Dynamic)**: [`AdapterConfig`], which executables to launch and
//!   where output folders live.

use std::path::PathBuf;

use serde::Deserialize;

// =======================================================================
// Wire protocol
// =======================================================================

/// Protocol version written into every outgoing message.
pub const PROTOCOL_VERSION: i32 = 2;

/// Peer protocol version that cannot split a message over several reads.
pub const LEGACY_PROTOCOL_VERSION: i32 = 1;

/// Number of bytes peeked to learn the header of the first message.
pub const HEADER_LENGTH: usize = 21600;

/// Width of one `%20.15e` double plus its separator.
pub const DOUBLE_FIELD_WIDTH: usize = 22;

/// Width reserved for the time stamp.
pub const TIME_FIELD_WIDTH: usize = 21;

/// Maximum bytes requested from the socket per read call.
pub const READ_CHUNK: usize = 8192;

/// Flag value of a data message.
pub const FLAG_DATA: i32 = 0;

/// Flag value announcing the end of the simulation.
pub const FLAG_TERMINATE: i32 = 1;

// =======================================================================
// Value references
// =======================================================================

/// Value reference of the first input variable.
///
/// Inputs are stored at `vr - INPUT_VR_OFFSET`.
pub const INPUT_VR_OFFSET: u32 = 1;

/// Value reference of the first output variable.
///
/// Outputs are stored at `vr - OUTPUT_VR_OFFSET`.
pub const OUTPUT_VR_OFFSET: u32 = 100_001;

// =======================================================================
// Lifecycle
// =======================================================================

/// Longest accepted instance name.
pub const MAX_INSTANCE_NAME_LEN: usize = 100;

/// Run windows must span whole days.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Seconds per hour, divided by the model's time steps per hour to get the step size.
pub const SECONDS_PER_HOUR: f64 = 3_600.0;

/// Tolerance when comparing communication points and step sizes.
pub const TIME_TOLERANCE: f64 = 1e-10;

/// Registry growth increment.
pub const REGISTRY_BLOCK: usize = 10;

/// Placeholder used when a log record carries no instance name or category.
pub const LOG_PLACEHOLDER: &str = "unknown";

// =======================================================================
// File names shared with the simulation and the preparation tool
// =======================================================================

/// Prefix of the per-instance output folder (`<cwd>/Output_EPExport_<name>`).
pub const OUTPUT_DIR_PREFIX: &str = "Output_EPExport_";
/// Folder holding the model inputs inside an unpacked FMU.
pub const RESOURCES_DIR: &str = "resources";
/// Model description at the root of an unpacked FMU.
pub const MODEL_DESCRIPTION_FILE: &str = "modelDescription.xml";
/// Variable mapping read by the simulation's external interface.
pub const VARIABLES_FILE: &str = "variables.cfg";
/// Discovery document naming the listening port and host.
pub const SOCKET_FILE: &str = "socket.cfg";
/// Time steps per hour written by the preparation tool.
pub const TIME_STEP_FILE: &str = "tstep.txt";
/// Model input rewritten by the preparation tool.
pub const RUN_INPUT_FILE: &str = "runinfile.idf";
/// Weather file copied by the preparation tool.
pub const RUN_WEATHER_FILE: &str = "runweafile.epw";
/// Command file used to launch the simulation on Windows.
pub const LAUNCH_SCRIPT_FILE: &str = "EP.bat";

/// Model input suffix.
pub const MODEL_INPUT_SUFFIX: &str = ".idf";
/// Weather file suffix.
pub const WEATHER_SUFFIX: &str = ".epw";
/// Input data dictionary suffix.
pub const DICTIONARY_SUFFIX: &str = ".idd";

/// Name of the preparation tool shipped in the FMU resources for this target.
#[cfg(target_os = "windows")]
pub const DEFAULT_PREP_TOOL: &str = "idf-to-fmu-export-prep-win.exe";
/// Name of the preparation tool shipped in the FMU resources for this target.
#[cfg(target_os = "macos")]
pub const DEFAULT_PREP_TOOL: &str = "idf-to-fmu-export-prep-darwin";
/// Name of the preparation tool shipped in the FMU resources for this target.
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const DEFAULT_PREP_TOOL: &str = "idf-to-fmu-export-prep-linux";

/// Simulation executable looked up on `PATH`.
pub const DEFAULT_SIMULATION_PROGRAM: &str = "energyplus";

// =======================================================================
// Runtime configuration
// =======================================================================

/// Runtime settings of the adapter.
///
/// The defaults reproduce the layout the simulation expects; only test rigs
/// and unusual installations need to touch them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Simulation executable (resolved through `PATH` when relative).
    pub simulation_program: String,

    /// Preparation tool file name inside the FMU resources folder.
    pub prep_tool: String,

    /// Folder that receives `Output_EPExport_<name>` directories.
    ///
    /// `None` uses the process working directory at instantiation time.
    pub output_root: Option<PathBuf>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            simulation_program: DEFAULT_SIMULATION_PROGRAM.to_string(),
            prep_tool: DEFAULT_PREP_TOOL.to_string(),
            output_root: None,
        }
    }
}

impl AdapterConfig {
    /// Defaults overridden by `EPFMU_ENERGYPLUS`, `EPFMU_PREP_TOOL` and `EPFMU_OUTPUT_ROOT`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(program) = non_empty_var("EPFMU_ENERGYPLUS") {
            config.simulation_program = program;
        }
        if let Some(tool) = non_empty_var("EPFMU_PREP_TOOL") {
            config.prep_tool = tool;
        }
        if let Some(root) = non_empty_var("EPFMU_OUTPUT_ROOT") {
            config.output_root = Some(PathBuf::from(root));
        }
        config
    }

    /// Parse a YAML document; missing keys keep their defaults.
    #[cfg(feature = "yaml-config")]
    pub fn from_yaml_str(yaml: &str) -> Result<Self, String> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| format!("invalid adapter config: {}", e))?;
        config.validate().map_err(str::to_string)?;
        Ok(config)
    }

    /// Set the simulation executable.
    #[must_use]
    pub fn with_simulation_program(mut self, program: impl Into<String>) -> Self {
        self.simulation_program = program.into();
        self
    }

    /// Set the preparation tool name.
    #[must_use]
    pub fn with_prep_tool(mut self, tool: impl Into<String>) -> Self {
        self.prep_tool = tool.into();
        self
    }

    /// Set the folder receiving output directories.
    #[must_use]
    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = Some(root.into());
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.simulation_program.trim().is_empty() {
            return Err("simulation_program must not be empty");
        }
        if self.prep_tool.trim().is_empty() {
            return Err("prep_tool must not be empty");
        }
        if self.prep_tool.contains(['/', '\\']) {
            return Err("prep_tool must be a file name inside the resources folder");
        }
        Ok(())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
