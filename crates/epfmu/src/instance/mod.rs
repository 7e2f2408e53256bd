// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Co-simulation instance.
//!
//! An [`Instance`] owns everything one simulation run needs: its folders, the
//! parsed model description, the socket to the simulation and the child
//! process. Operations follow the lifecycle in [`state`]:
//!
//! ```text
//! instantiate -> setup_experiment -> enter_initialization_mode
//!     -> exit_initialization_mode -> (set_real, do_step, get_real)*
//!     -> terminate -> free
//! ```
//!
//! Every public operation reports its failure once through the instance
//! [`LogSink`] before returning it. Operations that succeed with a notice
//! return `Ok(Status::Warning)`.

pub mod state;
mod step;

pub use state::{LifecycleState, Operation};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::codec::WireMessage;
use crate::config::{
    AdapterConfig, DICTIONARY_SUFFIX, MAX_INSTANCE_NAME_LEN, MODEL_INPUT_SUFFIX,
    SECONDS_PER_DAY, SECONDS_PER_HOUR, SOCKET_FILE, WEATHER_SUFFIX,
};
use crate::error::{Error, Result, Status};
use crate::location::{resolve_location, InstancePaths};
use crate::logger::{LogFacadeSink, LogRecord, LogSink};
use crate::model::{Causality, FmiVersion, ModelDescription};
use crate::platform::{NativePlatform, Platform, SimulationLaunch, SimulationProcess};
use crate::prepare::{read_time_step, ExportPrepTool, PrepareRequest, RunPreparer};
use crate::transport::{Transport, TransportState};

use state::RunFlags;

// ============================================================================
// Collaborators
// ============================================================================

/// Services an instance is built with.
#[derive(Clone)]
pub struct InstanceContext {
    pub platform: Arc<dyn Platform>,
    pub preparer: Arc<dyn RunPreparer>,
    pub sink: Arc<dyn LogSink>,
    pub config: AdapterConfig,
}

impl InstanceContext {
    pub fn new(
        platform: Arc<dyn Platform>,
        preparer: Arc<dyn RunPreparer>,
        sink: Arc<dyn LogSink>,
        config: AdapterConfig,
    ) -> Self {
        Self {
            platform,
            preparer,
            sink,
            config,
        }
    }

    /// Native platform and the FMU's own preparation tool.
    pub fn native(config: AdapterConfig, sink: Arc<dyn LogSink>) -> Self {
        let preparer = Arc::new(ExportPrepTool::new(config.prep_tool.clone()));
        Self::new(Arc::new(NativePlatform::new()), preparer, sink, config)
    }
}

impl Default for InstanceContext {
    fn default() -> Self {
        Self::native(AdapterConfig::default(), Arc::new(LogFacadeSink))
    }
}

impl fmt::Debug for InstanceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Arguments of an instantiation.
#[derive(Debug, Clone, Copy)]
pub struct InstantiateRequest<'a> {
    pub name: &'a str,
    /// GUID (FMI 1/2) or instantiation token (FMI 3).
    pub token: &'a str,
    pub resource_location: &'a str,
    pub version: FmiVersion,
    pub visible: bool,
    pub logging_on: bool,
}

/// Experiment set up by the master.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Experiment {
    pub tolerance: Option<f64>,
    pub start: f64,
    pub stop: f64,
}

/// Simulation time bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct StepClock {
    /// Last accepted communication point.
    current: f64,
    /// Communication point expected by the next DoStep.
    next: f64,
    steps_per_hour: u32,
}

impl StepClock {
    fn step_size(&self) -> f64 {
        SECONDS_PER_HOUR / f64::from(self.steps_per_hour.max(1))
    }
}

// ============================================================================
// Instance
// ============================================================================

/// One co-simulation slave backed by a simulation process.
pub struct Instance {
    name: String,
    version: FmiVersion,
    model: ModelDescription,
    paths: InstancePaths,
    ctx: InstanceContext,
    state: LifecycleState,
    flags: RunFlags,
    experiment: Experiment,
    clock: StepClock,
    /// Value references of input variables, document order.
    input_refs: Vec<u32>,
    /// Value references of output variables, document order.
    output_refs: Vec<u32>,
    /// Indexed by `vr - INPUT_VR_OFFSET`.
    inputs: Vec<f64>,
    /// Indexed by `vr - OUTPUT_VR_OFFSET`.
    outputs: Vec<f64>,
    transport: Transport,
    process: Option<Box<dyn SimulationProcess>>,
    torn_down: bool,
    logging_on: bool,
}

impl Instance {
    /// Create an instance from an unpacked FMU.
    ///
    /// Prepares the output folder, copies the variable mapping into it and
    /// checks the model description against `request`.
    pub fn instantiate(request: &InstantiateRequest<'_>, ctx: InstanceContext) -> Result<Self> {
        let sink = Arc::clone(&ctx.sink);
        Self::try_instantiate(request, ctx).map_err(|e| {
            sink.log(&LogRecord::from_error(request.name, &e));
            e
        })
    }

    fn try_instantiate(request: &InstantiateRequest<'_>, ctx: InstanceContext) -> Result<Self> {
        let name = request.name;
        if name.is_empty() || name.chars().count() > MAX_INSTANCE_NAME_LEN {
            return Err(Error::InvalidName(name.to_string()));
        }
        if request.resource_location.trim().is_empty() {
            return Err(Error::InvalidLocation(String::new()));
        }
        let unzip_dir = resolve_location(ctx.platform.as_ref(), request.resource_location)?;

        let base_dir = match &ctx.config.output_root {
            Some(root) => root.clone(),
            None => std::env::current_dir().map_err(|source| Error::WorkingDirectory {
                path: PathBuf::from("."),
                source,
            })?,
        };
        let paths = InstancePaths::new(base_dir, name, unzip_dir);

        if let Some(e) = paths.create_output_dir()? {
            ctx.sink.log(&LogRecord::new(
                Status::Warning,
                name,
                format!("could not remove previous output folder {}: {}", paths.output_dir.display(), e),
            ));
        }
        paths.copy_variables_file()?;

        let model = ModelDescription::load(&paths.model_description)?;
        if FmiVersion::from_attribute(&model.fmi_version) != Some(request.version) {
            return Err(Error::VersionMismatch {
                expected: request.version.as_str().to_string(),
                found: model.fmi_version,
            });
        }
        if model.guid != request.token {
            return Err(Error::TokenMismatch {
                expected: model.guid,
                found: request.token.to_string(),
            });
        }

        if request.visible {
            ctx.sink.log(&LogRecord::new(
                Status::Warning,
                name,
                "visible is set but the simulation has no interactive mode",
            ));
        }
        if request.logging_on {
            ctx.sink.log(&LogRecord::new(
                Status::Warning,
                name,
                "loggingOn is set; the simulation keeps its own log files in the output folder",
            ));
        }

        let input_refs: Vec<u32> = model
            .variables_with(Causality::Input)
            .map(|v| v.value_reference)
            .collect();
        let output_refs: Vec<u32> = model
            .variables_with(Causality::Output)
            .map(|v| v.value_reference)
            .collect();

        log::info!(
            "[epfmu] instantiated '{}' (model {}, {} inputs, {} outputs) in {}",
            name,
            model.model_identifier,
            input_refs.len(),
            output_refs.len(),
            paths.output_dir.display()
        );

        Ok(Self {
            name: name.to_string(),
            version: request.version,
            inputs: vec![0.0; input_refs.len()],
            outputs: vec![0.0; output_refs.len()],
            input_refs,
            output_refs,
            model,
            paths,
            ctx,
            state: LifecycleState::Instantiated,
            flags: RunFlags::fresh(false),
            experiment: Experiment {
                tolerance: None,
                start: 0.0,
                stop: 0.0,
            },
            clock: StepClock::default(),
            transport: Transport::new(),
            process: None,
            torn_down: false,
            logging_on: request.logging_on,
        })
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> FmiVersion {
        self.version
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn model(&self) -> &ModelDescription {
        &self.model
    }

    pub fn paths(&self) -> &InstancePaths {
        &self.paths
    }

    pub fn experiment(&self) -> Experiment {
        self.experiment
    }

    /// Communication step size dictated by the model (0 before initialization).
    pub fn step_size(&self) -> f64 {
        if self.clock.steps_per_hour == 0 {
            0.0
        } else {
            self.clock.step_size()
        }
    }

    /// Communication point the next DoStep must use.
    pub fn next_communication_point(&self) -> f64 {
        if self.flags.first_step {
            self.experiment.start
        } else {
            self.clock.next
        }
    }

    /// Current input vector.
    pub fn inputs(&self) -> &[f64] {
        &self.inputs
    }

    /// Last received output vector.
    pub fn outputs(&self) -> &[f64] {
        &self.outputs
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    /// `true` once EnterInitialization has connected the simulation.
    pub fn is_initialized(&self) -> bool {
        self.flags.init_done
    }

    pub fn logging_on(&self) -> bool {
        self.logging_on
    }

    // ------------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------------

    fn reported<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.ctx.sink.log(&LogRecord::from_error(&self.name, e));
        }
        result
    }

    fn warn(&self, message: impl Into<String>) -> Status {
        self.ctx
            .sink
            .log(&LogRecord::new(Status::Warning, &self.name, message));
        Status::Warning
    }

    /// Report an error detected outside the instance, e.g. by a C shim.
    pub fn report(&self, error: &Error) -> Status {
        self.ctx.sink.log(&LogRecord::from_error(&self.name, error));
        error.status()
    }

    /// Log that `operation` has no effect and return a warning.
    pub fn unsupported(&self, operation: &str) -> Status {
        self.warn(format!("{} is not supported and has no effect", operation))
    }

    /// Record the master's debug logging request.
    pub fn set_debug_logging(&mut self, logging_on: bool) -> Status {
        self.logging_on = logging_on;
        self.warn("SetDebugLogging only records the logging hint; categories are ignored")
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Store the experiment window.
    ///
    /// The simulation always needs a stop time: `stop_defined == false` only
    /// produces a warning and `stop` is used anyway.
    pub fn setup_experiment(
        &mut self,
        tolerance: Option<f64>,
        start: f64,
        stop: f64,
        stop_defined: bool,
    ) -> Result<Status> {
        let result = self.state.check(Operation::SetupExperiment).map(|()| {
            let mut status = Status::Ok;
            if let Some(tolerance) = tolerance {
                status = self.warn(format!(
                    "tolerance {} is ignored; the simulation controls its own accuracy",
                    tolerance
                ));
            }
            if !stop_defined {
                status = self.warn(format!(
                    "stopTimeDefined is false; the run still stops at {}",
                    stop
                ));
            }
            self.experiment = Experiment {
                tolerance,
                start,
                stop,
            };
            self.flags.setup_done = true;
            log::debug!("[epfmu] {}: experiment [{}, {}]", self.name, start, stop);
            status
        });
        self.reported(result)
    }

    /// Prepare the run, start the simulation and wait for it to connect.
    pub fn enter_initialization_mode(&mut self) -> Result<Status> {
        let result = self.try_enter_initialization();
        if result.is_err() {
            // release a listener bound by the failed attempt
            self.transport = Transport::new();
        }
        self.reported(result)
    }

    fn try_enter_initialization(&mut self) -> Result<Status> {
        self.state.check(Operation::EnterInitialization)?;
        if !self.flags.setup_done {
            return Err(Error::SetupRequired);
        }
        self.flags = RunFlags::fresh(false);

        if self.input_refs.is_empty() && self.output_refs.is_empty() {
            return Err(Error::NoIOVariables);
        }

        let Experiment { start, stop, .. } = self.experiment;
        let span = stop - start;
        if span <= 0.0 || span % SECONDS_PER_DAY != 0.0 {
            return Err(Error::InvalidWindow { start, stop });
        }

        let mut status = Status::Ok;
        let model_input = self.require_input(MODEL_INPUT_SUFFIX)?;
        let weather = self.locate_input(WEATHER_SUFFIX)?;
        if weather.is_none() {
            status = self.warn(format!(
                "no weather file in {}; the run uses design days only",
                self.paths.resources_dir.display()
            ));
        }
        let dictionary = self.require_input(DICTIONARY_SUFFIX)?;

        let hostname = self.ctx.platform.host_name();
        self.transport.bind(&hostname)?;
        self.transport.publish(&self.paths.output_file(SOCKET_FILE))?;

        let prepared = self.ctx.preparer.prepare(&PrepareRequest {
            model_id: &self.model.model_identifier,
            resources_dir: &self.paths.resources_dir,
            output_dir: &self.paths.output_dir,
            model_input: &model_input,
            dictionary: &dictionary,
            weather: weather.as_deref(),
            start,
            stop,
        })?;

        self.clock = StepClock {
            current: start,
            next: start,
            steps_per_hour: read_time_step(&self.paths.output_dir)?,
        };

        let launch = SimulationLaunch {
            program: &self.ctx.config.simulation_program,
            model_id: &self.model.model_identifier,
            weather_file: prepared
                .weather_file
                .as_deref()
                .and_then(Path::file_name)
                .map(Path::new),
            working_dir: &self.paths.output_dir,
        };
        let process = self.ctx.platform.spawn_simulation(&launch).map_err(|e| {
            Error::SpawnFailure(format!("{}: {}", self.ctx.config.simulation_program, e))
        })?;
        self.process = Some(process);

        self.transport.accept()?;

        self.flags.init_done = true;
        self.torn_down = false;
        self.state = self.state.after(Operation::EnterInitialization);
        log::info!(
            "[epfmu] {}: simulation connected, step {} s",
            self.name,
            self.clock.step_size()
        );
        Ok(status)
    }

    fn locate_input(&self, suffix: &'static str) -> Result<Option<PathBuf>> {
        let dir = &self.paths.resources_dir;
        let mut found = self
            .ctx
            .platform
            .find_by_suffix(dir, suffix)
            .map_err(|_| Error::MissingInputFile {
                suffix,
                dir: dir.clone(),
            })?;
        match found.len() {
            0 | 1 => Ok(found.pop()),
            _ => Err(Error::AmbiguousInputFile { suffix, found }),
        }
    }

    fn require_input(&self, suffix: &'static str) -> Result<PathBuf> {
        self.locate_input(suffix)?.ok_or_else(|| Error::MissingInputFile {
            suffix,
            dir: self.paths.resources_dir.clone(),
        })
    }

    /// Leave initialization mode.
    pub fn exit_initialization_mode(&mut self) -> Result<Status> {
        let result = self.state.check(Operation::ExitInitialization).map(|()| {
            self.state = self.state.after(Operation::ExitInitialization);
            Status::Ok
        });
        self.reported(result)
    }

    /// Stop the simulation and clean the output folder.
    ///
    /// A second call returns [`Error::AlreadyTerminated`], a warning.
    pub fn terminate(&mut self) -> Result<Status> {
        let result = self.state.check(Operation::Terminate).and_then(|()| {
            if self.state == LifecycleState::Terminated {
                return Err(Error::AlreadyTerminated);
            }
            let status = self.teardown();
            self.state = self.state.after(Operation::Terminate);
            Ok(status)
        });
        self.reported(result)
    }

    /// Release the instance, tearing the run down if Terminate was skipped.
    pub fn free(&mut self) -> Result<Status> {
        if self.state == LifecycleState::Freed {
            return Ok(self.warn("instance already freed"));
        }
        let result = self.state.check(Operation::Free).map(|()| {
            let status = self.teardown();
            self.state = self.state.after(Operation::Free);
            log::info!("[epfmu] {}: freed", self.name);
            status
        });
        self.reported(result)
    }

    /// Send the end flag, close the connection, wait for the simulation and
    /// remove the exchange files. Runs at most once per initialization.
    fn teardown(&mut self) -> Status {
        if self.torn_down {
            return Status::Ok;
        }
        self.torn_down = true;
        self.flags.init_done = false;

        let mut notices = Vec::new();
        if let Ok(channel) = self.transport.channel() {
            match channel.write_message(&WireMessage::terminate()) {
                Ok(()) => match channel.read_message() {
                    Ok(_) | Err(Error::Disconnected) => {}
                    Err(e) => log::debug!("[epfmu] last read after end flag: {}", e),
                },
                Err(e) => notices.push(format!("could not send the end flag: {}", e)),
            }
        }
        if self.transport.close() {
            log::debug!("[epfmu] {}: connection closed", self.name);
        }

        if let Some(mut process) = self.process.take() {
            match process.wait() {
                Ok(code) => log::info!("[epfmu] {}: simulation exited with {:?}", self.name, code),
                Err(e) => notices.push(format!("could not wait for the simulation: {}", e)),
            }
        }
        self.paths.remove_run_files();

        let mut status = Status::Ok;
        for notice in notices {
            status = self.warn(notice);
        }
        status
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("state", &self.state)
            .field("output_dir", &self.paths.output_dir)
            .field("transport", &self.transport.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Instances wired to a mock stream, for stepping tests.

    use super::*;
    use crate::logger::MemorySink;
    use crate::model::{ModelVariable, VariableKind};
    use crate::transport::stream::mock::MockStream;

    fn variable(name: &str, vr: u32, causality: Causality) -> ModelVariable {
        ModelVariable {
            name: name.to_string(),
            value_reference: vr,
            causality,
            kind: VariableKind::Real,
            alias: false,
        }
    }

    /// Initialized instance with `n_in` inputs and `n_out` outputs, window
    /// `[0, 86400]` and 4 steps per hour.
    pub fn connected(stream: MockStream, n_in: u32, n_out: u32) -> (Instance, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let mut variables: Vec<_> = (0..n_in)
            .map(|i| variable(&format!("u{}", i), 1 + i, Causality::Input))
            .collect();
        variables.extend((0..n_out).map(|i| variable(&format!("y{}", i), 100_001 + i, Causality::Output)));
        let model = ModelDescription {
            fmi_version: "2.0".into(),
            guid: "T1".into(),
            model_identifier: "House".into(),
            model_name: None,
            variables,
        };

        let mut flags = RunFlags::fresh(false);
        flags.init_done = true;
        let instance = Instance {
            name: "house".into(),
            version: FmiVersion::V2,
            model,
            paths: InstancePaths::new("/nonexistent/epfmu", "house", "/nonexistent/fmu"),
            ctx: InstanceContext {
                platform: Arc::new(NativePlatform::new()),
                preparer: Arc::new(ExportPrepTool::new("prep")),
                sink: sink.clone(),
                config: AdapterConfig::default(),
            },
            state: LifecycleState::Initializing,
            flags,
            experiment: Experiment {
                tolerance: None,
                start: 0.0,
                stop: 86_400.0,
            },
            clock: StepClock {
                current: 0.0,
                next: 0.0,
                steps_per_hour: 4,
            },
            input_refs: (1..=n_in).collect(),
            output_refs: (100_001..100_001 + n_out).collect(),
            inputs: vec![0.0; n_in as usize],
            outputs: vec![0.0; n_out as usize],
            transport: Transport::connected(Box::new(stream)),
            process: None,
            torn_down: false,
            logging_on: false,
        };
        (instance, sink)
    }
}
