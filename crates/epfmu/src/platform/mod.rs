// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Operating system capabilities used by an instance.
//!
//! The instance never touches the process environment directly: path checks,
//! file lookup, host naming and process spawning all go through [`Platform`].
//! [`NativePlatform`] is the implementation for the build target; tests plug
//! in their own.

mod host;
mod native;

pub use host::host_name;
pub use native::{ChildProcess, NativePlatform};

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Everything needed to start one simulation run.
#[derive(Debug, Clone, Copy)]
pub struct SimulationLaunch<'a> {
    /// Executable, resolved through `PATH` when relative.
    pub program: &'a str,
    /// Model identifier, used as output prefix and input file stem.
    pub model_id: &'a str,
    /// Weather file relative to `working_dir`, if the run has one.
    pub weather_file: Option<&'a Path>,
    /// Folder the simulation runs in (the instance output folder).
    pub working_dir: &'a Path,
}

impl SimulationLaunch<'_> {
    /// Model input file name, relative to the working directory.
    pub fn input_file(&self) -> String {
        format!("{}{}", self.model_id, crate::config::MODEL_INPUT_SUFFIX)
    }

    /// Command line arguments:
    /// `[-w weather] -p <model> -s C -x -m -r <model>.idf`.
    pub fn arguments(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(10);
        if let Some(weather) = self.weather_file {
            args.push("-w".into());
            args.push(weather.as_os_str().to_owned());
        }
        for arg in ["-p", self.model_id, "-s", "C", "-x", "-m", "-r"] {
            args.push(arg.into());
        }
        args.push(self.input_file().into());
        args
    }
}

/// Handle to a running simulation.
pub trait SimulationProcess: Send + fmt::Debug {
    /// OS process id, when known.
    fn id(&self) -> Option<u32>;

    /// Block until the process exits; returns its exit code when it has one.
    fn wait(&mut self) -> io::Result<Option<i32>>;
}

/// Capabilities an instance needs from the host.
pub trait Platform: Send + Sync {
    /// `true` when `path` names an existing file or folder.
    fn path_exists(&self, path: &Path) -> bool;

    /// Regular files in `dir` whose name ends with `suffix`, sorted.
    fn find_by_suffix(&self, dir: &Path, suffix: &str) -> io::Result<Vec<PathBuf>>;

    /// Name the simulation should use to reach this host.
    fn host_name(&self) -> String;

    /// Start the simulation without waiting for it.
    fn spawn_simulation(&self, launch: &SimulationLaunch<'_>) -> io::Result<Box<dyn SimulationProcess>>;
}
