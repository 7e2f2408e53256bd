// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! [`Platform`] for the build target.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use super::{host_name, Platform, SimulationLaunch, SimulationProcess};

/// Platform backed by the local operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePlatform;

impl NativePlatform {
    pub const fn new() -> Self {
        Self
    }
}

/// Running simulation started by [`NativePlatform`].
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
    exit_code: Option<Option<i32>>,
}

impl ChildProcess {
    pub fn new(child: Child) -> Self {
        Self {
            child,
            exit_code: None,
        }
    }
}

impl SimulationProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn wait(&mut self) -> io::Result<Option<i32>> {
        if let Some(code) = self.exit_code {
            return Ok(code);
        }
        let status = self.child.wait()?;
        log::debug!("[epfmu] simulation {} exited with {}", self.child.id(), status);
        self.exit_code = Some(status.code());
        Ok(status.code())
    }
}

impl Platform for NativePlatform {
    fn path_exists(&self, path: &Path) -> bool {
        fs::metadata(path).is_ok()
    }

    fn find_by_suffix(&self, dir: &Path, suffix: &str) -> io::Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if has_suffix(&name.to_string_lossy(), suffix) {
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found)
    }

    fn host_name(&self) -> String {
        host_name()
    }

    #[cfg(not(windows))]
    fn spawn_simulation(&self, launch: &SimulationLaunch<'_>) -> io::Result<Box<dyn SimulationProcess>> {
        let child = Command::new(launch.program)
            .args(launch.arguments())
            .current_dir(launch.working_dir)
            .stdin(Stdio::null())
            .spawn()?;
        log::info!(
            "[epfmu] started {} (pid {}) in {}",
            launch.program,
            child.id(),
            launch.working_dir.display()
        );
        Ok(Box::new(ChildProcess::new(child)))
    }

    /// Windows runs the simulation through a command file so that the
    /// console setup of the installation's batch wrappers applies.
    #[cfg(windows)]
    fn spawn_simulation(&self, launch: &SimulationLaunch<'_>) -> io::Result<Box<dyn SimulationProcess>> {
        let script = launch.working_dir.join(crate::config::LAUNCH_SCRIPT_FILE);
        let mut line = launch.program.to_string();
        for arg in launch.arguments() {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        fs::write(&script, line)?;
        let child = Command::new("cmd")
            .arg("/C")
            .arg(&script)
            .current_dir(launch.working_dir)
            .stdin(Stdio::null())
            .spawn()?;
        log::info!("[epfmu] started {} (pid {})", script.display(), child.id());
        Ok(Box::new(ChildProcess::new(child)))
    }
}

#[cfg(windows)]
fn has_suffix(name: &str, suffix: &str) -> bool {
    name.to_ascii_lowercase().ends_with(&suffix.to_ascii_lowercase())
}

#[cfg(not(windows))]
fn has_suffix(name: &str, suffix: &str) -> bool {
    name.ends_with(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_suffix_ignores_folders() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.idf"), "").unwrap();
        fs::write(dir.path().join("a.idf"), "").unwrap();
        fs::write(dir.path().join("Energy+.idd"), "").unwrap();
        fs::create_dir(dir.path().join("sub.idf")).unwrap();

        let platform = NativePlatform::new();
        let found = platform.find_by_suffix(dir.path(), ".idf").unwrap();
        assert_eq!(found, vec![dir.path().join("a.idf"), dir.path().join("b.idf")]);
        assert_eq!(platform.find_by_suffix(dir.path(), ".epw").unwrap().len(), 0);
    }

    #[test]
    fn test_path_exists() {
        let dir = tempfile::tempdir().unwrap();
        let platform = NativePlatform::new();
        assert!(platform.path_exists(dir.path()));
        assert!(!platform.path_exists(&dir.path().join("missing")));
    }

    #[cfg(unix)]
    #[test]
    fn test_spawn_missing_program_fails() {
        let dir = tempfile::tempdir().unwrap();
        let launch = SimulationLaunch {
            program: "epfmu-no-such-simulation-program",
            model_id: "m",
            weather_file: None,
            working_dir: dir.path(),
        };
        assert!(NativePlatform::new().spawn_simulation(&launch).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_spawn_and_wait() {
        let dir = tempfile::tempdir().unwrap();
        let launch = SimulationLaunch {
            program: "true",
            model_id: "m",
            weather_file: None,
            working_dir: dir.path(),
        };
        let mut process = NativePlatform::new().spawn_simulation(&launch).unwrap();
        assert!(process.id().is_some());
        assert_eq!(process.wait().unwrap(), Some(0));
        // second wait returns the cached status
        assert_eq!(process.wait().unwrap(), Some(0));
    }
}
