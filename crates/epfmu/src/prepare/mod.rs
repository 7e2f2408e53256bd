// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Model-input preparation.
//!
//! Before the simulation starts, its input file must be rewritten so that the
//! run period matches the requested window and the weather file lines up with
//! it. FMUs ship a preparation tool in their resources for this; the adapter
//! only drives it through [`RunPreparer`].
//!
//! Outputs, all in the instance output folder:
//!
//! | File | Content |
//! |------|---------|
//! | `<model>.idf` | rewritten input (renamed from `runinfile.idf`) |
//! | `runweafile.epw` | weather file, when the FMU has one |
//! | `tstep.txt` | time steps per hour |

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::{MODEL_INPUT_SUFFIX, RUN_INPUT_FILE, RUN_WEATHER_FILE, TIME_STEP_FILE};
use crate::error::{Error, Result};

/// Inputs to one preparation run.
#[derive(Debug, Clone, Copy)]
pub struct PrepareRequest<'a> {
    pub model_id: &'a str,
    pub resources_dir: &'a Path,
    pub output_dir: &'a Path,
    /// `.idf` model input found in the resources.
    pub model_input: &'a Path,
    /// `.idd` input data dictionary found in the resources.
    pub dictionary: &'a Path,
    /// `.epw` weather file found in the resources.
    pub weather: Option<&'a Path>,
    pub start: f64,
    pub stop: f64,
}

/// Files produced by a preparation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRun {
    /// Model input the simulation will read.
    pub model_file: PathBuf,
    /// Weather file the simulation will read.
    pub weather_file: Option<PathBuf>,
}

/// Turns FMU resources into simulation-ready inputs.
pub trait RunPreparer: Send + Sync {
    fn prepare(&self, request: &PrepareRequest<'_>) -> Result<PreparedRun>;
}

/// Runs the preparation tool shipped in the FMU resources.
#[derive(Debug, Clone)]
pub struct ExportPrepTool {
    tool_name: String,
}

impl ExportPrepTool {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
        }
    }

    /// Path of the tool for a given resources folder.
    pub fn tool_path(&self, resources_dir: &Path) -> PathBuf {
        resources_dir.join(&self.tool_name)
    }

    /// Arguments: `[-w <epw>] -b <start> -e <stop> <idd> <idf>`.
    pub fn arguments(request: &PrepareRequest<'_>) -> Vec<String> {
        let mut args = Vec::with_capacity(8);
        if let Some(weather) = request.weather {
            args.push("-w".to_string());
            args.push(weather.display().to_string());
        }
        args.push("-b".to_string());
        args.push(format!("{:.6}", request.start));
        args.push("-e".to_string());
        args.push(format!("{:.6}", request.stop));
        args.push(request.dictionary.display().to_string());
        args.push(request.model_input.display().to_string());
        args
    }
}

impl RunPreparer for ExportPrepTool {
    fn prepare(&self, request: &PrepareRequest<'_>) -> Result<PreparedRun> {
        let tool = self.tool_path(request.resources_dir);
        make_executable(&tool)?;

        let args = Self::arguments(request);
        log::info!("[epfmu] preparing run inputs: {} {}", tool.display(), args.join(" "));
        let status = Command::new(&tool)
            .args(&args)
            .current_dir(request.output_dir)
            .stdin(Stdio::null())
            .status()
            .map_err(|e| Error::Preparation(format!("cannot run {}: {}", tool.display(), e)))?;
        if !status.success() {
            return Err(Error::Preparation(format!(
                "{} exited with {}",
                tool.display(),
                status
            )));
        }

        let model_file = request
            .output_dir
            .join(format!("{}{}", request.model_id, MODEL_INPUT_SUFFIX));
        fs::rename(request.output_dir.join(RUN_INPUT_FILE), &model_file).map_err(|e| {
            Error::Preparation(format!("cannot rename {}: {}", RUN_INPUT_FILE, e))
        })?;

        let weather = request.output_dir.join(RUN_WEATHER_FILE);
        Ok(PreparedRun {
            model_file,
            weather_file: weather.is_file().then_some(weather),
        })
    }
}

#[cfg(unix)]
fn make_executable(tool: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(tool)
        .map_err(|e| Error::Preparation(format!("{}: {}", tool.display(), e)))?
        .permissions();
    if permissions.mode() & 0o111 != 0o111 {
        permissions.set_mode(permissions.mode() | 0o755);
        fs::set_permissions(tool, permissions).map_err(|e| {
            Error::Preparation(format!("cannot make {} executable: {}", tool.display(), e))
        })?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(tool: &Path) -> Result<()> {
    if tool.is_file() {
        Ok(())
    } else {
        Err(Error::Preparation(format!("{} not found", tool.display())))
    }
}

/// Read the time steps per hour written by the preparation run.
pub fn read_time_step(output_dir: &Path) -> Result<u32> {
    let path = output_dir.join(TIME_STEP_FILE);
    let text = fs::read_to_string(&path)
        .map_err(|e| Error::MissingTimeStep(format!("cannot read {}: {}", path.display(), e)))?;
    let token = text
        .split_ascii_whitespace()
        .next()
        .ok_or_else(|| Error::MissingTimeStep(format!("{} is empty", path.display())))?;
    let steps: u32 = token
        .parse()
        .map_err(|_| Error::MissingTimeStep(format!("'{}' is not a time step count", token)))?;
    if steps == 0 {
        return Err(Error::MissingTimeStep("time steps per hour is zero".into()));
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(dirs: &'a (PathBuf, PathBuf), weather: Option<&'a Path>) -> PrepareRequest<'a> {
        PrepareRequest {
            model_id: "House",
            resources_dir: &dirs.0,
            output_dir: &dirs.1,
            model_input: Path::new("/fmu/resources/House.idf"),
            dictionary: Path::new("/fmu/resources/Energy+.idd"),
            weather,
            start: 0.0,
            stop: 86400.0,
        }
    }

    #[test]
    fn test_arguments() {
        let dirs = (PathBuf::from("/fmu/resources"), PathBuf::from("/out"));
        let args = ExportPrepTool::arguments(&request(&dirs, None));
        assert_eq!(
            args,
            [
                "-b",
                "0.000000",
                "-e",
                "86400.000000",
                "/fmu/resources/Energy+.idd",
                "/fmu/resources/House.idf"
            ]
        );

        let weather = Path::new("/fmu/resources/Chicago.epw");
        let args = ExportPrepTool::arguments(&request(&dirs, Some(weather)));
        assert_eq!(&args[..2], ["-w", "/fmu/resources/Chicago.epw"]);
    }

    #[test]
    fn test_read_time_step() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(read_time_step(dir.path()), Err(Error::MissingTimeStep(_))));

        fs::write(dir.path().join(TIME_STEP_FILE), "0\n").unwrap();
        assert!(matches!(read_time_step(dir.path()), Err(Error::MissingTimeStep(_))));

        fs::write(dir.path().join(TIME_STEP_FILE), "six").unwrap();
        assert!(matches!(read_time_step(dir.path()), Err(Error::MissingTimeStep(_))));

        fs::write(dir.path().join(TIME_STEP_FILE), "4\n").unwrap();
        assert_eq!(read_time_step(dir.path()).unwrap(), 4);
    }

    #[cfg(unix)]
    #[test]
    fn test_prep_tool_run() {
        let root = tempfile::tempdir().unwrap();
        let dirs = (root.path().join("resources"), root.path().join("out"));
        fs::create_dir_all(&dirs.0).unwrap();
        fs::create_dir_all(&dirs.1).unwrap();
        // stand-in tool: writes the files the real one produces
        fs::write(
            dirs.0.join("prep"),
            "#!/bin/sh\necho 'Version,9.6;' > runinfile.idf\necho 6 > tstep.txt\n",
        )
        .unwrap();

        let run = ExportPrepTool::new("prep").prepare(&request(&dirs, None)).unwrap();
        assert_eq!(run.model_file, dirs.1.join("House.idf"));
        assert!(run.model_file.is_file());
        assert!(run.weather_file.is_none());
        assert_eq!(read_time_step(&dirs.1).unwrap(), 6);
    }

    #[cfg(unix)]
    #[test]
    fn test_prep_tool_failure() {
        let root = tempfile::tempdir().unwrap();
        let dirs = (root.path().join("resources"), root.path().join("out"));
        fs::create_dir_all(&dirs.0).unwrap();
        fs::create_dir_all(&dirs.1).unwrap();
        fs::write(dirs.0.join("prep"), "#!/bin/sh\nexit 3\n").unwrap();

        let err = ExportPrepTool::new("prep").prepare(&request(&dirs, None)).unwrap_err();
        assert!(matches!(err, Error::Preparation(_)));

        let err = ExportPrepTool::new("absent").prepare(&request(&dirs, None)).unwrap_err();
        assert!(matches!(err, Error::Preparation(_)));
    }
}
