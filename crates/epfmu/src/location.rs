// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Resource location resolution and per-instance folders.
//!
//! Masters pass the unpacked FMU as a URI (`file:///tmp/fmu/resources`,
//! `file:/tmp/fmu`, `fmi://...`) or as a bare path. [`resolve_location`] turns
//! it into the unzip folder; [`InstancePaths`] derives every other path from
//! it so no operation ever depends on the process working directory.

use std::fs;
use std::io;
use std::path::{Component, PathBuf};

use crate::config::{
    LAUNCH_SCRIPT_FILE, MODEL_DESCRIPTION_FILE, OUTPUT_DIR_PREFIX, RESOURCES_DIR,
    RUN_WEATHER_FILE, SOCKET_FILE, TIME_STEP_FILE, VARIABLES_FILE, WEATHER_SUFFIX,
};
use crate::error::{Error, Result};
use crate::platform::Platform;

/// `file:` spellings, tried in this order.
const FILE_PREFIXES: [&str; 4] = ["file://", "file:///", "file:/", "file:"];

/// Schemes stripped without an existence check.
const OTHER_PREFIXES: [&str; 3] = ["ftp://", "fmi://", "https://"];

/// Resolve a resource location to the unzip folder of the FMU.
///
/// A trailing `resources` component is dropped, so both the FMI 1 style
/// (FMU root) and the FMI 2/3 style (resources folder) are accepted.
pub fn resolve_location(platform: &dyn Platform, location: &str) -> Result<PathBuf> {
    let location = location.trim();
    if location.is_empty() {
        return Err(Error::InvalidLocation(String::new()));
    }

    let resolved = resolve_path(platform, location)
        .ok_or_else(|| Error::InvalidLocation(location.to_string()))?;
    log::debug!("[epfmu] resource location {} -> {}", location, resolved.display());

    Ok(strip_resources(resolved))
}

fn resolve_path(platform: &dyn Platform, location: &str) -> Option<PathBuf> {
    let lower = location.to_ascii_lowercase();

    if lower.starts_with("file:") {
        return FILE_PREFIXES
            .iter()
            .filter(|prefix| lower.starts_with(*prefix))
            .map(|prefix| PathBuf::from(&location[prefix.len()..]))
            .find(|candidate| !candidate.as_os_str().is_empty() && platform.path_exists(candidate));
    }

    let path = OTHER_PREFIXES
        .iter()
        .find(|prefix| lower.starts_with(*prefix))
        .map_or(location, |prefix| &location[prefix.len()..]);
    let path = PathBuf::from(path);
    platform.path_exists(&path).then_some(path)
}

fn strip_resources(path: PathBuf) -> PathBuf {
    let trailing = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .next_back();
    match (trailing, path.parent()) {
        (Some(Component::Normal(name)), Some(parent)) if name == RESOURCES_DIR => {
            parent.to_path_buf()
        }
        _ => path,
    }
}

// ============================================================================
// Instance folders
// ============================================================================

/// Every path an instance touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancePaths {
    /// Folder receiving the output directory (caller working directory by default).
    pub base_dir: PathBuf,
    /// `<base>/Output_EPExport_<name>`: simulation working folder.
    pub output_dir: PathBuf,
    /// Unpacked FMU root.
    pub unzip_dir: PathBuf,
    /// `<unzip>/resources`.
    pub resources_dir: PathBuf,
    /// `<unzip>/modelDescription.xml`.
    pub model_description: PathBuf,
}

impl InstancePaths {
    pub fn new(base_dir: impl Into<PathBuf>, instance_name: &str, unzip_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let unzip_dir = unzip_dir.into();
        Self {
            output_dir: base_dir.join(format!("{}{}", OUTPUT_DIR_PREFIX, instance_name)),
            resources_dir: unzip_dir.join(RESOURCES_DIR),
            model_description: unzip_dir.join(MODEL_DESCRIPTION_FILE),
            base_dir,
            unzip_dir,
        }
    }

    /// Path of a file inside the output folder.
    pub fn output_file(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    /// Recreate an empty output folder.
    ///
    /// A leftover folder that cannot be removed is not fatal; its removal
    /// error is handed back so the caller can warn about it.
    pub fn create_output_dir(&self) -> Result<Option<io::Error>> {
        let stale = if self.output_dir.exists() {
            fs::remove_dir_all(&self.output_dir).err()
        } else {
            None
        };
        fs::create_dir_all(&self.output_dir).map_err(|source| Error::WorkingDirectory {
            path: self.output_dir.clone(),
            source,
        })?;
        Ok(stale)
    }

    /// Copy the variable mapping from the resources into the output folder.
    pub fn copy_variables_file(&self) -> Result<()> {
        let from = self.resources_dir.join(VARIABLES_FILE);
        fs::copy(&from, self.output_file(VARIABLES_FILE)).map_err(|e| {
            Error::Io(io::Error::new(
                e.kind(),
                format!("cannot copy {}: {}", from.display(), e),
            ))
        })?;
        Ok(())
    }

    /// Remove the files exchanged with the simulation.
    ///
    /// Weather files are only removed when the preparation run produced
    /// `runweafile.epw`. Returns the files that were deleted.
    pub fn remove_run_files(&self) -> Vec<PathBuf> {
        let mut removed = Vec::new();
        for name in [VARIABLES_FILE, SOCKET_FILE, LAUNCH_SCRIPT_FILE, TIME_STEP_FILE] {
            let path = self.output_file(name);
            if fs::remove_file(&path).is_ok() {
                removed.push(path);
            }
        }

        if self.output_file(RUN_WEATHER_FILE).is_file() {
            if let Ok(entries) = fs::read_dir(&self.output_dir) {
                for path in entries.flatten().map(|e| e.path()) {
                    let is_weather = path
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case(&WEATHER_SUFFIX[1..]));
                    if is_weather && fs::remove_file(&path).is_ok() {
                        removed.push(path);
                    }
                }
            }
        }

        log::debug!("[epfmu] removed {} run files from {}", removed.len(), self.output_dir.display());
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::NativePlatform;

    fn fmu_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(RESOURCES_DIR)).unwrap();
        dir
    }

    #[test]
    fn test_file_uri_spellings() {
        let root = fmu_root();
        let platform = NativePlatform::new();
        let plain = root.path().to_str().unwrap();

        for location in [
            format!("file://{}/resources", plain),
            format!("FILE://{}", plain),
            format!("file:{}", plain),
            format!("file:/{}", plain.trim_start_matches('/')),
        ] {
            let unzip = resolve_location(&platform, &location).unwrap();
            assert_eq!(
                fs::canonicalize(&unzip).unwrap(),
                fs::canonicalize(root.path()).unwrap(),
                "{}",
                location
            );
        }
    }

    #[test]
    fn test_bare_path_and_schemes() {
        let root = fmu_root();
        let platform = NativePlatform::new();
        let resources = root.path().join(RESOURCES_DIR);

        let unzip = resolve_location(&platform, resources.to_str().unwrap()).unwrap();
        assert_eq!(unzip, root.path());

        let fmi = format!("fmi://{}", root.path().display());
        assert_eq!(resolve_location(&platform, &fmi).unwrap(), root.path());
    }

    #[test]
    fn test_unresolvable_location() {
        let platform = NativePlatform::new();
        assert!(matches!(
            resolve_location(&platform, ""),
            Err(Error::InvalidLocation(_))
        ));
        assert!(matches!(
            resolve_location(&platform, "file:///no/such/epfmu/fmu"),
            Err(Error::InvalidLocation(_))
        ));
    }

    #[test]
    fn test_instance_paths_layout() {
        let paths = InstancePaths::new("/work", "House1", "/tmp/fmu");
        assert_eq!(paths.output_dir, PathBuf::from("/work/Output_EPExport_House1"));
        assert_eq!(paths.resources_dir, PathBuf::from("/tmp/fmu/resources"));
        assert_eq!(paths.model_description, PathBuf::from("/tmp/fmu/modelDescription.xml"));
        assert_eq!(paths.output_file(SOCKET_FILE), PathBuf::from("/work/Output_EPExport_House1/socket.cfg"));
    }

    #[test]
    fn test_output_dir_is_recreated() {
        let base = tempfile::tempdir().unwrap();
        let root = fmu_root();
        let paths = InstancePaths::new(base.path(), "a", root.path());

        assert!(paths.create_output_dir().unwrap().is_none());
        fs::write(paths.output_file("leftover.txt"), "x").unwrap();
        assert!(paths.create_output_dir().unwrap().is_none());
        assert!(!paths.output_file("leftover.txt").exists());
    }

    #[test]
    fn test_copy_and_remove_run_files() {
        let base = tempfile::tempdir().unwrap();
        let root = fmu_root();
        let paths = InstancePaths::new(base.path(), "b", root.path());
        paths.create_output_dir().unwrap();

        assert!(matches!(paths.copy_variables_file(), Err(Error::Io(_))));
        fs::write(paths.resources_dir.join(VARIABLES_FILE), "<BCVTB-variables/>").unwrap();
        paths.copy_variables_file().unwrap();

        fs::write(paths.output_file(SOCKET_FILE), "").unwrap();
        fs::write(paths.output_file(TIME_STEP_FILE), "4").unwrap();
        fs::write(paths.output_file("Chicago.epw"), "").unwrap();
        fs::write(paths.output_file("House.idf"), "").unwrap();

        // no runweafile.epw: other weather files stay
        assert_eq!(paths.remove_run_files().len(), 3);
        assert!(paths.output_file("Chicago.epw").exists());

        fs::write(paths.output_file(RUN_WEATHER_FILE), "").unwrap();
        assert_eq!(paths.remove_run_files().len(), 2);
        assert!(!paths.output_file("Chicago.epw").exists());
        assert!(paths.output_file("House.idf").exists());
    }
}
