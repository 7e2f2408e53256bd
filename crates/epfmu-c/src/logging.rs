// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logging initialization for the epfmu C library
//!
//! Masters that never call one of these functions still get the library's
//! `log` output: the first instantiate call installs an `env_logger` driven
//! by `RUST_LOG` (default `warn`).

use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::sync::Once;

/// Log level for epfmu logging
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpfmuLogLevel {
    EpfmuLogOff = 0,
    EpfmuLogError = 1,
    EpfmuLogWarn = 2,
    EpfmuLogInfo = 3,
    EpfmuLogDebug = 4,
    EpfmuLogTrace = 5,
}

impl From<EpfmuLogLevel> for log::LevelFilter {
    fn from(level: EpfmuLogLevel) -> Self {
        match level {
            EpfmuLogLevel::EpfmuLogOff => log::LevelFilter::Off,
            EpfmuLogLevel::EpfmuLogError => log::LevelFilter::Error,
            EpfmuLogLevel::EpfmuLogWarn => log::LevelFilter::Warn,
            EpfmuLogLevel::EpfmuLogInfo => log::LevelFilter::Info,
            EpfmuLogLevel::EpfmuLogDebug => log::LevelFilter::Debug,
            EpfmuLogLevel::EpfmuLogTrace => log::LevelFilter::Trace,
        }
    }
}

/// Install the `RUST_LOG` driven logger once; later calls do nothing.
pub(crate) fn ensure_default_logger() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .format_timestamp_millis()
            .try_init();
    });
}

/// Initialize epfmu logging with console output
///
/// # Safety
/// Must be called from a single thread during initialization.
///
/// # Arguments
/// * `level` - Minimum log level to display
///
/// # Returns
/// `0` on success, `-1` if a logger is already installed
///
/// # Example (C)
/// ```c
/// epfmu_logging_init(EPFMU_LOG_INFO);
/// ```
#[no_mangle]
pub unsafe extern "C" fn epfmu_logging_init(level: EpfmuLogLevel) -> c_int {
    let filter: log::LevelFilter = level.into();

    match env_logger::Builder::new()
        .filter_level(filter)
        .format_timestamp_millis()
        .try_init()
    {
        Ok(()) => 0,
        Err(_) => -1, // Already initialized
    }
}

/// Initialize epfmu logging with environment variable override
///
/// Reads `RUST_LOG` environment variable if set, otherwise uses provided level.
///
/// # Safety
/// Must be called from a single thread during initialization.
///
/// # Returns
/// `0` on success, `-1` if a logger is already installed
#[no_mangle]
pub unsafe extern "C" fn epfmu_logging_init_env(default_level: EpfmuLogLevel) -> c_int {
    let filter: log::LevelFilter = default_level.into();

    match env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(filter.to_string()),
    )
    .format_timestamp_millis()
    .try_init()
    {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Initialize epfmu logging with a custom filter string
///
/// # Safety
/// - `filter` must be a valid null-terminated C string or NULL.
///
/// # Example (C)
/// ```c
/// epfmu_logging_init_with_filter("epfmu=debug,warn");
/// ```
#[no_mangle]
pub unsafe extern "C" fn epfmu_logging_init_with_filter(filter: *const c_char) -> c_int {
    if filter.is_null() {
        return -1;
    }

    let Ok(filter_str) = CStr::from_ptr(filter).to_str() else {
        return -1;
    };

    match env_logger::Builder::new()
        .parse_filters(filter_str)
        .format_timestamp_millis()
        .try_init()
    {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        assert_eq!(log::LevelFilter::from(EpfmuLogLevel::EpfmuLogOff), log::LevelFilter::Off);
        assert_eq!(log::LevelFilter::from(EpfmuLogLevel::EpfmuLogWarn), log::LevelFilter::Warn);
        assert_eq!(log::LevelFilter::from(EpfmuLogLevel::EpfmuLogTrace), log::LevelFilter::Trace);
    }

    #[test]
    fn test_null_filter_rejected() {
        assert_eq!(unsafe { epfmu_logging_init_with_filter(std::ptr::null()) }, -1);
    }
}
