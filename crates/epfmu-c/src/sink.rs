// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Log sink that forwards records to the master's logger callback.

use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_void};

use epfmu::{LogFacadeSink, LogRecord, LogSink};

use crate::fmi1::Fmi1CallbackLogger;
use crate::fmi2::Fmi2CallbackLogger;
use crate::fmi3::Fmi3LogMessageCallback;

const FORMAT: &[u8] = b"%s\0";

/// Master logger, per FMI revision.
#[derive(Clone, Copy)]
enum MasterLogger {
    /// First argument is the component itself.
    Fmi1(Fmi1CallbackLogger, *mut c_void),
    /// First argument is the component environment.
    Fmi2(Fmi2CallbackLogger, *mut c_void),
    /// Not variadic; takes no instance name.
    Fmi3(Fmi3LogMessageCallback, *mut c_void),
}

/// Forwards each [`LogRecord`] to the master, or to the `log` facade when
/// the master passed no logger.
pub(crate) struct CallbackSink {
    logger: Option<MasterLogger>,
}

// SAFETY: the environment pointers are opaque to us and only handed back to
// the master's callback, which FMI requires to be callable from the thread
// that drives the instance.
unsafe impl Send for CallbackSink {}
unsafe impl Sync for CallbackSink {}

impl CallbackSink {
    pub(crate) fn fmi1(logger: Option<Fmi1CallbackLogger>, component: *mut c_void) -> Self {
        Self {
            logger: logger.map(|f| MasterLogger::Fmi1(f, component)),
        }
    }

    pub(crate) fn fmi2(logger: Option<Fmi2CallbackLogger>, environment: *mut c_void) -> Self {
        Self {
            logger: logger.map(|f| MasterLogger::Fmi2(f, environment)),
        }
    }

    pub(crate) fn fmi3(logger: Option<Fmi3LogMessageCallback>, environment: *mut c_void) -> Self {
        Self {
            logger: logger.map(|f| MasterLogger::Fmi3(f, environment)),
        }
    }
}

impl LogSink for CallbackSink {
    fn log(&self, record: &LogRecord<'_>) {
        let Some(logger) = self.logger else {
            LogFacadeSink.log(record);
            return;
        };

        let instance = c_text(record.instance);
        let category = c_text(record.category);
        let message = c_text(&record.message);
        let status = record.status as c_int;

        // SAFETY: all strings are NUL-terminated and live across the call;
        // the callback pointers were supplied by the master for this purpose.
        unsafe {
            match logger {
                MasterLogger::Fmi1(f, component) => f(
                    component,
                    instance.as_ptr(),
                    status,
                    category.as_ptr(),
                    FORMAT.as_ptr().cast::<c_char>(),
                    message.as_ptr(),
                ),
                MasterLogger::Fmi2(f, environment) => f(
                    environment,
                    instance.as_ptr(),
                    status,
                    category.as_ptr(),
                    FORMAT.as_ptr().cast::<c_char>(),
                    message.as_ptr(),
                ),
                MasterLogger::Fmi3(f, environment) => {
                    f(environment, status, category.as_ptr(), message.as_ptr());
                }
            }
        }
    }
}

/// C copy of `text`; interior NULs become spaces.
fn c_text(text: &str) -> CString {
    CString::new(text.replace('\0', " ")).unwrap_or_default()
}
