// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy and severity mapping.
//!
//! Every failure inside the adapter is an [`Error`]. At the operation boundary
//! it is reduced to a [`Severity`] and then to the [`Status`] code a master
//! understands. Warnings are not errors: operations that succeed with a notice
//! return `Ok(Status::Warning)`.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::codec::CodecError;

/// How bad a failure is for the instance that reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Operation unsupported or a harmless repeat call.
    Warning,
    /// Caller misuse; the instance is still usable in principle.
    Error,
    /// Instance state is lost; the caller should abandon it.
    Fatal,
}

/// Outcome code reported to a master.
///
/// Discriminants follow the FMI status ordering shared by all revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    Ok = 0,
    Warning = 1,
    Discard = 2,
    Error = 3,
    Fatal = 4,
    Pending = 5,
}

impl Status {
    /// Lower-case label used as the log category.
    pub const fn label(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Warning => "warning",
            Status::Discard => "discard",
            Status::Error => "error",
            Status::Fatal => "fatal",
            Status::Pending => "pending",
        }
    }
}

impl From<Severity> for Status {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Warning => Status::Warning,
            Severity::Error => Status::Error,
            Severity::Fatal => Status::Fatal,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Adapter error.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Instantiation
    // ========================================================================
    /// Instance name empty or longer than the accepted maximum.
    InvalidName(String),
    /// Resource location missing or not resolvable to an existing folder.
    InvalidLocation(String),
    /// Model description declares an unsupported FMI version.
    VersionMismatch { expected: String, found: String },
    /// Caller token differs from the model description.
    TokenMismatch { expected: String, found: String },
    /// Model description unreadable or incomplete.
    ModelDescription(String),
    /// Output folder could not be prepared.
    WorkingDirectory { path: PathBuf, source: io::Error },

    // ========================================================================
    // Lifecycle
    // ========================================================================
    /// Operation not legal in the current lifecycle state.
    InvalidState(String),
    /// EnterInitialization called before the experiment was set up.
    SetupRequired,
    /// Model has neither inputs nor outputs.
    NoIOVariables,
    /// Run window is not a whole number of days.
    InvalidWindow { start: f64, stop: f64 },
    /// Required model input file absent from the resources folder.
    MissingInputFile { suffix: &'static str, dir: PathBuf },
    /// More than one candidate file for a suffix.
    AmbiguousInputFile { suffix: &'static str, found: Vec<PathBuf> },
    /// Preparation tool failed.
    Preparation(String),
    /// Time step file absent, unreadable or zero.
    MissingTimeStep(String),
    /// Simulation process could not be started.
    SpawnFailure(String),
    /// Handle refers to a freed instance.
    StaleHandle,
    /// Instance already terminated (reported as a warning).
    AlreadyTerminated,

    // ========================================================================
    // Stepping
    // ========================================================================
    /// First DoStep does not start at the experiment start time.
    StartTimeMismatch { expected: f64, found: f64 },
    /// Step size of zero.
    InvalidStepSize,
    /// Step size differs from the model's time step.
    StepSizeMismatch { expected: f64, found: f64 },
    /// Communication points out of order.
    ProtocolDesync(String),
    /// Step ends past the stop time.
    BeyondStopTime { point: f64, stop: f64 },
    /// Non-real variables requested.
    UnsupportedType(&'static str),

    // ========================================================================
    // Transport
    // ========================================================================
    /// Socket could not be bound or published.
    BindFailed(String),
    /// Peer closed the connection.
    Disconnected,
    /// Legacy peer sent more than one read can hold.
    LegacyOverflow,
    /// Malformed wire message.
    Codec(CodecError),
    /// I/O error with underlying cause.
    Io(io::Error),
}

impl Error {
    /// Severity tier used when reporting this error.
    pub fn severity(&self) -> Severity {
        match self {
            Error::AlreadyTerminated => Severity::Warning,
            Error::WorkingDirectory { .. }
            | Error::StartTimeMismatch { .. }
            | Error::BindFailed(_)
            | Error::Disconnected
            | Error::Io(_) => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    /// Status code for this error.
    pub fn status(&self) -> Status {
        self.severity().into()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Instantiation
            Error::InvalidName(name) => write!(
                f,
                "Invalid instance name '{}' (must be 1 to {} characters)",
                name,
                crate::config::MAX_INSTANCE_NAME_LEN
            ),
            Error::InvalidLocation(location) => {
                write!(f, "Invalid resource location '{}'", location)
            }
            Error::VersionMismatch { expected, found } => write!(
                f,
                "Wrong FMI version {} in model description, expected {}",
                found, expected
            ),
            Error::TokenMismatch { expected, found } => {
                write!(f, "Wrong GUID {}, model description declares {}", found, expected)
            }
            Error::ModelDescription(msg) => write!(f, "Model description: {}", msg),
            Error::WorkingDirectory { path, source } => write!(
                f,
                "Could not prepare output folder {}: {}",
                path.display(),
                source
            ),
            // Lifecycle
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::SetupRequired => write!(
                f,
                "Experiment not set up; call SetupExperiment before EnterInitializationMode"
            ),
            Error::NoIOVariables => write!(f, "Model declares neither inputs nor outputs"),
            Error::InvalidWindow { start, stop } => write!(
                f,
                "Run window [{}, {}] spans {} s, which is not a multiple of 86400",
                start,
                stop,
                stop - start
            ),
            Error::MissingInputFile { suffix, dir } => {
                write!(f, "No *{} file in {}", suffix, dir.display())
            }
            Error::AmbiguousInputFile { suffix, found } => {
                write!(f, "Found {} *{} files, expected one", found.len(), suffix)
            }
            Error::Preparation(msg) => write!(f, "Could not prepare run inputs: {}", msg),
            Error::MissingTimeStep(msg) => write!(f, "No valid time step: {}", msg),
            Error::SpawnFailure(msg) => write!(f, "Simulation could not start: {}", msg),
            Error::StaleHandle => write!(f, "Instance handle refers to a freed instance"),
            Error::AlreadyTerminated => write!(f, "Instance already terminated"),
            // Stepping
            Error::StartTimeMismatch { expected, found } => write!(
                f,
                "First communication point {} differs from start time {}",
                found, expected
            ),
            Error::InvalidStepSize => write!(f, "Communication step size must not be zero"),
            Error::StepSizeMismatch { expected, found } => write!(
                f,
                "Communication step size {} differs from the model time step {}",
                found, expected
            ),
            Error::ProtocolDesync(msg) => write!(f, "Communication points out of sync: {}", msg),
            Error::BeyondStopTime { point, stop } => {
                write!(f, "Communication point {} is beyond stop time {}", point, stop)
            }
            Error::UnsupportedType(kind) => {
                write!(f, "{} variables are not supported, only reals", kind)
            }
            // Transport
            Error::BindFailed(msg) => write!(f, "Bind failed: {}", msg),
            Error::Disconnected => write!(f, "Simulation closed the connection"),
            Error::LegacyOverflow => write!(
                f,
                "Message does not fit one read and peer protocol version 1 cannot continue it"
            ),
            Error::Codec(e) => write!(f, "Wire message: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::WorkingDirectory { source, .. } => Some(source),
            Error::Codec(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Codec(e)
    }
}

/// Convenient alias for adapter results.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_tiers() {
        assert_eq!(Error::AlreadyTerminated.severity(), Severity::Warning);
        assert_eq!(Error::InvalidWindow { start: 0.0, stop: 3000.0 }.severity(), Severity::Error);
        assert_eq!(Error::ProtocolDesync("x".into()).severity(), Severity::Error);
        assert_eq!(Error::Disconnected.severity(), Severity::Fatal);
        assert_eq!(Error::BindFailed("x".into()).status(), Status::Fatal);
        assert_eq!(
            Error::StartTimeMismatch { expected: 0.0, found: 1.0 }.status(),
            Status::Fatal
        );
    }

    #[test]
    fn test_status_order_matches_fmi_codes() {
        assert_eq!(Status::Ok as i32, 0);
        assert_eq!(Status::Warning as i32, 1);
        assert_eq!(Status::Fatal as i32, 4);
        assert!(Status::Warning < Status::Error);
    }

    #[test]
    fn test_io_source_is_kept() {
        let err: Error = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("pipe"));
    }
}
