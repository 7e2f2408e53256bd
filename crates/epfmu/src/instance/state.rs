// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Lifecycle states and the operation legality table.

use std::fmt;

use crate::error::{Error, Result};

/// Lifecycle phase of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Uninstantiated,
    Instantiated,
    Initializing,
    Initialized,
    Terminated,
    Freed,
}

/// Operations gated by the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SetupExperiment,
    EnterInitialization,
    ExitInitialization,
    DoStep,
    SetReal,
    GetReal,
    Terminate,
    Free,
}

impl LifecycleState {
    /// `true` until the instance is freed.
    pub const fn is_live(self) -> bool {
        !matches!(self, LifecycleState::Uninstantiated | LifecycleState::Freed)
    }

    /// Whether `op` may run in this state.
    ///
    /// Terminate and Free are accepted in every live state; repeated calls
    /// are handled by the operations themselves.
    pub const fn permits(self, op: Operation) -> bool {
        use LifecycleState::*;
        match op {
            Operation::SetupExperiment | Operation::EnterInitialization => {
                matches!(self, Instantiated)
            }
            Operation::ExitInitialization | Operation::DoStep => {
                matches!(self, Initializing | Initialized)
            }
            Operation::SetReal | Operation::GetReal | Operation::Terminate => self.is_live(),
            Operation::Free => !matches!(self, Uninstantiated),
        }
    }

    /// State reached after `op` succeeds.
    pub const fn after(self, op: Operation) -> Self {
        match op {
            Operation::EnterInitialization => LifecycleState::Initializing,
            Operation::ExitInitialization | Operation::DoStep => LifecycleState::Initialized,
            Operation::Terminate => LifecycleState::Terminated,
            Operation::Free => LifecycleState::Freed,
            Operation::SetupExperiment | Operation::SetReal | Operation::GetReal => self,
        }
    }

    /// Fail with [`Error::InvalidState`] unless `op` is permitted.
    pub fn check(self, op: Operation) -> Result<()> {
        if self.permits(op) {
            Ok(())
        } else {
            Err(Error::InvalidState(format!("{} is not allowed while {}", op, self)))
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Uninstantiated => "uninstantiated",
            LifecycleState::Instantiated => "instantiated",
            LifecycleState::Initializing => "initializing",
            LifecycleState::Initialized => "initialized",
            LifecycleState::Terminated => "terminated",
            LifecycleState::Freed => "freed",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::SetupExperiment => "SetupExperiment",
            Operation::EnterInitialization => "EnterInitializationMode",
            Operation::ExitInitialization => "ExitInitializationMode",
            Operation::DoStep => "DoStep",
            Operation::SetReal => "SetReal",
            Operation::GetReal => "GetReal",
            Operation::Terminate => "Terminate",
            Operation::Free => "FreeInstance",
        };
        f.write_str(name)
    }
}

/// First-call flags and readiness counters of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RunFlags {
    /// SetupExperiment ran since the last EnterInitialization.
    pub setup_done: bool,
    /// EnterInitialization completed; Set/Get become active.
    pub init_done: bool,
    /// No DoStep has succeeded yet.
    pub first_step: bool,
    /// No GetReal has run yet.
    pub first_get: bool,
    /// A GetReal already read the outputs of the current step.
    pub get_this_step: bool,
    /// The simulation has sent outputs that were not read yet.
    pub outputs_pending: bool,
    /// Input values written since the last step.
    pub set_count: usize,
    /// Output values returned since the last step.
    pub get_count: usize,
}

impl RunFlags {
    /// Flags at the start of an initialization, keeping `setup_done`.
    pub fn fresh(setup_done: bool) -> Self {
        Self {
            setup_done,
            init_done: false,
            first_step: true,
            first_get: true,
            get_this_step: false,
            outputs_pending: false,
            set_count: 0,
            get_count: 0,
        }
    }

    /// Clear the per-step counters.
    pub fn next_step(&mut self) {
        self.get_this_step = false;
        self.set_count = 0;
        self.get_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_OPS: [Operation; 8] = [
        Operation::SetupExperiment,
        Operation::EnterInitialization,
        Operation::ExitInitialization,
        Operation::DoStep,
        Operation::SetReal,
        Operation::GetReal,
        Operation::Terminate,
        Operation::Free,
    ];

    #[test]
    fn test_legality_table() {
        use LifecycleState::*;
        assert!(Instantiated.permits(Operation::SetupExperiment));
        assert!(!Initializing.permits(Operation::SetupExperiment));
        assert!(!Instantiated.permits(Operation::DoStep));
        assert!(Initializing.permits(Operation::DoStep));
        assert!(Initialized.permits(Operation::ExitInitialization));
        assert!(!Terminated.permits(Operation::DoStep));
        assert!(Terminated.permits(Operation::Terminate));
        assert!(Terminated.permits(Operation::GetReal));
        assert!(Freed.permits(Operation::Free));
        assert!(!Freed.permits(Operation::SetReal));

        for op in ALL_OPS {
            assert!(!Uninstantiated.permits(op), "{}", op);
        }
    }

    #[test]
    fn test_transitions() {
        use LifecycleState::*;
        assert_eq!(Instantiated.after(Operation::EnterInitialization), Initializing);
        assert_eq!(Initializing.after(Operation::DoStep), Initialized);
        assert_eq!(Initialized.after(Operation::GetReal), Initialized);
        assert_eq!(Initialized.after(Operation::Terminate), Terminated);
        assert_eq!(Terminated.after(Operation::Free), Freed);
    }

    #[test]
    fn test_check_reports_invalid_state() {
        let err = LifecycleState::Instantiated.check(Operation::DoStep).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert!(err.to_string().contains("DoStep"));
    }

    #[test]
    fn test_flags_reset() {
        let mut flags = RunFlags::fresh(true);
        assert!(flags.first_step && flags.first_get && flags.setup_done);
        flags.set_count = 3;
        flags.get_this_step = true;
        flags.next_step();
        assert_eq!(flags.set_count, 0);
        assert!(!flags.get_this_step);
    }
}
