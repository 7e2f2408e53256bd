// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stepping and value exchange.
//!
//! The simulation sends its outputs first, then waits for inputs. One step
//! therefore reads the outputs of the current point (unless a GetReal already
//! did) and writes the inputs; the reply to those inputs is the outputs of the
//! next point, read lazily by the next GetReal or DoStep.

use crate::codec::WireMessage;
use crate::config::{FLAG_DATA, INPUT_VR_OFFSET, OUTPUT_VR_OFFSET, TIME_TOLERANCE};
use crate::error::{Error, Result, Status};
use crate::model::VariableKind;

use super::{Instance, LifecycleState, Operation};

impl Instance {
    /// Advance the simulation from `current` by `step` seconds.
    pub fn do_step(&mut self, current: f64, step: f64, no_rollback: bool) -> Result<Status> {
        let result = self.try_do_step(current, step, no_rollback);
        self.reported(result)
    }

    fn try_do_step(&mut self, current: f64, step: f64, no_rollback: bool) -> Result<Status> {
        self.state.check(Operation::DoStep)?;
        let first = self.flags.first_step;
        let Self { experiment, clock, .. } = *self;
        let mut status = Status::Ok;

        if first && (current - experiment.start).abs() > TIME_TOLERANCE {
            return Err(Error::StartTimeMismatch {
                expected: experiment.start,
                found: current,
            });
        }
        if !no_rollback {
            status = self.warn("rollback is not supported; noSetFMUStatePriorToCurrentPoint is ignored");
        }
        if step == 0.0 {
            return Err(Error::InvalidStepSize);
        }
        let expected = clock.step_size();
        if (step - expected).abs() > TIME_TOLERANCE {
            return Err(Error::StepSizeMismatch {
                expected,
                found: step,
            });
        }
        if current < 0.0 || (!first && (current < clock.current || current > clock.next)) {
            return Err(Error::ProtocolDesync(format!(
                "communication point {} must be positive and monotonically increasing",
                current
            )));
        }
        if !first && (current - clock.next).abs() > TIME_TOLERANCE {
            return Err(Error::ProtocolDesync(format!(
                "communication point {} is not the previous point plus the step size ({})",
                current, clock.next
            )));
        }
        if (current - experiment.stop).abs() <= TIME_TOLERANCE {
            return Ok(self.warn(format!(
                "communication point {} is the end of the simulation",
                current
            )));
        }
        if current > experiment.stop {
            return Err(Error::BeyondStopTime {
                point: current,
                stop: experiment.stop,
            });
        }
        if current + step > experiment.stop {
            return Err(Error::BeyondStopTime {
                point: current + step,
                stop: experiment.stop,
            });
        }

        self.exchange(current)?;

        self.clock.current = current;
        self.clock.next = current + step;
        self.flags.first_step = false;
        self.state = self.state.after(Operation::DoStep);
        log::trace!("[epfmu] {}: stepped {} -> {}", self.name, current, self.clock.next);
        Ok(status)
    }

    fn exchange(&mut self, current: f64) -> Result<()> {
        self.flags.outputs_pending = true;
        if !self.flags.get_this_step {
            self.receive_outputs()?;
        }
        let inputs = WireMessage::data(current, self.inputs.clone());
        self.transport.channel()?.write_message(&inputs)?;
        self.flags.next_step();
        Ok(())
    }

    fn receive_outputs(&mut self) -> Result<()> {
        let msg = self.transport.channel()?.read_message()?;
        if msg.flag != FLAG_DATA {
            return Err(Error::ProtocolDesync(format!(
                "simulation sent flag {} instead of outputs",
                msg.flag
            )));
        }
        if msg.doubles.len() != self.outputs.len() {
            return Err(Error::ProtocolDesync(format!(
                "simulation sent {} outputs, model declares {}",
                msg.doubles.len(),
                self.outputs.len()
            )));
        }
        self.outputs.copy_from_slice(&msg.doubles);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Reals
    // ------------------------------------------------------------------------

    /// Store input values for the next step.
    ///
    /// Does nothing before initialization completed. References that are not
    /// inputs of the model are ignored.
    pub fn set_real(&mut self, vrs: &[u32], values: &[f64]) -> Result<Status> {
        let result = self.try_set_real(vrs, values);
        self.reported(result)
    }

    fn try_set_real(&mut self, vrs: &[u32], values: &[f64]) -> Result<Status> {
        self.state.check(Operation::SetReal)?;
        check_lengths(vrs.len(), values.len())?;
        if !self.flags.init_done {
            return Ok(Status::Ok);
        }

        for (&vr, &value) in vrs.iter().zip(values) {
            if !self.input_refs.contains(&vr) {
                continue;
            }
            let slot = vr
                .checked_sub(INPUT_VR_OFFSET)
                .and_then(|i| self.inputs.get_mut(i as usize));
            if let Some(slot) = slot {
                *slot = value;
                self.flags.set_count = (self.flags.set_count + 1).min(self.inputs.len());
            } else {
                log::debug!("[epfmu] {}: input reference {} outside the input vector", self.name, vr);
            }
        }
        Ok(Status::Ok)
    }

    /// Read output values of the current point.
    ///
    /// Does nothing before initialization completed. Entries of `values`
    /// whose reference is not an output are left untouched.
    pub fn get_real(&mut self, vrs: &[u32], values: &mut [f64]) -> Result<Status> {
        let result = self.try_get_real(vrs, values);
        self.reported(result)
    }

    fn try_get_real(&mut self, vrs: &[u32], values: &mut [f64]) -> Result<Status> {
        self.state.check(Operation::GetReal)?;
        check_lengths(vrs.len(), values.len())?;
        if !self.flags.init_done {
            return Ok(Status::Ok);
        }

        self.flags.get_this_step = true;
        if self.flags.first_get || self.flags.outputs_pending {
            self.receive_outputs()?;
            self.flags.outputs_pending = false;
        }
        self.flags.first_get = false;

        for (&vr, value) in vrs.iter().zip(values.iter_mut()) {
            if !self.output_refs.contains(&vr) {
                continue;
            }
            if let Some(&output) = vr
                .checked_sub(OUTPUT_VR_OFFSET)
                .and_then(|i| self.outputs.get(i as usize))
            {
                *value = output;
                self.flags.get_count = (self.flags.get_count + 1).min(self.outputs.len());
            }
        }
        Ok(Status::Ok)
    }

    /// `true` once every input was set since the last step.
    pub fn inputs_ready(&self) -> bool {
        self.flags.set_count >= self.inputs.len()
    }

    /// `true` once every output was read since the last step.
    pub fn outputs_ready(&self) -> bool {
        self.flags.get_count >= self.outputs.len()
    }

    // ------------------------------------------------------------------------
    // Other types
    // ------------------------------------------------------------------------

    /// Integer, boolean and string access.
    ///
    /// Only reals are exchanged with the simulation: an empty request is
    /// accepted, anything else fails with [`Error::UnsupportedType`].
    pub fn access_non_real(&self, kind: VariableKind, count: usize) -> Result<Status> {
        let result = self.try_access_non_real(kind, count);
        self.reported(result)
    }

    fn try_access_non_real(&self, kind: VariableKind, count: usize) -> Result<Status> {
        if !self.state.is_live() {
            return Err(Error::InvalidState(format!(
                "{:?} access is not allowed while {}",
                kind, self.state
            )));
        }
        if count == 0 {
            return Ok(Status::Ok);
        }
        let name = match kind {
            VariableKind::Integer => "Integer",
            VariableKind::Boolean => "Boolean",
            VariableKind::String => "String",
            VariableKind::Enumeration => "Enumeration",
            VariableKind::Real | VariableKind::Other => "Non-real",
        };
        Err(Error::UnsupportedType(name))
    }

    /// `true` when DoStep may be called.
    pub fn can_step(&self) -> bool {
        matches!(
            self.state,
            LifecycleState::Initializing | LifecycleState::Initialized
        ) && self.flags.init_done
    }
}

fn check_lengths(refs: usize, values: usize) -> Result<()> {
    if refs == values {
        Ok(())
    } else {
        Err(Error::InvalidState(format!(
            "{} value references but {} values",
            refs, values
        )))
    }
}
