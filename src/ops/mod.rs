// src/ops/mod.rs
//
// Tuple combinators over tasks. Each combinator is itself an ordinary task:
// one resume of the combined task resumes every still-pending branch once.

mod all;
mod any;

pub use all::{all, AllTuple};
pub use any::{any, AnyTuple};

use crate::error::Fault;
use crate::task::Task;

/// One branch of a tuple combinator.
pub(crate) enum Arm<T: 'static> {
    Running(Task<T>),
    Finished(Option<Result<T, Fault>>),
}

impl<T: 'static> Arm<T> {
    pub(crate) fn new(task: Task<T>) -> Self {
        Arm::Running(task)
    }

    /// Resumes the branch once if it is still running; captures the result
    /// when it reaches a terminal state.
    pub(crate) fn resume_pending(&mut self) {
        if let Arm::Running(task) = self {
            if !task.done() {
                task.resume();
            }
            if task.done() {
                let result = task.take_output();
                *self = Arm::Finished(Some(result));
            }
        }
    }

    pub(crate) fn done(&self) -> bool {
        matches!(self, Arm::Finished(_))
    }

    /// Drains a stored fault, if any.
    pub(crate) fn take_fault(&mut self) -> Option<Fault> {
        if let Arm::Finished(slot) = self {
            if matches!(slot, Some(Err(_))) {
                if let Some(Err(fault)) = slot.take() {
                    return Some(fault);
                }
            }
        }
        None
    }

    /// Takes the success value. Callers check `done` and drain faults first.
    pub(crate) fn take_value(&mut self) -> T {
        match self {
            Arm::Finished(slot) => match slot.take() {
                Some(Ok(value)) => value,
                _ => panic!("combinator arm has no value to take"),
            },
            Arm::Running(_) => panic!("combinator arm is still running"),
        }
    }

    /// Takes the success value if the branch finished, `None` otherwise.
    pub(crate) fn try_take_value(&mut self) -> Option<T> {
        if let Arm::Finished(slot) = self {
            if let Some(Ok(value)) = slot.take() {
                return Some(value);
            }
        }
        None
    }
}
