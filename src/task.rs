// src/task.rs
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{Fault, ProgrammingError, TaskError};

/// Progress reported by one resume step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPoll {
    Pending,
    Ready,
}

/// Directive returned by a task body for one logical step.
#[derive(Debug)]
pub enum Step<T> {
    /// Suspend; run again on the next resume.
    Pending,
    /// Complete with a value.
    Done(T),
    /// Complete with a failure.
    Fault(Fault),
}

/// Object-safe suspendable unit: exactly one logical step per `resume` call.
pub trait Resumable {
    fn resume(&mut self) -> TaskPoll;

    fn done(&self) -> bool;
}

/// A task body: a hand-written state machine advanced one step at a time.
pub(crate) trait Body {
    type Output;

    fn step(&mut self) -> Step<Self::Output>;
}

impl<T, F> Body for F
where
    F: FnMut() -> Step<T>,
{
    type Output = T;

    fn step(&mut self) -> Step<T> {
        (self)()
    }
}

// ----------------------------- completion slot -----------------------------

enum Slot<T> {
    Empty,
    Ready(Result<T, Fault>),
    Taken,
}

impl<T> Slot<T> {
    fn is_set(&self) -> bool {
        !matches!(self, Slot::Empty)
    }
}

/// Where a companion runs relative to the primary unit's own step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanionTiming {
    Before,
    After,
}

// ----------------------------- Task -----------------------------

/// A suspendable computation with a result or failure, resumable one logical
/// step at a time.
///
/// A task is created suspended and advances only through explicit [`resume`]
/// calls, one per tick. Once the body reaches a terminal state the completion
/// slot is set exactly once and [`done`] reports true; the result may then be
/// read at most once through [`value`]. A panic inside the body is captured
/// and stored as a [`Fault`] instead of unwinding into the scheduler.
///
/// [`resume`]: Task::resume
/// [`done`]: Task::done
/// [`value`]: Task::value
#[must_use = "a task does nothing until resumed or run on a backend"]
pub struct Task<T: 'static> {
    body: Option<Box<dyn Body<Output = T>>>,
    slot: Slot<T>,
    before: Vec<Box<dyn Resumable>>,
    after: Vec<Box<dyn Resumable>>,
}

impl<T: 'static> Task<T> {
    pub(crate) fn from_body(body: impl Body<Output = T> + 'static) -> Self {
        Self {
            body: Some(Box::new(body)),
            slot: Slot::Empty,
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    /// Wraps a closure state machine into a task.
    pub fn from_fn(f: impl FnMut() -> Step<T> + 'static) -> Self {
        Self::from_body(f)
    }

    /// A task that completes with `value` on its first resume.
    pub fn from_result(value: T) -> Self {
        let mut value = Some(value);
        Self::from_fn(move || Step::Done(value.take().expect("result already produced")))
    }

    /// A task that completes with a fault on its first resume.
    pub fn fail(fault: impl Into<Fault>) -> Self {
        let mut fault = Some(fault.into());
        Self::from_fn(move || Step::Fault(fault.take().expect("fault already produced")))
    }

    /// Advances this unit by at most one logical step.
    ///
    /// Before-companions run first, then the unit's own body (with a pending
    /// sub-unit drained first, see [`then`]), then after-companions. Once the
    /// unit is terminal this is a no-op and companions no longer run.
    ///
    /// [`then`]: Task::then
    pub fn resume(&mut self) -> TaskPoll {
        if self.done() {
            return TaskPoll::Ready;
        }

        for companion in &mut self.before {
            companion.resume();
        }

        self.step_body();

        for companion in &mut self.after {
            companion.resume();
        }

        if self.done() {
            TaskPoll::Ready
        } else {
            TaskPoll::Pending
        }
    }

    fn step_body(&mut self) {
        let Some(body) = self.body.as_mut() else {
            return;
        };

        match catch_unwind(AssertUnwindSafe(|| body.step())) {
            Ok(Step::Pending) => {}
            Ok(Step::Done(value)) => {
                self.slot = Slot::Ready(Ok(value));
                self.body = None;
            }
            Ok(Step::Fault(fault)) => {
                self.slot = Slot::Ready(Err(fault));
                self.body = None;
            }
            Err(payload) => {
                self.slot = Slot::Ready(Err(Fault::panicked(payload)));
                self.body = None;
            }
        }
    }

    /// True once the task has completed or faulted.
    pub fn done(&self) -> bool {
        self.slot.is_set()
    }

    /// Takes the produced result. Read-once: a second call fails, as does a
    /// call before completion. A stored fault is surfaced (and consumed) here.
    pub fn value(&mut self) -> Result<T, TaskError> {
        match std::mem::replace(&mut self.slot, Slot::Taken) {
            Slot::Empty => {
                self.slot = Slot::Empty;
                Err(ProgrammingError::NotDone.into())
            }
            Slot::Taken => Err(ProgrammingError::AlreadyTaken.into()),
            Slot::Ready(Ok(value)) => Ok(value),
            Slot::Ready(Err(fault)) => Err(fault.into()),
        }
    }

    /// Internal result accessor for owners that know the task is terminal and
    /// untouched (combinators, registry entries).
    pub(crate) fn take_output(&mut self) -> Result<T, Fault> {
        match std::mem::replace(&mut self.slot, Slot::Taken) {
            Slot::Ready(result) => result,
            Slot::Empty => {
                self.slot = Slot::Empty;
                Err(Fault::new("result requested before the task completed"))
            }
            Slot::Taken => Err(Fault::new("task result was already taken")),
        }
    }

    // ---------------- composition ----------------

    /// Attaches a fire-and-forget companion resumed immediately after this
    /// unit's own step each tick. The companion's completion does not affect
    /// this task's completion.
    pub fn with<U: 'static>(self, companion: Task<U>) -> Task<T> {
        self.with_timing(companion, CompanionTiming::After)
    }

    pub fn with_timing<U: 'static>(
        mut self,
        companion: Task<U>,
        timing: CompanionTiming,
    ) -> Task<T> {
        match timing {
            CompanionTiming::Before => self.before.push(Box::new(companion)),
            CompanionTiming::After => self.after.push(Box::new(companion)),
        }
        self
    }

    /// Sequential composition: once this task completes, `f` builds the next
    /// task, which is resumed once immediately. A chain of stages that finish
    /// without suspending completes within a single resume. A fault skips `f`
    /// and propagates.
    pub fn then<U: 'static>(self, f: impl FnOnce(T) -> Task<U> + 'static) -> Task<U> {
        Task::from_body(ThenBody {
            first: Some(self),
            f: Some(f),
            second: None,
        })
    }

    pub fn map<U: 'static>(self, f: impl FnOnce(T) -> U + 'static) -> Task<U> {
        self.then(|value| Task::from_result(f(value)))
    }

    pub fn discard_result(self) -> Task<()> {
        self.map(|_| ())
    }
}

impl<T: 'static> Resumable for Task<T> {
    fn resume(&mut self) -> TaskPoll {
        Task::resume(self)
    }

    fn done(&self) -> bool {
        Task::done(self)
    }
}

// ----------------------------- sequential await -----------------------------

// The current sub-unit is drained first; the outer body advances only once the
// sub-unit is gone, within the same step it finished in.
struct ThenBody<T: 'static, U: 'static, F> {
    first: Option<Task<T>>,
    f: Option<F>,
    second: Option<Task<U>>,
}

impl<T, U, F> Body for ThenBody<T, U, F>
where
    F: FnOnce(T) -> Task<U>,
{
    type Output = U;

    fn step(&mut self) -> Step<U> {
        if let Some(first) = self.first.as_mut() {
            if !first.done() {
                first.resume();
            }
            if !first.done() {
                return Step::Pending;
            }
            let value = match first.take_output() {
                Ok(value) => value,
                Err(fault) => return Step::Fault(fault),
            };
            self.first = None;

            let f = self.f.take().expect("continuation already consumed");
            self.second = Some(f(value));
        }

        let second = self.second.as_mut().expect("sub-task missing");
        if !second.done() {
            second.resume();
        }
        if !second.done() {
            return Step::Pending;
        }
        match second.take_output() {
            Ok(value) => Step::Done(value),
            Err(fault) => Step::Fault(fault),
        }
    }
}
