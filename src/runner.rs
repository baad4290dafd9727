// src/runner.rs
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::backend::{self, Backend, Registry, RunnerEntry, TaskId};
use crate::error::Fault;
use crate::task::Task;
use crate::wait;

fn runner_done(registry: &Weak<RefCell<Registry>>, id: Option<TaskId>) -> bool {
    let Some(id) = id else {
        return true;
    };
    match registry.upgrade() {
        Some(registry) => registry.borrow().is_done(id),
        // Backend gone; the task was torn down with it.
        None => true,
    }
}

/// Owning handle for a task running on a [`Backend`].
///
/// Dropping the handle cancels the task: it is removed from the registry and
/// its cancel callback fires. Call [`forget`] to detach instead and let the
/// task run to completion on its own.
///
/// [`forget`]: ScopedTaskRunner::forget
#[must_use = "dropping the runner cancels the task"]
pub struct ScopedTaskRunner {
    registry: Weak<RefCell<Registry>>,
    id: Option<TaskId>,
}

impl ScopedTaskRunner {
    pub fn done(&self) -> bool {
        runner_done(&self.registry, self.id)
    }

    /// Detaches the task from this handle. The task keeps running until it
    /// completes on its own or the backend is dropped.
    pub fn forget(mut self) {
        self.id = None;
    }

    /// Cancels the task now. Returns false if it already finished (or was
    /// forgotten); the finish callback will not fire after a true return.
    pub fn request_cancel(&mut self) -> bool {
        if self.done() {
            return false;
        }
        self.cancel_now();
        true
    }

    /// Completes once the task has finished or been cancelled. The returned
    /// task observes the registry through this handle, so it also completes
    /// if the backend goes away.
    pub fn wait_until_done(&self) -> Task<()> {
        let registry = self.registry.clone();
        let id = self.id;
        wait::wait_until(move || runner_done(&registry, id))
    }

    /// Moves this runner into `multi`.
    pub fn add_to(self, multi: &mut MultiRunner) {
        multi.add(self);
    }

    fn cancel_now(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        if let Err(fault) = backend::remove(&registry, id) {
            tracing::warn!(fault = %fault, "cancel callback failed");
        }
    }
}

impl Drop for ScopedTaskRunner {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

/// A bag of [`ScopedTaskRunner`]s managed as one unit.
#[derive(Default)]
pub struct MultiRunner {
    runners: Vec<ScopedTaskRunner>,
}

impl MultiRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, runner: ScopedTaskRunner) {
        self.runners.push(runner);
    }

    /// Drops every held runner, cancelling the tasks still running.
    pub fn clear(&mut self) {
        self.runners.clear();
    }

    /// Cancels every task still running. Finished tasks are unaffected.
    pub fn request_cancel_all(&mut self) {
        for runner in &mut self.runners {
            runner.request_cancel();
        }
    }

    /// True when every held task has finished. Vacuously true when empty.
    pub fn all_done(&self) -> bool {
        self.runners.iter().all(ScopedTaskRunner::done)
    }

    /// True when at least one held task has finished. False when empty.
    pub fn any_done(&self) -> bool {
        self.runners.iter().any(ScopedTaskRunner::done)
    }

    /// Completes once every task held *at call time* has finished. Runners
    /// added afterwards are not observed.
    pub fn wait_until_all_done(&self) -> Task<()> {
        let snapshot = self.snapshot();
        wait::wait_until(move || snapshot.iter().all(|(reg, id)| runner_done(reg, *id)))
    }

    /// Completes once any task held *at call time* has finished. Never
    /// completes if the bag was empty at call time.
    pub fn wait_until_any_done(&self) -> Task<()> {
        let snapshot = self.snapshot();
        wait::wait_until(move || snapshot.iter().any(|(reg, id)| runner_done(reg, *id)))
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }

    fn snapshot(&self) -> Vec<(Weak<RefCell<Registry>>, Option<TaskId>)> {
        self.runners
            .iter()
            .map(|r| (r.registry.clone(), r.id))
            .collect()
    }
}

impl<T: 'static> Task<T> {
    /// Registers this task on `backend` and returns an owning handle.
    ///
    /// The task is resumed once synchronously; one that completes on that
    /// first step never enters the registry and the returned handle is
    /// already done. A fault from that first step is returned here.
    pub fn run_scoped(self, backend: &Backend) -> Result<ScopedTaskRunner, Fault> {
        let entry = RunnerEntry::new(self, None, None);
        spawn(backend, Box::new(entry))
    }

    /// Like [`run_scoped`], with completion side effects: `on_finish` fires
    /// with the result when the task completes, `on_cancel` fires when it is
    /// removed before completing (or faults).
    ///
    /// [`run_scoped`]: Task::run_scoped
    pub fn run_scoped_with(
        self,
        backend: &Backend,
        on_finish: impl FnOnce(T) + 'static,
        on_cancel: impl FnOnce() + 'static,
    ) -> Result<ScopedTaskRunner, Fault> {
        let entry = RunnerEntry::new(self, Some(Box::new(on_finish)), Some(Box::new(on_cancel)));
        spawn(backend, Box::new(entry))
    }
}

fn spawn(
    backend: &Backend,
    entry: Box<dyn backend::Registered>,
) -> Result<ScopedTaskRunner, Fault> {
    let id = backend::add_to(&backend.registry, entry)?;
    Ok(ScopedTaskRunner {
        registry: Rc::downgrade(&backend.registry),
        id,
    })
}
