// src/backend.rs
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Duration;

use crate::error::Fault;
use crate::exec::OrderedExecutor;
use crate::order;
use crate::task::{Task, TaskPoll};
use crate::time::{self, InstantClock, SteadyClock};

/// Identifier of a registered task. Issued monotonically starting at 1, never
/// reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

/// A type-erased registry entry: a task plus its completion side effects.
pub(crate) trait Registered {
    fn resume(&mut self) -> TaskPoll;

    fn done(&self) -> bool;

    /// Runs the entry's completion side effects. Called exactly once, when the
    /// entry leaves the registry. A terminal task fires its finish callback
    /// (or surfaces its fault); a non-terminal one fires its cancel callback.
    fn finalize(&mut self) -> Result<(), Fault>;
}

pub(crate) struct RunnerEntry<T: 'static> {
    task: Task<T>,
    on_finish: Option<Box<dyn FnOnce(T)>>,
    on_cancel: Option<Box<dyn FnOnce()>>,
}

impl<T: 'static> RunnerEntry<T> {
    pub(crate) fn new(
        task: Task<T>,
        on_finish: Option<Box<dyn FnOnce(T)>>,
        on_cancel: Option<Box<dyn FnOnce()>>,
    ) -> Self {
        Self {
            task,
            on_finish,
            on_cancel,
        }
    }
}

impl<T: 'static> Registered for RunnerEntry<T> {
    fn resume(&mut self) -> TaskPoll {
        self.task.resume()
    }

    fn done(&self) -> bool {
        self.task.done()
    }

    fn finalize(&mut self) -> Result<(), Fault> {
        if self.task.done() {
            match self.task.take_output() {
                Ok(value) => {
                    if let Some(cb) = self.on_finish.take() {
                        cb(value);
                    }
                    Ok(())
                }
                Err(fault) => {
                    if let Some(cb) = self.on_cancel.take() {
                        cb();
                    }
                    Err(fault)
                }
            }
        } else {
            if let Some(cb) = self.on_cancel.take() {
                cb();
            }
            Ok(())
        }
    }
}

// ----------------------------- registry -----------------------------

struct Entry {
    // Taken out of the slot while the unit is being resumed, so user code
    // reached from the resume can re-borrow the registry.
    unit: Option<Box<dyn Registered>>,
}

/// Id-ordered task table driven by [`update`].
pub(crate) struct Registry {
    next_id: u64,
    entries: BTreeMap<u64, Entry>,
    current: Option<TaskId>,
    current_removal_needed: bool,
    updating: bool,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 1,
            entries: BTreeMap::new(),
            current: None,
            current_removal_needed: false,
            updating: false,
        }
    }

    fn insert(&mut self, unit: Box<dyn Registered>) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id.0, Entry { unit: Some(unit) });
        tracing::trace!(id = id.0, "task registered");
        id
    }

    /// True once the task has finished (or was cancelled) and left the
    /// registry. False for running tasks and for ids never issued.
    pub(crate) fn is_done(&self, id: TaskId) -> bool {
        match self.entries.get(&id.0) {
            Some(entry) => entry.unit.as_ref().is_some_and(|u| u.done()),
            None => id.0 < self.next_id,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

fn finalize_guarded(mut unit: Box<dyn Registered>) -> Result<(), Fault> {
    match catch_unwind(AssertUnwindSafe(|| unit.finalize())) {
        Ok(result) => result,
        Err(payload) => Err(Fault::panicked(payload)),
    }
}

/// Registers a unit, resuming it once synchronously first. A unit that
/// completes on that first resume is finalized immediately and never enters
/// the registry (`Ok(None)`); a fault from that first step is returned here
/// rather than from a later [`update`].
pub(crate) fn add_to(
    registry: &Rc<RefCell<Registry>>,
    mut unit: Box<dyn Registered>,
) -> Result<Option<TaskId>, Fault> {
    // First resume happens before the unit is registered, with no registry
    // borrow held, so the body may itself spawn.
    if unit.resume() == TaskPoll::Ready {
        tracing::trace!("task finished at spawn");
        finalize_guarded(unit)?;
        return Ok(None);
    }
    Ok(Some(registry.borrow_mut().insert(unit)))
}

/// One tick: resumes every registered unit once, in id order, and finalizes
/// the ones that reached a terminal state or requested removal.
///
/// Units registered during the sweep first run on the next tick. The first
/// fault surfaced by a finalizer is returned after the sweep completes; the
/// sweep itself is never cut short. Re-entrant calls panic.
pub(crate) fn update(registry: &Rc<RefCell<Registry>>) -> Result<(), Fault> {
    let ids: Vec<u64> = {
        let mut reg = registry.borrow_mut();
        if reg.updating {
            panic!("registry update is not re-entrant");
        }
        reg.updating = true;
        reg.entries.keys().copied().collect()
    };

    let mut first_fault: Option<Fault> = None;

    for id in ids {
        let mut unit = {
            let mut reg = registry.borrow_mut();
            let Some(entry) = reg.entries.get_mut(&id) else {
                // Removed earlier in this same sweep.
                continue;
            };
            let unit = entry.unit.take().expect("registry entry already resuming");
            reg.current = Some(TaskId(id));
            reg.current_removal_needed = false;
            unit
        };

        unit.resume();

        let finished = {
            let mut reg = registry.borrow_mut();
            reg.current = None;
            let removal_requested = std::mem::take(&mut reg.current_removal_needed);
            if removal_requested || unit.done() {
                reg.entries.remove(&id);
                Some(unit)
            } else {
                let entry = reg
                    .entries
                    .get_mut(&id)
                    .expect("registry entry vanished mid-sweep");
                entry.unit = Some(unit);
                None
            }
        };

        // Finalized with no registry borrow held; the callbacks may spawn or
        // remove freely.
        if let Some(unit) = finished {
            tracing::trace!(id, "task left registry");
            if let Err(fault) = finalize_guarded(unit) {
                tracing::debug!(id, fault = %fault, "task faulted");
                if first_fault.is_none() {
                    first_fault = Some(fault);
                }
            }
        }
    }

    registry.borrow_mut().updating = false;

    match first_fault {
        Some(fault) => Err(fault),
        None => Ok(()),
    }
}

/// Removes a unit and runs its cancel side effects. Removing the unit that is
/// currently being resumed is deferred to the end of its step. Unknown ids
/// are ignored.
pub(crate) fn remove(registry: &Rc<RefCell<Registry>>, id: TaskId) -> Result<(), Fault> {
    let unit = {
        let mut reg = registry.borrow_mut();
        if reg.current == Some(id) {
            tracing::trace!(id = id.0, "self-removal deferred to end of step");
            reg.current_removal_needed = true;
            return Ok(());
        }
        match reg.entries.remove(&id.0) {
            Some(entry) => entry.unit,
            None => None,
        }
    };
    match unit {
        Some(unit) => finalize_guarded(unit),
        None => Ok(()),
    }
}

// ----------------------------- backend -----------------------------

/// The per-context scheduler: a task registry plus ordered draw and input
/// dispatch and an injected clock.
///
/// There is no global instance. Create one per simulation or UI loop and call
/// [`update`], [`draw`] and [`dispatch_input`] from that loop. Everything is
/// single-threaded; handles into the backend are `Rc`-based and not `Send`.
///
/// [`update`]: Backend::update
/// [`draw`]: Backend::draw
/// [`dispatch_input`]: Backend::dispatch_input
pub struct Backend {
    pub(crate) registry: Rc<RefCell<Registry>>,
    drawers: Rc<RefCell<OrderedExecutor>>,
    input: Rc<RefCell<OrderedExecutor>>,
    clock: Rc<dyn SteadyClock>,
}

impl Default for Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend {
    pub fn new() -> Self {
        Self::with_clock(Rc::new(InstantClock::new()))
    }

    pub fn with_clock(clock: Rc<dyn SteadyClock>) -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry::new())),
            drawers: Rc::new(RefCell::new(OrderedExecutor::new())),
            input: Rc::new(RefCell::new(OrderedExecutor::new())),
            clock,
        }
    }

    /// Advances every registered task by one step. See [`update`](self::update)
    /// for sweep semantics; the first fault observed is returned after the
    /// full sweep.
    pub fn update(&self) -> Result<(), Fault> {
        update(&self.registry)
    }

    /// Invokes every registered input caller in ascending order.
    pub fn dispatch_input(&self) {
        self.input.borrow_mut().call();
    }

    /// Invokes every registered drawer in ascending order.
    pub fn draw(&self) {
        self.drawers.borrow_mut().call();
    }

    pub fn clock(&self) -> Rc<dyn SteadyClock> {
        self.clock.clone()
    }

    /// Completes once `duration` has elapsed on this backend's clock, measured
    /// from the task's first resume.
    pub fn delay(&self, duration: Duration) -> Task<()> {
        time::delay(duration, self.clock.clone())
    }

    /// Number of tasks currently registered.
    pub fn task_count(&self) -> usize {
        self.registry.borrow().len()
    }

    pub fn is_done(&self, id: TaskId) -> bool {
        self.registry.borrow().is_done(id)
    }

    /// Registers a drawer whose order is re-evaluated each [`draw`] cycle.
    /// Dropped with the returned handle.
    ///
    /// [`draw`]: Backend::draw
    pub fn add_drawer(
        &self,
        draw: impl FnMut() + 'static,
        order_fn: impl Fn() -> i32 + 'static,
    ) -> ScopedDrawer {
        let id = self.drawers.borrow_mut().add(draw, order_fn);
        ScopedDrawer {
            exec: Rc::downgrade(&self.drawers),
            id: Some(id),
        }
    }

    /// Registers a drawer at a fixed order.
    pub fn add_drawer_at(&self, draw: impl FnMut() + 'static, order: i32) -> ScopedDrawer {
        self.add_drawer(draw, move || order)
    }

    /// Registers an input caller invoked by [`dispatch_input`], ordered like
    /// drawers.
    ///
    /// [`dispatch_input`]: Backend::dispatch_input
    pub fn add_input_caller(
        &self,
        call: impl FnMut() + 'static,
        order_fn: impl Fn() -> i32 + 'static,
    ) -> ScopedInputCaller {
        let id = self.input.borrow_mut().add(call, order_fn);
        ScopedInputCaller {
            exec: Rc::downgrade(&self.input),
            id: Some(id),
        }
    }

    pub fn has_active_drawer(&self, order: i32) -> bool {
        self.drawers.borrow().has_order(order)
    }

    pub fn has_active_drawer_in_range(&self, min: i32, max: i32) -> bool {
        self.drawers.borrow().has_order_in_range(min, max)
    }

    /// True while any drawer sits in the modal band.
    pub fn has_active_modal(&self) -> bool {
        self.has_active_drawer_in_range(order::MODAL_MIN, order::MODAL_MAX)
    }
}

// ----------------------------- scoped caller handles -----------------------------

/// Owns a drawer registration; unregisters on drop.
pub struct ScopedDrawer {
    exec: std::rc::Weak<RefCell<OrderedExecutor>>,
    id: Option<crate::exec::CallerId>,
}

impl ScopedDrawer {
    /// Leaves the drawer registered for the backend's remaining lifetime.
    pub fn forget(mut self) {
        self.id = None;
    }
}

impl Drop for ScopedDrawer {
    fn drop(&mut self) {
        if let (Some(id), Some(exec)) = (self.id.take(), self.exec.upgrade()) {
            exec.borrow_mut().remove(id);
        }
    }
}

/// Owns an input caller registration; unregisters on drop.
pub struct ScopedInputCaller {
    exec: std::rc::Weak<RefCell<OrderedExecutor>>,
    id: Option<crate::exec::CallerId>,
}

impl ScopedInputCaller {
    pub fn forget(mut self) {
        self.id = None;
    }
}

impl Drop for ScopedInputCaller {
    fn drop(&mut self) {
        if let (Some(id), Some(exec)) = (self.id.take(), self.exec.upgrade()) {
            exec.borrow_mut().remove(id);
        }
    }
}
