// src/source.rs
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::ProgrammingError;
use crate::task::{Step, Task};
use crate::wait;

struct Inner<T> {
    result: Option<T>,
    consumed: bool,
}

/// One-shot bridge from externally-driven per-tick code into the task domain.
///
/// At most one result can ever be set; [`request_finish`] reports whether it
/// was the call that set it. The stored result may be read exactly once.
/// Handles are cheap to clone and share one underlying slot, so one side can
/// keep feeding results from a per-tick callback while a task produced by
/// [`wait_for_result`] observes it.
///
/// [`request_finish`]: TaskFinishSource::request_finish
/// [`wait_for_result`]: TaskFinishSource::wait_for_result
pub struct TaskFinishSource<T = ()> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for TaskFinishSource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for TaskFinishSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TaskFinishSource<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                result: None,
                consumed: false,
            })),
        }
    }

    /// Sets the result if and only if none has been set yet. Returns true
    /// exactly once across all calls on all clones of this handle.
    pub fn request_finish(&self, result: T) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.consumed || inner.result.is_some() {
            return false;
        }
        inner.result = Some(result);
        true
    }

    /// True while a result is set and not yet consumed.
    pub fn has_result(&self) -> bool {
        self.inner.borrow().result.is_some()
    }

    /// True once a result has ever been set, consumed or not.
    pub fn done(&self) -> bool {
        let inner = self.inner.borrow();
        inner.result.is_some() || inner.consumed
    }

    /// Takes the result. Read-once: fails before a result is set and fails on
    /// every call after a successful read.
    pub fn result(&self) -> Result<T, ProgrammingError> {
        let mut inner = self.inner.borrow_mut();
        if inner.consumed {
            return Err(ProgrammingError::AlreadyTaken);
        }
        match inner.result.take() {
            Some(value) => {
                inner.consumed = true;
                Ok(value)
            }
            None => Err(ProgrammingError::NoResult),
        }
    }
}

impl<T: 'static> TaskFinishSource<T> {
    /// A task that polls once per tick until a result is set, then consumes
    /// and returns it.
    pub fn wait_for_result(&self) -> Task<T> {
        let inner = self.inner.clone();
        Task::from_fn(move || {
            let mut inner = inner.borrow_mut();
            match inner.result.take() {
                Some(value) => {
                    inner.consumed = true;
                    Step::Done(value)
                }
                None => Step::Pending,
            }
        })
    }

    /// A task that polls once per tick until a result has been set (without
    /// consuming it).
    pub fn wait_until_done(&self) -> Task<()> {
        let this = self.clone();
        wait::wait_until(move || this.done())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskPoll;

    #[test]
    fn request_finish_succeeds_exactly_once() {
        let source = TaskFinishSource::new();
        assert!(source.request_finish(1));
        assert!(!source.request_finish(2));
        assert!(!source.request_finish(3));
        assert_eq!(source.result().unwrap(), 1);
    }

    #[test]
    fn result_is_read_once() {
        let source = TaskFinishSource::new();
        assert_eq!(source.result(), Err(ProgrammingError::NoResult));
        source.request_finish(5);
        assert_eq!(source.result().unwrap(), 5);
        assert_eq!(source.result(), Err(ProgrammingError::AlreadyTaken));

        // A consumed source stays latched: no new result may be set.
        assert!(!source.request_finish(6));
        assert!(source.done());
        assert!(!source.has_result());
    }

    #[test]
    fn wait_for_result_polls_until_set() {
        let source = TaskFinishSource::new();
        let mut task = source.wait_for_result();
        assert_eq!(task.resume(), TaskPoll::Pending);
        assert_eq!(task.resume(), TaskPoll::Pending);

        source.request_finish("ready");
        assert_eq!(task.resume(), TaskPoll::Ready);
        assert_eq!(task.value().unwrap(), "ready");

        // The waiting task consumed the slot.
        assert_eq!(source.result(), Err(ProgrammingError::AlreadyTaken));
    }

    #[test]
    fn unit_source_wait_until_done() {
        let source = TaskFinishSource::<()>::new();
        let mut task = source.wait_until_done();
        assert_eq!(task.resume(), TaskPoll::Pending);
        assert!(source.request_finish(()));
        assert_eq!(task.resume(), TaskPoll::Ready);
    }
}
