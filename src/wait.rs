// src/wait.rs
//
// Frame- and predicate-based wait primitives. All of these are ordinary tasks:
// they advance one step per resume and observe nothing between ticks.

use crate::source::TaskFinishSource;
use crate::task::{Step, Task};

/// Completes after `frames` resumes. `delay_frames(0)` completes on its first
/// resume without suspending.
pub fn delay_frames(frames: u32) -> Task<()> {
    let mut remaining = frames;
    Task::from_fn(move || {
        if remaining == 0 {
            Step::Done(())
        } else {
            remaining -= 1;
            Step::Pending
        }
    })
}

/// Suspends exactly once.
pub fn next_frame() -> Task<()> {
    delay_frames(1)
}

/// Never completes. Useful as the body of a task that only exists for its
/// companions or its cancel callback.
pub fn never() -> Task<()> {
    Task::from_fn(|| Step::Pending)
}

/// Completes on the first resume at which `predicate` returns true.
pub fn wait_until(mut predicate: impl FnMut() -> bool + 'static) -> Task<()> {
    Task::from_fn(move || {
        if predicate() {
            Step::Done(())
        } else {
            Step::Pending
        }
    })
}

/// Completes on the first resume at which `predicate` returns false.
pub fn wait_while(mut predicate: impl FnMut() -> bool + 'static) -> Task<()> {
    wait_until(move || !predicate())
}

/// Polls `f` once per resume until it yields a value.
pub fn wait_for<T: 'static>(mut f: impl FnMut() -> Option<T> + 'static) -> Task<T> {
    Task::from_fn(move || match f() {
        Some(value) => Step::Done(value),
        None => Step::Pending,
    })
}

/// Runs `update` once per resume, forever. Pair with a scoped runner (or
/// `any`) to bound its lifetime.
pub fn updater(mut update: impl FnMut() + 'static) -> Task<()> {
    Task::from_fn(move || {
        update();
        Step::Pending
    })
}

/// Runs `update` once per resume with a private finish source; completes with
/// the source's result as soon as one has been requested.
pub fn updater_task<T: 'static>(
    mut update: impl FnMut(&TaskFinishSource<T>) + 'static,
) -> Task<T> {
    let source = TaskFinishSource::new();
    Task::from_fn(move || {
        update(&source);
        if source.has_result() {
            match source.result() {
                Ok(value) => Step::Done(value),
                Err(misuse) => Step::Fault(crate::error::Fault::new(misuse.to_string())),
            }
        } else {
            Step::Pending
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskPoll;

    #[test]
    fn delay_frames_counts_resumes() {
        let mut task = delay_frames(2);
        assert_eq!(task.resume(), TaskPoll::Pending);
        assert_eq!(task.resume(), TaskPoll::Pending);
        assert_eq!(task.resume(), TaskPoll::Ready);
    }

    #[test]
    fn delay_zero_frames_is_immediate() {
        let mut task = delay_frames(0);
        assert_eq!(task.resume(), TaskPoll::Ready);
    }

    #[test]
    fn wait_until_checks_on_each_resume() {
        let mut countdown = 2;
        let mut task = wait_until(move || {
            countdown -= 1;
            countdown == 0
        });
        assert_eq!(task.resume(), TaskPoll::Pending);
        assert_eq!(task.resume(), TaskPoll::Ready);
    }

    #[test]
    fn updater_task_completes_once_result_is_requested() {
        let mut calls = 0;
        let mut task = updater_task(move |source| {
            calls += 1;
            if calls == 3 {
                assert!(source.request_finish(calls));
            }
        });
        assert_eq!(task.resume(), TaskPoll::Pending);
        assert_eq!(task.resume(), TaskPoll::Pending);
        assert_eq!(task.resume(), TaskPoll::Ready);
        assert_eq!(task.value().unwrap(), 3);
    }
}
