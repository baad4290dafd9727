// src/ops/all.rs
use super::Arm;
use crate::task::{Step, Task};

mod sealed {
    pub trait Sealed {}
}

/// Tuples of tasks joinable with [`all`]. Implemented for tuples of 2 to 4
/// tasks with independent result types.
pub trait AllTuple: sealed::Sealed + 'static {
    type Output: 'static;

    fn join(self) -> Task<Self::Output>;
}

/// Completes once every task in the tuple has completed, with the tuple of
/// their results.
///
/// Each resume of the combined task resumes every still-pending branch once,
/// so a tuple whose tasks all complete on their first step completes on the
/// combined task's first resume. The first faulting branch (argument order on
/// ties) fails the combined task; the remaining branches are dropped with it.
pub fn all<T: AllTuple>(tasks: T) -> Task<T::Output> {
    tasks.join()
}

macro_rules! all_tuple {
    ($($T:ident),+) => {
        impl<$($T: 'static),+> sealed::Sealed for ($(Task<$T>,)+) {}

        impl<$($T: 'static),+> AllTuple for ($(Task<$T>,)+) {
            type Output = ($($T,)+);

            fn join(self) -> Task<Self::Output> {
                #[allow(non_snake_case)]
                let ($($T,)+) = self;
                #[allow(non_snake_case)]
                let ($(mut $T,)+) = ($(Arm::new($T),)+);
                Task::from_fn(move || {
                    $($T.resume_pending();)+
                    $(
                        if let Some(fault) = $T.take_fault() {
                            return Step::Fault(fault);
                        }
                    )+
                    if $($T.done())&&+ {
                        Step::Done(($($T.take_value(),)+))
                    } else {
                        Step::Pending
                    }
                })
            }
        }
    };
}

all_tuple!(A, B);
all_tuple!(A, B, C);
all_tuple!(A, B, C, D);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::task::TaskPoll;
    use crate::wait::{delay_frames, never};
    use std::rc::Rc;

    #[test]
    fn completes_with_all_results() {
        let slow = delay_frames(2).map(|()| "slow");
        let fast = Task::from_result("fast");
        let mut task = all((slow, fast));

        assert_eq!(task.resume(), TaskPoll::Pending);
        assert_eq!(task.resume(), TaskPoll::Pending);
        assert_eq!(task.resume(), TaskPoll::Ready);
        assert_eq!(task.value().unwrap(), ("slow", "fast"));
    }

    #[test]
    fn immediate_tuple_completes_on_first_resume() {
        let mut task = all((Task::from_result(1), Task::from_result(2), Task::from_result(3)));
        assert_eq!(task.resume(), TaskPoll::Ready);
        assert_eq!(task.value().unwrap(), (1, 2, 3));
    }

    #[test]
    fn first_fault_fails_the_join_and_drops_siblings() {
        let marker = Rc::new(());
        let held = marker.clone();
        let sibling = never().map(move |()| {
            let _held = &held;
        });

        let mut task = all((sibling, Task::<i32>::fail("branch failed")));
        assert_eq!(task.resume(), TaskPoll::Ready);
        match task.value() {
            Err(TaskError::Fault(fault)) => assert_eq!(fault.message(), "branch failed"),
            other => panic!("unexpected: {other:?}"),
        }

        // The pending sibling was dropped along with the combinator body.
        assert_eq!(Rc::strong_count(&marker), 1);
    }

    #[test]
    fn tied_faults_resolve_in_argument_order() {
        let mut task = all((Task::<i32>::fail("first"), Task::<i32>::fail("second")));
        task.resume();
        match task.value() {
            Err(TaskError::Fault(fault)) => assert_eq!(fault.message(), "first"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
