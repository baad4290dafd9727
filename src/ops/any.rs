// src/ops/any.rs
use super::Arm;
use crate::task::{Step, Task};

mod sealed {
    pub trait Sealed {}
}

/// Tuples of tasks raceable with [`any`]. Implemented for tuples of 2 to 4
/// tasks with independent result types.
pub trait AnyTuple: sealed::Sealed + 'static {
    type Output: 'static;

    fn race(self) -> Task<Self::Output>;
}

/// Completes once at least one task in the tuple has completed, with an
/// `Option` per branch: `Some` for every branch that finished by then, `None`
/// for the ones still pending.
///
/// Branches that complete on the same resume all report `Some`. Losing
/// branches are dropped with the combined task and never resumed again. A
/// faulting branch fails the combined task even if another branch completed
/// on the same resume (argument order on ties).
pub fn any<T: AnyTuple>(tasks: T) -> Task<T::Output> {
    tasks.race()
}

macro_rules! any_tuple {
    ($($T:ident),+) => {
        impl<$($T: 'static),+> sealed::Sealed for ($(Task<$T>,)+) {}

        impl<$($T: 'static),+> AnyTuple for ($(Task<$T>,)+) {
            type Output = ($(Option<$T>,)+);

            fn race(self) -> Task<Self::Output> {
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
                    if $($T.done())||+ {
                        Step::Done(($($T.try_take_value(),)+))
                    } else {
                        Step::Pending
                    }
                })
            }
        }
    };
}

any_tuple!(A, B);
any_tuple!(A, B, C);
any_tuple!(A, B, C, D);
