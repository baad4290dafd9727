// src/macros.rs

/// Builds a task from a closure body returning a [`Step`](crate::Step).
#[macro_export]
macro_rules! task {
    (|| $body:block) => {
        $crate::Task::from_fn(move || $body)
    };
}

/// Chains tasks sequentially, discarding intermediate results; the combined
/// task completes with the last task's result.
#[macro_export]
macro_rules! seq {
    ($last:expr $(,)?) => {
        $last
    };
    ($first:expr, $($rest:expr),+ $(,)?) => {
        $first.then(move |_| $crate::seq!($($rest),+))
    };
}

#[cfg(test)]
mod tests {
    use crate::task::{Step, TaskPoll};
    use crate::wait::delay_frames;

    #[test]
    fn task_macro_builds_a_step_machine() {
        let mut left = 2;
        let mut task = task!(|| {
            if left == 0 {
                Step::Done("ok")
            } else {
                left -= 1;
                Step::Pending
            }
        });
        assert_eq!(task.resume(), TaskPoll::Pending);
        assert_eq!(task.resume(), TaskPoll::Pending);
        assert_eq!(task.resume(), TaskPoll::Ready);
        assert_eq!(task.value().unwrap(), "ok");
    }

    #[test]
    fn seq_runs_stages_in_order_and_keeps_the_last_result() {
        let mut task = seq!(
            delay_frames(1),
            crate::Task::from_result(10),
            crate::Task::from_result("last"),
        );
        assert_eq!(task.resume(), TaskPoll::Pending);
        assert_eq!(task.resume(), TaskPoll::Ready);
        assert_eq!(task.value().unwrap(), "last");
    }
}
