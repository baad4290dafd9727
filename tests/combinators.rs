// tests/combinators.rs
//
// all/any and the finish-source bridge running on a live backend.

use std::cell::Cell;
use std::rc::Rc;

use cotick::{all, any, delay_frames, updater_task, Backend, TaskFinishSource};

#[test]
fn all_completes_only_when_every_branch_has() {
    let backend = Backend::new();
    let result = Rc::new(Cell::new(None));

    let result2 = result.clone();
    let runner = all((
        delay_frames(1).map(|()| 1),
        delay_frames(3).map(|()| 2),
        delay_frames(2).map(|()| 3),
    ))
    .run_scoped_with(&backend, move |values| result2.set(Some(values)), || {})
    .unwrap();

    backend.update().unwrap();
    backend.update().unwrap();
    assert!(!runner.done());

    backend.update().unwrap();
    assert!(runner.done());
    assert_eq!(result.get(), Some((1, 2, 3)));
}

#[test]
fn any_completes_at_the_first_branch() {
    let backend = Backend::new();
    let result = Rc::new(Cell::new(None));

    let result2 = result.clone();
    let runner = any((
        delay_frames(5).map(|()| "slow"),
        delay_frames(1).map(|()| "fast"),
    ))
    .run_scoped_with(&backend, move |values| result2.set(Some(values)), || {})
    .unwrap();

    backend.update().unwrap();
    assert!(runner.done());
    assert_eq!(result.get(), Some((None, Some("fast"))));
}

#[test]
fn nested_combinators_stay_paced() {
    let backend = Backend::new();

    // any() wins as soon as its fast branch does, even nested inside all().
    let runner = all((
        any((delay_frames(10), delay_frames(1))).discard_result(),
        delay_frames(2),
    ))
    .run_scoped(&backend)
    .unwrap();

    backend.update().unwrap();
    assert!(!runner.done());
    backend.update().unwrap();
    assert!(runner.done());
}

#[test]
fn finish_source_bridges_per_tick_code_into_a_task() {
    let backend = Backend::new();
    let source: TaskFinishSource<u32> = TaskFinishSource::new();
    let result = Rc::new(Cell::new(0));

    let result2 = result.clone();
    let _waiter = source
        .wait_for_result()
        .run_scoped_with(&backend, move |value| result2.set(value), || {})
        .unwrap();

    // Driven from outside the task domain, e.g. an input event handler.
    backend.update().unwrap();
    assert_eq!(result.get(), 0);

    assert!(source.request_finish(42));
    assert!(!source.request_finish(43));
    backend.update().unwrap();
    assert_eq!(result.get(), 42);
    assert_eq!(backend.task_count(), 0);
}

#[test]
fn updater_task_finishes_through_its_source() {
    let backend = Backend::new();
    let result = Rc::new(Cell::new(0u32));

    let result2 = result.clone();
    let mut ticks = 0u32;
    let _runner = updater_task(move |source: &TaskFinishSource<u32>| {
        ticks += 1;
        if ticks == 3 {
            source.request_finish(ticks);
        }
    })
    .run_scoped_with(&backend, move |value| result2.set(value), || {})
    .unwrap();

    backend.update().unwrap();
    assert_eq!(result.get(), 0);
    backend.update().unwrap();
    assert_eq!(result.get(), 3);
}
