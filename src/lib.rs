//! # COTICK
//! Tick-driven cooperative tasks for frame-based applications.
//!
//! This crate provides a single-threaded scheduler in which every task
//! advances by exactly one logical step per tick. Nothing runs between ticks,
//! nothing blocks, and completion is observed at tick granularity, which keeps
//! game-loop and simulation code fully deterministic.
//!
//! ## Architectural Principles
//! * **One step per tick:** A resume advances a task by at most one logical
//!   step; long operations suspend and continue next frame.
//! * **No ambient authority:** There is no global scheduler and no hidden
//!   clock. Tasks run on an explicit [`Backend`] and time is read from an
//!   injected [`SteadyClock`].
//! * **Structured lifetimes:** Spawned tasks are owned by scoped handles;
//!   dropping the handle cancels the task and runs its cancel callback.
//! * **Faults stay contained:** A panic inside a task body is captured as a
//!   [`Fault`] in its completion slot instead of unwinding into the loop.

mod backend;
mod error;
mod exec;
mod macros;
pub mod ops;
pub mod order;
mod runner;
mod source;
mod task;
mod time;
mod wait;

pub use backend::{Backend, ScopedDrawer, ScopedInputCaller, TaskId};
pub use error::{Fault, ProgrammingError, TaskError};
pub use exec::{CallerId, OrderedExecutor};
pub use ops::{all, any};
pub use runner::{MultiRunner, ScopedTaskRunner};
pub use source::TaskFinishSource;
pub use task::{CompanionTiming, Resumable, Step, Task, TaskPoll};
pub use time::{delay, InstantClock, ManualClock, SteadyClock};
pub use wait::{
    delay_frames, never, next_frame, updater, updater_task, wait_for, wait_until, wait_while,
};
