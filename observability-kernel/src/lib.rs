//! Background execution and lifecycle control for the observability layer.
//!
//! [`PeriodicScheduler`] drives flush and reporting tasks on one background
//! tokio task, away from the host's request path. [`Lifecycle`] guards the
//! load/start/shutdown sequence of the extension.

#![warn(missing_docs, clippy::pedantic)]

mod lifecycle;
mod scheduler;

pub use lifecycle::{ExtensionState, Lifecycle, LifecycleError, LifecycleEvent, LifecycleResult};
pub use scheduler::{
    PeriodicScheduler, PeriodicTask, SchedulerError, SchedulerHandle, SchedulerResult,
};
