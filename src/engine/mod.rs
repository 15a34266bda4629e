//! # Build Engine
//!
//! The engine owns the task graph and file watching; the orchestrator only
//! binds tasks to it and decides what to run.
//!
//! ## Contract
//!
//! | Operation | Meaning |
//! |-----------|---------|
//! | `add_task` | register a runnable (or a pure aggregate) with dependencies |
//! | `run` | run tasks, then call `done` exactly once with the result |
//! | `watch` | re-run tasks when files matching globs change, debounced |
//! | `start_watching` / `serve` | arm the watchers, then process triggers until they stop |
//!
//! [`LocalEngine`] implements the contract in-process: tasks run one after
//! another on the calling thread, and debounced watcher events are delivered
//! to that same thread.

mod local;
mod watch;

use std::time::Duration;

use thiserror::Error;

use crate::DevourError;

pub use local::LocalEngine;
pub use watch::WatchRegistration;

/// Work bound to a task name
pub type Runnable = Box<dyn FnMut() -> Result<(), DevourError>>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Task not found: {0}")]
    UnknownTask(String),

    #[error("Task '{task}' failed: {source}")]
    TaskFailed {
        task: String,
        #[source]
        source: Box<DevourError>,
    },

    #[error("Failed to watch {path}: {message}")]
    Watch { path: String, message: String },

    #[error("Watchers are not armed")]
    NotWatching,

    #[error("Engine finished without reporting completion")]
    NoCompletion,
}

/// The build engine tasks are bound to
pub trait Engine {
    /// Registers a task; a task without a runnable only runs its dependencies
    fn add_task(&mut self, name: &str, deps: Vec<String>, runnable: Option<Runnable>);

    fn has_task(&self, name: &str) -> bool;

    /// Registers a debounced watch that re-runs `tasks` when `globs` change
    fn watch(&mut self, globs: &[String], debounce: Duration, tasks: Vec<String>) -> Result<(), EngineError>;

    /// Stops `task` from being triggered by any watch registered so far
    fn unwatch(&mut self, task: &str);

    /// Runs tasks, reporting completion through `done` exactly once
    fn run<F>(&mut self, names: &[String], done: F)
    where
        F: FnOnce(Result<(), EngineError>);

    /// Starts every registered watch
    fn start_watching(&mut self) -> Result<(), EngineError>;

    /// Processes watch triggers until the watchers stop
    fn serve(&mut self) -> Result<(), EngineError>;
}
