//! # Orchestrator
//!
//! [`Devour`] ties the pieces together: it owns the [`Context`] handed to
//! every factory, binds declared tasks to an [`Engine`](crate::engine::Engine)
//! and decides what runs at startup.
//!
//! ## Lifecycle
//!
//! 1. [`DevourBuilder::build`] registers the `defaults` pipe, loads definition
//!    files and host factories, and sets up plugin resolution.
//! 2. [`Devour::task`] normalises each declaration and schedules it. Outside a
//!    selective run, watched tasks join the active set.
//! 3. [`Devour::start`] runs the command-line selection, or synthesizes
//!    `default` from the active set, runs it and keeps watching.

mod builder;
mod context;
mod run;
mod scheduler;

pub use builder::DevourBuilder;
pub use context::Context;
pub use run::{Listing, RunStatus, DEFAULT_TASK};
pub use scheduler::Devour;
