//! Devour - convention-driven build orchestration
//!
//! Devour turns task and pipe definitions found in a conventional directory
//! layout into a named build vocabulary, resolves processing stages from
//! plugins, and runs tasks once, on demand, or again whenever their files
//! change.

pub mod cli;
pub mod config;
pub mod definition;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod pipe;
pub mod plugin;
pub mod stream;
pub mod task;

pub use config::Config;
pub use engine::{Engine, LocalEngine};
pub use error::DevourError;
pub use orchestrator::{Context, Devour, DevourBuilder, RunStatus};
pub use task::{Targets, TaskSpec, WatchArg};
