//! # Task Signatures
//!
//! A task can be declared in several shapes: a bare name, a single build
//! glob, a list of globs, with an explicit watch set, or with a boolean that
//! mirrors or suppresses watching. Every shape reduces to one canonical
//! [`TaskSpec`] before it reaches the scheduler.
//!
//! | Call | Canonical spec |
//! |------|----------------|
//! | `task("x")` | `("x", [], [])` |
//! | `task("x", "a.js")` | `("x", ["a.js"], ["a.js"])` |
//! | `task("x", "a.js", false)` | `("x", ["a.js"], [])` |
//! | `task("x", ["a.js", "b.js"], "c.js")` | `("x", ["a.js", "b.js"], ["c.js"])` |
//!
//! ## Variants
//!
//! Task names may carry a `:`-delimited suffix (`build:prod`). The factory
//! lookup uses the base name only, while the factory itself still sees the
//! full invoked name.

mod signature;
mod variant;

pub use signature::{Targets, TaskSpec, WatchArg};
pub use variant::{base_name, split_variant};
