//! # Definitions
//!
//! Named, reusable factories for tasks and pipes.
//!
//! ## Layout
//!
//! ```text
//! gulp/
//! ├── task/
//! │   ├── css.toml      # task "css"
//! │   └── js.toml       # task "js"
//! └── pipe/
//!     └── minify.toml   # pipe "minify"
//! ```
//!
//! Any directory name is accepted as a kind; `task` and `pipe` are the two
//! the orchestrator acts on. Hosts can also register closures through
//! [`FnFactory`].
//!
//! ## Duplicates
//!
//! Registering the same `(kind, name)` twice replaces the earlier factory.
//! The built-in `defaults` pipe is registered first, then definition files,
//! then host factories, so each later source can override the former.

mod file;
mod loader;
mod registry;

pub use file::{DefinitionFile, StageDef, VariantDef};
pub use loader::{load_definitions, DefinitionError, LoadedDefinition, DEFINITION_EXTENSION};
pub use registry::{Factory, FnFactory, Invocation, Registry, PIPE_KIND, TASK_KIND};
