//! # Plugin System
//!
//! Named processing stages, resolved lazily by dotted name.
//!
//! ## Naming
//!
//! A plugin name is `scope[.path...]`. The scope selects a module; the rest
//! of the path walks the module's exported members:
//!
//! | Name | Meaning |
//! |------|---------|
//! | `concat` | invoke the `concat` module itself |
//! | `sourcemaps.init` | invoke member `init` of module `sourcemaps` |
//! | `sourcemaps.options` | a plain value, returned as-is |
//!
//! ## Module Sources
//!
//! Modules are looked up in order:
//! 1. In-process modules (built-ins plus any the host registers)
//! 2. Executables named `devour-{scope}` in `<base_path>/plugins/`, then `$PATH`
//!
//! Each scope is loaded once and cached for the life of the resolver.
//!
//! ## Protocol
//!
//! ```text
//! Devour                          Plugin Binary
//!  │                               │
//!  ├── Spawn: devour-sass --manifest
//!  │   └── Stdout: {"name": "devour-sass", "callable": true, "exports": {...}}
//!  │                               │
//!  ├── Spawn: devour-sass          │
//!  ├── Stdin: {"operation": "transform", "params": {"member": null, "args": [], "files": [...]}}
//!  └── Stdout: {"success": true, "data": {"files": [...]}}
//! ```
//!
//! ## Failures
//!
//! Every invoked plugin is wrapped so that a failing stage ends its stream
//! instead of aborting the build. Missing modules or members are wiring errors
//! and are reported immediately.

mod builtin;
mod external;
mod module;
mod protocol;
mod resolver;

pub use builtin::InProcessModules;
pub use external::{module_from_manifest, ExecutableModules, PLUGIN_PREFIX};
pub use module::{optional_string_arg, string_arg, Export, PluginError, Resolved, StageFactory};
pub use protocol::{ManifestExport, PluginManifest, PluginRequest, PluginResponse, WireEncoding, WireFile};
pub use resolver::{ModuleSource, PluginResolver};
