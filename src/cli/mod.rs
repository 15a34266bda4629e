//! # Command-Line Interface
//!
//! ```bash
//! devour                 # run every watched task, then keep watching
//! devour css js          # run just these tasks once
//! devour build:prod      # run a variant of a task
//! devour --no-watch      # run everything once
//! devour --list          # show definitions and declared tasks
//! ```
//!
//! ## Output Formats
//!
//! `--format text` (default) prints timestamped progress lines;
//! `--format json` prints one JSON object per line.
//!
//! ## Diagnostics
//!
//! `-v` prints summaries even in selective runs, `-vv` also enables debug
//! logging. `DEVOUR_LOG` takes a `tracing` filter directive and overrides
//! both.
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and run the build.

mod app;

pub use app::{run, Cli};
