//! # File Streams
//!
//! Lazy pipelines of processing stages over sets of files.
//!
//! A [`FileStream`] starts from an origin (source globs, files in memory, or
//! an open inlet that receives files when the stream is used as a stage of
//! another stream) and carries an ordered list of [`Stage`]s. Nothing is read
//! or transformed until [`FileStream::run`] is called.
//!
//! ## Failure handling
//!
//! Stages produced by plugins and pipes are wrapped in [`Guarded`]. A guarded
//! stage that fails ends the stream: the failure is recorded in the
//! [`StreamOutcome`], no later stage runs, and no files are emitted. Any other
//! stage error (for example a write that cannot create its directory) is
//! returned from `run` as an error.

mod dest;
mod file;
pub mod glob;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use dest::{Destination, WriteOptions};
pub use file::SourceFile;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk {path}: {message}")]
    Walk { path: PathBuf, message: String },

    #[error("{0}")]
    Failed(String),

    #[error("Stream ended after '{stage}' failed: {message}")]
    Ended { stage: String, message: String },
}

impl StageError {
    pub fn failed(message: impl Into<String>) -> Self {
        StageError::Failed(message.into())
    }
}

/// One processing step of a stream
pub trait Stage {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// Transforms the files flowing through the stream
    fn transform(&mut self, files: Vec<SourceFile>) -> Result<Vec<SourceFile>, StageError>;
}

impl std::fmt::Debug for dyn Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Stage({})", self.name())
    }
}

/// A stage backed by a closure
pub struct FnStage<F> {
    name: String,
    f: F,
}

impl<F> Stage for FnStage<F>
where
    F: FnMut(Vec<SourceFile>) -> Result<Vec<SourceFile>, StageError>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&mut self, files: Vec<SourceFile>) -> Result<Vec<SourceFile>, StageError> {
        (self.f)(files)
    }
}

/// Builds a stage from a closure
pub fn stage_fn<F>(name: impl Into<String>, f: F) -> FnStage<F>
where
    F: FnMut(Vec<SourceFile>) -> Result<Vec<SourceFile>, StageError>,
{
    FnStage {
        name: name.into(),
        f,
    }
}

/// Where a stream's files come from
#[derive(Debug, Clone)]
enum Origin {
    /// Files arrive from the stream this one is attached to
    Inlet,
    Files(Vec<SourceFile>),
    Globs { patterns: Vec<String>, cwd: PathBuf },
}

/// A stage failure that ended a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: String,
    pub message: String,
}

/// Result of running a stream to completion
#[derive(Debug, Default)]
pub struct StreamOutcome {
    /// Files emitted by the last stage
    pub files: Vec<SourceFile>,

    /// Failures of guarded stages
    pub failures: Vec<StageFailure>,
}

impl StreamOutcome {
    /// Returns true if no guarded stage failed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A lazy pipeline of stages
pub struct FileStream {
    origin: Origin,
    stages: Vec<Box<dyn Stage>>,
}

impl FileStream {
    /// An open stream fed by whatever it is attached to
    pub fn inlet() -> Self {
        Self {
            origin: Origin::Inlet,
            stages: Vec::new(),
        }
    }

    /// A stream over files already in memory
    pub fn from_files(files: Vec<SourceFile>) -> Self {
        Self {
            origin: Origin::Files(files),
            stages: Vec::new(),
        }
    }

    /// A stream over the files matched by source globs
    pub fn from_globs<S: AsRef<str>>(patterns: &[S], cwd: &Path) -> Self {
        Self {
            origin: Origin::Globs {
                patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
                cwd: cwd.to_path_buf(),
            },
            stages: Vec::new(),
        }
    }

    /// Appends a stage
    pub fn pipe(self, stage: impl Stage + 'static) -> Self {
        self.pipe_boxed(Box::new(stage))
    }

    /// Appends a boxed stage
    pub fn pipe_boxed(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Names of the stages, in order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs the stream from its origin
    pub fn run(mut self) -> Result<StreamOutcome, StageError> {
        self.run_with(Vec::new())
    }

    /// Runs the stream with files arriving from an attached stream
    ///
    /// Incoming files come first, followed by whatever the stream's own
    /// origin yields. The stream stays usable and can be run again.
    pub fn run_with(&mut self, incoming: Vec<SourceFile>) -> Result<StreamOutcome, StageError> {
        let mut files = incoming;
        match &self.origin {
            Origin::Inlet => {}
            Origin::Files(own) => files.extend(own.iter().cloned()),
            Origin::Globs { patterns, cwd } => files.extend(glob::expand(patterns, cwd)?),
        }

        for stage in &mut self.stages {
            match stage.transform(files) {
                Ok(next) => files = next,
                Err(StageError::Ended { stage, message }) => {
                    return Ok(StreamOutcome {
                        files: Vec::new(),
                        failures: vec![StageFailure { stage, message }],
                    });
                }
                Err(err) => return Err(err),
            }
        }

        Ok(StreamOutcome {
            files,
            failures: Vec::new(),
        })
    }
}

impl std::fmt::Debug for FileStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStream")
            .field("origin", &self.origin)
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Wraps a plugin or pipe stage so its failures end the stream instead of
/// propagating
pub struct Guarded {
    label: String,
    inner: Box<dyn Stage>,
}

impl Guarded {
    pub fn new(label: impl Into<String>, inner: Box<dyn Stage>) -> Self {
        Self {
            label: label.into(),
            inner,
        }
    }
}

impl Stage for Guarded {
    fn name(&self) -> &str {
        &self.label
    }

    fn transform(&mut self, files: Vec<SourceFile>) -> Result<Vec<SourceFile>, StageError> {
        match self.inner.transform(files) {
            Ok(files) => Ok(files),
            Err(StageError::Ended { stage, message }) => Err(StageError::Ended { stage, message }),
            Err(err) => {
                tracing::debug!(stage = %self.label, error = %err, "stage failed, ending stream");
                Err(StageError::Ended {
                    stage: self.label.clone(),
                    message: err.to_string(),
                })
            }
        }
    }
}
