//! Pipe composition
//!
//! A pipe invoked by name becomes a stage of the stream it is attached to.
//! Its factory runs as soon as the pipe is requested, so wiring errors inside
//! the pipe surface right away; the files arrive later, when the outer stream
//! runs.

use crate::definition::{Factory, Invocation};
use crate::orchestrator::Context;
use crate::stream::{FileStream, SourceFile, Stage, StageError};
use crate::DevourError;

/// Name of the pipe applied to every source stream
pub const DEFAULTS_PIPE: &str = "defaults";

/// Applies each configured default plugin, in order
///
/// With no defaults configured the stream passes through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultsPipe;

impl Factory for DefaultsPipe {
    fn create(
        &self,
        stream: Option<FileStream>,
        ctx: &Context,
        _call: &Invocation,
    ) -> Result<FileStream, DevourError> {
        let mut stream = stream.unwrap_or_else(FileStream::inlet);
        for name in &ctx.config().defaults {
            stream = stream.pipe_boxed(ctx.stage(name, &[])?);
        }
        Ok(stream)
    }
}

/// A composed pipe used as a single stage
pub struct PipeStage {
    name: String,
    stream: FileStream,
}

impl PipeStage {
    pub fn new(name: impl Into<String>, stream: FileStream) -> Self {
        Self {
            name: name.into(),
            stream,
        }
    }
}

impl Stage for PipeStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&mut self, files: Vec<SourceFile>) -> Result<Vec<SourceFile>, StageError> {
        let outcome = self.stream.run_with(files)?;

        match outcome.failures.first() {
            Some(failure) => Err(StageError::Failed(format!(
                "stage '{}' failed: {}",
                failure.stage, failure.message
            ))),
            None => Ok(outcome.files),
        }
    }
}
