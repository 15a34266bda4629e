//! Top-level error type

use thiserror::Error;

use crate::config::ConfigError;
use crate::definition::DefinitionError;
use crate::engine::EngineError;
use crate::plugin::PluginError;
use crate::stream::StageError;

#[derive(Debug, Error)]
pub enum DevourError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Named pipe not found: {0}")]
    PipeNotFound(String),

    #[error("Task definition not found: {0}")]
    TaskNotFound(String),
}
