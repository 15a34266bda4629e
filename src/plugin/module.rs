//! Plugin modules and their exports

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use thiserror::Error;

use crate::stream::Stage;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Invalid plugin name: '{0}'")]
    InvalidName(String),

    #[error("Plugin module not found: {0}")]
    ModuleNotFound(String),

    #[error("Plugin '{name}' has no member '{member}'")]
    MemberNotFound { name: String, member: String },

    #[error("Plugin '{0}' is not a processing stage")]
    NotAStage(String),

    #[error("Invalid arguments for plugin '{name}': {message}")]
    InvalidArguments { name: String, message: String },

    #[error("Failed to load plugin module '{scope}': {message}")]
    Load { scope: String, message: String },
}

/// Creates a stage from invocation arguments
pub trait StageFactory {
    fn create(&self, args: &[Value]) -> Result<Box<dyn Stage>, PluginError>;
}

struct FnStageFactory<F>(F);

impl<F> StageFactory for FnStageFactory<F>
where
    F: Fn(&[Value]) -> Result<Box<dyn Stage>, PluginError>,
{
    fn create(&self, args: &[Value]) -> Result<Box<dyn Stage>, PluginError> {
        (self.0)(args)
    }
}

/// Something a plugin module exports
///
/// A module is itself an export: usually a stage factory, a namespace of
/// members (optionally callable on its own), or a plain value.
#[derive(Clone)]
pub enum Export {
    Stage(Rc<dyn StageFactory>),
    Namespace {
        call: Option<Rc<dyn StageFactory>>,
        members: BTreeMap<String, Export>,
    },
    Value(Value),
}

impl Export {
    /// A callable export backed by a closure
    pub fn stage<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Box<dyn Stage>, PluginError> + 'static,
    {
        Export::Stage(Rc::new(FnStageFactory(f)))
    }

    /// An empty, non-callable namespace
    pub fn namespace() -> Self {
        Export::Namespace {
            call: None,
            members: BTreeMap::new(),
        }
    }

    /// Adds a member, turning a callable export into a callable namespace
    pub fn with_member(self, name: impl Into<String>, member: Export) -> Self {
        let (call, mut members) = match self {
            Export::Stage(call) => (Some(call), BTreeMap::new()),
            Export::Namespace { call, members } => (call, members),
            Export::Value(_) => (None, BTreeMap::new()),
        };
        members.insert(name.into(), member);
        Export::Namespace { call, members }
    }

    /// Walks a dotted member path
    pub fn lookup<'a>(&'a self, path: &[&str]) -> Result<&'a Export, String> {
        let mut current = self;
        for segment in path {
            current = match current {
                Export::Namespace { members, .. } => {
                    members.get(*segment).ok_or_else(|| segment.to_string())?
                }
                _ => return Err(segment.to_string()),
            };
        }
        Ok(current)
    }

    /// The factory invoked when this export is called, if any
    pub fn callee(&self) -> Option<&Rc<dyn StageFactory>> {
        match self {
            Export::Stage(f) => Some(f),
            Export::Namespace { call, .. } => call.as_ref(),
            Export::Value(_) => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        self.callee().is_some()
    }

    /// Member names of a namespace
    pub fn member_names(&self) -> Vec<String> {
        match self {
            Export::Namespace { members, .. } => members.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Export::Stage(_) => write!(f, "Stage"),
            Export::Namespace { call, members } => f
                .debug_struct("Namespace")
                .field("callable", &call.is_some())
                .field("members", &members.keys().collect::<Vec<_>>())
                .finish(),
            Export::Value(value) => write!(f, "Value({})", value),
        }
    }
}

/// What resolving a plugin name yields
pub enum Resolved {
    /// A live, guarded stage
    Stage(Box<dyn Stage>),

    /// A non-callable value, returned as-is
    Value(Value),

    /// A non-callable namespace, described by its member names
    Namespace(Vec<String>),
}

impl Resolved {
    /// Unwraps a stage, reporting the plugin name otherwise
    pub fn into_stage(self, name: &str) -> Result<Box<dyn Stage>, PluginError> {
        match self {
            Resolved::Stage(stage) => Ok(stage),
            _ => Err(PluginError::NotAStage(name.to_string())),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Resolved::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Stage(stage) => write!(f, "Stage({})", stage.name()),
            Resolved::Value(value) => write!(f, "Value({})", value),
            Resolved::Namespace(members) => write!(f, "Namespace({:?})", members),
        }
    }
}

/// Reads a required string argument
pub fn string_arg(plugin: &str, args: &[Value], index: usize) -> Result<String, PluginError> {
    optional_string_arg(plugin, args, index)?.ok_or_else(|| PluginError::InvalidArguments {
        name: plugin.to_string(),
        message: format!("argument {} must be a string", index),
    })
}

/// Reads an optional string argument; null counts as absent
pub fn optional_string_arg(
    plugin: &str,
    args: &[Value],
    index: usize,
) -> Result<Option<String>, PluginError> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(PluginError::InvalidArguments {
            name: plugin.to_string(),
            message: format!("argument {} must be a string, got {}", index, other),
        }),
    }
}
