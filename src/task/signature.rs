//! Canonicalisation of task call shapes

use serde::{Deserialize, Serialize};

use super::variant;

/// Build or watch targets given as one glob or a list of globs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Targets {
    One(String),
    Many(Vec<String>),
}

impl Targets {
    /// Expands a bare glob into a one-element list
    pub fn into_list(self) -> Vec<String> {
        match self {
            Targets::One(glob) => vec![glob],
            Targets::Many(globs) => globs,
        }
    }
}

impl From<&str> for Targets {
    fn from(glob: &str) -> Self {
        Targets::One(glob.to_string())
    }
}

impl From<String> for Targets {
    fn from(glob: String) -> Self {
        Targets::One(glob)
    }
}

impl From<Vec<String>> for Targets {
    fn from(globs: Vec<String>) -> Self {
        Targets::Many(globs)
    }
}

impl From<&[&str]> for Targets {
    fn from(globs: &[&str]) -> Self {
        Targets::Many(globs.iter().map(|g| g.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Targets {
    fn from(globs: [&str; N]) -> Self {
        Targets::Many(globs.iter().map(|g| g.to_string()).collect())
    }
}

/// The watch argument of a task call
///
/// A boolean mirrors (`true`) or suppresses (`false`) the build list; any
/// targets form an independent watch set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WatchArg {
    Mirror(bool),
    Targets(Targets),
}

impl From<bool> for WatchArg {
    fn from(mirror: bool) -> Self {
        WatchArg::Mirror(mirror)
    }
}

impl From<Targets> for WatchArg {
    fn from(targets: Targets) -> Self {
        WatchArg::Targets(targets)
    }
}

impl From<&str> for WatchArg {
    fn from(glob: &str) -> Self {
        WatchArg::Targets(glob.into())
    }
}

impl From<Vec<String>> for WatchArg {
    fn from(globs: Vec<String>) -> Self {
        WatchArg::Targets(globs.into())
    }
}

impl<const N: usize> From<[&str; N]> for WatchArg {
    fn from(globs: [&str; N]) -> Self {
        WatchArg::Targets(globs.into())
    }
}

/// Canonical task: a name with build and watch lists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub build: Vec<String>,
    pub watch: Vec<String>,
}

impl TaskSpec {
    /// A task with no source stream and nothing to watch
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            build: Vec::new(),
            watch: Vec::new(),
        }
    }

    /// Reduces any accepted call shape to the canonical spec
    pub fn resolve(name: &str, build: Option<Targets>, watch: Option<WatchArg>) -> Self {
        match (build, watch) {
            (None, None) => Self::bare(name),

            // Watch defaults to mirroring the build list
            (Some(build), None) => Self::resolve(name, Some(build), Some(WatchArg::Mirror(true))),

            // A watch set without a build list watches on its own
            (None, Some(watch)) => Self::resolve(name, Some(Targets::Many(Vec::new())), Some(watch)),

            (Some(Targets::One(glob)), watch) => {
                Self::resolve(name, Some(Targets::Many(vec![glob])), watch)
            }

            (Some(Targets::Many(build)), Some(WatchArg::Mirror(mirror))) => {
                let watch = if mirror { build.clone() } else { Vec::new() };
                Self {
                    name: name.to_string(),
                    build,
                    watch,
                }
            }

            (Some(Targets::Many(build)), Some(WatchArg::Targets(Targets::One(glob)))) => Self::resolve(
                name,
                Some(Targets::Many(build)),
                Some(WatchArg::Targets(Targets::Many(vec![glob]))),
            ),

            (Some(Targets::Many(build)), Some(WatchArg::Targets(Targets::Many(watch)))) => Self {
                name: name.to_string(),
                build,
                watch,
            },
        }
    }

    /// Name without its variant suffix, used for factory lookup
    pub fn base_name(&self) -> &str {
        variant::base_name(&self.name)
    }

    /// Copy of this spec under another name (typically a variant)
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            build: self.build.clone(),
            watch: self.watch.clone(),
        }
    }

    /// Returns true if the task should be watched
    pub fn is_watched(&self) -> bool {
        !self.watch.is_empty()
    }
}
