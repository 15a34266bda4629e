//! Watch registrations

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::stream::glob::{absolute_pattern, contains_glob, glob_base, glob_match};

/// Globs to watch and the tasks they trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRegistration {
    /// Absolute patterns; a leading `!` excludes
    pub patterns: Vec<String>,
    pub debounce: Duration,
    pub tasks: Vec<String>,
}

impl WatchRegistration {
    pub fn new(globs: &[String], cwd: &Path, debounce: Duration, tasks: Vec<String>) -> Self {
        let patterns = globs
            .iter()
            .map(|glob| match glob.strip_prefix('!') {
                Some(excluded) => format!("!{}", absolute_pattern(excluded, cwd)),
                None => absolute_pattern(glob, cwd),
            })
            .collect();

        Self {
            patterns,
            debounce,
            tasks,
        }
    }

    /// Returns true if a changed path should trigger the tasks
    pub fn matches(&self, path: &Path) -> bool {
        let mut included = false;
        for pattern in &self.patterns {
            match pattern.strip_prefix('!') {
                Some(excluded) if glob_match(excluded, path) => return false,
                Some(_) => {}
                None => included = included || glob_match(pattern, path),
            }
        }
        included
    }

    /// Directories (or single files) the watcher must observe, deduplicated
    ///
    /// Each entry is paired with whether it needs a recursive watch.
    pub fn roots(&self) -> Vec<(PathBuf, bool)> {
        let mut roots: Vec<(PathBuf, bool)> = Vec::new();

        for pattern in self.patterns.iter().filter(|p| !p.starts_with('!')) {
            let root = if contains_glob(pattern) {
                (glob_base(pattern), true)
            } else {
                (PathBuf::from(pattern), false)
            };

            if !roots.iter().any(|(existing, _)| root.0.starts_with(existing) && existing != &root.0)
                && !roots.contains(&root)
            {
                roots.retain(|(existing, _)| !existing.starts_with(&root.0) || !root.1);
                roots.push(root);
            }
        }

        roots
    }
}
