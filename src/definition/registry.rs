//! Definition registry

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::orchestrator::Context;
use crate::stream::FileStream;
use crate::task::split_variant;
use crate::DevourError;

/// Kind under which task factories are registered
pub const TASK_KIND: &str = "task";

/// Kind under which pipe factories are registered
pub const PIPE_KIND: &str = "pipe";

/// How a factory is being invoked
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Full invoked name, variant included (`build:prod`)
    pub name: String,

    /// Arguments passed to a pipe; empty for tasks
    pub args: Vec<Value>,
}

impl Invocation {
    pub fn task(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn pipe(name: impl Into<String>, args: &[Value]) -> Self {
        Self {
            name: name.into(),
            args: args.to_vec(),
        }
    }

    /// Name without the variant suffix
    pub fn base_name(&self) -> &str {
        split_variant(&self.name).0
    }

    /// The variant suffix, if any
    pub fn variant(&self) -> Option<&str> {
        split_variant(&self.name).1
    }
}

/// Builds a stream for a task or pipe
///
/// `stream` is the source stream for a task with build targets, the incoming
/// stream for the `defaults` pipe, and `None` otherwise: a task without build
/// targets, or a pipe whose input arrives once it is attached.
pub trait Factory {
    fn create(
        &self,
        stream: Option<FileStream>,
        ctx: &Context,
        call: &Invocation,
    ) -> Result<FileStream, DevourError>;
}

/// A factory backed by a closure
pub struct FnFactory<F>(pub F);

impl<F> Factory for FnFactory<F>
where
    F: Fn(Option<FileStream>, &Context, &Invocation) -> Result<FileStream, DevourError>,
{
    fn create(
        &self,
        stream: Option<FileStream>,
        ctx: &Context,
        call: &Invocation,
    ) -> Result<FileStream, DevourError> {
        (self.0)(stream, ctx, call)
    }
}

/// Factories keyed by kind, then name
#[derive(Default, Clone)]
pub struct Registry {
    kinds: BTreeMap<String, BTreeMap<String, Rc<dyn Factory>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory; the last registration for a `(kind, name)` wins
    ///
    /// Returns the factory that was replaced, if any.
    pub fn register(
        &mut self,
        kind: &str,
        name: &str,
        factory: Rc<dyn Factory>,
    ) -> Option<Rc<dyn Factory>> {
        self.kinds
            .entry(kind.to_string())
            .or_default()
            .insert(name.to_string(), factory)
    }

    pub fn get(&self, kind: &str, name: &str) -> Option<Rc<dyn Factory>> {
        self.kinds.get(kind)?.get(name).cloned()
    }

    pub fn contains(&self, kind: &str, name: &str) -> bool {
        self.kinds.get(kind).is_some_and(|names| names.contains_key(name))
    }

    /// Registered names of a kind, sorted
    pub fn names(&self, kind: &str) -> Vec<&str> {
        self.kinds
            .get(kind)
            .map(|names| names.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Kinds with at least one registration, sorted
    pub fn kinds(&self) -> Vec<&str> {
        self.kinds.keys().map(String::as_str).collect()
    }

    /// Total number of registrations
    pub fn len(&self) -> usize {
        self.kinds.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (kind, names) in &self.kinds {
            map.entry(kind, &names.keys().collect::<Vec<_>>());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Rc<dyn Factory> {
        Rc::new(FnFactory(
            |stream: Option<FileStream>, _ctx: &Context, _call: &Invocation| {
                Ok(stream.unwrap_or_else(FileStream::inlet))
            },
        ))
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = Registry::new();
        registry.register(TASK_KIND, "css", noop());
        registry.register(PIPE_KIND, "minify", noop());
        registry.register("lint", "js", noop());

        assert!(registry.contains(TASK_KIND, "css"));
        assert!(!registry.contains(TASK_KIND, "minify"));
        assert_eq!(registry.kinds(), vec!["lint", "pipe", "task"]);
        assert_eq!(registry.names(PIPE_KIND), vec!["minify"]);
        assert!(registry.names("missing").is_empty());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = Registry::new();
        let first = noop();
        let second = noop();

        assert!(registry.register(TASK_KIND, "css", first.clone()).is_none());
        let replaced = registry.register(TASK_KIND, "css", second.clone()).unwrap();

        assert!(Rc::ptr_eq(&replaced, &first));
        assert!(Rc::ptr_eq(&registry.get(TASK_KIND, "css").unwrap(), &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn invocation_variants() {
        let call = Invocation::task("build:prod");

        assert_eq!(call.base_name(), "build");
        assert_eq!(call.variant(), Some("prod"));
        assert_eq!(Invocation::pipe("minify", &[]).variant(), None);
    }
}
