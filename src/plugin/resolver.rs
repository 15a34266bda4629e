//! Plugin resolution with a per-scope module cache

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use super::module::{Export, PluginError, Resolved};
use crate::stream::Guarded;

/// A place plugin modules can be loaded from
pub trait ModuleSource {
    /// Name used in diagnostics
    fn label(&self) -> &str;

    /// Loads the module for a scope, or `None` if this source does not have it
    fn load(&self, scope: &str) -> Result<Option<Export>, PluginError>;
}

/// Resolves dotted plugin names to live stages
///
/// The first dotted segment is the scope. Each scope is loaded once, from the
/// first source that has it, and kept for the lifetime of the resolver.
/// Remaining segments are walked through the cached module afterwards.
pub struct PluginResolver {
    sources: Vec<Box<dyn ModuleSource>>,
    cache: RefCell<HashMap<String, Rc<Export>>>,
}

impl PluginResolver {
    pub fn new(sources: Vec<Box<dyn ModuleSource>>) -> Self {
        Self {
            sources,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Returns the module for a scope, loading it on first use
    pub fn module(&self, scope: &str) -> Result<Rc<Export>, PluginError> {
        if let Some(module) = self.cache.borrow().get(scope) {
            return Ok(Rc::clone(module));
        }

        for source in &self.sources {
            if let Some(export) = source.load(scope)? {
                tracing::debug!(scope, source = source.label(), "plugin module loaded");
                let module = Rc::new(export);
                self.cache
                    .borrow_mut()
                    .insert(scope.to_string(), Rc::clone(&module));
                return Ok(module);
            }
        }

        Err(PluginError::ModuleNotFound(scope.to_string()))
    }

    /// Resolves `scope[.path...]` and invokes it with `args`
    ///
    /// Callable exports produce a guarded stage; values and namespaces are
    /// returned as they are.
    pub fn resolve(&self, name: &str, args: &[Value]) -> Result<Resolved, PluginError> {
        let mut segments = name.split('.');
        let scope = segments
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PluginError::InvalidName(name.to_string()))?;
        let path: Vec<&str> = segments.collect();
        if path.iter().any(|s| s.is_empty()) {
            return Err(PluginError::InvalidName(name.to_string()));
        }

        let module = self.module(scope)?;
        let export = module
            .lookup(&path)
            .map_err(|member| PluginError::MemberNotFound {
                name: name.to_string(),
                member,
            })?;

        match export.callee() {
            Some(factory) => {
                let stage = factory.create(args)?;
                Ok(Resolved::Stage(Box::new(Guarded::new(name, stage))))
            }
            None => match export {
                Export::Value(value) => Ok(Resolved::Value(value.clone())),
                other => Ok(Resolved::Namespace(other.member_names())),
            },
        }
    }

    /// Scopes loaded so far
    pub fn cached_scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = self.cache.borrow().keys().cloned().collect();
        scopes.sort();
        scopes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{stage_fn, FileStream, SourceFile, Stage, StageError};
    use std::cell::Cell;

    struct CountingSource {
        loads: Rc<Cell<usize>>,
    }

    impl ModuleSource for CountingSource {
        fn label(&self) -> &str {
            "counting"
        }

        fn load(&self, scope: &str) -> Result<Option<Export>, PluginError> {
            if scope != "maps" {
                return Ok(None);
            }
            self.loads.set(self.loads.get() + 1);

            let pass = Export::stage(|_args| {
                Ok(Box::new(stage_fn("pass", |files: Vec<SourceFile>| Ok(files))) as Box<dyn Stage>)
            });
            let fail = Export::stage(|_args| {
                Ok(Box::new(stage_fn("fail", |_files: Vec<SourceFile>| {
                    Err(StageError::failed("bad map"))
                })) as Box<dyn Stage>)
            });

            Ok(Some(
                Export::namespace()
                    .with_member("init", pass)
                    .with_member("broken", fail)
                    .with_member("options", Export::Value(serde_json::json!({"inline": true}))),
            ))
        }
    }

    fn resolver() -> (PluginResolver, Rc<Cell<usize>>) {
        let loads = Rc::new(Cell::new(0));
        let source = CountingSource {
            loads: loads.clone(),
        };
        (PluginResolver::new(vec![Box::new(source)]), loads)
    }

    #[test]
    fn scope_is_loaded_once() {
        let (resolver, loads) = resolver();

        let first = resolver.module("maps").unwrap();
        let second = resolver.module("maps").unwrap();
        resolver.resolve("maps.init", &[]).unwrap();
        resolver.resolve("maps.options", &[]).unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(loads.get(), 1);
        assert_eq!(resolver.cached_scopes(), vec!["maps"]);
    }

    #[test]
    fn value_members_are_returned_as_is() {
        let (resolver, _) = resolver();

        let resolved = resolver.resolve("maps.options", &[]).unwrap();

        assert_eq!(resolved.as_value(), Some(&serde_json::json!({"inline": true})));
    }

    #[test]
    fn non_callable_namespace_lists_members() {
        let (resolver, _) = resolver();

        let resolved = resolver.resolve("maps", &[]).unwrap();

        assert!(matches!(resolved, Resolved::Namespace(ref m) if m.len() == 3));
        assert!(resolved.into_stage("maps").is_err());
    }

    #[test]
    fn unknown_scope_and_member() {
        let (resolver, _) = resolver();

        assert!(matches!(
            resolver.resolve("sass", &[]),
            Err(PluginError::ModuleNotFound(s)) if s == "sass"
        ));
        assert!(matches!(
            resolver.resolve("maps.nope", &[]),
            Err(PluginError::MemberNotFound { member, .. }) if member == "nope"
        ));
        assert!(matches!(
            resolver.resolve(".init", &[]),
            Err(PluginError::InvalidName(_))
        ));
    }

    #[test]
    fn stage_failure_ends_stream_with_plugin_name() {
        let (resolver, _) = resolver();
        let stage = resolver
            .resolve("maps.broken", &[])
            .unwrap()
            .into_stage("maps.broken")
            .unwrap();

        let outcome = FileStream::from_files(vec![SourceFile::new("/", "/a", "x")])
            .pipe_boxed(stage)
            .run()
            .unwrap();

        assert!(outcome.files.is_empty());
        assert_eq!(outcome.failures[0].stage, "maps.broken");
        assert_eq!(outcome.failures[0].message, "bad map");
    }
}
