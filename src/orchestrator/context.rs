//! Operations available to task and pipe bodies

use std::path::Path;

use serde_json::Value;

use crate::config::Config;
use crate::definition::{Invocation, Registry, PIPE_KIND};
use crate::output::Output;
use crate::pipe::{PipeStage, DEFAULTS_PIPE};
use crate::plugin::{PluginResolver, Resolved};
use crate::stream::{Destination, FileStream, Guarded, Stage, WriteOptions};
use crate::DevourError;

/// The orchestration context handed to every factory
///
/// Owns the configuration, the definition registry and the plugin cache.
/// Built once per process and read-only afterwards.
pub struct Context {
    config: Config,
    registry: Registry,
    plugins: PluginResolver,
    output: Output,
}

impl Context {
    pub fn new(config: Config, registry: Registry, plugins: PluginResolver, output: Output) -> Self {
        Self {
            config,
            registry,
            plugins,
            output,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Reads a setting, falling back when it is absent
    pub fn setting(&self, key: &str, fallback: Value) -> Value {
        self.config.get(key).unwrap_or(fallback)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn output(&self) -> Output {
        self.output
    }

    /// Resolves a plugin by dotted name
    pub fn plugin(&self, name: &str, args: &[Value]) -> Result<Resolved, DevourError> {
        Ok(self.plugins.resolve(name, args)?)
    }

    /// Resolves a plugin that must be a stage
    pub fn stage(&self, name: &str, args: &[Value]) -> Result<Box<dyn Stage>, DevourError> {
        Ok(self.plugin(name, args)?.into_stage(name)?)
    }

    /// Invokes a registered pipe, returning it as a single stage
    ///
    /// Fails with [`DevourError::PipeNotFound`] for unknown names.
    pub fn pipe(&self, name: &str, args: &[Value]) -> Result<Box<dyn Stage>, DevourError> {
        let factory = self
            .registry
            .get(PIPE_KIND, name)
            .ok_or_else(|| DevourError::PipeNotFound(name.to_string()))?;

        let stream = factory.create(None, self, &Invocation::pipe(name, args))?;
        Ok(Box::new(Guarded::new(name, Box::new(PipeStage::new(name, stream)))))
    }

    /// A source stream over build targets, passed through the `defaults` pipe
    pub fn source<S: AsRef<str>>(&self, targets: &[S]) -> Result<FileStream, DevourError> {
        let stream = FileStream::from_globs(targets, &self.config.base_path);

        match self.registry.get(PIPE_KIND, DEFAULTS_PIPE) {
            Some(defaults) => defaults.create(Some(stream), self, &Invocation::pipe(DEFAULTS_PIPE, &[])),
            None => Ok(stream),
        }
    }

    /// A destination under the output directory
    ///
    /// An absolute `path` is used as given.
    pub fn write(&self, path: Option<&str>, options: WriteOptions) -> Destination {
        let output = self.config.output_dir();
        let dir = match path {
            Some(path) if Path::new(path).is_absolute() => Path::new(path).to_path_buf(),
            Some(path) => output.join(path),
            None => output,
        };
        Destination::new(dir, options)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("plugins", &self.plugins.cached_scopes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::rc::Rc;

    use tempfile::TempDir;

    use super::*;
    use crate::definition::{DefinitionFile, FnFactory, Factory};
    use crate::pipe::DefaultsPipe;
    use crate::plugin::InProcessModules;

    fn context(dir: &TempDir, defaults: &[&str], registry: Registry) -> Context {
        let config = Config {
            base_path: dir.path().to_path_buf(),
            defaults: defaults.iter().map(|s| s.to_string()).collect(),
            ..Config::default()
        };
        let plugins = PluginResolver::new(vec![Box::new(InProcessModules::builtin())]);
        Context::new(config, registry, plugins, Output::quiet())
    }

    fn with_defaults() -> Registry {
        let mut registry = Registry::new();
        registry.register(PIPE_KIND, DEFAULTS_PIPE, Rc::new(DefaultsPipe));
        registry
    }

    #[test]
    fn source_applies_defaults_in_order() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/app.js"), "x").unwrap();

        let ctx = context(&dir, &["min", "rename.min"], with_defaults());
        let stream = ctx.source(&["src/*.js"]).unwrap();

        assert_eq!(stream.stage_names(), vec!["min", "rename.min"]);
    }

    #[test]
    fn source_without_defaults_is_untouched() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, &[], with_defaults());

        assert!(ctx.source(&["src/*.js"]).unwrap().stage_names().is_empty());
    }

    #[test]
    fn unknown_pipe_leaves_registry_alone() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, &[], with_defaults());
        let before = ctx.registry().len();

        let err = ctx.pipe("bundle", &[]).unwrap_err();

        assert!(matches!(err, DevourError::PipeNotFound(ref name) if name == "bundle"));
        assert_eq!(err.to_string(), "Named pipe not found: bundle");
        assert_eq!(ctx.registry().len(), before);
        assert!(!ctx.registry().contains(PIPE_KIND, "bundle"));
    }

    #[test]
    fn pipe_receives_its_arguments() {
        let dir = TempDir::new().unwrap();
        let mut registry = with_defaults();
        let seen: Rc<std::cell::RefCell<Vec<Value>>> = Rc::default();
        let captured = Rc::clone(&seen);
        let factory: Rc<dyn Factory> = Rc::new(FnFactory(
            move |stream: Option<FileStream>, _ctx: &Context, call: &Invocation| {
                captured.borrow_mut().extend(call.args.iter().cloned());
                assert!(stream.is_none());
                Ok(FileStream::inlet())
            },
        ));
        registry.register(PIPE_KIND, "bundle", factory);

        let ctx = context(&dir, &[], registry);
        let stage = ctx.pipe("bundle", &[Value::from("app.js")]).unwrap();

        assert_eq!(stage.name(), "bundle");
        assert_eq!(*seen.borrow(), vec![Value::from("app.js")]);
    }

    #[test]
    fn user_defaults_pipe_overrides_builtin() {
        let dir = TempDir::new().unwrap();
        let mut registry = with_defaults();
        let custom = DefinitionFile::parse("[[stage]]\nplugin = \"header\"\nargs = [\"/* hi */\"]\n").unwrap();
        assert!(registry
            .register(PIPE_KIND, DEFAULTS_PIPE, Rc::new(custom))
            .is_some());

        let ctx = context(&dir, &["min"], registry);
        let stream = ctx.source(&["src/*.js"]).unwrap();

        assert_eq!(stream.stage_names(), vec!["header"]);
    }

    #[test]
    fn write_resolves_under_output() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, &[], Registry::new());

        assert_eq!(ctx.write(None, WriteOptions::default()).dir(), dir.path().join("dist"));
        assert_eq!(
            ctx.write(Some("css"), WriteOptions::default()).dir(),
            dir.path().join("dist/css")
        );
        assert_eq!(
            ctx.write(Some("/tmp/out"), WriteOptions::default()).dir(),
            Path::new("/tmp/out")
        );
    }

    #[test]
    fn setting_falls_back() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir, &[], Registry::new());
        ctx.config.extra.insert("banner".to_string(), Value::from("v1"));

        assert_eq!(ctx.setting("banner", Value::Null), Value::from("v1"));
        assert_eq!(ctx.setting("debounce", Value::Null), Value::from(100));
        assert_eq!(ctx.setting("missing", Value::from(3)), Value::from(3));
    }
}
