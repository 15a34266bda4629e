//! Construction of the orchestrator

use std::rc::Rc;

use crate::config::Config;
use crate::definition::{load_definitions, Factory, FnFactory, Invocation, Registry, PIPE_KIND};
use crate::engine::Engine;
use crate::output::Output;
use crate::pipe::{DefaultsPipe, DEFAULTS_PIPE};
use crate::plugin::{Export, ExecutableModules, InProcessModules, ModuleSource, PluginResolver};
use crate::stream::FileStream;
use crate::DevourError;

use super::{Context, Devour};

/// Builds a [`Devour`] instance
///
/// Registration order is fixed: the built-in `defaults` pipe, then
/// definition files, then factories added here. A later registration for the
/// same `(kind, name)` replaces the earlier one.
pub struct DevourBuilder {
    config: Config,
    selection: Vec<String>,
    output: Output,
    modules: InProcessModules,
    factories: Vec<(String, String, Rc<dyn Factory>)>,
    watch: bool,
    search_path: bool,
}

impl DevourBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            selection: Vec::new(),
            output: Output::default(),
            modules: InProcessModules::builtin(),
            factories: Vec::new(),
            watch: true,
            search_path: true,
        }
    }

    /// Task names requested on the command line
    pub fn selection<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection = names.into_iter().map(Into::into).collect();
        self
    }

    /// Console output; verbosity is recomputed from the configuration
    pub fn output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    /// Registers an in-process plugin module
    pub fn module(mut self, scope: impl Into<String>, module: Export) -> Self {
        self.modules.insert(scope, module);
        self
    }

    /// Registers a factory under `(kind, name)`
    pub fn factory(mut self, kind: &str, name: &str, factory: Rc<dyn Factory>) -> Self {
        self.factories.push((kind.to_string(), name.to_string(), factory));
        self
    }

    /// Registers a closure as a factory
    pub fn factory_fn<F>(self, kind: &str, name: &str, f: F) -> Self
    where
        F: Fn(Option<FileStream>, &Context, &Invocation) -> Result<FileStream, DevourError> + 'static,
    {
        self.factory(kind, name, Rc::new(FnFactory(f)))
    }

    /// Whether the aggregate run keeps watching afterwards
    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Whether plugin executables are also looked up on `PATH`
    pub fn search_path(mut self, search_path: bool) -> Self {
        self.search_path = search_path;
        self
    }

    pub fn build<E: Engine>(self, engine: E) -> Result<Devour<E>, DevourError> {
        let verbosity = match self.config.verbose {
            Some(verbose) => verbose.level(),
            None if self.selection.is_empty() => 1,
            None => 0,
        };
        let output = self.output.with_verbosity(verbosity);

        let mut registry = Registry::new();
        registry.register(PIPE_KIND, DEFAULTS_PIPE, Rc::new(DefaultsPipe));

        let root = self.config.gulp_files_dir();
        for loaded in load_definitions(&root)? {
            if registry
                .register(&loaded.kind, &loaded.name, Rc::new(loaded.definition))
                .is_some()
            {
                tracing::warn!(
                    kind = %loaded.kind,
                    name = %loaded.name,
                    path = %loaded.path.display(),
                    "definition replaces an earlier one"
                );
            }
        }

        for (kind, name, factory) in self.factories {
            if registry.register(&kind, &name, factory).is_some() {
                tracing::warn!(kind = %kind, name = %name, "factory replaces an earlier one");
            }
        }

        print_summary(&registry, output);

        let mut executables = ExecutableModules::new();
        executables.add_plugin_dir(self.config.plugins_dir());
        if !self.search_path {
            executables = executables.without_path();
        }
        let sources: Vec<Box<dyn ModuleSource>> = vec![Box::new(self.modules), Box::new(executables)];

        let ctx = Context::new(self.config, registry, PluginResolver::new(sources), output);
        Ok(Devour::new(Rc::new(ctx), engine, self.selection, self.watch))
    }
}

fn print_summary(registry: &Registry, output: Output) {
    if !output.is_verbose() {
        return;
    }

    output.info("Devour initialized");
    let mut kinds = vec!["task", "pipe"];
    kinds.extend(registry.kinds().into_iter().filter(|k| *k != "task" && *k != "pipe"));

    for kind in kinds {
        let names = registry.names(kind);
        let listed = if names.is_empty() {
            "none".to_string()
        } else {
            names.join(", ")
        };
        output.info(&format!("  Available {}s: {}", kind, listed));
    }
    output.blank();
}
