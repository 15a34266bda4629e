//! Binding tasks to the engine

use std::rc::Rc;
use std::time::Instant;

use colored::Colorize;
use serde_json::Value;

use crate::config::Config;
use crate::definition::{Invocation, TASK_KIND};
use crate::engine::{Engine, Runnable};
use crate::output::{format_elapsed, Output};
use crate::plugin::Resolved;
use crate::stream::{Destination, FileStream, Stage, WriteOptions};
use crate::task::{Targets, TaskSpec, WatchArg};
use crate::DevourError;

use super::Context;

/// The orchestrator
///
/// Owns the context, the engine, the run selection and the active set.
pub struct Devour<E: Engine> {
    pub(super) ctx: Rc<Context>,
    pub(super) engine: E,
    pub(super) selection: Vec<String>,
    pub(super) watch: bool,
    pub(super) active: Vec<String>,
    pub(super) scheduled: Vec<TaskSpec>,
}

impl<E: Engine> Devour<E> {
    pub(super) fn new(ctx: Rc<Context>, engine: E, selection: Vec<String>, watch: bool) -> Self {
        Self {
            ctx,
            engine,
            selection,
            watch,
            active: Vec::new(),
            scheduled: Vec::new(),
        }
    }

    /// Declares a task in any accepted call shape
    ///
    /// See [`TaskSpec::resolve`] for how the arguments are normalised.
    pub fn task(
        &mut self,
        name: &str,
        build: Option<Targets>,
        watch: Option<WatchArg>,
    ) -> Result<&mut Self, DevourError> {
        self.schedule(TaskSpec::resolve(name, build, watch))?;
        Ok(self)
    }

    /// Registers a canonical task with the engine
    ///
    /// Outside a selective run, a task with a watch list joins the active set
    /// and gets a debounced watch.
    pub fn schedule(&mut self, spec: TaskSpec) -> Result<(), DevourError> {
        if !self.ctx.registry().contains(TASK_KIND, spec.base_name()) {
            return Err(DevourError::TaskNotFound(spec.base_name().to_string()));
        }

        let output = self.ctx.output();
        let watching = if spec.is_watched() {
            spec.watch.join(", ")
        } else {
            "(none, not watching)".to_string()
        };
        output.info(&format!(
            "Task {}: build {} | watch {}",
            spec.name.cyan(),
            if spec.build.is_empty() { "(none)".to_string() } else { spec.build.join(", ") },
            watching
        ));

        self.bind(&spec);

        // A redeclared task keeps only its latest watch
        if self.scheduled.iter().any(|s| s.name == spec.name) {
            self.engine.unwatch(&spec.name);
        }

        if !self.is_selective() && spec.is_watched() {
            self.engine.watch(
                &spec.watch,
                self.ctx.config().debounce_duration(),
                vec![spec.name.clone()],
            )?;
            if !self.active.contains(&spec.name) {
                self.active.push(spec.name.clone());
            }
        } else {
            self.active.retain(|name| name != &spec.name);
        }

        self.scheduled.retain(|s| s.name != spec.name);
        self.scheduled.push(spec);
        Ok(())
    }

    /// Declares every task listed in the configuration, in order
    pub fn declare_from_config(&mut self) -> Result<(), DevourError> {
        let decls = self.ctx.config().tasks.clone();
        for decl in decls {
            self.task(&decl.name, decl.build, decl.watch)?;
        }
        Ok(())
    }

    pub(super) fn bind(&mut self, spec: &TaskSpec) {
        let runnable = task_runnable(Rc::clone(&self.ctx), spec.clone());
        self.engine.add_task(&spec.name, Vec::new(), Some(runnable));
    }

    /// Returns true when tasks were named on the command line
    pub fn is_selective(&self) -> bool {
        !self.selection.is_empty()
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    /// Tasks eligible for the aggregate run, in registration order
    pub fn active(&self) -> &[String] {
        &self.active
    }

    /// Canonical specs of every declared task
    pub fn scheduled(&self) -> &[TaskSpec] {
        &self.scheduled
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn plugin(&self, name: &str, args: &[Value]) -> Result<Resolved, DevourError> {
        self.ctx.plugin(name, args)
    }

    pub fn pipe(&self, name: &str, args: &[Value]) -> Result<Box<dyn Stage>, DevourError> {
        self.ctx.pipe(name, args)
    }

    pub fn source<S: AsRef<str>>(&self, targets: &[S]) -> Result<FileStream, DevourError> {
        self.ctx.source(targets)
    }

    pub fn write(&self, path: Option<&str>, options: WriteOptions) -> Destination {
        self.ctx.write(path, options)
    }

    pub fn config(&self) -> &Config {
        self.ctx.config()
    }

    /// Reads a setting, falling back when it is absent
    pub fn setting(&self, key: &str, fallback: Value) -> Value {
        self.ctx.setting(key, fallback)
    }
}

fn task_runnable(ctx: Rc<Context>, spec: TaskSpec) -> Runnable {
    Box::new(move || run_task(&ctx, &spec))
}

/// One timed execution of a task
///
/// Stage failures are reported and the task is marked failed, but the run
/// carries on; wiring errors are returned.
fn run_task(ctx: &Context, spec: &TaskSpec) -> Result<(), DevourError> {
    let output: Output = ctx.output();
    let started = Instant::now();
    output.log(&format!("Starting '{}'...", spec.name.cyan()));

    let factory = ctx
        .registry()
        .get(TASK_KIND, spec.base_name())
        .ok_or_else(|| DevourError::TaskNotFound(spec.base_name().to_string()))?;

    let stream = if spec.build.is_empty() {
        None
    } else {
        Some(ctx.source(&spec.build)?)
    };

    let outcome = factory
        .create(stream, ctx, &Invocation::task(&spec.name))?
        .run()?;
    let elapsed = format_elapsed(started.elapsed());

    if outcome.is_clean() {
        tracing::debug!(task = %spec.name, files = outcome.files.len(), "task finished");
        output.log(&format!(
            "Finished '{}' after {}",
            spec.name.cyan(),
            elapsed.magenta()
        ));
    } else {
        for failure in &outcome.failures {
            output.error(&format!(
                "Error from plugin {}: {}",
                failure.stage.red(),
                failure.message
            ));
        }
        output.log(&format!("Failed '{}' after {}", spec.name.red(), elapsed.magenta()));
    }

    Ok(())
}
