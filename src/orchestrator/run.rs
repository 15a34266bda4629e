//! Deciding what runs

use std::collections::BTreeMap;

use colored::Colorize;
use serde::Serialize;

use crate::definition::TASK_KIND;
use crate::engine::{Engine, EngineError};
use crate::task::{base_name, TaskSpec};
use crate::DevourError;

use super::Devour;

/// Name of the aggregate task
pub const DEFAULT_TASK: &str = "default";

/// How a call to [`Devour::start`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The requested tasks ran to completion
    Completed,
    /// Every name on the command line was unknown; nothing ran
    NothingToRun,
    /// The aggregate ran and the watchers stopped afterwards
    Watched,
}

/// What `--list` reports
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub definitions: BTreeMap<String, Vec<String>>,
    pub scheduled: Vec<TaskSpec>,
    pub active: Vec<String>,
}

impl<E: Engine> Devour<E> {
    /// Runs the selection, or the aggregate when nothing was selected
    ///
    /// The aggregate runs the `default` task and then keeps watching, unless
    /// watching is disabled or no task has anything to watch.
    pub fn start(&mut self) -> Result<RunStatus, DevourError> {
        if self.is_selective() {
            self.run_selection()
        } else {
            self.run_aggregate()
        }
    }

    fn run_selection(&mut self) -> Result<RunStatus, DevourError> {
        let output = self.ctx.output();
        let mut valid = Vec::new();

        for name in self.selection.clone() {
            if self.engine.has_task(&name) {
                valid.push(name);
                continue;
            }

            let base = base_name(&name);
            let spec = match self.scheduled.iter().find(|s| s.name == base) {
                Some(spec) => Some(spec.renamed(name.as_str())),
                None if self.ctx.registry().contains(TASK_KIND, base) => Some(TaskSpec::bare(name.as_str())),
                None => None,
            };

            match spec {
                Some(spec) => {
                    self.bind(&spec);
                    valid.push(name);
                }
                None => output.error(&format!("Task {} not found", name.red())),
            }
        }

        if valid.is_empty() {
            return Ok(RunStatus::NothingToRun);
        }

        self.run_engine(&valid)?;
        Ok(RunStatus::Completed)
    }

    fn run_aggregate(&mut self) -> Result<RunStatus, DevourError> {
        let output = self.ctx.output();

        if !self.engine.has_task(DEFAULT_TASK) {
            if self.ctx.registry().contains(TASK_KIND, DEFAULT_TASK) {
                self.bind(&TaskSpec::bare(DEFAULT_TASK));
            } else {
                output.info(&format!(
                    "No default task found, creating it with tasks: {}",
                    self.active.join(", ")
                ));
                self.engine.add_task(DEFAULT_TASK, self.active.clone(), None);
                output.info(&format!("Registered {}: {}", DEFAULT_TASK, "OK".green()));
            }
        }

        let watching = self.watch && !self.active.is_empty();
        if watching {
            self.engine.start_watching()?;
        }

        self.run_engine(&[DEFAULT_TASK.to_string()])?;

        if !watching {
            return Ok(RunStatus::Completed);
        }

        output.info(&format!("Watching {} task(s) for changes", self.active.len()));
        self.engine.serve()?;
        Ok(RunStatus::Watched)
    }

    fn run_engine(&mut self, names: &[String]) -> Result<(), DevourError> {
        let mut completion = None;
        self.engine.run(names, |result| completion = Some(result));

        completion.unwrap_or(Err(EngineError::NoCompletion))?;
        self.ctx.output().success("Complete");
        Ok(())
    }

    /// Definitions and scheduled tasks, for `--list`
    pub fn listing(&self) -> Listing {
        let registry = self.ctx.registry();
        let definitions = registry
            .kinds()
            .into_iter()
            .map(|kind| {
                let names = registry.names(kind).into_iter().map(String::from).collect();
                (kind.to_string(), names)
            })
            .collect();

        Listing {
            definitions,
            scheduled: self.scheduled.clone(),
            active: self.active.clone(),
        }
    }
}
