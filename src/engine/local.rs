//! In-process engine

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind, Debouncer};

use super::{Engine, EngineError, Runnable, WatchRegistration};

struct TaskEntry {
    deps: Vec<String>,
    runnable: Option<Runnable>,
}

type Trigger = (usize, DebounceEventResult);

/// Runs tasks sequentially on the calling thread
pub struct LocalEngine {
    cwd: PathBuf,
    tasks: HashMap<String, TaskEntry>,
    watches: Vec<WatchRegistration>,
    debouncers: Vec<Debouncer<RecommendedWatcher>>,
    triggers: Option<Receiver<Trigger>>,
}

impl LocalEngine {
    /// Creates an engine resolving relative watch globs against `cwd`
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            tasks: HashMap::new(),
            watches: Vec::new(),
            debouncers: Vec::new(),
            triggers: None,
        }
    }

    /// Registered watches, in registration order
    pub fn watches(&self) -> &[WatchRegistration] {
        &self.watches
    }

    fn run_all(&mut self, names: &[String]) -> Result<(), EngineError> {
        if let Some(unknown) = names.iter().find(|name| !self.tasks.contains_key(*name)) {
            return Err(EngineError::UnknownTask(unknown.clone()));
        }

        let mut seen = HashSet::new();
        for name in names {
            self.run_task(name, &mut seen)?;
        }
        Ok(())
    }

    fn run_task(&mut self, name: &str, seen: &mut HashSet<String>) -> Result<(), EngineError> {
        if !seen.insert(name.to_string()) {
            return Ok(());
        }

        let deps = match self.tasks.get(name) {
            Some(entry) => entry.deps.clone(),
            None => return Err(EngineError::UnknownTask(name.to_string())),
        };
        for dep in &deps {
            self.run_task(dep, seen)?;
        }

        if let Some(runnable) = self.tasks.get_mut(name).and_then(|t| t.runnable.as_mut()) {
            tracing::debug!(task = name, "running");
            runnable().map_err(|source| EngineError::TaskFailed {
                task: name.to_string(),
                source: Box::new(source),
            })?;
        }
        Ok(())
    }
}

impl Engine for LocalEngine {
    fn add_task(&mut self, name: &str, deps: Vec<String>, runnable: Option<Runnable>) {
        self.tasks
            .insert(name.to_string(), TaskEntry { deps, runnable });
    }

    fn has_task(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    fn watch(&mut self, globs: &[String], debounce: Duration, tasks: Vec<String>) -> Result<(), EngineError> {
        if let Some(unknown) = tasks.iter().find(|name| !self.tasks.contains_key(*name)) {
            return Err(EngineError::UnknownTask(unknown.clone()));
        }

        let registration = WatchRegistration::new(globs, &self.cwd, debounce, tasks);
        tracing::debug!(patterns = ?registration.patterns, tasks = ?registration.tasks, "watch registered");
        self.watches.push(registration);
        Ok(())
    }

    fn unwatch(&mut self, task: &str) {
        for registration in &mut self.watches {
            registration.tasks.retain(|name| name != task);
        }
        self.watches.retain(|registration| !registration.tasks.is_empty());
    }

    fn run<F>(&mut self, names: &[String], done: F)
    where
        F: FnOnce(Result<(), EngineError>),
    {
        done(self.run_all(names));
    }

    fn start_watching(&mut self) -> Result<(), EngineError> {
        let (tx, rx) = mpsc::channel();

        for (index, registration) in self.watches.iter().enumerate() {
            let tx = tx.clone();
            let mut debouncer = new_debouncer(registration.debounce, move |result: DebounceEventResult| {
                let _ = tx.send((index, result));
            })
            .map_err(|e| EngineError::Watch {
                path: registration.patterns.join(", "),
                message: e.to_string(),
            })?;

            for (root, recursive) in registration.roots() {
                if !root.exists() {
                    tracing::warn!(path = %root.display(), "watch root does not exist, skipping");
                    continue;
                }
                let mode = if recursive {
                    RecursiveMode::Recursive
                } else {
                    RecursiveMode::NonRecursive
                };
                debouncer
                    .watcher()
                    .watch(&root, mode)
                    .map_err(|e| EngineError::Watch {
                        path: root.display().to_string(),
                        message: e.to_string(),
                    })?;
            }

            self.debouncers.push(debouncer);
        }

        self.triggers = Some(rx);
        Ok(())
    }

    fn serve(&mut self) -> Result<(), EngineError> {
        let triggers = self.triggers.take().ok_or(EngineError::NotWatching)?;

        while let Ok((index, result)) = triggers.recv() {
            let events = match result {
                Ok(events) => events,
                Err(error) => {
                    tracing::warn!("watch error: {:?}", error);
                    continue;
                }
            };

            let Some(registration) = self.watches.get(index) else {
                continue;
            };
            // AnyContinuous fires while a burst is still settling; the
            // closing Any for the same path follows it
            let changed = events
                .iter()
                .filter(|event| event.kind == DebouncedEventKind::Any)
                .filter(|event| registration.matches(&event.path))
                .count();
            if changed == 0 {
                continue;
            }

            tracing::debug!(changed, tasks = ?registration.tasks, "watch triggered");
            let tasks = registration.tasks.clone();
            if let Err(error) = self.run_all(&tasks) {
                tracing::error!("{}", error);
            }
        }

        Ok(())
    }
}
