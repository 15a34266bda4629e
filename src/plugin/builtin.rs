//! Built-in plugin modules
//!
//! Small text stages that ship with Devour so common pipelines work without
//! installing anything.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;

use super::module::{optional_string_arg, string_arg, Export, PluginError};
use super::resolver::ModuleSource;
use crate::stream::{stage_fn, SourceFile, Stage};

/// Modules living in this process, keyed by scope
#[derive(Debug, Clone, Default)]
pub struct InProcessModules {
    modules: BTreeMap<String, Export>,
}

impl InProcessModules {
    /// No modules at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in modules
    pub fn builtin() -> Self {
        let mut modules = Self::empty();
        modules.insert("min", min_module());
        modules.insert("rename", rename_module());
        modules.insert("concat", concat_module());
        modules.insert("header", header_module());
        modules.insert("footer", footer_module());
        modules.insert("replace", replace_module());
        modules
    }

    /// Registers a module under a scope, replacing any previous one
    pub fn insert(&mut self, scope: impl Into<String>, module: Export) {
        self.modules.insert(scope.into(), module);
    }
}

impl ModuleSource for InProcessModules {
    fn label(&self) -> &str {
        "in-process"
    }

    fn load(&self, scope: &str) -> Result<Option<Export>, PluginError> {
        Ok(self.modules.get(scope).cloned())
    }
}

fn boxed(stage: impl Stage + 'static) -> Box<dyn Stage> {
    Box::new(stage)
}

/// `app.prep.js` becomes `app.min.js`
fn minified_name(file: &SourceFile) -> String {
    let stem = file.stem().replace(".min", "").replace(".prep", "");
    match file.extension() {
        Some(ext) => format!("{}.min.{}", stem, ext),
        None => format!("{}.min", stem),
    }
}

fn min_stage() -> Box<dyn Stage> {
    boxed(stage_fn("min", |files: Vec<SourceFile>| {
        Ok(files
            .into_iter()
            .map(|mut file| {
                let name = minified_name(&file);
                file.set_file_name(&name);
                file
            })
            .collect())
    }))
}

fn min_module() -> Export {
    Export::stage(|_args| Ok(min_stage()))
}

/// `rename(prefix?, suffix?, extname?)`, plus `rename.min`
fn rename_module() -> Export {
    Export::stage(|args: &[Value]| {
        let prefix = optional_string_arg("rename", args, 0)?.unwrap_or_default();
        let suffix = optional_string_arg("rename", args, 1)?.unwrap_or_default();
        let extname = optional_string_arg("rename", args, 2)?;

        Ok(boxed(stage_fn("rename", move |files: Vec<SourceFile>| {
            Ok(files
                .into_iter()
                .map(|mut file| {
                    let ext = match &extname {
                        Some(ext) => ext.trim_start_matches('.').to_string(),
                        None => file.extension().unwrap_or("").to_string(),
                    };
                    let mut name = format!("{}{}{}", prefix, file.stem(), suffix);
                    if !ext.is_empty() {
                        name.push('.');
                        name.push_str(&ext);
                    }
                    file.set_file_name(&name);
                    file
                })
                .collect())
        })))
    })
    .with_member("min", min_module())
}

/// `concat(file_name, separator?)`
fn concat_module() -> Export {
    Export::stage(|args: &[Value]| {
        let target = string_arg("concat", args, 0)?;
        let separator = optional_string_arg("concat", args, 1)?.unwrap_or_else(|| "\n".to_string());

        Ok(boxed(stage_fn("concat", move |files: Vec<SourceFile>| {
            let Some(first) = files.first() else {
                return Ok(Vec::new());
            };

            let base = first.base.clone();
            let dir = first
                .path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| base.clone());

            let mut contents = Vec::new();
            for (i, file) in files.iter().enumerate() {
                if i > 0 {
                    contents.extend_from_slice(separator.as_bytes());
                }
                contents.extend_from_slice(&file.contents);
            }

            Ok(vec![SourceFile::new(base, dir.join(&target), contents)])
        })))
    })
}

fn wrap_module(name: &'static str, prepend: bool) -> Export {
    Export::stage(move |args: &[Value]| {
        let text = string_arg(name, args, 0)?;

        Ok(boxed(stage_fn(name, move |files: Vec<SourceFile>| {
            Ok(files
                .into_iter()
                .map(|mut file| {
                    if prepend {
                        let mut contents = text.clone().into_bytes();
                        contents.extend_from_slice(&file.contents);
                        file.contents = contents;
                    } else {
                        file.contents.extend_from_slice(text.as_bytes());
                    }
                    file
                })
                .collect())
        })))
    })
}

/// `header(text)`
fn header_module() -> Export {
    wrap_module("header", true)
}

/// `footer(text)`
fn footer_module() -> Export {
    wrap_module("footer", false)
}

/// `replace(from, to)`
fn replace_module() -> Export {
    Export::stage(|args: &[Value]| {
        let from = string_arg("replace", args, 0)?;
        let to = string_arg("replace", args, 1)?;
        if from.is_empty() {
            return Err(PluginError::InvalidArguments {
                name: "replace".to_string(),
                message: "search text must not be empty".to_string(),
            });
        }

        Ok(boxed(stage_fn("replace", move |files: Vec<SourceFile>| {
            Ok(files
                .into_iter()
                .map(|mut file| {
                    file.contents = file.text().replace(&from, &to).into_bytes();
                    file
                })
                .collect())
        })))
    })
}
