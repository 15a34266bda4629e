//! Definition files
//!
//! A definition file describes a task or pipe as an ordered list of stages:
//!
//! ```toml
//! description = "Bundle scripts"
//! source = ["src/js/**/*.js"]   # used when the task has no build targets
//!
//! [[stage]]
//! plugin = "concat"
//! args = ["app.js"]
//!
//! [[stage]]
//! pipe = "minify"
//!
//! [[stage]]
//! write = "js"
//!
//! [variants.prod]               # used when invoked as `<name>:prod`
//! stage = [{ pipe = "minify" }, { write = "js" }]
//! ```
//!
//! In pipe definitions, string arguments of the form `$0`, `$1`, ... are
//! replaced by the arguments the pipe was invoked with.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::registry::{Factory, Invocation};
use crate::orchestrator::Context;
use crate::stream::{FileStream, Stage, WriteOptions};
use crate::DevourError;

/// One stage of a definition
///
/// A stage table names exactly one of `plugin`, `pipe` or `write`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, try_from = "RawStage")]
pub enum StageDef {
    Plugin {
        plugin: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<Value>,
    },
    Pipe {
        pipe: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<Value>,
    },
    Write {
        write: String,
        #[serde(default = "default_overwrite")]
        overwrite: bool,
    },
}

fn default_overwrite() -> bool {
    true
}

/// Stage table as written, before checking which key it names
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStage {
    plugin: Option<String>,
    pipe: Option<String>,
    write: Option<String>,
    args: Option<Vec<Value>>,
    overwrite: Option<bool>,
}

impl TryFrom<RawStage> for StageDef {
    type Error = String;

    fn try_from(raw: RawStage) -> Result<Self, Self::Error> {
        let stage = match (raw.plugin, raw.pipe, raw.write) {
            (Some(plugin), None, None) => StageDef::Plugin {
                plugin,
                args: raw.args.unwrap_or_default(),
            },
            (None, Some(pipe), None) => StageDef::Pipe {
                pipe,
                args: raw.args.unwrap_or_default(),
            },
            (None, None, Some(write)) => {
                if raw.args.is_some() {
                    return Err("`args` does not apply to a write stage".to_string());
                }
                return Ok(StageDef::Write {
                    write,
                    overwrite: raw.overwrite.unwrap_or_else(default_overwrite),
                });
            }
            (None, None, None) => {
                return Err("stage must name one of `plugin`, `pipe` or `write`".to_string())
            }
            _ => return Err("stage names more than one of `plugin`, `pipe` and `write`".to_string()),
        };

        if raw.overwrite.is_some() {
            return Err("`overwrite` only applies to a write stage".to_string());
        }
        Ok(stage)
    }
}

impl StageDef {
    fn build(&self, ctx: &Context, call: &Invocation) -> Result<Box<dyn Stage>, DevourError> {
        match self {
            StageDef::Plugin { plugin, args } => ctx.stage(plugin, &substitute(args, &call.args)),
            StageDef::Pipe { pipe, args } => ctx.pipe(pipe, &substitute(args, &call.args)),
            StageDef::Write { write, overwrite } => {
                let path = Some(write.as_str()).filter(|p| !p.is_empty());
                Ok(Box::new(ctx.write(
                    path,
                    WriteOptions {
                        overwrite: *overwrite,
                    },
                )))
            }
        }
    }
}

/// Stages used for one variant of a definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantDef {
    #[serde(default)]
    pub stage: Vec<StageDef>,
}

/// A task or pipe loaded from a definition file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefinitionFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Globs streamed when the definition is invoked without a stream
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source: Vec<String>,

    #[serde(default)]
    pub stage: Vec<StageDef>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variants: BTreeMap<String, VariantDef>,
}

impl DefinitionFile {
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Stages for an invocation: the variant's own list when it has one
    pub fn stages_for(&self, variant: Option<&str>) -> &[StageDef] {
        variant
            .and_then(|v| self.variants.get(v))
            .map(|v| v.stage.as_slice())
            .unwrap_or(&self.stage)
    }
}

impl Factory for DefinitionFile {
    fn create(
        &self,
        stream: Option<FileStream>,
        ctx: &Context,
        call: &Invocation,
    ) -> Result<FileStream, DevourError> {
        let mut stream = match stream {
            Some(stream) => stream,
            None if !self.source.is_empty() => ctx.source(&self.source)?,
            None => FileStream::inlet(),
        };

        for def in self.stages_for(call.variant()) {
            stream = stream.pipe_boxed(def.build(ctx, call)?);
        }

        Ok(stream)
    }
}

/// Replaces `$N` placeholders with invocation arguments
fn substitute(args: &[Value], call_args: &[Value]) -> Vec<Value> {
    args.iter()
        .map(|arg| match arg.as_str().and_then(|s| s.strip_prefix('$')) {
            Some(index) => match index.parse::<usize>() {
                Ok(i) => call_args.get(i).cloned().unwrap_or(Value::Null),
                Err(_) => arg.clone(),
            },
            None => arg.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_stages_of_each_kind() {
        let def = DefinitionFile::parse(
            r#"
description = "scripts"

[[stage]]
plugin = "concat"
args = ["app.js"]

[[stage]]
pipe = "minify"

[[stage]]
write = "js"
overwrite = false
"#,
        )
        .unwrap();

        assert_eq!(def.description.as_deref(), Some("scripts"));
        assert_eq!(
            def.stage,
            vec![
                StageDef::Plugin {
                    plugin: "concat".to_string(),
                    args: vec![json!("app.js")]
                },
                StageDef::Pipe {
                    pipe: "minify".to_string(),
                    args: vec![]
                },
                StageDef::Write {
                    write: "js".to_string(),
                    overwrite: false
                },
            ]
        );
    }

    #[test]
    fn variants_override_stages() {
        let def = DefinitionFile::parse(
            r#"
stage = [{ write = "dev" }]

[variants.prod]
stage = [{ plugin = "min" }, { write = "prod" }]
"#,
        )
        .unwrap();

        assert_eq!(def.stages_for(None).len(), 1);
        assert_eq!(def.stages_for(Some("prod")).len(), 2);
        assert_eq!(def.stages_for(Some("unknown")).len(), 1);
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(DefinitionFile::parse("stages = []").is_err());
        assert!(DefinitionFile::parse("[[stage]]\nrun = \"make\"").is_err());
    }

    #[test]
    fn stage_must_name_exactly_one_kind() {
        let err = DefinitionFile::parse("[[stage]]\nplugin = \"min\"\nwrite = \"css\"\n").unwrap_err();
        assert!(err.contains("more than one"), "{}", err);

        assert!(DefinitionFile::parse("[[stage]]\npipe = \"a\"\nplugin = \"b\"\n").is_err());
        assert!(DefinitionFile::parse("[[stage]]\nargs = [1]\n").is_err());
        assert!(DefinitionFile::parse("[[stage]]\nwrite = \"css\"\nargs = [1]\n").is_err());
        assert!(DefinitionFile::parse("[[stage]]\nplugin = \"min\"\noverwrite = false\n").is_err());
        assert!(DefinitionFile::parse("stage = [{ write = \"a\", pipe = \"b\" }]").is_err());
    }

    #[test]
    fn substitutes_positional_arguments() {
        let args = vec![json!("$0"), json!("$1"), json!("$x"), json!(4)];
        let out = substitute(&args, &[json!("app.css")]);

        assert_eq!(out, vec![json!("app.css"), Value::Null, json!("$x"), json!(4)]);
    }
}
