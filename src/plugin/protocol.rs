//! Plugin protocol types
//!
//! External plugins communicate via JSON messages over stdin/stdout.
//! Each plugin must support the `--manifest` flag to declare its exports.

use std::collections::BTreeMap;
use std::path::PathBuf;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::stream::SourceFile;

/// Plugin manifest declaring what a module exports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Plugin name (e.g., "devour-sourcemaps")
    pub name: String,

    /// Plugin version
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Whether the module itself can be invoked as a stage
    #[serde(default)]
    pub callable: bool,

    /// Exported members keyed by dotted path (e.g. "init", "write", "options.level")
    #[serde(default)]
    pub exports: BTreeMap<String, ManifestExport>,
}

/// Kind of an exported member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ManifestExport {
    /// Invocable; produces a stage
    Stage,

    /// A plain value handed back as-is
    Value { value: serde_json::Value },
}

/// How `contents` is encoded on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireEncoding {
    Base64,
}

/// A file as it travels over the wire
///
/// UTF-8 contents are sent as text. Anything else is base64 encoded and
/// marked with `"encoding": "base64"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFile {
    pub base: String,
    pub path: String,
    pub contents: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<WireEncoding>,
}

impl From<&SourceFile> for WireFile {
    fn from(file: &SourceFile) -> Self {
        let (contents, encoding) = match std::str::from_utf8(&file.contents) {
            Ok(text) => (text.to_string(), None),
            Err(_) => (
                base64::engine::general_purpose::STANDARD.encode(&file.contents),
                Some(WireEncoding::Base64),
            ),
        };

        Self {
            base: file.base.display().to_string(),
            path: file.path.display().to_string(),
            contents,
            encoding,
        }
    }
}

impl TryFrom<WireFile> for SourceFile {
    type Error = String;

    fn try_from(file: WireFile) -> Result<Self, Self::Error> {
        let contents = match file.encoding {
            None => file.contents.into_bytes(),
            Some(WireEncoding::Base64) => base64::engine::general_purpose::STANDARD
                .decode(file.contents.as_bytes())
                .map_err(|e| format!("invalid base64 contents for {}: {}", file.path, e))?,
        };
        Ok(SourceFile::new(PathBuf::from(file.base), PathBuf::from(file.path), contents))
    }
}

/// A message sent to a plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRequest {
    /// The operation to perform
    pub operation: String,

    /// Operation-specific parameters
    pub params: serde_json::Value,
}

impl PluginRequest {
    pub fn new(operation: impl Into<String>, params: impl Into<serde_json::Value>) -> Self {
        Self {
            operation: operation.into(),
            params: params.into(),
        }
    }

    /// Builds a transform request for a member invoked with arguments
    pub fn transform(member: Option<&str>, args: &[serde_json::Value], files: &[SourceFile]) -> Self {
        let files: Vec<WireFile> = files.iter().map(WireFile::from).collect();
        Self::new(
            "transform",
            serde_json::json!({
                "member": member,
                "args": args,
                "files": files,
            }),
        )
    }
}

/// A response from a plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginResponse {
    /// Whether the operation succeeded
    pub success: bool,

    /// Result data (if success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Error message (if failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PluginResponse {
    pub fn success(data: impl Into<serde_json::Value>) -> Self {
        Self {
            success: true,
            data: Some(data.into()),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Extracts the transformed files from a successful response
    pub fn into_files(self) -> Result<Vec<SourceFile>, String> {
        if !self.success {
            return Err(self.error.unwrap_or_else(|| "plugin reported failure".to_string()));
        }

        #[derive(Deserialize)]
        struct Files {
            files: Vec<WireFile>,
        }

        let data = self.data.unwrap_or(serde_json::Value::Null);
        let parsed: Files =
            serde_json::from_value(data).map_err(|e| format!("malformed plugin response: {}", e))?;
        parsed.files.into_iter().map(SourceFile::try_from).collect()
    }
}
