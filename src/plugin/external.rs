//! External plugin discovery and execution
//!
//! External modules are executables named `devour-<scope>`, discovered from:
//! 1. `<base_path>/plugins/`
//! 2. PATH

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::rc::Rc;

use serde_json::Value;

use super::module::{Export, PluginError, StageFactory};
use super::protocol::{ManifestExport, PluginManifest, PluginRequest, PluginResponse};
use super::resolver::ModuleSource;
use crate::stream::{SourceFile, Stage, StageError};

/// Prefix every external plugin executable carries
pub const PLUGIN_PREFIX: &str = "devour-";

/// Finds plugin executables on disk
#[derive(Debug, Clone, Default)]
pub struct ExecutableModules {
    /// Directories searched before PATH
    plugin_dirs: Vec<PathBuf>,

    /// Whether PATH is searched
    search_path: bool,
}

impl ExecutableModules {
    pub fn new() -> Self {
        Self {
            plugin_dirs: Vec::new(),
            search_path: true,
        }
    }

    /// Adds a plugin directory to search
    pub fn add_plugin_dir(&mut self, dir: impl Into<PathBuf>) {
        self.plugin_dirs.push(dir.into());
    }

    /// Restricts the search to the plugin directories
    pub fn without_path(mut self) -> Self {
        self.search_path = false;
        self
    }

    /// Finds the executable for a scope (first found wins)
    pub fn find(&self, scope: &str) -> Option<PathBuf> {
        let file_name = format!("{}{}", PLUGIN_PREFIX, scope);

        let path_dirs = if self.search_path {
            std::env::var_os("PATH")
                .map(|p| std::env::split_paths(&p).collect())
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        self.plugin_dirs
            .iter()
            .chain(path_dirs.iter())
            .map(|dir| dir.join(&file_name))
            .find(|candidate| is_executable(candidate))
    }

    /// Loads the manifest from a plugin
    fn load_manifest(path: &Path) -> Result<PluginManifest, String> {
        let output = Command::new(path)
            .arg("--manifest")
            .output()
            .map_err(|e| format!("failed to execute {}: {}", path.display(), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("manifest request failed: {}", stderr.trim()));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| format!("failed to parse manifest: {}", e))
    }
}

impl ModuleSource for ExecutableModules {
    fn label(&self) -> &str {
        "executable"
    }

    fn load(&self, scope: &str) -> Result<Option<Export>, PluginError> {
        let Some(path) = self.find(scope) else {
            return Ok(None);
        };

        let manifest = Self::load_manifest(&path).map_err(|message| PluginError::Load {
            scope: scope.to_string(),
            message,
        })?;

        tracing::debug!(
            scope,
            path = %path.display(),
            version = %manifest.version,
            "loaded plugin manifest"
        );

        Ok(Some(module_from_manifest(&path, &manifest)))
    }
}

/// Builds the export tree a manifest describes
pub fn module_from_manifest(path: &Path, manifest: &PluginManifest) -> Export {
    let factory = |member: Option<&str>| -> Rc<dyn StageFactory> {
        Rc::new(ExternalStageFactory {
            path: path.to_path_buf(),
            member: member.map(str::to_string),
        })
    };

    let mut root = Export::Namespace {
        call: manifest.callable.then(|| factory(None)),
        members: BTreeMap::new(),
    };

    for (dotted, export) in &manifest.exports {
        let leaf = match export {
            ManifestExport::Stage => Export::Stage(factory(Some(dotted))),
            ManifestExport::Value { value } => Export::Value(value.clone()),
        };
        let segments: Vec<&str> = dotted.split('.').filter(|s| !s.is_empty()).collect();
        insert_member(&mut root, &segments, leaf);
    }

    root
}

fn insert_member(node: &mut Export, path: &[&str], leaf: Export) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };

    if let Export::Namespace { members, .. } = node {
        if rest.is_empty() {
            members.insert(first.to_string(), leaf);
        } else {
            let child = members
                .entry(first.to_string())
                .or_insert_with(Export::namespace);
            if !matches!(child, Export::Namespace { .. }) {
                // A stage that also has members stays callable
                *child = match std::mem::replace(child, Export::namespace()) {
                    Export::Stage(call) => Export::Namespace {
                        call: Some(call),
                        members: BTreeMap::new(),
                    },
                    _ => Export::namespace(),
                };
            }
            insert_member(child, rest, leaf);
        }
    }
}

/// Checks if a file is executable
fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = path.metadata() {
            return meta.is_file() && meta.permissions().mode() & 0o111 != 0;
        }
    }

    #[cfg(windows)]
    {
        if let Some(ext) = path.extension() {
            return path.is_file() && (ext == "exe" || ext == "bat" || ext == "cmd");
        }
    }

    false
}

struct ExternalStageFactory {
    path: PathBuf,
    member: Option<String>,
}

impl StageFactory for ExternalStageFactory {
    fn create(&self, args: &[Value]) -> Result<Box<dyn Stage>, PluginError> {
        Ok(Box::new(ExternalStage {
            label: match &self.member {
                Some(member) => format!("{}:{}", self.path.display(), member),
                None => self.path.display().to_string(),
            },
            path: self.path.clone(),
            member: self.member.clone(),
            args: args.to_vec(),
        }))
    }
}

/// A stage executed by an external plugin process
struct ExternalStage {
    label: String,
    path: PathBuf,
    member: Option<String>,
    args: Vec<Value>,
}

impl ExternalStage {
    fn execute(&self, request: &PluginRequest) -> Result<PluginResponse, String> {
        let mut child = Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| format!("failed to spawn plugin {}: {}", self.path.display(), e))?;

        // Send request, then close stdin so the plugin sees EOF
        {
            let mut stdin = child.stdin.take().ok_or("failed to open plugin stdin")?;
            let request_json =
                serde_json::to_string(request).map_err(|e| format!("failed to serialize request: {}", e))?;
            writeln!(stdin, "{}", request_json).map_err(|e| format!("failed to write to plugin: {}", e))?;
        }

        // Read response
        let stdout = child.stdout.take().ok_or("failed to open plugin stdout")?;
        let response_line = BufReader::new(stdout)
            .lines()
            .next()
            .ok_or("no response from plugin")?
            .map_err(|e| format!("failed to read plugin response: {}", e))?;

        let _ = child.wait();

        serde_json::from_str(&response_line).map_err(|e| format!("failed to parse plugin response: {}", e))
    }
}

impl Stage for ExternalStage {
    fn name(&self) -> &str {
        &self.label
    }

    fn transform(&mut self, files: Vec<SourceFile>) -> Result<Vec<SourceFile>, StageError> {
        let request = PluginRequest::transform(self.member.as_deref(), &self.args, &files);
        self.execute(&request)
            .and_then(PluginResponse::into_files)
            .map_err(StageError::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manifest(callable: bool, exports: &[(&str, ManifestExport)]) -> PluginManifest {
        PluginManifest {
            name: "devour-maps".to_string(),
            version: "1.0.0".to_string(),
            description: String::new(),
            callable,
            exports: exports
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn manifest_builds_nested_members() {
        let m = manifest(
            false,
            &[
                ("init", ManifestExport::Stage),
                ("write", ManifestExport::Stage),
                (
                    "options.level",
                    ManifestExport::Value {
                        value: serde_json::json!(2),
                    },
                ),
            ],
        );

        let module = module_from_manifest(Path::new("/bin/devour-maps"), &m);

        assert!(!module.is_callable());
        assert!(module.lookup(&["init"]).unwrap().is_callable());
        assert!(matches!(
            module.lookup(&["options", "level"]).unwrap(),
            Export::Value(v) if v == &serde_json::json!(2)
        ));
    }

    #[test]
    fn callable_manifest_is_callable() {
        let module = module_from_manifest(Path::new("/bin/devour-maps"), &manifest(true, &[]));

        assert!(module.is_callable());
    }

    #[test]
    fn missing_executable_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut modules = ExecutableModules::new().without_path();
        modules.add_plugin_dir(dir.path());

        assert!(modules.find("nothing").is_none());
        assert!(modules.load("nothing").unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn finds_executables_in_plugin_dir() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let plugin = dir.path().join("devour-maps");
        std::fs::write(&plugin, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&plugin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let not_exec = dir.path().join("devour-plain");
        std::fs::write(&not_exec, "").unwrap();

        let mut modules = ExecutableModules::new().without_path();
        modules.add_plugin_dir(dir.path());

        assert_eq!(modules.find("maps"), Some(plugin));
        assert!(modules.find("plain").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn runs_shell_plugin_round_trip() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let plugin = dir.path().join("devour-echo");
        std::fs::write(
            &plugin,
            r#"#!/bin/sh
if [ "$1" = "--manifest" ]; then
  echo '{"name":"devour-echo","version":"0.1.0","callable":true}'
  exit 0
fi
read line
echo '{"success":true,"data":{"files":[{"base":"/p","path":"/p/out.txt","contents":"echoed"}]}}'
"#,
        )
        .unwrap();
        std::fs::set_permissions(&plugin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut modules = ExecutableModules::new().without_path();
        modules.add_plugin_dir(dir.path());

        let module = modules.load("echo").unwrap().unwrap();
        let mut stage = module.callee().unwrap().create(&[]).unwrap();
        let files = stage
            .transform(vec![SourceFile::new("/p", "/p/in.txt", "x")])
            .unwrap();

        assert_eq!(files[0].path, PathBuf::from("/p/out.txt"));
        assert_eq!(files[0].contents, b"echoed");
    }
}
