//! Configuration handling for Devour
//!
//! Configuration is read from `devour.toml` in the project root and merged
//! over the built-in defaults. Keys that Devour does not recognise are kept
//! as free-form settings so task and pipe bodies can read them back through
//! [`Config::get`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::task::{Targets, WatchArg};

/// File name looked up in the project root
pub const CONFIG_FILE: &str = "devour.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Verbosity accepts either a flag or a level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Verbosity {
    Flag(bool),
    Level(u8),
}

impl Verbosity {
    /// Numeric level: 0 is quiet, 1 prints summaries, 2 and up adds diagnostics
    pub fn level(&self) -> u8 {
        match self {
            Verbosity::Flag(true) => 1,
            Verbosity::Flag(false) => 0,
            Verbosity::Level(level) => *level,
        }
    }
}

/// A task declared in the configuration file
///
/// Every field except `name` is optional, which admits all the call shapes
/// of [`crate::Devour::task`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDecl {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<Targets>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch: Option<WatchArg>,
}

/// Devour configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Debounce window for watch triggers, in milliseconds
    pub debounce: u64,

    /// Project root every relative path is resolved against
    #[serde(alias = "basePath")]
    pub base_path: PathBuf,

    /// Directory holding `<kind>/<name>.toml` definitions
    #[serde(alias = "gulpFiles")]
    pub gulp_files: PathBuf,

    /// Destination root for `write`
    pub output: PathBuf,

    /// Plugins applied to every source stream, in order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub defaults: Vec<String>,

    /// Console verbosity (defaults to on unless tasks are named on the command line)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<Verbosity>,

    /// Scheduled tasks, in declaration order
    #[serde(rename = "task", skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<TaskDecl>,

    /// Everything else, available to definitions through `config(key)`
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debounce: 100,
            base_path: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            gulp_files: PathBuf::from("gulp"),
            output: PathBuf::from("dist"),
            defaults: Vec::new(),
            verbose: None,
            tasks: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Loads configuration for a project
    ///
    /// `explicit` names a config file to read; otherwise `devour.toml` inside
    /// `base_path` (or the current directory) is used when it exists. A
    /// `base_path` given by the caller always wins over the file.
    pub fn load(base_path: Option<&Path>, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let root = match base_path {
            Some(path) => absolutize(path),
            None => Self::default().base_path,
        };

        let file = match explicit {
            Some(path) => Some(absolutize(path)),
            None => Some(root.join(CONFIG_FILE)).filter(|p| p.is_file()),
        };

        let mut config = match &file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if base_path.is_some() {
            config.base_path = root;
        } else if let Some(path) = &file {
            // A relative base_path in the file is relative to the file itself
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
            if config.base_path.is_relative() {
                config.base_path = dir.join(&config.base_path);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Parses a single configuration file over the defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parses TOML text over the defaults
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(decl) = self.tasks.iter().find(|t| t.name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "task declared without a name (build: {:?})",
                decl.build
            )));
        }
        if self.defaults.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid("empty plugin name in defaults".to_string()));
        }
        Ok(())
    }

    /// Debounce window as a duration
    pub fn debounce_duration(&self) -> Duration {
        Duration::from_millis(self.debounce)
    }

    /// Definition root, resolved against `base_path` unless absolute
    pub fn gulp_files_dir(&self) -> PathBuf {
        self.resolve(&self.gulp_files)
    }

    /// Output root, resolved against `base_path` unless absolute
    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.output)
    }

    /// Project-local plugin executables
    pub fn plugins_dir(&self) -> PathBuf {
        self.base_path.join("plugins")
    }

    /// Resolves a path against `base_path` unless it is already absolute
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    /// Looks up a single setting
    ///
    /// Accepts both the snake_case and camelCase spelling of built-in keys.
    /// Absent and null values are reported as `None`.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let value = serde_json::to_value(self).ok()?;
        let map = value.as_object()?;

        map.get(key)
            .or_else(|| map.get(&to_snake_case(key)))
            .filter(|v| !v.is_null())
            .cloned()
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let config = Config::default();

        assert_eq!(config.debounce, 100);
        assert_eq!(config.gulp_files, PathBuf::from("gulp"));
        assert_eq!(config.output, PathBuf::from("dist"));
        assert!(config.defaults.is_empty());
        assert!(config.verbose.is_none());
    }

    #[test]
    fn parse_merges_over_defaults() {
        let config = Config::parse(
            r#"
debounce = 250
defaults = ["plumber", "sourcemaps.init"]
"#,
        )
        .unwrap();

        assert_eq!(config.debounce, 250);
        assert_eq!(config.defaults, vec!["plumber", "sourcemaps.init"]);
        assert_eq!(config.output, PathBuf::from("dist"));
    }

    #[test]
    fn parse_accepts_camel_case_aliases() {
        let config = Config::parse(
            r#"
basePath = "/srv/site"
gulpFiles = "build"
"#,
        )
        .unwrap();

        assert_eq!(config.base_path, PathBuf::from("/srv/site"));
        assert_eq!(config.gulp_files_dir(), PathBuf::from("/srv/site/build"));
    }

    #[test]
    fn absolute_paths_are_not_rebased() {
        let config = Config::parse(
            r#"
base_path = "/srv/site"
output = "/var/www"
"#,
        )
        .unwrap();

        assert_eq!(config.output_dir(), PathBuf::from("/var/www"));
    }

    #[test]
    fn verbosity_accepts_flag_or_level() {
        let flag = Config::parse("verbose = false").unwrap();
        assert_eq!(flag.verbose.map(|v| v.level()), Some(0));

        let level = Config::parse("verbose = 2").unwrap();
        assert_eq!(level.verbose.map(|v| v.level()), Some(2));
    }

    #[test]
    fn task_declarations_keep_order() {
        let config = Config::parse(
            r#"
[[task]]
name = "css"
build = "src/*.css"

[[task]]
name = "js"
build = ["a.js", "b.js"]
watch = "src/**/*.js"

[[task]]
name = "images"
build = "img/*"
watch = false

[[task]]
name = "clean"
"#,
        )
        .unwrap();

        let names: Vec<_> = config.tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["css", "js", "images", "clean"]);
        assert_eq!(config.tasks[0].build, Some(Targets::One("src/*.css".to_string())));
        assert_eq!(config.tasks[2].watch, Some(WatchArg::Mirror(false)));
        assert_eq!(config.tasks[3].build, None);
    }

    #[test]
    fn get_reads_builtin_and_extra_keys() {
        let config = Config::parse(
            r#"
output = "public"
banner = "/* built */"
"#,
        )
        .unwrap();

        assert_eq!(config.get("output"), Some(serde_json::json!("public")));
        assert_eq!(config.get("gulpFiles"), Some(serde_json::json!("gulp")));
        assert_eq!(config.get("banner"), Some(serde_json::json!("/* built */")));
        assert_eq!(config.get("missing"), None);
    }

    #[test]
    fn load_reads_project_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "output = \"public\"\n").unwrap();

        let config = Config::load(Some(dir.path()), None).unwrap();

        assert_eq!(config.base_path, dir.path());
        assert_eq!(config.output_dir(), dir.path().join("public"));
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let dir = TempDir::new().unwrap();

        let config = Config::load(Some(dir.path()), None).unwrap();

        assert_eq!(config.debounce, 100);
        assert_eq!(config.gulp_files_dir(), dir.path().join("gulp"));
    }

    #[test]
    fn load_reports_malformed_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "debounce = \"soon\"\n").unwrap();

        let err = Config::load(Some(dir.path()), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_rejects_unnamed_task() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[[task]]\nname = \"\"\nbuild = \"a.js\"\n",
        )
        .unwrap();

        let err = Config::load(Some(dir.path()), None).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn snake_case_conversion() {
        assert_eq!(to_snake_case("basePath"), "base_path");
        assert_eq!(to_snake_case("output"), "output");
    }
}
