//! Definition discovery
//!
//! Definitions live two levels below the definition root:
//! `<root>/<kind>/<name>.toml`. The directory gives the kind, the file stem
//! gives the name. Files are loaded in path order.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use super::file::DefinitionFile;

/// Extension of definition files
pub const DEFINITION_EXTENSION: &str = "toml";

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("Failed to read definition {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed definition {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("Failed to scan definitions in {path}: {message}")]
    Scan { path: PathBuf, message: String },
}

/// A definition found on disk
#[derive(Debug, Clone)]
pub struct LoadedDefinition {
    pub kind: String,
    pub name: String,
    pub path: PathBuf,
    pub definition: DefinitionFile,
}

/// Loads every definition under `root`
///
/// A missing root yields no definitions. Any unreadable or malformed file
/// aborts loading.
pub fn load_definitions(root: &Path) -> Result<Vec<LoadedDefinition>, DefinitionError> {
    if !root.is_dir() {
        tracing::debug!(path = %root.display(), "no definition directory");
        return Ok(Vec::new());
    }

    let mut loaded = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| DefinitionError::Scan {
            path: root.to_path_buf(),
            message: e.to_string(),
        })?;
        let path = entry.path();

        if !entry.file_type().is_file()
            || path.extension().and_then(|e| e.to_str()) != Some(DEFINITION_EXTENSION)
        {
            continue;
        }

        let (Some(kind), Some(name)) = (
            path.parent().and_then(|p| p.file_name()).and_then(|k| k.to_str()),
            path.file_stem().and_then(|n| n.to_str()),
        ) else {
            continue;
        };

        let content = fs::read_to_string(path).map_err(|source| DefinitionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let definition =
            DefinitionFile::parse(&content).map_err(|message| DefinitionError::Malformed {
                path: path.to_path_buf(),
                message,
            })?;

        loaded.push(LoadedDefinition {
            kind: kind.to_string(),
            name: name.to_string(),
            path: path.to_path_buf(),
            definition,
        });
    }

    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn discovers_kind_and_name() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "task/css.toml", "[[stage]]\nwrite = \"css\"\n");
        write(dir.path(), "task/js.toml", "");
        write(dir.path(), "pipe/minify.toml", "[[stage]]\nplugin = \"min\"\n");
        write(dir.path(), "lint/js.toml", "");

        let loaded = load_definitions(dir.path()).unwrap();
        let pairs: Vec<_> = loaded
            .iter()
            .map(|d| (d.kind.as_str(), d.name.as_str()))
            .collect();

        assert_eq!(
            pairs,
            vec![("lint", "js"), ("pipe", "minify"), ("task", "css"), ("task", "js")]
        );
    }

    #[test]
    fn ignores_other_depths_and_extensions() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "top.toml", "");
        write(dir.path(), "task/notes.md", "");
        write(dir.path(), "task/nested/deep.toml", "");
        write(dir.path(), "task/real.toml", "");

        let loaded = load_definitions(dir.path()).unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "real");
    }

    #[test]
    fn malformed_file_aborts() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "task/good.toml", "");
        write(dir.path(), "task/bad.toml", "[[stage]]\nunknown = 1\n");

        let err = load_definitions(dir.path()).unwrap_err();

        assert!(matches!(err, DefinitionError::Malformed { ref path, .. } if path.ends_with("task/bad.toml")));
    }

    #[test]
    fn stage_naming_two_kinds_aborts() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "pipe/both.toml", "[[stage]]\nplugin = \"min\"\nwrite = \"css\"\n");

        let err = load_definitions(dir.path()).unwrap_err();

        match err {
            DefinitionError::Malformed { path, message } => {
                assert!(path.ends_with("pipe/both.toml"));
                assert!(message.contains("more than one"), "{}", message);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = TempDir::new().unwrap();

        assert!(load_definitions(&dir.path().join("gulp")).unwrap().is_empty());
    }
}
