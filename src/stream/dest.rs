//! Destination sink

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{SourceFile, Stage, StageError};

/// Options for [`Destination`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// Replace files that already exist
    pub overwrite: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { overwrite: true }
    }
}

/// Writes every file under a directory, keeping its path relative to the glob base
///
/// Files pass through with their base and path moved to the destination.
#[derive(Debug, Clone)]
pub struct Destination {
    dir: PathBuf,
    options: WriteOptions,
}

impl Destination {
    pub fn new(dir: impl Into<PathBuf>, options: WriteOptions) -> Self {
        Self {
            dir: dir.into(),
            options,
        }
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}

impl Stage for Destination {
    fn name(&self) -> &str {
        "write"
    }

    fn transform(&mut self, files: Vec<SourceFile>) -> Result<Vec<SourceFile>, StageError> {
        let mut written = Vec::with_capacity(files.len());

        for mut file in files {
            let target = self.dir.join(file.relative());

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|source| StageError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }

            if self.options.overwrite || !target.exists() {
                fs::write(&target, &file.contents).map_err(|source| StageError::Io {
                    path: target.clone(),
                    source,
                })?;
                tracing::debug!(path = %target.display(), "wrote file");
            } else {
                tracing::debug!(path = %target.display(), "kept existing file");
            }

            file.base = self.dir.clone();
            file.path = target;
            written.push(file);
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_relative_to_destination() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("dist/css");
        let mut dest = Destination::new(&out, WriteOptions::default());

        let files = vec![SourceFile::new("/src", "/src/theme/app.css", "body{}")];
        let written = dest.transform(files).unwrap();

        assert_eq!(fs::read_to_string(out.join("theme/app.css")).unwrap(), "body{}");
        assert_eq!(written[0].path, out.join("theme/app.css"));
        assert_eq!(written[0].relative(), std::path::Path::new("theme/app.css"));
    }

    #[test]
    fn keeps_existing_without_overwrite() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.css"), "old").unwrap();
        let mut dest = Destination::new(dir.path(), WriteOptions { overwrite: false });

        dest.transform(vec![SourceFile::new("/src", "/src/app.css", "new")])
            .unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("app.css")).unwrap(), "old");
    }
}
