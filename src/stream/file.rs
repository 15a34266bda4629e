//! Files travelling through a stream

use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// A file in flight: where it was found, where it lives now, and its bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Glob base the file was matched under
    pub base: PathBuf,

    /// Full path of the file
    pub path: PathBuf,

    /// File contents
    pub contents: Vec<u8>,
}

impl SourceFile {
    pub fn new(base: impl Into<PathBuf>, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            base: base.into(),
            path: path.into(),
            contents: contents.into(),
        }
    }

    /// Path relative to the glob base
    ///
    /// Falls back to the file name when the path is not under the base.
    pub fn relative(&self) -> &Path {
        self.path.strip_prefix(&self.base).unwrap_or_else(|_| {
            self.path
                .file_name()
                .map(Path::new)
                .unwrap_or(self.path.as_path())
        })
    }

    /// File name without its last extension
    pub fn stem(&self) -> &str {
        self.path.file_stem().and_then(|s| s.to_str()).unwrap_or("")
    }

    /// Last extension, without the dot
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|s| s.to_str())
    }

    /// Replaces the file name, keeping the directory
    pub fn set_file_name(&mut self, name: &str) {
        self.path.set_file_name(name);
    }

    /// Contents decoded as UTF-8, lossily
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_to_base() {
        let file = SourceFile::new("/p/src", "/p/src/css/app.css", "body{}");

        assert_eq!(file.relative(), Path::new("css/app.css"));
        assert_eq!(file.stem(), "app");
        assert_eq!(file.extension(), Some("css"));
    }

    #[test]
    fn relative_outside_base_falls_back_to_name() {
        let file = SourceFile::new("/elsewhere", "/p/src/app.css", "");

        assert_eq!(file.relative(), Path::new("app.css"));
    }

    #[test]
    fn set_file_name_keeps_directory() {
        let mut file = SourceFile::new("/p", "/p/js/app.js", "");
        file.set_file_name("app.min.js");

        assert_eq!(file.path, PathBuf::from("/p/js/app.min.js"));
    }
}
