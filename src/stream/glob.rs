//! Glob expansion for source streams and watch filters
//!
//! Patterns are matched segment by segment:
//! - `*` matches zero or more characters within a segment
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]`, `[!abc]` match character classes
//! - `{a,b}` expands to alternatives before matching
//! - `**` as a whole segment matches any number of directories
//!
//! A leading `!` turns a source pattern into an exclusion.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{SourceFile, StageError};

/// Returns true if the pattern contains glob metacharacters
pub fn contains_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

/// Resolves a pattern against `cwd` unless it is already absolute
pub fn absolute_pattern(pattern: &str, cwd: &Path) -> String {
    if Path::new(pattern).is_absolute() {
        return pattern.to_string();
    }
    let relative = pattern.trim_start_matches("./");
    format!("{}/{}", cwd.display().to_string().trim_end_matches('/'), relative)
}

/// The literal directory prefix of a pattern
///
/// For a pattern without metacharacters this is the parent directory.
pub fn glob_base(pattern: &str) -> PathBuf {
    let segments: Vec<&str> = pattern.split('/').collect();
    let literal = segments.iter().take_while(|s| !contains_glob(s)).count();

    let keep = if literal == segments.len() {
        literal.saturating_sub(1)
    } else {
        literal
    };

    let base = segments[..keep].join("/");
    if base.is_empty() {
        if pattern.starts_with('/') {
            PathBuf::from("/")
        } else {
            PathBuf::from(".")
        }
    } else {
        PathBuf::from(base)
    }
}

/// Matches a full path against a pattern
pub fn glob_match(pattern: &str, path: &Path) -> bool {
    let path = path.to_string_lossy();
    let components: Vec<&str> = path.split('/').collect();

    expand_braces(pattern).iter().any(|expanded| {
        let segments: Vec<&str> = expanded.split('/').collect();
        match_components(&segments, &components)
    })
}

/// Expands `{a,b}` alternatives, innermost groups included
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let chars: Vec<char> = pattern.chars().collect();

    let mut depth = 0;
    let mut start = None;
    let mut end = None;
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    end = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }

    let (start, end) = match (start, end) {
        (Some(s), Some(e)) => (s, e),
        _ => return vec![pattern.to_string()],
    };

    let prefix: String = chars[..start].iter().collect();
    let suffix: String = chars[end + 1..].iter().collect();
    let body: String = chars[start + 1..end].iter().collect();

    let mut alternatives = Vec::new();
    let mut current = String::new();
    let mut nested = 0;
    for c in body.chars() {
        match c {
            '{' => {
                nested += 1;
                current.push(c);
            }
            '}' => {
                nested -= 1;
                current.push(c);
            }
            ',' if nested == 0 => alternatives.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    alternatives.push(current);

    alternatives
        .into_iter()
        .flat_map(|alt| expand_braces(&format!("{}{}{}", prefix, alt, suffix)))
        .collect()
}

fn match_components(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((&"**", rest)) => {
            match_components(rest, path)
                || (!path.is_empty() && match_components(pattern, &path[1..]))
        }
        Some((segment, rest)) => match path.split_first() {
            Some((head, tail)) => match_segment(segment, head) && match_components(rest, tail),
            None => false,
        },
    }
}

/// Matches one path segment, backtracking on `*`
fn match_segment(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                '*' => {
                    star = Some((p, t));
                    p += 1;
                    continue;
                }
                '?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                '[' => match match_class(&pattern, p, text[t]) {
                    Some((true, next)) => {
                        p = next;
                        t += 1;
                        continue;
                    }
                    Some((false, _)) => {}
                    None if text[t] == '[' => {
                        p += 1;
                        t += 1;
                        continue;
                    }
                    None => {}
                },
                c if c == text[t] => {
                    p += 1;
                    t += 1;
                    continue;
                }
                _ => {}
            }
        }

        match star {
            Some((star_p, star_t)) => {
                p = star_p + 1;
                t = star_t + 1;
                star = Some((star_p, star_t + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Evaluates a `[...]` class at `start`; `None` if the class is unterminated
fn match_class(pattern: &[char], start: usize, c: char) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negated = matches!(pattern.get(i), Some('!') | Some('^'));
    if negated {
        i += 1;
    }

    let mut matched = false;
    let mut first = true;
    loop {
        let current = *pattern.get(i)?;
        if current == ']' && !first {
            return Some((matched != negated, i + 1));
        }
        first = false;

        if pattern.get(i + 1) == Some(&'-') && pattern.get(i + 2).is_some_and(|&e| e != ']') {
            let end = pattern[i + 2];
            if current <= c && c <= end {
                matched = true;
            }
            i += 3;
        } else {
            if current == c {
                matched = true;
            }
            i += 1;
        }
    }
}

/// Expands source patterns into files, reading their contents
///
/// Files keep the order of the patterns that matched them; a file matched by
/// several patterns is emitted once.
pub fn expand(patterns: &[String], cwd: &Path) -> Result<Vec<SourceFile>, StageError> {
    let excludes: Vec<String> = patterns
        .iter()
        .filter_map(|p| p.strip_prefix('!'))
        .map(|p| absolute_pattern(p, cwd))
        .collect();

    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for pattern in patterns.iter().filter(|p| !p.starts_with('!')) {
        let pattern = absolute_pattern(pattern, cwd);
        let base = glob_base(&pattern);

        for path in matching_paths(&pattern, &base)? {
            if excludes.iter().any(|ex| glob_match(ex, &path)) || !seen.insert(path.clone()) {
                continue;
            }

            let contents = fs::read(&path).map_err(|source| StageError::Io {
                path: path.clone(),
                source,
            })?;
            files.push(SourceFile::new(base.clone(), path, contents));
        }
    }

    Ok(files)
}

fn matching_paths(pattern: &str, base: &Path) -> Result<Vec<PathBuf>, StageError> {
    if !contains_glob(pattern) {
        let path = PathBuf::from(pattern);
        return Ok(if path.is_file() { vec![path] } else { Vec::new() });
    }

    if !base.is_dir() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(base).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| StageError::Walk {
            path: base.to_path_buf(),
            message: e.to_string(),
        })?;

        if entry.file_type().is_file() && glob_match(pattern, entry.path()) {
            found.push(entry.into_path());
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn segment_wildcards() {
        assert!(match_segment("*.js", "app.js"));
        assert!(match_segment("app.?s", "app.js"));
        assert!(match_segment("*", ""));
        assert!(!match_segment("*.js", "app.css"));
        assert!(match_segment("a*b*c", "axxbyyc"));
    }

    #[test]
    fn segment_classes() {
        assert!(match_segment("[abc].js", "b.js"));
        assert!(match_segment("[a-c].js", "c.js"));
        assert!(!match_segment("[!a-c].js", "c.js"));
        assert!(match_segment("[!a-c].js", "d.js"));
        assert!(match_segment("[.js", "[.js"));
    }

    #[test]
    fn globstar_spans_directories() {
        assert!(glob_match("/p/src/**/*.js", Path::new("/p/src/app.js")));
        assert!(glob_match("/p/src/**/*.js", Path::new("/p/src/lib/deep/app.js")));
        assert!(!glob_match("/p/src/*.js", Path::new("/p/src/lib/app.js")));
    }

    #[test]
    fn brace_alternatives() {
        assert_eq!(expand_braces("*.{js,css}"), vec!["*.js", "*.css"]);
        assert!(glob_match("/p/*.{js,css}", Path::new("/p/site.css")));
    }

    #[test]
    fn base_is_literal_prefix() {
        assert_eq!(glob_base("/p/src/**/*.js"), PathBuf::from("/p/src"));
        assert_eq!(glob_base("/p/src/app.js"), PathBuf::from("/p/src"));
        assert_eq!(glob_base("*.js"), PathBuf::from("."));
        assert_eq!(glob_base("/*.js"), PathBuf::from("/"));
    }

    #[test]
    fn relative_patterns_resolve_against_cwd() {
        assert_eq!(absolute_pattern("./src/*.js", Path::new("/p")), "/p/src/*.js");
        assert_eq!(absolute_pattern("/abs/*.js", Path::new("/p")), "/abs/*.js");
    }

    #[test]
    fn expand_reads_matching_files_in_order() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/lib")).unwrap();
        fs::write(dir.path().join("src/b.js"), "b").unwrap();
        fs::write(dir.path().join("src/a.js"), "a").unwrap();
        fs::write(dir.path().join("src/lib/c.js"), "c").unwrap();
        fs::write(dir.path().join("src/skip.css"), "x").unwrap();

        let files = expand(&["src/**/*.js".to_string()], dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.relative().to_path_buf()).collect();

        assert_eq!(
            names,
            vec![
                PathBuf::from("a.js"),
                PathBuf::from("b.js"),
                PathBuf::from("lib/c.js")
            ]
        );
        assert_eq!(files[0].contents, b"a");
    }

    #[test]
    fn expand_honours_exclusions_and_dedupes() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/app.js"), "").unwrap();
        fs::write(dir.path().join("src/vendor.js"), "").unwrap();

        let patterns = vec![
            "src/app.js".to_string(),
            "src/*.js".to_string(),
            "!src/vendor.js".to_string(),
        ];
        let files = expand(&patterns, dir.path()).unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("src/app.js"));
    }

    #[test]
    fn expand_missing_paths_yields_nothing() {
        let dir = TempDir::new().unwrap();

        let files = expand(
            &["missing/*.js".to_string(), "nope.js".to_string()],
            dir.path(),
        )
        .unwrap();

        assert!(files.is_empty());
    }
}
