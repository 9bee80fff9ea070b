//! Watch configuration types and validation.

use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WatchError};

/// Configuration for one watched directory limit.
///
/// Immutable once loaded; a reload that changes any field replaces the
/// whole watch rather than patching it in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchSpec {
    /// Unique name identifying the watch. Comes from the section key of
    /// the configuration file, not from the section body.
    #[serde(skip)]
    pub name: String,

    /// Directory whose files are counted.
    pub directory: PathBuf,

    /// Optional regular expression applied to file names (search
    /// semantics). Absent means every file matches.
    #[serde(default)]
    pub pattern: Option<String>,

    /// Floor retained after an eviction pass.
    pub keep: usize,

    /// Ceiling that triggers eviction when exceeded.
    pub max: usize,
}

impl WatchSpec {
    /// Create a new watch spec.
    pub fn new(
        name: impl Into<String>,
        directory: impl Into<PathBuf>,
        keep: usize,
        max: usize,
    ) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            pattern: None,
            keep,
            max,
        }
    }

    /// Set the file name pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Validate the spec and compile its name filter.
    ///
    /// Rejects `max < keep`, an invalid pattern, and a directory that is
    /// missing or not a directory. The watched path is canonicalized so
    /// event paths reported by the notifier compare equal to it.
    pub fn compile(self) -> Result<Watch> {
        if self.max < self.keep {
            return Err(WatchError::InvalidLimits {
                keep: self.keep,
                max: self.max,
            });
        }

        let filter = NameFilter::new(self.pattern.as_deref())?;

        let directory = std::fs::canonicalize(&self.directory).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                WatchError::DirectoryNotFound(self.directory.clone())
            } else {
                WatchError::Io(err)
            }
        })?;

        if !directory.is_dir() {
            return Err(WatchError::NotADirectory(self.directory.clone()));
        }

        Ok(Watch {
            spec: self,
            directory,
            filter,
        })
    }
}

/// A validated watch: the spec plus its canonical directory and compiled
/// name filter.
#[derive(Debug, Clone)]
pub struct Watch {
    /// The spec this watch was built from.
    pub spec: WatchSpec,

    /// Canonical form of `spec.directory`.
    directory: PathBuf,

    /// Compiled name predicate.
    filter: NameFilter,
}

impl Watch {
    /// Name of the watch.
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Canonical watched directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Whether a file name is counted by this watch.
    pub fn matches(&self, name: &str) -> bool {
        self.filter.matches(name)
    }
}

/// Runtime-configured file name predicate, built once per watch.
#[derive(Debug, Clone)]
pub enum NameFilter {
    /// Every file name matches.
    All,

    /// Only names matching the regular expression.
    Pattern(Regex),
}

impl NameFilter {
    /// Compile a filter from an optional pattern source.
    pub fn new(pattern: Option<&str>) -> Result<Self> {
        match pattern {
            None => Ok(Self::All),
            Some(src) => Regex::new(src)
                .map(Self::Pattern)
                .map_err(|source| WatchError::InvalidPattern {
                    pattern: src.to_string(),
                    source,
                }),
        }
    }

    /// Whether a file name matches.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Pattern(regex) => regex.is_match(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_compile_valid_spec() {
        let temp_dir = TempDir::new().unwrap();
        let watch = WatchSpec::new("logs", temp_dir.path(), 2, 4)
            .with_pattern(r"\.log$")
            .compile()
            .unwrap();

        assert_eq!(watch.name(), "logs");
        assert!(watch.matches("build.log"));
        assert!(!watch.matches("build.tmp"));
    }

    #[test]
    fn test_absent_pattern_matches_everything() {
        let temp_dir = TempDir::new().unwrap();
        let watch = WatchSpec::new("all", temp_dir.path(), 0, 10)
            .compile()
            .unwrap();

        assert!(watch.matches("anything"));
        assert!(watch.matches(""));
    }

    #[test]
    fn test_pattern_uses_search_semantics() {
        let filter = NameFilter::new(Some("[1-3]")).unwrap();

        assert!(filter.matches("report-2"));
        assert!(!filter.matches("report-9"));
    }

    #[test]
    fn test_max_below_keep_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let result = WatchSpec::new("bad", temp_dir.path(), 5, 3).compile();

        assert!(matches!(
            result,
            Err(WatchError::InvalidLimits { keep: 5, max: 3 })
        ));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let result = WatchSpec::new("bad", temp_dir.path(), 1, 2)
            .with_pattern("[unclosed")
            .compile();

        assert!(matches!(result, Err(WatchError::InvalidPattern { .. })));
    }

    #[test]
    fn test_missing_directory_is_rejected() {
        let result = WatchSpec::new("bad", "/nonexistent/path/12345", 1, 2).compile();

        assert!(matches!(result, Err(WatchError::DirectoryNotFound(_))));
    }

    #[test]
    fn test_file_is_not_a_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();

        let result = WatchSpec::new("bad", &file, 1, 2).compile();

        assert!(matches!(result, Err(WatchError::NotADirectory(_))));
    }
}
