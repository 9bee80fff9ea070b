//! Initial directory scan used to seed a watch's index.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::Watch;
use crate::error::Result;

/// List the matching regular files directly inside the watched directory,
/// paired with their modification times.
///
/// The listing is one level deep: the watch is non-recursive, so
/// subdirectories and their contents are never counted. Symlinks are not
/// followed.
pub fn scan_directory(watch: &Watch) -> Result<Vec<(PathBuf, DateTime<Utc>)>> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(watch.directory()).min_depth(1).max_depth(1) {
        let entry = entry?;

        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !watch.matches(name) {
            continue;
        }

        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        let modified = metadata.modified()?;
        entries.push((entry.into_path(), DateTime::<Utc>::from(modified)));
    }

    debug!(
        watch = %watch.name(),
        directory = %watch.directory().display(),
        matched = entries.len(),
        "scanned directory"
    );
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatchSpec;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_scan_lists_matching_files() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.log"), b"x").unwrap();
        std::fs::write(temp_dir.path().join("b.log"), b"x").unwrap();
        std::fs::write(temp_dir.path().join("c.tmp"), b"x").unwrap();

        let watch = WatchSpec::new("logs", temp_dir.path(), 1, 2)
            .with_pattern(r"\.log$")
            .compile()
            .unwrap();

        let mut names: Vec<String> = scan_directory(&watch)
            .unwrap()
            .into_iter()
            .filter_map(|(path, _)| path.file_name()?.to_str().map(String::from))
            .collect();
        names.sort();

        assert_eq!(names, vec!["a.log".to_string(), "b.log".to_string()]);
    }

    #[test]
    fn test_scan_skips_subdirectories() {
        let temp_dir = TempDir::new().unwrap();
        let sub = temp_dir.path().join("sub.log");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("inner.log"), b"x").unwrap();
        std::fs::write(temp_dir.path().join("top.log"), b"x").unwrap();

        let watch = WatchSpec::new("logs", temp_dir.path(), 1, 2)
            .with_pattern(r"\.log$")
            .compile()
            .unwrap();

        let scanned = scan_directory(&watch).unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(
            scanned[0].0.file_name().and_then(|n| n.to_str()),
            Some("top.log")
        );
    }

    #[test]
    fn test_scan_of_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let watch = WatchSpec::new("all", temp_dir.path(), 0, 1).compile().unwrap();

        assert!(scan_directory(&watch).unwrap().is_empty());
    }
}
