//! Translation of raw notify events into the watch event vocabulary.

use std::path::{Path, PathBuf};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};

use crate::config::Watch;

/// A filesystem change relevant to one watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A matching file appeared, or its modification time changed.
    Created(PathBuf),

    /// A matching file disappeared.
    Removed(PathBuf),

    /// A matching file was renamed to another matching name. The file
    /// keeps its original sort key: a rename does not change its age.
    Renamed { from: PathBuf, to: PathBuf },

    /// The notifier lost events and the index must be rebuilt from a
    /// fresh scan.
    Rescan,
}

/// Translate one raw notify event into zero or more watch events.
///
/// Only direct children of the watched directory whose names match the
/// watch's filter are forwarded; the watch is non-recursive and
/// subdirectory create/remove events are dropped. Modification events map
/// to [`WatchEvent::Created`] so the tracked sort key follows the file's
/// mtime.
pub fn translate(watch: &Watch, event: &Event) -> Vec<WatchEvent> {
    if event.need_rescan() {
        return vec![WatchEvent::Rescan];
    }

    match event.kind {
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => {
            Vec::new()
        }
        EventKind::Modify(ModifyKind::Name(mode)) => translate_rename(watch, mode, &event.paths),
        EventKind::Create(_) | EventKind::Modify(_) => event
            .paths
            .iter()
            .filter_map(|path| relevant(watch, path))
            .map(WatchEvent::Created)
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .filter_map(|path| relevant(watch, path))
            .map(WatchEvent::Removed)
            .collect(),
        _ => Vec::new(),
    }
}

fn translate_rename(watch: &Watch, mode: RenameMode, paths: &[PathBuf]) -> Vec<WatchEvent> {
    match mode {
        RenameMode::Both => {
            let [from, to] = paths else {
                return Vec::new();
            };
            match (relevant(watch, from), relevant(watch, to)) {
                (Some(from), Some(to)) => vec![WatchEvent::Renamed { from, to }],
                (Some(from), None) => vec![WatchEvent::Removed(from)],
                (None, Some(to)) => vec![WatchEvent::Created(to)],
                (None, None) => Vec::new(),
            }
        }
        RenameMode::From => paths
            .iter()
            .filter_map(|path| relevant(watch, path))
            .map(WatchEvent::Removed)
            .collect(),
        // Uncorrelated rename endpoints surface as creations; the stat at
        // apply time resolves whether the file is actually present.
        _ => paths
            .iter()
            .filter_map(|path| relevant(watch, path))
            .map(WatchEvent::Created)
            .collect(),
    }
}

/// A path is relevant when it is a direct child of the watched directory
/// and its file name matches the watch's filter.
fn relevant(watch: &Watch, path: &Path) -> Option<PathBuf> {
    if path.parent() != Some(watch.directory()) {
        return None;
    }
    let name = path.file_name()?.to_str()?;
    watch.matches(name).then(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatchSpec;
    use notify::event::Flag;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn log_watch(dir: &Path) -> Watch {
        WatchSpec::new("logs", dir, 2, 4)
            .with_pattern(r"\.log$")
            .compile()
            .unwrap()
    }

    #[test]
    fn test_create_of_matching_file() {
        let temp_dir = TempDir::new().unwrap();
        let watch = log_watch(temp_dir.path());
        let path = watch.directory().join("a.log");

        let event = Event::new(EventKind::Create(CreateKind::File)).add_path(path.clone());
        assert_eq!(translate(&watch, &event), vec![WatchEvent::Created(path)]);
    }

    #[test]
    fn test_non_matching_file_is_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let watch = log_watch(temp_dir.path());

        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(watch.directory().join("a.tmp"));
        assert_eq!(translate(&watch, &event), Vec::new());
    }

    #[test]
    fn test_paths_outside_the_directory_are_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let watch = log_watch(temp_dir.path());

        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(watch.directory().join("sub/a.log"));
        assert_eq!(translate(&watch, &event), Vec::new());
    }

    #[test]
    fn test_subdirectory_events_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let watch = log_watch(temp_dir.path());
        let path = watch.directory().join("nested.log");

        let created = Event::new(EventKind::Create(CreateKind::Folder)).add_path(path.clone());
        assert_eq!(translate(&watch, &created), Vec::new());

        let removed = Event::new(EventKind::Remove(RemoveKind::Folder)).add_path(path);
        assert_eq!(translate(&watch, &removed), Vec::new());
    }

    #[test]
    fn test_modify_maps_to_created() {
        let temp_dir = TempDir::new().unwrap();
        let watch = log_watch(temp_dir.path());
        let path = watch.directory().join("a.log");

        let event = Event::new(EventKind::Modify(ModifyKind::Data(
            notify::event::DataChange::Any,
        )))
        .add_path(path.clone());
        assert_eq!(translate(&watch, &event), vec![WatchEvent::Created(path)]);
    }

    #[test]
    fn test_correlated_rename_of_matching_endpoints() {
        let temp_dir = TempDir::new().unwrap();
        let watch = log_watch(temp_dir.path());
        let from = watch.directory().join("old.log");
        let to = watch.directory().join("new.log");

        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(from.clone())
            .add_path(to.clone());
        assert_eq!(
            translate(&watch, &event),
            vec![WatchEvent::Renamed { from, to }]
        );
    }

    #[test]
    fn test_rename_out_of_the_filter_is_a_removal() {
        let temp_dir = TempDir::new().unwrap();
        let watch = log_watch(temp_dir.path());
        let from = watch.directory().join("old.log");

        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(from.clone())
            .add_path(watch.directory().join("old.bak"));
        assert_eq!(translate(&watch, &event), vec![WatchEvent::Removed(from)]);
    }

    #[test]
    fn test_rename_into_the_filter_is_a_creation() {
        let temp_dir = TempDir::new().unwrap();
        let watch = log_watch(temp_dir.path());
        let to = watch.directory().join("new.log");

        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(watch.directory().join("scratch"))
            .add_path(to.clone());
        assert_eq!(translate(&watch, &event), vec![WatchEvent::Created(to)]);
    }

    #[test]
    fn test_uncorrelated_rename_halves() {
        let temp_dir = TempDir::new().unwrap();
        let watch = log_watch(temp_dir.path());
        let path = watch.directory().join("a.log");

        let from = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
            .add_path(path.clone());
        assert_eq!(
            translate(&watch, &from),
            vec![WatchEvent::Removed(path.clone())]
        );

        let to =
            Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To))).add_path(path.clone());
        assert_eq!(translate(&watch, &to), vec![WatchEvent::Created(path)]);
    }

    #[test]
    fn test_rescan_flag_requests_a_rescan() {
        let temp_dir = TempDir::new().unwrap();
        let watch = log_watch(temp_dir.path());

        let event = Event::new(EventKind::Any).set_flag(Flag::Rescan);
        assert_eq!(translate(&watch, &event), vec![WatchEvent::Rescan]);
    }
}
