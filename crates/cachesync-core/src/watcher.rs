use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::SyncError;
use crate::event::{ChangeEvent, ChangeOp, EntryKind};

/// Version-control, editor and package metadata never worth replicating.
pub const DEFAULT_IGNORES: &[&str] = &[
    "**/*.un~",
    "**/.DS_Store",
    "**/.gitignore",
    "**/.npmignore",
    "**/.babelrc",
    "**/yarn.lock",
    "**/bower_components",
    "**/bower_components/**",
    "**/node_modules",
    "**/node_modules/**",
    "**/dist/**",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherMessage {
    Event(ChangeEvent),
    /// Sent exactly once, after the first full enumeration finishes.
    ScanComplete,
}

/// Compile the built-in ignore list plus caller-supplied globs. An invalid
/// caller glob is a configuration error.
pub fn build_ignore_set(extra: &[String]) -> Result<GlobSet, SyncError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in DEFAULT_IGNORES {
        builder.add(
            Glob::new(pattern)
                .map_err(|e| SyncError::Config(format!("bad built-in glob {pattern}: {e}")))?,
        );
    }
    for pattern in extra {
        builder.add(
            Glob::new(pattern)
                .map_err(|e| SyncError::Config(format!("bad ignore glob {pattern}: {e}")))?,
        );
    }
    builder
        .build()
        .map_err(|e| SyncError::Config(format!("cannot compile ignore globs: {e}")))
}

/// Recursive watch over every target root.
///
/// Wraps a notify watcher; raw events are mapped to typed [`ChangeEvent`]s,
/// filtered by the ignore set and forwarded over `tx`. After the watch is
/// registered, an initial enumeration of each root runs on a blocking task,
/// emitting one Added event per existing entry and then `ScanComplete`.
pub struct ChangeDetector {
    // Held so the watch stays registered for the detector's lifetime.
    _watcher: RecommendedWatcher,
}

impl ChangeDetector {
    pub fn start(
        roots: &[PathBuf],
        ignore: GlobSet,
        tx: mpsc::UnboundedSender<WatcherMessage>,
    ) -> Result<Self, SyncError> {
        let event_tx = tx.clone();
        let event_ignore = ignore.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    for change in map_event(event) {
                        if event_ignore.is_match(&change.path) {
                            continue;
                        }
                        let _ = event_tx.send(WatcherMessage::Event(change));
                    }
                }
                Err(err) => warn!("watch backend error: {err}"),
            }
        })
        .map_err(|e| SyncError::Watch(format!("cannot create watcher: {e}")))?;

        for root in roots {
            watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| {
                    SyncError::Watch(format!("cannot watch {}: {e}", root.display()))
                })?;
            debug!("watching {} recursively", root.display());
        }

        let scan_roots = roots.to_vec();
        tokio::task::spawn_blocking(move || {
            for root in &scan_roots {
                scan_root(root, &ignore, &tx);
            }
            let _ = tx.send(WatcherMessage::ScanComplete);
        });

        Ok(Self { _watcher: watcher })
    }
}

/// Enumerate existing entries under `root`, emitting one Added each. Ignored
/// directories are pruned whole.
fn scan_root(root: &Path, ignore: &GlobSet, tx: &mpsc::UnboundedSender<WatcherMessage>) {
    let walk = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !ignore.is_match(entry.path()));
    for entry in walk {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("initial scan error under {}: {err}", root.display());
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }
        let kind = if entry.file_type().is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        let change = ChangeEvent::new(ChangeOp::Added, kind, entry.into_path());
        let _ = tx.send(WatcherMessage::Event(change));
    }
}

/// Map one raw notify event to zero or more typed change events.
fn map_event(event: Event) -> Vec<ChangeEvent> {
    match event.kind {
        EventKind::Create(create) => {
            let hint = match create {
                CreateKind::Folder => Some(EntryKind::Directory),
                CreateKind::File => Some(EntryKind::File),
                _ => None,
            };
            event
                .paths
                .into_iter()
                .map(|path| {
                    let kind = entry_kind(&path, hint);
                    ChangeEvent::new(ChangeOp::Added, kind, path)
                })
                .collect()
        }
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => removed_events(event.paths, None),
            RenameMode::To => event
                .paths
                .into_iter()
                .map(|path| {
                    let kind = entry_kind(&path, None);
                    ChangeEvent::new(ChangeOp::Added, kind, path)
                })
                .collect(),
            RenameMode::Both if event.paths.len() >= 2 => {
                let mut paths = event.paths.into_iter();
                let from = paths.next();
                let to = paths.next();
                let mut events = Vec::new();
                if let Some(from) = from {
                    events.push(ChangeEvent::new(ChangeOp::Removed, EntryKind::File, from));
                }
                if let Some(to) = to {
                    let kind = entry_kind(&to, None);
                    events.push(ChangeEvent::new(ChangeOp::Added, kind, to));
                }
                events
            }
            _ => event
                .paths
                .into_iter()
                .map(|path| {
                    // Ambiguous rename half: a vanished path is a removal.
                    if path.exists() {
                        let kind = entry_kind(&path, None);
                        ChangeEvent::new(ChangeOp::Modified, kind, path)
                    } else {
                        ChangeEvent::new(ChangeOp::Removed, EntryKind::File, path)
                    }
                })
                .collect(),
        },
        EventKind::Modify(_) => event
            .paths
            .into_iter()
            .map(|path| {
                let kind = entry_kind(&path, None);
                ChangeEvent::new(ChangeOp::Modified, kind, path)
            })
            .collect(),
        EventKind::Remove(remove) => {
            let hint = match remove {
                RemoveKind::Folder => Some(EntryKind::Directory),
                _ => None,
            };
            removed_events(event.paths, hint)
        }
        _ => Vec::new(),
    }
}

fn removed_events(paths: Vec<PathBuf>, hint: Option<EntryKind>) -> Vec<ChangeEvent> {
    paths
        .into_iter()
        .map(|path| {
            ChangeEvent::new(ChangeOp::Removed, hint.unwrap_or(EntryKind::File), path)
        })
        .collect()
}

/// Entry kind from the backend hint where present, a metadata probe
/// otherwise. A removed path no longer probes, so removals rely on hints.
fn entry_kind(path: &Path, hint: Option<EntryKind>) -> EntryKind {
    if let Some(kind) = hint {
        return kind;
    }
    if path.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::File
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_ignores_match_metadata_paths() {
        let ignore = build_ignore_set(&[]).unwrap();
        assert!(ignore.is_match("/cache/sub/.DS_Store"));
        assert!(ignore.is_match("/cache/node_modules"));
        assert!(ignore.is_match("/cache/node_modules/pkg/index.js"));
        assert!(ignore.is_match("/public/yarn.lock"));
        assert!(!ignore.is_match("/cache/data/records.json"));
    }

    #[test]
    fn caller_globs_extend_the_ignore_list() {
        let ignore = build_ignore_set(&["**/*.tmp".to_string()]).unwrap();
        assert!(ignore.is_match("/cache/staging/x.tmp"));
        assert!(!ignore.is_match("/cache/staging/x.json"));
    }

    #[test]
    fn invalid_caller_glob_is_a_config_error() {
        let err = build_ignore_set(&["[".to_string()]).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn maps_create_folder_to_added_directory() {
        let event = Event {
            kind: EventKind::Create(CreateKind::Folder),
            paths: vec![PathBuf::from("/cache/new-dir")],
            attrs: Default::default(),
        };
        let mapped = map_event(event);
        assert_eq!(mapped.len(), 1);
        assert_eq!(mapped[0].op, ChangeOp::Added);
        assert_eq!(mapped[0].kind, EntryKind::Directory);
        assert_eq!(mapped[0].path, PathBuf::from("/cache/new-dir"));
    }

    #[test]
    fn maps_data_modify_to_modified_file() {
        let event = Event {
            kind: EventKind::Modify(ModifyKind::Data(notify::event::DataChange::Any)),
            paths: vec![PathBuf::from("/cache/a.json")],
            attrs: Default::default(),
        };
        let mapped = map_event(event);
        assert_eq!(mapped[0].op, ChangeOp::Modified);
        assert_eq!(mapped[0].kind, EntryKind::File);
    }

    #[test]
    fn maps_rename_both_to_removal_plus_addition() {
        let event = Event {
            kind: EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            paths: vec![PathBuf::from("/cache/old.json"), PathBuf::from("/cache/new.json")],
            attrs: Default::default(),
        };
        let mapped = map_event(event);
        assert_eq!(mapped.len(), 2);
        assert_eq!(mapped[0].op, ChangeOp::Removed);
        assert_eq!(mapped[0].path, PathBuf::from("/cache/old.json"));
        assert_eq!(mapped[1].op, ChangeOp::Added);
        assert_eq!(mapped[1].path, PathBuf::from("/cache/new.json"));
    }

    #[test]
    fn maps_remove_folder_to_removed_directory() {
        let event = Event {
            kind: EventKind::Remove(RemoveKind::Folder),
            paths: vec![PathBuf::from("/cache/gone")],
            attrs: Default::default(),
        };
        let mapped = map_event(event);
        assert_eq!(mapped[0].op, ChangeOp::Removed);
        assert_eq!(mapped[0].kind, EntryKind::Directory);
    }

    #[test]
    fn access_events_are_dropped() {
        let event = Event {
            kind: EventKind::Access(notify::event::AccessKind::Any),
            paths: vec![PathBuf::from("/cache/a.json")],
            attrs: Default::default(),
        };
        assert!(map_event(event).is_empty());
    }

    #[tokio::test]
    async fn initial_scan_emits_entries_then_scan_complete() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("data")).unwrap();
        std::fs::write(root.path().join("data/a.json"), b"{}").unwrap();
        std::fs::write(root.path().join("b.txt"), b"hi").unwrap();
        // Ignored subtree must be pruned whole.
        std::fs::create_dir(root.path().join("node_modules")).unwrap();
        std::fs::write(root.path().join("node_modules/pkg.js"), b"x").unwrap();

        let ignore = build_ignore_set(&[]).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _detector =
            ChangeDetector::start(&[root.path().to_path_buf()], ignore, tx).unwrap();

        let mut scanned = Vec::new();
        loop {
            match rx.recv().await.expect("watcher channel open") {
                WatcherMessage::Event(event) => scanned.push(event),
                WatcherMessage::ScanComplete => break,
            }
        }

        let paths: Vec<_> = scanned.iter().map(|e| e.path.clone()).collect();
        assert!(paths.contains(&root.path().join("data")));
        assert!(paths.contains(&root.path().join("data/a.json")));
        assert!(paths.contains(&root.path().join("b.txt")));
        assert!(!paths.iter().any(|p| p.to_string_lossy().contains("node_modules")));
        assert!(scanned.iter().all(|e| e.op == ChangeOp::Added));
    }
}
