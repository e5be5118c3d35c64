use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// What happened to a watched entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Added,
    Modified,
    Removed,
}

impl ChangeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOp::Added => "added",
            ChangeOp::Modified => "changed",
            ChangeOp::Removed => "deleted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "directory",
        }
    }
}

/// One observed filesystem change. Produced by the watcher, consumed
/// immediately by the orchestrator, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub op: ChangeOp,
    pub kind: EntryKind,
    pub path: PathBuf,
    pub observed_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(op: ChangeOp, kind: EntryKind, path: PathBuf) -> Self {
        Self {
            op,
            kind,
            path,
            observed_at: Utc::now(),
        }
    }
}
