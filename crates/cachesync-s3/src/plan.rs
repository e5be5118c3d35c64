//! Pure diff planning for per-directory sync.
//!
//! A drained directory is synchronized by uploading its full local contents
//! and deleting remote keys that no longer exist locally. Deletions are
//! bounded to the directory's own prefix no matter what the remote listing
//! contained, so sibling directories are never touched.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// One directory's worth of planned work.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DirDiff {
    /// Local files to upload, paired with their remote keys.
    pub uploads: Vec<(PathBuf, String)>,
    /// Remote keys to delete; always under the directory's prefix.
    pub deletions: Vec<String>,
}

impl DirDiff {
    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty() && self.deletions.is_empty()
    }
}

/// Map a local file under `root` to its remote key under `target_prefix`.
/// Returns `None` for paths outside `root` or with non-UTF-8 components.
pub fn key_for(root: &Path, target_prefix: &str, file: &Path) -> Option<String> {
    let rel = file.strip_prefix(root).ok()?.to_str()?;
    if target_prefix.is_empty() {
        Some(rel.to_string())
    } else {
        Some(format!("{target_prefix}/{rel}"))
    }
}

/// Diff a directory's local files against the remote keys listed under its
/// prefix. Uploads cover the full local contents (puts are idempotent);
/// deletions are remote keys with no local counterpart.
pub fn plan_directory_sync(
    dir_prefix: &str,
    local: Vec<(PathBuf, String)>,
    remote_keys: &[String],
) -> DirDiff {
    let local_keys: BTreeSet<&str> = local.iter().map(|(_, key)| key.as_str()).collect();
    let guard = format!("{dir_prefix}/");
    let deletions = remote_keys
        .iter()
        .filter(|key| key.starts_with(&guard))
        .filter(|key| !local_keys.contains(key.as_str()))
        .cloned()
        .collect();
    DirDiff {
        uploads: local,
        deletions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(entries: &[(&str, &str)]) -> Vec<(PathBuf, String)> {
        entries
            .iter()
            .map(|(path, key)| (PathBuf::from(path), key.to_string()))
            .collect()
    }

    #[test]
    fn keys_are_relative_to_the_target_root() {
        let root = Path::new("/build/cache");
        assert_eq!(
            key_for(root, "site/cache", Path::new("/build/cache/sub/a.json")),
            Some("site/cache/sub/a.json".to_string())
        );
        assert_eq!(key_for(root, "site/cache", Path::new("/elsewhere/b")), None);
        assert_eq!(
            key_for(root, "", Path::new("/build/cache/a.json")),
            Some("a.json".to_string())
        );
    }

    #[test]
    fn stale_remote_keys_are_deleted() {
        let diff = plan_directory_sync(
            "site/cache/sub",
            local(&[("/build/cache/sub/a.json", "site/cache/sub/a.json")]),
            &[
                "site/cache/sub/a.json".to_string(),
                "site/cache/sub/stale.json".to_string(),
            ],
        );
        assert_eq!(diff.deletions, vec!["site/cache/sub/stale.json"]);
        assert_eq!(diff.uploads.len(), 1);
    }

    #[test]
    fn deletions_never_leave_the_directory_prefix() {
        // Even a listing polluted with out-of-scope keys plans no deletion
        // outside the drained directory.
        let diff = plan_directory_sync(
            "site/cache/sub",
            local(&[]),
            &[
                "site/cache/sub/gone.json".to_string(),
                "site/cache/other/kept.json".to_string(),
                "site/public/index.html".to_string(),
                "site/cache/subtle.json".to_string(),
            ],
        );
        assert_eq!(diff.deletions, vec!["site/cache/sub/gone.json"]);
    }

    #[test]
    fn empty_local_directory_drains_every_remote_key() {
        let diff = plan_directory_sync(
            "site/cache/sub",
            local(&[]),
            &[
                "site/cache/sub/a.json".to_string(),
                "site/cache/sub/deep/b.json".to_string(),
            ],
        );
        assert_eq!(diff.deletions.len(), 2);
        assert!(diff.uploads.is_empty());
    }

    #[test]
    fn unchanged_directory_plans_only_uploads() {
        let diff = plan_directory_sync(
            "site/cache/sub",
            local(&[("/build/cache/sub/a.json", "site/cache/sub/a.json")]),
            &["site/cache/sub/a.json".to_string()],
        );
        assert!(diff.deletions.is_empty());
        assert_eq!(diff.uploads.len(), 1);
    }
}
