use std::path::{Path, PathBuf};

/// Which build directory a target replicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TargetRole {
    Cache,
    Public,
}

impl TargetRole {
    /// Short name used in logs and remote prefixes.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetRole::Cache => "cache",
            TargetRole::Public => "public",
        }
    }

    /// Fixed logical payload name for the archive backend.
    pub fn archive_name(&self) -> &'static str {
        match self {
            TargetRole::Cache => "cache.tar.gz",
            TargetRole::Public => "public.tar.gz",
        }
    }
}

impl std::fmt::Display for TargetRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured local-directory / remote-container pairing under active
/// synchronization. Built once at startup, immutable for process lifetime.
#[derive(Debug, Clone)]
pub struct WatchTarget {
    /// Absolute path of the watched directory.
    pub local_path: PathBuf,
    /// Remote container reference: Drive folder name or S3 prefix.
    pub remote_name: String,
    pub role: TargetRole,
}

impl WatchTarget {
    pub fn new(local_path: PathBuf, remote_name: impl Into<String>, role: TargetRole) -> Self {
        Self {
            local_path,
            remote_name: remote_name.into(),
            role,
        }
    }

    /// Whether `path` falls under this target's root.
    pub fn owns(&self, path: &Path) -> bool {
        path.starts_with(&self.local_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_names_are_distinct_per_role() {
        assert_eq!(TargetRole::Cache.archive_name(), "cache.tar.gz");
        assert_eq!(TargetRole::Public.archive_name(), "public.tar.gz");
    }

    #[test]
    fn target_owns_paths_under_its_root() {
        let target = WatchTarget::new(PathBuf::from("/build/cache"), "site-cache", TargetRole::Cache);
        assert!(target.owns(Path::new("/build/cache/data/a.json")));
        assert!(!target.owns(Path::new("/build/public/index.html")));
    }
}
