use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SyncError;
use crate::target::{TargetRole, WatchTarget};

/// Validated engine settings, constructed once at startup and passed by
/// reference to each collaborator.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub cache_path: PathBuf,
    pub public_path: PathBuf,
    /// Caller-supplied ignore globs, appended to the built-in list.
    pub ignore: Vec<String>,
    pub quiet_period: Duration,
}

impl SyncSettings {
    /// Resolve and validate the watched directories. Relative paths are
    /// resolved against the working directory; both must already exist.
    pub fn resolve(
        cache_path: &Path,
        public_path: &Path,
        ignore: Vec<String>,
        quiet_period: Duration,
    ) -> Result<Self, SyncError> {
        Ok(Self {
            cache_path: resolve_dir(cache_path)?,
            public_path: resolve_dir(public_path)?,
            ignore,
            quiet_period,
        })
    }

    /// The two watch targets, bound to one remote container reference.
    pub fn watch_targets(&self, remote_name: &str) -> Vec<WatchTarget> {
        vec![
            WatchTarget::new(self.cache_path.clone(), remote_name, TargetRole::Cache),
            WatchTarget::new(self.public_path.clone(), remote_name, TargetRole::Public),
        ]
    }
}

fn resolve_dir(path: &Path) -> Result<PathBuf, SyncError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| SyncError::Config(format!("cannot resolve working directory: {e}")))?
            .join(path)
    };
    if !absolute.is_dir() {
        return Err(SyncError::Config(format!(
            "watched path does not exist on your file system: {}; pick an existing directory",
            absolute.display()
        )));
    }
    Ok(absolute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn resolves_existing_directories() {
        let cache = TempDir::new().unwrap();
        let public = TempDir::new().unwrap();
        let settings = SyncSettings::resolve(
            cache.path(),
            public.path(),
            vec!["**/*.tmp".into()],
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(settings.cache_path.is_absolute());
        assert_eq!(settings.public_path, public.path());

        let targets = settings.watch_targets("site-cache");
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].role, TargetRole::Cache);
        assert_eq!(targets[1].role, TargetRole::Public);
        assert!(targets.iter().all(|t| t.remote_name == "site-cache"));
    }

    #[test]
    fn missing_directory_is_a_config_error() {
        let cache = TempDir::new().unwrap();
        let missing = cache.path().join("does-not-exist");
        let err = SyncSettings::resolve(&missing, cache.path(), vec![], Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }
}
