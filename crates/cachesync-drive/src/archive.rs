//! tar.gz snapshot packing and unpacking.
//!
//! Archives nest everything under one top-level directory; unpacking strips
//! that component so entries land directly in the destination, regardless of
//! what the source directory was called when the snapshot was taken.

use std::fs::File;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder};

use cachesync_core::SyncError;

/// Pack `src_dir` into a gzipped tarball at `dest_file`.
pub fn pack(src_dir: &Path, dest_file: &Path) -> Result<(), SyncError> {
    let wrapper = src_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("payload");
    let file = File::create(dest_file)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);
    builder
        .append_dir_all(wrapper, src_dir)
        .map_err(|e| SyncError::Archive(format!("cannot pack {}: {e}", src_dir.display())))?;
    let encoder = builder
        .into_inner()
        .map_err(|e| SyncError::Archive(format!("cannot finish archive: {e}")))?;
    encoder
        .finish()
        .map_err(|e| SyncError::Archive(format!("cannot finish compression: {e}")))?;
    Ok(())
}

/// Unpack a gzipped tarball into `dest_dir`, stripping the single top-level
/// directory. Existing files are overwritten.
pub fn unpack(archive_file: &Path, dest_dir: &Path) -> Result<(), SyncError> {
    let file = File::open(archive_file)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    let entries = archive
        .entries()
        .map_err(|e| SyncError::Archive(format!("cannot read archive: {e}")))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| SyncError::Archive(format!("corrupt archive entry: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| SyncError::Archive(format!("bad entry path: {e}")))?
            .into_owned();
        let stripped: PathBuf = path.components().skip(1).collect();
        if stripped.as_os_str().is_empty() {
            continue;
        }
        if stripped
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(SyncError::Archive(format!(
                "archive entry escapes destination: {}",
                path.display()
            )));
        }
        let dest = dest_dir.join(&stripped);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry
            .unpack(&dest)
            .map_err(|e| SyncError::Archive(format!("cannot unpack {}: {e}", path.display())))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn build_tree(root: &Path) {
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::write(root.join("a.json"), b"{}").unwrap();
        std::fs::write(root.join("b.bin"), b"\x00\x01").unwrap();
        std::fs::write(root.join("sub/c.txt"), b"nested").unwrap();
    }

    #[test]
    fn unpack_strips_the_wrapper_directory() {
        let src = TempDir::new().unwrap();
        build_tree(src.path());
        let staging = TempDir::new().unwrap();
        let tarball = staging.path().join("cache.tar.gz");
        pack(src.path(), &tarball).unwrap();

        let dest = TempDir::new().unwrap();
        unpack(&tarball, dest.path()).unwrap();

        // Entries land directly in dest, not under the source dir's name.
        assert_eq!(std::fs::read(dest.path().join("a.json")).unwrap(), b"{}");
        assert_eq!(
            std::fs::read(dest.path().join("sub/c.txt")).unwrap(),
            b"nested"
        );
        let wrapper = src.path().file_name().unwrap();
        assert!(!dest.path().join(wrapper).exists());
    }

    #[test]
    fn unpack_overwrites_existing_files() {
        let src = TempDir::new().unwrap();
        build_tree(src.path());
        let staging = TempDir::new().unwrap();
        let tarball = staging.path().join("cache.tar.gz");
        pack(src.path(), &tarball).unwrap();

        let dest = TempDir::new().unwrap();
        std::fs::write(dest.path().join("a.json"), b"stale").unwrap();
        unpack(&tarball, dest.path()).unwrap();
        assert_eq!(std::fs::read(dest.path().join("a.json")).unwrap(), b"{}");
    }

    #[test]
    fn missing_archive_is_an_io_error() {
        let dest = TempDir::new().unwrap();
        let err = unpack(Path::new("/nonexistent/cache.tar.gz"), dest.path()).unwrap_err();
        assert!(matches!(err, SyncError::Io(_)));
    }
}
