//! The Tile Disk Cache (spec.md 4.I): a content-addressed, on-disk store of
//! fully-encoded `.terrain` artifacts, keyed off the same `WindowKey` the
//! in-memory processed-window cache uses. Writes are atomic (tempfile in the
//! same directory, then rename) so a crash mid-write never leaves a partial
//! `.terrain` file at the target path (spec.md 8, invariant 7).

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::encoder;
use crate::error::Result;
use crate::windowkey::WindowKey;

const STRAY_TEMPFILE_PREFIX: &str = ".ctod-tmp-";

/// A fully-encoded tile, plus the metadata an HTTP response needs.
/// `content_type`/`etag` are recomputed from `encoded_bytes` on every read
/// rather than persisted alongside them, since both are pure functions of
/// the bytes -- nothing to get out of sync with a stale sidecar file.
#[derive(Debug, Clone)]
pub struct TileArtifact {
    pub encoded_bytes: Vec<u8>,
    pub content_type: &'static str,
    pub etag: String,
    pub created_at: SystemTime,
}

impl TileArtifact {
    pub fn new(encoded_bytes: Vec<u8>) -> Self {
        let etag = encoder::etag(&encoded_bytes);
        TileArtifact { encoded_bytes, content_type: encoder::content_type(), etag, created_at: SystemTime::now() }
    }
}

/// `root: None` disables the on-disk cache entirely (spec.md 6: "disables
/// on-disk cache if absent"), in which case every operation is a no-op.
#[derive(Debug, Clone)]
pub struct TileDiskCache {
    root: Option<PathBuf>,
}

impl TileDiskCache {
    pub fn new(root: Option<PathBuf>) -> Self {
        TileDiskCache { root }
    }

    pub fn disabled() -> Self {
        TileDiskCache { root: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.root.is_some()
    }

    /// `{cache_root}/{hex(dataset_fingerprint)}/{meshing_method}/{resampling}/{z}/{x}/{y}.terrain`
    pub fn path_for(&self, key: &WindowKey) -> Option<PathBuf> {
        let root = self.root.as_ref()?;
        Some(
            root.join(format!("{:016x}", key.dataset_fingerprint))
                .join(key.meshing_method.to_string())
                .join(key.resampling.to_string())
                .join(key.z.to_string())
                .join(key.x.to_string())
                .join(format!("{}.terrain", key.y)),
        )
    }

    pub fn read(&self, key: &WindowKey) -> Result<Option<TileArtifact>> {
        let Some(path) = self.path_for(key) else { return Ok(None) };
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(TileArtifact::new(bytes))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Atomic: the tempfile is created in the artifact's own parent
    /// directory (so the rename is same-filesystem) and persisted over the
    /// final path, never written to it directly.
    pub fn write(&self, key: &WindowKey, encoded_bytes: &[u8]) -> Result<()> {
        let Some(path) = self.path_for(key) else { return Ok(()) };
        let parent = path.parent().expect("path_for always nests under the cache root");
        std::fs::create_dir_all(parent)?;

        let tempfile = tempfile::Builder::new().prefix(STRAY_TEMPFILE_PREFIX).tempfile_in(parent)?;
        std::fs::write(tempfile.path(), encoded_bytes)?;
        tempfile.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Removes any leftover `.ctod-tmp-*` files under the cache root, left
    /// behind by a process that crashed between creating a tempfile and
    /// renaming it. Intended to run once at startup.
    pub fn sweep_stray_tempfiles(&self) -> Result<usize> {
        let Some(root) = &self.root else { return Ok(0) };
        if !root.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        sweep_dir(root, &mut removed)?;
        Ok(removed)
    }
}

fn sweep_dir(dir: &Path, removed: &mut usize) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            sweep_dir(&path, removed)?;
        } else if path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with(STRAY_TEMPFILE_PREFIX)) {
            std::fs::remove_file(&path)?;
            *removed += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetConfig;
    use crate::windowkey::TileKey;
    use ctod_geo::TmsId;

    fn key() -> WindowKey {
        let dataset = DatasetConfig { cog_path: "/data/dem.tif".into(), ..Default::default() };
        WindowKey::new(&dataset, TileKey::new(TmsId::WebMercatorQuad, 10, 3, 4))
    }

    #[test]
    fn disabled_cache_reads_and_writes_are_no_ops() {
        let cache = TileDiskCache::disabled();
        assert!(cache.read(&key()).unwrap().is_none());
        cache.write(&key(), b"ignored").unwrap();
        assert_eq!(cache.sweep_stray_tempfiles().unwrap(), 0);
    }

    #[test]
    fn write_then_read_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileDiskCache::new(Some(dir.path().to_path_buf()));
        cache.write(&key(), b"terrain-bytes").unwrap();
        let artifact = cache.read(&key()).unwrap().unwrap();
        assert_eq!(artifact.encoded_bytes, b"terrain-bytes");
    }

    #[test]
    fn path_for_nests_by_fingerprint_method_resampling_and_tile() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileDiskCache::new(Some(dir.path().to_path_buf()));
        let path = cache.path_for(&key()).unwrap();
        assert!(path.starts_with(dir.path()));
        assert_eq!(path.extension().unwrap(), "terrain");
    }

    #[test]
    fn sweep_removes_stray_tempfiles_but_not_real_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TileDiskCache::new(Some(dir.path().to_path_buf()));
        cache.write(&key(), b"real").unwrap();

        let stray_dir = dir.path().join("stray");
        std::fs::create_dir_all(&stray_dir).unwrap();
        std::fs::write(stray_dir.join(".ctod-tmp-abc123"), b"leftover").unwrap();

        let removed = cache.sweep_stray_tempfiles().unwrap();
        assert_eq!(removed, 1);
        assert!(cache.read(&key()).unwrap().is_some());
    }
}
