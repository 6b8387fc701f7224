use pill_watch_common::frame::GrayFrame;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name for a buffer slot. Slots are 1-based, slot 1 is the oldest frame.
pub fn snapshot_name(slot: usize) -> String {
    format!("snapshot_{slot}.jpg")
}

/// Mirrors the rolling buffer on disk as `snapshot_1.jpg ..= snapshot_N.jpg`.
///
/// The store only observes the buffer: the detector keeps frames in memory
/// and never reads them back from here.
pub struct SnapshotStore {
    dir: PathBuf,
    capacity: usize,
}

impl SnapshotStore {
    pub fn open(dir: impl Into<PathBuf>, capacity: usize) -> Result<Self, SnapshotError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| SnapshotError::Io(dir.display().to_string(), e))?;
        info!(dir = %dir.display(), capacity, "snapshot store ready");
        Ok(Self { dir, capacity })
    }

    pub fn path(&self, slot: usize) -> PathBuf {
        self.dir.join(snapshot_name(slot))
    }

    /// Remove every slot file, e.g. before the buffer is refilled.
    pub fn clear(&self) -> Result<(), SnapshotError> {
        for slot in 1..=self.capacity {
            self.remove_if_exists(&self.path(slot))?;
        }
        Ok(())
    }

    /// Write a frame into the given 1-based slot, replacing what was there.
    pub fn write(&self, slot: usize, frame: &GrayFrame) -> Result<(), SnapshotError> {
        let path = self.path(slot);
        frame
            .image
            .save(&path)
            .map_err(|e| SnapshotError::Encode(path.display().to_string(), e))?;
        debug!(path = %path.display(), seq = frame.seq, "snapshot saved");
        Ok(())
    }

    /// Drop slot 1 and move every later slot down by one, leaving the last slot free.
    /// Missing files (slots whose capture failed) are skipped.
    pub fn rotate(&self) -> Result<(), SnapshotError> {
        self.remove_if_exists(&self.path(1))?;
        for slot in 1..self.capacity {
            let from = self.path(slot + 1);
            let to = self.path(slot);
            self.remove_if_exists(&to)?;
            if from.exists() {
                std::fs::rename(&from, &to)
                    .map_err(|e| SnapshotError::Io(from.display().to_string(), e))?;
            }
        }
        Ok(())
    }

    fn remove_if_exists(&self, path: &Path) -> Result<(), SnapshotError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SnapshotError::Io(path.display().to_string(), e)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error on {0}: {1}")]
    Io(String, std::io::Error),
    #[error("failed to encode snapshot {0}: {1}")]
    Encode(String, image::ImageError),
}
