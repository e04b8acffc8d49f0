use std::path::PathBuf;

use crate::model::PlaneData;

use super::Result;

/// Source of plane data for lazily loaded sequences, typically an image
/// file reader.
pub trait ImageProvider: Send + Sync {
    /// Reads the plane at `(t, z)` with every channel.
    fn load_plane(&self, t: usize, z: usize) -> Result<PlaneData>;

    fn close(&self) -> Result<()> {
        Ok(())
    }

    /// File backing the given sample position, when known.
    fn file_path(&self, _t: usize, _z: usize, _c: usize) -> Option<PathBuf> {
        None
    }
}
