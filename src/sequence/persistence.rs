use std::fs;
use std::path::{Path, PathBuf};

use crate::model::SequenceMetadata;

use super::{Result, SequenceError};

/// Storage for sequence metadata across sessions.
pub trait MetadataPersistence: Send + Sync {
    fn save(&self, sequence_id: u64, metadata: &SequenceMetadata) -> Result<()>;

    fn load(&self, sequence_id: u64, metadata: &SequenceMetadata)
    -> Result<Option<SequenceMetadata>>;
}

/// One pretty-printed JSON document per sequence in a directory.
///
/// Documents are keyed by the stem of the metadata source path, or by the
/// sequence id for sequences without a source.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    dir: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn document_path(&self, sequence_id: u64, metadata: &SequenceMetadata) -> PathBuf {
        let key = metadata
            .source
            .as_deref()
            .and_then(Path::file_stem)
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("sequence-{sequence_id}"));
        self.dir.join(format!("{key}.json"))
    }
}

impl MetadataPersistence for JsonFilePersistence {
    fn save(&self, sequence_id: u64, metadata: &SequenceMetadata) -> Result<()> {
        let path = self.document_path(sequence_id, metadata);
        let serialized = serde_json::to_string_pretty(metadata)?;
        fs::write(&path, serialized).map_err(|error| {
            SequenceError::Persistence(format!("cannot write {}: {error}", path.display()))
        })
    }

    fn load(
        &self,
        sequence_id: u64,
        metadata: &SequenceMetadata,
    ) -> Result<Option<SequenceMetadata>> {
        let path = self.document_path(sequence_id, metadata);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }
}
