//! Snapshot: save/load a store's document list to/from disk.
//!
//! File layout: `[crc32: u32 LE][payload: bincode(SnapshotFile)]`.

use crate::distance::DistanceStrategy;
use crate::document::{Metadata, VectorDocument};
use crate::error::{Result, StoreError};
use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Serializable form of a document. Metadata travels as JSON text because
/// bincode cannot encode self-describing JSON values.
#[derive(Debug, Serialize, Deserialize)]
pub struct SerializedDocument {
    pub id: String,
    pub data: Vec<f32>,
    pub metadata_json: String,
}

/// Serializable representation of a full store.
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub strategy: DistanceStrategy,
    pub documents: Vec<SerializedDocument>,
}

impl SnapshotFile {
    pub fn from_documents(strategy: DistanceStrategy, documents: &[VectorDocument]) -> Result<Self> {
        let documents = documents
            .iter()
            .map(|doc| {
                Ok(SerializedDocument {
                    id: doc.id.clone(),
                    data: doc.vector.as_slice().to_vec(),
                    metadata_json: to_json(&doc.metadata)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            strategy,
            documents,
        })
    }

    pub fn into_documents(self) -> Result<Vec<VectorDocument>> {
        self.documents
            .into_iter()
            .map(|sd| {
                let metadata: Metadata = serde_json::from_str(&sd.metadata_json)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(VectorDocument::new(sd.id, Vector::new(sd.data), metadata))
            })
            .collect()
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Manages one snapshot file.
#[derive(Debug)]
pub struct SnapshotManager {
    path: PathBuf,
}

impl SnapshotManager {
    /// Snapshot stored as `<dir>/<key>.snapshot`.
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.snapshot", key)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if a snapshot exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write the snapshot, replacing any previous one.
    pub fn save(&self, snapshot: &SnapshotFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let payload =
            bincode::serialize(snapshot).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let crc = crc32fast::hash(&payload);

        let mut data = Vec::with_capacity(payload.len() + 4);
        data.extend_from_slice(&crc.to_le_bytes());
        data.extend_from_slice(&payload);

        // Write beside the target and rename so readers never see half a file
        let tmp = self.path.with_extension("snapshot.tmp");
        fs::write(&tmp, &data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Load the snapshot, or return None if none exists.
    pub fn load(&self) -> Result<Option<SnapshotFile>> {
        if !self.exists() {
            return Ok(None);
        }

        let data = fs::read(&self.path)?;
        if data.len() < 4 {
            return Err(StoreError::CorruptSnapshot {
                path: self.path.clone(),
            });
        }
        let (crc_bytes, payload) = data.split_at(4);
        let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        if crc32fast::hash(payload) != expected {
            return Err(StoreError::CorruptSnapshot {
                path: self.path.clone(),
            });
        }

        let snapshot =
            bincode::deserialize(payload).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Some(snapshot))
    }

    /// Delete the snapshot file if present.
    pub fn delete(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn documents() -> Vec<VectorDocument> {
        vec![
            VectorDocument::new(
                "v1",
                Vector::new(vec![1.0, 2.0, 3.0]),
                Metadata::new().with_text("first").with("tags", json!(["a", "b"])),
            ),
            VectorDocument::new("v2", Vector::new(vec![4.0, 5.0, 6.0]), Metadata::new()),
        ]
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mgr = SnapshotManager::new(dir.path().join("db"), "store");

        let snapshot = SnapshotFile::from_documents(DistanceStrategy::Manhattan, &documents()).unwrap();
        mgr.save(&snapshot).unwrap();
        assert!(mgr.exists());

        let loaded = mgr.load().unwrap().unwrap();
        assert_eq!(loaded.strategy, DistanceStrategy::Manhattan);
        assert_eq!(loaded.into_documents().unwrap(), documents());
    }

    #[test]
    fn test_load_nonexistent() {
        let dir = TempDir::new().unwrap();
        let mgr = SnapshotManager::new(dir.path(), "empty");
        assert!(!mgr.exists());
        assert!(mgr.load().unwrap().is_none());
        mgr.delete().unwrap();
    }

    #[test]
    fn test_detects_corruption() {
        let dir = TempDir::new().unwrap();
        let mgr = SnapshotManager::new(dir.path(), "store");
        let snapshot = SnapshotFile::from_documents(DistanceStrategy::Cosine, &documents()).unwrap();
        mgr.save(&snapshot).unwrap();

        let mut bytes = fs::read(mgr.path()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(mgr.path(), &bytes).unwrap();

        assert!(matches!(mgr.load(), Err(StoreError::CorruptSnapshot { .. })));
    }
}
