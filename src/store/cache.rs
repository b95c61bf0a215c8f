//! Cache-backed store: the in-memory engine persisted to a snapshot file

use crate::distance::DistanceStrategy;
use crate::document::VectorDocument;
use crate::error::Result;
use crate::query::{Query, QueryKind, QueryOptions};
use crate::store::snapshot::{SnapshotFile, SnapshotManager};
use crate::store::{InMemoryStore, ManagedStore, SetupOptions, Store};
use std::path::Path;
use tracing::{debug, info};

/// An [`InMemoryStore`] whose documents survive restarts.
///
/// Every mutation rewrites the snapshot, so this suits small corpora that
/// are queried far more often than they change.
#[derive(Debug)]
pub struct CacheStore {
    inner: InMemoryStore,
    snapshots: SnapshotManager,
}

impl CacheStore {
    /// Open the store kept under `dir` as `key`, loading any existing snapshot.
    ///
    /// A stored snapshot's documents are kept even if `strategy` differs
    /// from the one they were written with; the new strategy wins.
    pub fn open(dir: impl AsRef<Path>, key: &str, strategy: DistanceStrategy) -> Result<Self> {
        let snapshots = SnapshotManager::new(dir, key);
        let mut inner = InMemoryStore::new(strategy);

        if let Some(snapshot) = snapshots.load()? {
            let documents = snapshot.into_documents()?;
            info!(
                path = %snapshots.path().display(),
                documents = documents.len(),
                "loaded store snapshot"
            );
            inner.add(documents)?;
        }

        Ok(Self { inner, snapshots })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn snapshot_path(&self) -> &Path {
        self.snapshots.path()
    }

    /// Apply `change` to a copy, write that copy's snapshot, and only then
    /// swap it in. A failed write leaves memory matching the file on disk.
    fn commit<T>(&mut self, change: impl FnOnce(&mut InMemoryStore) -> Result<T>) -> Result<T> {
        let mut staged = self.inner.clone();
        let outcome = change(&mut staged)?;

        let snapshot = SnapshotFile::from_documents(staged.strategy(), staged.documents())?;
        self.snapshots.save(&snapshot)?;
        debug!(path = %self.snapshots.path().display(), "saved store snapshot");

        self.inner = staged;
        Ok(outcome)
    }
}

impl Store for CacheStore {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn add(&mut self, documents: Vec<VectorDocument>) -> Result<()> {
        self.commit(|store| store.add(documents))
    }

    fn remove(&mut self, ids: &[String]) -> Result<usize> {
        self.commit(|store| store.remove(ids))
    }

    fn query(&self, query: &Query, options: &QueryOptions) -> Result<Vec<VectorDocument>> {
        self.inner.query(query, options)
    }

    fn supports(&self, kind: QueryKind) -> bool {
        self.inner.supports(kind)
    }
}

impl ManagedStore for CacheStore {
    fn setup(&mut self, options: &SetupOptions) -> Result<()> {
        self.commit(|store| store.setup(options))
    }

    fn drop_store(&mut self) -> Result<()> {
        self.snapshots.delete()?;
        self.inner.clear();
        Ok(())
    }
}
