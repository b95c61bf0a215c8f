//! Store contract shared by every backend

pub mod cache;
pub mod in_memory;
pub mod snapshot;

pub use cache::CacheStore;
pub use in_memory::InMemoryStore;

use crate::document::VectorDocument;
use crate::error::{Result, StoreError};
use crate::query::{Query, QueryKind, QueryOptions};
use serde::Deserialize;

/// A vector store: documents in, ranked documents out.
pub trait Store: Send + Sync {
    /// Short backend name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Add documents to the store.
    fn add(&mut self, documents: Vec<VectorDocument>) -> Result<()>;

    /// Remove documents by id and report how many were removed. Unknown
    /// ids are ignored.
    fn remove(&mut self, ids: &[String]) -> Result<usize>;

    /// Run a query. Fails with `UnsupportedQuery` when `supports` is false.
    fn query(&self, query: &Query, options: &QueryOptions) -> Result<Vec<VectorDocument>>;

    /// Whether this store can execute the given query shape.
    fn supports(&self, kind: QueryKind) -> bool;
}

/// A store whose backing resources can be provisioned and torn down.
pub trait ManagedStore: Store {
    fn setup(&mut self, options: &SetupOptions) -> Result<()>;

    /// Remove every document and release the backing resource.
    fn drop_store(&mut self) -> Result<()>;
}

/// Provisioning options. Only SQL stores understand them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetupOptions {
    pub vector_type: Option<String>,
    pub vector_size: Option<usize>,
    pub index_method: Option<String>,
    pub index_opclass: Option<String>,
}

impl SetupOptions {
    pub fn is_empty(&self) -> bool {
        self == &SetupOptions::default()
    }
}

/// Fail with `UnsupportedQuery` unless `store` handles `query`'s shape.
pub(crate) fn ensure_supported<S: Store + ?Sized>(store: &S, query: &Query) -> Result<()> {
    let kind = query.kind();
    if store.supports(kind) {
        Ok(())
    } else {
        Err(StoreError::UnsupportedQuery {
            kind: kind.to_string(),
            store: store.name().to_string(),
        })
    }
}
