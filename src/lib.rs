//! # AI Store
//!
//! Vector stores for retrieval pipelines.
//!
//! This library provides:
//! - Distance strategies (cosine, angular, euclidean, manhattan, chebyshev)
//! - An in-memory store supporting vector, text and hybrid queries
//! - A snapshot-backed cache store that survives restarts
//! - A pgvector SQL builder and a Postgres store over a pluggable connection
//! - Named-store configuration and an HTTP API
//!
//! ## Example
//!
//! ```rust
//! use ai_store::{DistanceStrategy, InMemoryStore, Metadata, Store, Vector, VectorDocument};
//! use ai_store::query::{QueryOptions, VectorQuery};
//!
//! let mut store = InMemoryStore::new(DistanceStrategy::Cosine);
//! store
//!     .add(vec![
//!         VectorDocument::new("a", Vector::new(vec![0.1, 0.1, 0.5]), Metadata::new()),
//!         VectorDocument::new("b", Vector::new(vec![0.7, -0.3, 0.0]), Metadata::new()),
//!     ])
//!     .unwrap();
//!
//! let query = VectorQuery::new(Vector::new(vec![0.1, 0.1, 0.4])).into();
//! let results = store.query(&query, &QueryOptions::new()).unwrap();
//! assert_eq!(results[0].id, "a");
//! ```

pub mod config;
pub mod distance;
pub mod document;
pub mod error;
pub mod metrics;
pub mod postgres;
pub mod query;
pub mod server;
pub mod store;
pub mod vector;

pub use config::{AppConfig, StoreRegistry};
pub use distance::{DistanceCalculator, DistanceStrategy};
pub use document::{Metadata, VectorDocument};
pub use error::{Result, StoreError};
pub use postgres::{PgDistance, PostgresStore, SqlBuilder};
pub use query::{HybridQuery, Query, QueryKind, QueryOptions, TextQuery, VectorQuery};
pub use store::{CacheStore, InMemoryStore, ManagedStore, SetupOptions, Store};
pub use vector::Vector;
