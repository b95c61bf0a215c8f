//! Named-store configuration and the registry built from it.
//!
//! A config file lists stores by name; each entry picks a backend. Postgres
//! stores name a pool from `connections`:
//!
//! ```json
//! {
//!   "default_store": "docs",
//!   "connections": {
//!     "main": { "url": "postgres://localhost/vectors", "max_connections": 5 }
//!   },
//!   "stores": [
//!     { "name": "docs", "backend": "in_memory", "distance": "cosine" },
//!     { "name": "kb", "backend": "cache", "path": "./data", "distance": "euclidean" },
//!     { "name": "pg", "backend": "postgres", "connection": "main", "table": "embeddings" }
//!   ]
//! }
//! ```

use crate::distance::DistanceStrategy;
use crate::error::{Result, StoreError};
use crate::postgres::{Connection, PgDistance, PgPoolConnection, PostgresStore, DEFAULT_MAX_CONNECTIONS};
use crate::store::{CacheStore, InMemoryStore, ManagedStore};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Name given to the store used when no config file is supplied.
pub const DEFAULT_STORE_NAME: &str = "default";

/// Top-level configuration document
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub stores: Vec<StoreConfig>,
    #[serde(default)]
    pub default_store: Option<String>,
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,
}

/// A Postgres pool shared by every store naming it
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

/// One named store
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoreConfig {
    pub name: String,
    #[serde(flatten)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum BackendConfig {
    InMemory {
        #[serde(default)]
        distance: DistanceStrategy,
    },
    Cache {
        path: PathBuf,
        /// Snapshot file stem; defaults to the store name.
        #[serde(default)]
        key: Option<String>,
        #[serde(default)]
        distance: DistanceStrategy,
    },
    Postgres {
        connection: String,
        table: String,
        #[serde(default = "default_vector_field")]
        vector_field: String,
        #[serde(default)]
        distance: PgDistance,
        /// Text-search config (e.g. `simple`); enables text and hybrid queries.
        #[serde(default)]
        text_search: Option<String>,
    },
}

fn default_vector_field() -> String {
    "embedding".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stores: vec![StoreConfig {
                name: DEFAULT_STORE_NAME.to_string(),
                backend: BackendConfig::InMemory {
                    distance: DistanceStrategy::Cosine,
                },
            }],
            default_store: None,
            connections: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| StoreError::invalid_configuration(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Structural checks that do not need any connection.
    pub fn validate(&self) -> Result<()> {
        if self.stores.is_empty() {
            return Err(StoreError::invalid_configuration(
                "At least one store must be configured",
            ));
        }

        let mut seen = HashSet::new();
        for store in &self.stores {
            if store.name.trim().is_empty() {
                return Err(StoreError::invalid_configuration("Store names must not be empty"));
            }
            if !seen.insert(store.name.as_str()) {
                return Err(StoreError::invalid_configuration(format!(
                    "Store \"{}\" is configured more than once",
                    store.name
                )));
            }
            if let BackendConfig::Cache { path, .. } = &store.backend {
                if path.as_os_str().is_empty() {
                    return Err(StoreError::invalid_configuration(format!(
                        "Cache store \"{}\" needs a non-empty path",
                        store.name
                    )));
                }
            }
        }

        if let Some(default) = &self.default_store {
            if !seen.contains(default.as_str()) {
                return Err(StoreError::invalid_configuration(format!(
                    "Default store \"{}\" is not configured",
                    default
                )));
            }
        }

        for (name, connection) in &self.connections {
            if connection.max_connections == 0 {
                return Err(StoreError::invalid_configuration(format!(
                    "Connection \"{}\" needs max_connections of at least 1",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Create a lazy pool for every configured connection. No database is
    /// contacted until a store runs a statement. Must run inside a tokio
    /// runtime.
    pub fn open_connections(&self) -> Result<HashMap<String, Arc<dyn Connection>>> {
        let mut connections: HashMap<String, Arc<dyn Connection>> = HashMap::new();
        for (name, config) in &self.connections {
            let pool = PgPoolConnection::connect_lazy(&config.url, config.max_connections)?;
            info!(name = %name, max_connections = config.max_connections, "configured postgres pool");
            connections.insert(name.clone(), Arc::new(pool));
        }
        Ok(connections)
    }
}

/// Stores built from an [`AppConfig`], addressable by name.
pub struct StoreRegistry {
    stores: Vec<(String, Box<dyn ManagedStore>)>,
    default_store: String,
}

impl StoreRegistry {
    /// Build every configured store. Postgres entries resolve their
    /// `connection` against `connections`.
    pub fn from_config(
        config: &AppConfig,
        connections: &HashMap<String, Arc<dyn Connection>>,
    ) -> Result<Self> {
        config.validate()?;

        let mut stores = Vec::with_capacity(config.stores.len());
        for entry in &config.stores {
            let store = build_store(entry, connections)?;
            info!(name = %entry.name, backend = store.name(), "configured store");
            stores.push((entry.name.clone(), store));
        }

        let default_store = config
            .default_store
            .clone()
            .unwrap_or_else(|| config.stores[0].name.clone());

        Ok(Self {
            stores,
            default_store,
        })
    }

    pub fn get(&self, name: &str) -> Option<&dyn ManagedStore> {
        self.stores
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, store)| store.as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn ManagedStore + 'static)> {
        self.stores
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, store)| store.as_mut())
    }

    pub fn default_store_name(&self) -> &str {
        &self.default_store
    }

    pub fn names(&self) -> Vec<&str> {
        self.stores.iter().map(|(n, _)| n.as_str()).collect()
    }
}

fn build_store(
    entry: &StoreConfig,
    connections: &HashMap<String, Arc<dyn Connection>>,
) -> Result<Box<dyn ManagedStore>> {
    let store: Box<dyn ManagedStore> = match &entry.backend {
        BackendConfig::InMemory { distance } => Box::new(InMemoryStore::new(*distance)),
        BackendConfig::Cache {
            path,
            key,
            distance,
        } => {
            let key = key.as_deref().unwrap_or(&entry.name);
            Box::new(CacheStore::open(path, key, *distance)?)
        }
        BackendConfig::Postgres {
            connection,
            table,
            vector_field,
            distance,
            text_search,
        } => {
            let conn = connections.get(connection).cloned().ok_or_else(|| {
                StoreError::invalid_configuration(format!(
                    "Store \"{}\" references unknown connection \"{}\"",
                    entry.name, connection
                ))
            })?;
            let mut store = PostgresStore::new(conn, table.as_str(), vector_field.as_str())?
                .with_distance(*distance);
            if let Some(config) = text_search {
                store = store.with_text_search(config.as_str())?;
            }
            Box::new(store)
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryKind;

    fn no_connections() -> HashMap<String, Arc<dyn Connection>> {
        HashMap::new()
    }

    #[test]
    fn test_parse_backends() {
        let config = AppConfig::from_json(
            r#"{
                "default_store": "kb",
                "stores": [
                    { "name": "docs", "backend": "in_memory", "distance": "manhattan" },
                    { "name": "kb", "backend": "cache", "path": "/tmp/kb" },
                    { "name": "pg", "backend": "postgres", "connection": "main",
                      "table": "embeddings", "distance": "cosine", "text_search": "simple" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.stores.len(), 3);
        assert_eq!(
            config.stores[0].backend,
            BackendConfig::InMemory {
                distance: DistanceStrategy::Manhattan
            }
        );
        match &config.stores[2].backend {
            BackendConfig::Postgres {
                vector_field,
                distance,
                ..
            } => {
                assert_eq!(vector_field, "embedding");
                assert_eq!(*distance, PgDistance::Cosine);
            }
            other => panic!("unexpected backend {:?}", other),
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let result = AppConfig::from_json(r#"{"stores": [{"name": "x", "backend": "pinecone"}]}"#);
        assert!(matches!(result, Err(StoreError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_duplicate_names() {
        let config = AppConfig::from_json(
            r#"{"stores": [
                {"name": "x", "backend": "in_memory"},
                {"name": "x", "backend": "in_memory"}
            ]}"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_missing_default_store() {
        let config = AppConfig {
            default_store: Some("nope".to_string()),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StoreError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_empty_config() {
        let config = AppConfig::from_json(r#"{"stores": []}"#).unwrap();
        assert!(StoreRegistry::from_config(&config, &no_connections()).is_err());
    }

    #[test]
    fn test_unknown_connection() {
        let config = AppConfig::from_json(
            r#"{"stores": [{"name": "pg", "backend": "postgres", "connection": "main", "table": "t"}]}"#,
        )
        .unwrap();
        let err = StoreRegistry::from_config(&config, &no_connections())
            .err()
            .unwrap();
        assert!(err.to_string().contains("unknown connection \"main\""));
    }

    #[test]
    fn test_parse_connections() {
        let config = AppConfig::from_json(
            r#"{
                "connections": {
                    "main": { "url": "postgres://localhost/vectors" },
                    "replica": { "url": "postgres://replica/vectors", "max_connections": 2 }
                },
                "stores": [{"name": "pg", "backend": "postgres", "connection": "main", "table": "t"}]
            }"#,
        )
        .unwrap();

        assert_eq!(config.connections["main"].max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.connections["replica"].max_connections, 2);
        assert!(config.validate().is_ok());

        let bad = AppConfig::from_json(
            r#"{"connections": {"main": {"url": "postgres://x", "max_connections": 0}},
                "stores": [{"name": "x", "backend": "in_memory"}]}"#,
        )
        .unwrap();
        assert!(bad.validate().is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_postgres_store_from_configured_connection() {
        let config = AppConfig::from_json(
            r#"{
                "connections": { "main": { "url": "postgres://localhost/vectors" } },
                "stores": [{ "name": "pg", "backend": "postgres", "connection": "main",
                             "table": "embeddings", "text_search": "simple" }]
            }"#,
        )
        .unwrap();

        let connections = config.open_connections().unwrap();
        assert!(connections.contains_key("main"));

        let registry = StoreRegistry::from_config(&config, &connections).unwrap();
        let store = registry.get("pg").unwrap();
        assert_eq!(store.name(), "postgres");
        assert!(store.supports(QueryKind::Hybrid));
    }

    #[test]
    fn test_default_registry() {
        let registry = StoreRegistry::from_config(&AppConfig::default(), &no_connections()).unwrap();
        assert_eq!(registry.default_store_name(), DEFAULT_STORE_NAME);
        assert_eq!(registry.names(), vec![DEFAULT_STORE_NAME]);

        let store = registry.get(DEFAULT_STORE_NAME).unwrap();
        assert_eq!(store.name(), "in_memory");
        assert!(store.supports(QueryKind::Hybrid));
        assert!(registry.get("missing").is_none());
    }
}
