//! Store adapter executing [`SqlBuilder`] statements through a connection

use crate::document::{Metadata, VectorDocument};
use crate::error::{DriverError, Result, StoreError};
use crate::postgres::{PgDistance, SqlBuilder, Statement};
use crate::query::{Query, QueryKind, QueryOptions};
use crate::store::{ensure_supported, ManagedStore, SetupOptions, Store};
use crate::vector::Vector;
use std::sync::Arc;
use tracing::debug;

/// One result row as returned by the query statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: String,
    /// pgvector text form, e.g. `[1,2,3]`
    pub embedding: String,
    /// JSON text of the `metadata` column
    pub metadata: String,
    pub score: f64,
}

/// The database seam. Implementations wrap a real driver; errors they
/// return reach the caller as [`StoreError::Driver`] without translation.
pub trait Connection: Send + Sync {
    /// Run a statement that returns no rows; yields the affected row count.
    fn execute(&self, statement: &Statement) -> std::result::Result<u64, DriverError>;

    /// Run a query statement.
    fn fetch(&self, statement: &Statement) -> std::result::Result<Vec<Row>, DriverError>;
}

/// pgvector-backed store
pub struct PostgresStore {
    connection: Arc<dyn Connection>,
    builder: SqlBuilder,
}

impl PostgresStore {
    /// Fails with `InvalidArgument` when a name is not a plain SQL identifier.
    pub fn new(
        connection: Arc<dyn Connection>,
        table: impl Into<String>,
        vector_field: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            connection,
            builder: SqlBuilder::new(table, vector_field)?,
        })
    }

    pub fn with_distance(mut self, distance: PgDistance) -> Self {
        self.builder = self.builder.with_distance(distance);
        self
    }

    /// Enable text and hybrid queries with the given text-search config.
    pub fn with_text_search(mut self, config: impl Into<String>) -> Result<Self> {
        self.builder = self.builder.with_text_search(config)?;
        Ok(self)
    }

    pub fn builder(&self) -> &SqlBuilder {
        &self.builder
    }

    fn execute(&self, statement: &Statement) -> Result<u64> {
        debug!(sql = %statement.sql, "executing statement");
        self.connection.execute(statement).map_err(StoreError::Driver)
    }

    /// The statement `query` would run, without running it.
    pub fn statement_for(&self, query: &Query, options: &QueryOptions) -> Result<Statement> {
        ensure_supported(self, query)?;
        if options.filter.is_some() {
            return Err(StoreError::invalid_argument(
                "The postgres store does not support filter callbacks; use a where clause",
            ));
        }

        match query {
            Query::Vector(q) => Ok(self.builder.vector_query(q, options)),
            Query::Text(q) => self.builder.text_query(q, options),
            Query::Hybrid(q) => self.builder.hybrid_query(q, options),
        }
    }
}

fn decode_row(row: Row) -> Result<VectorDocument> {
    let vector = Vector::from_pgvector(&row.embedding)?;
    let metadata: Metadata = if row.metadata.is_empty() {
        Metadata::new()
    } else {
        serde_json::from_str(&row.metadata).map_err(|e| StoreError::Serialization(e.to_string()))?
    };
    Ok(VectorDocument::new(row.id, vector, metadata).with_score(row.score as f32))
}

impl Store for PostgresStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn add(&mut self, documents: Vec<VectorDocument>) -> Result<()> {
        for document in &documents {
            let statement = self.builder.insert(document)?;
            self.execute(&statement)?;
        }
        Ok(())
    }

    fn remove(&mut self, ids: &[String]) -> Result<usize> {
        match self.builder.delete(ids) {
            Some(statement) => Ok(self.execute(&statement)? as usize),
            None => Ok(0),
        }
    }

    fn query(&self, query: &Query, options: &QueryOptions) -> Result<Vec<VectorDocument>> {
        let statement = self.statement_for(query, options)?;
        debug!(sql = %statement.sql, "fetching rows");

        let mut results = self
            .connection
            .fetch(&statement)
            .map_err(StoreError::Driver)?
            .into_iter()
            .map(decode_row)
            .collect::<Result<Vec<_>>>()?;

        // Row order is not guaranteed once the statement is wrapped by a driver.
        let score = |doc: &VectorDocument| doc.score.unwrap_or(0.0);
        match query.kind() {
            QueryKind::Vector => results.sort_by(|a, b| score(a).total_cmp(&score(b))),
            QueryKind::Text | QueryKind::Hybrid => {
                results.sort_by(|a, b| score(b).total_cmp(&score(a)))
            }
        }
        Ok(results)
    }

    fn supports(&self, kind: QueryKind) -> bool {
        match kind {
            QueryKind::Vector => true,
            QueryKind::Text => self.builder.text_search().is_some(),
            QueryKind::Hybrid => {
                self.builder.text_search().is_some()
                    && self.builder.distance() != PgDistance::InnerProduct
            }
        }
    }
}

impl ManagedStore for PostgresStore {
    fn setup(&mut self, options: &SetupOptions) -> Result<()> {
        for statement in self.builder.setup(options)? {
            self.execute(&statement)?;
        }
        Ok(())
    }

    fn drop_store(&mut self) -> Result<()> {
        self.execute(&self.builder.drop_table()).map(|_| ())
    }
}
