//! Literal SQL templates for pgvector queries

use crate::document::{VectorDocument, TEXT_KEY};
use crate::error::{Result, StoreError};
use crate::postgres::{validate_identifier, PgDistance, Statement, CALLER_CLAUSE};
use crate::query::{HybridQuery, QueryOptions, TextQuery, VectorQuery};
use crate::store::SetupOptions;

/// Row limit used when the caller does not set `max_items`.
pub const DEFAULT_LIMIT: usize = 5;

const DEFAULT_VECTOR_TYPE: &str = "vector";
const DEFAULT_VECTOR_SIZE: usize = 1536;
const DEFAULT_INDEX_METHOD: &str = "ivfflat";
const DEFAULT_INDEX_OPCLASS: &str = "vector_cosine_ops";

/// Builds statements for one table. Holds only validated configuration;
/// every method is a pure function of its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlBuilder {
    table: String,
    vector_field: String,
    distance: PgDistance,
    text_search: Option<String>,
}

impl SqlBuilder {
    pub fn new(table: impl Into<String>, vector_field: impl Into<String>) -> Result<Self> {
        let table = table.into();
        let vector_field = vector_field.into();
        validate_identifier("table name", &table, true)?;
        validate_identifier("vector field name", &vector_field, false)?;
        Ok(Self {
            table,
            vector_field,
            distance: PgDistance::default(),
            text_search: None,
        })
    }

    pub fn with_distance(mut self, distance: PgDistance) -> Self {
        self.distance = distance;
        self
    }

    /// Enable text and hybrid statements using the given text-search config
    /// (e.g. `simple`, `english`).
    pub fn with_text_search(mut self, config: impl Into<String>) -> Result<Self> {
        let config = config.into();
        validate_identifier("text search configuration", &config, false)?;
        self.text_search = Some(config);
        Ok(self)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn vector_field(&self) -> &str {
        &self.vector_field
    }

    pub fn distance(&self) -> PgDistance {
        self.distance
    }

    pub fn text_search(&self) -> Option<&str> {
        self.text_search.as_deref()
    }

    fn limit(options: &QueryOptions) -> usize {
        options.max_items.unwrap_or(DEFAULT_LIMIT)
    }

    fn distance_expr(&self, field: &str) -> String {
        format!("({} {} :embedding)", field, self.distance.operator())
    }

    fn text_search_config(&self) -> Result<&str> {
        self.text_search.as_deref().ok_or_else(|| {
            StoreError::invalid_argument(format!(
                "Full-text search is not enabled for table \"{}\"",
                self.table
            ))
        })
    }

    fn tsvector(config: &str) -> String {
        format!("to_tsvector('{}', metadata->>'{}')", config, TEXT_KEY)
    }

    fn tsquery(config: &str) -> String {
        format!("plainto_tsquery('{}', :query)", config)
    }

    /// Nearest neighbours by distance, closest first.
    pub fn vector_query(&self, query: &VectorQuery, options: &QueryOptions) -> Statement {
        let distance = self.distance_expr(&self.vector_field);

        let mut conditions = Vec::new();
        if query.threshold().is_some() {
            conditions.push(format!("{} <= :maxScore", distance));
        }
        if options.where_clause.is_some() {
            conditions.push(if conditions.is_empty() {
                CALLER_CLAUSE.to_string()
            } else {
                format!("({})", CALLER_CLAUSE)
            });
        }

        let sql = format!(
            "SELECT id, {field} AS embedding, metadata, {distance} AS score
             FROM {table}
             {where_sql}
             ORDER BY score ASC
             LIMIT {limit}",
            field = self.vector_field,
            distance = distance,
            table = self.table,
            where_sql = where_sql(&conditions),
            limit = Self::limit(options),
        );

        let mut statement = Statement::with_clause(sql, options.where_clause.as_deref())
            .bind("embedding", query.vector().clone());
        statement.params.extend(options.params.iter().cloned());
        if let Some(threshold) = query.threshold() {
            statement = statement.bind("maxScore", threshold);
        }
        statement
    }

    /// Full-text match on the document text, best rank first.
    pub fn text_query(&self, query: &TextQuery, options: &QueryOptions) -> Result<Statement> {
        let config = self.text_search_config()?;
        let terms = joined_terms(query.texts())?;

        let mut conditions = vec![format!("{} @@ {}", Self::tsvector(config), Self::tsquery(config))];
        if options.where_clause.is_some() {
            conditions.push(format!("({})", CALLER_CLAUSE));
        }

        let sql = format!(
            "SELECT id, {field} AS embedding, metadata,
                    ts_rank({tsvector}, {tsquery}) AS score
             FROM {table}
             {where_sql}
             ORDER BY score DESC
             LIMIT {limit}",
            field = self.vector_field,
            tsvector = Self::tsvector(config),
            tsquery = Self::tsquery(config),
            table = self.table,
            where_sql = where_sql(&conditions),
            limit = Self::limit(options),
        );

        let mut statement =
            Statement::with_clause(sql, options.where_clause.as_deref()).bind("query", terms);
        statement.params.extend(options.params.iter().cloned());
        Ok(statement)
    }

    /// Weighted sum of `1 / (1 + distance)` and the text rank, best first.
    pub fn hybrid_query(&self, query: &HybridQuery, options: &QueryOptions) -> Result<Statement> {
        let config = self.text_search_config()?;
        let terms = joined_terms(query.texts())?;

        if self.distance == PgDistance::InnerProduct {
            return Err(StoreError::invalid_argument(
                "Hybrid queries need a non-negative distance; inner product is not supported",
            ));
        }

        let caller_where = match &options.where_clause {
            Some(_) => format!("WHERE {}", CALLER_CLAUSE),
            None => String::new(),
        };

        let sql = format!(
            "WITH vector_scores AS (
                SELECT id, {field}, metadata, {distance} AS distance
                FROM {table}
                {caller_where}
             ),
             text_scores AS (
                SELECT id, ts_rank({tsvector}, {tsquery}) AS rank
                FROM {table}
                WHERE {tsvector} @@ {tsquery}
             )
             SELECT v.id, v.{field} AS embedding, v.metadata,
                    (:semanticRatio * (1 / (1 + v.distance)) + :textRatio * COALESCE(t.rank, 0)) AS score
             FROM vector_scores v
             LEFT JOIN text_scores t ON t.id = v.id
             ORDER BY score DESC
             LIMIT {limit}",
            field = self.vector_field,
            distance = self.distance_expr(&self.vector_field),
            table = self.table,
            caller_where = caller_where,
            tsvector = Self::tsvector(config),
            tsquery = Self::tsquery(config),
            limit = Self::limit(options),
        );

        let mut statement = Statement::with_clause(sql, options.where_clause.as_deref())
            .bind("embedding", query.vector().clone())
            .bind("query", terms)
            .bind("semanticRatio", query.semantic_ratio())
            .bind("textRatio", query.text_ratio());
        statement.params.extend(options.params.iter().cloned());
        Ok(statement)
    }

    /// Extension, table and index creation, in execution order.
    pub fn setup(&self, options: &SetupOptions) -> Result<Vec<Statement>> {
        let vector_type = options.vector_type.as_deref().unwrap_or(DEFAULT_VECTOR_TYPE);
        let vector_size = options.vector_size.unwrap_or(DEFAULT_VECTOR_SIZE);
        let index_method = options.index_method.as_deref().unwrap_or(DEFAULT_INDEX_METHOD);
        let index_opclass = options.index_opclass.as_deref().unwrap_or(DEFAULT_INDEX_OPCLASS);
        validate_identifier("vector type", vector_type, false)?;
        validate_identifier("index method", index_method, false)?;
        validate_identifier("index operator class", index_opclass, false)?;
        if vector_size == 0 {
            return Err(StoreError::invalid_argument("Vector size must be positive"));
        }
        let index_name = format!("{}_{}_idx", self.table.replace('.', "_"), self.vector_field);

        Ok(vec![
            Statement::new("CREATE EXTENSION IF NOT EXISTS vector"),
            Statement::new(format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    metadata JSONB,
                    {field} {vector_type}({vector_size}) NOT NULL
                 )",
                table = self.table,
                field = self.vector_field,
                vector_type = vector_type,
                vector_size = vector_size,
            )),
            Statement::new(format!(
                "CREATE INDEX IF NOT EXISTS {index_name} ON {table} USING {index_method} ({field} {index_opclass})",
                index_name = index_name,
                table = self.table,
                index_method = index_method,
                field = self.vector_field,
                index_opclass = index_opclass,
            )),
        ])
    }

    /// Upsert one document.
    pub fn insert(&self, document: &VectorDocument) -> Result<Statement> {
        let metadata = serde_json::to_value(&document.metadata)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let sql = format!(
            "INSERT INTO {table} (id, metadata, {field})
             VALUES (:id, :metadata, :vector)
             ON CONFLICT (id) DO UPDATE SET metadata = EXCLUDED.metadata, {field} = EXCLUDED.{field}",
            table = self.table,
            field = self.vector_field,
        );

        Ok(Statement::new(sql)
            .bind("id", document.id.as_str())
            .bind("metadata", metadata)
            .bind("vector", document.vector.clone()))
    }

    /// Delete by id; `None` when there is nothing to delete.
    pub fn delete(&self, ids: &[String]) -> Option<Statement> {
        if ids.is_empty() {
            return None;
        }

        let placeholders: Vec<String> = (0..ids.len()).map(|i| format!(":id{}", i)).collect();
        let sql = format!("DELETE FROM {} WHERE id IN ({})", self.table, placeholders.join(", "));

        Some(
            ids.iter()
                .enumerate()
                .fold(Statement::new(sql), |stmt, (i, id)| stmt.bind(format!("id{}", i), id.as_str())),
        )
    }

    pub fn drop_table(&self) -> Statement {
        Statement::new(format!("DROP TABLE IF EXISTS {}", self.table))
    }
}

fn where_sql(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

fn joined_terms(texts: &[String]) -> Result<String> {
    let terms: Vec<&str> = texts.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect();
    if terms.is_empty() {
        return Err(StoreError::invalid_argument(
            "A text query needs at least one non-empty term",
        ));
    }
    Ok(terms.join(" "))
}
