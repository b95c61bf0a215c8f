//! [`Connection`] backed by an `sqlx` Postgres pool.
//!
//! Statements carry `:name` placeholders; Postgres wants `$n`. The
//! translation happens here so the builder output stays driver-neutral.

use crate::error::{DriverError, Result, StoreError};
use crate::postgres::{Connection, Row, SqlValue, Statement};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{Postgres, Row as _};
use std::future::Future;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::debug;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Pooled Postgres connection.
///
/// [`Connection`] is synchronous, so each call blocks the current worker
/// until the pool answers. That needs a multi-threaded tokio runtime or no
/// runtime at all on the calling thread.
pub struct PgPoolConnection {
    pool: PgPool,
    handle: Handle,
}

impl PgPoolConnection {
    /// Build a pool without opening a connection yet. Must be called from
    /// inside a tokio runtime; the pool's tasks live on it.
    pub fn connect_lazy(url: &str, max_connections: u32) -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| StoreError::Driver(Box::new(e)))?;
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(url)
            .map_err(|e| StoreError::Driver(Box::new(e)))?;
        Ok(Self { pool, handle })
    }

    fn block_on<F: Future>(&self, fut: F) -> std::result::Result<F::Output, DriverError> {
        match Handle::try_current() {
            Ok(current) if current.runtime_flavor() == RuntimeFlavor::CurrentThread => {
                Err("Postgres calls cannot block a current-thread runtime".into())
            }
            Ok(_) => Ok(tokio::task::block_in_place(|| self.handle.block_on(fut))),
            Err(_) => Ok(self.handle.block_on(fut)),
        }
    }
}

impl Connection for PgPoolConnection {
    fn execute(&self, statement: &Statement) -> std::result::Result<u64, DriverError> {
        let (sql, values) = to_positional(statement)?;
        debug!(sql = %sql, params = values.len(), "postgres execute");

        self.block_on(async {
            let result = bind_all(sqlx::query(&sql), &values).execute(&self.pool).await?;
            Ok::<_, DriverError>(result.rows_affected())
        })?
    }

    fn fetch(&self, statement: &Statement) -> std::result::Result<Vec<Row>, DriverError> {
        let (sql, values) = to_positional(statement)?;
        let sql = format!(
            "SELECT q.id::text AS id, q.embedding::text AS embedding, \
             q.metadata::text AS metadata, q.score::float8 AS score FROM ({}) AS q",
            sql
        );
        debug!(sql = %sql, params = values.len(), "postgres fetch");

        self.block_on(async {
            let rows = bind_all(sqlx::query(&sql), &values).fetch_all(&self.pool).await?;
            rows.iter()
                .map(|row| {
                    Ok(Row {
                        id: row.try_get("id")?,
                        embedding: row.try_get("embedding")?,
                        metadata: row.try_get::<Option<String>, _>("metadata")?.unwrap_or_default(),
                        score: row.try_get("score")?,
                    })
                })
                .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
                .map_err(DriverError::from)
        })?
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    values: &[&'q SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for value in values {
        query = match value {
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Integer(i) => query.bind(*i),
            SqlValue::Vector(_) | SqlValue::Json(_) => query.bind(value.to_sql_text()),
        };
    }
    query
}

/// Rewrite `:name` placeholders to `$n`, numbering names by first use.
/// Vector and JSON values are sent as text and cast in place. Quoted
/// literals and `::type` casts are left alone.
pub(crate) fn to_positional(
    statement: &Statement,
) -> std::result::Result<(String, Vec<&SqlValue>), DriverError> {
    let mut sql = String::with_capacity(statement.sql.len());
    let mut order: Vec<&str> = Vec::new();
    let mut values: Vec<&SqlValue> = Vec::new();
    let mut chars = statement.sql.char_indices().peekable();
    let mut in_quote = false;

    while let Some((i, c)) = chars.next() {
        if in_quote {
            in_quote = c != '\'';
            sql.push(c);
            continue;
        }
        match c {
            '\'' => {
                in_quote = true;
                sql.push(c);
            }
            ':' if matches!(chars.peek(), Some((_, ':'))) => {
                sql.push_str("::");
                chars.next();
            }
            ':' if matches!(chars.peek(), Some((_, n)) if n.is_ascii_alphabetic() || *n == '_') => {
                let start = i + 1;
                let mut end = start;
                while let Some(&(j, n)) = chars.peek() {
                    if !(n.is_ascii_alphanumeric() || n == '_') {
                        break;
                    }
                    end = j + n.len_utf8();
                    chars.next();
                }
                let name = &statement.sql[start..end];
                let value = statement
                    .param(name)
                    .ok_or_else(|| format!("No value bound for parameter :{}", name))?;

                let index = match order.iter().position(|n| *n == name) {
                    Some(index) => index + 1,
                    None => {
                        order.push(name);
                        values.push(value);
                        order.len()
                    }
                };
                sql.push_str(&format!("${}", index));
                match value {
                    SqlValue::Vector(_) => sql.push_str("::vector"),
                    SqlValue::Json(_) => sql.push_str("::jsonb"),
                    _ => {}
                }
            }
            _ => sql.push(c),
        }
    }

    Ok((sql, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postgres::SqlBuilder;
    use crate::query::{HybridQuery, QueryOptions};
    use crate::vector::Vector;
    use crate::{Metadata, VectorDocument};

    #[test]
    fn test_named_params_become_positional() {
        let stmt = Statement::new("SELECT * FROM t WHERE a = :a AND b > :b OR a = :a")
            .bind("a", "x")
            .bind("b", 2i64);
        let (sql, values) = to_positional(&stmt).unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE a = $1 AND b > $2 OR a = $1");
        assert_eq!(values, vec![&SqlValue::Text("x".into()), &SqlValue::Integer(2)]);
    }

    #[test]
    fn test_casts_and_literals_are_untouched() {
        let stmt = Statement::new("SELECT id::text FROM t WHERE metadata->>'k' = ':not_a_param' AND v = :v")
            .bind("v", 1.5f64);
        let (sql, values) = to_positional(&stmt).unwrap();
        assert_eq!(
            sql,
            "SELECT id::text FROM t WHERE metadata->>'k' = ':not_a_param' AND v = $1"
        );
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_vector_and_json_are_cast() {
        let builder = SqlBuilder::new("docs", "embedding").unwrap();
        let doc = VectorDocument::new("a", Vector::new(vec![1.0, 2.0]), Metadata::new().with_text("hi"));
        let statement = builder.insert(&doc).unwrap();
        let (sql, values) = to_positional(&statement).unwrap();

        assert!(sql.contains("VALUES ($1, $2::jsonb, $3::vector)"));
        assert_eq!(values[2].to_sql_text(), "[1,2]");
    }

    #[test]
    fn test_hybrid_statement_numbers_every_param() {
        let builder = SqlBuilder::new("docs", "embedding")
            .unwrap()
            .with_text_search("simple")
            .unwrap();
        let query = HybridQuery::new(Vector::new(vec![1.0, 0.0]), ["rust"], 0.7).unwrap();
        let statement = builder.hybrid_query(&query, &QueryOptions::new()).unwrap();
        let (sql, values) = to_positional(&statement).unwrap();

        assert!(!sql.contains(":semanticRatio"));
        assert!(sql.contains("$1::vector"));
        assert!(sql.contains("plainto_tsquery('simple', $2)"));
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn test_unbound_param_is_an_error() {
        let stmt = Statement::new("DELETE FROM t WHERE id = :id");
        let err = to_positional(&stmt).unwrap_err();
        assert!(err.to_string().contains(":id"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_bad_url_is_a_driver_error() {
        let result = PgPoolConnection::connect_lazy("not a url", DEFAULT_MAX_CONNECTIONS);
        assert!(matches!(result, Err(StoreError::Driver(_))));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_current_thread_runtime_is_refused() {
        let conn = PgPoolConnection::connect_lazy("postgres://localhost/ai_store", 1).unwrap();
        let err = conn.execute(&Statement::new("SELECT 1")).unwrap_err();
        assert!(err.to_string().contains("current-thread"));
    }
}
