//! Postgres/pgvector backend: literal SQL statements and a thin store adapter
//! running them through a [`Connection`], normally a [`PgPoolConnection`].

pub mod builder;
pub mod driver;
pub mod store;

pub use builder::{SqlBuilder, DEFAULT_LIMIT};
pub use driver::{PgPoolConnection, DEFAULT_MAX_CONNECTIONS};
pub use store::{Connection, PostgresStore, Row};

use crate::error::{Result, StoreError};
use crate::vector::Vector;
use serde::{Deserialize, Serialize};

/// pgvector distance operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PgDistance {
    /// `<->`
    #[default]
    L2,
    /// `<=>`
    Cosine,
    /// `<#>` (negative inner product)
    InnerProduct,
    /// `<+>`
    L1,
}

impl PgDistance {
    pub fn operator(&self) -> &'static str {
        match self {
            PgDistance::L2 => "<->",
            PgDistance::Cosine => "<=>",
            PgDistance::InnerProduct => "<#>",
            PgDistance::L1 => "<+>",
        }
    }
}

/// A bound statement parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Text(String),
    Float(f64),
    Integer(i64),
    /// Sent in pgvector text form, e.g. `[1,2,3]`
    Vector(Vector),
    Json(serde_json::Value),
}

impl SqlValue {
    /// Textual form handed to drivers that bind everything as text.
    pub fn to_sql_text(&self) -> String {
        match self {
            SqlValue::Text(s) => s.clone(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Integer(i) => i.to_string(),
            SqlValue::Vector(v) => v.to_pgvector(),
            SqlValue::Json(j) => j.to_string(),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<f64> for SqlValue {
    fn from(f: f64) -> Self {
        SqlValue::Float(f)
    }
}

impl From<f32> for SqlValue {
    fn from(f: f32) -> Self {
        SqlValue::Float(f64::from(f))
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        SqlValue::Integer(i)
    }
}

impl From<i32> for SqlValue {
    fn from(i: i32) -> Self {
        SqlValue::Integer(i64::from(i))
    }
}

impl From<Vector> for SqlValue {
    fn from(v: Vector) -> Self {
        SqlValue::Vector(v)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(j: serde_json::Value) -> Self {
        SqlValue::Json(j)
    }
}

/// SQL text plus its named (`:name`) parameters, in binding order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<(String, SqlValue)>,
}

impl Statement {
    pub fn new(sql: impl AsRef<str>) -> Self {
        Self {
            sql: normalize_whitespace(sql.as_ref()),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Normalize `template`, then put `clause` verbatim where the template
    /// holds [`CALLER_CLAUSE`]. Caller SQL keeps its own whitespace.
    pub(crate) fn with_clause(template: impl AsRef<str>, clause: Option<&str>) -> Self {
        let mut statement = Self::new(template);
        if let Some(clause) = clause {
            statement.sql = statement.sql.replacen(CALLER_CLAUSE, clause, 1);
        }
        statement
    }

    pub fn param(&self, name: &str) -> Option<&SqlValue> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Stands in for a caller `where_clause` while a template is normalized.
pub(crate) const CALLER_CLAUSE: &str = "__caller_clause__";

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_whitespace(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Accept `name` or `schema.name` made of `[A-Za-z_][A-Za-z0-9_]*` parts.
pub(crate) fn validate_identifier(kind: &str, name: &str, allow_qualified: bool) -> Result<()> {
    let parts: Vec<&str> = name.split('.').collect();
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    let shape_ok = parts.len() == 1 || (allow_qualified && parts.len() == 2);
    if shape_ok && parts.iter().all(|p| valid_part(p)) {
        Ok(())
    } else {
        Err(StoreError::invalid_argument(format!("Invalid {} \"{}\"", kind, name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operators() {
        assert_eq!(PgDistance::default().operator(), "<->");
        assert_eq!(PgDistance::Cosine.operator(), "<=>");
        assert_eq!(PgDistance::InnerProduct.operator(), "<#>");
        assert_eq!(PgDistance::L1.operator(), "<+>");
    }

    #[test]
    fn test_identifier_validation() {
        assert!(validate_identifier("table", "embeddings_table", true).is_ok());
        assert!(validate_identifier("table", "public.embeddings", true).is_ok());
        assert!(validate_identifier("column", "public.embedding", false).is_err());
        assert!(validate_identifier("table", "1table", true).is_err());
        assert!(validate_identifier("table", "docs; DROP TABLE x", true).is_err());
        assert!(validate_identifier("table", "", true).is_err());
        assert!(validate_identifier("table", "a.b.c", true).is_err());
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  SELECT id\n   FROM t \n"), "SELECT id FROM t");
    }

    #[test]
    fn test_clause_is_spliced_verbatim() {
        let statement = Statement::with_clause(
            format!("SELECT id\n   FROM t\n   WHERE {}", CALLER_CLAUSE),
            Some("name = 'New  York'"),
        );
        assert_eq!(statement.sql, "SELECT id FROM t WHERE name = 'New  York'");

        let statement = Statement::with_clause("SELECT  id FROM t", None);
        assert_eq!(statement.sql, "SELECT id FROM t");
    }

    #[test]
    fn test_sql_text_values() {
        assert_eq!(SqlValue::from(Vector::new(vec![1.0, 0.5])).to_sql_text(), "[1,0.5]");
        assert_eq!(SqlValue::from(3i64).to_sql_text(), "3");
        assert_eq!(SqlValue::from(serde_json::json!({"a": 1})).to_sql_text(), "{\"a\":1}");
    }
}
