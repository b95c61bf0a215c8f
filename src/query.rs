//! Query shapes accepted by the stores

use crate::document::VectorDocument;
use crate::error::{Result, StoreError};
use crate::postgres::SqlValue;
use crate::vector::Vector;
use serde::Serialize;
use std::fmt;

/// Nearest-neighbour query against a target vector.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    vector: Vector,
    threshold: Option<f32>,
}

impl VectorQuery {
    pub fn new(vector: Vector) -> Self {
        Self {
            vector,
            threshold: None,
        }
    }

    /// Only accept results whose distance is at most `threshold`.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn vector(&self) -> &Vector {
        &self.vector
    }

    pub fn threshold(&self) -> Option<f32> {
        self.threshold
    }
}

/// Full-text query; a document matches when any of the terms matches.
#[derive(Debug, Clone, PartialEq)]
pub struct TextQuery {
    texts: Vec<String>,
}

impl TextQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            texts: vec![text.into()],
        }
    }

    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            texts: texts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }
}

/// Weighted combination of a vector query and a text query.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridQuery {
    vector: Vector,
    texts: Vec<String>,
    semantic_ratio: f32,
}

impl HybridQuery {
    /// `semantic_ratio` weights the vector component; the text component gets
    /// `1 - semantic_ratio`. Must lie in `[0, 1]`.
    pub fn new<I, S>(vector: Vector, texts: I, semantic_ratio: f32) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !(0.0..=1.0).contains(&semantic_ratio) {
            return Err(StoreError::invalid_argument(format!(
                "Semantic ratio must be between 0.0 and 1.0, got {}",
                semantic_ratio
            )));
        }
        Ok(Self {
            vector,
            texts: texts.into_iter().map(Into::into).collect(),
            semantic_ratio,
        })
    }

    pub fn vector(&self) -> &Vector {
        &self.vector
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn semantic_ratio(&self) -> f32 {
        self.semantic_ratio
    }

    pub fn text_ratio(&self) -> f32 {
        1.0 - self.semantic_ratio
    }
}

/// Any query a store may be asked to run.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Vector(VectorQuery),
    Text(TextQuery),
    Hybrid(HybridQuery),
}

impl Query {
    pub fn kind(&self) -> QueryKind {
        match self {
            Query::Vector(_) => QueryKind::Vector,
            Query::Text(_) => QueryKind::Text,
            Query::Hybrid(_) => QueryKind::Hybrid,
        }
    }
}

impl From<VectorQuery> for Query {
    fn from(q: VectorQuery) -> Self {
        Query::Vector(q)
    }
}

impl From<TextQuery> for Query {
    fn from(q: TextQuery) -> Self {
        Query::Text(q)
    }
}

impl From<HybridQuery> for Query {
    fn from(q: HybridQuery) -> Self {
        Query::Hybrid(q)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Vector,
    Text,
    Hybrid,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryKind::Vector => "vector",
            QueryKind::Text => "text",
            QueryKind::Hybrid => "hybrid",
        })
    }
}

/// Caller predicate applied to candidate documents before ranking.
pub type Filter = Box<dyn Fn(&VectorDocument) -> bool + Send + Sync>;

/// Per-call options. Stores reject the fields they cannot honour.
#[derive(Default)]
pub struct QueryOptions {
    /// Maximum number of results; `None` lets the store apply its default.
    pub max_items: Option<usize>,
    /// In-process predicate (in-memory and cache stores).
    pub filter: Option<Filter>,
    /// Extra SQL condition (SQL stores).
    pub where_clause: Option<String>,
    /// Named parameters referenced by `where_clause`.
    pub params: Vec<(String, SqlValue)>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&VectorDocument) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    pub fn where_clause(mut self, clause: impl Into<String>) -> Self {
        self.where_clause = Some(clause.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }
}

impl fmt::Debug for QueryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryOptions")
            .field("max_items", &self.max_items)
            .field("filter", &self.filter.as_ref().map(|_| "<fn>"))
            .field("where_clause", &self.where_clause)
            .field("params", &self.params)
            .finish()
    }
}
