//! Documents stored in a vector store and their metadata

use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Metadata key holding the raw text a document was embedded from.
pub const TEXT_KEY: &str = "_text";

/// Ordered, string-keyed metadata attached to a document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    fields: BTreeMap<String, Value>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with(TEXT_KEY, text.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// The raw text stored under [`TEXT_KEY`], if it is a string.
    pub fn text(&self) -> Option<&str> {
        self.fields.get(TEXT_KEY).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Resolve a dot/bracket path such as `author.name` or `tags[1]`.
    ///
    /// Numeric brackets index into arrays, anything else inside brackets is
    /// treated as an object key. Returns `None` as soon as a step misses.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut steps = parse_path(path)?.into_iter();
        let first = match steps.next()? {
            PathStep::Key(key) => self.fields.get(key)?,
            PathStep::Index(_) => return None,
        };
        steps.try_fold(first, |value, step| match step {
            PathStep::Key(key) => value.as_object()?.get(key),
            PathStep::Index(i) => value.as_array()?.get(i),
        })
    }
}

impl From<BTreeMap<String, Value>> for Metadata {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }
}

impl FromIterator<(String, Value)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, PartialEq)]
enum PathStep<'a> {
    Key(&'a str),
    Index(usize),
}

fn parse_path(path: &str) -> Option<Vec<PathStep<'_>>> {
    let mut steps = Vec::new();
    for segment in path.split('.') {
        let (head, mut rest) = match segment.find('[') {
            Some(pos) => segment.split_at(pos),
            None => (segment, ""),
        };
        if !head.is_empty() {
            steps.push(PathStep::Key(head));
        } else if rest.is_empty() {
            return None;
        }
        while !rest.is_empty() {
            let close = rest.find(']')?;
            let inner = rest[1..close].trim_matches(|c| c == '\'' || c == '"');
            steps.push(match inner.parse::<usize>() {
                Ok(i) => PathStep::Index(i),
                Err(_) => PathStep::Key(inner),
            });
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return None;
            }
        }
    }
    Some(steps)
}

/// A document held by a vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDocument {
    pub id: String,
    pub vector: Vector,
    #[serde(default)]
    pub metadata: Metadata,
    /// Set on query results only; the meaning depends on the query shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl VectorDocument {
    pub fn new(id: impl Into<String>, vector: Vector, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            vector,
            metadata,
            score: None,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}
