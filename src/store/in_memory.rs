//! In-memory store: linear scan over a document list

use crate::distance::{DistanceCalculator, DistanceStrategy};
use crate::document::VectorDocument;
use crate::error::{Result, StoreError};
use crate::query::{HybridQuery, Query, QueryKind, QueryOptions, TextQuery, VectorQuery};
use crate::store::{ensure_supported, ManagedStore, SetupOptions, Store};
use tracing::debug;

/// Documents kept in insertion order and scored on every query.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    documents: Vec<VectorDocument>,
    calculator: DistanceCalculator,
}

impl InMemoryStore {
    /// Create an empty store using the given distance strategy.
    pub fn new(strategy: DistanceStrategy) -> Self {
        Self::with_calculator(DistanceCalculator::new(strategy))
    }

    pub fn with_calculator(calculator: DistanceCalculator) -> Self {
        Self {
            documents: Vec::new(),
            calculator,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[VectorDocument] {
        &self.documents
    }

    pub fn strategy(&self) -> DistanceStrategy {
        self.calculator.strategy()
    }

    /// Dimension shared by the stored vectors, if any are stored.
    pub fn dimension(&self) -> Option<usize> {
        self.documents.first().map(|d| d.vector.dimension())
    }

    pub(crate) fn clear(&mut self) {
        self.documents.clear();
    }

    fn check_options(options: &QueryOptions) -> Result<()> {
        if options.where_clause.is_some() || !options.params.is_empty() {
            return Err(StoreError::invalid_argument(
                "The in-memory store does not support SQL conditions",
            ));
        }
        Ok(())
    }

    fn candidates<'a>(&'a self, options: &'a QueryOptions) -> impl Iterator<Item = &'a VectorDocument> {
        self.documents
            .iter()
            .filter(move |&doc| options.filter.as_ref().map_or(true, |keep| keep(doc)))
    }

    fn query_vector(&self, query: &VectorQuery, options: &QueryOptions) -> Result<Vec<VectorDocument>> {
        let mut results = self
            .calculator
            .calculate(self.candidates(options), query.vector(), None)?;

        if let Some(threshold) = query.threshold() {
            results.retain(|doc| doc.score.is_some_and(|distance| distance <= threshold));
        }
        truncate(&mut results, options.max_items);
        Ok(results)
    }

    fn query_text(&self, query: &TextQuery, options: &QueryOptions) -> Result<Vec<VectorDocument>> {
        let terms = search_terms(query.texts())?;

        let mut results: Vec<VectorDocument> = self
            .candidates(options)
            .filter_map(|doc| {
                let score = text_score(doc, &terms);
                (score > 0.0).then(|| doc.clone().with_score(score))
            })
            .collect();

        truncate(&mut results, options.max_items);
        Ok(results)
    }

    fn query_hybrid(&self, query: &HybridQuery, options: &QueryOptions) -> Result<Vec<VectorDocument>> {
        let terms = search_terms(query.texts())?;

        let mut scored = self
            .candidates(options)
            .map(|doc| {
                let distance = self.calculator.distance(&doc.vector, query.vector())?;
                let vector_score = 1.0 / (1.0 + distance);
                let combined = query.semantic_ratio() * vector_score
                    + query.text_ratio() * text_score(doc, &terms);
                Ok((doc, combined))
            })
            .collect::<Result<Vec<_>>>()?;

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut results: Vec<VectorDocument> = scored
            .into_iter()
            .map(|(doc, score)| doc.clone().with_score(score))
            .collect();
        truncate(&mut results, options.max_items);
        Ok(results)
    }
}

/// Lower-cased, non-blank search terms.
fn search_terms(texts: &[String]) -> Result<Vec<String>> {
    let terms: Vec<String> = texts
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if terms.is_empty() {
        return Err(StoreError::invalid_argument(
            "A text query needs at least one non-empty term",
        ));
    }
    Ok(terms)
}

/// Fraction of `terms` found (case-insensitively) in the document text.
fn text_score(doc: &VectorDocument, terms: &[String]) -> f32 {
    let Some(text) = doc.metadata.text() else {
        return 0.0;
    };
    let text = text.to_lowercase();
    let matched = terms.iter().filter(|term| text.contains(term.as_str())).count();
    matched as f32 / terms.len() as f32
}

fn truncate(results: &mut Vec<VectorDocument>, max_items: Option<usize>) {
    if let Some(max_items) = max_items {
        results.truncate(max_items);
    }
}

impl Store for InMemoryStore {
    fn name(&self) -> &'static str {
        "in_memory"
    }

    fn add(&mut self, documents: Vec<VectorDocument>) -> Result<()> {
        let expected = self
            .dimension()
            .or_else(|| documents.first().map(|d| d.vector.dimension()));

        if let Some(expected) = expected {
            if let Some(bad) = documents.iter().find(|d| d.vector.dimension() != expected) {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: bad.vector.dimension(),
                });
            }
        }

        debug!(count = documents.len(), "adding documents to in-memory store");
        self.documents.extend(documents);
        Ok(())
    }

    fn remove(&mut self, ids: &[String]) -> Result<usize> {
        let before = self.documents.len();
        self.documents.retain(|doc| !ids.contains(&doc.id));
        let removed = before - self.documents.len();
        debug!(removed, "removed documents from in-memory store");
        Ok(removed)
    }

    fn query(&self, query: &Query, options: &QueryOptions) -> Result<Vec<VectorDocument>> {
        ensure_supported(self, query)?;
        Self::check_options(options)?;

        match query {
            Query::Vector(q) => self.query_vector(q, options),
            Query::Text(q) => self.query_text(q, options),
            Query::Hybrid(q) => self.query_hybrid(q, options),
        }
    }

    fn supports(&self, kind: QueryKind) -> bool {
        matches!(kind, QueryKind::Vector | QueryKind::Text | QueryKind::Hybrid)
    }
}

impl ManagedStore for InMemoryStore {
    fn setup(&mut self, options: &SetupOptions) -> Result<()> {
        if !options.is_empty() {
            return Err(StoreError::invalid_argument("No supported options"));
        }
        Ok(())
    }

    fn drop_store(&mut self) -> Result<()> {
        self.clear();
        Ok(())
    }
}
