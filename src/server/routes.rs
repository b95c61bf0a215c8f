//! HTTP route handlers for the store API.

use crate::config::StoreRegistry;
use crate::document::VectorDocument;
use crate::error::StoreError;
use crate::query::{HybridQuery, Query, QueryKind, QueryOptions, TextQuery, VectorQuery};
use crate::server::AppState;
use crate::vector::Vector;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tracing::{debug, warn};

const DEFAULT_SEMANTIC_RATIO: f32 = 0.5;

// --- Request/Response types ---

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryRequest {
    pub vector: Option<Vec<f32>>,
    pub texts: Option<Vec<String>>,
    pub semantic_ratio: Option<f32>,
    pub threshold: Option<f32>,
    pub max_items: Option<usize>,
    /// Metadata path -> required value; every entry must match.
    pub filter: Option<BTreeMap<String, Value>>,
}

impl QueryRequest {
    /// vector + texts is hybrid, vector alone is a vector query, texts alone
    /// is a text query.
    pub fn to_query(&self) -> Result<Query, StoreError> {
        match (&self.vector, &self.texts) {
            (Some(vector), Some(texts)) => Ok(HybridQuery::new(
                Vector::new(vector.clone()),
                texts.iter().cloned(),
                self.semantic_ratio.unwrap_or(DEFAULT_SEMANTIC_RATIO),
            )?
            .into()),
            (Some(vector), None) => {
                let mut query = VectorQuery::new(Vector::new(vector.clone()));
                if let Some(threshold) = self.threshold {
                    query = query.with_threshold(threshold);
                }
                Ok(query.into())
            }
            (None, Some(texts)) => Ok(TextQuery::with_texts(texts.iter().cloned()).into()),
            (None, None) => Err(StoreError::InvalidArgument(
                "A query needs a vector, texts, or both".to_string(),
            )),
        }
    }

    pub fn to_options(&self) -> QueryOptions {
        let mut options = QueryOptions::new();
        options.max_items = self.max_items;
        if let Some(filter) = self.filter.clone() {
            options = options.filter(move |doc| {
                filter
                    .iter()
                    .all(|(path, expected)| doc.metadata.lookup(path) == Some(expected))
            });
        }
        options
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub stores: Vec<String>,
    pub default_store: String,
}

#[derive(Serialize)]
pub struct MetricsResponse {
    pub total_queries: u64,
    pub vector_queries: u64,
    pub text_queries: u64,
    pub hybrid_queries: u64,
    pub documents_added: u64,
    pub documents_removed: u64,
    pub avg_query_latency_us: f64,
    pub p50_query_latency_us: f64,
    pub p95_query_latency_us: f64,
    pub p99_query_latency_us: f64,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

fn store_error(e: StoreError) -> ApiError {
    let status = match &e {
        StoreError::DimensionMismatch { .. } | StoreError::InvalidArgument(_) => {
            StatusCode::BAD_REQUEST
        }
        StoreError::UnsupportedQuery { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => {
            warn!(error = %e, "store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, e.to_string())
}

fn unknown_store(name: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("Store not found: {}", name))
}

fn read_registry(state: &AppState) -> Result<RwLockReadGuard<'_, StoreRegistry>, ApiError> {
    state
        .registry
        .read()
        .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Lock poisoned"))
}

fn write_registry(state: &AppState) -> Result<RwLockWriteGuard<'_, StoreRegistry>, ApiError> {
    state
        .registry
        .write()
        .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Lock poisoned"))
}

// --- Router ---

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/stores/:name/documents", post(add_documents))
        .route("/stores/:name/documents/:id", delete(remove_document))
        .route("/stores/:name/query", post(query_store))
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

// --- Handlers ---

async fn add_documents(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(documents): Json<Vec<VectorDocument>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let count = documents.len();
    {
        let mut registry = write_registry(&state)?;
        let store = registry.get_mut(&name).ok_or_else(|| unknown_store(&name))?;
        store.add(documents).map_err(store_error)?;
    }

    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_added(count);
    }
    debug!(store = %name, count, "documents added");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"store": name, "added": count})),
    ))
}

async fn remove_document(
    State(state): State<Arc<AppState>>,
    Path((name, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let removed = {
        let mut registry = write_registry(&state)?;
        let store = registry.get_mut(&name).ok_or_else(|| unknown_store(&name))?;
        store.remove(std::slice::from_ref(&id)).map_err(store_error)?
    };

    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_removed(removed);
    }

    Ok(Json(serde_json::json!({"store": name, "id": id, "removed": removed})))
}

async fn query_store(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<Vec<VectorDocument>>, ApiError> {
    let query = req.to_query().map_err(store_error)?;
    let options = req.to_options();

    let start = Instant::now();
    let results = {
        let registry = read_registry(&state)?;
        let store = registry.get(&name).ok_or_else(|| unknown_store(&name))?;
        store.query(&query, &options).map_err(store_error)?
    };
    let elapsed = start.elapsed();

    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_query(query.kind(), elapsed);
    }

    Ok(Json(results))
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, ApiError> {
    let registry = read_registry(&state)?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        stores: registry.names().into_iter().map(String::from).collect(),
        default_store: registry.default_store_name().to_string(),
    }))
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Result<Json<MetricsResponse>, ApiError> {
    let metrics = state
        .metrics
        .read()
        .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Lock poisoned"))?;

    Ok(Json(MetricsResponse {
        total_queries: metrics.total_queries(),
        vector_queries: metrics.queries(QueryKind::Vector),
        text_queries: metrics.queries(QueryKind::Text),
        hybrid_queries: metrics.queries(QueryKind::Hybrid),
        documents_added: metrics.documents_added(),
        documents_removed: metrics.documents_removed(),
        avg_query_latency_us: metrics.avg_query_latency_us(),
        p50_query_latency_us: metrics.percentile_query_latency_us(50.0),
        p95_query_latency_us: metrics.percentile_query_latency_us(95.0),
        p99_query_latency_us: metrics.percentile_query_latency_us(99.0),
    }))
}
