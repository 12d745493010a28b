pub mod benchmark;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use benchmark::{BenchmarkReport, QueryBenchmark, BENCHMARK_LIMIT, QUERIES};
use kvsearch_core::{Delay, KvStore, LoaderState, RecordPage, SearchEngine, SearchError, SearchResults, TokioDelay};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const ENDPOINTS: [&str; 4] = ["/health", "/search", "/all-records", "/benchmark"];

pub struct AppState<S: KvStore, D = TokioDelay> {
    pub engine: Arc<SearchEngine<S, D>>,
    /// Backend name reported in every response.
    pub database: Arc<str>,
    pub started: Instant,
}

impl<S: KvStore, D> Clone for AppState<S, D> {
    fn clone(&self) -> Self {
        Self { engine: self.engine.clone(), database: self.database.clone(), started: self.started }
    }
}

impl<S: KvStore, D> AppState<S, D> {
    pub fn new(engine: SearchEngine<S, D>, database: impl Into<Arc<str>>) -> Self {
        Self { engine: Arc::new(engine), database: database.into(), started: Instant::now() }
    }
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Deserialize)]
pub struct RecordParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

#[derive(Deserialize)]
pub struct BenchmarkParams {
    pub iterations: Option<usize>,
}

fn default_limit() -> usize { 10 }

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: String,
    pub timestamp: String,
    pub uptime: String,
    pub state: LoaderState,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    #[serde(flatten)]
    pub found: SearchResults,
    pub duration: String,
    pub database: String,
}

#[derive(Serialize)]
pub struct RecordsResponse {
    #[serde(flatten)]
    pub page: RecordPage,
    pub duration: String,
    pub database: String,
}

#[derive(Serialize)]
pub struct BenchmarkResponse {
    #[serde(flatten)]
    pub report: BenchmarkReport,
    pub database: String,
}

pub enum ApiError {
    BadRequest(&'static str),
    Engine { context: &'static str, source: SearchError },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response(),
            ApiError::Engine { source: SearchError::NotInitialized, .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "Search engine not initialized" })),
            )
                .into_response(),
            ApiError::Engine { context, source } => {
                tracing::error!(error = %source, "{context}");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": context, "details": source.to_string() })))
                    .into_response()
            }
        }
    }
}

fn fail(context: &'static str) -> impl FnOnce(SearchError) -> ApiError {
    move |source| ApiError::Engine { context, source }
}

fn format_ms(elapsed: Duration) -> String {
    format!("{:.3}ms", elapsed.as_secs_f64() * 1000.0)
}

/// CORS origins come from `CORS_ALLOW_ORIGIN` (comma-separated); any origin is allowed when it is
/// unset or holds nothing parseable.
fn cors_layer() -> CorsLayer {
    let origins: Vec<_> = std::env::var("CORS_ALLOW_ORIGIN")
        .map(|val| val.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

pub fn build_app<S: KvStore, D: Delay>(state: AppState<S, D>) -> Router {
    Router::new()
        .route("/health", get(health_handler::<S, D>))
        .route("/search", get(search_handler::<S, D>))
        .route("/all-records", get(all_records_handler::<S, D>))
        .route("/benchmark", get(benchmark_handler::<S, D>))
        .fallback(not_found)
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

pub async fn health_handler<S: KvStore, D: Delay>(State(state): State<AppState<S, D>>) -> Json<HealthResponse> {
    let ready = state.engine.is_ready();
    Json(HealthResponse {
        status: if ready { "healthy" } else { "unavailable" },
        database: state.database.to_string(),
        timestamp: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        uptime: format!("{}s", state.started.elapsed().as_secs()),
        state: state.engine.state(),
    })
}

pub async fn search_handler<S: KvStore, D: Delay>(
    State(state): State<AppState<S, D>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = match params.q {
        Some(q) if !q.trim().is_empty() => q,
        _ => return Err(ApiError::BadRequest("Query parameter \"q\" is required and must be a non-empty string")),
    };
    let start = Instant::now();
    let found = state.engine.search(&query, params.limit).await.map_err(fail("Search failed"))?;
    Ok(Json(SearchResponse { query, found, duration: format_ms(start.elapsed()), database: state.database.to_string() }))
}

pub async fn all_records_handler<S: KvStore, D: Delay>(
    State(state): State<AppState<S, D>>,
    Query(params): Query<RecordParams>,
) -> Result<Json<RecordsResponse>, ApiError> {
    let start = Instant::now();
    let page = state
        .engine
        .all_records(params.limit, params.offset)
        .await
        .map_err(fail("Failed to fetch records"))?;
    Ok(Json(RecordsResponse { page, duration: format_ms(start.elapsed()), database: state.database.to_string() }))
}

pub async fn benchmark_handler<S: KvStore, D: Delay>(
    State(state): State<AppState<S, D>>,
    Query(params): Query<BenchmarkParams>,
) -> Result<Json<BenchmarkResponse>, ApiError> {
    let iterations = benchmark::iterations(params.iterations);
    let mut benchmarks = Vec::with_capacity(QUERIES.len());
    for query in QUERIES {
        let mut durations = Vec::with_capacity(iterations);
        let mut result_count = 0;
        for _ in 0..iterations {
            let start = Instant::now();
            let found = state.engine.search(query.query, BENCHMARK_LIMIT).await.map_err(fail("Benchmark failed"))?;
            durations.push(start.elapsed());
            result_count = found.total;
        }
        benchmarks.push(QueryBenchmark::new(*query, result_count, &durations));
    }
    let report = BenchmarkReport::new(benchmarks);
    tracing::info!(iterations, average_ms = report.average_duration, "benchmark complete");
    Ok(Json(BenchmarkResponse { report, database: state.database.to_string() }))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Endpoint not found", "availableEndpoints": ENDPOINTS })))
}
