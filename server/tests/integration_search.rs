use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use kvsearch_core::{Article, EngineConfig, MemoryStore, SearchEngine, SledStore, SyntheticCorpus};
use kvsearch_server::{build_app, AppState};
use serde_json::Value;
use tempfile::tempdir;
use tower::ServiceExt;

fn tiny_corpus() -> Vec<Article> {
    vec![
        Article::new("1", "Redis internals", "How the event loop works", "Ann Smith"),
        Article::new("2", "Postgres internals", "Pages and tuples", "Bob Jones"),
        Article::new("3", "Search basics", "Tokenize, index, rank", "Cat Brown"),
    ]
}

async fn seeded(store: MemoryStore) -> Router {
    let mut engine = SearchEngine::new(store, EngineConfig::default()).unwrap();
    engine.initialize(&tiny_corpus()).await.unwrap();
    build_app(AppState::new(engine, "memory"))
}

async fn call(app: Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

fn ids(json: &Value) -> Vec<&str> {
    json["results"].as_array().unwrap().iter().map(|r| r["id"].as_str().unwrap()).collect()
}

#[tokio::test]
async fn health_reports_ready_engine() {
    let app = seeded(MemoryStore::new()).await;
    let (status, json) = call(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["database"], "memory");
    assert_eq!(json["state"]["state"], "ready");
    assert!(json["uptime"].as_str().unwrap().ends_with('s'));
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let app = seeded(MemoryStore::new()).await;
    let (status, json) = call(app, "/search?q=internals&limit=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["query"], "internals");
    assert_eq!(json["total"], 2);
    assert_eq!(ids(&json), vec!["1", "2"]);
    assert!(json["duration"].as_str().unwrap().ends_with("ms"));
}

#[tokio::test]
async fn limit_defaults_and_zero_limit_counts() {
    let app = seeded(MemoryStore::new()).await;
    let (_, json) = call(app.clone(), "/search?q=internals&limit=0").await;
    assert_eq!(json["total"], 2);
    assert!(json["results"].as_array().unwrap().is_empty());

    let (_, json) = call(app, "/search?q=basics").await;
    assert_eq!(ids(&json), vec!["3"]);
}

#[tokio::test]
async fn missing_or_blank_query_is_rejected() {
    let app = seeded(MemoryStore::new()).await;
    let (status, json) = call(app.clone(), "/search").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("\"q\""));

    let (status, _) = call(app, "/search?q=%20%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn uninitialized_engine_is_unavailable() {
    let engine = SearchEngine::new(MemoryStore::new(), EngineConfig::default()).unwrap();
    let app = build_app(AppState::new(engine, "memory"));

    let (status, _) = call(app.clone(), "/search?q=redis").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let (status, _) = call(app.clone(), "/all-records").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, json) = call(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "unavailable");
    assert_eq!(json["state"]["state"], "idle");
}

#[tokio::test]
async fn store_failure_is_a_server_error() {
    let store = MemoryStore::new();
    let app = seeded(store.clone()).await;
    store.set_reads_failing(true);

    let (status, json) = call(app, "/search?q=internals").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Search failed");
    assert!(json["details"].as_str().unwrap().contains("posting lookup"));
}

#[tokio::test]
async fn all_records_pages_in_id_order() {
    let app = seeded(MemoryStore::new()).await;
    let (status, json) = call(app.clone(), "/all-records?limit=2&offset=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&json), vec!["2", "3"]);
    assert_eq!(json["total"], 3);
    assert_eq!((json["limit"].as_u64(), json["offset"].as_u64()), (Some(2), Some(1)));

    let (_, json) = call(app, "/all-records").await;
    assert_eq!(ids(&json), vec!["1", "2", "3"]);
}

#[tokio::test]
async fn benchmark_runs_every_query() {
    let mut engine = SearchEngine::new(MemoryStore::new(), EngineConfig::default()).unwrap();
    engine.initialize(&SyntheticCorpus::new(60)).await.unwrap();
    let app = build_app(AppState::new(engine, "memory"));

    let (status, json) = call(app, "/benchmark?iterations=2").await;
    assert_eq!(status, StatusCode::OK);
    let benchmarks = json["benchmarks"].as_array().unwrap();
    assert_eq!(benchmarks.len(), kvsearch_server::benchmark::QUERIES.len());
    for b in benchmarks {
        assert_eq!(b["iterations"], 2);
        assert!(b["query"].is_string());
        assert!(b["resultCount"].is_u64());
        assert!(b["medianDuration"].as_str().unwrap().ends_with("ms"));
        assert_eq!(b["durations"].as_array().unwrap().len(), 2);
    }
    assert!(json["averageDuration"].as_str().unwrap().ends_with("ms"));
    assert_eq!(json["database"], "memory");
}

#[tokio::test]
async fn unknown_route_lists_endpoints() {
    let app = seeded(MemoryStore::new()).await;
    let (status, json) = call(app, "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["availableEndpoints"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn sled_store_can_be_attached() {
    let dir = tempdir().unwrap();
    let store = SledStore::open(dir.path()).unwrap();
    let mut seeder = SearchEngine::new(store.clone(), EngineConfig::default()).unwrap();
    seeder.initialize(&tiny_corpus()).await.unwrap();

    let mut engine = SearchEngine::new(store, EngineConfig::default()).unwrap();
    let meta = engine.attach().await.unwrap();
    assert_eq!(meta.num_docs, 3);
    let app = build_app(AppState::new(engine, "sled"));

    let (status, json) = call(app, "/search?q=redis").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&json), vec!["1"]);
}
