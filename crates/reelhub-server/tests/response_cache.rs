//! End-to-end tests of the listing cache through the full router.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use reelhub_server::{AppConfig, AppState, CacheBackend, ResponseCache, build_app};
use reelhub_storage::{DocumentStore, InMemoryStore};
use serde_json::{Value, json};
use tower::ServiceExt;

struct TestApp {
    app: Router,
    store: Arc<InMemoryStore>,
    cache: ResponseCache,
}

fn test_app_with(cfg: AppConfig) -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let cache = ResponseCache::new(
        CacheBackend::new_local(&cfg.cache.namespace),
        &cfg.cache,
    );
    let state = AppState::new(store.clone(), cache.clone());
    TestApp {
        app: build_app(state, &cfg),
        store,
        cache,
    }
}

fn test_app() -> TestApp {
    test_app_with(AppConfig::default())
}

struct TestResponse {
    status: StatusCode,
    x_cache: Option<String>,
    cache_control: Option<String>,
    bytes: Vec<u8>,
}

impl TestResponse {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap()
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    let res = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let header_str = |name| {
        res.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let x_cache = header_str("x-cache");
    let cache_control = header_str("cache-control");
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap().to_vec();
    TestResponse {
        status,
        x_cache,
        cache_control,
        bytes,
    }
}

async fn get(app: &Router, uri: &str) -> TestResponse {
    send(app, "GET", uri, None).await
}

/// Write-backs run on a spawned task; wait until the entry lands.
async fn wait_for_entry(cache: &ResponseCache, key: &str) {
    for _ in 0..100 {
        if cache.backend().get(key).await.is_some() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("cache entry {key} was never written");
}

async fn create_director(app: &Router, first: &str, last: &str) -> String {
    let res = send(
        app,
        "POST",
        "/api/directors",
        Some(json!({
            "firstName": first,
            "lastName": last,
            "birthDate": "1946-12-18",
        })),
    )
    .await;
    assert_eq!(res.status, StatusCode::CREATED);
    res.json()["data"]["id"].as_str().unwrap().to_string()
}

fn movie_body(title: &str, imdb_id: &str, director_id: &str) -> Value {
    json!({
        "title": title,
        "description": "A film",
        "releaseDate": "1993-06-11",
        "genre": "Adventure",
        "rating": 8.2,
        "imdbId": imdb_id,
        "directorId": director_id,
    })
}

async fn create_movie(app: &Router, title: &str, imdb_id: &str, director_id: &str) -> String {
    let res = send(
        app,
        "POST",
        "/api/movies",
        Some(movie_body(title, imdb_id, director_id)),
    )
    .await;
    assert_eq!(res.status, StatusCode::CREATED);
    res.json()["data"]["id"].as_str().unwrap().to_string()
}

fn titles(res: &TestResponse) -> Vec<String> {
    res.json()["data"]["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn listing_is_cached_then_invalidated_by_create() {
    let t = test_app();
    let director = create_director(&t.app, "Steven", "Spielberg").await;
    create_movie(&t.app, "Jaws", "tt0073195", &director).await;

    let first = get(&t.app, "/api/movies").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.x_cache.as_deref(), Some("MISS"));
    assert_eq!(first.cache_control.as_deref(), Some("no-store"));
    wait_for_entry(&t.cache, "movies:list:1:10:default:asc").await;

    let second = get(&t.app, "/api/movies").await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.x_cache.as_deref(), Some("HIT"));
    assert_eq!(second.bytes, first.bytes);

    create_movie(&t.app, "Jurassic Park", "tt0107290", &director).await;
    assert!(
        t.cache
            .backend()
            .get("movies:list:1:10:default:asc")
            .await
            .is_none()
    );

    let third = get(&t.app, "/api/movies").await;
    assert_eq!(third.x_cache.as_deref(), Some("MISS"));
    assert_eq!(titles(&third), vec!["Jaws", "Jurassic Park"]);
}

#[tokio::test]
async fn hit_is_served_without_consulting_the_store() {
    let t = test_app();
    let director = create_director(&t.app, "Steven", "Spielberg").await;
    create_movie(&t.app, "Jaws", "tt0073195", &director).await;

    let first = get(&t.app, "/api/movies").await;
    wait_for_entry(&t.cache, "movies:list:1:10:default:asc").await;

    // Bypasses the HTTP layer, so nothing invalidates.
    t.store
        .insert(
            "movies",
            movie_body("Duel", "tt0067023", &director),
        )
        .await
        .unwrap();

    let second = get(&t.app, "/api/movies").await;
    assert_eq!(second.x_cache.as_deref(), Some("HIT"));
    assert_eq!(second.bytes, first.bytes);
    assert_eq!(titles(&second), vec!["Jaws"]);
}

#[tokio::test]
async fn equivalent_queries_share_an_entry() {
    let t = test_app();
    get(&t.app, "/api/movies?page=1&limit=10").await;
    wait_for_entry(&t.cache, "movies:list:1:10:default:asc").await;

    let res = get(&t.app, "/api/movies?limit=10&page=01").await;
    assert_eq!(res.x_cache.as_deref(), Some("HIT"));

    let other_page = get(&t.app, "/api/movies?page=2").await;
    assert_eq!(other_page.x_cache.as_deref(), Some("MISS"));
}

#[tokio::test]
async fn director_update_invalidates_movie_listings() {
    let t = test_app();
    let director = create_director(&t.app, "Steven", "Spielberg").await;
    create_movie(&t.app, "Jaws", "tt0073195", &director).await;

    get(&t.app, "/api/movies").await;
    get(&t.app, &format!("/api/movies/director/{director}")).await;
    wait_for_entry(&t.cache, "movies:list:1:10:default:asc").await;
    wait_for_entry(
        &t.cache,
        &format!("movies:director:{director}:1:10:default:asc"),
    )
    .await;

    let res = send(
        &t.app,
        "PUT",
        &format!("/api/directors/{director}"),
        Some(json!({ "bio": "Director of Jaws" })),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);

    assert_eq!(
        get(&t.app, "/api/movies").await.x_cache.as_deref(),
        Some("MISS")
    );
    assert_eq!(
        get(&t.app, &format!("/api/movies/director/{director}"))
            .await
            .x_cache
            .as_deref(),
        Some("MISS")
    );
}

#[tokio::test]
async fn movie_write_invalidates_director_listings() {
    let t = test_app();
    let director = create_director(&t.app, "Steven", "Spielberg").await;

    get(&t.app, "/api/directors").await;
    wait_for_entry(&t.cache, "directors:list:1:10:default:asc").await;

    create_movie(&t.app, "Jaws", "tt0073195", &director).await;
    assert_eq!(
        get(&t.app, "/api/directors").await.x_cache.as_deref(),
        Some("MISS")
    );
}

#[tokio::test]
async fn failed_write_leaves_cache_alone() {
    let t = test_app();
    get(&t.app, "/api/movies").await;
    wait_for_entry(&t.cache, "movies:list:1:10:default:asc").await;

    let res = send(
        &t.app,
        "POST",
        "/api/movies",
        Some(movie_body("Orphan", "tt0000001", "no-such-director")),
    )
    .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = send(&t.app, "DELETE", "/api/movies/no-such-movie", None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    assert_eq!(
        get(&t.app, "/api/movies").await.x_cache.as_deref(),
        Some("HIT")
    );
}

#[tokio::test]
async fn non_listing_reads_are_not_cached() {
    let t = test_app();
    let director = create_director(&t.app, "Steven", "Spielberg").await;
    let movie = create_movie(&t.app, "Jaws", "tt0073195", &director).await;

    for uri in [
        format!("/api/movies/{movie}"),
        "/api/movies/imdb/tt0073195".to_string(),
        format!("/api/directors/{director}"),
        "/api/movies/search/rating?min=5".to_string(),
        "/api/directors/search?name=spiel".to_string(),
        "/api/directors/search/date-range?from=1940-01-01&to=1950-01-01".to_string(),
        "/api/movies?q=jaws".to_string(),
    ] {
        let res = get(&t.app, &uri).await;
        assert_eq!(res.status, StatusCode::OK, "{uri}");
        assert_eq!(res.x_cache, None, "{uri}");
    }
}

#[tokio::test]
async fn error_responses_are_not_cached() {
    let t = test_app();

    let res = get(&t.app, "/api/movies?page=abc").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.x_cache.as_deref(), Some("MISS"));

    let res = get(&t.app, "/api/movies/director/missing").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(t.cache.backend().stats().local_entries, Some(0));
    assert_eq!(
        get(&t.app, "/api/movies?page=abc").await.status,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn disabled_cache_passes_through() {
    let mut cfg = AppConfig::default();
    cfg.cache.enabled = false;
    let t = test_app_with(cfg);

    let first = get(&t.app, "/api/movies").await;
    let second = get(&t.app, "/api/movies").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.x_cache, None);
    assert_eq!(second.x_cache, None);
    assert_eq!(t.cache.backend().stats().local_entries, Some(0));
}

#[tokio::test]
async fn head_request_is_never_written_back() {
    let t = test_app();
    let res = send(&t.app, "HEAD", "/api/movies", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.x_cache.as_deref(), Some("MISS"));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(
        t.cache
            .backend()
            .get("movies:list:1:10:default:asc")
            .await
            .is_none()
    );
}

#[tokio::test]
async fn sorted_listing_uses_sort_in_key() {
    let t = test_app();
    let director = create_director(&t.app, "Steven", "Spielberg").await;
    create_movie(&t.app, "Jaws", "tt0073195", &director).await;
    create_movie(&t.app, "Duel", "tt0067023", &director).await;

    let res = get(&t.app, "/api/movies?sortBy=title&sortOrder=DESC").await;
    assert_eq!(titles(&res), vec!["Jaws", "Duel"]);
    wait_for_entry(&t.cache, "movies:list:1:10:title:desc").await;

    let res = get(&t.app, "/api/movies?sortBy=title&sortOrder=asc").await;
    assert_eq!(res.x_cache.as_deref(), Some("MISS"));
    assert_eq!(titles(&res), vec!["Duel", "Jaws"]);
}

#[tokio::test]
async fn genre_listing_is_cached_per_genre() {
    let t = test_app();
    let director = create_director(&t.app, "Steven", "Spielberg").await;
    create_movie(&t.app, "Jaws", "tt0073195", &director).await;

    let res = get(&t.app, "/api/movies/genre/Adventure").await;
    assert_eq!(titles(&res), vec!["Jaws"]);
    wait_for_entry(&t.cache, "movies:genre:Adventure:1:10:default:asc").await;

    assert_eq!(
        get(&t.app, "/api/movies/genre/Adventure")
            .await
            .x_cache
            .as_deref(),
        Some("HIT")
    );
    assert_eq!(
        get(&t.app, "/api/movies/genre/Drama").await.x_cache.as_deref(),
        Some("MISS")
    );
}

/// Redis pool pointed at a closed port: every cache call fails or times out.
fn unreachable_redis_backend(namespace: &str) -> CacheBackend {
    let pool = deadpool_redis::Config::from_url("redis://127.0.0.1:1")
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .unwrap();
    CacheBackend::new_redis(pool, namespace, Duration::from_millis(200))
}

#[tokio::test]
async fn failing_backend_never_changes_responses() {
    let cfg = AppConfig::default();
    let store = Arc::new(InMemoryStore::new());
    let backend = unreachable_redis_backend(&cfg.cache.namespace);
    let cache = ResponseCache::new(backend, &cfg.cache);
    let app = build_app(AppState::new(store, cache), &cfg);

    let first = get(&app, "/api/movies").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.x_cache.as_deref(), Some("MISS"));
    assert!(titles(&first).is_empty());

    let director = create_director(&app, "Steven", "Spielberg").await;
    create_movie(&app, "Jaws", "tt0073195", &director).await;

    let second = get(&app, "/api/movies").await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.x_cache.as_deref(), Some("MISS"));
    assert_eq!(titles(&second), vec!["Jaws"]);

    let res = send(&app, "DELETE", &format!("/api/directors/{director}"), None).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
}
