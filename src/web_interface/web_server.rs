use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use log::{debug, info, warn};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use warp::http::{HeaderMap, StatusCode, Uri};
use warp::{reply, Filter, Rejection, Reply};

use crate::cluster::ClusterBackend;
use crate::configuration::Config;
use crate::error_handling::{StoreError, WebError};
use crate::metrics::PROXY_REQUESTS_TOTAL;
use crate::record_store::store_trait::RecordStore;
use crate::session_management::SessionLifecycle;
use crate::web_interface::types::{
    ApiError, CreateSessionRequest, CreateSessionResponse, DeleteSessionResponse, HealthResponse,
    ListSessionsResponse, SessionWithHealth,
};

/// Headers that apply to a single hop and must not be forwarded.
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Per-request timeout for forwarded traffic.
const PROXY_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Web server for the session API and the per-session proxy.
pub struct WebServer {
    store: Arc<dyn RecordStore>,
    cluster: Arc<dyn ClusterBackend>,
    lifecycle: Arc<SessionLifecycle>,
    config: Config,
    metrics_handle: PrometheusHandle,
}

impl WebServer {
    pub fn new(
        store: Arc<dyn RecordStore>,
        cluster: Arc<dyn ClusterBackend>,
        lifecycle: Arc<SessionLifecycle>,
        config: Config,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            store,
            cluster,
            lifecycle,
            config,
            metrics_handle,
        }
    }

    /// Start the web server on the configured port.
    pub async fn start(&self) -> Result<(), WebError> {
        let routes = build_routes(
            self.store.clone(),
            self.cluster.clone(),
            self.lifecycle.clone(),
            self.config.clone(),
            self.metrics_handle.clone(),
        );

        let addr: SocketAddr = ([0, 0, 0, 0], self.config.port).into();
        info!("Web server listening on {}", addr);
        warp::serve(routes).run(addr).await;

        Ok(())
    }
}

fn with<T: Clone + Send>(value: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone {
    warp::any().map(move || value.clone())
}

/// Composes the full route table. Kept separate from [`WebServer`] so
/// tests can drive it through `warp::test` without binding a port.
pub fn build_routes(
    store: Arc<dyn RecordStore>,
    cluster: Arc<dyn ClusterBackend>,
    lifecycle: Arc<SessionLifecycle>,
    config: Config,
    metrics_handle: PrometheusHandle,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let client = reqwest::Client::builder()
        .timeout(PROXY_REQUEST_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());

    // POST /sessions -> provision a session
    let create_session = warp::path("sessions")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::bytes())
        .and(with(lifecycle.clone()))
        .and_then(handle_create_session);

    // GET /sessions -> list all tracked sessions
    let list_sessions = warp::path("sessions")
        .and(warp::path::end())
        .and(warp::get())
        .and(with(store.clone()))
        .and_then(handle_list_sessions);

    // GET /sessions/:id/status -> record plus derived health flag
    let session_status = warp::path!("sessions" / String / "status")
        .and(warp::path::end())
        .and(warp::get())
        .and(with(store.clone()))
        .and_then(handle_session_status);

    // GET /sessions/:id -> redirect a live session into its proxy root
    let session_page = warp::path!("sessions" / String)
        .and(warp::path::end())
        .and(warp::get())
        .and(with(store.clone()))
        .and(with(config.base_path.clone()))
        .and_then(handle_session_page);

    // DELETE /sessions/:id -> tear the session down
    let delete_session = warp::path!("sessions" / String)
        .and(warp::path::end())
        .and(warp::delete())
        .and(with(lifecycle.clone()))
        .and_then(handle_delete_session);

    // GET /health -> service health
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(with(store.clone()))
        .and(with(cluster.clone()))
        .and(with(config.clone()))
        .and_then(handle_health);

    // GET /metrics -> Prometheus exposition
    let metrics = warp::path("metrics")
        .and(warp::path::end())
        .and(warp::get())
        .and(with(lifecycle.clone()))
        .and(with(metrics_handle))
        .and_then(handle_metrics);

    // ALL /sessions/:id/* -> forward to the session's endpoint. Must come
    // after the fixed /sessions routes so /status and /sessions/:id win.
    let proxy = warp::path("sessions")
        .and(warp::path::param::<String>())
        .and(warp::path::tail())
        .and(
            warp::query::raw()
                .or_else(|_| async { Ok::<(String,), Rejection>((String::new(),)) }),
        )
        .and(warp::method())
        .and(warp::header::headers_cloned())
        .and(warp::body::bytes())
        .and(with(store))
        .and(with(client))
        .and_then(handle_proxy);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS", "HEAD"])
        .allow_headers(vec!["content-type", "authorization", "accept"]);

    create_session
        .or(list_sessions)
        .or(session_status)
        .or(session_page)
        .or(delete_session)
        .or(health)
        .or(metrics)
        .or(proxy)
        .with(cors)
}

fn json_error(message: &str, status: StatusCode) -> warp::reply::Response {
    reply::with_status(
        reply::json(&ApiError {
            message: message.to_string(),
        }),
        status,
    )
    .into_response()
}

async fn handle_create_session(
    body: Bytes,
    lifecycle: Arc<SessionLifecycle>,
) -> Result<warp::reply::Response, Rejection> {
    let request: CreateSessionRequest = if body.is_empty() {
        CreateSessionRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                debug!("Rejecting malformed session request: {}", e);
                return Ok(json_error("Invalid JSON body", StatusCode::BAD_REQUEST));
            }
        }
    };

    match lifecycle
        .create_session(request.timeout, request.options)
        .await
    {
        // Failed provisioning still answers 200: the caller gets the
        // record with its failure note and decides what to do.
        Ok(record) => Ok(reply::with_status(
            reply::json(&CreateSessionResponse::from(record)),
            StatusCode::OK,
        )
        .into_response()),
        Err(e) => {
            warn!("Session creation refused, store unavailable: {}", e);
            Ok(json_error(
                "Session store unavailable",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_list_sessions(
    store: Arc<dyn RecordStore>,
) -> Result<warp::reply::Response, Rejection> {
    match store.list_all().await {
        Ok(sessions) => {
            let count = sessions.len();
            Ok(reply::with_status(
                reply::json(&ListSessionsResponse { sessions, count }),
                StatusCode::OK,
            )
            .into_response())
        }
        Err(e) => {
            warn!("Failed to list sessions: {}", e);
            Ok(json_error(
                "Failed to load sessions",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_session_status(
    id: String,
    store: Arc<dyn RecordStore>,
) -> Result<warp::reply::Response, Rejection> {
    match store.get(&id).await {
        Ok(record) => {
            let healthy = record.is_live();
            Ok(reply::with_status(
                reply::json(&SessionWithHealth { record, healthy }),
                StatusCode::OK,
            )
            .into_response())
        }
        Err(StoreError::NotFound) => Ok(json_error("Session not found", StatusCode::NOT_FOUND)),
        Err(e) => {
            warn!("Status lookup failed for {}: {}", id, e);
            Ok(json_error(
                "Session store unavailable",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_session_page(
    id: String,
    store: Arc<dyn RecordStore>,
    base_path: String,
) -> Result<warp::reply::Response, Rejection> {
    match store.get(&id).await {
        Ok(record) if record.is_live() => {
            let location = format!("{}/sessions/{}/", base_path, id);
            match location.parse::<Uri>() {
                Ok(uri) => Ok(warp::redirect::found(uri).into_response()),
                Err(_) => Ok(reply::json(&record).into_response()),
            }
        }
        Ok(record) => {
            let html = format!(
                "<html><head><title>Session {id}</title></head>\
                 <body><h1>Session {id}</h1><p>Status: {status}</p>{note}</body></html>",
                id = record.id,
                status = record.status,
                note = record
                    .notes
                    .as_deref()
                    .map(|n| format!("<p>{}</p>", n))
                    .unwrap_or_default(),
            );
            Ok(reply::html(html).into_response())
        }
        Err(StoreError::NotFound) => Ok(json_error("Session not found", StatusCode::NOT_FOUND)),
        Err(e) => {
            warn!("Session lookup failed for {}: {}", id, e);
            Ok(json_error(
                "Session store unavailable",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_delete_session(
    id: String,
    lifecycle: Arc<SessionLifecycle>,
) -> Result<warp::reply::Response, Rejection> {
    match lifecycle.delete_session(&id).await {
        Ok(outcome) => Ok(reply::with_status(
            reply::json(&DeleteSessionResponse {
                success: outcome.success,
                error: outcome.error,
            }),
            StatusCode::OK,
        )
        .into_response()),
        Err(e) => {
            warn!("Delete refused for {}, store unavailable: {}", id, e);
            Ok(json_error(
                "Session store unavailable",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_health(
    store: Arc<dyn RecordStore>,
    cluster: Arc<dyn ClusterBackend>,
    config: Config,
) -> Result<warp::reply::Response, Rejection> {
    if let Err(e) = store.ping().await {
        return Ok(reply::with_status(
            reply::json(&HealthResponse {
                status: "unhealthy",
                sessions: 0,
                namespace: config.namespace,
                base_path: config.base_path,
                timestamp: Utc::now(),
                error: Some(format!("record store: {}", e)),
            }),
            StatusCode::SERVICE_UNAVAILABLE,
        )
        .into_response());
    }

    let sessions = store.list_all().await.map(|s| s.len()).unwrap_or(0);
    let (status, error) = match cluster.ping().await {
        Ok(()) => ("ok", None),
        Err(e) => ("degraded", Some(format!("cluster: {}", e))),
    };

    Ok(reply::with_status(
        reply::json(&HealthResponse {
            status,
            sessions,
            namespace: config.namespace,
            base_path: config.base_path,
            timestamp: Utc::now(),
            error,
        }),
        StatusCode::OK,
    )
    .into_response())
}

async fn handle_metrics(
    lifecycle: Arc<SessionLifecycle>,
    handle: PrometheusHandle,
) -> Result<warp::reply::Response, Rejection> {
    // The live gauge is recomputed on scrape so restarts and TTL expiry
    // show up without waiting for the next lifecycle event.
    lifecycle.refresh_live_gauge().await;
    Ok(reply::with_header(
        handle.render(),
        "Content-Type",
        "text/plain; version=0.0.4",
    )
    .into_response())
}

#[allow(clippy::too_many_arguments)]
async fn handle_proxy(
    id: String,
    tail: warp::path::Tail,
    query: String,
    method: warp::http::Method,
    headers: HeaderMap,
    body: Bytes,
    store: Arc<dyn RecordStore>,
    client: reqwest::Client,
) -> Result<warp::reply::Response, Rejection> {
    counter!(PROXY_REQUESTS_TOTAL).increment(1);

    let record = match store.get(&id).await {
        Ok(record) => record,
        Err(StoreError::NotFound) => {
            return Ok(json_error("Session not found", StatusCode::NOT_FOUND))
        }
        Err(e) => {
            warn!("Proxy lookup failed for {}: {}", id, e);
            return Ok(json_error(
                "Session store unavailable",
                StatusCode::INTERNAL_SERVER_ERROR,
            ));
        }
    };

    // Any traffic counts as activity, even against a session that is
    // still starting.
    if let Err(e) = store.touch(&id, record.timeout_seconds).await {
        warn!("Failed to refresh TTL for {}: {}", id, e);
    }

    if !record.is_live() {
        return Ok(json_error(
            &format!("Session not ready: {}", record.status),
            StatusCode::CONFLICT,
        ));
    }
    let address = match &record.endpoint_address {
        Some(address) => address.clone(),
        None => {
            return Ok(json_error(
                "Session not ready: no endpoint",
                StatusCode::CONFLICT,
            ))
        }
    };

    let mut url = format!("http://{}/{}", address, tail.as_str());
    if !query.is_empty() {
        url.push('?');
        url.push_str(&query);
    }

    let method = reqwest::Method::from_bytes(method.as_str().as_bytes())
        .unwrap_or(reqwest::Method::GET);
    let mut request = client.request(method, &url);
    for (name, value) in headers.iter() {
        let name_str = name.as_str();
        if name_str == "host"
            || name_str == "content-length"
            || HOP_BY_HOP_HEADERS.contains(&name_str)
        {
            continue;
        }
        request = request.header(name_str, value.as_bytes());
    }
    if !body.is_empty() {
        request = request.body(body.to_vec());
    }

    let upstream = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            warn!("Proxy request to {} failed: {}", url, e);
            return Ok(json_error(
                "Failed to reach session endpoint",
                StatusCode::BAD_GATEWAY,
            ));
        }
    };

    let status = StatusCode::from_u16(upstream.status().as_u16())
        .unwrap_or(StatusCode::BAD_GATEWAY);
    let forwarded_headers: Vec<(String, Vec<u8>)> = upstream
        .headers()
        .iter()
        .filter(|(name, _)| {
            let name_str = name.as_str();
            name_str != "content-length" && !HOP_BY_HOP_HEADERS.contains(&name_str)
        })
        .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
        .collect();
    let body = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to read upstream body from {}: {}", url, e);
            return Ok(json_error(
                "Failed to read session response",
                StatusCode::BAD_GATEWAY,
            ));
        }
    };

    let mut response = reply::with_status(body.to_vec(), status).into_response();
    for (name, value) in forwarded_headers {
        if let (Ok(name), Ok(value)) = (
            warp::http::header::HeaderName::from_bytes(name.as_bytes()),
            warp::http::header::HeaderValue::from_bytes(&value),
        ) {
            response.headers_mut().insert(name, value);
        }
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::cluster::fake_cluster::FakeCluster;
    use crate::error_handling::ProvisionError;
    use crate::metrics;
    use crate::readiness::ReadinessProbe;
    use crate::record_store::memory_store::MemoryStore;
    use crate::session_management::session::{SessionRecord, SessionStatus};

    struct InstantReady;

    #[async_trait]
    impl ReadinessProbe for InstantReady {
        async fn wait_until_ready(
            &self,
            _address: &str,
            _timeout: Duration,
        ) -> Result<(), ProvisionError> {
            Ok(())
        }
    }

    struct Harness {
        store: Arc<MemoryStore>,
    }

    fn routes_with_store() -> (
        impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone,
        Harness,
    ) {
        let store = Arc::new(MemoryStore::new());
        let cluster = Arc::new(FakeCluster::new());
        let config = Config::default();
        let lifecycle = Arc::new(SessionLifecycle::new(
            store.clone(),
            cluster.clone(),
            Arc::new(InstantReady),
            config.clone(),
        ));
        let routes = build_routes(
            store.clone(),
            cluster,
            lifecycle,
            config,
            metrics::install_recorder(),
        );
        (routes, Harness { store })
    }

    /// Minimal upstream that answers every request with a fixed body and
    /// echoes the request path in a header.
    async fn spawn_upstream() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buffer = vec![0u8; 4096];
                    let n = socket.read(&mut buffer).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let path = request
                        .split_whitespace()
                        .nth(1)
                        .unwrap_or("/")
                        .to_string();
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-length: 2\r\nx-upstream-path: {}\r\n\r\nok",
                        path
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });
        address
    }

    async fn seed_live_session(store: &MemoryStore, id: &str, address: &str) {
        let mut record =
            SessionRecord::new_pending(id.to_string(), 1800, serde_json::Map::new());
        record.status = SessionStatus::Live;
        record.endpoint_address = Some(address.to_string());
        record.endpoint_name = Some(format!("browser-session-{}", id));
        record.workload_name = Some(format!("browser-session-{}", id));
        store.save(&record).await.unwrap();
    }

    #[tokio::test]
    async fn create_session_answers_with_the_live_record() {
        let (routes, _harness) = routes_with_store();
        let response = warp::test::request()
            .method("POST")
            .path("/sessions")
            .json(&json!({"timeout": 900}))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["status"], "live");
        assert!(body["endpointAddress"].is_string());
    }

    #[tokio::test]
    async fn create_session_with_an_empty_body_uses_defaults() {
        let (routes, _harness) = routes_with_store();
        let response = warp::test::request()
            .method("POST")
            .path("/sessions")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["status"], "live");
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request() {
        let (routes, _harness) = routes_with_store();
        let response = warp::test::request()
            .method("POST")
            .path("/sessions")
            .body("{not json")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_sessions_reports_count() {
        let (routes, harness) = routes_with_store();
        seed_live_session(&harness.store, "a", "127.0.0.1:1").await;
        seed_live_session(&harness.store, "b", "127.0.0.1:2").await;

        let response = warp::test::request().path("/sessions").reply(&routes).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["count"], 2);
    }

    #[tokio::test]
    async fn status_of_an_unknown_session_is_not_found() {
        let (routes, _harness) = routes_with_store();
        let response = warp::test::request()
            .path("/sessions/nope/status")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn status_reports_live_sessions_as_healthy() {
        let (routes, harness) = routes_with_store();
        seed_live_session(&harness.store, "s", "127.0.0.1:1").await;

        let response = warp::test::request()
            .path("/sessions/s/status")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["id"], "s");
        assert_eq!(body["healthy"], true);
    }

    #[tokio::test]
    async fn session_page_redirects_live_sessions_into_the_proxy() {
        let (routes, harness) = routes_with_store();
        seed_live_session(&harness.store, "web", "127.0.0.1:1").await;

        let response = warp::test::request()
            .path("/sessions/web")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get("location").unwrap().to_str().unwrap(),
            "/sessions/web/"
        );
    }

    #[tokio::test]
    async fn session_page_renders_html_for_a_failed_session() {
        let (routes, harness) = routes_with_store();
        let mut record =
            SessionRecord::new_pending("sad".to_string(), 1800, serde_json::Map::new());
        record.fail("no capacity".to_string());
        harness.store.save(&record).await.unwrap();

        let response = warp::test::request()
            .path("/sessions/sad")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = String::from_utf8_lossy(response.body());
        assert!(body.contains("failed"));
        assert!(body.contains("no capacity"));
    }

    #[tokio::test]
    async fn delete_is_idempotent_through_the_api() {
        let (routes, harness) = routes_with_store();
        seed_live_session(&harness.store, "gone", "127.0.0.1:1").await;

        for _ in 0..2 {
            let response = warp::test::request()
                .method("DELETE")
                .path("/sessions/gone")
                .reply(&routes)
                .await;
            assert_eq!(response.status(), StatusCode::OK);
            let body: Value = serde_json::from_slice(response.body()).unwrap();
            assert_eq!(body["success"], true);
        }
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let (routes, _harness) = routes_with_store();
        let response = warp::test::request().path("/health").reply(&routes).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn metrics_render_in_prometheus_format() {
        let (routes, _harness) = routes_with_store();
        let response = warp::test::request().path("/metrics").reply(&routes).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
    }

    #[tokio::test]
    async fn proxy_to_an_unknown_session_is_not_found() {
        let (routes, _harness) = routes_with_store();
        let response = warp::test::request()
            .path("/sessions/missing/v1/page")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn proxy_to_a_failed_session_is_a_conflict() {
        let (routes, harness) = routes_with_store();
        let mut record =
            SessionRecord::new_pending("broken".to_string(), 1800, serde_json::Map::new());
        record.fail("boom".to_string());
        harness.store.save(&record).await.unwrap();

        let response = warp::test::request()
            .path("/sessions/broken/v1/page")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn proxy_forwards_path_query_and_upstream_headers() {
        let (routes, harness) = routes_with_store();
        let upstream = spawn_upstream().await;
        seed_live_session(&harness.store, "p", &upstream).await;

        let response = warp::test::request()
            .method("POST")
            .path("/sessions/p/v1/actions?mode=fast")
            .body("payload")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"ok");
        assert_eq!(
            response
                .headers()
                .get("x-upstream-path")
                .unwrap()
                .to_str()
                .unwrap(),
            "/v1/actions?mode=fast"
        );
    }

    #[tokio::test]
    async fn proxy_to_an_unreachable_endpoint_is_a_bad_gateway() {
        let (routes, harness) = routes_with_store();
        seed_live_session(&harness.store, "dead", "127.0.0.1:1").await;

        let response = warp::test::request()
            .path("/sessions/dead/v1/page")
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
