//! HTTP transport: ingest, report reads, and status.
//!
//! This is the "external collaborator" the core pipeline is specified
//! against — a thin axum layer translating HTTP semantics into calls on
//! [`crate::writer::WriterHandle`] and [`crate::runner::Runner`].

use crate::error::IngestError;
use crate::event::Event;
use crate::ratelimit::RateLimiter;
use crate::runner::Runner;
use crate::writer::WriterHandle;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub writer: WriterHandle,
    pub runner: Arc<Runner>,
    pub rate_limiter: RateLimiter,
    pub started_at: std::time::Instant,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(ingest))
        .route("/r", get(read_report))
        .route("/status", get(status))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn now_unix() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, IngestError> {
    headers
        .get(name)
        .ok_or(IngestError::MissingHeader(name))?
        .to_str()
        .map_err(|e| IngestError::InvalidHeader {
            header: name,
            reason: e.to_string(),
        })
}

fn header_u32(headers: &HeaderMap, name: &'static str) -> Result<u32, IngestError> {
    header_str(headers, name)?
        .parse::<u32>()
        .map_err(|e| IngestError::InvalidHeader {
            header: name,
            reason: e.to_string(),
        })
}

fn header_f32(headers: &HeaderMap, name: &'static str) -> Result<f32, IngestError> {
    header_str(headers, name)?
        .parse::<f32>()
        .map_err(|e| IngestError::InvalidHeader {
            header: name,
            reason: e.to_string(),
        })
}

fn parse_event(headers: &HeaderMap) -> Result<Event, IngestError> {
    let usr = header_u32(headers, "USR")?;
    let sess = header_u32(headers, "SESS")?;
    let cid = header_u32(headers, "CID")?;
    let time = now_unix();

    match header_str(headers, "TYPE")? {
        "LOAD" => Ok(Event::load(time, usr, sess, cid)),
        "UNLOAD" => {
            let scrolled = header_f32(headers, "SCROLLED")?;
            Ok(Event::unload(time, usr, sess, cid, scrolled))
        }
        "TIME" => {
            let page_seconds = header_u32(headers, "PAGE_SECONDS")?;
            Ok(Event::time_on_page(time, usr, sess, cid, page_seconds))
        }
        other => Err(IngestError::InvalidHeader {
            header: "TYPE",
            reason: format!("unrecognized event type {other:?}"),
        }),
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        log::debug!(target: "pageanalytics::http", "rejected ingest request: {self}");
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

async fn ingest(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if !state.rate_limiter.check(addr.ip()) {
        return (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response();
    }

    match parse_event(&headers) {
        Ok(event) => {
            state.writer.submit(event).await;
            StatusCode::OK.into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[derive(Deserialize)]
struct ReadQuery {
    name: Option<String>,
}

async fn read_report(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReadQuery>,
) -> Response {
    if !state.rate_limiter.check(addr.ip()) {
        return (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response();
    }

    let Some(name) = query.name else {
        return (StatusCode::BAD_REQUEST, "missing required query parameter 'name'")
            .into_response();
    };

    match state.runner.result(&name) {
        Some(result) => {
            let mut response = result.bytes.into_response();
            response
                .headers_mut()
                .insert("content-type", result.content_type.parse().unwrap());
            response
        }
        None => (StatusCode::NOT_FOUND, "report not found").into_response(),
    }
}

#[derive(Serialize)]
struct Status {
    file_size: u64,
    current_report_event_count: u64,
    last_report_event_count: u64,
    last_report_duration: String,
    last_report_time: u64,
    build_commit: &'static str,
    cpu_count: usize,
}

async fn status(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Response {
    if !state.rate_limiter.check(addr.ip()) {
        return (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response();
    }

    let body = Status {
        file_size: state.runner.file_size(),
        current_report_event_count: state.runner.current_report_event_count(),
        last_report_event_count: state.runner.last_report_event_count(),
        last_report_duration: format!("{:.1?}", state.runner.last_report_duration()),
        last_report_time: state.runner.last_report_time(),
        build_commit: option_env!("PAGEANALYTICS_COMMIT").unwrap_or(env!("CARGO_PKG_VERSION")),
        cpu_count: num_cpus::get(),
    };
    Json(body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Aggregator, ReportResult, Subset};
    use crate::runner::Runner;
    use crate::writer;
    use hyper::body::to_bytes;
    use std::collections::HashMap;
    use tempfile::tempdir;
    use tower::ServiceExt;

    fn test_conn_info() -> ConnectInfo<SocketAddr> {
        ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 12345)))
    }

    async fn test_state() -> Arc<AppState> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events");
        let writer_handle = writer::spawn(&path, 10, 64);
        std::mem::forget(dir); // keep temp dir alive for the test's duration

        let mut jobs: HashMap<String, Arc<dyn Aggregator>> = HashMap::new();
        jobs.insert(
            "recent".to_string(),
            Arc::new(Subset {
                filter: Box::new(|_| true),
                limit: 5,
            }),
        );
        let runner = Runner::new(
            path,
            10,
            2,
            std::time::Duration::from_secs(3600),
            jobs,
            writer_handle.clone(),
        );
        runner.store().publish_all({
            let mut m = HashMap::new();
            m.insert("recent".to_string(), ReportResult::json(b"[]".to_vec()));
            m
        });

        Arc::new(AppState {
            writer: writer_handle,
            runner,
            rate_limiter: RateLimiter::new(1000.0, 1000),
            started_at: std::time::Instant::now(),
        })
    }

    #[tokio::test]
    async fn ingest_requires_headers() {
        let state = test_state().await;
        let app = router(state);

        let mut request = axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .body(axum::body::Body::empty())
            .unwrap();
        request.extensions_mut().insert(test_conn_info());

        let response = app
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn read_report_missing_name_is_400() {
        let state = test_state().await;
        let app = router(state);
        let mut request = axum::http::Request::builder()
            .uri("/r")
            .body(axum::body::Body::empty())
            .unwrap();
        request.extensions_mut().insert(test_conn_info());
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn read_report_unknown_job_is_404() {
        let state = test_state().await;
        let app = router(state);
        let mut request = axum::http::Request::builder()
            .uri("/r?name=nope")
            .body(axum::body::Body::empty())
            .unwrap();
        request.extensions_mut().insert(test_conn_info());
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn read_report_found_returns_body() {
        let state = test_state().await;
        let app = router(state);
        let mut request = axum::http::Request::builder()
            .uri("/r?name=recent")
            .body(axum::body::Body::empty())
            .unwrap();
        request.extensions_mut().insert(test_conn_info());
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&body[..], b"[]");
    }
}
