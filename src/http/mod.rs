//! HTTP boundary of the relay.
//!
//! Routes (all CORS allow-all):
//! - `GET  /api/door/status`, `GET /api/status` - current state
//! - `GET  /api/door/stream` - server-sent events
//! - `POST /api/door/test`, `POST /api/status` - force a state
//! - `POST /api/webhook` - broker-relayed sensor payload
//!
//! Any other method on these paths gets `405 {"error": "Method not allowed"}`.

mod error;
mod handlers;
mod request;

pub use error::ApiError;
pub use handlers::WriteResponse;
pub use request::{WriteCommand, WriteRequest};

use crate::config::HttpConfig;
use crate::error::{RelayError, Result};
use crate::relay::Dispatcher;
use axum::Router;
use axum::http::{Method, header};
use axum::routing::{MethodRouter, get, post};
use handlers::{force_state, method_not_allowed, preflight, read_state, stream, webhook};
use log::info;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    /// Cancelled on shutdown; open event streams end with it.
    pub shutdown: CancellationToken,
}

fn endpoint(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.options(preflight).fallback(method_not_allowed)
}

/// Build the API router.
pub fn router(dispatcher: Arc<Dispatcher>, shutdown: CancellationToken) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/door/status", endpoint(get(read_state)))
        .route("/api/door/stream", endpoint(get(stream)))
        .route("/api/door/test", endpoint(post(force_state)))
        .route("/api/status", endpoint(get(read_state).post(force_state)))
        .route("/api/webhook", endpoint(post(webhook)))
        .layer(cors)
        .with_state(AppState {
            dispatcher,
            shutdown,
        })
}

/// Bind the listener and serve until `shutdown` is cancelled.
pub async fn serve(
    config: &HttpConfig,
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| RelayError::BindFailed { addr, source })?;
    info!("[HTTP] Server running on http://{}", listener.local_addr()?);

    let app = router(dispatcher, shutdown.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("[HTTP] Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::DEFAULT_STREAM_BUFFER;
    use crate::state::{DoorUpdate, StateStore};
    use axum::body::{Body, BodyDataStream};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use futures_util::StreamExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn setup() -> (Router, Arc<Dispatcher>) {
        let dispatcher = Arc::new(Dispatcher::new(StateStore::new(), DEFAULT_STREAM_BUFFER));
        (router(dispatcher.clone(), CancellationToken::new()), dispatcher)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: &str) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Reads `data:` events off an SSE response body.
    struct SseReader {
        stream: BodyDataStream,
        buf: String,
    }

    impl SseReader {
        async fn next_event(&mut self) -> Value {
            loop {
                if let Some(end) = self.buf.find("\n\n") {
                    let frame: String = self.buf.drain(..end + 2).collect();
                    let data: String = frame
                        .lines()
                        .filter_map(|line| line.strip_prefix("data:"))
                        .map(str::trim_start)
                        .collect();
                    // Keep-alive comments carry no data
                    if data.is_empty() {
                        continue;
                    }
                    return serde_json::from_str(&data).unwrap();
                }
                let chunk = self.stream.next().await.unwrap().unwrap();
                self.buf.push_str(std::str::from_utf8(&chunk).unwrap());
            }
        }
    }

    async fn open_stream(app: &Router) -> SseReader {
        let response = send(app, Method::GET, "/api/door/stream", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        SseReader {
            stream: response.into_body().into_data_stream(),
            buf: String::new(),
        }
    }

    #[tokio::test]
    async fn test_read_state() {
        let (app, _) = setup();
        let response = send(&app, Method::GET, "/api/door/status", "").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["isOpen"], false);
        assert_eq!(body["status"], "CLEAR");
        assert!(body["lastUpdated"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_force_state_derives_status() {
        let (app, dispatcher) = setup();

        let body = json_body(send(&app, Method::POST, "/api/door/test", r#"{"isOpen":true}"#).await).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["state"]["isOpen"], true);
        assert_eq!(body["state"]["status"], "DETECTED");
        assert!(body.get("message").is_none());

        let body = json_body(send(&app, Method::POST, "/api/door/test", r#"{"isOpen":false}"#).await).await;
        assert_eq!(body["state"]["status"], "CLEAR");

        let read = json_body(send(&app, Method::GET, "/api/status", "").await).await;
        assert_eq!(read, body["state"]);
        assert_eq!(serde_json::to_value(dispatcher.current()).unwrap(), read);
    }

    #[tokio::test]
    async fn test_status_post_variant() {
        let (app, _) = setup();
        let body = json_body(
            send(&app, Method::POST, "/api/status", r#"{"isOpen":false,"status":"MAINTENANCE"}"#).await,
        )
        .await;
        assert_eq!(body["state"]["isOpen"], false);
        assert_eq!(body["state"]["status"], "MAINTENANCE");
    }

    #[tokio::test]
    async fn test_webhook_uses_broker_mapping() {
        let (app, _) = setup();

        let response = send(&app, Method::POST, "/api/webhook", r#"{"payload":"DETECTED","topic":"home/ir/state"}"#).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "State updated");
        assert_eq!(body["state"]["isOpen"], true);

        let body = json_body(send(&app, Method::POST, "/api/webhook", r#"{"message":"WIFI_CONNECTING"}"#).await).await;
        assert_eq!(body["state"]["isOpen"], false);
        assert_eq!(body["state"]["status"], "WIFI_CONNECTING");
    }

    #[tokio::test]
    async fn test_malformed_body_leaves_state() {
        let (app, dispatcher) = setup();
        let before = dispatcher.current();

        for body in ["{broken", "{}", r#"{"isOpen":"yes"}"#] {
            let response = send(&app, Method::POST, "/api/door/test", body).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {}", body);
            let json = json_body(response).await;
            assert!(json["error"].is_string());
            assert!(json["details"].is_string());
        }

        assert_eq!(dispatcher.current(), before);
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let (app, dispatcher) = setup();
        let before = dispatcher.current();

        for (method, uri) in [
            (Method::DELETE, "/api/door/status"),
            (Method::POST, "/api/door/stream"),
            (Method::GET, "/api/door/test"),
            (Method::PUT, "/api/status"),
            (Method::GET, "/api/webhook"),
        ] {
            let response = send(&app, method.clone(), uri, r#"{"isOpen":true}"#).await;
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{} {}", method, uri);
            assert_eq!(json_body(response).await, json!({ "error": "Method not allowed" }));
        }

        assert_eq!(dispatcher.current(), before);
    }

    #[tokio::test]
    async fn test_options_and_cors() {
        let (app, _) = setup();

        let response = send(&app, Method::OPTIONS, "/api/webhook", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/door/test")
            .header(header::ORIGIN, "http://example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let request = Request::builder()
            .uri("/api/door/status")
            .header(header::ORIGIN, "http://example.com")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_stream_pushes_updates() {
        let (app, dispatcher) = setup();
        let mut events = open_stream(&app).await;

        let initial = events.next_event().await;
        assert_eq!(initial["isOpen"], false);
        assert_eq!(initial["status"], "CLEAR");

        // As if the broker delivered DETECTED.
        dispatcher.apply(DoorUpdate::from_payload("DETECTED"));
        let pushed = events.next_event().await;
        assert_eq!(pushed["isOpen"], true);
        assert_eq!(pushed["status"], "DETECTED");

        send(&app, Method::POST, "/api/door/test", r#"{"isOpen":false}"#).await;
        assert_eq!(events.next_event().await["status"], "CLEAR");
    }

    #[tokio::test]
    async fn test_stream_disconnect_unregisters() {
        let (app, dispatcher) = setup();
        let mut a = open_stream(&app).await;
        let b = open_stream(&app).await;
        let mut c = open_stream(&app).await;
        assert_eq!(dispatcher.subscriber_count(), 3);

        drop(b);
        assert_eq!(dispatcher.subscriber_count(), 2);

        dispatcher.apply(DoorUpdate::from_payload("DETECTED"));
        for events in [&mut a, &mut c] {
            let _initial = events.next_event().await;
            assert_eq!(events.next_event().await["status"], "DETECTED");
        }

        drop(a);
        drop(c);
        assert_eq!(dispatcher.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_writes_resolve_to_one_state() {
        let (app, dispatcher) = setup();

        let (open, closed) = tokio::join!(
            send(&app, Method::POST, "/api/door/test", r#"{"isOpen":true}"#),
            send(&app, Method::POST, "/api/door/test", r#"{"isOpen":false}"#),
        );
        let open = json_body(open).await["state"].clone();
        let closed = json_body(closed).await["state"].clone();

        let last = serde_json::to_value(dispatcher.current()).unwrap();
        assert!(last == open || last == closed);
        assert_eq!(last["isOpen"], last["status"] == "DETECTED");
    }

    #[tokio::test]
    async fn test_shutdown_ends_streams() {
        let dispatcher = Arc::new(Dispatcher::new(StateStore::new(), DEFAULT_STREAM_BUFFER));
        let shutdown = CancellationToken::new();
        let app = router(dispatcher.clone(), shutdown.clone());

        let mut events = open_stream(&app).await;
        let _initial = events.next_event().await;

        shutdown.cancel();
        assert!(events.stream.next().await.is_none());
        drop(events);
        assert_eq!(dispatcher.subscriber_count(), 0);
    }
}
