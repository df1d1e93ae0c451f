//! Request handlers for the door API.

use super::AppState;
use super::error::ApiError;
use super::request::WriteRequest;
use crate::state::DoorState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::{Stream, StreamExt};
use log::{debug, info};
use serde::Serialize;
use std::convert::Infallible;

#[derive(Debug, Serialize)]
pub struct WriteResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub state: DoorState,
}

/// `GET /api/door/status`: current door state.
pub async fn read_state(State(app): State<AppState>) -> Json<DoorState> {
    Json(app.dispatcher.current())
}

/// `GET /api/door/stream`: server-sent events, starting with the current state.
pub async fn stream(
    State(app): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = app.dispatcher.subscribe();
    let events = subscription
        .take_until(app.shutdown.cancelled_owned())
        .map(|payload| Ok::<_, Infallible>(Event::default().data(&*payload)));
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// `POST /api/door/test` and `POST /api/status`: force a door state.
pub async fn force_state(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<Json<WriteResponse>, ApiError> {
    let command = WriteRequest::parse(&body)?.into_command()?;
    debug!("[HTTP] Forced write: {:?}", command);
    let state = app.dispatcher.apply(command.into_update());
    Ok(Json(WriteResponse {
        success: true,
        message: None,
        state,
    }))
}

/// `POST /api/webhook`: broker-relayed sensor message.
pub async fn webhook(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<Json<WriteResponse>, ApiError> {
    let request = WriteRequest::parse(&body)?;
    if let Some(topic) = &request.topic {
        info!("[HTTP] Webhook received for topic {}", topic);
    }
    let command = request.into_command()?;
    let state = app.dispatcher.apply(command.into_update());
    Ok(Json(WriteResponse {
        success: true,
        message: Some("State updated"),
        state,
    }))
}

/// CORS preflight without the CORS headers. Real preflights are answered by
/// the CORS layer before they get here.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
