//! JSON-over-HTTP front of the calendar service.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{
    calendar::{CalendarError, CalendarService},
    event::{Event, EventDraft},
    types::{EventId, UserId},
};

type AppState = Arc<CalendarService>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IdRequest {
    pub id: EventId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UserRequest {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UserDateRequest {
    pub user_id: UserId,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InsertResponse {
    pub id: EventId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsgResponse {
    pub msg: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Calendar failure rendered as `{error}` with a matching status code.
#[derive(Debug)]
pub struct ApiError(CalendarError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CalendarError::DateBusy => StatusCode::CONFLICT,
            CalendarError::EventNotFound(_) => StatusCode::NOT_FOUND,
            CalendarError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            CalendarError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<CalendarError> for ApiError {
    fn from(err: CalendarError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self.0, "request failed");
        }
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(service: Arc<CalendarService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/events/insert", post(insert_event))
        .route("/v1/events/update", post(update_event))
        .route("/v1/events/delete", post(delete_event))
        .route("/v1/events/lookup", post(lookup_event))
        .route("/v1/events/list", post(list_events))
        .route("/v1/events/list/day", post(list_events_day))
        .route("/v1/events/list/week", post(list_events_week))
        .route("/v1/events/list/month", post(list_events_month))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn health() -> &'static str {
    "ok"
}

async fn insert_event(State(svc): State<AppState>, Json(draft): Json<EventDraft>) -> ApiResult<InsertResponse> {
    let id = svc.insert_event(&draft).await?;
    Ok(Json(InsertResponse { id }))
}

async fn update_event(State(svc): State<AppState>, Json(draft): Json<EventDraft>) -> ApiResult<MsgResponse> {
    svc.update_event(&draft).await?;
    Ok(Json(MsgResponse {
        msg: format!("event {} updated", draft.id),
    }))
}

async fn delete_event(State(svc): State<AppState>, Json(req): Json<IdRequest>) -> ApiResult<MsgResponse> {
    svc.delete_event(req.id).await?;
    Ok(Json(MsgResponse {
        msg: format!("event {} deleted", req.id),
    }))
}

async fn lookup_event(State(svc): State<AppState>, Json(req): Json<IdRequest>) -> ApiResult<Event> {
    Ok(Json(svc.lookup_event(req.id).await?))
}

async fn list_events(State(svc): State<AppState>, Json(req): Json<UserRequest>) -> ApiResult<ListResponse> {
    let events = svc.list_events(req.user_id).await?;
    Ok(Json(ListResponse { events }))
}

async fn list_events_day(State(svc): State<AppState>, Json(req): Json<UserDateRequest>) -> ApiResult<ListResponse> {
    let events = svc.list_events_day(req.user_id, req.date).await?;
    Ok(Json(ListResponse { events }))
}

async fn list_events_week(State(svc): State<AppState>, Json(req): Json<UserDateRequest>) -> ApiResult<ListResponse> {
    let events = svc.list_events_week(req.user_id, req.date).await?;
    Ok(Json(ListResponse { events }))
}

async fn list_events_month(State(svc): State<AppState>, Json(req): Json<UserDateRequest>) -> ApiResult<ListResponse> {
    let events = svc.list_events_month(req.user_id, req.date).await?;
    Ok(Json(ListResponse { events }))
}
