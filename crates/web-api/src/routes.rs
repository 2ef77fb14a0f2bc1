use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use application::{services::DEFAULT_HISTORY_LIMIT, PollWithResults};
use domain::SessionId;

use crate::{error::ApiError, state::AppState, ws::websocket_upgrade};

const MAX_HISTORY_LIMIT: u32 = 100;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/polls/history", get(get_history))
        .route("/polls/current", get(get_current))
        .route("/ws", get(websocket_upgrade))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<PollWithResults>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    let polls = state.poll_service.history(limit).await?;
    Ok(Json(polls))
}

#[derive(Debug, Deserialize)]
struct CurrentQuery {
    participant_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct CurrentStateBody {
    poll: Option<PollWithResults>,
    has_voted: bool,
}

async fn get_current(
    State(state): State<AppState>,
    Query(query): Query<CurrentQuery>,
) -> Result<Json<CurrentStateBody>, ApiError> {
    let poll = state.poll_service.latest_with_results().await?;

    let session = query
        .participant_id
        .and_then(|raw| SessionId::parse(raw).ok());
    let has_voted = match (&poll, session) {
        (Some(poll), Some(session)) => state.vote_service.has_voted(poll.id, &session).await?,
        _ => false,
    };

    Ok(Json(CurrentStateBody { poll, has_voted }))
}
