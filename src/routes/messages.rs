//! Message query endpoints
//!
//! Implements:
//! - GET /v1/messages - Finalized messages, optionally by type and channel
//! - GET /v1/stats - Pipeline statistics
//! - DELETE /v1/messages - Clear the finalized-message queue

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::MonitorState;
use crate::error::MonitorError;
use crate::message::{ApplicationMessage, MessageType};
use crate::monitor::MonitorStatistics;

/// API version for forward compatibility
pub const API_VERSION: &str = "v1";

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    /// Message type filter; one of the closed set
    #[serde(rename = "type")]
    pub message_type: Option<String>,
    pub channel: Option<String>,
    /// Maximum number of messages to return (newest kept)
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesResponse {
    pub api_version: &'static str,
    pub count: usize,
    pub messages: Vec<ApplicationMessage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub api_version: &'static str,
    pub connected: bool,
    #[serde(flatten)]
    pub statistics: MonitorStatistics,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub api_version: &'static str,
    pub cleared: usize,
}

pub fn message_routes() -> Router<MonitorState> {
    Router::new()
        .route("/messages", get(get_messages).delete(clear_messages))
        .route("/stats", get(get_stats))
}

/// GET /v1/messages - Finalized messages, oldest first
#[instrument(skip(state))]
pub async fn get_messages(
    State(state): State<MonitorState>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<MessagesResponse>, MonitorError> {
    let message_type = query
        .message_type
        .as_deref()
        .map(|raw| {
            MessageType::parse_strict(raw).ok_or_else(|| {
                MonitorError::bad_request(format!("unknown message type '{}'", raw))
            })
        })
        .transpose()?;

    let monitor = state.monitor.read().await;
    let mut messages: Vec<ApplicationMessage> = match message_type {
        Some(message_type) => monitor
            .messages_by_type(message_type, query.channel.as_deref())
            .into_iter()
            .cloned()
            .collect(),
        None => monitor.messages().cloned().collect(),
    };
    drop(monitor);

    if let Some(limit) = query.limit {
        if messages.len() > limit {
            messages.drain(..messages.len() - limit);
        }
    }

    Ok(Json(MessagesResponse {
        api_version: API_VERSION,
        count: messages.len(),
        messages,
    }))
}

/// GET /v1/stats - Pipeline statistics and connection state
#[instrument(skip(state))]
pub async fn get_stats(State(state): State<MonitorState>) -> Json<StatsResponse> {
    let connected = *state.connected.borrow();
    let statistics = state.monitor.read().await.statistics();

    Json(StatsResponse {
        api_version: API_VERSION,
        connected,
        statistics,
    })
}

/// DELETE /v1/messages - Clear the finalized-message queue
#[instrument(skip(state))]
pub async fn clear_messages(State(state): State<MonitorState>) -> Json<ClearResponse> {
    let cleared = state.monitor.write().await.clear_finalized();
    info!(cleared, "Cleared finalized message queue");

    Json(ClearResponse {
        api_version: API_VERSION,
        cleared,
    })
}
