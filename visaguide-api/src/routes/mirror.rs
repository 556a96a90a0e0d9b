//! Mirror Routes
//!
//! Read access to the realtime mirror: a point read of one document and a
//! WebSocket stream of merged writes. Clients that received a 202 watch their
//! composite id here until the document reaches `ready` or `error`.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use visaguide_core::CompositeId;
use visaguide_storage::{InMemoryMirrorStore, MirrorChange};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::telemetry::metrics;
use crate::types::MirrorStreamQuery;

// ============================================================================
// STREAM EVENTS
// ============================================================================

/// Frames sent to a mirror stream subscriber.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MirrorEvent {
    /// Current document at subscribe time, sent once when a filter is set.
    Snapshot {
        document_id: CompositeId,
        document: JsonValue,
    },
    Change {
        document_id: CompositeId,
        document: JsonValue,
    },
    /// The subscriber fell behind and missed `skipped` changes.
    Lagged { skipped: u64 },
}

impl From<MirrorChange> for MirrorEvent {
    fn from(change: MirrorChange) -> Self {
        MirrorEvent::Change {
            document_id: change.document_id,
            document: change.document,
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /api/v1/mirror/{composite_id}
#[utoipa::path(
    get,
    path = "/api/v1/mirror/{composite_id}",
    tag = "Mirror",
    params(("composite_id" = String, Path, description = "Composite id of the request key")),
    responses(
        (status = 200, description = "Current mirror document as a JSON object"),
        (status = 404, description = "No document has been written for this id", body = ApiError),
    ),
)]
pub async fn get_document(
    State(mirror): State<Arc<InMemoryMirrorStore>>,
    Path(document_id): Path<CompositeId>,
) -> ApiResult<impl IntoResponse> {
    let document = mirror
        .get(&document_id)?
        .ok_or_else(|| ApiError::document_not_found(&document_id))?;
    Ok(Json(document))
}

/// GET /api/v1/mirror/ws
///
/// Upgrades to a WebSocket that forwards every merged mirror write, or only
/// writes to `composite_id` when the query names one.
pub async fn stream_changes(
    ws: WebSocketUpgrade,
    State(mirror): State<Arc<InMemoryMirrorStore>>,
    Query(query): Query<MirrorStreamQuery>,
) -> Response {
    let filter = query
        .composite_id
        .filter(|id| !id.trim().is_empty());
    ws.on_upgrade(move |socket| handle_socket(socket, mirror, filter))
}

async fn handle_socket(socket: WebSocket, mirror: Arc<InMemoryMirrorStore>, filter: Option<String>) {
    info!(filter = ?filter, "Mirror stream connected");
    if let Some(m) = metrics() {
        m.ws_connected();
    }

    let (mut sender, mut receiver) = socket.split();
    // Subscribe before the snapshot read so no write falls in between.
    let mut rx = mirror.subscribe();

    if let Some(id) = &filter {
        if let Err(e) = send_snapshot(&mut sender, &mirror, id).await {
            error!(error = %e, "Failed to send mirror snapshot");
            finish();
            return;
        }
    }

    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    debug!("Client sent close frame");
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Text(_)) | Ok(Message::Binary(_)) => {
                    debug!("Ignoring client message on mirror stream");
                }
                Err(e) => {
                    warn!(error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(change) => {
                        if !matches_filter(filter.as_deref(), &change) {
                            continue;
                        }
                        if let Err(e) = send_event(&mut sender, &MirrorEvent::from(change)).await {
                            error!(error = %e, "Failed to send change, closing stream");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Mirror subscriber lagged");
                        if let Err(e) = send_event(&mut sender, &MirrorEvent::Lagged { skipped }).await {
                            error!(error = %e, "Failed to send lag notice");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Mirror change feed closed");
                        break;
                    }
                }
            }
            _ = &mut recv_task => {
                debug!("Mirror stream client went away");
                break;
            }
        }
    }

    recv_task.abort();
    finish();
}

fn finish() {
    if let Some(m) = metrics() {
        m.ws_disconnected();
    }
    info!("Mirror stream disconnected");
}

async fn send_snapshot(
    sender: &mut SplitSink<WebSocket, Message>,
    mirror: &InMemoryMirrorStore,
    id: &str,
) -> Result<(), axum::Error> {
    let document_id = CompositeId::from(id.to_string());
    match mirror.get(&document_id) {
        Ok(Some(document)) => {
            send_event(
                sender,
                &MirrorEvent::Snapshot {
                    document_id,
                    document,
                },
            )
            .await
        }
        Ok(None) => Ok(()),
        Err(e) => {
            warn!(error = %e, "Mirror snapshot read failed");
            Ok(())
        }
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &MirrorEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).map_err(|e| {
        error!(error = %e, "Failed to serialize mirror event");
        axum::Error::new(e)
    })?;
    sender.send(Message::Text(json)).await
}

/// No filter forwards everything.
fn matches_filter(filter: Option<&str>, change: &MirrorChange) -> bool {
    filter.map_or(true, |id| change.document_id.as_str() == id)
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(stream_changes))
        .route("/:composite_id", get(get_document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use visaguide_core::RequestKey;

    fn change_for(key: &RequestKey) -> MirrorChange {
        MirrorChange {
            document_id: key.composite_id(),
            document: serde_json::json!({ "status": "queued" }),
        }
    }

    #[test]
    fn test_filter_matching() {
        let key = RequestKey::new("US", "US", "JP", "Tourism", "eVisa");
        let change = change_for(&key);
        let id = key.composite_id();

        assert!(matches_filter(None, &change));
        assert!(matches_filter(Some(id.as_str()), &change));
        assert!(!matches_filter(Some("GB_GB_JP_Tourism_eVisa_visa"), &change));
    }

    #[test]
    fn test_event_serialization() -> Result<(), serde_json::Error> {
        let key = RequestKey::new("US", "US", "JP", "Tourism", "eVisa");
        let value = serde_json::to_value(MirrorEvent::from(change_for(&key)))?;
        assert_eq!(value["type"], "change");
        assert_eq!(value["document_id"], key.composite_id().as_str());
        assert_eq!(value["document"]["status"], "queued");

        let lagged = serde_json::to_value(MirrorEvent::Lagged { skipped: 3 })?;
        assert_eq!(lagged, serde_json::json!({ "type": "lagged", "skipped": 3 }));
        Ok(())
    }
}
