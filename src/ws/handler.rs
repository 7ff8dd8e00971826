use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::state::AppState;
use crate::ws::client;

/// Identity resolved upstream by the session layer and handed over as a
/// query parameter. Absent means a guest connection.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// GET /ws — WebSocket upgrade endpoint.
///
/// Guests are admitted under a freshly generated anonymous identity rather
/// than rejected. A present but malformed user id means the session layer
/// handed us garbage; that connection is refused.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let user_id = match params.user_id.as_deref() {
        None | Some("") => Uuid::new_v4(),
        Some(raw) => match Uuid::parse_str(raw) {
            Ok(id) => id,
            Err(_) => {
                tracing::warn!(user_id = raw, "Rejecting upgrade with malformed user id");
                return (StatusCode::BAD_REQUEST, "invalid user id").into_response();
            }
        },
    };

    let max_message_size = state.ws.max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| client::run_connection(socket, state, user_id))
}
