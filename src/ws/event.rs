//! Event frames exchanged over the realtime channel.
//!
//! Outbound frames are a closed tagged union serialized as
//! `{"type": <tag>, "payload": <payload>}`. Inbound frames are a minimal
//! command envelope; unknown actions are ignored so older servers stay
//! compatible with newer clients.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Presence values carried by `user_status` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// Server→client event frames.
///
/// Payload shapes owned by the CRUD layer (full comment documents) stay
/// opaque [`Value`]s; everything the hub itself produces is strongly typed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full comment document, broadcast to the article's discussion room.
    NewComment(Value),
    CommentDeleted { id: Uuid },
    CommentRestored { id: Uuid },
    /// Admin dashboards refetch the named module when this arrives.
    AdminDataUpdated { module: String, action: String },
    AccountLocked { message: String },
    RoleUpdated { message: String },
    UserStatus { user_id: Uuid, status: PresenceStatus },
    OnlineList { user_ids: Vec<Uuid> },
}

impl ServerEvent {
    /// The wire tag, for logging.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::NewComment(_) => "new_comment",
            Self::CommentDeleted { .. } => "comment_deleted",
            Self::CommentRestored { .. } => "comment_restored",
            Self::AdminDataUpdated { .. } => "admin_data_updated",
            Self::AccountLocked { .. } => "account_locked",
            Self::RoleUpdated { .. } => "role_updated",
            Self::UserStatus { .. } => "user_status",
            Self::OnlineList { .. } => "online_list",
        }
    }

    /// Serialize once; the same frame is cloned to every recipient.
    pub fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(text) => Some(Message::Text(text.into())),
            Err(e) => {
                tracing::warn!(tag = self.tag(), error = %e, "Failed to serialize event frame");
                None
            }
        }
    }
}

/// Client→server command envelope: `{"action": ..., "payload": ...}`.
#[derive(Debug, Deserialize)]
pub struct ClientCommand {
    pub action: String,
    #[serde(default)]
    pub payload: String,
}
