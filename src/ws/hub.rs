//! Connection registry and event fan-out.
//!
//! The hub owns two indices: user id → live connections, and room id →
//! subscribed connections. Every operation serializes through one mutex, so
//! registration, subscription, and broadcast observe a single total order.
//! Critical sections never touch the transport: enqueueing onto a mailbox is
//! `try_send`, and a full mailbox drops the frame for that one connection
//! instead of stalling the fan-out.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::event::{PresenceStatus, ServerEvent};

/// Process-unique identifier for one WebSocket connection.
pub type ConnId = u64;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Cloneable handle to one live connection: its identity plus the sender
/// half of its bounded outbound mailbox.
///
/// Senders exist only inside the registry indices and in the connection
/// task's own handle. [`Hub::unregister`] consumes that last handle, so the
/// mailbox closes exactly once, strictly after the connection has left
/// every index.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnId,
    pub user_id: Uuid,
    tx: mpsc::Sender<Message>,
}

impl ConnectionHandle {
    pub fn new(user_id: Uuid, tx: mpsc::Sender<Message>) -> Self {
        Self {
            id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
            user_id,
            tx,
        }
    }
}

#[derive(Default)]
struct HubState {
    /// User id → live connections. A user with multiple tabs has one entry
    /// holding several handles. Emptied entries are removed.
    clients: HashMap<Uuid, Vec<ConnectionHandle>>,
    /// Room id → subscribed connections, keyed by connection id.
    rooms: HashMap<String, HashMap<ConnId, ConnectionHandle>>,
    /// Reverse index: rooms each connection has joined, for cleanup.
    /// An entry exists iff the connection is registered.
    memberships: HashMap<ConnId, HashSet<String>>,
}

/// The realtime hub: authoritative registry of live connections and the
/// fan-out point for every published event.
///
/// Constructed once at startup and shared via `Arc`; publish operations are
/// fire-and-forget and never return an error to the caller.
pub struct Hub {
    state: Mutex<HubState>,
}

impl Hub {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HubState::default()),
        }
    }

    /// Admit a connection.
    ///
    /// The new connection receives an `online_list` snapshot of the users
    /// online before it joined. If this is its owner's first live
    /// connection, a `user_status: online` transition is broadcast to
    /// everyone — emitted after the lock is released, since the broadcast
    /// path re-acquires it.
    pub fn register(&self, handle: &ConnectionHandle) {
        let (first, online) = {
            let mut guard = self.state.lock().expect("hub state lock poisoned");
            let state = &mut *guard;
            let online: Vec<Uuid> = state.clients.keys().copied().collect();
            let conns = state.clients.entry(handle.user_id).or_default();
            conns.push(handle.clone());
            state.memberships.insert(handle.id, HashSet::new());
            (conns.len() == 1, online)
        };

        if let Some(msg) = (ServerEvent::OnlineList { user_ids: online }).to_message() {
            enqueue(handle, &msg);
        }
        if first {
            self.broadcast_all(&ServerEvent::UserStatus {
                user_id: handle.user_id,
                status: PresenceStatus::Online,
            });
        }

        tracing::debug!(
            conn_id = handle.id,
            user_id = %handle.user_id,
            first_connection = first,
            "Connection registered"
        );
    }

    /// Remove a connection from its owner's collection and from every room
    /// it joined, deleting emptied entries. If this was its owner's last
    /// live connection, a `user_status: offline` transition is broadcast.
    ///
    /// Takes the handle by value: dropping it on return releases the final
    /// mailbox sender, which is what signals the writer loop to stop.
    pub fn unregister(&self, handle: ConnectionHandle) {
        let last = {
            let mut guard = self.state.lock().expect("hub state lock poisoned");
            let state = &mut *guard;

            let mut removed = false;
            let mut emptied = false;
            if let Some(conns) = state.clients.get_mut(&handle.user_id) {
                let before = conns.len();
                conns.retain(|c| c.id != handle.id);
                removed = conns.len() != before;
                emptied = conns.is_empty();
            }
            if emptied {
                state.clients.remove(&handle.user_id);
            }

            if let Some(joined) = state.memberships.remove(&handle.id) {
                for room_id in joined {
                    let room_emptied = match state.rooms.get_mut(&room_id) {
                        Some(members) => {
                            members.remove(&handle.id);
                            members.is_empty()
                        }
                        None => false,
                    };
                    if room_emptied {
                        state.rooms.remove(&room_id);
                    }
                }
            }

            removed && emptied
        };

        if last {
            self.broadcast_all(&ServerEvent::UserStatus {
                user_id: handle.user_id,
                status: PresenceStatus::Offline,
            });
        }

        tracing::debug!(
            conn_id = handle.id,
            user_id = %handle.user_id,
            last_connection = last,
            "Connection unregistered"
        );
    }

    /// Join a room. Idempotent; a handle that is no longer registered is
    /// not re-admitted.
    pub fn subscribe(&self, handle: &ConnectionHandle, room_id: &str) {
        if room_id.is_empty() {
            return;
        }
        let mut guard = self.state.lock().expect("hub state lock poisoned");
        let state = &mut *guard;
        let Some(joined) = state.memberships.get_mut(&handle.id) else {
            return;
        };
        if !joined.insert(room_id.to_string()) {
            return;
        }
        state
            .rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(handle.id, handle.clone());
        tracing::debug!(user_id = %handle.user_id, room_id, "Joined room");
    }

    /// Leave a room. Leaving a room the connection never joined is a no-op.
    pub fn unsubscribe(&self, handle: &ConnectionHandle, room_id: &str) {
        let mut guard = self.state.lock().expect("hub state lock poisoned");
        let state = &mut *guard;
        if let Some(joined) = state.memberships.get_mut(&handle.id) {
            joined.remove(room_id);
        }
        let emptied = match state.rooms.get_mut(room_id) {
            Some(members) => {
                members.remove(&handle.id);
                members.is_empty()
            }
            None => false,
        };
        if emptied {
            state.rooms.remove(room_id);
        }
        tracing::debug!(user_id = %handle.user_id, room_id, "Left room");
    }

    /// Fan an event out to every live connection, system-wide.
    pub fn broadcast_all(&self, event: &ServerEvent) {
        let Some(msg) = event.to_message() else { return };
        let state = self.state.lock().expect("hub state lock poisoned");
        for conns in state.clients.values() {
            for conn in conns {
                enqueue(conn, &msg);
            }
        }
    }

    /// Fan an event out to the connections subscribed to one room.
    /// An unknown room id is a no-op, not an error.
    pub fn broadcast_to_room(&self, room_id: &str, event: &ServerEvent) {
        let Some(msg) = event.to_message() else { return };
        let state = self.state.lock().expect("hub state lock poisoned");
        if let Some(members) = state.rooms.get(room_id) {
            for conn in members.values() {
                enqueue(conn, &msg);
            }
        }
    }

    /// Deliver an event to every live connection of one user. A user with
    /// no live connection receives nothing; there is no offline queue.
    pub fn send_to_user(&self, user_id: Uuid, event: &ServerEvent) {
        let Some(msg) = event.to_message() else { return };
        let state = self.state.lock().expect("hub state lock poisoned");
        if let Some(conns) = state.clients.get(&user_id) {
            for conn in conns {
                enqueue(conn, &msg);
            }
        }
    }

    /// Snapshot of user ids with at least one live connection.
    pub fn online_users(&self) -> Vec<Uuid> {
        let state = self.state.lock().expect("hub state lock poisoned");
        state.clients.keys().copied().collect()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-blocking enqueue onto one connection's mailbox. A full mailbox means
/// a stalled reader; the frame is dropped for that connection only. A closed
/// mailbox means the connection is mid-teardown and is ignored.
fn enqueue(conn: &ConnectionHandle, msg: &Message) {
    match conn.tx.try_send(msg.clone()) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!(
                conn_id = conn.id,
                user_id = %conn.user_id,
                "Mailbox full, dropping frame"
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {}
    }
}
