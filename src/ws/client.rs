//! Per-connection read and write loops.
//!
//! Each connection runs two loops: the reader (this task) parses inbound
//! command frames and enforces the read deadline, while the writer (spawned)
//! drains the bounded mailbox to the socket and sends keepalive pings.
//! Either loop failing tears the connection down through a single cleanup
//! path that unregisters exactly once.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use uuid::Uuid;

use super::event::ClientCommand;
use super::hub::ConnectionHandle;
use crate::state::AppState;

/// Drive one upgraded WebSocket until it disconnects.
pub async fn run_connection(socket: WebSocket, state: AppState, user_id: Uuid) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<Message>(state.ws.mailbox_capacity);

    let handle = ConnectionHandle::new(user_id, tx);
    state.hub.register(&handle);

    tracing::info!(user_id = %user_id, conn_id = handle.id, "WebSocket connected");

    let pong_wait = state.ws.pong_wait();
    let mut writer = tokio::spawn(write_loop(
        ws_sender,
        rx,
        state.ws.ping_period(),
        state.ws.write_wait(),
    ));
    let mut writer_done = false;

    // Read loop. The timeout is the read deadline: any inbound frame,
    // including keepalive pongs, refreshes it.
    loop {
        tokio::select! {
            _ = &mut writer => {
                writer_done = true;
                break;
            }
            next = timeout(pong_wait, ws_receiver.next()) => match next {
                Err(_) => {
                    tracing::debug!(conn_id = handle.id, "Read deadline expired, closing");
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    tracing::debug!(conn_id = handle.id, error = %e, "WebSocket receive error");
                    break;
                }
                Ok(Some(Ok(msg))) => match msg {
                    Message::Text(text) => handle_command(&state, &handle, text.as_str()),
                    Message::Close(_) => break,
                    // axum answers pings itself; pongs and stray binary
                    // frames only count as liveness.
                    _ => {}
                },
            }
        }
    }

    // Unregister drops the last mailbox sender, which is what tells the
    // writer loop to send a close frame and stop.
    let conn_id = handle.id;
    state.hub.unregister(handle);
    if !writer_done {
        let _ = writer.await;
    }

    tracing::info!(user_id = %user_id, conn_id, "WebSocket disconnected");
}

/// Parse one inbound command envelope and apply it. Malformed frames and
/// unknown actions are ignored, not errors.
fn handle_command(state: &AppState, handle: &ConnectionHandle, text: &str) {
    let cmd: ClientCommand = match serde_json::from_str(text) {
        Ok(cmd) => cmd,
        Err(_) => {
            tracing::debug!(conn_id = handle.id, "Ignoring malformed command frame");
            return;
        }
    };
    match cmd.action.as_str() {
        "join_room" => state.hub.subscribe(handle, &cmd.payload),
        "leave_room" => state.hub.unsubscribe(handle, &cmd.payload),
        other => {
            tracing::debug!(conn_id = handle.id, action = other, "Ignoring unknown action");
        }
    }
}

/// Writer loop: drains the mailbox to the socket and sends keepalive pings
/// on a timer. Every write carries a deadline so a stalled peer cannot park
/// the loop. Mailbox closure (unregister) sends a final close frame.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Message>,
    ping_period: Duration,
    write_wait: Duration,
) {
    let mut keepalive = interval(ping_period);
    // The first tick fires immediately; skip it.
    keepalive.tick().await;

    loop {
        tokio::select! {
            maybe = rx.recv() => match maybe {
                Some(msg) => {
                    match timeout(write_wait, sink.send(msg)).await {
                        Ok(Ok(())) => {}
                        _ => return,
                    }
                }
                None => {
                    let close = Message::Close(Some(CloseFrame {
                        code: 1000,
                        reason: "".into(),
                    }));
                    let _ = timeout(write_wait, sink.send(close)).await;
                    return;
                }
            },
            _ = keepalive.tick() => {
                match timeout(write_wait, sink.send(Message::Ping(Vec::new().into()))).await {
                    Ok(Ok(())) => {}
                    _ => return,
                }
            }
        }
    }
}
