use std::{sync::Arc, time::Duration};

use axum::{
    debug_handler,
    extract::{
        ws::{Message, Utf8Bytes, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::mpsc;

use crate::{
    config::Config,
    eventlog::EventLog,
    registry::{Participant, RoomRegistry},
    AppError, AppResult,
};

use super::msg::{self, Peer, Relay};

/// How long a finished session waits for its writer to flush and close the socket.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_ws(
    Path((room_id, user_id, username)): Path<(String, String, String)>,
    State(registry): State<Arc<RoomRegistry>>,
    State(event_log): State<EventLog>,
    State(config): State<Arc<Config>>,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    if room_id.trim().is_empty() {
        return Err(AppError::bad_request("room id must not be empty"));
    }

    let peer = Peer { room_id, user_id, username };
    Ok(ws
        .on_upgrade(move |socket| session(socket, peer, registry, event_log, config))
        .into_response())
}

/// Drives one connection from join to leave.
async fn session(
    socket: WebSocket,
    peer: Peer,
    registry: Arc<RoomRegistry>,
    event_log: EventLog,
    config: Arc<Config>,
) {
    let (sink, mut stream) = socket.split();
    let (outbound, rx) = mpsc::channel(config.outbound_buffer);

    let participant = Participant::new(&peer.user_id, &peer.username, outbound);
    let conn = participant.id();
    let users_count = registry.register(&peer.room_id, participant);
    tracing::info!(room = %peer.room_id, user = %peer.user_id, %conn, users_count, "user joined");
    registry.broadcast(&peer.room_id, &msg::user_joined(&peer, users_count), Some(conn));

    let mut writer = tokio::spawn(write_loop(sink, rx));
    let relay = Relay {
        registry: &registry,
        event_log: &event_log,
        peer: &peer,
        conn,
    };

    let writer_done = tokio::select! {
        _ = read_loop(&mut stream, &relay) => false,
        _ = &mut writer => {
            tracing::debug!(room = %peer.room_id, %conn, "outbound transport closed");
            true
        }
    };

    // drops the registry's sender, which ends the writer once its queue is drained
    let users_count = registry.deregister(&peer.room_id, conn);
    tracing::info!(room = %peer.room_id, user = %peer.user_id, %conn, users_count, "user left");
    registry.broadcast(&peer.room_id, &msg::user_left(&peer, users_count), None);

    if !writer_done && tokio::time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
        tracing::debug!(room = %peer.room_id, %conn, "writer did not finish, aborting");
        writer.abort();
    }
}

async fn read_loop(stream: &mut SplitStream<WebSocket>, relay: &Relay<'_>) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => relay.handle(text),
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(_)) => {
                tracing::debug!(room = %relay.peer.room_id, "ignoring binary frame");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(room = %relay.peer.room_id, conn = %relay.conn, error = %e, "transport error");
                break;
            }
        }
    }
}

async fn write_loop(mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Utf8Bytes>) {
    while let Some(text) = rx.recv().await {
        if sink.send(Message::Text(text)).await.is_err() {
            break;
        }
    }

    let _ = sink.close().await;
}
