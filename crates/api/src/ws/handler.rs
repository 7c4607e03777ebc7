use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt, stream::SplitSink};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use sfu_core::protocol::{ClientRequest, Reply};
use sfu_core::{Peer, Room};

use crate::state::AppState;

type Outbox = Arc<Mutex<SplitSink<WebSocket, Message>>>;

pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One connection, one `join-room`. Peer identity is established entirely
/// through the first `join-room` request's `peerId` — there is no
/// pre-established auth/session layer for this signaling path.
struct Connection {
    room: Arc<Room>,
    peer: Arc<Peer>,
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let outbox: Outbox = Arc::new(Mutex::new(ws_sender));
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();

    let writer_outbox = outbox.clone();
    let writer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let mut sender = writer_outbox.lock().await;
            if let Err(e) = send_json(&mut sender, &event).await {
                warn!(%e, "failed to deliver server event, dropping connection writer");
                break;
            }
        }
    });

    let mut conn: Option<Connection> = None;

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_message(&state, &outbox, &events_tx, &mut conn, &text).await;
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                warn!(%e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    if let Some(Connection { room, peer }) = conn.take() {
        let peer_id = peer.id.clone();
        info!(room_id = %room.id, %peer_id, "connection closed, tearing down peer");
        // Drop our own handle before tearing down so the room's is the last
        // one standing: teardown_peer drops it to force the Peer's owned
        // transports closed ahead of the `peer-left` broadcast.
        drop(peer);
        state.dispatcher.teardown_peer(&room, &peer_id);
    }

    drop(events_tx);
    let _ = writer.await;
}

async fn handle_message(
    state: &AppState,
    outbox: &Outbox,
    events_tx: &mpsc::UnboundedSender<sfu_core::protocol::ServerEvent>,
    conn: &mut Option<Connection>,
    text: &str,
) {
    let request: ClientRequest = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            debug!(%e, "failed to parse client request");
            send_error(outbox, "malformed request").await;
            return;
        }
    };

    match request {
        ClientRequest::JoinRoom { room_id, peer_id } => {
            if conn.is_some() {
                send_error(outbox, "peer already joined a room on this connection").await;
                return;
            }
            match state
                .dispatcher
                .join_room(&room_id, &peer_id, events_tx.clone())
                .await
            {
                Ok((room, reply)) => {
                    let peer = room.get_peer(&peer_id).expect("just inserted");
                    send_reply(outbox, &reply).await;
                    state.dispatcher.announce_peer_joined(&room, &peer_id);
                    *conn = Some(Connection { room, peer });
                }
                Err(e) => send_error(outbox, &e.client_message()).await,
            }
        }
        other => {
            let Some(Connection { room, peer }) = conn.as_ref() else {
                send_error(outbox, "join-room must be the first request on a connection").await;
                return;
            };
            handle_joined_request(state, outbox, room, peer, other).await;
        }
    }
}

async fn handle_joined_request(
    state: &AppState,
    outbox: &Outbox,
    room: &Arc<Room>,
    peer: &Arc<Peer>,
    request: ClientRequest,
) {
    match request {
        ClientRequest::JoinRoom { .. } => unreachable!("handled by caller"),
        ClientRequest::ConnectTransport {
            transport_id,
            dtls_parameters,
        } => {
            match state
                .dispatcher
                .connect_transport(peer, &transport_id, dtls_parameters)
                .await
            {
                Ok(reply) => send_reply(outbox, &reply).await,
                Err(e) => send_error(outbox, &e.client_message()).await,
            }
        }
        ClientRequest::Produce {
            transport_id,
            kind,
            rtp_parameters,
        } => match state
            .dispatcher
            .produce(peer, &transport_id, kind, rtp_parameters)
            .await
        {
            Ok((reply, descriptor)) => {
                // Ack the producing peer before fanning the new-producer
                // event out to the rest of the room.
                send_reply(outbox, &reply).await;
                state.dispatcher.announce_producer(room, descriptor);
            }
            Err(e) => send_error(outbox, &e.client_message()).await,
        },
        ClientRequest::Consume {
            transport_id,
            producer_id,
            rtp_capabilities,
        } => {
            match state
                .dispatcher
                .consume(room, peer, &transport_id, &producer_id, rtp_capabilities)
                .await
            {
                Ok(reply) => send_reply(outbox, &reply).await,
                Err(e) => send_error(outbox, &e.client_message()).await,
            }
        }
        ClientRequest::ResumeConsumer { consumer_id } => {
            match state.dispatcher.resume_consumer(peer, &consumer_id).await {
                Ok(reply) => send_reply(outbox, &reply).await,
                Err(e) => send_error(outbox, &e.client_message()).await,
            }
        }
        ClientRequest::GetProducers => {
            let reply = state.dispatcher.get_producers(room, peer);
            send_reply(outbox, &reply).await;
        }
    }
}

async fn send_reply(outbox: &Outbox, reply: &Reply) {
    let mut sender = outbox.lock().await;
    if let Err(e) = send_json(&mut sender, reply).await {
        warn!(%e, "failed to deliver ack");
    }
}

async fn send_error(outbox: &Outbox, message: &str) {
    let mut sender = outbox.lock().await;
    if let Err(e) = send_json(&mut sender, &serde_json::json!({ "error": message })).await {
        warn!(%e, "failed to deliver error ack");
    }
}

async fn send_json<T: Serialize>(
    sender: &mut SplitSink<WebSocket, Message>,
    payload: &T,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(payload).unwrap_or_default();
    sender.send(Message::text(text)).await
}
