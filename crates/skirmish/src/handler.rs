//! Per-connection handler: frame decoding and event routing.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! plus a writer task that drains the player's outbound channel. The
//! flow is:
//!   1. Split the socket; spawn the writer
//!   2. Loop: receive envelopes → lobby events go to the manager (and
//!      the map catalog), everything else to the player's room
//!   3. On close, the guard makes the player leave their room

use std::sync::Arc;
use std::time::Instant;

use skirmish_protocol::{Codec, Envelope, PlayerId, ProtocolError, RoomId};
use skirmish_room::{CharacterSheet, ClientEvent, MapCatalog, PlayerSender, RoomError, ServerEvent};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::transport::{ConnectionWriter, WebSocketConnection};
use crate::SkirmishError;

/// Drop guard that takes the player out of their room when the handler
/// exits, however it exits.
///
/// `Drop` is synchronous, so the async leave runs in a spawned task.
struct RoomGuard<M: MapCatalog> {
    player_id: PlayerId,
    state: Arc<ServerState<M>>,
}

impl<M: MapCatalog> Drop for RoomGuard<M> {
    fn drop(&mut self) {
        let player_id = self.player_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut rooms = state.rooms.lock().await;
            if rooms.room_of(player_id).is_some() {
                if let Err(e) = rooms.leave_room(player_id).await {
                    tracing::debug!(%player_id, error = %e, "leave on disconnect failed");
                }
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<M: MapCatalog>(
    conn: WebSocketConnection,
    state: Arc<ServerState<M>>,
) -> Result<(), SkirmishError> {
    let player_id = PlayerId(conn.id());
    let addr = conn.peer_addr();
    tracing::info!(%player_id, %addr, "player connected");

    let (writer, mut reader) = conn.split();
    let (tx, rx) = mpsc::unbounded_channel();
    // Stops once every sender (ours and the room's) is gone.
    tokio::spawn(write_events(writer, rx, state.codec, player_id));

    let _guard = RoomGuard {
        player_id,
        state: Arc::clone(&state),
    };

    loop {
        let data = match reader.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
        };

        let envelope = match decode_event(&state.codec, &data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "rejected inbound frame");
                let _ = tx.send(ServerEvent::Error {
                    code: 400,
                    message: e.to_string(),
                });
                continue;
            }
        };
        tracing::trace!(%player_id, seq = envelope.seq, event = ?envelope.payload, "event received");

        if let Err(e) = dispatch(&state, player_id, envelope.payload, &tx).await {
            report(&tx, player_id, &e);
        }
    }

    Ok(())
}

/// Decodes an envelope and checks the room codes it carries.
fn decode_event<C: Codec>(codec: &C, data: &[u8]) -> Result<Envelope<ClientEvent>, ProtocolError> {
    let envelope: Envelope<ClientEvent> = codec.decode(data)?;
    match &envelope.payload {
        ClientEvent::CreateRoom {
            room_id: Some(room_id),
            ..
        }
        | ClientEvent::JoinRoom { room_id, .. } => room_id.validate()?,
        _ => {}
    }
    Ok(envelope)
}

async fn dispatch<M: MapCatalog>(
    state: &ServerState<M>,
    player_id: PlayerId,
    event: ClientEvent,
    tx: &PlayerSender,
) -> Result<(), RoomError> {
    match event {
        ClientEvent::CreateRoom {
            room_id,
            map_id,
            sheet,
        } => create_room(state, player_id, room_id, &map_id, sheet, tx).await,
        ClientEvent::JoinRoom { room_id, sheet } => {
            let mut rooms = state.rooms.lock().await;
            rooms
                .join_room(player_id, room_id, sheet, tx.clone())
                .await
                .map(|_| ())
        }
        event => {
            let mut rooms = state.rooms.lock().await;
            rooms.route_event(player_id, event).await
        }
    }
}

/// Fetches the layout, spawns the room, and seats the creator as host.
async fn create_room<M: MapCatalog>(
    state: &ServerState<M>,
    player_id: PlayerId,
    requested: Option<RoomId>,
    map_id: &str,
    sheet: CharacterSheet,
    tx: &PlayerSender,
) -> Result<(), RoomError> {
    let layout = state.catalog.fetch(map_id).await?;

    let mut rooms = state.rooms.lock().await;
    if let Some(current) = rooms.room_of(player_id) {
        return Err(RoomError::AlreadyInRoom(player_id, current.clone()));
    }
    let room_id = rooms.create_room(requested, layout)?;
    let _ = tx.send(ServerEvent::RoomCreated {
        room_id: room_id.clone(),
    });
    rooms
        .join_room(player_id, room_id, sheet, tx.clone())
        .await
        .map(|_| ())
}

/// Tells the requester about a failed request, unless it belongs to the
/// silent classes.
fn report(tx: &PlayerSender, player_id: PlayerId, err: &RoomError) {
    if err.is_silent() {
        tracing::debug!(%player_id, error = %err, "request ignored");
        return;
    }
    tracing::debug!(%player_id, error = %err, "request rejected");
    let _ = tx.send(ServerEvent::error(err));
}

/// Drains a player's outbound channel into their socket.
async fn write_events<C: Codec>(
    mut writer: ConnectionWriter,
    mut rx: mpsc::UnboundedReceiver<ServerEvent>,
    codec: C,
    player_id: PlayerId,
) {
    let start = Instant::now();
    let mut seq: u64 = 1;

    while let Some(event) = rx.recv().await {
        let envelope = Envelope::new(next_seq(&mut seq), start.elapsed().as_millis() as u64, event);
        let bytes = match codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%player_id, error = %e, "failed to encode event");
                continue;
            }
        };
        if let Err(e) = writer.send(bytes).await {
            tracing::debug!(%player_id, error = %e, "send failed, stopping writer");
            break;
        }
    }

    let _ = writer.close().await;
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
