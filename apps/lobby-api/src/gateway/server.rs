//! WebSocket upgrade handling and the per-connection event loop.

use std::collections::HashSet;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use ulid::Ulid;

use crate::bots::orchestrator;
use crate::AppState;

use super::events::{ChatMessage, ClientEvent, ServerEvent};
use super::fanout::Scope;

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// Mint a connection id. It doubles as the participant id in every lobby the
/// connection creates or joins.
fn connection_id() -> String {
    format!("conn_{}", Ulid::new())
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let conn_id = connection_id();
    tracing::info!(%conn_id, "gateway connection established");

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Subscribe before snapshotting so a lobby created in between is not
    // missed; seeing it twice is harmless.
    let mut broadcast_rx = state.broadcast.subscribe();
    let snapshot = ServerEvent::LobbyList(state.lobbies.list());
    if send_event(&mut ws_tx, &snapshot).await.is_err() {
        tracing::debug!(%conn_id, "connection dropped before snapshot delivery");
        return;
    }

    // Lobbies this connection created or joined; scopes broadcast delivery.
    let mut joined: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            inbound = ws_rx.next() => {
                let Some(Ok(msg)) = inbound else {
                    break;
                };
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => handle_event(&state, &conn_id, &mut joined, event),
                        Err(err) => {
                            tracing::debug!(%conn_id, %err, "ignoring unparseable frame");
                        }
                    },
                    Message::Close(_) => break,
                    // Pings are answered by the socket layer; binary frames
                    // and pongs carry nothing for us.
                    _ => {}
                }
            }
            outbound = broadcast_rx.recv() => {
                match outbound {
                    Ok(payload) => {
                        if payload.matches(&joined)
                            && send_event(&mut ws_tx, &payload.event).await.is_err()
                        {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(%conn_id, skipped, "connection lagging behind broadcasts");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    state.lobbies.remove_participant(&conn_id);
    tracing::info!(%conn_id, "gateway connection closed");
}

/// Apply one client event. Runs synchronously between socket polls; all
/// fan-out goes through the broadcast hub, including echoes to the sender.
fn handle_event(
    state: &AppState,
    conn_id: &str,
    joined: &mut HashSet<String>,
    event: ClientEvent,
) {
    match event {
        ClientEvent::CreateLobby { lobby_id } => {
            state.lobbies.create(&lobby_id, conn_id);
            joined.insert(lobby_id.clone());
            tracing::info!(%conn_id, %lobby_id, "lobby created");
            state
                .broadcast
                .dispatch(Scope::Global, ServerEvent::LobbyList(state.lobbies.list()));
        }
        ClientEvent::JoinLobby { lobby_id } => {
            if !state.lobbies.join(&lobby_id, conn_id) {
                tracing::debug!(%conn_id, %lobby_id, "join to unknown lobby dropped");
                return;
            }
            joined.insert(lobby_id.clone());
            state.broadcast.dispatch(
                Scope::Lobby(lobby_id.clone()),
                ServerEvent::System(format!("{conn_id} joined {lobby_id}")),
            );
        }
        ClientEvent::AddBot { lobby_id } => {
            let Some(bot_id) = state.lobbies.add_bot(&lobby_id) else {
                tracing::debug!(%conn_id, %lobby_id, "addBot to unknown lobby dropped");
                return;
            };
            tracing::info!(%lobby_id, %bot_id, "bot added");
            state.broadcast.dispatch(
                Scope::Lobby(lobby_id),
                ServerEvent::System(format!("{bot_id} joined the chat")),
            );
        }
        ClientEvent::Message {
            lobby_id,
            user,
            text,
        } => {
            let message = ChatMessage { user, text };
            if !state.lobbies.post_message(&lobby_id, message.clone()) {
                tracing::debug!(%conn_id, %lobby_id, "message to unknown lobby dropped");
                return;
            }
            state
                .broadcast
                .dispatch(Scope::Lobby(lobby_id.clone()), ServerEvent::Message(message));
            orchestrator::dispatch(state, &lobby_id);
        }
    }
}

async fn send_event(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).unwrap();
    ws_tx.send(Message::Text(json.into())).await
}
