//! Fan-out of streaming bot replies.
//!
//! Each committed human message spawns one detached task per bot in the
//! lobby. Tasks are independent: a slow or failing completion for one bot
//! never blocks another bot, another lobby, or the human message path, which
//! has already been broadcast by the time dispatch runs.

use futures_util::StreamExt;

use crate::gateway::events::{ChatMessage, ServerEvent};
use crate::gateway::fanout::Scope;
use crate::AppState;

use super::completions::{decode_frame, CompletionError, Frame, FrameBuffer};

/// Launch one reply task per bot currently in the lobby.
///
/// Fire-and-forget: there is no cancellation handle or timeout, and the
/// sender disconnecting does not stop an in-flight reply.
pub fn dispatch(state: &AppState, lobby_id: &str) {
    for bot_id in state.lobbies.bot_ids(lobby_id) {
        let state = state.clone();
        let lobby_id = lobby_id.to_string();
        tokio::spawn(async move {
            if let Err(err) = reply(&state, &lobby_id, &bot_id).await {
                tracing::error!(%err, %lobby_id, %bot_id, "bot reply abandoned");
            }
        });
    }
}

/// Stream one completion into the lobby: every delta goes out as `botTyping`,
/// and the assembled reply is committed exactly once at end-of-stream, as a
/// `botMessage` broadcast plus a history entry. An empty assembly still
/// commits, so clients always see the reply finalized.
async fn reply(state: &AppState, lobby_id: &str, bot_id: &str) -> Result<(), CompletionError> {
    let Some(turns) = state.lobbies.context_window(lobby_id) else {
        return Ok(());
    };

    let resp = state.completions.stream_chat(turns).await?;
    let mut body = resp.bytes_stream();
    let mut frames = FrameBuffer::new();
    let mut full = String::new();
    let mut terminated = false;

    'read: while let Some(chunk) = body.next().await {
        frames.extend(&chunk?);
        while let Some(payload) = frames.next_frame() {
            match decode_frame(&payload) {
                Frame::Delta(delta) => relay_delta(state, lobby_id, &mut full, delta),
                Frame::Skip => {}
                Frame::Done => {
                    terminated = true;
                    break 'read;
                }
            }
        }
    }

    // Without an explicit [DONE], the last line may end with the body
    // instead of a newline.
    if !terminated {
        if let Some(payload) = frames.finish() {
            if let Frame::Delta(delta) = decode_frame(&payload) {
                relay_delta(state, lobby_id, &mut full, delta);
            }
        }
    }

    state.broadcast.dispatch(
        Scope::Lobby(lobby_id.to_string()),
        ServerEvent::BotMessage(ChatMessage {
            user: bot_id.to_string(),
            text: full.clone(),
        }),
    );
    state.lobbies.append_bot_reply(lobby_id, bot_id, &full);
    Ok(())
}

fn relay_delta(state: &AppState, lobby_id: &str, full: &mut String, delta: String) {
    full.push_str(&delta);
    state.broadcast.dispatch(
        Scope::Lobby(lobby_id.to_string()),
        ServerEvent::BotTyping { text: delta },
    );
}
