//! Periodic trivia broadcasts.
//!
//! Every tick, one question drawn uniformly at random is posted to each
//! existing lobby under the trivia sentinel name. Trivia posts land in
//! history like any other message but are excluded from bot context windows.

use std::time::Duration;

use rand::Rng;
use tokio::time;

use crate::gateway::events::{ChatMessage, ServerEvent};
use crate::gateway::fanout::Scope;
use crate::gateway::registry::TRIVIA_SENDER;
use crate::AppState;

/// Production tick period.
pub const TRIVIA_INTERVAL: Duration = Duration::from_secs(60);

pub struct TriviaQuestion {
    pub question: &'static str,
    pub options: [&'static str; 4],
    pub answer: &'static str,
}

/// The fixed question pool. `answer` rides along with the data; nothing
/// checks answers yet.
pub const TRIVIA_QUESTIONS: [TriviaQuestion; 5] = [
    TriviaQuestion {
        question: "In a multiplayer game lobby, what's a common feature?",
        options: ["Create games", "Cook food", "Book tickets", "Print PDFs"],
        answer: "Create games",
    },
    TriviaQuestion {
        question: "What does 'ready up' mean in a game lobby?",
        options: [
            "Leave the lobby",
            "Prepare to start",
            "Pause the game",
            "Close the app",
        ],
        answer: "Prepare to start",
    },
    TriviaQuestion {
        question: "Which of these is usually shown in a lobby?",
        options: [
            "Weather forecast",
            "Player list",
            "TV guide",
            "Invoice history",
        ],
        answer: "Player list",
    },
    TriviaQuestion {
        question: "What happens when everyone is 'ready' in a game lobby?",
        options: [
            "Game starts",
            "Lobby closes",
            "Chat resets",
            "Scores are deleted",
        ],
        answer: "Game starts",
    },
    TriviaQuestion {
        question: "Which platform is known for real-time multiplayer games?",
        options: ["Unity", "Zoom", "Excel", "Photoshop"],
        answer: "Unity",
    },
];

/// Render a question the way it appears in chat.
pub fn format_question(question: &TriviaQuestion) -> String {
    format!(
        "🎯 Trivia Time!\n{}\nOptions: {}",
        question.question,
        question.options.join(", ")
    )
}

/// Post trivia to every lobby once per `period`, forever. The first tick
/// fires a full period after startup, not immediately.
///
/// Runs as a detached task; production passes [`TRIVIA_INTERVAL`].
pub async fn run(state: AppState, period: Duration) {
    let mut timer = time::interval(period);
    // interval's first tick completes immediately.
    timer.tick().await;

    loop {
        timer.tick().await;
        broadcast_round(&state);
    }
}

/// One tick: draw a question per lobby and post it.
fn broadcast_round(state: &AppState) {
    for lobby_id in state.lobbies.lobby_ids() {
        let pick = rand::thread_rng().gen_range(0..TRIVIA_QUESTIONS.len());
        let text = format_question(&TRIVIA_QUESTIONS[pick]);

        if !state.lobbies.append_trivia(&lobby_id, &text) {
            continue;
        }
        state.broadcast.dispatch(
            Scope::Lobby(lobby_id),
            ServerEvent::Message(ChatMessage {
                user: TRIVIA_SENDER.to_string(),
                text,
            }),
        );
    }
}
