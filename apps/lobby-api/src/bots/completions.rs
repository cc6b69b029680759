//! Streaming chat-completion client for the OpenRouter-compatible provider.
//!
//! The provider answers `POST /chat/completions` with an SSE-style body: a
//! sequence of `data: <json>` lines, each carrying at most one text delta at
//! `choices[0].delta.content`, terminated by `data: [DONE]` or by the body
//! simply ending. Network chunks split frames at arbitrary byte boundaries,
//! so decoding buffers until a full line is available.

use serde::Serialize;
use serde_json::Value;

use crate::config::Config;

/// Persona prepended to every completion request.
const SYSTEM_PROMPT: &str = "You are a friendly AI chatbot helping players in a multiplayer game lobby. Don't answer trivia questions unless asked directly. Keep your responses brief, human-like, and casual.";

const MAX_TOKENS: u32 = 200;
const TEMPERATURE: f64 = 0.7;

/// Message role in a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged turn sent to the completion provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// JSON body for `POST /chat/completions`.
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: Vec<ChatTurn>,
    max_tokens: u32,
    temperature: f64,
}

/// Errors from issuing a completion request or reading its stream.
#[derive(Debug)]
pub enum CompletionError {
    /// Transport failure while sending the request or reading the body.
    Transport(reqwest::Error),
    /// The provider answered with a non-success status.
    Status(reqwest::StatusCode),
}

impl std::fmt::Display for CompletionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "completion transport failed: {err}"),
            Self::Status(status) => write!(f, "completion provider returned {status}"),
        }
    }
}

impl std::error::Error for CompletionError {}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err)
    }
}

/// HTTP client for the streaming completion provider.
pub struct CompletionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl CompletionClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.openrouter_url.trim_end_matches('/').to_string(),
            api_key: config.openrouter_api_key.clone(),
            model: config.completion_model.clone(),
        }
    }

    fn build_request(&self, turns: Vec<ChatTurn>) -> CompletionRequest<'_> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(ChatTurn {
            role: Role::System,
            content: SYSTEM_PROMPT.to_string(),
        });
        messages.extend(turns);
        CompletionRequest {
            model: &self.model,
            stream: true,
            messages,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        }
    }

    /// Issue a streaming completion for the given context window. The persona
    /// turn is prepended here; callers pass lobby history only.
    ///
    /// Returns the raw response so the caller can drive the byte stream.
    pub async fn stream_chat(
        &self,
        turns: Vec<ChatTurn>,
    ) -> Result<reqwest::Response, CompletionError> {
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.build_request(turns))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CompletionError::Status(status));
        }
        Ok(resp)
    }
}

/// Incremental decoder for the provider's `data:`-framed body.
///
/// Bytes are buffered until a terminating newline completes a line; lines
/// without a `data:` prefix (blank keep-alives, comments) are discarded.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed one network chunk.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pop the next complete `data:` payload, if a full line is buffered.
    pub fn next_frame(&mut self) -> Option<String> {
        loop {
            let end = self.buf.iter().position(|&b| b == b'\n')?;
            let line: Vec<u8> = self.buf.drain(..=end).collect();
            if let Some(payload) = data_payload(&line) {
                return Some(payload);
            }
        }
    }

    /// Flush a trailing line left unterminated when the body ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buf);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let payload = line.trim().strip_prefix("data:")?.trim_start();
    if payload.is_empty() {
        return None;
    }
    Some(payload.to_string())
}

/// Outcome of decoding one frame payload.
#[derive(Debug, PartialEq)]
pub enum Frame {
    /// An incremental text delta to relay.
    Delta(String),
    /// Nothing to relay: an empty/absent delta, or a malformed payload.
    Skip,
    /// The provider's explicit end-of-stream marker.
    Done,
}

/// Decode one frame payload. A malformed payload is logged and skipped; it
/// never aborts the rest of the stream.
pub fn decode_frame(payload: &str) -> Frame {
    if payload == "[DONE]" {
        return Frame::Done;
    }
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(%err, "skipping malformed completion frame");
            return Frame::Skip;
        }
    };
    match value.pointer("/choices/0/delta/content").and_then(Value::as_str) {
        Some(text) if !text.is_empty() => Frame::Delta(text.to_string()),
        _ => Frame::Skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> CompletionClient {
        CompletionClient::new(&Config {
            openrouter_api_key: "test-key".to_string(),
            openrouter_url: "http://127.0.0.1:9/api/v1/".to_string(),
            completion_model: "anthropic/claude-3-sonnet-20240229".to_string(),
            port: 0,
        })
    }

    #[test]
    fn build_request_prepends_the_persona() {
        let client = test_client();
        let body = serde_json::to_value(client.build_request(vec![
            ChatTurn {
                role: Role::User,
                content: "hi".to_string(),
            },
            ChatTurn {
                role: Role::Assistant,
                content: "hey!".to_string(),
            },
        ]))
        .unwrap();

        assert_eq!(body["model"], "anthropic/claude-3-sonnet-20240229");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 200);
        assert_eq!(body["temperature"], 0.7);

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "system");
        assert!(messages[0]["content"]
            .as_str()
            .unwrap()
            .contains("friendly AI chatbot"));
        assert_eq!(
            messages[1],
            serde_json::json!({"role": "user", "content": "hi"})
        );
        assert_eq!(
            messages[2],
            serde_json::json!({"role": "assistant", "content": "hey!"})
        );
    }

    #[test]
    fn trailing_base_url_slash_is_trimmed() {
        let client = test_client();
        assert_eq!(client.base_url, "http://127.0.0.1:9/api/v1");
    }

    #[test]
    fn frames_split_across_chunks_are_reassembled() {
        let mut frames = FrameBuffer::new();
        frames.extend(b"data: {\"choices\":[{\"delta\":{\"cont");
        assert_eq!(frames.next_frame(), None);

        frames.extend(b"ent\":\"Hel\"}}]}\n\ndata: [DO");
        assert_eq!(
            frames.next_frame().as_deref(),
            Some("{\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}")
        );
        assert_eq!(frames.next_frame(), None);

        frames.extend(b"NE]\n");
        assert_eq!(frames.next_frame().as_deref(), Some("[DONE]"));
        assert_eq!(frames.next_frame(), None);
    }

    #[test]
    fn one_chunk_can_hold_many_frames() {
        let mut frames = FrameBuffer::new();
        frames.extend(b"data: a\ndata: b\n\ndata: c\n");
        assert_eq!(frames.next_frame().as_deref(), Some("a"));
        assert_eq!(frames.next_frame().as_deref(), Some("b"));
        assert_eq!(frames.next_frame().as_deref(), Some("c"));
        assert_eq!(frames.next_frame(), None);
    }

    #[test]
    fn non_data_lines_are_discarded() {
        let mut frames = FrameBuffer::new();
        frames.extend(b": keep-alive\n\nevent: ping\ndata: x\n");
        assert_eq!(frames.next_frame().as_deref(), Some("x"));
    }

    #[test]
    fn finish_flushes_an_unterminated_final_line() {
        let mut frames = FrameBuffer::new();
        frames.extend(b"data: tail");
        assert_eq!(frames.next_frame(), None);
        assert_eq!(frames.finish().as_deref(), Some("tail"));
        assert_eq!(frames.finish(), None);
    }

    #[test]
    fn decode_extracts_deltas() {
        let frame = decode_frame(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#);
        assert_eq!(frame, Frame::Delta("Hi".to_string()));
    }

    #[test]
    fn decode_recognizes_the_done_marker() {
        assert_eq!(decode_frame("[DONE]"), Frame::Done);
    }

    #[test]
    fn decode_skips_empty_and_absent_deltas() {
        assert_eq!(
            decode_frame(r#"{"choices":[{"delta":{"content":""}}]}"#),
            Frame::Skip
        );
        assert_eq!(decode_frame(r#"{"choices":[{"delta":{}}]}"#), Frame::Skip);
        assert_eq!(
            decode_frame(r#"{"choices":[{"finish_reason":"stop"}]}"#),
            Frame::Skip
        );
        assert_eq!(decode_frame(r#"{"choices":[]}"#), Frame::Skip);
    }

    #[test]
    fn decode_skips_malformed_payloads() {
        assert_eq!(decode_frame("{not json"), Frame::Skip);
        assert_eq!(decode_frame("plain words"), Frame::Skip);
    }
}
