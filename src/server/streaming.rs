//! SSE stream synthesis from a buffered upstream answer.
//!
//! The upstream is always called in non-streaming mode; this module re-encodes
//! its single JSON answer as a sequence of OpenAI-style `chat.completion.chunk`
//! events, one per space-delimited token, paced by a fixed delay. The stream
//! ends after the last token; no `[DONE]` sentinel is sent.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::Event;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tracing::debug;

use crate::error::RelayError;

// ─── Upstream Response Types ───────────────────────────────────────────────

/// Buffered upstream answer. Every field is defaulted so a partial response
/// decodes to empty/zero values; only an empty `choices` is fatal.
#[derive(Debug, Deserialize)]
pub struct UpstreamResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub system_fingerprint: String,
    #[serde(default)]
    pub choices: Vec<UpstreamChoice>,
}

#[derive(Debug, Deserialize)]
pub struct UpstreamChoice {
    #[serde(default)]
    pub message: UpstreamMessage,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpstreamMessage {
    #[serde(default)]
    pub content: String,
}

// ─── Chunk Types ───────────────────────────────────────────────────────────

/// Streaming chat completion chunk (OpenAI-compatible).
#[derive(Debug, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub system_fingerprint: String,
    pub choices: Vec<ChunkChoice>,
}

/// `logprobs` and `finish_reason` are always serialized, as explicit nulls.
#[derive(Debug, Serialize)]
pub struct ChunkChoice {
    pub index: usize,
    pub delta: ChunkDelta,
    pub logprobs: Option<serde_json::Value>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChunkDelta {
    pub content: String,
}

/// Identity fields shared by every chunk of one synthesized stream.
#[derive(Debug, Clone)]
struct ChunkHead {
    id: String,
    created: u64,
    model: String,
    system_fingerprint: String,
}

impl ChatCompletionChunk {
    fn for_token(head: &ChunkHead, token: String) -> Self {
        Self {
            id: head.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: head.created,
            model: head.model.clone(),
            system_fingerprint: head.system_fingerprint.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta { content: token },
                logprobs: None,
                finish_reason: None,
            }],
        }
    }
}

// ─── Synthesis ─────────────────────────────────────────────────────────────

/// Decode the buffered upstream body and turn it into a paced SSE stream,
/// one chunk per token of `choices[0].message.content`.
///
/// Fails with [`RelayError::UpstreamMalformed`] if the body does not decode
/// or carries no choices. Dropping the returned stream (client disconnect)
/// cancels any in-flight delay and stops synthesis.
pub fn synthesize(
    upstream_body: &[u8],
    token_delay: Duration,
) -> Result<impl Stream<Item = Result<Event, Infallible>>, RelayError> {
    let response: UpstreamResponse = serde_json::from_slice(upstream_body)
        .map_err(|e| RelayError::UpstreamMalformed(e.to_string()))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| RelayError::UpstreamMalformed("response has no choices".to_string()))?;

    let tokens = split_content(&choice.message.content);
    debug!(tokens = tokens.len(), "synthesizing chunk stream");

    let head = ChunkHead {
        id: response.id,
        created: response.created,
        model: response.model,
        system_fingerprint: response.system_fingerprint,
    };

    let stream = tokio_stream::iter(tokens.into_iter().enumerate()).then(move |(i, token)| {
        let head = head.clone();
        async move {
            // Pace consecutive frames; the first goes out immediately.
            if i > 0 {
                tokio::time::sleep(token_delay).await;
            }
            let chunk = ChatCompletionChunk::for_token(&head, token);
            let data = serde_json::to_string(&chunk).unwrap_or_default();
            Ok(Event::default().data(data))
        }
    });

    Ok(stream)
}

/// Split on the literal single-space character. Consecutive spaces produce
/// empty tokens, which are still emitted as empty-content chunks.
fn split_content(content: &str) -> Vec<String> {
    content.split(' ').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt as _;

    #[test]
    fn test_split_preserves_order_and_empties() {
        assert_eq!(split_content("Hello there friend"), ["Hello", "there", "friend"]);
        assert_eq!(split_content("a  b"), ["a", "", "b"]);
        assert_eq!(split_content("trailing "), ["trailing", ""]);
        assert_eq!(split_content(""), [""]);
    }

    #[test]
    fn test_chunk_serialization_shape() {
        let head = ChunkHead {
            id: "chatcmpl-1".to_string(),
            created: 1700000000,
            model: "gpt-4".to_string(),
            system_fingerprint: "fp_abc".to_string(),
        };
        let chunk = ChatCompletionChunk::for_token(&head, "Hello".to_string());
        let json = serde_json::to_value(&chunk).unwrap();

        assert_eq!(json["object"], "chat.completion.chunk");
        assert_eq!(json["id"], "chatcmpl-1");
        assert_eq!(json["system_fingerprint"], "fp_abc");
        assert_eq!(json["choices"][0]["index"], 0);
        assert_eq!(json["choices"][0]["delta"]["content"], "Hello");
        assert!(json["choices"][0]["logprobs"].is_null());
        assert!(json["choices"][0]["finish_reason"].is_null());
    }

    #[tokio::test]
    async fn test_one_event_per_token() {
        let body = serde_json::json!({
            "id": "chatcmpl-1",
            "created": 1700000000u64,
            "model": "gpt-4",
            "system_fingerprint": "fp_abc",
            "choices": [{"message": {"role": "assistant", "content": "Hello there friend"}}]
        });
        let stream =
            synthesize(&serde_json::to_vec(&body).unwrap(), Duration::ZERO).unwrap();
        assert_eq!(stream.count().await, 3);
    }

    #[tokio::test]
    async fn test_partial_upstream_decodes_to_defaults() {
        // A choice with no message still streams: "" splits to one empty token.
        let stream = synthesize(br#"{"choices": [{}]}"#, Duration::ZERO).unwrap();
        assert_eq!(stream.count().await, 1);
    }

    #[test]
    fn test_rejects_invalid_json() {
        let err = synthesize(b"not json", Duration::ZERO).err().unwrap();
        assert!(matches!(err, RelayError::UpstreamMalformed(_)));
    }

    #[test]
    fn test_rejects_missing_choices() {
        let err = synthesize(br#"{"id": "x", "choices": []}"#, Duration::ZERO)
            .err()
            .unwrap();
        assert!(matches!(err, RelayError::UpstreamMalformed(_)));
    }
}
