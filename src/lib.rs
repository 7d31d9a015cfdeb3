//! completion-relay: a single-endpoint chat-completion relay.
//!
//! Sits between an OpenAI-protocol client and one fixed upstream completion
//! API. The upstream is always called in non-streaming mode and its full
//! answer buffered; when the caller asked for `stream: true`, the answer is
//! re-served as a synthesized SSE stream, one `chat.completion.chunk` per
//! space-delimited token with a fixed delay between chunks. Otherwise the
//! buffered body passes through unchanged.

pub mod config;
pub mod error;
pub mod server;
