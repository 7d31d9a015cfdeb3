//! HTTP server for the chat-completion relay.
//!
//! - [`relay`]: Router, validation, upstream forwarding, response branch
//! - [`streaming`]: SSE chunk synthesis from the buffered upstream answer

pub mod relay;
pub mod streaming;
