//! Model invocation: client seam, retry/timeout layer, and the
//! schema-tolerant response normalizer.

mod client;
pub mod extract;
mod invoker;

pub use client::{ModelClient, OpenAiClient};
pub use invoker::Invoker;
