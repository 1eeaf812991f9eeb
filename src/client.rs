//! Cached chat completion client.
//!
//! Requests are forwarded unchanged. The semantic cache answers repeats and the
//! retrying transport carries the rest.

mod batch;
mod builder;
mod core;

pub use batch::{BatchProcessor, ParallelResponse};
pub use builder::CompletionClientBuilder;
pub use self::core::{CompletionClient, DEFAULT_BASE_URL};
