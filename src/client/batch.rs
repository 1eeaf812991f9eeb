//! Parallel and chunked completion requests.

use super::core::CompletionClient;
use crate::types::{ChatCompletionRequest, ChatCompletionResponse};
use crate::{Error, ErrorContext, Result};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Outcome of one request in a parallel or batched call.
#[derive(Debug)]
pub struct ParallelResponse {
    /// Position of the request in the caller's input.
    pub index: usize,
    pub result: Result<ChatCompletionResponse>,
}

impl ParallelResponse {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn response(&self) -> Option<&ChatCompletionResponse> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&Error> {
        self.result.as_ref().err()
    }
}

/// Runs requests in chunks of `batch_size`, one chunk after another, with at most
/// `max_parallel` requests of a chunk in flight.
pub struct BatchProcessor<'a> {
    client: &'a CompletionClient,
    batch_size: usize,
    max_parallel: usize,
}

impl<'a> BatchProcessor<'a> {
    pub(super) fn new(client: &'a CompletionClient, batch_size: usize, max_parallel: usize) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
            max_parallel: max_parallel.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Results keep input order; `index` counts across chunks.
    pub async fn process_batch(
        &self,
        cancel: &CancellationToken,
        requests: &[ChatCompletionRequest],
    ) -> Vec<ParallelResponse> {
        let mut out = Vec::with_capacity(requests.len());
        for (n, chunk) in requests.chunks(self.batch_size).enumerate() {
            debug!(chunk = n, size = chunk.len(), "processing completion batch");
            let offset = n * self.batch_size;
            out.extend(complete_all(self.client, cancel, chunk, offset, self.max_parallel).await);
        }
        out
    }
}

pub(super) async fn complete_all(
    client: &CompletionClient,
    cancel: &CancellationToken,
    requests: &[ChatCompletionRequest],
    offset: usize,
    limit: usize,
) -> Vec<ParallelResponse> {
    let n = requests.len();
    if n == 0 {
        return Vec::new();
    }

    let mut slots: Vec<Option<Result<ChatCompletionResponse>>> = (0..n).map(|_| None).collect();
    let results: Vec<(usize, Result<ChatCompletionResponse>)> =
        futures::stream::iter(requests.iter().enumerate())
            .map(|(idx, request)| async move {
                (idx, client.create_chat_completion(cancel, request).await)
            })
            .buffer_unordered(limit.max(1))
            .collect()
            .await;

    for (idx, r) in results {
        slots[idx] = Some(r);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(idx, r)| ParallelResponse {
            index: offset + idx,
            result: r.unwrap_or_else(|| {
                Err(Error::runtime_with_context(
                    "batch result missing",
                    ErrorContext::new().with_field_path("client.batch"),
                ))
            }),
        })
        .collect()
}
