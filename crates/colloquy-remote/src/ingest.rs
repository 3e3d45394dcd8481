use colloquy_types::{ChatError, Result, ThreadId};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::decoder::Utf8StreamDecoder;
use crate::service::{ByteStream, ChatService};

/// Decoded text deltas in arrival order
pub type TextChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Limit on establishing the stream; reads after the first byte are unbounded
    pub open_timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            open_timeout: Duration::from_secs(30),
        }
    }
}

impl IngestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }
}

/// How an ingestion ended when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Stream closed normally; `text` is the complete reply
    Completed { text: String, chunks: usize },
    /// Caller abandoned the stream; `text` is what had been delivered so far
    Abandoned { text: String, chunks: usize },
}

impl IngestOutcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Completed { text, .. } | Self::Abandoned { text, .. } => text,
        }
    }

    pub fn chunks(&self) -> usize {
        match self {
            Self::Completed { chunks, .. } | Self::Abandoned { chunks, .. } => *chunks,
        }
    }

    pub fn is_abandoned(&self) -> bool {
        matches!(self, Self::Abandoned { .. })
    }
}

/// Lazily decode a byte stream into text deltas
///
/// One decoder spans the whole stream. Reads that only carry part of a
/// character yield nothing. The first read error is yielded as
/// `ChatError::Stream` and ends the sequence.
pub fn decode_text_stream(bytes: ByteStream) -> TextChunkStream {
    Box::pin(async_stream::stream! {
        let mut byte_chunks = bytes;
        let mut decoder = Utf8StreamDecoder::new();
        let mut failed = false;

        while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => {
                    let text = decoder.decode(&bytes);
                    if !text.is_empty() {
                        yield Ok(text);
                    }
                }
                Err(e) => {
                    failed = true;
                    yield Err(into_stream_error(e));
                    break;
                }
            }
        }

        let dropped = decoder.finish();
        if dropped > 0 && !failed {
            tracing::warn!(bytes = dropped, "stream ended inside a multi-byte character");
        }
    })
}

fn into_stream_error(e: ChatError) -> ChatError {
    match e {
        ChatError::Stream(_) => e,
        other => ChatError::Stream(other.to_string()),
    }
}

/// Drives a streamed assistant reply into a progress callback
///
/// The callback receives the full text decoded so far, once per non-empty
/// chunk, strictly in arrival order. Nothing is delivered after end of stream,
/// after a read error, or after abandonment.
#[derive(Clone)]
pub struct StreamIngestor {
    service: Arc<dyn ChatService>,
    config: IngestConfig,
}

impl StreamIngestor {
    pub fn new(service: Arc<dyn ChatService>, config: IngestConfig) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub async fn ingest<F>(
        &self,
        thread_id: ThreadId,
        text: &str,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<IngestOutcome>
    where
        F: FnMut(&str) + Send,
    {
        let run_id = Uuid::new_v4();
        tracing::debug!(%run_id, thread_id, "opening reply stream");

        let open = tokio::time::timeout(
            self.config.open_timeout,
            self.service.send_assistant_message_streaming(thread_id, text),
        );

        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(%run_id, thread_id, "stream abandoned before open");
                return Ok(IngestOutcome::Abandoned { text: String::new(), chunks: 0 });
            }
            opened = open => match opened {
                Ok(result) => result?,
                Err(_) => {
                    return Err(ChatError::transport(
                        None,
                        format!("stream open timed out after {:?}", self.config.open_timeout),
                    ));
                }
            },
        };

        let mut deltas = decode_text_stream(bytes);
        let mut accumulated = String::new();
        let mut chunks = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(%run_id, thread_id, chunks, "stream abandoned");
                    return Ok(IngestOutcome::Abandoned { text: accumulated, chunks });
                }
                next = deltas.next() => next,
            };

            match next {
                Some(Ok(delta)) => {
                    accumulated.push_str(&delta);
                    chunks += 1;
                    on_progress(&accumulated);
                }
                Some(Err(e)) => {
                    tracing::warn!(%run_id, thread_id, chunks, error = %e, "stream failed");
                    return Err(e);
                }
                None => break,
            }
        }

        tracing::debug!(%run_id, thread_id, chunks, chars = accumulated.chars().count(), "stream closed");
        Ok(IngestOutcome::Completed {
            text: accumulated,
            chunks,
        })
    }
}
