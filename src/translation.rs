//! Streaming client for the two translation agents.
//!
//! Each agent takes `{"message": ...}` and answers with a plain-text body
//! that arrives in arbitrary byte chunks. `ChunkDecoder` turns those chunks
//! into text without splitting multi-byte characters, which matters a lot
//! for emoji (four bytes each, often split across network reads).

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use log::debug;
use reqwest::StatusCode;
use serde::Serialize;

/// Lazy, finite, non-restartable sequence of body chunks.
pub type ChunkStream = BoxStream<'static, Result<Bytes>>;

#[derive(Debug, Serialize)]
struct TranslationRequest<'a> {
    message: &'a str,
}

/// Opens the response stream for one translation request.
#[async_trait]
pub trait TranslationTransport: Send + Sync {
    async fn open(&self, endpoint: &str, message: &str) -> Result<ChunkStream>;
}

pub struct HttpTranslationClient {
    client: reqwest::Client,
}

impl HttpTranslationClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TranslationTransport for HttpTranslationClient {
    async fn open(&self, endpoint: &str, message: &str) -> Result<ChunkStream> {
        debug!("Sending translation request to: {}", endpoint);

        let response = self
            .client
            .post(endpoint)
            .json(&TranslationRequest { message })
            .send()
            .await
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Translation request failed with status {}", status));
        }

        if status == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
            return Err(anyhow!("Translation response has no body"));
        }

        Ok(response
            .bytes_stream()
            .map_err(|e| anyhow!("Failed to read response chunk: {}", e))
            .boxed())
    }
}

/// Incremental UTF-8 decoder, the equivalent of a streaming text decoder.
///
/// Bytes of an incomplete trailing character are held back until the next
/// chunk; invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    pending: Vec<u8>,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // valid_up_to always lands on a char boundary
                    out.push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        None => {
                            // Incomplete sequence at the end, wait for more bytes
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush at end of stream; leftover bytes become a single U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}
