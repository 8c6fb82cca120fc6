use crate::settings::SpeechConfig;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::Serialize;

const XI_API_KEY_HEADER: &str = "xi-api-key";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

/// Turns text into an encoded audio clip.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Bytes>;
}

pub struct ElevenLabsClient {
    client: reqwest::Client,
    config: SpeechConfig,
}

fn build_headers(api_key: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("audio/mpeg"));
    if !api_key.is_empty() {
        headers.insert(
            XI_API_KEY_HEADER,
            HeaderValue::from_str(api_key)
                .map_err(|e| anyhow!("Invalid API key header value: {}", e))?,
        );
    }
    Ok(headers)
}

impl ElevenLabsClient {
    pub fn new(config: SpeechConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .default_headers(build_headers(&config.api_key)?)
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}",
            self.config.base_url, self.config.voice_id
        )
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str) -> Result<Bytes> {
        let url = self.url();
        debug!("Sending speech request to: {} ({} chars)", url, text.len());

        let request = SpeechRequest {
            text,
            model_id: &self.config.model_id,
            voice_settings: VoiceSettings {
                stability: self.config.stability,
                similarity_boost: self.config.similarity_boost,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(anyhow!(
                "Speech request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| anyhow!("Failed to read audio response: {}", e))?;
        if audio.is_empty() {
            return Err(anyhow!("Speech response contained no audio"));
        }

        debug!("Received {} bytes of audio", audio.len());
        Ok(audio)
    }
}
