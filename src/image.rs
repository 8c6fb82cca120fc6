use crate::settings::ImageConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseModalities")]
    response_modalities: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(rename = "inlineData", alias = "inline_data")]
    inline_data: Option<ResponseInlineData>,
}

#[derive(Debug, Deserialize)]
struct ResponseInlineData {
    #[serde(rename = "mimeType", alias = "mime_type")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

/// A decoded image returned by the generation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl GeneratedImage {
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }

    /// Write the image into `dir` and return the file path.
    pub async fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {:?}", dir))?;
        let path = dir.join(format!("emoji-composite.{}", self.extension()));
        tokio::fs::write(&path, &self.bytes)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?;
        Ok(path)
    }
}

/// Composites an emoji string onto the configured base image.
#[async_trait]
pub trait ImageComposer: Send + Sync {
    async fn compose(&self, emoji: &str) -> Result<GeneratedImage>;
}

pub struct GeminiImageClient {
    client: reqwest::Client,
    config: ImageConfig,
}

/// Mime type from the file's magic bytes, falling back to the extension.
fn sniff_mime_type(path: &Path, bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        return "image/png";
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return "image/webp";
    }
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

impl GeminiImageClient {
    pub fn new(config: ImageConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url, self.config.model, self.config.api_key
        )
    }

    fn build_request(&self, emoji: &str, base_image: &[u8]) -> GeminiRequest {
        let mime_type = sniff_mime_type(&self.config.base_image_path, base_image);
        GeminiRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: format!("{} {}", self.config.instruction, emoji),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: mime_type.to_string(),
                            data: general_purpose::STANDARD.encode(base_image),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["TEXT", "IMAGE"],
            },
        }
    }
}

fn extract_image(response: GeminiResponse) -> Result<GeneratedImage> {
    if let Some(feedback) = response.prompt_feedback {
        if let Some(block_reason) = feedback.block_reason {
            return Err(anyhow!("Image request was blocked: {}", block_reason));
        }
    }

    let inline = response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .find_map(|part| part.inline_data)
        .ok_or_else(|| anyhow!("No image in generation response"))?;

    let bytes = general_purpose::STANDARD
        .decode(inline.data.trim())
        .map_err(|e| anyhow!("Failed to decode generated image: {}", e))?;

    Ok(GeneratedImage {
        mime_type: inline.mime_type,
        bytes,
    })
}

#[async_trait]
impl ImageComposer for GeminiImageClient {
    async fn compose(&self, emoji: &str) -> Result<GeneratedImage> {
        let base_image = tokio::fs::read(&self.config.base_image_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to read base image {:?}",
                    self.config.base_image_path
                )
            })?;

        let request = self.build_request(emoji, &base_image);
        debug!(
            "Sending image request for '{}' ({} byte base image)",
            emoji,
            base_image.len()
        );

        let response = self
            .client
            .post(self.url())
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Image request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse image response: {}", e))?;

        extract_image(parsed)
    }
}
