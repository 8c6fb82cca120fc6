use crate::direction::Direction;
use crate::store::SettingsStore;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const SETTINGS_STORE_PATH: &str = "settings_store.json";

/// Store keys that override the bundled speech credentials.
pub const SPEECH_API_KEY_OVERRIDE: &str = "elevenlabs_api_key";
pub const VOICE_ID_OVERRIDE: &str = "elevenlabs_voice_id";

// Environment variable consulted when no image API key is configured
const IMAGE_API_KEY_ENV: &str = "GEMINI_API_KEY";

/* composed into the store's "settings" entry on first run ------------- */
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppSettings {
    #[serde(default = "default_english_to_emoji_url")]
    pub english_to_emoji_url: String,
    #[serde(default = "default_emoji_to_english_url")]
    pub emoji_to_english_url: String,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_speech_base_url")]
    pub speech_base_url: String,
    #[serde(default)]
    pub speech_api_key: String,
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
    #[serde(default = "default_speech_model_id")]
    pub speech_model_id: String,
    #[serde(default = "default_voice_stability")]
    pub voice_stability: f32,
    #[serde(default = "default_voice_similarity_boost")]
    pub voice_similarity_boost: f32,
    #[serde(default = "default_image_base_url")]
    pub image_base_url: String,
    #[serde(default)]
    pub image_api_key: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_base_image_path")]
    pub base_image_path: PathBuf,
    #[serde(default = "default_image_instruction")]
    pub image_instruction: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_debug_mode")]
    pub debug_mode: bool,
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.voice_stability = self.voice_stability.clamp(0.0, 1.0);
        self.voice_similarity_boost = self.voice_similarity_boost.clamp(0.0, 1.0);
        for url in [
            &mut self.english_to_emoji_url,
            &mut self.emoji_to_english_url,
            &mut self.speech_base_url,
            &mut self.image_base_url,
        ] {
            let trimmed = url.trim().trim_end_matches('/').to_string();
            *url = trimmed;
        }
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_english_to_emoji_url() -> String {
    "https://agents.toolhouse.ai/5747d8b7-42f5-4726-b6bf-0137925b0660".to_string()
}

fn default_emoji_to_english_url() -> String {
    "https://agents.toolhouse.ai/f82e21aa-8d08-43d0-bd27-833972613e74".to_string()
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_speech_base_url() -> String {
    "https://api.elevenlabs.io".to_string()
}

fn default_voice_id() -> String {
    "21m00Tcm4TlvDq8ikWAM".to_string()
}

fn default_speech_model_id() -> String {
    "eleven_multilingual_v2".to_string()
}

fn default_voice_stability() -> f32 {
    0.5
}

fn default_voice_similarity_boost() -> f32 {
    0.75
}

fn default_image_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_image_model() -> String {
    "gemini-2.0-flash-preview-image-generation".to_string()
}

fn default_base_image_path() -> PathBuf {
    PathBuf::from("assets/background.png")
}

fn default_image_instruction() -> String {
    "Add the following emoji to this image as large, natural-looking stickers. \
     Keep the original background intact and return only the edited image. Emoji:"
        .to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_debug_mode() -> bool {
    false
}

pub fn get_default_settings() -> AppSettings {
    AppSettings {
        english_to_emoji_url: default_english_to_emoji_url(),
        emoji_to_english_url: default_emoji_to_english_url(),
        direction: Direction::default(),
        debounce_ms: default_debounce_ms(),
        speech_base_url: default_speech_base_url(),
        speech_api_key: String::new(),
        voice_id: default_voice_id(),
        speech_model_id: default_speech_model_id(),
        voice_stability: default_voice_stability(),
        voice_similarity_boost: default_voice_similarity_boost(),
        image_base_url: default_image_base_url(),
        image_api_key: String::new(),
        image_model: default_image_model(),
        base_image_path: default_base_image_path(),
        image_instruction: default_image_instruction(),
        output_dir: default_output_dir(),
        debug_mode: default_debug_mode(),
    }
}

/// Read settings from the store, writing defaults back when they are missing
/// or no longer parse.
pub fn load_or_create_app_settings(store: &SettingsStore) -> AppSettings {
    let mut settings = if let Some(settings_value) = store.get("settings") {
        match serde_json::from_value::<AppSettings>(settings_value) {
            Ok(settings) => {
                debug!("Found existing settings: {:?}", settings);
                settings
            }
            Err(e) => {
                warn!("Failed to parse settings: {}", e);
                let default_settings = get_default_settings();
                write_settings(store, default_settings.clone());
                default_settings
            }
        }
    } else {
        let default_settings = get_default_settings();
        write_settings(store, default_settings.clone());
        default_settings
    };

    settings.normalize();
    settings
}

pub fn write_settings(store: &SettingsStore, settings: AppSettings) {
    let mut normalized = settings;
    normalized.normalize();

    match serde_json::to_value(&normalized) {
        Ok(value) => store.set("settings", value),
        Err(e) => {
            warn!("Failed to serialize settings: {}", e);
            return;
        }
    }

    if let Err(e) = store.save() {
        warn!("{}", e);
    }
}

/// Fully resolved parameters for the speech endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechConfig {
    pub base_url: String,
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
}

impl SpeechConfig {
    /// Store overrides win over the values in `settings`.
    pub fn resolve(settings: &AppSettings, store: &SettingsStore) -> Self {
        let api_key = store
            .get_string(SPEECH_API_KEY_OVERRIDE)
            .unwrap_or_else(|| settings.speech_api_key.trim().to_string());
        let voice_id = store
            .get_string(VOICE_ID_OVERRIDE)
            .unwrap_or_else(|| settings.voice_id.trim().to_string());

        Self {
            base_url: settings.speech_base_url.clone(),
            api_key,
            voice_id,
            model_id: settings.speech_model_id.clone(),
            stability: settings.voice_stability,
            similarity_boost: settings.voice_similarity_boost,
        }
    }
}

/// Fully resolved parameters for the image endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub base_image_path: PathBuf,
    pub instruction: String,
}

impl ImageConfig {
    /// Falls back to the `GEMINI_API_KEY` environment variable when no key is
    /// configured. Read fresh on each call to pick up runtime changes.
    pub fn resolve(settings: &AppSettings) -> Self {
        let mut api_key = settings.image_api_key.trim().to_string();
        if api_key.is_empty() {
            if let Ok(env_key) = env::var(IMAGE_API_KEY_ENV) {
                let trimmed = env_key.trim();
                if !trimmed.is_empty() {
                    debug!("Using image API key from {}", IMAGE_API_KEY_ENV);
                    api_key = trimmed.to_string();
                }
            }
        }

        Self {
            base_url: settings.image_base_url.clone(),
            api_key,
            model: settings.image_model.clone(),
            base_image_path: settings.base_image_path.clone(),
            instruction: settings.image_instruction.clone(),
        }
    }
}
