//! Translation direction and the presentation state derived from it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One side of a translation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Emoji,
}

impl Language {
    pub fn other(self) -> Self {
        match self {
            Language::English => Language::Emoji,
            Language::Emoji => Language::English,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Emoji => "Emoji",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "english" | "en" => Ok(Language::English),
            "emoji" | "emojis" => Ok(Language::Emoji),
            other => Err(format!("Unknown language '{}'", other)),
        }
    }
}

/// Which of the two translation modes is active.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    EnglishToEmoji,
    EmojiToEnglish,
}

impl Direction {
    /// Direction whose source is `from`; the destination is always the other side.
    pub fn from_source(from: Language) -> Self {
        match from {
            Language::English => Direction::EnglishToEmoji,
            Language::Emoji => Direction::EmojiToEnglish,
        }
    }

    pub fn source(self) -> Language {
        match self {
            Direction::EnglishToEmoji => Language::English,
            Direction::EmojiToEnglish => Language::Emoji,
        }
    }

    pub fn target(self) -> Language {
        self.source().other()
    }

    pub fn swapped(self) -> Self {
        Direction::from_source(self.target())
    }

    pub fn output_is_emoji(self) -> bool {
        self.target() == Language::Emoji
    }

    pub fn input_label(self) -> String {
        format!("From {}", self.source().label())
    }

    pub fn output_label(self) -> String {
        format!("To {}", self.target().label())
    }

    pub fn placeholder(self) -> &'static str {
        match self {
            Direction::EnglishToEmoji => "Type something in English...",
            Direction::EmojiToEnglish => "Paste or type emojis...",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source().label(), self.target().label())
    }
}

/// Whether the session presents streamed text or a generated composite image.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    TextOutput,
    GeneratedImage,
}

/// Side actions the presentation layer should offer right now.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionAvailability {
    pub speech: bool,
    pub image: bool,
}

impl ActionAvailability {
    /// Speech needs English output, image needs emoji output, and a displayed
    /// composite hides both.
    pub fn for_state(direction: Direction, mode: DisplayMode) -> Self {
        if mode == DisplayMode::GeneratedImage {
            return Self {
                speech: false,
                image: false,
            };
        }
        Self {
            speech: !direction.output_is_emoji(),
            image: direction.output_is_emoji(),
        }
    }
}
