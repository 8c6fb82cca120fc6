use crate::direction::Language;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "emoji-translator",
    about = "Emoji Translator - English <-> Emoji"
)]
pub struct CliArgs {
    /// Enable debug mode with verbose logging
    #[arg(long)]
    pub debug: bool,

    /// Quiet period in milliseconds before a typed change is translated
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,

    /// Language to translate from (english or emoji)
    #[arg(long, value_name = "LANGUAGE")]
    pub direction: Option<Language>,

    /// Settings store file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Translate this text once, print the result, and exit
    #[arg(long, value_name = "TEXT")]
    pub once: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::parse_from([
            "emoji-translator",
            "--debug",
            "--debounce-ms",
            "350",
            "--direction",
            "emoji",
            "--once",
            "🍕🔥",
        ]);
        assert!(args.debug);
        assert_eq!(args.debounce_ms, Some(350));
        assert_eq!(args.direction, Some(Language::Emoji));
        assert_eq!(args.once.as_deref(), Some("🍕🔥"));
        assert!(args.store.is_none());
    }

    #[test]
    fn test_rejects_unknown_language() {
        assert!(CliArgs::try_parse_from(["emoji-translator", "--direction", "klingon"]).is_err());
    }
}
