//! Line-based terminal front-end.
//!
//! A plain line replaces the input and is translated after the quiet period.
//! A line ending in `\` is translated immediately. Lines starting with `:`
//! are commands. Session events are rendered to stdout as they arrive.

use crate::direction::{Direction, DisplayMode, Language};
use crate::session::{
    EventReceiver, ImageOutcome, Session, SessionEvent, SessionSnapshot, SpeechOutcome,
};
use anyhow::{anyhow, Result};
use log::{debug, error, info, warn};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;

const HELP: &str = "\
Type to translate (a trailing \\ translates immediately).
Commands:
  :translate        translate the current input now
  :swap             swap direction, input and output
  :from <language>  translate from english or emoji
  :speak            speak the English output, or stop playback
  :image            composite the emoji output onto the base image
  :clear            clear input and output
  :status           show the session state
  :quit             exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    /// Input changed; translated after the quiet period
    Input(String),
    /// Input submitted; translated right away
    Submit(String),
    Translate,
    Swap,
    From(Language),
    Speak,
    Image,
    Clear,
    Status,
    Help,
    Quit,
}

pub fn parse_line(line: &str) -> Result<ShellCommand, String> {
    let line = line.trim_end_matches(['\r', '\n']);

    let Some(command) = line.strip_prefix(':') else {
        return Ok(match line.strip_suffix('\\') {
            Some(text) => ShellCommand::Submit(text.to_string()),
            None => ShellCommand::Input(line.to_string()),
        });
    };

    let mut words = command.split_whitespace();
    let name = words.next().unwrap_or_default();
    let command = match name {
        "translate" | "t" => ShellCommand::Translate,
        "swap" | "s" => ShellCommand::Swap,
        "from" => {
            let language = words
                .next()
                .ok_or_else(|| "Usage: :from english|emoji".to_string())?;
            ShellCommand::From(language.parse()?)
        }
        "speak" => ShellCommand::Speak,
        "image" => ShellCommand::Image,
        "clear" => ShellCommand::Clear,
        "status" => ShellCommand::Status,
        "help" | "h" | "?" => ShellCommand::Help,
        "quit" | "q" | "exit" => ShellCommand::Quit,
        other => return Err(format!("Unknown command ':{}', try :help", other)),
    };

    if words.next().is_some() {
        return Err(format!("Too many arguments for ':{}'", name));
    }
    Ok(command)
}

fn speech_notice(outcome: SpeechOutcome) -> Option<&'static str> {
    match outcome {
        SpeechOutcome::NotAvailable => Some("Speech is only available for English output"),
        SpeechOutcome::NothingToSay => Some("Nothing to speak yet"),
        SpeechOutcome::Busy => Some("Speech is already being generated"),
        SpeechOutcome::Started | SpeechOutcome::Stopped | SpeechOutcome::Failed => None,
    }
}

fn image_notice(outcome: ImageOutcome) -> Option<&'static str> {
    match outcome {
        ImageOutcome::NotAvailable => Some("Images are only available for emoji output"),
        ImageOutcome::NothingToCompose => Some("Nothing to put on the image yet"),
        ImageOutcome::Busy => Some("An image is already being generated"),
        ImageOutcome::Discarded => Some("Direction changed, image discarded"),
        ImageOutcome::Generated | ImageOutcome::Failed => None,
    }
}

fn format_status(snapshot: &SessionSnapshot) -> String {
    let mut actions = Vec::new();
    if snapshot.actions.speech {
        actions.push(":speak");
    }
    if snapshot.actions.image {
        actions.push(":image");
    }
    format!(
        "{} | input: {:?} | output: {:?} | loading: {} | pending: {} | playing: {} | actions: {}",
        snapshot.direction,
        snapshot.input,
        snapshot.output,
        snapshot.loading,
        snapshot.translation_pending,
        snapshot.playing,
        if actions.is_empty() {
            "none".to_string()
        } else {
            actions.join(" ")
        }
    )
}

/// Writes session events as terminal lines, keeping streamed chunks on one line.
#[derive(Default)]
struct Renderer {
    mid_line: bool,
}

impl Renderer {
    fn line<W: Write>(&mut self, out: &mut W, text: &str) -> io::Result<()> {
        if self.mid_line {
            writeln!(out)?;
            self.mid_line = false;
        }
        writeln!(out, "{}", text)?;
        out.flush()
    }

    fn end_line<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if self.mid_line {
            writeln!(out)?;
            self.mid_line = false;
        }
        out.flush()
    }

    fn write_event<W: Write>(&mut self, out: &mut W, event: &SessionEvent) -> io::Result<()> {
        match event {
            SessionEvent::ChunkAppended { chunk } => {
                write!(out, "{}", chunk)?;
                self.mid_line = true;
                out.flush()
            }
            SessionEvent::OutputReplaced { text } if !text.is_empty() => self.line(out, text),
            SessionEvent::InputReplaced { text } if !text.is_empty() => {
                self.line(out, &format!("> {}", text))
            }
            SessionEvent::TranslationFinished { .. } => self.end_line(out),
            SessionEvent::DirectionChanged {
                input_label,
                output_label,
                placeholder,
                ..
            } => self.line(
                out,
                &format!("[{} | {}] {}", input_label, output_label, placeholder),
            ),
            SessionEvent::DisplayModeChanged { mode, .. } => match mode {
                DisplayMode::GeneratedImage => self.line(out, "[showing generated image]"),
                DisplayMode::TextOutput => self.line(out, "[showing text output]"),
            },
            SessionEvent::SpeechBusy { busy: true } => self.line(out, "(generating speech...)"),
            SessionEvent::ImageBusy { busy: true } => self.line(out, "(generating image...)"),
            SessionEvent::PlaybackStarted => self.line(out, "(playing)"),
            SessionEvent::PlaybackStopped => self.line(out, "(stopped)"),
            SessionEvent::Alert { message } => self.line(out, &format!("! {}", message)),
            _ => Ok(()),
        }
    }
}

async fn render_events(mut events: EventReceiver, output_dir: PathBuf) {
    let mut renderer = Renderer::default();

    while let Some(event) = events.recv().await {
        let result = match &event {
            SessionEvent::ImageGenerated { image } => match image.save_to(&output_dir).await {
                Ok(path) => {
                    info!("Saved generated image to {:?}", path);
                    renderer.line(&mut io::stdout(), &format!("Image saved to {}", path.display()))
                }
                Err(e) => {
                    error!("Failed to save generated image: {:#}", e);
                    renderer.line(&mut io::stdout(), "! Could not save the image.")
                }
            },
            _ => renderer.write_event(&mut io::stdout(), &event),
        };

        if let Err(e) = result {
            warn!("Failed to write to stdout: {}", e);
        }
    }
}

/// Run the interactive shell until `:quit` or end of input.
pub async fn run_shell(session: Session, events: EventReceiver, output_dir: PathBuf) -> Result<()> {
    let render_task = tokio::spawn(render_events(events, output_dir));

    // stdin is read on a plain thread and forwarded to the async loop
    let (line_tx, mut line_rx) = mpsc::channel::<String>(32);
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) => {
                    if line_tx.blocking_send(l).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });

    let snapshot = session.snapshot();
    println!(
        "[{} | {}] {}",
        snapshot.direction.input_label(),
        snapshot.direction.output_label(),
        snapshot.direction.placeholder()
    );
    println!("Type :help for commands.");

    while let Some(line) = line_rx.recv().await {
        let command = match parse_line(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("! {}", message);
                continue;
            }
        };
        debug!("Shell command: {:?}", command);

        match command {
            ShellCommand::Input(text) => session.set_input(text),
            ShellCommand::Submit(text) => {
                let direction = session.snapshot().direction;
                session.translate(text, direction);
            }
            ShellCommand::Translate => session.translate_now(),
            ShellCommand::Swap => session.swap(),
            ShellCommand::From(language) => {
                session.set_direction(Direction::from_source(language))
            }
            ShellCommand::Speak => {
                let session = session.clone();
                tokio::spawn(async move {
                    if let Some(notice) = speech_notice(session.speak().await) {
                        println!("{}", notice);
                    }
                });
            }
            ShellCommand::Image => {
                let session = session.clone();
                tokio::spawn(async move {
                    if let Some(notice) = image_notice(session.compose_image().await) {
                        println!("{}", notice);
                    }
                });
            }
            ShellCommand::Clear => session.clear(),
            ShellCommand::Status => println!("{}", format_status(&session.snapshot())),
            ShellCommand::Help => println!("{}", HELP),
            ShellCommand::Quit => break,
        }
    }

    info!("Shell exiting");
    session.shutdown();
    render_task.abort();
    Ok(())
}

/// Translate `text` once and return the finished output.
pub async fn translate_once(
    session: &Session,
    mut events: EventReceiver,
    text: &str,
    direction: Direction,
) -> Result<String> {
    session.translate(text, direction);
    session.wait_for_translation().await;

    let mut failed = false;
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::TranslationFinished { failed: f, .. } = event {
            failed = f;
        }
    }

    let output = session.snapshot().output;
    if failed {
        return Err(anyhow!("Translation failed: {}", output));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::ActionAvailability;

    fn render(events: &[SessionEvent]) -> String {
        let mut renderer = Renderer::default();
        let mut out = Vec::new();
        for event in events {
            renderer.write_event(&mut out, event).unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_plain_line_is_input_change() {
        assert_eq!(
            parse_line("I love pizza"),
            Ok(ShellCommand::Input("I love pizza".to_string()))
        );
        assert_eq!(parse_line(""), Ok(ShellCommand::Input(String::new())));
    }

    #[test]
    fn test_trailing_backslash_submits() {
        assert_eq!(
            parse_line("good morning\\"),
            Ok(ShellCommand::Submit("good morning".to_string()))
        );
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_line(":swap"), Ok(ShellCommand::Swap));
        assert_eq!(parse_line(":translate"), Ok(ShellCommand::Translate));
        assert_eq!(
            parse_line(":from emoji"),
            Ok(ShellCommand::From(Language::Emoji))
        );
        assert_eq!(parse_line(":quit\r"), Ok(ShellCommand::Quit));
    }

    #[test]
    fn test_parse_command_errors() {
        assert!(parse_line(":from").is_err());
        assert!(parse_line(":from klingon").is_err());
        assert!(parse_line(":dance").is_err());
        assert!(parse_line(":swap now").is_err());
    }

    #[test]
    fn test_streamed_chunks_share_a_line() {
        let output = render(&[
            SessionEvent::OutputReplaced {
                text: String::new(),
            },
            SessionEvent::ChunkAppended {
                chunk: "👋".to_string(),
            },
            SessionEvent::ChunkAppended {
                chunk: "🌍".to_string(),
            },
            SessionEvent::TranslationFinished {
                output: "👋🌍".to_string(),
                failed: false,
            },
        ]);
        assert_eq!(output, "👋🌍\n");
    }

    #[test]
    fn test_alert_breaks_streamed_line() {
        let output = render(&[
            SessionEvent::ChunkAppended {
                chunk: "hel".to_string(),
            },
            SessionEvent::Alert {
                message: "Could not generate speech. Please try again.".to_string(),
            },
        ]);
        assert_eq!(output, "hel\n! Could not generate speech. Please try again.\n");
    }

    #[test]
    fn test_quiet_events_render_nothing() {
        let output = render(&[
            SessionEvent::LoadingChanged { loading: true },
            SessionEvent::SpeechBusy { busy: false },
            SessionEvent::InputReplaced {
                text: String::new(),
            },
        ]);
        assert!(output.is_empty());
    }

    #[test]
    fn test_status_lists_available_actions() {
        let snapshot = SessionSnapshot {
            direction: Direction::EnglishToEmoji,
            input: "pizza".to_string(),
            output: "🍕".to_string(),
            loading: false,
            display_mode: DisplayMode::TextOutput,
            actions: ActionAvailability::for_state(
                Direction::EnglishToEmoji,
                DisplayMode::TextOutput,
            ),
            translation_pending: false,
            speech_busy: false,
            image_busy: false,
            playing: false,
            has_generated_image: false,
        };
        let status = format_status(&snapshot);
        assert!(status.starts_with("English -> Emoji"));
        assert!(status.ends_with("actions: :image"));
    }

    #[test]
    fn test_notices_only_for_skipped_actions() {
        assert!(speech_notice(SpeechOutcome::Started).is_none());
        assert!(speech_notice(SpeechOutcome::NotAvailable).is_some());
        assert!(image_notice(ImageOutcome::Failed).is_none());
        assert!(image_notice(ImageOutcome::Discarded).is_some());
    }
}
