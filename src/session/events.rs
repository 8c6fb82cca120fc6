use crate::direction::{ActionAvailability, Direction, DisplayMode};
use crate::image::GeneratedImage;
use serde::Serialize;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Events published by the session for the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionEvent {
    /// Direction changed; labels and placeholder follow it
    DirectionChanged {
        direction: Direction,
        input_label: String,
        output_label: String,
        placeholder: String,
    },
    /// Input text replaced wholesale (swap, clear)
    InputReplaced { text: String },
    /// Output text replaced wholesale (cleared, swapped, fallback message)
    OutputReplaced { text: String },
    /// Streamed text appended to the end of the output
    ChunkAppended { chunk: String },
    LoadingChanged { loading: bool },
    /// A translation settled; cancelled translations never emit this
    TranslationFinished { output: String, failed: bool },
    DisplayModeChanged {
        mode: DisplayMode,
        actions: ActionAvailability,
    },
    ImageGenerated { image: GeneratedImage },
    SpeechBusy { busy: bool },
    ImageBusy { busy: bool },
    PlaybackStarted,
    PlaybackStopped,
    /// User-visible failure notice for the speech and image actions
    Alert { message: String },
}

pub type EventSender = UnboundedSender<SessionEvent>;
pub type EventReceiver = UnboundedReceiver<SessionEvent>;

impl SessionEvent {
    pub fn direction_changed(direction: Direction) -> Self {
        SessionEvent::DirectionChanged {
            direction,
            input_label: direction.input_label(),
            output_label: direction.output_label(),
            placeholder: direction.placeholder().to_string(),
        }
    }

    pub fn display_mode_changed(direction: Direction, mode: DisplayMode) -> Self {
        SessionEvent::DisplayModeChanged {
            mode,
            actions: ActionAvailability::for_state(direction, mode),
        }
    }
}
