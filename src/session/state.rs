use super::operation::OperationSlot;
use crate::direction::{ActionAvailability, Direction, DisplayMode};
use crate::image::GeneratedImage;
use crate::playback::Playback;
use serde::Serialize;

/// Everything a session mutates, kept behind one mutex.
pub struct SessionState {
    pub direction: Direction,
    pub input: String,
    pub output: String,
    pub loading: bool,
    pub display_mode: DisplayMode,
    pub generated_image: Option<GeneratedImage>,
    /// Pending debounce timer or in-flight request, never both
    pub operation: OperationSlot,
    pub playback: Option<Box<dyn Playback>>,
    pub speech_busy: bool,
    pub image_busy: bool,
}

impl SessionState {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            input: String::new(),
            output: String::new(),
            loading: false,
            display_mode: DisplayMode::TextOutput,
            generated_image: None,
            operation: OperationSlot::new(),
            playback: None,
            speech_busy: false,
            image_busy: false,
        }
    }

    pub fn actions(&self) -> ActionAvailability {
        ActionAvailability::for_state(self.direction, self.display_mode)
    }

    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .map(|playback| playback.is_playing())
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            direction: self.direction,
            input: self.input.clone(),
            output: self.output.clone(),
            loading: self.loading,
            display_mode: self.display_mode,
            actions: self.actions(),
            translation_pending: self.operation.has_active_operation(),
            speech_busy: self.speech_busy,
            image_busy: self.image_busy,
            playing: self.is_playing(),
            has_generated_image: self.generated_image.is_some(),
        }
    }
}

/// Read-only copy of the session for rendering and inspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub direction: Direction,
    pub input: String,
    pub output: String,
    pub loading: bool,
    pub display_mode: DisplayMode,
    pub actions: ActionAvailability,
    pub translation_pending: bool,
    pub speech_busy: bool,
    pub image_busy: bool,
    pub playing: bool,
    pub has_generated_image: bool,
}
