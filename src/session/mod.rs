//! Translation session controller.
//!
//! Owns all mutable state for one user session and coordinates the three
//! remote calls that act on it:
//!
//! ```text
//!  set_input ──▶ debounce ──┐
//!  translate_now ───────────┼──▶ OperationSlot ──▶ stream chunks ──▶ output
//!  swap ────────────────────┘        (one at a time)
//!
//!  speak ─────────▶ speech synth ──▶ playback        (reads output)
//!  compose_image ─▶ image compose ─▶ GeneratedImage  (reads output)
//! ```
//!
//! Every mutation goes through the session mutex. Background tasks check
//! their operation id under that mutex before touching the output, so a
//! cancelled or superseded request can never append to it.

mod events;
mod operation;
mod state;

pub use events::{EventReceiver, EventSender, SessionEvent};
pub use operation::{OperationPhase, OperationSlot};
pub use state::{SessionSnapshot, SessionState};

use crate::direction::{Direction, DisplayMode};
use crate::image::ImageComposer;
use crate::playback::AudioPlayer;
use crate::settings::AppSettings;
use crate::speech::SpeechSynthesizer;
use crate::translation::{ChunkDecoder, TranslationTransport};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// Shown when a translation fails before producing any output.
pub const FALLBACK_MESSAGE: &str = "Something went wrong. Try again.";

const SPEECH_FAILED_ALERT: &str = "Could not generate speech. Please try again.";
const IMAGE_FAILED_ALERT: &str = "Could not generate the image. Please try again.";

/// Endpoints and timing for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub english_to_emoji_url: String,
    pub emoji_to_english_url: String,
    /// Quiet period after the last input change before translating
    pub quiet_period: Duration,
}

impl SessionConfig {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            english_to_emoji_url: settings.english_to_emoji_url.clone(),
            emoji_to_english_url: settings.emoji_to_english_url.clone(),
            quiet_period: settings.quiet_period(),
        }
    }

    pub fn endpoint_for(&self, direction: Direction) -> &str {
        match direction {
            Direction::EnglishToEmoji => &self.english_to_emoji_url,
            Direction::EmojiToEnglish => &self.emoji_to_english_url,
        }
    }
}

/// Remote collaborators, injected so they can be swapped out.
#[derive(Clone)]
pub struct SessionServices {
    pub transport: Arc<dyn TranslationTransport>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub player: Arc<dyn AudioPlayer>,
    pub image: Arc<dyn ImageComposer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// Audio was synthesized and is now playing
    Started,
    /// A clip was playing and has been stopped; nothing was requested
    Stopped,
    /// A speech request is already in flight
    Busy,
    /// Current output is not English, or an image is displayed
    NotAvailable,
    NothingToSay,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutcome {
    Generated,
    Busy,
    NotAvailable,
    NothingToCompose,
    Failed,
    /// The direction changed while the request was in flight
    Discarded,
}

struct SessionInner {
    state: Mutex<SessionState>,
    config: SessionConfig,
    services: SessionServices,
    events: EventSender,
    /// Woken whenever the translation slot may have become idle
    slot_released: Notify,
}

/// Handle to a session. Cheap to clone; all clones share the same state.
///
/// Methods that start background work spawn tokio tasks and must be called
/// from within a runtime.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        services: SessionServices,
        direction: Direction,
    ) -> (Self, EventReceiver) {
        let (events, receiver) = mpsc::unbounded_channel();
        let session = Self {
            inner: Arc::new(SessionInner {
                state: Mutex::new(SessionState::new(direction)),
                config,
                services,
                events,
                slot_released: Notify::new(),
            }),
        };
        (session, receiver)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.lock().unwrap().snapshot()
    }

    pub fn has_pending_translation(&self) -> bool {
        self.inner
            .state
            .lock()
            .unwrap()
            .operation
            .has_active_operation()
    }

    /// Resolves once no translation is scheduled or in flight.
    pub async fn wait_for_translation(&self) {
        loop {
            let released = self.inner.slot_released.notified();
            tokio::pin!(released);
            // Register before checking so a release in between is not missed
            released.as_mut().enable();

            if !self.has_pending_translation() {
                return;
            }
            released.await;
        }
    }

    /// Input-change event: drop pending and in-flight work, then translate
    /// after the quiet period.
    pub fn set_input(&self, text: impl Into<String>) {
        let mut guard = self.inner.state.lock().unwrap();
        let state = &mut *guard;
        state.input = text.into();
        self.inner.cancel_translation(state);
        self.spawn_operation(state, Some(self.inner.config.quiet_period));
    }

    /// Explicit trigger: translate the current input right away.
    pub fn translate_now(&self) {
        let mut guard = self.inner.state.lock().unwrap();
        self.begin_translation(&mut guard);
    }

    /// Translate `input` in `direction` right away.
    pub fn translate(&self, input: impl Into<String>, direction: Direction) {
        let mut guard = self.inner.state.lock().unwrap();
        let state = &mut *guard;
        state.input = input.into();
        if state.direction != direction {
            state.direction = direction;
            self.inner.emit(SessionEvent::direction_changed(direction));
        }
        self.begin_translation(state);
    }

    /// Select the source language without translating.
    pub fn set_direction(&self, direction: Direction) {
        let mut guard = self.inner.state.lock().unwrap();
        let state = &mut *guard;
        if state.direction == direction {
            return;
        }
        state.direction = direction;
        self.inner.emit(SessionEvent::direction_changed(direction));
        self.inner.emit(SessionEvent::display_mode_changed(
            direction,
            state.display_mode,
        ));
    }

    /// Exchange direction and texts, then translate the new input.
    pub fn swap(&self) {
        let mut guard = self.inner.state.lock().unwrap();
        let state = &mut *guard;

        self.inner.cancel_translation(state);
        state.direction = state.direction.swapped();
        std::mem::swap(&mut state.input, &mut state.output);
        info!("Swapped direction to {}", state.direction);

        self.inner
            .emit(SessionEvent::direction_changed(state.direction));
        self.inner.emit(SessionEvent::InputReplaced {
            text: state.input.clone(),
        });
        self.inner.emit(SessionEvent::OutputReplaced {
            text: state.output.clone(),
        });
        self.inner.reset_display(state);

        self.begin_translation(state);
    }

    /// Drop all pending work and empty both texts.
    pub fn clear(&self) {
        let mut guard = self.inner.state.lock().unwrap();
        let state = &mut *guard;

        self.inner.cancel_translation(state);
        state.input.clear();
        self.inner.emit(SessionEvent::InputReplaced {
            text: String::new(),
        });
        self.inner.replace_output(state, String::new());
        self.inner.reset_display(state);
    }

    /// Cancel everything, including playback.
    pub fn shutdown(&self) {
        let mut guard = self.inner.state.lock().unwrap();
        let state = &mut *guard;
        self.inner.cancel_translation(state);
        if let Some(mut playback) = state.playback.take() {
            playback.stop();
        }
    }

    fn begin_translation(&self, state: &mut SessionState) {
        self.inner.cancel_translation(state);

        if state.input.trim().is_empty() {
            debug!("Input is empty, clearing output without a request");
            self.inner.replace_output(state, String::new());
            return;
        }

        self.inner.set_loading(state, true);
        self.spawn_operation(state, None);
    }

    fn spawn_operation(&self, state: &mut SessionState, delay: Option<Duration>) {
        let operation_id = match delay {
            Some(_) => state.operation.schedule(),
            None => state.operation.start_streaming(),
        };
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(run_translation(inner, operation_id, delay));
        state.operation.attach(operation_id, task);
    }

    /// Speak the current English output, or stop the clip that is playing.
    pub async fn speak(&self) -> SpeechOutcome {
        let text = {
            let mut guard = self.inner.state.lock().unwrap();
            let state = &mut *guard;

            if state.speech_busy {
                debug!("Speech request already in flight, ignoring");
                return SpeechOutcome::Busy;
            }

            if let Some(mut playback) = state.playback.take() {
                if playback.is_playing() {
                    playback.stop();
                    info!("Stopped speech playback");
                    self.inner.emit(SessionEvent::PlaybackStopped);
                    return SpeechOutcome::Stopped;
                }
            }

            if !state.actions().speech {
                debug!("Speech is not available for {}", state.direction);
                return SpeechOutcome::NotAvailable;
            }

            let text = state.output.trim().to_string();
            if text.is_empty() {
                return SpeechOutcome::NothingToSay;
            }

            state.speech_busy = true;
            self.inner.emit(SessionEvent::SpeechBusy { busy: true });
            text
        };

        let _busy = BusyGuard::new(&self.inner, BusyFlag::Speech);

        let audio = match self.inner.services.speech.synthesize(&text).await {
            Ok(audio) => audio,
            Err(e) => {
                error!("Speech synthesis failed: {:#}", e);
                self.inner.alert(SPEECH_FAILED_ALERT);
                return SpeechOutcome::Failed;
            }
        };

        let player = Arc::clone(&self.inner.services.player);
        let started = tokio::task::spawn_blocking(move || player.play(audio))
            .await
            .map_err(|e| format!("Playback task failed: {}", e))
            .and_then(|result| result);

        match started {
            Ok(playback) => {
                let mut state = self.inner.state.lock().unwrap();
                if let Some(mut previous) = state.playback.replace(playback) {
                    previous.stop();
                }
                self.inner.emit(SessionEvent::PlaybackStarted);
                info!("Playing synthesized speech ({} chars)", text.len());
                SpeechOutcome::Started
            }
            Err(e) => {
                error!("Speech playback failed: {}", e);
                self.inner.alert(SPEECH_FAILED_ALERT);
                SpeechOutcome::Failed
            }
        }
    }

    /// Composite the current emoji output onto the base image.
    pub async fn compose_image(&self) -> ImageOutcome {
        let (emoji, direction) = {
            let mut guard = self.inner.state.lock().unwrap();
            let state = &mut *guard;

            if state.image_busy {
                debug!("Image request already in flight, ignoring");
                return ImageOutcome::Busy;
            }
            if !state.actions().image {
                debug!("Image composition is not available for {}", state.direction);
                return ImageOutcome::NotAvailable;
            }

            let emoji = state.output.trim().to_string();
            if emoji.is_empty() {
                return ImageOutcome::NothingToCompose;
            }

            state.image_busy = true;
            self.inner.emit(SessionEvent::ImageBusy { busy: true });
            (emoji, state.direction)
        };

        let _busy = BusyGuard::new(&self.inner, BusyFlag::Image);

        match self.inner.services.image.compose(&emoji).await {
            Ok(image) => {
                let mut guard = self.inner.state.lock().unwrap();
                let state = &mut *guard;
                if state.direction != direction {
                    warn!("Direction changed while composing, discarding image");
                    return ImageOutcome::Discarded;
                }

                info!(
                    "Generated {} image ({} bytes)",
                    image.mime_type,
                    image.bytes.len()
                );
                state.display_mode = DisplayMode::GeneratedImage;
                state.generated_image = Some(image.clone());
                self.inner.emit(SessionEvent::ImageGenerated { image });
                self.inner.emit(SessionEvent::display_mode_changed(
                    state.direction,
                    state.display_mode,
                ));
                ImageOutcome::Generated
            }
            Err(e) => {
                error!("Image composition failed: {:#}", e);
                self.inner.alert(IMAGE_FAILED_ALERT);
                ImageOutcome::Failed
            }
        }
    }
}

impl SessionInner {
    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn alert(&self, message: &str) {
        self.emit(SessionEvent::Alert {
            message: message.to_string(),
        });
    }

    fn set_loading(&self, state: &mut SessionState, loading: bool) {
        if state.loading != loading {
            state.loading = loading;
            self.emit(SessionEvent::LoadingChanged { loading });
        }
    }

    fn replace_output(&self, state: &mut SessionState, text: String) {
        state.output = text;
        self.emit(SessionEvent::OutputReplaced {
            text: state.output.clone(),
        });
    }

    /// Release the translation slot on behalf of whatever held it.
    fn cancel_translation(&self, state: &mut SessionState) {
        if let Some(operation_id) = state.operation.cancel() {
            debug!("Cancelled translation operation {}", operation_id);
            self.slot_released.notify_waiters();
        }
        self.set_loading(state, false);
    }

    fn reset_display(&self, state: &mut SessionState) {
        if state.display_mode == DisplayMode::TextOutput && state.generated_image.is_none() {
            return;
        }
        state.display_mode = DisplayMode::TextOutput;
        state.generated_image = None;
        self.emit(SessionEvent::display_mode_changed(
            state.direction,
            state.display_mode,
        ));
    }

    /// Called when the operation's timer (if any) has fired. Returns the
    /// endpoint and trimmed message, or None when there is nothing to send.
    fn begin_request(&self, operation_id: u64) -> Option<(String, String)> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;

        if !state.operation.transition_to_streaming(operation_id) {
            return None;
        }

        let message = state.input.trim().to_string();
        if message.is_empty() {
            state.operation.complete(operation_id);
            self.slot_released.notify_waiters();
            self.set_loading(state, false);
            self.replace_output(state, String::new());
            return None;
        }

        self.reset_display(state);
        self.replace_output(state, String::new());
        self.set_loading(state, true);

        let endpoint = self.config.endpoint_for(state.direction).to_string();
        Some((endpoint, message))
    }

    /// Append decoded text if `operation_id` still owns the slot.
    fn append_output(&self, operation_id: u64, text: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        if !state.operation.is_active(operation_id) {
            return false;
        }
        if !text.is_empty() {
            state.output.push_str(text);
            self.emit(SessionEvent::ChunkAppended {
                chunk: text.to_string(),
            });
        }
        true
    }

    async fn stream_into_output(
        &self,
        operation_id: u64,
        endpoint: &str,
        message: &str,
    ) -> anyhow::Result<()> {
        let mut stream = self.services.transport.open(endpoint, message).await?;
        let mut decoder = ChunkDecoder::new();

        while let Some(chunk) = stream.next().await {
            let text = decoder.decode(&chunk?);
            if !self.append_output(operation_id, &text) {
                debug!("Operation {} superseded, dropping stream", operation_id);
                return Ok(());
            }
        }

        self.append_output(operation_id, &decoder.finish());
        Ok(())
    }

    fn finish_request(&self, operation_id: u64, result: anyhow::Result<()>) {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;

        if !state.operation.is_active(operation_id) {
            debug!(
                "Operation {} superseded, discarding its outcome",
                operation_id
            );
            return;
        }

        let failed = match result {
            Ok(()) => false,
            Err(e) => {
                error!("Translation failed: {:#}", e);
                // Partial output is worth more than the fallback message
                if state.output.is_empty() {
                    self.replace_output(state, FALLBACK_MESSAGE.to_string());
                }
                true
            }
        };

        self.set_loading(state, false);
        state.operation.complete(operation_id);
        self.slot_released.notify_waiters();
        self.emit(SessionEvent::TranslationFinished {
            output: state.output.clone(),
            failed,
        });
    }
}

async fn run_translation(inner: Arc<SessionInner>, operation_id: u64, delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let Some((endpoint, message)) = inner.begin_request(operation_id) else {
        return;
    };

    let result = inner
        .stream_into_output(operation_id, &endpoint, &message)
        .await;
    inner.finish_request(operation_id, result);
}

#[derive(Debug, Clone, Copy)]
enum BusyFlag {
    Speech,
    Image,
}

/// Clears a side action's busy flag on every exit path.
struct BusyGuard {
    inner: Arc<SessionInner>,
    flag: BusyFlag,
}

impl BusyGuard {
    fn new(inner: &Arc<SessionInner>, flag: BusyFlag) -> Self {
        Self {
            inner: Arc::clone(inner),
            flag,
        }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let Ok(mut state) = self.inner.state.lock() else {
            return;
        };
        match self.flag {
            BusyFlag::Speech => {
                state.speech_busy = false;
                self.inner.emit(SessionEvent::SpeechBusy { busy: false });
            }
            BusyFlag::Image => {
                state.image_busy = false;
                self.inner.emit(SessionEvent::ImageBusy { busy: false });
            }
        }
    }
}
