//! Audio playback for synthesized speech clips.
//!
//! Playback runs on its own thread because the output stream is not `Send`
//! on every platform. The returned handle can be polled and stopped from the
//! session.

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A clip that is (or was) playing.
pub trait Playback: Send {
    fn is_playing(&self) -> bool;
    fn stop(&mut self);
}

/// Starts playback of an encoded audio clip.
pub trait AudioPlayer: Send + Sync {
    fn play(&self, audio: Bytes) -> Result<Box<dyn Playback>, String>;
}

/// Shared flags between a playback thread and its handle.
#[derive(Clone, Default)]
struct PlaybackFlags {
    stop_requested: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

pub struct ThreadPlayback {
    flags: PlaybackFlags,
}

impl Playback for ThreadPlayback {
    fn is_playing(&self) -> bool {
        !self.flags.finished.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        self.flags.stop_requested.store(true, Ordering::SeqCst);
    }
}

#[cfg(feature = "playback")]
pub use self::rodio_player::RodioPlayer;

#[cfg(feature = "playback")]
mod rodio_player {
    use super::{AudioPlayer, Playback, PlaybackFlags, ThreadPlayback};
    use bytes::Bytes;
    use log::{debug, error};
    use rodio::{Decoder, OutputStreamBuilder, Sink};
    use std::io::Cursor;
    use std::sync::atomic::Ordering;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    /// Plays clips on the default output device.
    #[derive(Default)]
    pub struct RodioPlayer;

    impl AudioPlayer for RodioPlayer {
        fn play(&self, audio: Bytes) -> Result<Box<dyn Playback>, String> {
            let flags = PlaybackFlags::default();
            let thread_flags = flags.clone();
            let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

            thread::spawn(move || {
                let started = (|| -> Result<(rodio::OutputStream, Sink), String> {
                    let mut stream = OutputStreamBuilder::open_default_stream()
                        .map_err(|e| format!("Failed to open output device: {}", e))?;
                    stream.log_on_drop(false);
                    let source = Decoder::new(Cursor::new(audio))
                        .map_err(|e| format!("Failed to decode audio: {}", e))?;
                    let sink = Sink::connect_new(stream.mixer());
                    sink.append(source);
                    Ok((stream, sink))
                })();

                let (_stream, sink) = match started {
                    Ok(parts) => {
                        let _ = ready_tx.send(Ok(()));
                        parts
                    }
                    Err(e) => {
                        thread_flags.finished.store(true, Ordering::SeqCst);
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while !sink.empty() && !thread_flags.stop_requested.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(50));
                }
                sink.stop();
                thread_flags.finished.store(true, Ordering::SeqCst);
                debug!("Speech playback finished");
            });

            match ready_rx.recv() {
                Ok(Ok(())) => Ok(Box::new(ThreadPlayback { flags })),
                Ok(Err(e)) => {
                    error!("{}", e);
                    Err(e)
                }
                Err(_) => Err("Playback thread exited before starting".to_string()),
            }
        }
    }
}

/// Fallback when built without an audio backend.
#[cfg(not(feature = "playback"))]
#[derive(Default)]
pub struct RodioPlayer;

#[cfg(not(feature = "playback"))]
impl AudioPlayer for RodioPlayer {
    fn play(&self, _audio: Bytes) -> Result<Box<dyn Playback>, String> {
        Err("Audio playback is not available in this build".to_string())
    }
}
