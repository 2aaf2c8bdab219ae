//! Speech playback for the displayed reply.
//!
//! Requests synthesized audio for a piece of text and plays it right away.
//! There is no caching and no way to stop a clip once it starts.
//!
//! Playback goes through an [`AudioSink`]. With the `audio` feature the
//! default sink decodes and plays in-process; otherwise the audio is written
//! to a scratch file and handed to an external player command.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use thiserror::Error;
use uuid::Uuid;

use crate::backend::{Backend, BackendError, SpeechRequest};
use crate::launcher::{spawn_player, LaunchError};

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Playback failed: {0}")]
    Playback(String),
}

/// A clip that is playing (or has played).
///
/// Dropping it leaves playback running; [`Playback::wait`] blocks until the
/// clip ends.
#[derive(Debug, Default)]
pub struct Playback {
    worker: Option<JoinHandle<()>>,
}

impl Playback {
    pub fn finished() -> Self {
        Self::default()
    }

    fn running(worker: JoinHandle<()>) -> Self {
        Self {
            worker: Some(worker),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub fn wait(self) {
        if let Some(worker) = self.worker {
            if worker.join().is_err() {
                log::warn!("Audio playback thread panicked");
            }
        }
    }
}

/// Something that can play an encoded audio clip.
///
/// `play` returns once playback has started, not when it ends.
pub trait AudioSink: Send + Sync {
    fn play(&self, audio: Vec<u8>) -> Result<Playback, SpeechError>;
}

/// Plays clips with an external program.
#[derive(Debug, Clone)]
pub struct CommandSink {
    command: String,
    scratch_dir: PathBuf,
}

impl CommandSink {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            scratch_dir: std::env::temp_dir(),
        }
    }

    pub fn with_scratch_dir(mut self, dir: PathBuf) -> Self {
        self.scratch_dir = dir;
        self
    }
}

impl AudioSink for CommandSink {
    fn play(&self, audio: Vec<u8>) -> Result<Playback, SpeechError> {
        fs::create_dir_all(&self.scratch_dir)?;
        let path = self
            .scratch_dir
            .join(format!("counsel-speech-{}.mp3", Uuid::new_v4()));
        fs::write(&path, &audio)?;

        let mut child = match spawn_player(&self.command, &path) {
            Ok(child) => child,
            Err(e) => {
                let _ = fs::remove_file(&path);
                return Err(e.into());
            }
        };

        // Reap the player and clean up the clip in the background
        let worker = std::thread::spawn(move || {
            match child.wait() {
                Ok(status) if !status.success() => {
                    log::warn!("Audio player exited with {}", status);
                }
                Ok(_) => {}
                Err(e) => log::warn!("Failed to wait for audio player: {}", e),
            }
            let _ = fs::remove_file(&path);
        });

        Ok(Playback::running(worker))
    }
}

/// Plays clips through the default output device.
#[cfg(feature = "audio")]
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeSink;

#[cfg(feature = "audio")]
impl AudioSink for NativeSink {
    fn play(&self, audio: Vec<u8>) -> Result<Playback, SpeechError> {
        let source = rodio::Decoder::new(std::io::Cursor::new(audio))
            .map_err(|e| SpeechError::Playback(format!("Decoder error: {}", e)))?;

        // OutputStream is not Send, so the whole playback lives on one thread
        let worker = std::thread::Builder::new()
            .name("counsel-audio".to_string())
            .spawn(move || {
                let (_stream, handle) = match rodio::OutputStream::try_default() {
                    Ok(output) => output,
                    Err(e) => {
                        log::warn!("Failed to open audio output: {}", e);
                        return;
                    }
                };
                match rodio::Sink::try_new(&handle) {
                    Ok(sink) => {
                        sink.append(source);
                        sink.sleep_until_end();
                    }
                    Err(e) => log::warn!("Sink error: {}", e),
                }
            })?;

        Ok(Playback::running(worker))
    }
}

/// Pick a sink: the configured player command if any, else native audio when
/// built with it, else the platform's default player.
pub fn default_sink(player: Option<&str>) -> Arc<dyn AudioSink> {
    if let Some(command) = player {
        return Arc::new(CommandSink::new(command));
    }

    #[cfg(feature = "audio")]
    {
        Arc::new(NativeSink)
    }
    #[cfg(not(feature = "audio"))]
    {
        Arc::new(CommandSink::new(crate::launcher::default_player_command()))
    }
}

pub struct SpeechPlayer<B: Backend> {
    backend: Arc<B>,
    sink: Arc<dyn AudioSink>,
}

impl<B: Backend> SpeechPlayer<B> {
    pub fn new(backend: B, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            backend: Arc::new(backend),
            sink,
        }
    }

    /// Synthesize `text` and start playing it.
    ///
    /// Empty text plays nothing and sends nothing.
    pub async fn speak(&self, text: &str) -> Result<Playback, SpeechError> {
        if text.trim().is_empty() {
            log::debug!("Nothing to speak");
            return Ok(Playback::finished());
        }

        let backend = Arc::clone(&self.backend);
        let request = SpeechRequest {
            user_input: text.to_string(),
        };
        let audio = tokio::task::spawn_blocking(move || backend.synthesize(&request))
            .await
            .map_err(|e| BackendError::Interrupted(e.to_string()))??;

        log::debug!("Playing {} bytes of speech", audio.len());
        self.sink.play(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ChatRequest, ChatResponse};
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeBackend {
        spoken: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Backend for FakeBackend {
        fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, BackendError> {
            Err(BackendError::Transport("not used".to_string()))
        }

        fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, BackendError> {
            self.spoken.lock().unwrap().push(request.user_input.clone());
            if self.fail {
                return Err(BackendError::Status(500));
            }
            Ok(b"ID3fake-audio".to_vec())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        played: Mutex<Vec<Vec<u8>>>,
    }

    impl AudioSink for RecordingSink {
        fn play(&self, audio: Vec<u8>) -> Result<Playback, SpeechError> {
            self.played.lock().unwrap().push(audio);
            Ok(Playback::finished())
        }
    }

    #[tokio::test]
    async fn speak_requests_and_plays_audio() {
        let backend = Arc::new(FakeBackend::default());
        let sink = Arc::new(RecordingSink::default());
        let player = SpeechPlayer::new(Arc::clone(&backend), sink.clone());

        player.speak("벌금 약 400만 원 예상됩니다.").await.unwrap();

        assert_eq!(
            *backend.spoken.lock().unwrap(),
            vec!["벌금 약 400만 원 예상됩니다.".to_string()]
        );
        assert_eq!(*sink.played.lock().unwrap(), vec![b"ID3fake-audio".to_vec()]);
    }

    #[tokio::test]
    async fn empty_text_sends_nothing() {
        let backend = Arc::new(FakeBackend::default());
        let sink = Arc::new(RecordingSink::default());
        let player = SpeechPlayer::new(Arc::clone(&backend), sink.clone());

        let playback = player.speak("  ").await.unwrap();

        assert!(playback.is_finished());
        assert!(backend.spoken.lock().unwrap().is_empty());
        assert!(sink.played.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn backend_error_is_returned() {
        let backend = Arc::new(FakeBackend {
            fail: true,
            ..Default::default()
        });
        let sink = Arc::new(RecordingSink::default());
        let player = SpeechPlayer::new(Arc::clone(&backend), sink.clone());

        let result = player.speak("text").await;

        assert!(matches!(
            result,
            Err(SpeechError::Backend(BackendError::Status(500)))
        ));
        assert!(sink.played.lock().unwrap().is_empty());
    }

    #[test]
    fn command_sink_reports_missing_player_and_cleans_up() {
        let dir = tempdir().unwrap();
        let sink = CommandSink::new("counsel-definitely-not-a-real-player")
            .with_scratch_dir(dir.path().to_path_buf());

        let result = sink.play(b"audio".to_vec());

        assert!(matches!(result, Err(SpeechError::Launch(LaunchError::Spawn { .. }))));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn command_sink_waits_for_player_and_removes_clip() {
        let dir = tempdir().unwrap();
        let sink = CommandSink::new("true").with_scratch_dir(dir.path().to_path_buf());

        let playback = sink.play(b"audio".to_vec()).unwrap();
        playback.wait();

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn default_sink_plays_through_configured_player() {
        let dir = tempdir().unwrap();
        let copy = dir.path().join("played.mp3");
        let sink = default_sink(Some(&format!("cp {{}} {}", copy.display())));

        let playback = sink.play(b"audio".to_vec()).unwrap();
        playback.wait();

        assert_eq!(fs::read(&copy).unwrap(), b"audio");
    }

    #[test]
    fn default_sink_reports_missing_configured_player() {
        let sink = default_sink(Some("counsel-definitely-not-a-real-player"));

        let result = sink.play(b"audio".to_vec());

        assert!(matches!(result, Err(SpeechError::Launch(LaunchError::Spawn { .. }))));
    }
}
