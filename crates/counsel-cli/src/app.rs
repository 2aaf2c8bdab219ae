//! Wiring: config, session, storage and backends for one run.

use std::path::PathBuf;
use std::sync::Arc;

use counsel_core::config::Config;
use counsel_core::logging::Transcript;
use counsel_core::speech::{default_sink, SpeechPlayer};
use counsel_core::storage::{FileStorage, HistoryStore};
use counsel_core::view::ChatView;
use counsel_core::{HttpBackend, SessionId};

use crate::cli::Cli;

pub type CliError = Box<dyn std::error::Error + Send + Sync>;

pub struct App {
    pub config: Config,
    pub session: SessionId,
    /// Whether the session id came from the user rather than being generated.
    pub resumed: bool,
    pub data_dir: PathBuf,
    pub ephemeral: bool,
    chat_backend: Arc<HttpBackend>,
    speech_backend: Arc<HttpBackend>,
}

impl App {
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let mut config = match &cli.config {
            Some(path) => Config::load(path)?,
            None => Config::load_default()?,
        };
        config.apply_env(|name| std::env::var(name).ok());
        apply_flags(&mut config, cli);
        config.validate()?;

        let (session, resumed) = match &cli.session {
            Some(raw) => (SessionId::parse(raw)?, true),
            None => (SessionId::new(), false),
        };
        let data_dir = config.data_dir()?;

        let transcript = Arc::new(match &config.transcript_log {
            Some(path) => Transcript::open(path),
            None => Transcript::disabled(),
        });
        let chat_backend = Arc::new(HttpBackend::with_transcript(
            &config.backend_url()?,
            config.request_timeout(),
            Arc::clone(&transcript),
        ));
        let speech_backend = Arc::new(HttpBackend::with_transcript(
            &config.speech_backend_url()?,
            config.request_timeout(),
            transcript,
        ));

        log::info!(
            "Session {} against {} (data in {})",
            session,
            chat_backend.base_url(),
            data_dir.display()
        );

        Ok(Self {
            config,
            session,
            resumed,
            data_dir,
            ephemeral: cli.ephemeral,
            chat_backend,
            speech_backend,
        })
    }

    pub fn history(&self) -> HistoryStore {
        if self.ephemeral {
            HistoryStore::in_memory()
        } else {
            HistoryStore::new(Arc::new(FileStorage::new(&self.data_dir, &self.session)))
        }
    }

    pub fn chat_view(&self) -> ChatView<Arc<HttpBackend>> {
        ChatView::new(
            Arc::clone(&self.chat_backend),
            self.history(),
            self.config.view_settings(),
        )
    }

    pub fn speech_player(&self) -> SpeechPlayer<Arc<HttpBackend>> {
        SpeechPlayer::new(
            Arc::clone(&self.speech_backend),
            default_sink(self.config.audio_player.as_deref()),
        )
    }

    pub fn backend_url(&self) -> &str {
        self.chat_backend.base_url()
    }
}

/// Command-line flags win over the config file and environment.
fn apply_flags(config: &mut Config, cli: &Cli) {
    if let Some(backend) = &cli.backend {
        config.backend = backend.clone();
    }
    if cli.no_typewriter {
        config.typewriter = false;
    }
}
