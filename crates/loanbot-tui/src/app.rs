use std::path::PathBuf;
use std::sync::Arc;
use loanbot_core::download::download_sanction_letter;
use loanbot_core::voice::{AudioPlayer, VoiceCapture};
use loanbot_core::{
    AgentBackend, ChatEvent, ConversationWorker, DownloadOffer, DownloadStatus, SpeechSynthesizer,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use crate::tui::AppEvent;

/// One bubble in the chat pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEntry {
    User(String),
    Assistant(String),
    /// Index into `App::offers`
    Offer(usize),
}

/// Services the app drives. Kept separate so tests can swap them.
pub struct Services {
    pub worker: ConversationWorker,
    pub backend: Arc<dyn AgentBackend>,
    pub voice: Option<Arc<VoiceCapture>>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub player: Option<AudioPlayer>,
    pub events: UnboundedSender<AppEvent>,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub server_url: String,
    pub download_dir: PathBuf,

    // Input
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Conversation view
    pub entries: Vec<ChatEntry>,
    pub offers: Vec<DownloadOffer>,
    pub typing: bool,
    pub scroll: u16,
    pub follow_bottom: bool,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations

    // Toggles
    pub tts_enabled: bool,
    pub listening: bool,

    // Footer message (errors, download results)
    pub status: Option<String>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Resets sent to the worker but not yet acknowledged with `Cleared`
    pending_resets: usize,

    services: Services,
    voice_task: Option<JoinHandle<()>>,
}

impl App {
    pub fn new(services: Services, server_url: String, download_dir: PathBuf, tts_enabled: bool) -> Self {
        Self {
            should_quit: false,
            server_url,
            download_dir,
            input: String::new(),
            cursor: 0,
            entries: Vec::new(),
            offers: Vec::new(),
            typing: false,
            scroll: 0,
            follow_bottom: true,
            chat_height: 0,
            chat_width: 0,
            tts_enabled,
            listening: false,
            status: None,
            animation_frame: 0,
            pending_resets: 0,
            services,
            voice_task: None,
        }
    }

    pub fn voice_available(&self) -> bool {
        self.services.voice.is_some()
    }

    /// Hand the current input to the conversation worker.
    pub fn submit(&mut self, is_voice: bool) {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return;
        }
        if !self.services.worker.send(text, is_voice) {
            self.status = Some("Conversation worker stopped".to_string());
            return;
        }
        self.input.clear();
        self.cursor = 0;
        self.follow_bottom = true;
    }

    pub fn apply_chat_event(&mut self, event: ChatEvent) {
        if event == ChatEvent::Cleared {
            self.pending_resets = self.pending_resets.saturating_sub(1);
            return;
        }
        // Output of a conversation the user already cleared
        if self.pending_resets > 0 {
            return;
        }

        match event {
            ChatEvent::User(text) => self.entries.push(ChatEntry::User(text)),
            ChatEvent::Assistant { markup, spoken } => {
                self.entries.push(ChatEntry::Assistant(markup));
                if self.tts_enabled {
                    let locale = self
                        .services
                        .voice
                        .as_ref()
                        .map(|v| v.locale())
                        .unwrap_or(loanbot_core::voice::LOCALE_EN_IN);
                    if let Err(e) = self.services.synthesizer.speak(&spoken, locale) {
                        tracing::warn!("Text-to-speech failed: {}", e);
                    }
                }
            }
            ChatEvent::Typing(on) => self.typing = on,
            ChatEvent::Offer(offer) => {
                self.offers.push(DownloadOffer::new(offer));
                self.entries.push(ChatEntry::Offer(self.offers.len() - 1));
            }
            ChatEvent::Audio(url) => {
                if let Some(player) = &self.services.player {
                    if let Err(e) = player.play(&url) {
                        tracing::warn!("Audio playback failed: {}", e);
                    }
                }
            }
            ChatEvent::Cleared => {}
        }
        self.follow_bottom = true;
    }

    pub fn toggle_tts(&mut self) {
        self.tts_enabled = !self.tts_enabled;
        if !self.tts_enabled {
            self.services.synthesizer.cancel();
        }
    }

    pub fn toggle_mic(&mut self) {
        let Some(voice) = self.services.voice.clone() else {
            self.status = Some("Voice input is not configured".to_string());
            return;
        };

        if self.listening {
            if let Some(task) = self.voice_task.take() {
                task.abort();
            }
            self.listening = false;
            return;
        }

        let events = self.services.events.clone();
        self.listening = true;
        self.voice_task = Some(tokio::spawn(async move {
            let event = match voice.capture().await {
                Ok(transcript) => AppEvent::Transcript(transcript),
                Err(e) => AppEvent::VoiceError(e.to_string()),
            };
            let _ = events.send(event);
        }));
    }

    /// A capture finished: fill the input and send it straight away.
    pub fn on_transcript(&mut self, transcript: Option<String>) {
        self.listening = false;
        self.voice_task = None;
        if let Some(text) = transcript {
            self.input = text;
            self.cursor = self.input.chars().count();
            self.submit(true);
        }
    }

    pub fn on_voice_error(&mut self, message: String) {
        tracing::error!("Speech recognition error: {}", message);
        self.listening = false;
        self.voice_task = None;
        self.status = Some(format!("Speech recognition could not be started: {}", message));
    }

    /// Start downloading the most recent offer that has not been fetched.
    pub fn start_download(&mut self) {
        let Some(index) = self
            .offers
            .iter()
            .rposition(|o| o.status == DownloadStatus::Ready)
        else {
            self.status = Some("No sanction letter to download".to_string());
            return;
        };

        self.offers[index].status = DownloadStatus::Generating;
        let offer = self.offers[index].offer.clone();
        let backend = self.services.backend.clone();
        let dir = self.download_dir.clone();
        let events = self.services.events.clone();

        tokio::spawn(async move {
            let result = download_sanction_letter(backend.as_ref(), &dir, &offer)
                .await
                .map_err(|e| e.to_string());
            let _ = events.send(AppEvent::Download { index, result });
        });
    }

    pub fn on_download(&mut self, index: usize, result: Result<PathBuf, String>) {
        let Some(offer) = self
            .offers
            .get_mut(index)
            .filter(|o| o.status == DownloadStatus::Generating)
        else {
            return;
        };
        match result {
            Ok(path) => {
                self.status = Some(format!("Saved {}", path.display()));
                offer.status = DownloadStatus::Downloaded(path);
            }
            Err(e) => {
                tracing::error!("PDF Download Error: {}", e);
                self.status = Some("PDF generation failed".to_string());
                offer.status = DownloadStatus::Failed(e);
            }
        }
    }

    /// Clear the screen and start a new conversation.
    pub fn reset(&mut self) {
        if self.services.worker.reset() {
            self.pending_resets += 1;
        }
        self.services.synthesizer.cancel();
        if let Some(player) = &self.services.player {
            player.stop();
        }
        self.entries.clear();
        self.offers.clear();
        self.typing = false;
        self.scroll = 0;
        self.follow_bottom = true;
        self.status = None;
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
        self.services.synthesizer.cancel();
        if let Some(player) = &self.services.player {
            player.stop();
        }
        if let Some(task) = self.voice_task.take() {
            task.abort();
        }
        self.services.worker.abort();
    }

    // Chat scrolling
    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_bottom = false;
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_bottom = true;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.typing {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}
