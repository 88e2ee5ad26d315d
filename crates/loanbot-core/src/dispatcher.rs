//! Query dispatch and the scripted sales flow.
//!
//! Every user turn is posted to `/ask` together with the full transcript.
//! The reply is classified by its action marker; score and KYC requests
//! call the matching auxiliary endpoint and feed the result back to the
//! agent as a synthetic user turn. Front ends only see [`ChatEvent`]s.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::action::{strip_markers, LoanOffer, ReplyShape};
use crate::agent::{AgentBackend, AskRequest, AskResponse};
use crate::config::DEFAULT_ACTION_DELAY_MS;
use crate::error::Result;
use crate::format::{format_assistant_message, strip_tags};
use crate::transcript::Transcript;

pub const CONNECTION_ERROR: &str = "Sorry, I'm having trouble connecting to the server.";
pub const CREDIT_CHECK_ERROR: &str = "Sorry, I couldn't run the credit check.";
pub const KYC_CHECK_ERROR: &str = "Sorry, I couldn't run the KYC check.";

/// Prefixes of endpoint results that are meant for the agent, not the user.
const TOOL_MESSAGE_PREFIXES: [&str; 2] = [
    "The mock credit evaluation is complete.",
    "Mock KYC check complete.",
];

/// What a front end should show or do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    User(String),
    /// `markup` is formatted for display, `spoken` is the same text without tags.
    Assistant { markup: String, spoken: String },
    Typing(bool),
    Offer(LoanOffer),
    Audio(String),
    /// The transcript was reset. Everything emitted before belongs to the
    /// previous conversation.
    Cleared,
}

/// Endpoint results are injected as user turns but never shown.
pub fn is_tool_message(text: &str) -> bool {
    TOOL_MESSAGE_PREFIXES.iter().any(|p| text.starts_with(p))
}

pub struct Conversation<B: AgentBackend> {
    backend: Arc<B>,
    transcript: Transcript,
    events: UnboundedSender<ChatEvent>,
    action_delay: Duration,
}

impl<B: AgentBackend> Conversation<B> {
    pub fn new(backend: Arc<B>, events: UnboundedSender<ChatEvent>) -> Self {
        Self {
            backend,
            transcript: Transcript::new(),
            events,
            action_delay: Duration::from_millis(DEFAULT_ACTION_DELAY_MS),
        }
    }

    /// Pause between announcing an action and running it.
    pub fn with_action_delay(mut self, delay: Duration) -> Self {
        self.action_delay = delay;
        self
    }

    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = transcript;
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Start over with a fresh sales-flow transcript.
    pub fn reset(&mut self) {
        self.transcript = Transcript::new();
        self.emit(ChatEvent::Cleared);
    }

    /// Send a user turn and follow whatever the agent asks for.
    pub async fn send_query(&mut self, text: &str, is_voice: bool) {
        let query = text.trim();
        if query.is_empty() {
            return;
        }

        self.emit(ChatEvent::User(query.to_string()));
        self.emit(ChatEvent::Typing(true));

        let response = match self.round_trip(query, Some(is_voice)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Error fetching /ask: {}", e);
                self.emit(ChatEvent::Typing(false));
                self.render_assistant(CONNECTION_ERROR);
                return;
            }
        };

        match ReplyShape::classify(&response.response) {
            ReplyShape::GetScore { text } => {
                self.render_assistant(&text);
                self.pause().await;
                self.trigger_mock_score().await;
            }
            ReplyShape::VerifyKyc { text } => {
                self.render_assistant(&text);
                self.pause().await;
                self.trigger_kyc_check().await;
            }
            ReplyShape::OfferSanction { text, offer } => {
                self.emit(ChatEvent::Typing(false));
                self.render_assistant(&text);
                self.emit(ChatEvent::Offer(offer));
            }
            ReplyShape::Plain { text } => {
                self.emit(ChatEvent::Typing(false));
                self.render_assistant(&text);
                if let Some(audio) = response.audio {
                    self.emit(ChatEvent::Audio(self.backend.audio_url(&audio)));
                }
            }
        }
    }

    async fn trigger_mock_score(&mut self) {
        self.emit(ChatEvent::Typing(true));
        match self.backend.mock_score().await {
            Ok(result) => self.send_analysis(&result).await,
            Err(e) => {
                tracing::error!("Error fetching /get_mock_score: {}", e);
                self.emit(ChatEvent::Typing(false));
                self.render_assistant(CREDIT_CHECK_ERROR);
            }
        }
    }

    async fn trigger_kyc_check(&mut self) {
        self.emit(ChatEvent::Typing(true));
        match self.backend.verify_kyc().await {
            Ok(result) => self.send_analysis(&result).await,
            Err(e) => {
                tracing::error!("Error fetching /verify_kyc: {}", e);
                self.emit(ChatEvent::Typing(false));
                self.render_assistant(KYC_CHECK_ERROR);
            }
        }
    }

    /// Feed an endpoint result back to the agent as a user turn.
    ///
    /// Only a sanction offer is acted on here; other markers are dropped.
    async fn send_analysis(&mut self, result: &str) {
        self.transcript.push_user(result);

        let response = match self.round_trip(result, None).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Error sending analysis: {}", e);
                self.emit(ChatEvent::Typing(false));
                return;
            }
        };

        self.emit(ChatEvent::Typing(false));
        match ReplyShape::classify(&response.response) {
            ReplyShape::OfferSanction { text, offer } => {
                self.render_assistant(&text);
                self.emit(ChatEvent::Offer(offer));
            }
            _ => self.render_assistant(&strip_markers(&response.response)),
        }
    }

    async fn round_trip(&mut self, query: &str, is_voice: Option<bool>) -> Result<AskResponse> {
        let request = AskRequest {
            query: query.to_string(),
            history: self.transcript.messages().to_vec(),
            is_voice,
        };
        let response = self.backend.ask(request).await?;
        tracing::debug!(history = response.history.len(), "Transcript replaced");
        self.transcript.replace(response.history.clone());
        Ok(response)
    }

    fn render_assistant(&self, text: &str) {
        if is_tool_message(text) {
            tracing::debug!("Suppressing tool message");
            return;
        }
        let markup = format_assistant_message(text);
        let spoken = strip_tags(&markup);
        self.emit(ChatEvent::Assistant { markup, spoken });
    }

    async fn pause(&self) {
        if !self.action_delay.is_zero() {
            tokio::time::sleep(self.action_delay).await;
        }
    }

    fn emit(&self, event: ChatEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Chat event dropped, receiver closed");
        }
    }
}

/// Requests accepted by a [`ConversationWorker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send { text: String, is_voice: bool },
    Reset,
}

/// Runs a [`Conversation`] on its own task, one command at a time.
pub struct ConversationWorker {
    commands: UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

impl ConversationWorker {
    pub fn spawn<B: AgentBackend + 'static>(mut conversation: Conversation<B>) -> Self {
        let (commands, mut rx): (UnboundedSender<Command>, UnboundedReceiver<Command>) =
            mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Send { text, is_voice } => {
                        conversation.send_query(&text, is_voice).await;
                    }
                    Command::Reset => conversation.reset(),
                }
            }
            tracing::debug!("Conversation worker stopped");
        });

        Self { commands, handle }
    }

    /// Queue a user turn. Returns false if the worker has stopped.
    pub fn send(&self, text: impl Into<String>, is_voice: bool) -> bool {
        self.commands
            .send(Command::Send {
                text: text.into(),
                is_voice,
            })
            .is_ok()
    }

    pub fn reset(&self) -> bool {
        self.commands.send(Command::Reset).is_ok()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_messages_detected() {
        assert!(is_tool_message(
            "The mock credit evaluation is complete. The score is 712. Please analyze this."
        ));
        assert!(is_tool_message("Mock KYC check complete. PAN and Aadhaar details are verified."));
        assert!(!is_tool_message("Your score of 712 qualifies you."));
        // Prefix match only
        assert!(!is_tool_message(" Mock KYC check complete."));
    }
}
