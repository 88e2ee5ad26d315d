pub mod action;
pub mod agent;
pub mod config;
pub mod dispatcher;
pub mod download;
pub mod error;
pub mod format;
pub mod transcript;
pub mod voice;

// Re-export main types for convenience
pub use action::{Action, LoanOffer, ReplyShape};
pub use agent::{AgentBackend, AgentClient, ApplicationDetails, AskRequest, AskResponse};
pub use config::{CommandSpec, Config};
pub use dispatcher::{ChatEvent, Command, Conversation, ConversationWorker};
pub use download::{DownloadOffer, DownloadStatus};
pub use error::{Error, Result};
pub use transcript::{Message, Role, Transcript};
pub use voice::{SpeechRecognizer, SpeechSynthesizer, VoiceCapture};
