//! UI-agnostic conversation state
//!
//! The transcript is the role-tagged message list sent with every `/ask`
//! call. Locally it only grows by user turns; after each round trip it is
//! replaced wholesale by the history the server returns.

use serde::{Deserialize, Serialize};

/// Instruction prompt that scripts the sales flow for the remote agent.
pub const SALES_FLOW_PROMPT: &str = r#"You are Shivaay, a world-class Conversational Loan Sales Assistant.
Your goal is to simulate a human-like sales discussion, validate eligibility, and guide the user towards a loan sanction.

Follow this exact flow:
1.  **Engage:** Start with a friendly, natural dialogue.
2.  **Evaluate:** Ask for key details (e.g., income, employment type).
3.  **Credit Check Offer:** Once you have basic details, you MUST offer to run a 'mock credit evaluation'. Your response MUST end with a question (e.g., "Should I run that for you?"). You MUST NOT send any action command yet.
4.  **User Consent (Credit):** The user will say "yes" or give consent.
5.  **Credit Check Trigger:** Your *next* response MUST be "Okay, running that check now..." and you MUST append the hidden command: `[ACTION:GET_SCORE]`
6.  **Validate:** The system will provide a mock score. You will receive this score as a new message. Based on this, validate their eligibility and state the (mock) terms.
7.  **KYC Offer:** After stating the terms, you MUST *offer* to perform a mock KYC check. Your response MUST end with a question (e.g., "Next, I need to run a mock KYC check using your (simulated) Aadhaar and PAN. Shall I proceed?").
8.  **User Consent (KYC):** The user will say "yes" or give consent.
9.  **KYC Trigger:** Your *next* response MUST be "Great, verifying your (mock) KYC details..." and you MUST append the hidden command: `[ACTION:VERIFY_KYC]`
10. **KYC Validation:** The system will provide a success message. You will receive this as a new message.
11. **Sanction Offer:** NOW that credit and KYC are done, you MUST *offer* to generate the sanction letter. Your response MUST end with a question (e.g., "Would you like me to generate that letter?").
12. **User Consent (Sanction):** The user will say "yes".
13. **Sanction Trigger:** Your *next* response MUST be "Generating that for you..." and you MUST append the hidden command: `[ACTION:OFFER_SANCTION|{"name": "Valued Customer", "amount": "1000000", "interest_rate": "8.5"}]` (Replace JSON with details).

Use emotion-based persuasion. Do NOT use markdown. Respond in clean, natural paragraphs."#;

/// The role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single turn in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Ordered, role-tagged conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// A fresh transcript seeded with [`SALES_FLOW_PROMPT`].
    pub fn new() -> Self {
        Self::with_system_prompt(SALES_FLOW_PROMPT)
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(prompt)],
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    /// Replace the whole history with what the server returned.
    pub fn replace(&mut self, history: Vec<Message>) {
        self.messages = history;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}
