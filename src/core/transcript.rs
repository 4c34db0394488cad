//! The ordered messages of the active conversation.

use serde::{Deserialize, Serialize};

use crate::backend::HistoryEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Assistant,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Error,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a transcript from server history, opening with `welcome`.
    /// Absent sides of a pair are skipped.
    pub fn from_history(welcome: String, entries: &[HistoryEntry]) -> Self {
        let mut transcript = Self::new();
        transcript.push(Message::assistant(welcome));
        for entry in entries {
            if let Some(user) = &entry.user {
                transcript.push(Message::user(user.clone()));
            }
            if let Some(bot) = &entry.bot {
                transcript.push(Message::assistant(bot.clone()));
            }
        }
        transcript
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
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

    /// Serializes to the JSON blob kept in the session store.
    pub fn to_snapshot(&self) -> String {
        // A Vec of plain structs cannot fail to serialize.
        serde_json::to_string(&self.messages).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn from_snapshot(blob: &str) -> serde_json::Result<Self> {
        let messages = serde_json::from_str(blob)?;
        Ok(Self { messages })
    }
}
