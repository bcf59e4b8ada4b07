//! UI-agnostic message types
//!
//! A transcript is an ordered list of [`Message`]s. Each rendered message is a
//! "bubble" whose class combines [`BUBBLE_CLASS_PREFIX`] with the sender tag.

use serde::{Deserialize, Serialize};

pub const BUBBLE_CLASS_PREFIX: &str = "chatbot-message";

/// A single chat message. The text is plain text, never markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub sender: Sender,
}

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn tag(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        }
    }
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Bot,
        }
    }

    pub fn class_name(&self) -> String {
        format!("{} {}", BUBBLE_CLASS_PREFIX, self.sender.tag())
    }
}
