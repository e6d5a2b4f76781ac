//! Conversation history management
//!
//! Keeps the user/assistant exchange for the session with a length cap. The
//! recovery engine quotes the recent part of it back to the oracle.

use std::collections::VecDeque;

use crate::core::Message;

/// Bounded conversation history
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: VecDeque<Message>,
    max_length: usize,
}

impl Conversation {
    pub fn new(max_length: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            max_length: max_length.max(1),
        }
    }

    pub fn add_user(&mut self, content: impl Into<String>) {
        self.add_message(Message::user(content));
    }

    pub fn add_assistant(&mut self, content: impl Into<String>) {
        self.add_message(Message::assistant(content));
    }

    fn add_message(&mut self, message: Message) {
        self.messages.push_back(message);

        while self.messages.len() > self.max_length {
            self.messages.pop_front();
        }
    }

    /// Get the last N messages
    pub fn last_n(&self, n: usize) -> Vec<&Message> {
        let skip = self.messages.len().saturating_sub(n);
        self.messages.iter().skip(skip).collect()
    }

    /// The last N messages as `role: content` lines
    pub fn transcript(&self, n: usize) -> String {
        self.last_n(n)
            .into_iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_basic() {
        let mut conv = Conversation::new(10);
        conv.add_user("go to example.com");
        conv.add_assistant("Navigated to https://example.com");

        assert_eq!(conv.len(), 2);
        assert_eq!(conv.last_n(1)[0].content, "Navigated to https://example.com");
    }

    #[test]
    fn test_conversation_limit() {
        let mut conv = Conversation::new(3);
        conv.add_user("1");
        conv.add_assistant("2");
        conv.add_user("3");
        conv.add_assistant("4");

        assert_eq!(conv.len(), 3);
        assert_eq!(conv.messages[0].content, "2");
    }

    #[test]
    fn test_transcript_keeps_order() {
        let mut conv = Conversation::new(10);
        conv.add_user("read headlines");
        conv.add_assistant("1. Something happened");
        conv.add_user("go to headline 1");

        assert_eq!(
            conv.transcript(2),
            "assistant: 1. Something happened\nuser: go to headline 1"
        );
    }
}
