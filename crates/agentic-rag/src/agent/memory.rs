//! Bounded conversation memory

use std::collections::VecDeque;

use crate::types::ChatMessage;

/// Rough token estimate: four characters per token, rounded up
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Conversation history trimmed from the oldest end to a token budget.
///
/// The newest message is always kept, even if it alone exceeds the budget.
#[derive(Debug, Clone)]
pub struct ChatMemoryBuffer {
    messages: VecDeque<ChatMessage>,
    token_limit: usize,
    tokens: usize,
}

impl ChatMemoryBuffer {
    pub fn new(token_limit: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            token_limit,
            tokens: 0,
        }
    }

    /// Seed the buffer with prior history, oldest first
    pub fn with_history(history: impl IntoIterator<Item = ChatMessage>, token_limit: usize) -> Self {
        let mut buffer = Self::new(token_limit);
        for message in history {
            buffer.push(message);
        }
        buffer
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.tokens += estimate_tokens(&message.content);
        self.messages.push_back(message);

        while self.tokens > self.token_limit && self.messages.len() > 1 {
            if let Some(dropped) = self.messages.pop_front() {
                self.tokens -= estimate_tokens(&dropped.content);
            }
        }
    }

    /// Messages currently held, oldest first
    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn token_count(&self) -> usize {
        self.tokens
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.tokens = 0;
    }
}
