use std::collections::VecDeque;

use crate::api::{ChatContent, ChatMessage, ChatRole};
use crate::message::{Message, Role};

pub const DEFAULT_WINDOW_CAPACITY: usize = 20;

/// The most recent messages, used as context for outgoing requests.
#[derive(Debug, Clone)]
pub struct ConversationWindow {
    capacity: usize,
    messages: VecDeque<Message>,
}

impl Default for ConversationWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

impl ConversationWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            messages: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a message, evicting the oldest one when full.
    pub fn append(&mut self, message: Message) -> Option<Message> {
        let evicted = if self.messages.len() == self.capacity {
            self.messages.pop_front()
        } else {
            None
        };
        self.messages.push_back(message);
        evicted
    }

    /// Replace the contents with the tail of `messages`.
    pub fn rebuild(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.clear();
        for message in messages {
            self.append(message);
        }
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

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Context messages for a completion request, oldest first.
    pub fn to_request_messages(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .map(|message| ChatMessage {
                role: match message.role() {
                    Role::User => ChatRole::User,
                    Role::Assistant => ChatRole::Assistant,
                },
                content: ChatContent::Text(message.content().to_string()),
            })
            .collect()
    }
}
