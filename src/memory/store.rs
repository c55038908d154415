//! Bounded conversation log
//!
//! Stores the most recent user/assistant entries in chronological order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum number of entries retained; older ones are evicted first
pub const MEMORY_CAPACITY: usize = 20;

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A single entry in the conversation log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryEntry {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl MemoryEntry {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Conversation log capped at [`MEMORY_CAPACITY`] entries (FIFO eviction)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(from = "Vec<MemoryEntry>", into = "Vec<MemoryEntry>")]
pub struct ConversationMemory {
    entries: VecDeque<MemoryEntry>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, evicting the oldest ones beyond capacity.
    pub fn push(&mut self, entry: MemoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > MEMORY_CAPACITY {
            self.entries.pop_front();
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(MemoryEntry::new(MessageRole::User, content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(MemoryEntry::new(MessageRole::Assistant, content));
    }

    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &MemoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&MemoryEntry> {
        self.entries.back()
    }
}

impl From<Vec<MemoryEntry>> for ConversationMemory {
    fn from(entries: Vec<MemoryEntry>) -> Self {
        let mut memory = ConversationMemory::new();
        for entry in entries {
            memory.push(entry);
        }
        memory
    }
}

impl From<ConversationMemory> for Vec<MemoryEntry> {
    fn from(memory: ConversationMemory) -> Self {
        memory.entries.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_keeps_order() {
        let mut memory = ConversationMemory::new();
        memory.push_user("What is RSI?");
        memory.push_assistant("RSI is a momentum oscillator...");

        let roles: Vec<_> = memory.entries().map(|e| e.role).collect();
        assert_eq!(roles, vec![MessageRole::User, MessageRole::Assistant]);
    }

    #[test]
    fn test_capacity_after_many_turns() {
        for turns in [1usize, 5, 10, 11, 30] {
            let mut memory = ConversationMemory::new();
            for i in 0..turns {
                memory.push_user(format!("question {}", i));
                memory.push_assistant(format!("answer {}", i));
            }
            assert_eq!(memory.len(), (turns * 2).min(MEMORY_CAPACITY));
            assert_eq!(
                memory.last().map(|e| e.content.as_str()),
                Some(format!("answer {}", turns - 1).as_str())
            );
        }
    }

    #[test]
    fn test_eviction_drops_oldest() {
        let mut memory = ConversationMemory::new();
        for i in 0..25 {
            memory.push_user(format!("m{}", i));
        }
        let first = memory.entries().next().unwrap();
        assert_eq!(first.content, "m5");
    }

    #[test]
    fn test_deserialize_truncates_oversized_log() {
        let entries: Vec<MemoryEntry> = (0..30)
            .map(|i| MemoryEntry::new(MessageRole::User, format!("m{}", i)))
            .collect();
        let json = serde_json::to_string(&entries).unwrap();
        let memory: ConversationMemory = serde_json::from_str(&json).unwrap();
        assert_eq!(memory.len(), MEMORY_CAPACITY);
    }
}
