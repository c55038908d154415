//! Conversation memory and profile carried across turns
//!
//! Both are seeded from the checkpoint store at the start of a turn and
//! handed back for persistence at the end of it.

pub mod profile;
pub mod store;

pub use profile::update_profile;
pub use store::{ConversationMemory, MemoryEntry, MessageRole, MEMORY_CAPACITY};
