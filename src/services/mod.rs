// src/services/mod.rs
//! Collaborator interfaces used by the SMS adapter and the presentation helpers.
//!
//! Persistence, contact storage and chat bookkeeping live behind these traits;
//! the adapter only ever talks to them through [`SmsServices`].

use anyhow::Result;
use std::sync::Arc;

use crate::models::{Chat, Entity, Message, User};

pub mod memory;

pub use memory::InMemoryStore;

/// Lookup of stored messages
pub trait MessageService: Send + Sync {
    /// Find a message by the id produced by [`Entity::entity_id`]
    fn get_message(&self, entity_id: &str) -> Option<Message>;
}

pub trait ChatService: Send + Sync {
    /// Replace the stored copy of `message` with this state-updated one
    fn update_message_state(&self, message: Message) -> Result<()>;

    /// Private chat between `user` and `contact`, created on first use
    fn get_or_create_private_chat(&self, user: &Entity, contact: &Entity) -> Result<Chat>;

    /// Store a batch of messages in one chat
    fn save_messages(&self, chat: &Entity, messages: Vec<Message>) -> Result<()>;
}

pub trait UserService: Send + Sync {
    fn get_user(&self, user: &Entity) -> Option<User>;

    /// Contact list of `user`, in stored order
    fn get_user_contacts(&self, user: &Entity) -> Result<Vec<User>>;

    /// Add `contacts` to the contact list of `user`, replacing same-entity entries
    fn merge_user_contacts(&self, user: &Entity, contacts: Vec<User>) -> Result<()>;
}

/// Handles to the services one connection works with
#[derive(Clone)]
pub struct SmsServices {
    pub messages: Arc<dyn MessageService>,
    pub chats: Arc<dyn ChatService>,
    pub users: Arc<dyn UserService>,
}

impl SmsServices {
    /// All three services backed by one store
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: MessageService + ChatService + UserService + 'static,
    {
        SmsServices {
            messages: store.clone(),
            chats: store.clone(),
            users: store,
        }
    }
}
