// src/services/memory.rs
//! In-process implementation of the collaborator services.
//!
//! Backs the replay tool and the tests. Every call is recorded so callers can
//! inspect what the adapter asked for.

use anyhow::{anyhow, Result};
use log::debug;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::models::{Chat, Entity, Message, User};

use super::{ChatService, MessageService, UserService};

#[derive(Default)]
struct StoreState {
    users: HashMap<Entity, User>,
    contacts: HashMap<Entity, Vec<User>>,
    chats: Vec<Chat>,
    // Chat entity -> messages in save order
    messages: HashMap<Entity, Vec<Message>>,
    state_updates: Vec<Message>,
    merge_calls: usize,
    save_calls: usize,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // A panicking test thread must not hide the data from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_user(&self, user: User) {
        self.lock().users.insert(user.entity.clone(), user);
    }

    /// Seed the contact list of `owner`
    pub fn add_contacts(&self, owner: &Entity, contacts: Vec<User>) {
        let mut state = self.lock();
        for contact in &contacts {
            state.users.insert(contact.entity.clone(), contact.clone());
        }
        state.contacts.entry(owner.clone()).or_default().extend(contacts);
    }

    pub fn add_chat(&self, chat: Chat) {
        self.lock().chats.push(chat);
    }

    /// Store one message outside of any batch
    pub fn insert_message(&self, message: Message) {
        self.lock()
            .messages
            .entry(message.chat.clone())
            .or_default()
            .push(message);
    }

    pub fn chats(&self) -> Vec<Chat> {
        self.lock().chats.clone()
    }

    pub fn messages(&self, chat: &Entity) -> Vec<Message> {
        self.lock().messages.get(chat).cloned().unwrap_or_default()
    }

    pub fn contacts(&self, owner: &Entity) -> Vec<User> {
        self.lock().contacts.get(owner).cloned().unwrap_or_default()
    }

    /// Every message passed to `update_message_state`, in call order
    pub fn state_updates(&self) -> Vec<Message> {
        self.lock().state_updates.clone()
    }

    pub fn merge_calls(&self) -> usize {
        self.lock().merge_calls
    }

    pub fn save_calls(&self) -> usize {
        self.lock().save_calls
    }
}

impl MessageService for InMemoryStore {
    fn get_message(&self, entity_id: &str) -> Option<Message> {
        self.lock()
            .messages
            .values()
            .flatten()
            .find(|message| message.entity.entity_id() == entity_id)
            .cloned()
    }
}

impl ChatService for InMemoryStore {
    fn update_message_state(&self, message: Message) -> Result<()> {
        let mut state = self.lock();
        state.state_updates.push(message.clone());

        let stored = state
            .messages
            .get_mut(&message.chat)
            .and_then(|messages| messages.iter_mut().find(|m| m.entity == message.entity))
            .ok_or_else(|| anyhow!("Message {} is not stored", message.entity))?;
        debug!("Message {} state {:?} -> {:?}", message.entity, stored.state, message.state);
        *stored = message;
        Ok(())
    }

    fn get_or_create_private_chat(&self, user: &Entity, contact: &Entity) -> Result<Chat> {
        let mut state = self.lock();

        // Private chats are stored from the owner's point of view
        if let Some(chat) = state.chats.iter().find(|chat| chat.other_user() == Some(contact)) {
            return Ok(chat.clone());
        }

        let chat = Chat::private(
            Entity::new(user.account_id.clone(), format!("{}:{}", user.local_id, contact.local_id)),
            contact.clone(),
        );
        debug!("Created private chat {} with {}", chat.entity, contact);
        state.chats.push(chat.clone());
        Ok(chat)
    }

    fn save_messages(&self, chat: &Entity, messages: Vec<Message>) -> Result<()> {
        let mut state = self.lock();
        if !state.chats.iter().any(|c| &c.entity == chat) {
            return Err(anyhow!("Unknown chat {}", chat));
        }

        state.save_calls += 1;
        state.messages.entry(chat.clone()).or_default().extend(messages);
        Ok(())
    }
}

impl UserService for InMemoryStore {
    fn get_user(&self, user: &Entity) -> Option<User> {
        self.lock().users.get(user).cloned()
    }

    fn get_user_contacts(&self, user: &Entity) -> Result<Vec<User>> {
        Ok(self.contacts(user))
    }

    fn merge_user_contacts(&self, user: &Entity, contacts: Vec<User>) -> Result<()> {
        let mut state = self.lock();
        state.merge_calls += 1;

        for contact in contacts {
            state.users.insert(contact.entity.clone(), contact.clone());
            let list = state.contacts.entry(user.clone()).or_default();
            match list.iter_mut().find(|c| c.entity == contact.entity) {
                Some(existing) => *existing = contact,
                None => list.push(contact),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageState;

    fn owner() -> Entity {
        Entity::new("sms", "me")
    }

    #[test]
    fn test_private_chat_is_reused() {
        let store = InMemoryStore::new();
        let contact = Entity::new("sms", "5551234");

        let first = store.get_or_create_private_chat(&owner(), &contact).unwrap();
        let second = store.get_or_create_private_chat(&owner(), &contact).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.chats().len(), 1);
        assert_eq!(first.other_user(), Some(&contact));
    }

    #[test]
    fn test_save_into_unknown_chat_fails() {
        let store = InMemoryStore::new();
        assert!(store.save_messages(&Entity::new("sms", "nope"), Vec::new()).is_err());
        assert_eq!(store.save_calls(), 0);
    }

    #[test]
    fn test_merge_replaces_same_entity() {
        let store = InMemoryStore::new();
        let mut contact = User::new(Entity::new("sms", "5551234"));
        store.merge_user_contacts(&owner(), vec![contact.clone()]).unwrap();

        contact.first_name = "Bob".to_string();
        store.merge_user_contacts(&owner(), vec![contact]).unwrap();

        let contacts = store.get_user_contacts(&owner()).unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].first_name, "Bob");
        assert_eq!(store.merge_calls(), 2);
    }

    #[test]
    fn test_state_update_replaces_stored_copy() {
        let store = InMemoryStore::new();
        let chat = store.get_or_create_private_chat(&owner(), &Entity::new("sms", "bob")).unwrap();
        let message = Message::builder(Entity::new("sms", "m1"))
            .chat(chat.entity.clone())
            .author(owner())
            .body("Hi")
            .build()
            .unwrap();
        store.save_messages(&chat.entity, vec![message.clone()]).unwrap();

        store.update_message_state(message.with_state(MessageState::Delivered)).unwrap();
        let stored = store.get_message("sms:m1").unwrap();
        assert_eq!(stored.state, MessageState::Delivered);

        let missing = message.with_state(MessageState::Sent);
        let missing = Message { entity: Entity::new("sms", "m2"), ..missing };
        assert!(store.update_message_state(missing).is_err());
    }
}
