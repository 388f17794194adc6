// src/models.rs
//! Domain objects shared by the presentation helpers and the SMS adapter.
//!
//! Messages, chats and users reference each other through [`Entity`] values,
//! never through embedded copies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while building domain objects
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    /// Entity id is not of the form `<account>:<local id>`
    #[error("Invalid entity id: {0}")]
    InvalidEntityId(String),

    /// A message was built before all its references were set
    #[error("Incomplete message {0}: missing {1}")]
    IncompleteMessage(String, &'static str),
}

/// Identity of a user, chat or message within an account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub account_id: String,
    pub local_id: String,
}

impl Entity {
    pub fn new(account_id: impl Into<String>, local_id: impl Into<String>) -> Self {
        Entity {
            account_id: account_id.into(),
            local_id: local_id.into(),
        }
    }

    /// New entity with a random local id
    pub fn generate(account_id: &str) -> Self {
        Entity::new(account_id, Uuid::new_v4().to_string())
    }

    /// Parse an id produced by [`Entity::entity_id`]
    pub fn from_entity_id(entity_id: &str) -> Result<Self, ModelError> {
        match entity_id.split_once(':') {
            Some((account_id, local_id)) if !account_id.is_empty() && !local_id.is_empty() => {
                Ok(Entity::new(account_id, local_id))
            }
            _ => Err(ModelError::InvalidEntityId(entity_id.to_string())),
        }
    }

    pub fn entity_id(&self) -> String {
        format!("{}:{}", self.account_id, self.local_id)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.account_id, self.local_id)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageState {
    Sending,   // Outgoing, handed to the platform
    Sent,      // Platform reported the SMS as sent
    Delivered, // Delivery report received
    Received,  // Incoming message
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub entity: Entity,
    pub chat: Entity,
    pub author: Entity,
    pub recipient: Option<Entity>,
    pub body: String,
    pub title: String,
    pub send_date: DateTime<Utc>,
    pub state: MessageState,
    pub read: bool,
}

impl Message {
    pub fn builder(entity: Entity) -> MessageBuilder {
        MessageBuilder::new(entity)
    }

    /// Copy of this message carrying a new delivery state
    pub fn with_state(&self, state: MessageState) -> Message {
        Message {
            state,
            ..self.clone()
        }
    }
}

/// Mutable construction phase of a [`Message`]
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    entity: Entity,
    chat: Option<Entity>,
    author: Option<Entity>,
    recipient: Option<Entity>,
    body: String,
    title: String,
    send_date: Option<DateTime<Utc>>,
    state: MessageState,
    read: bool,
}

impl MessageBuilder {
    pub fn new(entity: Entity) -> Self {
        MessageBuilder {
            entity,
            chat: None,
            author: None,
            recipient: None,
            body: String::new(),
            title: String::new(),
            send_date: None,
            state: MessageState::Sending,
            read: false,
        }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn chat(mut self, chat: Entity) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn author(mut self, author: Entity) -> Self {
        self.author = Some(author);
        self
    }

    pub fn recipient(mut self, recipient: Option<Entity>) -> Self {
        self.recipient = recipient;
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn send_date(mut self, send_date: DateTime<Utc>) -> Self {
        self.send_date = Some(send_date);
        self
    }

    pub fn state(mut self, state: MessageState) -> Self {
        self.state = state;
        self
    }

    pub fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    /// Finish construction. Chat and author must have been set; a missing
    /// send date defaults to now.
    pub fn build(self) -> Result<Message, ModelError> {
        let id = self.entity.entity_id();
        let chat = self.chat.ok_or_else(|| ModelError::IncompleteMessage(id.clone(), "chat"))?;
        let author = self.author.ok_or(ModelError::IncompleteMessage(id, "author"))?;

        Ok(Message {
            entity: self.entity,
            chat,
            author,
            recipient: self.recipient,
            body: self.body,
            title: self.title,
            send_date: self.send_date.unwrap_or_else(Utc::now),
            state: self.state,
            read: self.read,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatKind {
    /// Two-party conversation; `other_user` is the participant who is not the account owner
    Private { other_user: Entity },
    Group,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub entity: Entity,
    pub kind: ChatKind,
}

impl Chat {
    pub fn private(entity: Entity, other_user: Entity) -> Self {
        Chat {
            entity,
            kind: ChatKind::Private { other_user },
        }
    }

    pub fn group(entity: Entity) -> Self {
        Chat {
            entity,
            kind: ChatKind::Group,
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self.kind, ChatKind::Private { .. })
    }

    pub fn other_user(&self) -> Option<&Entity> {
        match &self.kind {
            ChatKind::Private { other_user } => Some(other_user),
            ChatKind::Group => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub entity: Entity,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Primary phone property
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Additional phone numbers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phones: Vec<String>,
}

impl User {
    pub fn new(entity: Entity) -> Self {
        User {
            entity,
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            phones: Vec::new(),
        }
    }

    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if !name.is_empty() {
            return name.to_string();
        }

        match &self.phone {
            Some(phone) if !phone.is_empty() => phone.clone(),
            _ => self.entity.local_id.clone(),
        }
    }

    pub fn phone_numbers(&self) -> impl Iterator<Item = &str> {
        self.phones.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_round_trip() {
        let entity = Entity::new("sms", "42");
        assert_eq!(entity.entity_id(), "sms:42");
        assert_eq!(Entity::from_entity_id("sms:42").unwrap(), entity);

        // Only the first separator splits
        let nested = Entity::from_entity_id("sms:sms:+15551234").unwrap();
        assert_eq!(nested.account_id, "sms");
        assert_eq!(nested.local_id, "sms:+15551234");
    }

    #[test]
    fn test_entity_id_rejects_malformed() {
        for bad in ["", "sms", ":42", "sms:"] {
            assert_eq!(
                Entity::from_entity_id(bad),
                Err(ModelError::InvalidEntityId(bad.to_string()))
            );
        }
    }

    #[test]
    fn test_builder_requires_chat_and_author() {
        let entity = Entity::new("sms", "m1");
        let err = Message::builder(entity.clone()).author(Entity::new("sms", "u1")).build();
        assert_eq!(err, Err(ModelError::IncompleteMessage("sms:m1".to_string(), "chat")));

        let err = Message::builder(entity).chat(Entity::new("sms", "c1")).build();
        assert!(matches!(err, Err(ModelError::IncompleteMessage(_, "author"))));
    }

    #[test]
    fn test_with_state_leaves_original_untouched() {
        let message = Message::builder(Entity::new("sms", "m1"))
            .chat(Entity::new("sms", "c1"))
            .author(Entity::new("sms", "u1"))
            .body("Hello")
            .state(MessageState::Sending)
            .build()
            .unwrap();

        let sent = message.with_state(MessageState::Sent);
        assert_eq!(message.state, MessageState::Sending);
        assert_eq!(sent.state, MessageState::Sent);
        assert_eq!(sent.entity, message.entity);
        assert_eq!(sent.body, message.body);
    }

    #[test]
    fn test_chat_kinds() {
        let private = Chat::private(Entity::new("sms", "c1"), Entity::new("sms", "u2"));
        assert!(private.is_private());
        assert_eq!(private.other_user(), Some(&Entity::new("sms", "u2")));

        let group = Chat::group(Entity::new("sms", "c2"));
        assert!(!group.is_private());
        assert_eq!(group.other_user(), None);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut user = User::new(Entity::new("sms", "u1"));
        assert_eq!(user.display_name(), "u1");

        user.phone = Some("+15551234".to_string());
        assert_eq!(user.display_name(), "+15551234");

        user.first_name = "Ada".to_string();
        assert_eq!(user.display_name(), "Ada");

        user.last_name = "Lovelace".to_string();
        assert_eq!(user.display_name(), "Ada Lovelace");
    }
}
