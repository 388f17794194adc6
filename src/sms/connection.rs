// src/sms/connection.rs
//! Connection of one SMS account to the platform's SMS broadcasts.

use anyhow::Result;
use chrono::Utc;
use log::{debug, error, info};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::broadcast::{
    BroadcastReceiver, BroadcastRegistry, IntentFilter, Propagation, SYSTEM_HIGH_PRIORITY,
};
use crate::config::SmsAccount;
use crate::models::{Chat, Entity, Message, MessageState, ModelError, User};
use crate::services::SmsServices;

use super::contacts::find_or_create_contact;
use super::senders::messages_by_sender;
use super::{SmsIntent, ACTION_SMS_DELIVERED, ACTION_SMS_RECEIVED, ACTION_SMS_SENT};

/// Registers an [`SmsReceiver`] with the platform while started.
///
/// `start` and `stop` are idempotent and may be called from any thread.
pub struct SmsConnection {
    receiver: Arc<SmsReceiver>,
    registry: Arc<dyn BroadcastRegistry>,
    // Registered receiver; None while stopped
    registered: Mutex<Option<Arc<dyn BroadcastReceiver>>>,
}

impl SmsConnection {
    pub fn new(
        account: SmsAccount,
        services: SmsServices,
        registry: Arc<dyn BroadcastRegistry>,
    ) -> Self {
        SmsConnection {
            receiver: Arc::new(SmsReceiver::new(account, services)),
            registry,
            registered: Mutex::new(None),
        }
    }

    pub fn account(&self) -> &SmsAccount {
        &self.receiver.account
    }

    fn registered(&self) -> MutexGuard<'_, Option<Arc<dyn BroadcastReceiver>>> {
        self.registered.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn start(&self) {
        let mut registered = self.registered();
        if registered.is_some() {
            debug!("SMS connection for {} already started", self.account().id);
            return;
        }

        let receiver: Arc<dyn BroadcastReceiver> = self.receiver.clone();
        self.registry
            .register_receiver(receiver.clone(), IntentFilter::new(ACTION_SMS_SENT));
        self.registry
            .register_receiver(receiver.clone(), IntentFilter::new(ACTION_SMS_DELIVERED));
        // Ahead of the stock messaging app so the broadcast can be aborted
        self.registry.register_receiver(
            receiver.clone(),
            IntentFilter::new(ACTION_SMS_RECEIVED).with_priority(SYSTEM_HIGH_PRIORITY),
        );

        *registered = Some(receiver);
        info!("SMS connection for {} started", self.account().id);
    }

    pub fn stop(&self) {
        if let Some(receiver) = self.registered().take() {
            self.registry.unregister_receiver(&receiver);
            info!("SMS connection for {} stopped", self.account().id);
        }
    }

    pub fn is_started(&self) -> bool {
        self.registered().is_some()
    }
}

/// Turns SMS broadcasts into messages of one account
pub struct SmsReceiver {
    account: SmsAccount,
    services: SmsServices,
}

impl SmsReceiver {
    pub fn new(account: SmsAccount, services: SmsServices) -> Self {
        SmsReceiver { account, services }
    }

    /// Apply a sent/delivered report to the message it names.
    /// Reports without an id, or for unknown messages, are ignored.
    fn on_sms_report(&self, message_id: Option<&str>, state: MessageState) -> Result<()> {
        let message_id = match message_id {
            Some(id) if !id.is_empty() => id,
            _ => {
                debug!("Ignoring {:?} report without message id", state);
                return Ok(());
            }
        };

        match self.services.messages.get_message(message_id) {
            Some(message) => {
                debug!("Message {} is now {:?}", message_id, state);
                self.services.chats.update_message_state(message.with_state(state))
            }
            None => {
                debug!("Ignoring {:?} report for unknown message {}", state, message_id);
                Ok(())
            }
        }
    }

    fn on_sms_received(&self, pdus: &[Vec<u8>], format: Option<&str>) -> Result<Propagation> {
        let senders = messages_by_sender(pdus, format);

        if !senders.is_empty() {
            let user = &self.account.user;
            let mut contacts = self.services.users.get_user_contacts(&user.entity)?;

            for sender in senders {
                let contact = find_or_create_contact(
                    &self.account,
                    &sender.address,
                    &mut contacts,
                    self.services.users.as_ref(),
                )?;
                let chat = self
                    .services
                    .chats
                    .get_or_create_private_chat(&user.entity, &contact.entity)?;

                let messages = sender
                    .bodies
                    .iter()
                    .filter(|body| !body.is_empty())
                    .map(|body| self.to_message(body, &contact, user, &chat))
                    .collect::<Result<Vec<_>, ModelError>>()?;

                info!(
                    "Saving {} SMS from {} into chat {}",
                    messages.len(),
                    sender.address,
                    chat.entity
                );
                self.services.chats.save_messages(&chat.entity, messages)?;
            }
        }

        if self.account.configuration.stop_further_processing {
            Ok(Propagation::Abort)
        } else {
            Ok(Propagation::Continue)
        }
    }

    fn to_message(
        &self,
        body: &str,
        from: &User,
        to: &User,
        chat: &Chat,
    ) -> Result<Message, ModelError> {
        Message::builder(Entity::generate(&self.account.id))
            .chat(chat.entity.clone())
            .body(body)
            .author(from.entity.clone())
            .recipient(Some(to.entity.clone()))
            .send_date(Utc::now())
            .state(MessageState::Received)
            .read(false)
            .build()
    }
}

impl BroadcastReceiver for SmsReceiver {
    fn on_receive(&self, intent: &SmsIntent) -> Propagation {
        let result = match intent {
            SmsIntent::Received { pdus, format } => self.on_sms_received(pdus, format.as_deref()),
            SmsIntent::Sent { message_id } => self
                .on_sms_report(message_id.as_deref(), MessageState::Sent)
                .map(|_| Propagation::Continue),
            SmsIntent::Delivered { message_id } => self
                .on_sms_report(message_id.as_deref(), MessageState::Delivered)
                .map(|_| Propagation::Continue),
        };

        // Nothing may escape into the platform's dispatch loop
        result.unwrap_or_else(|e| {
            error!("Failed to handle {}: {:#}", intent.action(), e);
            Propagation::Continue
        })
    }
}
