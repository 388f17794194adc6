// Common test utilities for integration tests
// Shared fixtures and setup for the SMS adapter tests
#![allow(dead_code)]

use std::sync::{Arc, Once};

use log::LevelFilter;

use messenger_sms::{
    broadcast::LocalBroadcaster,
    config::{SmsAccount, SmsConfiguration},
    models::{Entity, User},
    services::{InMemoryStore, SmsServices},
    sms::{SmsConnection, SmsIntent},
};

// Initialize logging once
static INIT_LOGGER: Once = Once::new();

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

pub const ACCOUNT_ID: &str = "sms";

// SMS-DELIVER PDUs without SMSC prefix, all stamped 2023-01-27 16:51:03 +00:00

/// "555-1234" -> "Hello World"
pub const HELLO_WORLD: &str = "00040781551532F40000321072611530000BC8329BFD065DDF723619";
/// "+15551234" -> "Hi there"
pub const INTERNATIONAL: &str = "000408915155214300003210726115300008C834888E2ECBCB";
/// "5559876" -> "Second sender"
pub const OTHER_SENDER: &str = "00040781559578F60000321072611530000DD3F2F8ED2683E66537B92C07";
/// "5551234" -> "Hello " (part 1 of 2, reference 0x2A)
pub const PART_1: &str = "00440781551532F40000321072611530000D0500032A0201906536FB0D02";
/// "5551234" -> "World" (part 2 of 2, reference 0x2A)
pub const PART_2: &str = "00440781551532F40000321072611530000C0500032A0202AE6F399B0C";
/// "5551234" -> ""
pub const EMPTY_BODY: &str = "00040781551532F400003210726115300000";
/// "BANK" -> "Your code is 1234"
pub const ALPHANUMERIC: &str = "000408D0C2A0730900003210726115300011D9775D0E1ABFC965507A0E8AC96634";

pub fn received(pdus: &[&str]) -> SmsIntent {
    SmsIntent::Received {
        pdus: pdus
            .iter()
            .map(|pdu| hex::decode(pdu).expect("valid fixture hex"))
            .collect(),
        format: Some("3gpp".to_string()),
    }
}

pub fn account(stop_further_processing: bool) -> SmsAccount {
    let mut user = User::new(Entity::new(ACCOUNT_ID, "me"));
    user.first_name = "Me".to_string();
    SmsAccount::new(
        ACCOUNT_ID,
        user,
        SmsConfiguration {
            stop_further_processing,
        },
    )
}

pub fn contact(local_id: &str, first_name: &str, phone: Option<&str>, phones: &[&str]) -> User {
    let mut contact = User::new(Entity::new(ACCOUNT_ID, local_id));
    contact.first_name = first_name.to_string();
    contact.phone = phone.map(str::to_string);
    contact.phones = phones.iter().map(|p| p.to_string()).collect();
    contact
}

/// A started connection wired to an in-memory store and broadcaster
pub struct TestSetup {
    pub account: SmsAccount,
    pub store: Arc<InMemoryStore>,
    pub broadcaster: Arc<LocalBroadcaster>,
    pub connection: SmsConnection,
}

impl TestSetup {
    pub fn new(account: SmsAccount, contacts: Vec<User>) -> Self {
        setup_logging();

        let store = Arc::new(InMemoryStore::new());
        store.add_user(account.user.clone());
        store.add_contacts(&account.user.entity, contacts);

        let broadcaster = Arc::new(LocalBroadcaster::new());
        let connection = SmsConnection::new(
            account.clone(),
            SmsServices::from_store(store.clone()),
            broadcaster.clone(),
        );
        connection.start();

        TestSetup {
            account,
            store,
            broadcaster,
            connection,
        }
    }

    pub fn user(&self) -> &Entity {
        &self.account.user.entity
    }
}
