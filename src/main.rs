#![deny(dead_code)] // DO NOT REMOVE THIS EVER
use anyhow::{anyhow, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod utils;

use messenger_sms::{
    broadcast::LocalBroadcaster,
    config::{self, SmsAccount, DEFAULT_ACCOUNT_ID},
    messages::{
        compare_send_dates_latest_first, display_name_for, message_time, message_title,
        outgoing_message,
    },
    models::User,
    services::{ChatService, InMemoryStore, SmsServices},
    sms::{contacts::find_or_create_contact, SmsConnection, SmsIntent},
};

/// Command line arguments for the SMS replay tool
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Replay SMS broadcasts through the messenger SMS adapter and print the resulting \
             conversations."
)]
struct Args {
    /// JSON array of intents to deliver, in order
    #[arg(long, value_name = "PATH")]
    intents: Option<PathBuf>,

    /// Account file (default: account.json in the config directory)
    #[arg(long, value_name = "PATH")]
    account: Option<PathBuf>,

    /// Directory holding account.json (default: platform config directory)
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// JSON array of contacts the account already knows
    #[arg(long, value_name = "PATH")]
    contacts: Option<PathBuf>,

    /// Send a message and replay its sent/delivered reports, e.g. "555-1234=On my way"
    #[arg(long, value_name = "NUMBER=TEXT", value_parser = parse_outgoing)]
    send: Vec<(String, String)>,

    /// Abort received-SMS broadcasts after handling them
    #[arg(long)]
    stop_further_processing: bool,

    /// Write the log to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: LevelFilter,
}

fn parse_outgoing(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((number, text)) if !number.trim().is_empty() => {
            Ok((number.trim().to_string(), text.to_string()))
        }
        _ => Err(format!("expected NUMBER=TEXT, got '{}'", arg)),
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path)
        .map_err(|e| anyhow!("Cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&contents)
        .map_err(|e| anyhow!("Invalid JSON in {}: {}", path.display(), e))
}

fn load_account(args: &Args) -> Result<SmsAccount> {
    let path = match &args.account {
        Some(path) => path.clone(),
        None => config::default_account_path()?,
    };

    let mut account = match config::load_account(&path)? {
        Some(account) => account,
        None => {
            warn!("No account at {}, using a default one", path.display());
            SmsAccount::with_default_user(DEFAULT_ACCOUNT_ID)
        }
    };
    if args.stop_further_processing {
        account.configuration.stop_further_processing = true;
    }
    Ok(account)
}

/// Store an outgoing message and replay the reports the platform would send for it
fn send_message(
    store: &InMemoryStore,
    broadcaster: &LocalBroadcaster,
    account: &SmsAccount,
    number: &str,
    text: &str,
) -> Result<()> {
    let mut contacts = store.contacts(&account.user.entity);
    let contact = find_or_create_contact(account, number, &mut contacts, store)?;
    let chat = store.get_or_create_private_chat(&account.user.entity, &contact.entity)?;

    let message = outgoing_message(account, &chat, text, None);
    let message_id = message.entity.entity_id();
    store.save_messages(&chat.entity, vec![message])?;
    info!("Sending {} to {}", message_id, number);

    for report in [
        SmsIntent::Sent { message_id: Some(message_id.clone()) },
        SmsIntent::Delivered { message_id: Some(message_id) },
    ] {
        broadcaster.send_ordered_broadcast(&report);
    }
    Ok(())
}

fn print_conversations(store: &InMemoryStore, viewer: &User) {
    let wrap = textwrap::Options::new(78).subsequent_indent("            ");

    for chat in store.chats() {
        let name = match chat.other_user() {
            Some(other) => display_name_for(other, store),
            None => chat.entity.local_id.clone(),
        };
        println!("== {} ({})", name, chat.entity);

        let mut messages = store.messages(&chat.entity);
        messages.sort_by(|l, r| compare_send_dates_latest_first(Some(l), Some(r)));
        for message in &messages {
            let line = format!(
                "{:>10}  {} [{:?}]",
                message_time(message),
                message_title(&chat, message, viewer, store),
                message.state
            );
            println!("{}", textwrap::fill(&line, &wrap));
        }
        println!();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    utils::setup_logging(args.log_file.as_deref(), args.log_level)?;

    if let Some(dir) = &args.config_dir {
        config::set_config_dir_override(dir.clone())?;
    }
    let account = load_account(&args)?;
    let store = Arc::new(InMemoryStore::new());
    store.add_user(account.user.clone());

    if let Some(path) = &args.contacts {
        let contacts: Vec<User> = load_json(path)?;
        info!("Loaded {} contacts from {}", contacts.len(), path.display());
        store.add_contacts(&account.user.entity, contacts);
    }

    let intents: Vec<SmsIntent> = match &args.intents {
        Some(path) => load_json(path)?,
        None => Vec::new(),
    };

    let broadcaster = Arc::new(LocalBroadcaster::new());
    let connection = SmsConnection::new(
        account.clone(),
        SmsServices::from_store(store.clone()),
        broadcaster.clone(),
    );
    connection.start();

    for (index, intent) in intents.iter().enumerate() {
        let receivers = broadcaster.send_ordered_broadcast(intent);
        info!("Intent {} ({}) reached {} receiver(s)", index, intent.action(), receivers);
    }
    for (number, text) in &args.send {
        send_message(&store, &broadcaster, &account, number, text)?;
    }

    connection.stop();

    print_conversations(&store, &account.user);
    Ok(())
}
