// src/messages.rs
//! Presentation helpers for messages: send-time labels, list titles,
//! send-date ordering and construction of new messages.

use chrono::{DateTime, Local, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::cmp::Ordering;
use std::fmt::Display;

use crate::config::SmsAccount;
use crate::models::{Chat, Entity, Message, MessageBuilder, MessageState, ModelError, User};
use crate::services::UserService;

/// Label used for messages sent the day before
pub const YESTERDAY: &str = "Yesterday";

/// Author label for messages written by the viewer
pub const ME: &str = "Me";

const SHORT_TIME_FORMAT: &str = "%-I:%M %p";
const SHORT_DATE_FORMAT: &str = "%-m/%-d/%y";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static BLOCK_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</(p|div|h[1-6]|li|blockquote)\s*>").unwrap());
// Only real markup; a bare '<' in text stays
static TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<!--.*?-->|</?[A-Za-z][A-Za-z0-9]*(\s[^>]*)?/?>").unwrap()
});
static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]+);").unwrap());

/// Send-time label relative to the current local date
pub fn message_time(message: &Message) -> String {
    message_time_at(message, &Local::now())
}

/// Send-time label relative to `now`, evaluated in `now`'s time zone.
///
/// Messages from today show the time, messages from the previous day show
/// [`YESTERDAY`], older (or future-dated) messages show the date.
pub fn message_time_at<Tz>(message: &Message, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let local_send = message.send_date.with_timezone(&now.timezone());
    let send_date = local_send.date_naive();
    let today = now.date_naive();

    if send_date == today {
        local_send.format(SHORT_TIME_FORMAT).to_string()
    } else if today.pred_opt() == Some(send_date) {
        YESTERDAY.to_string()
    } else {
        local_send.format(SHORT_DATE_FORMAT).to_string()
    }
}

/// Title shown for `message` in a conversation list, as seen by `viewer`
pub fn message_title(
    chat: &Chat,
    message: &Message,
    viewer: &User,
    users: &dyn UserService,
) -> String {
    let author = author_display_name(chat, message, viewer, users);
    let body = html_to_text(&message.body);

    if author.is_empty() {
        body
    } else {
        format!("{}: {}", author, body)
    }
}

fn author_display_name(
    chat: &Chat,
    message: &Message,
    viewer: &User,
    users: &dyn UserService,
) -> String {
    if message.author == viewer.entity {
        ME.to_string()
    } else if !chat.is_private() {
        display_name_for(&message.author, users)
    } else {
        // The other party of a private chat is already in the chat title
        String::new()
    }
}

/// Display name of the user behind `entity`, or its local id if unknown
pub fn display_name_for(entity: &Entity, users: &dyn UserService) -> String {
    users
        .get_user(entity)
        .map(|user| user.display_name())
        .unwrap_or_else(|| entity.local_id.clone())
}

/// Render HTML markup in a message body as plain text
pub fn html_to_text(html: &str) -> String {
    let text = WHITESPACE.replace_all(html, " ");
    let text = LINE_BREAK.replace_all(&text, "\n");
    let text = BLOCK_END.replace_all(&text, "\n\n");
    let text = TAG.replace_all(&text, "");
    let text = ENTITY.replace_all(&text, |caps: &Captures| decode_entity(&caps[1], &caps[0]));

    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn decode_entity(name: &str, original: &str) -> String {
    let decoded = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
    } else if let Some(dec) = name.strip_prefix('#') {
        dec.parse::<u32>().ok().and_then(char::from_u32)
    } else {
        match name {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{a0}'),
            _ => None,
        }
    };

    decoded
        .filter(|&c| !c.is_control() || matches!(c, '\t' | '\n'))
        .map(String::from)
        .unwrap_or_else(|| original.to_string())
}

/// Chronological order by send date; `None` sorts after every message
pub fn compare_send_dates(left: Option<&Message>, right: Option<&Message>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(l), Some(r)) => l.send_date.cmp(&r.send_date),
    }
}

/// Latest message first; `None` still sorts after every message
pub fn compare_send_dates_latest_first(
    left: Option<&Message>,
    right: Option<&Message>,
) -> Ordering {
    match (left, right) {
        (Some(l), Some(r)) => r.send_date.cmp(&l.send_date),
        _ => compare_send_dates(left, right),
    }
}

/// Message shell for an id received from elsewhere (e.g. a delivery report)
pub fn empty_message(message_id: &str) -> Result<MessageBuilder, ModelError> {
    Ok(MessageBuilder::new(Entity::from_entity_id(message_id)?))
}

/// New message written by the account owner into `chat`
pub fn outgoing_message(
    account: &SmsAccount,
    chat: &Chat,
    body: &str,
    title: Option<&str>,
) -> Message {
    Message {
        entity: Entity::generate(&account.id),
        chat: chat.entity.clone(),
        author: account.user.entity.clone(),
        recipient: chat.other_user().cloned(),
        body: body.to_string(),
        title: title.unwrap_or_default().to_string(),
        send_date: Utc::now(),
        state: MessageState::Sending,
        read: true,
    }
}
