// SMS side of the messenger: message presentation helpers and the SMS intake adapter
pub mod broadcast;
pub mod config;
pub mod messages;
pub mod models;
pub mod phone;
pub mod services;
pub mod sms;

// Re-export main types for convenience
pub use models::*;
pub use phone::PhoneNumber;
pub use sms::{SmsConnection, SmsIntent};
