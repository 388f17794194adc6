// src/sms/mod.rs
//! SMS intake: platform broadcasts in, domain messages out.
//!
//! While an [`SmsConnection`] is started it receives three broadcasts:
//! received SMS (raw PDUs), and sent/delivered reports for messages this
//! account sent earlier.

use serde::{Deserialize, Serialize};

pub mod connection;
pub mod contacts;
pub mod gsm7;
pub mod pdu;
pub mod senders;

pub use connection::{SmsConnection, SmsReceiver};
pub use pdu::{PduError, SmsPart};
pub use senders::SenderMessages;

/// Platform broadcast for an incoming SMS
pub const ACTION_SMS_RECEIVED: &str = "android.provider.Telephony.SMS_RECEIVED";
/// Our own broadcast fired when an outgoing SMS left the device
pub const ACTION_SMS_SENT: &str = "messenger.sms.SMS_SENT";
/// Our own broadcast fired when the network confirmed delivery
pub const ACTION_SMS_DELIVERED: &str = "messenger.sms.SMS_DELIVERED";

/// One platform broadcast relevant to SMS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SmsIntent {
    /// Raw message parts, one PDU each
    Received {
        #[serde(with = "hex_pdus")]
        pdus: Vec<Vec<u8>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    Sent {
        #[serde(default)]
        message_id: Option<String>,
    },
    Delivered {
        #[serde(default)]
        message_id: Option<String>,
    },
}

impl SmsIntent {
    pub fn action(&self) -> &'static str {
        match self {
            SmsIntent::Received { .. } => ACTION_SMS_RECEIVED,
            SmsIntent::Sent { .. } => ACTION_SMS_SENT,
            SmsIntent::Delivered { .. } => ACTION_SMS_DELIVERED,
        }
    }
}

// PDUs travel as hex strings in replay files
mod hex_pdus {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S: Serializer>(pdus: &Vec<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(pdus.iter().map(hex::encode_upper))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|pdu| hex::decode(pdu.trim()).map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_json() {
        let intents: Vec<SmsIntent> = serde_json::from_str(
            r#"[
                {"type": "received", "pdus": ["0004", "ff"], "format": "3gpp"},
                {"type": "sent", "message_id": "sms:1"},
                {"type": "delivered"}
            ]"#,
        )
        .unwrap();

        assert_eq!(
            intents[0],
            SmsIntent::Received {
                pdus: vec![vec![0x00, 0x04], vec![0xFF]],
                format: Some("3gpp".to_string()),
            }
        );
        assert_eq!(intents[1], SmsIntent::Sent { message_id: Some("sms:1".to_string()) });
        assert_eq!(intents[2], SmsIntent::Delivered { message_id: None });
        assert_eq!(intents[2].action(), ACTION_SMS_DELIVERED);

        let json = serde_json::to_string(&intents[0]).unwrap();
        assert_eq!(json, r#"{"type":"received","pdus":["0004","FF"],"format":"3gpp"}"#);
    }

    #[test]
    fn test_intent_json_rejects_bad_hex() {
        let result: Result<SmsIntent, _> =
            serde_json::from_str(r#"{"type": "received", "pdus": ["zz"]}"#);
        assert!(result.is_err());
    }
}
