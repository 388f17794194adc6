// src/sms/senders.rs
//! Grouping of decoded message parts by originating address.

use log::{debug, warn};
use std::collections::BTreeSet;

use super::pdu::{self, SmsPart};

/// Message texts from one originating address
#[derive(Debug, Clone, PartialEq)]
pub struct SenderMessages {
    pub address: String,
    pub bodies: Vec<String>,
}

/// Decode `pdus` and join the parts of each sender into one message text.
///
/// Senders keep the order in which they first appear. Undecodable parts,
/// parts without an address and senders whose text ends up empty are dropped.
pub fn messages_by_sender(pdus: &[Vec<u8>], format: Option<&str>) -> Vec<SenderMessages> {
    let mut groups: Vec<(String, Vec<SmsPart>)> = Vec::new();

    for (index, raw) in pdus.iter().enumerate() {
        let part = match pdu::decode(raw, format) {
            Ok(part) => part,
            Err(e) => {
                warn!("Skipping SMS part {}: {}", index, e);
                continue;
            }
        };
        if part.originating_address.is_empty() {
            debug!("Skipping SMS part {} without originating address", index);
            continue;
        }

        match groups.iter_mut().find(|(address, _)| *address == part.originating_address) {
            Some((_, parts)) => parts.push(part),
            None => groups.push((part.originating_address.clone(), vec![part])),
        }
    }

    groups
        .into_iter()
        .filter_map(|(address, mut parts)| {
            order_parts(&mut parts);
            if !is_complete(&parts) {
                warn!("Message from {} is missing parts, keeping what arrived", address);
            }
            let body: String = parts.iter().map(|part| part.body.as_str()).collect();
            if body.is_empty() {
                debug!("Dropping empty message from {}", address);
                None
            } else {
                Some(SenderMessages {
                    address,
                    bodies: vec![body],
                })
            }
        })
        .collect()
}

/// Put the parts of one concatenated message into sequence order. Parts
/// without a header, or from different messages, stay as delivered.
fn order_parts(parts: &mut [SmsPart]) {
    let reference = parts.first().and_then(|part| part.concatenation).map(|c| c.reference);
    let single_message = reference.is_some()
        && parts
            .iter()
            .all(|part| part.concatenation.map(|c| c.reference) == reference);

    if single_message {
        parts.sort_by_key(|part| part.concatenation.map(|c| c.sequence));
    }
}

/// Whether every part announced by the concatenation headers is present.
/// Parts without a header are complete on their own.
fn is_complete(parts: &[SmsPart]) -> bool {
    let mut seen: Vec<(u16, u8, BTreeSet<u8>)> = Vec::new();
    for concat in parts.iter().filter_map(|part| part.concatenation) {
        match seen.iter_mut().find(|(reference, ..)| *reference == concat.reference) {
            Some((_, _, sequences)) => {
                sequences.insert(concat.sequence);
            }
            None => seen.push((concat.reference, concat.total, BTreeSet::from([concat.sequence]))),
        }
    }

    seen.iter().all(|(_, total, sequences)| {
        (1..=*total).all(|sequence| sequences.contains(&sequence))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_WORLD: &str = "00040781551532F40000321072611530000BC8329BFD065DDF723619";
    const PART_1: &str = "00440781551532F40000321072611530000D0500032A0201906536FB0D02";
    const PART_2: &str = "00440781551532F40000321072611530000C0500032A0202AE6F399B0C";
    const OTHER_SENDER: &str = "00040781559578F60000321072611530000DD3F2F8ED2683E66537B92C07";
    const EMPTY_BODY: &str = "00040781551532F400003210726115300000";

    fn pdus(hex_pdus: &[&str]) -> Vec<Vec<u8>> {
        hex_pdus.iter().map(|p| hex::decode(p).unwrap()).collect()
    }

    #[test]
    fn test_single_part() {
        let senders = messages_by_sender(&pdus(&[HELLO_WORLD]), None);
        assert_eq!(
            senders,
            vec![SenderMessages {
                address: "5551234".to_string(),
                bodies: vec!["Hello World".to_string()],
            }]
        );
    }

    #[test]
    fn test_parts_are_joined_in_sequence_order() {
        let in_order = messages_by_sender(&pdus(&[PART_1, PART_2]), None);
        let reversed = messages_by_sender(&pdus(&[PART_2, PART_1]), None);

        assert_eq!(in_order[0].bodies, vec!["Hello World".to_string()]);
        assert_eq!(reversed, in_order);
    }

    #[test]
    fn test_missing_part_keeps_what_arrived() {
        let senders = messages_by_sender(&pdus(&[PART_2]), None);
        assert_eq!(senders[0].bodies, vec!["World".to_string()]);
    }

    #[test]
    fn test_completeness() {
        let decoded = |hex_pdus: &[&str]| -> Vec<SmsPart> {
            hex_pdus
                .iter()
                .map(|p| pdu::decode(&hex::decode(p).unwrap(), None).unwrap())
                .collect()
        };

        assert!(is_complete(&decoded(&[HELLO_WORLD])));
        assert!(is_complete(&decoded(&[PART_2, PART_1])));
        assert!(!is_complete(&decoded(&[PART_1])));
        assert!(!is_complete(&decoded(&[PART_2, PART_2])));
    }

    #[test]
    fn test_distinct_senders_are_kept_apart() {
        let senders = messages_by_sender(&pdus(&[PART_1, OTHER_SENDER, PART_2]), None);

        assert_eq!(senders.len(), 2);
        assert_eq!(senders[0].address, "5551234");
        assert_eq!(senders[0].bodies, vec!["Hello World".to_string()]);
        assert_eq!(senders[1].address, "5559876");
        assert_eq!(senders[1].bodies, vec!["Second sender".to_string()]);
    }

    #[test]
    fn test_degenerate_payloads_are_dropped() {
        assert!(messages_by_sender(&[], None).is_empty());
        assert!(messages_by_sender(&pdus(&[EMPTY_BODY]), None).is_empty());
        assert!(messages_by_sender(&[vec![0x00u8]], None).is_empty());
        assert!(messages_by_sender(&pdus(&[HELLO_WORLD]), Some("3gpp2")).is_empty());

        // A broken part does not take the good ones down with it
        let broken = vec![0x07u8, 0x91];
        let senders = messages_by_sender(&[broken, hex::decode(HELLO_WORLD).unwrap()], None);
        assert_eq!(senders.len(), 1);
    }
}
