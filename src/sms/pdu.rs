// src/sms/pdu.rs
//! Decoding of incoming SMS payloads (3GPP TS 23.040 SMS-DELIVER PDUs).
//!
//! A received-SMS broadcast carries one PDU per message part. Each part names
//! its originating address and carries a fragment of the text; long messages
//! are split into parts linked by a concatenation header in the user data.

use thiserror::Error;

use super::gsm7;

/// Payload format tag for GSM/UMTS/LTE PDUs
pub const FORMAT_3GPP: &str = "3gpp";

/// Errors that can occur while decoding a PDU
#[derive(Debug, Error, PartialEq)]
pub enum PduError {
    /// Payload format other than 3GPP (e.g. CDMA "3gpp2")
    #[error("Unsupported PDU format: {0}")]
    UnsupportedFormat(String),

    /// PDU ended before the named field
    #[error("PDU truncated while reading {0}")]
    Truncated(&'static str),

    /// Not an SMS-DELIVER (status reports and submits are not message text)
    #[error("Unsupported message type indicator {0}")]
    UnsupportedMessageType(u8),
}

/// Position of one part within a concatenated message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Concatenation {
    pub reference: u16,
    pub total: u8,
    pub sequence: u8,
}

/// One decoded message part
#[derive(Debug, Clone, PartialEq)]
pub struct SmsPart {
    pub originating_address: String,
    pub body: String,
    pub concatenation: Option<Concatenation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Alphabet {
    Gsm7,
    EightBit,
    Ucs2,
}

const MTI_MASK: u8 = 0x03;
const MTI_DELIVER: u8 = 0x00;
const UDHI: u8 = 0x40;

const TON_MASK: u8 = 0x70;
const TON_INTERNATIONAL: u8 = 0x10;
const TON_ALPHANUMERIC: u8 = 0x50;

const IEI_CONCAT_8BIT: u8 = 0x00;
const IEI_CONCAT_16BIT: u8 = 0x08;

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn byte(&mut self, field: &'static str) -> Result<u8, PduError> {
        Ok(self.take(1, field)?[0])
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], PduError> {
        let bytes = self
            .data
            .get(self.pos..self.pos + len)
            .ok_or(PduError::Truncated(field))?;
        self.pos += len;
        Ok(bytes)
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }
}

/// Decode one PDU. `format` is the tag sent alongside the PDUs; a missing
/// tag means 3GPP.
pub fn decode(pdu: &[u8], format: Option<&str>) -> Result<SmsPart, PduError> {
    match format {
        None | Some("") | Some(FORMAT_3GPP) => {}
        Some(other) => return Err(PduError::UnsupportedFormat(other.to_string())),
    }

    let mut reader = Reader::new(pdu);

    let smsc_len = reader.byte("SMSC length")? as usize;
    reader.take(smsc_len, "SMSC address")?;

    let first_octet = reader.byte("first octet")?;
    if first_octet & MTI_MASK != MTI_DELIVER {
        return Err(PduError::UnsupportedMessageType(first_octet & MTI_MASK));
    }

    let originating_address = read_address(&mut reader)?;
    let _protocol_id = reader.byte("protocol identifier")?;
    let alphabet = alphabet(reader.byte("data coding scheme")?);
    reader.take(7, "service centre timestamp")?;
    let user_data_len = reader.byte("user data length")? as usize;
    let user_data = reader.rest();

    let (header_len, concatenation) = if first_octet & UDHI != 0 {
        read_header(user_data)?
    } else {
        (0, None)
    };

    let body = match alphabet {
        Alphabet::Gsm7 => {
            // Length counts septets, header included
            if user_data.len() < gsm7::packed_len(user_data_len) {
                return Err(PduError::Truncated("user data"));
            }
            let septets = gsm7::unpack(user_data, user_data_len);
            // The header is padded to a septet boundary
            let skip = (header_len * 8 + 6) / 7;
            gsm7::decode(septets.get(skip..).unwrap_or_default())
        }
        Alphabet::Ucs2 | Alphabet::EightBit => {
            let payload = user_data
                .get(header_len.min(user_data_len)..user_data_len)
                .ok_or(PduError::Truncated("user data"))?;
            if alphabet == Alphabet::Ucs2 {
                decode_ucs2(payload)
            } else {
                String::from_utf8_lossy(payload).into_owned()
            }
        }
    };

    Ok(SmsPart {
        originating_address,
        body,
        concatenation,
    })
}

fn alphabet(dcs: u8) -> Alphabet {
    match dcs & 0xF0 {
        // General data coding groups
        0x00..=0x70 => match (dcs >> 2) & 0x03 {
            0 => Alphabet::Gsm7,
            2 => Alphabet::Ucs2,
            _ => Alphabet::EightBit,
        },
        // Message waiting indication groups
        0xC0 | 0xD0 => Alphabet::Gsm7,
        0xE0 => Alphabet::Ucs2,
        0xF0 if dcs & 0x04 == 0 => Alphabet::Gsm7,
        _ => Alphabet::EightBit,
    }
}

fn read_address(reader: &mut Reader) -> Result<String, PduError> {
    let digits = reader.byte("address length")? as usize;
    let type_of_address = reader.byte("address type")?;
    let bytes = reader.take((digits + 1) / 2, "address")?;

    if type_of_address & TON_MASK == TON_ALPHANUMERIC {
        // Length is in semi-octets of packed septets
        let septets = digits * 4 / 7;
        return Ok(gsm7::decode(&gsm7::unpack(bytes, septets)));
    }

    let mut address = String::with_capacity(digits + 1);
    if type_of_address & TON_MASK == TON_INTERNATIONAL {
        address.push('+');
    }
    bytes
        .iter()
        .flat_map(|b| [b & 0x0F, b >> 4])
        .take(digits)
        .filter_map(semi_octet)
        .for_each(|c| address.push(c));

    Ok(address)
}

fn semi_octet(nibble: u8) -> Option<char> {
    match nibble {
        0..=9 => Some((b'0' + nibble) as char),
        0x0A => Some('*'),
        0x0B => Some('#'),
        0x0C => Some('a'),
        0x0D => Some('b'),
        0x0E => Some('c'),
        _ => None, // filler
    }
}

/// Returns the header size in octets (length octet included) and any
/// concatenation info found in it.
fn read_header(user_data: &[u8]) -> Result<(usize, Option<Concatenation>), PduError> {
    let header_len = *user_data.first().ok_or(PduError::Truncated("user data header"))? as usize;
    let header = user_data
        .get(1..1 + header_len)
        .ok_or(PduError::Truncated("user data header"))?;

    let mut concatenation = None;
    let mut pos = 0;
    while pos + 2 <= header.len() {
        let id = header[pos];
        let len = header[pos + 1] as usize;
        let data = header
            .get(pos + 2..pos + 2 + len)
            .ok_or(PduError::Truncated("information element"))?;

        match (id, len) {
            (IEI_CONCAT_8BIT, 3) => {
                concatenation = Some(Concatenation {
                    reference: data[0] as u16,
                    total: data[1],
                    sequence: data[2],
                });
            }
            (IEI_CONCAT_16BIT, 4) => {
                concatenation = Some(Concatenation {
                    reference: u16::from_be_bytes([data[0], data[1]]),
                    total: data[2],
                    sequence: data[3],
                });
            }
            _ => {}
        }
        pos += 2 + len;
    }

    Ok((header_len + 1, concatenation))
}

fn decode_ucs2(payload: &[u8]) -> String {
    let units = payload
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
