// src/sms/gsm7.rs
//! GSM 03.38 default alphabet: septet unpacking and character mapping.

const ESCAPE: u8 = 0x1B;

#[rustfmt::skip]
const BASIC: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å',
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1b}', 'Æ', 'æ', 'ß', 'É',
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/',
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?',
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O',
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§',
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o',
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à',
];

fn extension(septet: u8) -> Option<char> {
    match septet {
        0x0A => Some('\u{0c}'),
        0x14 => Some('^'),
        0x28 => Some('{'),
        0x29 => Some('}'),
        0x2F => Some('\\'),
        0x3C => Some('['),
        0x3D => Some('~'),
        0x3E => Some(']'),
        0x40 => Some('|'),
        0x65 => Some('€'),
        _ => None,
    }
}

/// Number of octets holding `septets` packed septets
pub fn packed_len(septets: usize) -> usize {
    (septets * 7 + 7) / 8
}

/// Unpack `count` septets from a little-endian packed bit stream.
/// The caller guarantees `data` holds at least `packed_len(count)` octets.
pub fn unpack(data: &[u8], count: usize) -> Vec<u8> {
    (0..count)
        .map(|i| {
            let offset = i * 7;
            let index = offset / 8;
            let shift = offset % 8;

            let mut value = (data[index] as u16) >> shift;
            if shift > 1 && index + 1 < data.len() {
                value |= (data[index + 1] as u16) << (8 - shift);
            }
            (value & 0x7F) as u8
        })
        .collect()
}

/// Map septets to text, resolving escape sequences into the extension table.
pub fn decode(septets: &[u8]) -> String {
    let mut text = String::with_capacity(septets.len());
    let mut escaped = false;

    for &septet in septets {
        if escaped {
            // Unknown extension codes fall back to the basic table
            text.push(extension(septet).unwrap_or(BASIC[septet as usize & 0x7F]));
            escaped = false;
        } else if septet == ESCAPE {
            escaped = true;
        } else {
            text.push(BASIC[septet as usize & 0x7F]);
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack_classic_example() {
        // "How are you?" from the 3GPP SMS-DELIVER example PDU
        let packed = hex::decode("C8F71D14969741F977FD07").unwrap();
        assert_eq!(packed_len(12), packed.len());
        assert_eq!(decode(&unpack(&packed, 12)), "How are you?");
    }

    #[test]
    fn test_extension_table() {
        assert_eq!(decode(&[0x1B, 0x65, 0x20, 0x1B, 0x3C, 0x1B, 0x3E]), "€ []");
        // ESC followed by an unassigned code
        assert_eq!(decode(&[0x1B, 0x41]), "A");
    }

    #[test]
    fn test_national_characters() {
        assert_eq!(decode(&[0x00, 0x01, 0x10, 0x5F, 0x7F]), "@£Δ§à");
    }
}
