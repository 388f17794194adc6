// src/phone.rs
//! Phone number normalization and formatting-tolerant comparison.

use std::fmt;

/// Shortest trailing digit run that counts as the same subscriber number
/// when one side carries a country or trunk prefix the other lacks.
pub const MIN_MATCH_DIGITS: usize = 7;

const MIN_DIGITS: usize = 3;
const MAX_DIGITS: usize = 15; // E.164 limit

/// A telephone number as typed or as reported by the network.
///
/// Equality via [`PhoneNumber::same`] ignores formatting, so `"555-1234"`,
/// `"(555) 1234"` and `"+1 555 1234"` all refer to the same subscriber.
#[derive(Debug, Clone)]
pub struct PhoneNumber {
    raw: String,
    digits: String,
    international: bool,
    valid: bool,
}

impl PhoneNumber {
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim().to_string();
        let mut digits = String::with_capacity(raw.len());
        let mut international = false;
        let mut valid = true;

        for (i, c) in raw.chars().enumerate() {
            match c {
                '0'..='9' => digits.push(c),
                '+' if i == 0 => international = true,
                ' ' | '-' | '.' | '(' | ')' | '/' => {}
                _ => valid = false,
            }
        }

        // International call prefix written out instead of '+'
        if !international && digits.starts_with("00") {
            digits.drain(..2);
            international = true;
        }

        let valid = valid && (MIN_DIGITS..=MAX_DIGITS).contains(&digits.len());

        PhoneNumber {
            raw,
            digits,
            international,
            valid,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Normalized form for valid numbers, the trimmed input otherwise
    pub fn number(&self) -> String {
        if !self.valid {
            return self.raw.clone();
        }
        if self.international {
            format!("+{}", self.digits)
        } else {
            self.digits.clone()
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Formatting-tolerant comparison. Invalid numbers never match anything.
    pub fn same(&self, other: &PhoneNumber) -> bool {
        if !self.valid || !other.valid {
            return false;
        }
        if self.digits == other.digits {
            return true;
        }

        let (shorter, longer) = if self.digits.len() <= other.digits.len() {
            (&self.digits, &other.digits)
        } else {
            (&other.digits, &self.digits)
        };
        shorter.len() >= MIN_MATCH_DIGITS && longer.ends_with(shorter.as_str())
    }

    /// Shortcut for comparing against a stored phone property
    pub fn same_as(&self, other: &str) -> bool {
        self.same(&PhoneNumber::new(other))
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.number())
    }
}
