//! User record
//!
//! The email address is the only field validated before a record reaches
//! storage.

use serde::{Deserialize, Serialize};

/// The information held for a particular user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Assigned by the store; ignored on input
    #[serde(default)]
    pub id: u64,

    /// The user email address
    pub email: String,

    /// The user phone number (may be empty)
    #[serde(default)]
    pub phone: String,
}

impl User {
    /// Create a candidate record (id is assigned on insert)
    pub fn new(email: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            id: 0,
            email: email.into(),
            phone: phone.into(),
        }
    }

    /// True if the record may be stored
    pub fn is_valid(&self) -> bool {
        is_email_valid(&self.email)
    }
}

/// Whether `email` contains something shaped like an address.
///
/// Case-insensitive and unanchored: somewhere in the string there must be at
/// least one of `[A-Z0-9._%+-]`, an `@`, one or more `[A-Z0-9-]+.` labels and
/// at least two letters.
pub fn is_email_valid(email: &str) -> bool {
    let bytes = email.as_bytes();
    bytes.iter().enumerate().any(|(at, &b)| {
        b == b'@' && at > 0 && is_local_char(bytes[at - 1]) && has_domain(&bytes[at + 1..])
    })
}

fn is_local_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'%' | b'+' | b'-')
}

fn is_label_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-'
}

fn has_domain(rest: &[u8]) -> bool {
    let mut pos = 0;
    loop {
        let label = rest[pos..].iter().take_while(|&&b| is_label_char(b)).count();
        if label == 0 {
            return false;
        }
        pos += label;

        if rest.get(pos) != Some(&b'.') {
            return false;
        }
        pos += 1;

        let letters = rest[pos..]
            .iter()
            .take_while(|b| b.is_ascii_alphabetic())
            .count();
        if letters >= 2 {
            return true;
        }
    }
}
