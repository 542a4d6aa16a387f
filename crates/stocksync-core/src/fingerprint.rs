//! Content fingerprints.
//!
//! A fingerprint is a SHA-256 digest over the ordered comparable fields of a
//! record. Two records with the same comparable values always produce the same
//! fingerprint, on any worker, in any run.
//!
//! Each field is framed before hashing: an absent value hashes as a single
//! null tag, a present value as a value tag, its byte length and its canonical
//! text. Adjacent fields therefore never bleed into each other
//! (`"1" + "23"` and `"12" + "3"` differ) and `None` never collides with an
//! empty string.

use std::borrow::Cow;
use std::fmt::{Display, Formatter};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{StoreError, StoreResult};
use crate::model::SyncRecord;

const NULL_TAG: u8 = 0x00;
const VALUE_TAG: u8 = 0x01;

/// Length of a hex-encoded fingerprint.
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// Hex-encoded SHA-256 digest of a record's comparable fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Parse a stored fingerprint, accepting upper or lower case hex.
    pub fn parse(value: &str) -> StoreResult<Self> {
        let value = value.trim();
        if value.len() != FINGERPRINT_HEX_LEN || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(StoreError::invalid_data(format!(
                "fingerprint must be {FINGERPRINT_HEX_LEN} hex characters, got {value:?}"
            )));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    /// The lowercase hex representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value that can take part in a fingerprint.
pub trait FingerprintField {
    /// Canonical text of the value, `None` when absent.
    fn canonical(&self) -> Option<Cow<'_, str>>;
}

impl FingerprintField for str {
    fn canonical(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self))
    }
}

impl FingerprintField for String {
    fn canonical(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(self.as_str()))
    }
}

impl FingerprintField for i32 {
    fn canonical(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(self.to_string()))
    }
}

impl FingerprintField for i64 {
    fn canonical(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(self.to_string()))
    }
}

impl FingerprintField for bool {
    fn canonical(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Borrowed(if *self { "1" } else { "0" }))
    }
}

// Scale is not part of the value: 10.0, 10.00 and 10 hash the same.
impl FingerprintField for Decimal {
    fn canonical(&self) -> Option<Cow<'_, str>> {
        Some(Cow::Owned(self.normalize().to_string()))
    }
}

impl<T: FingerprintField> FingerprintField for Option<T> {
    fn canonical(&self) -> Option<Cow<'_, str>> {
        self.as_ref().and_then(FingerprintField::canonical)
    }
}

impl<T: FingerprintField + ?Sized> FingerprintField for &T {
    fn canonical(&self) -> Option<Cow<'_, str>> {
        (**self).canonical()
    }
}

/// Incremental fingerprint over an ordered field list.
#[derive(Debug, Clone, Default)]
pub struct FingerprintBuilder {
    hasher: Sha256,
}

impl FingerprintBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next field.
    pub fn field<T: FingerprintField + ?Sized>(&mut self, value: &T) -> &mut Self {
        match value.canonical() {
            Some(text) => {
                self.hasher.update([VALUE_TAG]);
                self.hasher.update((text.len() as u64).to_le_bytes());
                self.hasher.update(text.as_bytes());
            }
            None => self.hasher.update([NULL_TAG]),
        }
        self
    }

    /// Finish and return the digest.
    #[must_use]
    pub fn finish(self) -> Fingerprint {
        Fingerprint(hex::encode(self.hasher.finalize()))
    }
}

/// Compute the fingerprint of a record.
#[must_use]
pub fn fingerprint<R: SyncRecord>(record: &R) -> Fingerprint {
    let mut builder = FingerprintBuilder::new();
    record.write_fingerprint(&mut builder);
    builder.finish()
}
