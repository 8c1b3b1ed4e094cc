//! Cache keys.
//!
//! Key material is an ordered list of tagged fields; its SHA-256 digest is
//! the fingerprint. Entries keep their material so a lookup can confirm the
//! fingerprint was computed from the same inputs.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex SHA-256 of a [`KeyMaterial`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for logs.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything a cached value depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyMaterial(String);

impl KeyMaterial {
    /// Material for one tier; the tier name is the first field.
    pub fn new(tier: &str) -> Self {
        KeyMaterial(String::new()).field("tier", tier)
    }

    /// Append a field. Values are length-prefixed, so no choice of values
    /// can make two different field lists produce the same material.
    pub fn field(mut self, name: &str, value: impl fmt::Display) -> Self {
        let value = value.to_string();
        self.0.push_str(name);
        self.0.push('=');
        self.0.push_str(&value.len().to_string());
        self.0.push(':');
        self.0.push_str(&value);
        self.0.push(';');
        self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint(format!("{:x}", Sha256::digest(self.0.as_bytes())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let a = KeyMaterial::new("sql").field("dialect", "postgres").field("sql", "SELECT 1");
        let b = KeyMaterial::new("sql").field("dialect", "postgres").field("sql", "SELECT 1");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().as_str().len(), 64);
        assert_eq!(a.fingerprint().short().len(), 12);
    }

    #[test]
    fn test_fields_cannot_run_together() {
        let a = KeyMaterial::new("sql").field("a", "x;b=1:y").field("c", "");
        let b = KeyMaterial::new("sql").field("a", "x").field("b", "y").field("c", "");
        assert_ne!(a, b);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_ne!(
            KeyMaterial::new("sql").fingerprint(),
            KeyMaterial::new("ast").fingerprint()
        );
    }
}
