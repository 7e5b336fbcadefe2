//! Type-prefixed identifiers for entities and tenants.
//!
//! An identifier looks like `rsrcpvd-3k9x0a7m2q5w8e1r4t6y0`: a fixed-length
//! prefix naming the kind of thing it identifies, a `-` separator, and a
//! random suffix.
//!
//! # Invariants
//!
//! - The prefix is exactly [`PREFIX_LENGTH`] lowercase ASCII alphanumerics.
//! - The suffix is exactly [`SUFFIX_LENGTH`] lowercase ASCII alphanumerics.
//! - The only identifier that breaks the two rules above is the empty one
//!   returned by [`PrefixedId::default`], which [`PrefixedId::is_empty`]
//!   reports.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of the type prefix.
pub const PREFIX_LENGTH: usize = 7;
/// Length of the random suffix.
///
/// 21 characters over a 36 symbol alphabet is about 108 bits of entropy.
pub const SUFFIX_LENGTH: usize = 21;
/// Separator between prefix and suffix.
pub const SEPARATOR: char = '-';

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// A prefix that is known to be valid.
///
/// Declare prefixes as constants so a bad prefix fails the build:
///
/// ```
/// use resource_registry::types::IdPrefix;
/// const TENANT: IdPrefix = IdPrefix::new("testtnt");
/// assert_eq!(TENANT.as_str(), "testtnt");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdPrefix(&'static str);

impl IdPrefix {
    /// Wrap a prefix, panicking if it is not [`PREFIX_LENGTH`] lowercase
    /// alphanumerics. In a `const` item the panic is a compile error.
    #[must_use]
    pub const fn new(prefix: &'static str) -> Self {
        assert!(
            is_valid_prefix(prefix.as_bytes()),
            "id prefix must be 7 lowercase alphanumeric characters"
        );
        Self(prefix)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for IdPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A globally unique identifier carrying a semantic type prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrefixedId(String);

impl PrefixedId {
    /// Generate a fresh identifier with the given prefix.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidPrefix`] if the prefix is not exactly
    /// [`PREFIX_LENGTH`] lowercase alphanumerics.
    pub fn new(prefix: &str) -> Result<Self, IdError> {
        validate_prefix(prefix)?;
        Ok(Self::with_prefix(prefix))
    }

    /// Generate a fresh identifier for a prefix checked at construction.
    #[must_use]
    pub fn generate(prefix: IdPrefix) -> Self {
        Self::with_prefix(prefix.as_str())
    }

    fn with_prefix(prefix: &str) -> Self {
        let mut rng = rand::rng();
        let mut value = String::with_capacity(PREFIX_LENGTH + 1 + SUFFIX_LENGTH);
        value.push_str(prefix);
        value.push(SEPARATOR);
        for _ in 0..SUFFIX_LENGTH {
            let index = rng.random_range(0..ALPHABET.len());
            value.push(char::from(ALPHABET[index]));
        }
        Self(value)
    }

    /// Parse an identifier from its string form.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is empty, has no separator, or either
    /// part breaks the length/alphabet rules.
    pub fn parse(value: &str) -> Result<Self, IdError> {
        let Some((prefix, suffix)) = value.split_once(SEPARATOR) else {
            return Err(IdError::InvalidFormat(value.to_string()));
        };
        validate_prefix(prefix)?;
        if suffix.len() != SUFFIX_LENGTH || !is_id_alphabet(suffix) {
            return Err(IdError::InvalidFormat(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// The type prefix, or `""` for the empty identifier.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.0
            .split_once(SEPARATOR)
            .map_or("", |(prefix, _)| prefix)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the empty (unset) identifier.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

const fn is_valid_prefix(bytes: &[u8]) -> bool {
    if bytes.len() != PREFIX_LENGTH {
        return false;
    }
    let mut i = 0;
    while i < bytes.len() {
        if !(bytes[i].is_ascii_lowercase() || bytes[i].is_ascii_digit()) {
            return false;
        }
        i += 1;
    }
    true
}

fn validate_prefix(prefix: &str) -> Result<(), IdError> {
    if is_valid_prefix(prefix.as_bytes()) {
        Ok(())
    } else {
        Err(IdError::InvalidPrefix(prefix.to_string()))
    }
}

fn is_id_alphabet(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

impl fmt::Display for PrefixedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PrefixedId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PrefixedId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PrefixedId> for String {
    fn from(id: PrefixedId) -> Self {
        id.0
    }
}

/// Error returned when an identifier cannot be generated or parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The prefix is not [`PREFIX_LENGTH`] lowercase alphanumerics.
    InvalidPrefix(String),
    /// The value is not `<prefix>-<suffix>`.
    InvalidFormat(String),
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPrefix(prefix) => write!(
                f,
                "invalid id prefix '{prefix}': must be {PREFIX_LENGTH} lowercase alphanumeric characters"
            ),
            Self::InvalidFormat(value) => write!(f, "invalid prefixed id: '{value}'"),
        }
    }
}

impl std::error::Error for IdError {}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_new_id_starts_with_prefix() {
        let id = PrefixedId::new("testtnt").unwrap();
        assert!(id.as_str().starts_with("testtnt-"));
        assert_eq!(id.prefix(), "testtnt");
        assert_eq!(id.as_str().len(), PREFIX_LENGTH + 1 + SUFFIX_LENGTH);
        assert!(!id.is_empty());
    }

    #[test]
    fn test_new_ids_do_not_collide() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let id = PrefixedId::new("rsrcpvd").unwrap();
            assert!(seen.insert(id), "generated a duplicate id");
        }
    }

    #[test]
    fn test_generate_with_const_prefix() {
        const TENANT: IdPrefix = IdPrefix::new("testtnt");
        let a = PrefixedId::generate(TENANT);
        let b = PrefixedId::generate(TENANT);
        assert_eq!(a.prefix(), "testtnt");
        assert_ne!(a, b);
    }

    #[test]
    #[should_panic(expected = "id prefix must be 7")]
    fn test_id_prefix_rejects_bad_prefix_at_runtime() {
        let prefix = String::from("nope");
        let leaked: &'static str = prefix.leak();
        let _ = IdPrefix::new(leaked);
    }

    #[test]
    fn test_new_rejects_bad_prefix() {
        for prefix in ["", "short", "toolongprefix", "TESTTNT", "test-nt"] {
            assert_eq!(
                PrefixedId::new(prefix),
                Err(IdError::InvalidPrefix(prefix.to_string()))
            );
        }
    }

    #[test]
    fn test_parse_roundtrips_generated_id() {
        let id = PrefixedId::new("testtnt").unwrap();
        let parsed: PrefixedId = id.as_str().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(PrefixedId::parse("").is_err());
        assert!(PrefixedId::parse("testtnt").is_err());
        assert!(PrefixedId::parse("testtnt-abc").is_err());
        assert!(PrefixedId::parse("testtnt-ABCDEFGHIJKLMNOPQRSTU").is_err());
    }

    #[test]
    fn test_default_is_empty() {
        let id = PrefixedId::default();
        assert!(id.is_empty());
        assert_eq!(id.prefix(), "");
    }

    #[test]
    fn test_serde_uses_string_form() {
        let id = PrefixedId::new("testtnt").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));

        let back: PrefixedId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<PrefixedId>("\"nope\"").is_err());
    }
}
