//! Short random identifiers
//!
//! User identifiers are 8 characters drawn uniformly from `[A-Za-z0-9]`.
//! They double as the subject of issued bearer tokens.

use crate::MunitError;
use rand::{rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const ID_LEN: usize = 8;
const SYMBOLS: &[u8] = b"AaBbCcDdEeFfGgHhIiJjKkLlMmNnOoPpQqRrSsTtUuVvWwXxYyZz0123456789";

/// Identifier of a user account
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Generate a fresh identifier from the OS random source
    pub fn generate() -> Self {
        let mut rng = OsRng;
        let id = (0..ID_LEN)
            .map(|_| SYMBOLS[rng.gen_range(0..SYMBOLS.len())] as char)
            .collect();
        Self(id)
    }

    /// Parse and validate an identifier
    pub fn parse(s: &str) -> Result<Self, MunitError> {
        let valid = s.len() == ID_LEN && s.bytes().all(|b| SYMBOLS.contains(&b));
        if !valid {
            return Err(MunitError::InvalidId);
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UserId {
    type Err = MunitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UserId {
    type Error = MunitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uses_alphabet() {
        for _ in 0..100 {
            let id = UserId::generate();
            assert_eq!(id.as_str().len(), ID_LEN);
            assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()), "{id}");
        }
    }

    #[test]
    fn test_generated_ids_parse() {
        let id = UserId::generate();
        assert_eq!(UserId::parse(id.as_str()).unwrap(), id);
    }

    #[test]
    fn test_parse() {
        let cases = [
            ("", false),
            ("1234", false),
            ("asd31234", true),
            ("as__d234", false),
            ("asd312345", false),
        ];

        for (input, ok) in cases {
            assert_eq!(UserId::parse(input).is_ok(), ok, "input: {input:?}");
        }
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let id: UserId = serde_json::from_str("\"Ab3dEf9h\"").unwrap();
        assert_eq!(id.to_string(), "Ab3dEf9h");
        assert!(serde_json::from_str::<UserId>("\"nope\"").is_err());
    }
}
