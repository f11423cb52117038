use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::errors::ProblemError;

/// Candidate solution, also the input that evolves the seed chain.
pub type Nonce = u64;

/// Longest usable prefix: every nibble of a SHA-256 digest.
pub const MAX_FINGERPRINT_LEN: usize = 64;

/// Lowercase hex prefix a candidate digest must start with.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn parse(prefix: &str) -> Result<Self, ProblemError> {
        let valid = !prefix.is_empty()
            && prefix.len() <= MAX_FINGERPRINT_LEN
            && prefix.bytes().all(|b| b.is_ascii_hexdigit());
        if !valid {
            return Err(ProblemError::InvalidFingerprint(prefix.to_string()));
        }
        Ok(Self(prefix.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of hex characters to compare.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = ProblemError;

    fn try_from(prefix: String) -> Result<Self, Self::Error> {
        Self::parse(&prefix)
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletId(pub String);

impl WalletId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for WalletId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A winning nonce paired with the reference hash it was mined against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub challenge_id: Option<u64>,
    pub nonce: Nonce,
    pub last_solution_hash: String,
}
