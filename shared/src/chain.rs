//! Seed chain: the deterministic link between a reference hash, a nonce and
//! the pseudo-random stream a solver explores.
//!
//! Every byte fed to SHA-256 here must be reproducible by the party that
//! verifies a submission, so numbers are always hashed as their minimal
//! decimal ASCII form and seeds are read little-endian.

use std::fmt::Write as _;

use rand_mt::Mt64;
use sha2::{Digest, Sha256};

use crate::types::{Fingerprint, Nonce};

pub type Digest32 = [u8; 32];

/// Output of one chain step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seed {
    pub seed: u64,
    pub digest: Digest32,
}

/// Write `n` as minimal decimal ASCII ("0" for zero, no leading zeros).
pub fn encode_decimal(n: u64, buf: &mut String) -> &str {
    buf.clear();
    // writing into a String cannot fail
    let _ = write!(buf, "{n}");
    buf.as_str()
}

/// `digest = SHA-256(previous_hash ‖ decimal(nonce))`, `seed` = first 8 digest bytes, LE.
pub fn derive(previous_hash: &[u8], nonce: Nonce) -> Seed {
    let mut buf = String::with_capacity(20);
    let mut hasher = Sha256::new();
    hasher.update(previous_hash);
    hasher.update(encode_decimal(nonce, &mut buf).as_bytes());
    let digest: Digest32 = hasher.finalize().into();

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    Seed { seed: u64::from_le_bytes(head), digest }
}

/// Streams numbers into SHA-256 as concatenated decimal strings.
pub struct DecimalHasher {
    hasher: Sha256,
    buf: String,
}

impl DecimalHasher {
    pub fn new() -> Self {
        Self { hasher: Sha256::new(), buf: String::with_capacity(20) }
    }

    pub fn update(&mut self, n: u64) {
        let DecimalHasher { hasher, buf } = self;
        hasher.update(encode_decimal(n, buf).as_bytes());
    }

    pub fn finalize(self) -> Digest32 {
        self.hasher.finalize().into()
    }
}

impl Default for DecimalHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Compare the leading `fingerprint.len()` hex nibbles of `digest`.
pub fn matches_fingerprint(digest: &Digest32, fingerprint: &Fingerprint) -> bool {
    let nibbles = fingerprint.len();
    let bytes = nibbles.div_ceil(2).min(digest.len());
    let encoded = hex::encode(&digest[..bytes]);
    encoded.get(..nibbles) == Some(fingerprint.as_str())
}

/// Per-worker generator that re-seeds itself through the chain.
///
/// Remembers the nonce behind the active seed, which is the value reported
/// when the current stream produces a solution.
pub struct ChainRng {
    rng: Mt64,
    reference: Vec<u8>,
    nonce: Nonce,
}

impl ChainRng {
    pub fn new(reference: &[u8], initial_nonce: Nonce) -> Self {
        let Seed { seed, .. } = derive(reference, initial_nonce);
        Self { rng: Mt64::new(seed), reference: reference.to_vec(), nonce: initial_nonce }
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    /// Nonce that produced the active seed.
    pub fn nonce(&self) -> Nonce {
        self.nonce
    }

    /// Draw the next nonce from the stream and re-seed from it.
    pub fn advance(&mut self) {
        self.nonce = self.rng.next_u64();
        let Seed { seed, .. } = derive(&self.reference, self.nonce);
        self.rng.reseed(seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

    #[test]
    fn decimal_encoding_is_minimal() {
        let mut buf = String::from("garbage");
        assert_eq!(encode_decimal(0, &mut buf), "0");
        assert_eq!(encode_decimal(7, &mut buf), "7");
        assert_eq!(encode_decimal(1000, &mut buf), "1000");
        assert_eq!(encode_decimal(u64::MAX, &mut buf), "18446744073709551615");
    }

    #[test]
    fn derive_matches_known_vector() {
        let first = derive(ZERO_HASH.as_bytes(), 1337);
        assert_eq!(first.seed, 9255472728155940982);
        assert_eq!(
            hex::encode(first.digest),
            "76e80c9e680b7280b75bda97fb21ada99f71d506bc475baa307197ae1cdb55ff"
        );
        // same inputs, same output
        assert_eq!(derive(ZERO_HASH.as_bytes(), 1337), first);

        let zero = derive(ZERO_HASH.as_bytes(), 0);
        assert_eq!(zero.seed, 1659898164593766885);
    }

    #[test]
    fn mersenne_twister_reference_stream() {
        // first output of MT19937-64 for the reference seed 5489
        let mut rng = Mt64::new(5489);
        assert_eq!(rng.next_u64(), 14514284786278117030);
    }

    #[test]
    fn fingerprint_compares_nibbles() {
        let digest = derive(ZERO_HASH.as_bytes(), 1337).digest;
        for prefix in ["7", "76", "76e", "76e80c9e"] {
            assert!(matches_fingerprint(&digest, &Fingerprint::parse(prefix).unwrap()), "{prefix}");
        }
        for prefix in ["6", "77", "76f", "76e80c9f"] {
            assert!(!matches_fingerprint(&digest, &Fingerprint::parse(prefix).unwrap()), "{prefix}");
        }
        let full = hex::encode(digest);
        assert!(matches_fingerprint(&digest, &Fingerprint::parse(&full).unwrap()));
    }

    #[test]
    fn chain_rng_tracks_active_nonce() {
        let mut rng = ChainRng::new(ZERO_HASH.as_bytes(), 42);
        assert_eq!(rng.nonce(), 42);
        for _ in 0..10 {
            rng.next_u64();
        }
        rng.advance();
        assert_eq!(rng.nonce(), 13456022957796054247);
    }
}
