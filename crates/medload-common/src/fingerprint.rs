//! Content fingerprints
//!
//! A fingerprint is the lowercase hex SHA-256 of an ordered list of rendered
//! values, each trimmed and joined with [`FIELD_SEPARATOR`]. Callers are
//! responsible for rendering absent values as the empty string and for pinning
//! the order of the values they pass in.
//!
//! # Known limitation
//!
//! The separator is not escaped. A value that itself contains `|` can make two
//! different tuples produce the same joined bytes:
//!
//! ```
//! use medload_common::fingerprint;
//!
//! assert_eq!(fingerprint(["a|b", "c"]), fingerprint(["a", "b|c"]));
//! ```

use sha2::{Digest, Sha256};

/// Separator placed between rendered values before hashing
pub const FIELD_SEPARATOR: char = '|';

/// Length of a hex-encoded SHA-256 digest
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// Compute the fingerprint of an ordered sequence of rendered values.
///
/// Equivalent to hashing `values.map(trim).join("|")`, without building the
/// joined string.
pub fn fingerprint<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut separator = [0u8; 4];
    let separator = FIELD_SEPARATOR.encode_utf8(&mut separator).as_bytes();

    let mut hasher = Sha256::new();
    for (position, value) in values.into_iter().enumerate() {
        if position > 0 {
            hasher.update(separator);
        }
        hasher.update(value.as_ref().trim().as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// Check that a string looks like a fingerprint produced by [`fingerprint`]
pub fn is_fingerprint(candidate: &str) -> bool {
    candidate.len() == FINGERPRINT_HEX_LEN
        && candidate.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
