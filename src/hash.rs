//! Content-derived identifiers.
//!
//! Framing: each present part is written as `<byte length>:<bytes>`, each
//! absent part as the single byte `~`. The framed sequence is digested with
//! SHA-224 and rendered as lowercase hex. Length prefixes make the encoding
//! injective, so `["ab", "c"]` and `["a", "bc"]` never collide, and the
//! absent marker keeps `None` distinct from `Some("")`.

use sha2::{Digest, Sha224};

/// Marker written for an absent part.
const ABSENT: &[u8] = b"~";

/// Digest an ordered sequence of optional parts into a 56-char hex string.
pub fn uri_hash<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut hasher = Sha224::new();
    for part in parts {
        match part {
            Some(value) => {
                hasher.update(value.len().to_string().as_bytes());
                hasher.update(b":");
                hasher.update(value.as_bytes());
            }
            None => hasher.update(ABSENT),
        }
    }
    format!("{:x}", hasher.finalize())
}

/// Cache fingerprint for an enrichment step's input.
///
/// The step name is part of the digest, so the same text fed to two steps
/// never shares a cache line.
pub fn fingerprint(step: &str, input: &str) -> String {
    uri_hash([Some("fingerprint"), Some(step), Some(input)])
}
