use anyhow::{bail, Result};
use sha1::{Digest, Sha1};

use crate::tracker::state::WorkState;

pub const DIGEST_LEN: usize = 40;

/// A record ending with this digest is accepted without verification, so a state file can be
/// fixed by hand. Anyone able to edit the file can bypass the integrity check with it.
pub const UNVERIFIED_DIGEST: &str = "----------------------------------------";

/// Lowercase hex SHA-1 of the serialized state.
pub fn digest(serialized: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(serialized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Serializes the state followed by a newline and the digest of the serialization.
pub fn encode(state: &WorkState) -> Result<String> {
    let json = serde_json::to_string_pretty(state)?;
    let json = json.trim();
    Ok(format!("{json}\n{}", digest(json)))
}

/// Verifies and parses a record produced by [encode]. Surrounding whitespace is ignored.
pub fn decode(text: &str) -> Result<WorkState> {
    let text = text.trim();
    if text.len() < DIGEST_LEN {
        bail!("Record is too short to hold a digest");
    }
    let split = text.len() - DIGEST_LEN;
    if !text.is_char_boundary(split) {
        bail!("Malformed digest");
    }
    let (body, stored) = text.split_at(split);
    let body = body.trim();

    if stored != UNVERIFIED_DIGEST {
        if !stored.bytes().all(|b| b.is_ascii_hexdigit()) {
            bail!("Malformed digest {stored:?}");
        }
        if !stored.eq_ignore_ascii_case(&digest(body)) {
            bail!("Digest mismatch");
        }
    }

    Ok(serde_json::from_str(body)?)
}
