//! Hash functions for MindGate
//!
//! Two unrelated hashes live here:
//!
//! - `EntryHash`: salted SHA-256 digest of a normalized blocklist phrase. This is
//!   what the privacy-preserving lists store instead of plaintext.
//! - `cache_key`: xxHash64 of an arbitrary candidate string, used only as a key
//!   for the in-memory match result cache.

use std::fmt;
use std::hash::Hasher;

use sha2::{Digest, Sha256};
use twox_hash::XxHash64;

// =============================================================================
// Entry Hash
// =============================================================================

/// Length of an entry digest in bytes.
pub const ENTRY_HASH_LEN: usize = 32;

/// Salted digest of a blocklist phrase.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EntryHash([u8; ENTRY_HASH_LEN]);

impl EntryHash {
    /// Wrap raw digest bytes.
    #[inline]
    pub const fn new(bytes: [u8; ENTRY_HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; ENTRY_HASH_LEN] {
        &self.0
    }

    /// Lowercase hex form, as persisted in settings.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the 64 character hex form. Returns `None` on any other length or
    /// on non-hex characters.
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.len() != ENTRY_HASH_LEN * 2 {
            return None;
        }
        let mut bytes = [0u8; ENTRY_HASH_LEN];
        hex::decode_to_slice(s, &mut bytes).ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Debug for EntryHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First 8 bytes are plenty to tell digests apart in logs
        write!(f, "EntryHash({}..)", hex::encode(&self.0[..8]))
    }
}

/// Normalize a phrase before hashing: lowercase, and collapse every run of
/// non-alphanumeric characters into a single space.
///
/// Both sides of a hashed comparison go through this, so "Foo-Bar" and
/// "foo  bar" produce the same digest.
pub fn normalize_phrase(phrase: &str) -> String {
    let mut out = String::with_capacity(phrase.len());
    for word in split_words(phrase) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&fold_word(word));
    }
    out
}

/// Case-fold one word. Stored phrases and candidate windows both go through
/// this, so context-dependent lowercasing can never split them: every sigma,
/// final or not, folds to `σ`.
pub fn fold_word(word: &str) -> String {
    word.chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c == 'ς' { 'σ' } else { c })
        .collect()
}

/// Compute the salted digest of an already normalized phrase.
#[inline]
pub fn salted_digest(salt: &str, normalized: &str) -> EntryHash {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update([0u8]);
    hasher.update(normalized.as_bytes());
    let mut out = [0u8; ENTRY_HASH_LEN];
    out.copy_from_slice(&hasher.finalize());
    EntryHash(out)
}

/// Normalize and hash a phrase in one step.
#[inline]
pub fn hash_phrase(salt: &str, phrase: &str) -> EntryHash {
    salted_digest(salt, &normalize_phrase(phrase))
}

/// Split text into word tokens (maximal runs of alphanumeric characters).
pub fn split_words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
}

/// Word tokens with their byte ranges in the source text.
pub fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;

    for (i, c) in text.char_indices() {
        if c.is_alphanumeric() {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            spans.push((s, i));
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }

    spans
}

// =============================================================================
// Cache Keys
// =============================================================================

const CACHE_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Compute a 64-bit cache key for a candidate string.
#[inline]
pub fn cache_key(text: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(CACHE_SEED);
    hasher.write(text.as_bytes());
    hasher.finish()
}
