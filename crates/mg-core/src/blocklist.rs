//! Blocklists
//!
//! A blocklist is either a set of lowercase plaintext entries or a set of
//! salted phrase digests. It is immutable once built; a settings change
//! produces a new one.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::hash::{hash_phrase, normalize_phrase, salted_digest, EntryHash};
use crate::url::normalize_site;

/// What the entries of a list name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Words and phrases.
    Word,
    /// Site identifiers (hosts).
    Site,
}

/// A blocklist in one of the two storage forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockList {
    Plain(PlainBlockList),
    Hashed(HashedBlockList),
}

impl Default for BlockList {
    fn default() -> Self {
        Self::Plain(PlainBlockList::default())
    }
}

impl BlockList {
    /// Build a plaintext list of words/phrases.
    pub fn words<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Plain(PlainBlockList::new(entries, EntryKind::Word))
    }

    /// Build a plaintext list of sites.
    pub fn sites<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Plain(PlainBlockList::new(entries, EntryKind::Site))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Plain(list) => list.entries.len(),
            Self::Hashed(list) => list.entries.len(),
        }
    }
}

// =============================================================================
// Plaintext
// =============================================================================

/// Lowercase plaintext entries. Blank entries are dropped, duplicates removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlainBlockList {
    entries: Vec<String>,
}

impl PlainBlockList {
    pub fn new<I, S>(entries: I, kind: EntryKind) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for raw in entries {
            let entry = match kind {
                EntryKind::Word => {
                    let trimmed = raw.as_ref().trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    trimmed.to_lowercase()
                }
                EntryKind::Site => match normalize_site(raw.as_ref()) {
                    Some(site) => site,
                    None => continue,
                },
            };
            if seen.insert(entry.clone()) {
                out.push(entry);
            }
        }

        Self { entries: out }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

// =============================================================================
// Hashed
// =============================================================================

/// Salted phrase digests.
///
/// `max_words` is the word count of the longest phrase that was hashed; the
/// matcher never needs to try a longer window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedBlockList {
    kind: EntryKind,
    salt: String,
    max_words: usize,
    entries: HashSet<EntryHash>,
}

impl HashedBlockList {
    /// Hash plaintext phrases. Site entries are normalized first.
    pub fn from_phrases<I, S>(salt: &str, phrases: I, kind: EntryKind) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = HashSet::new();
        let mut max_words = 0;

        for raw in phrases {
            let phrase = match kind {
                EntryKind::Word => raw.as_ref().to_string(),
                EntryKind::Site => match normalize_site(raw.as_ref()) {
                    Some(site) => site,
                    None => continue,
                },
            };
            let normalized = match kind {
                // Hosts keep their dots; they are compared as whole suffixes
                EntryKind::Site => phrase,
                EntryKind::Word => normalize_phrase(&phrase),
            };
            if normalized.is_empty() {
                continue;
            }
            max_words = max_words.max(normalized.split(' ').count());
            entries.insert(salted_digest(salt, &normalized));
        }

        Self {
            kind,
            salt: salt.to_string(),
            max_words,
            entries,
        }
    }

    /// Rebuild from stored digests.
    pub fn from_digests(
        salt: &str,
        max_words: usize,
        kind: EntryKind,
        entries: impl IntoIterator<Item = EntryHash>,
    ) -> Self {
        Self {
            kind,
            salt: salt.to_string(),
            max_words: max_words.max(1),
            entries: entries.into_iter().collect(),
        }
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn max_words(&self) -> usize {
        self.max_words
    }

    #[inline]
    pub fn contains(&self, digest: &EntryHash) -> bool {
        self.entries.contains(digest)
    }

    /// Whether the normalized phrase is in the list.
    #[inline]
    pub fn contains_normalized(&self, normalized: &str) -> bool {
        self.contains(&salted_digest(&self.salt, normalized))
    }

    /// Whether a raw phrase is in the list.
    pub fn contains_phrase(&self, phrase: &str) -> bool {
        self.contains(&hash_phrase(&self.salt, phrase))
    }

    /// Serializable form, as written to storage and by the list compiler.
    pub fn to_file(&self) -> HashedListFile {
        let mut entries: Vec<String> = self.entries.iter().map(EntryHash::to_hex).collect();
        entries.sort();
        HashedListFile {
            salt: self.salt.clone(),
            max_words: self.max_words,
            entries,
        }
    }
}

/// JSON form of a hashed list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashedListFile {
    pub salt: String,
    pub max_words: usize,
    pub entries: Vec<String>,
}

impl HashedListFile {
    /// Convert back to a list. Malformed digests are skipped with a debug log.
    pub fn into_list(self, kind: EntryKind) -> HashedBlockList {
        let digests = self.entries.iter().filter_map(|hex| {
            let digest = EntryHash::from_hex(hex);
            if digest.is_none() {
                log::debug!("skipping malformed digest '{}'", hex);
            }
            digest
        });
        HashedBlockList::from_digests(&self.salt, self.max_words, kind, digests)
    }
}
