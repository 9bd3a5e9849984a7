use mg_core::blocklist::{BlockList, EntryKind, HashedBlockList};
use mg_core::config::StorageKey;
use mg_core::types::MatchMode;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{Map, Value};
use thiserror::Error;

/// Length of a generated salt.
pub const SALT_LEN: usize = 24;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("hashed lists need a non-empty salt")]
    EmptySalt,
    #[error("could not serialize list: {0}")]
    Json(#[from] serde_json::Error),
}

/// A fresh random salt for a hashed list.
pub fn generate_salt() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect()
}

/// Hash optimized entries with `salt`.
pub fn build_hashed(salt: &str, entries: &[String], kind: EntryKind) -> Result<HashedBlockList, BuildError> {
    if salt.is_empty() {
        return Err(BuildError::EmptySalt);
    }
    Ok(HashedBlockList::from_phrases(salt, entries, kind))
}

/// Build the in-memory list for `mode`. `salt` is ignored for plaintext.
pub fn build_list(entries: &[String], kind: EntryKind, mode: MatchMode, salt: &str) -> Result<BlockList, BuildError> {
    match mode {
        MatchMode::Plaintext => Ok(match kind {
            EntryKind::Word => BlockList::words(entries),
            EntryKind::Site => BlockList::sites(entries),
        }),
        MatchMode::Hashed => Ok(BlockList::Hashed(build_hashed(salt, entries, kind)?)),
    }
}

/// Storage entries that install both lists in `mode`.
///
/// In hashed mode the plaintext keys are written empty so no readable copy
/// of the lists stays behind in storage.
pub fn build_storage_entries(
    words: &[String],
    sites: &[String],
    mode: MatchMode,
    salt: &str,
) -> Result<Map<String, Value>, BuildError> {
    let mut map = Map::new();
    map.insert(StorageKey::MatchMode.as_str().to_string(), serde_json::to_value(mode)?);

    match mode {
        MatchMode::Plaintext => {
            map.insert(StorageKey::BlockedWords.as_str().to_string(), serde_json::to_value(words)?);
            map.insert(StorageKey::BlockedSites.as_str().to_string(), serde_json::to_value(sites)?);
        }
        MatchMode::Hashed => {
            let hashed_words = build_hashed(salt, words, EntryKind::Word)?;
            let hashed_sites = build_hashed(salt, sites, EntryKind::Site)?;
            log::debug!(
                "hashed {} words (max {} words) and {} sites",
                words.len(),
                hashed_words.max_words(),
                sites.len()
            );
            map.insert(StorageKey::HashSalt.as_str().to_string(), Value::String(salt.to_string()));
            map.insert(
                StorageKey::HashedWords.as_str().to_string(),
                serde_json::to_value(hashed_words.to_file())?,
            );
            map.insert(
                StorageKey::HashedSites.as_str().to_string(),
                serde_json::to_value(hashed_sites.to_file())?,
            );
            map.insert(StorageKey::BlockedWords.as_str().to_string(), Value::Array(Vec::new()));
            map.insert(StorageKey::BlockedSites.as_str().to_string(), Value::Array(Vec::new()));
        }
    }

    Ok(map)
}
