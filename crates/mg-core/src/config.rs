//! Filter configuration
//!
//! `FilterConfig` is an immutable snapshot built from the flat key/value map
//! the extension persists. Missing or mistyped keys fall back to defaults.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::blocklist::{BlockList, EntryKind, HashedBlockList, HashedListFile};
use crate::types::{MatchMode, RedirectMode, ReplacementMode};

/// Path of the built-in blocked page inside the extension.
pub const DEFAULT_BLOCK_PAGE_PATH: &str = "blocked.html";

// =============================================================================
// Storage Keys
// =============================================================================

/// Keys of the persisted settings map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    BlockedWords,
    BlockedSites,
    RedirectUrl,
    EnableFilter,
    ShowAlerts,
    UseCustomUrl,
    CustomMessage,
    ReplacementPhrases,
    ReplacementMode,
    MatchMode,
    HashSalt,
    HashedWords,
    HashedSites,
    LifetimeCount,
    TodayCount,
    LastResetDate,
}

impl StorageKey {
    /// Settings keys (counters excluded).
    pub const SETTINGS: [StorageKey; 13] = [
        Self::BlockedWords,
        Self::BlockedSites,
        Self::RedirectUrl,
        Self::EnableFilter,
        Self::ShowAlerts,
        Self::UseCustomUrl,
        Self::CustomMessage,
        Self::ReplacementPhrases,
        Self::ReplacementMode,
        Self::MatchMode,
        Self::HashSalt,
        Self::HashedWords,
        Self::HashedSites,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BlockedWords => "blockedWords",
            Self::BlockedSites => "blockedSites",
            Self::RedirectUrl => "redirectUrl",
            Self::EnableFilter => "enableFilter",
            Self::ShowAlerts => "showAlerts",
            Self::UseCustomUrl => "useCustomUrl",
            Self::CustomMessage => "customMessage",
            Self::ReplacementPhrases => "replacementPhrases",
            Self::ReplacementMode => "replacementMode",
            Self::MatchMode => "matchMode",
            Self::HashSalt => "hashSalt",
            Self::HashedWords => "hashedWords",
            Self::HashedSites => "hashedSites",
            Self::LifetimeCount => "lifetimeCount",
            Self::TodayCount => "todayCount",
            Self::LastResetDate => "lastResetDate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::SETTINGS
            .iter()
            .chain([Self::LifetimeCount, Self::TodayCount, Self::LastResetDate].iter())
            .copied()
            .find(|k| k.as_str() == s)
    }
}

// =============================================================================
// Environment
// =============================================================================

/// Runtime facts about the extension that are never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// The extension's own origin, e.g. `chrome-extension://<id>/`.
    pub extension_origin: String,
    /// Path of the blocked page under the origin.
    pub block_page_path: String,
}

impl Environment {
    pub fn new(extension_origin: impl Into<String>) -> Self {
        Self {
            extension_origin: extension_origin.into(),
            block_page_path: DEFAULT_BLOCK_PAGE_PATH.to_string(),
        }
    }

    /// Full address of the built-in blocked page.
    pub fn block_page_url(&self) -> String {
        if self.extension_origin.is_empty() {
            return self.block_page_path.clone();
        }
        let origin = self.extension_origin.trim_end_matches('/');
        let path = self.block_page_path.trim_start_matches('/');
        format!("{origin}/{path}")
    }
}

// =============================================================================
// Filter Config
// =============================================================================

/// Snapshot of everything the filter needs to decide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    pub blocked_words: BlockList,
    pub blocked_sites: BlockList,
    /// Master switch. When off nothing matches.
    pub enabled: bool,
    pub alerts_enabled: bool,
    pub redirect_mode: RedirectMode,
    pub custom_redirect_url: String,
    pub custom_message: String,
    pub replacement_phrases: Vec<String>,
    pub replacement_mode: ReplacementMode,
    pub match_mode: MatchMode,
    /// Built-in blocked page address (runtime only).
    pub block_page_url: String,
    /// The extension's own origin (runtime only).
    pub own_origin: String,
    /// Bumped whenever either blocklist is replaced. Caches key on it.
    pub generation: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            blocked_words: BlockList::default(),
            blocked_sites: BlockList::default(),
            enabled: true,
            alerts_enabled: true,
            redirect_mode: RedirectMode::BuiltIn,
            custom_redirect_url: String::new(),
            custom_message: String::new(),
            replacement_phrases: Vec::new(),
            replacement_mode: ReplacementMode::Substitute,
            match_mode: MatchMode::Plaintext,
            block_page_url: DEFAULT_BLOCK_PAGE_PATH.to_string(),
            own_origin: String::new(),
            generation: 0,
        }
    }
}

impl FilterConfig {
    /// The safe default after a storage failure: filtering fully off.
    pub fn disabled(env: &Environment) -> Self {
        let mut config = Self::default().with_environment(env);
        config.enabled = false;
        config
    }

    /// Attach the runtime environment.
    pub fn with_environment(mut self, env: &Environment) -> Self {
        self.block_page_url = env.block_page_url();
        self.own_origin = env.extension_origin.clone();
        self
    }

    /// Build a config from the persisted key/value map.
    pub fn from_map(map: &Map<String, Value>, env: &Environment) -> Self {
        let mut config = Self::default().with_environment(env);
        config.apply_map(map);
        config
    }

    fn apply_map(&mut self, map: &Map<String, Value>) {
        if let Some(v) = read::<bool>(map, StorageKey::EnableFilter) {
            self.enabled = v;
        }
        if let Some(v) = read::<bool>(map, StorageKey::ShowAlerts) {
            self.alerts_enabled = v;
        }
        if let Some(v) = read::<bool>(map, StorageKey::UseCustomUrl) {
            self.redirect_mode = if v { RedirectMode::Custom } else { RedirectMode::BuiltIn };
        }
        if let Some(v) = read::<String>(map, StorageKey::RedirectUrl) {
            self.custom_redirect_url = v.trim().to_string();
        }
        if let Some(v) = read::<String>(map, StorageKey::CustomMessage) {
            self.custom_message = v;
        }
        if let Some(v) = read::<Vec<String>>(map, StorageKey::ReplacementPhrases) {
            self.replacement_phrases = v
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
        }
        if let Some(v) = read::<ReplacementMode>(map, StorageKey::ReplacementMode) {
            self.replacement_mode = v;
        }
        if let Some(v) = read::<MatchMode>(map, StorageKey::MatchMode) {
            self.match_mode = v;
        }

        self.blocked_words = build_list(map, self.match_mode, EntryKind::Word);
        self.blocked_sites = build_list(map, self.match_mode, EntryKind::Site);
    }
}

fn read<T: DeserializeOwned>(map: &Map<String, Value>, key: StorageKey) -> Option<T> {
    let value = map.get(key.as_str())?;
    match serde_json::from_value::<T>(value.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            log::debug!("ignoring stored '{}': {}", key.as_str(), e);
            None
        }
    }
}

fn build_list(map: &Map<String, Value>, mode: MatchMode, kind: EntryKind) -> BlockList {
    let (plain_key, hashed_key) = match kind {
        EntryKind::Word => (StorageKey::BlockedWords, StorageKey::HashedWords),
        EntryKind::Site => (StorageKey::BlockedSites, StorageKey::HashedSites),
    };

    match mode {
        MatchMode::Plaintext => match read::<Vec<String>>(map, plain_key) {
            Some(entries) => match kind {
                EntryKind::Word => BlockList::words(entries),
                EntryKind::Site => BlockList::sites(entries),
            },
            None => BlockList::default(),
        },
        MatchMode::Hashed => {
            if let Some(file) = read::<HashedListFile>(map, hashed_key) {
                return BlockList::Hashed(file.into_list(kind));
            }
            // Plaintext entries still around (first switch to hashed mode):
            // hash them with the stored salt so matching keeps working
            let salt = read::<String>(map, StorageKey::HashSalt).unwrap_or_default();
            match read::<Vec<String>>(map, plain_key) {
                Some(entries) => BlockList::Hashed(HashedBlockList::from_phrases(&salt, entries, kind)),
                None => BlockList::default(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_defaults_on_empty_map() {
        let env = Environment::new("chrome-extension://abc/");
        let config = FilterConfig::from_map(&Map::new(), &env);
        assert!(config.enabled);
        assert!(config.blocked_words.is_empty());
        assert_eq!(config.block_page_url, "chrome-extension://abc/blocked.html");
        assert_eq!(config.own_origin, "chrome-extension://abc/");
    }

    #[test]
    fn test_from_map_reads_all_keys() {
        let m = map(json!({
            "blockedWords": ["Gambling", " "],
            "blockedSites": ["https://www.example.com/"],
            "enableFilter": true,
            "showAlerts": false,
            "useCustomUrl": true,
            "redirectUrl": " https://calm.example/ ",
            "customMessage": "Take a breath",
            "replacementPhrases": ["kindness", ""],
            "replacementMode": "erase",
        }));
        let config = FilterConfig::from_map(&m, &Environment::default());
        assert_eq!(config.blocked_words, BlockList::words(["gambling"]));
        assert_eq!(config.blocked_sites, BlockList::sites(["example.com"]));
        assert!(!config.alerts_enabled);
        assert_eq!(config.redirect_mode, RedirectMode::Custom);
        assert_eq!(config.custom_redirect_url, "https://calm.example/");
        assert_eq!(config.custom_message, "Take a breath");
        assert_eq!(config.replacement_phrases, vec!["kindness".to_string()]);
        assert_eq!(config.replacement_mode, ReplacementMode::Erase);
    }

    #[test]
    fn test_mistyped_values_fall_back() {
        let m = map(json!({ "enableFilter": "yes", "blockedWords": 42 }));
        let config = FilterConfig::from_map(&m, &Environment::default());
        assert!(config.enabled);
        assert!(config.blocked_words.is_empty());
    }

    #[test]
    fn test_hashed_mode_hashes_plaintext_entries() {
        let m = map(json!({
            "matchMode": "hashed",
            "hashSalt": "pepper",
            "blockedWords": ["online casino"],
        }));
        let config = FilterConfig::from_map(&m, &Environment::default());
        match &config.blocked_words {
            BlockList::Hashed(list) => {
                assert_eq!(list.salt(), "pepper");
                assert!(list.contains_phrase("Online Casino"));
            }
            BlockList::Plain(_) => panic!("expected hashed list"),
        }
    }

    #[test]
    fn test_hashed_mode_prefers_stored_digests() {
        let file = HashedBlockList::from_phrases("s", ["poker"], EntryKind::Word).to_file();
        let m = map(json!({
            "matchMode": "hashed",
            "hashedWords": serde_json::to_value(&file).unwrap(),
            "blockedWords": ["ignored"],
        }));
        let config = FilterConfig::from_map(&m, &Environment::default());
        match &config.blocked_words {
            BlockList::Hashed(list) => {
                assert!(list.contains_phrase("poker"));
                assert!(!list.contains_phrase("ignored"));
            }
            BlockList::Plain(_) => panic!("expected hashed list"),
        }
    }

    #[test]
    fn test_storage_key_names() {
        assert_eq!(StorageKey::parse("blockedWords"), Some(StorageKey::BlockedWords));
        assert_eq!(StorageKey::parse("lastResetDate"), Some(StorageKey::LastResetDate));
        assert_eq!(StorageKey::parse("nope"), None);
    }

    #[test]
    fn test_disabled_config() {
        let config = FilterConfig::disabled(&Environment::default());
        assert!(!config.enabled);
    }
}
