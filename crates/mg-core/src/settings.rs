//! Settings cache
//!
//! Holds the raw persisted map and the `FilterConfig` built from it. Readers
//! take an `Arc` snapshot; changes rebuild a whole new snapshot and swap it
//! in under the write lock, so nobody ever sees a half-applied update.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde_json::{Map, Value};

use crate::config::{Environment, FilterConfig, StorageKey};
use crate::error::StorageError;

// =============================================================================
// Store
// =============================================================================

/// Persistent key/value settings storage.
pub trait SettingsStore {
    /// Read every stored key.
    fn load(&self) -> Result<Map<String, Value>, StorageError>;

    /// Write one key.
    fn save(&self, key: &str, value: Value) -> Result<(), StorageError>;
}

/// In-memory store for tests and the CLI.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<Map<String, Value>>,
    broken: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_map(map: Map<String, Value>) -> Self {
        Self {
            map: Mutex::new(map),
            broken: false,
        }
    }

    /// A store whose every operation fails.
    pub fn broken() -> Self {
        Self {
            map: Mutex::default(),
            broken: true,
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<Map<String, Value>, StorageError> {
        if self.broken {
            return Err(StorageError::Read("store unavailable".to_string()));
        }
        Ok(self.map.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, key: &str, value: Value) -> Result<(), StorageError> {
        if self.broken {
            return Err(StorageError::Write {
                key: key.to_string(),
                reason: "store unavailable".to_string(),
            });
        }
        self.map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }
}

// =============================================================================
// Changed Keys
// =============================================================================

bitflags::bitflags! {
    /// Which parts of the settings a change touched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChangedKeys: u16 {
        /// Blocked words (plain or hashed)
        const WORDS = 1 << 0;
        /// Blocked sites (plain or hashed)
        const SITES = 1 << 1;
        const ENABLED = 1 << 2;
        const ALERTS = 1 << 3;
        /// Redirect mode or custom URL
        const REDIRECT = 1 << 4;
        const MESSAGE = 1 << 5;
        /// Replacement phrases or mode
        const REPLACEMENT = 1 << 6;
        /// Match mode or hash salt
        const MATCH_MODE = 1 << 7;
        /// Filter counters
        const COUNTERS = 1 << 8;

        /// Anything that invalidates match results
        const BLOCKLISTS = Self::WORDS.bits() | Self::SITES.bits() | Self::MATCH_MODE.bits();
    }
}

impl ChangedKeys {
    pub fn from_key(key: StorageKey) -> Self {
        match key {
            StorageKey::BlockedWords | StorageKey::HashedWords => Self::WORDS,
            StorageKey::BlockedSites | StorageKey::HashedSites => Self::SITES,
            StorageKey::EnableFilter => Self::ENABLED,
            StorageKey::ShowAlerts => Self::ALERTS,
            StorageKey::RedirectUrl | StorageKey::UseCustomUrl => Self::REDIRECT,
            StorageKey::CustomMessage => Self::MESSAGE,
            StorageKey::ReplacementPhrases | StorageKey::ReplacementMode => Self::REPLACEMENT,
            StorageKey::MatchMode | StorageKey::HashSalt => Self::MATCH_MODE,
            StorageKey::LifetimeCount | StorageKey::TodayCount | StorageKey::LastResetDate => {
                Self::COUNTERS
            }
        }
    }

    /// Whether the config snapshot must be rebuilt.
    pub fn affects_config(self) -> bool {
        !(self - Self::COUNTERS).is_empty()
    }
}

// =============================================================================
// Cache
// =============================================================================

type Subscriber = Box<dyn Fn(ChangedKeys, &Arc<FilterConfig>)>;

/// The single owner of the current `FilterConfig`.
pub struct SettingsCache {
    env: Environment,
    raw: RwLock<Map<String, Value>>,
    current: RwLock<Arc<FilterConfig>>,
    subscribers: RwLock<Vec<Subscriber>>,
}

impl SettingsCache {
    /// An empty cache with default settings.
    pub fn new(env: Environment) -> Self {
        let config = FilterConfig::default().with_environment(&env);
        Self {
            env,
            raw: RwLock::new(Map::new()),
            current: RwLock::new(Arc::new(config)),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Rehydrate everything from `store`.
    ///
    /// A storage failure is logged and leaves filtering off.
    pub fn cold_start(store: &dyn SettingsStore, env: Environment) -> Self {
        let cache = Self::new(env);
        cache.reload(store);
        cache
    }

    /// Replace the whole cache contents with what `store` holds.
    pub fn reload(&self, store: &dyn SettingsStore) {
        let previous = self.config().generation;
        let (raw, mut config) = match store.load() {
            Ok(map) => {
                let config = FilterConfig::from_map(&map, &self.env);
                log::info!(
                    "settings loaded: {} words, {} sites, enabled={}",
                    config.blocked_words.len(),
                    config.blocked_sites.len(),
                    config.enabled
                );
                (map, config)
            }
            Err(e) => {
                log::warn!("settings unavailable, filtering disabled: {}", e);
                (Map::new(), FilterConfig::disabled(&self.env))
            }
        };
        config.generation = previous + 1;

        *self.raw.write().unwrap_or_else(PoisonError::into_inner) = raw;
        self.swap(config);
        self.publish(ChangedKeys::all());
    }

    /// The current snapshot.
    pub fn config(&self) -> Arc<FilterConfig> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Merge changed keys into the cache. A `null` value removes the key.
    ///
    /// Returns the set of changed keys; empty when nothing actually changed.
    pub fn apply_changes(&self, changes: &Map<String, Value>) -> ChangedKeys {
        let mut changed = ChangedKeys::empty();
        {
            let mut raw = self.raw.write().unwrap_or_else(PoisonError::into_inner);
            for (name, value) in changes {
                let Some(key) = StorageKey::parse(name) else {
                    log::trace!("ignoring unknown settings key '{}'", name);
                    continue;
                };
                if value.is_null() {
                    if raw.remove(name).is_some() {
                        changed |= ChangedKeys::from_key(key);
                    }
                } else if raw.get(name) != Some(value) {
                    raw.insert(name.clone(), value.clone());
                    changed |= ChangedKeys::from_key(key);
                }
            }
        }

        if !changed.affects_config() {
            return changed;
        }

        let previous = self.config().generation;
        let mut config = {
            let raw = self.raw.read().unwrap_or_else(PoisonError::into_inner);
            FilterConfig::from_map(&raw, &self.env)
        };
        config.generation = if changed.intersects(ChangedKeys::BLOCKLISTS) {
            previous + 1
        } else {
            previous
        };
        log::debug!("settings changed: {:?} (generation {})", changed, config.generation);

        self.swap(config);
        self.publish(changed);
        changed
    }

    /// Register a change handler. It runs after each swap.
    pub fn subscribe(&self, handler: impl Fn(ChangedKeys, &Arc<FilterConfig>) + 'static) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(handler));
    }

    /// A copy of the raw persisted map.
    pub fn raw(&self) -> Map<String, Value> {
        self.raw.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn swap(&self, config: FilterConfig) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
    }

    fn publish(&self, changed: ChangedKeys) {
        let config = self.config();
        let subscribers = self.subscribers.read().unwrap_or_else(PoisonError::into_inner);
        for handler in subscribers.iter() {
            handler(changed, &config);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    fn env() -> Environment {
        Environment::new("chrome-extension://self/")
    }

    #[test]
    fn test_cold_start_reads_store() {
        let store = MemoryStore::with_map(map(json!({ "blockedWords": ["casino"] })));
        let cache = SettingsCache::cold_start(&store, env());
        let config = cache.config();
        assert!(config.enabled);
        assert_eq!(config.blocked_words.len(), 1);
        assert_eq!(config.generation, 1);
        assert_eq!(config.block_page_url, "chrome-extension://self/blocked.html");
    }

    #[test]
    fn test_storage_failure_disables_filtering() {
        let cache = SettingsCache::cold_start(&MemoryStore::broken(), env());
        assert!(!cache.config().enabled);
    }

    #[test]
    fn test_apply_changes_swaps_snapshot() {
        let store = MemoryStore::with_map(map(json!({ "blockedWords": ["casino"] })));
        let cache = SettingsCache::cold_start(&store, env());
        let before = cache.config();

        let changed = cache.apply_changes(&map(json!({ "blockedWords": ["casino", "poker"] })));
        assert_eq!(changed, ChangedKeys::WORDS);

        let after = cache.config();
        assert_eq!(before.blocked_words.len(), 1);
        assert_eq!(after.blocked_words.len(), 2);
        assert_eq!(after.generation, before.generation + 1);
    }

    #[test]
    fn test_non_list_change_keeps_generation() {
        let cache = SettingsCache::cold_start(&MemoryStore::new(), env());
        let generation = cache.config().generation;
        let changed = cache.apply_changes(&map(json!({ "enableFilter": false })));
        assert_eq!(changed, ChangedKeys::ENABLED);
        assert!(!cache.config().enabled);
        assert_eq!(cache.config().generation, generation);
    }

    #[test]
    fn test_partial_change_keeps_other_keys() {
        let store = MemoryStore::with_map(map(json!({
            "matchMode": "hashed",
            "hashSalt": "pepper",
            "blockedWords": ["casino"],
        })));
        let cache = SettingsCache::cold_start(&store, env());
        cache.apply_changes(&map(json!({ "blockedWords": ["poker"] })));
        match &cache.config().blocked_words {
            crate::blocklist::BlockList::Hashed(list) => {
                assert_eq!(list.salt(), "pepper");
                assert!(list.contains_phrase("poker"));
            }
            _ => panic!("expected hashed list"),
        }
    }

    #[test]
    fn test_unchanged_and_counter_keys() {
        let store = MemoryStore::with_map(map(json!({ "showAlerts": true })));
        let cache = SettingsCache::cold_start(&store, env());
        let before = cache.config();

        assert!(cache.apply_changes(&map(json!({ "showAlerts": true }))).is_empty());
        assert_eq!(
            cache.apply_changes(&map(json!({ "todayCount": 3 }))),
            ChangedKeys::COUNTERS
        );
        assert!(Arc::ptr_eq(&before, &cache.config()));
    }

    #[test]
    fn test_null_removes_key() {
        let store = MemoryStore::with_map(map(json!({ "enableFilter": false })));
        let cache = SettingsCache::cold_start(&store, env());
        cache.apply_changes(&map(json!({ "enableFilter": null })));
        assert!(cache.config().enabled);
    }

    #[test]
    fn test_subscribers_see_new_snapshot() {
        let cache = SettingsCache::new(env());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        cache.subscribe(move |changed, config| {
            sink.borrow_mut().push((changed, config.blocked_sites.len()));
        });

        cache.apply_changes(&map(json!({ "blockedSites": ["example.com"] })));
        assert_eq!(*seen.borrow(), vec![(ChangedKeys::SITES, 1)]);
    }

    #[test]
    fn test_changed_keys_mapping() {
        assert_eq!(ChangedKeys::from_key(StorageKey::HashedWords), ChangedKeys::WORDS);
        assert!(ChangedKeys::from_key(StorageKey::HashSalt).intersects(ChangedKeys::BLOCKLISTS));
        assert!(!ChangedKeys::COUNTERS.affects_config());
        assert!((ChangedKeys::COUNTERS | ChangedKeys::ALERTS).affects_config());
    }
}
