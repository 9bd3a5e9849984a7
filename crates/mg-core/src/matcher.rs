//! Core Matching Engine
//!
//! Every navigation, search box keystroke and text node goes through here.
//!
//! Two strategies, chosen by the blocklist variant:
//!
//! - Plaintext: case-insensitive substring. "ass" matches "class"; that is the
//!   accepted price of catching words hidden inside other words.
//! - Hashed: the candidate is split into words and every window of up to
//!   `max_words` consecutive words is hashed and looked up. Site lists hash
//!   each host suffix instead.
//!
//! Hashed lookups are cached per candidate. The cache is tied to the config
//! generation and dropped as soon as a blocklist changes.

use std::collections::{HashMap, VecDeque};

use crate::blocklist::{BlockList, EntryKind, HashedBlockList};
use crate::config::FilterConfig;
use crate::hash::{cache_key, fold_word, word_spans};
use crate::psl::walk_host_suffixes;
use crate::types::BlockReason;
use crate::url::{extract_host, is_excluded, search_query};

/// Default number of cached hashed lookups.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

// =============================================================================
// Match Cache
// =============================================================================

/// Small LRU of hashed-match results.
///
/// Keyed by the xxHash64 of the candidate; the candidate itself is kept with
/// the result and compared on lookup, so two strings sharing a key never
/// share a result.
pub struct MatchCache {
    capacity: usize,
    generation: u64,
    entries: HashMap<(EntryKind, u64), (String, bool)>,
    order: VecDeque<(EntryKind, u64)>,
}

impl MatchCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            generation: 0,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Drop everything if the blocklists changed since the last lookup.
    fn sync_generation(&mut self, generation: u64) {
        if self.generation != generation {
            log::trace!("match cache invalidated ({} -> {})", self.generation, generation);
            self.clear();
            self.generation = generation;
        }
    }

    fn get(&mut self, key: (EntryKind, u64), candidate: &str) -> Option<bool> {
        let value = match self.entries.get(&key)? {
            (cached, value) if cached == candidate => *value,
            _ => return None,
        };
        // Move to back (most recently used)
        self.order.retain(|k| *k != key);
        self.order.push_back(key);
        Some(value)
    }

    fn insert(&mut self, key: (EntryKind, u64), candidate: &str, value: bool) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        if self.entries.insert(key, (candidate.to_string(), value)).is_none() {
            self.order.push_back(key);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Matcher
// =============================================================================

/// Decides whether a candidate string hits a blocklist.
pub struct Matcher {
    cache: MatchCache,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Matcher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: MatchCache::new(capacity),
        }
    }

    /// Whether `candidate` matches any entry of `list`.
    ///
    /// Always false when filtering is disabled or the candidate is empty.
    pub fn matches(&mut self, candidate: &str, list: &BlockList, config: &FilterConfig) -> bool {
        if !config.enabled || candidate.trim().is_empty() || list.is_empty() {
            return false;
        }

        match list {
            BlockList::Plain(plain) => matches_plain(candidate, plain.entries()),
            BlockList::Hashed(hashed) => {
                self.cache.sync_generation(config.generation);
                let key = (hashed.kind(), cache_key(candidate));
                if let Some(hit) = self.cache.get(key, candidate) {
                    return hit;
                }
                let result = match hashed.kind() {
                    EntryKind::Word => matches_hashed_words(candidate, hashed),
                    EntryKind::Site => matches_hashed_site(candidate, hashed),
                };
                self.cache.insert(key, candidate, result);
                result
            }
        }
    }

    /// Check a URL the way navigation interception does: own pages and
    /// internal schemes are skipped, then blocked sites, blocked words, and
    /// (when `include_search` is set) the decoded search query.
    ///
    /// A malformed query string is logged and treated as no match.
    pub fn check_url(&mut self, url: &str, config: &FilterConfig, include_search: bool) -> Option<BlockReason> {
        if !config.enabled || url.is_empty() {
            return None;
        }
        if is_excluded(url, &config.own_origin) {
            log::trace!("skipping excluded url {}", url);
            return None;
        }

        if self.matches(url, &config.blocked_sites, config) {
            return Some(BlockReason::Site);
        }
        if self.matches(url, &config.blocked_words, config) {
            return Some(BlockReason::Word);
        }

        if include_search {
            match search_query(url) {
                Ok(Some(query)) => {
                    if self.matches(&query, &config.blocked_words, config) {
                        return Some(BlockReason::Search);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    log::debug!("search query unreadable, allowing: {}", e);
                }
            }
        }

        None
    }

    /// Forget all cached results.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    pub fn cached_results(&self) -> usize {
        self.cache.len()
    }
}

// =============================================================================
// Strategies
// =============================================================================

/// Case-insensitive substring test against lowercase entries.
pub fn matches_plain(candidate: &str, entries: &[String]) -> bool {
    let lower = candidate.to_lowercase();
    entries.iter().any(|entry| lower.contains(entry.as_str()))
}

/// Hash every window of up to `max_words` words and look each up.
pub fn matches_hashed_words(candidate: &str, list: &HashedBlockList) -> bool {
    let words: Vec<String> = word_spans(candidate)
        .into_iter()
        .map(|(start, end)| fold_word(&candidate[start..end]))
        .collect();

    let mut window = String::new();
    for start in 0..words.len() {
        window.clear();
        for (offset, word) in words[start..].iter().take(list.max_words()).enumerate() {
            if offset > 0 {
                window.push(' ');
            }
            window.push_str(word);
            if list.contains_normalized(&window) {
                return true;
            }
        }
    }

    false
}

/// Hash each host suffix down to the registrable domain.
///
/// The candidate may be a full URL or a bare host.
pub fn matches_hashed_site(candidate: &str, list: &HashedBlockList) -> bool {
    let host = match extract_host(candidate) {
        Some(host) if candidate.contains("://") => host,
        _ => candidate
            .split(|c| matches!(c, '/' | '?' | '#' | ':'))
            .next()
            .unwrap_or(""),
    };
    let host = host.trim().to_lowercase();
    if host.is_empty() {
        return false;
    }

    let bare = host.strip_prefix("www.").unwrap_or(&host);
    walk_host_suffixes(bare).any(|suffix| list.contains_normalized(suffix))
}
