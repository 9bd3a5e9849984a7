//! Per-tab block episode debouncing.
//!
//! One logical block usually fires several browser events (pre-navigate,
//! committed, a page agent report). The first one claims the tab for the
//! debounce window; the others see the claim and skip counting.

use std::collections::HashMap;

use crate::types::TabId;

/// Default length of a block episode.
pub const DEFAULT_DEBOUNCE_MS: u64 = 2_000;

/// `tab_id -> expiry`. A live entry means "this episode was already counted",
/// never "this tab is blocked".
#[derive(Debug)]
pub struct BlockedTabDebounceSet {
    window_ms: u64,
    expiries: HashMap<TabId, u64>,
}

impl Default for BlockedTabDebounceSet {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_MS)
    }
}

impl BlockedTabDebounceSet {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            expiries: HashMap::new(),
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Claim the tab for a new episode. Returns false if an unexpired claim
    /// already exists (the caller must not count again).
    pub fn try_claim(&mut self, tab_id: TabId, now_ms: u64) -> bool {
        self.purge(now_ms);
        if self.expiries.contains_key(&tab_id) {
            return false;
        }
        self.expiries.insert(tab_id, now_ms.saturating_add(self.window_ms));
        true
    }

    /// Whether an unexpired claim exists.
    pub fn is_claimed(&self, tab_id: TabId, now_ms: u64) -> bool {
        self.expiries
            .get(&tab_id)
            .map_or(false, |&expiry| now_ms < expiry)
    }

    /// Drop the claim of a closed tab.
    pub fn forget(&mut self, tab_id: TabId) {
        self.expiries.remove(&tab_id);
    }

    /// Remove expired claims.
    pub fn purge(&mut self, now_ms: u64) {
        self.expiries.retain(|_, &mut expiry| now_ms < expiry);
    }

    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_within_window_is_refused() {
        let mut set = BlockedTabDebounceSet::new(2_000);
        assert!(set.try_claim(1, 0));
        assert!(!set.try_claim(1, 1_999));
        assert!(set.is_claimed(1, 1_999));
    }

    #[test]
    fn claim_expires_after_window() {
        let mut set = BlockedTabDebounceSet::new(2_000);
        assert!(set.try_claim(1, 0));
        assert!(!set.is_claimed(1, 2_000));
        assert!(set.try_claim(1, 2_000));
    }

    #[test]
    fn tabs_are_independent() {
        let mut set = BlockedTabDebounceSet::default();
        assert!(set.try_claim(1, 0));
        assert!(set.try_claim(2, 10));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn forget_and_purge() {
        let mut set = BlockedTabDebounceSet::new(100);
        set.try_claim(1, 0);
        set.try_claim(2, 50);
        set.forget(2);
        assert_eq!(set.len(), 1);
        set.purge(100);
        assert!(set.is_empty());
    }
}
