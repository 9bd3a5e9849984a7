//! Core type definitions for MindGate
//!
//! Navigation events, filter outcomes and the messages exchanged between the
//! page agent and the interception authority.

use serde::{Deserialize, Serialize};

/// Browser tab id.
pub type TabId = i32;

/// Browser frame id. `0` is the top-level frame.
pub type FrameId = i32;

/// Frame id of a tab's top-level document.
pub const TOP_FRAME: FrameId = 0;

// =============================================================================
// Modes
// =============================================================================

/// Where a blocked navigation is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RedirectMode {
    /// The extension's own blocked page, with the blocked URL attached.
    #[default]
    BuiltIn,
    /// A user-chosen URL.
    Custom,
}

/// What replaces a blocked phrase in page text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReplacementMode {
    /// A phrase drawn from the replacement list, per occurrence.
    #[default]
    Substitute,
    /// Nothing; the phrase is erased.
    Erase,
}

/// How blocklist entries are stored and compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchMode {
    /// Lowercase plaintext, substring comparison.
    #[default]
    Plaintext,
    /// Salted digests, word-window comparison.
    Hashed,
}

// =============================================================================
// Navigation
// =============================================================================

/// Browser navigation signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationPhase {
    /// Before the navigation commits. Earliest point a redirect is possible.
    PreNavigate,
    /// The navigation committed (covers client-side redirects).
    Committed,
    /// A server-side redirect. Observed only; never enforced.
    BeforeRedirect,
}

/// A navigation signal for one frame of one tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationEvent {
    pub tab_id: TabId,
    pub frame_id: FrameId,
    pub url: String,
    pub phase: NavigationPhase,
}

impl NavigationEvent {
    pub fn new(tab_id: TabId, frame_id: FrameId, url: impl Into<String>, phase: NavigationPhase) -> Self {
        Self {
            tab_id,
            frame_id,
            url: url.into(),
            phase,
        }
    }

    #[inline]
    pub fn is_top_frame(&self) -> bool {
        self.frame_id == TOP_FRAME
    }
}

/// Why a URL was judged blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockReason {
    /// The URL belongs to a blocked site.
    Site,
    /// The URL contains a blocked word.
    Word,
    /// The URL's search query contains a blocked word.
    Search,
}

// =============================================================================
// Scrubbing
// =============================================================================

/// Result of scrubbing a string.
///
/// `match_count == 0` exactly when `text` equals the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrubResult {
    pub text: String,
    pub match_count: usize,
}

impl ScrubResult {
    /// A result that leaves the input untouched.
    pub fn unchanged(text: &str) -> Self {
        Self {
            text: text.to_string(),
            match_count: 0,
        }
    }

    #[inline]
    pub fn is_changed(&self) -> bool {
        self.match_count > 0
    }
}

// =============================================================================
// Notifications and messages
// =============================================================================

/// User-facing notification kinds. Display is gated by the host on the
/// alerts flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NotifyKind {
    ContentBlocked,
    SearchBlocked,
    ContentFiltered { count: u32 },
}

impl NotifyKind {
    /// The notification for a blocked navigation.
    pub fn for_reason(reason: BlockReason) -> Self {
        match reason {
            BlockReason::Search => Self::SearchBlocked,
            BlockReason::Site | BlockReason::Word => Self::ContentBlocked,
        }
    }
}

/// Page agent to authority message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AuthorityMessage {
    /// The page's own URL or search query is blocked.
    #[serde(rename_all = "camelCase")]
    UrlBlocked { url: String },
    /// `count` occurrences were scrubbed in one scan pass. `notify` is set on
    /// the single report that crosses the page's notification threshold.
    #[serde(rename_all = "camelCase")]
    ContentFiltered { count: u32, notify: bool },
}
