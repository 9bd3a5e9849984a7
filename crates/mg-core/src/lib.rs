//! MindGate Core Library
//!
//! The filtering and decision core of the MindGate content filter. Browser
//! bindings live in `mg-wasm`; everything here is plain Rust driven through
//! small host traits so it runs the same in the extension, the CLI and tests.
//!
//! # Architecture
//!
//! Two surfaces share this crate:
//!
//! - the interception authority (background worker): settings cache,
//!   navigation interceptor, per-tab debounce, redirect resolution
//! - the page agent (one per page): DOM scanning, mutation batching, input
//!   interception, site adapters, own-URL reports
//!
//! # Modules
//!
//! - `hash`: phrase normalization, salted SHA-256 digests, xxHash cache keys
//! - `url`: scheme/host/query helpers without full URL parsing
//! - `psl`: registrable-domain heuristic and host suffix walking
//! - `blocklist`: plaintext and hashed blocklists
//! - `config`: `FilterConfig` snapshot built from the persisted key/value map
//! - `matcher`: plaintext and hashed matching with a result cache
//! - `scrubber`: text replacement
//! - `redirect`: redirect target selection
//! - `debounce`: per-tab block episode tracking
//! - `settings`: settings store and cache
//! - `stats`: filter counters with daily reset
//! - `interceptor` / `authority`: navigation handling
//! - `dom` / `agent`: page scanning
//! - `host` / `clock`: the traits the core is driven through

pub mod agent;
pub mod authority;
pub mod blocklist;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod dom;
pub mod error;
pub mod hash;
pub mod host;
pub mod interceptor;
pub mod matcher;
pub mod psl;
pub mod redirect;
pub mod scrubber;
pub mod settings;
pub mod stats;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use agent::PageAgent;
pub use authority::InterceptionAuthority;
pub use blocklist::{BlockList, EntryKind, HashedBlockList, HashedListFile};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Environment, FilterConfig, StorageKey};
pub use error::{DomError, FilterError, HostError, StorageError};
pub use host::{AgentHost, AuthorityHost};
pub use interceptor::{NavigationInterceptor, NavigationOutcome};
pub use matcher::Matcher;
pub use redirect::resolve_redirect_target;
pub use scrubber::{PhraseSource, RandomPhrases, Scrubber};
pub use settings::{ChangedKeys, MemoryStore, SettingsCache, SettingsStore};
pub use types::{
    AuthorityMessage, BlockReason, MatchMode, NavigationEvent, NavigationPhase, NotifyKind, RedirectMode,
    ReplacementMode, ScrubResult,
};
