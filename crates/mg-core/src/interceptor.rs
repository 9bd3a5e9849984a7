//! Navigation interception
//!
//! Turns navigation signals into block decisions. One block episode per tab
//! is counted and notified once (see [`BlockedTabDebounceSet`]); the redirect
//! itself is issued for every blocking signal.

use crate::clock::Clock;
use crate::config::FilterConfig;
use crate::debounce::{BlockedTabDebounceSet, DEFAULT_DEBOUNCE_MS};
use crate::error::FilterError;
use crate::host::{settle, AuthorityHost};
use crate::matcher::Matcher;
use crate::redirect::resolve_redirect_target;
use crate::types::{BlockReason, NavigationEvent, NavigationPhase, NotifyKind, TabId};
use crate::url::is_excluded;

/// Interceptor tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterceptorOptions {
    /// Length of one block episode.
    pub debounce_ms: u64,
}

impl Default for InterceptorOptions {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

/// What happened to a navigation signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Sub-frame, excluded URL or filtering off.
    Ignored,
    /// Checked and allowed.
    Allowed,
    /// Server redirect; evaluated for logging only.
    Observed { would_block: Option<BlockReason> },
    /// Redirected to `target`. `counted` is false when the tab's episode had
    /// already been counted.
    Blocked {
        reason: BlockReason,
        target: String,
        counted: bool,
    },
}

impl NavigationOutcome {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

/// Navigation state machine of the interception authority.
pub struct NavigationInterceptor {
    matcher: Matcher,
    debounce: BlockedTabDebounceSet,
    clock: Box<dyn Clock>,
}

impl NavigationInterceptor {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self::with_options(clock, InterceptorOptions::default())
    }

    pub fn with_options(clock: Box<dyn Clock>, options: InterceptorOptions) -> Self {
        Self {
            matcher: Matcher::new(),
            debounce: BlockedTabDebounceSet::new(options.debounce_ms),
            clock,
        }
    }

    /// Handle one navigation signal.
    pub fn handle(
        &mut self,
        event: &NavigationEvent,
        config: &FilterConfig,
        host: &dyn AuthorityHost,
    ) -> Result<NavigationOutcome, FilterError> {
        if !event.is_top_frame() || !config.enabled {
            return Ok(NavigationOutcome::Ignored);
        }
        if is_excluded(&event.url, &config.own_origin) {
            return Ok(NavigationOutcome::Ignored);
        }

        match event.phase {
            NavigationPhase::PreNavigate => {
                let reason = self.matcher.check_url(&event.url, config, false);
                self.act(event.tab_id, &event.url, reason, config, host)
            }
            NavigationPhase::Committed => {
                let reason = self.matcher.check_url(&event.url, config, true);
                self.act(event.tab_id, &event.url, reason, config, host)
            }
            NavigationPhase::BeforeRedirect => {
                let would_block = self.matcher.check_url(&event.url, config, true);
                if let Some(reason) = would_block {
                    log::debug!("server redirect to {} would be blocked ({:?})", event.url, reason);
                }
                Ok(NavigationOutcome::Observed { would_block })
            }
        }
    }

    /// Handle a page agent's report that its own URL is blocked.
    ///
    /// The URL is re-checked here rather than trusted.
    pub fn report_url(
        &mut self,
        tab_id: TabId,
        url: &str,
        config: &FilterConfig,
        host: &dyn AuthorityHost,
    ) -> Result<NavigationOutcome, FilterError> {
        let reason = self.matcher.check_url(url, config, true);
        self.act(tab_id, url, reason, config, host)
    }

    /// The tab was closed; drop its debounce claim.
    pub fn forget_tab(&mut self, tab_id: TabId) {
        self.debounce.forget(tab_id);
    }

    pub fn matcher_mut(&mut self) -> &mut Matcher {
        &mut self.matcher
    }

    fn act(
        &mut self,
        tab_id: TabId,
        url: &str,
        reason: Option<BlockReason>,
        config: &FilterConfig,
        host: &dyn AuthorityHost,
    ) -> Result<NavigationOutcome, FilterError> {
        let Some(reason) = reason else {
            return Ok(NavigationOutcome::Allowed);
        };
        if !host.is_alive() {
            return Err(FilterError::ContextGone);
        }

        let counted = self.debounce.try_claim(tab_id, self.clock.now_ms());
        if counted {
            log::info!("blocked {:?} navigation in tab {}: {}", reason, tab_id, url);
            best_effort(host.increment_stats(1))?;
            best_effort(host.notify(NotifyKind::for_reason(reason)))?;
        } else {
            log::trace!("tab {} already counted this episode", tab_id);
        }

        let target = resolve_redirect_target(url, config);
        best_effort(host.redirect_tab(tab_id, &target))?;

        Ok(NavigationOutcome::Blocked {
            reason,
            target,
            counted,
        })
    }
}

/// Host failures other than context teardown do not stop the block.
fn best_effort(result: Result<(), crate::error::HostError>) -> Result<(), FilterError> {
    match settle(result) {
        Err(FilterError::ContextGone) => Err(FilterError::ContextGone),
        _ => Ok(()),
    }
}
