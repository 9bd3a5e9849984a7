//! Host interfaces
//!
//! The browser side of each surface, as seen by the core. Every call is
//! fire-and-forget: the core never waits on a result beyond noting failure.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{FilterError, HostError};
use crate::types::{AuthorityMessage, NotifyKind, TabId};

/// Browser capabilities available to the interception authority.
pub trait AuthorityHost {
    /// False once the extension context has been torn down.
    fn is_alive(&self) -> bool {
        true
    }

    /// Add `count` to the persisted filter counters.
    fn increment_stats(&self, count: u32) -> Result<(), HostError>;

    /// Show a notification. The host decides whether alerts are enabled.
    fn notify(&self, kind: NotifyKind) -> Result<(), HostError>;

    /// Navigate `tab_id` to `url`.
    fn redirect_tab(&self, tab_id: TabId, url: &str) -> Result<(), HostError>;
}

/// Browser capabilities available to a page agent.
pub trait AgentHost {
    fn is_alive(&self) -> bool {
        true
    }

    fn send_to_authority(&self, message: &AuthorityMessage) -> Result<(), HostError>;
}

impl<H: AuthorityHost + ?Sized> AuthorityHost for Rc<H> {
    fn is_alive(&self) -> bool {
        (**self).is_alive()
    }

    fn increment_stats(&self, count: u32) -> Result<(), HostError> {
        (**self).increment_stats(count)
    }

    fn notify(&self, kind: NotifyKind) -> Result<(), HostError> {
        (**self).notify(kind)
    }

    fn redirect_tab(&self, tab_id: TabId, url: &str) -> Result<(), HostError> {
        (**self).redirect_tab(tab_id, url)
    }
}

impl<H: AgentHost + ?Sized> AgentHost for Rc<H> {
    fn is_alive(&self) -> bool {
        (**self).is_alive()
    }

    fn send_to_authority(&self, message: &AuthorityMessage) -> Result<(), HostError> {
        (**self).send_to_authority(message)
    }
}

/// Translate a host call result into the core's error policy.
///
/// Context-gone failures become [`FilterError::ContextGone`] without logging
/// above trace; anything else is logged at warn.
pub fn settle(result: Result<(), HostError>) -> Result<(), FilterError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_context_gone() => {
            log::trace!("{} after context teardown", e.call);
            Err(FilterError::ContextGone)
        }
        Err(e) => {
            log::warn!("{}", e);
            Err(e.into())
        }
    }
}

// =============================================================================
// Recording Host
// =============================================================================

/// One observed host call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    IncrementStats(u32),
    Notify(NotifyKind),
    RedirectTab { tab_id: TabId, url: String },
    Send(AuthorityMessage),
}

/// Host that records every call. Implements both host traits.
#[derive(Debug, Default)]
pub struct RecordingHost {
    calls: RefCell<Vec<HostCall>>,
    dead: bool,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host whose context is already gone.
    pub fn dead() -> Self {
        Self {
            calls: RefCell::default(),
            dead: true,
        }
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.borrow().clone()
    }

    pub fn take_calls(&self) -> Vec<HostCall> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }

    /// Total of all `increment_stats` calls.
    pub fn counted(&self) -> u32 {
        self.calls
            .borrow()
            .iter()
            .map(|c| match c {
                HostCall::IncrementStats(n) => *n,
                _ => 0,
            })
            .sum()
    }

    pub fn redirects(&self) -> Vec<(TabId, String)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                HostCall::RedirectTab { tab_id, url } => Some((*tab_id, url.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn notifications(&self) -> Vec<NotifyKind> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                HostCall::Notify(kind) => Some(*kind),
                _ => None,
            })
            .collect()
    }

    pub fn sent(&self) -> Vec<AuthorityMessage> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                HostCall::Send(msg) => Some(msg.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: HostCall) -> Result<(), HostError> {
        if self.dead {
            return Err(HostError::new("host", "Extension context invalidated."));
        }
        self.calls.borrow_mut().push(call);
        Ok(())
    }
}

impl AuthorityHost for RecordingHost {
    fn is_alive(&self) -> bool {
        !self.dead
    }

    fn increment_stats(&self, count: u32) -> Result<(), HostError> {
        self.record(HostCall::IncrementStats(count))
    }

    fn notify(&self, kind: NotifyKind) -> Result<(), HostError> {
        self.record(HostCall::Notify(kind))
    }

    fn redirect_tab(&self, tab_id: TabId, url: &str) -> Result<(), HostError> {
        self.record(HostCall::RedirectTab {
            tab_id,
            url: url.to_string(),
        })
    }
}

impl AgentHost for RecordingHost {
    fn is_alive(&self) -> bool {
        !self.dead
    }

    fn send_to_authority(&self, message: &AuthorityMessage) -> Result<(), HostError> {
        self.record(HostCall::Send(message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_maps_context_gone() {
        let err = settle(Err(HostError::new("notify", "Extension context invalidated.")));
        assert!(matches!(err, Err(FilterError::ContextGone)));

        let err = settle(Err(HostError::new("notify", "quota exceeded")));
        assert!(matches!(err, Err(FilterError::Host(_))));

        assert!(settle(Ok(())).is_ok());
    }

    #[test]
    fn test_recording_host() {
        let host = RecordingHost::new();
        host.increment_stats(2).unwrap();
        host.redirect_tab(4, "https://calm.test/").unwrap();
        assert_eq!(host.counted(), 2);
        assert_eq!(host.redirects(), vec![(4, "https://calm.test/".to_string())]);
        assert_eq!(host.take_calls().len(), 2);
        assert!(host.calls().is_empty());
    }

    #[test]
    fn test_dead_host_reports_context_gone() {
        let host = RecordingHost::dead();
        assert!(!AuthorityHost::is_alive(&host));
        let err = host.notify(NotifyKind::ContentBlocked).unwrap_err();
        assert!(err.is_context_gone());
    }
}
