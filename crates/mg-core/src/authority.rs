//! Interception authority
//!
//! The background surface: owns the settings cache and the navigation
//! interceptor, and handles the messages page agents send up.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::clock::Clock;
use crate::config::{Environment, FilterConfig};
use crate::error::FilterError;
use crate::host::{settle, AuthorityHost};
use crate::interceptor::{InterceptorOptions, NavigationInterceptor, NavigationOutcome};
use crate::settings::{ChangedKeys, SettingsCache, SettingsStore};
use crate::types::{AuthorityMessage, NavigationEvent, NotifyKind, TabId};

pub struct InterceptionAuthority {
    settings: SettingsCache,
    interceptor: NavigationInterceptor,
    host: Box<dyn AuthorityHost>,
}

impl InterceptionAuthority {
    /// Rebuild all state from the store. Safe to call on every worker start.
    pub fn cold_start(
        store: &dyn SettingsStore,
        env: Environment,
        host: Box<dyn AuthorityHost>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self::with_options(store, env, host, clock, InterceptorOptions::default())
    }

    pub fn with_options(
        store: &dyn SettingsStore,
        env: Environment,
        host: Box<dyn AuthorityHost>,
        clock: Box<dyn Clock>,
        options: InterceptorOptions,
    ) -> Self {
        let settings = SettingsCache::cold_start(store, env);
        log::info!("interception authority started (generation {})", settings.config().generation);
        Self {
            settings,
            interceptor: NavigationInterceptor::with_options(clock, options),
            host,
        }
    }

    pub fn config(&self) -> Arc<FilterConfig> {
        self.settings.config()
    }

    pub fn settings(&self) -> &SettingsCache {
        &self.settings
    }

    /// Handle a browser navigation signal. A torn-down context yields
    /// `Ignored`.
    pub fn on_navigation(&mut self, event: &NavigationEvent) -> NavigationOutcome {
        let config = self.settings.config();
        match self.interceptor.handle(event, &config, self.host.as_ref()) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::trace!("navigation in tab {} abandoned: {}", event.tab_id, e);
                NavigationOutcome::Ignored
            }
        }
    }

    /// Handle a message from the page agent running in `tab_id`.
    pub fn handle_message(
        &mut self,
        tab_id: TabId,
        message: &AuthorityMessage,
    ) -> Result<Option<NavigationOutcome>, FilterError> {
        let config = self.settings.config();
        match message {
            AuthorityMessage::UrlBlocked { url } => self
                .interceptor
                .report_url(tab_id, url, &config, self.host.as_ref())
                .map(Some),
            AuthorityMessage::ContentFiltered { count, notify } => {
                if *count == 0 || !config.enabled {
                    return Ok(None);
                }
                if !self.host.is_alive() {
                    return Err(FilterError::ContextGone);
                }
                log::debug!("tab {} filtered {} occurrences", tab_id, count);
                settle(self.host.increment_stats(*count))?;
                if *notify {
                    settle(self.host.notify(NotifyKind::ContentFiltered { count: *count }))?;
                }
                Ok(None)
            }
        }
    }

    /// Apply a storage change notification.
    pub fn on_settings_changed(&mut self, changes: &Map<String, Value>) -> ChangedKeys {
        let changed = self.settings.apply_changes(changes);
        if changed.intersects(ChangedKeys::BLOCKLISTS) {
            self.interceptor.matcher_mut().invalidate();
        }
        changed
    }

    /// Re-read everything from the store.
    pub fn reload(&mut self, store: &dyn SettingsStore) {
        self.settings.reload(store);
        self.interceptor.matcher_mut().invalidate();
    }

    pub fn on_tab_removed(&mut self, tab_id: TabId) {
        self.interceptor.forget_tab(tab_id);
    }
}
