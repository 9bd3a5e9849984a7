//! Page agent
//!
//! One per page. Drives scans through the [`ScanScheduler`], handles field
//! input, runs the site adapter poll and reports to the authority. The host
//! calls `on_*` for each browser event and arms a single timer for
//! [`PageAgent::next_deadline`].

use std::collections::HashSet;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::FilterConfig;
use crate::dom::{AgentTiming, Dom, Marker, ScanKind, ScanReport, ScanScheduler, Scanner, SiteAdapter};
use crate::error::FilterError;
use crate::host::{settle, AgentHost};
use crate::scrubber::{PhraseSource, RandomPhrases};
use crate::types::AuthorityMessage;
use crate::url::extract_host;

pub struct PageAgent<D: Dom> {
    dom: D,
    host: Box<dyn AgentHost>,
    clock: Box<dyn Clock>,
    config: Arc<FilterConfig>,
    scanner: Scanner,
    phrases: Box<dyn PhraseSource>,
    custom_phrases: bool,
    scheduler: ScanScheduler,
    pending: Vec<D::Node>,
    adapter: Option<Box<dyn SiteAdapter<D>>>,
    next_adapter_poll: Option<u64>,
    filtered_total: u32,
    notified: bool,
    reported_urls: HashSet<String>,
    stopped: bool,
}

impl<D: Dom> PageAgent<D> {
    pub fn new(dom: D, config: Arc<FilterConfig>, host: Box<dyn AgentHost>, clock: Box<dyn Clock>) -> Self {
        let scheduler = ScanScheduler::new(AgentTiming::default(), clock.now_ms());
        let phrases = Box::new(RandomPhrases::for_config(&config));
        Self {
            dom,
            host,
            clock,
            config,
            scanner: Scanner::new(),
            phrases,
            custom_phrases: false,
            scheduler,
            pending: Vec::new(),
            adapter: None,
            next_adapter_poll: None,
            filtered_total: 0,
            notified: false,
            reported_urls: HashSet::new(),
            stopped: false,
        }
    }

    pub fn with_timing(mut self, timing: AgentTiming) -> Self {
        self.scheduler = ScanScheduler::new(timing, self.clock.now_ms());
        self
    }

    /// Use the first adapter that applies to the page's host.
    pub fn with_adapters(mut self, adapters: Vec<Box<dyn SiteAdapter<D>>>) -> Self {
        let location = self.dom.location();
        let host = extract_host(&location).unwrap_or_default();
        self.adapter = adapters.into_iter().find(|a| a.applies_to(host));
        if let Some(adapter) = &self.adapter {
            log::debug!("site adapter '{}' active on {}", adapter.name(), host);
            self.next_adapter_poll = Some(self.clock.now_ms());
        }
        self
    }

    /// Replace the replacement phrase source. Kept across config changes.
    pub fn with_phrases(mut self, phrases: Box<dyn PhraseSource>) -> Self {
        self.phrases = phrases;
        self.custom_phrases = true;
        self
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn config(&self) -> &Arc<FilterConfig> {
        &self.config
    }

    /// Occurrences scrubbed on this page so far.
    pub fn filtered_total(&self) -> u32 {
        self.filtered_total
    }

    /// True once the extension context is gone. All handlers become no-ops.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn adapter_name(&self) -> Option<&str> {
        self.adapter.as_ref().map(|a| a.name())
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// The script was injected. Runs the immediate scan.
    pub fn on_injected(&mut self) -> Option<ScanReport> {
        log::debug!("page agent injected on {}", self.dom.location());
        self.on_tick()
    }

    /// Element nodes were added to the document.
    pub fn on_mutations(&mut self, added: impl IntoIterator<Item = D::Node>) {
        if self.stopped {
            return;
        }
        let before = self.pending.len();
        self.pending.extend(added);
        if self.pending.len() > before {
            self.scheduler.note_mutation(self.clock.now_ms());
        }
    }

    /// Timer callback. Runs whatever is due.
    pub fn on_tick(&mut self) -> Option<ScanReport> {
        if self.stopped {
            return None;
        }
        let now = self.clock.now_ms();
        self.poll_adapter(now);

        let kind = self.scheduler.poll(now)?;
        let mut report = ScanReport::default();
        match kind {
            ScanKind::Full => {
                self.pending.clear();
                let root = self.dom.root();
                report = self.scanner.scan(&self.dom, &root, &self.config, &mut *self.phrases);
            }
            ScanKind::Batch => {
                for node in std::mem::take(&mut self.pending) {
                    if !self.dom.is_connected(&node) {
                        continue;
                    }
                    let part = self.scanner.scan(&self.dom, &node, &self.config, &mut *self.phrases);
                    report.merge(part);
                }
            }
        }
        log::trace!("{:?} scan: {:?}", kind, report);

        self.check_own_url();
        self.report_filtered(report.matches);
        Some(report)
    }

    /// popstate, hashchange or window focus.
    pub fn on_navigation_signal(&mut self) {
        if !self.stopped {
            self.check_own_url();
        }
    }

    /// A listened field's value changed.
    pub fn on_field_input(&mut self, field: &D::Node) -> usize {
        if self.stopped {
            return 0;
        }
        match self
            .scanner
            .clean_field(&self.dom, field, &self.config, &mut *self.phrases)
        {
            Ok(count) => {
                self.report_filtered(count);
                count
            }
            Err(e) => {
                log::debug!("field input not cleaned: {}", e);
                0
            }
        }
    }

    /// New settings arrived. Everything is rescanned with them.
    pub fn on_config_changed(&mut self, config: Arc<FilterConfig>) {
        if !self.custom_phrases && config.replacement_phrases != self.config.replacement_phrases {
            self.phrases = Box::new(RandomPhrases::for_config(&config));
        }
        self.config = config;
        self.reported_urls.clear();
        self.scheduler.request_full();
    }

    /// When `on_tick` should next run.
    pub fn next_deadline(&self) -> Option<u64> {
        if self.stopped {
            return None;
        }
        match (self.scheduler.next_deadline(), self.next_adapter_poll) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn poll_adapter(&mut self, now: u64) {
        let Self {
            dom,
            config,
            scanner,
            phrases,
            adapter,
            next_adapter_poll,
            ..
        } = self;
        let Some(adapter) = adapter else {
            return;
        };
        if next_adapter_poll.map_or(true, |due| now < due) {
            return;
        }
        *next_adapter_poll = Some(now + adapter.poll_interval_ms());
        if !config.enabled {
            return;
        }

        for item in adapter.suggestion_items(dom) {
            if !scanner.element_matches(dom, &item, config) {
                continue;
            }
            match dom.remove(&item) {
                Ok(()) => log::trace!("{}: removed suggestion", adapter.name()),
                Err(e) => log::debug!("{}: suggestion not removed: {}", adapter.name(), e),
            }
        }

        let mut scrubbed = 0;
        for input in adapter.search_inputs(dom) {
            if let Err(e) = scanner.attach(dom, &input) {
                log::debug!("{}: input not attached: {}", adapter.name(), e);
                continue;
            }
            if adapter.guards_value() && !dom.is_marked(&input, Marker::ValueGuarded) {
                match dom.guard_value(&input) {
                    Ok(()) => dom.mark(&input, Marker::ValueGuarded),
                    Err(e) => log::debug!("{}: value guard failed: {}", adapter.name(), e),
                }
            }
            match scanner.clean_field(dom, &input, config, &mut **phrases) {
                Ok(n) => scrubbed += n,
                Err(e) => log::debug!("{}: input not cleaned: {}", adapter.name(), e),
            }
        }
        self.report_filtered(scrubbed);
    }

    fn check_own_url(&mut self) {
        let location = self.dom.location();
        if self.reported_urls.contains(&location) {
            return;
        }
        let Some(reason) = self.scanner.matcher_mut().check_url(&location, &self.config, true) else {
            return;
        };
        log::info!("page url blocked ({:?}): {}", reason, location);
        self.reported_urls.insert(location.clone());
        self.send(AuthorityMessage::UrlBlocked { url: location });
    }

    fn report_filtered(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        self.filtered_total = self.filtered_total.saturating_add(count);
        let notify = !self.notified && self.filtered_total >= self.scheduler.timing().notify_threshold;
        if notify {
            self.notified = true;
        }
        self.send(AuthorityMessage::ContentFiltered { count, notify });
    }

    fn send(&mut self, message: AuthorityMessage) {
        if !self.host.is_alive() {
            self.stop();
            return;
        }
        if let Err(FilterError::ContextGone) = settle(self.host.send_to_authority(&message)) {
            self.stop();
        }
    }

    fn stop(&mut self) {
        log::trace!("extension context gone, page agent stopping");
        self.stopped = true;
        self.pending.clear();
    }
}
