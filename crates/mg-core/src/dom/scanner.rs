//! DOM scanning
//!
//! One scan pass over a subtree: scrub text nodes, hide matching links and
//! buttons, attach input listeners, clean field values. A failing element is
//! logged and skipped; it never aborts the pass.

use super::{adjust_caret, Dom, Marker, REWRITE_EVENTS};
use crate::config::FilterConfig;
use crate::error::DomError;
use crate::matcher::Matcher;
use crate::scrubber::{PhraseSource, Scrubber};

/// Attributes of interactive elements checked against the blocklists.
const CHECKED_ATTRIBUTES: [&str; 3] = ["href", "title", "aria-label"];

/// What one scan pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub text_nodes: usize,
    /// Text nodes and fields written back.
    pub rewritten: usize,
    /// Occurrences scrubbed.
    pub matches: usize,
    pub hidden: usize,
    pub inputs_attached: usize,
    /// Elements skipped after a DOM error.
    pub errors: usize,
}

impl ScanReport {
    pub fn merge(&mut self, other: ScanReport) {
        self.text_nodes += other.text_nodes;
        self.rewritten += other.rewritten;
        self.matches += other.matches;
        self.hidden += other.hidden;
        self.inputs_attached += other.inputs_attached;
        self.errors += other.errors;
    }
}

/// Stateful scanner: keeps the matcher cache and compiled scrub pattern
/// across passes.
#[derive(Default)]
pub struct Scanner {
    matcher: Matcher,
    scrubber: Scrubber,
}

impl Scanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matcher_mut(&mut self) -> &mut Matcher {
        &mut self.matcher
    }

    /// Scan the subtree at `root`.
    pub fn scan<D: Dom>(
        &mut self,
        dom: &D,
        root: &D::Node,
        config: &FilterConfig,
        phrases: &mut dyn PhraseSource,
    ) -> ScanReport {
        let mut report = ScanReport::default();
        if !config.enabled || !dom.is_connected(root) {
            return report;
        }

        for node in dom.text_nodes(root) {
            report.text_nodes += 1;
            match self.scrub_text_node(dom, &node, config, phrases) {
                Ok(0) => {}
                Ok(n) => {
                    report.matches += n;
                    report.rewritten += 1;
                }
                Err(e) => {
                    log::debug!("skipping text node: {}", e);
                    report.errors += 1;
                }
            }
        }

        for element in dom.interactive_elements(root) {
            if dom.is_marked(&element, Marker::Hidden) {
                continue;
            }
            if !self.element_matches(dom, &element, config) {
                continue;
            }
            match dom.hide(&element) {
                Ok(()) => {
                    dom.mark(&element, Marker::Hidden);
                    report.hidden += 1;
                }
                Err(e) => {
                    log::debug!("could not hide element: {}", e);
                    report.errors += 1;
                }
            }
        }

        for field in dom.text_entries(root) {
            match self.attach(dom, &field) {
                Ok(true) => report.inputs_attached += 1,
                Ok(false) => {}
                Err(e) => {
                    log::debug!("could not attach input listener: {}", e);
                    report.errors += 1;
                    continue;
                }
            }
            match self.clean_field(dom, &field, config, phrases) {
                Ok(0) => {}
                Ok(n) => {
                    report.matches += n;
                    report.rewritten += 1;
                }
                Err(e) => {
                    log::debug!("could not clean field: {}", e);
                    report.errors += 1;
                }
            }
        }

        log::trace!("scan pass: {:?}", report);
        report
    }

    /// Whether a link or button shows blocked content in its text, `href`,
    /// `title` or `aria-label`.
    pub fn element_matches<D: Dom>(&mut self, dom: &D, element: &D::Node, config: &FilterConfig) -> bool {
        let text = dom.element_text(element);
        if self.matcher.matches(&text, &config.blocked_words, config) {
            return true;
        }
        for name in CHECKED_ATTRIBUTES {
            let Some(value) = dom.attribute(element, name) else {
                continue;
            };
            if self.matcher.matches(&value, &config.blocked_words, config) {
                return true;
            }
            if name == "href" && self.matcher.matches(&value, &config.blocked_sites, config) {
                return true;
            }
        }
        false
    }

    /// Whether `text` contains blocked words.
    pub fn text_matches(&mut self, text: &str, config: &FilterConfig) -> bool {
        self.matcher.matches(text, &config.blocked_words, config)
    }

    /// Scrub a field's value if it matches. Writes back only on change,
    /// restores the caret and re-dispatches `input` and `change`.
    ///
    /// Returns the number of occurrences scrubbed.
    pub fn clean_field<D: Dom>(
        &mut self,
        dom: &D,
        field: &D::Node,
        config: &FilterConfig,
        phrases: &mut dyn PhraseSource,
    ) -> Result<usize, DomError> {
        let Some(value) = dom.field_value(field) else {
            return Ok(0);
        };
        if !self.matcher.matches(&value, &config.blocked_words, config) {
            return Ok(0);
        }

        let result = self.scrubber.scrub(&value, &config.blocked_words, config, phrases);
        if !result.is_changed() || result.text == value {
            return Ok(0);
        }

        let caret = dom.caret(field);
        dom.set_field_value(field, &result.text)?;
        if let Some(caret) = caret {
            dom.set_caret(field, adjust_caret(caret, &value, &result.text))?;
        }
        for event in REWRITE_EVENTS {
            dom.dispatch(field, event)?;
        }
        Ok(result.match_count)
    }

    /// Attach input listeners once.
    pub fn attach<D: Dom>(&mut self, dom: &D, field: &D::Node) -> Result<bool, DomError> {
        if dom.is_marked(field, Marker::InputAttached) {
            return Ok(false);
        }
        dom.attach_input_listener(field)?;
        dom.mark(field, Marker::InputAttached);
        Ok(true)
    }

    fn scrub_text_node<D: Dom>(
        &mut self,
        dom: &D,
        node: &D::Node,
        config: &FilterConfig,
        phrases: &mut dyn PhraseSource,
    ) -> Result<usize, DomError> {
        let Some(text) = dom.text(node) else {
            return Ok(0);
        };
        if text.trim().is_empty() {
            return Ok(0);
        }
        let result = self.scrubber.scrub(&text, &config.blocked_words, config, phrases);
        if !result.is_changed() {
            return Ok(0);
        }
        dom.set_text(node, &result.text)?;
        Ok(result.match_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocklist::BlockList;
    use crate::dom::memory::MemoryDom;
    use crate::types::ReplacementMode;

    fn config() -> FilterConfig {
        FilterConfig {
            blocked_words: BlockList::words(["gambling", "casino"]),
            blocked_sites: BlockList::sites(["bet.test"]),
            replacement_mode: ReplacementMode::Erase,
            ..FilterConfig::default()
        }
    }

    fn calm() -> impl FnMut() -> String {
        || "calm".to_string()
    }

    #[test]
    fn test_scrubs_text_nodes() {
        let dom = MemoryDom::new("https://a.test/");
        let p = dom.element(dom.body(), "p", &[]);
        let t = dom.text(p, "Visit gambling sites now");
        let clean = dom.text(p, "nothing here");

        let report = Scanner::new().scan(&dom, &dom.root(), &config(), &mut calm());
        assert_eq!(dom.text_content(t), "Visit  sites now");
        assert_eq!(dom.text_content(clean), "nothing here");
        assert_eq!(report.matches, 1);
        assert_eq!(report.rewritten, 1);
        assert_eq!(dom.text_writes(), 1);
    }

    #[test]
    fn test_hides_matching_links_once() {
        let dom = MemoryDom::new("https://a.test/");
        let by_href = dom.element(dom.body(), "a", &[("href", "https://www.bet.test/x")]);
        dom.text(by_href, "click");
        let by_title = dom.element(dom.body(), "button", &[("title", "Casino deals")]);
        let fine = dom.element(dom.body(), "a", &[("href", "/news")]);

        let mut scanner = Scanner::new();
        let report = scanner.scan(&dom, &dom.root(), &config(), &mut calm());
        assert_eq!(report.hidden, 2);
        assert!(dom.is_hidden(by_href));
        assert!(dom.is_hidden(by_title));
        assert!(!dom.is_hidden(fine));

        let again = scanner.scan(&dom, &dom.root(), &config(), &mut calm());
        assert_eq!(again.hidden, 0);
    }

    #[test]
    fn test_attaches_inputs_once_and_cleans_values() {
        let dom = MemoryDom::new("https://a.test/");
        let field = dom.input(dom.body(), &[("type", "search")], "best casino");
        let password = dom.input(dom.body(), &[("type", "password")], "casino");

        let mut scanner = Scanner::new();
        let report = scanner.scan(&dom, &dom.root(), &config(), &mut calm());
        assert_eq!(report.inputs_attached, 1);
        assert_eq!(dom.value(field).as_deref(), Some("best "));
        assert_eq!(dom.value(password).as_deref(), Some("casino"));
        assert!(dom.is_marked(&field, Marker::InputAttached));
        assert_eq!(
            dom.events(),
            vec![(field, "input".to_string()), (field, "change".to_string())]
        );

        let again = scanner.scan(&dom, &dom.root(), &config(), &mut calm());
        assert_eq!(again.inputs_attached, 0);
    }

    #[test]
    fn test_element_error_does_not_abort_pass() {
        let dom = MemoryDom::new("https://a.test/");
        let bad = dom.text(dom.body(), "casino one");
        let good = dom.text(dom.body(), "casino two");
        dom.break_node(bad);

        let report = Scanner::new().scan(&dom, &dom.root(), &config(), &mut calm());
        assert_eq!(report.errors, 1);
        assert_eq!(dom.text_content(good), " two");
        assert_eq!(dom.text_content(bad), "casino one");
    }

    #[test]
    fn test_disabled_is_noop() {
        let dom = MemoryDom::new("https://a.test/");
        let t = dom.text(dom.body(), "casino");
        let config = FilterConfig {
            enabled: false,
            ..config()
        };
        let report = Scanner::new().scan(&dom, &dom.root(), &config, &mut calm());
        assert_eq!(report, ScanReport::default());
        assert_eq!(dom.text_content(t), "casino");
    }

    #[test]
    fn test_caret_follows_rewrite() {
        let dom = MemoryDom::new("https://a.test/");
        let field = dom.input(dom.body(), &[], "my casino trip");
        dom.set_value(field, "my casino trip", 14);

        let config = FilterConfig {
            replacement_mode: ReplacementMode::Substitute,
            ..config()
        };
        let n = Scanner::new()
            .clean_field(&dom, &field, &config, &mut calm())
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(dom.value(field).as_deref(), Some("my calm trip"));
        assert_eq!(dom.caret(&field), Some(12));
    }
}
