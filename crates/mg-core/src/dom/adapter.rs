//! Site adapters
//!
//! Some search pages re-render their search box and suggestion dropdown in
//! ways the mutation observer misses. An adapter names the elements to poll
//! on those pages; the agent does the matching and removal itself.

use serde::{Deserialize, Serialize};

use super::Dom;

/// Bounds of an adapter poll interval.
pub const MIN_POLL_INTERVAL_MS: u64 = 100;
pub const MAX_POLL_INTERVAL_MS: u64 = 200;

/// Site-specific polling strategy.
pub trait SiteAdapter<D: Dom> {
    fn name(&self) -> &str;

    /// Whether the adapter handles pages on `host`.
    fn applies_to(&self, host: &str) -> bool;

    fn poll_interval_ms(&self) -> u64;

    /// Suggestion entries currently shown. Matching ones get removed.
    fn suggestion_items(&self, dom: &D) -> Vec<D::Node>;

    /// Search inputs that need listeners (and a value guard if
    /// [`guards_value`](Self::guards_value)).
    fn search_inputs(&self, dom: &D) -> Vec<D::Node>;

    fn guards_value(&self) -> bool {
        false
    }
}

/// Serializable description of a [`SelectorAdapter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteAdapterConfig {
    pub name: String,
    /// Registrable domains; subdomains match too.
    pub hosts: Vec<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub suggestion_selectors: Vec<String>,
    #[serde(default)]
    pub input_selectors: Vec<String>,
    #[serde(default)]
    pub guard_value: bool,
}

fn default_poll_interval() -> u64 {
    150
}

impl SiteAdapterConfig {
    /// Adapters for the major search engines.
    pub fn defaults() -> Vec<Self> {
        fn adapter(
            name: &str,
            hosts: &[&str],
            suggestions: &[&str],
            inputs: &[&str],
            guard_value: bool,
        ) -> SiteAdapterConfig {
            let owned = |v: &[&str]| v.iter().map(|s| s.to_string()).collect();
            SiteAdapterConfig {
                name: name.to_string(),
                hosts: owned(hosts),
                poll_interval_ms: default_poll_interval(),
                suggestion_selectors: owned(suggestions),
                input_selectors: owned(inputs),
                guard_value,
            }
        }

        vec![
            adapter(
                "google",
                &["google.com", "google.co.uk", "google.ca", "google.com.au"],
                &["ul[role=listbox] li", "div[role=option]", ".sbct"],
                &["textarea[name=q]", "input[name=q]"],
                true,
            ),
            adapter(
                "bing",
                &["bing.com"],
                &["#sa_ul li", ".sa_sg"],
                &["#sb_form_q"],
                false,
            ),
            adapter(
                "duckduckgo",
                &["duckduckgo.com"],
                &["ul[role=listbox] li", ".search__autocomplete li"],
                &["input[name=q]"],
                false,
            ),
            adapter(
                "youtube",
                &["youtube.com"],
                &["div[role=listbox] div[role=option]", ".sbsb_c"],
                &["input[name=search_query]"],
                true,
            ),
        ]
    }

    /// Parse a JSON list of adapter configs.
    pub fn parse_list(json: &str) -> Result<Vec<Self>, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Adapter driven entirely by CSS selectors.
#[derive(Debug, Clone)]
pub struct SelectorAdapter {
    config: SiteAdapterConfig,
}

impl SelectorAdapter {
    pub fn new(mut config: SiteAdapterConfig) -> Self {
        config.poll_interval_ms = config
            .poll_interval_ms
            .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS);
        for host in &mut config.hosts {
            *host = host.trim().trim_start_matches("www.").to_lowercase();
        }
        Self { config }
    }

    pub fn config(&self) -> &SiteAdapterConfig {
        &self.config
    }

    fn select<D: Dom>(&self, dom: &D, selectors: &[String]) -> Vec<D::Node> {
        let mut out = Vec::new();
        for selector in selectors {
            match dom.query_all(selector) {
                Ok(nodes) => out.extend(nodes),
                Err(e) => log::debug!("{}: selector '{}' failed: {}", self.config.name, selector, e),
            }
        }
        out
    }
}

impl<D: Dom> SiteAdapter<D> for SelectorAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn applies_to(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_lowercase();
        self.config.hosts.iter().any(|h| {
            host == *h
                || (host.len() > h.len()
                    && host.ends_with(h.as_str())
                    && host.as_bytes()[host.len() - h.len() - 1] == b'.')
        })
    }

    fn poll_interval_ms(&self) -> u64 {
        self.config.poll_interval_ms
    }

    fn suggestion_items(&self, dom: &D) -> Vec<D::Node> {
        self.select(dom, &self.config.suggestion_selectors)
    }

    fn search_inputs(&self, dom: &D) -> Vec<D::Node> {
        self.select(dom, &self.config.input_selectors)
    }

    fn guards_value(&self) -> bool {
        self.config.guard_value
    }
}

/// Build boxed adapters from configs.
pub fn selector_adapters<D: Dom>(configs: Vec<SiteAdapterConfig>) -> Vec<Box<dyn SiteAdapter<D>>> {
    configs
        .into_iter()
        .map(|c| Box::new(SelectorAdapter::new(c)) as Box<dyn SiteAdapter<D>>)
        .collect()
}
