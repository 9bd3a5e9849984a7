//! Redirect target selection for blocked navigations.

use crate::config::FilterConfig;
use crate::types::RedirectMode;
use crate::url::encode_component;

/// Used when custom redirects are on but no URL was configured.
pub const FALLBACK_REDIRECT_URL: &str = "https://www.calm.com/breathe";

/// Query parameter carrying the blocked URL to the built-in page.
pub const BLOCKED_URL_PARAM: &str = "url";

/// Where to send a tab whose navigation to `blocked_url` was blocked.
///
/// Pure function of its inputs; never returns an empty string.
pub fn resolve_redirect_target(blocked_url: &str, config: &FilterConfig) -> String {
    match config.redirect_mode {
        RedirectMode::Custom => {
            let custom = config.custom_redirect_url.trim();
            if custom.is_empty() {
                FALLBACK_REDIRECT_URL.to_string()
            } else {
                custom.to_string()
            }
        }
        RedirectMode::BuiltIn => {
            let page = config.block_page_url.trim();
            if page.is_empty() {
                return FALLBACK_REDIRECT_URL.to_string();
            }
            let sep = if page.contains('?') { '&' } else { '?' };
            format!("{page}{sep}{BLOCKED_URL_PARAM}={}", encode_component(blocked_url))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(url: &str) -> FilterConfig {
        FilterConfig {
            redirect_mode: RedirectMode::Custom,
            custom_redirect_url: url.to_string(),
            ..FilterConfig::default()
        }
    }

    #[test]
    fn custom_url_used_verbatim() {
        let target = resolve_redirect_target("https://bad.test/", &custom("https://calm.example/"));
        assert_eq!(target, "https://calm.example/");
    }

    #[test]
    fn empty_custom_url_falls_back() {
        assert_eq!(resolve_redirect_target("https://bad.test/", &custom("")), FALLBACK_REDIRECT_URL);
        assert_eq!(resolve_redirect_target("https://bad.test/", &custom("   ")), FALLBACK_REDIRECT_URL);
    }

    #[test]
    fn builtin_page_carries_encoded_url() {
        let config = FilterConfig {
            block_page_url: "chrome-extension://abc/blocked.html".to_string(),
            ..FilterConfig::default()
        };
        let target = resolve_redirect_target("https://bad.test/a?b=c d", &config);
        assert_eq!(
            target,
            "chrome-extension://abc/blocked.html?url=https%3A%2F%2Fbad.test%2Fa%3Fb%3Dc%20d"
        );
    }

    #[test]
    fn builtin_page_with_existing_query() {
        let config = FilterConfig {
            block_page_url: "blocked.html?theme=dark".to_string(),
            ..FilterConfig::default()
        };
        assert_eq!(
            resolve_redirect_target("x", &config),
            "blocked.html?theme=dark&url=x"
        );
    }

    #[test]
    fn never_empty() {
        let config = FilterConfig {
            block_page_url: String::new(),
            ..FilterConfig::default()
        };
        assert!(!resolve_redirect_target("", &config).is_empty());
    }
}
