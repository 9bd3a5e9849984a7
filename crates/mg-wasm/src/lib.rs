//! WebAssembly bindings for MindGate
//!
//! `Authority` runs in the background worker, `PageAgent` in every content
//! script. The free functions serve the options page and the glue code.

mod agent;
mod authority;
mod convert;
mod dom;
mod host;
mod logger;

use chrono::NaiveDate;
use mg_compiler::{build_storage_entries, generate_salt, optimize_entries, parse_list};
use mg_core::blocklist::EntryKind;
use mg_core::config::{Environment, FilterConfig};
use mg_core::stats::FilterStats;
use mg_core::types::MatchMode;
use mg_core::url::extract_host;
use mg_core::{resolve_redirect_target, Matcher};
use serde_json::Value;
use wasm_bindgen::prelude::*;

pub use agent::PageAgent;
pub use authority::Authority;
pub use convert::flatten_storage_changes;

use crate::convert::{from_json, js_error, to_map};

/// Install the console logger at `level` (`error`, `warn`, `info`,
/// `debug`, `trace` or `off`).
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging(level: &str) {
    logger::install(logger::parse_level(level));
}

/// Compile blocklist text into the storage entries that install it.
///
/// `mode` is `"plaintext"` or `"hashed"`. Hashed lists use `salt`, or a
/// fresh one when it is empty.
#[wasm_bindgen(js_name = compileLists)]
pub fn compile_lists(words_text: &str, sites_text: &str, mode: &str, salt: Option<String>) -> Result<JsValue, JsValue> {
    let mode: MatchMode = serde_json::from_value(Value::String(mode.to_string())).map_err(js_error)?;
    let mut words = entries(words_text)?;
    let mut sites = entries(sites_text)?;
    let word_stats = optimize_entries(&mut words, EntryKind::Word);
    let site_stats = optimize_entries(&mut sites, EntryKind::Site);
    log::debug!("compiled lists: words {:?}, sites {:?}", word_stats, site_stats);

    let salt = salt.filter(|s| !s.is_empty()).unwrap_or_else(generate_salt);
    let map = build_storage_entries(&words, &sites, mode, &salt).map_err(js_error)?;
    from_json(&Value::Object(map))
}

fn entries(text: &str) -> Result<Vec<String>, JsValue> {
    Ok(parse_list(text)
        .map_err(js_error)?
        .into_iter()
        .map(|e| e.value)
        .collect())
}

/// Where a navigation to `url` would be redirected under `settings`.
#[wasm_bindgen(js_name = resolveRedirect)]
pub fn resolve_redirect(url: &str, settings: JsValue, extension_origin: String) -> Result<String, JsValue> {
    let config = FilterConfig::from_map(&to_map(&settings)?, &Environment::new(extension_origin));
    Ok(resolve_redirect_target(url, &config))
}

/// Block reason for `url` under `settings` (`"site"`, `"word"`,
/// `"search"`), or `undefined` when allowed. Used by the options page
/// preview.
#[wasm_bindgen(js_name = checkUrl)]
pub fn check_url(url: &str, settings: JsValue, extension_origin: String) -> Result<Option<String>, JsValue> {
    let config = FilterConfig::from_map(&to_map(&settings)?, &Environment::new(extension_origin));
    let reason = Matcher::new().check_url(url, &config, true);
    Ok(reason.and_then(|r| match serde_json::to_value(r) {
        Ok(Value::String(s)) => Some(s),
        _ => None,
    }))
}

/// Add `count` blocks to the counters in `stored` (the counter keys of
/// `chrome.storage`). Returns the entries to write back.
#[wasm_bindgen(js_name = recordBlocks)]
pub fn record_blocks(stored: JsValue, count: u32) -> Result<JsValue, JsValue> {
    let stats = FilterStats::from_map(&to_map(&stored)?).record(count, local_date(&js_sys::Date::new_0()));
    from_json(&Value::Object(stats.to_map()))
}

/// Counters as of today, with the daily count reset on a new day.
#[wasm_bindgen(js_name = currentStats)]
pub fn current_stats(stored: JsValue) -> Result<JsValue, JsValue> {
    let stats = FilterStats::from_map(&to_map(&stored)?).as_of(local_date(&js_sys::Date::new_0()));
    from_json(&Value::Object(stats.to_map()))
}

#[wasm_bindgen(js_name = extractHost)]
pub fn extract_host_js(url: &str) -> Option<String> {
    extract_host(url).map(|h| h.to_string())
}

/// Local calendar date of a JS `Date`.
fn local_date(date: &js_sys::Date) -> NaiveDate {
    ymd(date.get_full_year() as i32, date.get_month() + 1, date.get_date())
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn builds_dates() {
        assert_eq!(ymd(2024, 3, 9).to_string(), "2024-03-09");
        assert_eq!(ymd(2024, 2, 30), NaiveDate::default());
    }
}
