use std::fs;
use std::path::Path;

use mg_compiler::{build_storage_entries, generate_salt, optimize_entries, parse_list, OptimizeStats};
use mg_core::blocklist::EntryKind;
use mg_core::config::{Environment, FilterConfig};
use mg_core::types::MatchMode;
use serde_json::{Map, Value};

/// Extension origin used for the built-in blocked page outside a browser.
pub const CLI_ORIGIN: &str = "chrome-extension://mindgate/";

/// Where the settings for a command come from.
#[derive(Debug, Clone, Default)]
pub struct ListSources {
    /// JSON dump of `chrome.storage` contents.
    pub settings: Option<String>,
    pub words: Option<String>,
    pub sites: Option<String>,
    pub hashed: bool,
    pub salt: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListStats {
    pub words: OptimizeStats,
    pub sites: OptimizeStats,
}

pub fn read_text(path: &str) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))
}

pub fn read_settings(path: &str) -> Result<Map<String, Value>, String> {
    let text = read_text(path)?;
    match serde_json::from_str::<Value>(&text).map_err(|e| format!("Invalid settings '{}': {}", path, e))? {
        Value::Object(map) => Ok(map),
        _ => Err(format!("Settings '{}' must be a JSON object", path)),
    }
}

pub fn read_entries(path: &str, kind: EntryKind) -> Result<(Vec<String>, OptimizeStats), String> {
    let text = read_text(path)?;
    let mut entries: Vec<String> = parse_list(&text)
        .map_err(|e| format!("Invalid list '{}': {}", path, e))?
        .into_iter()
        .map(|e| e.value)
        .collect();
    let stats = optimize_entries(&mut entries, kind);
    Ok((entries, stats))
}

/// The settings map: the settings file with any list files compiled on top.
pub fn load_map(sources: &ListSources) -> Result<(Map<String, Value>, ListStats), String> {
    let mut map = match &sources.settings {
        Some(path) => read_settings(path)?,
        None => Map::new(),
    };
    let mut stats = ListStats::default();

    if sources.words.is_none() && sources.sites.is_none() {
        return Ok((map, stats));
    }

    let words = match &sources.words {
        Some(path) => {
            let (entries, s) = read_entries(path, EntryKind::Word)?;
            stats.words = s;
            entries
        }
        None => Vec::new(),
    };
    let sites = match &sources.sites {
        Some(path) => {
            let (entries, s) = read_entries(path, EntryKind::Site)?;
            stats.sites = s;
            entries
        }
        None => Vec::new(),
    };

    let mode = if sources.hashed { MatchMode::Hashed } else { MatchMode::Plaintext };
    let salt = sources
        .salt
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(generate_salt);
    let entries = build_storage_entries(&words, &sites, mode, &salt).map_err(|e| e.to_string())?;
    map.extend(entries);

    Ok((map, stats))
}

pub fn environment() -> Environment {
    Environment::new(CLI_ORIGIN)
}

pub fn load_config(sources: &ListSources) -> Result<FilterConfig, String> {
    let (map, _) = load_map(sources)?;
    Ok(FilterConfig::from_map(&map, &environment()))
}

pub fn write_json(path: &Path, value: &Value) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
    }
    let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    fs::write(path, text).map_err(|e| format!("Failed to write '{}': {}", path.display(), e))
}
