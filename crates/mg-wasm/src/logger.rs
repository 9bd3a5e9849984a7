//! Console logging for the extension.

use std::sync::Once;

use log::{Level, LevelFilter};

static INSTALL: Once = Once::new();

/// Parse a level name. Unknown names fall back to `warn`.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" | "none" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Warn,
    }
}

/// Install the panic hook and the console logger. Later calls only change
/// the level.
pub fn install(level: LevelFilter) {
    INSTALL.call_once(|| {
        console_error_panic_hook::set_once();
        // The logger passes everything; the max level does the filtering
        wasm_logger::init(wasm_logger::Config::new(Level::Trace).module_prefix("mg_"));
    });
    log::set_max_level(level);
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn parses_levels() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level(" warning "), LevelFilter::Warn);
        assert_eq!(parse_level("none"), LevelFilter::Off);
        assert_eq!(parse_level("loud"), LevelFilter::Warn);
    }

    #[wasm_bindgen_test]
    fn reinstall_changes_level() {
        install(LevelFilter::Debug);
        install(LevelFilter::Error);
        assert_eq!(log::max_level(), LevelFilter::Error);
    }
}
