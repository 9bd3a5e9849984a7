//! JS-facing interception authority (background worker).

use std::cell::RefCell;

use mg_core::config::Environment;
use mg_core::interceptor::NavigationOutcome;
use mg_core::settings::MemoryStore;
use mg_core::types::{AuthorityMessage, BlockReason, NavigationEvent};
use mg_core::InterceptionAuthority;
use serde_json::Value;
use wasm_bindgen::prelude::*;

use crate::convert::{flatten_storage_changes, js_error, to_json, to_map};
use crate::host::{JsAuthorityHost, JsClock};

#[wasm_bindgen]
pub struct Authority {
    inner: RefCell<InterceptionAuthority>,
}

#[wasm_bindgen]
impl Authority {
    /// Cold start from the full `chrome.storage` contents.
    #[wasm_bindgen(constructor)]
    pub fn new(settings: JsValue, extension_origin: String, host: JsValue) -> Result<Authority, JsValue> {
        let store = MemoryStore::with_map(to_map(&settings)?);
        let host = JsAuthorityHost::new(host)?;
        let inner = InterceptionAuthority::cold_start(
            &store,
            Environment::new(extension_origin),
            Box::new(host),
            Box::new(JsClock),
        );
        Ok(Self {
            inner: RefCell::new(inner),
        })
    }

    /// `{ tabId, frameId, url, phase }` from a `webNavigation` listener.
    #[wasm_bindgen(js_name = onNavigation)]
    pub fn on_navigation(&self, event: JsValue) -> Result<JsValue, JsValue> {
        let event: NavigationEvent = serde_json::from_value(to_json(&event)?).map_err(js_error)?;
        let mut inner = self.inner.try_borrow_mut().map_err(js_error)?;
        Ok(outcome_to_js(&inner.on_navigation(&event)))
    }

    /// A message from the page agent in `tab_id`.
    #[wasm_bindgen(js_name = onMessage)]
    pub fn on_message(&self, tab_id: i32, message: JsValue) -> Result<JsValue, JsValue> {
        let message: AuthorityMessage = serde_json::from_value(to_json(&message)?).map_err(js_error)?;
        let mut inner = self.inner.try_borrow_mut().map_err(js_error)?;
        match inner.handle_message(tab_id, &message) {
            Ok(Some(outcome)) => Ok(outcome_to_js(&outcome)),
            Ok(None) => Ok(JsValue::UNDEFINED),
            Err(e) => {
                log::trace!("message from tab {} dropped: {}", tab_id, e);
                Ok(JsValue::UNDEFINED)
            }
        }
    }

    /// A `chrome.storage.onChanged` payload. Returns whether the filter
    /// configuration changed.
    #[wasm_bindgen(js_name = onSettingsChanged)]
    pub fn on_settings_changed(&self, changes: JsValue) -> Result<bool, JsValue> {
        let changes = flatten_storage_changes(to_map(&changes)?);
        let mut inner = self.inner.try_borrow_mut().map_err(js_error)?;
        Ok(inner.on_settings_changed(&changes).affects_config())
    }

    /// Re-read everything, e.g. after a storage error cleared.
    pub fn reload(&self, settings: JsValue) -> Result<(), JsValue> {
        let store = MemoryStore::with_map(to_map(&settings)?);
        self.inner.try_borrow_mut().map_err(js_error)?.reload(&store);
        Ok(())
    }

    #[wasm_bindgen(js_name = onTabRemoved)]
    pub fn on_tab_removed(&self, tab_id: i32) -> Result<(), JsValue> {
        self.inner.try_borrow_mut().map_err(js_error)?.on_tab_removed(tab_id);
        Ok(())
    }

    /// Whether filtering is currently on.
    #[wasm_bindgen(getter)]
    pub fn enabled(&self) -> bool {
        self.inner
            .try_borrow()
            .map(|inner| inner.config().enabled)
            .unwrap_or(false)
    }
}

fn outcome_to_js(outcome: &NavigationOutcome) -> JsValue {
    let result = js_sys::Object::new();
    let set = |key: &str, value: JsValue| {
        let _ = js_sys::Reflect::set(&result, &key.into(), &value);
    };
    let reason_str = |reason: BlockReason| match serde_json::to_value(reason) {
        Ok(Value::String(s)) => JsValue::from_str(&s),
        _ => JsValue::UNDEFINED,
    };

    match outcome {
        NavigationOutcome::Ignored => set("action", "ignored".into()),
        NavigationOutcome::Allowed => set("action", "allowed".into()),
        NavigationOutcome::Observed { would_block } => {
            set("action", "observed".into());
            if let Some(reason) = would_block {
                set("reason", reason_str(*reason));
            }
        }
        NavigationOutcome::Blocked { reason, target, counted } => {
            set("action", "blocked".into());
            set("reason", reason_str(*reason));
            set("target", JsValue::from_str(target));
            set("counted", JsValue::from(*counted));
        }
    }
    result.into()
}
