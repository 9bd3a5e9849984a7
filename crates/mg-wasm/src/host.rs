//! Host implementations over JS callback objects.
//!
//! The background script passes `{ incrementStats, notify, redirectTab,
//! isAlive? }`; the content script passes `{ send, isAlive? }`. Returned
//! promises are not awaited.

use mg_core::clock::Clock;
use mg_core::error::HostError;
use mg_core::host::{AgentHost, AuthorityHost};
use mg_core::types::{AuthorityMessage, NotifyKind, TabId};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::convert::{error_message, from_json};

/// `Date.now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsClock;

impl Clock for JsClock {
    fn now_ms(&self) -> u64 {
        js_sys::Date::now() as u64
    }
}

/// A bag of named JS functions.
struct Callbacks {
    target: js_sys::Object,
}

impl Callbacks {
    fn new(value: JsValue) -> Result<Self, JsValue> {
        let target = value
            .dyn_into::<js_sys::Object>()
            .map_err(|_| JsValue::from_str("host callbacks must be an object"))?;
        Ok(Self { target })
    }

    fn function(&self, name: &str) -> Option<js_sys::Function> {
        js_sys::Reflect::get(&self.target, &JsValue::from_str(name))
            .ok()
            .and_then(|f| f.dyn_into::<js_sys::Function>().ok())
    }

    fn call(&self, name: &'static str, args: &[JsValue]) -> Result<JsValue, HostError> {
        let function = self
            .function(name)
            .ok_or_else(|| HostError::new(name, "callback missing"))?;
        let args: js_sys::Array = args.iter().collect();
        function
            .apply(&self.target, &args)
            .map_err(|e| HostError::new(name, error_message(&e)))
    }

    /// `isAlive()` if provided. A throwing check means the context is gone.
    fn is_alive(&self) -> bool {
        match self.function("isAlive") {
            Some(check) => check
                .call0(&self.target)
                .map(|v| v.as_bool().unwrap_or(true))
                .unwrap_or(false),
            None => true,
        }
    }
}

pub struct JsAuthorityHost {
    callbacks: Callbacks,
}

impl JsAuthorityHost {
    pub fn new(callbacks: JsValue) -> Result<Self, JsValue> {
        Ok(Self {
            callbacks: Callbacks::new(callbacks)?,
        })
    }
}

impl AuthorityHost for JsAuthorityHost {
    fn is_alive(&self) -> bool {
        self.callbacks.is_alive()
    }

    fn increment_stats(&self, count: u32) -> Result<(), HostError> {
        self.callbacks
            .call("incrementStats", &[JsValue::from(count)])
            .map(drop)
    }

    fn notify(&self, kind: NotifyKind) -> Result<(), HostError> {
        let payload = serde_json::to_value(kind)
            .map_err(|e| HostError::new("notify", e.to_string()))
            .and_then(|v| from_json(&v).map_err(|e| HostError::new("notify", error_message(&e))))?;
        self.callbacks.call("notify", &[payload]).map(drop)
    }

    fn redirect_tab(&self, tab_id: TabId, url: &str) -> Result<(), HostError> {
        self.callbacks
            .call("redirectTab", &[JsValue::from(tab_id), JsValue::from_str(url)])
            .map(drop)
    }
}

pub struct JsAgentHost {
    callbacks: Callbacks,
}

impl JsAgentHost {
    pub fn new(callbacks: JsValue) -> Result<Self, JsValue> {
        Ok(Self {
            callbacks: Callbacks::new(callbacks)?,
        })
    }
}

impl AgentHost for JsAgentHost {
    fn is_alive(&self) -> bool {
        self.callbacks.is_alive()
    }

    fn send_to_authority(&self, message: &AuthorityMessage) -> Result<(), HostError> {
        let payload = serde_json::to_value(message)
            .map_err(|e| HostError::new("send", e.to_string()))
            .and_then(|v| from_json(&v).map_err(|e| HostError::new("send", error_message(&e))))?;
        self.callbacks.call("send", &[payload]).map(drop)
    }
}
