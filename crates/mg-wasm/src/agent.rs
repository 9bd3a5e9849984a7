//! JS-facing page agent (content script).
//!
//! Owns the mutation observer, the navigation listeners and a single
//! re-armed timeout. Every entry point borrows the agent with
//! `try_borrow_mut`: events we trigger ourselves (the `input` events fired
//! after a rewrite, guarded value writes) arrive while the agent is busy and
//! are dropped.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use mg_core::config::Environment;
use mg_core::dom::adapter::{selector_adapters, SiteAdapterConfig};
use mg_core::dom::ScanReport;
use mg_core::settings::{MemoryStore, SettingsCache};
use mg_core::PageAgent as CoreAgent;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Event, MutationObserver, MutationObserverInit, MutationRecord, Node, Window};

use crate::convert::{error_message, flatten_storage_changes, js_error, to_map};
use crate::dom::{FieldHook, WebDom};
use crate::host::{JsAgentHost, JsClock};

/// Window events that may mean the page URL changed.
const NAVIGATION_EVENTS: [&str; 3] = ["popstate", "hashchange", "focus"];

struct Shared {
    agent: RefCell<CoreAgent<WebDom>>,
    settings: SettingsCache,
    window: Window,
    timer: Cell<Option<i32>>,
    tick: RefCell<Option<Closure<dyn FnMut()>>>,
    observer: RefCell<Option<(MutationObserver, Closure<dyn FnMut(js_sys::Array)>)>>,
    navigation: RefCell<Option<Closure<dyn FnMut(Event)>>>,
}

#[wasm_bindgen]
pub struct PageAgent {
    shared: Rc<Shared>,
}

#[wasm_bindgen]
impl PageAgent {
    /// `settings` is the full `chrome.storage` contents, `host` is
    /// `{ send, isAlive? }` and `adapters` an optional list of site adapter
    /// configs (the built-in search engine adapters when omitted).
    #[wasm_bindgen(constructor)]
    pub fn new(settings: JsValue, extension_origin: String, host: JsValue, adapters: JsValue) -> Result<PageAgent, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let store = MemoryStore::with_map(to_map(&settings)?);
        let settings = SettingsCache::cold_start(&store, Environment::new(extension_origin));
        let host = JsAgentHost::new(host)?;
        let adapter_configs = if adapters.is_undefined() || adapters.is_null() {
            SiteAdapterConfig::defaults()
        } else {
            let json = String::from(js_sys::JSON::stringify(&adapters)?);
            SiteAdapterConfig::parse_list(&json).map_err(js_error)?
        };

        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("window has no document"))?;

        let shared = Rc::new_cyclic(|weak: &Weak<Shared>| {
            let hook_target = weak.clone();
            let on_field: FieldHook = Rc::new(move |node: &Node| {
                if let Some(shared) = hook_target.upgrade() {
                    if let Ok(mut agent) = shared.agent.try_borrow_mut() {
                        agent.on_field_input(node);
                    }
                }
            });
            let dom = WebDom::new(window.clone(), document, on_field);
            let agent = CoreAgent::new(dom, settings.config(), Box::new(host), Box::new(JsClock))
                .with_adapters(selector_adapters(adapter_configs));
            Shared {
                agent: RefCell::new(agent),
                settings,
                window,
                timer: Cell::new(None),
                tick: RefCell::new(None),
                observer: RefCell::new(None),
                navigation: RefCell::new(None),
            }
        });
        Ok(Self { shared })
    }

    /// Observe the page and run the immediate scan.
    pub fn start(&self) -> Result<JsValue, JsValue> {
        let shared = &self.shared;
        install_tick(shared);
        install_observer(shared)?;
        install_navigation_listeners(shared)?;

        let report = shared
            .agent
            .try_borrow_mut()
            .map_err(js_error)?
            .on_injected();
        rearm(shared);
        Ok(report.map(report_to_js).unwrap_or(JsValue::UNDEFINED))
    }

    /// Disconnect the observer and cancel the timer.
    pub fn stop(&self) {
        let shared = &self.shared;
        if let Some((observer, _)) = shared.observer.borrow_mut().take() {
            observer.disconnect();
        }
        if let Some(handle) = shared.timer.take() {
            shared.window.clear_timeout_with_handle(handle);
        }
        if let Some(listener) = shared.navigation.borrow_mut().take() {
            for event in NAVIGATION_EVENTS {
                let _ = shared
                    .window
                    .remove_event_listener_with_callback(event, listener.as_ref().unchecked_ref());
            }
        }
        shared.tick.borrow_mut().take();
    }

    /// A `chrome.storage.onChanged` payload.
    #[wasm_bindgen(js_name = onSettingsChanged)]
    pub fn on_settings_changed(&self, changes: JsValue) -> Result<(), JsValue> {
        let shared = &self.shared;
        let changes = flatten_storage_changes(to_map(&changes)?);
        if !shared.settings.apply_changes(&changes).affects_config() {
            return Ok(());
        }
        shared
            .agent
            .try_borrow_mut()
            .map_err(js_error)?
            .on_config_changed(shared.settings.config());
        rearm(shared);
        Ok(())
    }

    /// Occurrences scrubbed on this page so far.
    #[wasm_bindgen(getter, js_name = filteredTotal)]
    pub fn filtered_total(&self) -> u32 {
        self.shared
            .agent
            .try_borrow()
            .map(|agent| agent.filtered_total())
            .unwrap_or(0)
    }

    #[wasm_bindgen(getter)]
    pub fn adapter(&self) -> Option<String> {
        let agent = self.shared.agent.try_borrow().ok()?;
        agent.adapter_name().map(str::to_string)
    }
}

fn install_tick(shared: &Rc<Shared>) {
    let weak = Rc::downgrade(shared);
    let tick = Closure::<dyn FnMut()>::new(move || {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        shared.timer.set(None);
        if let Ok(mut agent) = shared.agent.try_borrow_mut() {
            agent.on_tick();
        }
        rearm(&shared);
    });
    *shared.tick.borrow_mut() = Some(tick);
}

fn install_observer(shared: &Rc<Shared>) -> Result<(), JsValue> {
    let weak = Rc::downgrade(shared);
    let callback = Closure::<dyn FnMut(js_sys::Array)>::new(move |records: js_sys::Array| {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        let mut added = Vec::new();
        for record in records.iter() {
            let Ok(record) = record.dyn_into::<MutationRecord>() else {
                continue;
            };
            let list = record.added_nodes();
            added.extend((0..list.length()).filter_map(|i| list.get(i)));
        }
        if added.is_empty() {
            return;
        }
        if let Ok(mut agent) = shared.agent.try_borrow_mut() {
            agent.on_mutations(added);
        }
        rearm(&shared);
    });

    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_subtree(true);
    let root = shared.agent.try_borrow().map_err(js_error)?.dom().document().clone();
    observer.observe_with_options(&root, &init)?;
    *shared.observer.borrow_mut() = Some((observer, callback));
    Ok(())
}

fn install_navigation_listeners(shared: &Rc<Shared>) -> Result<(), JsValue> {
    let weak = Rc::downgrade(shared);
    let listener = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        if let Ok(mut agent) = shared.agent.try_borrow_mut() {
            agent.on_navigation_signal();
        };
    });
    for event in NAVIGATION_EVENTS {
        shared
            .window
            .add_event_listener_with_callback(event, listener.as_ref().unchecked_ref())?;
    }
    *shared.navigation.borrow_mut() = Some(listener);
    Ok(())
}

/// Point the single timeout at the agent's next deadline.
fn rearm(shared: &Rc<Shared>) {
    if let Some(handle) = shared.timer.take() {
        shared.window.clear_timeout_with_handle(handle);
    }
    let Ok(agent) = shared.agent.try_borrow() else {
        return;
    };
    let Some(deadline) = agent.next_deadline() else {
        return;
    };
    drop(agent);

    let tick = shared.tick.borrow();
    let Some(tick) = tick.as_ref() else {
        return;
    };
    let now = js_sys::Date::now() as u64;
    let delay = i32::try_from(deadline.saturating_sub(now)).unwrap_or(i32::MAX);
    match shared
        .window
        .set_timeout_with_callback_and_timeout_and_arguments_0(tick.as_ref().unchecked_ref(), delay)
    {
        Ok(handle) => shared.timer.set(Some(handle)),
        Err(e) => log::warn!("scan timer not armed: {}", error_message(&e)),
    }
}

fn report_to_js(report: ScanReport) -> JsValue {
    let result = js_sys::Object::new();
    let fields = [
        ("textNodes", report.text_nodes),
        ("rewritten", report.rewritten),
        ("matches", report.matches),
        ("hidden", report.hidden),
        ("inputsAttached", report.inputs_attached),
        ("errors", report.errors),
    ];
    for (key, value) in fields {
        let _ = js_sys::Reflect::set(&result, &key.into(), &JsValue::from(value as u32));
    }
    result.into()
}
