//! `Dom` over `web-sys`.
//!
//! Markers live in one `WeakSet` per marker kind, so removed elements are
//! never kept alive and a new page starts with no markers.

use std::rc::Rc;

use mg_core::dom::{Dom, Marker};
use mg_core::error::DomError;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, EventInit, HtmlElement, HtmlInputElement, HtmlTextAreaElement, Node, NodeList, Window};

use crate::convert::error_message;

/// `NodeFilter.SHOW_TEXT`.
const SHOW_TEXT: u32 = 0x4;

const TEXT_NODE: u16 = 3;

/// Containers whose text is never scrubbed.
const SKIPPED_TEXT_PARENTS: &str =
    "script, style, noscript, textarea, [contenteditable]:not([contenteditable=false])";

const INTERACTIVE: &str = "a, button, [role=button]";

const TEXT_ENTRIES: &str = "textarea, input:not([type]), input[type=text], input[type=search], \
    input[type=email], input[type=url], [contenteditable]:not([contenteditable=false]), \
    [role=textbox], [role=searchbox]";

const INPUT_EVENTS: [&str; 3] = ["input", "change", "paste"];

/// Installs an own `value` accessor that forwards to the native one and
/// reports every write.
const GUARD_ARGS: &str = "element, notify";
const GUARD_BODY: &str = "
    let proto = Object.getPrototypeOf(element);
    let native = null;
    while (proto && !native) {
        native = Object.getOwnPropertyDescriptor(proto, 'value');
        proto = Object.getPrototypeOf(proto);
    }
    if (!native || !native.get || !native.set) {
        throw new Error('value is not an accessor');
    }
    Object.defineProperty(element, 'value', {
        configurable: true,
        get() { return native.get.call(this); },
        set(v) { native.set.call(this, v); notify(this); },
    });
";

/// Called with a text-entry element whose value may have changed.
pub type FieldHook = Rc<dyn Fn(&Node)>;

pub struct WebDom {
    window: Window,
    document: Document,
    markers: [js_sys::WeakSet; 3],
    input_listener: Closure<dyn FnMut(Event)>,
    guard_notify: Closure<dyn FnMut(JsValue)>,
    guard_installer: js_sys::Function,
}

impl WebDom {
    pub fn new(window: Window, document: Document, on_field: FieldHook) -> Self {
        let listener_hook = Rc::clone(&on_field);
        let listener_window = window.clone();
        let input_listener = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let Some(node) = event.target().and_then(|t| t.dyn_into::<Node>().ok()) else {
                return;
            };
            if event.type_() == "paste" {
                // Pasted text lands after the event
                let hook = Rc::clone(&listener_hook);
                let deferred = Closure::once_into_js(move || hook(&node));
                if let Err(e) = listener_window
                    .set_timeout_with_callback_and_timeout_and_arguments_0(deferred.unchecked_ref(), 0)
                {
                    log::debug!("paste follow-up not scheduled: {}", error_message(&e));
                }
            } else {
                listener_hook(&node);
            }
        });

        let guard_hook = on_field;
        let guard_notify = Closure::<dyn FnMut(JsValue)>::new(move |target: JsValue| {
            if let Ok(node) = target.dyn_into::<Node>() {
                guard_hook(&node);
            }
        });

        Self {
            window,
            document,
            markers: [js_sys::WeakSet::new(), js_sys::WeakSet::new(), js_sys::WeakSet::new()],
            input_listener,
            guard_notify,
            guard_installer: js_sys::Function::new_with_args(GUARD_ARGS, GUARD_BODY),
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn marker_set(&self, marker: Marker) -> &js_sys::WeakSet {
        let slot = match marker {
            Marker::Hidden => 0,
            Marker::InputAttached => 1,
            Marker::ValueGuarded => 2,
        };
        &self.markers[slot]
    }

    /// `root` itself if it matches, then its matching descendants.
    fn select_inclusive(&self, root: &Node, selector: &str) -> Vec<Node> {
        let Some(element) = root.dyn_ref::<Element>() else {
            return Vec::new();
        };
        let mut out = Vec::new();
        if element.matches(selector).unwrap_or(false) {
            out.push(root.clone());
        }
        match element.query_selector_all(selector) {
            Ok(list) => out.extend(nodes(&list)),
            Err(e) => log::debug!("querySelectorAll failed: {}", error_message(&e)),
        }
        out
    }
}

fn nodes(list: &NodeList) -> Vec<Node> {
    (0..list.length()).filter_map(|i| list.get(i)).collect()
}

fn op_error(op: &'static str, e: JsValue) -> DomError {
    DomError::op(op, error_message(&e))
}

fn is_skipped_text(node: &Node) -> bool {
    match node.parent_element() {
        Some(parent) => parent.closest(SKIPPED_TEXT_PARENTS).ok().flatten().is_some(),
        None => false,
    }
}

impl Dom for WebDom {
    type Node = Node;

    fn root(&self) -> Node {
        match self.document.document_element() {
            Some(element) => element.into(),
            None => self.document.clone().into(),
        }
    }

    fn location(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }

    fn is_connected(&self, node: &Node) -> bool {
        node.is_connected()
    }

    fn text_nodes(&self, root: &Node) -> Vec<Node> {
        if root.node_type() == TEXT_NODE {
            return if is_skipped_text(root) { Vec::new() } else { vec![root.clone()] };
        }
        let walker = match self.document.create_tree_walker_with_what_to_show(root, SHOW_TEXT) {
            Ok(walker) => walker,
            Err(e) => {
                log::debug!("tree walker unavailable: {}", error_message(&e));
                return Vec::new();
            }
        };
        let mut out = Vec::new();
        while let Ok(Some(node)) = walker.next_node() {
            if !is_skipped_text(&node) {
                out.push(node);
            }
        }
        out
    }

    fn text(&self, node: &Node) -> Option<String> {
        if node.node_type() == TEXT_NODE {
            node.node_value()
        } else {
            None
        }
    }

    fn set_text(&self, node: &Node, text: &str) -> Result<(), DomError> {
        if !node.is_connected() {
            return Err(DomError::Detached);
        }
        node.set_node_value(Some(text));
        Ok(())
    }

    fn interactive_elements(&self, root: &Node) -> Vec<Node> {
        self.select_inclusive(root, INTERACTIVE)
    }

    fn text_entries(&self, root: &Node) -> Vec<Node> {
        self.select_inclusive(root, TEXT_ENTRIES)
    }

    fn query_all(&self, selector: &str) -> Result<Vec<Node>, DomError> {
        self.document
            .query_selector_all(selector)
            .map(|list| nodes(&list))
            .map_err(|e| op_error("querySelectorAll", e))
    }

    fn element_text(&self, element: &Node) -> String {
        element.text_content().unwrap_or_default()
    }

    fn attribute(&self, element: &Node, name: &str) -> Option<String> {
        element.dyn_ref::<Element>()?.get_attribute(name)
    }

    fn hide(&self, element: &Node) -> Result<(), DomError> {
        let element = element
            .dyn_ref::<HtmlElement>()
            .ok_or_else(|| DomError::op("hide", "not an html element"))?;
        element
            .style()
            .set_property("display", "none")
            .map_err(|e| op_error("hide", e))
    }

    fn remove(&self, element: &Node) -> Result<(), DomError> {
        if let Some(element) = element.dyn_ref::<Element>() {
            element.remove();
            return Ok(());
        }
        match element.parent_node() {
            Some(parent) => parent.remove_child(element).map(drop).map_err(|e| op_error("remove", e)),
            None => Err(DomError::Detached),
        }
    }

    fn field_value(&self, element: &Node) -> Option<String> {
        if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
            return Some(input.value());
        }
        if let Some(area) = element.dyn_ref::<HtmlTextAreaElement>() {
            return Some(area.value());
        }
        element.text_content()
    }

    fn set_field_value(&self, element: &Node, value: &str) -> Result<(), DomError> {
        if !element.is_connected() {
            return Err(DomError::Detached);
        }
        if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
            input.set_value(value);
        } else if let Some(area) = element.dyn_ref::<HtmlTextAreaElement>() {
            area.set_value(value);
        } else {
            element.set_text_content(Some(value));
        }
        Ok(())
    }

    fn caret(&self, element: &Node) -> Option<usize> {
        let start = if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
            input.selection_start()
        } else if let Some(area) = element.dyn_ref::<HtmlTextAreaElement>() {
            area.selection_start()
        } else {
            return None;
        };
        // Inputs without selection support (email) throw here
        start.ok().flatten().map(|p| p as usize)
    }

    fn set_caret(&self, element: &Node, position: usize) -> Result<(), DomError> {
        let position = u32::try_from(position).unwrap_or(u32::MAX);
        let result = if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
            input.set_selection_range(position, position)
        } else if let Some(area) = element.dyn_ref::<HtmlTextAreaElement>() {
            area.set_selection_range(position, position)
        } else {
            return Ok(());
        };
        result.map_err(|e| op_error("setSelectionRange", e))
    }

    fn dispatch(&self, element: &Node, event: &str) -> Result<(), DomError> {
        let init = EventInit::new();
        init.set_bubbles(true);
        let event = Event::new_with_event_init_dict(event, &init).map_err(|e| op_error("new Event", e))?;
        element
            .dispatch_event(&event)
            .map(drop)
            .map_err(|e| op_error("dispatchEvent", e))
    }

    fn attach_input_listener(&self, element: &Node) -> Result<(), DomError> {
        for event in INPUT_EVENTS {
            element
                .add_event_listener_with_callback(event, self.input_listener.as_ref().unchecked_ref())
                .map_err(|e| op_error("addEventListener", e))?;
        }
        Ok(())
    }

    fn guard_value(&self, element: &Node) -> Result<(), DomError> {
        self.guard_installer
            .call2(&JsValue::NULL, element, self.guard_notify.as_ref())
            .map(drop)
            .map_err(|e| op_error("guardValue", e))
    }

    fn is_marked(&self, element: &Node, marker: Marker) -> bool {
        self.marker_set(marker).has(element.unchecked_ref())
    }

    fn mark(&self, element: &Node, marker: Marker) {
        self.marker_set(marker).add(element.unchecked_ref());
    }
}
