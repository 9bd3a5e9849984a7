//! Page DOM abstraction
//!
//! The page agent never touches a browser API directly. Everything it needs
//! from the page goes through [`Dom`], implemented over `web-sys` in the wasm
//! bindings and over an in-memory tree in tests.

pub mod adapter;
pub mod scanner;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod memory;

use crate::error::DomError;

pub use adapter::{SelectorAdapter, SiteAdapter, SiteAdapterConfig};
pub use scanner::{ScanReport, Scanner};
pub use scheduler::{AgentTiming, ScanKind, ScanScheduler};

/// Per-element "already handled" markers.
///
/// Implementations must not keep removed elements alive and must not carry
/// markers across a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Hidden because its text, href or title matched.
    Hidden,
    /// Input listeners attached.
    InputAttached,
    /// Value reads/writes intercepted by a site adapter.
    ValueGuarded,
}

impl Marker {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hidden => "hidden",
            Self::InputAttached => "input",
            Self::ValueGuarded => "guarded",
        }
    }
}

/// Events re-dispatched after a field value is rewritten.
pub const REWRITE_EVENTS: [&str; 2] = ["input", "change"];

/// The page, as the agent sees it.
///
/// Caret positions are UTF-16 code unit offsets, the unit the browser
/// reports them in.
pub trait Dom {
    /// Element or text node handle.
    type Node: Clone;

    /// The document element.
    fn root(&self) -> Self::Node;

    /// The page's current URL.
    fn location(&self) -> String;

    /// Whether `node` is still attached to the document.
    fn is_connected(&self, node: &Self::Node) -> bool;

    /// Text nodes under `root` (including `root` itself if it is one),
    /// skipping script, style and editable content.
    fn text_nodes(&self, root: &Self::Node) -> Vec<Self::Node>;

    /// Content of a text node.
    fn text(&self, node: &Self::Node) -> Option<String>;

    fn set_text(&self, node: &Self::Node, text: &str) -> Result<(), DomError>;

    /// Links and buttons under `root` (including `root`).
    fn interactive_elements(&self, root: &Self::Node) -> Vec<Self::Node>;

    /// Text-entry elements under `root` (including `root`): input, textarea,
    /// contenteditable and `role=textbox|searchbox`.
    fn text_entries(&self, root: &Self::Node) -> Vec<Self::Node>;

    /// Elements under the document matching a CSS selector.
    fn query_all(&self, selector: &str) -> Result<Vec<Self::Node>, DomError>;

    /// Concatenated descendant text of an element.
    fn element_text(&self, element: &Self::Node) -> String;

    fn attribute(&self, element: &Self::Node, name: &str) -> Option<String>;

    /// Hide an element without removing it.
    fn hide(&self, element: &Self::Node) -> Result<(), DomError>;

    /// Detach an element from the document.
    fn remove(&self, element: &Self::Node) -> Result<(), DomError>;

    /// Current value of a text-entry element.
    fn field_value(&self, element: &Self::Node) -> Option<String>;

    fn set_field_value(&self, element: &Self::Node, value: &str) -> Result<(), DomError>;

    fn caret(&self, element: &Self::Node) -> Option<usize>;

    fn set_caret(&self, element: &Self::Node, position: usize) -> Result<(), DomError>;

    /// Fire a bubbling event of the given type on the element.
    fn dispatch(&self, element: &Self::Node, event: &str) -> Result<(), DomError>;

    /// Attach the input/change/paste listeners that route back to
    /// `PageAgent::on_field_input`.
    fn attach_input_listener(&self, element: &Self::Node) -> Result<(), DomError>;

    /// Intercept reads and writes of the element's value so the page's own
    /// scripts only ever see scrubbed content.
    fn guard_value(&self, element: &Self::Node) -> Result<(), DomError>;

    fn is_marked(&self, element: &Self::Node, marker: Marker) -> bool;

    fn mark(&self, element: &Self::Node, marker: Marker);
}

/// UTF-16 length of `s`, the unit of [`Dom::caret`].
pub fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Caret position after a value rewrite: shifted by the length delta and
/// clamped to the new value.
pub fn adjust_caret(caret: usize, old_value: &str, new_value: &str) -> usize {
    let old_len = utf16_len(old_value) as i64;
    let new_len = utf16_len(new_value) as i64;
    let shifted = caret as i64 + (new_len - old_len);
    shifted.clamp(0, new_len) as usize
}
