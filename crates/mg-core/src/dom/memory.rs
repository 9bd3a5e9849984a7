//! In-memory DOM for tests.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use super::{Dom, Marker};
use crate::error::DomError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

#[derive(Debug)]
enum NodeData {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        value: Option<String>,
        caret: Option<usize>,
    },
    Text(String),
}

#[derive(Debug)]
struct Entry {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    hidden: bool,
}

/// A tree of elements and text nodes with a document root at id 0.
#[derive(Debug)]
pub(crate) struct MemoryDom {
    nodes: RefCell<Vec<Entry>>,
    markers: RefCell<HashSet<(NodeId, Marker)>>,
    location: RefCell<String>,
    events: RefCell<Vec<(NodeId, String)>>,
    broken: RefCell<HashSet<NodeId>>,
    text_writes: Cell<usize>,
}

const ROOT: NodeId = NodeId(0);

impl MemoryDom {
    pub fn new(location: &str) -> Self {
        let root = Entry {
            data: NodeData::Element {
                tag: "html".to_string(),
                attrs: Vec::new(),
                value: None,
                caret: None,
            },
            parent: None,
            children: Vec::new(),
            hidden: false,
        };
        Self {
            nodes: RefCell::new(vec![root]),
            markers: RefCell::default(),
            location: RefCell::new(location.to_string()),
            events: RefCell::default(),
            broken: RefCell::default(),
            text_writes: Cell::new(0),
        }
    }

    pub fn body(&self) -> NodeId {
        ROOT
    }

    pub fn element(&self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        self.push(
            parent,
            NodeData::Element {
                tag: tag.to_string(),
                attrs: attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                value: None,
                caret: None,
            },
        )
    }

    pub fn text(&self, parent: NodeId, text: &str) -> NodeId {
        self.push(parent, NodeData::Text(text.to_string()))
    }

    /// An `<input>` holding `value` with the caret at its end.
    pub fn input(&self, parent: NodeId, attrs: &[(&str, &str)], value: &str) -> NodeId {
        let id = self.element(parent, "input", attrs);
        if let NodeData::Element { value: v, caret, .. } = &mut self.nodes.borrow_mut()[id.0].data {
            *v = Some(value.to_string());
            *caret = Some(value.encode_utf16().count());
        }
        id
    }

    pub fn set_location(&self, url: &str) {
        *self.location.borrow_mut() = url.to_string();
    }

    /// Make every mutating call on `id` fail.
    pub fn break_node(&self, id: NodeId) {
        self.broken.borrow_mut().insert(id);
    }

    pub fn text_content(&self, id: NodeId) -> String {
        self.collect_text(id)
    }

    pub fn is_hidden(&self, id: NodeId) -> bool {
        self.nodes.borrow()[id.0].hidden
    }

    pub fn value(&self, id: NodeId) -> Option<String> {
        self.field_value(&id)
    }

    pub fn set_value(&self, id: NodeId, value: &str, caret: usize) {
        if let NodeData::Element { value: v, caret: c, .. } = &mut self.nodes.borrow_mut()[id.0].data {
            *v = Some(value.to_string());
            *c = Some(caret);
        }
    }

    pub fn events(&self) -> Vec<(NodeId, String)> {
        self.events.borrow().clone()
    }

    pub fn text_writes(&self) -> usize {
        self.text_writes.get()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.borrow().len()
    }

    fn push(&self, parent: NodeId, data: NodeData) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        let id = NodeId(nodes.len());
        nodes.push(Entry {
            data,
            parent: Some(parent),
            children: Vec::new(),
            hidden: false,
        });
        nodes[parent.0].children.push(id);
        id
    }

    fn check(&self, id: NodeId, op: &'static str) -> Result<(), DomError> {
        if self.broken.borrow().contains(&id) {
            return Err(DomError::op(op, "element refused the operation"));
        }
        if !self.is_connected(&id) {
            return Err(DomError::Detached);
        }
        Ok(())
    }

    fn tag(&self, id: NodeId) -> Option<String> {
        match &self.nodes.borrow()[id.0].data {
            NodeData::Element { tag, .. } => Some(tag.clone()),
            NodeData::Text(_) => None,
        }
    }

    fn attr(&self, id: NodeId, name: &str) -> Option<String> {
        match &self.nodes.borrow()[id.0].data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()),
            NodeData::Text(_) => None,
        }
    }

    fn is_editable(&self, id: NodeId) -> bool {
        self.attr(id, "contenteditable").map_or(false, |v| v != "false")
    }

    fn descendants_inclusive(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            let nodes = self.nodes.borrow();
            stack.extend(nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    fn collect_text(&self, id: NodeId) -> String {
        let nodes = self.nodes.borrow();
        self.descendants_inclusive(id)
            .into_iter()
            .filter_map(|n| match &nodes[n.0].data {
                NodeData::Text(t) => Some(t.as_str()),
                NodeData::Element { .. } => None,
            })
            .collect()
    }

    fn purge_markers(&self, root: NodeId) {
        let removed: HashSet<NodeId> = self.descendants_inclusive(root).into_iter().collect();
        self.markers.borrow_mut().retain(|(id, _)| !removed.contains(id));
    }

    fn matches_selector(&self, id: NodeId, selector: &str) -> bool {
        let mut parts: Vec<&str> = selector.split_whitespace().collect();
        let Some(last) = parts.pop() else {
            return false;
        };
        if !self.matches_compound(id, last) {
            return false;
        }
        let mut cursor = self.nodes.borrow()[id.0].parent;
        while let Some(part) = parts.last() {
            match cursor {
                Some(ancestor) => {
                    if self.matches_compound(ancestor, part) {
                        parts.pop();
                    }
                    cursor = self.nodes.borrow()[ancestor.0].parent;
                }
                None => return false,
            }
        }
        true
    }

    /// `tag#id.class[attr=value]`, each part optional.
    fn matches_compound(&self, id: NodeId, compound: &str) -> bool {
        let Some(tag) = self.tag(id) else {
            return false;
        };
        let mut rest = compound;

        let tag_end = rest.find(|c| matches!(c, '#' | '.' | '[')).unwrap_or(rest.len());
        let wanted_tag = &rest[..tag_end];
        if !wanted_tag.is_empty() && wanted_tag != "*" && !wanted_tag.eq_ignore_ascii_case(&tag) {
            return false;
        }
        rest = &rest[tag_end..];

        while !rest.is_empty() {
            if let Some(attr) = rest.strip_prefix('[') {
                let Some(close) = attr.find(']') else {
                    return false;
                };
                let body = &attr[..close];
                let ok = match body.split_once('=') {
                    Some((name, value)) => {
                        let value = value.trim_matches(|c| c == '"' || c == '\'');
                        self.attr(id, name).as_deref() == Some(value)
                    }
                    None => self.attr(id, body).is_some(),
                };
                if !ok {
                    return false;
                }
                rest = &attr[close + 1..];
            } else {
                let sigil = &rest[..1];
                let body = &rest[1..];
                let end = body.find(|c| matches!(c, '#' | '.' | '[')).unwrap_or(body.len());
                let name = &body[..end];
                let ok = match sigil {
                    "#" => self.attr(id, "id").as_deref() == Some(name),
                    "." => self
                        .attr(id, "class")
                        .map_or(false, |c| c.split_whitespace().any(|x| x == name)),
                    _ => false,
                };
                if !ok {
                    return false;
                }
                rest = &body[end..];
            }
        }
        true
    }
}

impl Dom for MemoryDom {
    type Node = NodeId;

    fn root(&self) -> NodeId {
        ROOT
    }

    fn location(&self) -> String {
        self.location.borrow().clone()
    }

    fn is_connected(&self, node: &NodeId) -> bool {
        let nodes = self.nodes.borrow();
        let mut cursor = *node;
        loop {
            if cursor == ROOT {
                return true;
            }
            match nodes[cursor.0].parent {
                Some(parent) => cursor = parent,
                None => return false,
            }
        }
    }

    fn text_nodes(&self, root: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![*root];
        while let Some(id) = stack.pop() {
            match self.tag(id) {
                None => out.push(id),
                Some(tag) => {
                    let skip = matches!(tag.as_str(), "script" | "style" | "noscript" | "textarea" | "input")
                        || self.is_editable(id);
                    if !skip {
                        stack.extend(self.nodes.borrow()[id.0].children.iter().rev().copied());
                    }
                }
            }
        }
        out
    }

    fn text(&self, node: &NodeId) -> Option<String> {
        match &self.nodes.borrow()[node.0].data {
            NodeData::Text(t) => Some(t.clone()),
            NodeData::Element { .. } => None,
        }
    }

    fn set_text(&self, node: &NodeId, text: &str) -> Result<(), DomError> {
        self.check(*node, "setText")?;
        if let NodeData::Text(t) = &mut self.nodes.borrow_mut()[node.0].data {
            *t = text.to_string();
        }
        self.text_writes.set(self.text_writes.get() + 1);
        Ok(())
    }

    fn interactive_elements(&self, root: &NodeId) -> Vec<NodeId> {
        self.descendants_inclusive(*root)
            .into_iter()
            .filter(|&id| match self.tag(id) {
                Some(tag) => tag == "a" || tag == "button" || self.attr(id, "role").as_deref() == Some("button"),
                None => false,
            })
            .collect()
    }

    fn text_entries(&self, root: &NodeId) -> Vec<NodeId> {
        self.descendants_inclusive(*root)
            .into_iter()
            .filter(|&id| match self.tag(id) {
                Some(tag) => {
                    let role = self.attr(id, "role");
                    tag == "textarea"
                        || (tag == "input"
                            && matches!(
                                self.attr(id, "type").as_deref(),
                                None | Some("text") | Some("search") | Some("email") | Some("url")
                            ))
                        || self.is_editable(id)
                        || matches!(role.as_deref(), Some("textbox") | Some("searchbox"))
                }
                None => false,
            })
            .collect()
    }

    fn query_all(&self, selector: &str) -> Result<Vec<NodeId>, DomError> {
        if selector.trim().is_empty() {
            return Err(DomError::op("querySelectorAll", "empty selector"));
        }
        let alternatives: Vec<&str> = selector.split(',').map(str::trim).collect();
        Ok(self
            .descendants_inclusive(ROOT)
            .into_iter()
            .filter(|&id| alternatives.iter().any(|sel| self.matches_selector(id, sel)))
            .collect())
    }

    fn element_text(&self, element: &NodeId) -> String {
        self.collect_text(*element)
    }

    fn attribute(&self, element: &NodeId, name: &str) -> Option<String> {
        self.attr(*element, name)
    }

    fn hide(&self, element: &NodeId) -> Result<(), DomError> {
        self.check(*element, "hide")?;
        self.nodes.borrow_mut()[element.0].hidden = true;
        Ok(())
    }

    fn remove(&self, element: &NodeId) -> Result<(), DomError> {
        self.check(*element, "remove")?;
        {
            let mut nodes = self.nodes.borrow_mut();
            if let Some(parent) = nodes[element.0].parent.take() {
                nodes[parent.0].children.retain(|c| c != element);
            }
        }
        self.purge_markers(*element);
        Ok(())
    }

    fn field_value(&self, element: &NodeId) -> Option<String> {
        let value = match &self.nodes.borrow()[element.0].data {
            NodeData::Element { value, .. } => value.clone(),
            NodeData::Text(_) => return None,
        };
        value.or_else(|| self.is_editable(*element).then(|| self.collect_text(*element)))
    }

    fn set_field_value(&self, element: &NodeId, value: &str) -> Result<(), DomError> {
        self.check(*element, "setValue")?;
        if let NodeData::Element { value: v, .. } = &mut self.nodes.borrow_mut()[element.0].data {
            *v = Some(value.to_string());
        }
        Ok(())
    }

    fn caret(&self, element: &NodeId) -> Option<usize> {
        match &self.nodes.borrow()[element.0].data {
            NodeData::Element { caret, .. } => *caret,
            NodeData::Text(_) => None,
        }
    }

    fn set_caret(&self, element: &NodeId, position: usize) -> Result<(), DomError> {
        self.check(*element, "setSelectionRange")?;
        if let NodeData::Element { caret, .. } = &mut self.nodes.borrow_mut()[element.0].data {
            *caret = Some(position);
        }
        Ok(())
    }

    fn dispatch(&self, element: &NodeId, event: &str) -> Result<(), DomError> {
        self.check(*element, "dispatchEvent")?;
        self.events.borrow_mut().push((*element, event.to_string()));
        Ok(())
    }

    fn attach_input_listener(&self, element: &NodeId) -> Result<(), DomError> {
        self.check(*element, "addEventListener")
    }

    fn guard_value(&self, element: &NodeId) -> Result<(), DomError> {
        self.check(*element, "defineProperty")
    }

    fn is_marked(&self, element: &NodeId, marker: Marker) -> bool {
        self.markers.borrow().contains(&(*element, marker))
    }

    fn mark(&self, element: &NodeId, marker: Marker) {
        self.markers.borrow_mut().insert((*element, marker));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_queries() {
        let dom = MemoryDom::new("https://a.test/");
        let div = dom.element(dom.body(), "div", &[("class", "box results")]);
        dom.text(div, "hello ");
        let link = dom.element(div, "a", &[("href", "/x")]);
        dom.text(link, "world");
        let script = dom.element(div, "script", &[]);
        dom.text(script, "var x;");

        assert_eq!(dom.text_nodes(&dom.root()).len(), 2);
        assert_eq!(dom.element_text(&div), "hello worldvar x;");
        assert_eq!(dom.interactive_elements(&dom.root()), vec![link]);
        assert_eq!(dom.query_all("div.results a").unwrap(), vec![link]);
        assert_eq!(dom.query_all("a[href=/x], span").unwrap(), vec![link]);
        assert!(dom.query_all("section a").unwrap().is_empty());
    }

    #[test]
    fn test_remove_detaches_and_purges_markers() {
        let dom = MemoryDom::new("https://a.test/");
        let div = dom.element(dom.body(), "div", &[]);
        let link = dom.element(div, "a", &[]);
        dom.mark(&link, Marker::Hidden);
        dom.remove(&div).unwrap();
        assert!(!dom.is_connected(&link));
        assert_eq!(dom.marker_count(), 0);
        assert!(matches!(dom.hide(&link), Err(DomError::Detached)));
    }
}
