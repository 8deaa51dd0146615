//! Purpose: Minimal in-memory document tree that can be grown while it is being watched.
//! Exports: `Document`, `NodeId`, `ElementSpec`.
//! Role: Reference `DocumentTree` used by the CLI replay and by tests.
//! Invariants: Node ids are arena indices and stay valid for the document's lifetime.
//! Invariants: Ready callbacks run outside any internal borrow, so they may read the document.
use crate::core::error::{Error, ErrorKind};
use crate::core::selector::{Compound, Selector};
use crate::core::tree::DocumentTree;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;

const ROOT_TAG: &str = "#document";

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ElementSpec {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
}

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            id: None,
            classes: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }
}

impl fmt::Display for ElementSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag)?;
        if let Some(id) = &self.id {
            write!(f, "#{id}")?;
        }
        for class in &self.classes {
            write!(f, ".{class}")?;
        }
        Ok(())
    }
}

struct NodeData {
    element: ElementSpec,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct DocumentState {
    nodes: Vec<NodeData>,
    ready: bool,
    ready_callbacks: Vec<Box<dyn FnOnce()>>,
}

pub struct Document {
    state: RefCell<DocumentState>,
}

impl Document {
    pub fn new() -> Self {
        let root = NodeData {
            element: ElementSpec::new(ROOT_TAG),
            parent: None,
            children: Vec::new(),
        };
        Self {
            state: RefCell::new(DocumentState {
                nodes: vec![root],
                ready: false,
                ready_callbacks: Vec::new(),
            }),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.state.borrow().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 1
    }

    /// Appends `element` as the last child of `parent`, the way a parser would.
    pub fn append_element(&self, parent: NodeId, element: ElementSpec) -> Result<NodeId, Error> {
        let mut state = self.state.borrow_mut();
        check_node(&state, parent)?;
        let id = NodeId(state.nodes.len());
        state.nodes.push(NodeData {
            element,
            parent: Some(parent),
            children: Vec::new(),
        });
        state.nodes[parent.0].children.push(id);
        Ok(id)
    }

    /// Inserts `element` directly after `reference`, as script-driven insertion would.
    pub fn insert_after(&self, reference: NodeId, element: ElementSpec) -> Result<NodeId, Error> {
        let mut state = self.state.borrow_mut();
        check_node(&state, reference)?;
        let parent = state.nodes[reference.0].parent.ok_or_else(|| {
            Error::new(ErrorKind::Usage).with_message("cannot insert a sibling of the document root")
        })?;
        let id = NodeId(state.nodes.len());
        state.nodes.push(NodeData {
            element,
            parent: Some(parent),
            children: Vec::new(),
        });
        let siblings = &mut state.nodes[parent.0].children;
        let position = siblings
            .iter()
            .position(|child| *child == reference)
            .map_or(siblings.len(), |index| index + 1);
        siblings.insert(position, id);
        Ok(id)
    }

    /// Marks construction finished and runs queued ready callbacks in registration order.
    pub fn finish(&self) {
        let callbacks = {
            let mut state = self.state.borrow_mut();
            if state.ready {
                return;
            }
            state.ready = true;
            std::mem::take(&mut state.ready_callbacks)
        };
        for callback in callbacks {
            callback();
        }
    }

    pub fn element(&self, node: NodeId) -> Option<ElementSpec> {
        self.state
            .borrow()
            .nodes
            .get(node.0)
            .map(|data| data.element.clone())
    }

    /// Short label such as `div#main.note`, used in reports.
    pub fn describe(&self, node: NodeId) -> String {
        self.element(node)
            .map(|element| element.to_string())
            .unwrap_or_else(|| format!("<unknown node {}>", node.0))
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.state
            .borrow()
            .nodes
            .get(node.0)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    fn matches(state: &DocumentState, node: NodeId, selector: &Selector) -> bool {
        let data = &state.nodes[node.0];
        if data.parent.is_none() {
            return false;
        }
        if !matches_element(&data.element, selector.subject()) {
            return false;
        }

        let mut ancestor = data.parent;
        for compound in selector.ancestors() {
            loop {
                let Some(current) = ancestor else {
                    return false;
                };
                let current_data = &state.nodes[current.0];
                ancestor = current_data.parent;
                if current_data.parent.is_some()
                    && matches_element(&current_data.element, compound)
                {
                    break;
                }
            }
        }
        true
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Document")
            .field("nodes", &state.nodes.len())
            .field("ready", &state.ready)
            .finish()
    }
}

impl DocumentTree for Document {
    type Node = NodeId;

    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn select(&self, selector: &str) -> Vec<NodeId> {
        let Ok(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        let state = self.state.borrow();
        let mut found = Vec::new();
        let mut stack = vec![NodeId(0)];
        while let Some(node) = stack.pop() {
            if Document::matches(&state, node, &selector) {
                found.push(node);
            }
            stack.extend(state.nodes[node.0].children.iter().rev().copied());
        }
        found
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.state.borrow().nodes.get(node.0).and_then(|data| data.parent)
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let state = self.state.borrow();
        let parent = state.nodes.get(node.0)?.parent?;
        let siblings = &state.nodes[parent.0].children;
        let index = siblings.iter().position(|child| child == node)?;
        siblings.get(index + 1).copied()
    }

    fn is_ready(&self) -> bool {
        self.state.borrow().ready
    }

    fn on_ready(&self, callback: Box<dyn FnOnce()>) {
        let run_now = {
            let mut state = self.state.borrow_mut();
            if state.ready {
                Some(callback)
            } else {
                state.ready_callbacks.push(callback);
                None
            }
        };
        if let Some(callback) = run_now {
            callback();
        }
    }
}

fn check_node(state: &DocumentState, node: NodeId) -> Result<(), Error> {
    if node.0 < state.nodes.len() {
        Ok(())
    } else {
        Err(Error::new(ErrorKind::NotFound).with_message(format!("unknown node {}", node.0)))
    }
}

fn matches_element(element: &ElementSpec, compound: &Compound) -> bool {
    compound.matches(&element.tag, element.id.as_deref(), &element.classes)
}

#[cfg(test)]
mod tests {
    use super::{Document, ElementSpec, NodeId};
    use crate::core::error::ErrorKind;
    use crate::core::tree::DocumentTree;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let doc = Document::new();
        let body = doc.append_element(doc.root(), ElementSpec::new("body")).expect("body");
        let menu = doc
            .append_element(body, ElementSpec::new("ul").with_class("menu"))
            .expect("ul");
        let first = doc
            .append_element(menu, ElementSpec::new("li").with_id("first"))
            .expect("li");
        let second = doc
            .append_element(menu, ElementSpec::new("li").with_class("active"))
            .expect("li");
        (doc, menu, first, second)
    }

    #[test]
    fn select_returns_document_order() {
        let (doc, menu, first, second) = sample();
        let late = doc.insert_after(first, ElementSpec::new("li")).expect("inject");
        assert_eq!(doc.select("li"), vec![first, late, second]);
        assert_eq!(doc.select("ul.menu"), vec![menu]);
        assert_eq!(doc.select("#first"), vec![first]);
        assert_eq!(doc.select("body .active"), vec![second]);
        assert!(doc.select("ol li").is_empty());
    }

    #[test]
    fn malformed_selector_matches_nothing() {
        let (doc, _, _, _) = sample();
        assert!(doc.select("li[").is_empty());
        assert!(doc.select("").is_empty());
    }

    #[test]
    fn root_never_matches_a_selector() {
        let (doc, _, _, _) = sample();
        assert!(!doc.select("*").contains(&doc.root()));
        assert_eq!(doc.select("*").len(), doc.len() - 1);
    }

    #[test]
    fn sibling_and_parent_links() {
        let (doc, menu, first, second) = sample();
        assert_eq!(doc.next_sibling(&first), Some(second));
        assert_eq!(doc.next_sibling(&second), None);
        assert_eq!(doc.parent(&first), Some(menu));
        assert_eq!(doc.parent(&doc.root()), None);
        assert_eq!(doc.children(menu), vec![first, second]);
        assert_eq!(doc.describe(menu), "ul.menu");
        assert_eq!(doc.root().index(), 0);
        assert_eq!(second.index(), doc.len() - 1);
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let doc = Document::new();
        let err = doc
            .append_element(NodeId(42), ElementSpec::new("p"))
            .expect_err("unknown parent");
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = doc
            .insert_after(doc.root(), ElementSpec::new("p"))
            .expect_err("root sibling");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn ready_callbacks_fire_once_in_order() {
        let doc = Document::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for label in ["a", "b"] {
            let log = log.clone();
            doc.on_ready(Box::new(move || log.borrow_mut().push(label)));
        }
        assert!(!doc.is_ready());
        assert!(log.borrow().is_empty());

        doc.finish();
        doc.finish();
        assert!(doc.is_ready());
        assert_eq!(*log.borrow(), vec!["a", "b"]);

        let late = log.clone();
        doc.on_ready(Box::new(move || late.borrow_mut().push("late")));
        assert_eq!(*log.borrow(), vec!["a", "b", "late"]);
    }
}
