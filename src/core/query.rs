//! Purpose: Represent what a watch request looks for and how it is re-resolved each pass.
//! Exports: `Query`, `NodeSet`.
//! Role: Normalizes selector strings and already-resolved collections into one re-queryable form.
//! Invariants: A collection that remembers its originating selector is always re-queried by that selector.
//! Invariants: Node references without a selector resolve to themselves, unchanged.
use crate::core::tree::DocumentTree;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Query<N> {
    Selector(String),
    Nodes(Vec<N>),
}

impl<N: Clone> Query<N> {
    pub fn node(node: N) -> Self {
        Self::Nodes(vec![node])
    }

    /// Current match set, in document order for selectors.
    pub fn resolve<T>(&self, tree: &T) -> Vec<N>
    where
        T: DocumentTree<Node = N> + ?Sized,
    {
        match self {
            Query::Selector(selector) => tree.select(selector),
            Query::Nodes(nodes) => nodes.clone(),
        }
    }

    pub fn selector(&self) -> Option<&str> {
        match self {
            Query::Selector(selector) => Some(selector.as_str()),
            Query::Nodes(_) => None,
        }
    }
}

impl<N> From<&str> for Query<N> {
    fn from(selector: &str) -> Self {
        Query::Selector(selector.to_string())
    }
}

impl<N> From<String> for Query<N> {
    fn from(selector: String) -> Self {
        Query::Selector(selector)
    }
}

impl<N> From<&String> for Query<N> {
    fn from(selector: &String) -> Self {
        Query::Selector(selector.clone())
    }
}

impl<N> From<NodeSet<N>> for Query<N> {
    fn from(set: NodeSet<N>) -> Self {
        match set.selector {
            Some(selector) => Query::Selector(selector),
            None => Query::Nodes(set.nodes),
        }
    }
}

impl<N: Clone> From<&NodeSet<N>> for Query<N> {
    fn from(set: &NodeSet<N>) -> Self {
        set.clone().into()
    }
}

/// A resolved collection of nodes, optionally remembering the selector that produced it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeSet<N> {
    selector: Option<String>,
    nodes: Vec<N>,
}

impl<N> NodeSet<N> {
    pub fn select<T>(tree: &T, selector: impl Into<String>) -> Self
    where
        T: DocumentTree<Node = N> + ?Sized,
    {
        let selector = selector.into();
        let nodes = tree.select(&selector);
        Self {
            selector: Some(selector),
            nodes,
        }
    }

    pub fn from_nodes(nodes: impl IntoIterator<Item = N>) -> Self {
        Self {
            selector: None,
            nodes: nodes.into_iter().collect(),
        }
    }

    pub fn selector(&self) -> Option<&str> {
        self.selector.as_deref()
    }

    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    pub fn first(&self) -> Option<&N> {
        self.nodes.first()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
