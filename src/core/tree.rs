//! Purpose: Describe the document tree the watch engine observes.
//! Exports: `DocumentTree`.
//! Role: Seam between the engine and whatever builds the tree (in-memory `Document`, a host DOM).
//! Invariants: `select` never fails; an unmatched or malformed selector yields an empty set.
//! Invariants: `select` returns nodes in document order.
use std::fmt;

pub trait DocumentTree {
    type Node: Clone + PartialEq + fmt::Debug;

    /// The document node itself; every other node descends from it.
    fn root(&self) -> Self::Node;

    fn select(&self, selector: &str) -> Vec<Self::Node>;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Document-wide flag, set once construction has fully finished.
    fn is_ready(&self) -> bool;

    /// Host-native whole-document ready hook. Fires once the tree is finished,
    /// or immediately when it already is.
    fn on_ready(&self, callback: Box<dyn FnOnce()>);

    fn is_root(&self, node: &Self::Node) -> bool {
        *node == self.root()
    }
}
