// Sibling-climb heuristic deciding whether a node's subtree has finished building.
use crate::core::tree::DocumentTree;

/// Returns true once some node after `node` exists at `node`'s level or at any
/// ancestor level below the document root.
///
/// A tree built top-down only ever appends at the current insertion point, so a
/// later sibling anywhere up the ancestor chain means construction has moved
/// past this subtree. Content inserted out of band after `node` makes this
/// report completion early.
pub fn is_subtree_complete<T>(tree: &T, node: &T::Node) -> bool
where
    T: DocumentTree + ?Sized,
{
    let mut current = node.clone();
    loop {
        if tree.next_sibling(&current).is_some() {
            return true;
        }
        match tree.parent(&current) {
            Some(parent) if !tree.is_root(&parent) => current = parent,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::is_subtree_complete;
    use crate::core::document::{Document, ElementSpec};

    #[test]
    fn later_sibling_marks_complete() {
        let doc = Document::new();
        let body = doc.append_element(doc.root(), ElementSpec::new("body")).expect("body");
        let first = doc.append_element(body, ElementSpec::new("p")).expect("p");
        assert!(!is_subtree_complete(&doc, &first));

        doc.append_element(body, ElementSpec::new("p")).expect("p");
        assert!(is_subtree_complete(&doc, &first));
    }

    #[test]
    fn sibling_of_an_ancestor_marks_complete() {
        let doc = Document::new();
        let html = doc.append_element(doc.root(), ElementSpec::new("html")).expect("html");
        let body = doc.append_element(html, ElementSpec::new("body")).expect("body");
        let list = doc.append_element(body, ElementSpec::new("ul")).expect("ul");
        let item = doc.append_element(list, ElementSpec::new("li")).expect("li");
        let deep = doc.append_element(item, ElementSpec::new("span")).expect("span");
        assert!(!is_subtree_complete(&doc, &deep));

        doc.append_element(body, ElementSpec::new("footer")).expect("footer");
        assert!(is_subtree_complete(&doc, &deep));
        assert!(is_subtree_complete(&doc, &list));
    }

    #[test]
    fn last_node_of_the_tree_is_incomplete() {
        let doc = Document::new();
        let html = doc.append_element(doc.root(), ElementSpec::new("html")).expect("html");
        doc.append_element(html, ElementSpec::new("head")).expect("head");
        let body = doc.append_element(html, ElementSpec::new("body")).expect("body");
        let last = doc.append_element(body, ElementSpec::new("div")).expect("div");

        assert!(!is_subtree_complete(&doc, &last));
        assert!(!is_subtree_complete(&doc, &body));
        assert!(!is_subtree_complete(&doc, &html));
    }

    #[test]
    fn root_is_never_complete() {
        let doc = Document::new();
        doc.append_element(doc.root(), ElementSpec::new("html")).expect("html");
        assert!(!is_subtree_complete(&doc, &doc.root()));
    }

    #[test]
    fn out_of_band_insertion_reports_complete_early() {
        let doc = Document::new();
        let body = doc.append_element(doc.root(), ElementSpec::new("body")).expect("body");
        let widget = doc.append_element(body, ElementSpec::new("div")).expect("div");
        assert!(!is_subtree_complete(&doc, &widget));

        doc.insert_after(widget, ElementSpec::new("script")).expect("inject");
        assert!(is_subtree_complete(&doc, &widget));
    }
}
