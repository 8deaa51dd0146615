//! Purpose: Hold pending watch requests and run one evaluation pass over them.
//! Exports: `WatchRequest`, `Registry`, `PassSummary`, `evaluate`.
//! Role: Decides which registrations resolve on a pass; the poller decides when passes run.
//! Invariants: Each pending request is visited exactly once per pass, in insertion order.
//! Invariants: A callback fires only when a node matched; exhaustion without a match drops the request silently.
//! Invariants: A match seen on the last attempt fires even if its subtree still looks incomplete.
//! Invariants: Requests added while a pass runs are kept, after the survivors, for the next pass.
use crate::core::query::Query;
use crate::core::readiness::is_subtree_complete;
use crate::core::tree::DocumentTree;
use std::cell::RefCell;
use std::fmt;

pub type WatchCallback<N> = Box<dyn FnOnce(&N)>;

pub struct WatchRequest<N> {
    query: Query<N>,
    require_complete: bool,
    attempts_remaining: u32,
    callback: WatchCallback<N>,
}

impl<N> WatchRequest<N> {
    pub fn new(
        query: Query<N>,
        require_complete: bool,
        attempts: u32,
        callback: WatchCallback<N>,
    ) -> Self {
        Self {
            query,
            require_complete,
            attempts_remaining: attempts,
            callback,
        }
    }

    pub fn query(&self) -> &Query<N> {
        &self.query
    }

    pub fn require_complete(&self) -> bool {
        self.require_complete
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.attempts_remaining
    }
}

impl<N: fmt::Debug> fmt::Debug for WatchRequest<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRequest")
            .field("query", &self.query)
            .field("require_complete", &self.require_complete)
            .field("attempts_remaining", &self.attempts_remaining)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PassSummary {
    pub fired: usize,
    pub exhausted: usize,
    pub pending: usize,
}

#[derive(Debug)]
pub struct Registry<N> {
    pending: Vec<WatchRequest<N>>,
}

impl<N> Registry<N> {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    pub fn push(&mut self, request: WatchRequest<N>) {
        self.pending.push(request);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WatchRequest<N>> {
        self.pending.iter()
    }

    fn take(&mut self) -> Vec<WatchRequest<N>> {
        std::mem::take(&mut self.pending)
    }

    fn restore(&mut self, mut survivors: Vec<WatchRequest<N>>) {
        survivors.append(&mut self.pending);
        self.pending = survivors;
    }
}

impl<N> Default for Registry<N> {
    fn default() -> Self {
        Self::new()
    }
}

enum Outcome<N> {
    Pending,
    Found(N),
    Exhausted,
}

fn decide<T>(tree: &T, request: &mut WatchRequest<T::Node>) -> Outcome<T::Node>
where
    T: DocumentTree + ?Sized,
{
    let matches = request.query.resolve(tree);
    request.attempts_remaining = request.attempts_remaining.saturating_sub(1);

    match matches.into_iter().next() {
        // The last attempt hands over whatever matched, complete or not.
        Some(first)
            if !request.require_complete
                || request.attempts_remaining == 0
                || tree.is_ready()
                || is_subtree_complete(tree, &first) =>
        {
            Outcome::Found(first)
        }
        None if request.attempts_remaining == 0 => Outcome::Exhausted,
        _ => Outcome::Pending,
    }
}

/// Runs one pass over every pending request.
///
/// The pending list is taken out of the registry for the duration of the pass,
/// so callbacks may register new requests; those land behind the survivors and
/// are first seen on the following pass.
pub fn evaluate<T>(registry: &RefCell<Registry<T::Node>>, tree: &T) -> PassSummary
where
    T: DocumentTree + ?Sized,
{
    let batch = registry.borrow_mut().take();
    let mut survivors = Vec::with_capacity(batch.len());
    let mut summary = PassSummary::default();

    for mut request in batch {
        match decide(tree, &mut request) {
            Outcome::Pending => survivors.push(request),
            Outcome::Found(node) => {
                summary.fired += 1;
                (request.callback)(&node);
            }
            Outcome::Exhausted => summary.exhausted += 1,
        }
    }

    let mut registry = registry.borrow_mut();
    registry.restore(survivors);
    summary.pending = registry.len();
    summary
}

#[cfg(test)]
mod tests {
    use super::{PassSummary, Registry, WatchRequest, evaluate};
    use crate::core::document::{Document, ElementSpec, NodeId};
    use crate::core::query::Query;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<(&'static str, NodeId)>>>;

    fn request(
        selector: &str,
        require_complete: bool,
        attempts: u32,
        label: &'static str,
        log: &Log,
    ) -> WatchRequest<NodeId> {
        let log = log.clone();
        WatchRequest::new(
            Query::from(selector),
            require_complete,
            attempts,
            Box::new(move |node: &NodeId| log.borrow_mut().push((label, *node))),
        )
    }

    #[test]
    fn found_request_fires_once_and_is_removed() {
        let doc = Document::new();
        let log = Log::default();
        let registry = RefCell::new(Registry::new());
        registry.borrow_mut().push(request("p", false, 10, "p", &log));

        let summary = evaluate(&registry, &doc);
        assert_eq!(summary, PassSummary { fired: 0, exhausted: 0, pending: 1 });
        assert_eq!(registry.borrow().iter().next().unwrap().attempts_remaining(), 9);

        let p = doc.append_element(doc.root(), ElementSpec::new("p")).expect("p");
        let summary = evaluate(&registry, &doc);
        assert_eq!(summary.fired, 1);
        assert!(registry.borrow().is_empty());
        assert_eq!(*log.borrow(), vec![("p", p)]);

        evaluate(&registry, &doc);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn exhaustion_is_silent() {
        let doc = Document::new();
        let log = Log::default();
        let registry = RefCell::new(Registry::new());
        registry.borrow_mut().push(request("missing", false, 2, "m", &log));

        assert_eq!(evaluate(&registry, &doc).pending, 1);
        let summary = evaluate(&registry, &doc);
        assert_eq!(summary, PassSummary { fired: 0, exhausted: 1, pending: 0 });
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn match_on_final_attempt_still_fires() {
        let doc = Document::new();
        let log = Log::default();
        let registry = RefCell::new(Registry::new());
        registry.borrow_mut().push(request("p", false, 1, "p", &log));
        let p = doc.append_element(doc.root(), ElementSpec::new("p")).expect("p");

        let summary = evaluate(&registry, &doc);
        assert_eq!(summary.fired, 1);
        assert_eq!(summary.exhausted, 0);
        assert_eq!(*log.borrow(), vec![("p", p)]);
    }

    #[test]
    fn incomplete_match_on_final_attempt_still_fires() {
        let doc = Document::new();
        let body = doc.append_element(doc.root(), ElementSpec::new("body")).expect("body");
        let table = doc.append_element(body, ElementSpec::new("table")).expect("table");
        let log = Log::default();
        let registry = RefCell::new(Registry::new());
        registry.borrow_mut().push(request("table", true, 1, "table", &log));
        assert!(registry.borrow().iter().all(|r| r.require_complete()));

        let summary = evaluate(&registry, &doc);
        assert_eq!(summary, PassSummary { fired: 1, exhausted: 0, pending: 0 });
        assert_eq!(*log.borrow(), vec![("table", table)]);
    }

    #[test]
    fn zero_budget_resolves_on_first_pass() {
        let doc = Document::new();
        let log = Log::default();
        let registry = RefCell::new(Registry::new());
        registry.borrow_mut().push(request("p", false, 0, "p", &log));

        let summary = evaluate(&registry, &doc);
        assert_eq!(summary.exhausted, 1);
        assert!(registry.borrow().is_empty());
    }

    #[test]
    fn removal_does_not_skip_the_next_entry() {
        let doc = Document::new();
        let body = doc.append_element(doc.root(), ElementSpec::new("body")).expect("body");
        let a = doc.append_element(body, ElementSpec::new("a")).expect("a");
        let b = doc.append_element(body, ElementSpec::new("b")).expect("b");
        let log = Log::default();
        let registry = RefCell::new(Registry::new());
        registry.borrow_mut().push(request("a", false, 5, "a", &log));
        registry.borrow_mut().push(request("b", false, 5, "b", &log));
        registry.borrow_mut().push(request("c", false, 5, "c", &log));
        registry.borrow_mut().push(request("b", false, 5, "b2", &log));

        let summary = evaluate(&registry, &doc);
        assert_eq!(summary, PassSummary { fired: 3, exhausted: 0, pending: 1 });
        assert_eq!(*log.borrow(), vec![("a", a), ("b", b), ("b2", b)]);

        let left: Vec<_> = registry.borrow().iter().map(|r| r.attempts_remaining()).collect();
        assert_eq!(left, vec![4]);
    }

    #[test]
    fn require_complete_waits_for_a_later_sibling() {
        let doc = Document::new();
        let body = doc.append_element(doc.root(), ElementSpec::new("body")).expect("body");
        let log = Log::default();
        let registry = RefCell::new(Registry::new());
        registry.borrow_mut().push(request("ul", true, 10, "ul", &log));

        let ul = doc.append_element(body, ElementSpec::new("ul")).expect("ul");
        doc.append_element(ul, ElementSpec::new("li")).expect("li");
        evaluate(&registry, &doc);
        assert!(log.borrow().is_empty());

        doc.append_element(body, ElementSpec::new("p")).expect("p");
        evaluate(&registry, &doc);
        assert_eq!(*log.borrow(), vec![("ul", ul)]);
    }

    #[test]
    fn ready_document_skips_the_heuristic() {
        let doc = Document::new();
        let last = doc.append_element(doc.root(), ElementSpec::new("div")).expect("div");
        doc.finish();
        let log = Log::default();
        let registry = RefCell::new(Registry::new());
        registry.borrow_mut().push(request("div", true, 10, "div", &log));

        evaluate(&registry, &doc);
        assert_eq!(*log.borrow(), vec![("div", last)]);
    }

    #[test]
    fn registration_from_callback_waits_for_next_pass() {
        let doc = Rc::new(Document::new());
        doc.append_element(doc.root(), ElementSpec::new("p")).expect("p");
        let log = Log::default();
        let registry = Rc::new(RefCell::new(Registry::new()));
        registry.borrow_mut().push(request("missing", false, 5, "m", &log));

        let inner_log = log.clone();
        let inner_registry = registry.clone();
        registry.borrow_mut().push(WatchRequest::new(
            Query::from("p"),
            false,
            5,
            Box::new(move |_node: &NodeId| {
                inner_registry
                    .borrow_mut()
                    .push(request("p", false, 5, "nested", &inner_log));
            }),
        ));

        let summary = evaluate(&*registry, &*doc);
        assert_eq!(summary.fired, 1);
        assert!(log.borrow().is_empty());
        let queries: Vec<_> = registry
            .borrow()
            .iter()
            .map(|r| r.query().selector().unwrap_or_default().to_string())
            .collect();
        assert_eq!(queries, vec!["missing".to_string(), "p".to_string()]);

        evaluate(&*registry, &*doc);
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(log.borrow()[0].0, "nested");
    }
}
