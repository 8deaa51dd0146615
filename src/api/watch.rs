//! Purpose: Public registration surface of the watch engine.
//! Exports: `Watcher`, `WatchOptions`.
//! Role: Normalizes registration arguments and hands requests to the poller.
//! Invariants: Registration never invokes a callback directly; resolution happens inside a pass.
//! Invariants: Every `watch*` call returns the caller's query value unchanged.
//! Notes: There is no way to cancel a registration; it leaves only by matching or exhausting its budget.
use crate::core::clock::{BlockingClock, Clock, TokioClock};
use crate::core::poller::Poller;
use crate::core::query::{NodeSet, Query};
use crate::core::registry::WatchRequest;
use crate::core::settings::WatchSettings;
use crate::core::tree::DocumentTree;
use std::rc::Rc;
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct WatchOptions {
    /// Also wait until the matched node's subtree looks fully built.
    pub require_complete: bool,
}

impl WatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn complete() -> Self {
        Self {
            require_complete: true,
        }
    }
}

/// Handle to one watch engine. Clones share the same registry and timer, so a
/// callback can hold a clone and register follow-up watches.
pub struct Watcher<T: DocumentTree, C: Clock> {
    poller: Rc<Poller<T, C>>,
}

impl<T: DocumentTree, C: Clock> Clone for Watcher<T, C> {
    fn clone(&self) -> Self {
        Self {
            poller: self.poller.clone(),
        }
    }
}

impl<T, C> Watcher<T, C>
where
    T: DocumentTree,
    T::Node: 'static,
    C: Clock,
{
    pub fn new(tree: Rc<T>, clock: C) -> Self {
        Self::with_settings(tree, clock, WatchSettings::default())
    }

    pub fn with_settings(tree: Rc<T>, clock: C, settings: WatchSettings) -> Self {
        Self {
            poller: Rc::new(Poller::new(tree, clock, settings)),
        }
    }

    /// Calls `callback` with the first match once `query` matches anything.
    pub fn watch<Q, F>(&self, query: Q, callback: F) -> Q
    where
        Q: Clone + Into<Query<T::Node>>,
        F: FnOnce(&T::Node) + 'static,
    {
        self.watch_with(query, WatchOptions::new(), callback)
    }

    /// Like `watch`, but also waits until the first match's subtree looks complete.
    pub fn watch_complete<Q, F>(&self, query: Q, callback: F) -> Q
    where
        Q: Clone + Into<Query<T::Node>>,
        F: FnOnce(&T::Node) + 'static,
    {
        self.watch_with(query, WatchOptions::complete(), callback)
    }

    pub fn watch_with<Q, F>(&self, query: Q, options: WatchOptions, callback: F) -> Q
    where
        Q: Clone + Into<Query<T::Node>>,
        F: FnOnce(&T::Node) + 'static,
    {
        let attempts = self.poller.settings().default_attempts;
        let request = WatchRequest::new(
            query.clone().into(),
            options.require_complete,
            attempts,
            Box::new(callback),
        );
        self.poller.register(request);
        query
    }

    /// Watches an already-resolved collection, re-queried by its selector when it has one.
    pub fn watch_collection<'a, F>(
        &self,
        set: &'a NodeSet<T::Node>,
        callback: F,
    ) -> &'a NodeSet<T::Node>
    where
        F: FnOnce(&T::Node) + 'static,
    {
        self.watch(set, callback)
    }

    /// Whole-document targets go to the tree's own ready hook; anything else is
    /// watched until its subtree is complete.
    pub fn ready<Q, F>(&self, target: Q, callback: F) -> Q
    where
        Q: Clone + Into<Query<T::Node>>,
        F: FnOnce(&T::Node) + 'static,
    {
        let query: Query<T::Node> = target.clone().into();
        let tree = self.poller.tree();
        let is_document = match &query {
            Query::Nodes(nodes) => nodes.first().is_some_and(|node| tree.is_root(node)),
            Query::Selector(_) => false,
        };
        if !is_document {
            return self.watch_complete(target, callback);
        }

        let root = tree.root();
        tree.on_ready(Box::new(move || callback(&root)));
        target
    }

    pub fn document(&self) -> &Rc<T> {
        self.poller.tree()
    }

    pub fn clock(&self) -> &C {
        self.poller.clock()
    }

    pub fn settings(&self) -> WatchSettings {
        self.poller.settings()
    }

    pub fn apply_settings(&self, settings: WatchSettings) {
        self.poller.set_settings(settings);
    }

    pub fn set_interval(&self, interval: Duration) {
        let millis = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self.apply_settings(self.settings().with_interval_ms(millis));
    }

    pub fn set_default_attempts(&self, attempts: u32) {
        self.apply_settings(self.settings().with_default_attempts(attempts));
    }

    pub fn pending(&self) -> usize {
        self.poller.pending()
    }

    pub fn passes(&self) -> u64 {
        self.poller.passes()
    }

    pub fn is_idle(&self) -> bool {
        self.poller.is_idle()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.poller.next_deadline()
    }

    pub fn fire_due(&self) -> bool {
        self.poller.fire_due()
    }
}

impl<T, C> Watcher<T, C>
where
    T: DocumentTree,
    T::Node: 'static,
    C: BlockingClock,
{
    pub fn advance_to(&self, target: Duration) {
        self.poller.advance_to(target);
    }

    pub fn run_until_idle(&self) {
        self.poller.run_until_idle();
    }
}

impl<T> Watcher<T, TokioClock>
where
    T: DocumentTree,
    T::Node: 'static,
{
    pub async fn run_until_idle_async(&self) {
        self.poller.run_until_idle_async().await;
    }
}
