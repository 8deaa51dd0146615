//! Purpose: Drive repeated evaluation passes on a fixed interval until nothing is pending.
//! Exports: `Poller`.
//! Role: Owns the registry, the single outstanding timer handle, and the settings of one engine.
//! Invariants: At most one timer is armed; it is cleared before the pass it triggers runs.
//! Invariants: Passes never nest; a registration during a pass only queues for the next one.
//! Invariants: Idle means no timer and an empty registry; the poller re-arms only while requests remain.
use crate::core::clock::{BlockingClock, Clock, TimerHandle, TokioClock};
use crate::core::registry::{PassSummary, Registry, WatchRequest, evaluate};
use crate::core::settings::WatchSettings;
use crate::core::tree::DocumentTree;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, trace};

pub struct Poller<T: DocumentTree, C: Clock> {
    tree: Rc<T>,
    clock: C,
    settings: Cell<WatchSettings>,
    registry: RefCell<Registry<T::Node>>,
    timer: Cell<Option<TimerHandle>>,
    next_timer_id: Cell<u64>,
    in_pass: Cell<bool>,
    passes: Cell<u64>,
}

impl<T: DocumentTree, C: Clock> Poller<T, C> {
    pub fn new(tree: Rc<T>, clock: C, settings: WatchSettings) -> Self {
        Self {
            tree,
            clock,
            settings: Cell::new(settings),
            registry: RefCell::new(Registry::new()),
            timer: Cell::new(None),
            next_timer_id: Cell::new(0),
            in_pass: Cell::new(false),
            passes: Cell::new(0),
        }
    }

    pub fn tree(&self) -> &Rc<T> {
        &self.tree
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn settings(&self) -> WatchSettings {
        self.settings.get()
    }

    pub fn set_settings(&self, settings: WatchSettings) {
        self.settings.set(settings);
    }

    pub fn pending(&self) -> usize {
        self.registry.borrow().len()
    }

    pub fn passes(&self) -> u64 {
        self.passes.get()
    }

    pub fn timer(&self) -> Option<TimerHandle> {
        self.timer.get()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timer.get().map(|handle| handle.deadline())
    }

    pub fn is_idle(&self) -> bool {
        self.timer.get().is_none() && self.registry.borrow().is_empty()
    }

    pub fn register(&self, request: WatchRequest<T::Node>) {
        self.registry.borrow_mut().push(request);
        self.ensure_running();
    }

    /// Runs a pass right away unless a timer or a pass is already in flight.
    pub fn ensure_running(&self) {
        if self.timer.get().is_some() || self.in_pass.get() {
            return;
        }
        self.run_pass();
    }

    /// Fires the outstanding timer if its deadline has passed. Returns whether a pass ran.
    pub fn fire_due(&self) -> bool {
        if self.in_pass.get() {
            return false;
        }
        match self.timer.get() {
            Some(handle) if self.clock.now() >= handle.deadline() => {
                self.timer.set(None);
                self.run_pass();
                true
            }
            _ => false,
        }
    }

    fn run_pass(&self) -> PassSummary {
        let pass = self.passes.get() + 1;
        self.passes.set(pass);
        trace!(pass, at_ms = self.clock.now().as_millis() as u64, "evaluation pass");

        let summary = {
            let _guard = PassGuard::enter(&self.in_pass);
            evaluate(&self.registry, &*self.tree)
        };

        debug!(
            pass,
            fired = summary.fired,
            dropped = summary.exhausted,
            pending = summary.pending,
            "pass finished"
        );

        if self.registry.borrow().is_empty() {
            debug!(pass, "registry empty; poller idle");
        } else {
            self.arm();
        }
        summary
    }

    fn arm(&self) {
        let id = self.next_timer_id.get();
        self.next_timer_id.set(id + 1);
        let deadline = self
            .clock
            .now()
            .saturating_add(self.settings.get().interval());
        self.timer.set(Some(TimerHandle::new(id, deadline)));
        trace!(timer = id, deadline_ms = deadline.as_millis() as u64, "timer armed");
    }
}

/// Clears the in-pass flag on exit, including when a callback unwinds.
struct PassGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> PassGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

impl<T: DocumentTree, C: BlockingClock> Poller<T, C> {
    /// Fires every timer due up to `target`, then leaves the clock at `target`.
    pub fn advance_to(&self, target: Duration) {
        while let Some(deadline) = self.next_deadline() {
            if deadline > target {
                break;
            }
            self.clock.sleep_until(deadline);
            self.fire_due();
        }
        self.clock.sleep_until(target);
    }

    pub fn run_until_idle(&self) {
        while let Some(deadline) = self.next_deadline() {
            self.clock.sleep_until(deadline);
            self.fire_due();
        }
    }
}

impl<T: DocumentTree> Poller<T, TokioClock> {
    pub async fn run_until_idle_async(&self) {
        while let Some(deadline) = self.next_deadline() {
            tokio::time::sleep_until(self.clock.instant_at(deadline)).await;
            self.fire_due();
        }
    }
}
