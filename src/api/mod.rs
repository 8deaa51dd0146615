//! Purpose: Define the public Rust API boundary for treewatch.
//! Exports: `Watcher` and the types needed to register watches and drive the engine.
//! Role: Stable surface for embedders and the CLI; core modules stay an implementation detail.
//! Invariants: This module is the only supported path to the engine.
//! Invariants: Everything exported here is single-threaded (`!Send`) by construction.

mod watch;

pub use crate::core::clock::{
    BlockingClock, Clock, SystemClock, TimerHandle, TokioClock, VirtualClock,
};
pub use crate::core::document::{Document, ElementSpec, NodeId};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::query::{NodeSet, Query};
pub use crate::core::readiness::is_subtree_complete;
pub use crate::core::selector::Selector;
pub use crate::core::settings::{DEFAULT_ATTEMPTS, DEFAULT_INTERVAL_MS, WatchSettings};
pub use crate::core::tree::DocumentTree;
pub use watch::{WatchOptions, Watcher};
