//! Purpose: Library crate behind the `treewatch` CLI: watch a document tree while it is built.
//! Exports: `api` (watcher, tree model, settings, errors) and `script` (scripted construction).
//! Role: Embeddable engine plus the replay tooling the binary uses.
//! Invariants: One engine instance owns its registry and timer; there is no global state.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
pub mod script;
