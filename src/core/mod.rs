// Core modules implementing the tree model, the watch registry, and its poller.
pub mod clock;
pub mod document;
pub mod error;
pub mod poller;
pub mod query;
pub mod readiness;
pub mod registry;
pub mod selector;
pub mod settings;
pub mod tree;
