//! Small helpers shared by the ticket watcher crates.

pub mod env;
