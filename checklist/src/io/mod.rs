//! I/O adapters: configuration, process invocation and storage.

pub mod artifact_store;
pub mod config;
pub mod invoker;
pub mod process;
pub mod session_store;
