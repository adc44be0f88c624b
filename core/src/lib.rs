//! Core engine for the codeagent wrapper.
//!
//! The crate is organized around the wrapper's moving parts: the backend
//! registry, the stream normalizer, the per-task process runner, the
//! task-block parser, the dependency-graph executor and the log manager.
//! The `codeagent` binary in the sibling crate wires them to the CLI
//! surface.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod executor;
pub mod logger;
pub mod runner;
pub mod stdio;
pub mod stream;
pub mod util;
