//! Core library for the Raccoon agent runtime.
//!
//! Streaming provider adapters, the turn orchestrator, the tool registry
//! and its remote JSON-RPC counterpart, and the sandbox manager. The gRPC
//! facade in `raccoon-server` is the only thing that depends on wire
//! formats; everything here speaks plain Rust types.

pub mod ai;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod sandbox;
pub mod status;
pub mod tools;
