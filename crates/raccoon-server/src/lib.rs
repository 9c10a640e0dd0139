//! gRPC service facade for the Raccoon agent runtime.
//!
//! Thin translation layer over `raccoon-core`: decode a wire request, drive
//! the orchestrator or sandbox manager, re-encode the resulting event
//! stream. No business logic lives here.

pub mod facade;

/// Generated protobuf/tonic types for the `raccoon.v1` package.
pub mod pb {
    tonic::include_proto!("raccoon.v1");
}
