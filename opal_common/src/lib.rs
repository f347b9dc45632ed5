//! Common types and utilities for the Opal projects.

pub mod client;
pub mod config;
pub mod error;
pub mod node;
pub mod task;
pub mod timestamp;

pub mod computation_grpc {
    tonic::include_proto!("computation_grpc");
}

// Re-export the crates shared by all Opal services so that they use one version.
pub use anyhow;
pub use clap;
pub use serde;
pub use serde_json;
pub use time;
pub use tokio;
pub use tracing;
pub use tracing_subscriber;
pub use uuid;
