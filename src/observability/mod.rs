//! # Observability Infrastructure
//!
//! Structured logging for the provider process and per-call tracing for the
//! gRPC endpoint.

pub mod grpc_tracing;
pub mod logging;

pub use grpc_tracing::GrpcTracingLayer;
pub use logging::{init_logging, log_startup_info};
