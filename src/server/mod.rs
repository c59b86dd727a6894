//! Process servers: the gRPC provider socket, the liveness endpoint and the
//! coordinator that runs them together.

pub mod grpc;
pub mod health;
pub mod lifecycle;

pub use grpc::{ProviderServer, ProviderService, STANDARD_PROVIDER_DIRS};
pub use health::{health_router, HealthServer, HEALTH_PROBE_VERSION};
pub use lifecycle::{run_until_shutdown, ShutdownReport};
