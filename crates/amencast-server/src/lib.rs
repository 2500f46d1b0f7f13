//! # amencast-server
//!
//! Process plumbing around the pipeline stages.
//!
//! - [`shutdown`]: [`ShutdownCoordinator`], one cancellation token for every task
//! - [`health`]: the `/health` response body
//! - [`server`]: [`HealthServer`], the axum router and its serve loop

#![deny(unsafe_code)]

pub mod errors;
pub mod health;
pub mod server;
pub mod shutdown;

pub use errors::ServerError;
pub use health::{HealthResponse, StageHealth, health_check};
pub use server::HealthServer;
pub use shutdown::ShutdownCoordinator;
