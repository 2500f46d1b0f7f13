//! # amencast-bus
//!
//! Publish/subscribe substrate every pipeline stage talks over.
//!
//! - [`MessageBus`]: the transport contract (`publish`, pattern `subscribe`)
//! - [`MemoryBus`]: in-process transport for single-binary runs and tests
//! - `RedisBus`: Redis pub/sub transport (feature `redis`, on by default)

#![deny(unsafe_code)]

pub mod bus;
pub mod errors;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_bus;

pub use bus::{BusMessage, MessageBus, Subscription, publish_message};
pub use errors::BusError;
pub use memory::MemoryBus;
#[cfg(feature = "redis")]
pub use redis_bus::RedisBus;
