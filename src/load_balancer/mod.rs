//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher asks for a backend
//!     → pool.rs (fixed, ordered list of backends)
//!     → round_robin.rs (bounded scan from the cursor, skipping dead backends)
//!     → backend.rs (forward the request to the chosen upstream)
//!     → Return upstream response or error
//! ```
//!
//! # Design Decisions
//! - Pool is built once at startup and never resized
//! - Backends are trait objects so the pool is independent of the transport
//! - Dead backends are excluded from selection; an all-dead pool fails fast

pub mod backend;
pub mod pool;
pub mod round_robin;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{Backend, HttpBackend, HttpClient};
pub use pool::BackendPool;
pub use round_robin::RoundRobin;
