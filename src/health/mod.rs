//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each backend (HTTP GET or TCP connect)
//!     → Update state.rs counters
//!     → Backend::set_alive on transition
//!
//! Passive marking (http/dispatcher.rs, opt-in):
//!     Forward failed
//!     → Backend::set_alive(false)
//!     → Active checks revive it once probes succeed again
//! ```
//!
//! # Design Decisions
//! - State transitions require consecutive successes/failures
//! - Health state is per-backend, not per-pool
//! - Liveness is an atomic flag on the backend; the monitor owns the counters

pub mod active;
pub mod state;
