//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, catch-all route, middleware)
//!     → request.rs (assign x-request-id)
//!     → dispatcher.rs (pick backend, forward, map errors to status codes)
//!     → headers.rs (proxy header rewriting on the way out and back)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod headers;
pub mod request;
pub mod server;

pub use dispatcher::Dispatcher;
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
