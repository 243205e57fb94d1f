//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware)
//!     → security::host_filter (host allow-list, JSON requirement)
//!     → handlers.rs (method dispatch, relay invocation)
//!     → response.rs (error bodies)
//!     → Send to client
//! ```

pub mod handlers;
pub mod response;
pub mod server;

pub use server::{AppState, HttpServer};
