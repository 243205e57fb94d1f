//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound relay connection:
//!     → dialer.rs (guard check on host, TCP connect, guard check on peer)
//!     → tls.rs (client roots; hyper-rustls performs the handshake)
//!     → Hand off to the HTTP client
//!
//! Inbound listener:
//!     → tls.rs (optional certificate for the relay's own listener)
//! ```
//!
//! # Design Decisions
//! - The address guard runs below TLS, on the raw TCP peer
//! - TLS is optional for the listener and handled by axum-server

pub mod dialer;
pub mod tls;
