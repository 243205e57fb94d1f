//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → host_filter.rs (host allow-list, JSON payload requirement)
//!     → Pass to handlers
//!
//! Outgoing relay call:
//!     → address_guard.rs (deny-list of hosts and CIDR prefixes)
//! ```
//!
//! # Design Decisions
//! - Fail closed: an empty or unparsable address is never allowed
//! - No trust in client input

pub mod address_guard;
pub mod host_filter;
