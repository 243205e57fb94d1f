//! Relay subsystem: performs an HTTP call described by a job on behalf of a
//! remote caller.
//!
//! # Data Flow
//! ```text
//! Job (job.rs)
//!     → cookies.rs (plain state → working jar)
//!     → body.rs (raw or multipart payload)
//!     → orchestrator.rs (hop loop)
//!         → client.rs (guarded dialer + TLS)
//!         → redirect.rs (history, next hop)
//!         → realise.rs (serialisable response)
//!     → RelayResult (job.rs), cookies exported back to plain state
//! ```
//!
//! # Design Decisions
//! - Caller owns all state; nothing survives an invocation
//! - Target-call failures are data (`RelayResult::error`), job problems are
//!   API errors (`RelayError`)

pub mod body;
pub mod client;
pub mod cookies;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod realise;
pub mod redirect;

pub use error::RelayError;
pub use job::{Job, RelayResult};
pub use orchestrator::Relay;
