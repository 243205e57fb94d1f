//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → RelayServiceConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of Arc<AddressGuard>
//!     → relays started afterwards see the new deny-list
//! ```
//!
//! # Design Decisions
//! - Only the deny-list is hot-reloadable; everything else requires a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::ConfigError;
pub use schema::{
    ListenerConfig, ObservabilityConfig, RelayConfig, RelayServiceConfig, SecurityConfig,
    TimeoutConfig, TlsConfig,
};
