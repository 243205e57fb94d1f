//! Request relay library: performs HTTP calls described by remote callers
//! while refusing to reach private or otherwise disallowed addresses.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod outbound;
pub mod relay;
pub mod security;

pub use config::schema::RelayServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use relay::{Job, Relay, RelayResult};
pub use security::address_guard::AddressGuard;
