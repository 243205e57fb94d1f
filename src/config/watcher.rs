//! Configuration file watcher for hot reload of the address deny-list.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::loader::{apply_env_overrides, load_config, ConfigError};
use crate::security::address_guard::AddressGuard;

/// A watcher that monitors the configuration file and swaps in a fresh
/// [`AddressGuard`] whenever it changes.
pub struct ConfigWatcher {
    path: PathBuf,
    guard: Arc<ArcSwap<AddressGuard>>,
}

impl ConfigWatcher {
    pub fn new(path: &Path, guard: Arc<ArcSwap<AddressGuard>>) -> Self {
        Self {
            path: path.to_path_buf(),
            guard,
        }
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for reloads to happen.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let guard = Arc::clone(&self.guard);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, reloading...");
                        if let Err(e) = reload_guard(&path, &guard) {
                            tracing::error!(error = %e, "Failed to reload config. Keeping current configuration.");
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Load `path` and publish its deny-list. On error the current guard stays.
pub fn reload_guard(path: &Path, guard: &ArcSwap<AddressGuard>) -> Result<(), ConfigError> {
    let config = apply_env_overrides(load_config(path)?)?;
    let next = AddressGuard::from_entries(&config.relay.disallowed);

    tracing::info!(
        denied_hosts = next.denied_host_count(),
        denied_networks = next.denied_network_count(),
        "Address deny-list reloaded"
    );
    guard.store(Arc::new(next));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reload_swaps_guard_and_keeps_it_on_error() {
        let path = std::env::temp_dir().join(format!("relay-watch-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[relay]\ndisallowed = [\"203.0.113.0/24\"]\n").unwrap();

        let guard = ArcSwap::from_pointee(AddressGuard::with_defaults());
        assert!(guard.load().is_allowed("203.0.113.7"));

        // Only meaningful when the test environment does not override the list.
        if std::env::var_os("RELAY_DISALLOWED_HOSTS").is_none() {
            reload_guard(&path, &guard).unwrap();
            assert!(!guard.load().is_allowed("203.0.113.7"));
            assert!(guard.load().is_allowed("127.0.0.1"));
        }

        fs::write(&path, "[relay]\ndisallowed = [\"10.0.0.0/99\"]\n").unwrap();
        let before = guard.load_full();
        assert!(reload_guard(&path, &guard).is_err());
        assert!(Arc::ptr_eq(&before, &guard.load_full()));

        fs::remove_file(&path).unwrap();
    }
}
