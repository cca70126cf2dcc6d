//! Tenant directory snapshots and hot reload.
//!
//! The directory maps routing keys (store subdomains and connected
//! custom hostnames) to tenant identifiers. Requests only ever see an
//! immutable snapshot; a file watcher refreshes the snapshot out of
//! band, so a stale directory is served rather than blocking requests
//! on a reload.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;

/// Error type for directory loading.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// On-disk shape of the directory file.
///
/// ```toml
/// [tenants]
/// acme = "tn_01acme"              # subdomain
/// "shop.acme.com" = "tn_01acme"   # connected custom domain
/// ```
#[derive(Debug, Deserialize, Default)]
struct DirectoryFile {
    #[serde(default)]
    tenants: HashMap<String, String>,
}

/// An immutable snapshot of the tenant directory.
#[derive(Debug, Default)]
pub struct TenantDirectory {
    routes: HashMap<String, String>,
}

impl TenantDirectory {
    /// Build a snapshot from routing-key/tenant-id pairs.
    ///
    /// Keys are normalized to lowercase; host matching is
    /// case-insensitive everywhere else too.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let routes = entries
            .into_iter()
            .map(|(k, v)| (k.into().to_lowercase(), v.into()))
            .collect();
        Self { routes }
    }

    /// Look up a tenant id by routing key (subdomain or custom host).
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.routes.get(&key.to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Load a directory snapshot from a TOML file.
pub fn load_directory(path: &Path) -> Result<TenantDirectory, DirectoryError> {
    let content = std::fs::read_to_string(path)?;
    let file: DirectoryFile = toml::from_str(&content)?;
    Ok(TenantDirectory::from_entries(file.tenants))
}

/// Shared, atomically swappable directory handle.
pub struct DirectoryStore {
    inner: ArcSwap<TenantDirectory>,
    path: PathBuf,
}

impl DirectoryStore {
    /// Load the initial snapshot from `path`.
    ///
    /// A missing or unreadable file starts the store empty rather than
    /// failing startup; every unknown host then resolves as not-found
    /// until a reload succeeds.
    pub fn open(path: &Path) -> Self {
        let initial = match load_directory(path) {
            Ok(directory) => {
                tracing::info!(path = ?path, tenants = directory.len(), "Tenant directory loaded");
                directory
            }
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Tenant directory unavailable, starting empty");
                TenantDirectory::default()
            }
        };
        Self {
            inner: ArcSwap::from_pointee(initial),
            path: path.to_path_buf(),
        }
    }

    /// Current snapshot. Cheap; taken once per request.
    pub fn snapshot(&self) -> Arc<TenantDirectory> {
        self.inner.load_full()
    }

    /// Reload from disk, keeping the current snapshot on failure.
    pub fn reload(&self) {
        match load_directory(&self.path) {
            Ok(directory) => {
                tracing::info!(tenants = directory.len(), "Tenant directory reloaded");
                self.inner.store(Arc::new(directory));
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload tenant directory, keeping current snapshot");
            }
        }
    }

    /// Start watching the directory file for changes.
    ///
    /// The returned watcher must be kept alive for the lifetime of the
    /// store; dropping it stops refreshes (the last snapshot stays
    /// valid).
    pub fn watch(self: Arc<Self>) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let store = self;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Tenant directory change detected, reloading...");
                        store.reload();
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Tenant directory watcher started");
        Ok(watcher)
    }
}
