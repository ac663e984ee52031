//! Manifest watcher for refreshable client options.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use crate::config::loader::load_manifest;
use crate::config::refresh::{RefreshScope, OPTIONS_PREFIX};
use crate::config::resolver::options_from_properties;
use crate::config::schema::ClientProperties;

/// Reloads the manifest on change and refreshes every registered options cell.
pub struct ManifestWatcher {
    path: PathBuf,
    refresh: Arc<RefreshScope>,
    update_tx: mpsc::UnboundedSender<ClientProperties>,
}

impl ManifestWatcher {
    /// Returns the watcher and a receiver for reloaded client properties.
    pub fn new(path: &Path, refresh: Arc<RefreshScope>) -> (Self, mpsc::UnboundedReceiver<ClientProperties>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                refresh,
                update_tx,
            },
            update_rx,
        )
    }

    /// Load the manifest and apply it. Returns the number of refreshed cells.
    pub fn reload(&self) -> usize {
        match load_manifest(&self.path) {
            Ok(manifest) => apply_properties(&self.refresh, &manifest.client, &self.update_tx),
            Err(e) => {
                tracing::error!(path = ?self.path, error = %e, "Failed to reload manifest, keeping current options");
                0
            }
        }
    }

    /// Start watching. Dropping the returned watcher stops it.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let this = self;
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    tracing::info!(path = ?this.path, "Manifest change detected, reloading");
                    this.reload();
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?path, "Manifest watcher started");
        Ok(watcher)
    }
}

fn apply_properties(
    refresh: &RefreshScope,
    properties: &ClientProperties,
    update_tx: &mpsc::UnboundedSender<ClientProperties>,
) -> usize {
    let mut refreshed = 0;
    if properties.refresh_enabled {
        for name in refresh.names() {
            let Some(context_id) = name.strip_prefix(OPTIONS_PREFIX) else {
                continue;
            };
            let options = options_from_properties(properties, context_id);
            if refresh.current(&name).map(|v| v.options) != Some(options) {
                refresh.refresh(&name, options);
                refreshed += 1;
            }
        }
    }
    let _ = update_tx.send(properties.clone());
    refreshed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::config::refresh::options_name;
    use crate::config::schema::ClientConfigProperties;
    use crate::resilience::Options;

    #[test]
    fn test_apply_refreshes_changed_cells() {
        let refresh = Arc::new(RefreshScope::new());
        refresh.register(&options_name("users"), Options::default());
        refresh.register(&options_name("billing"), Options::default());

        let mut config = HashMap::new();
        config.insert(
            "users".to_string(),
            ClientConfigProperties {
                read_timeout: Some(250),
                ..Default::default()
            },
        );
        let properties = ClientProperties {
            refresh_enabled: true,
            config,
            ..Default::default()
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        assert_eq!(apply_properties(&refresh, &properties, &tx), 1);
        let users = refresh.current(&options_name("users")).unwrap();
        assert_eq!(users.version, 1);
        assert_eq!(users.options.read_timeout, Duration::from_millis(250));
        assert_eq!(refresh.current(&options_name("billing")).unwrap().version, 0);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_reload_reads_manifest_file() {
        let dir = std::env::temp_dir().join(format!("manifest-watch-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("clients.toml");
        std::fs::write(
            &path,
            "[client]\nrefresh_enabled = true\n[client.config.users]\nconnect_timeout = 40\n",
        )
        .unwrap();

        let refresh = Arc::new(RefreshScope::new());
        refresh.register(&options_name("users"), Options::default());
        let (watcher, mut rx) = ManifestWatcher::new(&path, refresh.clone());

        assert_eq!(watcher.reload(), 1);
        assert_eq!(
            refresh.current(&options_name("users")).unwrap().options.connect_timeout,
            Duration::from_millis(40)
        );
        assert!(rx.try_recv().unwrap().refresh_enabled);
        std::fs::remove_dir_all(&dir).ok();
    }
}
