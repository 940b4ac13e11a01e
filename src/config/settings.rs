//! Per-form and global gateway settings, cached in memory.

use arc_swap::ArcSwap;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

/// Key of the global default gateway environment.
pub const GLOBAL_AUTH_KEY: &str = "global.auth";

#[derive(Debug, FromRow)]
struct SettingRow {
    key: String,
    value: String,
}

/// Immutable snapshot of the settings table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewaySettings {
    values: HashMap<String, String>,
}

impl GatewaySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Sets `key` only if it has no usable value yet.
    pub fn with_default(mut self, key: &str, value: &str) -> Self {
        if self.get(key).is_none() {
            self.values.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// Empty values count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    pub fn form_environment(&self, form_id: Uuid) -> Option<&str> {
        self.get(&format!("{}_environment", form_id))
    }

    pub fn form_code_prefix(&self, form_id: Uuid) -> Option<&str> {
        self.get(&format!("{}_code", form_id))
    }

    pub fn global_environment(&self) -> Option<&str> {
        self.get(GLOBAL_AUTH_KEY)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub async fn fetch(pool: &PgPool) -> Result<Self, sqlx::Error> {
        let rows = sqlx::query_as::<_, SettingRow>("SELECT key, value FROM gateway_settings")
            .fetch_all(pool)
            .await?;

        Ok(Self {
            values: rows.into_iter().map(|row| (row.key, row.value)).collect(),
        })
    }
}

/// Lock-free settings snapshot, swapped wholesale on refresh.
pub struct SettingsCache {
    inner: ArcSwap<GatewaySettings>,
    fallback_environment: Option<String>,
}

impl SettingsCache {
    pub fn new(settings: GatewaySettings) -> Self {
        Self {
            inner: ArcSwap::from_pointee(settings),
            fallback_environment: None,
        }
    }

    /// Loads the table and spawns a background refresher. A failed refresh keeps the
    /// previous snapshot.
    pub async fn start(
        pool: PgPool,
        refresh_interval: Duration,
        fallback_environment: Option<String>,
    ) -> Arc<Self> {
        let initial = match GatewaySettings::fetch(&pool).await {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Could not load gateway settings, starting empty: {}", e);
                GatewaySettings::default()
            }
        };

        let cache = Arc::new(SettingsCache {
            inner: ArcSwap::from_pointee(GatewaySettings::default()),
            fallback_environment,
        });
        cache.store(initial);

        let cache_clone = cache.clone();
        tokio::spawn(async move {
            loop {
                sleep(refresh_interval).await;
                match GatewaySettings::fetch(&pool).await {
                    Ok(settings) => cache_clone.store(settings),
                    Err(e) => tracing::warn!("Gateway settings refresh failed: {}", e),
                }
            }
        });

        cache
    }

    pub fn snapshot(&self) -> Arc<GatewaySettings> {
        self.inner.load_full()
    }

    pub fn store(&self, settings: GatewaySettings) {
        let settings = match &self.fallback_environment {
            Some(environment) => settings.with_default(GLOBAL_AUTH_KEY, environment),
            None => settings,
        };
        self.inner.store(Arc::new(settings));
    }

    pub async fn reload_once(&self, pool: &PgPool) -> anyhow::Result<()> {
        let settings = GatewaySettings::fetch(pool).await?;
        self.store(settings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_values_are_unset() {
        let form_id = Uuid::from_u128(1);
        let settings = GatewaySettings::new()
            .with(format!("{}_environment", form_id), "")
            .with(format!("{}_code", form_id), "DON");

        assert_eq!(settings.form_environment(form_id), None);
        assert_eq!(settings.form_code_prefix(form_id), Some("DON"));
        assert_eq!(settings.global_environment(), None);
    }

    #[test]
    fn fallback_fills_missing_global_environment_only() {
        let cache = SettingsCache {
            inner: ArcSwap::from_pointee(GatewaySettings::default()),
            fallback_environment: Some("development".to_string()),
        };

        cache.store(GatewaySettings::new());
        assert_eq!(cache.snapshot().global_environment(), Some("development"));

        cache.store(GatewaySettings::new().with(GLOBAL_AUTH_KEY, "production"));
        assert_eq!(cache.snapshot().global_environment(), Some("production"));
    }

    #[test]
    fn snapshot_is_replaced_on_store() {
        let cache = SettingsCache::new(GatewaySettings::new().with("a", "1"));
        let before = cache.snapshot();

        cache.store(GatewaySettings::new().with("a", "2"));

        assert_eq!(before.get("a"), Some("1"));
        assert_eq!(cache.snapshot().get("a"), Some("2"));
    }
}
