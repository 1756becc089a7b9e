//! In-memory read-mostly lookup cache.
//!
//! Loaded once from a YAML document at startup and handed out as borrowed
//! snapshots; `reload()` builds a brand-new `CacheData` and swaps it in
//! atomically so a reader that grabbed a snapshot before the reload never
//! observes a half-reloaded map.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use serde::Deserialize;

use crate::provider::Provider;

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
}

fn default_multiplier() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
struct StrategyEntry {
    name: String,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default)]
    tradetron_urls: Vec<WebhookConfig>,
    #[serde(default)]
    algotest_urls: Vec<WebhookConfig>,
}

fn default_active() -> bool {
    true
}

/// Raw shape of the `cache:` document.
#[derive(Debug, Clone, Deserialize)]
struct CacheDocument {
    #[serde(default)]
    strategies: Vec<StrategyEntry>,
    #[serde(default)]
    index_mappings: HashMap<String, i64>,
    #[serde(default)]
    lot_sizes: HashMap<String, i64>,
    #[serde(default)]
    monthly_expiry: HashMap<String, HashMap<String, String>>,
}

#[derive(Debug, Clone, Default)]
pub struct CacheData {
    active: HashMap<String, bool>,
    webhooks: HashMap<(String, Provider), Vec<WebhookConfig>>,
    index_mappings: HashMap<String, i64>,
    lot_sizes: HashMap<String, i64>,
    monthly_expiry: HashMap<String, HashMap<String, String>>,
}

impl CacheData {
    fn from_document(doc: CacheDocument) -> Self {
        let mut active = HashMap::new();
        let mut webhooks = HashMap::new();
        for s in doc.strategies {
            active.insert(s.name.clone(), s.active);
            if !s.tradetron_urls.is_empty() {
                webhooks.insert((s.name.clone(), Provider::Tradetron), s.tradetron_urls);
            }
            if !s.algotest_urls.is_empty() {
                webhooks.insert((s.name.clone(), Provider::Algotest), s.algotest_urls);
            }
        }
        Self {
            active,
            webhooks,
            index_mappings: doc.index_mappings,
            lot_sizes: doc.lot_sizes,
            monthly_expiry: doc.monthly_expiry,
        }
    }
}

/// Ownership root for all cache maps; components receive a cheap `Arc`
/// snapshot, never a lock guard — the cache is read-mostly and `reload`
/// is the sole writer. Passed by reference into every component rather than
/// reached via a global singleton.
pub struct Cache {
    data: ArcSwap<CacheData>,
    path: Option<std::path::PathBuf>,
}

impl Cache {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, crate::error::PipelineError> {
        let path = path.as_ref().to_path_buf();
        let data = Self::read(&path).map_err(|source| crate::error::PipelineError::CacheLoad {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            data: ArcSwap::from_pointee(data),
            path: Some(path),
        })
    }

    /// Builds a cache from an in-memory YAML document. `reload()` is
    /// unavailable on a cache constructed this way (used in tests).
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let doc: CacheDocument =
            serde_yaml::from_str(yaml).context("parsing cache YAML")?;
        Ok(Self {
            data: ArcSwap::from_pointee(CacheData::from_document(doc)),
            path: None,
        })
    }

    fn read(path: &Path) -> Result<CacheData> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading cache file {}", path.display()))?;
        let doc: CacheDocument = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing cache YAML {}", path.display()))?;
        Ok(CacheData::from_document(doc))
    }

    /// Full clear-and-reload. Must not run while readers assume a stable
    /// snapshot mid-operation; in practice each lookup takes its own
    /// snapshot so a reload racing a lookup is always consistent, just
    /// possibly stale by one generation.
    pub fn reload(&self) -> Result<()> {
        let path = self
            .path
            .as_ref()
            .context("cache has no backing file to reload from")?;
        let fresh = Self::read(path)?;
        self.data.store(Arc::new(fresh));
        Ok(())
    }

    fn snapshot(&self) -> Arc<CacheData> {
        self.data.load_full()
    }

    pub fn strategy_is_active(&self, strategy: &str) -> bool {
        self.snapshot().active.get(strategy).copied().unwrap_or(false)
    }

    /// Looks up `(strategy, provider)`; on miss, falls back to
    /// `(strategy, Provider::Tradetron)` before giving up.
    pub fn webhooks_for(&self, strategy: &str, provider: Provider) -> Option<Vec<WebhookConfig>> {
        let snap = self.snapshot();
        if let Some(v) = snap.webhooks.get(&(strategy.to_string(), provider)) {
            return Some(v.clone());
        }
        if provider != Provider::Tradetron {
            if let Some(v) = snap
                .webhooks
                .get(&(strategy.to_string(), Provider::Tradetron))
            {
                tracing::debug!(strategy, ?provider, "falling back to tradetron webhooks");
                return Some(v.clone());
            }
        }
        None
    }

    pub fn index_id(&self, index: &str) -> Option<i64> {
        self.snapshot().index_mappings.get(index).copied()
    }

    pub fn lot_size(&self, index: &str) -> Option<i64> {
        self.snapshot().lot_sizes.get(index).copied()
    }

    /// Resolves a month-only expiry (`"OCT"`, case-insensitive) for `index`.
    pub fn monthly_expiry(&self, index: &str, month3: &str) -> Option<String> {
        let snap = self.snapshot();
        let months = snap.monthly_expiry.get(index)?;
        let month3 = month3.to_uppercase();
        months.get(&month3).cloned()
    }
}
