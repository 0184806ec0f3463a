//! In-memory entry loader
//!
//! Resolves entries from a fixed catalog. Used by the CLI simulator and in
//! tests; real deployments plug in a provider-backed [`MediaEntryLoader`].

use crate::{player::MediaEntryLoader, Error, MediaEntry, MediaOptions, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Catalog-backed loader with optional latency and failure injection
///
/// ```
/// # tokio_test::block_on(async {
/// use kino_playlist::{MediaEntryLoader, MediaOptions, ProviderVariant, StaticEntryLoader};
///
/// let loader = StaticEntryLoader::new().with_failure("0_gone");
/// let options = MediaOptions::new("0_gone", ProviderVariant::default());
///
/// assert!(loader.load_media(&options).await.is_err());
/// assert_eq!(loader.load_count(), 1);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct StaticEntryLoader {
    catalog: HashMap<String, MediaEntry>,
    failing: HashSet<String>,
    latency: Option<Duration>,
    loads: AtomicUsize,
}

impl StaticEntryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a loader from fully resolved entries
    pub fn from_entries(entries: impl IntoIterator<Item = MediaEntry>) -> Self {
        let mut loader = Self::new();
        for entry in entries {
            loader = loader.with_entry(entry);
        }
        loader
    }

    /// Add a resolved entry to the catalog
    pub fn with_entry(mut self, entry: MediaEntry) -> Self {
        self.catalog.insert(entry.id.clone(), entry);
        self
    }

    /// Make every load of `entry_id` fail
    pub fn with_failure(mut self, entry_id: impl Into<String>) -> Self {
        self.failing.insert(entry_id.into());
        self
    }

    /// Delay every load
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of loads started so far
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaEntryLoader for StaticEntryLoader {
    async fn load_media(&self, options: &MediaOptions) -> Result<MediaEntry> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        debug!(entry_id = %options.entry_id, "Loading entry from catalog");

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing.contains(&options.entry_id) {
            return Err(Error::entry_load(&options.entry_id, "provider rejected the request"));
        }

        let entry = self
            .catalog
            .get(&options.entry_id)
            .cloned()
            .ok_or_else(|| Error::entry_load(&options.entry_id, "entry not found"))?;

        if !entry.has_sources() {
            return Err(Error::NoSources { entry_id: entry.id });
        }

        Ok(entry)
    }
}
