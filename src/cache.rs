//! Memoization of pipeline results keyed by input identity.
//!
//! A [`Fingerprint`] covers the full configuration plus the size and
//! modification time of every candidate path, so touching, replacing or
//! creating any candidate file produces a new key. The memo keeps at most
//! `capacity` entries and evicts the oldest insertion first.

use std::collections::VecDeque;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::config::DashboardConfig;
use crate::error::Result;
use crate::pipeline::{Dashboard, build_dashboard};

/// Identity of a pipeline input: configuration plus on-disk file state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn of(config: &DashboardConfig) -> Self {
        let mut hasher = DefaultHasher::new();
        config.hash(&mut hasher);

        for path in config
            .station_candidates
            .iter()
            .chain(&config.daily_candidates)
            .chain(&config.trip_candidates)
            .chain(&config.map_candidates)
        {
            hash_file_state(path, &mut hasher);
        }

        Fingerprint(hasher.finish())
    }
}

fn hash_file_state(path: &Path, hasher: &mut DefaultHasher) {
    match std::fs::metadata(path) {
        Ok(meta) => {
            true.hash(hasher);
            meta.len().hash(hasher);
            meta.modified().ok().hash(hasher);
        }
        Err(_) => false.hash(hasher),
    }
}

/// Bounded memo of computed values.
#[derive(Debug)]
pub struct Memo<V> {
    capacity: usize,
    entries: VecDeque<(Fingerprint, Arc<V>)>,
    hits: u64,
    misses: u64,
}

impl<V> Memo<V> {
    /// Creates a memo holding at most `capacity` values (minimum one).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&self, key: Fingerprint) -> Option<Arc<V>> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| Arc::clone(v))
    }

    /// Returns the cached value for `key`, computing and storing it on a miss.
    /// A failed computation is not cached.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: Fingerprint,
        build: impl FnOnce() -> std::result::Result<V, E>,
    ) -> std::result::Result<Arc<V>, E> {
        if let Some(value) = self.get(key) {
            self.hits += 1;
            debug!(?key, "Memo hit");
            return Ok(value);
        }

        self.misses += 1;
        debug!(?key, "Memo miss");
        let value = Arc::new(build()?);

        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((key, Arc::clone(&value)));
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

/// Memo specialised for dashboards.
pub type DashboardCache = Memo<Dashboard>;

impl DashboardCache {
    /// Builds the dashboard for `config`, reusing the previous result when
    /// neither the configuration nor any candidate file changed.
    #[tracing::instrument(skip_all)]
    pub fn dashboard(&mut self, config: &DashboardConfig) -> Result<Arc<Dashboard>> {
        let key = Fingerprint::of(config);
        self.get_or_try_insert_with(key, || build_dashboard(config))
    }
}
