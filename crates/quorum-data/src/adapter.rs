//! The data adapter boundary and its caching/fixture implementations

use async_trait::async_trait;
use cached::{Cached, TimedCache};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Error surfaced by a data adapter
#[derive(Debug, Clone, Error)]
pub enum DataError {
    /// The provider has no value for this instrument/metric/time
    #[error("data unavailable for {instrument}/{metric}: {reason}")]
    Unavailable {
        instrument: String,
        metric: String,
        reason: String,
    },

    /// The provider itself failed
    #[error("adapter error: {0}")]
    Adapter(String),
}

impl DataError {
    /// Shorthand for the common unavailable case
    pub fn unavailable(
        instrument: impl Into<String>,
        metric: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DataError::Unavailable {
            instrument: instrument.into(),
            metric: metric.into(),
            reason: reason.into(),
        }
    }
}

/// Boundary to external market/fundamental data providers
///
/// Implementations may be shared across concurrent runs and must be safe for
/// concurrent invocation from multiple nodes; retry and backoff policy, if
/// any, lives behind this boundary so node failures stay uniform.
#[async_trait]
pub trait DataAdapter: Send + Sync {
    /// Fetch one metric for one instrument as of a point in time
    async fn fetch(
        &self,
        instrument_id: &str,
        metric_key: &str,
        as_of: DateTime<Utc>,
    ) -> Result<serde_json::Value, DataError>;
}

/// Cache key for one fetch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FetchKey {
    instrument: String,
    metric: String,
    as_of: i64,
}

/// Read-through memoizing wrapper around another adapter
///
/// Successful fetches are cached per (instrument, metric, as_of) for the
/// configured TTL; failures are never cached, so a recovering provider is
/// retried on the next fetch.
pub struct CachedAdapter<A> {
    inner: A,
    cache: RwLock<TimedCache<FetchKey, serde_json::Value>>,
}

impl<A: DataAdapter> CachedAdapter<A> {
    /// Wrap `inner` with the given cache TTL
    pub fn new(inner: A, ttl: Duration) -> Self {
        Self {
            inner,
            cache: RwLock::new(TimedCache::with_lifespan(ttl)),
        }
    }

    /// Number of live cache entries
    pub async fn len(&self) -> usize {
        self.cache.read().await.cache_size()
    }

    /// Whether the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop all cached entries
    pub async fn clear(&self) {
        self.cache.write().await.cache_clear();
    }
}

#[async_trait]
impl<A: DataAdapter> DataAdapter for CachedAdapter<A> {
    async fn fetch(
        &self,
        instrument_id: &str,
        metric_key: &str,
        as_of: DateTime<Utc>,
    ) -> Result<serde_json::Value, DataError> {
        let key = FetchKey {
            instrument: instrument_id.to_string(),
            metric: metric_key.to_string(),
            as_of: as_of.timestamp(),
        };

        if let Some(value) = self.cache.write().await.cache_get(&key) {
            debug!(instrument = instrument_id, metric = metric_key, "cache hit");
            return Ok(value.clone());
        }

        debug!(instrument = instrument_id, metric = metric_key, "cache miss");
        let value = self.inner.fetch(instrument_id, metric_key, as_of).await?;
        let _ = self.cache.write().await.cache_set(key, value.clone());
        Ok(value)
    }
}

/// In-memory adapter backed by a fixed dataset
///
/// Used by tests and CLI demos; any key absent from the dataset yields
/// `DataError::Unavailable`, which makes degraded-provider scenarios easy to
/// stage.
#[derive(Debug, Clone, Default)]
pub struct FixtureAdapter {
    data: HashMap<(String, String), serde_json::Value>,
}

impl FixtureAdapter {
    /// Create an empty fixture
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one metric value
    pub fn insert(
        &mut self,
        instrument: impl Into<String>,
        metric: impl Into<String>,
        value: serde_json::Value,
    ) {
        self.data.insert((instrument.into(), metric.into()), value);
    }

    /// Builder-style insert
    pub fn with(
        mut self,
        instrument: impl Into<String>,
        metric: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.insert(instrument, metric, value);
        self
    }

    /// Build a fixture from a JSON document shaped as
    /// `{ "<instrument>": { "<metric>": value, ... }, ... }`
    pub fn from_json(document: serde_json::Value) -> Result<Self, DataError> {
        let object = document
            .as_object()
            .ok_or_else(|| DataError::Adapter("fixture document must be an object".to_string()))?;

        let mut fixture = Self::new();
        for (instrument, metrics) in object {
            let metrics = metrics.as_object().ok_or_else(|| {
                DataError::Adapter(format!("fixture entry for '{instrument}' must be an object"))
            })?;
            for (metric, value) in metrics {
                fixture.insert(instrument.clone(), metric.clone(), value.clone());
            }
        }
        Ok(fixture)
    }
}

#[async_trait]
impl DataAdapter for FixtureAdapter {
    async fn fetch(
        &self,
        instrument_id: &str,
        metric_key: &str,
        _as_of: DateTime<Utc>,
    ) -> Result<serde_json::Value, DataError> {
        self.data
            .get(&(instrument_id.to_string(), metric_key.to_string()))
            .cloned()
            .ok_or_else(|| {
                DataError::unavailable(instrument_id, metric_key, "not in fixture dataset")
            })
    }
}
