//! Scene and render cache configuration.

use crate::error::{SceneError, SceneResult};
use crate::history::MAX_UNDO_HISTORY;
use serde::{Deserialize, Serialize};

/// Tuning knobs for [`crate::cache::CacheManager`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Memory budget for cached rasterizations.
    pub memory_limit_bytes: usize,
    /// Lifetime of an entry after it is applied.
    pub ttl_ms: u64,
    /// Device pixel ratio used for rasterization cost estimates.
    pub pixel_ratio: f64,
    /// Used/limit ratio above which caching is refused and entries evicted.
    pub pressure_threshold: f64,
    /// Share of entries evicted per pressure eviction.
    pub eviction_fraction: f64,
    /// Elements scoring above this are cached on first request.
    pub complexity_threshold: u32,
    /// Elements rendered at least this many times are cached.
    pub render_count_threshold: u32,
    /// Interval between background expiry sweeps, read by
    /// [`crate::cache::CacheSweeper::from_config`].
    pub sweep_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_limit_bytes: 100 * 1024 * 1024, // 100 MB
            ttl_ms: 30_000,
            pixel_ratio: 1.0,
            pressure_threshold: 0.8,
            eviction_fraction: 0.25,
            complexity_threshold: 50,
            render_count_threshold: 3,
            sweep_interval_ms: 15_000,
        }
    }
}

/// Configuration for a [`crate::Scene`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Maximum number of undo entries kept.
    pub history_limit: usize,
    /// Recompute section membership on every geometry change.
    pub auto_containment: bool,
    pub cache: CacheConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            history_limit: MAX_UNDO_HISTORY,
            auto_containment: false,
            cache: CacheConfig::default(),
        }
    }
}

impl SceneConfig {
    /// Parse a configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> SceneResult<Self> {
        serde_json::from_str(json).map_err(|e| SceneError::Serialization(e.to_string()))
    }

    pub fn to_json(&self) -> SceneResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SceneError::Serialization(e.to_string()))
    }
}
