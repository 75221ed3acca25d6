//! Adaptive render cache.
//!
//! Decides which elements are worth keeping as pre-rasterized bitmaps and
//! keeps the estimated memory those bitmaps use under a configured limit.
//! The cache is a performance layer only: every entry can be dropped at any
//! time and re-created on the next render.

#[cfg(not(target_arch = "wasm32"))]
mod sweeper;

#[cfg(not(target_arch = "wasm32"))]
pub use sweeper::CacheSweeper;

use crate::config::CacheConfig;
use crate::error::RenderError;
use crate::shapes::{Element, ElementId, ElementKind};
use kurbo::Rect;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use web_time::Instant;

/// Cache manager shared between the scene, the renderer and the sweeper.
pub type SharedCacheManager = Arc<Mutex<CacheManager>>;

/// Rasterization parameters recorded with an entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterConfig {
    pub pixel_ratio: f64,
    /// World-space area that was rasterized.
    pub bounds: Rect,
}

/// Renderer-side half of the cache: produces the actual bitmap.
pub trait RenderHandle {
    /// Rasterize `element` and keep the result until told otherwise.
    fn rasterize(&mut self, element: &Element, config: &RasterConfig) -> Result<(), RenderError>;
}

/// One cached rasterization.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub config: RasterConfig,
    /// Estimated bitmap size.
    pub cost_bytes: usize,
    pub access_count: u64,
    pub last_access: Instant,
    pub expires_at: Instant,
}

impl CacheEntry {
    /// Eviction weight: frequently and recently used entries weigh more.
    fn weight(&self, now: Instant) -> f64 {
        let idle = now.duration_since(self.last_access).as_secs_f64();
        self.access_count as f64 / (1.0 + idle)
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Number of live entries.
    pub total_cached: usize,
    pub used_bytes: usize,
    pub limit_bytes: usize,
    /// `used_bytes / limit_bytes`.
    pub memory_pressure: f64,
    /// Accesses that found an entry.
    pub hits: u64,
    /// Accesses that found none.
    pub misses: u64,
    /// Entries dropped to relieve memory pressure.
    pub evictions: u64,
    /// Entries dropped by the expiry sweep.
    pub expirations: u64,
    /// Rasterizations the renderer refused.
    pub failures: u64,
}

/// Complexity heuristic used to decide whether an element is worth caching.
///
/// Hidden elements score 0. Scores are never negative.
pub fn complexity_score(element: &Element) -> u32 {
    if element.hidden {
        return 0;
    }
    let base = match &element.kind {
        ElementKind::Table(t) => t.rows.saturating_mul(t.cols).saturating_mul(2) as f64,
        ElementKind::PenStroke(s) => s.points.len() as f64 / 10.0,
        ElementKind::Text(t) => t.char_count() as f64 / 10.0,
        ElementKind::Image(i) => i.area() / 10_000.0,
        _ => 10.0,
    };
    let rotation_bonus = if element.rotation != 0.0 { 20.0 } else { 0.0 };
    // `as` saturates, and NaN maps to 0.
    (base + rotation_bonus).max(0.0).floor() as u32
}

/// Estimated bitmap size for `bounds` at `pixel_ratio` (RGBA8).
fn estimate_cost(bounds: Rect, pixel_ratio: f64) -> usize {
    (bounds.width() * bounds.height() * 4.0 * pixel_ratio * pixel_ratio).ceil().max(0.0) as usize
}

/// Memory-aware render cache.
#[derive(Debug)]
pub struct CacheManager {
    config: CacheConfig,
    entries: HashMap<ElementId, CacheEntry>,
    /// Times each element was rendered, cached or not.
    render_counts: HashMap<ElementId, u32>,
    /// Selected or edited elements; never evicted.
    protected: HashSet<ElementId>,
    used_bytes: usize,
    stats: CacheStats,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl CacheManager {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            render_counts: HashMap::new(),
            protected: HashSet::new(),
            used_bytes: 0,
            stats: CacheStats::default(),
        }
    }

    /// Wrap in the shared handle used by the scene and the sweeper.
    pub fn shared(self) -> SharedCacheManager {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Whether the renderer should rasterize `element` this frame.
    ///
    /// Under memory pressure this evicts the lowest-weighted share of the
    /// entries and refuses.
    pub fn should_cache(&mut self, element: &Element) -> bool {
        if element.hidden {
            return false;
        }

        let pressure = self.memory_pressure();
        if pressure > self.config.pressure_threshold {
            let evicted = self.evict_fraction();
            log::debug!("Cache pressure {:.2}, evicted {} entries", pressure, evicted);
            return false;
        }

        complexity_score(element) > self.config.complexity_threshold
            || self.render_count(element.id()) >= self.config.render_count_threshold
    }

    /// Rasterize `element` through `handle` and record the entry.
    ///
    /// Returns false when the element cannot be cached this frame: it is
    /// hidden, has no bounds, cannot fit, or the renderer failed.
    pub fn apply_cache(&mut self, handle: &mut dyn RenderHandle, element: &Element) -> bool {
        if element.hidden {
            return false;
        }
        let id = element.id();
        let bounds = match element.bounds() {
            Ok(bounds) => bounds,
            Err(err) => {
                log::debug!("Not caching {id}: {err}");
                return false;
            }
        };

        let pixel_ratio = self.pixel_ratio();
        let cost = estimate_cost(bounds, pixel_ratio);
        if cost > self.config.memory_limit_bytes {
            log::debug!("Not caching {id}: {cost} bytes exceeds the whole budget");
            return false;
        }

        self.remove_entry(id);
        if !self.make_room(cost) {
            return false;
        }

        let config = RasterConfig { pixel_ratio, bounds };
        if let Err(err) = handle.rasterize(element, &config) {
            log::warn!("Rasterizing {id} failed, skipping cache: {err}");
            self.stats.failures += 1;
            return false;
        }

        let now = Instant::now();
        self.entries.insert(
            id,
            CacheEntry {
                config,
                cost_bytes: cost,
                access_count: u64::from(self.render_count(id)),
                last_access: now,
                expires_at: now + self.ttl(),
            },
        );
        self.used_bytes += cost;
        true
    }

    /// Record one render of `id`.
    pub fn track_access(&mut self, id: ElementId) {
        let count = self.render_counts.entry(id).or_insert(0);
        *count = count.saturating_add(1);

        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.access_count += 1;
                entry.last_access = Instant::now();
                self.stats.hits += 1;
            }
            None => self.stats.misses += 1,
        }
    }

    /// Drop the entry for `id`. Returns whether one existed.
    pub fn clear(&mut self, id: ElementId) -> bool {
        self.remove_entry(id)
    }

    /// Drop the entry and the render history of an element that no longer
    /// exists.
    pub fn forget(&mut self, id: ElementId) {
        self.remove_entry(id);
        self.render_counts.remove(&id);
        self.protected.remove(&id);
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
        self.render_counts.clear();
        self.used_bytes = 0;
    }

    /// Change the memory budget, evicting until the cache fits.
    pub fn set_memory_limit(&mut self, bytes: usize) {
        self.config.memory_limit_bytes = bytes;
        if !self.make_room(0) {
            log::debug!(
                "Cache still over its {} byte limit after eviction ({} protected entries)",
                bytes,
                self.protected.len()
            );
        }
    }

    /// Mark the entries that eviction and expiry must keep.
    pub fn set_protected(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        self.protected = ids.into_iter().collect();
    }

    pub fn is_protected(&self, id: ElementId) -> bool {
        self.protected.contains(&id)
    }

    /// Drop expired entries; protected ones get a fresh expiry instead.
    pub fn purge_expired(&mut self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    /// [`CacheManager::purge_expired`] against an explicit clock.
    pub fn purge_expired_at(&mut self, now: Instant) -> usize {
        let ttl = self.ttl();
        let mut expired = Vec::new();
        for (id, entry) in &mut self.entries {
            if entry.expires_at > now {
                continue;
            }
            if self.protected.contains(id) {
                entry.expires_at = now + ttl;
            } else {
                expired.push(*id);
            }
        }
        for id in &expired {
            self.remove_entry(*id);
        }
        self.stats.expirations += expired.len() as u64;
        expired.len()
    }

    pub fn is_cached(&self, id: ElementId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn entry(&self, id: ElementId) -> Option<&CacheEntry> {
        self.entries.get(&id)
    }

    pub fn render_count(&self, id: ElementId) -> u32 {
        self.render_counts.get(&id).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    pub fn memory_pressure(&self) -> f64 {
        match self.config.memory_limit_bytes {
            0 if self.used_bytes == 0 => 0.0,
            0 => f64::INFINITY,
            limit => self.used_bytes as f64 / limit as f64,
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_cached: self.entries.len(),
            used_bytes: self.used_bytes,
            limit_bytes: self.config.memory_limit_bytes,
            memory_pressure: self.memory_pressure(),
            ..self.stats.clone()
        }
    }

    fn ttl(&self) -> Duration {
        Duration::from_millis(self.config.ttl_ms)
    }

    fn pixel_ratio(&self) -> f64 {
        let ratio = self.config.pixel_ratio;
        if ratio.is_finite() && ratio > 0.0 { ratio } else { 1.0 }
    }

    fn remove_entry(&mut self, id: ElementId) -> bool {
        match self.entries.remove(&id) {
            Some(entry) => {
                self.used_bytes = self.used_bytes.saturating_sub(entry.cost_bytes);
                true
            }
            None => false,
        }
    }

    /// Unprotected ids, lightest first; ties go to the least recently used.
    fn eviction_order(&self) -> Vec<ElementId> {
        let now = Instant::now();
        let mut candidates: Vec<(&ElementId, &CacheEntry)> = self
            .entries
            .iter()
            .filter(|(id, _)| !self.protected.contains(*id))
            .collect();
        candidates.sort_by(|(_, a), (_, b)| {
            a.weight(now)
                .total_cmp(&b.weight(now))
                .then_with(|| a.last_access.cmp(&b.last_access))
        });
        candidates.into_iter().map(|(id, _)| *id).collect()
    }

    /// Evict the configured share of entries (at least one).
    fn evict_fraction(&mut self) -> usize {
        let total = self.entries.len();
        if total == 0 {
            return 0;
        }
        let count = ((total as f64 * self.config.eviction_fraction).ceil() as usize).max(1);
        let victims: Vec<ElementId> = self.eviction_order().into_iter().take(count).collect();
        for id in &victims {
            self.remove_entry(*id);
        }
        self.stats.evictions += victims.len() as u64;
        victims.len()
    }

    /// Evict lightest-first until `extra` more bytes fit under the limit.
    fn make_room(&mut self, extra: usize) -> bool {
        let limit = self.config.memory_limit_bytes;
        if self.used_bytes + extra <= limit {
            return true;
        }
        for id in self.eviction_order() {
            self.remove_entry(id);
            self.stats.evictions += 1;
            if self.used_bytes + extra <= limit {
                return true;
            }
        }
        false
    }
}
