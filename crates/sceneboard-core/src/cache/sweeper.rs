//! Background expiry sweep for the render cache (native only).

use super::SharedCacheManager;
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Periodically purges expired cache entries on a background thread.
///
/// The thread stops when the sweeper is stopped or dropped.
pub struct CacheSweeper {
    /// Dropping or signalling this ends the sweep loop.
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CacheSweeper {
    /// Start sweeping `cache` at its configured `sweep_interval_ms`.
    pub fn from_config(cache: SharedCacheManager) -> Self {
        let interval = Duration::from_millis(cache.lock().config().sweep_interval_ms.max(1));
        Self::spawn(cache, interval)
    }

    /// Start sweeping `cache` every `interval`.
    pub fn spawn(cache: SharedCacheManager, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = channel::<()>();

        let thread = thread::spawn(move || {
            log::info!("Cache sweeper started (every {:?})", interval);
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let purged = cache.lock().purge_expired();
                        if purged > 0 {
                            log::debug!("Cache sweep purged {} expired entries", purged);
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            log::info!("Cache sweeper stopped");
        });

        Self {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the sweep and wait for the thread to exit.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("Cache sweeper thread panicked");
            }
        }
    }
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheManager, RasterConfig, RenderHandle};
    use crate::config::CacheConfig;
    use crate::error::RenderError;
    use crate::shapes::Element;

    struct NoopHandle;

    impl RenderHandle for NoopHandle {
        fn rasterize(&mut self, _element: &Element, _config: &RasterConfig) -> Result<(), RenderError> {
            Ok(())
        }
    }

    fn expiring_cache(sweep_interval_ms: u64) -> SharedCacheManager {
        let cache = CacheManager::new(CacheConfig {
            ttl_ms: 0,
            sweep_interval_ms,
            ..CacheConfig::default()
        })
        .shared();
        cache
            .lock()
            .apply_cache(&mut NoopHandle, &Element::rectangle(0.0, 0.0, 10.0, 10.0));
        assert_eq!(cache.lock().len(), 1);
        cache
    }

    fn wait_until_empty(cache: &SharedCacheManager) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !cache.lock().is_empty() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_sweeper_purges_and_stops() {
        let cache = expiring_cache(15_000);
        let mut sweeper = CacheSweeper::spawn(cache.clone(), Duration::from_millis(5));
        wait_until_empty(&cache);
        assert!(cache.lock().is_empty());

        sweeper.stop();
        assert!(!sweeper.is_running());
    }

    #[test]
    fn test_sweeper_uses_configured_interval() {
        let cache = expiring_cache(5);
        let sweeper = CacheSweeper::from_config(cache.clone());
        assert!(sweeper.is_running());
        wait_until_empty(&cache);
        assert!(cache.lock().is_empty());
    }
}
