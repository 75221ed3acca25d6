//! Sceneboard Core Library
//!
//! Scene-graph engine for the Sceneboard whiteboard: element storage with
//! undo/redo, section containment, connector routing and an adaptive render
//! cache. Platform-agnostic; painting is left to the host.

pub mod cache;
pub mod config;
pub mod connectors;
pub mod containment;
pub mod error;
pub mod event;
pub mod geometry;
pub mod history;
pub mod scene;
pub mod selection;
pub mod shapes;
pub mod store;
pub mod viewport;

#[cfg(not(target_arch = "wasm32"))]
pub use cache::CacheSweeper;
pub use cache::{complexity_score, CacheManager, CacheStats, RasterConfig, RenderHandle, SharedCacheManager};
pub use config::{CacheConfig, SceneConfig};
pub use connectors::ConnectorEngine;
pub use containment::ContainmentEngine;
pub use error::{ListenerError, RenderError, SceneError, SceneResult};
pub use event::SceneEvent;
pub use geometry::{calculate_path, rect_contains_rect, RoutingMode};
pub use history::{History, HistoryEntry, MAX_UNDO_HISTORY};
pub use scene::{Scene, SubscriptionId};
pub use selection::Selection;
pub use shapes::{Element, ElementId, ElementKind, ElementPatch, End, EndpointRef};
pub use store::{ElementStore, UpdateOptions};
pub use viewport::Viewport;
