//! Error types for scene operations.

use crate::shapes::ElementId;
use thiserror::Error;

/// Errors reported by the scene mutation API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    #[error("Element not found: {0}")]
    NotFound(ElementId),
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("Duplicate element id: {0}")]
    DuplicateId(ElementId),
    #[error("History underflow: nothing to restore")]
    HistoryUnderflow,
    #[error("Element is locked: {0}")]
    Locked(ElementId),
    #[error("Element {id} is not a {expected}")]
    WrongKind { id: ElementId, expected: &'static str },
    #[error("Connector {connector} cannot attach to {target}")]
    InvalidAttachment { connector: ElementId, target: ElementId },
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for scene operations.
pub type SceneResult<T> = Result<T, SceneError>;

/// Error returned by an external scene listener.
///
/// Listener failures are logged by the dispatcher and never abort the
/// remaining listeners.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ListenerError(pub String);

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Error reported by a renderer asked to rasterize an element.
///
/// The cache treats it as "do not cache this frame".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Render failed: {0}")]
pub struct RenderError(pub String);

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
