//! Engine error types for typed error handling.
//!
//! Backends report failures as `anyhow::Error`; the engine wraps them into
//! [`Error`] so the boundary can map every failure to a status code.

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Engine errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A camera-scoped operation named a camera the directory doesn't know.
    #[error("requested camera {camera:?} not found")]
    CameraNotFound { camera: String },

    /// Object store call failed.
    #[error("object store error: {0:#}")]
    Storage(#[source] anyhow::Error),

    /// Catalog index call failed.
    #[error("catalog error: {0:#}")]
    Catalog(#[source] anyhow::Error),

    /// Camera directory could not be loaded.
    #[error("camera directory error: {0:#}")]
    CameraDirectory(#[source] anyhow::Error),

    /// A batch exceeded the catalog's commit limit.
    #[error("batch of {size} entries exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },

    /// A pagination cursor could not be decoded.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// A spawned task panicked or was cancelled.
    #[error("task failed to complete: {0}")]
    TaskPanicked(String),

    /// The caller-level deadline elapsed.
    #[error("operation '{operation}' exceeded its deadline of {timeout_secs}s")]
    DeadlineExceeded {
        operation: String,
        timeout_secs: u64,
    },

    /// A scan request could not be enqueued.
    #[error("scan trigger error: {0:#}")]
    Trigger(#[source] anyhow::Error),

    /// Duration probing failed.
    #[error("probe failed for {path}: {source:#}")]
    Probe {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Missing or wrong shared secret.
    #[error("unauthorized")]
    Unauthorized,
}

impl Error {
    /// Create a camera not found error.
    pub fn camera_not_found(camera: impl Into<String>) -> Self {
        Self::CameraNotFound {
            camera: camera.into(),
        }
    }

    /// Create a deadline exceeded error.
    pub fn deadline_exceeded(operation: impl Into<String>, timeout_secs: u64) -> Self {
        Self::DeadlineExceeded {
            operation: operation.into(),
            timeout_secs,
        }
    }

    /// Get the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::CameraNotFound { .. } => 404,
            Self::InvalidCursor(_) => 400,
            Self::Unauthorized => 401,
            Self::DeadlineExceeded { .. } => 504,
            Self::Storage(_)
            | Self::Catalog(_)
            | Self::CameraDirectory(_)
            | Self::BatchTooLarge { .. }
            | Self::TaskPanicked(_)
            | Self::Trigger(_)
            | Self::Probe { .. }
            | Self::Config(_) => 500,
        }
    }
}
