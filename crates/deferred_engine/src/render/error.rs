//! Render-layer errors
//!
//! Two kinds of failure cross the backend boundary. Missing resources
//! (a uniform a program does not declare, a program that was never
//! registered) are reported so the caller can log them and keep drawing.
//! Device failures abort initialization and propagate with `?`.

/// Errors that can occur during rendering
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Renderer initialization failed during setup
    ///
    /// Raised while creating the targets and buffers a component owns. Treated
    /// as fatal by callers.
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// A named uniform does not exist on the bound program
    #[error("Uniform not found: {name} (program {program})")]
    UniformNotFound {
        /// Program label
        program: String,
        /// Uniform name that failed to resolve
        name: String,
    },

    /// A program was looked up by a name that was never registered
    #[error("Program not found: {0}")]
    ProgramNotFound(String),

    /// A handle does not refer to a live backend resource
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Backend-specific error occurred
    ///
    /// Device loss, out-of-memory and similar conditions the frame cannot
    /// recover from.
    #[error("Device error: {0}")]
    Device(String),
}

impl RenderError {
    /// Whether the error only degrades output and rendering may continue
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UniformNotFound { .. } | Self::ProgramNotFound(_) | Self::ResourceNotFound(_)
        )
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, RenderError>;

/// Log a recoverable failure and continue; propagate anything else.
pub fn log_recoverable(result: BackendResult<()>) -> BackendResult<()> {
    match result {
        Err(err) if err.is_recoverable() => {
            log::error!("{err}");
            Ok(())
        }
        other => other,
    }
}
