//! Error types for the render worker

use thiserror::Error;

use crate::job::Job;
use crate::runner::RunnerState;
use crate::session::RenderStep;

/// Result type alias for render operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering a job
#[derive(Error, Debug)]
pub enum Error {
    /// The per-job resource proxy could not be started
    #[error("Proxy server failed to start: {0}")]
    ProxyError(String),

    /// Failed to launch or initialize the browser
    #[error("Browser initialization failed: {0}")]
    InitializationError(String),

    /// Failed to load a URL
    #[error("Failed to load URL: {0}")]
    LoadError(String),

    /// Failed to render content
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Failed to execute JavaScript
    #[error("Script execution failed: {0}")]
    ScriptError(String),

    /// A step of the render session failed; the remaining steps were skipped
    #[error("Render step '{step}' failed: {source}")]
    StepFailed {
        step: RenderStep,
        #[source]
        source: Box<Error>,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Reading from or writing to a job queue failed
    #[error("Queue error: {0}")]
    QueueError(String),

    /// A job record could not be encoded or decoded
    #[error("Invalid job record: {0}")]
    JobFormat(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// A job that reached the terminal `Failed` state.
///
/// The job is handed back untouched (no image) so the caller can report it
/// to the queue instead of losing it. `state` is the runner state the job
/// was in when it failed: `ServerStarting` and `BrowserLaunching` are startup
/// failures, `Rendering` means a render step failed.
#[derive(Debug)]
pub struct JobFailure {
    pub job: Job,
    pub state: RunnerState,
    pub error: Error,
}

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job {} failed in {:?}: {}", self.job.id, self.state, self.error)
    }
}

impl std::error::Error for JobFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
