//! Worker configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Configuration shared by every job the worker renders.
///
/// The defaults mirror what the renderer has always done: a 300ms settle
/// delay before capture and a single browser per job. `sandbox` refers to the
/// OS-level Chrome sandbox; web security is always disabled for rendered
/// pages because their subresources are served cross-origin by the proxy.
///
/// # Examples
///
/// ```
/// let cfg = rfrender::RenderConfig::default();
/// assert_eq!(cfg.settle_delay_ms, 300);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Wait between scrolling and capture, in milliseconds
    pub settle_delay_ms: u64,
    /// Default timeout for browser waits (navigation) in milliseconds
    pub timeout_ms: u64,
    /// Timeout for requests the proxy makes to the job's origin
    pub upstream_timeout_ms: u64,
    /// Browser binary; auto-detected when `None`
    pub chrome_path: Option<PathBuf>,
    /// Whether to keep Chrome's OS sandbox enabled
    pub sandbox: bool,
    /// How long an idle browser connection is kept before it is considered dead
    pub idle_browser_timeout_ms: u64,
    /// Maximum number of jobs rendered at the same time
    pub concurrency: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 300,
            timeout_ms: 30000,
            upstream_timeout_ms: 30000,
            chrome_path: None,
            sandbox: true,
            idle_browser_timeout_ms: 60000,
            concurrency: num_cpus::get(),
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::ConfigError("concurrency must be at least 1".into()));
        }
        if self.timeout_ms == 0 || self.upstream_timeout_ms == 0 {
            return Err(Error::ConfigError("timeouts must be greater than zero".into()));
        }
        if self.idle_browser_timeout_ms == 0 {
            return Err(Error::ConfigError("idle browser timeout must be greater than zero".into()));
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }
}
