//! Browser backend abstraction.
//!
//! An [`Engine`] is one browser instance with one active page. It is driven
//! synchronously from a dedicated thread (see [`crate::async_api`]), so
//! implementations do not need to be `Sync`.

use std::path::PathBuf;
use std::time::Duration;

use crate::{ClipRect, RenderConfig, Result, ScrollOffset, Viewport};

/// Accept any TLS certificate the page's subresources present
pub const FLAG_IGNORE_CERTIFICATE_ERRORS: &str = "--ignore-certificate-errors";
/// Turn off same-origin enforcement; the proxy serves the page from a
/// different origin than its resources
pub const FLAG_DISABLE_WEB_SECURITY: &str = "--disable-web-security";

/// Launch parameters handed to an [`EngineFactory`].
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Extra browser command line flags
    pub args: Vec<String>,
    pub chrome_path: Option<PathBuf>,
    pub sandbox: bool,
    /// Default timeout for waits such as navigation
    pub timeout: Duration,
    pub idle_timeout: Duration,
}

impl LaunchConfig {
    /// Launch parameters for rendering jobs: both fixed flags are always set.
    pub fn for_rendering(config: &RenderConfig) -> Self {
        Self {
            args: vec![
                FLAG_IGNORE_CERTIFICATE_ERRORS.to_string(),
                FLAG_DISABLE_WEB_SECURITY.to_string(),
            ],
            chrome_path: config.chrome_path.clone(),
            sandbox: config.sandbox,
            timeout: Duration::from_millis(config.timeout_ms),
            idle_timeout: Duration::from_millis(config.idle_browser_timeout_ms),
        }
    }
}

/// Core trait for browser backends
pub trait Engine {
    /// Open a fresh page, closing the previous one if any
    fn new_page(&mut self) -> Result<()>;

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    /// Restrict later captures to `clip`
    fn set_clip_rect(&mut self, clip: ClipRect) -> Result<()>;

    fn set_user_agent(&mut self, user_agent: &str) -> Result<()>;

    /// Load a URL and wait for the navigation to finish
    fn load_url(&mut self, url: &str) -> Result<()>;

    /// Replace the contents of the loaded document with `html`
    fn set_content(&mut self, html: &str) -> Result<()>;

    fn set_scroll_position(&mut self, scroll: ScrollOffset) -> Result<()>;

    /// Capture the current page as PNG bytes
    fn render_png(&self) -> Result<Vec<u8>>;

    /// Close the engine and terminate the browser
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Creates engines; one call per job.
pub trait EngineFactory: Send + Sync + 'static {
    type Engine: Engine;

    fn launch(&self, launch: &LaunchConfig) -> Result<Self::Engine>;
}
