//! Chrome DevTools Protocol adapter implementation

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::types::Bounds;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};

use crate::engine::{Engine, EngineFactory, LaunchConfig};
use crate::{ClipRect, Error, Result, ScrollOffset, Viewport};

/// CDP-based engine (uses the `headless_chrome` crate)
///
/// Launches a headless Chrome instance and drives one tab at a time. The clip
/// rectangle is kept on the engine and applied when the screenshot is taken.
pub struct CdpEngine {
    browser: Browser,
    tab: Option<Arc<Tab>>,
    clip: Option<ClipRect>,
    timeout: Duration,
}

impl CdpEngine {
    pub fn launch(launch: &LaunchConfig) -> Result<Self> {
        let args: Vec<&OsStr> = launch.args.iter().map(OsStr::new).collect();

        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(launch.sandbox)
            .ignore_certificate_errors(true)
            .path(launch.chrome_path.clone())
            .idle_browser_timeout(launch.idle_timeout)
            .args(args)
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        Ok(Self {
            browser,
            tab: None,
            clip: None,
            timeout: launch.timeout,
        })
    }

    fn tab(&self) -> Result<&Arc<Tab>> {
        self.tab
            .as_ref()
            .ok_or_else(|| Error::Other("No page is open".into()))
    }

    fn evaluate(&self, script: &str) -> Result<()> {
        self.tab()?
            .evaluate(script, false)
            .map_err(|e| Error::ScriptError(format!("Evaluation failed: {}", e)))?;
        Ok(())
    }
}

impl Engine for CdpEngine {
    fn new_page(&mut self) -> Result<()> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(self.timeout);

        if let Some(old) = self.tab.replace(tab) {
            if let Err(e) = old.close(false) {
                warn!("Failed to close previous tab: {}", e);
            }
        }
        self.clip = None;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.tab()?
            .set_bounds(Bounds::Normal {
                left: Some(0),
                top: Some(0),
                width: Some(viewport.width as f64),
                height: Some(viewport.height as f64),
            })
            .map_err(|e| Error::RenderError(format!("Failed to set viewport: {}", e)))?;
        Ok(())
    }

    fn set_clip_rect(&mut self, clip: ClipRect) -> Result<()> {
        if clip.width <= 0.0 || clip.height <= 0.0 {
            return Err(Error::RenderError(format!(
                "Clip rectangle must have a positive size, got {}x{}",
                clip.width, clip.height
            )));
        }
        self.clip = Some(clip);
        Ok(())
    }

    fn set_user_agent(&mut self, user_agent: &str) -> Result<()> {
        self.tab()?
            .set_user_agent(user_agent, None, None)
            .map_err(|e| Error::RenderError(format!("Failed to set user agent: {}", e)))?;
        Ok(())
    }

    fn load_url(&mut self, url: &str) -> Result<()> {
        let tab = self.tab()?;

        tab.navigate_to(url)
            .map_err(|e| Error::LoadError(format!("Navigation failed: {}", e)))?;

        tab.wait_until_navigated()
            .map_err(|e| Error::LoadError(format!("Wait for navigation failed: {}", e)))?;

        debug!("Navigated to {}", tab.get_url());
        Ok(())
    }

    fn set_content(&mut self, html: &str) -> Result<()> {
        let literal = serde_json::to_string(html)
            .map_err(|e| Error::ScriptError(format!("Failed to encode document: {}", e)))?;
        self.evaluate(&format!(
            "(function(html){{ document.documentElement.innerHTML = html; }})({})",
            literal
        ))
    }

    fn set_scroll_position(&mut self, scroll: ScrollOffset) -> Result<()> {
        self.evaluate(&format!("window.scrollTo({}, {})", scroll.x, scroll.y))
    }

    fn render_png(&self) -> Result<Vec<u8>> {
        let clip = self.clip.map(|c| Page::Viewport {
            x: c.x,
            y: c.y,
            width: c.width,
            height: c.height,
            scale: 1.0,
        });

        self.tab()?
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, clip, true)
            .map_err(|e| Error::RenderError(format!("Screenshot failed: {}", e)))
    }

    fn close(self) -> Result<()> {
        // Dropping the browser terminates the child process.
        drop(self.tab);
        drop(self.browser);
        Ok(())
    }
}

/// Launches a fresh headless Chrome per job
#[derive(Debug, Clone, Copy, Default)]
pub struct CdpFactory;

impl EngineFactory for CdpFactory {
    type Engine = CdpEngine;

    fn launch(&self, launch: &LaunchConfig) -> Result<CdpEngine> {
        CdpEngine::launch(launch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RenderConfig;

    #[test]
    fn test_cdp_engine_launch() {
        // This test requires Chrome to be installed, so we skip it in CI
        if std::env::var("CI").is_ok() {
            return;
        }
        let launch = LaunchConfig::for_rendering(&RenderConfig::default());
        let result = CdpEngine::launch(&launch);
        if let Err(e) = result {
            eprintln!("Skipping CDP launch test because Chrome is not available or failed to launch: {}", e);
            return;
        }
        let mut engine = result.unwrap();
        assert!(engine.new_page().is_ok());
        assert!(engine.close().is_ok());
    }

    #[test]
    fn test_operations_without_page_fail() {
        if std::env::var("CI").is_ok() {
            return;
        }
        let launch = LaunchConfig::for_rendering(&RenderConfig::default());
        let Ok(mut engine) = CdpEngine::launch(&launch) else {
            eprintln!("Skipping: Chrome is not available");
            return;
        };
        assert!(engine.load_url("about:blank").is_err());
        engine.close().ok();
    }
}
