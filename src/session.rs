//! Render session: the fixed, ordered protocol that turns a fresh page into
//! a captured image.
//!
//! Each [`RenderStep`] is executed by one call to [`RenderSession::advance`],
//! which awaits the step's browser operation before moving to the next one.
//! A failing step stops the session; no later step runs and no image is
//! produced.

use std::fmt;
use std::time::Duration;

use base64::Engine as Base64Engine;
use log::{debug, info};

use crate::async_api::Page;
use crate::{Error, Job, Result};

/// The steps of a render session, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStep {
    SetViewport,
    SetClipRect,
    SetUserAgent,
    Navigate,
    ReplaceContent,
    Scroll,
    Settle,
    Capture,
}

impl RenderStep {
    pub const ALL: [RenderStep; 8] = [
        RenderStep::SetViewport,
        RenderStep::SetClipRect,
        RenderStep::SetUserAgent,
        RenderStep::Navigate,
        RenderStep::ReplaceContent,
        RenderStep::Scroll,
        RenderStep::Settle,
        RenderStep::Capture,
    ];

    /// The step that follows this one, `None` after capture
    pub fn next(self) -> Option<RenderStep> {
        match self {
            RenderStep::SetViewport => Some(RenderStep::SetClipRect),
            RenderStep::SetClipRect => Some(RenderStep::SetUserAgent),
            RenderStep::SetUserAgent => Some(RenderStep::Navigate),
            RenderStep::Navigate => Some(RenderStep::ReplaceContent),
            RenderStep::ReplaceContent => Some(RenderStep::Scroll),
            RenderStep::Scroll => Some(RenderStep::Settle),
            RenderStep::Settle => Some(RenderStep::Capture),
            RenderStep::Capture => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RenderStep::SetViewport => "set viewport",
            RenderStep::SetClipRect => "set clip rect",
            RenderStep::SetUserAgent => "set user agent",
            RenderStep::Navigate => "navigate",
            RenderStep::ReplaceContent => "replace content",
            RenderStep::Scroll => "scroll",
            RenderStep::Settle => "settle",
            RenderStep::Capture => "capture",
        }
    }
}

impl fmt::Display for RenderStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a session stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// The step that will run on the next `advance`
    Pending(RenderStep),
    /// Base64-encoded PNG of the page
    Captured(String),
    /// A step failed; the session cannot advance any more
    Aborted(RenderStep),
}

/// One render session over one page for one job.
pub struct RenderSession<'a> {
    page: Page,
    job: &'a Job,
    target_url: String,
    settle_delay: Duration,
    state: SessionState,
}

impl<'a> RenderSession<'a> {
    /// `target_url` is what the page navigates to, normally the proxy root.
    pub fn new(page: Page, job: &'a Job, target_url: impl Into<String>, settle_delay: Duration) -> Self {
        Self {
            page,
            job,
            target_url: target_url.into(),
            settle_delay,
            state: SessionState::Pending(RenderStep::SetViewport),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Run the pending step and move to the next state.
    pub async fn advance(&mut self) -> Result<&SessionState> {
        let step = match self.state {
            SessionState::Pending(step) => step,
            SessionState::Captured(_) => {
                return Err(Error::Other("Render session already captured its image".into()))
            }
            SessionState::Aborted(step) => {
                return Err(Error::Other(format!("Render session was aborted at step '{}'", step)))
            }
        };

        debug!("(session {}) step: {}", self.job.id, step);

        match self.run_step(step).await {
            Ok(Some(image)) => self.state = SessionState::Captured(image),
            Ok(None) => {
                self.state = match step.next() {
                    Some(next) => SessionState::Pending(next),
                    None => SessionState::Aborted(step),
                }
            }
            Err(e) => {
                self.state = SessionState::Aborted(step);
                return Err(Error::StepFailed {
                    step,
                    source: Box::new(e),
                });
            }
        }

        Ok(&self.state)
    }

    /// Advance through every step and return the captured image.
    pub async fn run(mut self) -> Result<String> {
        loop {
            if let SessionState::Captured(image) = self.advance().await? {
                let image = image.clone();
                info!("(session {}) done rendering", self.job.id);
                return Ok(image);
            }
        }
    }

    /// Returns the encoded image for the capture step, `None` for every other.
    async fn run_step(&self, step: RenderStep) -> Result<Option<String>> {
        let job = self.job;
        match step {
            RenderStep::SetViewport => {
                info!(
                    "(session {}) adjusting viewport size to {}x{}",
                    job.id, job.viewport.width, job.viewport.height
                );
                self.page.set_viewport(job.viewport).await?;
            }
            RenderStep::SetClipRect => {
                info!(
                    "(session {}) adjusting viewport clipping to {},{} {}x{}",
                    job.id, job.clip.x, job.clip.y, job.clip.width, job.clip.height
                );
                self.page.set_clip_rect(job.clip).await?;
            }
            RenderStep::SetUserAgent => {
                self.page.set_user_agent(&job.user_agent).await?;
            }
            RenderStep::Navigate => {
                info!("(session {}) opening {}", job.id, self.target_url);
                self.page.goto(&self.target_url).await?;
            }
            RenderStep::ReplaceContent => {
                self.page.set_content(&job.html).await?;
            }
            RenderStep::Scroll => {
                info!("(session {}) scrolling page to {},{}", job.id, job.scroll.x, job.scroll.y);
                self.page.scroll_to(job.scroll).await?;
            }
            RenderStep::Settle => {
                // Heuristic: nothing signals that the page is stable.
                tokio::time::sleep(self.settle_delay).await;
            }
            RenderStep::Capture => {
                info!("(session {}) rendering to base64 PNG", job.id);
                let png = self.page.screenshot().await?;
                if png.is_empty() {
                    return Err(Error::RenderError("Screenshot returned no data".into()));
                }
                return Ok(Some(base64::engine::general_purpose::STANDARD.encode(&png)));
            }
        }
        Ok(None)
    }
}
