//! Recording engine used by the pipeline tests in place of Chrome.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Instant;

use rfrender::{ClipRect, Engine, EngineFactory, Error, Job, LaunchConfig, Result, ScrollOffset, Viewport};

/// Smallest byte string that starts like a PNG file
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-data";

#[derive(Default)]
pub struct Recorder {
    pub calls: Mutex<Vec<(String, Instant)>>,
    pub launches: Mutex<Vec<LaunchConfig>>,
    /// Body the page received when it navigated
    pub navigated_body: Mutex<Option<String>>,
}

impl Recorder {
    pub fn names(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn time_of(&self, prefix: &str) -> Option<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| n.starts_with(prefix))
            .map(|(_, t)| *t)
    }
}

#[derive(Clone, Default)]
pub struct FakeFactory {
    pub recorder: Arc<Recorder>,
    pub fail_launch: bool,
    /// Engine operation that returns an error
    pub fail_on: Option<&'static str>,
    /// User agent that makes `set_user_agent` fail
    pub broken_user_agent: Option<&'static str>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EngineFactory for FakeFactory {
    type Engine = FakeEngine;

    fn launch(&self, launch: &LaunchConfig) -> Result<FakeEngine> {
        self.recorder.launches.lock().unwrap().push(launch.clone());
        if self.fail_launch {
            return Err(Error::InitializationError("Failed to launch browser: no chrome here".into()));
        }
        Ok(FakeEngine {
            factory: self.clone(),
        })
    }
}

pub struct FakeEngine {
    factory: FakeFactory,
}

impl FakeEngine {
    fn record(&self, op: &'static str, detail: String) -> Result<()> {
        let name = if detail.is_empty() { op.to_string() } else { format!("{} {}", op, detail) };
        self.factory.recorder.calls.lock().unwrap().push((name, Instant::now()));
        if self.factory.fail_on == Some(op) {
            return Err(Error::LoadError(format!("injected failure in {}", op)));
        }
        Ok(())
    }
}

impl Engine for FakeEngine {
    fn new_page(&mut self) -> Result<()> {
        self.record("new_page", String::new())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.record("set_viewport", format!("{}x{}", viewport.width, viewport.height))
    }

    fn set_clip_rect(&mut self, clip: ClipRect) -> Result<()> {
        self.record("set_clip_rect", format!("{},{} {}x{}", clip.x, clip.y, clip.width, clip.height))
    }

    fn set_user_agent(&mut self, user_agent: &str) -> Result<()> {
        self.record("set_user_agent", user_agent.to_string())?;
        if self.factory.broken_user_agent == Some(user_agent) {
            return Err(Error::RenderError("user agent rejected".into()));
        }
        Ok(())
    }

    fn load_url(&mut self, url: &str) -> Result<()> {
        self.record("load_url", url.to_string())?;
        let body = reqwest::blocking::get(url)
            .and_then(|r| r.text())
            .map_err(|e| Error::LoadError(e.to_string()))?;
        *self.factory.recorder.navigated_body.lock().unwrap() = Some(body);
        Ok(())
    }

    fn set_content(&mut self, html: &str) -> Result<()> {
        self.record("set_content", html.len().to_string())
    }

    fn set_scroll_position(&mut self, scroll: ScrollOffset) -> Result<()> {
        self.record("set_scroll_position", format!("{},{}", scroll.x, scroll.y))
    }

    fn render_png(&self) -> Result<Vec<u8>> {
        self.record("render_png", String::new())?;
        Ok(FAKE_PNG.to_vec())
    }

    fn close(self) -> Result<()> {
        self.record("close", String::new())
    }
}

pub fn sample_job(id: &str, url: &str) -> Job {
    let mut job = Job::new(
        id,
        url,
        "<html><body>Hi</body></html>",
        Viewport { width: 800, height: 600 },
    );
    job.user_agent = "RFox-Test/1.0".to_string();
    job
}
