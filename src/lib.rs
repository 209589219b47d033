//! RFox Render Worker
//!
//! Renders HTML jobs into PNG images with a headless browser. Each job gets
//! its own short-lived resource proxy and browser instance:
//!
//! 1. a [`ProxyServer`] on an ephemeral loopback port serves the job's HTML
//!    at `/` and relays every other request to the job's origin;
//! 2. a browser is launched with certificate errors ignored and web security
//!    disabled;
//! 3. a [`RenderSession`] configures a fresh page, navigates it to the proxy,
//!    replaces its content with the job's HTML, scrolls, waits for the settle
//!    delay and captures a base64 PNG.
//!
//! A [`JobRunner`] sequences these for one job and releases the proxy and the
//! browser on every exit path. A [`Worker`] pulls jobs from a [`JobSource`]
//! and reports them to a [`JobSink`], failures included.
//!
//! # Features
//!
//! - **cdp** (default): Chrome DevTools Protocol backend via headless Chrome
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "cdp")]
//! # async fn render() -> rfrender::Result<()> {
//! use std::sync::Arc;
//! use rfrender::{cdp::CdpFactory, Job, JobRunner, RenderConfig, Viewport};
//!
//! let job = Job::new(
//!     "job-1",
//!     "http://example.com/page",
//!     "<html><body>Hi</body></html>",
//!     Viewport { width: 800, height: 600 },
//! );
//! let runner = JobRunner::new(job, Arc::new(CdpFactory), RenderConfig::default());
//! match runner.run().await {
//!     Ok(job) => println!("{} bytes of base64", job.image().unwrap_or_default().len()),
//!     Err(failure) => eprintln!("{}", failure),
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, JobFailure, Result};

pub mod config;
pub use config::RenderConfig;

pub mod job;
pub use job::{ClipRect, Job, ScrollOffset, Viewport};

pub mod engine;
pub use engine::{Engine, EngineFactory, LaunchConfig};

#[cfg(feature = "cdp")]
pub mod cdp;

// Async browser/page handles over a dedicated engine thread
pub mod async_api;
pub use async_api::{Browser, Page};

pub mod proxy;
pub use proxy::ProxyServer;

pub mod session;
pub use session::{RenderSession, RenderStep, SessionState};

pub mod runner;
pub use runner::{JobRunner, RunnerState};

pub mod queue;
pub use queue::{JobSink, JobSource};

pub mod worker;
pub use worker::{Worker, WorkerStats};
