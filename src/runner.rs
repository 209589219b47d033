//! Job runner: owns the proxy and the browser for exactly one job.

use std::sync::Arc;

use log::{error, info, warn};

use crate::async_api::Browser;
use crate::engine::{EngineFactory, LaunchConfig};
use crate::proxy::ProxyServer;
use crate::session::RenderSession;
use crate::{Job, JobFailure, RenderConfig, Result};

/// Lifecycle of a [`JobRunner`]. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Created,
    ServerStarting,
    BrowserLaunching,
    Rendering,
    Done,
    Failed,
}

/// Renders a single job, then is discarded.
///
/// The proxy listener and the browser are scoped to [`JobRunner::run`]: both
/// are released before it returns, on success and on failure. Dropping the
/// future mid-flight releases them too.
pub struct JobRunner<F: EngineFactory> {
    job: Job,
    factory: Arc<F>,
    config: RenderConfig,
    state: RunnerState,
}

impl<F: EngineFactory> JobRunner<F> {
    pub fn new(job: Job, factory: Arc<F>, config: RenderConfig) -> Self {
        Self {
            job,
            factory,
            config,
            state: RunnerState::Created,
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Run the job to a terminal state.
    ///
    /// On success the runner ends in `Done` and the returned job carries its
    /// image. On failure the job is returned unchanged inside the
    /// [`JobFailure`], together with the state the runner failed in.
    pub async fn run(mut self) -> std::result::Result<Job, JobFailure> {
        info!("(runner {}) received job, starting server", self.job.id);
        self.transition(RunnerState::ServerStarting);

        match self.execute().await {
            Ok(image) => {
                self.job.set_image(image);
                self.transition(RunnerState::Done);
                info!("(runner {}) job complete", self.job.id);
                Ok(self.job)
            }
            Err(error) => {
                let state = self.state;
                self.transition(RunnerState::Failed);
                error!("(runner {}) job failed in {:?}: {}", self.job.id, state, error);
                Err(JobFailure {
                    job: self.job,
                    state,
                    error,
                })
            }
        }
    }

    async fn execute(&mut self) -> Result<String> {
        let proxy = ProxyServer::start(&self.job, &self.config).await?;
        info!("(runner {}) server is up, listening on port {}", self.job.id, proxy.port());

        self.transition(RunnerState::BrowserLaunching);
        info!("(runner {}) launching browser", self.job.id);
        let browser = Browser::launch(self.factory.clone(), LaunchConfig::for_rendering(&self.config)).await?;
        info!("(runner {}) browser is ready", self.job.id);

        self.transition(RunnerState::Rendering);
        let rendered = self.render(&browser, proxy.root_url()).await;

        info!("(runner {}) shutting down browser", self.job.id);
        if let Err(e) = browser.close().await {
            warn!("(runner {}) browser did not close cleanly: {}", self.job.id, e);
        }
        proxy.close().await;

        rendered
    }

    async fn render(&self, browser: &Browser, target_url: String) -> Result<String> {
        let page = browser.new_page().await?;
        RenderSession::new(page, &self.job, target_url, self.config.settle_delay())
            .run()
            .await
    }

    fn transition(&mut self, next: RunnerState) {
        log::debug!("(runner {}) {:?} -> {:?}", self.job.id, self.state, next);
        self.state = next;
    }
}
