use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

use log::{debug, warn};
use tokio::sync::oneshot;

use crate::engine::{Engine, EngineFactory, LaunchConfig};
use crate::{ClipRect, Error, Result, ScrollOffset, Viewport};

enum Command {
    NewPage(oneshot::Sender<Result<()>>),
    SetViewport(Viewport, oneshot::Sender<Result<()>>),
    SetClipRect(ClipRect, oneshot::Sender<Result<()>>),
    SetUserAgent(String, oneshot::Sender<Result<()>>),
    Goto(String, oneshot::Sender<Result<()>>),
    SetContent(String, oneshot::Sender<Result<()>>),
    Scroll(ScrollOffset, oneshot::Sender<Result<()>>),
    Screenshot(oneshot::Sender<Result<Vec<u8>>>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async browser handle backed by a dedicated engine thread.
///
/// The thread owns the engine and executes commands sent from async tasks,
/// one at a time and in the order they were sent. When the last handle is
/// dropped the command channel closes, the thread exits and the engine is
/// dropped with it, so the browser process never outlives its handles.
pub struct Browser {
    cmd_tx: Sender<Command>,
}

/// A handle to the browser's active page.
pub struct Page {
    cmd_tx: Sender<Command>,
}

impl Browser {
    /// Launch an engine on a new thread and wait until it is ready.
    pub async fn launch<F: EngineFactory>(factory: Arc<F>, launch: LaunchConfig) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx): (oneshot::Sender<Result<()>>, oneshot::Receiver<Result<()>>) =
            oneshot::channel();

        thread::Builder::new()
            .name("rfrender-engine".into())
            .spawn(move || {
                let mut engine = match factory.launch(&launch) {
                    Ok(e) => e,
                    Err(err) => {
                        let _ = init_tx.send(Err(err));
                        return;
                    }
                };

                if init_tx.send(Ok(())).is_err() {
                    // Caller went away before launch finished
                    let _ = engine.close();
                    return;
                }

                while let Ok(cmd) = cmd_rx.recv() {
                    match cmd {
                        Command::NewPage(resp) => {
                            let _ = resp.send(engine.new_page());
                        }
                        Command::SetViewport(viewport, resp) => {
                            let _ = resp.send(engine.set_viewport(viewport));
                        }
                        Command::SetClipRect(clip, resp) => {
                            let _ = resp.send(engine.set_clip_rect(clip));
                        }
                        Command::SetUserAgent(ua, resp) => {
                            let _ = resp.send(engine.set_user_agent(&ua));
                        }
                        Command::Goto(url, resp) => {
                            let _ = resp.send(engine.load_url(&url));
                        }
                        Command::SetContent(html, resp) => {
                            let _ = resp.send(engine.set_content(&html));
                        }
                        Command::Scroll(scroll, resp) => {
                            let _ = resp.send(engine.set_scroll_position(scroll));
                        }
                        Command::Screenshot(resp) => {
                            let _ = resp.send(engine.render_png());
                        }
                        Command::Close(resp) => {
                            let _ = resp.send(engine.close());
                            return;
                        }
                    }
                }

                debug!("Browser handles dropped, shutting engine down");
                if let Err(e) = engine.close() {
                    warn!("Failed to close engine: {}", e);
                }
            })
            .map_err(|e| Error::InitializationError(format!("Failed to spawn engine thread: {}", e)))?;

        init_rx
            .await
            .map_err(|e| Error::InitializationError(format!("Engine launch canceled: {}", e)))??;

        Ok(Self { cmd_tx })
    }

    /// Open a new page; the previous page of this browser, if any, is closed.
    pub async fn new_page(&self) -> Result<Page> {
        request(&self.cmd_tx, Command::NewPage).await?;
        Ok(Page {
            cmd_tx: self.cmd_tx.clone(),
        })
    }

    /// Close the browser and wait for the engine to shut down.
    pub async fn close(self) -> Result<()> {
        request(&self.cmd_tx, Command::Close).await
    }
}

impl Page {
    pub async fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        request(&self.cmd_tx, |tx| Command::SetViewport(viewport, tx)).await
    }

    pub async fn set_clip_rect(&self, clip: ClipRect) -> Result<()> {
        request(&self.cmd_tx, |tx| Command::SetClipRect(clip, tx)).await
    }

    pub async fn set_user_agent(&self, user_agent: &str) -> Result<()> {
        request(&self.cmd_tx, |tx| Command::SetUserAgent(user_agent.to_string(), tx)).await
    }

    /// Navigate to a URL and wait for the load to finish
    pub async fn goto(&self, url: &str) -> Result<()> {
        request(&self.cmd_tx, |tx| Command::Goto(url.to_string(), tx)).await
    }

    /// Replace the document's contents in place
    pub async fn set_content(&self, html: &str) -> Result<()> {
        request(&self.cmd_tx, |tx| Command::SetContent(html.to_string(), tx)).await
    }

    pub async fn scroll_to(&self, scroll: ScrollOffset) -> Result<()> {
        request(&self.cmd_tx, |tx| Command::Scroll(scroll, tx)).await
    }

    /// Capture the page as PNG bytes
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        request(&self.cmd_tx, Command::Screenshot).await
    }
}

async fn request<T>(
    cmd_tx: &Sender<Command>,
    make: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
) -> Result<T> {
    let (tx, rx) = oneshot::channel();
    cmd_tx
        .send(make(tx))
        .map_err(|_| Error::Other("Browser engine has shut down".into()))?;
    rx.await
        .map_err(|e| Error::Other(format!("Browser command canceled: {}", e)))?
}
