//! Per-job resource proxy.
//!
//! A short-lived HTTP listener on an ephemeral loopback port. `GET /` answers
//! with the job's HTML; every other path is fetched from the job's origin and
//! relayed back with the upstream status, headers and body.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};
use reqwest::blocking::Client;
use tiny_http::{Header, Request, Response, Server};
use tokio::sync::oneshot;
use url::Url;

use crate::{Error, Job, RenderConfig, Result};

/// Response headers that describe the upstream connection rather than the
/// resource, so they are not copied onto the proxied response.
const HOP_BY_HOP_HEADERS: &[&str] = &["connection", "keep-alive", "transfer-encoding", "content-length"];

struct ProxyTarget {
    job_id: String,
    source_url: String,
    html: String,
}

/// Handle to a running resource proxy.
///
/// The listener stays up until [`ProxyServer::close`] is called or the handle
/// is dropped.
pub struct ProxyServer {
    server: Arc<Server>,
    port: u16,
    thread: Option<JoinHandle<()>>,
}

impl ProxyServer {
    /// Bind a listener on `127.0.0.1:0` serving `job`.
    ///
    /// Returns once the listener is accepting connections.
    pub async fn start(job: &Job, config: &RenderConfig) -> Result<Self> {
        let target = Arc::new(ProxyTarget {
            job_id: job.id.clone(),
            source_url: job.url.clone(),
            html: job.html.clone(),
        });
        let upstream_timeout = config.upstream_timeout();

        let (ready_tx, ready_rx): (oneshot::Sender<Result<(Arc<Server>, u16)>>, _) = oneshot::channel();

        let thread = thread::Builder::new()
            .name(format!("rfrender-proxy-{}", target.job_id))
            .spawn(move || {
                // The blocking client owns a runtime of its own, so it is built
                // and dropped on this thread rather than inside the caller's.
                let client = match Client::builder().timeout(upstream_timeout).build() {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = ready_tx.send(Err(Error::ProxyError(format!("Failed to build HTTP client: {}", e))));
                        return;
                    }
                };

                let server = match Server::http("127.0.0.1:0") {
                    Ok(s) => Arc::new(s),
                    Err(e) => {
                        let _ = ready_tx.send(Err(Error::ProxyError(format!("Failed to bind listener: {}", e))));
                        return;
                    }
                };

                let port = match server.server_addr().to_ip() {
                    Some(addr) => addr.port(),
                    None => {
                        let _ = ready_tx.send(Err(Error::ProxyError("Listener is not bound to a TCP port".into())));
                        return;
                    }
                };

                if ready_tx.send(Ok((server.clone(), port))).is_err() {
                    return;
                }

                for request in server.incoming_requests() {
                    if request.url() == "/" {
                        serve_document(&target, request);
                        continue;
                    }

                    let fetch_target = target.clone();
                    let fetch_client = client.clone();
                    let spawned = thread::Builder::new()
                        .name("rfrender-proxy-fetch".into())
                        .spawn(move || proxy_request(&fetch_target, &fetch_client, request));
                    if let Err(e) = spawned {
                        warn!("(proxy {}) failed to spawn fetch thread: {}", target.job_id, e);
                    }
                }
            })
            .map_err(|e| Error::ProxyError(format!("Failed to spawn proxy thread: {}", e)))?;

        let (server, port) = ready_rx
            .await
            .map_err(|e| Error::ProxyError(format!("Proxy startup canceled: {}", e)))??;

        info!("(proxy {}) listening on port {}", job.id, port);

        Ok(Self {
            server,
            port,
            thread: Some(thread),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL the browser navigates to in order to load the job's document
    pub fn root_url(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }

    /// Stop accepting connections and wait for the listener thread to exit.
    ///
    /// The join runs on the blocking pool so a listener stuck answering a
    /// slow client does not stall the async worker. Fetches already in
    /// flight finish on their own threads.
    pub async fn close(mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.server.unblock();
        let port = self.port;
        match tokio::task::spawn_blocking(move || thread.join()).await {
            Ok(Ok(())) => debug!("(proxy) listener on port {} closed", port),
            Ok(Err(_)) => warn!("(proxy) listener thread on port {} panicked", port),
            Err(e) => warn!("(proxy) failed to join listener on port {}: {}", port, e),
        }
    }
}

impl Drop for ProxyServer {
    /// Unblocks the listener without joining it; the thread exits on its own.
    fn drop(&mut self) {
        if self.thread.take().is_some() {
            self.server.unblock();
            debug!("(proxy) listener on port {} released", self.port);
        }
    }
}

/// Resolve the upstream URL for a path requested from the proxy.
///
/// The browser asks the proxy for every subresource by absolute path, so the
/// original form of the reference is lost. The rule here is a compromise:
/// a path with more than one segment (`/assets/x.js`) is treated as
/// root-relative and resolves against the origin of `source_url`, keeping
/// its scheme, host and port. A single-segment path (`/style.css`) and a path
/// without a leading slash are appended verbatim to `source_url`. A genuinely
/// root-relative `/main.css` is therefore fetched below `source_url`.
pub fn resolve_resource_url(source_url: &str, path: &str) -> Result<String> {
    if !is_root_relative(path) {
        return Ok(format!("{}{}", source_url, path));
    }

    let parsed = Url::parse(source_url)
        .map_err(|e| Error::NetworkError(format!("Invalid source URL '{}': {}", source_url, e)))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::NetworkError(format!("Source URL '{}' has no host", source_url)))?;

    let origin = match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    };

    Ok(format!("{}{}", origin, path))
}

fn is_root_relative(path: &str) -> bool {
    match path.strip_prefix('/') {
        Some(rest) => rest.split(|c| c == '?' || c == '#').next().unwrap_or("").contains('/'),
        None => false,
    }
}

fn serve_document(target: &ProxyTarget, request: Request) {
    let mut response = Response::from_data(target.html.as_bytes().to_vec());
    if let Ok(h) = Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..]) {
        response.add_header(h);
    }
    if let Err(e) = request.respond(response) {
        warn!("(proxy {}) failed to send document: {}", target.job_id, e);
    }
}

fn proxy_request(target: &ProxyTarget, client: &Client, mut request: Request) {
    let path = request.url().to_string();

    let result = resolve_resource_url(&target.source_url, &path).and_then(|upstream| {
        debug!("(proxy {}) proxying {} -> {}", target.job_id, path, upstream);
        fetch_upstream(client, &mut request, &upstream)
    });

    let response = match result {
        Ok(r) => r,
        Err(e) => {
            warn!("(proxy {}) proxying error for {}: {}", target.job_id, path, e);
            Response::from_data(format!("Bad gateway: {}", e).into_bytes()).with_status_code(502)
        }
    };

    if let Err(e) = request.respond(response) {
        warn!("(proxy {}) failed to send response for {}: {}", target.job_id, path, e);
    }
}

fn fetch_upstream(client: &Client, request: &mut Request, upstream: &str) -> Result<Response<std::io::Cursor<Vec<u8>>>> {
    let method = reqwest::Method::from_bytes(request.method().as_str().as_bytes())
        .map_err(|e| Error::NetworkError(format!("Unsupported method: {}", e)))?;

    let mut body = Vec::new();
    request
        .as_reader()
        .read_to_end(&mut body)
        .map_err(|e| Error::NetworkError(format!("Failed to read request body: {}", e)))?;

    let mut builder = client.request(method, upstream);
    if !body.is_empty() {
        builder = builder.body(body);
    }

    let upstream_res = builder
        .send()
        .map_err(|e| Error::NetworkError(format!("Upstream request failed: {}", e)))?;

    let status = upstream_res.status().as_u16();
    let headers = upstream_res
        .headers()
        .iter()
        .filter(|(name, _)| !HOP_BY_HOP_HEADERS.contains(&name.as_str()))
        .filter_map(|(name, value)| Header::from_bytes(name.as_str().as_bytes(), value.as_bytes()).ok())
        .collect::<Vec<_>>();

    let bytes = upstream_res
        .bytes()
        .map_err(|e| Error::NetworkError(format!("Failed to read upstream body: {}", e)))?;

    let mut response = Response::from_data(bytes.to_vec()).with_status_code(status);
    for header in headers {
        response.add_header(header);
    }
    Ok(response)
}
