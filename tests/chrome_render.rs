//! End-to-end render through headless Chrome

#![cfg(feature = "cdp")]

use std::sync::Arc;

use base64::Engine as _;
use rfrender::cdp::CdpFactory;
use rfrender::{Job, JobRunner, RenderConfig, Viewport};
use tiny_http::{Header, Response, Server};

/// Origin that serves a stylesheet the rendered page links to
fn start_origin() -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();
    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            let response = match request.url() {
                "/static/site.css" => Response::from_string("body { background: #fff; color: #000; }")
                    .with_header("Content-Type: text/css".parse::<Header>().unwrap()),
                _ => Response::from_string("Not Found").with_status_code(404),
            };
            let _ = request.respond(response);
        }
    });
    format!("http://127.0.0.1:{}/page", port)
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_render_job_to_png() {
    let url = start_origin();
    let html = r#"<html><head><link rel="stylesheet" href="/static/site.css"></head><body><h1>Hi</h1></body></html>"#;
    let job = Job::new("chrome-1", url, html, Viewport { width: 800, height: 600 });

    let config = RenderConfig {
        sandbox: std::env::var("CI").is_err(),
        ..Default::default()
    };
    let done = JobRunner::new(job.clone(), Arc::new(CdpFactory), config)
        .run()
        .await
        .expect("render should succeed");

    let png = base64::engine::general_purpose::STANDARD
        .decode(done.image().expect("image"))
        .expect("valid base64");
    assert!(png.len() > 100, "PNG data seems too small");
    assert_eq!(&png[0..8], b"\x89PNG\r\n\x1a\n");

    assert_eq!(done.html, job.html);
    assert_eq!(done.viewport, job.viewport);
    assert_eq!(done.clip, job.clip);
}
