//! Queue collaborators.
//!
//! The renderer never owns the queue. It pulls work from a [`JobSource`] and
//! reports every terminal outcome to a [`JobSink`]: rendered jobs through
//! `submit`, failed jobs through `fail`. Every job that was decoded reaches
//! the sink. A record that cannot be decoded is not a job yet; sources skip
//! it with a warning and count it.

use async_trait::async_trait;
use log::warn;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tokio::sync::mpsc;

use crate::job::FailedJobRecord;
use crate::{Error, Job, Result};

/// Where pending jobs come from
#[async_trait]
pub trait JobSource: Send {
    /// Next pending job, or `None` once the source is exhausted.
    ///
    /// Must be cancel-safe: the worker may drop the returned future before it
    /// resolves and call again later.
    async fn next_job(&mut self) -> Result<Option<Job>>;
}

/// Where finished jobs go
#[async_trait]
pub trait JobSink: Send {
    /// Publish a rendered job (its image is set)
    async fn submit(&mut self, job: Job) -> Result<()>;

    /// Report a job that could not be rendered
    async fn fail(&mut self, job: Job, error: &Error) -> Result<()>;
}

/// In-memory FIFO queue backed by tokio channels.
///
/// The queue handle feeds pending jobs with `push` and reads outcomes back
/// from `done` and `failed`. The worker side gets a [`MemorySource`] and a
/// [`MemorySink`].
pub struct MemoryQueue {
    pending_tx: Option<mpsc::UnboundedSender<Job>>,
    pub done: mpsc::UnboundedReceiver<Job>,
    pub failed: mpsc::UnboundedReceiver<(Job, String)>,
}

/// Pending end of a [`MemoryQueue`]
pub struct MemorySource {
    pending_rx: mpsc::UnboundedReceiver<Job>,
}

/// Done/failed end of a [`MemoryQueue`]
pub struct MemorySink {
    done_tx: mpsc::UnboundedSender<Job>,
    failed_tx: mpsc::UnboundedSender<(Job, String)>,
}

impl MemoryQueue {
    pub fn channel() -> (Self, MemorySource, MemorySink) {
        let (pending_tx, pending_rx) = mpsc::unbounded_channel();
        let (done_tx, done) = mpsc::unbounded_channel();
        let (failed_tx, failed) = mpsc::unbounded_channel();
        (
            Self {
                pending_tx: Some(pending_tx),
                done,
                failed,
            },
            MemorySource { pending_rx },
            MemorySink { done_tx, failed_tx },
        )
    }

    pub fn push(&self, job: Job) -> Result<()> {
        self.pending_tx
            .as_ref()
            .ok_or_else(|| Error::QueueError("Queue is closed for new jobs".into()))?
            .send(job)
            .map_err(|_| Error::QueueError("Pending queue receiver dropped".into()))
    }

    /// Stop accepting jobs; `next_job` returns `None` once the backlog drains.
    pub fn close(&mut self) {
        self.pending_tx = None;
    }
}

#[async_trait]
impl JobSource for MemorySource {
    async fn next_job(&mut self) -> Result<Option<Job>> {
        Ok(self.pending_rx.recv().await)
    }
}

#[async_trait]
impl JobSink for MemorySink {
    async fn submit(&mut self, job: Job) -> Result<()> {
        self.done_tx
            .send(job)
            .map_err(|_| Error::QueueError("Done queue receiver dropped".into()))
    }

    async fn fail(&mut self, job: Job, error: &Error) -> Result<()> {
        self.failed_tx
            .send((job, error.to_string()))
            .map_err(|_| Error::QueueError("Failed queue receiver dropped".into()))
    }
}

/// Reads one JSON job record per line. Blank lines are skipped; a malformed
/// line is logged, counted in [`JsonLinesSource::skipped`] and skipped so one
/// bad record cannot stall the queue.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_no: usize,
    skipped: usize,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            skipped: 0,
        }
    }

    /// Number of malformed records skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> JobSource for JsonLinesSource<R> {
    async fn next_job(&mut self) -> Result<Option<Job>> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| Error::QueueError(format!("Failed to read job: {}", e)))?;

            let Some(line) = line else {
                return Ok(None);
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            match Job::from_json(&line) {
                Ok(job) => return Ok(Some(job)),
                Err(e) => {
                    self.skipped += 1;
                    warn!("Skipping malformed job record on line {}: {}", self.line_no, e);
                }
            }
        }
    }
}

/// Writes each finished job as one JSON line. Failed jobs are written
/// without `image` and with an `error` field.
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    async fn write_line(&mut self, mut line: String) -> Result<()> {
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::QueueError(format!("Failed to write job: {}", e)))?;
        self.writer
            .flush()
            .await
            .map_err(|e| Error::QueueError(format!("Failed to flush job: {}", e)))
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> JobSink for JsonLinesSink<W> {
    async fn submit(&mut self, job: Job) -> Result<()> {
        let line = job.to_json()?;
        self.write_line(line).await
    }

    async fn fail(&mut self, job: Job, error: &Error) -> Result<()> {
        let record = FailedJobRecord {
            job: &job,
            error: error.to_string(),
        };
        let line = serde_json::to_string(&record)?;
        self.write_line(line).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Viewport;

    fn job(id: &str) -> Job {
        Job::new(id, "http://example.com/page", "<p>hi</p>", Viewport { width: 800, height: 600 })
    }

    #[tokio::test]
    async fn memory_queue_is_fifo_and_drains_after_close() {
        let (mut queue, mut source, _sink) = MemoryQueue::channel();
        queue.push(job("a")).unwrap();
        queue.push(job("b")).unwrap();
        queue.close();

        assert_eq!(source.next_job().await.unwrap().unwrap().id, "a");
        assert_eq!(source.next_job().await.unwrap().unwrap().id, "b");
        assert!(source.next_job().await.unwrap().is_none());
        assert!(queue.push(job("c")).is_err());
    }

    #[tokio::test]
    async fn memory_queue_routes_outcomes() {
        let (mut queue, _source, mut sink) = MemoryQueue::channel();
        sink.submit(job("ok")).await.unwrap();
        sink.fail(job("bad"), &Error::InitializationError("no chrome".into()))
            .await
            .unwrap();

        assert_eq!(queue.done.recv().await.unwrap().id, "ok");
        let (failed, reason) = queue.failed.recv().await.unwrap();
        assert_eq!(failed.id, "bad");
        assert!(reason.contains("no chrome"));
    }

    #[tokio::test]
    async fn json_lines_source_skips_blank_and_malformed_lines() {
        let first = job("first").to_json().unwrap();
        let second = job("second").to_json().unwrap();
        let input = format!("{}\n\nnot json\n{}\n", first, second);

        let mut source = JsonLinesSource::new(input.as_bytes());
        assert_eq!(source.next_job().await.unwrap().unwrap().id, "first");
        assert_eq!(source.skipped(), 0);
        assert_eq!(source.next_job().await.unwrap().unwrap().id, "second");
        assert!(source.next_job().await.unwrap().is_none());
        assert_eq!(source.skipped(), 1);
    }

    #[tokio::test]
    async fn json_lines_sink_writes_one_record_per_line() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let mut done = job("done");
        done.set_image("iVBORw0KGgo=".into());
        sink.submit(done).await.unwrap();
        sink.fail(job("failed"), &Error::LoadError("timeout".into())).await.unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["image"], "iVBORw0KGgo=");
        assert!(lines[0].get("error").is_none());
        assert_eq!(lines[1]["id"], "failed");
        assert!(lines[1].get("image").is_none());
        assert!(lines[1]["error"].as_str().unwrap().contains("timeout"));
    }
}
