//! Worker tests: queue in, outcomes out

mod support;

use rfrender::queue::{JsonLinesSink, JsonLinesSource, MemoryQueue};
use rfrender::{Error, RenderConfig, Worker, WorkerStats};
use support::{sample_job, FakeFactory};

fn config() -> RenderConfig {
    RenderConfig {
        settle_delay_ms: 5,
        concurrency: 2,
        ..Default::default()
    }
}

#[tokio::test]
async fn every_job_is_either_submitted_or_failed() {
    let factory = FakeFactory {
        broken_user_agent: Some("broken"),
        ..FakeFactory::new()
    };
    let worker = Worker::new(factory, config()).unwrap();
    let (mut queue, mut source, mut sink) = MemoryQueue::channel();

    queue.push(sample_job("a", "http://example.com/a")).unwrap();
    let mut broken = sample_job("b", "http://example.com/b");
    broken.user_agent = "broken".into();
    queue.push(broken).unwrap();
    queue.push(sample_job("c", "http://example.com/c")).unwrap();
    queue.close();

    let stats = worker
        .run(&mut source, &mut sink, std::future::pending())
        .await
        .unwrap();
    assert_eq!(stats, WorkerStats { completed: 2, failed: 1 });

    let mut done = Vec::new();
    while let Ok(job) = queue.done.try_recv() {
        assert!(job.image().is_some());
        done.push(job.id);
    }
    done.sort();
    assert_eq!(done, vec!["a", "c"]);

    let (failed, reason) = queue.failed.try_recv().unwrap();
    assert_eq!(failed.id, "b");
    assert!(failed.image().is_none());
    assert!(reason.contains("set user agent"), "{}", reason);
}

#[tokio::test]
async fn launch_failures_are_not_dropped() {
    let factory = FakeFactory {
        fail_launch: true,
        ..FakeFactory::new()
    };
    let worker = Worker::new(factory, config()).unwrap();
    let (mut queue, mut source, mut sink) = MemoryQueue::channel();
    queue.push(sample_job("x", "http://example.com/x")).unwrap();
    queue.close();

    let stats = worker
        .run(&mut source, &mut sink, std::future::pending())
        .await
        .unwrap();
    assert_eq!(stats, WorkerStats { completed: 0, failed: 1 });
    assert!(queue.done.try_recv().is_err());
    let (failed, reason) = queue.failed.try_recv().unwrap();
    assert_eq!(failed.id, "x");
    assert!(reason.contains("no chrome"));
}

#[tokio::test]
async fn shutdown_stops_pulling_new_jobs() {
    let worker = Worker::new(FakeFactory::new(), config()).unwrap();
    let (mut queue, mut source, mut sink) = MemoryQueue::channel();
    queue.push(sample_job("late", "http://example.com/late")).unwrap();

    let stats = worker
        .run(&mut source, &mut sink, std::future::ready(()))
        .await
        .unwrap();
    assert_eq!(stats, WorkerStats::default());
    assert!(queue.done.try_recv().is_err());
}

#[tokio::test]
async fn json_lines_round_trip_through_worker() {
    let input = [
        sample_job("one", "http://example.com/1").to_json().unwrap(),
        sample_job("two", "http://example.com/2").to_json().unwrap(),
    ]
    .join("\n");

    let worker = Worker::new(FakeFactory::new(), config()).unwrap();
    let mut source = JsonLinesSource::new(input.as_bytes());
    let mut sink = JsonLinesSink::new(Vec::new());

    let stats = worker
        .run(&mut source, &mut sink, std::future::pending())
        .await
        .unwrap();
    assert_eq!(stats.completed, 2);

    let output = String::from_utf8(sink.into_inner()).unwrap();
    let records: Vec<serde_json::Value> = output
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert!(record["image"].as_str().is_some_and(|s| !s.is_empty()));
        assert_eq!(record["browserWidth"], 800);
    }
}

#[test]
fn worker_rejects_invalid_config() {
    let cfg = RenderConfig {
        concurrency: 0,
        ..Default::default()
    };
    assert!(matches!(Worker::new(FakeFactory::new(), cfg), Err(Error::ConfigError(_))));
}
