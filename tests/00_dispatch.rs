mod support;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pushcrab::config::DispatchConfig;
use pushcrab::gateway::{Dialer, RESPONSE_TIMEOUT, SessionPool};
use pushcrab::{Dispatcher, Outcome};
use support::{FakeGateway, MemoryQueue, Reply, TOKEN, record};
use tokio::time::{Instant, timeout};
use tracing_subscriber::fmt::MakeWriter;

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn dispatch_config() -> DispatchConfig {
    DispatchConfig {
        log_successes: true,
        max_delivery_attempts: 3,
        shutdown_grace: Duration::from_secs(1),
    }
}

#[tokio::test]
async fn delivers_a_record_to_the_gateway() {
    let gateway = FakeGateway::start(Reply::Silent).await;
    let queue = MemoryQueue::with_items(Vec::<String>::new());
    let dispatcher = Dispatcher::new(queue.clone(), gateway.pool(1), &dispatch_config());

    let outcome = dispatcher.process(record(9)).await;
    assert_eq!(outcome, Outcome::Sent);
    assert!(queue.pushed().is_empty());

    let frames = gateway.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].identifier, 9);
    assert_eq!(frames[0].token.as_ref(), hex::decode(TOKEN).unwrap().as_slice());
    assert_eq!(
        frames[0].payload.as_ref(),
        br#"{"aps":{"alert":"hi","badge":9}}"#
    );
}

#[tokio::test]
async fn rejected_item_is_requeued_twice_then_dropped() {
    let gateway = FakeGateway::start(Reply::Status(8)).await;
    let queue = MemoryQueue::with_items(Vec::<String>::new());
    let dispatcher = Dispatcher::new(queue.clone(), gateway.pool(1), &dispatch_config());

    let first = dispatcher.process(record(5)).await;
    assert_eq!(first, Outcome::Requeued { attempt: 1 });

    let again = queue.take_front().expect("requeued record");
    assert!(again.contains(r#""_pushcrab_retries":1"#));
    let second = dispatcher.process(again).await;
    assert_eq!(second, Outcome::Requeued { attempt: 2 });

    let again = queue.take_front().expect("requeued record");
    assert!(again.contains(r#""_pushcrab_retries":2"#));
    let third = dispatcher.process(again).await;
    assert_eq!(third, Outcome::Exhausted { attempts: 3 });

    assert!(queue.items().is_empty());
    assert_eq!(queue.pushed().len(), 2);
    assert_eq!(gateway.frames().len(), 3);
}

#[tokio::test]
async fn unreachable_gateway_counts_as_a_failed_send() {
    let pool = SessionPool::init(1, &support::dead_endpoint().await, Dialer::Plain).unwrap();
    let queue = MemoryQueue::with_items(Vec::<String>::new());
    let dispatcher = Dispatcher::new(queue.clone(), pool.clone(), &dispatch_config());

    let outcome = dispatcher.process(record(1)).await;

    assert_eq!(outcome, Outcome::Requeued { attempt: 1 });
    assert_eq!(pool.stats().idle, 1);
}

#[tokio::test]
async fn malformed_records_never_touch_the_pool() {
    let gateway = FakeGateway::start(Reply::Silent).await;
    let pool = gateway.pool(1);
    let queue = MemoryQueue::with_items(Vec::<String>::new());
    let dispatcher = Dispatcher::new(queue.clone(), pool.clone(), &dispatch_config());

    // with the only session checked out, any acquire would hang
    let held = pool.acquire().await.unwrap();

    let missing_data = format!(r#"{{"token": "{TOKEN}", "identifier": 9, "expiry": 3600}}"#);
    let broken = r#""token": "abcd", "identifier": 9}"#.to_string();
    let bad_hex = r#"{"token": "not-hex", "data": {}}"#.to_string();

    for raw in [missing_data, broken, bad_hex] {
        let outcome = timeout(Duration::from_secs(1), dispatcher.process(raw))
            .await
            .expect("malformed record should not wait for a session");
        assert_eq!(outcome, Outcome::Malformed);
    }

    held.release();
    assert!(queue.pushed().is_empty());
    assert!(gateway.frames().is_empty());
}

#[tokio::test]
async fn each_malformed_record_logs_exactly_one_error() {
    let gateway = FakeGateway::start(Reply::Silent).await;
    let queue = MemoryQueue::with_items(Vec::<String>::new());
    let dispatcher = Dispatcher::new(queue.clone(), gateway.pool(1), &dispatch_config());

    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let malformed: Vec<Vec<u8>> = vec![
        b"{not json".to_vec(),
        b"[1, 2]".to_vec(),
        br#"{"token": "aa"}"#.to_vec(),
        br#"{"token": "not-hex", "data": {}}"#.to_vec(),
        format!(r#"{{"token": "{TOKEN}", "identifier": "nine", "data": {{}}}}"#).into_bytes(),
        b"\xff\xfe{}".to_vec(),
    ];
    let count = malformed.len();

    for raw in malformed {
        assert_eq!(dispatcher.process(raw).await, Outcome::Malformed);
    }

    let lines = logs.lines();
    assert_eq!(lines.len(), count, "{lines:#?}");
    assert!(lines.iter().all(|line| line.contains("ERROR")), "{lines:#?}");
    assert!(queue.pushed().is_empty());
    assert!(gateway.frames().is_empty());
}

#[tokio::test]
async fn oversized_payload_is_dropped_without_retry() {
    let gateway = FakeGateway::start(Reply::Silent).await;
    let queue = MemoryQueue::with_items(Vec::<String>::new());
    let dispatcher = Dispatcher::new(queue.clone(), gateway.pool(1), &dispatch_config());

    let alert = "x".repeat(300);
    let raw = format!(r#"{{"token": "{TOKEN}", "data": {{"aps": {{"alert": "{alert}"}}}}}}"#);

    assert_eq!(dispatcher.process(raw).await, Outcome::Rejected);
    assert!(queue.pushed().is_empty());
    assert!(gateway.frames().is_empty());
}

#[tokio::test]
async fn closed_pool_returns_the_record_unchanged() {
    let gateway = FakeGateway::start(Reply::Silent).await;
    let pool = gateway.pool(1);
    pool.shutdown_all().await;

    let queue = MemoryQueue::with_items(Vec::<String>::new());
    let dispatcher = Dispatcher::new(queue.clone(), pool, &dispatch_config());

    assert_eq!(dispatcher.process(record(4)).await, Outcome::Returned);
    assert_eq!(queue.pushed(), vec![record(4)]);
}

#[tokio::test]
async fn run_loop_survives_bad_input_and_drains() {
    let gateway = FakeGateway::start(Reply::Silent).await;
    let pool = gateway.pool(2);
    let queue = MemoryQueue::with_items([
        record(1),
        "{not json".to_string(),
        record(2),
        record(3),
        r#"{"token": "aa"}"#.to_string(),
        record(4),
    ]);
    let mut dispatcher = Dispatcher::new(queue.clone(), pool.clone(), &dispatch_config());

    // the loop only ends when the queue fails; stop it once the queue is empty
    let ran = timeout(Duration::from_millis(300), dispatcher.run()).await;
    assert!(ran.is_err());
    assert!(queue.items().is_empty());

    let aborted = dispatcher.drain(Duration::from_secs(5)).await;
    assert_eq!(aborted, 0);
    assert_eq!(dispatcher.in_flight(), 0);

    let mut ids: Vec<u32> = gateway.frames().iter().map(|f| f.identifier).collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    pool.shutdown_all().await;
    assert!(pool.is_closed());
}

#[tokio::test]
async fn pool_size_bounds_concurrent_sends() {
    let gateway = FakeGateway::start(Reply::Silent).await;
    let pool = gateway.pool(1);
    let queue = MemoryQueue::with_items(Vec::<String>::new());
    let dispatcher = Dispatcher::new(queue, pool.clone(), &dispatch_config());

    // each silent send holds its session for the full response window
    let started = Instant::now();
    let (a, b) = tokio::join!(
        dispatcher.process(record(1)),
        dispatcher.process(record(2))
    );

    assert_eq!(a, Outcome::Sent);
    assert_eq!(b, Outcome::Sent);
    assert!(started.elapsed() >= RESPONSE_TIMEOUT * 2);
    assert_eq!(pool.stats().idle, 1);
    assert_eq!(gateway.frames().len(), 2);
}
