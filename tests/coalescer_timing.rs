// tests/coalescer_timing.rs
//
// Runs on a paused Tokio clock: sleeps and timeouts complete instantly in
// real time while virtual time advances exactly as the coalescer asks.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{events, init_tracing, ConfigFileBuilder};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use sigwatch::config::CoalesceSection;
use sigwatch::pipeline::{Coalescer, Event, WorkQueue};
use sigwatch::types::{BackpressurePolicy, DuplicatePolicy};

fn settings(policy: DuplicatePolicy) -> CoalesceSection {
    let cfg = ConfigFileBuilder::new()
        .with_dwell_ms(5_000)
        .with_poll_ms(100)
        .with_policy(policy)
        .build();
    cfg.coalesce
}

struct Harness {
    inbox: mpsc::Sender<Event>,
    queue: Arc<WorkQueue>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

fn start(policy: DuplicatePolicy, capacity: usize, backpressure: BackpressurePolicy) -> Harness {
    let (inbox, rx) = mpsc::channel(64);
    let queue = Arc::new(WorkQueue::new(capacity, backpressure));
    let cancel = CancellationToken::new();
    let coalescer = Coalescer::new(&settings(policy), rx, Arc::clone(&queue));
    let task = tokio::spawn(coalescer.run(cancel.clone()));
    Harness {
        inbox,
        queue,
        cancel,
        task,
    }
}

#[tokio::test(start_paused = true)]
async fn single_event_is_released_between_dwell_and_dwell_plus_poll() {
    init_tracing();
    let h = start(DuplicatePolicy::Containment, 16, BackpressurePolicy::Block);

    let t0 = Instant::now();
    h.inbox.send(Event::from("/a/f1")).await.unwrap();

    let released = h.queue.pop(&h.cancel).await.expect("event released");
    let elapsed = t0.elapsed();

    assert_eq!(released, Event::from("/a/f1"));
    assert!(elapsed >= Duration::from_secs(5), "released too early: {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(5_100), "released too late: {elapsed:?}");

    h.cancel.cancel();
    h.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn repeats_within_a_second_reach_the_queue_once() {
    init_tracing();
    let h = start(DuplicatePolicy::Containment, 16, BackpressurePolicy::Block);

    h.inbox.send(Event::from("/a/f1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    h.inbox.send(Event::from("/a/f1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    h.inbox.send(Event::from("/a/f1")).await.unwrap();

    // Closing the inbox lets the coalescer drain the window and stop.
    drop(h.inbox);
    h.task.await.unwrap();

    assert_eq!(h.queue.snapshot(), events(&["/a/f1"]));
}

#[tokio::test(start_paused = true)]
async fn repeat_after_dwell_is_a_new_event() {
    init_tracing();
    let h = start(DuplicatePolicy::Containment, 16, BackpressurePolicy::Block);

    h.inbox.send(Event::from("/a/f1")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(h.queue.len(), 1, "first copy released before the repeat");

    h.inbox.send(Event::from("/a/f1")).await.unwrap();
    drop(h.inbox);
    h.task.await.unwrap();

    assert_eq!(h.queue.snapshot(), events(&["/a/f1", "/a/f1"]));
}

#[tokio::test(start_paused = true)]
async fn closing_the_inbox_releases_every_pending_event_in_order() {
    init_tracing();
    let h = start(DuplicatePolicy::Exact, 1_024, BackpressurePolicy::Block);

    let paths: Vec<String> = (0..200).map(|i| format!("/data/file-{i}")).collect();
    for (i, p) in paths.iter().enumerate() {
        h.inbox.send(Event::from(p.as_str())).await.unwrap();
        if i % 50 == 0 {
            tokio::time::sleep(Duration::from_millis(1_500)).await;
        }
    }
    drop(h.inbox);
    h.task.await.unwrap();

    let released: Vec<String> = h.queue.snapshot().into_iter().map(|e| e.to_string()).collect();
    assert_eq!(released, paths);
}

#[tokio::test(start_paused = true)]
async fn full_queue_holds_back_release_without_losing_events() {
    init_tracing();
    let h = start(DuplicatePolicy::Exact, 2, BackpressurePolicy::Block);

    for p in ["/q/1", "/q/2", "/q/3", "/q/4", "/q/5"] {
        h.inbox.send(Event::from(p)).await.unwrap();
    }
    drop(h.inbox);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(h.queue.len(), 2);

    let mut drained = Vec::new();
    while drained.len() < 5 {
        drained.push(h.queue.pop(&h.cancel).await.unwrap());
    }
    h.task.await.unwrap();

    assert_eq!(drained, events(&["/q/1", "/q/2", "/q/3", "/q/4", "/q/5"]));
}

#[tokio::test(start_paused = true)]
async fn window_depth_tracks_pending_entries() {
    init_tracing();
    let (inbox, rx) = mpsc::channel(8);
    let queue = Arc::new(WorkQueue::new(16, BackpressurePolicy::Block));
    let cancel = CancellationToken::new();
    let coalescer = Coalescer::new(&settings(DuplicatePolicy::Exact), rx, Arc::clone(&queue));
    let depth = coalescer.depth_handle();
    let task = tokio::spawn(coalescer.run(cancel.clone()));

    inbox.send(Event::from("/x")).await.unwrap();
    inbox.send(Event::from("/y")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(depth.get(), 2);
    assert_eq!(queue.len(), 0);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(depth.get(), 0);
    assert_eq!(queue.len(), 2);

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_a_coalescer_blocked_on_a_full_queue() {
    init_tracing();
    let h = start(DuplicatePolicy::Exact, 1, BackpressurePolicy::Block);

    h.inbox.send(Event::from("/1")).await.unwrap();
    h.inbox.send(Event::from("/2")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;

    h.cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), h.task)
        .await
        .expect("coalescer should stop promptly")
        .unwrap();
    assert_eq!(h.queue.snapshot(), events(&["/1"]));
}

#[test]
fn submit_reports_duplicates_without_a_runtime_loop() {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap();
    rt.block_on(async {
        let (_tx, rx) = mpsc::channel(1);
        let queue = Arc::new(WorkQueue::new(4, BackpressurePolicy::Block));
        let mut coalescer =
            Coalescer::new(&settings(DuplicatePolicy::Containment), rx, queue);

        assert!(coalescer.submit(Event::from("/a/f.bak")).is_accepted());
        assert!(!coalescer.submit(Event::from("/a/f")).is_accepted());
        assert_eq!(coalescer.window().len(), 1);
        assert_eq!(coalescer.depth_handle().get(), 1);
    });
}
