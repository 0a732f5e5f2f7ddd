// tests/status_gauge.rs

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use common::LogCapture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sigwatch::config::StatusSection;
use sigwatch::pipeline::status::{render_gauge, scale_factor, CLEAR_SCREEN};
use sigwatch::pipeline::{Event, StatusReporter, StatusSample, WindowDepth, WorkQueue};
use sigwatch::types::BackpressurePolicy;

fn sample(work: usize, window: usize, inbox: usize) -> StatusSample {
    StatusSample {
        timestamp: Utc.with_ymd_and_hms(2026, 10, 18, 9, 14, 3).unwrap(),
        work_queue_depth: work,
        coalesce_window_depth: window,
        inbox_depth: inbox,
    }
}

#[test]
fn small_backlogs_use_the_floor_scale() {
    // floor 6400 * 1.1 / 80 columns = 88, plus one.
    assert_eq!(scale_factor(&sample(0, 0, 0), 80, 6_400), 89);
    assert_eq!(scale_factor(&sample(100, 5_000, 0), 80, 6_400), 89);
}

#[test]
fn large_backlogs_rescale_to_fit_the_columns() {
    let s = sample(20_000, 1_000, 0);
    let factor = scale_factor(&s, 80, 6_400);
    assert_eq!(factor, 276);
    assert!(20_000 / factor <= 80);
}

#[test]
fn gauge_renders_one_bar_per_queue() {
    let gauge = render_gauge(&sample(890, 178, 0), 80, 6_400);
    let lines: Vec<&str> = gauge.lines().collect();

    assert_eq!(
        lines,
        vec![
            "2026-10-18 09:14:03",
            "        Worker queue:",
            "[890   ] ==========>",
            "        Coalescing window:",
            "[178   ] ==>",
            "        Inbox:",
            "[0     ] >",
        ]
    );
}

#[test]
fn widest_bar_stays_within_the_column_budget() {
    for depth in [0usize, 1, 6_399, 6_400, 10_000, 123_456, 9_999_999] {
        let gauge = render_gauge(&sample(depth, depth / 2, 7), 80, 6_400);
        for line in gauge.lines().filter(|l| l.starts_with('[')) {
            let bar = line.split("] ").nth(1).unwrap();
            assert!(bar.len() <= 81, "bar too wide for depth {depth}: {}", bar.len());
        }
    }
}

#[tokio::test]
async fn reporter_samples_without_consuming() {
    let queue = Arc::new(WorkQueue::new(8, BackpressurePolicy::Block));
    let cancel = CancellationToken::new();
    for p in ["/1", "/2", "/3"] {
        queue.push(Event::from(p), &cancel).await;
    }
    let (tx, _rx) = mpsc::channel::<Event>(8);
    tx.send(Event::from("/raw-1")).await.unwrap();
    tx.send(Event::from("/raw-2")).await.unwrap();

    let reporter = StatusReporter::new(
        StatusSection::default(),
        Arc::clone(&queue),
        WindowDepth::default(),
        Some(tx.downgrade()),
    );

    let s = reporter.sample();
    assert_eq!(s.work_queue_depth, 3);
    assert_eq!(s.coalesce_window_depth, 0);
    assert_eq!(s.inbox_depth, 2);
    assert_eq!(queue.len(), 3);

    // Once the inbox is gone its depth reads as zero.
    drop(tx);
    assert_eq!(reporter.sample().inbox_depth, 0);
}

#[tokio::test(start_paused = true)]
async fn reporter_logs_a_gauge_every_interval_until_cancelled() {
    let capture = LogCapture::new();
    let _guard = capture.install();

    let queue = Arc::new(WorkQueue::new(8, BackpressurePolicy::Block));
    let settings = StatusSection {
        interval_ms: 200,
        redraw: Some(false),
        ..StatusSection::default()
    };
    let reporter = StatusReporter::new(settings, queue, WindowDepth::default(), None);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(reporter.run(cancel.clone()));

    // Ticks at 0, 200, 400 and 600 ms.
    tokio::time::sleep(Duration::from_millis(650)).await;
    cancel.cancel();
    task.await.unwrap();

    let gauges = capture.contents().matches("Worker queue:").count();
    assert_eq!(gauges, 4);
}

#[tokio::test(start_paused = true)]
async fn redrawing_reporter_clears_the_screen_before_every_gauge() {
    let capture = LogCapture::new();
    let _guard = capture.install();
    let terminal = LogCapture::new();

    let queue = Arc::new(WorkQueue::new(8, BackpressurePolicy::Block));
    let settings = StatusSection {
        interval_ms: 200,
        redraw: Some(true),
        ..StatusSection::default()
    };
    assert!(settings.redraw_in_place());
    let reporter = StatusReporter::new(settings, queue, WindowDepth::default(), None);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(reporter.run_on(cancel.clone(), true, terminal.clone()));

    // Ticks at 0, 200 and 400 ms.
    tokio::time::sleep(Duration::from_millis(450)).await;
    cancel.cancel();
    task.await.unwrap();

    let clears = terminal.contents().matches(std::str::from_utf8(CLEAR_SCREEN).unwrap()).count();
    assert_eq!(clears, 3);
    assert_eq!(capture.contents().matches("Worker queue:").count(), 3);
}

#[tokio::test(start_paused = true)]
async fn scrolling_reporter_never_clears_the_screen() {
    let terminal = LogCapture::new();
    let queue = Arc::new(WorkQueue::new(8, BackpressurePolicy::Block));
    let settings = StatusSection {
        interval_ms: 200,
        redraw: Some(false),
        ..StatusSection::default()
    };
    assert!(!settings.redraw_in_place());
    let reporter = StatusReporter::new(settings, queue, WindowDepth::default(), None);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(reporter.run_on(cancel.clone(), false, terminal.clone()));

    tokio::time::sleep(Duration::from_millis(450)).await;
    cancel.cancel();
    task.await.unwrap();

    assert!(terminal.contents().is_empty());
}

#[test]
fn redraw_defaults_to_following_the_terminal() {
    use std::io::IsTerminal;

    let settings = StatusSection::default();
    assert_eq!(settings.redraw, None);
    assert_eq!(settings.redraw_in_place(), std::io::stderr().is_terminal());
}
