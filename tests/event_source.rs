// tests/event_source.rs

mod common;

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::{init_tracing, with_timeout};
use notify::event::{AccessKind, AccessMode, CreateKind, DataChange, ModifyKind, RemoveKind};
use notify::EventKind;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sigwatch::config::SourceSection;
use sigwatch::pipeline::Event;
use sigwatch::source::watcher::{forward_events, notification_channel, NotificationSink};
use sigwatch::source::{EventKindFilter, NotifySource, ScratchFilter};


fn notification(kind: EventKind, paths: &[&str]) -> notify::Result<notify::Event> {
    let mut event = notify::Event::new(kind);
    for p in paths {
        event = event.add_path(PathBuf::from(p));
    }
    Ok(event)
}

fn created(paths: &[&str]) -> notify::Result<notify::Event> {
    notification(EventKind::Create(CreateKind::File), paths)
}

fn source_with(paths: ScratchFilter, kinds: EventKindFilter) -> (NotificationSink, NotifySource) {
    let (tx, rx) = notification_channel(64);
    (tx, NotifySource::from_channel(rx, paths, kinds))
}

async fn collect(mut source: NotifySource) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(e) = source.next_event().await {
        out.push(e.to_string());
    }
    out
}

#[tokio::test]
async fn scratch_paths_are_never_forwarded() {
    let filter = ScratchFilter::new("/tmp", &[]).unwrap();
    let (tx, source) = source_with(filter, EventKindFilter::default());

    assert!(tx.push(created(&["/tmp/x"])));
    assert!(tx.push(created(&["/home/u/report.pdf"])));
    assert!(tx.push(created(&["/tmp/deep/nested/y"])));
    drop(tx);

    assert_eq!(with_timeout(collect(source)).await, vec!["/home/u/report.pdf"]);
}

#[test]
fn scratch_prefix_is_matched_by_component() {
    let filter = ScratchFilter::new("/tmp", &[]).unwrap();

    assert!(!filter.admits(Path::new("/tmp")));
    assert!(!filter.admits(Path::new("/tmp/x")));
    assert!(filter.admits(Path::new("/tmpfoo/x")));
    assert!(filter.admits(Path::new("/var/tmp/x")));
}

#[test]
fn exclude_globs_drop_matching_paths() {
    let filter = ScratchFilter::new("/scratch", &["**/*.swp".to_string(), "/proc/**".to_string()])
        .unwrap();

    assert!(!filter.admits(Path::new("/home/u/.notes.txt.swp")));
    assert!(!filter.admits(Path::new("/proc/1/status")));
    assert!(filter.admits(Path::new("/home/u/notes.txt")));
}

#[test]
fn invalid_exclude_glob_is_a_config_error() {
    let err = ScratchFilter::new("/tmp", &["[unclosed".to_string()]).unwrap_err();
    assert!(err.to_string().contains("invalid exclude glob"));
}

#[test]
fn scratch_dir_defaults_to_the_system_temp_dir() {
    let cfg = SourceSection::default();
    assert_eq!(cfg.scratch_dir(), std::env::temp_dir());

    let filter = ScratchFilter::from_config(&cfg).unwrap();
    assert!(!filter.admits(&std::env::temp_dir().join("sigwatch-test")));
}

#[test]
fn event_kinds_follow_the_read_and_removal_switches() {
    let default = EventKindFilter::default();
    let open_read = EventKind::Access(AccessKind::Open(AccessMode::Read));
    let close_write = EventKind::Access(AccessKind::Close(AccessMode::Write));
    let removed = EventKind::Remove(RemoveKind::File);
    let modified = EventKind::Modify(ModifyKind::Data(DataChange::Content));

    assert!(default.forwards(&EventKind::Create(CreateKind::File)));
    assert!(default.forwards(&modified));
    assert!(default.forwards(&close_write));
    assert!(!default.forwards(&open_read));
    assert!(!default.forwards(&removed));

    let everything = EventKindFilter {
        include_reads: true,
        include_removals: true,
    };
    assert!(everything.forwards(&open_read));
    assert!(everything.forwards(&removed));
}

#[tokio::test]
async fn ignored_kinds_and_watch_errors_are_skipped() {
    let filter = ScratchFilter::new("/tmp", &[]).unwrap();
    let (tx, source) = source_with(filter, EventKindFilter::default());

    assert!(tx.push(notification(
        EventKind::Access(AccessKind::Open(AccessMode::Read)),
        &["/etc/passwd"],
    )));
    assert!(tx.push(Err(notify::Error::generic("inotify queue overflow"))));
    assert!(tx.push(notification(EventKind::Remove(RemoveKind::File), &["/home/u/old"])));
    assert!(tx.push(notification(
        EventKind::Access(AccessKind::Close(AccessMode::Write)),
        &["/home/u/new"],
    )));
    drop(tx);

    assert_eq!(with_timeout(collect(source)).await, vec!["/home/u/new"]);
}

#[tokio::test]
async fn multi_path_notifications_keep_their_order() {
    let filter = ScratchFilter::new("/tmp", &[]).unwrap();
    let (tx, source) = source_with(filter, EventKindFilter::default());

    assert!(tx.push(notification(
        EventKind::Modify(ModifyKind::Name(notify::event::RenameMode::Both)),
        &["/srv/a.old", "/tmp/staging", "/srv/a.new"],
    )));
    drop(tx);

    assert_eq!(
        with_timeout(collect(source)).await,
        vec!["/srv/a.old", "/srv/a.new"]
    );
}

#[tokio::test]
async fn forwarder_moves_admitted_events_into_the_inbox() {
    init_tracing();
    let filter = ScratchFilter::new("/tmp", &[]).unwrap();
    let (tx, source) = source_with(filter, EventKindFilter::default());
    let (inbox, mut inbox_rx) = mpsc::channel::<Event>(8);
    let cancel = CancellationToken::new();

    let task = tokio::spawn(forward_events(source, inbox, cancel.clone()));

    assert!(tx.push(created(&["/tmp/x", "/data/1"])));
    assert!(tx.push(created(&["/data/2"])));

    assert_eq!(with_timeout(inbox_rx.recv()).await, Some(Event::from("/data/1")));
    assert_eq!(with_timeout(inbox_rx.recv()).await, Some(Event::from("/data/2")));

    // Closing the notification side ends the forwarder, which closes the inbox.
    drop(tx);
    with_timeout(task).await.unwrap();
    assert_eq!(inbox_rx.recv().await, None);
}

#[tokio::test]
async fn forwarder_stops_on_cancel() {
    let filter = ScratchFilter::new("/tmp", &[]).unwrap();
    let (_tx, source) = source_with(filter, EventKindFilter::default());
    let (inbox, _inbox_rx) = mpsc::channel::<Event>(1);
    let cancel = CancellationToken::new();

    let task = tokio::spawn(forward_events(source, inbox, cancel.clone()));
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    with_timeout(task).await.unwrap();
}

#[tokio::test]
async fn real_watcher_reports_file_creation() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let settings = SourceSection {
        roots: vec![root.path().to_path_buf()],
        scratch_dir: Some(scratch.path().to_path_buf()),
        ..SourceSection::default()
    };

    let mut source = NotifySource::watch(&settings).unwrap();
    // Give the backend a moment to register the watch.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let target = root.path().join("dropped.bin");
    std::fs::write(&target, b"payload").unwrap();

    let canonical = target.canonicalize().unwrap();
    let event = with_timeout(async {
        loop {
            let e = source.next_event().await.expect("watcher alive");
            if e.path() == target || e.path() == canonical {
                return e;
            }
        }
    })
    .await;
    assert!(event.path().ends_with("dropped.bin"));
}

#[test]
fn watching_nothing_is_an_error() {
    let settings = SourceSection {
        roots: vec![PathBuf::from("/definitely/not/here/sigwatch")],
        ..SourceSection::default()
    };
    assert!(NotifySource::watch(&settings).is_err());
}

#[test]
fn full_notification_buffer_drops_and_counts_without_blocking() {
    let capture = common::LogCapture::new();
    let _guard = capture.install();
    let (sink, mut rx) = notification_channel(4);

    let accepted = (0..10)
        .filter(|i| sink.push(created(&[&format!("/data/{i}")])))
        .count();

    assert_eq!(accepted, 4);
    assert_eq!(sink.dropped(), 6);
    // One warning for the first drop, not one per drop.
    assert_eq!(capture.lines_with("WARN", "notification buffer full").len(), 1);

    let first = rx.try_recv().unwrap().unwrap();
    assert_eq!(first.paths, vec![PathBuf::from("/data/0")]);
}

#[tokio::test]
async fn stalled_inbox_bounds_what_the_source_holds() {
    init_tracing();
    let (sink, rx) = notification_channel(2);
    let source = NotifySource::from_channel(
        rx,
        ScratchFilter::new("/tmp", &[]).unwrap(),
        EventKindFilter::default(),
    );
    let (inbox, mut inbox_rx) = mpsc::channel::<Event>(1);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(forward_events(source, inbox, cancel.clone()));

    // First event fills the inbox, the second is held by the forwarder,
    // which now waits on the full inbox.
    assert!(sink.push(created(&["/data/0"])));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(sink.push(created(&["/data/1"])));
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Nobody drains: two more fit in the buffer, the rest are dropped.
    let accepted = (2..10)
        .filter(|i| sink.push(created(&[&format!("/data/{i}")])))
        .count();
    assert_eq!(accepted, 2);
    assert_eq!(sink.dropped(), 6);

    let mut received = Vec::new();
    for _ in 0..4 {
        received.push(with_timeout(inbox_rx.recv()).await.unwrap().to_string());
    }
    assert_eq!(received, vec!["/data/0", "/data/1", "/data/2", "/data/3"]);

    drop(sink);
    with_timeout(task).await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn non_utf8_paths_pass_through_unchanged() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let raw = Path::new(OsStr::from_bytes(b"/data/evil\xff.php")).to_path_buf();
    let (tx, mut source) = source_with(
        ScratchFilter::new("/tmp", &[]).unwrap(),
        EventKindFilter::default(),
    );
    assert!(tx.push(Ok(
        notify::Event::new(EventKind::Create(CreateKind::File)).add_path(raw.clone())
    )));
    drop(tx);

    let event = with_timeout(source.next_event()).await.unwrap();
    assert_eq!(event.path(), raw.as_path());
    assert_eq!(event.as_os_str().as_bytes(), b"/data/evil\xff.php");
}
