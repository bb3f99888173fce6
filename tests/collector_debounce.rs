mod common;

use std::time::Duration;

use tokio::sync::mpsc;
use watchbuild::watch::{ChangeSet, Collector, CollectorEvent};
use watchbuild_test_utils::fake::{RecordingSink, ScriptedSource};

use common::init_tracing;

fn changes(changed: &[&str]) -> ChangeSet {
    ChangeSet {
        changed: changed.iter().map(|s| s.to_string()).collect(),
        deleted: vec![],
    }
}

#[tokio::test(start_paused = true)]
async fn touch_burst_coalesces_into_one_batch() {
    init_tracing();
    let first = changes(&["a.txt"]);
    let second = changes(&["a.txt", "b.txt"]);
    let source = ScriptedSource::new(vec![first.clone(), second.clone()]);
    let dest = ScriptedSource::silent();

    let (tx, rx) = mpsc::unbounded_channel();
    // A burst of raw notifications, all queued before the quiet period ends.
    for _ in 0..3 {
        tx.send(CollectorEvent::Touched).unwrap();
    }

    let collector = Collector::new(
        source,
        dest,
        Duration::from_millis(200),
        Duration::from_secs(60),
        rx,
    );
    let mut sink = RecordingSink::new(Some(2));
    collector.run(&mut sink).await.unwrap();

    let batches = sink.batches.lock().unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].source, first);
    assert_eq!(batches[1].source, second);
    assert!(batches[1].dest.is_empty());
}

#[tokio::test(start_paused = true)]
async fn quiet_sources_produce_no_batches() {
    init_tracing();
    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(CollectorEvent::ShutdownRequested).unwrap();

    let collector = Collector::new(
        ScriptedSource::silent(),
        ScriptedSource::silent(),
        Duration::from_millis(200),
        Duration::from_secs(60),
        rx,
    );
    let mut sink = RecordingSink::new(None);
    collector.run(&mut sink).await.unwrap();

    assert_eq!(sink.batch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn closed_event_channel_stops_the_loop() {
    init_tracing();
    let (tx, rx) = mpsc::unbounded_channel::<CollectorEvent>();
    drop(tx);

    let collector = Collector::new(
        ScriptedSource::silent(),
        ScriptedSource::silent(),
        Duration::from_millis(200),
        Duration::from_secs(60),
        rx,
    );
    let mut sink = RecordingSink::new(None);
    collector.run(&mut sink).await.unwrap();

    assert_eq!(sink.batch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn sink_stop_is_honored_with_work_still_queued() {
    init_tracing();
    let source = ScriptedSource::new(vec![changes(&["a.txt"]), changes(&["b.txt"])]);

    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(CollectorEvent::Touched).unwrap();

    let collector = Collector::new(
        source,
        ScriptedSource::silent(),
        Duration::from_millis(200),
        Duration::from_secs(60),
        rx,
    );
    let mut sink = RecordingSink::new(Some(1));
    collector.run(&mut sink).await.unwrap();

    assert_eq!(sink.batch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn forced_deadline_fires_under_a_steady_event_storm() {
    init_tracing();
    let first = changes(&["a.txt"]);
    let second = changes(&["b.txt"]);
    let source = ScriptedSource::new(vec![first, second.clone()]);

    let (tx, rx) = mpsc::unbounded_channel();

    // Touches arriving faster than the quiet period would postpone batches
    // forever without the forced deadline.
    let storm_tx = tx.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if storm_tx.send(CollectorEvent::Touched).is_err() {
                break;
            }
        }
    });

    let collector = Collector::new(
        source,
        ScriptedSource::silent(),
        Duration::from_millis(200),
        Duration::from_secs(1),
        rx,
    );
    let mut sink = RecordingSink::new(Some(2));
    collector.run(&mut sink).await.unwrap();

    let batches = sink.batches.lock().unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1].source, second);
}
