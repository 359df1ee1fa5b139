use replaylens_core::SummaryHash;
use replaylens_replay::{ReplayEngine, ReplayOptions};
use replaylens_windows::{
    build_windows, summary_hash, BoundaryConfig, BoundaryDetector, WindowAssignment,
    WindowClassifier,
};

fn replay(log: &str) -> replaylens_replay::ReplayedSession {
    ReplayEngine::new(ReplayOptions::default())
        .replay_bytes(log.as_bytes())
        .expect("replay")
}

#[test]
fn compaction_appended_after_snapshot_splits_the_timeline() {
    let log = concat!(
        r#"{"kind":0,"v":{"requests":[{"requestId":"r0","timestamp":100},{"requestId":"r1","timestamp":200}]}}"#,
        "\n",
        r#"{"kind":2,"k":["requests",1,"response"],"v":[{"kind":"progressTaskSerialized","content":{"value":"Compacted conversation"}}]}"#,
        "\n",
        r#"{"kind":1,"k":["requests",1,"result"],"v":{"metadata":{"summary":{"text":"abc"}}}}"#,
        "\n",
        r#"{"kind":2,"k":["requests"],"v":[{"requestId":"r2","timestamp":300}]}"#,
        "\n",
    );
    let session = replay(log);
    assert_eq!(session.entities.len(), 3);

    let scan = BoundaryDetector::new(BoundaryConfig::default()).detect(&session.entities);
    assert_eq!(scan.boundaries.len(), 1);
    let boundary = &scan.boundaries[0];
    assert_eq!(boundary.entity_index, 1);
    assert_eq!(boundary.timestamp, Some(200));
    assert_eq!(boundary.content_hash, summary_hash("abc"));
    assert_ne!(boundary.content_hash, SummaryHash::NoSummary);

    let windows = build_windows(&session.entities, &scan.boundaries).expect("windows");
    assert_eq!(windows.len(), 2);
    assert_eq!(windows[0].range, 0..2);
    assert_eq!(windows[0].start_ts, Some(100));
    assert_eq!(windows[0].end_ts, Some(200));
    assert_eq!(windows[1].range, 2..3);
    assert_eq!(windows[1].start_ts, Some(300));

    let classifier = WindowClassifier::new(&session.entities, &scan.boundaries);
    assert_eq!(classifier.classify_timestamp(Some(150)), WindowAssignment::Window(0));
    assert_eq!(classifier.classify_timestamp(Some(200)), WindowAssignment::Window(1));
    assert_eq!(classifier.classify_request("r2"), WindowAssignment::Window(1));
}

#[test]
fn session_without_markers_is_one_window() {
    let log = concat!(
        r#"{"kind":0,"v":{"requests":[{"requestId":"r0","timestamp":1}]}}"#,
        "\n",
        r#"{"kind":2,"k":["requests"],"v":[{"requestId":"r1","timestamp":2}]}"#,
        "\n",
    );
    let session = replay(log);
    let scan = BoundaryDetector::new(BoundaryConfig::default()).detect(&session.entities);
    assert!(scan.boundaries.is_empty());

    let windows = build_windows(&session.entities, &scan.boundaries).expect("windows");
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].len(), 2);
}
