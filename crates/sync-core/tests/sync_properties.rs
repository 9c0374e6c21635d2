//! Behavioral properties of the sync engine against in-memory collaborators.

use sync_core::testing::{
    users, CursorOp, RecordingCursorStore, RecordingSink, ScriptedSource, UsernameMapper,
};
use sync_core::{DedupSet, EngineConfig, SyncEngine, TerminatedBy};

fn engine(batch_size: usize) -> SyncEngine<UsernameMapper> {
    SyncEngine::new(UsernameMapper, EngineConfig::with_batch_size(batch_size))
}

fn names(n: usize, prefix: &str) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}{i}")).collect()
}

#[tokio::test]
async fn test_existing_and_multi_page_scenario() {
    let source = ScriptedSource::new()
        .page(None, users(&["alice", "bob", "carol"]), Some("tok1"))
        .page(Some("tok1"), users(&["dave"]), None);
    let sink = RecordingSink::new(10);
    let store = RecordingCursorStore::new();
    let mut dedup = DedupSet::new(["alice".to_string()].into_iter().collect());

    let result = engine(10)
        .run("target1", &source, &mut dedup, None, &sink, &store)
        .await
        .unwrap();

    assert_eq!(
        sink.batches(),
        vec![vec!["bob".to_string(), "carol".to_string(), "dave".to_string()]]
    );
    assert_eq!(result.newly_added, 3);
    assert_eq!(result.skipped_duplicates, 1);
    assert_eq!(result.terminated_by, TerminatedBy::Exhausted);
    assert!(result.last_cursor.is_none());
    assert!(store.cursor("target1").is_none());
    assert!(store.ops().contains(&CursorOp::Clear("target1".to_string())));
}

#[tokio::test]
async fn test_second_run_adds_nothing() {
    let source = ScriptedSource::new()
        .page(None, users(&["bob", "carol"]), Some("tok1"))
        .page(Some("tok1"), users(&["dave", "bob"]), None);
    let mut dedup = DedupSet::default();

    let first_sink = RecordingSink::new(10);
    let first = engine(10)
        .run("target1", &source, &mut dedup, None, &first_sink, &RecordingCursorStore::new())
        .await
        .unwrap();
    assert_eq!(first.newly_added, 3);

    // The destination now holds everything the first run wrote
    let mut dedup = DedupSet::new(first_sink.written().into_iter().collect());
    let second_sink = RecordingSink::new(10);
    let second = engine(10)
        .run("target1", &source, &mut dedup, None, &second_sink, &RecordingCursorStore::new())
        .await
        .unwrap();

    assert_eq!(second.newly_added, 0);
    assert_eq!(second.skipped_duplicates, 4);
    assert!(second_sink.batches().is_empty());
}

#[tokio::test]
async fn test_batches_never_exceed_sink_maximum() {
    for (total, max_batch) in [(0, 3), (1, 3), (3, 3), (7, 3), (25, 10), (101, 100)] {
        let all = names(total, "user");
        let (first, second) = all.split_at(total / 2);
        let first: Vec<&str> = first.iter().map(String::as_str).collect();
        let second: Vec<&str> = second.iter().map(String::as_str).collect();

        let source = ScriptedSource::new()
            .page(None, users(&first), Some("tok1"))
            .page(Some("tok1"), users(&second), None);
        let sink = RecordingSink::new(max_batch);
        let mut dedup = DedupSet::default();

        let result = engine(max_batch)
            .run("entity", &source, &mut dedup, None, &sink, &RecordingCursorStore::new())
            .await
            .unwrap();

        assert_eq!(result.newly_added, total as u64);
        assert!(sink.batches().iter().all(|b| b.len() <= max_batch));
        assert_eq!(sink.written(), all);
    }
}

#[tokio::test]
async fn test_target_cutoff_is_exact() {
    let page1 = names(8, "a");
    let page2 = names(8, "b");
    let page1: Vec<&str> = page1.iter().map(String::as_str).collect();
    let page2: Vec<&str> = page2.iter().map(String::as_str).collect();

    let source = ScriptedSource::new()
        .page(None, users(&page1), Some("tok1"))
        .page(Some("tok1"), users(&page2), Some("tok2"))
        .page(Some("tok2"), users(&["never"]), None);
    let sink = RecordingSink::new(3);
    let store = RecordingCursorStore::new();
    let mut dedup = DedupSet::default();

    let result = engine(3)
        .run("loc1", &source, &mut dedup, Some(11), &sink, &store)
        .await
        .unwrap();

    assert_eq!(result.terminated_by, TerminatedBy::TargetReached);
    assert_eq!(result.newly_added, 11);
    assert_eq!(sink.written().len(), 11);
    assert_eq!(source.fetches().len(), 2);
    // Stopped early: the cursor stays saved and the entity is not finalized
    assert_eq!(store.cursor("loc1").as_deref(), Some("tok2"));
    assert!(!store.ops().contains(&CursorOp::Clear("loc1".to_string())));
}

#[tokio::test]
async fn test_resume_skips_page_consumed_before_interruption() {
    let source = ScriptedSource::new()
        .page(None, users(&["bob", "carol"]), Some("tok1"))
        .page(Some("tok1"), users(&["dave"]), None);
    let store = RecordingCursorStore::new();

    // First run dies while writing the first page: the cursor is already saved
    let failing_sink = RecordingSink::new(2).failing_on_call(1);
    let mut dedup = DedupSet::default();
    let interrupted = engine(2)
        .run("target1", &source, &mut dedup, None, &failing_sink, &store)
        .await;
    assert!(interrupted.is_err());
    assert_eq!(store.cursor("target1").as_deref(), Some("tok1"));

    // The restarted run picks up at tok1 and never re-fetches the first page,
    // so bob and carol are lost
    let sink = RecordingSink::new(10);
    let mut dedup = DedupSet::default();
    let resumed = engine(2)
        .run("target1", &source, &mut dedup, None, &sink, &store)
        .await
        .unwrap();

    assert_eq!(source.fetches(), vec![None, Some("tok1".to_string())]);
    assert_eq!(sink.written(), vec!["dave"]);
    assert_eq!(resumed.newly_added, 1);
    assert_eq!(resumed.terminated_by, TerminatedBy::Exhausted);
}

#[tokio::test]
async fn test_shared_dedup_set_spans_entities() {
    let first_target = ScriptedSource::new().page(None, users(&["bob", "shared"]), None);
    let second_target = ScriptedSource::new().page(None, users(&["shared", "carol"]), None);
    let sink = RecordingSink::new(10);
    let store = RecordingCursorStore::new();
    let mut dedup = DedupSet::default();
    let engine = engine(10);

    let first = engine
        .run("target1", &first_target, &mut dedup, None, &sink, &store)
        .await
        .unwrap();
    let second = engine
        .run("target2", &second_target, &mut dedup, None, &sink, &store)
        .await
        .unwrap();

    assert_eq!(first.newly_added, 2);
    assert_eq!(second.newly_added, 1);
    assert_eq!(second.skipped_duplicates, 1);
    let written = sink.written();
    assert_eq!(written.iter().filter(|n| *n == "shared").count(), 1);
    assert_eq!(written, vec!["bob", "shared", "carol"]);
}
