//! Interrupted-and-resume behavior. Lives in its own test binary, as a
//! single test, because the abort latch is process-wide.

use memnex_ingest::FsSource;
use memnex_runtime::{CheckpointManager, SyncOptions, SyncProgress, lifecycle, sync};
use memnex_store::Store;
use memnex_store::queries::session;
use memnex_testing::{SessionFileBuilder, TestWorld};

#[test]
fn test_abort_checkpoints_then_resume_finishes() {
    let world = TestWorld::new();
    for index in 0..10 {
        let id = format!("sess-{:02}", index);
        world.add_session(
            "/home/dev/p",
            &id,
            &SessionFileBuilder::new(&id).user("some work"),
        );
    }

    let source = FsSource::new(world.source_root());
    let checkpoints = CheckpointManager::new(world.checkpoint_path());

    // First run: request abort after the fourth file completes.
    lifecycle::clear_abort();
    let mut store = Store::open(&world.db_path()).unwrap();
    let mut completed = 0usize;
    let first = sync::run(
        Some(&mut store),
        &source,
        &checkpoints,
        None,
        &SyncOptions::default(),
        &mut |progress| {
            if let SyncProgress::Extracting { .. } = progress {
                completed += 1;
                if completed == 4 {
                    lifecycle::request_abort();
                }
            }
        },
    )
    .unwrap();
    drop(store);

    assert!(first.aborted);
    assert_eq!(first.processed, 4);

    // The checkpoint survived with exactly the finished files.
    let saved = checkpoints.load().expect("checkpoint should persist");
    assert_eq!(saved.total, 10);
    assert_eq!(saved.completed.len(), 4);

    // Second run announces the resume, finishes the rest and clears.
    lifecycle::clear_abort();
    let mut store = Store::open(&world.db_path()).unwrap();
    let mut resumed_from = None;
    let second = sync::run(
        Some(&mut store),
        &source,
        &checkpoints,
        None,
        &SyncOptions::default(),
        &mut |progress| {
            if let SyncProgress::Resuming { done, total } = progress {
                resumed_from = Some((*done, *total));
            }
        },
    )
    .unwrap();

    assert_eq!(resumed_from, Some((4, 10)));
    assert!(!second.aborted);
    assert_eq!(second.skipped, 4);
    assert_eq!(second.processed, 6);
    assert!(checkpoints.load().is_none(), "checkpoint must clear");

    // Every session landed exactly once.
    assert_eq!(session::count(store.conn()).unwrap(), 10);
    drop(store);

    // A latch set before the loop starts means nothing gets processed.
    let solo = TestWorld::new();
    solo.add_session(
        "/home/dev/p",
        "sess-solo",
        &SessionFileBuilder::new("sess-solo").user("unseen"),
    );
    let solo_source = FsSource::new(solo.source_root());
    let solo_checkpoints = CheckpointManager::new(solo.checkpoint_path());

    lifecycle::request_abort();
    let mut store = Store::open(&solo.db_path()).unwrap();
    let report = sync::run(
        Some(&mut store),
        &solo_source,
        &solo_checkpoints,
        None,
        &SyncOptions::default(),
        &mut |_| {},
    )
    .unwrap();
    lifecycle::clear_abort();

    assert!(report.aborted);
    assert_eq!(report.processed, 0);
    assert!(session::get(store.conn(), "sess-solo").unwrap().is_none());
}
