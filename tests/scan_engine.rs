mod support;

use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::{Arc, atomic::Ordering, mpsc},
    time::Duration,
};

use support::{FlakyStore, Gate, Harness, ScriptedProcessor, WAIT, write_clips};
use vaultscan::{
    media_roots::{MediaRoot, ScanStore, SqliteScanStore},
    scanner::{
        BackgroundJob, JobType, ResumeOutcome, ScanCallbacks, ScanControlError, ScanMode,
        ScanOptions, ScanOrchestrator, ScanStatus,
    },
};

#[test]
fn full_scan_processes_every_supported_file() {
    let harness = Harness::builder().build();
    let clips = write_clips(harness.root_path(), 23);

    harness.orchestrator.start(harness.root.clone()).unwrap();
    harness.wait();

    let state = harness.state();
    assert_eq!(state.status, ScanStatus::Completed);
    assert_eq!(state.mode, ScanMode::Full);
    assert_eq!(state.progress.total, 23);
    assert_eq!(state.progress.processed, 23);
    assert!(state.progress.remaining_files.is_empty());
    assert!(state.completed_at.is_some());
    let mut outputs: Vec<PathBuf> = state
        .outputs
        .iter()
        .map(|asset| asset.relative_path.clone())
        .collect();
    outputs.sort();
    assert_eq!(outputs, clips);
    assert_eq!(harness.events.completed.lock().unwrap().len(), 1);
    assert_eq!(harness.store.records(&harness.root.id).unwrap().len(), 23);
    assert!(!harness.orchestrator.is_running(&harness.root.id));
}

#[test]
fn progress_is_monotonic_with_constant_total() {
    let harness = Harness::builder()
        .options(ScanOptions::default().with_segment_size(4).with_concurrency(3))
        .build();
    write_clips(harness.root_path(), 17);

    harness.orchestrator.start(harness.root.clone()).unwrap();
    harness.wait();

    let progress = harness.events.progress.lock().unwrap().clone();
    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|pair| pair[0].0 <= pair[1].0));
    assert!(progress.iter().all(|(processed, total)| *total == 17 && processed <= total));
    assert_eq!(progress.last().unwrap().0, 17);
}

#[test]
fn pausing_after_ten_of_fifty_keeps_exact_remainder() {
    let harness = Harness::builder().pause_at(10).build();
    let clips = write_clips(harness.root_path(), 50);

    harness.orchestrator.start(harness.root.clone()).unwrap();
    harness.wait();

    let state = harness.state();
    assert_eq!(state.status, ScanStatus::Paused);
    assert_eq!(state.progress.processed, 10);
    assert_eq!(state.progress.total, 50);
    assert_eq!(state.outputs.len(), 10);
    assert!(state.paused_at.is_some());
    assert_eq!(state.progress.remaining_files, clips[10..].to_vec());
    assert_eq!(harness.events.paused.lock().unwrap().len(), 1);

    let incomplete = harness.orchestrator.list_incomplete().unwrap();
    assert_eq!(incomplete.len(), 1);
    assert_eq!(incomplete[0].root_id, harness.root.id);
}

#[test]
fn resume_finishes_without_processing_any_file_twice() {
    let harness = Harness::builder().pause_at(10).build();
    write_clips(harness.root_path(), 50);

    harness.orchestrator.start(harness.root.clone()).unwrap();
    harness.wait();
    assert_eq!(harness.state().status, ScanStatus::Paused);

    let outcome = harness.orchestrator.resume(&harness.root.id).unwrap();
    assert!(matches!(outcome, ResumeOutcome::Resumed(_)));
    harness.wait();

    let state = harness.state();
    assert_eq!(state.status, ScanStatus::Completed);
    assert_eq!(state.progress.processed, 50);
    assert_eq!(state.progress.processed, state.progress.total);
    assert_eq!(state.outputs.len(), 50);

    let paths = harness.events.file_paths();
    let unique: HashSet<_> = paths.iter().collect();
    assert_eq!(paths.len(), 50);
    assert_eq!(unique.len(), 50);
    assert_eq!(harness.events.resumed.lock().unwrap().len(), 1);
    assert!(harness.orchestrator.list_incomplete().unwrap().is_empty());

    assert_eq!(
        harness.orchestrator.resume(&harness.root.id).unwrap(),
        ResumeOutcome::NothingToDo
    );
}

#[test]
fn one_failing_file_does_not_stop_the_scan() {
    let processor = ScriptedProcessor {
        fail: [PathBuf::from("clip_05.mp4")].into_iter().collect(),
        ..ScriptedProcessor::default()
    };
    let harness = Harness::builder().processor(processor).build();
    write_clips(harness.root_path(), 10);

    harness.orchestrator.start(harness.root.clone()).unwrap();
    harness.wait();

    let state = harness.state();
    assert_eq!(state.status, ScanStatus::Completed);
    assert_eq!(state.progress.processed, 10);
    assert_eq!(state.outputs.len(), 9);
    let files = harness.events.files.lock().unwrap();
    let failures: Vec<_> = files.iter().filter(|outcome| !outcome.is_success()).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].relative_path, PathBuf::from("clip_05.mp4"));
    assert!(failures[0].output.is_none());
    assert!(
        failures[0]
            .error
            .as_deref()
            .is_some_and(|message| message.contains("corrupt container"))
    );
}

#[test]
fn cancel_drains_in_flight_work_and_discards_the_rest() {
    let processor = ScriptedProcessor {
        delay: Duration::from_millis(20),
        ..ScriptedProcessor::default()
    };
    let harness = Harness::builder()
        .processor(processor)
        .options(ScanOptions::default().with_segment_size(10).with_concurrency(2))
        .cancel_at(3)
        .build();
    write_clips(harness.root_path(), 40);

    harness.orchestrator.start(harness.root.clone()).unwrap();
    harness.wait();

    let state = harness.state();
    assert_eq!(state.status, ScanStatus::Cancelled);
    assert!(state.progress.remaining_files.is_empty());
    assert!(state.progress.processed >= 3);
    assert!(state.progress.processed < 40);
    assert_eq!(harness.events.files.lock().unwrap().len(), state.progress.processed);
    assert_eq!(harness.events.cancelled.lock().unwrap().len(), 1);
    assert!(harness.orchestrator.list_incomplete().unwrap().is_empty());

    let err = harness.orchestrator.resume(&harness.root.id).unwrap_err();
    assert!(matches!(
        err,
        ScanControlError::NotResumable {
            status: ScanStatus::Cancelled,
            ..
        }
    ));
}

#[test]
fn cancelling_a_paused_scan_needs_no_active_run() {
    let harness = Harness::builder().pause_at(10).build();
    write_clips(harness.root_path(), 30);
    harness.orchestrator.start(harness.root.clone()).unwrap();
    harness.wait();
    assert_eq!(harness.state().status, ScanStatus::Paused);

    harness.orchestrator.cancel(&harness.root.id).unwrap();
    let state = harness.state();
    assert_eq!(state.status, ScanStatus::Cancelled);
    assert!(state.progress.remaining_files.is_empty());
    assert_eq!(harness.events.cancelled.lock().unwrap().len(), 1);

    assert!(matches!(
        harness.orchestrator.cancel(&harness.root.id),
        Err(ScanControlError::NotRunning(_))
    ));
}

#[test]
fn second_start_or_resume_while_running_is_rejected() {
    let gate = Arc::new(Gate::default());
    let processor = ScriptedProcessor {
        gate: Some(Arc::clone(&gate)),
        ..ScriptedProcessor::default()
    };
    let harness = Harness::builder().processor(processor).build();
    write_clips(harness.root_path(), 5);

    harness.orchestrator.start(harness.root.clone()).unwrap();
    assert!(harness.orchestrator.is_running(&harness.root.id));
    assert!(matches!(
        harness.orchestrator.start(harness.root.clone()),
        Err(ScanControlError::AlreadyRunning(_))
    ));
    assert!(matches!(
        harness.orchestrator.start_incremental(harness.root.clone()),
        Err(ScanControlError::AlreadyRunning(_))
    ));
    assert!(matches!(
        harness.orchestrator.resume(&harness.root.id),
        Err(ScanControlError::AlreadyRunning(_))
    ));

    gate.open();
    harness.wait();
    assert_eq!(harness.state().status, ScanStatus::Completed);
    assert_eq!(harness.state().progress.processed, 5);
}

#[test]
fn control_calls_without_a_scan_are_rejected() {
    let harness = Harness::builder().build();
    let root_id = harness.root.id.clone();
    assert!(matches!(
        harness.orchestrator.pause(&root_id),
        Err(ScanControlError::NotRunning(_))
    ));
    assert!(matches!(
        harness.orchestrator.cancel(&root_id),
        Err(ScanControlError::NotRunning(_))
    ));
    assert!(matches!(
        harness.orchestrator.resume(&root_id),
        Err(ScanControlError::NoScanState(_))
    ));
    let missing = MediaRoot::new(harness.root_path().join("missing"));
    assert!(matches!(
        harness.orchestrator.start(missing),
        Err(ScanControlError::InvalidRoot(_))
    ));
    assert!(harness.orchestrator.wait_idle(&root_id, Duration::from_millis(1)));
}

#[test]
fn resume_with_expired_handle_marks_the_scan_as_error() {
    let harness = Harness::builder().pause_at(10).build();
    write_clips(harness.root_path(), 30);
    harness.orchestrator.start(harness.root.clone()).unwrap();
    harness.wait();

    harness.orchestrator.roots().revoke_root(&harness.root.id);
    let err = harness.orchestrator.resume(&harness.root.id).unwrap_err();
    assert!(matches!(err, ScanControlError::HandleExpired(_)));

    let state = harness.state();
    assert_eq!(state.status, ScanStatus::Error);
    assert!(state.error.as_deref().is_some_and(|message| message.contains("rescan")));
    assert_eq!(state.progress.processed, 10);
    assert_eq!(harness.events.errors.lock().unwrap().len(), 1);
    assert!(!harness.orchestrator.is_running(&harness.root.id));
}

#[test]
fn resume_after_root_disappears_expires_the_handle() {
    let harness = Harness::builder().pause_at(10).build();
    write_clips(harness.root_path(), 30);
    harness.orchestrator.start(harness.root.clone()).unwrap();
    harness.wait();

    std::fs::remove_dir_all(harness.root_path()).unwrap();
    assert!(matches!(
        harness.orchestrator.resume(&harness.root.id),
        Err(ScanControlError::HandleExpired(_))
    ));
    assert_eq!(harness.state().status, ScanStatus::Error);
}

#[test]
fn resume_skips_files_deleted_while_paused() {
    let harness = Harness::builder().pause_at(10).build();
    let clips = write_clips(harness.root_path(), 30);
    harness.orchestrator.start(harness.root.clone()).unwrap();
    harness.wait();

    for clip in &clips[20..25] {
        std::fs::remove_file(harness.root_path().join(clip)).unwrap();
    }
    harness.orchestrator.resume(&harness.root.id).unwrap();
    harness.wait();

    let state = harness.state();
    assert_eq!(state.status, ScanStatus::Completed);
    assert_eq!(state.progress.total, 25);
    assert_eq!(state.progress.processed, 25);
    assert!(harness.events.files.lock().unwrap().iter().all(|outcome| outcome.is_success()));
}

#[test]
fn second_incremental_scan_of_unchanged_root_finds_nothing_to_do() {
    let harness = Harness::builder().build();
    write_clips(harness.root_path(), 12);

    harness
        .orchestrator
        .start_incremental(harness.root.clone())
        .unwrap();
    harness.wait();
    harness
        .orchestrator
        .start_incremental(harness.root.clone())
        .unwrap();
    harness.wait();

    let summaries = harness.events.classified.lock().unwrap().clone();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].new, 12);
    assert_eq!(summaries[1].new, 0);
    assert_eq!(summaries[1].modified, 0);
    assert_eq!(summaries[1].deleted, 0);
    assert_eq!(summaries[1].unchanged, 12);

    let state = harness.state();
    assert_eq!(state.status, ScanStatus::Completed);
    assert_eq!(state.mode, ScanMode::Incremental);
    assert_eq!(state.progress.total, 0);
    assert_eq!(state.changes, Some(summaries[1]));
}

#[test]
fn incremental_scan_processes_only_changes_and_prunes_deletions() {
    let harness = Harness::builder().build();
    write_clips(harness.root_path(), 6);
    harness.orchestrator.start(harness.root.clone()).unwrap();
    harness.wait();

    std::fs::write(harness.root_path().join("clip_01.mp4"), b"re-encoded, longer payload").unwrap();
    std::fs::remove_file(harness.root_path().join("clip_02.mp4")).unwrap();
    std::fs::write(harness.root_path().join("extra.mkv"), b"brand new").unwrap();
    harness.events.files.lock().unwrap().clear();

    harness
        .orchestrator
        .start_incremental(harness.root.clone())
        .unwrap();
    harness.wait();

    let summary = *harness.events.classified.lock().unwrap().last().unwrap();
    assert_eq!(summary.new, 1);
    assert_eq!(summary.modified, 1);
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.unchanged, 4);
    assert_eq!(summary.total, 6);

    let mut processed = harness.events.file_paths();
    processed.sort();
    assert_eq!(
        processed,
        vec![PathBuf::from("clip_01.mp4"), PathBuf::from("extra.mkv")]
    );
    let records = harness.store.records(&harness.root.id).unwrap();
    assert_eq!(records.len(), 6);
    assert!(
        records
            .iter()
            .all(|record| record.relative_path != PathBuf::from("clip_02.mp4"))
    );
}

#[test]
fn incremental_scan_defers_extraction_to_the_job_queue() {
    let (tx, rx) = mpsc::channel::<BackgroundJob>();
    let harness = Harness::builder().build();
    write_clips(harness.root_path(), 3);

    let queued = ScanOrchestrator::new(
        Arc::clone(&harness.store),
        Arc::new(ScriptedProcessor::default()),
        ScanOptions::default(),
        ScanCallbacks::new(),
    )
    .with_job_queue(Arc::new(tx));
    queued.start_incremental(harness.root.clone()).unwrap();
    assert!(queued.wait_idle(&harness.root.id, WAIT));

    let jobs: Vec<BackgroundJob> = rx.try_iter().collect();
    assert_eq!(jobs.len(), 6);
    let mut per_type: HashMap<JobType, usize> = HashMap::new();
    for job in &jobs {
        *per_type.entry(job.job_type).or_default() += 1;
        assert_eq!(job.payload.root_id, harness.root.id);
    }
    assert_eq!(per_type.get(&JobType::ExtractMetadata), Some(&3));
    assert_eq!(per_type.get(&JobType::GenerateThumbnail), Some(&3));

    let state = queued.status(&harness.root.id).unwrap().unwrap();
    assert!(state.outputs.iter().all(|asset| asset.placeholder));
    for asset in &state.outputs {
        assert_eq!(
            queued.roots().item_path(&asset.id),
            Some(harness.root_path().join(&asset.relative_path))
        );
    }
}

#[test]
fn identical_content_is_flagged_as_duplicate() {
    let harness = Harness::builder()
        .options(ScanOptions::default().with_segment_size(1).with_concurrency(1))
        .build();
    std::fs::write(harness.root_path().join("a.mp4"), b"same bytes").unwrap();
    std::fs::write(harness.root_path().join("b.mp4"), b"same bytes").unwrap();
    std::fs::write(harness.root_path().join("c.mp4"), b"other bytes").unwrap();

    harness.orchestrator.start(harness.root.clone()).unwrap();
    harness.wait();

    let state = harness.state();
    let by_path: HashMap<PathBuf, Option<PathBuf>> = state
        .outputs
        .iter()
        .map(|asset| (asset.relative_path.clone(), asset.duplicate_of.clone()))
        .collect();
    assert_eq!(by_path[&PathBuf::from("a.mp4")], None);
    assert_eq!(by_path[&PathBuf::from("b.mp4")], Some(PathBuf::from("a.mp4")));
    assert_eq!(by_path[&PathBuf::from("c.mp4")], None);
}

#[test]
fn paused_scan_resumes_from_sqlite_in_a_new_orchestrator() {
    let db_dir = tempfile::tempdir().unwrap();
    let db_path = db_dir.path().join("scans.db");
    let first = Harness::builder()
        .store(Arc::new(SqliteScanStore::open(&db_path).unwrap()))
        .pause_at(10)
        .build();
    write_clips(first.root_path(), 25);
    first.orchestrator.start(first.root.clone()).unwrap();
    first.wait();
    assert_eq!(first.state().status, ScanStatus::Paused);

    let second = Harness::builder()
        .store(Arc::new(SqliteScanStore::open(&db_path).unwrap()))
        .build();
    second.orchestrator.roots().register_root(first.root.clone());
    let outcome = second.orchestrator.resume(&first.root.id).unwrap();
    assert!(matches!(outcome, ResumeOutcome::Resumed(_)));
    assert!(second.orchestrator.wait_idle(&first.root.id, WAIT));

    let state = second.orchestrator.status(&first.root.id).unwrap().unwrap();
    assert_eq!(state.status, ScanStatus::Completed);
    assert_eq!(state.progress.processed, 25);
    assert_eq!(state.outputs.len(), 25);
    assert_eq!(second.events.files.lock().unwrap().len(), 15);
}

#[test]
fn scan_that_failed_before_discovery_must_be_started_again() {
    let store = Arc::new(FlakyStore::default());
    store.failing_record_loads.store(1, Ordering::SeqCst);
    let harness = Harness::builder().store(store.clone()).build();
    write_clips(harness.root_path(), 20);

    harness.orchestrator.start(harness.root.clone()).unwrap();
    harness.wait();
    let failed = harness.state();
    assert_eq!(failed.status, ScanStatus::Error);
    assert!(!failed.discovered);
    assert_eq!(harness.events.errors.lock().unwrap().len(), 1);

    let err = harness.orchestrator.resume(&harness.root.id).unwrap_err();
    assert!(matches!(
        err,
        ScanControlError::NotResumable {
            status: ScanStatus::Error,
            ..
        }
    ));
    assert_eq!(harness.state().status, ScanStatus::Error);

    harness.orchestrator.start(harness.root.clone()).unwrap();
    harness.wait();
    let state = harness.state();
    assert_eq!(state.status, ScanStatus::Completed);
    assert_eq!(state.progress.processed, 20);
    assert_eq!(state.outputs.len(), 20);
}

#[test]
fn cancel_during_classification_wins_over_an_empty_work_list() {
    let harness = Harness::builder().cancel_on_classified().build();
    write_clips(harness.root_path(), 8);
    harness.orchestrator.start(harness.root.clone()).unwrap();
    harness.wait();
    assert_eq!(harness.state().status, ScanStatus::Completed);

    harness
        .orchestrator
        .start_incremental(harness.root.clone())
        .unwrap();
    harness.wait();

    let state = harness.state();
    assert_eq!(state.status, ScanStatus::Cancelled);
    assert_eq!(state.progress.total, 0);
    assert_eq!(harness.events.cancelled.lock().unwrap().len(), 1);
    assert_eq!(harness.events.completed.lock().unwrap().len(), 1);
}

#[test]
fn failed_initial_save_ends_the_scan_in_error() {
    let store = Arc::new(FlakyStore::default());
    store.failing_saves.store(1, Ordering::SeqCst);
    let harness = Harness::builder().store(store.clone()).build();
    write_clips(harness.root_path(), 5);

    harness.orchestrator.start(harness.root.clone()).unwrap();
    harness.wait();

    let state = harness.state();
    assert_eq!(state.status, ScanStatus::Error);
    assert_eq!(state.progress.processed, 0);
    assert!(state.error.as_deref().unwrap_or_default().contains("initial scan state"));
    assert_eq!(harness.events.errors.lock().unwrap().len(), 1);
    assert!(harness.events.files.lock().unwrap().is_empty());
    assert!(harness.events.completed.lock().unwrap().is_empty());
}

#[test]
fn failed_checkpoints_and_manifest_writes_do_not_stop_the_scan() {
    let store = Arc::new(FlakyStore::default());
    store.fail_checkpoints.store(true, Ordering::SeqCst);
    store.fail_upserts.store(true, Ordering::SeqCst);
    let harness = Harness::builder().store(store.clone()).build();
    write_clips(harness.root_path(), 25);

    harness.orchestrator.start(harness.root.clone()).unwrap();
    harness.wait();

    let state = harness.state();
    assert_eq!(state.status, ScanStatus::Completed);
    assert_eq!(state.progress.processed, 25);
    assert_eq!(state.outputs.len(), 25);
    assert!(harness.events.errors.lock().unwrap().is_empty());
    assert_eq!(harness.events.completed.lock().unwrap().len(), 1);
    assert!(store.failed_writes.load(Ordering::SeqCst) >= 25 + 3);
    assert!(harness.store.records(&harness.root.id).unwrap().is_empty());
}
