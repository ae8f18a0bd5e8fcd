//! Integration tests for the job orchestrator state machine.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use vidfetch_core::{
    CookieRecord, CredentialBridge, CredentialState, JobOutcome, JobPhase, MemoryCookieStore,
    Orchestrator, OrchestratorError, OrchestratorState, SelectOutcome, Stage, VideoInfo,
};

mod support;
use support::fake_backend::{FakeBackend, Fault, FileReply, format, song_info};

fn orchestrator(backend: &Arc<FakeBackend>) -> Arc<Orchestrator> {
    Arc::new(Orchestrator::new(backend.clone(), "default_user"))
}

/// Waits until the observed state satisfies `predicate`.
async fn wait_for(
    orchestrator: &Orchestrator,
    predicate: impl Fn(&OrchestratorState) -> bool,
) {
    let mut rx = orchestrator.subscribe();
    rx.wait_for(|state| predicate(state))
        .await
        .unwrap_or_else(|_| panic!("state channel closed"));
}

#[tokio::test]
async fn test_analyze_publishes_info_and_stage() {
    let backend = FakeBackend::new();
    let orchestrator = orchestrator(&backend);

    let info = orchestrator.analyze("https://youtu.be/x").await.unwrap();

    assert_eq!(info.title, "Song");
    assert_eq!(info.duration_label(), "2:05");
    let state = orchestrator.snapshot();
    assert_eq!(state.stage(), Stage::HasInfo);
    assert!(!state.analyzing);
    assert!(state.last_error.is_none());
}

#[tokio::test]
async fn test_analyze_empty_url_makes_no_call() {
    let backend = FakeBackend::new();
    let orchestrator = orchestrator(&backend);

    let err = orchestrator.analyze("   ").await.unwrap_err();

    assert!(matches!(err, OrchestratorError::EmptyUrl));
    assert_eq!(backend.info_calls.load(Ordering::SeqCst), 0);
    assert!(orchestrator.snapshot().last_error.is_some());
}

#[tokio::test]
async fn test_analyze_auth_fault_marks_credentials_absent() {
    let backend = FakeBackend::new();
    backend.set_info(Err(Fault::Auth));
    let orchestrator = orchestrator(&backend);

    let err = orchestrator.analyze("https://youtu.be/x").await.unwrap_err();

    assert!(err.fault_class().is_auth());
    let state = orchestrator.snapshot();
    assert_eq!(state.credentials, CredentialState::Absent);
    assert_eq!(state.last_error.as_deref(), Some("Cookies expired"));
    assert!(state.info.is_none());
}

#[tokio::test]
async fn test_analyze_failure_clears_previous_info() {
    let backend = FakeBackend::new();
    let orchestrator = orchestrator(&backend);
    orchestrator.analyze("https://youtu.be/x").await.unwrap();

    backend.set_info(Err(Fault::Status(500)));
    orchestrator.analyze("https://youtu.be/y").await.unwrap_err();

    let state = orchestrator.snapshot();
    assert!(state.info.is_none());
    assert_eq!(state.stage(), Stage::Idle);
    assert_eq!(state.credentials, CredentialState::Unknown);
}

fn titled(title: &str) -> VideoInfo {
    VideoInfo {
        title: title.to_string(),
        ..song_info()
    }
}

#[tokio::test(start_paused = true)]
async fn test_late_analysis_does_not_replace_newer_info() {
    let backend = FakeBackend::new();
    backend.script_info("https://youtu.be/old", Duration::from_secs(5), Ok(titled("Old")));
    backend.script_info("https://youtu.be/new", Duration::ZERO, Ok(titled("New")));
    let orchestrator = orchestrator(&backend);

    let slow = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.analyze("https://youtu.be/old").await })
    };
    wait_for(&orchestrator, |s| s.analyzing).await;

    let newer = orchestrator.analyze("https://youtu.be/new").await.unwrap();
    assert_eq!(newer.title, "New");
    let older = slow.await.unwrap().unwrap();
    assert_eq!(older.title, "Old");

    let state = orchestrator.snapshot();
    assert_eq!(state.info.as_ref().map(|i| i.title.as_str()), Some("New"));
    assert_eq!(state.source_url.as_deref(), Some("https://youtu.be/new"));
    assert!(!state.analyzing);
    assert_eq!(state.stage(), Stage::HasInfo);
}

#[tokio::test(start_paused = true)]
async fn test_late_analysis_failure_keeps_newer_info() {
    let backend = FakeBackend::new();
    backend.script_info("https://youtu.be/old", Duration::from_secs(5), Err(Fault::Auth));
    backend.script_info("https://youtu.be/new", Duration::ZERO, Ok(titled("New")));
    let orchestrator = orchestrator(&backend);

    let slow = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.analyze("https://youtu.be/old").await })
    };
    wait_for(&orchestrator, |s| s.analyzing).await;
    orchestrator.analyze("https://youtu.be/new").await.unwrap();

    let err = slow.await.unwrap().unwrap_err();
    assert!(err.fault_class().is_auth());

    let state = orchestrator.snapshot();
    assert_eq!(state.info.as_ref().map(|i| i.title.as_str()), Some("New"));
    assert!(state.last_error.is_none());
    assert!(!state.analyzing);
    assert_eq!(state.credentials, CredentialState::Absent);
}

#[tokio::test(start_paused = true)]
async fn test_select_format_completes_and_returns_to_idle() {
    let backend = FakeBackend::new();
    backend.script_files(
        [FileReply::Status(202, 0), FileReply::Status(200, 2048)],
        FileReply::Status(202, 0),
    );
    let orchestrator = orchestrator(&backend);
    let info = orchestrator.analyze("https://youtu.be/x").await.unwrap();
    let f1 = info.find_format("f1").unwrap().clone();

    let outcome = orchestrator.select_format(&f1).await;

    let SelectOutcome::Finished(JobOutcome::Completed { artifact }) = outcome else {
        panic!("expected Completed, got {outcome:?}");
    };
    assert_eq!(artifact.file_name, "Song.mp4");
    assert_eq!(artifact.len(), 2048);

    let state = orchestrator.snapshot();
    assert_eq!(state.phase(), JobPhase::Idle);
    assert_eq!(state.stage(), Stage::HasInfo);
    assert_eq!(state.last_artifact_name(), Some("Song.mp4"));
    assert!(matches!(state.last_outcome, Some(JobOutcome::Completed { .. })));
    assert_eq!(backend.submit_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_select_format_without_info_is_ignored() {
    let backend = FakeBackend::new();
    let orchestrator = orchestrator(&backend);

    let outcome = orchestrator
        .select_format(&format("f1", "mp4", false, Some(720)))
        .await;

    assert_eq!(outcome, SelectOutcome::NoInfo);
    assert_eq!(backend.submit_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_select_unknown_format_is_ignored() {
    let backend = FakeBackend::new();
    let orchestrator = orchestrator(&backend);
    orchestrator.analyze("https://youtu.be/x").await.unwrap();

    let outcome = orchestrator
        .select_format(&format("zz", "mp4", false, Some(144)))
        .await;

    assert_eq!(outcome, SelectOutcome::UnknownFormat);
    assert_eq!(backend.submit_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_second_select_while_busy_is_noop() {
    let backend = FakeBackend::new();
    backend.script_files([], FileReply::Status(202, 0));
    let orchestrator = orchestrator(&backend);
    orchestrator.analyze("https://youtu.be/x").await.unwrap();
    let info = song_info();
    let f1 = info.find_format("f1").unwrap().clone();
    let a1 = info.find_format("a1").unwrap().clone();

    let first = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.select_format(&f1).await })
    };
    wait_for(&orchestrator, |s| s.phase() == JobPhase::Polling).await;
    let before = orchestrator.snapshot();

    let second = orchestrator.select_format(&a1).await;

    assert_eq!(second, SelectOutcome::Busy);
    let after = orchestrator.snapshot();
    let job = after.job.as_ref().unwrap();
    assert_eq!(job.format.format_id, "f1");
    assert_eq!(job.job_id, before.job.as_ref().unwrap().job_id);
    assert_eq!(backend.submit_calls.load(Ordering::SeqCst), 1);

    assert!(orchestrator.cancel().await);
    assert_eq!(
        first.await.unwrap(),
        SelectOutcome::Finished(JobOutcome::Cancelled)
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_polling_commits_cancelled_and_cancels_remotely() {
    let backend = FakeBackend::new();
    backend.script_files([], FileReply::Status(202, 0));
    backend.set_cancel_result(Err(Fault::Status(404)));
    let orchestrator = orchestrator(&backend);
    orchestrator.analyze("https://youtu.be/x").await.unwrap();
    let f1 = song_info().find_format("f1").unwrap().clone();

    let job = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.select_format(&f1).await })
    };
    wait_for(&orchestrator, |s| s.phase() == JobPhase::Polling).await;

    assert!(orchestrator.cancel().await, "remote failure is not escalated");

    let state = orchestrator.snapshot();
    assert_eq!(state.phase(), JobPhase::Idle);
    assert_eq!(state.last_outcome, Some(JobOutcome::Cancelled));
    assert_eq!(state.last_error.as_deref(), Some("Download cancelled."));
    assert_eq!(backend.cancelled_jobs(), vec!["J1".to_string()]);

    assert_eq!(job.await.unwrap(), SelectOutcome::Finished(JobOutcome::Cancelled));
    assert_eq!(orchestrator.snapshot().last_outcome, Some(JobOutcome::Cancelled));
}

#[tokio::test]
async fn test_cancel_when_idle_returns_false() {
    let backend = FakeBackend::new();
    let orchestrator = orchestrator(&backend);
    assert!(!orchestrator.cancel().await);
    assert!(backend.cancelled_jobs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_submit_cancels_late_job_id_and_skips_polling() {
    let backend = FakeBackend::new();
    let gate = backend.gate_submit();
    backend.set_submit(Ok("J9"));
    let orchestrator = orchestrator(&backend);
    orchestrator.analyze("https://youtu.be/x").await.unwrap();
    let f1 = song_info().find_format("f1").unwrap().clone();

    let job = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.select_format(&f1).await })
    };
    wait_for(&orchestrator, |s| s.phase() == JobPhase::Submitting).await;

    assert!(orchestrator.cancel().await);
    assert!(backend.cancelled_jobs().is_empty(), "no job id known yet");

    gate.notify_one();
    assert_eq!(job.await.unwrap(), SelectOutcome::Finished(JobOutcome::Cancelled));
    assert_eq!(backend.cancelled_jobs(), vec!["J9".to_string()]);
    assert_eq!(backend.file_calls(), 0, "polling never started");
    assert_eq!(orchestrator.snapshot().phase(), JobPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_poll_auth_expired_marks_credentials_absent() {
    let backend = FakeBackend::new();
    backend.script_files(
        [FileReply::Status(202, 0), FileReply::Status(202, 0), FileReply::Status(401, 0)],
        FileReply::Status(200, 5000),
    );
    let orchestrator = orchestrator(&backend);
    orchestrator.startup_check().await;
    assert_eq!(orchestrator.snapshot().credentials, CredentialState::Present);
    orchestrator.analyze("https://youtu.be/x").await.unwrap();
    let f1 = song_info().find_format("f1").unwrap().clone();

    let outcome = orchestrator.select_format(&f1).await;

    assert_eq!(outcome, SelectOutcome::Finished(JobOutcome::AuthExpired));
    let state = orchestrator.snapshot();
    assert_eq!(state.credentials, CredentialState::Absent);
    assert_eq!(
        state.last_error.as_deref(),
        Some("Session cookies expired. Please re-upload cookies.")
    );
    assert_eq!(backend.file_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_poll_timeout_and_rejection_messages() {
    let backend = FakeBackend::new();
    backend.script_files([], FileReply::Status(200, 10));
    let orchestrator = orchestrator(&backend);
    orchestrator.analyze("https://youtu.be/x").await.unwrap();
    let f1 = song_info().find_format("f1").unwrap().clone();

    assert_eq!(
        orchestrator.select_format(&f1).await,
        SelectOutcome::Finished(JobOutcome::TimedOut)
    );
    assert_eq!(
        orchestrator.snapshot().last_error.as_deref(),
        Some("Download timed out or failed.")
    );

    backend.script_files([FileReply::Status(400, 0)], FileReply::Status(202, 0));
    assert_eq!(
        orchestrator.select_format(&f1).await,
        SelectOutcome::Finished(JobOutcome::Rejected)
    );
    assert_eq!(
        orchestrator.snapshot().last_error.as_deref(),
        Some("Download was cancelled or rejected by the server.")
    );
}

#[tokio::test]
async fn test_submit_failure_is_not_retried() {
    let backend = FakeBackend::new();
    backend.set_submit(Err(Fault::Status(500)));
    let orchestrator = orchestrator(&backend);
    orchestrator.analyze("https://youtu.be/x").await.unwrap();
    let f1 = song_info().find_format("f1").unwrap().clone();

    let outcome = orchestrator.select_format(&f1).await;

    assert_eq!(outcome, SelectOutcome::Finished(JobOutcome::Rejected));
    assert_eq!(backend.submit_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.file_calls(), 0);
    let state = orchestrator.snapshot();
    assert_eq!(state.phase(), JobPhase::Idle);
    assert_eq!(state.last_error.as_deref(), Some("backend failure"));
}

#[tokio::test]
async fn test_submit_auth_failure_marks_credentials_absent() {
    let backend = FakeBackend::new();
    backend.set_submit(Err(Fault::Auth));
    let orchestrator = orchestrator(&backend);
    orchestrator.analyze("https://youtu.be/x").await.unwrap();
    let f1 = song_info().find_format("f1").unwrap().clone();

    let outcome = orchestrator.select_format(&f1).await;

    assert_eq!(outcome, SelectOutcome::Finished(JobOutcome::AuthExpired));
    assert_eq!(orchestrator.snapshot().credentials, CredentialState::Absent);
}

#[tokio::test(start_paused = true)]
async fn test_progress_is_published_while_polling() {
    let backend = FakeBackend::new();
    backend.set_progress(42);
    backend.script_files([], FileReply::Status(202, 0));
    let orchestrator = Arc::new(
        Orchestrator::new(backend.clone(), "default_user")
            .with_progress_interval(Duration::from_millis(1000)),
    );
    orchestrator.analyze("https://youtu.be/x").await.unwrap();
    let f1 = song_info().find_format("f1").unwrap().clone();

    let job = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.select_format(&f1).await })
    };
    wait_for(&orchestrator, |s| s.progress() == 42).await;
    assert!(backend.progress_calls.load(Ordering::SeqCst) >= 1);

    orchestrator.cancel().await;
    job.await.unwrap();
    assert_eq!(orchestrator.snapshot().progress(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_analysis_during_job_leaves_job_untouched() {
    let backend = FakeBackend::new();
    backend.set_progress(30);
    backend.script_files(
        [FileReply::Status(202, 0), FileReply::Status(202, 0)],
        FileReply::Status(200, 5000),
    );
    let orchestrator = orchestrator(&backend);
    orchestrator.analyze("https://youtu.be/x").await.unwrap();
    let f1 = song_info().find_format("f1").unwrap().clone();

    let job = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.select_format(&f1).await })
    };
    wait_for(&orchestrator, |s| s.phase() == JobPhase::Polling && s.progress() == 30).await;
    let before = orchestrator.snapshot().job.unwrap();

    orchestrator.analyze("https://youtu.be/other").await.unwrap();
    backend.set_info(Err(Fault::Status(500)));
    orchestrator.analyze("https://youtu.be/broken").await.unwrap_err();

    let state = orchestrator.snapshot();
    let during = state.job.as_ref().unwrap();
    assert_eq!(during.job_id, before.job_id);
    assert_eq!(during.job_id.as_deref(), Some("J1"));
    assert_eq!(during.title, "Song");
    assert_eq!(during.format.format_id, "f1");
    assert_eq!(during.phase, JobPhase::Polling);
    assert_eq!(during.progress, 30);
    assert!(state.info.is_none());
    assert!(state.last_error.is_some());

    let outcome = job.await.unwrap();
    let SelectOutcome::Finished(JobOutcome::Completed { artifact }) = outcome else {
        panic!("expected Completed, got {outcome:?}");
    };
    assert_eq!(artifact.file_name, "Song.mp4");
    assert_eq!(backend.submit_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_download_reports_progress_then_saves_sanitized_file() {
    let backend = FakeBackend::new();
    backend.set_info(Ok(titled("AC/DC: \"Live\" <2024>?")));
    backend.script_progress([10, 40, 90]);
    backend.script_files(
        [FileReply::Status(202, 0), FileReply::Status(202, 0)],
        FileReply::Status(200, 50_000),
    );
    let orchestrator = orchestrator(&backend);
    let info = orchestrator.analyze("https://youtu.be/x").await.unwrap();
    let f1 = info.find_format("f1").unwrap().clone();

    let recorder = {
        let mut rx = orchestrator.subscribe();
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update();
                let progress = state.progress();
                if progress != 0 && seen.last() != Some(&progress) {
                    seen.push(progress);
                }
                if state.last_outcome.is_some() {
                    break;
                }
            }
            seen
        })
    };

    let outcome = orchestrator.select_format(&f1).await;

    let SelectOutcome::Finished(JobOutcome::Completed { artifact }) = outcome else {
        panic!("expected Completed, got {outcome:?}");
    };
    assert_eq!(artifact.file_name, "ACDC Live 2024.mp4");
    assert_eq!(artifact.len(), 50_000);
    assert_eq!(recorder.await.unwrap(), vec![10, 40, 90]);

    let state = orchestrator.snapshot();
    assert_eq!(state.phase(), JobPhase::Idle);
    assert_eq!(state.last_artifact_name(), Some("ACDC Live 2024.mp4"));
    assert!(state.last_error.is_none());
}

#[tokio::test]
async fn test_startup_check_fault_reads_absent() {
    let backend = FakeBackend::new();
    backend.set_has_cookies(Err(Fault::Transport));
    let orchestrator = orchestrator(&backend);

    assert_eq!(orchestrator.startup_check().await, CredentialState::Absent);
    assert_eq!(orchestrator.snapshot().credentials, CredentialState::Absent);
}

#[tokio::test]
async fn test_upload_credentials_validates_locally() {
    let backend = FakeBackend::new();
    let orchestrator = orchestrator(&backend);

    let err = orchestrator.upload_credentials("not a cookie file").await.unwrap_err();

    assert!(matches!(err, OrchestratorError::InvalidCookies(_)));
    assert!(backend.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_credentials_success_and_failure() {
    let backend = FakeBackend::new();
    let orchestrator = orchestrator(&backend);
    let text = ".youtube.com\tFALSE\t/\tTRUE\t0\tSID\tabc";

    orchestrator.upload_credentials(text).await.unwrap();
    assert_eq!(orchestrator.snapshot().credentials, CredentialState::Present);
    assert_eq!(backend.uploads.lock().unwrap().as_slice(), [text.to_string()]);

    backend.set_upload(Err(Fault::Status(400)));
    orchestrator.upload_credentials(text).await.unwrap_err();
    let state = orchestrator.snapshot();
    assert_eq!(state.credentials, CredentialState::Absent);
    assert_eq!(
        state.last_error.as_deref(),
        Some("Failed to upload cookies: No cookies received")
    );
}

#[tokio::test]
async fn test_sync_browser_credentials_uploads_bridge_blob() {
    let backend = FakeBackend::new();
    let orchestrator = orchestrator(&backend);
    let store = MemoryCookieStore::new(vec![CookieRecord::new(
        ".youtube.com",
        false,
        "/",
        true,
        1_735_689_600,
        "SID",
        "abc",
    )]);
    let bridge = CredentialBridge::spawn(Arc::new(store), ".youtube.com");

    orchestrator
        .sync_browser_credentials(bridge.page(), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(
        backend.uploads.lock().unwrap().as_slice(),
        [".youtube.com\tFALSE\t/\tTRUE\t1735689600\tSID\tabc".to_string()]
    );
    assert_eq!(orchestrator.snapshot().credentials, CredentialState::Present);
}

#[tokio::test]
async fn test_sync_browser_credentials_surfaces_bridge_fault() {
    let backend = FakeBackend::new();
    let orchestrator = orchestrator(&backend);
    let bridge = CredentialBridge::spawn(Arc::new(MemoryCookieStore::default()), ".youtube.com");

    let err = orchestrator
        .sync_browser_credentials(bridge.page(), Duration::from_secs(5))
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::Bridge(_)));
    let message = orchestrator.snapshot().last_error.unwrap();
    assert!(message.starts_with("No cookies found"), "{message}");
    assert!(backend.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_test_credentials_flips_state() {
    let backend = FakeBackend::new();
    let orchestrator = orchestrator(&backend);

    let title = orchestrator
        .test_credentials("https://www.youtube.com/watch?v=restricted")
        .await
        .unwrap();
    assert_eq!(title, "Restricted Song");
    assert_eq!(orchestrator.snapshot().credentials, CredentialState::Present);

    backend.set_test_cookies(Err(Fault::Auth));
    orchestrator
        .test_credentials("https://www.youtube.com/watch?v=restricted")
        .await
        .unwrap_err();
    assert_eq!(orchestrator.snapshot().credentials, CredentialState::Absent);
}
