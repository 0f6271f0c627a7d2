
use std::sync::Arc;
use std::time::Duration;

use lookgen::*;
use test_helpers::*;

const DEADLINE: Duration = Duration::from_secs(2);

fn base_request() -> GenerationRequest {
    GenerationRequest::new("ws-1", "")
        .with_model("model-m1")
        .with_top_garment("garment-red-jacket")
}

/// Drive a fresh coordinator's first slot all the way to results.
async fn batch_with_result(
    api: &Arc<MockGenerationService>,
) -> (BatchCoordinator<MockGenerationService>, String) {
    api.script_job("J1", vec![ScriptStep::Poll(JobPoll::completed("A1"))]);
    api.insert_asset(make_asset("A1", "look one"));

    let batch = BatchCoordinator::new(api.clone(), base_request(), fast_batch(10));
    let slot_id = batch.slots()[0].id.clone();
    batch.set_prompt(&slot_id, "look one").unwrap();
    batch.submit_slot(&slot_id).await.unwrap();

    assert!(
        wait_until(DEADLINE, || {
            batch.slot(&slot_id).unwrap().status == GenerationStatus::Results
        })
        .await
    );
    (batch, slot_id)
}

// ── Single-look path ────────────────────────────────────────────────

#[tokio::test]
async fn test_single_happy_path() {
    let api = MockGenerationService::new();
    api.script_job(
        "J1",
        vec![
            ScriptStep::Poll(JobPoll::pending()),
            ScriptStep::Poll(JobPoll::pending()),
            ScriptStep::Poll(JobPoll::completed("A1")),
        ],
    );
    api.insert_asset(make_asset("A1", "red jacket on model M1"));

    let single = SingleGenerationController::new(api.clone(), fast_poll(10));
    let job_id = single
        .generate(GenerationRequest::new("ws-1", "red jacket on model M1"))
        .await
        .unwrap();
    assert_eq!(job_id, "J1");

    assert!(
        wait_until(DEADLINE, || {
            single.state().status == GenerationStatus::Results
        })
        .await
    );

    let state = single.state();
    let asset = state.result.unwrap();
    assert_eq!(asset.id, "A1");
    assert_eq!(asset.prompt, "red jacket on model M1");
    assert_eq!(state.attempts, 2);
    // Handle is spent once the outcome resolved
    assert!(state.job_id.is_none());
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_single_times_out_after_exact_attempt_ceiling() {
    let api = MockGenerationService::new();
    api.script_job("J1", vec![]); // never reaches a terminal status

    let single = SingleGenerationController::new(api.clone(), fast_poll(10));
    single
        .generate(GenerationRequest::new("ws-1", "red jacket"))
        .await
        .unwrap();

    assert!(
        wait_until(DEADLINE, || {
            single.state().status == GenerationStatus::TimedOutChecking
        })
        .await
    );
    assert_eq!(api.poll_count("J1"), 10);

    // The timer is stopped: no further polls are ever issued.
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(api.poll_count("J1"), 10);

    // A give-up is not a failure, and the handle survives so the job
    // can be checked on later.
    let state = single.state();
    assert!(state.error.is_none());
    assert_eq!(state.job_id.as_deref(), Some("J1"));
    assert_eq!(state.attempts, 10);
}

#[tokio::test]
async fn test_single_server_failure_surfaces_message() {
    let api = MockGenerationService::new();
    api.script_job(
        "J1",
        vec![ScriptStep::Poll(JobPoll::failed("model render crashed"))],
    );

    let single = SingleGenerationController::new(api.clone(), fast_poll(10));
    single
        .generate(GenerationRequest::new("ws-1", "red jacket"))
        .await
        .unwrap();

    assert!(
        wait_until(DEADLINE, || {
            single.state().status == GenerationStatus::Failed
        })
        .await
    );
    let state = single.state();
    assert_eq!(state.error.as_deref(), Some("model render crashed"));
    assert!(state.job_id.is_none());
}

#[tokio::test]
async fn test_single_resolution_failure_is_distinct_from_generation_failure() {
    let api = MockGenerationService::new();
    api.script_job("J1", vec![ScriptStep::Poll(JobPoll::completed("A2"))]);
    api.fail_asset("A2");

    let single = SingleGenerationController::new(api.clone(), fast_poll(10));
    single
        .generate(GenerationRequest::new("ws-1", "red jacket"))
        .await
        .unwrap();

    assert!(
        wait_until(DEADLINE, || {
            single.state().status == GenerationStatus::Failed
        })
        .await
    );
    let error = single.state().error.unwrap();
    assert!(error.contains("A2"));
    assert!(error.contains("could not be fetched"));
}

#[tokio::test]
async fn test_single_transient_poll_errors_keep_polling() {
    let api = MockGenerationService::new();
    api.script_job(
        "J1",
        vec![
            ScriptStep::Transient,
            ScriptStep::Transient,
            ScriptStep::Poll(JobPoll::completed("A1")),
        ],
    );
    api.insert_asset(make_asset("A1", "red jacket"));

    let single = SingleGenerationController::new(api.clone(), fast_poll(10));
    single
        .generate(GenerationRequest::new("ws-1", "red jacket"))
        .await
        .unwrap();

    assert!(
        wait_until(DEADLINE, || {
            single.state().status == GenerationStatus::Results
        })
        .await
    );
    assert_eq!(single.state().attempts, 2);
}

#[tokio::test]
async fn test_single_reset_stops_polling_and_discards_late_results() {
    let api = MockGenerationService::new();
    api.script_job(
        "J1",
        vec![
            ScriptStep::Poll(JobPoll::pending()),
            ScriptStep::Poll(JobPoll::pending()),
            ScriptStep::Poll(JobPoll::completed("A1")),
        ],
    );
    api.insert_asset(make_asset("A1", "red jacket"));

    let single = SingleGenerationController::new(api.clone(), fast_poll(10));
    single
        .generate(GenerationRequest::new("ws-1", "red jacket"))
        .await
        .unwrap();
    single.reset();

    // Long enough for the whole script to have played out had the
    // poller kept running.
    tokio::time::sleep(Duration::from_millis(30)).await;
    let calls = api.poll_count("J1");
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(api.poll_count("J1"), calls);
    let state = single.state();
    assert_eq!(state.status, GenerationStatus::Idle);
    assert!(state.result.is_none());
    assert!(state.job_id.is_none());
}

// ── Batch path ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_batch_empty_prompt_fails_locally_without_network() {
    let api = MockGenerationService::new();
    let batch = BatchCoordinator::new(api.clone(), base_request(), fast_batch(10));
    let slot_id = batch.slots()[0].id.clone();

    let err = batch.submit_slot(&slot_id).await.unwrap_err();
    assert!(matches!(err, GenError::Validation(_)));

    let slot = batch.slot(&slot_id).unwrap();
    assert_eq!(slot.status, GenerationStatus::Failed);
    assert!(slot.error.unwrap().contains("prompt"));
    assert_eq!(api.submit_count(), 0);
    assert_eq!(batch.active_pollers(), 0);
}

#[tokio::test]
async fn test_batch_submit_all_is_idempotent() {
    let api = MockGenerationService::new();
    api.script_job("J1", vec![]);
    api.script_job("J2", vec![]);

    let batch = BatchCoordinator::new(api.clone(), base_request(), fast_batch(400));
    batch.resize(3);
    let slots = batch.slots();
    batch.set_prompt(&slots[0].id, "look one").unwrap();
    batch.set_prompt(&slots[1].id, "look two").unwrap();
    // slots[2] stays empty: not eligible, and a batch pass leaves it alone

    assert_eq!(batch.submit_all().await, 2);
    assert_eq!(batch.submit_all().await, 0);
    assert_eq!(api.submit_count(), 2);

    // Each submitted request is the shared base with the slot's prompt
    let request = api.last_request().unwrap();
    assert_eq!(request.prompt, "look two");
    assert_eq!(request.workspace_id, "ws-1");
    assert_eq!(request.top_garment_id.as_deref(), Some("garment-red-jacket"));

    let slots = batch.slots();
    assert_eq!(slots[0].job_id.as_deref(), Some("J1"));
    assert_eq!(slots[1].job_id.as_deref(), Some("J2"));
    assert_eq!(slots[2].status, GenerationStatus::Idle);
    assert!(slots[2].error.is_none());
}

#[tokio::test]
async fn test_batch_slot_lifecycles_are_independent() {
    let api = MockGenerationService::new();
    api.script_job(
        "J1",
        vec![
            ScriptStep::Poll(JobPoll::pending()),
            ScriptStep::Poll(JobPoll::completed("A1")),
        ],
    );
    api.script_job(
        "J2",
        vec![ScriptStep::Poll(JobPoll::failed("bad pose reference"))],
    );
    api.script_job("J3", vec![]); // never terminal
    api.insert_asset(make_asset("A1", "look one"));

    let batch = BatchCoordinator::new(api.clone(), base_request(), fast_batch(5));
    batch.resize(3);
    let ids: Vec<String> = batch.slots().iter().map(|s| s.id.clone()).collect();
    for (i, id) in ids.iter().enumerate() {
        batch.set_prompt(id, format!("look {}", i)).unwrap();
    }

    assert_eq!(batch.submit_all().await, 3);

    assert!(
        wait_until(DEADLINE, || {
            let slots = batch.slots();
            slots[0].status == GenerationStatus::Results
                && slots[1].status == GenerationStatus::Failed
                && slots[2].status == GenerationStatus::TimedOutChecking
        })
        .await
    );

    let slots = batch.slots();
    assert_eq!(slots[0].result.as_ref().unwrap().id, "A1");
    assert!(slots[0].job_id.is_none());

    assert_eq!(slots[1].error.as_deref(), Some("bad pose reference"));
    assert!(slots[1].job_id.is_none());

    // The timed-out slot gave up at its own ceiling: no error, handle
    // retained, exactly max_attempts polls issued.
    assert!(slots[2].error.is_none());
    assert_eq!(slots[2].job_id.as_deref(), Some("J3"));
    assert_eq!(slots[2].attempts, 5);
    assert_eq!(api.poll_count("J3"), 5);
}

#[tokio::test]
async fn test_batch_resize_preserves_surviving_slots() {
    let api = MockGenerationService::new();
    let batch = BatchCoordinator::new(api.clone(), base_request(), fast_batch(10));

    assert_eq!(batch.resize(5), 5);
    let ids: Vec<String> = batch.slots().iter().map(|s| s.id.clone()).collect();
    for (i, id) in ids.iter().enumerate() {
        batch.set_prompt(id, format!("look {}", i)).unwrap();
    }

    assert_eq!(batch.resize(2), 2);
    assert_eq!(batch.resize(4), 4);

    let slots = batch.slots();
    // The first two kept identity and accumulated state
    assert_eq!(slots[0].id, ids[0]);
    assert_eq!(slots[0].prompt, "look 0");
    assert_eq!(slots[1].id, ids[1]);
    assert_eq!(slots[1].prompt, "look 1");
    // The re-grown tail is fresh, not resurrected
    assert_ne!(slots[2].id, ids[2]);
    assert!(slots[2].prompt.is_empty());
    assert_eq!(slots[2].status, GenerationStatus::Idle);
}

#[tokio::test]
async fn test_batch_resize_down_stops_dropped_pollers() {
    let api = MockGenerationService::new();
    api.script_job("J1", vec![]); // never terminal

    let batch = BatchCoordinator::new(api.clone(), base_request(), fast_batch(500));
    batch.resize(3);
    let dropped_id = batch.slots()[2].id.clone();
    batch.set_prompt(&dropped_id, "doomed look").unwrap();
    batch.submit_slot(&dropped_id).await.unwrap();
    assert!(wait_until(DEADLINE, || batch.active_pollers() == 1).await);

    batch.resize(2);
    assert_eq!(batch.active_pollers(), 0);
    assert_eq!(batch.slot_count(), 2);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let calls = api.poll_count("J1");
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(api.poll_count("J1"), calls);
}

#[tokio::test]
async fn test_batch_submit_failure_stays_on_its_slot() {
    let api = MockGenerationService::new();
    api.script_job("J1", vec![]); // capacity for one job only

    let batch = BatchCoordinator::new(api.clone(), base_request(), fast_batch(400));
    let slots = batch.slots();
    batch.set_prompt(&slots[0].id, "look one").unwrap();
    batch.set_prompt(&slots[1].id, "look two").unwrap();

    assert_eq!(batch.submit_all().await, 1);

    let slots = batch.slots();
    assert_eq!(slots[0].status, GenerationStatus::Generating);
    assert_eq!(slots[0].job_id.as_deref(), Some("J1"));
    // The sibling's failure is recorded on the sibling alone
    assert_eq!(slots[1].status, GenerationStatus::Failed);
    assert!(slots[1].error.as_ref().unwrap().contains("no capacity"));
}

#[tokio::test]
async fn test_batch_reset_slot_discards_late_result() {
    let api = MockGenerationService::new();
    api.script_job(
        "J1",
        vec![
            ScriptStep::Poll(JobPoll::pending()),
            ScriptStep::Poll(JobPoll::pending()),
            ScriptStep::Poll(JobPoll::completed("A1")),
        ],
    );
    api.insert_asset(make_asset("A1", "look one"));

    let batch = BatchCoordinator::new(api.clone(), base_request(), fast_batch(10));
    let slot_id = batch.slots()[0].id.clone();
    batch.set_prompt(&slot_id, "look one").unwrap();
    batch.submit_slot(&slot_id).await.unwrap();
    assert!(wait_until(DEADLINE, || batch.active_pollers() == 1).await);

    batch.reset_slot(&slot_id).unwrap();
    assert_eq!(batch.active_pollers(), 0);

    // Had the poller kept running, the script would resolve by now.
    tokio::time::sleep(Duration::from_millis(40)).await;
    let slot = batch.slots()[0].clone();
    assert_eq!(slot.status, GenerationStatus::Idle);
    assert!(slot.result.is_none());
    assert!(slot.job_id.is_none());
}

// ── Optimistic likes ────────────────────────────────────────────────

#[tokio::test]
async fn test_like_toggle_applies_and_confirms() {
    let api = MockGenerationService::new();
    let (batch, slot_id) = batch_with_result(&api).await;

    assert_eq!(batch.toggle_like(&slot_id).await.unwrap(), Some(true));
    let asset = batch.slot(&slot_id).unwrap().result.unwrap();
    assert!(asset.liked);
    assert_eq!(asset.like_count, 1);
    assert_eq!(api.like_calls(), vec![("A1".to_string(), true)]);

    assert_eq!(batch.toggle_like(&slot_id).await.unwrap(), Some(false));
    let asset = batch.slot(&slot_id).unwrap().result.unwrap();
    assert!(!asset.liked);
    assert_eq!(asset.like_count, 0);
}

#[tokio::test]
async fn test_like_toggle_reverts_on_server_failure() {
    let api = MockGenerationService::new();
    let (batch, slot_id) = batch_with_result(&api).await;
    api.fail_next_like();

    let err = batch.toggle_like(&slot_id).await.unwrap_err();
    assert!(matches!(err, GenError::Http { status: 500, .. }));

    // Flag and counter are back at their pre-toggle values
    let asset = batch.slot(&slot_id).unwrap().result.unwrap();
    assert!(!asset.liked);
    assert_eq!(asset.like_count, 0);
    assert_eq!(api.like_calls().len(), 1);
}

#[tokio::test]
async fn test_like_toggle_suppresses_concurrent_calls() {
    let api = MockGenerationService::new();
    let (batch, slot_id) = batch_with_result(&api).await;
    api.set_like_delay(Duration::from_millis(30));

    let (first, second) = tokio::join!(
        batch.toggle_like(&slot_id),
        batch.toggle_like(&slot_id)
    );

    // Exactly one toggle reached the service; the other was a no-op.
    assert_eq!(first.unwrap(), Some(true));
    assert_eq!(second.unwrap(), None);
    assert_eq!(api.like_calls().len(), 1);

    let asset = batch.slot(&slot_id).unwrap().result.unwrap();
    assert!(asset.liked);
    assert_eq!(asset.like_count, 1);
}

#[tokio::test]
async fn test_batch_regenerate_reuses_slot() {
    let api = MockGenerationService::new();
    let (batch, slot_id) = batch_with_result(&api).await;

    // An explicit resubmission of a resolved slot starts a new job.
    api.script_job("J2", vec![ScriptStep::Poll(JobPoll::completed("A3"))]);
    api.insert_asset(make_asset("A3", "look one"));
    batch.submit_slot(&slot_id).await.unwrap();

    assert!(
        wait_until(DEADLINE, || {
            batch
                .slot(&slot_id)
                .map(|s| {
                    s.status == GenerationStatus::Results
                        && s.result.as_ref().map(|a| a.id.as_str()) == Some("A3")
                })
                .unwrap_or(false)
        })
        .await
    );
    assert_eq!(api.submit_count(), 2);
}
