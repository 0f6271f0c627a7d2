use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::client::GenerationApi;
use crate::config::BatchConfig;
use crate::error::{GenError, Result};
use crate::likes::{LikeGate, LikeState};
use crate::poller::{JobPoller, PollerHandle};
use crate::resolver::ResultResolver;
use crate::types::{BatchSlot, GenerationOutcome, GenerationRequest, GenerationStatus};

/// Runs a batch of 2–5 looks, each with its own independent lifecycle.
///
/// The coordinator owns an ordered collection of [`BatchSlot`]s and one
/// poller per slot that is generating. Slots never couple: one slot
/// failing, timing out, or resolving has no effect on its siblings.
///
/// Every mutation is followed by [`reconcile`](Self::reconcile), which
/// compares "should this slot have a live poller" (status `generating`
/// with a job handle) against "does it", and starts or stops pollers to
/// match. Resizes and resets tear timers down through the same path as
/// submissions bring them up.
pub struct BatchCoordinator<A> {
    api: Arc<A>,
    resolver: Arc<ResultResolver<A>>,
    config: BatchConfig,
    base: GenerationRequest,
    slots: Arc<Mutex<Vec<BatchSlot>>>,
    pollers: Mutex<HashMap<String, PollerHandle>>,
    likes: LikeGate,
}

impl<A: GenerationApi + 'static> BatchCoordinator<A> {
    /// Create a coordinator over the configured minimum number of idle
    /// slots. `base` carries the inputs shared by every look (workspace,
    /// garment/model/accessory references, size, quality); each slot
    /// overrides the prompt and, when set, the pose.
    pub fn new(api: Arc<A>, base: GenerationRequest, config: BatchConfig) -> Self {
        let slots = (0..config.min_slots).map(|_| BatchSlot::fresh()).collect();
        Self {
            resolver: Arc::new(ResultResolver::new(api.clone())),
            api,
            config,
            base,
            slots: Arc::new(Mutex::new(slots)),
            pollers: Mutex::new(HashMap::new()),
            likes: LikeGate::new(),
        }
    }

    fn lock_slots(&self) -> Result<MutexGuard<'_, Vec<BatchSlot>>> {
        self.slots.lock().map_err(|e| GenError::Other(e.to_string()))
    }

    /// Cloned snapshot of all slots, in order.
    pub fn slots(&self) -> Vec<BatchSlot> {
        self.slots.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Cloned snapshot of one slot.
    pub fn slot(&self, slot_id: &str) -> Option<BatchSlot> {
        self.slots
            .lock()
            .ok()?
            .iter()
            .find(|s| s.id == slot_id)
            .cloned()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Number of pollers currently running.
    pub fn active_pollers(&self) -> usize {
        self.pollers
            .lock()
            .map(|p| p.values().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }

    /// Update a slot's prompt text.
    pub fn set_prompt(&self, slot_id: &str, prompt: impl Into<String>) -> Result<()> {
        let mut slots = self.lock_slots()?;
        let slot = find_mut(&mut slots, slot_id)?;
        slot.prompt = prompt.into();
        Ok(())
    }

    /// Update a slot's pose reference.
    pub fn set_pose(&self, slot_id: &str, pose_id: Option<String>) -> Result<()> {
        let mut slots = self.lock_slots()?;
        let slot = find_mut(&mut slots, slot_id)?;
        slot.pose_id = pose_id;
        Ok(())
    }

    /// Change the batch size. Out-of-range requests are clamped, not
    /// rejected; returns the actual size.
    ///
    /// Growing appends fresh idle slots. Shrinking drops trailing slots
    /// along with their pollers; surviving slots keep their accumulated
    /// state untouched.
    pub fn resize(&self, requested: usize) -> usize {
        let target = self.config.clamp_slots(requested);
        if let Ok(mut slots) = self.slots.lock() {
            if target < slots.len() {
                slots.truncate(target);
            } else {
                while slots.len() < target {
                    slots.push(BatchSlot::fresh());
                }
            }
        }
        self.reconcile();
        target
    }

    /// Replace a slot with a fresh idle one (new id, empty inputs),
    /// stopping its poller if one is running.
    pub fn reset_slot(&self, slot_id: &str) -> Result<()> {
        {
            let mut slots = self.lock_slots()?;
            let idx = slots
                .iter()
                .position(|s| s.id == slot_id)
                .ok_or_else(|| GenError::NotFound(format!("slot {}", slot_id)))?;
            slots[idx] = BatchSlot::fresh();
        }
        self.reconcile();
        Ok(())
    }

    /// Submit one slot's look.
    ///
    /// An empty prompt marks the slot failed with a local validation
    /// error and never contacts the service. A slot already generating
    /// is left alone. Anything else (including a slot with results, for
    /// an explicit regenerate) is submitted; on success the slot enters
    /// `generating` and the reconciler starts its poller.
    pub async fn submit_slot(&self, slot_id: &str) -> Result<()> {
        let request = {
            let mut slots = self.lock_slots()?;
            let slot = find_mut(&mut slots, slot_id)?;
            if slot.status == GenerationStatus::Generating {
                return Ok(());
            }
            if slot.prompt.trim().is_empty() {
                slot.status = GenerationStatus::Failed;
                slot.error = Some("a prompt is required before generating".into());
                slot.job_id = None;
                slot.result = None;
                return Err(GenError::Validation("slot prompt is required".into()));
            }
            slot.status = GenerationStatus::Generating;
            slot.job_id = None;
            slot.attempts = 0;
            slot.result = None;
            slot.error = None;
            self.request_for(slot)
        };

        let submitted = self.api.submit(&request).await;

        let result = {
            let mut slots = self.lock_slots()?;
            match slots.iter_mut().find(|s| s.id == slot_id) {
                // The slot was reset or resized away while the
                // submission was in flight; its job is not observable
                // from here anymore.
                None => {
                    if let Ok(job_id) = &submitted {
                        eprintln!(
                            "[lookgen] discarding job {} for removed slot {}",
                            job_id, slot_id
                        );
                    }
                    return Ok(());
                }
                Some(slot) => {
                    if slot.status != GenerationStatus::Generating || slot.job_id.is_some() {
                        if let Ok(job_id) = &submitted {
                            eprintln!(
                                "[lookgen] discarding job {} for reset slot {}",
                                job_id, slot_id
                            );
                        }
                        return Ok(());
                    }
                    match submitted {
                        Ok(job_id) => {
                            slot.job_id = Some(job_id);
                            Ok(())
                        }
                        Err(e) => {
                            slot.status = GenerationStatus::Failed;
                            slot.error = Some(e.to_string());
                            Err(e)
                        }
                    }
                }
            }
        };

        self.reconcile();
        result
    }

    /// Submit every eligible slot once: non-empty prompt and not already
    /// generating or holding results. Re-invoking is safe; slots picked
    /// up by an earlier pass are skipped. Returns how many slots were
    /// submitted; per-slot errors land on the slots themselves.
    pub async fn submit_all(&self) -> usize {
        let candidates: Vec<String> = self
            .slots
            .lock()
            .map(|slots| {
                slots
                    .iter()
                    .filter(|s| s.status.can_submit() && !s.prompt.trim().is_empty())
                    .map(|s| s.id.clone())
                    .collect()
            })
            .unwrap_or_default();

        let mut submitted = 0;
        for slot_id in candidates {
            if self.submit_slot(&slot_id).await.is_ok() {
                submitted += 1;
            }
        }
        submitted
    }

    /// Align running pollers with slot state: a slot owns a poller
    /// exactly when it is `generating` with a job handle.
    pub fn reconcile(&self) {
        let desired: HashMap<String, String> = self
            .slots
            .lock()
            .map(|slots| {
                slots
                    .iter()
                    .filter(|s| s.status == GenerationStatus::Generating)
                    .filter_map(|s| s.job_id.clone().map(|job_id| (s.id.clone(), job_id)))
                    .collect()
            })
            .unwrap_or_default();

        let mut pollers = match self.pollers.lock() {
            Ok(p) => p,
            Err(_) => return,
        };

        pollers.retain(|slot_id, handle| match desired.get(slot_id) {
            Some(job_id) if job_id == handle.job_id() && !handle.is_finished() => true,
            _ => {
                handle.stop();
                false
            }
        });

        for (slot_id, job_id) in desired {
            if pollers.contains_key(&slot_id) {
                continue;
            }
            let handle = self.spawn_slot_poller(slot_id.clone(), job_id);
            pollers.insert(slot_id, handle);
        }
    }

    /// Toggle the like on a slot's result, optimistically.
    ///
    /// The flag and counter flip immediately; the service call follows.
    /// On failure both are reverted and the error returned. Returns
    /// `Ok(None)` when a like call for the same asset is already in
    /// flight (the toggle is suppressed, not queued).
    pub async fn toggle_like(&self, slot_id: &str) -> Result<Option<bool>> {
        let (asset_id, pre) = {
            let slots = self.lock_slots()?;
            let slot = slots
                .iter()
                .find(|s| s.id == slot_id)
                .ok_or_else(|| GenError::NotFound(format!("slot {}", slot_id)))?;
            let asset = slot
                .result
                .as_ref()
                .ok_or_else(|| GenError::Validation("slot has no result to like".into()))?;
            (asset.id.clone(), LikeState::of(asset))
        };

        if !self.likes.try_begin(&asset_id) {
            return Ok(None);
        }

        let desired = pre.toggled();
        if !self.apply_like(slot_id, &asset_id, desired) {
            // The result disappeared between snapshot and apply.
            self.likes.finish(&asset_id);
            return Ok(None);
        }

        match self.api.set_like(&asset_id, desired.liked).await {
            Ok(()) => {
                self.likes.finish(&asset_id);
                Ok(Some(desired.liked))
            }
            Err(e) => {
                self.apply_like(slot_id, &asset_id, pre);
                self.likes.finish(&asset_id);
                Err(e)
            }
        }
    }

    /// Write a like snapshot onto the slot's result if it still holds
    /// the same asset. Returns whether anything was written.
    fn apply_like(&self, slot_id: &str, asset_id: &str, state: LikeState) -> bool {
        let mut slots = match self.slots.lock() {
            Ok(s) => s,
            Err(_) => return false,
        };
        if let Some(slot) = slots.iter_mut().find(|s| s.id == slot_id) {
            if let Some(asset) = slot.result.as_mut() {
                if asset.id == asset_id {
                    state.apply_to(asset);
                    return true;
                }
            }
        }
        false
    }

    /// The request submitted for a slot: the shared base with the slot's
    /// prompt, and the slot's pose when one is chosen.
    fn request_for(&self, slot: &BatchSlot) -> GenerationRequest {
        let mut request = self.base.clone();
        request.prompt = slot.prompt.clone();
        if slot.pose_id.is_some() {
            request.pose_id = slot.pose_id.clone();
        }
        request
    }

    fn spawn_slot_poller(&self, slot_id: String, job_id: String) -> PollerHandle {
        let poller = JobPoller::new(
            self.api.clone(),
            self.resolver.clone(),
            self.config.poll.clone(),
        );

        let slots = Arc::clone(&self.slots);
        let attempt_slot = slot_id.clone();
        let attempt_job = job_id.clone();
        let on_attempt = move |attempt: u32| {
            let mut slots = match slots.lock() {
                Ok(s) => s,
                Err(_) => return,
            };
            if let Some(slot) = slots.iter_mut().find(|s| s.id == attempt_slot) {
                if slot.status == GenerationStatus::Generating
                    && slot.job_id.as_deref() == Some(attempt_job.as_str())
                {
                    slot.attempts = attempt;
                }
            }
        };

        let slots = Arc::clone(&self.slots);
        let settle_job = job_id.clone();
        let on_settled = move |outcome: GenerationOutcome| {
            apply_outcome(&slots, &slot_id, &settle_job, outcome);
        };

        poller.spawn(job_id, on_attempt, on_settled)
    }
}

fn find_mut<'a>(slots: &'a mut Vec<BatchSlot>, slot_id: &str) -> Result<&'a mut BatchSlot> {
    slots
        .iter_mut()
        .find(|s| s.id == slot_id)
        .ok_or_else(|| GenError::NotFound(format!("slot {}", slot_id)))
}

/// Apply a settled outcome to its slot. Stale pollers (slot reset,
/// resized away, or resubmitted under a new job) find the guard failing
/// and mutate nothing.
fn apply_outcome(
    slots: &Mutex<Vec<BatchSlot>>,
    slot_id: &str,
    job_id: &str,
    outcome: GenerationOutcome,
) {
    let mut slots = match slots.lock() {
        Ok(s) => s,
        Err(_) => return,
    };
    let slot = match slots.iter_mut().find(|s| s.id == slot_id) {
        Some(s) => s,
        None => return,
    };
    if slot.status != GenerationStatus::Generating || slot.job_id.as_deref() != Some(job_id) {
        return;
    }
    if outcome.resolves_job() {
        slot.job_id = None;
    }
    let (status, result, error) = outcome.into_parts();
    slot.status = status;
    slot.result = result;
    slot.error = error;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as GenResult;
    use crate::types::{JobPoll, ResolvedAsset};

    struct NullApi;

    impl GenerationApi for NullApi {
        async fn submit(&self, _request: &GenerationRequest) -> GenResult<String> {
            Ok("J1".into())
        }

        async fn poll(&self, _job_id: &str) -> GenResult<JobPoll> {
            Ok(JobPoll::processing())
        }

        async fn fetch_asset(&self, asset_id: &str) -> GenResult<ResolvedAsset> {
            Err(GenError::NotFound(format!("asset {}", asset_id)))
        }

        async fn set_like(&self, _asset_id: &str, _liked: bool) -> GenResult<()> {
            Ok(())
        }
    }

    fn coordinator() -> BatchCoordinator<NullApi> {
        BatchCoordinator::new(
            Arc::new(NullApi),
            GenerationRequest::new("ws-1", "").with_pose("pose-default"),
            BatchConfig::default(),
        )
    }

    #[test]
    fn test_new_starts_at_minimum_size() {
        let batch = coordinator();
        assert_eq!(batch.slot_count(), 2);
        assert!(batch
            .slots()
            .iter()
            .all(|s| s.status == GenerationStatus::Idle));
    }

    #[test]
    fn test_resize_clamps() {
        let batch = coordinator();
        assert_eq!(batch.resize(99), 5);
        assert_eq!(batch.slot_count(), 5);
        assert_eq!(batch.resize(0), 2);
        assert_eq!(batch.slot_count(), 2);
    }

    #[test]
    fn test_set_prompt_unknown_slot() {
        let batch = coordinator();
        assert!(matches!(
            batch.set_prompt("nope", "red jacket"),
            Err(GenError::NotFound(_))
        ));
    }

    #[test]
    fn test_request_for_overrides_prompt_and_pose() {
        let batch = coordinator();
        let mut slot = BatchSlot::fresh();
        slot.prompt = "blue dress".into();

        // No slot pose: the base pose stands.
        let request = batch.request_for(&slot);
        assert_eq!(request.prompt, "blue dress");
        assert_eq!(request.pose_id.as_deref(), Some("pose-default"));
        assert_eq!(request.workspace_id, "ws-1");

        slot.pose_id = Some("pose-seated".into());
        let request = batch.request_for(&slot);
        assert_eq!(request.pose_id.as_deref(), Some("pose-seated"));
    }

    #[test]
    fn test_reset_slot_issues_fresh_identity() {
        let batch = coordinator();
        let old = batch.slots()[0].clone();
        batch.set_prompt(&old.id, "red jacket").unwrap();
        batch.reset_slot(&old.id).unwrap();

        let fresh = batch.slots()[0].clone();
        assert_ne!(fresh.id, old.id);
        assert!(fresh.prompt.is_empty());
        assert_eq!(batch.slot_count(), 2);
    }
}
