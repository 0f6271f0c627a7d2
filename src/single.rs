use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::client::GenerationApi;
use crate::config::PollConfig;
use crate::error::{GenError, Result};
use crate::likes::{LikeGate, LikeState};
use crate::poller::{JobPoller, PollerHandle};
use crate::resolver::ResultResolver;
use crate::types::{GenerationOutcome, GenerationRequest, GenerationStatus, ResolvedAsset};

/// Snapshot of the single-look controller's state.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationState {
    pub status: GenerationStatus,
    pub job_id: Option<String>,
    pub attempts: u32,
    pub result: Option<ResolvedAsset>,
    pub error: Option<String>,
}

/// The non-batch path: one request, one poller, one terminal outcome.
///
/// Shares the [`JobPoller`] with the batch coordinator; the two call
/// sites differ only in configuration. [`reset`](Self::reset), like
/// dropping the controller, stops the poller on every exit path, so a
/// live timer can never outlast the state it feeds.
pub struct SingleGenerationController<A> {
    api: Arc<A>,
    resolver: Arc<ResultResolver<A>>,
    config: PollConfig,
    state: Arc<Mutex<GenerationState>>,
    poller: Mutex<Option<PollerHandle>>,
    likes: LikeGate,
}

impl<A: GenerationApi + 'static> SingleGenerationController<A> {
    pub fn new(api: Arc<A>, config: PollConfig) -> Self {
        Self {
            resolver: Arc::new(ResultResolver::new(api.clone())),
            api,
            config,
            state: Arc::new(Mutex::new(GenerationState::default())),
            poller: Mutex::new(None),
            likes: LikeGate::new(),
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, GenerationState>> {
        self.state.lock().map_err(|e| GenError::Other(e.to_string()))
    }

    /// Cloned snapshot of the current state.
    pub fn state(&self) -> GenerationState {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn is_generating(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.status == GenerationStatus::Generating)
            .unwrap_or(false)
    }

    /// Submit the request and start polling. Returns the job id.
    ///
    /// Rejected while a generation is already in flight; call
    /// [`reset`](Self::reset) first to abandon the running one.
    pub async fn generate(&self, request: GenerationRequest) -> Result<String> {
        {
            let mut state = self.lock_state()?;
            if state.status == GenerationStatus::Generating {
                return Err(GenError::Validation(
                    "a generation is already in flight".into(),
                ));
            }
            *state = GenerationState {
                status: GenerationStatus::Generating,
                ..Default::default()
            };
        }

        let job_id = match self.api.submit(&request).await {
            Ok(id) => id,
            Err(e) => {
                if let Ok(mut state) = self.state.lock() {
                    if state.status == GenerationStatus::Generating && state.job_id.is_none() {
                        state.status = GenerationStatus::Failed;
                        state.error = Some(e.to_string());
                    }
                }
                return Err(e);
            }
        };

        let installed = {
            let mut state = self.lock_state()?;
            if state.status == GenerationStatus::Generating && state.job_id.is_none() {
                state.job_id = Some(job_id.clone());
                true
            } else {
                false
            }
        };

        if !installed {
            // A reset landed while the submission was in flight; the
            // job runs on the service unobserved.
            eprintln!("[lookgen] discarding job {} submitted before a reset", job_id);
            return Ok(job_id);
        }

        let poller = JobPoller::new(self.api.clone(), self.resolver.clone(), self.config.clone());

        let state = Arc::clone(&self.state);
        let attempt_job = job_id.clone();
        let on_attempt = move |attempt: u32| {
            let mut state = match state.lock() {
                Ok(s) => s,
                Err(_) => return,
            };
            if state.status == GenerationStatus::Generating
                && state.job_id.as_deref() == Some(attempt_job.as_str())
            {
                state.attempts = attempt;
            }
        };

        let state = Arc::clone(&self.state);
        let settle_job = job_id.clone();
        let on_settled = move |outcome: GenerationOutcome| {
            let mut state = match state.lock() {
                Ok(s) => s,
                Err(_) => return,
            };
            if state.status != GenerationStatus::Generating
                || state.job_id.as_deref() != Some(settle_job.as_str())
            {
                return;
            }
            if outcome.resolves_job() {
                state.job_id = None;
            }
            let (status, result, error) = outcome.into_parts();
            state.status = status;
            state.result = result;
            state.error = error;
        };

        let handle = poller.spawn(job_id.clone(), on_attempt, on_settled);
        if let Ok(mut slot) = self.poller.lock() {
            // Dropping any previous handle stops its task.
            *slot = Some(handle);
        }
        Ok(job_id)
    }

    /// Abandon the current generation and return to idle.
    ///
    /// Stops the poller; a response already on the wire is discarded
    /// rather than applied.
    pub fn reset(&self) {
        if let Ok(mut poller) = self.poller.lock() {
            poller.take();
        }
        if let Ok(mut state) = self.state.lock() {
            *state = GenerationState::default();
        }
    }

    /// Toggle the like on the resolved result, optimistically. Returns
    /// `Ok(None)` when a like call for the asset is already in flight.
    pub async fn toggle_like(&self) -> Result<Option<bool>> {
        let (asset_id, pre) = {
            let state = self.lock_state()?;
            let asset = state
                .result
                .as_ref()
                .ok_or_else(|| GenError::Validation("no result to like".into()))?;
            (asset.id.clone(), LikeState::of(asset))
        };

        if !self.likes.try_begin(&asset_id) {
            return Ok(None);
        }

        let desired = pre.toggled();
        if !self.apply_like(&asset_id, desired) {
            self.likes.finish(&asset_id);
            return Ok(None);
        }

        match self.api.set_like(&asset_id, desired.liked).await {
            Ok(()) => {
                self.likes.finish(&asset_id);
                Ok(Some(desired.liked))
            }
            Err(e) => {
                self.apply_like(&asset_id, pre);
                self.likes.finish(&asset_id);
                Err(e)
            }
        }
    }

    fn apply_like(&self, asset_id: &str, like: LikeState) -> bool {
        let mut state = match self.state.lock() {
            Ok(s) => s,
            Err(_) => return false,
        };
        if let Some(asset) = state.result.as_mut() {
            if asset.id == asset_id {
                like.apply_to(asset);
                return true;
            }
        }
        false
    }
}
