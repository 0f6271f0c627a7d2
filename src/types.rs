use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GenError, Result};

/// Output quality tier requested from the generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Draft,
    Standard,
    High,
}

/// Immutable input bundle for one generation submission.
///
/// Constructed once per submission and never mutated afterward. The
/// serialized form is the `POST /generate` request body.
///
/// # Example
/// ```
/// use lookgen::{GenerationRequest, Quality};
///
/// let request = GenerationRequest::new("ws-1", "red jacket on model M1")
///     .with_model("model-m1")
///     .with_pose("pose-standing")
///     .with_quality(Quality::High);
///
/// assert!(request.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Workspace the generated asset belongs to.
    pub workspace_id: String,
    /// Free-text prompt describing the look.
    pub prompt: String,
    /// Reference model to render the look on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// Reference garment worn on the upper body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_garment_id: Option<String>,
    /// Reference garment worn on the lower body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom_garment_id: Option<String>,
    /// Reference accessories.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessory_ids: Vec<String>,
    /// Reference pose.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose_id: Option<String>,
    /// Output size string, e.g. "1024x1536".
    pub size: String,
    /// Output quality tier.
    pub quality: Quality,
    /// Number of images requested per job.
    pub count: u32,
}

impl GenerationRequest {
    /// Create a request with a workspace and prompt. Uses sensible
    /// defaults for everything else (no references, 1024x1536, standard
    /// quality, one image).
    pub fn new(workspace_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            prompt: prompt.into(),
            model_id: None,
            top_garment_id: None,
            bottom_garment_id: None,
            accessory_ids: Vec::new(),
            pose_id: None,
            size: "1024x1536".to_string(),
            quality: Quality::Standard,
            count: 1,
        }
    }

    /// Set the reference model.
    pub fn with_model(mut self, id: impl Into<String>) -> Self {
        self.model_id = Some(id.into());
        self
    }

    /// Set the top garment reference.
    pub fn with_top_garment(mut self, id: impl Into<String>) -> Self {
        self.top_garment_id = Some(id.into());
        self
    }

    /// Set the bottom garment reference.
    pub fn with_bottom_garment(mut self, id: impl Into<String>) -> Self {
        self.bottom_garment_id = Some(id.into());
        self
    }

    /// Set the accessory references.
    pub fn with_accessories(mut self, ids: Vec<String>) -> Self {
        self.accessory_ids = ids;
        self
    }

    /// Set the pose reference.
    pub fn with_pose(mut self, id: impl Into<String>) -> Self {
        self.pose_id = Some(id.into());
        self
    }

    /// Set the output size string (e.g. "1024x1024").
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    /// Set the output quality tier.
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    /// Set the number of images requested per job.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Whether any reference input (model, garment, accessory, pose) is set.
    pub fn has_references(&self) -> bool {
        self.model_id.is_some()
            || self.top_garment_id.is_some()
            || self.bottom_garment_id.is_some()
            || !self.accessory_ids.is_empty()
            || self.pose_id.is_some()
    }

    /// Check the request shape before any network I/O.
    ///
    /// A workspace is always required. A request must carry either a
    /// non-empty prompt or at least one reference input.
    pub fn validate(&self) -> Result<()> {
        if self.workspace_id.trim().is_empty() {
            return Err(GenError::Validation("workspace id is required".into()));
        }
        if self.prompt.trim().is_empty() && !self.has_references() {
            return Err(GenError::Validation(
                "a prompt or at least one reference input is required".into(),
            ));
        }
        Ok(())
    }
}

/// Job status as reported by the generation service.
///
/// These values come exclusively from the service; the client never
/// invents them. Client-local states (`generating`, `timed_out_checking`)
/// live in [`GenerationStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether no further polling is useful for this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// `POST /generate` response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub job_id: String,
}

/// `GET /generate/{jobId}` response body — one status check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPoll {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobPoll {
    pub fn pending() -> Self {
        Self {
            status: JobStatus::Pending,
            asset_id: None,
            error: None,
        }
    }

    pub fn processing() -> Self {
        Self {
            status: JobStatus::Processing,
            asset_id: None,
            error: None,
        }
    }

    pub fn completed(asset_id: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Completed,
            asset_id: Some(asset_id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            asset_id: None,
            error: Some(error.into()),
        }
    }
}

/// The final generated artifact, fetched once a job completes.
///
/// Read-only after resolution except for the like fields, which change
/// through the optimistic toggle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAsset {
    pub id: String,
    pub image_urls: Vec<String>,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub like_count: u32,
}

/// Client-side lifecycle of one look (a slot or the single controller).
///
/// `Generating` is the only state that owns a live poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Idle,
    Generating,
    Results,
    Failed,
    TimedOutChecking,
}

impl Default for GenerationStatus {
    fn default() -> Self {
        GenerationStatus::Idle
    }
}

impl GenerationStatus {
    pub fn as_str(&self) -> &str {
        match self {
            GenerationStatus::Idle => "idle",
            GenerationStatus::Generating => "generating",
            GenerationStatus::Results => "results",
            GenerationStatus::Failed => "failed",
            GenerationStatus::TimedOutChecking => "timed_out_checking",
        }
    }

    /// Whether a batch-wide submission pass should pick this slot up.
    /// Slots already generating or holding results are skipped.
    pub fn can_submit(&self) -> bool {
        matches!(
            self,
            GenerationStatus::Idle | GenerationStatus::Failed | GenerationStatus::TimedOutChecking
        )
    }
}

/// One independently-tracked look within a batch.
///
/// The slot id is client-generated and stable across resizes; the job
/// handle is service-assigned and cleared once its outcome is resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSlot {
    pub id: String,
    pub prompt: String,
    pub pose_id: Option<String>,
    pub job_id: Option<String>,
    pub status: GenerationStatus,
    pub attempts: u32,
    pub result: Option<ResolvedAsset>,
    pub error: Option<String>,
}

impl BatchSlot {
    /// A new idle slot with a fresh client-generated id.
    pub fn fresh() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            prompt: String::new(),
            pose_id: None,
            job_id: None,
            status: GenerationStatus::Idle,
            attempts: 0,
            result: None,
            error: None,
        }
    }
}

/// How one job's polling loop settled.
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    /// The job completed and its asset was fetched.
    Completed { asset: ResolvedAsset },
    /// The service reported terminal failure with a message.
    Failed { error: String },
    /// The job completed but the asset fetch failed. The generation
    /// itself succeeded; only resolution is broken.
    ResolutionFailed { asset_id: String, error: String },
    /// The client stopped polling before observing a terminal status.
    /// The job may still finish on the service side.
    TimedOutChecking,
}

impl GenerationOutcome {
    /// The client status this outcome settles into.
    pub fn status(&self) -> GenerationStatus {
        match self {
            GenerationOutcome::Completed { .. } => GenerationStatus::Results,
            GenerationOutcome::Failed { .. } | GenerationOutcome::ResolutionFailed { .. } => {
                GenerationStatus::Failed
            }
            GenerationOutcome::TimedOutChecking => GenerationStatus::TimedOutChecking,
        }
    }

    /// Whether the job handle is spent. A timed-out job keeps its handle
    /// so the user can check on it later; resolved outcomes discard it.
    pub fn resolves_job(&self) -> bool {
        !matches!(self, GenerationOutcome::TimedOutChecking)
    }

    /// Split into the (status, result, error) triple applied to slot or
    /// controller state.
    pub fn into_parts(self) -> (GenerationStatus, Option<ResolvedAsset>, Option<String>) {
        match self {
            GenerationOutcome::Completed { asset } => {
                (GenerationStatus::Results, Some(asset), None)
            }
            GenerationOutcome::Failed { error } => (GenerationStatus::Failed, None, Some(error)),
            GenerationOutcome::ResolutionFailed { asset_id, error } => (
                GenerationStatus::Failed,
                None,
                Some(format!(
                    "generated asset {} could not be fetched: {}",
                    asset_id, error
                )),
            ),
            GenerationOutcome::TimedOutChecking => (GenerationStatus::TimedOutChecking, None, None),
        }
    }
}
