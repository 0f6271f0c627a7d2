//! # lookgen
//!
//! Async orchestration client for an AI look-generation service:
//! submit generation jobs, poll each one on its own schedule, and
//! resolve completed jobs into displayable assets — for a single look
//! or a batch of 2–5 independent ones.
//!
//! ## What it handles
//!
//! - **Per-job polling state machine** — fixed-interval checks with an
//!   attempt ceiling; giving up is reported as `timed_out_checking`,
//!   never as a failure (the job may still finish on the service)
//! - **Batch coordination** — one poller per slot, reconciled against
//!   slot state after every mutation; resizes preserve surviving slots
//! - **Result resolution** — completed jobs fetch their asset exactly
//!   once; a failed fetch is distinct from a failed generation
//! - **Optimistic like toggles** — immediate flip with revert on
//!   failure, one in-flight call per asset
//! - **Safe teardown** — stopping a poller guarantees no further state
//!   mutation, even from a response already on the wire
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use lookgen::{
//!     BatchConfig, BatchCoordinator, GenerationClient, GenerationRequest, PollConfig, Quality,
//!     SingleGenerationController,
//! };
//!
//! # async fn example() -> lookgen::Result<()> {
//! let client = Arc::new(
//!     GenerationClient::new("https://api.example.com").with_bearer("token-123"),
//! );
//!
//! // One look
//! let request = GenerationRequest::new("ws-1", "red jacket on model M1")
//!     .with_model("model-m1")
//!     .with_quality(Quality::High);
//! let single = SingleGenerationController::new(client.clone(), PollConfig::default());
//! single.generate(request.clone()).await?;
//!
//! // A batch of looks sharing the same inputs, varied by prompt
//! let batch = BatchCoordinator::new(client, request, BatchConfig::default());
//! batch.resize(3);
//! let slots = batch.slots();
//! batch.set_prompt(&slots[0].id, "red jacket, studio lighting")?;
//! batch.set_prompt(&slots[1].id, "red jacket, golden hour")?;
//! batch.submit_all().await;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod likes;
pub mod poller;
pub mod resolver;
pub mod single;
pub mod types;

pub use batch::BatchCoordinator;
pub use client::{GenerationApi, GenerationClient};
pub use config::{BatchConfig, PollConfig};
pub use error::{GenError, Result};
pub use likes::{LikeGate, LikeState};
pub use poller::{JobPoller, PollerHandle};
pub use resolver::ResultResolver;
pub use single::{GenerationState, SingleGenerationController};
pub use types::{
    BatchSlot, GenerationOutcome, GenerationRequest, GenerationStatus, JobPoll, JobStatus,
    Quality, ResolvedAsset,
};
