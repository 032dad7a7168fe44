//! Starts media jobs and records their results in the store.
//!
//! Starting a job checks and claims the slot under the store lock, so at
//! most one job per kind is ever in flight. The job itself runs on a
//! spawned task without holding the lock.

use std::sync::Arc;

use postcraft_core::error::StoreError;
use postcraft_core::store::{lock_store, SharedStore};
use postcraft_core::types::{MediaKind, MediaStatus};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::GenerationError;
use crate::generator::MediaGenerator;

/// Result of asking for a new job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    /// A job of this kind is already running; nothing was submitted.
    AlreadyPending,
}

/// How a finished job ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed,
    /// The post changed while the job ran; the result was dropped.
    Discarded,
}

/// A claimed job, ready to run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaJob {
    pub kind: MediaKind,
    pub prompt: String,
    /// Post epoch the job was started for.
    pub epoch: u64,
}

/// Owns one generator per media kind.
#[derive(Clone)]
pub struct MediaController {
    store: SharedStore,
    image: Arc<dyn MediaGenerator>,
    video: Arc<dyn MediaGenerator>,
}

impl MediaController {
    /// Each generator must produce the kind of its slot.
    pub fn new(
        store: SharedStore,
        image: Arc<dyn MediaGenerator>,
        video: Arc<dyn MediaGenerator>,
    ) -> Result<Self, GenerationError> {
        for (slot, generator) in [(MediaKind::Image, &image), (MediaKind::Video, &video)] {
            let produces = generator.kind();
            if produces != slot {
                return Err(GenerationError::WrongKind { slot, produces });
            }
        }
        Ok(Self {
            store,
            image,
            video,
        })
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Claim the slot for `kind` and capture the prompt.
    ///
    /// Returns `Ok(None)` when a job of that kind is already pending.
    pub fn begin(&self, kind: MediaKind) -> Result<Option<MediaJob>, StoreError> {
        let mut store = lock_store(&self.store)?;
        let prompt = store
            .finalized_post()
            .ok_or(StoreError::NoFinalizedPost)?
            .prompt_for(kind)
            .to_string();
        if store.media(kind).is_pending() {
            debug!(%kind, "Job already pending");
            return Ok(None);
        }
        store.set_media_status(kind, MediaStatus::Pending)?;
        Ok(Some(MediaJob {
            kind,
            prompt,
            epoch: store.post_epoch(),
        }))
    }

    /// Run a claimed job to completion and record the result.
    pub async fn run(&self, job: MediaJob) -> Result<JobOutcome, StoreError> {
        info!(kind = %job.kind, epoch = job.epoch, "Media job started");
        let result = self.generator(job.kind).generate(&job.prompt).await;

        let mut store = lock_store(&self.store)?;
        if store.post_epoch() != job.epoch {
            info!(
                kind = %job.kind,
                started_for = job.epoch,
                current = store.post_epoch(),
                "Discarding result for a replaced post"
            );
            return Ok(JobOutcome::Discarded);
        }

        match result {
            Ok(artifact) => {
                store.set_media_artifact(job.kind, artifact)?;
                info!(kind = %job.kind, "Media job succeeded");
                Ok(JobOutcome::Succeeded)
            }
            Err(e) => {
                warn!(kind = %job.kind, error = %e, "Media job failed");
                store.set_media_status(job.kind, MediaStatus::Failed)?;
                Ok(JobOutcome::Failed)
            }
        }
    }

    /// Claim the slot and run the job in the background.
    pub fn start(&self, kind: MediaKind) -> Result<StartOutcome, StoreError> {
        let Some(job) = self.begin(kind)? else {
            return Ok(StartOutcome::AlreadyPending);
        };
        let controller = self.clone();
        tokio::spawn(async move {
            if let Err(e) = controller.run(job).await {
                error!(%kind, error = %e, "Could not record media job result");
            }
        });
        Ok(StartOutcome::Started)
    }

    fn generator(&self, kind: MediaKind) -> &Arc<dyn MediaGenerator> {
        match kind {
            MediaKind::Image => &self.image,
            MediaKind::Video => &self.video,
        }
    }
}
