use futures::stream::StreamExt;
use governor::{Quota, RateLimiter};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use std::{num::NonZeroU32, path::PathBuf, sync::Arc};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use super::monitoring::{failed_outcome, outcome_from_payload};
use crate::db::{Db, ParseStatus};
use crate::error::CimsError;
use crate::llm::{LlmBackend, SharedLlm};
use crate::utils::logging::with_pretty_json_debug;

const JOB_QUEUE_CAPACITY: usize = 1000;

/// One stored screenshot waiting for metric extraction.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub upload_id: i64,
    pub file_path: PathBuf,
    pub mime_type: String,
}

#[derive(Debug)]
enum ExtractorMessage {
    Parse(ExtractionJob),
}

/// Handle for queueing screenshot parses on the extractor actor.
#[derive(Clone)]
pub struct ExtractorHandle {
    actor: ActorRef<ExtractorMessage>,
}

impl ExtractorHandle {
    pub async fn spawn(db: Db, llm: SharedLlm, extract_tps: usize) -> Result<Self, CimsError> {
        let (actor, _jh) = Actor::spawn(None, ExtractorActor, (db, llm, extract_tps))
            .await
            .map_err(|e| CimsError::RactorError(format!("ExtractorActor spawn failed: {e}")))?;
        Ok(Self { actor })
    }

    pub fn submit(&self, job: ExtractionJob) -> Result<(), CimsError> {
        ractor::cast!(self.actor, ExtractorMessage::Parse(job))
            .map_err(|e| CimsError::RactorError(format!("ExtractorActor cast failed: {e}")))
    }
}

struct ExtractorState {
    job_tx: mpsc::Sender<ExtractionJob>,
    db: Db,
}

struct ExtractorActor;

#[ractor::async_trait]
impl Actor for ExtractorActor {
    type Msg = ExtractorMessage;
    type State = ExtractorState;
    type Arguments = (Db, SharedLlm, usize);

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        (db, llm, extract_tps): Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let tps = u32::try_from(extract_tps.max(1)).unwrap_or(u32::MAX);
        let burst = tps.saturating_mul(2);
        let quota = match (NonZeroU32::new(tps), NonZeroU32::new(burst)) {
            (Some(rate), Some(burst)) => Quota::per_second(rate).allow_burst(burst),
            _ => return Err(ActorProcessingErr::from("extract_tps must be positive")),
        };
        let limiter = Arc::new(RateLimiter::direct(quota));

        let (job_tx, job_rx) = mpsc::channel::<ExtractionJob>(JOB_QUEUE_CAPACITY);
        let pipeline_db = db.clone();
        let concurrency = usize::try_from(burst).unwrap_or(1).max(1);

        tokio::spawn(async move {
            info!(
                "Extraction Pipeline Started: BufferUnordered={}, RateLimit={}/s, Burst={}",
                concurrency, tps, burst
            );

            let mut pipeline = ReceiverStream::new(job_rx)
                .map(|job| {
                    let lim = limiter.clone();
                    let db = pipeline_db.clone();
                    let llm = llm.clone();
                    async move {
                        lim.until_ready().await;
                        run_job(&db, llm.as_ref(), job).await
                    }
                })
                .buffer_unordered(concurrency);

            while pipeline.next().await.is_some() {}

            info!("Extraction Pipeline Stopped");
        });

        Ok(ExtractorState { job_tx, db })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ExtractorMessage::Parse(job) => {
                let tx = state.job_tx.clone();
                let db = state.db.clone();
                tokio::spawn(async move {
                    if let Err(e) = tx.send(job).await {
                        warn!("Failed to queue extraction job (channel closed): {}", e);
                        let upload_id = e.0.upload_id;
                        if let Err(e) = db.set_parse_status(upload_id, ParseStatus::Error).await {
                            error!(upload_id, error = %e, "Failed to mark upload as errored");
                        }
                    }
                });
            }
        }
        Ok(())
    }
}

/// Parse one upload and store the result. Every failure path leaves the upload in `error`.
async fn run_job(db: &Db, llm: &dyn LlmBackend, job: ExtractionJob) {
    let upload_id = job.upload_id;

    let outcome = match tokio::fs::read(&job.file_path).await {
        Err(e) => {
            warn!(upload_id, path = %job.file_path.display(), error = %e, "Upload file unreadable");
            failed_outcome(&format!("Failed to read upload: {e}"))
        }
        Ok(bytes) => match llm.extract_metrics(&bytes, &job.mime_type).await {
            Ok(payload) => {
                with_pretty_json_debug(&payload, |json| {
                    debug!(upload_id, "Extraction payload:\n{json}");
                });
                outcome_from_payload(payload)
            }
            Err(e) => {
                warn!(upload_id, error = %e.public_message(), "Metric extraction failed");
                failed_outcome(&e.to_string())
            }
        },
    };

    let status = outcome.status;
    match db.record_parse_outcome(upload_id, outcome).await {
        Ok(()) => info!(upload_id, status = ?status, "Upload parsed"),
        Err(e) => {
            error!(upload_id, error = %e, "Failed to store parse outcome");
            if let Err(e) = db.set_parse_status(upload_id, ParseStatus::Error).await {
                error!(upload_id, error = %e, "Failed to mark upload as errored");
            }
        }
    }
}
