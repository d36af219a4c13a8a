//! Canonical subject names. Centralized so a coordinator's publish and a
//! worker's subscribe can never drift apart on string formatting.

use uuid::Uuid;

use snapforge_common::types::{EnvTag, Phase};

/// Queue group every Snapshot Coordinator dispatcher joins. Exactly one
/// dispatcher picks up a given refresh request, even if several are running
/// for availability.
pub const SNAPSHOT_COORDINATOR_GROUP: &str = "snapshot-coordinators";

/// Subject an API handler publishes a
/// [`RefreshRequest`](snapforge_common::types::RefreshRequest) to.
pub fn snapshot_refresh_request_subject(env: EnvTag) -> String {
    format!("snapshot.refresh.{env}")
}

/// Queue group every Bulk Op Coordinator dispatcher joins.
pub const BULK_OP_COORDINATOR_GROUP: &str = "bulkop-coordinators";

/// Subject an API handler publishes a
/// [`BulkOpRequest`](snapforge_common::types::BulkOpRequest) to.
pub fn bulk_op_request_subject(env: EnvTag) -> String {
    format!("bulkop.request.{env}")
}

/// Queue group every Phase Worker joins for a given phase. All replicas
/// subscribe under the same group so a job fans out to exactly one worker.
pub fn phase_worker_group(phase: Phase) -> String {
    format!("phase-workers.{phase}")
}

/// Subject a coordinator publishes a [`PhaseJob`](snapforge_common::types::PhaseJob) to.
pub fn phase_job_subject(phase: Phase) -> String {
    format!("snapshot.phase.{phase}.jobs")
}

/// Subject a Phase Worker publishes its
/// [`PhaseCompletion`](snapforge_common::types::PhaseCompletion) to, scoped
/// per refresh job so a coordinator only hears about its own job.
pub fn phase_completion_subject(refresh_job_id: Uuid) -> String {
    format!("snapshot.refresh.{refresh_job_id}.completions")
}

/// Fan-out subject the progress stream subscribes to for a refresh job.
pub fn refresh_progress_subject(refresh_job_id: Uuid) -> String {
    format!("snapshot.refresh.{refresh_job_id}.progress")
}

/// Queue group every Bulk Op Worker joins.
pub const BULK_OP_WORKER_GROUP: &str = "bulkop-workers";

/// Subject a bulk-op coordinator publishes
/// [`BulkOpBatch`](snapforge_common::types::BulkOpBatch) jobs to.
///
/// The wire grammar scopes this per job (`bulkop.batch.{jobId}`), but the
/// in-process bus has no wildcard subscription: a shared worker pool can't
/// join every per-job subject it hasn't seen yet. Workers instead all join
/// this one constant subject under [`BULK_OP_WORKER_GROUP`], and the job id
/// travels inside the [`BulkOpBatch`](snapforge_common::types::BulkOpBatch)
/// payload itself — a single-node simplification explicitly permitted by
/// the completion-aggregation invariant the bus must preserve.
pub const BULK_OP_BATCH_SUBJECT: &str = "bulkop.batches";

/// Broadcast subject workers listen on for a job cancellation.
pub fn bulk_op_cancel_subject(job_id: Uuid) -> String {
    format!("bulkop.{job_id}.cancel")
}

/// Subject a Bulk Op Worker publishes its
/// [`BulkOpBatchResult`](snapforge_common::types::BulkOpBatchResult) to.
pub fn bulk_op_result_subject(job_id: Uuid) -> String {
    format!("bulkop.{job_id}.results")
}

/// Fan-out subject the progress stream subscribes to for a bulk-op job.
pub fn bulk_op_progress_subject(job_id: Uuid) -> String {
    format!("bulkop.{job_id}.progress")
}
