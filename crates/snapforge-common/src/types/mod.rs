//! Domain and wire types shared by every crate in the workspace.
//!
//! These types mirror the entities of the Snapshot Refresh Engine: the
//! persisted job records (`RefreshJob`, `BulkOpJob`), the fan-out unit
//! (`PhaseJob`/`PhaseCompletion`), and the row shapes the Snapshot Service
//! loads (`SnapshotRow`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Deployment environment a job, subject, or snapshot table is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnvTag {
    /// Training environment.
    Trn,
    /// Production environment.
    Prd,
}

impl std::fmt::Display for EnvTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvTag::Trn => write!(f, "TRN"),
            EnvTag::Prd => write!(f, "PRD"),
        }
    }
}

impl std::str::FromStr for EnvTag {
    type Err = crate::error::SnapError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TRN" => Ok(EnvTag::Trn),
            "PRD" => Ok(EnvTag::Prd),
            other => Err(crate::error::SnapError::Config(format!(
                "invalid environment tag: {other}"
            ))),
        }
    }
}

/// One of the three data-load tracks of a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Planned manufacturing orders.
    Mops,
    /// Released manufacturing orders.
    Mos,
    /// Customer order lines.
    Cos,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Mops, Phase::Mos, Phase::Cos];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Mops => "mops",
            Phase::Mos => "mos",
            Phase::Cos => "cos",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = crate::error::SnapError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "mops" => Ok(Phase::Mops),
            "mos" => Ok(Phase::Mos),
            "cos" => Ok(Phase::Cos),
            other => Err(crate::error::SnapError::Protocol(format!(
                "unknown phase name: {other}"
            ))),
        }
    }
}

/// Status of a [`RefreshJob`]. Monotonic except via explicit retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStatus {
    Queued,
    Truncating,
    FanningOut,
    WaitingPhases,
    Finalizing,
    Detecting,
    Completed,
    Failed,
}

impl RefreshStatus {
    /// Terminal states are immutable once reached.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RefreshStatus::Completed | RefreshStatus::Failed)
    }

    fn as_str(&self) -> &'static str {
        match self {
            RefreshStatus::Queued => "queued",
            RefreshStatus::Truncating => "truncating",
            RefreshStatus::FanningOut => "fanning_out",
            RefreshStatus::WaitingPhases => "waiting_phases",
            RefreshStatus::Finalizing => "finalizing",
            RefreshStatus::Detecting => "detecting",
            RefreshStatus::Completed => "completed",
            RefreshStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RefreshStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RefreshStatus {
    type Err = crate::error::SnapError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "queued" => Ok(RefreshStatus::Queued),
            "truncating" => Ok(RefreshStatus::Truncating),
            "fanning_out" => Ok(RefreshStatus::FanningOut),
            "waiting_phases" => Ok(RefreshStatus::WaitingPhases),
            "finalizing" => Ok(RefreshStatus::Finalizing),
            "detecting" => Ok(RefreshStatus::Detecting),
            "completed" => Ok(RefreshStatus::Completed),
            "failed" => Ok(RefreshStatus::Failed),
            other => Err(crate::error::SnapError::Protocol(format!(
                "unknown refresh status: {other}"
            ))),
        }
    }
}

/// Tenant context a phase job carries: company and facility scope the
/// warehouse query and the tables a phase writes into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub company: String,
    pub facility: String,
}

/// Per-type record counts accumulated as phase completions arrive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCounts {
    pub cos: i64,
    pub mos: i64,
    pub mops: i64,
}

/// Persisted record for one snapshot refresh.
///
/// Invariants: `status` is monotonic except by explicit retry;
/// `retry_count <= max_retries`; terminal states are immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshJob {
    pub id: Uuid,
    pub env: EnvTag,
    pub status: RefreshStatus,
    pub current_step: String,
    pub completed_steps: u32,
    pub total_steps: u32,
    pub counts: RecordCounts,
    pub records_per_sec: f64,
    pub eta_seconds: Option<i64>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RefreshJob {
    /// Step 5 ("detecting") only ever reaches 90%; the remaining 10% is
    /// reserved for `complete_refresh_job` marking the job `Completed`, so a
    /// client watching the SSE stream sees …80→90→100 rather than jumping
    /// straight from 80 to 100 while detectors are still running.
    pub fn completion_percentage(&self) -> u32 {
        match self.status {
            RefreshStatus::Completed => return 100,
            RefreshStatus::Detecting => return 90,
            _ => {}
        }
        if self.total_steps == 0 {
            return 0;
        }
        ((self.completed_steps as f64 / self.total_steps as f64) * 100.0).round() as u32
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// Owned by a [`RefreshJob`]; created at fan-out, destroyed once its
/// [`PhaseCompletion`] is consumed. Carries the acquired access token so a
/// Phase Worker can build its own Remote Query Client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseJob {
    pub refresh_job_id: Uuid,
    pub phase: Phase,
    pub env: EnvTag,
    pub tenant: TenantContext,
    pub access_token: String,
}

/// Published by a Phase Worker exactly once per [`PhaseJob`]. Duplicates
/// must be idempotent with respect to coordinator bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseCompletion {
    pub refresh_job_id: Uuid,
    pub phase: Phase,
    pub success: bool,
    pub record_count: i64,
    pub error: Option<String>,
}

/// Which snapshot table a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotRowKind {
    PlannedOrder,
    ManufacturingOrder,
    CustomerOrderLine,
    PreAllocation,
}

/// One row loaded from the warehouse, after loose-typing normalisation.
///
/// `deleted` is normalised to a real `bool` at parse time even though the
/// wire value is always the literal string `"true"`/`"false"`; extension
/// columns that aren't part of the row's fixed identity are kept in
/// `extra` as a semi-structured JSON blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub kind: SnapshotRowKind,
    pub company: String,
    pub facility: String,
    /// Monotonic change timestamp, `YYYYMMDD` integer preserved as-is.
    pub change_ts: i64,
    pub deleted: bool,
    pub extra: serde_json::Value,
}

/// Operation a [`BulkOpJob`] performs against the resolved production
/// orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOperationType {
    Delete,
    Close,
    Reschedule,
}

impl BulkOperationType {
    fn as_str(&self) -> &'static str {
        match self {
            BulkOperationType::Delete => "delete",
            BulkOperationType::Close => "close",
            BulkOperationType::Reschedule => "reschedule",
        }
    }
}

impl std::fmt::Display for BulkOperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BulkOperationType {
    type Err = crate::error::SnapError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "delete" => Ok(BulkOperationType::Delete),
            "close" => Ok(BulkOperationType::Close),
            "reschedule" => Ok(BulkOperationType::Reschedule),
            other => Err(crate::error::SnapError::Protocol(format!(
                "unknown bulk operation type: {other}"
            ))),
        }
    }
}

/// Status of a [`BulkOpJob`], mirroring [`RefreshStatus`] at finer
/// granularity for batch fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOpStatus {
    Queued,
    Resolving,
    Batching,
    Running,
    Expanding,
    Completed,
    Failed,
}

impl BulkOpStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BulkOpStatus::Completed | BulkOpStatus::Failed)
    }

    fn as_str(&self) -> &'static str {
        match self {
            BulkOpStatus::Queued => "queued",
            BulkOpStatus::Resolving => "resolving",
            BulkOpStatus::Batching => "batching",
            BulkOpStatus::Running => "running",
            BulkOpStatus::Expanding => "expanding",
            BulkOpStatus::Completed => "completed",
            BulkOpStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for BulkOpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BulkOpStatus {
    type Err = crate::error::SnapError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "queued" => Ok(BulkOpStatus::Queued),
            "resolving" => Ok(BulkOpStatus::Resolving),
            "batching" => Ok(BulkOpStatus::Batching),
            "running" => Ok(BulkOpStatus::Running),
            "expanding" => Ok(BulkOpStatus::Expanding),
            "completed" => Ok(BulkOpStatus::Completed),
            "failed" => Ok(BulkOpStatus::Failed),
            other => Err(crate::error::SnapError::Protocol(format!(
                "unknown bulk op status: {other}"
            ))),
        }
    }
}

/// Persisted record for one bulk operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkOpJob {
    pub id: Uuid,
    pub env: EnvTag,
    pub operation: BulkOperationType,
    pub issue_ids: Vec<i64>,
    pub status: BulkOpStatus,
    pub batch_size: u32,
    pub total_batches: u32,
    pub completed_batches: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BulkOpJob {
    /// Progress percentage per the coordinator algorithm: `20 + 70*done/total`.
    pub fn progress_percentage(&self) -> u32 {
        if self.total_batches == 0 {
            return 20;
        }
        let frac = self.completed_batches as f64 / self.total_batches as f64;
        (20.0 + 70.0 * frac).round() as u32
    }
}

/// One chunk of the execution set (unique production orders), sized by
/// the job's configured batch size (default 50).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkOpBatch {
    pub job_id: Uuid,
    pub batch_index: u32,
    pub production_orders: Vec<String>,
}

/// Outcome of executing one [`BulkOpBatch`] against the external API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkOpBatchResult {
    pub job_id: Uuid,
    pub batch_index: u32,
    /// production order -> whether the operation succeeded, with an
    /// optional error message on failure.
    pub order_outcomes: Vec<(String, bool, Option<String>)>,
}

/// Per-issue outcome, expanded from an order-level result. Non-primary
/// issues referencing the same order are tagged `duplicate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkOpIssueResult {
    pub job_id: Uuid,
    pub issue_id: i64,
    pub production_order: String,
    pub success: bool,
    pub error: Option<String>,
    pub is_primary: bool,
    pub primary_issue_id: Option<i64>,
}

/// Common result type for database operations, wrapping results with a
/// boxed dynamic error.
pub type DbResult<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Published to `snapshot.refresh.{ENV}` to ask a coordinator to start a
/// refresh. The access token travels with the request since the coordinator
/// has no independent way to acquire one (§1 non-goal: auth/token exchange).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub env: EnvTag,
    pub tenant: TenantContext,
    pub access_token: String,
}

/// Published to `bulkop.request.{ENV}` to ask a coordinator to start a bulk
/// operation against a set of already-detected issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkOpRequest {
    pub env: EnvTag,
    pub operation: BulkOperationType,
    pub issue_ids: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_tag_roundtrip() {
        assert_eq!("TRN".parse::<EnvTag>().unwrap(), EnvTag::Trn);
        assert_eq!("prd".parse::<EnvTag>().unwrap(), EnvTag::Prd);
        assert!("dev".parse::<EnvTag>().is_err());
        assert_eq!(EnvTag::Prd.to_string(), "PRD");
    }

    #[test]
    fn phase_roundtrip() {
        for phase in Phase::ALL {
            assert_eq!(phase.as_str().parse::<Phase>().unwrap(), phase);
        }
        assert!("bogus".parse::<Phase>().is_err());
    }

    #[test]
    fn refresh_job_completion_percentage() {
        let job = RefreshJob {
            id: Uuid::new_v4(),
            env: EnvTag::Trn,
            status: RefreshStatus::WaitingPhases,
            current_step: "waiting_phases".into(),
            completed_steps: 2,
            total_steps: 5,
            counts: RecordCounts::default(),
            records_per_sec: 0.0,
            eta_seconds: None,
            retry_count: 0,
            max_retries: 3,
            last_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(job.completion_percentage(), 40);
        assert!(job.can_retry());
    }

    #[test]
    fn refresh_job_detecting_caps_at_ninety() {
        let mut job = RefreshJob {
            id: Uuid::new_v4(),
            env: EnvTag::Trn,
            status: RefreshStatus::Detecting,
            current_step: "detecting".into(),
            completed_steps: 5,
            total_steps: 5,
            counts: RecordCounts::default(),
            records_per_sec: 0.0,
            eta_seconds: None,
            retry_count: 0,
            max_retries: 3,
            last_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(job.completion_percentage(), 90);
        job.status = RefreshStatus::Completed;
        assert_eq!(job.completion_percentage(), 100);
    }

    #[test]
    fn bulk_op_progress_percentage() {
        let mut job = BulkOpJob {
            id: Uuid::new_v4(),
            env: EnvTag::Prd,
            operation: BulkOperationType::Delete,
            issue_ids: vec![7, 8, 9],
            status: BulkOpStatus::Running,
            batch_size: 50,
            total_batches: 4,
            completed_batches: 0,
            last_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(job.progress_percentage(), 20);
        job.completed_batches = 4;
        assert_eq!(job.progress_percentage(), 90);
    }
}
