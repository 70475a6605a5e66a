use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::JobservitorError;

/// Wildcard value for `dc`/`region` affinity fields.
pub const WILDCARD: &str = "Any";

fn default_wildcard() -> String {
    WILDCARD.to_string()
}

fn default_requested() -> u32 {
    1
}

/// GPU vendor affinity. `Any` means no GPU preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GpuType {
    #[serde(rename = "NVIDIA")]
    Nvidia,
    #[serde(rename = "AMD")]
    Amd,
    #[serde(rename = "Intel")]
    Intel,
    #[serde(rename = "Any")]
    Any,
}

impl Default for GpuType {
    fn default() -> Self {
        GpuType::Any
    }
}

impl GpuType {
    /// Canonical string used in queue keys and wire payloads.
    pub fn as_key(&self) -> &'static str {
        match self {
            GpuType::Nvidia => "NVIDIA",
            GpuType::Amd => "AMD",
            GpuType::Intel => "Intel",
            GpuType::Any => "Any",
        }
    }
}

/// Job lifecycle state. Transitions form the DAG described in the job's
/// module docs: `pending -> running -> {succeeded, failed, aborted}`, plus
/// `pending -> aborted`. No other transition is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Aborted,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Aborted
        )
    }
}

/// User-supplied submission payload. Housekeeping fields (`id`, `status`,
/// timestamps, `worker`) are deliberately absent from this type so that a
/// caller supplying them in the request body has them silently dropped by
/// `serde` rather than reflected into the stored record.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSubmission {
    pub image: String,
    pub command: Vec<String>,
    pub arguments: Vec<String>,
    #[serde(default)]
    pub gpu_type: GpuType,
    #[serde(default = "default_requested")]
    pub memory_requested: u32,
    #[serde(default = "default_requested")]
    pub cpu_cores_requested: u32,
    #[serde(default = "default_wildcard")]
    pub dc: String,
    #[serde(default = "default_wildcard")]
    pub region: String,
}

impl JobSubmission {
    pub fn validate(&self) -> Result<(), JobservitorError> {
        if self.image.trim().is_empty() {
            return Err(JobservitorError::Validation(
                "image must not be empty".into(),
            ));
        }
        if self.memory_requested < 1 {
            return Err(JobservitorError::Validation(
                "memory_requested must be >= 1".into(),
            ));
        }
        if self.cpu_cores_requested < 1 {
            return Err(JobservitorError::Validation(
                "cpu_cores_requested must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

/// The durable job record. The only mutators are `start`/`finish`, both pure
/// in-memory transitions — nothing here touches the store directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub image: String,
    pub command: Vec<String>,
    pub arguments: Vec<String>,
    pub gpu_type: GpuType,
    pub memory_requested: u32,
    pub cpu_cores_requested: u32,
    pub dc: String,
    pub region: String,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub aborted_at: Option<DateTime<Utc>>,
    pub worker: Option<String>,
}

impl Job {
    /// Assigns a server-side id and timestamp and forces `status = pending`,
    /// discarding any housekeeping values a caller might have tried to sneak
    /// through the submission payload.
    pub fn new(submission: JobSubmission) -> Self {
        Self {
            id: Uuid::new_v4(),
            image: submission.image,
            command: submission.command,
            arguments: submission.arguments,
            gpu_type: submission.gpu_type,
            memory_requested: submission.memory_requested,
            cpu_cores_requested: submission.cpu_cores_requested,
            dc: submission.dc,
            region: submission.region,
            status: JobStatus::Pending,
            submitted_at: Utc::now(),
            started_at: None,
            completed_at: None,
            aborted_at: None,
            worker: None,
        }
    }

    /// Queue score: integer seconds since epoch, giving approximate FIFO
    /// ordering within an affinity bucket.
    pub fn score(&self) -> i64 {
        self.submitted_at.timestamp()
    }

    pub fn fits(&self, cpu_cores: u32, memory_gb: u32) -> bool {
        self.cpu_cores_requested <= cpu_cores && self.memory_requested <= memory_gb
    }

    /// `pending -> running`.
    pub fn start(&mut self, worker_id: impl Into<String>) {
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
        self.worker = Some(worker_id.into());
    }

    /// Any non-terminal state -> a terminal one. Callers must pass a
    /// terminal `JobStatus`; this is a pure bookkeeping helper; it does not
    /// itself enforce the state machine DAG (the worker/API call sites do).
    /// Not used for the abort path -- see `abort_pending`/`signal_abort`.
    pub fn finish(&mut self, status: JobStatus) {
        debug_assert!(status.is_terminal());
        debug_assert!(status != JobStatus::Aborted);
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    /// Abort of a job that was never dispatched: there is no worker that
    /// will ever supervise it, so the API finalizes it immediately.
    pub fn abort_pending(&mut self) {
        let now = Utc::now();
        self.status = JobStatus::Aborted;
        self.aborted_at = Some(now);
        self.completed_at = Some(now);
    }

    /// Abort of a job already claimed by a worker: only signals the
    /// transition. `completed_at` is left unset -- the owning worker sets
    /// it once it has actually killed the container, on its next
    /// supervision poll.
    pub fn signal_abort(&mut self) {
        self.status = JobStatus::Aborted;
        self.aborted_at = Some(Utc::now());
    }

    /// Called by the owning worker once it has killed the container for a
    /// job it observed as `aborted` mid-supervision.
    pub fn finalize_abort(&mut self) {
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> JobSubmission {
        JobSubmission {
            image: "busybox".into(),
            command: vec!["uname".into()],
            arguments: vec!["-a".into()],
            gpu_type: GpuType::Nvidia,
            memory_requested: 2,
            cpu_cores_requested: 1,
            dc: "dc1".into(),
            region: "az1".into(),
        }
    }

    #[test]
    fn new_job_is_pending_with_no_completion_fields() {
        let job = Job::new(submission());
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
        assert!(job.aborted_at.is_none());
        assert!(job.worker.is_none());
    }

    #[test]
    fn start_sets_worker_and_started_at() {
        let mut job = Job::new(submission());
        job.start("worker-1");
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.worker.as_deref(), Some("worker-1"));
        assert!(job.started_at.is_some());
    }

    #[test]
    fn finish_sets_completed_at_and_never_touches_aborted_at() {
        let mut succeeded = Job::new(submission());
        succeeded.start("worker-1");
        succeeded.finish(JobStatus::Succeeded);
        assert!(succeeded.completed_at.is_some());
        assert!(succeeded.aborted_at.is_none());
    }

    #[test]
    fn abort_pending_finalizes_immediately() {
        let mut job = Job::new(submission());
        job.abort_pending();
        assert_eq!(job.status, JobStatus::Aborted);
        assert!(job.aborted_at.is_some());
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn signal_abort_leaves_completed_at_unset_until_finalize_abort() {
        let mut job = Job::new(submission());
        job.start("worker-1");
        job.signal_abort();
        assert_eq!(job.status, JobStatus::Aborted);
        assert!(job.aborted_at.is_some());
        assert!(job.completed_at.is_none());

        job.finalize_abort();
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn fits_checks_both_dimensions() {
        let job = Job::new(submission()); // mem=2, cpu=1
        assert!(job.fits(1, 2));
        assert!(job.fits(4, 4));
        assert!(!job.fits(1, 1)); // memory too small
        assert!(!job.fits(0, 4)); // cpu too small
    }

    #[test]
    fn validate_rejects_empty_image_and_zero_requests() {
        let mut s = submission();
        s.image = "  ".into();
        assert!(s.validate().is_err());

        let mut s = submission();
        s.memory_requested = 0;
        assert!(s.validate().is_err());

        let mut s = submission();
        s.cpu_cores_requested = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn submission_defaults_are_wildcard_and_minimal() {
        let json = r#"{"image":"busybox","command":[],"arguments":[]}"#;
        let sub: JobSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(sub.dc, WILDCARD);
        assert_eq!(sub.region, WILDCARD);
        assert_eq!(sub.gpu_type, GpuType::Any);
        assert_eq!(sub.memory_requested, 1);
        assert_eq!(sub.cpu_cores_requested, 1);
    }

    #[test]
    fn command_and_arguments_are_required() {
        let missing_command = r#"{"image":"busybox","arguments":[]}"#;
        assert!(serde_json::from_str::<JobSubmission>(missing_command).is_err());

        let missing_arguments = r#"{"image":"busybox","command":[]}"#;
        assert!(serde_json::from_str::<JobSubmission>(missing_arguments).is_err());
    }

    #[test]
    fn housekeeping_fields_in_submission_body_are_ignored() {
        let json = r#"{
            "image": "busybox",
            "command": [],
            "arguments": [],
            "id": "malicious-id",
            "status": "succeeded",
            "submitted_at": "2020-01-01T00:00:00Z",
            "worker": "not-a-real-worker"
        }"#;
        let sub: JobSubmission = serde_json::from_str(json).unwrap();
        let job = Job::new(sub);
        assert_ne!(job.id.to_string(), "malicious-id");
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.worker.is_none());
    }
}
