use std::time::Duration;

use async_trait::async_trait;
use jobservitor_core::{GpuType, Job, Result};
use uuid::Uuid;

/// The Job Store & Queue Broker: a thin abstraction over a key/value +
/// sorted-set service. `jobservitor-api` and `jobservitor-executor` both
/// depend on this trait, never on a concrete backend, so tests can swap in
/// `FakeStore` without touching call sites.
///
/// Naming convention: `Base*` for infrastructure traits, matching the
/// dependency-injection seams used elsewhere in this codebase.
#[async_trait]
pub trait BaseStore: Send + Sync {
    /// Overwrite semantics on put.
    async fn put_job(&self, job: &Job) -> Result<()>;

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>>;

    /// `bucket = queue:{gpu_type}:{dc}:{region}`.
    async fn enqueue(&self, gpu_type: GpuType, dc: &str, region: &str, id: Uuid, score: i64) -> Result<()>;

    /// Blocks up to `timeout` for the lowest-score member, atomic with
    /// removal.
    async fn blocking_pop_min(
        &self,
        gpu_type: GpuType,
        dc: &str,
        region: &str,
        timeout: Duration,
    ) -> Result<Option<(Uuid, i64)>>;

    /// Non-blocking, atomic removal of up to `n` smallest members.
    async fn pop_min_batch(
        &self,
        gpu_type: GpuType,
        dc: &str,
        region: &str,
        n: usize,
    ) -> Result<Vec<(Uuid, i64)>>;

    /// Removes a specific member; used by abort of a pending job.
    async fn remove(&self, gpu_type: GpuType, dc: &str, region: &str, id: Uuid) -> Result<()>;

    /// All jobs currently present in any queue, across every affinity
    /// bucket. Backs the API's `List()` operation.
    async fn list_queued(&self) -> Result<Vec<Job>>;

    /// Supplemental, opt-in feature: set a TTL on a terminal job's record so
    /// it eventually drops out of the store instead of accumulating
    /// forever. Backends that don't support expiry (or the in-memory fake)
    /// may leave this a no-op; callers only invoke it when
    /// `JOB_RECORD_TTL_SECONDS` is configured, so the base spec's "retained
    /// indefinitely" behavior is unaffected when it's unset.
    async fn expire_job(&self, _id: Uuid, _ttl_seconds: u64) -> Result<()> {
        Ok(())
    }

    /// Non-blocking dequeue-with-fit: `PopMinBatch` then pick the first
    /// candidate (lowest score) that fits `cpu_cores`/`memory_gb`,
    /// re-enqueuing the rest at their original scores.
    ///
    /// This "pop-many, pick-one, push-back" sequence is **not atomic**
    /// across its steps — a concurrent worker may observe the re-enqueued
    /// jobs in the interval between the batch pop and the push-back. This
    /// is an accepted trade-off for the first cut; a server-side scripted
    /// (single atomic compound op) variant is the intended evolution.
    async fn pop_fit(
        &self,
        gpu_type: GpuType,
        dc: &str,
        region: &str,
        n: usize,
        cpu_cores: u32,
        memory_gb: u32,
    ) -> Result<Option<Job>> {
        let candidates = self.pop_min_batch(gpu_type, dc, region, n).await?;
        self.select_fit(gpu_type, dc, region, candidates, cpu_cores, memory_gb)
            .await
    }

    /// Like `pop_fit`, but waits up to `timeout` for at least one candidate
    /// to appear before giving up — this is what satisfies the executor's
    /// "each locality attempt uses blocking pop with `blocking_time`"
    /// requirement while keeping the fit-filter itself built from the same
    /// non-blocking batch primitive `pop_fit` uses.
    async fn pop_fit_blocking(
        &self,
        gpu_type: GpuType,
        dc: &str,
        region: &str,
        n: usize,
        cpu_cores: u32,
        memory_gb: u32,
        timeout: Duration,
    ) -> Result<Option<Job>> {
        let first = match self.blocking_pop_min(gpu_type, dc, region, timeout).await? {
            Some(entry) => entry,
            None => return Ok(None),
        };
        let mut candidates = vec![first];
        if n > 1 {
            candidates.extend(self.pop_min_batch(gpu_type, dc, region, n - 1).await?);
        }
        self.select_fit(gpu_type, dc, region, candidates, cpu_cores, memory_gb)
            .await
    }

    /// Shared selection/requeue logic for `pop_fit` and `pop_fit_blocking`.
    async fn select_fit(
        &self,
        gpu_type: GpuType,
        dc: &str,
        region: &str,
        candidates: Vec<(Uuid, i64)>,
        cpu_cores: u32,
        memory_gb: u32,
    ) -> Result<Option<Job>> {
        if candidates.is_empty() {
            return Ok(None);
        }

        let mut selected = None;
        let mut to_requeue = Vec::new();
        for (id, score) in candidates {
            let job = match self.get_job(id).await? {
                Some(job) => job,
                // record vanished between enqueue and pop; nothing to requeue.
                None => continue,
            };
            if selected.is_none() && job.fits(cpu_cores, memory_gb) {
                selected = Some(job);
            } else {
                to_requeue.push((id, score));
            }
        }

        for (id, score) in to_requeue {
            self.enqueue(gpu_type, dc, region, id, score).await?;
        }

        Ok(selected)
    }
}
