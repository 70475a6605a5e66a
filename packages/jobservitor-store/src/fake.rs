use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jobservitor_core::{queue_key, GpuType, Job, Result};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::store::BaseStore;

#[derive(Default)]
struct Inner {
    records: HashMap<Uuid, Job>,
    // kept sorted by score ascending, mimicking a Redis sorted set.
    queues: HashMap<String, Vec<(i64, Uuid)>>,
}

/// In-memory double for `BaseStore`. Backs the executor and API test suites
/// so they can exercise real dequeue/fit/abort logic without a live Redis
/// instance — the narrow, data-only shape of `BaseStore` makes a fake more
/// practical here than a `testcontainers`-backed integration test.
#[derive(Clone, Default)]
pub struct FakeStore {
    inner: Arc<Mutex<Inner>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(gpu_type: GpuType, dc: &str, region: &str) -> String {
        queue_key(gpu_type, dc, region)
    }

    /// Test helper: current member count of a bucket, in submission order.
    pub async fn queue_len(&self, gpu_type: GpuType, dc: &str, region: &str) -> usize {
        let inner = self.inner.lock().await;
        inner
            .queues
            .get(&Self::key(gpu_type, dc, region))
            .map(|b| b.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl BaseStore for FakeStore {
    async fn put_job(&self, job: &Job) -> Result<()> {
        self.inner.lock().await.records.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self.inner.lock().await.records.get(&id).cloned())
    }

    async fn enqueue(
        &self,
        gpu_type: GpuType,
        dc: &str,
        region: &str,
        id: Uuid,
        score: i64,
    ) -> Result<()> {
        let key = Self::key(gpu_type, dc, region);
        let mut inner = self.inner.lock().await;
        let bucket = inner.queues.entry(key).or_default();
        bucket.retain(|(_, existing)| *existing != id);
        bucket.push((score, id));
        bucket.sort_by_key(|(score, _)| *score);
        Ok(())
    }

    async fn blocking_pop_min(
        &self,
        gpu_type: GpuType,
        dc: &str,
        region: &str,
        timeout: Duration,
    ) -> Result<Option<(Uuid, i64)>> {
        // Tests control enqueue ordering explicitly, so an immediate
        // non-blocking check is sufficient; `timeout` is accepted only for
        // interface parity with the real broker.
        let _ = timeout;
        let mut popped = self.pop_min_batch(gpu_type, dc, region, 1).await?;
        Ok(popped.pop())
    }

    async fn pop_min_batch(
        &self,
        gpu_type: GpuType,
        dc: &str,
        region: &str,
        n: usize,
    ) -> Result<Vec<(Uuid, i64)>> {
        let key = Self::key(gpu_type, dc, region);
        let mut inner = self.inner.lock().await;
        let bucket = inner.queues.entry(key).or_default();
        let take = n.min(bucket.len());
        Ok(bucket.drain(0..take).collect())
    }

    async fn remove(&self, gpu_type: GpuType, dc: &str, region: &str, id: Uuid) -> Result<()> {
        let key = Self::key(gpu_type, dc, region);
        let mut inner = self.inner.lock().await;
        if let Some(bucket) = inner.queues.get_mut(&key) {
            bucket.retain(|(_, existing)| *existing != id);
        }
        Ok(())
    }

    async fn list_queued(&self) -> Result<Vec<Job>> {
        let inner = self.inner.lock().await;
        let mut jobs = Vec::new();
        for bucket in inner.queues.values() {
            for (_, id) in bucket {
                if let Some(job) = inner.records.get(id) {
                    jobs.push(job.clone());
                }
            }
        }
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobservitor_core::{Job, JobStatus, JobSubmission};

    fn job(image: &str, gpu: GpuType, mem: u32, cpu: u32) -> Job {
        Job::new(JobSubmission {
            image: image.into(),
            command: vec![],
            arguments: vec![],
            gpu_type: gpu,
            memory_requested: mem,
            cpu_cores_requested: cpu,
            dc: "Any".into(),
            region: "Any".into(),
        })
    }

    #[tokio::test]
    async fn pop_fit_returns_none_on_empty_queue() {
        let store = FakeStore::new();
        let got = store
            .pop_fit(GpuType::Any, "Any", "Any", 5, 4, 4)
            .await
            .unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn pop_fit_skips_oversized_candidates_and_requeues_them() {
        let store = FakeStore::new();
        let small = job("fits", GpuType::Any, 1, 1);
        for i in 0..5 {
            let big = job(&format!("big-{i}"), GpuType::Any, 10, 1);
            store.put_job(&big).await.unwrap();
            store
                .enqueue(GpuType::Any, "Any", "Any", big.id, big.score())
                .await
                .unwrap();
        }
        store.put_job(&small).await.unwrap();
        store
            .enqueue(GpuType::Any, "Any", "Any", small.id, small.score())
            .await
            .unwrap();

        let picked = store
            .pop_fit(GpuType::Any, "Any", "Any", 6, 1, 1)
            .await
            .unwrap()
            .expect("the 1GiB job should fit");
        assert_eq!(picked.id, small.id);
        assert_eq!(store.queue_len(GpuType::Any, "Any", "Any").await, 5);
    }

    #[tokio::test]
    async fn pop_fit_requeues_everything_when_nothing_fits() {
        let store = FakeStore::new();
        let big = job("too-big", GpuType::Any, 10, 1);
        store.put_job(&big).await.unwrap();
        store
            .enqueue(GpuType::Any, "Any", "Any", big.id, big.score())
            .await
            .unwrap();

        let picked = store
            .pop_fit(GpuType::Any, "Any", "Any", 5, 1, 1)
            .await
            .unwrap();
        assert!(picked.is_none());
        assert_eq!(store.queue_len(GpuType::Any, "Any", "Any").await, 1);
    }

    #[tokio::test]
    async fn remove_drops_pending_job_from_its_bucket() {
        let store = FakeStore::new();
        let j = job("abort-me", GpuType::Nvidia, 1, 1);
        store.put_job(&j).await.unwrap();
        store
            .enqueue(GpuType::Nvidia, "Any", "Any", j.id, j.score())
            .await
            .unwrap();
        store
            .remove(GpuType::Nvidia, "Any", "Any", j.id)
            .await
            .unwrap();
        assert_eq!(store.queue_len(GpuType::Nvidia, "Any", "Any").await, 0);
    }

    #[tokio::test]
    async fn list_queued_reflects_only_enqueued_jobs() {
        let store = FakeStore::new();
        let pending = job("still-pending", GpuType::Any, 1, 1);
        store.put_job(&pending).await.unwrap();
        store
            .enqueue(GpuType::Any, "Any", "Any", pending.id, pending.score())
            .await
            .unwrap();

        let mut done = job("already-done", GpuType::Any, 1, 1);
        done.finish(JobStatus::Succeeded);
        store.put_job(&done).await.unwrap(); // record exists, never enqueued

        let listed = store.list_queued().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, pending.id);
    }
}
