use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jobservitor_core::{GpuType, Job, JobStatus, WILDCARD};
use jobservitor_store::BaseStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::runtime::{ContainerHandle, ContainerRuntime, ContainerSpec, ContainerState};
use crate::service::Service;

/// How many candidates `pop_fit`/`pop_fit_blocking` pull per attempt before
/// applying the fit filter. Implementation-defined, per spec.
const POP_BATCH_SIZE: usize = 16;

/// Sleep between supervision polls -- bounded by ~1s per the concurrency
/// model, chosen on the shorter end so abort latency stays low.
const SUPERVISE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The executor worker: a single long-lived task that repeatedly asks the
/// broker for a job matching its local resources, drives it through its
/// state machine, runs it in a container, watches for external abort, and
/// records the outcome.
pub struct JobWorker<S, R> {
    store: Arc<S>,
    runtime: Arc<R>,
    config: Config,
}

impl<S, R> JobWorker<S, R>
where
    S: BaseStore + 'static,
    R: ContainerRuntime + 'static,
{
    pub fn new(store: Arc<S>, runtime: Arc<R>, config: Config) -> Self {
        Self {
            store,
            runtime,
            config,
        }
    }

    /// The locality cascade: `(gpu_type, dc, region)`, then relax GPU, then
    /// relax region, then relax DC -- stopping at the first non-empty
    /// bucket. Each attempt blocks up to `blocking_time`; the whole cascade
    /// returns `None` only once all four buckets have been tried.
    async fn dequeue_with_cascade(&self) -> jobservitor_core::Result<Option<Job>> {
        let attempts = [
            (self.config.gpu_type, self.config.dc.as_str(), self.config.region.as_str()),
            (GpuType::Any, self.config.dc.as_str(), self.config.region.as_str()),
            (GpuType::Any, self.config.dc.as_str(), WILDCARD),
            (GpuType::Any, WILDCARD, WILDCARD),
        ];

        for (gpu_type, dc, region) in attempts {
            let job = self
                .store
                .pop_fit_blocking(
                    gpu_type,
                    dc,
                    region,
                    POP_BATCH_SIZE,
                    self.config.cpu_cores,
                    self.config.memory_gb,
                    self.config.blocking_time,
                )
                .await?;
            if job.is_some() {
                return Ok(job);
            }
        }
        Ok(None)
    }

    async fn maybe_expire(&self, job: &Job) {
        if let Some(ttl) = self.config.record_ttl_seconds {
            if let Err(e) = self.store.expire_job(job.id, ttl).await {
                warn!(job_id = %job.id, error = %e, "failed to set job record TTL");
            }
        }
    }

    /// Fetches the finished container's logs and surfaces them via
    /// `tracing` before the job is finalized.
    async fn surface_logs(&self, job_id: &Uuid, handle: &ContainerHandle) {
        match self.runtime.logs(handle).await {
            Ok(logs) => {
                let logs = String::from_utf8_lossy(&logs);
                info!(job_id = %job_id, "{}", logs);
            }
            Err(e) => warn!(job_id = %job_id, error = %e, "failed to fetch container logs"),
        }
    }

    /// One full cycle: dequeue, claim-check, dispatch, supervise, finalize.
    /// Returns `Ok(None)` when the cascade found nothing, or the claim was
    /// lost to a race / external abort (no state change, no re-enqueue).
    pub async fn handle_one_job(&self) -> jobservitor_core::Result<Option<Job>> {
        let popped = match self.dequeue_with_cascade().await? {
            Some(job) => job,
            None => return Ok(None),
        };

        // Claim check: reload authoritative state before taking ownership.
        let mut job = match self.store.get_job(popped.id).await? {
            Some(job) if job.status == JobStatus::Pending => job,
            Some(job) => {
                debug!(job_id = %job.id, status = ?job.status, "dropping non-pending claim");
                return Ok(None);
            }
            None => {
                debug!(job_id = %popped.id, "dropped claim: record vanished");
                return Ok(None);
            }
        };

        job.start(self.config.worker_id.clone());
        self.store.put_job(&job).await?;
        info!(job_id = %job.id, worker = %self.config.worker_id, image = %job.image, "dispatching job");

        let argv: Vec<String> = job.command.iter().chain(job.arguments.iter()).cloned().collect();
        let spec = ContainerSpec {
            image: job.image.clone(),
            argv,
        };

        let handle = match self.runtime.run(spec).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "dispatch failed");
                job.finish(JobStatus::Failed);
                self.store.put_job(&job).await?;
                self.maybe_expire(&job).await;
                return Ok(Some(job));
            }
        };

        loop {
            let reloaded = self.store.get_job(job.id).await?.unwrap_or_else(|| job.clone());
            if reloaded.status == JobStatus::Aborted {
                info!(job_id = %job.id, "abort observed, killing container");
                if let Err(e) = self.runtime.kill(&handle).await {
                    warn!(job_id = %job.id, error = %e, "failed to kill container on abort");
                }
                self.surface_logs(&job.id, &handle).await;
                let mut finalized = reloaded;
                finalized.finalize_abort();
                self.store.put_job(&finalized).await?;
                self.maybe_expire(&finalized).await;
                return Ok(Some(finalized));
            }

            match self.runtime.status(&handle).await? {
                ContainerState::Running => {
                    tokio::time::sleep(SUPERVISE_POLL_INTERVAL).await;
                    continue;
                }
                ContainerState::Exited { exit_code } => {
                    let status = if exit_code == 0 {
                        JobStatus::Succeeded
                    } else {
                        JobStatus::Failed
                    };
                    self.surface_logs(&job.id, &handle).await;
                    job.finish(status);
                    self.store.put_job(&job).await?;
                    self.maybe_expire(&job).await;
                    info!(job_id = %job.id, exit_code, status = ?job.status, "job finalized");
                    return Ok(Some(job));
                }
            }
        }
    }
}

#[async_trait]
impl<S, R> Service for JobWorker<S, R>
where
    S: BaseStore + 'static,
    R: ContainerRuntime + 'static,
{
    fn name(&self) -> &'static str {
        "executor-worker"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!(worker_id = %self.config.worker_id, gpu_type = ?self.config.gpu_type, "executor worker starting");

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.handle_one_job().await {
                Ok(Some(_)) => continue,
                Ok(None) => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.idle_time) => {}
                    }
                }
                Err(e) => {
                    warn!(error = %e, "error during job handling cycle, retrying after idle sleep");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.idle_time) => {}
                    }
                }
            }
        }

        // No in-flight job draining: the worker simply stops picking up new
        // jobs between supervision cycles. See the config module docs for
        // why this is an accepted limitation, not an oversight.
        info!(worker_id = %self.config.worker_id, "executor worker stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobservitor_core::JobSubmission;
    use jobservitor_store::FakeStore;

    use crate::fake_runtime::FakeContainerRuntime;

    fn config(gpu_type: GpuType, cpu_cores: u32, memory_gb: u32, dc: &str, region: &str) -> Config {
        Config {
            redis_uri: "unused".into(),
            worker_id: "test-worker".into(),
            gpu_type,
            cpu_cores,
            memory_gb,
            dc: dc.into(),
            region: region.into(),
            idle_time: Duration::from_millis(10),
            blocking_time: Duration::from_millis(10),
            record_ttl_seconds: None,
        }
    }

    async fn submit(store: &FakeStore, sub: JobSubmission) -> Job {
        let job = Job::new(sub);
        store.put_job(&job).await.unwrap();
        store
            .enqueue(job.gpu_type, &job.dc, &job.region, job.id, job.score())
            .await
            .unwrap();
        job
    }

    fn submission(image: &str, gpu_type: GpuType) -> JobSubmission {
        JobSubmission {
            image: image.into(),
            command: vec!["uname".into()],
            arguments: vec!["-a".into()],
            gpu_type,
            memory_requested: 1,
            cpu_cores_requested: 1,
            dc: WILDCARD.into(),
            region: WILDCARD.into(),
        }
    }

    #[tokio::test]
    async fn submit_and_dispatch_succeeds() {
        let store = FakeStore::new();
        let runtime = FakeContainerRuntime::new();
        let submitted = submit(&store, submission("busybox", GpuType::Nvidia)).await;

        let worker = JobWorker::new(Arc::new(store.clone()), Arc::new(runtime), config(GpuType::Nvidia, 1, 2, WILDCARD, WILDCARD));
        let finished = worker.handle_one_job().await.unwrap().expect("job dispatched");

        assert_eq!(finished.id, submitted.id);
        assert_eq!(finished.status, JobStatus::Succeeded);
        assert!(finished.started_at.is_some());
        assert!(finished.completed_at.is_some());
        assert_eq!(store.queue_len(GpuType::Nvidia, WILDCARD, WILDCARD).await, 0);
    }

    #[tokio::test]
    async fn affinity_isolation_leaves_mismatched_job_enqueued() {
        let store = FakeStore::new();
        let runtime = FakeContainerRuntime::new();
        submit(&store, submission("busybox", GpuType::Nvidia)).await;

        let worker = JobWorker::new(Arc::new(store.clone()), Arc::new(runtime), config(GpuType::Amd, 1, 2, "dc1", "az1"));
        let result = worker.handle_one_job().await.unwrap();

        assert!(result.is_none());
        assert_eq!(store.queue_len(GpuType::Nvidia, WILDCARD, WILDCARD).await, 1);
    }

    #[tokio::test]
    async fn any_bucket_fallback_is_consumed_after_own_gpu_bucket_is_empty() {
        let store = FakeStore::new();
        let runtime = FakeContainerRuntime::new();
        let submitted = submit(&store, submission("busybox", GpuType::Any)).await;

        let worker = JobWorker::new(Arc::new(store.clone()), Arc::new(runtime), config(GpuType::Amd, 1, 2, WILDCARD, WILDCARD));
        let finished = worker.handle_one_job().await.unwrap().expect("any-bucket job consumed");

        assert_eq!(finished.id, submitted.id);
        assert_eq!(finished.status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn non_pending_claim_is_discarded_without_requeue() {
        let store = FakeStore::new();
        let runtime = FakeContainerRuntime::new();
        let mut submitted = submit(&store, submission("busybox", GpuType::Any)).await;
        submitted.status = JobStatus::Running; // externally modified, as if another worker claimed it
        store.put_job(&submitted).await.unwrap();

        let worker = JobWorker::new(Arc::new(store.clone()), Arc::new(runtime), config(GpuType::Any, 1, 2, WILDCARD, WILDCARD));
        let result = worker.handle_one_job().await.unwrap();

        assert!(result.is_none());
        let reloaded = store.get_job(submitted.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn exit_code_mapping_and_image_not_found() {
        let store = FakeStore::new();
        let runtime = FakeContainerRuntime::new();
        runtime.set_exit_code("bad-exit", 1).await;
        runtime.mark_image_missing("does-not-exist").await;

        let good = submit(&store, submission("busybox", GpuType::Any)).await;
        let worker = JobWorker::new(Arc::new(store.clone()), Arc::new(runtime.clone()), config(GpuType::Any, 1, 2, WILDCARD, WILDCARD));
        let finished = worker.handle_one_job().await.unwrap().unwrap();
        assert_eq!(finished.id, good.id);
        assert_eq!(finished.status, JobStatus::Succeeded);

        let bad = submit(&store, submission("bad-exit", GpuType::Any)).await;
        let finished = worker.handle_one_job().await.unwrap().unwrap();
        assert_eq!(finished.id, bad.id);
        assert_eq!(finished.status, JobStatus::Failed);

        let missing = submit(&store, submission("does-not-exist", GpuType::Any)).await;
        let finished = worker.handle_one_job().await.unwrap().unwrap();
        assert_eq!(finished.id, missing.id);
        assert_eq!(finished.status, JobStatus::Failed);
        assert!(finished.started_at.is_some()); // claimed before dispatch failed
    }

    #[tokio::test]
    async fn abort_running_job_is_observed_on_next_poll() {
        let store = FakeStore::new();
        let runtime = FakeContainerRuntime::new();
        runtime.mark_long_running("sleeper").await;
        let submitted = submit(&store, submission("sleeper", GpuType::Any)).await;

        let worker = Arc::new(JobWorker::new(Arc::new(store.clone()), Arc::new(runtime), config(GpuType::Any, 1, 2, WILDCARD, WILDCARD)));
        let worker_task = worker.clone();
        let handle = tokio::spawn(async move { worker_task.handle_one_job().await });

        // give the worker a moment to claim and start supervising
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut running = store.get_job(submitted.id).await.unwrap().unwrap();
        assert_eq!(running.status, JobStatus::Running);
        running.signal_abort();
        store.put_job(&running).await.unwrap();

        let finished = handle.await.unwrap().unwrap().unwrap();
        assert_eq!(finished.status, JobStatus::Aborted);
        assert!(finished.completed_at.is_some());
    }

    #[tokio::test]
    async fn fit_filter_skips_oversized_jobs_in_the_any_bucket() {
        let store = FakeStore::new();
        let runtime = FakeContainerRuntime::new();
        for i in 0..5 {
            submit(
                &store,
                JobSubmission {
                    image: format!("big-{i}"),
                    command: vec![],
                    arguments: vec![],
                    gpu_type: GpuType::Any,
                    memory_requested: 10,
                    cpu_cores_requested: 1,
                    dc: WILDCARD.into(),
                    region: WILDCARD.into(),
                },
            )
            .await;
        }
        let small = submit(
            &store,
            JobSubmission {
                image: "small".into(),
                command: vec![],
                arguments: vec![],
                gpu_type: GpuType::Any,
                memory_requested: 1,
                cpu_cores_requested: 1,
                dc: WILDCARD.into(),
                region: WILDCARD.into(),
            },
        )
        .await;

        let worker = JobWorker::new(Arc::new(store.clone()), Arc::new(runtime), config(GpuType::Any, 1, 1, WILDCARD, WILDCARD));
        let finished = worker.handle_one_job().await.unwrap().unwrap();
        assert_eq!(finished.id, small.id);
        assert_eq!(store.queue_len(GpuType::Any, WILDCARD, WILDCARD).await, 5);
    }
}
