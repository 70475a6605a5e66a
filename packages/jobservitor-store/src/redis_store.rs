use std::time::Duration;

use async_trait::async_trait;
use jobservitor_core::{queue_key, record_key, GpuType, Job, JobservitorError, Result};
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use uuid::Uuid;

use crate::store::BaseStore;

/// Redis-backed `BaseStore`. Reached via `redis`'s async `ConnectionManager`,
/// which transparently reconnects on connection loss rather than failing the
/// first query after a blip — the same client construction pattern used
/// throughout the pack's Redis-backed job queues.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(JobservitorError::Store)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(JobservitorError::Store)?;
        tracing::info!("connected to redis job store");
        Ok(Self { conn })
    }
}

#[async_trait]
impl BaseStore for RedisStore {
    async fn put_job(&self, job: &Job) -> Result<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(job)?;
        let _: () = conn.set(record_key(job.id), payload).await?;
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(record_key(id)).await?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(JobservitorError::from))
            .transpose()
    }

    async fn enqueue(
        &self,
        gpu_type: GpuType,
        dc: &str,
        region: &str,
        id: Uuid,
        score: i64,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = queue_key(gpu_type, dc, region);
        let _: () = redis::cmd("ZADD")
            .arg(&key)
            .arg(score)
            .arg(id.to_string())
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn blocking_pop_min(
        &self,
        gpu_type: GpuType,
        dc: &str,
        region: &str,
        timeout: Duration,
    ) -> Result<Option<(Uuid, i64)>> {
        let mut conn = self.conn.clone();
        let key = queue_key(gpu_type, dc, region);
        // BZPOPMIN on a single key replies with (key, member, score), or nil
        // on timeout.
        let reply: Option<(String, String, i64)> = redis::cmd("BZPOPMIN")
            .arg(&key)
            .arg(timeout.as_secs_f64())
            .query_async(&mut conn)
            .await?;
        Ok(reply.and_then(|(_, member, score)| {
            Uuid::parse_str(&member).ok().map(|id| (id, score))
        }))
    }

    async fn pop_min_batch(
        &self,
        gpu_type: GpuType,
        dc: &str,
        region: &str,
        n: usize,
    ) -> Result<Vec<(Uuid, i64)>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let key = queue_key(gpu_type, dc, region);
        let reply: Vec<(String, i64)> = redis::cmd("ZPOPMIN")
            .arg(&key)
            .arg(n)
            .query_async(&mut conn)
            .await?;
        Ok(reply
            .into_iter()
            .filter_map(|(member, score)| Uuid::parse_str(&member).ok().map(|id| (id, score)))
            .collect())
    }

    async fn remove(&self, gpu_type: GpuType, dc: &str, region: &str, id: Uuid) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = queue_key(gpu_type, dc, region);
        let _: i64 = conn.zrem(key, id.to_string()).await?;
        Ok(())
    }

    async fn expire_job(&self, id: Uuid, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: bool = conn.expire(record_key(id), ttl_seconds as i64).await?;
        Ok(())
    }

    async fn list_queued(&self) -> Result<Vec<Job>> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut queue_keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg("jobservitor:queue:*")
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await?;
            queue_keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        let mut jobs = Vec::new();
        for key in queue_keys {
            let members: Vec<String> = conn.zrange(&key, 0, -1).await?;
            for member in members {
                let Ok(id) = Uuid::parse_str(&member) else {
                    continue;
                };
                if let Some(job) = self.get_job(id).await? {
                    jobs.push(job);
                }
            }
        }
        Ok(jobs)
    }
}
