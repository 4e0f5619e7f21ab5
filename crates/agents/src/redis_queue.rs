//! Redis-backed delayed job queue.
//!
//! Pending jobs live in a sorted set scored by their due time in epoch
//! milliseconds. Claiming moves the earliest due member into a second
//! `<key>:inflight` set scored by its lease deadline, in one script, so a job
//! is always in exactly one of the two sets. `ack` deletes it from the
//! in-flight set. Leases that run out (a worker crashed or was aborted) are
//! moved back to pending before every claim, which makes delivery
//! at-least-once across any number of nodes.

use async_trait::async_trait;
use campaign_core::config::RedisConfig;
use campaign_core::error::QueueError;
use campaign_core::{JobQueue, SendJob};
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// KEYS: pending, inflight. ARGV: now, lease deadline.
const CLAIM_SCRIPT: &str = r"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, 1)
if #due == 0 then
    return false
end
redis.call('ZREM', KEYS[1], due[1])
redis.call('ZADD', KEYS[2], ARGV[2], due[1])
return due[1]
";

/// KEYS: pending, inflight. ARGV: now.
const REQUEUE_SCRIPT: &str = r"
local expired = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[1])
for _, member in ipairs(expired) do
    redis.call('ZREM', KEYS[2], member)
    redis.call('ZADD', KEYS[1], ARGV[1], member)
end
return #expired
";

pub struct RedisJobQueue {
    conn: ConnectionManager,
    key: String,
    inflight_key: String,
    poll_interval: Duration,
    lease: Duration,
    claim: Script,
    requeue: Script,
    /// Raw member of every job this process holds a lease on, for `ack`.
    leased: Mutex<HashMap<Uuid, String>>,
}

impl RedisJobQueue {
    pub async fn new(config: &RedisConfig) -> anyhow::Result<Self> {
        let url = config
            .urls
            .first()
            .ok_or_else(|| anyhow::anyhow!("no Redis URL configured"))?;

        let client = redis::Client::open(url.as_str())?;
        let mut conn = ConnectionManager::new(client).await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!(
            url = %url,
            key = %config.queue_key,
            lease_secs = config.lease_secs,
            "Redis job queue connected"
        );
        Ok(Self {
            conn,
            key: config.queue_key.clone(),
            inflight_key: inflight_key(&config.queue_key),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            lease: Duration::from_secs(config.lease_secs),
            claim: Script::new(CLAIM_SCRIPT),
            requeue: Script::new(REQUEUE_SCRIPT),
            leased: Mutex::new(HashMap::new()),
        })
    }

    /// Jobs waiting in the pending set, due or not.
    pub async fn len(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        conn.zcard(&self.key).await.map_err(backend_error)
    }

    /// Jobs claimed by some worker and not yet acknowledged.
    pub async fn in_flight(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        conn.zcard(&self.inflight_key).await.map_err(backend_error)
    }

    /// Return every job whose lease ran out to the pending set, due now.
    async fn requeue_expired(&self, now: i64) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        let moved: u64 = self
            .requeue
            .key(&self.key)
            .key(&self.inflight_key)
            .arg(now)
            .invoke_async(&mut conn)
            .await
            .map_err(backend_error)?;
        if moved > 0 {
            warn!(moved, key = %self.key, "Re-queued jobs with expired leases");
            metrics::counter!("queue.leases_expired").increment(moved);
        }
        Ok(moved)
    }

    /// Move the earliest due job into the in-flight set.
    async fn claim_next(&self, now: i64) -> Result<Option<String>, QueueError> {
        let mut conn = self.conn.clone();
        self.claim
            .key(&self.key)
            .key(&self.inflight_key)
            .arg(now)
            .arg(due_score(now, self.lease))
            .invoke_async(&mut conn)
            .await
            .map_err(backend_error)
    }

    async fn release(&self, member: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .zrem(&self.inflight_key, member)
            .await
            .map_err(backend_error)?;
        Ok(())
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: SendJob, run_after: Duration) -> Result<(), QueueError> {
        let payload =
            serde_json::to_string(&job).map_err(|e| QueueError::Serialization(e.to_string()))?;
        let due = due_score(now_ms(), run_after);

        let mut conn = self.conn.clone();
        let _: i64 = conn
            .zadd(&self.key, payload, due)
            .await
            .map_err(backend_error)?;

        debug!(job_id = %job.job_id, due, "Job added to Redis queue");
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<SendJob>, QueueError> {
        loop {
            let now = now_ms();
            self.requeue_expired(now).await?;

            let Some(member) = self.claim_next(now).await? else {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            };

            return match serde_json::from_str::<SendJob>(&member) {
                Ok(job) => {
                    self.leased.lock().insert(job.job_id, member);
                    Ok(Some(job))
                }
                Err(e) => {
                    warn!(error = %e, "Dropping undecodable job payload");
                    self.release(&member).await?;
                    Err(QueueError::Serialization(e.to_string()))
                }
            };
        }
    }

    async fn ack(&self, job: &SendJob) -> Result<(), QueueError> {
        let held = self.leased.lock().remove(&job.job_id);
        let member = match held {
            Some(member) => member,
            None => serde_json::to_string(job)
                .map_err(|e| QueueError::Serialization(e.to_string()))?,
        };
        self.release(&member).await?;
        debug!(job_id = %job.job_id, "Job acknowledged");
        Ok(())
    }

    fn name(&self) -> &str {
        "redis"
    }
}

fn inflight_key(queue_key: &str) -> String {
    format!("{queue_key}:inflight")
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Score `run_after` from `now_ms`. Used for both due times and lease deadlines.
fn due_score(now_ms: i64, run_after: Duration) -> i64 {
    let offset = i64::try_from(run_after.as_millis()).unwrap_or(i64::MAX);
    now_ms.saturating_add(offset)
}

fn backend_error(err: redis::RedisError) -> QueueError {
    QueueError::Backend(err.to_string())
}
