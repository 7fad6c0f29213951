//! Queue layer (spec.md §6): `enqueue`/`dequeue`/`cancel` over run
//! requests. At-least-once delivery is assumed; the Runner tolerates
//! duplicate deliveries because it only appends logs/results and
//! transitions status linearly (spec.md §5).

use std::path::PathBuf;

use async_trait::async_trait;
use nauto_model::JobId;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

pub type QueueHandle = String;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("invalid redis url: {0}")]
    InvalidUrl(String),
    #[error("queue file io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed queue entry: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job_id: JobId) -> Result<QueueHandle, QueueError>;
    async fn dequeue(&self) -> Result<Option<(JobId, QueueHandle)>, QueueError>;
    async fn cancel(&self, handle: &QueueHandle) -> Result<(), QueueError>;
}

/// JSONL-backed fallback for environments without Redis.
/// Single-writer use only — no cross-process locking is attempted.
pub struct FileJobQueue {
    path: PathBuf,
}

impl FileJobQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileJobQueue { path: path.into() }
    }

    async fn read_lines(&self) -> Result<Vec<String>, QueueError> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(contents.lines().map(String::from).collect()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(vec![]),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_lines(&self, lines: &[String]) -> Result<(), QueueError> {
        let mut file = fs::File::create(&self.path).await?;
        for line in lines {
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
        }
        Ok(())
    }
}

#[async_trait]
impl JobQueue for FileJobQueue {
    async fn enqueue(&self, job_id: JobId) -> Result<QueueHandle, QueueError> {
        let handle = Uuid::new_v4().to_string();
        let mut lines = self.read_lines().await?;
        lines.push(format!("{job_id}\t{handle}"));
        self.write_lines(&lines).await?;
        Ok(handle)
    }

    async fn dequeue(&self) -> Result<Option<(JobId, QueueHandle)>, QueueError> {
        let mut lines = self.read_lines().await?;
        if lines.is_empty() {
            return Ok(None);
        }
        let head = lines.remove(0);
        self.write_lines(&lines).await?;
        let (job_id, handle) = head
            .split_once('\t')
            .ok_or_else(|| QueueError::Malformed(head.clone()))?;
        let job_id = job_id
            .parse()
            .map_err(|_| QueueError::Malformed(head.clone()))?;
        Ok(Some((job_id, handle.to_string())))
    }

    async fn cancel(&self, handle: &QueueHandle) -> Result<(), QueueError> {
        let lines = self.read_lines().await?;
        let retained: Vec<String> = lines.into_iter().filter(|l| !l.ends_with(handle.as_str())).collect();
        self.write_lines(&retained).await
    }
}

/// Redis-backed queue: `queue_key` is a list; each element is a
/// `job_id\thandle` pair, matching `FileJobQueue`'s wire shape so the
/// Scheduler can swap implementations freely.
pub struct RedisJobQueue {
    client: redis::Client,
    queue_key: String,
}

impl RedisJobQueue {
    pub fn new(url: &str, queue_key: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(url).map_err(|e| QueueError::InvalidUrl(e.to_string()))?;
        Ok(RedisJobQueue { client, queue_key: queue_key.to_string() })
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job_id: JobId) -> Result<QueueHandle, QueueError> {
        let handle = Uuid::new_v4().to_string();
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let entry = format!("{job_id}\t{handle}");
        let _: () = conn.rpush(&self.queue_key, entry).await?;
        Ok(handle)
    }

    async fn dequeue(&self) -> Result<Option<(JobId, QueueHandle)>, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let entry: Option<String> = conn.lpop(&self.queue_key, None).await?;
        match entry {
            Some(entry) => {
                let (job_id, handle) = entry
                    .split_once('\t')
                    .ok_or_else(|| QueueError::Malformed(entry.clone()))?;
                let job_id = job_id
                    .parse()
                    .map_err(|_| QueueError::Malformed(entry.clone()))?;
                Ok(Some((job_id, handle.to_string())))
            }
            None => Ok(None),
        }
    }

    async fn cancel(&self, handle: &QueueHandle) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let entries: Vec<String> = conn.lrange(&self.queue_key, 0, -1).await?;
        if let Some(entry) = entries.into_iter().find(|e| e.ends_with(handle.as_str())) {
            let _: i64 = conn.lrem(&self.queue_key, 0, entry).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_queue_round_trips_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let queue = FileJobQueue::new(dir.path().join("queue.jsonl"));

        queue.enqueue(1).await.unwrap();
        queue.enqueue(2).await.unwrap();

        let (first, _) = queue.dequeue().await.unwrap().unwrap();
        let (second, _) = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert!(queue.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_queue_cancel_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let queue = FileJobQueue::new(dir.path().join("queue.jsonl"));

        let handle = queue.enqueue(5).await.unwrap();
        queue.cancel(&handle).await.unwrap();
        assert!(queue.dequeue().await.unwrap().is_none());
    }
}
