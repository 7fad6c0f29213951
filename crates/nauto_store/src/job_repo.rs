use chrono::{DateTime, Utc};
use nauto_model::{Device, DeviceId, Job, JobId, JobResult, JobStatus, ScheduleKind, ScheduleParams};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::error::StoreError;

/// Persistence for Jobs, Devices (read-only from the core's perspective),
/// JobResults, and the Scheduler's schedule registry. Consolidates the
/// storage needs of the Runner (C9) and Scheduler (C10) so those crates
/// stay free of SQL.
#[derive(Clone)]
pub struct JobRepository {
    pool: SqlitePool,
}

impl JobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        JobRepository { pool }
    }

    pub async fn get_job(&self, job_id: JobId) -> Result<Option<Job>, StoreError> {
        let row: Option<JobRow> = sqlx::query_as(
            "SELECT id, name, job_type, is_enabled, schedule_kind, schedule_params, parameters, status, \
                    is_system, approval_id, created_at \
             FROM jobs WHERE id = ?",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => {
                let mut job = row_to_job(row)?;
                job.tags = self.tags_for_job(job.id).await?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    pub async fn list_enabled_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let rows: Vec<JobRow> = sqlx::query_as(
            "SELECT id, name, job_type, is_enabled, schedule_kind, schedule_params, parameters, status, \
                    is_system, approval_id, created_at \
             FROM jobs WHERE is_enabled = 1",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            let mut job = row_to_job(row)?;
            job.tags = self.tags_for_job(job.id).await?;
            jobs.push(job);
        }
        Ok(jobs)
    }

    pub async fn update_job_status(&self, job_id: JobId, status: JobStatus) -> Result<(), StoreError> {
        sqlx::query("UPDATE jobs SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn tags_for_job(&self, job_id: JobId) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT t.name FROM tags t JOIN job_tags jt ON jt.tag_id = t.id WHERE jt.job_id = ?",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Devices carrying at least one of `tags` (the Runner's "load
    /// devices by the Job's tags" step, spec.md §4.9 step 3).
    pub async fn devices_for_tags(&self, tags: &[String]) -> Result<Vec<Device>, StoreError> {
        if tags.is_empty() {
            return Ok(vec![]);
        }
        let placeholders = tags.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "SELECT DISTINCT d.id, d.hostname, d.ip_address, d.device_type, d.port, d.description, \
                    d.serial_number, d.model, d.source, d.notes, d.last_updated, d.updated_by, d.created_at \
             FROM devices d \
             JOIN device_tags dt ON dt.device_id = d.id \
             JOIN tags t ON t.id = dt.tag_id \
             WHERE t.name IN ({placeholders})"
        );
        let mut query = sqlx::query_as::<_, DeviceRow>(&sql);
        for tag in tags {
            query = query.bind(tag);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut devices = Vec::with_capacity(rows.len());
        for row in rows {
            let tags = self.tags_for_device(row.id).await?;
            devices.push(row.into_device(tags)?);
        }
        Ok(devices)
    }

    async fn tags_for_device(&self, device_id: DeviceId) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT t.name FROM tags t JOIN device_tags dt ON dt.tag_id = t.id WHERE dt.device_id = ?",
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// All JobResults recorded for one job, in insertion order. Used by
    /// collaborator-side reporting (e.g. the CLI's audit log export); the
    /// Runner itself never re-reads what it just wrote.
    pub async fn results_for_job(&self, job_id: JobId) -> Result<Vec<JobResult>, StoreError> {
        let rows: Vec<JobResultRow> = sqlx::query_as(
            "SELECT id, job_id, device_id, success, details, created_at \
             FROM job_results WHERE job_id = ? ORDER BY id ASC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_job_result).collect()
    }

    pub async fn insert_job_result(&self, result: &JobResult) -> Result<i64, StoreError> {
        let details = serde_json::to_string(&result.details)?;
        let id = sqlx::query(
            "INSERT INTO job_results (job_id, device_id, success, details, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(result.job_id)
        .bind(result.device_id)
        .bind(result.success)
        .bind(details)
        .bind(result.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    /// Idempotent by (job_id, schedule_signature) per spec.md §4.10.
    /// Returns `true` if this is a new registration.
    pub async fn register_schedule(
        &self,
        job_id: JobId,
        signature: &str,
        next_run_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO schedule_registry (job_id, schedule_signature, next_run_at, registered_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(job_id)
        .bind(signature)
        .bind(next_run_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn cancel_schedule(&self, job_id: JobId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM schedule_registry WHERE job_id = ?")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Registry rows for enabled jobs whose `next_run_at` has elapsed
    /// (spec.md §4.10's "enqueue due occurrences" step).
    pub async fn due_schedules(&self, now: DateTime<Utc>) -> Result<Vec<(JobId, String, DateTime<Utc>)>, StoreError> {
        let rows: Vec<(i64, String, String)> = sqlx::query_as(
            "SELECT sr.job_id, sr.schedule_signature, sr.next_run_at \
             FROM schedule_registry sr \
             JOIN jobs j ON j.id = sr.job_id \
             WHERE j.is_enabled = 1 AND sr.next_run_at <= ?",
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(job_id, signature, next_run_at)| {
                let next_run_at = DateTime::parse_from_rfc3339(&next_run_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or(now);
                Ok((job_id, signature, next_run_at))
            })
            .collect()
    }

    /// Advances a registry row's `next_run_at` after an occurrence fires,
    /// so a recurring (interval/cron) schedule keeps ticking forward.
    pub async fn advance_schedule(
        &self,
        job_id: JobId,
        signature: &str,
        next_run_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE schedule_registry SET next_run_at = ? WHERE job_id = ? AND schedule_signature = ?")
            .bind(next_run_at.to_rfc3339())
            .bind(job_id)
            .bind(signature)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn registered_job_ids(&self) -> Result<Vec<JobId>, StoreError> {
        let rows: Vec<(JobId,)> = sqlx::query_as("SELECT DISTINCT job_id FROM schedule_registry")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: i64,
    name: String,
    job_type: String,
    is_enabled: bool,
    schedule_kind: String,
    schedule_params: String,
    parameters: String,
    status: String,
    is_system: bool,
    approval_id: Option<String>,
    created_at: String,
}

fn row_to_job(row: JobRow) -> Result<Job, StoreError> {
    use serde::de::Error as _;
    let _kind = ScheduleKind::from_str(&row.schedule_kind).unwrap_or(ScheduleKind::Manual);
    let schedule: ScheduleParams = serde_json::from_str(&row.schedule_params)?;
    let parameters: serde_json::Value = serde_json::from_str(&row.parameters)?;
    let status = JobStatus::from_str(&row.status)
        .map_err(|e| StoreError::Serde(serde_json::Error::custom(e)))?;
    let created_at = DateTime::parse_from_rfc3339(&row.created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(Job {
        id: row.id,
        name: row.name,
        job_type: row.job_type,
        is_enabled: row.is_enabled,
        schedule,
        parameters,
        status,
        is_system: row.is_system,
        tags: vec![],
        approval_id: row.approval_id,
        created_at,
    })
}

#[derive(sqlx::FromRow)]
struct JobResultRow {
    id: i64,
    job_id: i64,
    device_id: i64,
    success: bool,
    details: String,
    created_at: String,
}

fn row_to_job_result(row: JobResultRow) -> Result<JobResult, StoreError> {
    let details: serde_json::Value = serde_json::from_str(&row.details)?;
    let created_at = DateTime::parse_from_rfc3339(&row.created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    Ok(JobResult { id: Some(row.id), job_id: row.job_id, device_id: row.device_id, success: row.success, details, created_at })
}

#[derive(sqlx::FromRow)]
struct DeviceRow {
    id: i64,
    hostname: String,
    ip_address: String,
    device_type: String,
    port: i64,
    description: Option<String>,
    serial_number: Option<String>,
    model: Option<String>,
    source: Option<String>,
    notes: Option<String>,
    last_updated: Option<String>,
    updated_by: Option<String>,
    created_at: String,
}

impl DeviceRow {
    fn into_device(self, tags: Vec<String>) -> Result<Device, StoreError> {
        use serde::de::Error as _;
        use std::str::FromStr as _;
        let ip_address = self
            .ip_address
            .parse()
            .map_err(|_| StoreError::Serde(serde_json::Error::custom("invalid ip_address")))?;
        let device_type = nauto_model::DeviceType::from_str(&self.device_type)
            .map_err(|_| StoreError::Serde(serde_json::Error::custom("invalid device_type")))?;
        let last_updated = self
            .last_updated
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Device {
            id: self.id,
            hostname: self.hostname,
            ip_address,
            device_type,
            port: self.port as u16,
            description: self.description,
            serial_number: self.serial_number,
            model: self.model,
            source: self.source,
            notes: self.notes,
            last_updated,
            updated_by: self.updated_by,
            created_at,
            tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repo() -> JobRepository {
        let pool = crate::pool::init_pool("sqlite::memory:").await.unwrap();
        JobRepository::new(pool)
    }

    async fn insert_job(repo: &JobRepository, name: &str, tags: &[&str]) -> JobId {
        let schedule = serde_json::to_string(&ScheduleParams::Manual).unwrap();
        let id = sqlx::query(
            "INSERT INTO jobs (name, job_type, is_enabled, schedule_kind, schedule_params, status, is_system, created_at) \
             VALUES (?, 'backup_config', 1, 'manual', ?, 'pending', 0, ?)",
        )
        .bind(name)
        .bind(schedule)
        .bind(Utc::now().to_rfc3339())
        .execute(&repo.pool)
        .await
        .unwrap()
        .last_insert_rowid();

        for tag in tags {
            let tag_id = sqlx::query("INSERT INTO tags (name) VALUES (?)")
                .bind(tag)
                .execute(&repo.pool)
                .await
                .unwrap()
                .last_insert_rowid();
            sqlx::query("INSERT INTO job_tags (job_id, tag_id) VALUES (?, ?)")
                .bind(id)
                .bind(tag_id)
                .execute(&repo.pool)
                .await
                .unwrap();
        }
        id
    }

    async fn insert_device(repo: &JobRepository, hostname: &str, ip: &str, tags: &[&str]) -> DeviceId {
        let id = sqlx::query(
            "INSERT INTO devices (hostname, ip_address, device_type, port, created_at) \
             VALUES (?, ?, 'cisco_ios', 22, ?)",
        )
        .bind(hostname)
        .bind(ip)
        .bind(Utc::now().to_rfc3339())
        .execute(&repo.pool)
        .await
        .unwrap()
        .last_insert_rowid();

        for tag in tags {
            sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
                .bind(tag)
                .execute(&repo.pool)
                .await
                .unwrap();
            let tag_id: i64 = sqlx::query_scalar("SELECT id FROM tags WHERE name = ?")
                .bind(tag)
                .fetch_one(&repo.pool)
                .await
                .unwrap();
            sqlx::query("INSERT INTO device_tags (device_id, tag_id) VALUES (?, ?)")
                .bind(id)
                .bind(tag_id)
                .execute(&repo.pool)
                .await
                .unwrap();
        }
        id
    }

    #[tokio::test]
    async fn get_job_round_trips_tags() {
        let repo = repo().await;
        let id = insert_job(&repo, "nightly-backup", &["core", "edge"]).await;

        let job = repo.get_job(id).await.unwrap().unwrap();
        assert_eq!(job.name, "nightly-backup");
        assert_eq!(job.status, JobStatus::Pending);
        let mut tags = job.tags;
        tags.sort();
        assert_eq!(tags, vec!["core".to_string(), "edge".to_string()]);
    }

    #[tokio::test]
    async fn get_job_missing_returns_none() {
        let repo = repo().await;
        assert!(repo.get_job(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_enabled_jobs_skips_disabled() {
        let repo = repo().await;
        insert_job(&repo, "enabled-job", &[]).await;
        sqlx::query(
            "INSERT INTO jobs (name, job_type, is_enabled, schedule_kind, schedule_params, status, is_system, created_at) \
             VALUES ('disabled-job', 'backup_config', 0, 'manual', '{\"type\":\"manual\"}', 'pending', 0, ?)",
        )
        .bind(Utc::now().to_rfc3339())
        .execute(&repo.pool)
        .await
        .unwrap();

        let jobs = repo.list_enabled_jobs().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "enabled-job");
    }

    #[tokio::test]
    async fn update_job_status_persists() {
        let repo = repo().await;
        let id = insert_job(&repo, "status-job", &[]).await;
        repo.update_job_status(id, JobStatus::CompletedSuccess).await.unwrap();
        let job = repo.get_job(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::CompletedSuccess);
    }

    #[tokio::test]
    async fn devices_for_tags_matches_shared_tags() {
        let repo = repo().await;
        insert_device(&repo, "sw1", "10.0.0.1", &["core"]).await;
        insert_device(&repo, "sw2", "10.0.0.2", &["edge"]).await;

        let devices = repo.devices_for_tags(&["core".to_string()]).await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].hostname, "sw1");
    }

    #[tokio::test]
    async fn devices_for_tags_empty_input_returns_empty() {
        let repo = repo().await;
        assert!(repo.devices_for_tags(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn register_schedule_is_idempotent() {
        let repo = repo().await;
        let id = insert_job(&repo, "scheduled-job", &[]).await;
        let now = Utc::now();

        let first = repo.register_schedule(id, "sig-1", now).await.unwrap();
        let second = repo.register_schedule(id, "sig-1", now).await.unwrap();
        assert!(first);
        assert!(!second);

        let registered = repo.registered_job_ids().await.unwrap();
        assert_eq!(registered, vec![id]);
    }

    #[tokio::test]
    async fn cancel_schedule_removes_registration() {
        let repo = repo().await;
        let id = insert_job(&repo, "cancel-me", &[]).await;
        repo.register_schedule(id, "sig-1", Utc::now()).await.unwrap();
        repo.cancel_schedule(id).await.unwrap();
        assert!(repo.registered_job_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_job_result_returns_new_id() {
        let repo = repo().await;
        let job_id = insert_job(&repo, "result-job", &[]).await;
        let device_id = insert_device(&repo, "dev1", "10.0.0.9", &[]).await;

        let result = JobResult {
            id: None,
            job_id,
            device_id,
            success: true,
            details: serde_json::json!({"output": "ok"}),
            created_at: Utc::now(),
        };
        let id = repo.insert_job_result(&result).await.unwrap();
        assert!(id > 0);
    }
}
