use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use nauto_model::{Destination, LogLevel, LogRecord};
use sqlx::SqlitePool;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::error::StoreError;

#[derive(Debug, Clone)]
pub enum FileRotation {
    Hourly,
    Daily,
    Never,
}

impl From<FileRotation> for Rotation {
    fn from(value: FileRotation) -> Self {
        match value {
            FileRotation::Hourly => Rotation::HOURLY,
            FileRotation::Daily => Rotation::DAILY,
            FileRotation::Never => Rotation::NEVER,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogPipelineConfig {
    pub file_directory: PathBuf,
    pub file_prefix: String,
    pub rotation: FileRotation,
    pub stdout_enabled: bool,
    pub db_enabled: bool,
    pub redis_url: Option<String>,
    pub channel_prefix: String,
}

impl Default for LogPipelineConfig {
    fn default() -> Self {
        LogPipelineConfig {
            file_directory: PathBuf::from("./logs"),
            file_prefix: "netraven".into(),
            rotation: FileRotation::Daily,
            stdout_enabled: true,
            db_enabled: true,
            redis_url: None,
            channel_prefix: "netraven:logs".into(),
        }
    }
}

/// Log Pipeline (C5): one entry point fanning a record out to up to four
/// independent sinks. Each sink's failure is isolated from the others;
/// the db sink retries once and then swallows, per spec.md §4.5. Calls
/// are awaited fully by the caller, which is what gives per-(job_id,
/// device_id) emission order across stdout/file/db.
pub struct LogPipeline {
    pool: SqlitePool,
    file: Mutex<RollingFileAppender>,
    redis_client: Option<redis::Client>,
    config: LogPipelineConfig,
}

impl LogPipeline {
    pub fn new(pool: SqlitePool, config: LogPipelineConfig) -> Result<Self, StoreError> {
        let file = RollingFileAppender::new(
            config.rotation.clone().into(),
            &config.file_directory,
            &config.file_prefix,
        );
        let redis_client = config
            .redis_url
            .as_deref()
            .and_then(|url| redis::Client::open(url).ok());
        Ok(LogPipeline {
            pool,
            file: Mutex::new(file),
            redis_client,
            config,
        })
    }

    pub async fn log(&self, mut record: LogRecord) -> LogRecord {
        if self.config.stdout_enabled && record.destinations.contains(&Destination::Stdout) {
            self.emit_stdout(&record);
        }
        if record.destinations.contains(&Destination::File) {
            self.emit_file(&record);
        }
        if self.config.db_enabled && record.destinations.contains(&Destination::Db) {
            record.id = self.emit_db(&record).await;
        }
        if record.destinations.contains(&Destination::Channel) {
            self.emit_channel(&record).await;
        }
        record
    }

    fn emit_stdout(&self, record: &LogRecord) {
        let level = match record.level {
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warning => Level::WARN,
            LogLevel::Error | LogLevel::Critical => Level::ERROR,
        };
        tracing::event!(
            target: "netraven::log_pipeline",
            level,
            log_type = %record.log_type,
            source = %record.source,
            job_id = record.job_id.map(|j| j.to_string()).unwrap_or_default(),
            device_id = record.device_id.unwrap_or(0),
            "{}",
            record.message
        );
    }

    fn emit_file(&self, record: &LogRecord) {
        let line = format!(
            "{} {} {} source={} job_id={:?} device_id={:?} {}\n",
            record.timestamp.to_rfc3339(),
            record.level,
            record.log_type,
            record.source,
            record.job_id,
            record.device_id,
            record.message
        );
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(line.as_bytes());
        }
    }

    async fn emit_db(&self, record: &LogRecord) -> Option<i64> {
        for attempt in 0..2 {
            match self.insert_log_row(record).await {
                Ok(id) => return Some(id),
                Err(err) if attempt == 0 => {
                    tracing::warn!(target: "netraven::log_pipeline", %err, "db log insert failed, retrying once");
                    continue;
                }
                Err(err) => {
                    println!("log pipeline: db sink failed after retry: {err}");
                    return None;
                }
            }
        }
        None
    }

    async fn insert_log_row(&self, record: &LogRecord) -> Result<i64, StoreError> {
        let meta_text = record
            .meta
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let id = sqlx::query(
            "INSERT INTO logs (timestamp, log_type, level, job_id, device_id, source, message, meta) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.timestamp.to_rfc3339())
        .bind(record.log_type.to_string())
        .bind(record.level.to_string())
        .bind(record.job_id)
        .bind(record.device_id)
        .bind(&record.source)
        .bind(&record.message)
        .bind(meta_text)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    /// Fire-and-forget publish; any Redis failure is swallowed entirely
    /// (spec.md §4.5: the channel sink is non-persistent).
    async fn emit_channel(&self, record: &LogRecord) {
        let Some(client) = &self.redis_client else {
            return;
        };
        let Ok(payload) = serde_json::to_string(record) else {
            return;
        };
        let channel = format!("{}:{}", self.config.channel_prefix, record.log_type);
        if let Ok(mut conn) = client.get_multiplexed_async_connection().await {
            let _: Result<i64, _> = redis::cmd("PUBLISH")
                .arg(&channel)
                .arg(payload)
                .query_async(&mut conn)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nauto_model::{LogRecord, LogType};

    #[tokio::test]
    async fn log_without_db_or_channel_never_panics() {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::pool::init_pool("sqlite::memory:").await.unwrap();
        let config = LogPipelineConfig {
            file_directory: dir.path().to_path_buf(),
            db_enabled: false,
            redis_url: None,
            ..Default::default()
        };
        let pipeline = LogPipeline::new(pool, config).unwrap();
        let record = LogRecord::new(LogType::System, LogLevel::Info, "test", "hello");
        let logged = pipeline.log(record).await;
        assert!(logged.id.is_none());
    }
}
