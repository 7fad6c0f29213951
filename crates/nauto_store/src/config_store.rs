use chrono::{DateTime, Utc};
use nauto_model::{hash_config, DeviceConfiguration, DeviceId};
use similar::{ChangeTag, TextDiff};
use sqlx::SqlitePool;

use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct PersistOutcome {
    pub stored: bool,
    pub hash: String,
    pub configuration_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub device_id: Option<DeviceId>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// Config Store (C4): content-addressed, append-only device configuration
/// snapshots with full-text search and a diff formatter, grounded in the
/// same pool-backed store pattern as a `sqlx`-based state store.
#[derive(Clone)]
pub struct ConfigStore {
    pool: SqlitePool,
}

impl ConfigStore {
    pub fn new(pool: SqlitePool) -> Self {
        ConfigStore { pool }
    }

    /// Computes `data_hash`; if it matches the device's most recent
    /// snapshot, writes nothing and reports `stored: false` (spec.md §4.4).
    pub async fn persist(
        &self,
        device_id: DeviceId,
        config_text: &str,
        config_metadata: Option<serde_json::Value>,
    ) -> Result<PersistOutcome, StoreError> {
        let hash = hash_config(config_text);

        let latest_hash: Option<String> = sqlx::query_scalar(
            "SELECT data_hash FROM device_configurations \
             WHERE device_id = ? ORDER BY retrieved_at DESC, id DESC LIMIT 1",
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        if latest_hash.as_deref() == Some(hash.as_str()) {
            return Ok(PersistOutcome {
                stored: false,
                hash,
                configuration_id: None,
            });
        }

        let retrieved_at = Utc::now();
        let metadata_text = config_metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let id = sqlx::query(
            "INSERT INTO device_configurations \
             (device_id, retrieved_at, config_text, data_hash, config_metadata) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(device_id)
        .bind(retrieved_at.to_rfc3339())
        .bind(config_text)
        .bind(&hash)
        .bind(metadata_text)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(PersistOutcome {
            stored: true,
            hash,
            configuration_id: Some(id),
        })
    }

    pub async fn get(&self, configuration_id: i64) -> Result<Option<DeviceConfiguration>, StoreError> {
        let row: Option<(i64, i64, String, String, String, Option<String>)> = sqlx::query_as(
            "SELECT id, device_id, retrieved_at, config_text, data_hash, config_metadata \
             FROM device_configurations WHERE id = ?",
        )
        .bind(configuration_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_configuration).transpose()
    }

    /// Full-text search over `config_text` via the FTS5 shadow table,
    /// optionally filtered by device and retrieval-time range.
    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<DeviceConfiguration>, StoreError> {
        let mut sql = String::from(
            "SELECT dc.id, dc.device_id, dc.retrieved_at, dc.config_text, dc.data_hash, dc.config_metadata \
             FROM device_configurations dc \
             JOIN device_configurations_fts fts ON fts.rowid = dc.id \
             WHERE device_configurations_fts MATCH ?",
        );
        if filters.device_id.is_some() {
            sql.push_str(" AND dc.device_id = ?");
        }
        if filters.since.is_some() {
            sql.push_str(" AND dc.retrieved_at >= ?");
        }
        if filters.until.is_some() {
            sql.push_str(" AND dc.retrieved_at <= ?");
        }
        sql.push_str(" ORDER BY dc.retrieved_at DESC");

        let mut q = sqlx::query_as::<_, (i64, i64, String, String, String, Option<String>)>(&sql)
            .bind(query);
        if let Some(device_id) = filters.device_id {
            q = q.bind(device_id);
        }
        if let Some(since) = filters.since {
            q = q.bind(since.to_rfc3339());
        }
        if let Some(until) = filters.until {
            q = q.bind(until.to_rfc3339());
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_configuration).collect()
    }

    /// Thin unified-diff formatter over two stored snapshots (spec.md
    /// §4.4); not a source of truth, just a presentation helper on top
    /// of `get`.
    pub async fn diff(&self, config_a_id: i64, config_b_id: i64) -> Result<String, StoreError> {
        let a = self.get(config_a_id).await?;
        let b = self.get(config_b_id).await?;
        let before = a.map(|c| c.config_text).unwrap_or_default();
        let after = b.map(|c| c.config_text).unwrap_or_default();
        Ok(render_unified_diff(&before, &after))
    }
}

fn render_unified_diff(before: &str, after: &str) -> String {
    let diff = TextDiff::from_lines(before, after);
    let mut buf = String::new();
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => " ",
        };
        buf.push_str(sign);
        buf.push_str(change.to_string().trim_end());
        buf.push('\n');
    }
    buf
}

fn row_to_configuration(
    row: (i64, i64, String, String, String, Option<String>),
) -> Result<DeviceConfiguration, StoreError> {
    let (id, device_id, retrieved_at, config_text, data_hash, metadata_text) = row;
    let config_metadata = metadata_text.map(|t| serde_json::from_str(&t)).transpose()?;
    let retrieved_at = DateTime::parse_from_rfc3339(&retrieved_at)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    Ok(DeviceConfiguration {
        id: Some(id),
        device_id,
        retrieved_at,
        config_text,
        data_hash,
        config_metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_marks_added_and_removed_lines() {
        let diff = render_unified_diff("a\nb\n", "a\nc\n");
        assert!(diff.contains("-b"));
        assert!(diff.contains("+c"));
        assert!(diff.contains(" a"));
    }
}
