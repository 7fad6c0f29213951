/// Schema for the SQLite-backed persistence layer (spec.md §6). Column
/// names mirror the spec's logical schema; `json`/`jsonb` columns are
/// stored as TEXT and (de)serialized at the call site since SQLite has
/// no native JSON column type.
pub const MIGRATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS devices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    hostname TEXT NOT NULL UNIQUE,
    ip_address TEXT NOT NULL UNIQUE,
    device_type TEXT NOT NULL,
    port INTEGER NOT NULL DEFAULT 22,
    description TEXT,
    serial_number TEXT,
    model TEXT,
    source TEXT,
    notes TEXT,
    last_updated TEXT,
    updated_by TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS credentials (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    password_encrypted TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 1000,
    last_used TEXT,
    success_count INTEGER NOT NULL DEFAULT 0,
    failure_count INTEGER NOT NULL DEFAULT 0,
    description TEXT,
    is_system INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    type TEXT
);

CREATE TABLE IF NOT EXISTS device_tags (
    device_id INTEGER NOT NULL REFERENCES devices(id),
    tag_id INTEGER NOT NULL REFERENCES tags(id),
    PRIMARY KEY (device_id, tag_id)
);

CREATE TABLE IF NOT EXISTS credential_tags (
    credential_id INTEGER NOT NULL REFERENCES credentials(id),
    tag_id INTEGER NOT NULL REFERENCES tags(id),
    PRIMARY KEY (credential_id, tag_id)
);

CREATE TABLE IF NOT EXISTS job_tags (
    job_id INTEGER NOT NULL REFERENCES jobs(id),
    tag_id INTEGER NOT NULL REFERENCES tags(id),
    PRIMARY KEY (job_id, tag_id)
);

CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    job_type TEXT NOT NULL,
    is_enabled INTEGER NOT NULL DEFAULT 1,
    schedule_kind TEXT NOT NULL,
    schedule_params TEXT NOT NULL,
    parameters TEXT NOT NULL DEFAULT '{}',
    status TEXT NOT NULL,
    is_system INTEGER NOT NULL DEFAULT 0,
    approval_id TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS job_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL,
    device_id INTEGER NOT NULL,
    success INTEGER NOT NULL,
    details TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    log_type TEXT NOT NULL,
    level TEXT NOT NULL,
    job_id INTEGER,
    device_id INTEGER,
    source TEXT NOT NULL,
    message TEXT NOT NULL,
    meta TEXT
);
CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON logs(timestamp);
CREATE INDEX IF NOT EXISTS idx_logs_job_id ON logs(job_id);
CREATE INDEX IF NOT EXISTS idx_logs_device_id ON logs(device_id);
CREATE INDEX IF NOT EXISTS idx_logs_log_type ON logs(log_type);
CREATE INDEX IF NOT EXISTS idx_logs_level ON logs(level);

CREATE TABLE IF NOT EXISTS device_configurations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    device_id INTEGER NOT NULL,
    retrieved_at TEXT NOT NULL,
    config_text TEXT NOT NULL,
    data_hash TEXT NOT NULL,
    config_metadata TEXT
);
CREATE INDEX IF NOT EXISTS idx_device_configurations_device_id
    ON device_configurations(device_id, retrieved_at);

CREATE VIRTUAL TABLE IF NOT EXISTS device_configurations_fts USING fts5(
    config_text,
    content='device_configurations',
    content_rowid='id'
);
CREATE TRIGGER IF NOT EXISTS device_configurations_ai AFTER INSERT ON device_configurations BEGIN
    INSERT INTO device_configurations_fts(rowid, config_text) VALUES (new.id, new.config_text);
END;

CREATE TABLE IF NOT EXISTS credential_attempts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    credential_id INTEGER NOT NULL,
    device_id INTEGER NOT NULL,
    job_id INTEGER NOT NULL,
    success INTEGER NOT NULL,
    error TEXT,
    occurred_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS schedule_registry (
    job_id INTEGER NOT NULL,
    schedule_signature TEXT NOT NULL,
    next_run_at TEXT NOT NULL,
    registered_at TEXT NOT NULL,
    PRIMARY KEY (job_id, schedule_signature)
);
"#;
