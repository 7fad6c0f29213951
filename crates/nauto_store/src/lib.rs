//! Config Store (C4) and Log Pipeline (C5): the two persistence-backed
//! components of the orchestration core, plus the SQLite implementation
//! of `nauto_security::CredentialRepository` (C3's storage side). Kept as
//! its own crate so `nauto_drivers`/`nauto_security` stay database-free.

pub mod config_store;
pub mod credential_repo;
pub mod error;
pub mod job_repo;
pub mod log_pipeline;
pub mod pool;
pub mod schema;

pub use config_store::{ConfigStore, PersistOutcome, SearchFilters};
pub use credential_repo::{encrypt_for_storage, SqliteCredentialRepository};
pub use error::StoreError;
pub use job_repo::JobRepository;
pub use log_pipeline::{FileRotation, LogPipeline, LogPipelineConfig};
pub use pool::init_pool;
