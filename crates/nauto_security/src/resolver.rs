use async_trait::async_trait;
use nauto_model::{shares_tag, Credential, CredentialAttempt, Device};

#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("credential repository error: {0}")]
    Repository(String),
}

/// Read/write access to the collaborator-owned `credentials` table plus the
/// core-owned attempt ledger. Implemented against SQLite by `nauto_store`;
/// kept here as a trait so this crate has no database dependency.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn credentials_for_tags(&self, tags: &[String]) -> Result<Vec<Credential>, ResolverError>;
    async fn record_attempt(&self, attempt: CredentialAttempt) -> Result<(), ResolverError>;
}

/// `resolve(device) → [Credential]` (spec.md §4.3): credentials matching the
/// device's tags, ordered by priority ascending, then by `last_used`
/// ascending (older/never-used first) as tiebreak. An empty result is a
/// distinct, meaningful condition — callers must not treat it as an error.
pub async fn resolve(
    device: &Device,
    repo: &dyn CredentialRepository,
) -> Result<Vec<Credential>, ResolverError> {
    let candidates = repo.credentials_for_tags(&device.tags).await?;
    let mut matched: Vec<Credential> = candidates
        .into_iter()
        .filter(|c| shares_tag(&c.tags, &device.tags))
        .collect();

    matched.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.last_used.cmp(&b.last_used))
    });

    Ok(matched)
}
