use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::device::DeviceId;

pub type ConfigurationId = i64;

/// An immutable snapshot of a device's running configuration.
///
/// Invariants (spec.md §3): two consecutive snapshots for the same device
/// never share `data_hash`; snapshots are strictly append-only; `data_hash`
/// matches the SHA-256 of `config_text` byte-for-byte.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfiguration {
    pub id: Option<ConfigurationId>,
    pub device_id: DeviceId,
    pub retrieved_at: DateTime<Utc>,
    pub config_text: String,
    pub data_hash: String,
    pub config_metadata: Option<serde_json::Value>,
}

pub fn hash_config(config_text: &str) -> String {
    let digest = Sha256::digest(config_text.as_bytes());
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

impl DeviceConfiguration {
    pub fn new(device_id: DeviceId, config_text: String, config_metadata: Option<serde_json::Value>) -> Self {
        let data_hash = hash_config(&config_text);
        DeviceConfiguration {
            id: None,
            device_id,
            retrieved_at: Utc::now(),
            config_text,
            data_hash,
            config_metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_known_sha256() {
        // echo -n "" | sha256sum
        assert_eq!(
            hash_config(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn new_snapshot_hash_matches_config_text() {
        let snap = DeviceConfiguration::new(1, "hostname r1\n".into(), None);
        assert_eq!(snap.data_hash, hash_config(&snap.config_text));
        assert_eq!(snap.data_hash.len(), 64);
    }
}
