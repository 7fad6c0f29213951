use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type DeviceId = i64;
pub type TagId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    CiscoIos,
    JuniperJunos,
    GenericSsh,
    AristaEos,
    CiscoNxosApi,
    MerakiCloud,
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "cisco_ios" | "ios" => Ok(DeviceType::CiscoIos),
            "juniper_junos" | "junos" => Ok(DeviceType::JuniperJunos),
            "generic_ssh" | "ssh" => Ok(DeviceType::GenericSsh),
            "arista_eos" | "eos" => Ok(DeviceType::AristaEos),
            "cisco_nxos_api" | "nxos" | "nx_os" => Ok(DeviceType::CiscoNxosApi),
            "meraki_cloud" | "meraki" => Ok(DeviceType::MerakiCloud),
            other => Err(format!("unknown device type: {other}")),
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceType::CiscoIos => "cisco_ios",
            DeviceType::JuniperJunos => "juniper_junos",
            DeviceType::GenericSsh => "generic_ssh",
            DeviceType::AristaEos => "arista_eos",
            DeviceType::CiscoNxosApi => "cisco_nxos_api",
            DeviceType::MerakiCloud => "meraki_cloud",
        };
        f.write_str(s)
    }
}

/// A managed network device. Owned by the external collaborator; the core
/// reads this row and never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub hostname: String,
    pub ip_address: IpAddr,
    pub device_type: DeviceType,
    #[serde(default = "default_port")]
    pub port: u16,
    pub description: Option<String>,
    pub serial_number: Option<String>,
    pub model: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Tag names carried by this device. Association is tag-mediated; a
    /// device never stores a credential reference directly (spec.md §9).
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_port() -> u16 {
    22
}

impl Device {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
