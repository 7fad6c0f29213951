use nauto_model::DeviceType;

/// `device_type → (commands, per-command timeouts, capability probes)`
/// table consulted by job modules (spec.md §4.1). The driver itself stays
/// vendor-agnostic — it only ever executes the command list handed to it.
#[derive(Debug, Clone)]
pub struct PlatformProfile {
    /// Command that returns the full running configuration, used by the
    /// `config_backup` job module.
    pub show_running_config: &'static str,
    /// Commands the `reachability` job module issues beyond the TCP/ICMP
    /// probe, to confirm a management-plane session actually works.
    pub reachability_probe_commands: &'static [&'static str],
    pub default_command_timeout_secs: u64,
}

pub fn profile_for(device_type: DeviceType) -> PlatformProfile {
    match device_type {
        DeviceType::CiscoIos => PlatformProfile {
            show_running_config: "show running-config",
            reachability_probe_commands: &["show clock"],
            default_command_timeout_secs: 30,
        },
        DeviceType::JuniperJunos => PlatformProfile {
            show_running_config: "show configuration | display set",
            reachability_probe_commands: &["show system uptime"],
            default_command_timeout_secs: 30,
        },
        DeviceType::GenericSsh => PlatformProfile {
            show_running_config: "show running-config",
            reachability_probe_commands: &["show version"],
            default_command_timeout_secs: 30,
        },
        DeviceType::AristaEos => PlatformProfile {
            show_running_config: "show running-config",
            reachability_probe_commands: &["show clock"],
            default_command_timeout_secs: 20,
        },
        DeviceType::CiscoNxosApi => PlatformProfile {
            show_running_config: "show running-config",
            reachability_probe_commands: &["show clock"],
            default_command_timeout_secs: 20,
        },
        DeviceType::MerakiCloud => PlatformProfile {
            show_running_config: "devices/config",
            reachability_probe_commands: &["devices/status"],
            default_command_timeout_secs: 20,
        },
    }
}
