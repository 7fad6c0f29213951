//! The `config_backup` reference job module (spec.md §4.6): retrieves the
//! platform's "show running-config" equivalent and hands it to the Config
//! Store (C4) for content-addressed, deduplicated persistence.

use async_trait::async_trait;
use nauto_drivers::platform::profile_for;
use nauto_model::{ErrorClass, JobId, ResolvedDevice};
use tracing::warn;

use crate::registry::{JobModule, JobModuleContext, JobModuleMeta, JobModuleOutcome};

pub struct ConfigBackupModule;

#[async_trait]
impl JobModule for ConfigBackupModule {
    fn job_type(&self) -> &'static str {
        "config_backup"
    }

    fn meta(&self) -> JobModuleMeta {
        JobModuleMeta {
            label: "Configuration Backup".into(),
            icon: "archive".into(),
            description: "Retrieves and persists the device's running configuration".into(),
        }
    }

    async fn run(&self, device: &ResolvedDevice, _job_id: JobId, ctx: &JobModuleContext) -> JobModuleOutcome {
        let device_id = device.device.id;

        let Some(driver) = ctx.drivers.find(&device.device.device_type) else {
            return JobModuleOutcome::failure(
                device_id,
                serde_json::json!({
                    "error_type": "NO_DRIVER",
                    "error": format!("no driver registered for {:?}", device.device.device_type),
                }),
            );
        };

        let profile = profile_for(device.device.device_type);
        let commands = vec![profile.show_running_config.to_string()];
        let output = match driver.run_commands(device, &commands, &ctx.timeouts).await {
            Ok(output) => output,
            Err(err) => {
                return JobModuleOutcome::failure(
                    device_id,
                    serde_json::json!({
                        "error_type": "DRIVER_ERROR",
                        "error": err.to_string(),
                        "error_class": err.error_class(),
                    }),
                );
            }
        };
        let config_text = output
            .output_for(profile.show_running_config)
            .unwrap_or_default()
            .to_string();

        let Some(store) = &ctx.config_store else {
            warn!(device_id, "config_backup has no config store wired; skipping persistence");
            return JobModuleOutcome::success(
                device_id,
                serde_json::json!({
                    "meta": {
                        "lines_saved": config_text.lines().count(),
                        "config_size": config_text.len(),
                        "stored": false,
                    }
                }),
            );
        };

        let persisted = match store.persist(device_id, &config_text, None).await {
            Ok(persisted) => persisted,
            Err(err) => {
                return JobModuleOutcome::failure(
                    device_id,
                    serde_json::json!({
                        "error_type": "STORAGE_ERROR",
                        "error": err.to_string(),
                        "error_class": ErrorClass::Storage,
                    }),
                );
            }
        };

        JobModuleOutcome::success(
            device_id,
            serde_json::json!({
                "commit_hash_or_config_id": persisted
                    .configuration_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| persisted.hash.clone()),
                "meta": {
                    "lines_saved": config_text.lines().count(),
                    "config_size": config_text.len(),
                    "stored": persisted.stored,
                }
            }),
        )
    }
}
