//! The `compliance_check` job module: a third job type alongside the two
//! reference modules. Retrieves the running configuration and evaluates it
//! against the rules carried in `Job.parameters`.

use async_trait::async_trait;
use nauto_compliance::ComplianceEngine;
use nauto_drivers::platform::profile_for;
use nauto_model::{ComplianceRule, JobId, ResolvedDevice};

use crate::registry::{JobModule, JobModuleContext, JobModuleMeta, JobModuleOutcome};

pub struct ComplianceCheckModule;

#[async_trait]
impl JobModule for ComplianceCheckModule {
    fn job_type(&self) -> &'static str {
        "compliance_check"
    }

    fn meta(&self) -> JobModuleMeta {
        JobModuleMeta {
            label: "Compliance Check".into(),
            icon: "shield-check".into(),
            description: "Evaluates a device's running configuration against a rule set".into(),
        }
    }

    async fn run(&self, device: &ResolvedDevice, _job_id: JobId, ctx: &JobModuleContext) -> JobModuleOutcome {
        let device_id = device.device.id;

        let rules: Vec<ComplianceRule> = match serde_json::from_value(
            ctx.parameters.get("rules").cloned().unwrap_or(serde_json::Value::Null),
        ) {
            Ok(rules) => rules,
            Err(_) => vec![],
        };
        if rules.is_empty() {
            return JobModuleOutcome::failure(
                device_id,
                serde_json::json!({"error_type": "JOB_TYPE_CONTRACT_VIOLATION", "error": "no rules configured"}),
            );
        }

        let Some(driver) = ctx.drivers.find(&device.device.device_type) else {
            return JobModuleOutcome::failure(
                device_id,
                serde_json::json!({"error_type": "NO_DRIVER", "error": "no driver registered for this device type"}),
            );
        };

        let profile = profile_for(device.device.device_type);
        let commands = vec![profile.show_running_config.to_string()];
        let output = match driver.run_commands(device, &commands, &ctx.timeouts).await {
            Ok(output) => output,
            Err(err) => {
                return JobModuleOutcome::failure(
                    device_id,
                    serde_json::json!({"error_type": "DRIVER_ERROR", "error": err.to_string(), "error_class": err.error_class()}),
                );
            }
        };
        let config_text = output
            .output_for(profile.show_running_config)
            .unwrap_or_default()
            .to_string();

        let mut dataset = nauto_compliance::DeviceConfigs::new();
        dataset.insert(device_id.to_string(), config_text);
        let outcomes = ComplianceEngine::evaluate(&rules, &dataset);
        let summary = ComplianceEngine::summarize(&outcomes);

        JobModuleOutcome::success(
            device_id,
            serde_json::json!({
                "summary": summary,
                "results": outcomes,
            }),
        )
    }
}
