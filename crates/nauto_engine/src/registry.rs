//! Job Registry (C6): maps `job_type` strings to the modules that
//! implement them, validating each module's contract once at registration
//! time. Job-type modules are native Rust and self-register through this
//! builder-style API; there is no dynamic plugin loading at runtime.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use nauto_drivers::{CommandTimeouts, DriverRegistry};
use nauto_model::{Credential, Device, DeviceId, DeviceType, JobId, ResolvedDevice};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Clone)]
pub struct JobModuleMeta {
    pub label: String,
    pub icon: String,
    pub description: String,
}

/// The minimal shape spec.md §4.6/§8 requires every job module to return:
/// `{success, device_id}`, plus free-form `details` carrying the rest.
#[derive(Debug, Clone)]
pub struct JobModuleOutcome {
    pub success: bool,
    pub device_id: DeviceId,
    pub details: serde_json::Value,
}

impl JobModuleOutcome {
    pub fn success(device_id: DeviceId, details: serde_json::Value) -> Self {
        JobModuleOutcome { success: true, device_id, details }
    }

    pub fn failure(device_id: DeviceId, details: serde_json::Value) -> Self {
        JobModuleOutcome { success: false, device_id, details }
    }
}

/// Read-only dependencies threaded into every job module invocation: the
/// driver registry (C1), an optional config store (C4, only needed by
/// `config_backup`), redaction patterns (C2), driver timeouts, and the
/// job's free-form `parameters`.
#[derive(Clone)]
pub struct JobModuleContext {
    pub drivers: DriverRegistry,
    pub config_store: Option<Arc<nauto_store::ConfigStore>>,
    pub redaction_patterns: Vec<String>,
    pub timeouts: CommandTimeouts,
    pub parameters: serde_json::Value,
}

impl JobModuleContext {
    /// A context good enough to satisfy the registry's dummy-device probe:
    /// no drivers, no store, defaults everywhere. Modules must tolerate
    /// this per spec.md §9 ("modules must treat db=None, device=dummy
    /// defensively").
    pub(crate) fn probe() -> Self {
        JobModuleContext {
            drivers: DriverRegistry::new(vec![]),
            config_store: None,
            redaction_patterns: vec![],
            timeouts: CommandTimeouts::default(),
            parameters: serde_json::Value::Null,
        }
    }
}

#[async_trait]
pub trait JobModule: Send + Sync {
    fn job_type(&self) -> &'static str;
    fn meta(&self) -> JobModuleMeta;

    /// Runs against one resolved device. Must not panic or block
    /// indefinitely on a dummy device — the registry probes this at
    /// registration time.
    async fn run(&self, device: &ResolvedDevice, job_id: JobId, ctx: &JobModuleContext) -> JobModuleOutcome;
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("job type '{0}' already registered")]
    DuplicateName(String),
    #[error("job module '{0}' failed contract validation: {1}")]
    NonCompliant(String, String),
}

/// C6: the single source of truth for job types exposed to external
/// collaborators. Duplicate names fail registration; non-compliant
/// modules are rejected with a loader-level error log and never exposed.
#[derive(Default)]
pub struct JobRegistry {
    modules: HashMap<String, Arc<dyn JobModule>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        JobRegistry { modules: HashMap::new() }
    }

    /// Registers the two reference modules (spec.md §4.6) plus the
    /// carried-forward `compliance_check` module. Panics if any of the
    /// built-ins fail their own contract probe, which would indicate a
    /// bug in this crate rather than a misbehaving third-party module.
    pub async fn with_defaults() -> Self {
        let mut registry = JobRegistry::new();
        registry
            .register(Arc::new(crate::modules::ReachabilityModule))
            .await
            .expect("built-in reachability module must pass its own contract probe");
        registry
            .register(Arc::new(crate::modules::ConfigBackupModule))
            .await
            .expect("built-in config_backup module must pass its own contract probe");
        registry
            .register(Arc::new(crate::modules::ComplianceCheckModule))
            .await
            .expect("built-in compliance_check module must pass its own contract probe");
        registry
    }

    pub async fn register(&mut self, module: Arc<dyn JobModule>) -> Result<(), RegistryError> {
        let job_type = module.job_type().to_string();
        if self.modules.contains_key(&job_type) {
            return Err(RegistryError::DuplicateName(job_type));
        }

        let dummy = dummy_resolved_device();
        let ctx = JobModuleContext::probe();
        let outcome = module.run(&dummy, 0, &ctx).await;
        if outcome.device_id != dummy.device.id {
            error!(job_type = %job_type, "job module failed contract probe: did not echo the probed device_id");
            return Err(RegistryError::NonCompliant(
                job_type,
                "run() did not echo the probed device_id".into(),
            ));
        }

        self.modules.insert(job_type, module);
        Ok(())
    }

    pub fn find(&self, job_type: &str) -> Option<Arc<dyn JobModule>> {
        self.modules.get(job_type).cloned()
    }

    pub fn list(&self) -> Vec<(String, JobModuleMeta)> {
        self.modules.iter().map(|(k, v)| (k.clone(), v.meta())).collect()
    }
}

fn dummy_resolved_device() -> ResolvedDevice {
    let device = Device {
        id: 0,
        hostname: "probe".into(),
        ip_address: "0.0.0.0".parse().unwrap(),
        device_type: DeviceType::GenericSsh,
        port: 22,
        description: None,
        serial_number: None,
        model: None,
        source: None,
        notes: None,
        last_updated: None,
        updated_by: None,
        created_at: chrono::Utc::now(),
        tags: vec![],
    };
    let credential = Credential {
        id: 0,
        username: "probe".into(),
        password: "".into(),
        priority: 1000,
        last_used: None,
        success_count: 0,
        failure_count: 0,
        description: None,
        is_system: false,
        tags: vec![],
    };
    ResolvedDevice::new(device, credential)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoModule;

    #[async_trait]
    impl JobModule for EchoModule {
        fn job_type(&self) -> &'static str {
            "echo"
        }

        fn meta(&self) -> JobModuleMeta {
            JobModuleMeta {
                label: "Echo".into(),
                icon: "echo".into(),
                description: "test module".into(),
            }
        }

        async fn run(&self, device: &ResolvedDevice, _job_id: JobId, _ctx: &JobModuleContext) -> JobModuleOutcome {
            JobModuleOutcome::success(device.device.id, serde_json::json!({}))
        }
    }

    struct BrokenModule;

    #[async_trait]
    impl JobModule for BrokenModule {
        fn job_type(&self) -> &'static str {
            "broken"
        }

        fn meta(&self) -> JobModuleMeta {
            JobModuleMeta {
                label: "Broken".into(),
                icon: "broken".into(),
                description: "always misreports device_id".into(),
            }
        }

        async fn run(&self, _device: &ResolvedDevice, _job_id: JobId, _ctx: &JobModuleContext) -> JobModuleOutcome {
            JobModuleOutcome::success(999, serde_json::json!({}))
        }
    }

    #[tokio::test]
    async fn registers_compliant_module() {
        let mut registry = JobRegistry::new();
        registry.register(Arc::new(EchoModule)).await.unwrap();
        assert!(registry.find("echo").is_some());
    }

    #[tokio::test]
    async fn rejects_duplicate_job_type() {
        let mut registry = JobRegistry::new();
        registry.register(Arc::new(EchoModule)).await.unwrap();
        let err = registry.register(Arc::new(EchoModule)).await.unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(_)));
    }

    #[tokio::test]
    async fn rejects_module_that_fails_contract_probe() {
        let mut registry = JobRegistry::new();
        let err = registry.register(Arc::new(BrokenModule)).await.unwrap_err();
        assert!(matches!(err, RegistryError::NonCompliant(_, _)));
        assert!(registry.find("broken").is_none());
    }
}
