use chrono::Utc;
use nauto_model::job::ScheduleParams;
use nauto_model::*;
use serde_json::json;

#[test]
fn job_round_trip() {
    let job = Job {
        id: 1,
        name: "Config Push".into(),
        job_type: "config_backup".into(),
        is_enabled: true,
        schedule: ScheduleParams::Cron {
            expression: "0 */6 * * *".into(),
        },
        parameters: json!({"dry_run": true}),
        status: JobStatus::Pending,
        is_system: false,
        tags: vec!["site:oslo".into()],
        approval_id: None,
        created_at: Utc::now(),
    };

    let serialized = serde_json::to_string_pretty(&job).expect("serialize job");
    let restored: Job = serde_json::from_str(&serialized).expect("deserialize job");
    assert_eq!(restored.name, "Config Push");
    assert_eq!(restored.parameters, json!({"dry_run": true}));
    assert_eq!(restored.schedule.kind(), ScheduleKind::Cron);
}

#[test]
fn device_tags_round_trip_through_yaml() {
    let device = Device {
        id: 42,
        hostname: "edge-j1".into(),
        ip_address: "10.0.0.2".parse().unwrap(),
        device_type: DeviceType::JuniperJunos,
        port: 22,
        description: None,
        serial_number: None,
        model: None,
        source: None,
        notes: None,
        last_updated: None,
        updated_by: None,
        created_at: Utc::now(),
        tags: vec!["site:oslo".into(), "role:edge".into()],
    };

    let yaml = serde_yaml::to_string(&device).expect("serialize device");
    let loaded: Device = serde_yaml::from_str(&yaml).expect("deserialize device");
    assert_eq!(loaded.hostname, "edge-j1");
    assert!(loaded.has_tag("role:edge"));
}
