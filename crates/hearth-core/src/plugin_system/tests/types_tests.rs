use crate::plugin_system::traits::PluginKind;
use crate::plugin_system::types::{PluginMetadata, PluginRecord};

fn record(name: &str, kind: PluginKind) -> PluginRecord {
    PluginRecord::new(
        PluginMetadata::new(name, "1.0.0", "test plugin", "tests", kind),
        None,
    )
}

#[test]
fn test_new_record_defaults() {
    let record = record("alpha", PluginKind::DynamicPlatform);

    assert!(record.enabled);
    assert!(!record.loaded);
    assert!(!record.started);
    assert!(!record.configured);
    assert!(!record.error);
    assert!(!record.locked);
    assert!(!record.paired);
    assert!(!record.connected);
    assert_eq!(record.registered_devices, None);
    assert_eq!(record.added_devices, None);
    assert_eq!(record.path, None);
    assert!(!record.is_ready());
}

#[test]
fn test_counters_exist_only_while_loaded() {
    let mut record = record("alpha", PluginKind::DynamicPlatform);

    // Before load the counters do not exist, so moves are no-ops.
    record.inc_registered();
    record.inc_added();
    assert_eq!(record.registered_devices, None);
    assert_eq!(record.added_devices, None);

    record.mark_loaded();
    assert_eq!(record.registered_devices, Some(0));
    assert_eq!(record.added_devices, Some(0));

    record.inc_registered();
    record.inc_registered();
    record.inc_added();
    assert_eq!(record.registered_devices, Some(2));
    assert_eq!(record.added_devices, Some(1));

    record.dec_registered();
    record.dec_added();
    record.dec_added();
    record.dec_added();
    assert_eq!(record.registered_devices, Some(1));
    // Decrement saturates at zero instead of wrapping.
    assert_eq!(record.added_devices, Some(0));
}

#[test]
fn test_lifecycle_flags_and_readiness() {
    let mut record = record("alpha", PluginKind::AccessoryPlatform);

    record.mark_loaded();
    assert!(!record.is_ready());

    record.mark_started();
    assert!(record.is_ready());

    record.mark_configured();
    assert!(record.loaded && record.started && record.configured);

    record.mark_error();
    assert!(record.error);
    // The error flag does not retract progress already made.
    assert!(record.is_ready());
}

#[test]
fn test_restore_resets_run_state_keeps_durable_fields() {
    let mut record = record("alpha", PluginKind::DynamicPlatform);
    record.enabled = false;
    record.mark_loaded();
    record.mark_started();
    record.mark_configured();
    record.mark_error();
    record.locked = true;
    record.paired = true;
    record.connected = true;
    record.inc_registered();
    record.qr_pairing_code = Some("MT:TEST".to_string());
    record.manual_pairing_code = Some("34970112332".to_string());
    record.latest_version = Some("2.0.0".to_string());

    record.restore();

    assert!(!record.loaded);
    assert!(!record.started);
    assert!(!record.configured);
    assert!(!record.error);
    assert!(!record.locked);
    assert!(!record.paired);
    assert!(!record.connected);
    assert_eq!(record.registered_devices, None);
    assert_eq!(record.added_devices, None);
    assert!(record.fabrics.is_empty());
    assert!(record.sessions.is_empty());

    // The operator's toggle and everything tied to the persisted identity
    // survive a restart.
    assert!(!record.enabled);
    assert_eq!(record.qr_pairing_code.as_deref(), Some("MT:TEST"));
    assert_eq!(record.manual_pairing_code.as_deref(), Some("34970112332"));
    assert_eq!(record.latest_version.as_deref(), Some("2.0.0"));
}

#[test]
fn test_record_deserializes_with_missing_optional_fields() {
    // A snapshot written by an older build carries only the core fields.
    let raw = r#"{"name":"alpha","version":"0.9.0","kind":"DynamicPlatform"}"#;
    let record: PluginRecord = serde_json::from_str(raw).expect("record should parse");

    assert_eq!(record.name, "alpha");
    assert_eq!(record.kind, PluginKind::DynamicPlatform);
    // Absent `enabled` means enabled, not disabled.
    assert!(record.enabled);
    assert!(!record.loaded);
    assert_eq!(record.registered_devices, None);
    assert_eq!(record.latest_version, None);
}
