use crate::event::{BridgeEvent, EventKind, EventResult};

fn shutdown() -> BridgeEvent {
    BridgeEvent::Shutdown {
        reason: "test".to_string(),
    }
}

#[test]
fn test_event_kind_matches_variant() {
    assert_eq!(shutdown().kind(), EventKind::Shutdown);
    assert_eq!(
        BridgeEvent::Restart {
            reason: "r".to_string()
        }
        .kind(),
        EventKind::Restart
    );
    assert_eq!(
        BridgeEvent::RegisterDevice {
            plugin: "p".to_string(),
            device: "d".to_string()
        }
        .kind(),
        EventKind::RegisterDevice
    );
}

#[test]
fn test_event_names_are_stable() {
    assert_eq!(shutdown().name(), "shutdown");
    assert_eq!(
        BridgeEvent::StartDynamicPlatform {
            plugin: "p".to_string(),
            reason: "r".to_string()
        }
        .name(),
        "start_dynamic_platform"
    );
}

#[test]
fn test_terminal_events() {
    assert!(shutdown().is_terminal());
    assert!(
        BridgeEvent::Update {
            reason: "u".to_string()
        }
        .is_terminal()
    );
    assert!(
        !BridgeEvent::RegisterDevice {
            plugin: "p".to_string(),
            device: "d".to_string()
        }
        .is_terminal()
    );
}

#[test]
fn test_event_result_default() {
    assert_eq!(EventResult::default(), EventResult::Continue);
}
