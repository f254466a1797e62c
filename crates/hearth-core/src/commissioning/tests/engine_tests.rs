use crate::commissioning::engine::{InMemoryEngine, ProtocolEngine};
use crate::commissioning::error::CommissioningError;
use crate::commissioning::identity::{CommissioningIdentity, FabricSummary};
use crate::device::types::{BasicInformation, BridgedDevice};
use crate::kernel::error::{Error, Result};

fn identity(name: &str) -> CommissioningIdentity {
    CommissioningIdentity {
        device_name: name.to_string(),
        device_type: 0x000e,
        vendor_id: 0xfff1,
        vendor_name: "Hearth".to_string(),
        product_id: 0x8000,
        product_name: "Hearth Bridge".to_string(),
        serial_number: format!("0xserial-{name}"),
        unique_id: format!("unique-{name}"),
        software_version: 1,
        software_version_string: "1.0.0".to_string(),
        hardware_version: 1,
        hardware_version_string: "1.0".to_string(),
    }
}

fn device(name: &str) -> BridgedDevice {
    BridgedDevice::new(
        name,
        0x0100,
        BasicInformation {
            vendor_id: 0x1234,
            vendor_name: "Vendor".to_string(),
            product_id: 0x0001,
            product_name: name.to_string(),
            serial_number: format!("SN-{name}"),
            unique_id: format!("U-{name}"),
            software_version: 1,
            software_version_string: "1.0.0".to_string(),
            hardware_version: 1,
            hardware_version_string: "1.0".to_string(),
        },
    )
}

#[tokio::test]
async fn test_server_aggregator_attach_detach() -> Result<()> {
    let engine = InMemoryEngine::new();

    let server = engine.create_server("root", &identity("Hearth Bridge")).await?;
    assert_eq!(server.key, "root");
    assert_eq!(engine.server_count(), 1);

    let aggregator = engine.create_aggregator(&server, "Hearth Aggregator").await?;
    assert_eq!(engine.aggregator_count(&server), 1);

    let lamp = engine
        .attach_to_aggregator(&server, aggregator, &device("Lamp"))
        .await?;
    let plug = engine
        .attach_to_aggregator(&server, aggregator, &device("Plug"))
        .await?;
    assert_ne!(lamp, plug);
    assert_eq!(engine.endpoint_count(&server), 2);

    engine.detach(&server, lamp).await?;
    assert_eq!(engine.endpoint_count(&server), 1);

    Ok(())
}

#[tokio::test]
async fn test_attach_to_missing_aggregator_fails() -> Result<()> {
    let engine = InMemoryEngine::new();
    let server = engine.create_server("root", &identity("Hearth Bridge")).await?;

    let bogus = crate::commissioning::engine::EndpointId(99);
    let result = engine.attach_to_aggregator(&server, bogus, &device("Lamp")).await;

    match result {
        Err(Error::Commissioning(CommissioningError::Engine { operation, .. })) => {
            assert_eq!(operation, "attach_to_aggregator");
        }
        other => panic!("Expected engine error, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn test_unknown_server_is_rejected() {
    let engine = InMemoryEngine::new();
    let ghost = crate::commissioning::engine::ServerHandle {
        id: 42,
        key: "ghost".to_string(),
    };

    match engine.start_server(&ghost).await {
        Err(Error::Commissioning(CommissioningError::UnknownServer(key))) => {
            assert_eq!(key, "ghost");
        }
        other => panic!("Expected UnknownServer, got {:?}", other),
    }
}

#[tokio::test]
async fn test_pairing_codes_until_commissioned() -> Result<()> {
    let engine = InMemoryEngine::new();
    let server = engine.create_server("root", &identity("Hearth Bridge")).await?;
    engine.start_server(&server).await?;
    assert!(engine.is_started(&server));

    let codes = engine.pairing_codes(&server).await?.expect("window open");
    assert!(codes.qr_pairing_code.starts_with("MT:"));

    engine.commission(
        &server,
        vec![FabricSummary {
            fabric_index: 1,
            fabric_id: 0x1111,
            node_id: 0x2222,
            root_vendor_id: 0x10e1,
            label: "Home".to_string(),
        }],
        vec![],
    );

    assert_eq!(engine.pairing_codes(&server).await?, None);
    let fabrics = engine.fabrics(&server).await?;
    assert_eq!(fabrics.len(), 1);
    assert_eq!(fabrics[0].label, "Home");

    Ok(())
}

#[tokio::test]
async fn test_close_all_forgets_servers() -> Result<()> {
    let engine = InMemoryEngine::new();
    let server = engine.create_server("root", &identity("Hearth Bridge")).await?;

    engine.close_all().await?;
    assert_eq!(engine.server_count(), 0);
    assert!(engine.start_server(&server).await.is_err());

    let operations = engine.operations();
    assert_eq!(operations.first().map(String::as_str), Some("create_server:root"));
    assert_eq!(operations.last().map(String::as_str), Some("close_all"));

    Ok(())
}
