//! Integration tests for dab-client
//!
//! Most tests run a reference device and a client against the in-process
//! broker. The tests marked ignored require a real MQTT broker and can be run with:
//!
//! ```sh
//! DAB_TEST_BROKER=localhost:1883 cargo test -p dab-client --test integration -- --ignored
//! ```

use dab_client::{ClientError, DabClient};
use dab_mqtt::device::{new_device, DeviceInfo, DevicePorts};
use dab_mqtt::{DabError, DabSession, HandlerError, MemoryBroker, RequestHandler, SessionConfig};
use serde_json::json;
use std::env;
use std::time::Duration;

async fn start_device(broker: &MemoryBroker) -> DabSession {
    let device = new_device(
        SessionConfig::new("tv"),
        DevicePorts::dummy(),
        &DeviceInfo::new("Acme", "Living Room TV"),
    )
    .unwrap()
    .build(broker.clone())
    .unwrap();

    device.connect("localhost", 1883).await.unwrap();
    device
}

async fn start_client(broker: &MemoryBroker) -> DabClient {
    let session = DabSession::builder(SessionConfig::new("controller"))
        .build(broker.clone())
        .unwrap();
    session.connect("localhost", 1883).await.unwrap();

    DabClient::new(session)
}

#[tokio::test]
async fn test_application_lifecycle() {
    let broker = MemoryBroker::new();
    let _device = start_device(&broker).await;
    let client = start_client(&broker).await;

    let apps = client.list_applications().await.unwrap();
    let ids: Vec<&str> = apps.applications.iter().map(|a| a.app_id.as_str()).collect();
    assert_eq!(ids, vec!["Netflix", "AmazonInstantVideo", "YouTube"]);

    client.launch("YouTube", None).await.unwrap();
    client
        .launch_with_content("Netflix", "80018499", Some(json!({"autoplay": true})))
        .await
        .unwrap();

    let state = client.get_state("YouTube").await.unwrap();
    assert_eq!(state.state, "STOPPED");

    let exit = client.exit("YouTube", true).await.unwrap();
    assert_eq!(exit.state.as_deref(), Some("STOPPED"));
}

#[tokio::test]
async fn test_system_and_input_commands() {
    let broker = MemoryBroker::new();
    let _device = start_device(&broker).await;
    let client = start_client(&broker).await;

    assert!(client.health_check().await.unwrap().healthy);
    assert_eq!(
        client.list_languages().await.unwrap().languages,
        vec!["en-GB", "en-US", "fr"]
    );
    assert_eq!(client.get_language().await.unwrap().language, "en-US");

    client.set_language("fr").await.unwrap();
    client.key_press("KEY_ENTER").await.unwrap();
    client
        .long_key_press("KEY_HOME", Duration::from_secs(2))
        .await
        .unwrap();
    client.restart().await.unwrap();
}

#[tokio::test]
async fn test_telemetry_commands() {
    let broker = MemoryBroker::new();
    let _device = start_device(&broker).await;
    let client = start_client(&broker).await;

    client
        .start_device_telemetry(Duration::from_secs(1))
        .await
        .unwrap();
    client.stop_device_telemetry().await.unwrap();
    client
        .start_app_telemetry("YouTube", Duration::from_millis(500))
        .await
        .unwrap();
    client.stop_app_telemetry("YouTube").await.unwrap();

    assert_eq!(client.session().pending_requests(), 0);
}

#[tokio::test]
async fn test_device_error_status() {
    let broker = MemoryBroker::new();
    let device = DabSession::builder(SessionConfig::new("busy-tv"))
        .handler(RequestHandler::new("dab/health-check/get", |_, _| {
            Err(HandlerError::new(503, "device is updating"))
        }))
        .build(broker.clone())
        .unwrap();
    device.connect("localhost", 1883).await.unwrap();
    let client = start_client(&broker).await;

    let err = client.health_check().await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.to_string(), "Device error 503: device is updating");
}

#[tokio::test]
async fn test_missing_parameter_reported() {
    let broker = MemoryBroker::new();
    let _device = start_device(&broker).await;
    let client = start_client(&broker).await;

    let response: serde_json::Value = client
        .session()
        .request("dab/applications/launch", &json!({}))
        .await
        .unwrap();
    assert_eq!(
        response,
        json!({"status": 400, "error": "parameter appId is mandatory"})
    );
}

#[tokio::test]
async fn test_no_device_times_out() {
    let broker = MemoryBroker::new();
    let client = start_client(&broker)
        .await
        .with_timeout(Duration::from_millis(100));

    let err = client.health_check().await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Session(DabError::RequestTimeout(ref topic)) if topic == "dab/health-check/get"
    ));
    assert_eq!(client.session().pending_requests(), 0);
}

#[tokio::test]
async fn test_client_disconnect() {
    let broker = MemoryBroker::new();
    let client = start_client(&broker).await;

    client.disconnect().await.unwrap();
    assert!(!client.session().is_connected());

    let err = client.health_check().await.unwrap_err();
    assert!(matches!(err, ClientError::Session(DabError::NotConnected)));
}

#[tokio::test]
#[ignore = "requires running MQTT broker"]
async fn test_against_real_broker() {
    let broker = env::var("DAB_TEST_BROKER").expect("DAB_TEST_BROKER must be set");
    let (host, port) = broker.split_once(':').expect("DAB_TEST_BROKER must be host:port");
    let port: u16 = port.parse().expect("invalid port");

    let device = new_device(
        SessionConfig::new("dab-client-test-device"),
        DevicePorts::dummy(),
        &DeviceInfo::new("Acme", "Integration"),
    )
    .unwrap()
    .build(dab_mqtt::MqttConnector::default())
    .unwrap();
    device.connect(host, port).await.expect("Failed to connect device");

    let client = DabClient::connect(SessionConfig::new("dab-client-test-controller"), host, port)
        .await
        .expect("Failed to connect client");

    assert!(client.health_check().await.unwrap().healthy);

    client.disconnect().await.unwrap();
    device.disconnect().await.unwrap();
}
