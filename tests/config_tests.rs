//! Tests for loading master options and deriving the connection configuration.

use mbus_master::{ConnectionConfig, MBusError, MBusMaster, MasterOptions, MockLinkDriver, Transport};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

fn options_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_tcp_options_from_file() {
    let file = options_file(
        r#"{"host": "192.168.107.25", "port": 10001, "timeout": 2000, "autoConnect": true}"#,
    );
    let options = MasterOptions::from_json_file(file.path()).unwrap();
    let config = ConnectionConfig::from(options);

    assert!(config.auto_connect());
    assert_eq!(
        config.transport(),
        Some(&Transport::Tcp {
            host: "192.168.107.25".to_string(),
            port: 10001,
            timeout: Duration::from_secs(2),
        })
    );
}

#[test]
fn test_serial_options_from_file() {
    let file = options_file(r#"{"serialPort": "/dev/ttyUSB0", "serialBaudRate": 9600}"#);
    let config = ConnectionConfig::from(MasterOptions::from_json_file(file.path()).unwrap());

    assert!(!config.auto_connect());
    assert_eq!(
        config.transport().map(ToString::to_string).as_deref(),
        Some("MBus Serial port /dev/ttyUSB0")
    );
}

#[test]
fn test_tcp_preferred_over_serial() {
    let options = MasterOptions::from_json_str(
        r#"{"host": "gw", "port": 5000, "serialPort": "COM3"}"#,
    )
    .unwrap();
    assert!(matches!(
        ConnectionConfig::from(options).transport(),
        Some(Transport::Tcp { .. })
    ));
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = MasterOptions::from_json_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, MBusError::Config(_)));
}

#[test]
fn test_malformed_file_is_config_error() {
    let file = options_file(r#"{"port": "not a number"}"#);
    assert!(matches!(
        MasterOptions::from_json_file(file.path()),
        Err(MBusError::Config(_))
    ));
}

#[tokio::test]
async fn test_master_without_transport_cannot_connect() {
    let driver = MockLinkDriver::new();
    let master = MBusMaster::from_options(Arc::new(driver.clone()), MasterOptions::default());

    assert!(matches!(
        master.connect().await,
        Err(MBusError::NoValidConnectionParameters)
    ));
    assert_eq!(driver.open_calls(), 0);
}
