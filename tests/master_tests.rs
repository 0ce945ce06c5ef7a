//! Integration tests for the M-Bus master session against the mock link driver.
//!
//! These tests exercise connect, close and the three bus commands end to end,
//! from the public API through the connection guard down to the driver flags.

use mbus_master::driver::mock::{DriverCall, MockLinkDriver};
use mbus_master::{
    CancellationToken, ConnectionConfig, DriverError, LinkState, MBusAddress, MBusError, MBusMaster,
    MBusResponse, PendingClose, SessionSettings,
};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_test::{assert_err, assert_ok};

const POLL: Duration = Duration::from_millis(10);

fn tcp_master(driver: &MockLinkDriver, auto_connect: bool) -> MBusMaster<MockLinkDriver> {
    MBusMaster::with_settings(
        Arc::new(driver.clone()),
        ConnectionConfig::tcp("127.0.0.1", 10001).with_auto_connect(auto_connect),
        SessionSettings {
            close_poll_interval: POLL,
            ..SessionSettings::default()
        },
    )
}

#[tokio::test]
async fn test_connect_is_idempotent_on_idle_link() {
    let driver = MockLinkDriver::connected();
    let master = tcp_master(&driver, false);

    assert_ok!(master.connect().await);
    assert_ok!(master.connect().await);
    assert_eq!(driver.open_calls(), 0);
}

#[tokio::test]
async fn test_connect_on_busy_link_never_opens() {
    let driver = MockLinkDriver::connected();
    driver.set_busy(true);
    let master = tcp_master(&driver, true);

    let err = assert_err!(master.connect().await);
    assert!(matches!(err, MBusError::CommunicationInProgress));
    assert_eq!(driver.open_calls(), 0);
    assert_eq!(master.link_state(), LinkState::Busy);
}

#[tokio::test]
async fn test_connect_failure_reports_tcp_target() {
    let driver = MockLinkDriver::new();
    driver.set_open_succeeds(false);
    let master = tcp_master(&driver, false);

    let err = assert_err!(master.connect().await);
    assert_eq!(
        err.to_string(),
        "No connection possible to MBus Host 127.0.0.1:10001"
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_waiting_close_closes_after_link_goes_idle() {
    let driver = MockLinkDriver::connected();
    driver.set_busy(true);
    let master = tcp_master(&driver, false);

    let releaser = driver.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        releaser.set_busy(false);
    });

    let started = Instant::now();
    assert_ok!(master.close().await);
    assert!(started.elapsed() >= Duration::from_millis(60));
    // The mock refuses to close while busy, so one successful call proves the order.
    assert_eq!(driver.close_calls(), 1);
    assert!(!master.is_connected());
}

#[tokio::test]
async fn test_fail_fast_close_on_busy_link() {
    let driver = MockLinkDriver::connected();
    driver.set_busy(true);
    let master = tcp_master(&driver, false);

    let err = assert_err!(master.try_close().await);
    assert!(matches!(err, MBusError::CloseWhileBusy));
    assert_eq!(driver.close_calls(), 0);
    assert!(master.is_connected());
}

#[tokio::test]
async fn test_waiting_close_can_be_cancelled() {
    let driver = MockLinkDriver::connected();
    driver.set_busy(true);
    let master = tcp_master(&driver, false);

    let cancel = CancellationToken::new();
    let request = PendingClose::wait()
        .with_poll_interval(POLL)
        .with_cancellation(cancel.clone());

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(40)).await;
        canceller.cancel();
    });

    let err = assert_err!(master.close_with(&request).await);
    assert!(matches!(err, MBusError::CloseCancelled));
    assert_eq!(driver.close_calls(), 0);
}

#[tokio::test]
async fn test_close_for_caller_without_continuation_fails_fast() {
    let driver = MockLinkDriver::connected();
    driver.set_busy(true);
    let master = tcp_master(&driver, false);

    let request = PendingClose::for_caller(false, None);
    assert!(matches!(
        master.close_with(&request).await,
        Err(MBusError::CloseWhileBusy)
    ));
}

#[tokio::test]
async fn test_close_waits_for_command_in_flight() {
    let driver = MockLinkDriver::connected();
    driver.set_latency(Duration::from_millis(80));
    driver.queue_get_response(Ok(
        "<MBusData><DataRecord><Value>7</Value></DataRecord></MBusData>".to_string(),
    ));
    let master = Arc::new(tcp_master(&driver, false));

    let reader = Arc::clone(&master);
    let read = tokio::spawn(async move { reader.get_data(5u8).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(master.link_state(), LinkState::Busy);
    assert_ok!(master.close().await);

    let response = assert_ok!(read.await.unwrap());
    assert_eq!(
        response.reading().unwrap().data_records,
        vec![json!({"Value": 7})]
    );
    assert_eq!(driver.close_calls(), 1);
    assert_eq!(master.link_state(), LinkState::Disconnected);
}

#[tokio::test]
async fn test_get_data_without_auto_connect_fails_fast() {
    let driver = MockLinkDriver::new();
    let master = tcp_master(&driver, false);

    let err = assert_err!(master.get_data(1u8).await);
    assert!(matches!(err, MBusError::NotConnectedAutoConnectDisabled));
    assert_eq!(err.to_string(), "Not connected and autoConnect is false");
    assert!(driver.recorded_calls().is_empty());
}

#[tokio::test]
async fn test_scan_and_set_primary_share_the_guard() {
    let driver = MockLinkDriver::new();
    let master = tcp_master(&driver, false);

    assert!(matches!(
        master.scan_secondary().await,
        Err(MBusError::NotConnectedAutoConnectDisabled)
    ));
    assert!(matches!(
        master.set_primary_id(1u8, 5).await,
        Err(MBusError::NotConnectedAutoConnectDisabled)
    ));
    assert!(driver.recorded_calls().is_empty());
}

#[tokio::test]
async fn test_get_data_normalizes_single_record() {
    let driver = MockLinkDriver::connected();
    driver.queue_get_response(Ok(
        "<MBusData><DataRecord><Value>12</Value></DataRecord></MBusData>".to_string(),
    ));
    let master = tcp_master(&driver, false);

    let response = assert_ok!(master.get_data(1u8).await);
    let reading = response.into_reading().expect("MBusData reading");
    assert_eq!(reading.data_records, vec![json!({"Value": 12})]);
}

#[tokio::test]
async fn test_get_data_honours_max_frames_and_secondary_address() {
    let driver = MockLinkDriver::connected();
    driver.queue_get_response(Ok("<MBusData/>".to_string()));
    let master = tcp_master(&driver, false);

    let address: MBusAddress = "1234567834240107".parse().unwrap();
    let response = assert_ok!(master.get_data_with_max_frames(address.clone(), 4).await);
    assert_eq!(response, MBusResponse::Passthrough(json!({"MBusData": ""})));
    assert_eq!(
        driver.recorded_calls(),
        vec![DriverCall::Get {
            address,
            max_frames: 4
        }]
    );
}

#[tokio::test]
async fn test_get_data_reports_driver_failure() {
    let driver = MockLinkDriver::connected();
    driver.queue_get_response(Err(DriverError::new("Failed to init slaves.")));
    let master = tcp_master(&driver, false);

    let err = assert_err!(master.get_data(1u8).await);
    assert_eq!(err.to_string(), "Driver error: Failed to init slaves.");
}

#[tokio::test]
async fn test_get_data_reports_malformed_xml() {
    let driver = MockLinkDriver::connected();
    driver.queue_get_response(Ok("<MBusData><DataRecord>".to_string()));
    let master = tcp_master(&driver, false);

    assert!(matches!(
        master.get_data(1u8).await,
        Err(MBusError::XmlParseFailure(_))
    ));
}

#[tokio::test]
async fn test_get_data_rejects_deeply_nested_payload() {
    let levels = 20_000;
    let driver = MockLinkDriver::connected();
    driver.queue_get_response(Ok(format!(
        "<MBusData>{}1{}</MBusData>",
        "<a>".repeat(levels),
        "</a>".repeat(levels)
    )));
    let master = tcp_master(&driver, false);

    let err = assert_err!(master.get_data(1u8).await);
    assert!(err.to_string().contains("nesting deeper than"), "{err}");
}

#[tokio::test]
async fn test_pending_close_waits_with_session_interval() {
    let driver = MockLinkDriver::connected();
    driver.set_busy(true);
    let master = tcp_master(&driver, false);

    let request = master.pending_close(true, None);
    assert_eq!(request.poll_interval(), POLL);

    let releaser = driver.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        releaser.set_busy(false);
    });

    assert_ok!(master.close_with(&request).await);
    assert_eq!(driver.close_calls(), 1);
}

#[tokio::test]
async fn test_auto_connect_failure_skips_command() {
    let driver = MockLinkDriver::new();
    driver.set_open_succeeds(false);
    let master = tcp_master(&driver, true);

    assert!(matches!(
        master.get_data(1u8).await,
        Err(MBusError::NoConnectionPossible(_))
    ));
    assert_eq!(driver.open_calls(), 1);
    assert_eq!(driver.get_calls(), 0);
}

#[tokio::test]
async fn test_command_on_busy_link_is_rejected_by_connect() {
    let driver = MockLinkDriver::connected();
    driver.set_busy(true);
    let master = tcp_master(&driver, true);

    assert!(matches!(
        master.scan_secondary().await,
        Err(MBusError::CommunicationInProgress)
    ));
    assert_eq!(driver.scan_calls(), 0);
}

#[tokio::test]
async fn test_scan_with_empty_payload_is_empty_list() {
    let driver = MockLinkDriver::connected();
    driver.queue_scan_response(Ok(String::new()));
    let master = tcp_master(&driver, false);

    let list = assert_ok!(master.scan_secondary().await);
    assert!(list.is_empty());
}

#[tokio::test]
async fn test_scan_with_invalid_json_keeps_text() {
    let driver = MockLinkDriver::connected();
    driver.queue_scan_response(Ok("{invalid".to_string()));
    let master = tcp_master(&driver, false);

    let err = assert_err!(master.scan_secondary().await);
    assert!(matches!(err, MBusError::JsonParseFailure { .. }));
    assert_eq!(err.offending_text(), Some("{invalid"));
}

#[tokio::test]
async fn test_scan_driver_error_takes_precedence() {
    let driver = MockLinkDriver::connected();
    driver.queue_scan_response(Err(DriverError::new("Failed to probe secondary address")));
    let master = tcp_master(&driver, false);

    let err = assert_err!(master.scan_secondary().await);
    assert!(matches!(err, MBusError::DriverReportedFailure(_)));
}

#[tokio::test]
async fn test_scan_auto_connects_and_lists_addresses() {
    let driver = MockLinkDriver::new();
    driver.queue_scan_response(Ok(r#"["1234567834240107","0000000124401104"]"#.to_string()));
    let master = tcp_master(&driver, true);

    let list = assert_ok!(master.scan_secondary().await);
    let ids: Vec<&str> = list.iter().map(|a| a.identification()).collect();
    assert_eq!(ids, vec!["12345678", "00000001"]);
    assert_eq!(driver.open_calls(), 1);
}

#[tokio::test]
async fn test_set_primary_id_success_and_failure() {
    let driver = MockLinkDriver::connected();
    driver.queue_set_primary_response(Ok(()));
    driver.queue_set_primary_response(Err(DriverError::new("No reply from device")));
    let master = tcp_master(&driver, false);

    assert_ok!(master.set_primary_id(1u8, 5).await);
    let err = assert_err!(master.set_primary_id(1u8, 5).await);
    assert!(matches!(err, MBusError::DriverReportedFailure(_)));

    assert_eq!(
        driver.recorded_calls()[0],
        DriverCall::SetPrimaryId {
            old_address: MBusAddress::Primary(1),
            new_address: 5
        }
    );
}
