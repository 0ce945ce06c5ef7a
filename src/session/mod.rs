//! # M-Bus Master Session
//!
//! This module provides the MBusMaster struct, the single entry point for talking
//! to one M-Bus network through a link driver.
//!
//! Every command first checks whether it may run: on a closed link with
//! auto-connect disabled it fails at once. Otherwise the link is connected if
//! needed, the command is handed to the driver, and the driver's raw payload is
//! normalized before it is returned.
//!
//! The master holds no lock across driver calls. Two commands issued at the
//! same time both see the driver flags as they were at dispatch; keeping the
//! bus free of overlapping commands is left to the caller and the driver.

pub mod close;
pub mod connection;

pub use close::{GracefulCloser, PendingClose};
pub use connection::ConnectionManager;

use crate::address::{validate_new_primary, MBusAddress};
use crate::config::{ConnectionConfig, MasterOptions, SessionSettings};
use crate::driver::{LinkDriver, LinkState};
use crate::error::{DriverError, MBusError};
use crate::normalize::{normalize_reading, parse_scan_result, MBusResponse, SecondaryAddressList};
use log::{debug, info, warn};
use std::sync::Arc;

/// Master side of one M-Bus network
pub struct MBusMaster<D: LinkDriver + ?Sized> {
    driver: Arc<D>,
    connection: ConnectionManager<D>,
    closer: GracefulCloser<D>,
    settings: SessionSettings,
}

impl<D: LinkDriver + ?Sized> MBusMaster<D> {
    pub fn new(driver: Arc<D>, config: ConnectionConfig) -> Self {
        Self::with_settings(driver, config, SessionSettings::default())
    }

    pub fn with_settings(driver: Arc<D>, config: ConnectionConfig, settings: SessionSettings) -> Self {
        MBusMaster {
            connection: ConnectionManager::new(Arc::clone(&driver), config),
            closer: GracefulCloser::new(Arc::clone(&driver)),
            driver,
            settings,
        }
    }

    pub fn from_options(driver: Arc<D>, options: MasterOptions) -> Self {
        Self::new(driver, ConnectionConfig::from(options))
    }

    pub fn driver(&self) -> &Arc<D> {
        &self.driver
    }

    pub fn config(&self) -> &ConnectionConfig {
        self.connection.config()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Current link state, read from the driver.
    pub fn link_state(&self) -> LinkState {
        LinkState::observe(&*self.driver)
    }

    pub fn is_connected(&self) -> bool {
        self.driver.connected()
    }

    /// Open the configured transport; a no-op on an idle open link.
    pub async fn connect(&self) -> Result<(), MBusError> {
        self.connection.connect().await
    }

    /// Close the link, waiting as long as needed for the command in flight.
    pub async fn close(&self) -> Result<(), MBusError> {
        let request = PendingClose::wait().with_poll_interval(self.settings.close_poll_interval);
        self.closer.close(&request).await
    }

    /// Close the link, failing with `CloseWhileBusy` if a command is in flight.
    pub async fn try_close(&self) -> Result<(), MBusError> {
        self.closer.close(&PendingClose::fail_fast()).await
    }

    /// Close request for a caller, using the configured poll interval.
    ///
    /// See [`PendingClose::for_caller`] for how `notify` and `wait` combine.
    pub fn pending_close(&self, notify: bool, wait: Option<bool>) -> PendingClose {
        PendingClose::for_caller(notify, wait).with_poll_interval(self.settings.close_poll_interval)
    }

    /// Close the link with explicit wait, interval and cancellation settings.
    ///
    /// The request is used as given; build it with [`MBusMaster::pending_close`]
    /// to pick up the session's poll interval.
    pub async fn close_with(&self, request: &PendingClose) -> Result<(), MBusError> {
        self.closer.close(request).await
    }

    /// Read a slave, collecting at most the configured number of telegrams.
    pub async fn get_data(&self, address: impl Into<MBusAddress>) -> Result<MBusResponse, MBusError> {
        self.get_data_with_max_frames(address, self.settings.max_frames)
            .await
    }

    /// Read a slave, collecting at most `max_frames` telegrams.
    pub async fn get_data_with_max_frames(
        &self,
        address: impl Into<MBusAddress>,
        max_frames: u32,
    ) -> Result<MBusResponse, MBusError> {
        let address = address.into();
        self.ensure_connected().await?;

        debug!("Requesting data from slave [{address}], max {max_frames} frames");
        let raw = self
            .driver
            .get(&address, max_frames)
            .await
            .map_err(|e| driver_failure("get", e))?;

        if raw.is_empty() {
            return Err(driver_failure(
                "get",
                DriverError::new(format!("empty response from slave [{address}]")),
            ));
        }

        normalize_reading(&raw).map_err(|e| {
            warn!("Response of slave [{address}] not usable: {e}");
            e
        })
    }

    /// Scan the bus for secondary addresses.
    pub async fn scan_secondary(&self) -> Result<SecondaryAddressList, MBusError> {
        self.ensure_connected().await?;

        let raw = self
            .driver
            .scan()
            .await
            .map_err(|e| driver_failure("scan", e))?;

        let addresses = parse_scan_result(&raw).map_err(|e| {
            warn!("Scan result not usable: {e}");
            e
        })?;
        info!("Secondary scan found {} slaves", addresses.len());
        Ok(addresses)
    }

    /// Assign `new_address` as primary address of the slave at `old_address`.
    pub async fn set_primary_id(
        &self,
        old_address: impl Into<MBusAddress>,
        new_address: u8,
    ) -> Result<(), MBusError> {
        let old_address = old_address.into();
        let new_address = validate_new_primary(new_address)?;
        self.ensure_connected().await?;

        self.driver
            .set_primary_id(&old_address, new_address)
            .await
            .map_err(|e| driver_failure("setPrimaryId", e))?;
        info!("Primary address of slave [{old_address}] set to {new_address}");
        Ok(())
    }

    /// Connection guard shared by all commands.
    async fn ensure_connected(&self) -> Result<(), MBusError> {
        if !self.driver.connected() && !self.connection.config().auto_connect() {
            return Err(MBusError::NotConnectedAutoConnectDisabled);
        }
        self.connection.connect().await
    }
}

fn driver_failure(command: &str, error: DriverError) -> MBusError {
    warn!("Driver {command} failed: {error}");
    MBusError::DriverReportedFailure(error)
}
