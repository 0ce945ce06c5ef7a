//! Idempotent connection establishment.

use crate::config::{ConnectionConfig, Transport};
use crate::driver::{LinkDriver, LinkState};
use crate::error::MBusError;
use log::{debug, info, warn};
use std::sync::Arc;

/// Opens the configured transport unless the link is already open.
pub struct ConnectionManager<D: LinkDriver + ?Sized> {
    driver: Arc<D>,
    config: ConnectionConfig,
}

impl<D: LinkDriver + ?Sized> ConnectionManager<D> {
    pub fn new(driver: Arc<D>, config: ConnectionConfig) -> Self {
        ConnectionManager { driver, config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Connect to the bus.
    ///
    /// An idle open link is left alone. A busy link is never reopened and yields
    /// `CommunicationInProgress`.
    pub async fn connect(&self) -> Result<(), MBusError> {
        match LinkState::observe(&*self.driver) {
            LinkState::Busy => {
                debug!("Connect rejected, communication in progress");
                return Err(MBusError::CommunicationInProgress);
            }
            LinkState::Connected => return Ok(()),
            LinkState::Disconnected => {}
        }

        let transport = self
            .config
            .transport()
            .ok_or(MBusError::NoValidConnectionParameters)?;

        let opened = match transport {
            Transport::Tcp {
                host,
                port,
                timeout,
            } => {
                self.driver
                    .open_tcp(host, *port, timeout.as_secs_f64())
                    .await
            }
            Transport::Serial { port, baud_rate } => {
                self.driver.open_serial(port, *baud_rate).await
            }
        };

        if opened {
            info!("Connected to {transport}");
            Ok(())
        } else {
            warn!("No connection possible to {transport}");
            Err(MBusError::NoConnectionPossible(transport.to_string()))
        }
    }
}
