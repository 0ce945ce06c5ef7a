//! The driver module defines the seam between the orchestration layer and the
//! link driver, the protocol engine that owns framing, checksums, baud rates and
//! the physical secondary-address scan.

pub mod mock;

use crate::address::MBusAddress;
use crate::error::DriverError;
use async_trait::async_trait;

pub use mock::MockLinkDriver;

/// Capability surface of a link driver.
///
/// The driver owns the `connected` and `communication_in_progress` flags. The
/// orchestrator only reads them and never keeps a copy.
#[async_trait]
pub trait LinkDriver: Send + Sync {
    /// Open a TCP link. A timeout of `0.0` seconds leaves the driver default.
    async fn open_tcp(&self, host: &str, port: u16, timeout_secs: f64) -> bool;

    /// Open a serial link. A baud rate of `0` leaves the driver default.
    async fn open_serial(&self, port: &str, baud_rate: u32) -> bool;

    /// Close the link.
    async fn close(&self) -> bool;

    /// Request data from a slave and return the driver's XML rendering of the
    /// collected telegrams, at most `max_frames` of them.
    async fn get(&self, address: &MBusAddress, max_frames: u32) -> Result<String, DriverError>;

    /// Run a secondary address scan and return the result as JSON text.
    async fn scan(&self) -> Result<String, DriverError>;

    /// Assign a new primary address to the slave reached through `old_address`.
    async fn set_primary_id(&self, old_address: &MBusAddress, new_address: u8) -> Result<(), DriverError>;

    fn connected(&self) -> bool;

    fn communication_in_progress(&self) -> bool;
}

/// State of the link as seen at one decision point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
    Busy,
}

impl LinkState {
    /// Derive the state from the driver flags. Called afresh at every decision.
    pub fn observe<D: LinkDriver + ?Sized>(driver: &D) -> Self {
        match (driver.connected(), driver.communication_in_progress()) {
            (false, _) => LinkState::Disconnected,
            (true, true) => LinkState::Busy,
            (true, false) => LinkState::Connected,
        }
    }

    pub fn is_connected(self) -> bool {
        self != LinkState::Disconnected
    }
}
