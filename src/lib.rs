//! # mbus-master - Master-Side Session Orchestration for M-Bus Networks
//!
//! The mbus-master crate manages the lifecycle of one logical connection to an M-Bus
//! (Meter-Bus) network reachable over TCP or a serial line. It serializes the
//! command/response exchanges of an application against that connection and turns
//! the raw telemetry of the link driver into structured records.
//!
//! ## Features
//!
//! - Idempotent connect over TCP or serial, chosen from the configuration shape
//! - Auto-connect on demand before `get_data`, `scan_secondary` and `set_primary_id`
//! - Graceful close that waits for the command in flight, with cancellation
//! - Normalization of the driver's XML readings (numeric coercion, attribute
//!   merging, `DataRecord` always a list)
//! - Parsing of secondary address scan results with typed error classification
//!
//! The link driver (framing, checksums, baud rates, the physical scan) is consumed
//! through the [`LinkDriver`] trait. [`MockLinkDriver`] implements it in memory.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mbus_master::{ConnectionConfig, MBusMaster, MockLinkDriver};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), mbus_master::MBusError> {
//! let config = ConnectionConfig::serial("/dev/ttyUSB0", 2400).with_auto_connect(true);
//! let master = MBusMaster::new(Arc::new(MockLinkDriver::new()), config);
//!
//! let reading = master.get_data(1u8).await?;
//! let slaves = master.scan_secondary().await?;
//! master.close().await?;
//! # let _ = (reading, slaves);
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod config;
pub mod constants;
pub mod driver;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod session;

pub use crate::error::{DriverError, MBusError};
pub use crate::logging::{init_logger, init_logger_with_level};

pub use address::{MBusAddress, SecondaryAddress};
pub use config::{ConnectionConfig, MasterOptions, SessionSettings, Transport};
pub use driver::{LinkDriver, LinkState, MockLinkDriver};
pub use normalize::{MBusResponse, NormalizedReading, SecondaryAddressList};
pub use session::{MBusMaster, PendingClose};

/// Cancellation handle accepted by [`PendingClose::with_cancellation`]
pub use tokio_util::sync::CancellationToken;
