//! M-Bus Master Constants
//!
//! This module defines the addressing limits and session defaults used by the
//! orchestration layer, based on the EN 13757 standard and the behaviour of the
//! underlying link driver.

use std::time::Duration;

/// Highest primary address that may be assigned to a slave
pub const MBUS_MAX_PRIMARY_SLAVES: u8 = 250;

/// Network layer address, used after selecting a slave by secondary address
pub const MBUS_ADDRESS_NETWORK_LAYER: u8 = 0xFD;

/// Broadcast address, all slaves reply
pub const MBUS_ADDRESS_BROADCAST_REPLY: u8 = 0xFE;

/// Broadcast address, no slave replies
pub const MBUS_ADDRESS_BROADCAST_NOREPLY: u8 = 0xFF;

/// Length of a secondary address in hex characters
pub const MBUS_SECONDARY_ADDRESS_LEN: usize = 16;

/// Default upper bound of telegrams collected for one `get` request
pub const DEFAULT_MAX_FRAMES: u32 = 16;

/// Default delay between two busy checks while waiting to close
pub const DEFAULT_CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Name of the top-level element in a driver XML payload
pub const MBUS_DATA_ELEMENT: &str = "MBusData";

/// Name of the repeated record element inside `MBusData`
pub const MBUS_DATA_RECORD_ELEMENT: &str = "DataRecord";

/// Deepest element nesting accepted in a driver XML payload
pub const MBUS_MAX_XML_DEPTH: usize = 64;

/// Key holding character data of an element that also has attributes or children
pub const XML_TEXT_KEY: &str = "_";
