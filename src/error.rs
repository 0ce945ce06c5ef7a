//! # M-Bus Master Error Handling
//!
//! This module defines the MBusError enum, which represents the different error
//! types that can occur while orchestrating an M-Bus session, and the DriverError
//! reported by link driver implementations.

use thiserror::Error;

/// An opaque failure reported by the link driver.
///
/// The driver describes its failures as text ("Failed to init slaves.", "No reply
/// from device", ...). The orchestrator never inspects the message, it only wraps it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DriverError {
    message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        DriverError {
            message: message.into(),
        }
    }

    /// The driver's own description of the failure.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for DriverError {
    fn from(message: &str) -> Self {
        DriverError::new(message)
    }
}

impl From<String> for DriverError {
    fn from(message: String) -> Self {
        DriverError::new(message)
    }
}

/// Represents the different error types that can occur in the M-Bus master.
#[derive(Debug, Error)]
pub enum MBusError {
    /// The link is open and a command is still being processed.
    #[error("Communication already in progress")]
    CommunicationInProgress,

    /// Opening the configured transport failed.
    #[error("No connection possible to {0}")]
    NoConnectionPossible(String),

    /// Neither a TCP nor a serial transport is configured.
    #[error("No valid connection parameter provided")]
    NoValidConnectionParameters,

    /// A fail-fast close found a command in flight.
    #[error("Communication still in progress")]
    CloseWhileBusy,

    /// The driver refused to close the link.
    #[error("Close unsuccessful")]
    CloseUnsuccessful,

    /// A waiting close was cancelled before the link became idle.
    #[error("Close cancelled while communication in progress")]
    CloseCancelled,

    /// A command was issued on a closed link with auto-connect disabled.
    #[error("Not connected and autoConnect is false")]
    NotConnectedAutoConnectDisabled,

    /// The driver's XML payload is not well-formed.
    #[error("XML parse error: {0}")]
    XmlParseFailure(String),

    /// The driver's scan payload could not be decoded.
    #[error("{source}: {text}")]
    JsonParseFailure {
        #[source]
        source: serde_json::Error,
        /// The payload exactly as the driver delivered it
        text: String,
    },

    /// The driver reported a failure for a command.
    #[error("Driver error: {0}")]
    DriverReportedFailure(#[from] DriverError),

    /// An address that cannot be used on the bus.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Options could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MBusError {
    /// Returns true for conditions that may clear up if the same call is repeated later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MBusError::CommunicationInProgress
                | MBusError::CloseWhileBusy
                | MBusError::NoConnectionPossible(_)
        )
    }

    /// The original payload of a failed scan, if this error carries one.
    pub fn offending_text(&self) -> Option<&str> {
        match self {
            MBusError::JsonParseFailure { text, .. } => Some(text),
            _ => None,
        }
    }
}
