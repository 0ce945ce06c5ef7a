//! # Session Configuration
//!
//! `MasterOptions` is the loose, serde-friendly option record an application hands
//! to the master (the same option names the bus tooling has always used).
//! `ConnectionConfig` is the validated, immutable shape the orchestrator works with.

use crate::constants::{DEFAULT_CLOSE_POLL_INTERVAL, DEFAULT_MAX_FRAMES};
use crate::error::MBusError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Recognized connection options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MasterOptions {
    /// TCP host of an M-Bus gateway
    pub host: Option<String>,
    /// TCP port of an M-Bus gateway
    pub port: Option<u16>,
    /// TCP timeout in milliseconds, 0 leaves the driver default
    pub timeout: Option<u64>,
    /// Serial device, e.g. `/dev/ttyUSB0` or `COM9`
    pub serial_port: Option<String>,
    /// Serial baud rate, 0 leaves the driver default
    pub serial_baud_rate: Option<u32>,
    /// Connect transparently before commands on a closed link
    pub auto_connect: bool,
}

impl MasterOptions {
    /// Parse options from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, MBusError> {
        serde_json::from_str(json).map_err(|e| MBusError::Config(e.to_string()))
    }

    /// Read options from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, MBusError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MBusError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }
}

/// The physical transport used to reach the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Tcp {
        host: String,
        port: u16,
        /// Zero means "driver default"
        timeout: Duration,
    },
    Serial {
        port: String,
        /// Zero means "driver default"
        baud_rate: u32,
    },
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Tcp { host, port, .. } => write!(f, "MBus Host {host}:{port}"),
            Transport::Serial { port, .. } => write!(f, "MBus Serial port {port}"),
        }
    }
}

/// Immutable connection configuration owned by the master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    transport: Option<Transport>,
    auto_connect: bool,
}

impl ConnectionConfig {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        ConnectionConfig {
            transport: Some(Transport::Tcp {
                host: host.into(),
                port,
                timeout: Duration::ZERO,
            }),
            auto_connect: false,
        }
    }

    pub fn serial(port: impl Into<String>, baud_rate: u32) -> Self {
        ConnectionConfig {
            transport: Some(Transport::Serial {
                port: port.into(),
                baud_rate,
            }),
            auto_connect: false,
        }
    }

    /// A configuration without any transport; connecting always fails.
    pub fn unconfigured() -> Self {
        ConnectionConfig {
            transport: None,
            auto_connect: false,
        }
    }

    /// Sets the TCP timeout. Has no effect on serial transports.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if let Some(Transport::Tcp { timeout: t, .. }) = &mut self.transport {
            *t = timeout;
        }
        self
    }

    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    pub fn transport(&self) -> Option<&Transport> {
        self.transport.as_ref()
    }

    pub fn auto_connect(&self) -> bool {
        self.auto_connect
    }
}

impl From<MasterOptions> for ConnectionConfig {
    /// TCP wins when both host and port are given, serial is used otherwise.
    fn from(options: MasterOptions) -> Self {
        let tcp = match (options.host, options.port) {
            (Some(host), Some(port)) if !host.is_empty() && port != 0 => Some(Transport::Tcp {
                host,
                port,
                timeout: Duration::from_millis(options.timeout.unwrap_or(0)),
            }),
            _ => None,
        };
        let transport = tcp.or_else(|| {
            options
                .serial_port
                .filter(|port| !port.is_empty())
                .map(|port| Transport::Serial {
                    port,
                    baud_rate: options.serial_baud_rate.unwrap_or(0),
                })
        });

        ConnectionConfig {
            transport,
            auto_connect: options.auto_connect,
        }
    }
}

/// Tunables of the orchestration layer itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Delay between busy checks of a waiting close
    pub close_poll_interval: Duration,
    /// Telegram limit used by `get_data`
    pub max_frames: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            close_poll_interval: DEFAULT_CLOSE_POLL_INTERVAL,
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }
}
