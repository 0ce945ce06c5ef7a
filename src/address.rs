//! Primary and Secondary Addressing (EN 13757-2 Section 5.3)
//!
//! A slave is reached either by its primary address (0-250, assigned on the bus)
//! or by its 8-byte secondary address, which the link driver exchanges as a
//! 16-character hex string: identification number (8 digits), manufacturer
//! (4), version (2) and medium (2).

use crate::constants::{
    MBUS_ADDRESS_BROADCAST_NOREPLY, MBUS_ADDRESS_BROADCAST_REPLY, MBUS_ADDRESS_NETWORK_LAYER,
    MBUS_MAX_PRIMARY_SLAVES, MBUS_SECONDARY_ADDRESS_LEN,
};
use crate::error::MBusError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Secondary address in the textual form used by the link driver
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecondaryAddress(String);

impl SecondaryAddress {
    /// Parse a 16-character hex secondary address. Case is normalized to upper.
    pub fn parse(text: &str) -> Result<Self, MBusError> {
        let text = text.trim();
        if text.len() != MBUS_SECONDARY_ADDRESS_LEN {
            return Err(MBusError::InvalidAddress(format!(
                "secondary address [{text}] is not {MBUS_SECONDARY_ADDRESS_LEN} characters long"
            )));
        }
        if !text.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(MBusError::InvalidAddress(format!(
                "secondary address [{text}] contains non-hex characters"
            )));
        }
        Ok(SecondaryAddress(text.to_ascii_uppercase()))
    }

    /// Identification number (BCD digits, `F` marks a wildcard position)
    pub fn identification(&self) -> &str {
        &self.0[0..8]
    }

    /// Manufacturer id as transmitted on the bus
    pub fn manufacturer(&self) -> u16 {
        // Validated as hex in `parse`.
        u16::from_str_radix(&self.0[8..12], 16).unwrap_or_default()
    }

    /// Three-letter manufacturer code (FLAG Association encoding)
    pub fn manufacturer_code(&self) -> String {
        manufacturer_id_to_string(self.manufacturer())
    }

    pub fn version(&self) -> u8 {
        u8::from_str_radix(&self.0[12..14], 16).unwrap_or_default()
    }

    pub fn medium(&self) -> u8 {
        u8::from_str_radix(&self.0[14..16], 16).unwrap_or_default()
    }

    /// True if the identification number contains wildcard digits
    pub fn has_wildcards(&self) -> bool {
        self.identification().contains('F')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecondaryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SecondaryAddress {
    type Err = MBusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SecondaryAddress::parse(s)
    }
}

impl TryFrom<String> for SecondaryAddress {
    type Error = MBusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SecondaryAddress::parse(&value)
    }
}

impl From<SecondaryAddress> for String {
    fn from(address: SecondaryAddress) -> Self {
        address.0
    }
}

/// Converts a manufacturer id into its 3-letter code.
pub fn manufacturer_id_to_string(id: u16) -> String {
    let c1 = ((id >> 10) & 0x1F) as u8 + b'A' - 1;
    let c2 = ((id >> 5) & 0x1F) as u8 + b'A' - 1;
    let c3 = (id & 0x1F) as u8 + b'A' - 1;

    if [c1, c2, c3].iter().all(u8::is_ascii_uppercase) {
        String::from_utf8_lossy(&[c1, c2, c3]).into_owned()
    } else {
        format!("{id:04X}")
    }
}

/// Target of a request: a primary address or a secondary address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MBusAddress {
    Primary(u8),
    Secondary(SecondaryAddress),
}

impl MBusAddress {
    pub fn is_secondary(&self) -> bool {
        matches!(self, MBusAddress::Secondary(_))
    }
}

impl From<u8> for MBusAddress {
    fn from(address: u8) -> Self {
        MBusAddress::Primary(address)
    }
}

impl From<SecondaryAddress> for MBusAddress {
    fn from(address: SecondaryAddress) -> Self {
        MBusAddress::Secondary(address)
    }
}

impl FromStr for MBusAddress {
    type Err = MBusError;

    /// 16 hex characters select a secondary address, a decimal number a primary one.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() == MBUS_SECONDARY_ADDRESS_LEN {
            return SecondaryAddress::parse(s).map(MBusAddress::Secondary);
        }
        s.parse::<u8>()
            .map(MBusAddress::Primary)
            .map_err(|_| MBusError::InvalidAddress(format!("[{s}] is neither a primary nor a secondary address")))
    }
}

impl fmt::Display for MBusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MBusAddress::Primary(address) => write!(f, "{address}"),
            MBusAddress::Secondary(address) => write!(f, "{address}"),
        }
    }
}

/// Checks that `address` can be assigned to a slave as its new primary address.
pub fn validate_new_primary(address: u8) -> Result<u8, MBusError> {
    let reason = match address {
        0..=MBUS_MAX_PRIMARY_SLAVES => return Ok(address),
        MBUS_ADDRESS_NETWORK_LAYER => "reserved for the network layer",
        MBUS_ADDRESS_BROADCAST_REPLY | MBUS_ADDRESS_BROADCAST_NOREPLY => "a broadcast address",
        _ => "reserved",
    };
    Err(MBusError::InvalidAddress(format!(
        "{address} is {reason}, assignable primary addresses are 0-{MBUS_MAX_PRIMARY_SLAVES}"
    )))
}
