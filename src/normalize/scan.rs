//! Secondary address scan results.
//!
//! The driver reports the outcome of a scan as a JSON array of secondary
//! address strings. An empty payload means no slave answered.

use crate::address::SecondaryAddress;
use crate::error::MBusError;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Secondary addresses discovered by a scan, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecondaryAddressList(Vec<SecondaryAddress>);

impl SecondaryAddressList {
    pub fn into_inner(self) -> Vec<SecondaryAddress> {
        self.0
    }
}

impl Deref for SecondaryAddressList {
    type Target = [SecondaryAddress];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for SecondaryAddressList {
    type Item = SecondaryAddress;
    type IntoIter = std::vec::IntoIter<SecondaryAddress>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Vec<SecondaryAddress>> for SecondaryAddressList {
    fn from(addresses: Vec<SecondaryAddress>) -> Self {
        SecondaryAddressList(addresses)
    }
}

/// Parse the driver's scan payload.
///
/// A parse failure keeps the offending payload in the error for diagnosis.
pub fn parse_scan_result(raw: &str) -> Result<SecondaryAddressList, MBusError> {
    if raw.is_empty() {
        return Ok(SecondaryAddressList::default());
    }
    serde_json::from_str(raw).map_err(|source| MBusError::JsonParseFailure {
        source,
        text: raw.to_string(),
    })
}
