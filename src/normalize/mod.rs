//! The normalize module turns raw link driver payloads into structured values:
//! XML `get` responses into readings and JSON scan results into address lists.

pub mod reading;
pub mod scan;
pub mod xml;

pub use reading::{normalize_reading, MBusResponse, NormalizedReading};
pub use scan::{parse_scan_result, SecondaryAddressList};
pub use xml::{parse_document, XmlElement};
