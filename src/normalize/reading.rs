//! # Response Normalization
//!
//! Turns the driver's XML rendering of a `get` response into a structured reading.
//!
//! The mapping from the element tree to `serde_json::Value` follows fixed rules:
//!
//! - an element with neither attributes nor child elements becomes its text,
//!   numeric text becoming a number; an empty element becomes `""`
//! - attributes are merged into the owning element's fields
//! - repeated names collapse into an array, single names stay scalar
//! - character data of an element that also has fields is stored under `_`
//!
//! On top of that, `DataRecord` of an `MBusData` document is always a list.

use super::xml::{parse_document, XmlElement};
use crate::constants::{MBUS_DATA_ELEMENT, MBUS_DATA_RECORD_ELEMENT, XML_TEXT_KEY};
use crate::error::MBusError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Largest integer a float carries without loss (2^53 - 1)
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A normalized `MBusData` document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedReading {
    /// Top-level fields other than the records, in document order
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    /// Data records in document order
    #[serde(
        rename = "DataRecord",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub data_records: Vec<Value>,
}

impl NormalizedReading {
    /// Build a reading from the fields of an `MBusData` element.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        let mut reading = NormalizedReading::default();
        for (key, value) in fields {
            if key == MBUS_DATA_RECORD_ELEMENT {
                reading.data_records = promote_to_list(value);
            } else {
                reading.fields.insert(key, value);
            }
        }
        reading
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The `SlaveInformation` block, when the slave sent one
    pub fn slave_information(&self) -> Option<&Map<String, Value>> {
        self.fields.get("SlaveInformation").and_then(Value::as_object)
    }

    /// Back to the plain object shape, with `DataRecord` as a list.
    pub fn into_value(self) -> Value {
        let mut map = self.fields;
        if !self.data_records.is_empty() {
            map.insert(
                MBUS_DATA_RECORD_ELEMENT.to_string(),
                Value::Array(self.data_records),
            );
        }
        Value::Object(map)
    }
}

/// Outcome of normalizing a `get` payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MBusResponse {
    /// The payload was an `MBusData` document
    Reading(NormalizedReading),
    /// Any other document, unchanged and keyed by its root element name, or
    /// the bare text of an `MBusData` root
    Passthrough(Value),
}

impl MBusResponse {
    pub fn reading(&self) -> Option<&NormalizedReading> {
        match self {
            MBusResponse::Reading(reading) => Some(reading),
            MBusResponse::Passthrough(_) => None,
        }
    }

    pub fn into_reading(self) -> Option<NormalizedReading> {
        match self {
            MBusResponse::Reading(reading) => Some(reading),
            MBusResponse::Passthrough(_) => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            MBusResponse::Reading(reading) => reading.into_value(),
            MBusResponse::Passthrough(value) => value,
        }
    }
}

/// Normalize the driver's XML payload of a `get` response.
pub fn normalize_reading(xml: &str) -> Result<MBusResponse, MBusError> {
    let root = parse_document(xml)?;
    match element_to_value(&root) {
        Value::Object(fields) if root.name == MBUS_DATA_ELEMENT => {
            Ok(MBusResponse::Reading(NormalizedReading::from_fields(fields)))
        }
        // Bare text inside `MBusData` is returned unwrapped; "" and 0 keep the root.
        value if root.name == MBUS_DATA_ELEMENT && is_present(&value) => {
            Ok(MBusResponse::Passthrough(value))
        }
        value => {
            let mut document = Map::new();
            document.insert(root.name, value);
            Ok(MBusResponse::Passthrough(Value::Object(document)))
        }
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::String(text) => !text.is_empty(),
        Value::Number(number) => number.as_f64().map_or(true, |n| n != 0.0),
        _ => false,
    }
}

/// Map one element (recursively) to a JSON value.
pub fn element_to_value(element: &XmlElement) -> Value {
    let mut fields = Map::new();
    for (key, raw) in &element.attributes {
        assign_or_push(&mut fields, key, coerce_scalar(raw));
    }
    for child in &element.children {
        assign_or_push(&mut fields, &child.name, element_to_value(child));
    }

    let has_text = !element.text.trim().is_empty();
    match (fields.is_empty(), has_text) {
        (true, true) => coerce_scalar(&element.text),
        (true, false) => Value::String(String::new()),
        (false, true) => {
            fields.insert(XML_TEXT_KEY.to_string(), coerce_scalar(&element.text));
            Value::Object(fields)
        }
        (false, false) => Value::Object(fields),
    }
}

fn assign_or_push(fields: &mut Map<String, Value>, key: &str, value: Value) {
    match fields.get_mut(key) {
        None => {
            fields.insert(key.to_string(), value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

/// A value that may be a single item or a list of items, as a list.
pub fn promote_to_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        single => vec![single],
    }
}

/// Coerce numeric-looking text to a JSON number; keep anything else as a string.
///
/// Floats without a fractional part become integers, so `"12.0"` reads as `12`.
pub fn coerce_scalar(text: &str) -> Value {
    let trimmed = text.trim();
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(uint) = trimmed.parse::<u64>() {
        return Value::from(uint);
    }
    match trimmed.parse::<f64>() {
        Ok(float) if float.is_finite() => {
            if float.fract() == 0.0 && float.abs() <= MAX_EXACT_INTEGER {
                Value::from(float as i64)
            } else {
                Number::from_f64(float)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(text.to_string()))
            }
        }
        _ => Value::String(text.to_string()),
    }
}
