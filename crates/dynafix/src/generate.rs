//! Value generation for message initialization.
//!
//! [`Message::initialize`](crate::Message::initialize) delegates the choice
//! of each fabricated value to a [`ValueGenerator`]. The stock implementation
//! is deterministic: enum-restricted fields take their first declared
//! variant, and everything else derives from the field's datatype. Plug in a
//! custom generator for randomized or scenario-specific values.

use chrono::Utc;
use dynafix_dictionary::{FieldDef, FixDatatype, FixString};
use serde::Deserialize;

/// A policy table for fabricating plausible field values.
pub trait ValueGenerator {
    /// Produces a value for `field`, as wire bytes.
    fn value_for(&self, field: &FieldDef) -> Vec<u8>;
}

/// The ISO code tables consumed by [`StockValues`]: country, currency,
/// exchange, and language codes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IsoCodes {
    pub countries: Vec<FixString>,
    pub currencies: Vec<FixString>,
    pub exchanges: Vec<FixString>,
    pub languages: Vec<FixString>,
}

impl IsoCodes {
    /// The bundled code tables.
    pub fn bundled() -> Self {
        let mut bytes = include_bytes!("resources/isocodes.json").to_vec();
        simd_json::from_slice(&mut bytes).expect("bundled ISO code table is well-formed")
    }

    /// Parses code tables from a JSON sidecar with keys `countries`,
    /// `currencies`, `exchanges`, and `languages`.
    pub fn from_json(bytes: &[u8]) -> Result<Self, simd_json::Error> {
        let mut bytes = bytes.to_vec();
        simd_json::from_slice(&mut bytes)
    }
}

/// Deterministic default generator.
///
/// Enum-restricted fields yield their first declared variant. Otherwise the
/// value follows the datatype: current timestamps for the time types, the
/// first bundled ISO code for the code types, and fixed representative
/// literals for the numeric and text types. `LENGTH` fields and `DATA`
/// fields are generated as a consistent pair (`4` / `test`).
#[derive(Debug, Clone)]
pub struct StockValues {
    iso: IsoCodes,
}

// Type-derived fallbacks for STRING-like fields, picked by tag so adjacent
// fields do not all collapse to one word.
const WORDS: &[&str] = &[
    "alpha", "bravo", "delta", "echo", "golf", "hotel", "kilo", "lima", "oscar", "tango",
];

impl StockValues {
    pub fn new() -> Self {
        Self {
            iso: IsoCodes::bundled(),
        }
    }

    /// A generator drawing country/currency/exchange/language values from
    /// caller-supplied tables.
    pub fn with_iso_codes(iso: IsoCodes) -> Self {
        Self { iso }
    }

    fn first_or(codes: &[FixString], fallback: &str) -> Vec<u8> {
        codes
            .first()
            .map(|code| code.as_bytes().to_vec())
            .unwrap_or_else(|| fallback.as_bytes().to_vec())
    }
}

impl Default for StockValues {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueGenerator for StockValues {
    fn value_for(&self, field: &FieldDef) -> Vec<u8> {
        if let Some(variant) = field.enums().first() {
            return variant.value().as_bytes().to_vec();
        }
        match field.name() {
            "Symbol" => return b"ACME".to_vec(),
            "TotQuoteEntries" => return b"1".to_vec(),
            _ => {}
        }
        let now = Utc::now();
        let text = |pattern: &str| now.format(pattern).to_string().into_bytes();
        match field.data_type() {
            FixDatatype::Boolean => b"Y".to_vec(),
            FixDatatype::Char => b"A".to_vec(),
            FixDatatype::Int
            | FixDatatype::DayOfMonth
            | FixDatatype::NumInGroup
            | FixDatatype::SeqNum => b"1".to_vec(),
            FixDatatype::Length => b"4".to_vec(),
            FixDatatype::Data | FixDatatype::XmlData => b"test".to_vec(),
            FixDatatype::Float => b"1.25".to_vec(),
            FixDatatype::Price => b"1.25".to_vec(),
            FixDatatype::PriceOffset => b"0.05".to_vec(),
            FixDatatype::Qty => b"100".to_vec(),
            FixDatatype::Amt => b"125.00".to_vec(),
            FixDatatype::Percentage => b"0.01".to_vec(),
            FixDatatype::Country => Self::first_or(&self.iso.countries, "US"),
            FixDatatype::Currency => Self::first_or(&self.iso.currencies, "USD"),
            FixDatatype::Exchange => Self::first_or(&self.iso.exchanges, "N"),
            FixDatatype::Language => Self::first_or(&self.iso.languages, "en"),
            FixDatatype::Date
            | FixDatatype::LocalMktDate
            | FixDatatype::UtcDate
            | FixDatatype::UtcDateOnly => text("%Y%m%d"),
            FixDatatype::MonthYear => text("%Y%m"),
            FixDatatype::UtcTimeOnly => text("%H:%M:%S%.3f"),
            FixDatatype::Time | FixDatatype::UtcTimestamp => text("%Y%m%d-%H:%M:%S%.3f"),
            FixDatatype::TzTimeOnly => text("%H:%M:%SZ"),
            FixDatatype::TzTimestamp => text("%Y%m%d-%H:%M:%SZ"),
            FixDatatype::String
            | FixDatatype::MultipleCharValue
            | FixDatatype::MultipleStringValue
            | FixDatatype::MultipleValueChar
            | FixDatatype::MultipleValueString => {
                WORDS[field.tag() as usize % WORDS.len()].as_bytes().to_vec()
            }
        }
    }
}
