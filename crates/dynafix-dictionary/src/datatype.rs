//! FIX datatype taxonomy, spelled the way QuickFIX dictionaries spell it.

use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// The datatype of a FIX field, as declared by the `type` attribute of a
/// `<field>` element in a QuickFIX dictionary.
///
/// QuickFIX files spell datatypes in all-caps (`UTCTIMESTAMP`,
/// `LOCALMKTDATE`, ...); the string representation of this enum matches that
/// spelling exactly, so [`FixDatatype::from_quickfix_name`] and
/// [`ToString::to_string`] round-trip.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, EnumIter,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum FixDatatype {
    Amt,
    Boolean,
    Char,
    Country,
    Currency,
    Data,
    Date,
    DayOfMonth,
    Exchange,
    Float,
    Int,
    Language,
    Length,
    LocalMktDate,
    MonthYear,
    MultipleCharValue,
    MultipleStringValue,
    MultipleValueChar,
    MultipleValueString,
    NumInGroup,
    Percentage,
    Price,
    PriceOffset,
    Qty,
    SeqNum,
    String,
    Time,
    TzTimeOnly,
    TzTimestamp,
    UtcDate,
    UtcDateOnly,
    UtcTimeOnly,
    UtcTimestamp,
    XmlData,
}

impl FixDatatype {
    /// Looks up the datatype that a QuickFIX dictionary calls `name`, if any.
    pub fn from_quickfix_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    /// Reduces `self` to the primitive datatype it derives from.
    ///
    /// Every derived FIX datatype (e.g. `QTY`, `SEQNUM`, `MONTHYEAR`) is a
    /// restriction of one of the six primitives: `INT`, `FLOAT`, `CHAR`,
    /// `STRING`, `DATA`, or `BOOLEAN`.
    pub fn base_type(&self) -> Self {
        match self {
            Self::Amt | Self::Percentage | Self::Price | Self::PriceOffset | Self::Qty => {
                Self::Float
            }
            Self::DayOfMonth | Self::Length | Self::NumInGroup | Self::SeqNum => Self::Int,
            Self::XmlData => Self::Data,
            Self::Country
            | Self::Currency
            | Self::Date
            | Self::Exchange
            | Self::Language
            | Self::LocalMktDate
            | Self::MonthYear
            | Self::MultipleCharValue
            | Self::MultipleStringValue
            | Self::MultipleValueChar
            | Self::MultipleValueString
            | Self::Time
            | Self::TzTimeOnly
            | Self::TzTimestamp
            | Self::UtcDate
            | Self::UtcDateOnly
            | Self::UtcTimeOnly
            | Self::UtcTimestamp => Self::String,
            other => *other,
        }
    }

    /// `true` for length-prefix fields: the value of such a field declares
    /// how many raw bytes the *next* field on the wire occupies.
    pub fn is_length(&self) -> bool {
        matches!(self, Self::Length)
    }

    /// `true` for raw-payload fields whose value may legally contain the
    /// field separator.
    pub fn is_data(&self) -> bool {
        self.base_type() == Self::Data
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn quickfix_names_round_trip() {
        use strum::IntoEnumIterator;
        for datatype in FixDatatype::iter() {
            let reparsed = FixDatatype::from_quickfix_name(datatype.as_ref());
            assert_eq!(reparsed, Some(datatype));
        }
    }

    #[test]
    fn quickfix_spellings_are_all_caps() {
        assert_eq!(FixDatatype::UtcTimestamp.to_string(), "UTCTIMESTAMP");
        assert_eq!(FixDatatype::LocalMktDate.to_string(), "LOCALMKTDATE");
        assert_eq!(
            FixDatatype::from_quickfix_name("MULTIPLEVALUESTRING"),
            Some(FixDatatype::MultipleValueString)
        );
        assert_eq!(FixDatatype::from_quickfix_name("NOTATYPE"), None);
    }

    #[test]
    fn derived_types_reduce_to_primitives() {
        assert_eq!(FixDatatype::Qty.base_type(), FixDatatype::Float);
        assert_eq!(FixDatatype::SeqNum.base_type(), FixDatatype::Int);
        assert_eq!(FixDatatype::UtcTimestamp.base_type(), FixDatatype::String);
        assert_eq!(FixDatatype::XmlData.base_type(), FixDatatype::Data);
        assert_eq!(FixDatatype::Int.base_type(), FixDatatype::Int);
    }

    #[test]
    fn length_and_data_classification() {
        assert!(FixDatatype::Length.is_length());
        assert!(!FixDatatype::Int.is_length());
        assert!(FixDatatype::Data.is_data());
        assert!(FixDatatype::XmlData.is_data());
        assert!(!FixDatatype::String.is_data());
    }
}
