//! Schema-driven FIX tag/value codec.
//!
//! `dynafix` decodes and encodes classic FIX messages against runtime data
//! dictionaries. No code generation is involved: the QuickFIX XML
//! specification for each protocol version is loaded into a
//! [`Dictionary`], and one generic message tree serves every message kind.
//!
//! - Decoding infers structure the wire format leaves implicit: repeating
//!   and nested groups are reassembled from the dictionary's field-order
//!   templates, length-prefixed `DATA` fields survive embedded separators,
//!   and well-known wire malformations are skipped rather than fatal.
//! - Encoding is canonical: `BeginString`, `BodyLength`, `MsgType` first,
//!   `CheckSum` last, and every section re-ordered to its template, so a
//!   round-tripped message is byte-identical.
//!
//! ```
//! use dynafix::prelude::*;
//!
//! let decoder = Decoder::new(Registry::bundled());
//! let message = decoder
//!     .decode(b"8=FIX.4.2|9=49|35=D|49=BANZAI|56=EXEC|11=C1|55=IBM|54=1|40=1|10=100|")
//!     .unwrap();
//! assert_eq!(message.name(), Some("NewOrderSingle"));
//! assert_eq!(message.get("Symbol").unwrap().as_field().unwrap().value(), b"IBM");
//!
//! let mut order = Message::new(decoder.registry().version("FIX.4.2").unwrap(), "D").unwrap();
//! order.set("ClOrdID", "C2").unwrap();
//! assert!(order.to_human().starts_with("8=FIX.4.2|"));
//! ```

mod errors;
pub mod generate;
mod message;
pub mod tagvalue;

pub use errors::DecodeError;
pub use message::{Entry, FieldKey, FieldValue, GroupValue, Message, Section};

// The dictionary crate is part of the public API surface.
pub use dynafix_dictionary::{
    Dictionary, EntrySpec, FieldDef, FieldEnum, FixDatatype, FixString, GroupDef, MessageDef,
    MsgCategory, ParseDictionaryError, Registry,
};

/// Convenience re-exports of the types most call sites touch.
pub mod prelude {
    pub use crate::generate::{StockValues, ValueGenerator};
    pub use crate::tagvalue::{Decoder, Encoder, SOH};
    pub use crate::{
        DecodeError, Dictionary, Entry, FieldKey, FieldValue, GroupValue, Message, Registry,
        Section,
    };
}
