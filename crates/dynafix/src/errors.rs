//! Error types for the tag/value codec.
//!
//! Decoding is deliberately permissive (see the tokenizer), so the error
//! surface is small: a decode fails only when there is nothing usable in the
//! input or no dictionary to interpret it against. Serialization of a
//! well-formed in-memory message cannot fail and has no error type.

use dynafix_dictionary::FixString;
use thiserror::Error;

/// The error type that can arise when decoding a wire message.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The input contained no readable `tag=value` tokens.
    #[error("no FIX fields found in input")]
    Empty,

    /// Neither the `BeginString` of the input nor the decoder's fallback
    /// version resolves to a registered dictionary.
    #[error("no dictionary registered for version `{version}`")]
    UnknownVersion {
        /// The version string that failed to resolve.
        version: FixString,
    },

    /// A forced message kind was requested but the dictionary knows no such
    /// message (by `MsgType` code or by name).
    #[error("unknown message type `{msg_type}`")]
    UnknownMsgType {
        /// The requested message kind.
        msg_type: FixString,
    },
}
