//! Structural parser: token stream to message tree.

use super::tokenizer::{RawToken, Tokenizer, is_separator};
use crate::errors::DecodeError;
use crate::message::{FieldValue, GroupValue, Message, Section};
use dynafix_dictionary::{Dictionary, EntrySpec, FixString, GroupDef, Registry};
use nohash_hasher::IntMap;
use std::sync::Arc;

/// FIX message decoder.
///
/// Holds a [`Registry`] of dictionaries; the `BeginString` of each incoming
/// message selects the dictionary, falling back to the configured default
/// version (`FIX.4.2` out of the box) when the wire version is absent or
/// unregistered.
///
/// ```
/// use dynafix::tagvalue::Decoder;
/// use dynafix_dictionary::Registry;
///
/// let decoder = Decoder::new(Registry::bundled());
/// let message = decoder
///     .decode(b"8=FIX.4.2|9=40|35=D|49=AFUNDMGR|56=ABROKER|15=USD|59=0|10=091|")
///     .unwrap();
/// assert_eq!(message.name(), Some("NewOrderSingle"));
/// assert_eq!(message.get(15u32).unwrap().as_field().unwrap().value(), b"USD");
/// ```
#[derive(Debug, Clone)]
pub struct Decoder {
    registry: Registry,
    default_version: FixString,
}

impl Decoder {
    /// Creates a decoder over `registry`.
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            default_version: "FIX.4.2".into(),
        }
    }

    /// Returns the registry used by `self`.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Changes the fallback version used when the wire `BeginString` does not
    /// resolve to a registered dictionary.
    pub fn set_default_version(&mut self, version: impl Into<FixString>) {
        self.default_version = version.into();
    }

    /// Decodes a wire message. The message template is selected by the
    /// `MsgType` token; an unknown or absent `MsgType` yields a generic
    /// message that preserves every token in arrival order.
    pub fn decode(&self, bytes: &[u8]) -> Result<Message, DecodeError> {
        self.decode_inner(bytes, None)
    }

    /// Decodes a wire message against a caller-chosen template, regardless of
    /// the `MsgType` token. `message` may be a `MsgType` code or a message
    /// name.
    pub fn decode_as(&self, bytes: &[u8], message: &str) -> Result<Message, DecodeError> {
        self.decode_inner(bytes, Some(message))
    }

    fn decode_inner(&self, bytes: &[u8], forced: Option<&str>) -> Result<Message, DecodeError> {
        let dict = self.select_dictionary(bytes)?;
        let tokens: Vec<RawToken> = Tokenizer::new(&dict, bytes).collect();
        if tokens.is_empty() {
            return Err(DecodeError::Empty);
        }

        let template = match forced {
            Some(wanted) => Some(
                dict.message_by_msg_type(wanted)
                    .or_else(|| dict.message_by_name(wanted))
                    .cloned()
                    .ok_or_else(|| DecodeError::UnknownMsgType {
                        msg_type: wanted.into(),
                    })?,
            ),
            None => tokens
                .iter()
                .find(|token| token.tag == 35)
                .and_then(|token| {
                    let msg_type = String::from_utf8_lossy(token.value);
                    dict.message_by_msg_type(&msg_type)
                })
                .cloned(),
        };

        let mut message = match &template {
            Some(template) => Message::with_template(dict.clone(), template.clone()),
            None => Message::generic(&dict),
        };

        let header_specs = index_specs(dict.header());
        let trailer_specs = index_specs(dict.trailer());
        let body_specs = template.as_ref().map(|t| index_specs(t.body()));

        let mut cursor = Cursor {
            tokens: &tokens,
            i: 0,
        };
        while let Some(token) = cursor.peek() {
            // Message-body templates take priority, then header, then
            // trailer; whatever remains is a stray.
            if let Some(spec) = body_specs.as_ref().and_then(|m| m.get(&token.tag)) {
                match spec {
                    EntrySpec::Group { group, .. } => {
                        cursor.advance();
                        let value = parse_group(&mut cursor, group, &dict, token.value);
                        message.body_mut().insert_group(value);
                    }
                    EntrySpec::Field { field, .. } => {
                        cursor.advance();
                        message
                            .body_mut()
                            .insert_field(FieldValue::from_def(field, token.value));
                    }
                }
                continue;
            }
            if let Some(spec) = header_specs.get(&token.tag) {
                match spec {
                    EntrySpec::Group { group, .. } => {
                        cursor.advance();
                        let value = parse_group(&mut cursor, group, &dict, token.value);
                        message.header_mut().insert_group(value);
                    }
                    EntrySpec::Field { field, .. } => {
                        cursor.advance();
                        message
                            .header_mut()
                            .insert_field(FieldValue::from_def(field, token.value));
                    }
                }
                continue;
            }
            if let Some(EntrySpec::Field { field, .. }) = trailer_specs.get(&token.tag) {
                cursor.advance();
                message
                    .trailer_mut()
                    .insert_field(FieldValue::from_def(field, token.value));
                continue;
            }
            cursor.advance();
            match dict.field_by_tag(token.tag) {
                Some(field) if template.is_none() => {
                    message
                        .body_mut()
                        .insert_field(FieldValue::from_def(field, token.value));
                }
                Some(field) => {
                    // Known to the schema but foreign to this message's
                    // template: dropped, like any other tolerated
                    // malformation.
                    log::debug!(
                        "dropping field {} ({}) absent from the {} template",
                        field.tag(),
                        field.name(),
                        template.as_deref().map(|t| t.name()).unwrap_or("?"),
                    );
                }
                None => {
                    message
                        .body_mut()
                        .insert_field(FieldValue::unknown(token.tag, token.value));
                }
            }
        }
        Ok(message)
    }

    /// Resolves the dictionary for a buffer from its `BeginString`, before
    /// full tokenization is possible (tokenization itself needs the
    /// dictionary for `LENGTH` fields, and `BeginString` precedes any of
    /// those).
    fn select_dictionary(&self, bytes: &[u8]) -> Result<Dictionary, DecodeError> {
        let begin_string = bytes
            .split(|byte| is_separator(*byte))
            .find_map(|segment| segment.strip_prefix(b"8="))
            .map(String::from_utf8_lossy);
        if let Some(version) = &begin_string {
            if let Some(dict) = self.registry.version(version) {
                return Ok(dict.clone());
            }
        }
        self.registry
            .version(&self.default_version)
            .cloned()
            .ok_or_else(|| DecodeError::UnknownVersion {
                version: begin_string
                    .map(|v| v.as_ref().into())
                    .unwrap_or_else(|| self.default_version.clone()),
            })
    }
}

struct Cursor<'a, 'b> {
    tokens: &'a [RawToken<'b>],
    i: usize,
}

impl<'a, 'b> Cursor<'a, 'b> {
    fn peek(&self) -> Option<RawToken<'b>> {
        self.tokens.get(self.i).copied()
    }

    fn advance(&mut self) {
        self.i += 1;
    }
}

fn index_specs(entries: &[EntrySpec]) -> IntMap<u32, EntrySpec> {
    entries
        .iter()
        .map(|spec| (spec.tag(), spec.clone()))
        .collect()
}

/// Collects the repetitions of an open group. The count token has already
/// been consumed; `declared_count` carries its wire value, which is advisory
/// only.
///
/// Repetition boundaries are inferred, not marked: a new repetition starts at
/// every occurrence of the delimiter field (the template's first entry) and
/// whenever a member entry shows up that the current repetition already
/// holds. The first token that does not belong to the template (transitively,
/// through nested groups) closes the group and is left for the enclosing
/// scope.
fn parse_group(
    cursor: &mut Cursor,
    group: &Arc<GroupDef>,
    dict: &Dictionary,
    declared_count: &[u8],
) -> GroupValue {
    let delimiter = group.delimiter_tag();
    let mut value = GroupValue::new(group.clone());
    let mut current: Option<Section> = None;

    while let Some(token) = cursor.peek() {
        if !group.contains_tag(token.tag) {
            break;
        }

        let nested = group.template().iter().find_map(|spec| match spec {
            EntrySpec::Group { group: nested, .. } if nested.tag() == token.tag => Some(nested),
            _ => None,
        });
        if let Some(nested_def) = nested {
            let reopen = current
                .as_ref()
                .is_some_and(|rep| rep.contains(nested_def.name()));
            if reopen {
                if let Some(done) = current.take() {
                    value.push_rep(done);
                }
            }
            let rep = current
                .get_or_insert_with(|| Section::with_template(group.template().clone()));
            cursor.advance();
            let nested_def = nested_def.clone();
            let nested_value = parse_group(cursor, &nested_def, dict, token.value);
            rep.insert_group(nested_value);
            continue;
        }

        let field = match dict.field_by_tag(token.tag) {
            Some(field) => FieldValue::from_def(field, token.value),
            None => FieldValue::unknown(token.tag, token.value),
        };
        let boundary = token.tag == delimiter
            || current
                .as_ref()
                .is_some_and(|rep| rep.contains(field.name()));
        if boundary {
            if let Some(done) = current.take() {
                value.push_rep(done);
            }
        }
        current
            .get_or_insert_with(|| Section::with_template(group.template().clone()))
            .insert_field(field);
        cursor.advance();
    }

    if let Some(done) = current.take() {
        value.push_rep(done);
    }

    if let Ok(declared) = std::str::from_utf8(declared_count)
        .map_err(drop)
        .and_then(|s| s.parse::<usize>().map_err(drop))
    {
        if declared != value.len() {
            log::debug!(
                "group {}: wire declares {declared} repetitions, observed {}",
                value.name(),
                value.len()
            );
        }
    }
    value
}
