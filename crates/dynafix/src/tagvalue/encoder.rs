//! Canonical wire serialization.
//!
//! The serializer renders a [`Message`] into its canonical byte form:
//! `BeginString` first, `BodyLength` second (recomputed, never trusted from
//! the model), `MsgType` third, every other field in its template's declared
//! order, group counts immediately followed by their repetitions, and a
//! freshly computed three-digit `CheckSum` last. Fields present in a section
//! but absent from its template are emitted at the end of the section in
//! insertion order.

use super::tokenizer::SOH;
use crate::message::{Entry, Message, Section};
use std::io::Write;

/// Serializer for the tag/value wire format.
///
/// The default output is SOH-delimited wire bytes. [`Encoder::human`]
/// produces the human-readable form: the same bytes with every SOH replaced
/// by `|` — a pure substitution, so `BodyLength` and `CheckSum` (computed
/// over the SOH form) are identical in both renderings.
#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    separator: u8,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    /// An encoder producing wire-ready SOH-delimited bytes.
    pub fn new() -> Self {
        Self { separator: SOH }
    }

    /// An encoder producing the human-readable `|`-delimited form.
    pub fn human() -> Self {
        Self { separator: b'|' }
    }

    /// Renders `message` into its canonical byte form.
    pub fn encode(&self, message: &Message) -> Vec<u8> {
        let mut out = render(message);
        let sum: u32 = out.iter().map(|byte| u32::from(*byte)).sum();
        let checksum = (sum % 256) as u8;
        let digits = [
            b'0' + checksum / 100,
            b'0' + (checksum / 10) % 10,
            b'0' + checksum % 10,
        ];
        put_field(&mut out, 10, &digits);
        if self.separator != SOH {
            for byte in &mut out {
                if *byte == SOH {
                    *byte = self.separator;
                }
            }
        }
        out
    }
}

impl Message {
    /// The canonical SOH-delimited wire bytes of `self`.
    pub fn to_bytes(&self) -> Vec<u8> {
        Encoder::new().encode(self)
    }

    /// The human-readable bytes: identical to [`Message::to_bytes`] with
    /// every SOH byte replaced by `|`, separators embedded inside `DATA`
    /// values included.
    pub fn to_human_bytes(&self) -> Vec<u8> {
        Encoder::human().encode(self)
    }

    /// Best-effort text rendering of [`Message::to_human_bytes`]. Binary
    /// payload bytes that are not valid UTF-8 come out as replacement
    /// characters; use [`Message::to_human_bytes`] when the exact bytes
    /// matter.
    pub fn to_human(&self) -> String {
        String::from_utf8_lossy(&self.to_human_bytes()).into_owned()
    }

    /// The `BodyLength` of the canonical form: every byte after the
    /// `BodyLength` field's separator, up to and excluding the `CheckSum`
    /// tag.
    pub fn body_length(&self) -> usize {
        body_bytes(self).len()
    }

    /// The `CheckSum` of the canonical form: the byte sum of everything that
    /// precedes the `CheckSum` field, modulo 256.
    pub fn checksum(&self) -> u8 {
        let rendered = render(self);
        let sum: u32 = rendered.iter().map(|byte| u32::from(*byte)).sum();
        (sum % 256) as u8
    }
}

/// The SOH rendering of everything except the trailing `CheckSum` field.
fn render(message: &Message) -> Vec<u8> {
    let body = body_bytes(message);
    let mut out = Vec::with_capacity(body.len() + 32);
    let begin_string = match message.header().field(8u32) {
        Some(field) => field.value().to_vec(),
        None => message.dictionary().version().as_bytes().to_vec(),
    };
    put_field(&mut out, 8, &begin_string);
    put_field(&mut out, 9, body.len().to_string().as_bytes());
    out.extend_from_slice(&body);
    out
}

/// The byte span covered by `BodyLength`: from the `MsgType` tag to the last
/// separator before `CheckSum`.
fn body_bytes(message: &Message) -> Vec<u8> {
    let mut out = Vec::new();
    let msg_type = message.msg_type().unwrap_or_default();
    put_field(&mut out, 35, msg_type.as_bytes());
    render_section(
        &mut out,
        message.header(),
        &["BeginString", "BodyLength", "MsgType"],
    );
    render_section(&mut out, message.body(), &[]);
    render_section(&mut out, message.trailer(), &["CheckSum"]);
    out
}

/// Emits a section in canonical order: template entries first, in declared
/// order, then non-template extras in insertion order.
fn render_section(out: &mut Vec<u8>, section: &Section, skip: &[&str]) {
    if let Some(template) = section.template() {
        let template = template.clone();
        for spec in template.iter() {
            if skip.contains(&spec.name()) {
                continue;
            }
            if let Some(entry) = section.get(spec.name()) {
                render_entry(out, entry);
            }
        }
        for entry in section.entries() {
            if skip.contains(&entry.name()) {
                continue;
            }
            if template.iter().any(|spec| spec.name() == entry.name()) {
                continue;
            }
            render_entry(out, entry);
        }
    } else {
        for entry in section.entries() {
            if !skip.contains(&entry.name()) {
                render_entry(out, entry);
            }
        }
    }
}

fn render_entry(out: &mut Vec<u8>, entry: &Entry) {
    match entry {
        Entry::Field(field) => put_field(out, field.tag(), field.value()),
        Entry::Group(group) => {
            put_field(out, group.tag(), group.len().to_string().as_bytes());
            for rep in group.reps() {
                render_section(out, rep, &[]);
            }
        }
    }
}

fn put_field(out: &mut Vec<u8>, tag: u32, value: &[u8]) {
    // Writing into a Vec cannot fail.
    let _ = write!(out, "{tag}=");
    out.extend_from_slice(value);
    out.push(SOH);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::{FieldValue, GroupValue};
    use dynafix_dictionary::Dictionary;

    fn dict() -> Dictionary {
        Dictionary::fix42().unwrap()
    }

    #[test]
    fn framing_fields_take_their_mandated_positions() {
        let dict = dict();
        let mut order = Message::new(&dict, "D").unwrap();
        order.set("ClOrdID", "C1").unwrap();
        let human = order.to_human();
        assert!(human.starts_with("8=FIX.4.2|9="), "{human}");
        let fields: Vec<&str> = human.trim_end_matches('|').split('|').collect();
        assert!(fields[0].starts_with("8="));
        assert!(fields[1].starts_with("9="));
        assert!(fields[2].starts_with("35="));
        assert!(fields.last().unwrap().starts_with("10="));
    }

    #[test]
    fn body_length_and_checksum_close_over_the_payload() {
        let dict = dict();
        let mut order = Message::new(&dict, "D").unwrap();
        order.set("ClOrdID", "C1").unwrap();
        let bytes = order.to_bytes();

        // BodyLength counts from after its own separator to the CheckSum tag.
        let rendered = String::from_utf8_lossy(&bytes);
        let after_9 = rendered.find("35=").unwrap();
        let at_10 = rendered.rfind("10=").unwrap();
        assert_eq!(order.body_length(), at_10 - after_9);

        // CheckSum is the byte sum of everything before its own tag.
        let sum: u32 = bytes[..at_10].iter().map(|b| u32::from(*b)).sum();
        assert_eq!(u32::from(order.checksum()), sum % 256);
        assert!(bytes.ends_with(format!("10={:03}\x01", order.checksum()).as_bytes()));
    }

    #[test]
    fn template_order_overrides_insertion_order() {
        let dict = dict();
        let mut order = Message::new(&dict, "D").unwrap();
        // Inserted backwards relative to the declared template order.
        order.set("OrdType", "1").unwrap();
        order.set("Side", "2").unwrap();
        order.set("Symbol", "IBM").unwrap();
        order.set("ClOrdID", "C1").unwrap();
        let human = order.to_human();
        let body = &human[human.find("35=D|").unwrap()..];
        assert_eq!(
            body.trim_end_matches('|').split('|').take(5).collect::<Vec<_>>(),
            ["35=D", "11=C1", "55=IBM", "54=2", "40=1"]
        );
    }

    #[test]
    fn extras_are_emitted_after_template_fields() {
        let dict = dict();
        let mut order = Message::new(&dict, "D").unwrap();
        order.set("ClOrdID", "C1").unwrap();
        order.set_ignore_spec(9001u32, "x").unwrap();
        order.set_ignore_spec("TestReqID", "t").unwrap();
        order.set("Symbol", "IBM").unwrap();
        let human = order.to_human();
        let tail: Vec<&str> = human
            .trim_end_matches('|')
            .split('|')
            .rev()
            .take(3)
            .collect();
        // CheckSum last; the two non-template extras right before it, in
        // insertion order.
        assert!(tail[0].starts_with("10="));
        assert_eq!(tail[1], "112=t");
        assert_eq!(tail[2], "9001=x");
    }

    #[test]
    fn group_count_precedes_ordered_repetitions() {
        let dict = dict();
        let mut order = Message::new(&dict, "D").unwrap();
        order.set("ClOrdID", "C1").unwrap();
        let group_def = order
            .template()
            .unwrap()
            .body()
            .iter()
            .find_map(|spec| match spec {
                dynafix_dictionary::EntrySpec::Group { group, .. } => Some(group.clone()),
                _ => None,
            })
            .unwrap();
        let mut group = GroupValue::new(group_def);
        {
            let rep = group.new_rep();
            // Inserted out of declared order on purpose.
            rep.set(&dict, "AllocShares", "10", false).unwrap();
            rep.set(&dict, "AllocAccount", "Marcin", false).unwrap();
        }
        group.new_rep().set(&dict, "AllocAccount", "Jay", false).unwrap();
        order.body_mut().insert_group(group);

        let human = order.to_human();
        assert!(
            human.contains("78=2|79=Marcin|80=10|79=Jay|"),
            "{human}"
        );
    }

    #[test]
    fn empty_groups_serialize_as_a_zero_count() {
        let dict = dict();
        let mut order = Message::new(&dict, "D").unwrap();
        order.set("ClOrdID", "C1").unwrap();
        let group_def = dict.group_by_name("NoAllocs").unwrap().clone();
        order.body_mut().insert_group(GroupValue::new(group_def));
        assert!(order.to_human().contains("|78=0|"));
    }

    #[test]
    fn begin_string_falls_back_to_the_dictionary_version() {
        let dict = dict();
        let order = Message::new(&dict, "0").unwrap();
        assert!(order.to_human().starts_with("8=FIX.4.2|"));

        let mut order = Message::new(&dict, "0").unwrap();
        order
            .header_mut()
            .insert_field(FieldValue::new("BeginString", 8, "FIX.CUSTOM"));
        assert!(order.to_human().starts_with("8=FIX.CUSTOM|"));
    }

    #[test]
    fn human_form_is_a_byte_substitution_of_the_wire_form() {
        let dict = dict();
        let mut order = Message::new(&dict, "D").unwrap();
        order.set("ClOrdID", "C1").unwrap();
        let substituted: Vec<u8> = order
            .to_bytes()
            .iter()
            .map(|&b| if b == SOH { b'|' } else { b })
            .collect();
        assert_eq!(order.to_human_bytes(), substituted);
        assert_eq!(order.to_human().as_bytes(), substituted.as_slice());
    }

    #[test]
    fn human_form_substitutes_separators_inside_binary_values() {
        let dict = dict();
        let mut logon = Message::new(&dict, "A").unwrap();
        logon.set("EncryptMethod", "0").unwrap();
        logon.set("HeartBtInt", "30").unwrap();
        // A binary payload: an embedded SOH and a non-UTF-8 byte.
        logon.set("RawDataLength", "4").unwrap();
        logon.set("RawData", &b"a\x01\xffb"[..]).unwrap();

        let wire = logon.to_bytes();
        let human = logon.to_human_bytes();
        assert_eq!(wire.len(), human.len());
        assert!(!human.contains(&SOH));
        // The embedded SOH is substituted like any other; the non-UTF-8
        // byte survives untouched.
        let at_96 = human.windows(3).position(|w| w == b"96=").unwrap();
        assert_eq!(&human[at_96..at_96 + 10], b"96=a|\xffb|10");
        // The lossy text form mangles only the non-UTF-8 byte.
        assert!(logon.to_human().contains("96=a|\u{fffd}b|"));
    }
}
