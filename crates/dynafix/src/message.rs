//! In-memory FIX message model.
//!
//! A [`Message`] is a tree: a header [`Section`], a body [`Section`], and a
//! trailer [`Section`], where each section is an ordered collection of
//! [`FieldValue`]s and [`GroupValue`]s. Repeating groups nest arbitrarily;
//! every repetition is itself a [`Section`].
//!
//! Sections remember the template they were created from, which is what lets
//! [`Section::set`] enforce the schema (a field that the template does not
//! declare is rejected unless `ignore_spec` is requested) and what lets the
//! serializer re-impose the canonical field order no matter the order in
//! which fields were inserted.

use crate::generate::ValueGenerator;
use dynafix_dictionary::{Dictionary, EntrySpec, FieldDef, FixString, GroupDef, MessageDef};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// A key identifying a field inside a section.
///
/// Mirrors the lookups the wire format makes natural: by numeric tag, by
/// name (a string of digits is treated as a tag), by field definition, or by
/// a field value previously obtained from the message.
#[derive(Debug, Clone, Copy)]
pub enum FieldKey<'a> {
    /// Numeric tag, e.g. `11`.
    Tag(u32),
    /// Field name, e.g. `"ClOrdID"`. An all-digit name resolves as a tag.
    Name(&'a str),
    /// A field definition from a [`Dictionary`].
    Def(&'a FieldDef),
    /// A field value; resolves by name for lookups, by identity for
    /// [`Section::contains`].
    Value(&'a FieldValue),
}

impl From<u32> for FieldKey<'static> {
    fn from(tag: u32) -> Self {
        FieldKey::Tag(tag)
    }
}

impl<'a> From<&'a str> for FieldKey<'a> {
    fn from(name: &'a str) -> Self {
        FieldKey::Name(name)
    }
}

impl<'a> From<&'a FieldDef> for FieldKey<'a> {
    fn from(def: &'a FieldDef) -> Self {
        FieldKey::Def(def)
    }
}

impl<'a> From<&'a FieldValue> for FieldKey<'a> {
    fn from(value: &'a FieldValue) -> Self {
        FieldKey::Value(value)
    }
}

fn numeric_key(name: &str) -> Option<u32> {
    if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
        name.parse().ok()
    } else {
        None
    }
}

/// A concrete field occurrence: name, tag, and the verbatim wire bytes of its
/// value.
///
/// Values are kept as raw bytes because `DATA`-typed fields may legally
/// contain the SOH separator and arbitrary binary content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
    name: FixString,
    tag: u32,
    value: Vec<u8>,
}

impl FieldValue {
    pub fn new(name: impl Into<FixString>, tag: u32, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            tag,
            value: value.into(),
        }
    }

    /// A field occurrence backed by a dictionary definition.
    pub fn from_def(def: &FieldDef, value: impl Into<Vec<u8>>) -> Self {
        Self::new(def.name(), def.tag(), value)
    }

    /// A field occurrence for a tag the schema does not know; named
    /// `Field<tag>`.
    pub fn unknown(tag: u32, value: impl Into<Vec<u8>>) -> Self {
        Self::new(format!("Field{tag}"), tag, value)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> u32 {
        self.tag
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// The value as text, with invalid UTF-8 replaced.
    pub fn value_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }

    pub fn set_value(&mut self, value: impl Into<Vec<u8>>) {
        self.value = value.into();
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}|", self.tag, self.value_str())
    }
}

/// A repeating group occurrence: the group template plus an ordered list of
/// repetitions.
///
/// The wire count field is implied: it always serializes to the current
/// number of repetitions, whatever count the wire originally carried.
#[derive(Debug, Clone)]
pub struct GroupValue {
    def: Arc<GroupDef>,
    reps: Vec<Section>,
}

impl GroupValue {
    pub fn new(def: Arc<GroupDef>) -> Self {
        Self {
            def,
            reps: Vec::new(),
        }
    }

    pub fn def(&self) -> &Arc<GroupDef> {
        &self.def
    }

    /// The count-field name (`"NoAllocs"`).
    pub fn name(&self) -> &str {
        self.def.name()
    }

    /// The count-field tag.
    pub fn tag(&self) -> u32 {
        self.def.tag()
    }

    /// Number of repetitions; this is also the serialized count value.
    pub fn len(&self) -> usize {
        self.reps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reps.is_empty()
    }

    pub fn rep(&self, index: usize) -> Option<&Section> {
        self.reps.get(index)
    }

    pub fn rep_mut(&mut self, index: usize) -> Option<&mut Section> {
        self.reps.get_mut(index)
    }

    pub fn reps(&self) -> &[Section] {
        &self.reps
    }

    /// Appends a repetition built by the caller.
    pub fn push_rep(&mut self, rep: Section) {
        self.reps.push(rep);
    }

    /// Appends an empty repetition carrying the group template and returns
    /// it for filling.
    pub fn new_rep(&mut self) -> &mut Section {
        self.reps.push(Section::with_template(self.def.template().clone()));
        self.reps
            .last_mut()
            .unwrap_or_else(|| unreachable!("repetition was just pushed"))
    }

    pub fn remove_rep(&mut self, index: usize) -> Option<Section> {
        if index < self.reps.len() {
            Some(self.reps.remove(index))
        } else {
            None
        }
    }
}

impl PartialEq for GroupValue {
    fn eq(&self, other: &Self) -> bool {
        self.tag() == other.tag() && self.name() == other.name() && self.reps == other.reps
    }
}

impl fmt::Display for GroupValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}|", self.tag(), self.len())
    }
}

/// One element of a section: a field or a repeating group.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Field(FieldValue),
    Group(GroupValue),
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Entry::Field(field) => field.name(),
            Entry::Group(group) => group.name(),
        }
    }

    pub fn tag(&self) -> u32 {
        match self {
            Entry::Field(field) => field.tag(),
            Entry::Group(group) => group.tag(),
        }
    }

    pub fn as_field(&self) -> Option<&FieldValue> {
        match self {
            Entry::Field(field) => Some(field),
            Entry::Group(_) => None,
        }
    }

    pub fn as_field_mut(&mut self) -> Option<&mut FieldValue> {
        match self {
            Entry::Field(field) => Some(field),
            Entry::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupValue> {
        match self {
            Entry::Group(group) => Some(group),
            Entry::Field(_) => None,
        }
    }

    pub fn as_group_mut(&mut self) -> Option<&mut GroupValue> {
        match self {
            Entry::Group(group) => Some(group),
            Entry::Field(_) => None,
        }
    }
}

/// An ordered collection of present entries, optionally backed by the
/// field-order template it was created from.
///
/// Insertion order is preserved for round-trip purposes; the serializer
/// re-imposes the template order and emits non-template extras last.
#[derive(Debug, Clone, Default)]
pub struct Section {
    entries: Vec<Entry>,
    template: Option<Arc<[EntrySpec]>>,
}

impl Section {
    /// A section with no template: any schema-known field may be installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// A section backed by a template (header, trailer, message body, or one
    /// group repetition).
    pub fn with_template(template: Arc<[EntrySpec]>) -> Self {
        Self {
            entries: Vec::new(),
            template: Some(template),
        }
    }

    pub fn template(&self) -> Option<&Arc<[EntrySpec]>> {
        self.template.as_ref()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn matches(entry: &Entry, key: FieldKey) -> bool {
        match key {
            FieldKey::Tag(tag) => entry.tag() == tag,
            FieldKey::Name(name) => match numeric_key(name) {
                Some(tag) => entry.tag() == tag,
                None => entry.name() == name,
            },
            FieldKey::Def(def) => entry.name() == def.name(),
            FieldKey::Value(value) => entry.name() == value.name(),
        }
    }

    fn position(&self, key: FieldKey) -> Option<usize> {
        self.entries.iter().position(|e| Self::matches(e, key))
    }

    /// `true` if the keyed entry is present. A [`FieldKey::Value`] key tests
    /// identity: it is contained only if that very value sits in the section.
    pub fn contains<'k>(&self, key: impl Into<FieldKey<'k>>) -> bool {
        match key.into() {
            FieldKey::Value(value) => self.entries.iter().any(|e| match e {
                Entry::Field(field) => std::ptr::eq(field, value),
                Entry::Group(_) => false,
            }),
            key => self.position(key).is_some(),
        }
    }

    pub fn get<'k>(&self, key: impl Into<FieldKey<'k>>) -> Option<&Entry> {
        self.position(key.into()).map(|i| &self.entries[i])
    }

    pub fn get_mut<'k>(&mut self, key: impl Into<FieldKey<'k>>) -> Option<&mut Entry> {
        self.position(key.into()).map(|i| &mut self.entries[i])
    }

    /// Keyed field access, skipping group entries.
    pub fn field<'k>(&self, key: impl Into<FieldKey<'k>>) -> Option<&FieldValue> {
        self.get(key).and_then(Entry::as_field)
    }

    /// Keyed group access, skipping field entries.
    pub fn group<'k>(&self, key: impl Into<FieldKey<'k>>) -> Option<&GroupValue> {
        self.get(key).and_then(Entry::as_group)
    }

    pub fn group_mut<'k>(&mut self, key: impl Into<FieldKey<'k>>) -> Option<&mut GroupValue> {
        self.get_mut(key).and_then(Entry::as_group_mut)
    }

    /// Installs a field outright, bypassing the template check. An entry with
    /// the same name is replaced in place, keeping its position.
    pub fn insert_field(&mut self, field: FieldValue) -> &mut FieldValue {
        let i = match self.entries.iter().position(|e| e.name() == field.name()) {
            Some(i) => {
                self.entries[i] = Entry::Field(field);
                i
            }
            None => {
                self.entries.push(Entry::Field(field));
                self.entries.len() - 1
            }
        };
        match &mut self.entries[i] {
            Entry::Field(field) => field,
            Entry::Group(_) => unreachable!("a field was just stored at this position"),
        }
    }

    /// Installs a group outright; same replacement rule as
    /// [`Section::insert_field`].
    pub fn insert_group(&mut self, group: GroupValue) -> &mut GroupValue {
        let i = match self.entries.iter().position(|e| e.name() == group.name()) {
            Some(i) => {
                self.entries[i] = Entry::Group(group);
                i
            }
            None => {
                self.entries.push(Entry::Group(group));
                self.entries.len() - 1
            }
        };
        match &mut self.entries[i] {
            Entry::Group(group) => group,
            Entry::Field(_) => unreachable!("a group was just stored at this position"),
        }
    }

    /// Removes the keyed entry, if present.
    pub fn remove<'k>(&mut self, key: impl Into<FieldKey<'k>>) -> Option<Entry> {
        self.position(key.into()).map(|i| self.entries.remove(i))
    }

    /// Sets a field value.
    ///
    /// A present field is updated in place. An absent field is installed only
    /// if the section template declares it; with `ignore_spec`, any field the
    /// dictionary knows may be installed, and a purely numeric key that the
    /// dictionary does not know is installed as `Field<tag>`. The return is
    /// the installed field, or `None` if the key was rejected. Group entries
    /// cannot be set through this method.
    pub fn set<'k>(
        &mut self,
        dict: &Dictionary,
        key: impl Into<FieldKey<'k>>,
        value: impl Into<Vec<u8>>,
        ignore_spec: bool,
    ) -> Option<&mut FieldValue> {
        let key = key.into();
        let value = value.into();
        if let Some(i) = self.position(key) {
            return match &mut self.entries[i] {
                Entry::Field(field) => {
                    field.set_value(value);
                    Some(field)
                }
                Entry::Group(_) => None,
            };
        }
        let declared = self.template.as_ref().and_then(|template| {
            template
                .iter()
                .find(|spec| Self::spec_matches(spec, key))
                .cloned()
        });
        match declared {
            Some(EntrySpec::Field { field, .. }) => {
                return Some(self.insert_field(FieldValue::from_def(&field, value)));
            }
            Some(EntrySpec::Group { .. }) => return None,
            None => {}
        }
        if ignore_spec {
            let def = match key {
                FieldKey::Tag(tag) => dict.field_by_tag(tag),
                FieldKey::Name(name) => match numeric_key(name) {
                    Some(tag) => dict.field_by_tag(tag),
                    None => dict.field_by_name(name),
                },
                FieldKey::Def(def) => dict.field_by_tag(def.tag()),
                FieldKey::Value(existing) => dict.field_by_tag(existing.tag()),
            };
            if let Some(def) = def {
                return Some(self.insert_field(FieldValue::from_def(def, value)));
            }
            let numeric = match key {
                FieldKey::Tag(tag) => Some(tag),
                FieldKey::Name(name) => numeric_key(name),
                _ => None,
            };
            if let Some(tag) = numeric {
                return Some(self.insert_field(FieldValue::unknown(tag, value)));
            }
        }
        None
    }

    fn spec_matches(spec: &EntrySpec, key: FieldKey) -> bool {
        match key {
            FieldKey::Tag(tag) => spec.tag() == tag,
            FieldKey::Name(name) => match numeric_key(name) {
                Some(tag) => spec.tag() == tag,
                None => spec.name() == name,
            },
            FieldKey::Def(def) => spec.name() == def.name(),
            FieldKey::Value(value) => spec.name() == value.name(),
        }
    }
}

impl PartialEq for Section {
    fn eq(&self, other: &Self) -> bool {
        // Template identity is irrelevant; two sections are equal when they
        // hold the same entries in the same order.
        self.entries == other.entries
    }
}

/// Header fields that [`Message::initialize`] never fabricates; they are the
/// session's business (or, for `BodyLength`, the serializer's).
const PROTECTED_HEADER_FIELDS: [&str; 6] = [
    "BeginString",
    "BodyLength",
    "MsgType",
    "SenderCompID",
    "TargetCompID",
    "MsgSeqNum",
];

/// A FIX message: header, body, and trailer sections tied to the dictionary
/// (and, when the `MsgType` is known, the message template) they conform to.
#[derive(Debug, Clone)]
pub struct Message {
    dict: Dictionary,
    template: Option<Arc<MessageDef>>,
    header: Section,
    body: Section,
    trailer: Section,
}

impl Message {
    /// A new, empty message of the given kind. `message` may be a `MsgType`
    /// code (`"D"`) or a message name (`"NewOrderSingle"`); `None` is
    /// returned when the dictionary knows neither.
    pub fn new(dict: &Dictionary, message: &str) -> Option<Self> {
        let template = dict
            .message_by_msg_type(message)
            .or_else(|| dict.message_by_name(message))?
            .clone();
        Some(Self::with_template(dict.clone(), template))
    }

    pub(crate) fn with_template(dict: Dictionary, template: Arc<MessageDef>) -> Self {
        let mut header = Section::with_template(dict.header().clone());
        if let Some(msg_type) = dict.field_by_name("MsgType") {
            header.insert_field(FieldValue::from_def(
                msg_type,
                template.msg_type().as_bytes(),
            ));
        }
        Self {
            header,
            body: Section::with_template(template.body().clone()),
            trailer: Section::with_template(dict.trailer().clone()),
            template: Some(template),
            dict,
        }
    }

    /// A message with no body template: every schema-known token lands in the
    /// body in arrival order. This is what decoding an unknown `MsgType`
    /// produces.
    pub fn generic(dict: &Dictionary) -> Self {
        Self {
            header: Section::with_template(dict.header().clone()),
            body: Section::new(),
            trailer: Section::with_template(dict.trailer().clone()),
            template: None,
            dict: dict.clone(),
        }
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    /// The message template, absent for generic messages.
    pub fn template(&self) -> Option<&Arc<MessageDef>> {
        self.template.as_ref()
    }

    /// The template name, e.g. `"Allocation"`.
    pub fn name(&self) -> Option<&str> {
        self.template.as_deref().map(MessageDef::name)
    }

    /// The effective `MsgType`: the header field if present, otherwise the
    /// template code.
    pub fn msg_type(&self) -> Option<FixString> {
        if let Some(field) = self.header.field(35u32) {
            return Some(field.value_str().as_ref().into());
        }
        self.template.as_deref().map(|t| t.msg_type().into())
    }

    pub fn header(&self) -> &Section {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Section {
        &mut self.header
    }

    pub fn body(&self) -> &Section {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Section {
        &mut self.body
    }

    pub fn trailer(&self) -> &Section {
        &self.trailer
    }

    pub fn trailer_mut(&mut self) -> &mut Section {
        &mut self.trailer
    }

    /// Body field lookup.
    pub fn get<'k>(&self, key: impl Into<FieldKey<'k>>) -> Option<&Entry> {
        self.body.get(key)
    }

    /// Body membership test.
    pub fn contains<'k>(&self, key: impl Into<FieldKey<'k>>) -> bool {
        self.body.contains(key)
    }

    /// Sets a body field, honoring the message template (see
    /// [`Section::set`]).
    pub fn set<'k>(
        &mut self,
        key: impl Into<FieldKey<'k>>,
        value: impl Into<Vec<u8>>,
    ) -> Option<&mut FieldValue> {
        let dict = self.dict.clone();
        self.body.set(&dict, key, value, false)
    }

    /// Sets a body field, admitting any schema-known field and unknown
    /// numeric tags.
    pub fn set_ignore_spec<'k>(
        &mut self,
        key: impl Into<FieldKey<'k>>,
        value: impl Into<Vec<u8>>,
    ) -> Option<&mut FieldValue> {
        let dict = self.dict.clone();
        self.body.set(&dict, key, value, true)
    }

    /// Sets a header field, honoring the header template.
    pub fn set_header<'k>(
        &mut self,
        key: impl Into<FieldKey<'k>>,
        value: impl Into<Vec<u8>>,
    ) -> Option<&mut FieldValue> {
        let dict = self.dict.clone();
        self.header.set(&dict, key, value, false)
    }

    /// Sets a trailer field, honoring the trailer template.
    pub fn set_trailer<'k>(
        &mut self,
        key: impl Into<FieldKey<'k>>,
        value: impl Into<Vec<u8>>,
    ) -> Option<&mut FieldValue> {
        let dict = self.dict.clone();
        self.trailer.set(&dict, key, value, false)
    }

    /// Populates absent template entries with generated values: required
    /// entries always, optional ones too when `optional` is set.
    ///
    /// Session-owned header fields (`BeginString`, `BodyLength`, `MsgType`,
    /// `SenderCompID`, `TargetCompID`, `MsgSeqNum`) are never touched, and
    /// `CheckSum` is always left to the serializer. Groups are populated with
    /// a single repetition.
    pub fn initialize(&mut self, generator: &dyn ValueGenerator, optional: bool) {
        let header_template = self.dict.header().clone();
        fill_section(
            &mut self.header,
            &header_template,
            generator,
            optional,
            &PROTECTED_HEADER_FIELDS,
        );
        if let Some(template) = self.template.clone() {
            fill_section(&mut self.body, template.body(), generator, optional, &[]);
        }
        let trailer_template = self.dict.trailer().clone();
        fill_section(
            &mut self.trailer,
            &trailer_template,
            generator,
            optional,
            &["CheckSum"],
        );
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.body == other.body && self.trailer == other.trailer
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_human())
    }
}

fn fill_section(
    section: &mut Section,
    template: &[EntrySpec],
    generator: &dyn ValueGenerator,
    optional: bool,
    skip: &[&str],
) {
    for spec in template {
        if skip.contains(&spec.name()) || section.contains(spec.name()) {
            continue;
        }
        if !(spec.required() || optional) {
            continue;
        }
        match spec {
            EntrySpec::Field { field, .. } => {
                section.insert_field(FieldValue::from_def(field, generator.value_for(field)));
            }
            EntrySpec::Group { group, .. } => {
                section.insert_group(generated_group(group, generator, optional));
            }
        }
    }
}

fn generated_group(
    group: &Arc<GroupDef>,
    generator: &dyn ValueGenerator,
    optional: bool,
) -> GroupValue {
    let mut value = GroupValue::new(group.clone());
    let mut rep = Section::with_template(group.template().clone());
    fill_section(&mut rep, group.template(), generator, optional, &[]);
    value.push_rep(rep);
    value
}
