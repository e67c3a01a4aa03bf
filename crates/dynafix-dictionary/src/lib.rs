//! Runtime FIX data dictionaries.
//!
//! A [`Dictionary`] is the in-memory form of one per-version QuickFIX XML
//! specification: field definitions, the standard header and trailer, message
//! templates, and repeating-group templates, all cross-indexed by tag number,
//! field name, message name, and `MsgType` code. Dictionaries are immutable
//! once built and cheap to clone (the data sits behind an [`Arc`]), so a
//! single loaded dictionary can be shared freely between decoders and
//! encoders.
//!
//! [`Registry`] collects dictionaries for several FIX versions and resolves
//! them by version string (`"FIX.4.2"`) or by dot-less alias (`"FIX42"`).
//!
//! ```
//! use dynafix_dictionary::Dictionary;
//!
//! let dict = Dictionary::fix42().unwrap();
//! let field = dict.field_by_name("OrdType").unwrap();
//! assert_eq!(field.tag(), 40);
//! assert_eq!(dict.field_by_tag(40).unwrap().name(), "OrdType");
//! ```

mod datatype;
mod quickfix;
mod registry;

pub use datatype::FixDatatype;
pub use quickfix::ParseDictionaryError;
pub use registry::Registry;

use nohash_hasher::IntMap;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use smartstring::{LazyCompact, SmartString};
use std::sync::Arc;

/// Compact string type used for field and message names across the workspace.
pub type FixString = SmartString<LazyCompact>;

/// One legal wire value of an enumerated field, together with its
/// human-readable description (`<value enum="1" description="MARKET"/>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEnum {
    value: FixString,
    description: FixString,
}

impl FieldEnum {
    pub(crate) fn new(value: FixString, description: FixString) -> Self {
        Self { value, description }
    }

    /// The wire representation of this variant.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The documentation description for this variant.
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// The definition of a single FIX field: tag number, name, datatype, and the
/// (possibly empty) table of enumerated values.
///
/// Field definitions are stored once per dictionary and shared by reference:
/// every template entry that mentions a field points at the same
/// [`Arc<FieldDef>`], so its enum table exists exactly once per version.
#[derive(Debug)]
pub struct FieldDef {
    name: FixString,
    tag: u32,
    data_type: FixDatatype,
    enums: SmallVec<[FieldEnum; 4]>,
}

impl FieldDef {
    pub(crate) fn new(
        name: FixString,
        tag: u32,
        data_type: FixDatatype,
        enums: SmallVec<[FieldEnum; 4]>,
    ) -> Self {
        Self {
            name,
            tag,
            data_type,
            enums,
        }
    }

    /// The field name (`"ClOrdID"`). Unique within a dictionary.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The numeric tag (`11`). Unique within a dictionary.
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// The declared datatype of this field.
    pub fn data_type(&self) -> FixDatatype {
        self.data_type
    }

    /// The ordered table of enumerated values, empty if the field is
    /// unrestricted.
    pub fn enums(&self) -> &[FieldEnum] {
        &self.enums
    }

    /// Looks up the description of a wire value in the enum table.
    pub fn enum_description(&self, value: &str) -> Option<&str> {
        self.enums
            .iter()
            .find(|e| e.value() == value)
            .map(FieldEnum::description)
    }

    /// `true` if this field length-prefixes a raw-data field.
    pub fn is_length(&self) -> bool {
        self.data_type.is_length()
    }

    /// `true` if the value of this field may contain the wire separator.
    pub fn is_data(&self) -> bool {
        self.data_type.is_data()
    }
}

/// One entry of a field-order template: either a plain field or a repeating
/// group, each with its `required` flag.
#[derive(Debug, Clone)]
pub enum EntrySpec {
    /// A plain field reference.
    Field {
        field: Arc<FieldDef>,
        required: bool,
    },
    /// A repeating group, keyed by its `NoXxx` count field.
    Group {
        group: Arc<GroupDef>,
        required: bool,
    },
}

impl EntrySpec {
    /// The entry name: the field name, or the count-field name for groups.
    pub fn name(&self) -> &str {
        match self {
            EntrySpec::Field { field, .. } => field.name(),
            EntrySpec::Group { group, .. } => group.name(),
        }
    }

    /// The entry tag: the field tag, or the count-field tag for groups.
    pub fn tag(&self) -> u32 {
        match self {
            EntrySpec::Field { field, .. } => field.tag(),
            EntrySpec::Group { group, .. } => group.tag(),
        }
    }

    /// Whether the enclosing template requires this entry.
    pub fn required(&self) -> bool {
        match self {
            EntrySpec::Field { required, .. } | EntrySpec::Group { required, .. } => *required,
        }
    }
}

/// A repeating-group template.
///
/// The group is identified by its count field (the `NoXxx` integer whose wire
/// value announces how many repetitions follow). The template lists the
/// entries of one repetition in declared order; the first entry is the
/// *delimiter*, whose recurrence on the wire marks repetition boundaries.
#[derive(Debug)]
pub struct GroupDef {
    count_field: Arc<FieldDef>,
    template: Arc<[EntrySpec]>,
    member_tags: FxHashSet<u32>,
}

impl GroupDef {
    pub(crate) fn new(count_field: Arc<FieldDef>, template: Vec<EntrySpec>) -> Self {
        debug_assert!(!template.is_empty());
        let mut member_tags = FxHashSet::default();
        collect_member_tags(&template, &mut member_tags);
        Self {
            count_field,
            template: template.into(),
            member_tags,
        }
    }

    /// The group name, which is the name of its count field (`"NoAllocs"`).
    pub fn name(&self) -> &str {
        self.count_field.name()
    }

    /// The tag of the count field.
    pub fn tag(&self) -> u32 {
        self.count_field.tag()
    }

    /// The count-field definition.
    pub fn count_field(&self) -> &Arc<FieldDef> {
        &self.count_field
    }

    /// The entries of one repetition, in declared order.
    pub fn template(&self) -> &Arc<[EntrySpec]> {
        &self.template
    }

    /// The tag of the delimiter field (first template entry).
    pub fn delimiter_tag(&self) -> u32 {
        self.template[0].tag()
    }

    /// `true` if `tag` belongs to this template, looking through nested
    /// groups transitively. Count fields of nested groups are members too.
    pub fn contains_tag(&self, tag: u32) -> bool {
        self.member_tags.contains(&tag)
    }
}

fn collect_member_tags(entries: &[EntrySpec], out: &mut FxHashSet<u32>) {
    for entry in entries {
        match entry {
            EntrySpec::Field { field, .. } => {
                out.insert(field.tag());
            }
            EntrySpec::Group { group, .. } => {
                out.insert(group.tag());
                out.extend(group.member_tags.iter().copied());
            }
        }
    }
}

/// Whether a message belongs to the session (admin) or application layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MsgCategory {
    Admin,
    App,
}

impl MsgCategory {
    pub(crate) fn from_quickfix_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("admin") {
            MsgCategory::Admin
        } else {
            MsgCategory::App
        }
    }
}

/// A message template: name, `MsgType` wire code, category, and the body
/// field order.
#[derive(Debug)]
pub struct MessageDef {
    name: FixString,
    msg_type: FixString,
    category: MsgCategory,
    body: Arc<[EntrySpec]>,
}

impl MessageDef {
    pub(crate) fn new(
        name: FixString,
        msg_type: FixString,
        category: MsgCategory,
        body: Vec<EntrySpec>,
    ) -> Self {
        Self {
            name,
            msg_type,
            category,
            body: body.into(),
        }
    }

    /// The message name (`"NewOrderSingle"`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `MsgType` wire code (`"D"`).
    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    /// Session- or application-level classification.
    pub fn category(&self) -> MsgCategory {
        self.category
    }

    /// The body entries, in declared order.
    pub fn body(&self) -> &Arc<[EntrySpec]> {
        &self.body
    }
}

/// An immutable, fully indexed FIX dictionary for one protocol version.
#[derive(Debug, Clone)]
pub struct Dictionary {
    inner: Arc<DictionaryData>,
}

#[derive(Debug)]
struct DictionaryData {
    version: FixString,
    alias: FixString,
    fields: Vec<Arc<FieldDef>>,
    fields_by_name: FxHashMap<FixString, usize>,
    fields_by_tag: IntMap<u32, usize>,
    header: Arc<[EntrySpec]>,
    trailer: Arc<[EntrySpec]>,
    messages: Vec<Arc<MessageDef>>,
    messages_by_name: FxHashMap<FixString, usize>,
    messages_by_msg_type: FxHashMap<FixString, usize>,
    groups: FxHashMap<FixString, Arc<GroupDef>>,
}

impl Dictionary {
    /// Reads a QuickFIX-style XML specification into a [`Dictionary`].
    pub fn from_quickfix_spec(input: &str) -> Result<Self, ParseDictionaryError> {
        let xml_document = roxmltree::Document::parse(input)?;
        quickfix::QuickFixReader::from_xml(&xml_document)
    }

    /// The bundled FIX 4.2 dictionary.
    pub fn fix42() -> Result<Self, ParseDictionaryError> {
        Self::from_quickfix_spec(include_str!("resources/FIX42.xml"))
    }

    /// The bundled FIX 4.3 dictionary.
    pub fn fix43() -> Result<Self, ParseDictionaryError> {
        Self::from_quickfix_spec(include_str!("resources/FIX43.xml"))
    }

    /// The bundled FIX 4.4 dictionary.
    pub fn fix44() -> Result<Self, ParseDictionaryError> {
        Self::from_quickfix_spec(include_str!("resources/FIX44.xml"))
    }

    /// The version string of this dictionary (`"FIX.4.2"`).
    pub fn version(&self) -> &str {
        &self.inner.version
    }

    /// The dot-less alias of the version string (`"FIX42"`).
    pub fn alias(&self) -> &str {
        &self.inner.alias
    }

    /// Looks up a field definition by tag number.
    pub fn field_by_tag(&self, tag: u32) -> Option<&Arc<FieldDef>> {
        self.inner
            .fields_by_tag
            .get(&tag)
            .map(|i| &self.inner.fields[*i])
    }

    /// Looks up a field definition by name.
    pub fn field_by_name(&self, name: &str) -> Option<&Arc<FieldDef>> {
        self.inner
            .fields_by_name
            .get(name)
            .map(|i| &self.inner.fields[*i])
    }

    /// Looks up a message template by its `MsgType` wire code.
    pub fn message_by_msg_type(&self, msg_type: &str) -> Option<&Arc<MessageDef>> {
        self.inner
            .messages_by_msg_type
            .get(msg_type)
            .map(|i| &self.inner.messages[*i])
    }

    /// Looks up a message template by name.
    pub fn message_by_name(&self, name: &str) -> Option<&Arc<MessageDef>> {
        self.inner
            .messages_by_name
            .get(name)
            .map(|i| &self.inner.messages[*i])
    }

    /// Looks up a top-level repeating-group template by its count-field name.
    ///
    /// When several messages declare a group under the same name, the first
    /// registered template wins; per-message templates are always reachable
    /// through [`MessageDef::body`].
    pub fn group_by_name(&self, name: &str) -> Option<&Arc<GroupDef>> {
        self.inner.groups.get(name)
    }

    /// The standard header template, in declared order.
    pub fn header(&self) -> &Arc<[EntrySpec]> {
        &self.inner.header
    }

    /// The standard trailer template, in declared order.
    pub fn trailer(&self) -> &Arc<[EntrySpec]> {
        &self.inner.trailer
    }

    /// All field definitions, in declaration order.
    pub fn iter_fields(&self) -> impl Iterator<Item = &Arc<FieldDef>> {
        self.inner.fields.iter()
    }

    /// All message templates, in declaration order.
    pub fn iter_messages(&self) -> impl Iterator<Item = &Arc<MessageDef>> {
        self.inner.messages.iter()
    }
}

pub(crate) struct DictionaryBuilder {
    version: FixString,
    fields: Vec<Arc<FieldDef>>,
    fields_by_name: FxHashMap<FixString, usize>,
    fields_by_tag: IntMap<u32, usize>,
    header: Option<Vec<EntrySpec>>,
    trailer: Option<Vec<EntrySpec>>,
    messages: Vec<Arc<MessageDef>>,
    messages_by_name: FxHashMap<FixString, usize>,
    messages_by_msg_type: FxHashMap<FixString, usize>,
    groups: FxHashMap<FixString, Arc<GroupDef>>,
}

impl DictionaryBuilder {
    pub(crate) fn new(version: FixString) -> Self {
        Self {
            version,
            fields: Vec::new(),
            fields_by_name: FxHashMap::default(),
            fields_by_tag: IntMap::default(),
            header: None,
            trailer: None,
            messages: Vec::new(),
            messages_by_name: FxHashMap::default(),
            messages_by_msg_type: FxHashMap::default(),
            groups: FxHashMap::default(),
        }
    }

    pub(crate) fn add_field(&mut self, field: FieldDef) -> Result<(), ParseDictionaryError> {
        if self.fields_by_tag.contains_key(&field.tag()) {
            return Err(ParseDictionaryError::DuplicateTag(field.tag()));
        }
        let i = self.fields.len();
        self.fields_by_name.insert(field.name.clone(), i);
        self.fields_by_tag.insert(field.tag(), i);
        self.fields.push(Arc::new(field));
        Ok(())
    }

    pub(crate) fn field_by_name(&self, name: &str) -> Option<&Arc<FieldDef>> {
        self.fields_by_name.get(name).map(|i| &self.fields[*i])
    }

    pub(crate) fn set_header(&mut self, entries: Vec<EntrySpec>) {
        self.header = Some(entries);
    }

    pub(crate) fn set_trailer(&mut self, entries: Vec<EntrySpec>) {
        self.trailer = Some(entries);
    }

    pub(crate) fn add_message(&mut self, message: MessageDef) {
        let i = self.messages.len();
        self.messages_by_name.insert(message.name.clone(), i);
        self.messages_by_msg_type
            .insert(message.msg_type.clone(), i);
        self.messages.push(Arc::new(message));
    }

    /// Records a group template under its count-field name; the first
    /// registration wins.
    pub(crate) fn register_group(&mut self, group: Arc<GroupDef>) {
        self.groups.entry(group.name().into()).or_insert(group);
    }

    pub(crate) fn build(self) -> Dictionary {
        let alias: FixString = self.version.chars().filter(|c| *c != '.').collect();
        Dictionary {
            inner: Arc::new(DictionaryData {
                version: self.version,
                alias,
                fields: self.fields,
                fields_by_name: self.fields_by_name,
                fields_by_tag: self.fields_by_tag,
                header: self.header.unwrap_or_default().into(),
                trailer: self.trailer.unwrap_or_default().into(),
                messages: self.messages,
                messages_by_name: self.messages_by_name,
                messages_by_msg_type: self.messages_by_msg_type,
                groups: self.groups,
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fix42_lookups() {
        let dict = Dictionary::fix42().unwrap();
        assert_eq!(dict.version(), "FIX.4.2");
        assert_eq!(dict.alias(), "FIX42");

        let ord_type = dict.field_by_name("OrdType").unwrap();
        assert_eq!(ord_type.tag(), 40);
        assert_eq!(ord_type.data_type(), FixDatatype::Char);
        assert_eq!(ord_type.enum_description("1"), Some("MARKET"));

        let nos = dict.message_by_msg_type("D").unwrap();
        assert_eq!(nos.name(), "NewOrderSingle");
        assert_eq!(nos.category(), MsgCategory::App);
        assert!(Arc::ptr_eq(nos, dict.message_by_name("NewOrderSingle").unwrap()));
    }

    #[test]
    fn header_starts_with_framing_fields() {
        let dict = Dictionary::fix42().unwrap();
        let header = dict.header();
        assert_eq!(header[0].tag(), 8);
        assert_eq!(header[1].tag(), 9);
        assert_eq!(header[2].tag(), 35);
        assert!(header[0].required());

        let trailer = dict.trailer();
        assert_eq!(trailer.last().unwrap().tag(), 10);
    }

    #[test]
    fn enum_tables_are_shared_by_identity() {
        let dict = Dictionary::fix42().unwrap();
        let catalog_def = dict.field_by_name("OrdType").unwrap();
        let nos = dict.message_by_name("NewOrderSingle").unwrap();
        let template_def = nos
            .body()
            .iter()
            .find_map(|entry| match entry {
                EntrySpec::Field { field, .. } if field.name() == "OrdType" => Some(field),
                _ => None,
            })
            .unwrap();
        assert!(Arc::ptr_eq(catalog_def, template_def));
    }

    #[test]
    fn group_templates_track_membership() {
        let dict = Dictionary::fix42().unwrap();
        let alloc = dict.message_by_msg_type("J").unwrap();
        let no_allocs = alloc
            .body()
            .iter()
            .find_map(|entry| match entry {
                EntrySpec::Group { group, .. } if group.name() == "NoAllocs" => Some(group),
                _ => None,
            })
            .unwrap();
        assert_eq!(no_allocs.tag(), 78);
        // AllocAccount delimits each repetition.
        assert_eq!(no_allocs.delimiter_tag(), 79);
        // Members are transitive through the nested NoMiscFees group.
        assert!(no_allocs.contains_tag(80));
        assert!(no_allocs.contains_tag(136));
        assert!(no_allocs.contains_tag(137));
        // A header field is not a member.
        assert!(!no_allocs.contains_tag(49));
    }

    #[test]
    fn top_level_group_catalog() {
        let dict = Dictionary::fix42().unwrap();
        let group = dict.group_by_name("NoQuoteSets").unwrap();
        assert_eq!(group.tag(), 296);
        assert_eq!(group.delimiter_tag(), 302);
        assert!(group.contains_tag(295));
        assert!(group.contains_tag(299));
    }

    #[test]
    fn all_bundled_versions_load() {
        for (dict, version) in [
            (Dictionary::fix42(), "FIX.4.2"),
            (Dictionary::fix43(), "FIX.4.3"),
            (Dictionary::fix44(), "FIX.4.4"),
        ] {
            let dict = dict.unwrap();
            assert_eq!(dict.version(), version);
            assert!(dict.message_by_msg_type("A").is_some());
            assert!(dict.field_by_tag(8).is_some());
        }
    }
}
