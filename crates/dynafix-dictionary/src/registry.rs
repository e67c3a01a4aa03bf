//! Multi-version dictionary registry.

use super::{Dictionary, FixString, ParseDictionaryError};
use rustc_hash::FxHashMap;

/// A catalog of [`Dictionary`] values keyed by FIX version.
///
/// Every registered dictionary is reachable both under its dotted version
/// string (`"FIX.4.2"`) and under the dot-less alias (`"FIX42"`). The default
/// registry carries the three bundled dictionaries; additional versions can
/// be registered at runtime from QuickFIX XML.
///
/// Registration is all-or-nothing: a dictionary that fails to parse leaves
/// the registry untouched. A [`Registry`] is cheap to clone (dictionaries are
/// shared), so publishing an updated catalog to concurrent readers amounts to
/// swapping one immutable value for another.
///
/// ```
/// use dynafix_dictionary::Registry;
///
/// let registry = Registry::bundled();
/// assert_eq!(registry.field_number("OrdType", "FIX.4.2"), Some(40));
/// assert_eq!(registry.field_name(40, "FIX42"), Some("OrdType"));
/// ```
#[derive(Debug, Clone)]
pub struct Registry {
    by_version: FxHashMap<FixString, Dictionary>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::bundled()
    }
}

impl Registry {
    /// A registry with no dictionaries.
    pub fn empty() -> Self {
        Self {
            by_version: FxHashMap::default(),
        }
    }

    /// A registry pre-populated with the bundled FIX 4.2, 4.3, and 4.4
    /// dictionaries.
    pub fn bundled() -> Self {
        let mut registry = Self::empty();
        for spec in [
            include_str!("resources/FIX42.xml"),
            include_str!("resources/FIX43.xml"),
            include_str!("resources/FIX44.xml"),
        ] {
            registry
                .register_version(spec)
                .expect("bundled dictionary is well-formed");
        }
        registry
    }

    /// Parses a QuickFIX XML specification and registers the resulting
    /// dictionary, returning a handle to it.
    pub fn register_version(&mut self, xml: &str) -> Result<Dictionary, ParseDictionaryError> {
        let dict = Dictionary::from_quickfix_spec(xml)?;
        self.register(dict.clone());
        Ok(dict)
    }

    /// Registers an already-built dictionary under its version string and
    /// alias, replacing any previous dictionary for that version.
    pub fn register(&mut self, dict: Dictionary) {
        self.by_version.insert(dict.version().into(), dict.clone());
        self.by_version.insert(dict.alias().into(), dict);
    }

    /// Resolves a dictionary by dotted version string or alias.
    pub fn version(&self, version: &str) -> Option<&Dictionary> {
        self.by_version.get(version)
    }

    /// `true` if `version` (dotted or alias) resolves to a dictionary.
    pub fn contains_version(&self, version: &str) -> bool {
        self.by_version.contains_key(version)
    }

    /// Iterates over the registered dictionaries, once each.
    pub fn iter(&self) -> impl Iterator<Item = &Dictionary> {
        self.by_version
            .iter()
            .filter(|(key, dict)| key.as_str() == dict.version())
            .map(|(_, dict)| dict)
    }

    /// The tag number of the field named `name` in `version`.
    pub fn field_number(&self, name: &str, version: &str) -> Option<u32> {
        self.version(version)?
            .field_by_name(name)
            .map(|field| field.tag())
    }

    /// The name of the field with tag `tag` in `version`.
    pub fn field_name(&self, tag: u32, version: &str) -> Option<&str> {
        self.version(version)?
            .field_by_tag(tag)
            .map(|field| field.name())
    }

    /// The name of the message with `MsgType` code `msg_type` in `version`.
    pub fn message_name(&self, msg_type: &str, version: &str) -> Option<&str> {
        self.version(version)?
            .message_by_msg_type(msg_type)
            .map(|message| message.name())
    }

    /// The `MsgType` code of the message named `name` in `version`.
    pub fn message_type(&self, name: &str, version: &str) -> Option<&str> {
        self.version(version)?
            .message_by_name(name)
            .map(|message| message.msg_type())
    }
}
