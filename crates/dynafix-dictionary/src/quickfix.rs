//! QuickFIX XML specification reader.

use super::*;
use smallvec::SmallVec;

type ParseResult<T> = Result<T, ParseDictionaryError>;

/// The error type that can arise while reading a QuickFIX dictionary.
#[derive(Debug, thiserror::Error)]
pub enum ParseDictionaryError {
    #[error("invalid XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("invalid format")]
    InvalidFormat,
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("layout references unknown field `{0}`")]
    UnknownField(String),
    #[error("component `{0}` expands through itself")]
    CircularComponent(String),
    #[error("field tag {0} is defined more than once")]
    DuplicateTag(u32),
}

pub(crate) struct QuickFixReader<'a> {
    node_with_header: roxmltree::Node<'a, 'a>,
    node_with_trailer: roxmltree::Node<'a, 'a>,
    node_with_components: roxmltree::Node<'a, 'a>,
    node_with_messages: roxmltree::Node<'a, 'a>,
    node_with_fields: roxmltree::Node<'a, 'a>,
    builder: DictionaryBuilder,
}

impl<'a> QuickFixReader<'a> {
    pub(crate) fn from_xml(xml_document: &'a roxmltree::Document<'a>) -> ParseResult<Dictionary> {
        let mut reader = Self::empty(xml_document)?;
        for child in reader.node_with_fields.children() {
            if child.is_element() {
                import_field(&mut reader.builder, child)?;
            }
        }
        // Components are expanded inline at every reference; `expansion`
        // tracks the chain of component names being spliced so that a
        // self-referencing definition is caught instead of recursing forever.
        let components = reader.node_with_components;
        let mut expansion = Vec::new();
        let header = resolve_entries(
            &mut reader.builder,
            reader.node_with_header,
            components,
            &mut expansion,
        )?;
        reader.builder.set_header(header);
        let trailer = resolve_entries(
            &mut reader.builder,
            reader.node_with_trailer,
            components,
            &mut expansion,
        )?;
        reader.builder.set_trailer(trailer);
        for child in reader.node_with_messages.children() {
            if child.is_element() {
                import_message(&mut reader.builder, child, components, &mut expansion)?;
            }
        }
        Ok(reader.builder.build())
    }

    fn empty(xml_document: &'a roxmltree::Document<'a>) -> ParseResult<Self> {
        let root = xml_document.root_element();
        let find_tagged_child = |tag: &str| {
            root.children()
                .find(|n| n.has_tag_name(tag))
                .ok_or_else(|| ParseDictionaryError::InvalidData(format!("<{tag}> tag not found")))
        };
        let version_type = root
            .attribute("type")
            .ok_or(ParseDictionaryError::InvalidData(
                "no version attribute".to_string(),
            ))?;
        let version_major = root
            .attribute("major")
            .ok_or(ParseDictionaryError::InvalidData(
                "no major version attribute".to_string(),
            ))?;
        let version_minor = root
            .attribute("minor")
            .ok_or(ParseDictionaryError::InvalidData(
                "no minor version attribute".to_string(),
            ))?;
        let version_sp = root.attribute("servicepack").unwrap_or("0");
        let version = format!(
            "{}.{}.{}{}",
            version_type,
            version_major,
            version_minor,
            // Omit the service pack suffix when it is zero.
            if version_sp != "0" {
                format!("-SP{version_sp}")
            } else {
                String::new()
            }
        );
        Ok(QuickFixReader {
            builder: DictionaryBuilder::new(version.into()),
            node_with_header: find_tagged_child("header")?,
            node_with_trailer: find_tagged_child("trailer")?,
            node_with_messages: find_tagged_child("messages")?,
            node_with_components: find_tagged_child("components")?,
            node_with_fields: find_tagged_child("fields")?,
        })
    }
}

fn import_field(builder: &mut DictionaryBuilder, node: roxmltree::Node) -> ParseResult<()> {
    if node.tag_name().name() != "field" {
        return Err(ParseDictionaryError::InvalidFormat);
    }
    let name = node
        .attribute("name")
        .ok_or(ParseDictionaryError::InvalidFormat)?;
    let tag = node
        .attribute("number")
        .ok_or(ParseDictionaryError::InvalidFormat)?
        .parse()
        .map_err(|_| ParseDictionaryError::InvalidFormat)?;
    let type_name = node
        .attribute("type")
        .ok_or(ParseDictionaryError::InvalidFormat)?;
    let data_type = FixDatatype::from_quickfix_name(type_name).ok_or_else(|| {
        ParseDictionaryError::InvalidData(format!(
            "field `{name}` has unknown datatype `{type_name}`"
        ))
    })?;
    let mut enums = SmallVec::new();
    for child in node.children() {
        if child.is_element() {
            let value = child
                .attribute("enum")
                .ok_or(ParseDictionaryError::InvalidFormat)?;
            let description = child
                .attribute("description")
                .ok_or(ParseDictionaryError::InvalidFormat)?;
            enums.push(FieldEnum::new(value.into(), description.into()));
        }
    }
    builder.add_field(FieldDef::new(name.into(), tag, data_type, enums))
}

fn import_message<'a>(
    builder: &mut DictionaryBuilder,
    node: roxmltree::Node<'a, 'a>,
    components: roxmltree::Node<'a, 'a>,
    expansion: &mut Vec<String>,
) -> ParseResult<()> {
    debug_assert_eq!(node.tag_name().name(), "message");
    let name = node
        .attribute("name")
        .ok_or(ParseDictionaryError::InvalidFormat)?;
    let msg_type = node
        .attribute("msgtype")
        .ok_or(ParseDictionaryError::InvalidFormat)?;
    let category = node
        .attribute("msgcat")
        .map(MsgCategory::from_quickfix_name)
        .unwrap_or(MsgCategory::App);
    let body = resolve_entries(builder, node, components, expansion)?;
    builder.add_message(MessageDef::new(
        name.into(),
        msg_type.into(),
        category,
        body,
    ));
    Ok(())
}

/// Resolves the children of `parent` into an ordered entry list, splicing
/// `<component>` references inline and building nested group templates
/// recursively. Fields must already be imported.
fn resolve_entries<'a>(
    builder: &mut DictionaryBuilder,
    parent: roxmltree::Node<'a, 'a>,
    components: roxmltree::Node<'a, 'a>,
    expansion: &mut Vec<String>,
) -> ParseResult<Vec<EntrySpec>> {
    let mut entries = Vec::new();
    for child in parent.children().filter(|n| n.is_element()) {
        let name = child
            .attribute("name")
            .ok_or(ParseDictionaryError::InvalidFormat)?;
        match child.tag_name().name() {
            "field" => {
                let required = child.attribute("required") == Some("Y");
                let field = builder
                    .field_by_name(name)
                    .ok_or_else(|| ParseDictionaryError::UnknownField(name.to_string()))?
                    .clone();
                entries.push(EntrySpec::Field { field, required });
            }
            "group" => {
                let required = child.attribute("required") == Some("Y");
                let count_field = builder
                    .field_by_name(name)
                    .ok_or_else(|| ParseDictionaryError::UnknownField(name.to_string()))?
                    .clone();
                let template = resolve_entries(builder, child, components, expansion)?;
                if template.is_empty() {
                    return Err(ParseDictionaryError::InvalidData(format!(
                        "group `{name}` has an empty template"
                    )));
                }
                let group = Arc::new(GroupDef::new(count_field, template));
                builder.register_group(group.clone());
                entries.push(EntrySpec::Group { group, required });
            }
            "component" => {
                if expansion.iter().any(|seen| seen == name) {
                    return Err(ParseDictionaryError::CircularComponent(name.to_string()));
                }
                let definition = components
                    .children()
                    .filter(|n| n.is_element())
                    .find(|n| n.attribute("name") == Some(name))
                    .ok_or_else(|| {
                        ParseDictionaryError::InvalidData(format!(
                            "reference to unknown component `{name}`"
                        ))
                    })?;
                expansion.push(name.to_string());
                let spliced = resolve_entries(builder, definition, components, expansion)?;
                expansion.pop();
                entries.extend(spliced);
            }
            other => {
                return Err(ParseDictionaryError::InvalidData(format!(
                    "unexpected <{other}> element in layout"
                )));
            }
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod test {
    use super::*;

    const MINIMAL: &str = r#"
<fix type="FIX" major="4" minor="2">
 <header>
  <field name="BeginString" required="Y"/>
 </header>
 <trailer>
  <field name="CheckSum" required="Y"/>
 </trailer>
 <messages>
  <message name="Heartbeat" msgtype="0" msgcat="admin">
   <field name="TestReqID" required="N"/>
  </message>
 </messages>
 <components/>
 <fields>
  <field number="8" name="BeginString" type="STRING"/>
  <field number="10" name="CheckSum" type="STRING"/>
  <field number="112" name="TestReqID" type="STRING"/>
 </fields>
</fix>"#;

    #[test]
    fn minimal_spec_loads() {
        let dict = Dictionary::from_quickfix_spec(MINIMAL).unwrap();
        assert_eq!(dict.version(), "FIX.4.2");
        assert_eq!(dict.header().len(), 1);
        assert_eq!(dict.trailer().len(), 1);
        let heartbeat = dict.message_by_msg_type("0").unwrap();
        assert_eq!(heartbeat.name(), "Heartbeat");
        assert_eq!(heartbeat.category(), MsgCategory::Admin);
    }

    #[test]
    fn duplicate_tags_are_rejected() {
        let spec = MINIMAL.replace(
            r#"<field number="112" name="TestReqID" type="STRING"/>"#,
            r#"<field number="8" name="TestReqID" type="STRING"/>"#,
        );
        assert!(matches!(
            Dictionary::from_quickfix_spec(&spec),
            Err(ParseDictionaryError::DuplicateTag(8))
        ));
    }

    #[test]
    fn unknown_field_references_are_rejected() {
        let spec = MINIMAL.replace(
            r#"<field name="TestReqID" required="N"/>"#,
            r#"<field name="NotAField" required="N"/>"#,
        );
        assert!(matches!(
            Dictionary::from_quickfix_spec(&spec),
            Err(ParseDictionaryError::UnknownField(name)) if name == "NotAField"
        ));
    }

    #[test]
    fn circular_components_are_rejected() {
        let spec = MINIMAL.replace(
            "<components/>",
            r#"<components>
              <component name="Ouro">
               <field name="TestReqID" required="N"/>
               <component name="Boros"/>
              </component>
              <component name="Boros">
               <component name="Ouro"/>
              </component>
             </components>"#,
        ).replace(
            r#"<field name="TestReqID" required="N"/>
  </message>"#,
            r#"<component name="Ouro"/>
  </message>"#,
        );
        assert!(matches!(
            Dictionary::from_quickfix_spec(&spec),
            Err(ParseDictionaryError::CircularComponent(_))
        ));
    }

    #[test]
    fn missing_top_level_sections_are_rejected() {
        let spec = MINIMAL.replace("<components/>", "");
        assert!(matches!(
            Dictionary::from_quickfix_spec(&spec),
            Err(ParseDictionaryError::InvalidData(_))
        ));
    }

    #[test]
    fn broken_xml_is_rejected() {
        assert!(matches!(
            Dictionary::from_quickfix_spec("<fix type='FIX'"),
            Err(ParseDictionaryError::Xml(_))
        ));
    }
}
