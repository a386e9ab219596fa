use std::any::Any;

use log::debug;

use super::items::{ItemSet, ResolvedItem};
use super::{SerializerContext, TYPE_ALIAS_ATTRIBUTE, TypeSerializer};
use crate::core::shape::MapShape;
use crate::core::state::SerializationState;
use crate::core::type_info::TypeKey;
use crate::error::{XmlError, XmlResult};
use crate::xml::{XmlEvent, XmlName, XmlReader, XmlWriter};

/// Maps a string-keyed map to one `<key>value</key>` element per entry.
///
/// The value's alias is written as a `typealias` attribute only when the map
/// declares several value types.
pub struct DictionarySerializer {
    key: TypeKey,
    shape: MapShape,
    values: ItemSet,
}

impl DictionarySerializer {
    pub fn build(context: &SerializerContext<'_>, key: TypeKey, shape: MapShape) -> XmlResult<Self> {
        let values = ItemSet::build(context, shape.value, &shape.tags, &[])?;
        debug!(
            "Dictionary serializer for {} with {} value types",
            context.member_name(),
            values.items().len()
        );
        Ok(Self { key, shape, values })
    }

    fn writes_alias(&self, item: &ResolvedItem<'_>) -> bool {
        item.is_dynamic() || self.values.items().len() > 1
    }

    fn resolve_entry<'s>(
        &'s self,
        reader: &XmlReader<'_>,
        state: &SerializationState<'_>,
    ) -> XmlResult<Option<ResolvedItem<'s>>> {
        let tag = reader.start()?;
        let alias = tag.attribute(TYPE_ALIAS_ATTRIBUTE);
        if let Some(item) = alias.and_then(|alias| self.values.by_alias(alias)) {
            return Ok(Some(ResolvedItem::Declared(item)));
        }
        if alias.is_none() {
            if let Some(item) = self.values.single() {
                return Ok(Some(ResolvedItem::Declared(item)));
            }
        }
        self.values.resolve_element(tag, state)
    }
}

impl TypeSerializer for DictionarySerializer {
    fn supported_type(&self) -> TypeKey {
        self.key
    }

    fn member_bound(&self) -> bool {
        true
    }

    fn serialize(
        &self,
        value: &dyn Any,
        writer: &mut XmlWriter<'_>,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<()> {
        let entries = (self.shape.entries)(value)
            .ok_or_else(|| XmlError::unexpected_value(self.key.name()))?;
        for (key, value) in entries {
            if !XmlName::is_valid_local(&key) {
                return Err(XmlError::Write(format!(
                    "key `{}` of {} is not a valid element name",
                    key, self.key
                )));
            }
            let name = XmlName::local(key);
            match self.values.resolve_value(value, state)? {
                Some((item, concrete)) => {
                    state.start_element(writer, &name)?;
                    if self.writes_alias(&item) {
                        writer.write_attribute(TYPE_ALIAS_ATTRIBUTE, item.alias())?;
                    }
                    self.values.write_content(&item, concrete, writer, state)?;
                    state.end_element(writer)?;
                }
                None => {
                    state.start_element(writer, &name)?;
                    state.end_element(writer)?;
                }
            }
        }
        Ok(())
    }

    fn deserialize(
        &self,
        reader: &mut XmlReader<'_>,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<Box<dyn Any>> {
        let mut entries: Vec<(String, Box<dyn Any>)> = Vec::new();
        if reader.enter()? {
            loop {
                match reader.event() {
                    XmlEvent::Start(tag) => {
                        let key = tag.name.local.clone();
                        match self.resolve_entry(reader, state)? {
                            Some(item) => {
                                let value = self.values.read_item(&item, reader, state)?;
                                entries.push((key, value));
                            }
                            None => {
                                let node = reader.read_node()?;
                                debug!("No value type for entry <{}> in {}", node.name, self.key);
                                state.report_unhandled(node);
                            }
                        }
                    }
                    XmlEvent::Text(_) => reader.advance()?,
                    XmlEvent::End(_) => {
                        reader.advance()?;
                        break;
                    }
                    XmlEvent::Eof | XmlEvent::StartDocument => {
                        return Err(XmlReader::unexpected_eof());
                    }
                }
            }
        }
        (self.shape.collect)(entries)
            .map_err(|message| XmlError::conversion("", self.key.name(), message))
    }
}
