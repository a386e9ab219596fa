use std::any::Any;

use log::debug;

use super::items::{ItemSet, ResolvedItem};
use super::{SerializerContext, TypeSerializer};
use crate::core::shape::SequenceShape;
use crate::core::state::SerializationState;
use crate::core::type_info::TypeKey;
use crate::error::{XmlError, XmlResult};
use crate::xml::{XmlEvent, XmlName, XmlReader, XmlWriter};

/// Maps a sequence to one child element per item, named by the item's alias.
///
/// With a single item type any child element is read as that type, so the
/// alias only matters on write.
pub struct ListSerializer {
    key: TypeKey,
    shape: SequenceShape,
    items: ItemSet,
}

impl ListSerializer {
    pub fn build(
        context: &SerializerContext<'_>,
        key: TypeKey,
        shape: SequenceShape,
    ) -> XmlResult<Self> {
        let items = ItemSet::build(context, shape.item, &shape.tags, &[])?;
        debug!(
            "List serializer for {} with items [{}]",
            context.member_name(),
            items
                .items()
                .iter()
                .map(|item| item.alias())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Self { key, shape, items })
    }

    pub fn items(&self) -> &ItemSet {
        &self.items
    }

    fn resolve_child<'s>(
        &'s self,
        reader: &XmlReader<'_>,
        state: &SerializationState<'_>,
    ) -> XmlResult<Option<ResolvedItem<'s>>> {
        let tag = reader.start()?;
        if let Some(item) = self.items.by_alias(&tag.name.local) {
            return Ok(Some(ResolvedItem::Declared(item)));
        }
        if let Some(resolved) = self.items.resolve_element(tag, state)? {
            return Ok(Some(resolved));
        }
        Ok(self.items.single().map(ResolvedItem::Declared))
    }
}

impl TypeSerializer for ListSerializer {
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
        let values = (self.shape.items)(value)
            .ok_or_else(|| XmlError::unexpected_value(self.key.name()))?;
        for item in values {
            match self.items.resolve_value(item, state)? {
                Some((resolved, concrete)) => {
                    state.start_element(writer, &XmlName::local(resolved.alias()))?;
                    self.items.write_content(&resolved, concrete, writer, state)?;
                    state.end_element(writer)?;
                }
                None => {
                    state.start_element(writer, &XmlName::local(self.items.null_alias()))?;
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
        let mut buffer: Vec<Box<dyn Any>> = Vec::new();
        if reader.enter()? {
            loop {
                match reader.event() {
                    XmlEvent::Start(_) => match self.resolve_child(reader, state)? {
                        Some(item) => buffer.push(self.items.read_item(&item, reader, state)?),
                        None => {
                            let node = reader.read_node()?;
                            debug!("No item type for <{}> in {}", node.name, self.key);
                            state.report_unhandled(node);
                        }
                    },
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
        (self.shape.collect)(buffer).ok_or_else(|| {
            XmlError::RuntimeTypeMismatch(format!(
                "items read for {} do not match its item type",
                self.key
            ))
        })
    }
}
