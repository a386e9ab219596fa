//! Serializers that pass values through without a schema of their own.

use std::any::Any;

use super::{TextSerializer, TypeSerializer};
use crate::core::registry::KnownTypes;
use crate::core::state::SerializationState;
use crate::core::type_info::TypeKey;
use crate::error::{XmlError, XmlResult};
use crate::xml::{XmlContent, XmlNode, XmlReader, XmlWriter};

/// Captures and replays an element's markup as an [`XmlNode`].
///
/// The node's own name is not written: the element is the member's.
pub struct RawNodeSerializer {
    key: TypeKey,
}

impl RawNodeSerializer {
    pub fn new(key: TypeKey) -> Self {
        Self { key }
    }

    fn write_children(
        node: &XmlNode,
        writer: &mut XmlWriter<'_>,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<()> {
        for attribute in &node.attributes {
            state.write_attribute(writer, &attribute.name, &attribute.value)?;
        }
        for child in &node.children {
            match child {
                XmlContent::Text(text) => writer.write_text(text)?,
                XmlContent::Element(element) => {
                    state.start_element(writer, &element.name)?;
                    Self::write_children(element, writer, state)?;
                    state.end_element(writer)?;
                }
            }
        }
        Ok(())
    }
}

impl TypeSerializer for RawNodeSerializer {
    fn supported_type(&self) -> TypeKey {
        self.key
    }

    fn serialize(
        &self,
        value: &dyn Any,
        writer: &mut XmlWriter<'_>,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<()> {
        let node = value
            .downcast_ref::<XmlNode>()
            .ok_or_else(|| XmlError::unexpected_value(self.key.name()))?;
        Self::write_children(node, writer, state)
    }

    fn deserialize(
        &self,
        reader: &mut XmlReader<'_>,
        _state: &mut SerializationState<'_>,
    ) -> XmlResult<Box<dyn Any>> {
        Ok(Box::new(reader.read_node()?))
    }
}

/// Writes a [`TypeKey`] as its type name, resolved back through the registry's known types.
pub struct TypeRefSerializer {
    key: TypeKey,
    known_types: KnownTypes,
}

impl TypeRefSerializer {
    pub(crate) fn new(key: TypeKey, known_types: KnownTypes) -> Self {
        Self { key, known_types }
    }
}

impl TextSerializer for TypeRefSerializer {
    fn format(&self, value: &dyn Any) -> XmlResult<String> {
        value
            .downcast_ref::<TypeKey>()
            .map(|key| key.name().to_string())
            .ok_or_else(|| XmlError::unexpected_value(self.key.name()))
    }

    fn parse(&self, text: &str) -> XmlResult<Box<dyn Any>> {
        self.known_types
            .resolve(text.trim())
            .map(|key| Box::new(key) as Box<dyn Any>)
            .ok_or_else(|| XmlError::conversion(text, self.key.name(), "type is not registered"))
    }
}

impl TypeSerializer for TypeRefSerializer {
    fn supported_type(&self) -> TypeKey {
        self.key
    }

    fn serialize(
        &self,
        value: &dyn Any,
        writer: &mut XmlWriter<'_>,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<()> {
        self.write_text_element(value, writer, state)
    }

    fn deserialize(
        &self,
        reader: &mut XmlReader<'_>,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<Box<dyn Any>> {
        self.read_text_element(reader, state)
    }

    fn as_text(&self) -> Option<&dyn TextSerializer> {
        Some(self)
    }
}
