use std::any::Any;

use super::{TextSerializer, TypeSerializer};
use crate::core::shape::EnumShape;
use crate::core::state::SerializationState;
use crate::core::type_info::TypeKey;
use crate::error::{XmlError, XmlResult};
use crate::xml::{XmlReader, XmlWriter};

/// Writes enum values by name; names are read back case-insensitively.
pub struct EnumSerializer {
    key: TypeKey,
    shape: EnumShape,
}

impl EnumSerializer {
    pub fn new(key: TypeKey, shape: EnumShape) -> Self {
        Self { key, shape }
    }
}

impl TextSerializer for EnumSerializer {
    fn format(&self, value: &dyn Any) -> XmlResult<String> {
        (self.shape.index_of)(value)
            .and_then(|index| self.shape.names.get(index))
            .map(|name| name.to_string())
            .ok_or_else(|| XmlError::unexpected_value(self.key.name()))
    }

    fn parse(&self, text: &str) -> XmlResult<Box<dyn Any>> {
        let name = text.trim();
        self.shape
            .names
            .iter()
            .position(|candidate| candidate.eq_ignore_ascii_case(name))
            .and_then(|index| (self.shape.from_index)(index))
            .ok_or_else(|| {
                XmlError::conversion(
                    text,
                    self.key.name(),
                    format!("expected one of {}", self.shape.names.join(", ")),
                )
            })
    }

    fn is_default(&self, value: &dyn Any) -> bool {
        (self.shape.index_of)(value) == Some(0)
    }
}

impl TypeSerializer for EnumSerializer {
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
