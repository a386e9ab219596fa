use std::any::Any;

use super::{TextSerializer, TypeSerializer};
use crate::core::shape::TextShape;
use crate::core::state::SerializationState;
use crate::core::type_info::TypeKey;
use crate::error::{XmlError, XmlResult};
use crate::xml::{XmlReader, XmlWriter};

/// Serializer of primitives and structured scalars with a text form.
pub struct TextValueSerializer {
    key: TypeKey,
    shape: TextShape,
}

impl TextValueSerializer {
    pub fn new(key: TypeKey, shape: TextShape) -> Self {
        Self { key, shape }
    }
}

impl TextSerializer for TextValueSerializer {
    fn format(&self, value: &dyn Any) -> XmlResult<String> {
        (self.shape.format)(value).ok_or_else(|| XmlError::unexpected_value(self.key.name()))
    }

    fn parse(&self, text: &str) -> XmlResult<Box<dyn Any>> {
        let input = if self.shape.trim { text.trim() } else { text };
        (self.shape.parse)(input)
            .map_err(|message| XmlError::conversion(text, self.key.name(), message))
    }

    fn is_default(&self, value: &dyn Any) -> bool {
        self.shape.is_default.is_some_and(|is_default| is_default(value))
    }
}

impl TypeSerializer for TextValueSerializer {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SerializerOptions, TypeSerializerRegistry};

    #[test]
    fn numbers_are_trimmed_before_parsing() {
        let serializer =
            TextValueSerializer::new(TypeKey::of::<i64>(), TextShape::parsed::<i64>());

        let value = serializer.parse(" -42\n").unwrap();
        assert_eq!(value.downcast_ref::<i64>(), Some(&-42));
        assert_eq!(serializer.format(&-42i64).unwrap(), "-42");
    }

    #[test]
    fn conversion_error_names_text_and_type() {
        let serializer = TextValueSerializer::new(TypeKey::of::<u8>(), TextShape::parsed::<u8>());

        match serializer.parse("300") {
            Err(XmlError::Conversion { text, type_name, .. }) => {
                assert_eq!(text, "300");
                assert_eq!(type_name, "u8");
            }
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn wrong_value_type_is_rejected() {
        let serializer = TextValueSerializer::new(TypeKey::of::<u8>(), TextShape::parsed::<u8>());

        assert!(matches!(
            serializer.format(&"x"),
            Err(XmlError::RuntimeTypeMismatch(_))
        ));
    }

    #[test]
    fn element_form_round_trips() {
        let registry = TypeSerializerRegistry::new();
        let options = SerializerOptions::default();
        let mut state = SerializationState::new(&registry, &options);
        let serializer = TextValueSerializer::new(
            TypeKey::of::<String>(),
            TextShape::parsed::<String>().preserve_whitespace(),
        );

        let mut buffer = Vec::new();
        {
            let mut writer = XmlWriter::new(&mut buffer);
            writer.start_element("v").unwrap();
            serializer
                .serialize(&" a < b ".to_string(), &mut writer, &mut state)
                .unwrap();
            writer.end_element().unwrap();
            writer.finish().unwrap();
        }
        let xml = String::from_utf8(buffer).unwrap();
        assert_eq!(xml, "<v> a &lt; b </v>");

        let mut reader = XmlReader::from_str(&xml);
        reader.move_to_content().unwrap();
        let value = serializer.deserialize(&mut reader, &mut state).unwrap();
        assert_eq!(value.downcast_ref::<String>().unwrap(), " a < b ");
    }
}
