use std::any::Any;

use uuid::Uuid;

use super::{TextSerializer, TypeSerializer};
use crate::core::state::SerializationState;
use crate::core::type_info::TypeKey;
use crate::error::{XmlError, XmlResult};
use crate::xml::{XmlReader, XmlWriter};

/// Writes [`Uuid`]s hyphenated; reads any textual form `uuid` accepts.
pub struct GuidSerializer {
    key: TypeKey,
}

impl GuidSerializer {
    pub fn new(key: TypeKey) -> Self {
        Self { key }
    }
}

impl TextSerializer for GuidSerializer {
    fn format(&self, value: &dyn Any) -> XmlResult<String> {
        value
            .downcast_ref::<Uuid>()
            .map(|uuid| uuid.hyphenated().to_string())
            .ok_or_else(|| XmlError::unexpected_value(self.key.name()))
    }

    fn parse(&self, text: &str) -> XmlResult<Box<dyn Any>> {
        Uuid::parse_str(text.trim())
            .map(|uuid| Box::new(uuid) as Box<dyn Any>)
            .map_err(|e| XmlError::conversion(text, self.key.name(), e.to_string()))
    }

    fn is_default(&self, value: &dyn Any) -> bool {
        value.downcast_ref::<Uuid>().is_some_and(Uuid::is_nil)
    }
}

impl TypeSerializer for GuidSerializer {
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

    #[test]
    fn accepts_simple_and_braced_forms() {
        let serializer = GuidSerializer::new(TypeKey::of::<Uuid>());
        let uuid = Uuid::new_v4();

        let simple = serializer.parse(&uuid.simple().to_string()).unwrap();
        let braced = serializer.parse(&uuid.braced().to_string()).unwrap();

        assert_eq!(simple.downcast_ref::<Uuid>(), Some(&uuid));
        assert_eq!(braced.downcast_ref::<Uuid>(), Some(&uuid));
        assert_eq!(serializer.format(&uuid).unwrap(), uuid.hyphenated().to_string());
    }

    #[test]
    fn nil_is_the_default() {
        let serializer = GuidSerializer::new(TypeKey::of::<Uuid>());

        assert!(serializer.is_default(&Uuid::nil()));
        assert!(!serializer.is_default(&Uuid::new_v4()));
        assert!(serializer.parse("not-a-guid").is_err());
    }
}
