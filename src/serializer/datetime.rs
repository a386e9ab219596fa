use std::any::Any;

use log::debug;

use super::{SerializerContext, TextSerializer, TypeSerializer};
use crate::core::shape::DateTimeShape;
use crate::core::state::SerializationState;
use crate::core::type_info::TypeKey;
use crate::error::{XmlError, XmlResult};
use crate::xml::{XmlReader, XmlWriter};

/// Date/time serializer, bound to the format declared on its member.
pub struct DateTimeSerializer {
    key: TypeKey,
    shape: DateTimeShape,
    format: Option<String>,
}

impl DateTimeSerializer {
    /// Fails when the member's format is not a valid `strftime` pattern.
    pub fn build(
        context: &SerializerContext<'_>,
        key: TypeKey,
        shape: DateTimeShape,
    ) -> XmlResult<Self> {
        let format = context
            .member
            .and_then(|member| member.date_format())
            .map(str::to_string);
        match &format {
            Some(format) if !(shape.is_valid_format)(format) => {
                return Err(XmlError::configuration(
                    context.member_name(),
                    format!("invalid date/time format `{}`", format),
                ));
            }
            _ => {}
        }
        Ok(Self { key, shape, format })
    }

    fn active_format(&self) -> &str {
        self.format.as_deref().unwrap_or(self.shape.general_format)
    }
}

impl TextSerializer for DateTimeSerializer {
    fn format(&self, value: &dyn Any) -> XmlResult<String> {
        (self.shape.format)(value, self.active_format())
            .ok_or_else(|| XmlError::unexpected_value(self.key.name()))
    }

    fn parse(&self, text: &str) -> XmlResult<Box<dyn Any>> {
        let text = text.trim();
        if let Some(format) = &self.format {
            match (self.shape.parse_exact)(text, format) {
                Some(value) => return Ok(value),
                None => debug!("`{}` does not match format `{}`", text, format),
            }
        }
        (self.shape.parse_lenient)(text).ok_or_else(|| {
            XmlError::conversion(text, self.key.name(), "unrecognized date/time")
        })
    }
}

impl TypeSerializer for DateTimeSerializer {
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
