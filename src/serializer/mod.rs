//! Type serializers: the components encoding one type (or type family) to XML and back.
//!
//! A serializer writes the *content* of an element its caller has already
//! started, and reads starting on the element's start tag, leaving the reader
//! past the element's end tag.

pub mod complex;
pub mod datetime;
pub mod dictionary;
pub mod enumeration;
pub mod guid;
pub mod items;
pub mod list;
pub mod passthrough;
pub mod polymorphic;
pub mod text;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::core::descriptor::MemberDescriptor;
use crate::core::options::SerializerOptions;
use crate::core::registry::TypeSerializerRegistry;
use crate::core::state::SerializationState;
use crate::core::type_info::{TypeInfo, TypeKey};
use crate::error::{XmlError, XmlResult};
use crate::xml::{XmlReader, XmlWriter};

/// Attribute naming the concrete type of a polymorphic value or dictionary entry.
pub const TYPE_ALIAS_ATTRIBUTE: &str = "typealias";

pub trait TypeSerializer: Send + Sync {
    fn supported_type(&self) -> TypeKey;

    /// Whether the serializer was built for one member and cannot be shared by type alone.
    fn member_bound(&self) -> bool {
        false
    }

    fn serialize(
        &self,
        value: &dyn Any,
        writer: &mut XmlWriter<'_>,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<()>;

    fn deserialize(
        &self,
        reader: &mut XmlReader<'_>,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<Box<dyn Any>>;

    /// The text form of this serializer, for attributes, text members and value nodes.
    fn as_text(&self) -> Option<&dyn TextSerializer> {
        None
    }
}

/// Serializers of values with a text form.
pub trait TextSerializer {
    fn format(&self, value: &dyn Any) -> XmlResult<String>;

    fn parse(&self, text: &str) -> XmlResult<Box<dyn Any>>;

    fn is_default(&self, _value: &dyn Any) -> bool {
        false
    }

    /// Text form after the current member's value substitution.
    fn to_text(&self, value: &dyn Any, state: &SerializationState<'_>) -> XmlResult<String> {
        let text = self.format(value)?;
        Ok(match state.current_member().and_then(MemberDescriptor::substitution) {
            Some(substitution) => substitution.on_write(&text),
            None => text,
        })
    }

    fn from_text(&self, text: &str, state: &SerializationState<'_>) -> XmlResult<Box<dyn Any>> {
        match state.current_member().and_then(MemberDescriptor::substitution) {
            Some(substitution) => self.parse(&substitution.on_read(text)),
            None => self.parse(text),
        }
    }

    fn write_text_element(
        &self,
        value: &dyn Any,
        writer: &mut XmlWriter<'_>,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<()> {
        let text = self.to_text(value, state)?;
        writer.write_text(&text)
    }

    fn read_text_element(
        &self,
        reader: &mut XmlReader<'_>,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<Box<dyn Any>> {
        let text = reader.read_element_text()?;
        self.from_text(&text, state)
    }
}

/// What a serializer is being built for.
pub struct SerializerContext<'a> {
    pub registry: &'a TypeSerializerRegistry,
    pub options: &'a SerializerOptions,
    /// The member the serializer is built for, if any.
    pub member: Option<&'a MemberDescriptor>,
    /// The type to serialize, when known.
    pub info: Option<TypeInfo>,
    pub supported: TypeKey,
}

impl SerializerContext<'_> {
    pub fn member_name(&self) -> String {
        match self.member.and_then(MemberDescriptor::key) {
            Some(key) => format!("{}::{}", key.owner, key.member),
            None => self.supported.name().to_string(),
        }
    }
}

/// A serializer plugged into a member with [`Member::serializer`](crate::core::Member::serializer).
///
/// # Examples
///
/// ```
/// use std::any::Any;
/// use xml_mapper::core::SerializationState;
/// use xml_mapper::core::TypeKey;
/// use xml_mapper::error::{XmlError, XmlResult};
/// use xml_mapper::serializer::{CustomSerializer, SerializerContext, TextSerializer, TypeSerializer};
/// use xml_mapper::xml::{XmlReader, XmlWriter};
///
/// struct YesNo;
///
/// impl TextSerializer for YesNo {
///     fn format(&self, value: &dyn Any) -> XmlResult<String> {
///         match value.downcast_ref::<bool>() {
///             Some(true) => Ok("yes".to_string()),
///             Some(false) => Ok("no".to_string()),
///             None => Err(XmlError::unexpected_value("bool")),
///         }
///     }
///
///     fn parse(&self, text: &str) -> XmlResult<Box<dyn Any>> {
///         Ok(Box::new(text.trim() == "yes"))
///     }
/// }
///
/// impl TypeSerializer for YesNo {
///     fn supported_type(&self) -> TypeKey {
///         TypeKey::of::<bool>()
///     }
///
///     fn serialize(&self, value: &dyn Any, writer: &mut XmlWriter<'_>, state: &mut SerializationState<'_>) -> XmlResult<()> {
///         self.write_text_element(value, writer, state)
///     }
///
///     fn deserialize(&self, reader: &mut XmlReader<'_>, state: &mut SerializationState<'_>) -> XmlResult<Box<dyn Any>> {
///         self.read_text_element(reader, state)
///     }
///
///     fn as_text(&self) -> Option<&dyn TextSerializer> {
///         Some(self)
///     }
/// }
///
/// impl CustomSerializer for YesNo {
///     fn target_type() -> TypeKey {
///         TypeKey::of::<bool>()
///     }
///
///     fn create(_context: &SerializerContext<'_>) -> XmlResult<Self> {
///         Ok(YesNo)
///     }
/// }
/// ```
pub trait CustomSerializer: TypeSerializer + Sized + 'static {
    /// Builds one instance per member instead of sharing it per type.
    const MEMBER_BOUND: bool = false;

    /// The member type the serializer handles.
    fn target_type() -> TypeKey;

    /// The only way a custom serializer is constructed.
    fn create(context: &SerializerContext<'_>) -> XmlResult<Self>;
}

type CreateFn = fn(&SerializerContext<'_>) -> XmlResult<Arc<dyn TypeSerializer>>;

/// Type-erased constructor of a [`CustomSerializer`].
#[derive(Clone, Copy)]
pub struct SerializerFactory {
    pub(crate) serializer: TypeKey,
    pub(crate) supported: fn() -> TypeKey,
    pub(crate) member_bound: bool,
    pub(crate) create: CreateFn,
}

impl SerializerFactory {
    pub fn of<S: CustomSerializer>() -> Self {
        Self {
            serializer: TypeKey::of::<S>(),
            supported: S::target_type,
            member_bound: S::MEMBER_BOUND,
            create: create_serializer::<S>,
        }
    }

    pub fn serializer_type(&self) -> TypeKey {
        self.serializer
    }
}

fn create_serializer<S: CustomSerializer>(
    context: &SerializerContext<'_>,
) -> XmlResult<Arc<dyn TypeSerializer>> {
    S::create(context)
        .map(|serializer| Arc::new(serializer) as Arc<dyn TypeSerializer>)
        .map_err(|e| match e {
            XmlError::Construction { .. } => e,
            other => XmlError::construction(std::any::type_name::<S>(), other.to_string()),
        })
}

impl fmt::Debug for SerializerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SerializerFactory")
            .field(&self.serializer)
            .finish()
    }
}

/// The text form of the serializer at `handle`, or a configuration error naming `what`.
pub(crate) fn require_text(
    registry: &TypeSerializerRegistry,
    handle: crate::core::registry::SerializerHandle,
    what: &str,
) -> XmlResult<Arc<dyn TypeSerializer>> {
    let serializer = registry.serializer(handle)?;
    if serializer.as_text().is_none() {
        return Err(XmlError::configuration(
            what,
            format!(
                "{} has no text form",
                serializer.supported_type().name()
            ),
        ));
    }
    Ok(serializer)
}
