use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::capability::{DynamicTypeProvider, ValueSubstitution};
use super::registry::SerializerHandle;
use super::shape::{TypeShape, Upcast, WrapperShape};
use super::tag::ItemDeclaration;
use super::type_info::{TypeInfo, TypeKey};
use crate::error::{XmlError, XmlResult};
use crate::xml::XmlName;

/// How a member is represented in XML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Attribute,
    Element,
    /// Text content of the owner's element.
    Text,
    Excluded,
}

/// Identifies a member across the registry: its owner type and member name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberKey {
    pub owner: TypeKey,
    pub member: String,
}

#[derive(Clone)]
struct PolymorphicCast {
    view: fn(&dyn Any) -> Option<&dyn Any>,
    upcast: Upcast,
}

/// Converts between a member's declared value and the value its serializer handles.
///
/// `Option` and `Box` wrappers are peeled off, and when the member is mapped
/// as one variant of a polymorphic declared type, the value is cast between
/// the trait object and the variant.
#[derive(Clone)]
pub struct ValueAdapter {
    wrappers: Vec<WrapperShape>,
    polymorphic: Option<PolymorphicCast>,
    target: TypeKey,
}

impl ValueAdapter {
    /// Peels every wrapper off `declared`, returning the adapter, the inner type and its shape.
    pub fn peel(declared: TypeInfo) -> (ValueAdapter, TypeInfo, TypeShape) {
        let mut wrappers = Vec::new();
        let mut inner = declared;
        let mut shape = declared.shape();
        while let Some(wrapper) = shape.wrapper().copied() {
            wrappers.push(wrapper);
            inner = wrapper.inner;
            shape = inner.shape();
        }
        let adapter = ValueAdapter {
            wrappers,
            polymorphic: None,
            target: inner.key(),
        };
        (adapter, inner, shape)
    }

    /// Adapter from `declared` to `resolved`.
    ///
    /// `resolved` must be the declared type without wrappers, or one of the
    /// variants of that type when it is polymorphic.
    pub fn between(declared: TypeInfo, resolved: TypeInfo) -> XmlResult<(ValueAdapter, TypeInfo)> {
        let (mut adapter, inner, shape) = Self::peel(declared);
        if resolved.key() == inner.key() || resolved.key() == declared.key() {
            return Ok((adapter, inner));
        }
        let variant = match &shape {
            TypeShape::Polymorphic(polymorphic) => polymorphic
                .variant_for(resolved.key())
                .map(|variant| (polymorphic.view, variant.upcast.clone())),
            _ => None,
        };
        match variant {
            Some((view, upcast)) => {
                adapter.polymorphic = Some(PolymorphicCast { view, upcast });
                adapter.target = resolved.key();
                Ok((adapter, resolved))
            }
            None => Err(XmlError::configuration(
                declared.key().name(),
                format!("{} is not assignable to the declared type", resolved.key().name()),
            )),
        }
    }

    /// The value to serialize, or `None` when the declared value is null.
    pub fn view<'a>(&self, value: &'a dyn Any) -> XmlResult<Option<&'a dyn Any>> {
        let mut current = value;
        for wrapper in &self.wrappers {
            match (wrapper.view)(current) {
                Some(Some(inner)) => current = inner,
                Some(None) => return Ok(None),
                None => return Err(XmlError::unexpected_value(wrapper.inner.key().name())),
            }
        }
        if let Some(cast) = &self.polymorphic {
            current = (cast.view)(current)
                .ok_or_else(|| XmlError::unexpected_value(self.target.name()))?;
            if (*current).type_id() != self.target.id() {
                return Err(XmlError::RuntimeTypeMismatch(format!(
                    "member is mapped as {} but holds another type",
                    self.target.name()
                )));
            }
        }
        Ok(Some(current))
    }

    /// Turns a decoded value back into the declared type.
    pub fn wrap(&self, value: Box<dyn Any>) -> XmlResult<Box<dyn Any>> {
        let mut current = value;
        if let Some(cast) = &self.polymorphic {
            current = (cast.upcast)(current)
                .ok_or_else(|| XmlError::unexpected_value(self.target.name()))?;
        }
        self.rewrap(current, self.wrappers.len())
    }

    /// The declared type's null value, if it has one.
    pub fn null(&self) -> XmlResult<Option<Box<dyn Any>>> {
        let nullable = self
            .wrappers
            .iter()
            .enumerate()
            .find_map(|(depth, wrapper)| wrapper.null.map(|null| (depth, null)));
        match nullable {
            Some((depth, null)) => self.rewrap(null(), depth).map(Some),
            None => Ok(None),
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.wrappers.iter().any(WrapperShape::is_nullable)
    }

    /// Type the serializer handles.
    pub fn target(&self) -> TypeKey {
        self.target
    }

    /// Applies the `depth` outermost wrappers, innermost first.
    fn rewrap(&self, value: Box<dyn Any>, depth: usize) -> XmlResult<Box<dyn Any>> {
        let mut current = value;
        for wrapper in self.wrappers[..depth].iter().rev() {
            current = (wrapper.wrap)(current)
                .ok_or_else(|| XmlError::unexpected_value(wrapper.inner.key().name()))?;
        }
        Ok(current)
    }
}

impl fmt::Debug for ValueAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueAdapter")
            .field("wrappers", &self.wrappers.len())
            .field("polymorphic", &self.polymorphic.is_some())
            .field("target", &self.target)
            .finish()
    }
}

/// Resolved mapping of one member under one set of options.
///
/// Built once by the [`MetadataScanner`](super::scanner::MetadataScanner) and
/// shared by every serializer mapping the member.
#[derive(Clone)]
pub struct MemberDescriptor {
    pub(crate) key: Option<MemberKey>,
    pub(crate) identifier: String,
    pub(crate) kind: NodeKind,
    pub(crate) name: XmlName,
    pub(crate) declared: TypeInfo,
    pub(crate) return_type: TypeInfo,
    pub(crate) adapter: ValueAdapter,
    pub(crate) cdata: bool,
    pub(crate) default_as_null: bool,
    pub(crate) serialize_if_null: bool,
    pub(crate) value_node: Option<String>,
    pub(crate) serializer_override: Option<SerializerHandle>,
    pub(crate) type_resolver: Option<Arc<dyn DynamicTypeProvider>>,
    pub(crate) substitution: Option<Arc<dyn ValueSubstitution>>,
    pub(crate) items: Vec<ItemDeclaration>,
    pub(crate) date_format: Option<String>,
}

impl MemberDescriptor {
    /// Owner and member name; `None` for the descriptor of a document root.
    pub fn key(&self) -> Option<&MemberKey> {
        self.key.as_ref()
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn name(&self) -> &XmlName {
        &self.name
    }

    pub fn declared_type(&self) -> TypeInfo {
        self.declared
    }

    /// The type the member is serialized as, without `Option`/`Box` wrappers.
    pub fn return_type(&self) -> TypeInfo {
        self.return_type
    }

    pub fn adapter(&self) -> &ValueAdapter {
        &self.adapter
    }

    pub fn is_cdata(&self) -> bool {
        self.cdata
    }

    pub fn default_as_null(&self) -> bool {
        self.default_as_null
    }

    pub fn serialize_if_null(&self) -> bool {
        self.serialize_if_null
    }

    pub fn value_node(&self) -> Option<&str> {
        self.value_node.as_deref()
    }

    pub fn serializer_override(&self) -> Option<SerializerHandle> {
        self.serializer_override
    }

    pub fn type_resolver(&self) -> Option<&Arc<dyn DynamicTypeProvider>> {
        self.type_resolver.as_ref()
    }

    pub fn substitution(&self) -> Option<&Arc<dyn ValueSubstitution>> {
        self.substitution.as_ref()
    }

    pub fn items(&self) -> &[ItemDeclaration] {
        &self.items
    }

    pub fn date_format(&self) -> Option<&str> {
        self.date_format.as_deref()
    }
}

impl fmt::Debug for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDescriptor")
            .field("identifier", &self.identifier)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("return_type", &self.return_type)
            .field("cdata", &self.cdata)
            .field("default_as_null", &self.default_as_null)
            .field("serialize_if_null", &self.serialize_if_null)
            .field("value_node", &self.value_node)
            .field("serializer_override", &self.serializer_override)
            .field("items", &self.items)
            .field("date_format", &self.date_format)
            .finish()
    }
}
