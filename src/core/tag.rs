use std::fmt;
use std::sync::Arc;

use super::capability::{DynamicTypeProvider, ValueSubstitution};
use super::options::SerializerOptions;
use super::type_info::{TypeInfo, XmlType};
use crate::serializer::SerializerFactory;

/// An item type accepted by a collection, with the element name it is written under.
#[derive(Debug, Clone)]
pub struct ItemDeclaration {
    pub(crate) alias: Option<String>,
    pub(crate) info: TypeInfo,
    pub(crate) value_node: Option<String>,
}

impl ItemDeclaration {
    pub fn new<I: XmlType>(alias: &str) -> Self {
        Self {
            alias: Some(alias.to_string()),
            info: TypeInfo::of::<I>(),
            value_node: None,
        }
    }

    /// An item named after its type.
    pub fn unaliased(info: TypeInfo) -> Self {
        Self {
            alias: None,
            info,
            value_node: None,
        }
    }

    /// Writes the item's text form into attribute `attribute` of its element.
    pub fn with_value_node(mut self, attribute: &str) -> Self {
        self.value_node = Some(attribute.to_string());
        self
    }
}

/// The effect of one declarative tag.
#[derive(Clone)]
pub enum TagKind {
    Exclude,
    /// The member is the text content of its owner's element.
    Text,
    Attribute {
        name: Option<String>,
        namespace: Option<String>,
    },
    Element {
        name: Option<String>,
        namespace: Option<String>,
    },
    CData,
    DefaultAsNull,
    SerializeIfNull,
    /// Inlines the member's text form into an attribute of its element.
    ValueNode { attribute: String },
    ReturnType(TypeInfo),
    Serializer(SerializerFactory),
    TypeResolver(Arc<dyn DynamicTypeProvider>),
    Substitution(Arc<dyn ValueSubstitution>),
    Item(ItemDeclaration),
    DateTimeFormat(String),
    Root {
        name: String,
        namespace: Option<String>,
    },
    IncludeBase,
}

impl TagKind {
    pub fn name(&self) -> &'static str {
        match self {
            TagKind::Exclude => "exclude",
            TagKind::Text => "text",
            TagKind::Attribute { .. } => "attribute",
            TagKind::Element { .. } => "element",
            TagKind::CData => "cdata",
            TagKind::DefaultAsNull => "default-as-null",
            TagKind::SerializeIfNull => "serialize-if-null",
            TagKind::ValueNode { .. } => "value-node",
            TagKind::ReturnType(_) => "return-type",
            TagKind::Serializer(_) => "serializer",
            TagKind::TypeResolver(_) => "type-resolver",
            TagKind::Substitution(_) => "substitution",
            TagKind::Item(_) => "item",
            TagKind::DateTimeFormat(_) => "date-format",
            TagKind::Root { .. } => "root",
            TagKind::IncludeBase => "include-base",
        }
    }
}

/// A declarative tag, optionally guarded by a `(name, value)` condition.
///
/// A guarded tag only applies when the options carry the same value under
/// the condition name.
#[derive(Clone)]
pub struct Tag {
    pub(crate) kind: TagKind,
    pub(crate) condition: Option<(String, String)>,
}

impl Tag {
    pub fn new(kind: TagKind) -> Self {
        Self {
            kind,
            condition: None,
        }
    }

    pub fn when(mut self, name: &str, value: &str) -> Self {
        self.set_condition(name, value);
        self
    }

    pub(crate) fn set_condition(&mut self, name: &str, value: &str) {
        self.condition = Some((name.to_string(), value.to_string()));
    }

    pub fn kind(&self) -> &TagKind {
        &self.kind
    }

    pub fn applies(&self, options: &SerializerOptions) -> bool {
        match &self.condition {
            Some((name, value)) => options.matches(name, value),
            None => true,
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.condition {
            Some((name, value)) => write!(f, "{} (when {}={})", self.kind.name(), name, value),
            None => f.write_str(self.kind.name()),
        }
    }
}

/// Tags whose condition holds under `options`, in declaration order.
pub(crate) fn applicable<'a>(
    tags: &'a [Tag],
    options: &'a SerializerOptions,
) -> impl Iterator<Item = &'a TagKind> + 'a {
    tags.iter()
        .filter(move |tag| tag.applies(options))
        .map(Tag::kind)
}
