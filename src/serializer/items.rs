//! Item descriptors shared by the list, dictionary and polymorphic serializers.

use std::any::Any;
use std::sync::Arc;

use log::{debug, error};

use super::{SerializerContext, require_text};
use crate::core::capability::DynamicTypeProvider;
use crate::core::descriptor::ValueAdapter;
use crate::core::registry::SerializerHandle;
use crate::core::shape::{PolymorphicVariant, TypeShape, Upcast};
use crate::core::state::SerializationState;
use crate::core::tag::{ItemDeclaration, Tag, TagKind, applicable};
use crate::core::type_info::{TypeInfo, TypeKey};
use crate::error::{XmlError, XmlResult};
use crate::xml::{StartTag, XmlName, XmlReader, XmlWriter};

/// One item type of a collection and the element name it is written under.
pub struct ItemDescriptor {
    alias: String,
    key: TypeKey,
    handle: SerializerHandle,
    value_node: Option<String>,
    upcast: Option<Upcast>,
}

impl ItemDescriptor {
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn item_type(&self) -> TypeKey {
        self.key
    }

    pub fn value_node(&self) -> Option<&str> {
        self.value_node.as_deref()
    }
}

/// The item a value or element was resolved to.
pub enum ResolvedItem<'s> {
    Declared(&'s ItemDescriptor),
    /// Chosen by the dynamic type provider.
    Dynamic {
        alias: String,
        info: TypeInfo,
        handle: SerializerHandle,
    },
}

impl ResolvedItem<'_> {
    pub fn alias(&self) -> &str {
        match self {
            ResolvedItem::Declared(item) => &item.alias,
            ResolvedItem::Dynamic { alias, .. } => alias,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, ResolvedItem::Dynamic { .. })
    }

    fn handle(&self) -> SerializerHandle {
        match self {
            ResolvedItem::Declared(item) => item.handle,
            ResolvedItem::Dynamic { handle, .. } => *handle,
        }
    }

    fn value_node(&self) -> Option<&str> {
        match self {
            ResolvedItem::Declared(item) => item.value_node.as_deref(),
            ResolvedItem::Dynamic { .. } => None,
        }
    }
}

/// Item descriptors of one collection member, keyed both ways: by alias and by concrete type.
pub struct ItemSet {
    owner: String,
    element: TypeKey,
    adapter: ValueAdapter,
    view: Option<fn(&dyn Any) -> Option<&dyn Any>>,
    variants: Vec<PolymorphicVariant>,
    items: Vec<ItemDescriptor>,
    provider: Option<Arc<dyn DynamicTypeProvider>>,
}

impl ItemSet {
    /// Gathers the items of a collection of `element` values.
    ///
    /// `type_tags` are the declarations of the collection type; the member's
    /// own declarations extend them and replace those with the same alias or
    /// type. Without any declaration the element type itself is the only
    /// item, unless it is polymorphic.
    pub fn build(
        context: &SerializerContext<'_>,
        element: TypeInfo,
        type_tags: &[Tag],
        implicit: &[ItemDeclaration],
    ) -> XmlResult<Self> {
        let owner = context.member_name();
        let (adapter, inner, shape) = ValueAdapter::peel(element);
        let (view, variants) = match &shape {
            TypeShape::Polymorphic(polymorphic) => {
                (Some(polymorphic.view), polymorphic.variants().to_vec())
            }
            _ => (None, Vec::new()),
        };
        let provider = context.member.and_then(|m| m.type_resolver()).cloned();

        let type_level: Vec<ItemDeclaration> = applicable(type_tags, context.options)
            .filter_map(|tag| match tag {
                TagKind::Item(item) => Some(item.clone()),
                _ => None,
            })
            .chain(implicit.iter().cloned())
            .collect();
        let member_level = context
            .member
            .map(|member| member.items().to_vec())
            .unwrap_or_default();

        let mut declarations = Vec::new();
        merge_level(&owner, &mut declarations, type_level)?;
        let inherited = declarations.len();
        let mut own = Vec::new();
        merge_level(&owner, &mut own, member_level)?;
        for declaration in own {
            let alias = alias_of(&declaration);
            declarations.retain(|existing: &ItemDeclaration| {
                alias_of(existing) != alias && existing.info.key() != declaration.info.key()
            });
            declarations.push(declaration);
        }
        debug!(
            "{}: {} inherited and {} total item declarations",
            owner,
            inherited,
            declarations.len()
        );

        if declarations.is_empty() && view.is_none() {
            declarations.push(ItemDeclaration::unaliased(inner));
        }
        if declarations.is_empty() && provider.is_none() {
            return Err(XmlError::configuration(
                owner,
                format!(
                    "no item type declared for polymorphic {} and no type resolver",
                    inner.key().name()
                ),
            ));
        }

        let mut items = Vec::with_capacity(declarations.len());
        for declaration in declarations {
            let upcast = if declaration.info.key() == inner.key() {
                None
            } else {
                let variant = variants
                    .iter()
                    .find(|variant| variant.info().key() == declaration.info.key())
                    .ok_or_else(|| {
                        XmlError::configuration(
                            owner.as_str(),
                            format!(
                                "item type {} is not assignable to {}",
                                declaration.info.key().name(),
                                inner.key().name()
                            ),
                        )
                    })?;
                Some(variant.upcast.clone())
            };
            let handle =
                context
                    .registry
                    .get_by_supported_type(declaration.info, context.options, None)?;
            if declaration.value_node.is_some() {
                require_text(context.registry, handle, &owner)?;
            }
            items.push(ItemDescriptor {
                alias: alias_of(&declaration),
                key: declaration.info.key(),
                handle,
                value_node: declaration.value_node,
                upcast,
            });
        }

        Ok(Self {
            owner,
            element: inner.key(),
            adapter,
            view,
            variants,
            items,
            provider,
        })
    }

    pub fn items(&self) -> &[ItemDescriptor] {
        &self.items
    }

    /// The single item, when exactly one is declared.
    pub fn single(&self) -> Option<&ItemDescriptor> {
        match self.items.as_slice() {
            [item] => Some(item),
            _ => None,
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.adapter.is_nullable()
    }

    /// Alias written for null items.
    pub fn null_alias(&self) -> &str {
        self.items
            .first()
            .map(|item| item.alias.as_str())
            .unwrap_or_else(|| crate::core::type_info::short_name(self.element.name()))
    }

    /// Peels wrappers off an item value and resolves its concrete type.
    ///
    /// Returns `None` for a null item.
    pub fn resolve_value<'v>(
        &self,
        value: &'v dyn Any,
        state: &SerializationState<'_>,
    ) -> XmlResult<Option<(ResolvedItem<'_>, &'v dyn Any)>> {
        let value = match self.adapter.view(value)? {
            Some(value) => value,
            None => return Ok(None),
        };
        let concrete = match self.view {
            Some(view) => view(value).ok_or_else(|| XmlError::unexpected_value(self.element.name()))?,
            None => value,
        };
        let id = (*concrete).type_id();
        if let Some(item) = self.items.iter().find(|item| item.key.id() == id) {
            return Ok(Some((ResolvedItem::Declared(item), concrete)));
        }
        if let Some(resolved) = self
            .provider
            .as_ref()
            .and_then(|provider| provider.type_for_value(concrete))
        {
            let handle = state
                .registry()
                .get_dynamic(resolved.info, state.options(), None)?;
            return Ok(Some((
                ResolvedItem::Dynamic {
                    alias: resolved.name,
                    info: resolved.info,
                    handle,
                },
                concrete,
            )));
        }
        error!("{}: no item type registered for a value of {}", self.owner, self.element);
        Err(XmlError::RuntimeTypeMismatch(format!(
            "{}: no item type registered for a value of {}",
            self.owner, self.element
        )))
    }

    /// Item declared under `alias`, if any.
    pub fn by_alias(&self, alias: &str) -> Option<&ItemDescriptor> {
        self.items.iter().find(|item| item.alias == alias)
    }

    /// Asks the type resolver for the item at the reader's start tag.
    pub fn resolve_element(
        &self,
        tag: &StartTag,
        state: &SerializationState<'_>,
    ) -> XmlResult<Option<ResolvedItem<'_>>> {
        let resolved = match self
            .provider
            .as_ref()
            .and_then(|provider| provider.type_for_element(tag))
        {
            Some(resolved) => resolved,
            None => return Ok(None),
        };
        let handle = state
            .registry()
            .get_dynamic(resolved.info, state.options(), None)?;
        Ok(Some(ResolvedItem::Dynamic {
            alias: resolved.name,
            info: resolved.info,
            handle,
        }))
    }

    /// Writes the content of an item element the caller has started.
    pub fn write_content(
        &self,
        item: &ResolvedItem<'_>,
        value: &dyn Any,
        writer: &mut XmlWriter<'_>,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<()> {
        let serializer = state.serializer(item.handle())?;
        match (item.value_node(), serializer.as_text()) {
            (Some(attribute), Some(text)) => {
                let text = text.to_text(value, state)?;
                state.write_attribute(writer, &XmlName::local(attribute), &text)
            }
            _ => serializer.serialize(value, writer, state),
        }
    }

    /// Reads the item element at the reader, returning a value of the element type.
    pub fn read_item(
        &self,
        item: &ResolvedItem<'_>,
        reader: &mut XmlReader<'_>,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<Box<dyn Any>> {
        let serializer = state.serializer(item.handle())?;
        let text = serializer.as_text();
        let (empty, inlined) = {
            let tag = reader.start()?;
            let inlined = item
                .value_node()
                .filter(|_| text.is_some())
                .map(|attribute| (attribute.to_string(), tag.attribute(attribute).map(str::to_string)));
            (tag.empty, inlined)
        };
        let concrete = match (inlined, text) {
            (Some((attribute, raw)), Some(text)) => {
                reader.skip_element()?;
                match raw {
                    Some(raw) if !(raw.is_empty() && self.is_nullable()) => text.from_text(&raw, state)?,
                    _ if self.is_nullable() => return self.null_item(),
                    _ => {
                        return Err(XmlError::conversion(
                            "",
                            serializer.supported_type().name(),
                            format!("attribute {} is missing", attribute),
                        ));
                    }
                }
            }
            (_, Some(_)) if empty && self.is_nullable() => {
                reader.advance()?;
                return self.null_item();
            }
            _ => serializer.deserialize(reader, state)?,
        };
        self.to_element(item, concrete)
    }

    /// The element type's null value.
    pub fn null_item(&self) -> XmlResult<Box<dyn Any>> {
        self.adapter.null()?.ok_or_else(|| {
            XmlError::conversion("", self.element.name(), "null item in a collection of non-null items")
        })
    }

    fn to_element(&self, item: &ResolvedItem<'_>, value: Box<dyn Any>) -> XmlResult<Box<dyn Any>> {
        let value = match item {
            ResolvedItem::Declared(item) => match &item.upcast {
                Some(upcast) => upcast(value),
                None => Some(value),
            },
            ResolvedItem::Dynamic { info, .. } if info.key() == self.element => Some(value),
            ResolvedItem::Dynamic { info, .. } => {
                match self
                    .variants
                    .iter()
                    .find(|variant| variant.info().key() == info.key())
                {
                    Some(variant) => (variant.upcast)(value),
                    None => {
                        return Err(XmlError::RuntimeTypeMismatch(format!(
                            "{}: resolved type {} is not assignable to {}",
                            self.owner,
                            info.key().name(),
                            self.element.name()
                        )));
                    }
                }
            }
        };
        let value = value.ok_or_else(|| XmlError::unexpected_value(self.element.name()))?;
        self.adapter.wrap(value)
    }
}

fn alias_of(declaration: &ItemDeclaration) -> String {
    declaration
        .alias
        .clone()
        .unwrap_or_else(|| declaration.info.key().short_name().to_string())
}

/// Adds the declarations of one level, rejecting one alias used for two types.
fn merge_level(
    owner: &str,
    declarations: &mut Vec<ItemDeclaration>,
    level: Vec<ItemDeclaration>,
) -> XmlResult<()> {
    for declaration in level {
        let alias = alias_of(&declaration);
        match declarations.iter().position(|existing| alias_of(existing) == alias) {
            Some(index) if declarations[index].info.key() != declaration.info.key() => {
                return Err(XmlError::configuration(
                    owner,
                    format!(
                        "alias `{}` is declared for both {} and {}",
                        alias,
                        declarations[index].info.key().name(),
                        declaration.info.key().name()
                    ),
                ));
            }
            Some(index) => declarations[index] = declaration,
            None => declarations.push(declaration),
        }
    }
    Ok(())
}
