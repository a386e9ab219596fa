use std::any::Any;

use log::debug;

use super::items::{ItemSet, ResolvedItem};
use super::{SerializerContext, TYPE_ALIAS_ATTRIBUTE, TypeSerializer};
use crate::core::shape::PolymorphicShape;
use crate::core::state::SerializationState;
use crate::core::tag::ItemDeclaration;
use crate::core::type_info::{TypeInfo, TypeKey};
use crate::error::{XmlError, XmlResult};
use crate::xml::{XmlReader, XmlWriter};

/// Serializer of a single trait-object value.
///
/// The concrete type is written as a `typealias` attribute on the member's
/// element and its content is delegated to that type's serializer.
pub struct PolymorphicSerializer {
    key: TypeKey,
    variants: ItemSet,
}

impl PolymorphicSerializer {
    pub fn build(
        context: &SerializerContext<'_>,
        info: TypeInfo,
        shape: PolymorphicShape,
    ) -> XmlResult<Self> {
        let implicit: Vec<ItemDeclaration> = shape
            .variants()
            .iter()
            .map(|variant| ItemDeclaration {
                alias: Some(variant.alias().to_string()),
                info: variant.info(),
                value_node: None,
            })
            .collect();
        let variants = ItemSet::build(context, info, &[], &implicit)?;
        debug!(
            "Polymorphic serializer for {} with {} variants",
            context.member_name(),
            variants.items().len()
        );
        Ok(Self {
            key: info.key(),
            variants,
        })
    }

    fn resolve_element<'s>(
        &'s self,
        reader: &XmlReader<'_>,
        state: &SerializationState<'_>,
    ) -> XmlResult<ResolvedItem<'s>> {
        let tag = reader.start()?;
        let alias = tag.attribute(TYPE_ALIAS_ATTRIBUTE);
        let declared = match alias {
            Some(alias) => self.variants.by_alias(alias),
            None => self.variants.single(),
        };
        if let Some(item) = declared {
            return Ok(ResolvedItem::Declared(item));
        }
        if let Some(resolved) = self.variants.resolve_element(tag, state)? {
            return Ok(resolved);
        }
        Err(XmlError::RuntimeTypeMismatch(format!(
            "<{}>: {} for {}",
            tag.name,
            match alias {
                Some(alias) => format!("unknown type alias `{}`", alias),
                None => "missing type alias".to_string(),
            },
            self.key
        )))
    }
}

impl TypeSerializer for PolymorphicSerializer {
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
        match self.variants.resolve_value(value, state)? {
            Some((item, concrete)) => {
                writer.write_attribute(TYPE_ALIAS_ATTRIBUTE, item.alias())?;
                self.variants.write_content(&item, concrete, writer, state)
            }
            None => Ok(()),
        }
    }

    fn deserialize(
        &self,
        reader: &mut XmlReader<'_>,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<Box<dyn Any>> {
        let item = self.resolve_element(reader, state)?;
        self.variants.read_item(&item, reader, state)
    }
}
