use std::sync::Arc;

use log::{debug, warn};

use super::descriptor::{MemberDescriptor, MemberKey, NodeKind, ValueAdapter};
use super::options::SerializerOptions;
use super::registry::{DescriptorKey, TypeSerializerRegistry};
use super::schema::MemberSchema;
use super::shape::TypeShape;
use super::tag::{TagKind, applicable};
use super::type_info::{TypeInfo, TypeKey};
use crate::error::{XmlError, XmlResult};
use crate::xml::XmlName;

/// Resolves member schemas into [`MemberDescriptor`]s under one set of options.
///
/// Descriptors are memoized in the registry per owner, member and options.
pub struct MetadataScanner<'a> {
    registry: &'a TypeSerializerRegistry,
    options: &'a SerializerOptions,
}

impl<'a> MetadataScanner<'a> {
    pub fn new(registry: &'a TypeSerializerRegistry, options: &'a SerializerOptions) -> Self {
        Self { registry, options }
    }

    pub fn scan_member(
        &self,
        owner: TypeKey,
        member: &MemberSchema,
    ) -> XmlResult<Arc<MemberDescriptor>> {
        let key = DescriptorKey {
            owner,
            member: Some(member.name.clone()),
            options: self.options.clone(),
        };
        if let Some(descriptor) = self.registry.descriptor(&key) {
            return Ok(descriptor);
        }

        let descriptor = Arc::new(self.describe_member(owner, member)?);
        self.registry.insert_descriptor(key, descriptor.clone());
        Ok(descriptor)
    }

    /// Descriptor of a type standing in for itself, as the root of a document.
    pub fn scan_type(&self, info: TypeInfo) -> XmlResult<Arc<MemberDescriptor>> {
        let key = DescriptorKey {
            owner: info.key(),
            member: None,
            options: self.options.clone(),
        };
        if let Some(descriptor) = self.registry.descriptor(&key) {
            return Ok(descriptor);
        }

        let (adapter, target) = ValueAdapter::between(info, info)?;
        let root = match target.shape() {
            TypeShape::Complex(shape) => applicable(shape.tags(), self.options)
                .filter_map(|tag| match tag {
                    TagKind::Root { name, namespace } => Some(XmlName {
                        namespace: namespace.clone(),
                        local: name.clone(),
                    }),
                    _ => None,
                })
                .last(),
            _ => None,
        };
        let name = match root {
            Some(name) => name,
            None => XmlName::local(self.derived_name(target.key().short_name())),
        };

        let descriptor = Arc::new(MemberDescriptor {
            key: None,
            identifier: target.key().short_name().to_string(),
            kind: NodeKind::Element,
            name,
            declared: info,
            return_type: target,
            adapter,
            cdata: false,
            default_as_null: false,
            serialize_if_null: false,
            value_node: None,
            serializer_override: None,
            type_resolver: None,
            substitution: None,
            items: Vec::new(),
            date_format: None,
        });
        self.registry.insert_descriptor(key, descriptor.clone());
        Ok(descriptor)
    }

    fn describe_member(&self, owner: TypeKey, member: &MemberSchema) -> XmlResult<MemberDescriptor> {
        let tags: Vec<&TagKind> = applicable(&member.tags, self.options).collect();

        let approach = tags.iter().find_map(|tag| match tag {
            TagKind::Attribute { name, namespace } => {
                Some((NodeKind::Attribute, name.clone(), namespace.clone()))
            }
            TagKind::Element { name, namespace } => {
                Some((NodeKind::Element, name.clone(), namespace.clone()))
            }
            _ => None,
        });
        let (kind, explicit_name, namespace) =
            if tags.iter().any(|tag| matches!(tag, TagKind::Exclude)) {
                (NodeKind::Excluded, None, None)
            } else if tags.iter().any(|tag| matches!(tag, TagKind::Text)) {
                (NodeKind::Text, None, None)
            } else if let Some(approach) = approach {
                approach
            } else if self.options.include_unattributed {
                (NodeKind::Element, None, None)
            } else {
                (NodeKind::Excluded, None, None)
            };

        let local = match explicit_name {
            Some(name) => name,
            None => self.derived_name(strip_generic_suffix(&member.name)),
        };
        let mut descriptor = MemberDescriptor {
            key: Some(MemberKey {
                owner,
                member: member.name.clone(),
            }),
            identifier: member.name.clone(),
            kind,
            name: XmlName { namespace, local },
            declared: member.declared,
            return_type: member.declared,
            adapter: ValueAdapter::peel(member.declared).0,
            cdata: false,
            default_as_null: false,
            serialize_if_null: false,
            value_node: None,
            serializer_override: None,
            type_resolver: None,
            substitution: None,
            items: Vec::new(),
            date_format: None,
        };
        if kind == NodeKind::Excluded {
            debug!("Member {} of {} is excluded", member.name, owner);
            return Ok(descriptor);
        }

        let return_type = tags
            .iter()
            .filter_map(|tag| match tag {
                TagKind::ReturnType(info) => Some(*info),
                _ => None,
            })
            .last()
            .unwrap_or(member.declared);
        let (adapter, target) = ValueAdapter::between(member.declared, return_type)
            .map_err(|e| self.member_error(owner, member, e))?;
        descriptor.adapter = adapter;
        descriptor.return_type = target;

        let mut factory = None;
        for tag in &tags {
            match tag {
                TagKind::CData => descriptor.cdata = true,
                TagKind::DefaultAsNull => descriptor.default_as_null = true,
                TagKind::SerializeIfNull => descriptor.serialize_if_null = true,
                TagKind::ValueNode { attribute } => descriptor.value_node = Some(attribute.clone()),
                TagKind::TypeResolver(provider) => descriptor.type_resolver = Some(provider.clone()),
                TagKind::Substitution(substitution) => {
                    descriptor.substitution = Some(substitution.clone())
                }
                TagKind::Item(item) => descriptor.items.push(item.clone()),
                TagKind::DateTimeFormat(format) => descriptor.date_format = Some(format.clone()),
                TagKind::Serializer(serializer) => factory = Some(serializer.clone()),
                _ => {}
            }
        }
        if descriptor.cdata && descriptor.value_node.is_some() {
            warn!(
                "Member {} of {} is both CDATA and value node; the value node is used",
                member.name, owner
            );
            descriptor.cdata = false;
        }

        if let Some(factory) = factory {
            let supported = (factory.supported)();
            if supported != target.key() {
                return Err(XmlError::configuration(
                    owner.name(),
                    format!(
                        "serializer {} of member {} supports {}, not {}",
                        factory.serializer.name(),
                        member.name,
                        supported.name(),
                        target.key().name()
                    ),
                ));
            }
            let handle = self
                .registry
                .get_by_serializer_type(&factory, self.options, Some(&descriptor))?;
            descriptor.serializer_override = Some(handle);
        }

        Ok(descriptor)
    }

    fn derived_name(&self, name: &str) -> String {
        if self.options.lowercase_names {
            name.to_lowercase()
        } else {
            name.to_string()
        }
    }

    fn member_error(&self, owner: TypeKey, member: &MemberSchema, error: XmlError) -> XmlError {
        match error {
            XmlError::Configuration { message, .. } => XmlError::configuration(
                owner.name(),
                format!("member {}: {}", member.name, message),
            ),
            other => other,
        }
    }
}

/// Drops a generic suffix (`<...>` or a backtick arity marker) from an identifier.
fn strip_generic_suffix(name: &str) -> &str {
    match name.find(['<', '`']) {
        Some(index) => &name[..index],
        None => name,
    }
}
