use std::any::Any;
use std::sync::Arc;

use log::{debug, trace};

use super::{SerializerContext, TYPE_ALIAS_ATTRIBUTE, TextSerializer, TypeSerializer, require_text};
use crate::core::capability::{HookTable, UnhandledTable};
use crate::core::descriptor::{MemberDescriptor, NodeKind};
use crate::core::options::SerializerOptions;
use crate::core::registry::SerializerHandle;
use crate::core::scanner::MetadataScanner;
use crate::core::schema::{ComplexShape, MemberAccess, MemberSchema};
use crate::core::shape::TypeShape;
use crate::core::state::{NullDecision, SerializationState};
use crate::core::tag::{TagKind, applicable};
use crate::core::type_info::{TypeInfo, TypeKey};
use crate::error::{XmlError, XmlResult};
use crate::xml::{XmlEvent, XmlName, XmlNode, XmlReader, XmlWriter};

/// One mapped member: its descriptor, accessors and serializer.
struct MemberEntry {
    descriptor: Arc<MemberDescriptor>,
    access: MemberAccess,
    handle: SerializerHandle,
}

impl MemberEntry {
    fn name(&self) -> &XmlName {
        self.descriptor.name()
    }
}

/// Serializer of a type mapped member by member.
///
/// Attributes are written first, then the text member, then elements, each in
/// declaration order with base members ahead of derived ones. A derived
/// member mapped under the same name as a base member takes its place.
///
/// On a nullable member an empty attribute and a self-closed element read
/// back as `None`. `Some(String::new())` in an attribute therefore does not
/// survive a round trip; as an element it is written `<x></x>` and does.
pub struct ComplexSerializer {
    key: TypeKey,
    construct: Option<fn() -> Box<dyn Any>>,
    hooks: Option<HookTable>,
    unhandled: Option<UnhandledTable>,
    attributes: Vec<MemberEntry>,
    elements: Vec<MemberEntry>,
    text: Option<MemberEntry>,
}

impl ComplexSerializer {
    pub fn build(
        context: &SerializerContext<'_>,
        info: TypeInfo,
        shape: ComplexShape,
    ) -> XmlResult<Self> {
        let key = info.key();
        let scanner = MetadataScanner::new(context.registry, context.options);
        let mut serializer = Self {
            key,
            construct: shape.construct,
            hooks: shape.hooks,
            unhandled: shape.unhandled,
            attributes: Vec::new(),
            elements: Vec::new(),
            text: None,
        };

        for (owner, member) in collect_members(key, &shape, context.options)? {
            let descriptor = scanner.scan_member(owner, &member)?;
            if descriptor.kind() == NodeKind::Excluded {
                continue;
            }
            let handle = match descriptor.serializer_override() {
                Some(handle) => handle,
                None => context.registry.get_by_supported_type(
                    descriptor.return_type(),
                    context.options,
                    Some(descriptor.as_ref()),
                )?,
            };
            let needs_text = descriptor.kind() != NodeKind::Element
                || descriptor.value_node().is_some()
                || descriptor.is_cdata();
            if needs_text {
                require_text(
                    context.registry,
                    handle,
                    &format!("{}::{}", owner, member.name()),
                )?;
            }

            let entry = MemberEntry {
                descriptor,
                access: member.access().clone(),
                handle,
            };
            match entry.descriptor.kind() {
                NodeKind::Attribute => place(&mut serializer.attributes, entry),
                NodeKind::Element => place(&mut serializer.elements, entry),
                NodeKind::Text => {
                    if let Some(previous) = &serializer.text {
                        debug!(
                            "{}: text member {} replaces {}",
                            key,
                            entry.descriptor.identifier(),
                            previous.descriptor.identifier()
                        );
                    }
                    serializer.text = Some(entry);
                }
                NodeKind::Excluded => {}
            }
        }

        debug!(
            "Complex serializer for {}: {} attributes, {} elements, text: {}",
            key,
            serializer.attributes.len(),
            serializer.elements.len(),
            serializer.text.is_some()
        );
        Ok(serializer)
    }

    /// The member value to write, or `None` when it counts as null.
    fn member_value<'v>(
        &self,
        entry: &MemberEntry,
        owner: &'v dyn Any,
        serializer: &dyn TypeSerializer,
    ) -> XmlResult<Option<&'v dyn Any>> {
        let raw = entry
            .access
            .get(owner)
            .ok_or_else(|| XmlError::unexpected_value(self.key.name()))?;
        let value = entry.descriptor.adapter().view(raw)?;
        Ok(match (value, serializer.as_text()) {
            (Some(value), Some(text))
                if entry.descriptor.default_as_null() && text.is_default(value) =>
            {
                None
            }
            (value, _) => value,
        })
    }

    fn write_attribute(
        &self,
        entry: &MemberEntry,
        owner: &dyn Any,
        writer: &mut XmlWriter<'_>,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<()> {
        let serializer = state.serializer(entry.handle)?;
        let value = self.member_value(entry, owner, serializer.as_ref())?;
        match (value, state.null_decision(&entry.descriptor, value.is_none())) {
            (Some(value), NullDecision::Write) => {
                let text = text_of(serializer.as_ref())?;
                let formatted = state.with_member(&entry.descriptor, |state| text.to_text(value, state))?;
                state.write_attribute(writer, entry.name(), &formatted)
            }
            (_, NullDecision::WriteEmpty) => state.write_attribute(writer, entry.name(), ""),
            _ => Ok(()),
        }
    }

    fn write_text(
        &self,
        entry: &MemberEntry,
        owner: &dyn Any,
        writer: &mut XmlWriter<'_>,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<()> {
        let serializer = state.serializer(entry.handle)?;
        let value = match self.member_value(entry, owner, serializer.as_ref())? {
            Some(value) => value,
            None => return Ok(()),
        };
        let text = text_of(serializer.as_ref())?;
        let formatted = state.with_member(&entry.descriptor, |state| text.to_text(value, state))?;
        if entry.descriptor.is_cdata() {
            writer.write_cdata(&formatted)
        } else {
            writer.write_text(&formatted)
        }
    }

    fn write_element(
        &self,
        entry: &MemberEntry,
        owner: &dyn Any,
        writer: &mut XmlWriter<'_>,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<()> {
        let serializer = state.serializer(entry.handle)?;
        let value = self.member_value(entry, owner, serializer.as_ref())?;
        let descriptor = &entry.descriptor;
        match (value, state.null_decision(descriptor, value.is_none())) {
            (Some(value), NullDecision::Write) => {
                state.start_element(writer, descriptor.name())?;
                state.with_member(descriptor, |state| {
                    match (descriptor.value_node(), serializer.as_text()) {
                        (Some(attribute), Some(text)) => {
                            let formatted = text.to_text(value, state)?;
                            state.write_attribute(writer, &XmlName::local(attribute), &formatted)
                        }
                        (None, Some(text)) if descriptor.is_cdata() => {
                            let formatted = text.to_text(value, state)?;
                            writer.write_cdata(&formatted)
                        }
                        _ => serializer.serialize(value, writer, state),
                    }
                })?;
                state.end_element(writer)
            }
            (_, NullDecision::WriteEmpty) => {
                state.start_element(writer, descriptor.name())?;
                state.end_element(writer)
            }
            _ => Ok(()),
        }
    }

    fn read_attribute(
        &self,
        entry: &MemberEntry,
        raw: &str,
        instance: &mut dyn Any,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<()> {
        let adapter = entry.descriptor.adapter();
        let value = match adapter.null()? {
            Some(null) if raw.is_empty() => null,
            _ => {
                let serializer = state.serializer(entry.handle)?;
                let text = text_of(serializer.as_ref())?;
                let parsed = state.with_member(&entry.descriptor, |state| text.from_text(raw, state))?;
                adapter.wrap(parsed)?
            }
        };
        entry.access.set(instance, value)
    }

    fn read_element(
        &self,
        entry: &MemberEntry,
        reader: &mut XmlReader<'_>,
        instance: &mut dyn Any,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<()> {
        let descriptor = &entry.descriptor;
        let adapter = descriptor.adapter();
        let serializer = state.serializer(entry.handle)?;
        let (bare, inlined) = {
            let tag = reader.start()?;
            let inlined = descriptor
                .value_node()
                .map(|attribute| tag.attribute(attribute).map(str::to_string));
            (tag.empty && tag.attributes.is_empty(), inlined)
        };

        let value = match (inlined, serializer.as_text()) {
            (Some(raw), Some(text)) => {
                reader.skip_element()?;
                match (raw, adapter.null()?) {
                    (None, _) => {
                        trace!("{}: no value attribute on <{}>", self.key, descriptor.name());
                        return Ok(());
                    }
                    (Some(raw), Some(null)) if raw.is_empty() => null,
                    (Some(raw), _) => {
                        let parsed =
                            state.with_member(descriptor, |state| text.from_text(&raw, state))?;
                        adapter.wrap(parsed)?
                    }
                }
            }
            _ => match adapter.null()? {
                Some(null) if bare => {
                    reader.advance()?;
                    null
                }
                _ => {
                    let decoded =
                        state.with_member(descriptor, |state| serializer.deserialize(reader, state))?;
                    adapter.wrap(decoded)?
                }
            },
        };
        entry.access.set(instance, value)
    }

    fn read_text(
        &self,
        text: &str,
        instance: &mut dyn Any,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<()> {
        let entry = match &self.text {
            Some(entry) if !text.is_empty() => entry,
            Some(_) => return Ok(()),
            None => {
                if !text.trim().is_empty() {
                    debug!("{}: text content ignored", self.key);
                }
                return Ok(());
            }
        };
        let serializer = state.serializer(entry.handle)?;
        let parser = text_of(serializer.as_ref())?;
        let parsed = state.with_member(&entry.descriptor, |state| parser.from_text(text, state))?;
        let value = entry.descriptor.adapter().wrap(parsed)?;
        entry.access.set(instance, value)
    }

    fn unhandled_attribute(&self, instance: &mut dyn Any, name: &XmlName, value: &str) {
        match &self.unhandled {
            Some(table) => (table.attribute)(instance, name, value),
            None => debug!("{}: attribute {} has no member", self.key, name),
        }
    }

    fn unhandled_element(&self, instance: &mut dyn Any, node: XmlNode) {
        match &self.unhandled {
            Some(table) => (table.element)(instance, node),
            None => debug!("{}: element <{}> has no member", self.key, node.name),
        }
    }
}

impl TypeSerializer for ComplexSerializer {
    fn supported_type(&self) -> TypeKey {
        self.key
    }

    fn serialize(
        &self,
        value: &dyn Any,
        writer: &mut XmlWriter<'_>,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<()> {
        if (*value).type_id() != self.key.id() {
            return Err(XmlError::unexpected_value(self.key.name()));
        }
        state.before_serialize(self.hooks.as_ref(), value);
        for entry in &self.attributes {
            self.write_attribute(entry, value, writer, state)?;
        }
        if let Some(entry) = &self.text {
            self.write_text(entry, value, writer, state)?;
        }
        for entry in &self.elements {
            self.write_element(entry, value, writer, state)?;
        }
        state.after_serialize(self.hooks.as_ref(), value);
        Ok(())
    }

    fn deserialize(
        &self,
        reader: &mut XmlReader<'_>,
        state: &mut SerializationState<'_>,
    ) -> XmlResult<Box<dyn Any>> {
        let construct = self
            .construct
            .ok_or_else(|| XmlError::construction(self.key.name(), "no default constructor"))?;
        let mut instance = construct();
        state.before_deserialize(self.hooks.as_ref(), instance.as_mut());

        let attributes = reader.start()?.attributes.clone();
        for attribute in &attributes {
            match self
                .attributes
                .iter()
                .find(|entry| entry.name() == &attribute.name)
            {
                Some(entry) => self.read_attribute(entry, &attribute.value, instance.as_mut(), state)?,
                None if attribute.name.matches(None, TYPE_ALIAS_ATTRIBUTE) => {}
                None => self.unhandled_attribute(instance.as_mut(), &attribute.name, &attribute.value),
            }
        }

        if reader.enter()? {
            let mut text = String::new();
            loop {
                match reader.event() {
                    XmlEvent::Start(tag) => {
                        match self.elements.iter().find(|entry| entry.name() == &tag.name) {
                            Some(entry) => {
                                let mark = state.unhandled_mark();
                                self.read_element(entry, reader, instance.as_mut(), state)?;
                                if self.unhandled.is_some() {
                                    for node in state.take_unhandled(mark) {
                                        self.unhandled_element(instance.as_mut(), node);
                                    }
                                }
                            }
                            None => {
                                let node = reader.read_node()?;
                                self.unhandled_element(instance.as_mut(), node);
                            }
                        }
                    }
                    XmlEvent::Text(chunk) => {
                        text.push_str(chunk);
                        reader.advance()?;
                    }
                    XmlEvent::End(_) => {
                        reader.advance()?;
                        break;
                    }
                    XmlEvent::Eof | XmlEvent::StartDocument => {
                        return Err(XmlReader::unexpected_eof());
                    }
                }
            }
            self.read_text(&text, instance.as_mut(), state)?;
        }

        state.after_deserialize(self.hooks.as_ref(), instance.as_mut());
        Ok(instance)
    }
}

fn text_of(serializer: &dyn TypeSerializer) -> XmlResult<&dyn TextSerializer> {
    serializer.as_text().ok_or_else(|| {
        XmlError::configuration(
            serializer.supported_type().name(),
            "serializer has no text form",
        )
    })
}

/// Adds `entry`, replacing an entry mapped under the same name.
fn place(entries: &mut Vec<MemberEntry>, entry: MemberEntry) {
    match entries.iter().position(|existing| existing.name() == entry.name()) {
        Some(index) => entries[index] = entry,
        None => entries.push(entry),
    }
}

/// Members of `shape` with their owner type, base members first.
fn collect_members(
    owner: TypeKey,
    shape: &ComplexShape,
    options: &SerializerOptions,
) -> XmlResult<Vec<(TypeKey, MemberSchema)>> {
    let mut members = Vec::new();
    let include_base =
        applicable(shape.tags(), options).any(|tag| matches!(tag, TagKind::IncludeBase));
    match &shape.base {
        Some(base) if include_base => match base.info.shape() {
            TypeShape::Complex(base_shape) => {
                for (base_owner, mut member) in collect_members(base.info.key(), &base_shape, options)? {
                    member.access = member.access.through(base);
                    members.push((base_owner, member));
                }
            }
            other => {
                return Err(XmlError::configuration(
                    owner.name(),
                    format!(
                        "base {} is a {} type, not a complex one",
                        base.info.key().name(),
                        other.kind()
                    ),
                ));
            }
        },
        _ => {}
    }
    members.extend(shape.members().iter().cloned().map(|member| (owner, member)));
    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        ComplexSchema, Member, SerializerOptions, TypeSerializerRegistry, UnhandledMarkup, XmlType,
    };

    #[derive(Default, Debug, PartialEq)]
    struct Animal {
        name: String,
        legs: u32,
    }

    impl XmlType for Animal {
        fn shape() -> TypeShape {
            ComplexSchema::<Animal>::new()
                .member(Member::new("Name", |a: &Animal| &a.name, |a: &mut Animal, v| a.name = v).attribute())
                .member(Member::new("Legs", |a: &Animal| &a.legs, |a: &mut Animal, v| a.legs = v).element())
                .build()
        }
    }

    #[derive(Default, Debug, PartialEq)]
    struct Pig {
        animal: Animal,
        nickname: Option<String>,
        weight: u32,
        note: String,
        extra: Vec<String>,
    }

    impl XmlType for Pig {
        fn shape() -> TypeShape {
            ComplexSchema::<Pig>::new()
                .base::<Animal>(|p| &p.animal, |p| &mut p.animal)
                .member(
                    Member::new("Nickname", |p: &Pig| &p.nickname, |p: &mut Pig, v| p.nickname = v)
                        .attribute(),
                )
                .member(
                    Member::new("Weight", |p: &Pig| &p.weight, |p: &mut Pig, v| p.weight = v)
                        .attribute_named("Legs"),
                )
                .member(Member::new("Note", |p: &Pig| &p.note, |p: &mut Pig, v| p.note = v).text())
                .member(Member::new("Extra", |p: &Pig| &p.extra, |p: &mut Pig, v| p.extra = v).exclude())
                .unhandled_markup()
                .build()
        }
    }

    impl UnhandledMarkup for Pig {
        fn unhandled_attribute(&mut self, name: &XmlName, value: &str) {
            self.extra.push(format!("{}={}", name.local, value));
        }

        fn unhandled_element(&mut self, node: XmlNode) {
            self.extra.push(node.name.local);
        }
    }

    #[derive(Debug)]
    struct Sealed {
        id: u32,
    }

    impl XmlType for Sealed {
        fn shape() -> TypeShape {
            ComplexSchema::<Sealed>::serialize_only()
                .member(Member::new("Id", |s: &Sealed| &s.id, |s: &mut Sealed, v| s.id = v).attribute())
                .build()
        }
    }

    fn write<T: XmlType>(registry: &TypeSerializerRegistry, value: &T) -> String {
        let options = SerializerOptions::default();
        let handle = registry
            .get_by_supported_type(TypeInfo::of::<T>(), &options, None)
            .unwrap();
        let serializer = registry.serializer(handle).unwrap();
        let mut state = SerializationState::new(registry, &options);
        let mut buffer = Vec::new();
        {
            let mut writer = XmlWriter::new(&mut buffer);
            state.start_element(&mut writer, &XmlName::local("root")).unwrap();
            serializer.serialize(value, &mut writer, &mut state).unwrap();
            state.end_element(&mut writer).unwrap();
            writer.finish().unwrap();
        }
        String::from_utf8(buffer).unwrap()
    }

    fn read<T: XmlType>(registry: &TypeSerializerRegistry, xml: &str) -> XmlResult<T> {
        let options = SerializerOptions::default();
        let handle = registry.get_by_supported_type(TypeInfo::of::<T>(), &options, None)?;
        let serializer = registry.serializer(handle)?;
        let mut state = SerializationState::new(registry, &options);
        let mut reader = XmlReader::from_str(xml);
        reader.move_to_content()?;
        let value = serializer.deserialize(&mut reader, &mut state)?;
        Ok(*value.downcast::<T>().unwrap())
    }

    #[test]
    fn writes_attributes_then_text_then_elements() {
        let registry = TypeSerializerRegistry::new();
        let pig = Pig {
            animal: Animal {
                name: "Babe".to_string(),
                legs: 4,
            },
            nickname: None,
            weight: 120,
            note: "pink".to_string(),
            extra: vec!["ignored".to_string()],
        };

        let xml = write(&registry, &pig);

        assert_eq!(xml, r#"<root Name="Babe" Legs="120">pink<Legs>4</Legs></root>"#);
    }

    #[test]
    fn reads_base_and_derived_members() {
        let registry = TypeSerializerRegistry::new();

        let pig: Pig = read(
            &registry,
            r#"<root Name="Babe" Nickname="" Legs="120" color="pink">fat<Legs>4</Legs><tail/></root>"#,
        )
        .unwrap();

        assert_eq!(pig.animal.name, "Babe");
        assert_eq!(pig.animal.legs, 4);
        assert_eq!(pig.nickname, None);
        assert_eq!(pig.weight, 120);
        assert_eq!(pig.note, "fat");
        assert_eq!(pig.extra, vec!["color=pink".to_string(), "tail".to_string()]);
    }

    #[test]
    fn type_without_constructor_cannot_be_read() {
        let registry = TypeSerializerRegistry::new();

        assert_eq!(write(&registry, &Sealed { id: 7 }), r#"<root Id="7"/>"#);
        let result = read::<Sealed>(&registry, r#"<root Id="7"/>"#);
        assert!(matches!(result, Err(XmlError::Construction { .. })));
    }

    #[test]
    fn rejects_values_of_another_type() {
        let registry = TypeSerializerRegistry::new();
        let options = SerializerOptions::default();
        let handle = registry
            .get_by_supported_type(TypeInfo::of::<Animal>(), &options, None)
            .unwrap();
        let serializer = registry.serializer(handle).unwrap();
        let mut state = SerializationState::new(&registry, &options);
        let mut buffer = Vec::new();
        let mut writer = XmlWriter::new(&mut buffer);
        writer.start_element("root").unwrap();

        let result = serializer.serialize(&5u32, &mut writer, &mut state);

        assert!(matches!(result, Err(XmlError::RuntimeTypeMismatch(_))));
    }
}
