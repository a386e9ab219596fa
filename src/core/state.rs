use std::any::Any;
use std::sync::Arc;

use super::capability::HookTable;
use super::descriptor::MemberDescriptor;
use super::options::SerializerOptions;
use super::registry::{SerializerHandle, TypeSerializerRegistry};
use crate::error::XmlResult;
use crate::serializer::TypeSerializer;
use crate::xml::{NamespaceTable, XmlName, XmlNode, XmlWriter};

/// What to write for a member value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullDecision {
    Write,
    /// Write an empty attribute or element.
    WriteEmpty,
    Skip,
}

/// Per-call context threaded through a serializer graph.
///
/// Holds the stack of members being mapped, so leaf serializers can consult
/// the current member's settings, the namespace prefixes bound so far, and
/// unhandled markup waiting for a host to claim it.
pub struct SerializationState<'a> {
    registry: &'a TypeSerializerRegistry,
    options: &'a SerializerOptions,
    members: Vec<Arc<MemberDescriptor>>,
    namespaces: NamespaceTable,
    unhandled: Vec<XmlNode>,
}

impl<'a> SerializationState<'a> {
    pub fn new(registry: &'a TypeSerializerRegistry, options: &'a SerializerOptions) -> Self {
        Self {
            registry,
            options,
            members: Vec::new(),
            namespaces: NamespaceTable::new(options.namespace_prefixes.clone()),
            unhandled: Vec::new(),
        }
    }

    pub fn registry(&self) -> &'a TypeSerializerRegistry {
        self.registry
    }

    pub fn options(&self) -> &'a SerializerOptions {
        self.options
    }

    pub fn serializer(&self, handle: SerializerHandle) -> XmlResult<Arc<dyn TypeSerializer>> {
        self.registry.serializer(handle)
    }

    /// The member whose value is being mapped.
    pub fn current_member(&self) -> Option<&MemberDescriptor> {
        self.members.last().map(|member| member.as_ref())
    }

    /// Runs `f` with `member` as the current member.
    pub fn with_member<R, F>(&mut self, member: &Arc<MemberDescriptor>, f: F) -> XmlResult<R>
    where
        F: FnOnce(&mut Self) -> XmlResult<R>,
    {
        self.members.push(member.clone());
        let result = f(self);
        self.members.pop();
        result
    }

    pub fn before_serialize(&self, hooks: Option<&HookTable>, value: &dyn Any) {
        if let Some(hooks) = hooks {
            (hooks.before_serialize)(value);
        }
    }

    pub fn after_serialize(&self, hooks: Option<&HookTable>, value: &dyn Any) {
        if let Some(hooks) = hooks {
            (hooks.after_serialize)(value);
        }
    }

    pub fn before_deserialize(&self, hooks: Option<&HookTable>, value: &mut dyn Any) {
        if let Some(hooks) = hooks {
            (hooks.before_deserialize)(value);
        }
    }

    pub fn after_deserialize(&self, hooks: Option<&HookTable>, value: &mut dyn Any) {
        if let Some(hooks) = hooks {
            (hooks.after_deserialize)(value);
        }
    }

    /// Whether a value that is `null` (or treated as null) is written.
    pub fn null_decision(&self, member: &MemberDescriptor, null: bool) -> NullDecision {
        if !null {
            NullDecision::Write
        } else if member.serialize_if_null || self.options.serialize_nulls {
            NullDecision::WriteEmpty
        } else {
            NullDecision::Skip
        }
    }

    /// Starts element `name`, declaring its namespace prefix if needed.
    pub fn start_element(&mut self, writer: &mut XmlWriter<'_>, name: &XmlName) -> XmlResult<()> {
        self.namespaces.push_scope();
        match &name.namespace {
            Some(uri) => {
                let (prefix, declare) = self.namespaces.prefix_for(uri);
                writer.start_element(&format!("{}:{}", prefix, name.local))?;
                if declare {
                    writer.write_attribute(&format!("xmlns:{}", prefix), uri)?;
                }
                Ok(())
            }
            None => writer.start_element(&name.local),
        }
    }

    /// Writes an attribute on the element just started.
    pub fn write_attribute(
        &mut self,
        writer: &mut XmlWriter<'_>,
        name: &XmlName,
        value: &str,
    ) -> XmlResult<()> {
        match &name.namespace {
            Some(uri) => {
                let (prefix, declare) = self.namespaces.prefix_for(uri);
                if declare {
                    writer.write_attribute(&format!("xmlns:{}", prefix), uri)?;
                }
                writer.write_attribute(&format!("{}:{}", prefix, name.local), value)
            }
            None => writer.write_attribute(&name.local, value),
        }
    }

    pub fn end_element(&mut self, writer: &mut XmlWriter<'_>) -> XmlResult<()> {
        self.namespaces.pop_scope();
        writer.end_element()
    }

    /// Hands an element nobody mapped to the nearest host that accepts unhandled markup.
    pub fn report_unhandled(&mut self, node: XmlNode) {
        self.unhandled.push(node);
    }

    /// Position in the unhandled-markup buffer, for [`take_unhandled`](Self::take_unhandled).
    pub fn unhandled_mark(&self) -> usize {
        self.unhandled.len()
    }

    /// Removes every element reported since `mark`.
    pub fn take_unhandled(&mut self, mark: usize) -> Vec<XmlNode> {
        if mark >= self.unhandled.len() {
            return Vec::new();
        }
        self.unhandled.split_off(mark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::type_info::TypeInfo;

    fn render(
        f: impl FnOnce(&mut SerializationState<'_>, &mut XmlWriter<'_>) -> XmlResult<()>,
    ) -> String {
        let registry = TypeSerializerRegistry::new();
        let options = SerializerOptions::builder()
            .namespace_prefix("urn:farm", "f")
            .build();
        let mut state = SerializationState::new(&registry, &options);
        let mut buffer = Vec::new();
        {
            let mut writer = XmlWriter::new(&mut buffer);
            f(&mut state, &mut writer).unwrap();
            writer.finish().unwrap();
        }
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn namespaces_are_declared_once() {
        let xml = render(|state, writer| {
            state.start_element(writer, &XmlName::qualified("urn:farm", "farm"))?;
            state.write_attribute(writer, &XmlName::qualified("urn:x", "id"), "1")?;
            state.start_element(writer, &XmlName::qualified("urn:farm", "pig"))?;
            state.end_element(writer)?;
            state.end_element(writer)
        });

        assert_eq!(
            xml,
            r#"<f:farm xmlns:f="urn:farm" xmlns:ns0="urn:x" ns0:id="1"><f:pig/></f:farm>"#
        );
    }

    #[test]
    fn nulls_are_skipped_unless_requested() {
        let registry = TypeSerializerRegistry::new();
        let options = SerializerOptions::default();
        let state = SerializationState::new(&registry, &options);
        let mut member = registry
            .describe_root(TypeInfo::of::<Option<u32>>(), &options)
            .unwrap()
            .as_ref()
            .clone();

        assert_eq!(state.null_decision(&member, false), NullDecision::Write);
        assert_eq!(state.null_decision(&member, true), NullDecision::Skip);

        member.serialize_if_null = true;
        assert_eq!(state.null_decision(&member, true), NullDecision::WriteEmpty);

        let all = SerializerOptions::builder().serialize_nulls(true).build();
        let state = SerializationState::new(&registry, &all);
        member.serialize_if_null = false;
        assert_eq!(state.null_decision(&member, true), NullDecision::WriteEmpty);
    }

    #[test]
    fn unhandled_markup_is_taken_from_mark() {
        let registry = TypeSerializerRegistry::new();
        let options = SerializerOptions::default();
        let mut state = SerializationState::new(&registry, &options);

        state.report_unhandled(XmlNode::new(XmlName::local("a")));
        let mark = state.unhandled_mark();
        state.report_unhandled(XmlNode::new(XmlName::local("b")));

        let taken = state.take_unhandled(mark);
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].name.local, "b");
        assert_eq!(state.unhandled_mark(), 1);
        assert!(state.take_unhandled(5).is_empty());
    }
}
