//! Optional capabilities a host type (or a member schema) can plug into the mapping.

use std::any::Any;

use super::type_info::{TypeInfo, XmlType};
use crate::xml::{StartTag, XmlName, XmlNode};

/// Lifecycle notifications around encoding and decoding of a value.
///
/// Every method defaults to a no-op; register the hooks on the type's
/// schema with [`ComplexSchema::hooks`](super::schema::ComplexSchema::hooks).
pub trait SerializationHooks {
    fn before_serialize(&self) {}

    fn after_serialize(&self) {}

    fn before_deserialize(&mut self) {}

    fn after_deserialize(&mut self) {}
}

/// Type-erased dispatch to a type's [`SerializationHooks`].
#[derive(Clone, Copy)]
pub struct HookTable {
    pub(crate) before_serialize: fn(&dyn Any),
    pub(crate) after_serialize: fn(&dyn Any),
    pub(crate) before_deserialize: fn(&mut dyn Any),
    pub(crate) after_deserialize: fn(&mut dyn Any),
}

impl HookTable {
    pub fn of<T: SerializationHooks + Any>() -> Self {
        Self {
            before_serialize: |value| {
                if let Some(value) = value.downcast_ref::<T>() {
                    value.before_serialize();
                }
            },
            after_serialize: |value| {
                if let Some(value) = value.downcast_ref::<T>() {
                    value.after_serialize();
                }
            },
            before_deserialize: |value| {
                if let Some(value) = value.downcast_mut::<T>() {
                    value.before_deserialize();
                }
            },
            after_deserialize: |value| {
                if let Some(value) = value.downcast_mut::<T>() {
                    value.after_deserialize();
                }
            },
        }
    }
}

/// Receives markup that has no member to map to while decoding.
///
/// Elements found inside a collection member are relayed to the nearest
/// owner implementing this capability.
pub trait UnhandledMarkup {
    fn unhandled_attribute(&mut self, name: &XmlName, value: &str);

    fn unhandled_element(&mut self, node: XmlNode);
}

#[derive(Clone, Copy)]
pub struct UnhandledTable {
    pub(crate) attribute: fn(&mut dyn Any, &XmlName, &str),
    pub(crate) element: fn(&mut dyn Any, XmlNode),
}

impl UnhandledTable {
    pub fn of<T: UnhandledMarkup + Any>() -> Self {
        Self {
            attribute: |value, name, text| {
                if let Some(value) = value.downcast_mut::<T>() {
                    value.unhandled_attribute(name, text);
                }
            },
            element: |value, node| {
                if let Some(value) = value.downcast_mut::<T>() {
                    value.unhandled_element(node);
                }
            },
        }
    }
}

/// A concrete type chosen by a [`DynamicTypeProvider`], with its wire name.
#[derive(Debug, Clone)]
pub struct ResolvedType {
    pub info: TypeInfo,
    pub name: String,
}

impl ResolvedType {
    pub fn of<T: XmlType>(name: &str) -> Self {
        Self {
            info: TypeInfo::of::<T>(),
            name: name.to_string(),
        }
    }
}

/// Resolves item types of open polymorphic collections.
///
/// Consulted after the declared item types: on write with the live value, on
/// read with the start tag the reader is positioned on.
pub trait DynamicTypeProvider: Send + Sync {
    fn type_for_value(&self, value: &dyn Any) -> Option<ResolvedType>;

    fn type_for_element(&self, element: &StartTag) -> Option<ResolvedType>;
}

/// Rewrites the text form of a member's value on its way to and from XML.
pub trait ValueSubstitution: Send + Sync {
    fn on_write(&self, text: &str) -> String;

    fn on_read(&self, text: &str) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        reads: u32,
        unknown: Vec<String>,
    }

    impl SerializationHooks for Counter {
        fn after_deserialize(&mut self) {
            self.reads += 1;
        }
    }

    impl UnhandledMarkup for Counter {
        fn unhandled_attribute(&mut self, name: &XmlName, _value: &str) {
            self.unknown.push(name.local.clone());
        }

        fn unhandled_element(&mut self, node: XmlNode) {
            self.unknown.push(node.name.local);
        }
    }

    #[test]
    fn tables_dispatch_to_the_concrete_type() {
        let hooks = HookTable::of::<Counter>();
        let unhandled = UnhandledTable::of::<Counter>();
        let mut counter = Counter::default();

        (hooks.after_deserialize)(&mut counter);
        (hooks.before_serialize)(&counter);
        (unhandled.attribute)(&mut counter, &XmlName::local("x"), "1");
        (unhandled.element)(&mut counter, XmlNode::new(XmlName::local("y")));

        assert_eq!(counter.reads, 1);
        assert_eq!(counter.unknown, vec!["x", "y"]);
    }

    #[test]
    fn tables_ignore_other_types() {
        let hooks = HookTable::of::<Counter>();
        let mut other = 5u32;

        (hooks.after_deserialize)(&mut other);
        assert_eq!(other, 5);
    }
}
