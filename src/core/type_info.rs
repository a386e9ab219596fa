use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

use super::shape::TypeShape;

/// Identity of a Rust type: its [`TypeId`] plus a printable name.
///
/// Equality and hashing only consider the `TypeId`.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full type path, e.g. `alloc::vec::Vec<my_app::Pig>`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without module path and generic arguments, e.g. `Vec`.
    pub fn short_name(&self) -> &'static str {
        short_name(self.name)
    }
}

/// Strips the module path and generic arguments from a type path.
pub(crate) fn short_name(path: &'static str) -> &'static str {
    let base = match path.find('<') {
        Some(index) => &path[..index],
        None => path,
    };
    base.rsplit("::").next().unwrap_or(base)
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A type that can be mapped to and from XML.
///
/// The shape is the explicit schema of the type: how it is classified by the
/// registry and, for complex types, which members it has and how they are
/// accessed.
///
/// # Examples
///
/// ```
/// use xml_mapper::core::{ComplexSchema, Member, TypeShape, XmlType};
///
/// #[derive(Default)]
/// struct Pig {
///     name: String,
///     weight: u32,
/// }
///
/// impl XmlType for Pig {
///     fn shape() -> TypeShape {
///         ComplexSchema::<Pig>::new()
///             .member(Member::new("Name", |p: &Pig| &p.name, |p: &mut Pig, v| p.name = v).attribute())
///             .member(Member::new("Weight", |p: &Pig| &p.weight, |p: &mut Pig, v| p.weight = v).element())
///             .build()
///     }
/// }
/// ```
pub trait XmlType: Any + Sized {
    fn shape() -> TypeShape;
}

/// A type together with the function producing its shape.
///
/// Shapes are produced on demand, so a type may mention itself in its own
/// schema without recursing at declaration time.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    key: TypeKey,
    shape: fn() -> TypeShape,
}

impl TypeInfo {
    pub fn of<T: XmlType>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            shape: T::shape,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn shape(&self) -> TypeShape {
        (self.shape)()
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for TypeInfo {}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeInfo").field(&self.key).finish()
    }
}

/// Upcast to [`Any`] for trait objects.
///
/// Give a trait `AsAny` as supertrait so `Box<dyn Trait>` values can expose
/// their concrete type to the polymorphic serializers:
///
/// ```
/// use xml_mapper::core::AsAny;
///
/// trait Animal: AsAny {}
/// struct Pig;
/// impl Animal for Pig {}
///
/// let animal: Box<dyn Animal> = Box::new(Pig);
/// assert!((*animal).as_any().is::<Pig>());
/// ```
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_strips_path_and_generics() {
        assert_eq!(short_name("alloc::vec::Vec<my::Pig>"), "Vec");
        assert_eq!(short_name("my::farm::Pig"), "Pig");
        assert_eq!(short_name("u32"), "u32");
    }

    #[test]
    fn keys_compare_by_type_id() {
        assert_eq!(TypeKey::of::<u32>(), TypeKey::of::<u32>());
        assert_ne!(TypeKey::of::<u32>(), TypeKey::of::<i32>());
        assert_eq!(TypeKey::of::<String>().short_name(), "String");
    }
}
