//! Type model, schemas and the serializer registry.
//!
//! A type takes part in the mapping by implementing [`XmlType`], which
//! returns its [`TypeShape`]. The [`TypeSerializerRegistry`] turns shapes into
//! serializers, memoized per type, member and [`SerializerOptions`].

pub mod capability;
pub mod descriptor;
pub mod options;
pub mod registry;
pub mod scanner;
pub mod schema;
pub mod shape;
pub mod state;
pub mod tag;
pub mod type_info;

pub use capability::{
    DynamicTypeProvider, HookTable, ResolvedType, SerializationHooks, UnhandledMarkup,
    UnhandledTable, ValueSubstitution,
};
pub use descriptor::{MemberDescriptor, MemberKey, NodeKind, ValueAdapter};
pub use options::{SerializerOptions, SerializerOptionsBuilder};
pub use registry::{SerializerHandle, TypeSerializerRegistry};
pub use scanner::MetadataScanner;
pub use schema::{ComplexSchema, ComplexShape, Member, MemberAccess, MemberSchema};
pub use shape::{
    DateTimeShape, EnumShape, MapShape, PolymorphicShape, PolymorphicVariant, SequenceShape,
    TextShape, TypeShape, Upcast, WrapperShape, XmlDateTime, XmlEnum,
};
pub use state::{NullDecision, SerializationState};
pub use tag::{ItemDeclaration, Tag, TagKind};
pub use type_info::{AsAny, TypeInfo, TypeKey, XmlType};
