use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::capability::{
    DynamicTypeProvider, HookTable, SerializationHooks, UnhandledMarkup, UnhandledTable,
    ValueSubstitution,
};
use super::shape::TypeShape;
use super::tag::{ItemDeclaration, Tag, TagKind};
use super::type_info::{TypeInfo, XmlType};
use crate::error::{XmlError, XmlResult};
use crate::serializer::{CustomSerializer, SerializerFactory};

type Getter = Arc<dyn for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync>;
type Setter = Arc<dyn Fn(&mut dyn Any, Box<dyn Any>) -> XmlResult<()> + Send + Sync>;
type Projection = Arc<dyn for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync>;
type ProjectionMut = Arc<dyn for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync>;

fn getter<F>(f: F) -> Getter
where
    F: for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn projection_mut<F>(f: F) -> ProjectionMut
where
    F: for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Type-erased read and write access to one member of an owner value.
#[derive(Clone)]
pub struct MemberAccess {
    get: Getter,
    set: Setter,
}

impl MemberAccess {
    pub fn get<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        (self.get)(owner)
    }

    pub fn set(&self, owner: &mut dyn Any, value: Box<dyn Any>) -> XmlResult<()> {
        (self.set)(owner, value)
    }

    /// Access to the same member through the base part of a derived owner.
    pub(crate) fn through(&self, base: &BaseSchema) -> MemberAccess {
        let project = base.project.clone();
        let get = self.get.clone();
        let project_mut = base.project_mut.clone();
        let set = self.set.clone();
        let name = base.info.key().name();
        MemberAccess {
            get: getter(move |owner: &dyn Any| project(owner).and_then(|base| get(base))),
            set: Arc::new(move |owner: &mut dyn Any, value: Box<dyn Any>| {
                let base = project_mut(owner).ok_or_else(|| XmlError::unexpected_value(name))?;
                set(base, value)
            }),
        }
    }
}

/// The declaration of one member: its name, declared type, tags and accessors.
#[derive(Clone)]
pub struct MemberSchema {
    pub(crate) name: String,
    pub(crate) declared: TypeInfo,
    pub(crate) tags: Vec<Tag>,
    pub(crate) access: MemberAccess,
}

impl MemberSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared(&self) -> TypeInfo {
        self.declared
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn access(&self) -> &MemberAccess {
        &self.access
    }
}

impl fmt::Debug for MemberSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberSchema")
            .field("name", &self.name)
            .field("declared", &self.declared)
            .field("tags", &self.tags)
            .finish()
    }
}

/// Base part of a complex type whose members are mapped along with the derived ones.
#[derive(Clone)]
pub struct BaseSchema {
    pub(crate) info: TypeInfo,
    project: Projection,
    project_mut: ProjectionMut,
}

/// Schema of a type mapped member by member.
pub struct ComplexShape {
    pub(crate) construct: Option<fn() -> Box<dyn Any>>,
    pub(crate) members: Vec<MemberSchema>,
    pub(crate) base: Option<BaseSchema>,
    pub(crate) tags: Vec<Tag>,
    pub(crate) hooks: Option<HookTable>,
    pub(crate) unhandled: Option<UnhandledTable>,
}

impl ComplexShape {
    pub fn members(&self) -> &[MemberSchema] {
        &self.members
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

fn construct_default<T: Default + Any>() -> Box<dyn Any> {
    Box::new(T::default())
}

/// Builder of the [`TypeShape::Complex`] shape of `T`.
///
/// # Examples
///
/// ```
/// use xml_mapper::core::{ComplexSchema, Member, TypeShape, XmlType};
///
/// #[derive(Default)]
/// struct Animal {
///     name: String,
/// }
///
/// #[derive(Default)]
/// struct Pig {
///     animal: Animal,
///     weight: u32,
/// }
///
/// impl XmlType for Animal {
///     fn shape() -> TypeShape {
///         ComplexSchema::<Animal>::new()
///             .member(Member::new("Name", |a: &Animal| &a.name, |a: &mut Animal, v| a.name = v).attribute())
///             .build()
///     }
/// }
///
/// impl XmlType for Pig {
///     fn shape() -> TypeShape {
///         ComplexSchema::<Pig>::new()
///             .root("pig")
///             .base::<Animal>(|p| &p.animal, |p| &mut p.animal)
///             .member(Member::new("Weight", |p: &Pig| &p.weight, |p: &mut Pig, v| p.weight = v).element())
///             .build()
///     }
/// }
/// ```
pub struct ComplexSchema<T> {
    shape: ComplexShape,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: Default + Any> ComplexSchema<T> {
    pub fn new() -> Self {
        let mut schema = Self::serialize_only();
        schema.shape.construct = Some(construct_default::<T>);
        schema
    }
}

impl<T: Default + Any> Default for ComplexSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Any> ComplexSchema<T> {
    /// Schema of a type without default constructor; decoding it is a construction error.
    pub fn serialize_only() -> Self {
        Self {
            shape: ComplexShape {
                construct: None,
                members: Vec::new(),
                base: None,
                tags: Vec::new(),
                hooks: None,
                unhandled: None,
            },
            _phantom: PhantomData,
        }
    }

    pub fn member(mut self, member: Member<T>) -> Self {
        self.shape.members.push(member.schema);
        self
    }

    /// Element name used when the type is mapped as the document root.
    pub fn root(self, name: &str) -> Self {
        self.type_tag(TagKind::Root {
            name: name.to_string(),
            namespace: None,
        })
    }

    pub fn root_qualified(self, namespace: &str, name: &str) -> Self {
        self.type_tag(TagKind::Root {
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
        })
    }

    /// Maps the members of `B` as well, reached through the given projections.
    pub fn base<B: XmlType>(
        mut self,
        project: fn(&T) -> &B,
        project_mut: fn(&mut T) -> &mut B,
    ) -> Self {
        self.shape.base = Some(BaseSchema {
            info: TypeInfo::of::<B>(),
            project: getter(move |owner: &dyn Any| {
                owner
                    .downcast_ref::<T>()
                    .map(|owner| project(owner) as &dyn Any)
            }),
            project_mut: projection_mut(move |owner: &mut dyn Any| {
                owner
                    .downcast_mut::<T>()
                    .map(|owner| project_mut(owner) as &mut dyn Any)
            }),
        });
        self.type_tag(TagKind::IncludeBase)
    }

    /// Makes the last type-level tag conditional.
    pub fn when(mut self, name: &str, value: &str) -> Self {
        if let Some(tag) = self.shape.tags.last_mut() {
            tag.set_condition(name, value);
        }
        self
    }

    pub fn build(self) -> TypeShape {
        TypeShape::Complex(self.shape)
    }

    fn type_tag(mut self, kind: TagKind) -> Self {
        self.shape.tags.push(Tag::new(kind));
        self
    }
}

impl<T: SerializationHooks + Any> ComplexSchema<T> {
    /// Calls the [`SerializationHooks`] of `T` around encoding and decoding.
    pub fn hooks(mut self) -> Self {
        self.shape.hooks = Some(HookTable::of::<T>());
        self
    }
}

impl<T: UnhandledMarkup + Any> ComplexSchema<T> {
    /// Hands attributes and elements without member to `T`.
    pub fn unhandled_markup(mut self) -> Self {
        self.shape.unhandled = Some(UnhandledTable::of::<T>());
        self
    }
}

/// Builder of one member of a [`ComplexSchema`].
///
/// Tags are kept in declaration order; [`when`](Member::when) guards the last
/// one added.
///
/// On `Option` members an empty attribute or a self-closed element decodes
/// to `None`, so `Some("")` mapped to an attribute reads back as `None`.
pub struct Member<T> {
    schema: MemberSchema,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: Any> Member<T> {
    pub fn new<M, G, S>(name: &str, get: G, set: S) -> Self
    where
        M: XmlType,
        G: Fn(&T) -> &M + Send + Sync + 'static,
        S: Fn(&mut T, M) + Send + Sync + 'static,
    {
        let owner = std::any::type_name::<T>();
        let member = name.to_string();
        let access = MemberAccess {
            get: getter(move |owner: &dyn Any| {
                owner.downcast_ref::<T>().map(|owner| get(owner) as &dyn Any)
            }),
            set: Arc::new(move |target: &mut dyn Any, value: Box<dyn Any>| {
                let target = target
                    .downcast_mut::<T>()
                    .ok_or_else(|| XmlError::unexpected_value(owner))?;
                let value = value.downcast::<M>().map_err(|_| {
                    XmlError::RuntimeTypeMismatch(format!(
                        "member {} of {} expects a value of type {}",
                        member,
                        owner,
                        std::any::type_name::<M>()
                    ))
                })?;
                set(target, *value);
                Ok(())
            }),
        };
        Self {
            schema: MemberSchema {
                name: name.to_string(),
                declared: TypeInfo::of::<M>(),
                tags: Vec::new(),
                access,
            },
            _phantom: PhantomData,
        }
    }

    /// Maps the member to an attribute named after the member.
    pub fn attribute(self) -> Self {
        self.tag(TagKind::Attribute {
            name: None,
            namespace: None,
        })
    }

    pub fn attribute_named(self, name: &str) -> Self {
        self.tag(TagKind::Attribute {
            name: Some(name.to_string()),
            namespace: None,
        })
    }

    /// Maps the member to a child element named after the member.
    pub fn element(self) -> Self {
        self.tag(TagKind::Element {
            name: None,
            namespace: None,
        })
    }

    pub fn element_named(self, name: &str) -> Self {
        self.tag(TagKind::Element {
            name: Some(name.to_string()),
            namespace: None,
        })
    }

    /// Puts the last attribute or element tag in namespace `uri`.
    pub fn namespace(mut self, uri: &str) -> Self {
        let last = self.schema.tags.iter_mut().rev().find_map(|tag| match &mut tag.kind {
            TagKind::Attribute { namespace, .. } | TagKind::Element { namespace, .. } => {
                Some(namespace)
            }
            _ => None,
        });
        if let Some(namespace) = last {
            *namespace = Some(uri.to_string());
        }
        self
    }

    /// Maps the member to the text content of the owner's element.
    pub fn text(self) -> Self {
        self.tag(TagKind::Text)
    }

    pub fn exclude(self) -> Self {
        self.tag(TagKind::Exclude)
    }

    pub fn cdata(self) -> Self {
        self.tag(TagKind::CData)
    }

    /// Skips the member when it holds its type's default value.
    pub fn default_as_null(self) -> Self {
        self.tag(TagKind::DefaultAsNull)
    }

    /// Writes an empty node for the member when it is null.
    pub fn serialize_if_null(self) -> Self {
        self.tag(TagKind::SerializeIfNull)
    }

    /// Writes the member's text form as attribute `attribute` of its element.
    pub fn value_node(self, attribute: &str) -> Self {
        self.tag(TagKind::ValueNode {
            attribute: attribute.to_string(),
        })
    }

    /// Maps the member as `R`, a variant of its polymorphic declared type.
    pub fn return_type<R: XmlType>(self) -> Self {
        self.tag(TagKind::ReturnType(TypeInfo::of::<R>()))
    }

    /// Uses the custom serializer `S` for this member.
    pub fn serializer<S: CustomSerializer>(self) -> Self {
        self.tag(TagKind::Serializer(SerializerFactory::of::<S>()))
    }

    pub fn type_resolver<P: DynamicTypeProvider + 'static>(self, provider: P) -> Self {
        self.tag(TagKind::TypeResolver(Arc::new(provider)))
    }

    pub fn substitution<V: ValueSubstitution + 'static>(self, substitution: V) -> Self {
        self.tag(TagKind::Substitution(Arc::new(substitution)))
    }

    /// Declares an item (or map value) type written under `alias`.
    pub fn item<I: XmlType>(self, alias: &str) -> Self {
        self.tag(TagKind::Item(ItemDeclaration::new::<I>(alias)))
    }

    /// Declares an item type whose text form is inlined into attribute `attribute`.
    pub fn item_value_node<I: XmlType>(self, alias: &str, attribute: &str) -> Self {
        self.tag(TagKind::Item(
            ItemDeclaration::new::<I>(alias).with_value_node(attribute),
        ))
    }

    /// `strftime`-style format for date/time members.
    pub fn date_format(self, format: &str) -> Self {
        self.tag(TagKind::DateTimeFormat(format.to_string()))
    }

    pub fn when(mut self, name: &str, value: &str) -> Self {
        if let Some(tag) = self.schema.tags.last_mut() {
            tag.set_condition(name, value);
        }
        self
    }

    fn tag(mut self, kind: TagKind) -> Self {
        self.schema.tags.push(Tag::new(kind));
        self
    }
}
