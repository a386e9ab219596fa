use std::any::Any;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::{self, Display};
use std::hash::Hash;
use std::str::FromStr;
use std::sync::Arc;

use super::schema::ComplexShape;
use super::tag::{ItemDeclaration, Tag, TagKind};
use super::type_info::{AsAny, TypeInfo, TypeKey, XmlType};

/// Classification of a type, with everything the registry needs to build its serializer.
pub enum TypeShape {
    Enum(EnumShape),
    Map(MapShape),
    /// A [`TypeKey`] written as its type name.
    TypeRef,
    /// An [`XmlNode`](crate::xml::XmlNode) passed through untouched.
    RawNode,
    /// A text-convertible primitive.
    Text(TextShape),
    Guid,
    /// A value with a structured text form, such as [`Color`](crate::types::Color).
    Scalar(TextShape),
    DateTime(DateTimeShape),
    /// `Option<T>`: resolves to the serializer of `T`.
    Nullable(WrapperShape),
    /// `Box<T>`: resolves to the serializer of `T`.
    Boxed(WrapperShape),
    Sequence(SequenceShape),
    /// `Box<dyn Trait>` with its known implementations.
    Polymorphic(PolymorphicShape),
    Complex(ComplexShape),
}

impl TypeShape {
    pub fn kind(&self) -> &'static str {
        match self {
            TypeShape::Enum(_) => "enum",
            TypeShape::Map(_) => "map",
            TypeShape::TypeRef => "type reference",
            TypeShape::RawNode => "raw node",
            TypeShape::Text(_) => "text",
            TypeShape::Guid => "guid",
            TypeShape::Scalar(_) => "structured scalar",
            TypeShape::DateTime(_) => "date/time",
            TypeShape::Nullable(_) => "nullable",
            TypeShape::Boxed(_) => "boxed",
            TypeShape::Sequence(_) => "sequence",
            TypeShape::Polymorphic(_) => "polymorphic",
            TypeShape::Complex(_) => "complex",
        }
    }

    /// Whether serializers of this shape depend on the member they are built for.
    pub fn is_member_bound(&self) -> bool {
        matches!(
            self,
            TypeShape::Map(_)
                | TypeShape::Sequence(_)
                | TypeShape::DateTime(_)
                | TypeShape::Polymorphic(_)
        )
    }

    pub(crate) fn wrapper(&self) -> Option<&WrapperShape> {
        match self {
            TypeShape::Nullable(wrapper) | TypeShape::Boxed(wrapper) => Some(wrapper),
            _ => None,
        }
    }
}

impl fmt::Debug for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeShape({})", self.kind())
    }
}

// -----------------------------------------------------------------------------
// Text

/// Conversion of a value to and from its text form.
#[derive(Clone, Copy)]
pub struct TextShape {
    pub(crate) format: fn(&dyn Any) -> Option<String>,
    pub(crate) parse: fn(&str) -> Result<Box<dyn Any>, String>,
    pub(crate) is_default: Option<fn(&dyn Any) -> bool>,
    pub(crate) trim: bool,
}

impl TextShape {
    pub fn new(
        format: fn(&dyn Any) -> Option<String>,
        parse: fn(&str) -> Result<Box<dyn Any>, String>,
    ) -> Self {
        Self {
            format,
            parse,
            is_default: None,
            trim: true,
        }
    }

    /// Text form through `Display` and `FromStr`.
    pub fn parsed<T>() -> Self
    where
        T: Display + FromStr + Any,
        T::Err: Display,
    {
        Self::new(format_display::<T>, parse_from_str::<T>)
    }

    /// Treats `T::default()` as the default value for "default as null" members.
    pub fn with_default<T: Default + PartialEq + Any>(mut self) -> Self {
        self.is_default = Some(is_default_value::<T>);
        self
    }

    /// Parses the text exactly as read, without trimming surrounding whitespace.
    pub fn preserve_whitespace(mut self) -> Self {
        self.trim = false;
        self
    }
}

fn format_display<T: Display + Any>(value: &dyn Any) -> Option<String> {
    value.downcast_ref::<T>().map(|value| value.to_string())
}

fn parse_from_str<T>(text: &str) -> Result<Box<dyn Any>, String>
where
    T: FromStr + Any,
    T::Err: Display,
{
    text.parse::<T>()
        .map(|value| Box::new(value) as Box<dyn Any>)
        .map_err(|e| e.to_string())
}

fn is_default_value<T: Default + PartialEq + Any>(value: &dyn Any) -> bool {
    value
        .downcast_ref::<T>()
        .is_some_and(|value| *value == T::default())
}

// -----------------------------------------------------------------------------
// Enum

/// A fieldless enum with symbolic names.
///
/// ```
/// use xml_mapper::core::{EnumShape, TypeShape, XmlEnum, XmlType};
///
/// #[derive(Clone, Copy, PartialEq, Debug)]
/// enum Breed { Duroc, Hampshire }
///
/// impl XmlEnum for Breed {
///     const VARIANTS: &'static [(&'static str, Self)] =
///         &[("Duroc", Breed::Duroc), ("Hampshire", Breed::Hampshire)];
/// }
///
/// impl XmlType for Breed {
///     fn shape() -> TypeShape {
///         TypeShape::Enum(EnumShape::of::<Breed>())
///     }
/// }
/// ```
pub trait XmlEnum: Copy + PartialEq + Any {
    const VARIANTS: &'static [(&'static str, Self)];
}

#[derive(Clone)]
pub struct EnumShape {
    pub(crate) names: Vec<&'static str>,
    pub(crate) index_of: fn(&dyn Any) -> Option<usize>,
    pub(crate) from_index: fn(usize) -> Option<Box<dyn Any>>,
}

impl EnumShape {
    pub fn of<T: XmlEnum>() -> Self {
        Self {
            names: T::VARIANTS.iter().map(|(name, _)| *name).collect(),
            index_of: enum_index_of::<T>,
            from_index: enum_from_index::<T>,
        }
    }
}

fn enum_index_of<T: XmlEnum>(value: &dyn Any) -> Option<usize> {
    let value = value.downcast_ref::<T>()?;
    T::VARIANTS.iter().position(|(_, variant)| variant == value)
}

fn enum_from_index<T: XmlEnum>(index: usize) -> Option<Box<dyn Any>> {
    T::VARIANTS
        .get(index)
        .map(|(_, variant)| Box::new(*variant) as Box<dyn Any>)
}

// -----------------------------------------------------------------------------
// Date/time

/// A date and/or time type with `strftime`-style formatting.
pub trait XmlDateTime: Any + Sized {
    /// Format used when the member declares none.
    const GENERAL_FORMAT: &'static str;

    fn is_valid_format(format: &str) -> bool;

    fn format_with(&self, format: &str) -> Option<String>;

    fn parse_exact(text: &str, format: &str) -> Option<Self>;

    /// Parses the common textual forms of the type.
    fn parse_lenient(text: &str) -> Option<Self>;
}

#[derive(Clone, Copy)]
pub struct DateTimeShape {
    pub(crate) general_format: &'static str,
    pub(crate) is_valid_format: fn(&str) -> bool,
    pub(crate) format: fn(&dyn Any, &str) -> Option<String>,
    pub(crate) parse_exact: fn(&str, &str) -> Option<Box<dyn Any>>,
    pub(crate) parse_lenient: fn(&str) -> Option<Box<dyn Any>>,
}

impl DateTimeShape {
    pub fn of<T: XmlDateTime>() -> Self {
        Self {
            general_format: T::GENERAL_FORMAT,
            is_valid_format: T::is_valid_format,
            format: date_format::<T>,
            parse_exact: date_parse_exact::<T>,
            parse_lenient: date_parse_lenient::<T>,
        }
    }
}

fn date_format<T: XmlDateTime>(value: &dyn Any, format: &str) -> Option<String> {
    value.downcast_ref::<T>()?.format_with(format)
}

fn date_parse_exact<T: XmlDateTime>(text: &str, format: &str) -> Option<Box<dyn Any>> {
    T::parse_exact(text, format).map(|value| Box::new(value) as Box<dyn Any>)
}

fn date_parse_lenient<T: XmlDateTime>(text: &str) -> Option<Box<dyn Any>> {
    T::parse_lenient(text).map(|value| Box::new(value) as Box<dyn Any>)
}

// -----------------------------------------------------------------------------
// Wrappers

/// `Option<T>` or `Box<T>` around an inner type.
#[derive(Clone, Copy)]
pub struct WrapperShape {
    pub(crate) inner: TypeInfo,
    /// `None` if the value is not the wrapper type, `Some(None)` for a null value.
    pub(crate) view: fn(&dyn Any) -> Option<Option<&dyn Any>>,
    pub(crate) wrap: fn(Box<dyn Any>) -> Option<Box<dyn Any>>,
    pub(crate) null: Option<fn() -> Box<dyn Any>>,
}

impl WrapperShape {
    pub fn option<T: XmlType>() -> Self {
        Self {
            inner: TypeInfo::of::<T>(),
            view: view_option::<T>,
            wrap: wrap_option::<T>,
            null: Some(none_option::<T>),
        }
    }

    pub fn boxed<T: XmlType>() -> Self {
        Self {
            inner: TypeInfo::of::<T>(),
            view: view_box::<T>,
            wrap: wrap_box::<T>,
            null: None,
        }
    }

    pub fn inner(&self) -> TypeInfo {
        self.inner
    }

    pub fn is_nullable(&self) -> bool {
        self.null.is_some()
    }
}

fn view_option<T: Any>(value: &dyn Any) -> Option<Option<&dyn Any>> {
    value
        .downcast_ref::<Option<T>>()
        .map(|option| option.as_ref().map(|inner| inner as &dyn Any))
}

fn wrap_option<T: Any>(value: Box<dyn Any>) -> Option<Box<dyn Any>> {
    value
        .downcast::<T>()
        .ok()
        .map(|inner| Box::new(Some(*inner)) as Box<dyn Any>)
}

fn none_option<T: Any>() -> Box<dyn Any> {
    Box::new(None::<T>)
}

fn view_box<T: Any>(value: &dyn Any) -> Option<Option<&dyn Any>> {
    value
        .downcast_ref::<Box<T>>()
        .map(|boxed| Some(&**boxed as &dyn Any))
}

fn wrap_box<T: Any>(value: Box<dyn Any>) -> Option<Box<dyn Any>> {
    value
        .downcast::<T>()
        .ok()
        .map(|inner| Box::new(inner) as Box<dyn Any>)
}

// -----------------------------------------------------------------------------
// Sequences

/// An ordered collection.
///
/// Item declarations made here are type-level: they apply to every member of
/// this collection type and can be extended or overridden per member.
#[derive(Clone)]
pub struct SequenceShape {
    pub(crate) item: TypeInfo,
    pub(crate) array: bool,
    pub(crate) items: fn(&dyn Any) -> Option<Vec<&dyn Any>>,
    pub(crate) collect: fn(Vec<Box<dyn Any>>) -> Option<Box<dyn Any>>,
    pub(crate) tags: Vec<Tag>,
}

impl SequenceShape {
    pub fn new(
        item: TypeInfo,
        items: fn(&dyn Any) -> Option<Vec<&dyn Any>>,
        collect: fn(Vec<Box<dyn Any>>) -> Option<Box<dyn Any>>,
    ) -> Self {
        Self {
            item,
            array: false,
            items,
            collect,
            tags: Vec::new(),
        }
    }

    pub fn vec<T: XmlType>() -> Self {
        Self::new(TypeInfo::of::<T>(), vec_items::<T>, vec_collect::<T>)
    }

    pub fn vec_deque<T: XmlType>() -> Self {
        Self::new(TypeInfo::of::<T>(), deque_items::<T>, deque_collect::<T>)
    }

    /// `Box<[T]>`: read into a growable buffer, then copied into a slice of the final length.
    pub fn boxed_slice<T: XmlType>() -> Self {
        let mut shape = Self::new(TypeInfo::of::<T>(), slice_items::<T>, slice_collect::<T>);
        shape.array = true;
        shape
    }

    /// Declares an item type for every member of this collection type.
    pub fn item<I: XmlType>(mut self, alias: &str) -> Self {
        self.tags.push(Tag::new(TagKind::Item(ItemDeclaration::new::<I>(alias))));
        self
    }

    /// Makes the last declaration conditional.
    pub fn when(mut self, name: &str, value: &str) -> Self {
        if let Some(tag) = self.tags.last_mut() {
            tag.set_condition(name, value);
        }
        self
    }

    pub fn item_type(&self) -> TypeInfo {
        self.item
    }

    pub fn is_array(&self) -> bool {
        self.array
    }
}

fn vec_items<T: Any>(value: &dyn Any) -> Option<Vec<&dyn Any>> {
    value
        .downcast_ref::<Vec<T>>()
        .map(|items| items.iter().map(|item| item as &dyn Any).collect())
}

fn collect_items<T: Any>(items: Vec<Box<dyn Any>>) -> Option<Vec<T>> {
    let mut buffer = Vec::with_capacity(items.len());
    for item in items {
        buffer.push(*item.downcast::<T>().ok()?);
    }
    Some(buffer)
}

fn vec_collect<T: Any>(items: Vec<Box<dyn Any>>) -> Option<Box<dyn Any>> {
    collect_items::<T>(items).map(|items| Box::new(items) as Box<dyn Any>)
}

fn deque_items<T: Any>(value: &dyn Any) -> Option<Vec<&dyn Any>> {
    value
        .downcast_ref::<VecDeque<T>>()
        .map(|items| items.iter().map(|item| item as &dyn Any).collect())
}

fn deque_collect<T: Any>(items: Vec<Box<dyn Any>>) -> Option<Box<dyn Any>> {
    collect_items::<T>(items).map(|items| Box::new(VecDeque::from(items)) as Box<dyn Any>)
}

fn slice_items<T: Any>(value: &dyn Any) -> Option<Vec<&dyn Any>> {
    value
        .downcast_ref::<Box<[T]>>()
        .map(|items| items.iter().map(|item| item as &dyn Any).collect())
}

fn slice_collect<T: Any>(items: Vec<Box<dyn Any>>) -> Option<Box<dyn Any>> {
    collect_items::<T>(items).map(|items| Box::new(items.into_boxed_slice()) as Box<dyn Any>)
}

// -----------------------------------------------------------------------------
// Maps

/// A string-keyed map; each entry is written as `<key>value</key>`.
///
/// Keys must form valid XML names (`BTreeMap<u32, _>` cannot be written).
/// Entries of a `HashMap` are written sorted by key.
#[derive(Clone)]
pub struct MapShape {
    pub(crate) value: TypeInfo,
    pub(crate) entries: fn(&dyn Any) -> Option<Vec<(String, &dyn Any)>>,
    pub(crate) collect: fn(Vec<(String, Box<dyn Any>)>) -> Result<Box<dyn Any>, String>,
    pub(crate) tags: Vec<Tag>,
}

impl MapShape {
    pub fn new(
        value: TypeInfo,
        entries: fn(&dyn Any) -> Option<Vec<(String, &dyn Any)>>,
        collect: fn(Vec<(String, Box<dyn Any>)>) -> Result<Box<dyn Any>, String>,
    ) -> Self {
        Self {
            value,
            entries,
            collect,
            tags: Vec::new(),
        }
    }

    pub fn hash_map<K, V>() -> Self
    where
        K: Display + FromStr + Eq + Hash + Any,
        K::Err: Display,
        V: XmlType,
    {
        Self::new(
            TypeInfo::of::<V>(),
            hash_map_entries::<K, V>,
            hash_map_collect::<K, V>,
        )
    }

    pub fn btree_map<K, V>() -> Self
    where
        K: Display + FromStr + Ord + Any,
        K::Err: Display,
        V: XmlType,
    {
        Self::new(
            TypeInfo::of::<V>(),
            btree_map_entries::<K, V>,
            btree_map_collect::<K, V>,
        )
    }

    /// Declares a value type for every member of this map type.
    pub fn item<I: XmlType>(mut self, alias: &str) -> Self {
        self.tags.push(Tag::new(TagKind::Item(ItemDeclaration::new::<I>(alias))));
        self
    }

    pub fn when(mut self, name: &str, value: &str) -> Self {
        if let Some(tag) = self.tags.last_mut() {
            tag.set_condition(name, value);
        }
        self
    }

    pub fn value_type(&self) -> TypeInfo {
        self.value
    }
}

fn parse_key<K>(key: &str) -> Result<K, String>
where
    K: FromStr,
    K::Err: Display,
{
    key.parse::<K>()
        .map_err(|e| format!("invalid key `{}`: {}", key, e))
}

fn downcast_value<V: Any>(key: &str, value: Box<dyn Any>) -> Result<V, String> {
    value
        .downcast::<V>()
        .map(|value| *value)
        .map_err(|_| format!("value of key `{}` has an unexpected type", key))
}

fn hash_map_entries<K: Display + Any, V: Any>(value: &dyn Any) -> Option<Vec<(String, &dyn Any)>> {
    value.downcast_ref::<HashMap<K, V>>().map(|map| {
        // iteration order varies per map instance
        let mut entries: Vec<(String, &dyn Any)> = map
            .iter()
            .map(|(key, value)| (key.to_string(), value as &dyn Any))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    })
}

fn hash_map_collect<K, V>(entries: Vec<(String, Box<dyn Any>)>) -> Result<Box<dyn Any>, String>
where
    K: FromStr + Eq + Hash + Any,
    K::Err: Display,
    V: Any,
{
    let mut map = HashMap::with_capacity(entries.len());
    for (key, value) in entries {
        let value = downcast_value::<V>(&key, value)?;
        map.insert(parse_key::<K>(&key)?, value);
    }
    Ok(Box::new(map))
}

fn btree_map_entries<K: Display + Any, V: Any>(value: &dyn Any) -> Option<Vec<(String, &dyn Any)>> {
    value.downcast_ref::<BTreeMap<K, V>>().map(|map| {
        map.iter()
            .map(|(key, value)| (key.to_string(), value as &dyn Any))
            .collect()
    })
}

fn btree_map_collect<K, V>(entries: Vec<(String, Box<dyn Any>)>) -> Result<Box<dyn Any>, String>
where
    K: FromStr + Ord + Any,
    K::Err: Display,
    V: Any,
{
    let mut map = BTreeMap::new();
    for (key, value) in entries {
        let value = downcast_value::<V>(&key, value)?;
        map.insert(parse_key::<K>(&key)?, value);
    }
    Ok(Box::new(map))
}

// -----------------------------------------------------------------------------
// Polymorphism

/// Converts a concrete value into the declared trait-object type.
pub type Upcast = Arc<dyn Fn(Box<dyn Any>) -> Option<Box<dyn Any>> + Send + Sync>;

#[derive(Clone)]
pub struct PolymorphicVariant {
    pub(crate) info: TypeInfo,
    pub(crate) alias: Option<String>,
    pub(crate) upcast: Upcast,
}

impl PolymorphicVariant {
    pub fn info(&self) -> TypeInfo {
        self.info
    }

    pub fn alias(&self) -> &str {
        self.alias
            .as_deref()
            .unwrap_or_else(|| self.info.key().short_name())
    }
}

/// A trait-object type (`Box<dyn Trait>`) and its known implementations.
///
/// ```
/// use xml_mapper::core::{AsAny, ComplexSchema, PolymorphicShape, TypeShape, XmlType};
///
/// trait Animal: AsAny {}
///
/// #[derive(Default)]
/// struct Pig;
/// impl Animal for Pig {}
/// impl XmlType for Pig {
///     fn shape() -> TypeShape {
///         ComplexSchema::<Pig>::new().build()
///     }
/// }
///
/// impl XmlType for Box<dyn Animal> {
///     fn shape() -> TypeShape {
///         TypeShape::Polymorphic(
///             PolymorphicShape::boxed::<dyn Animal>()
///                 .variant(|pig: Pig| Box::new(pig) as Box<dyn Animal>),
///         )
///     }
/// }
/// ```
#[derive(Clone)]
pub struct PolymorphicShape {
    pub(crate) view: fn(&dyn Any) -> Option<&dyn Any>,
    pub(crate) variants: Vec<PolymorphicVariant>,
}

impl PolymorphicShape {
    /// `view` maps the declared value to its concrete value.
    pub fn new(view: fn(&dyn Any) -> Option<&dyn Any>) -> Self {
        Self {
            view,
            variants: Vec::new(),
        }
    }

    /// Shape of `Box<B>` for a trait object `B` with [`AsAny`] as supertrait.
    pub fn boxed<B: ?Sized + AsAny>() -> Self {
        Self::new(view_boxed::<B>)
    }

    /// Registers an implementation, named after its type.
    pub fn variant<V, D, F>(self, upcast: F) -> Self
    where
        V: XmlType,
        D: Any,
        F: Fn(V) -> D + Send + Sync + 'static,
    {
        self.push_variant::<V, D, F>(None, upcast)
    }

    /// Registers an implementation under an explicit wire name.
    pub fn variant_aliased<V, D, F>(self, alias: &str, upcast: F) -> Self
    where
        V: XmlType,
        D: Any,
        F: Fn(V) -> D + Send + Sync + 'static,
    {
        self.push_variant::<V, D, F>(Some(alias.to_string()), upcast)
    }

    fn push_variant<V, D, F>(mut self, alias: Option<String>, upcast: F) -> Self
    where
        V: XmlType,
        D: Any,
        F: Fn(V) -> D + Send + Sync + 'static,
    {
        let upcast: Upcast = Arc::new(move |value: Box<dyn Any>| {
            value
                .downcast::<V>()
                .ok()
                .map(|value| Box::new(upcast(*value)) as Box<dyn Any>)
        });
        self.variants.push(PolymorphicVariant {
            info: TypeInfo::of::<V>(),
            alias,
            upcast,
        });
        self
    }

    pub fn variants(&self) -> &[PolymorphicVariant] {
        &self.variants
    }

    pub fn variant_for(&self, key: TypeKey) -> Option<&PolymorphicVariant> {
        self.variants.iter().find(|variant| variant.info.key() == key)
    }
}

fn view_boxed<B: ?Sized + AsAny>(value: &dyn Any) -> Option<&dyn Any> {
    value.downcast_ref::<Box<B>>().map(|boxed| (**boxed).as_any())
}
