use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, ThreadId};

use log::debug;

use super::descriptor::{MemberDescriptor, MemberKey};
use super::options::SerializerOptions;
use super::scanner::MetadataScanner;
use super::shape::TypeShape;
use super::type_info::{TypeInfo, TypeKey};
use crate::error::{XmlError, XmlResult};
use crate::serializer::{
    SerializerContext, SerializerFactory, TypeSerializer,
    complex::ComplexSerializer,
    datetime::DateTimeSerializer,
    dictionary::DictionarySerializer,
    enumeration::EnumSerializer,
    guid::GuidSerializer,
    list::ListSerializer,
    passthrough::{RawNodeSerializer, TypeRefSerializer},
    polymorphic::PolymorphicSerializer,
    text::TextValueSerializer,
};

/// Address of a serializer in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SerializerHandle(usize);

impl SerializerHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    Type {
        ty: TypeKey,
        options: SerializerOptions,
        member: Option<MemberKey>,
    },
    Serializer {
        serializer: TypeKey,
        options: SerializerOptions,
        member: Option<MemberKey>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Partition {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct DescriptorKey {
    pub(crate) owner: TypeKey,
    pub(crate) member: Option<String>,
    pub(crate) options: SerializerOptions,
}

/// Index of type names to types, for type-reference values.
#[derive(Clone, Default)]
pub(crate) struct KnownTypes(Arc<RwLock<HashMap<&'static str, TypeKey>>>);

impl KnownTypes {
    fn insert(&self, key: TypeKey) {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.name(), key);
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<TypeKey> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }
}

#[derive(Default)]
struct RegistryState {
    arena: Vec<Option<Arc<dyn TypeSerializer>>>,
    static_partition: HashMap<CacheKey, SerializerHandle>,
    dynamic_partition: HashMap<CacheKey, SerializerHandle>,
    descriptors: HashMap<DescriptorKey, Arc<MemberDescriptor>>,
    /// Handles below this index belong to finished top-level builds.
    committed: usize,
}

impl RegistryState {
    fn partition(&self, partition: Partition) -> &HashMap<CacheKey, SerializerHandle> {
        match partition {
            Partition::Static => &self.static_partition,
            Partition::Dynamic => &self.dynamic_partition,
        }
    }

    fn partition_mut(&mut self, partition: Partition) -> &mut HashMap<CacheKey, SerializerHandle> {
        match partition {
            Partition::Static => &mut self.static_partition,
            Partition::Dynamic => &mut self.dynamic_partition,
        }
    }

    /// Forgets every serializer reserved at or after `handle`.
    fn rollback(&mut self, handle: SerializerHandle) {
        let first = handle.0;
        self.static_partition.retain(|_, h| h.0 < first);
        self.dynamic_partition.retain(|_, h| h.0 < first);
        self.descriptors.retain(|_, descriptor| {
            descriptor
                .serializer_override
                .is_none_or(|h| h.0 < first)
        });
        for slot in self.arena.iter_mut().skip(first) {
            *slot = None;
        }
    }
}

/// Lets one thread at a time construct serializers; reentrant for that thread.
#[derive(Default)]
struct BuildLock {
    owner: Mutex<Option<(ThreadId, usize)>>,
    released: Condvar,
}

impl BuildLock {
    fn acquire(&self) -> BuildGuard<'_> {
        let me = thread::current().id();
        let mut owner = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match *owner {
                None => {
                    *owner = Some((me, 1));
                    return BuildGuard {
                        lock: self,
                        outermost: true,
                    };
                }
                Some((id, ref mut depth)) if id == me => {
                    *depth += 1;
                    return BuildGuard {
                        lock: self,
                        outermost: false,
                    };
                }
                Some(_) => {}
            }
            owner = self
                .released
                .wait(owner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn held_by_current(&self) -> bool {
        let me = thread::current().id();
        matches!(
            *self.owner.lock().unwrap_or_else(PoisonError::into_inner),
            Some((id, _)) if id == me
        )
    }
}

struct BuildGuard<'a> {
    lock: &'a BuildLock,
    outermost: bool,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        let mut owner = self.lock.owner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, depth)) = owner.as_mut() {
            *depth -= 1;
            if *depth == 0 {
                *owner = None;
                self.lock.released.notify_all();
            }
        }
    }
}

/// Memoizing resolver from types to their serializers.
///
/// Serializers live in an arena and refer to each other by
/// [`SerializerHandle`]. A handle is reserved before its serializer is built,
/// so a type whose members mention the type itself resolves to the handle
/// being built instead of recursing.
///
/// The registry is `Send + Sync` and is usually shared behind an `Arc` by
/// every [`XmlMapper`](crate::mapper::XmlMapper) of a process.
///
/// # Examples
///
/// ```
/// use xml_mapper::core::{SerializerOptions, TypeInfo, TypeSerializerRegistry};
///
/// let registry = TypeSerializerRegistry::new();
/// let options = SerializerOptions::default();
///
/// let first = registry.get_by_supported_type(TypeInfo::of::<u32>(), &options, None).unwrap();
/// let second = registry.get_by_supported_type(TypeInfo::of::<u32>(), &options, None).unwrap();
/// assert_eq!(first, second);
/// ```
#[derive(Default)]
pub struct TypeSerializerRegistry {
    state: RwLock<RegistryState>,
    build_lock: BuildLock,
    known_types: KnownTypes,
}

impl TypeSerializerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializer of `info` (wrappers peeled) for static member and item types.
    pub fn get_by_supported_type(
        &self,
        info: TypeInfo,
        options: &SerializerOptions,
        member: Option<&MemberDescriptor>,
    ) -> XmlResult<SerializerHandle> {
        self.get_in(Partition::Static, info, options, member)
    }

    /// Serializer of `info` for root requests and provider-resolved types.
    pub fn get_dynamic(
        &self,
        info: TypeInfo,
        options: &SerializerOptions,
        member: Option<&MemberDescriptor>,
    ) -> XmlResult<SerializerHandle> {
        self.get_in(Partition::Dynamic, info, options, member)
    }

    /// Instance of the custom serializer made by `factory`.
    pub fn get_by_serializer_type(
        &self,
        factory: &SerializerFactory,
        options: &SerializerOptions,
        member: Option<&MemberDescriptor>,
    ) -> XmlResult<SerializerHandle> {
        let supported = (factory.supported)();
        let key = CacheKey::Serializer {
            serializer: factory.serializer,
            options: options.clone(),
            member: if factory.member_bound {
                member.and_then(|m| m.key.clone())
            } else {
                None
            },
        };
        let info = member
            .map(MemberDescriptor::return_type)
            .filter(|info| info.key() == supported);
        self.resolve(Partition::Static, key, |registry| {
            let context = SerializerContext {
                registry,
                options,
                member,
                info,
                supported,
            };
            (factory.create)(&context)
        })
    }

    /// The serializer at `handle`.
    ///
    /// Fails while the serializer is still being built, which only happens
    /// when called from the build of a serializer it depends on.
    pub fn serializer(&self, handle: SerializerHandle) -> XmlResult<Arc<dyn TypeSerializer>> {
        self.read()
            .arena
            .get(handle.0)
            .and_then(Clone::clone)
            .ok_or_else(|| {
                XmlError::configuration(
                    format!("serializer #{}", handle.0),
                    "serializer is not built yet",
                )
            })
    }

    /// Descriptor of `info` standing in for itself as document root.
    pub fn describe_root(
        &self,
        info: TypeInfo,
        options: &SerializerOptions,
    ) -> XmlResult<Arc<MemberDescriptor>> {
        MetadataScanner::new(self, options).scan_type(info)
    }

    /// Makes `T` resolvable by name for type-reference values.
    pub fn register<T: super::type_info::XmlType>(&self) {
        self.known_types.insert(TypeKey::of::<T>());
    }

    pub fn resolve_type_name(&self, name: &str) -> Option<TypeKey> {
        self.known_types.resolve(name)
    }

    /// Number of serializers built.
    pub fn len(&self) -> usize {
        self.read().arena.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn known_types(&self) -> KnownTypes {
        self.known_types.clone()
    }

    pub(crate) fn descriptor(&self, key: &DescriptorKey) -> Option<Arc<MemberDescriptor>> {
        self.read().descriptors.get(key).cloned()
    }

    pub(crate) fn insert_descriptor(&self, key: DescriptorKey, descriptor: Arc<MemberDescriptor>) {
        self.write().descriptors.insert(key, descriptor);
    }

    fn get_in(
        &self,
        partition: Partition,
        info: TypeInfo,
        options: &SerializerOptions,
        member: Option<&MemberDescriptor>,
    ) -> XmlResult<SerializerHandle> {
        let mut info = info;
        let mut shape = info.shape();
        while let Some(wrapper) = shape.wrapper() {
            info = wrapper.inner;
            shape = info.shape();
        }
        self.known_types.insert(info.key());

        let key = CacheKey::Type {
            ty: info.key(),
            options: options.clone(),
            member: if shape.is_member_bound() {
                member.and_then(|m| m.key.clone())
            } else {
                None
            },
        };
        self.resolve(partition, key, move |registry| {
            let context = SerializerContext {
                registry,
                options,
                member,
                info: Some(info),
                supported: info.key(),
            };
            build(&context, info, shape)
        })
    }

    /// Returns the cached handle for `key`, or reserves one and fills it with `build`.
    ///
    /// Construction runs under the build lock. The thread holding it sees its
    /// own reservations. Other threads see a handle once the top-level build
    /// that made it has finished, since a filled serializer may still point at
    /// dependencies under construction.
    fn resolve<F>(&self, partition: Partition, key: CacheKey, build: F) -> XmlResult<SerializerHandle>
    where
        F: FnOnce(&Self) -> XmlResult<Arc<dyn TypeSerializer>>,
    {
        if let Some(handle) = self.built(partition, &key) {
            return Ok(handle);
        }

        let guard = self.build_lock.acquire();
        let handle = {
            let mut state = self.write();
            if let Some(handle) = state.partition(partition).get(&key) {
                return Ok(*handle);
            }
            let handle = SerializerHandle(state.arena.len());
            state.arena.push(None);
            state.partition_mut(partition).insert(key.clone(), handle);
            handle
        };
        debug!("Building serializer #{} for {:?}", handle.0, key);

        let result = match build(self) {
            Ok(serializer) => {
                if let Some(slot) = self.write().arena.get_mut(handle.0) {
                    *slot = Some(serializer);
                }
                Ok(handle)
            }
            Err(e) => {
                debug!("Serializer #{} failed to build: {}", handle.0, e);
                self.write().rollback(handle);
                Err(e)
            }
        };
        if guard.outermost {
            let mut state = self.write();
            state.committed = state.arena.len();
        }
        result
    }

    /// Handle for `key` if the calling thread may use it without the build lock.
    fn built(&self, partition: Partition, key: &CacheKey) -> Option<SerializerHandle> {
        let building = self.build_lock.held_by_current();
        let state = self.read();
        state
            .partition(partition)
            .get(key)
            .copied()
            .filter(|handle| matches!(state.arena.get(handle.0), Some(Some(_))))
            .filter(|handle| building || handle.0 < state.committed)
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for TypeSerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("TypeSerializerRegistry")
            .field("serializers", &state.arena.len())
            .field("static", &state.static_partition.len())
            .field("dynamic", &state.dynamic_partition.len())
            .field("descriptors", &state.descriptors.len())
            .finish()
    }
}

fn build(
    context: &SerializerContext<'_>,
    info: TypeInfo,
    shape: TypeShape,
) -> XmlResult<Arc<dyn TypeSerializer>> {
    let key = info.key();
    let serializer: Arc<dyn TypeSerializer> = match shape {
        TypeShape::Enum(shape) => Arc::new(EnumSerializer::new(key, shape)),
        TypeShape::Map(shape) => Arc::new(DictionarySerializer::build(context, key, shape)?),
        TypeShape::TypeRef => Arc::new(TypeRefSerializer::new(key, context.registry.known_types())),
        TypeShape::RawNode => Arc::new(RawNodeSerializer::new(key)),
        TypeShape::Text(shape) => Arc::new(TextValueSerializer::new(key, shape)),
        TypeShape::Guid => Arc::new(GuidSerializer::new(key)),
        TypeShape::Scalar(shape) => Arc::new(TextValueSerializer::new(key, shape)),
        TypeShape::DateTime(shape) => Arc::new(DateTimeSerializer::build(context, key, shape)?),
        TypeShape::Nullable(wrapper) | TypeShape::Boxed(wrapper) => {
            return Err(XmlError::configuration(
                key.name(),
                format!("wrapper around {} reached the builder", wrapper.inner.key().name()),
            ));
        }
        TypeShape::Sequence(shape) => Arc::new(ListSerializer::build(context, key, shape)?),
        TypeShape::Polymorphic(shape) => {
            Arc::new(PolymorphicSerializer::build(context, info, shape)?)
        }
        TypeShape::Complex(shape) => Arc::new(ComplexSerializer::build(context, info, shape)?),
    };
    Ok(serializer)
}
