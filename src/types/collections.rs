use std::any::Any;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Display;
use std::hash::Hash;
use std::str::FromStr;

use crate::core::{MapShape, SequenceShape, TypeShape, WrapperShape, XmlType};

impl<T: XmlType> XmlType for Option<T> {
    fn shape() -> TypeShape {
        TypeShape::Nullable(WrapperShape::option::<T>())
    }
}

impl<T: XmlType> XmlType for Box<T> {
    fn shape() -> TypeShape {
        TypeShape::Boxed(WrapperShape::boxed::<T>())
    }
}

impl<T: XmlType> XmlType for Vec<T> {
    fn shape() -> TypeShape {
        TypeShape::Sequence(SequenceShape::vec::<T>())
    }
}

impl<T: XmlType> XmlType for VecDeque<T> {
    fn shape() -> TypeShape {
        TypeShape::Sequence(SequenceShape::vec_deque::<T>())
    }
}

impl<T: XmlType> XmlType for Box<[T]> {
    fn shape() -> TypeShape {
        TypeShape::Sequence(SequenceShape::boxed_slice::<T>())
    }
}

impl<K, V> XmlType for HashMap<K, V>
where
    K: Display + FromStr + Eq + Hash + Any,
    K::Err: Display,
    V: XmlType,
{
    fn shape() -> TypeShape {
        TypeShape::Map(MapShape::hash_map::<K, V>())
    }
}

impl<K, V> XmlType for BTreeMap<K, V>
where
    K: Display + FromStr + Ord + Any,
    K::Err: Display,
    V: XmlType,
{
    fn shape() -> TypeShape {
        TypeShape::Map(MapShape::btree_map::<K, V>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TypeInfo;

    #[test]
    fn wrappers_expose_their_inner_type() {
        match <Option<Box<u8>>>::shape() {
            TypeShape::Nullable(wrapper) => {
                assert_eq!(wrapper.inner().key(), TypeInfo::of::<Box<u8>>().key());
                assert!(wrapper.is_nullable());
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn boxed_slices_are_arrays() {
        match <Box<[u8]>>::shape() {
            TypeShape::Sequence(sequence) => assert!(sequence.is_array()),
            other => panic!("unexpected shape {:?}", other),
        }
        match <Vec<u8>>::shape() {
            TypeShape::Sequence(sequence) => assert!(!sequence.is_array()),
            other => panic!("unexpected shape {:?}", other),
        }
    }
}
