use crate::core::{TypeKey, TypeShape, XmlType};
use crate::xml::XmlNode;

impl XmlType for XmlNode {
    fn shape() -> TypeShape {
        TypeShape::RawNode
    }
}

impl XmlType for TypeKey {
    fn shape() -> TypeShape {
        TypeShape::TypeRef
    }
}
