use uuid::Uuid;

use crate::core::{TypeShape, XmlType};

impl XmlType for Uuid {
    fn shape() -> TypeShape {
        TypeShape::Guid
    }
}
