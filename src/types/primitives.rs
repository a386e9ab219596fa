use std::any::Any;

use crate::core::{TextShape, TypeShape, XmlType};

macro_rules! parsed_text_type {
    ($($ty:ty),* $(,)?) => {
        $(
            impl XmlType for $ty {
                fn shape() -> TypeShape {
                    TypeShape::Text(TextShape::parsed::<$ty>().with_default::<$ty>())
                }
            }
        )*
    };
}

parsed_text_type!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64
);

impl XmlType for bool {
    fn shape() -> TypeShape {
        TypeShape::Text(TextShape::new(format_bool, parse_bool).with_default::<bool>())
    }
}

fn format_bool(value: &dyn Any) -> Option<String> {
    value.downcast_ref::<bool>().map(|value| value.to_string())
}

fn parse_bool(text: &str) -> Result<Box<dyn Any>, String> {
    if text.eq_ignore_ascii_case("true") {
        Ok(Box::new(true))
    } else if text.eq_ignore_ascii_case("false") {
        Ok(Box::new(false))
    } else {
        Err("expected `true` or `false`".to_string())
    }
}

impl XmlType for char {
    fn shape() -> TypeShape {
        TypeShape::Text(
            TextShape::parsed::<char>()
                .with_default::<char>()
                .preserve_whitespace(),
        )
    }
}

impl XmlType for String {
    fn shape() -> TypeShape {
        TypeShape::Text(
            TextShape::new(format_string, parse_string)
                .with_default::<String>()
                .preserve_whitespace(),
        )
    }
}

fn format_string(value: &dyn Any) -> Option<String> {
    value.downcast_ref::<String>().cloned()
}

fn parse_string(text: &str) -> Result<Box<dyn Any>, String> {
    Ok(Box::new(text.to_string()))
}
