//! [`XmlType`](crate::core::XmlType) implementations for standard library,
//! `uuid` and `chrono` types, plus the [`Color`] scalar.

mod collections;
mod color;
#[cfg(feature = "chrono")]
mod datetime;
mod guid;
mod markup;
mod primitives;

pub use color::{Color, ColorParseError};
