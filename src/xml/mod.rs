//! XML reader and writer primitives the serializers run on.
//!
//! Both wrap `quick-xml`: [`XmlReader`] is a pull cursor with resolved
//! namespaces and merged text, [`XmlWriter`] keeps start tags open so
//! attributes can follow them.

pub mod namespace;
pub mod node;
pub mod xml_reader;
pub mod xml_writer;

pub use namespace::NamespaceTable;
pub use node::{StartTag, XmlAttribute, XmlContent, XmlName, XmlNode};
pub use xml_reader::{XmlEvent, XmlReader};
pub use xml_writer::XmlWriter;
