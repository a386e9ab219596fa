use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use log::debug;

use crate::core::{
    MemberDescriptor, SerializationState, SerializerHandle, SerializerOptions, TypeInfo,
    TypeSerializerRegistry, XmlType,
};
use crate::error::{XmlError, XmlResult};
use crate::serializer::TypeSerializer;
use crate::xml::{XmlReader, XmlWriter};

/// Encodes values to XML documents and decodes them back.
///
/// The root element is named after the type (or its declared root name) and
/// its content is produced by the type's serializer from the registry.
///
/// # Examples
///
/// ```
/// use xml_mapper::XmlMapper;
/// use xml_mapper::core::{ComplexSchema, Member, TypeShape, XmlType};
///
/// #[derive(Default, Debug, PartialEq)]
/// struct Pig {
///     name: String,
///     weight: u32,
/// }
///
/// impl XmlType for Pig {
///     fn shape() -> TypeShape {
///         ComplexSchema::<Pig>::new()
///             .root("pig")
///             .member(Member::new("Name", |p: &Pig| &p.name, |p: &mut Pig, v| p.name = v).attribute())
///             .member(Member::new("Weight", |p: &Pig| &p.weight, |p: &mut Pig, v| p.weight = v).element())
///             .build()
///     }
/// }
///
/// let mapper = XmlMapper::new();
/// let pig = Pig { name: "Babe".to_string(), weight: 120 };
///
/// let xml = mapper.to_string(&pig).unwrap();
/// assert_eq!(xml, r#"<pig Name="Babe"><Weight>120</Weight></pig>"#);
/// assert_eq!(mapper.from_str::<Pig>(&xml).unwrap(), pig);
/// ```
#[derive(Clone)]
pub struct XmlMapper {
    registry: Arc<TypeSerializerRegistry>,
    options: SerializerOptions,
    indent: Option<usize>,
    declaration: bool,
}

impl Default for XmlMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlMapper {
    /// Mapper with default options and a registry of its own.
    pub fn new() -> Self {
        XmlMapperBuilder::new().build()
    }

    pub fn builder() -> XmlMapperBuilder {
        XmlMapperBuilder::new()
    }

    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<TypeSerializerRegistry> {
        &self.registry
    }

    /// Builds (or fetches) the serializer of `T` as document root.
    ///
    /// Schema errors surface here rather than on the first document.
    pub fn serializer_for<T: XmlType>(&self) -> XmlResult<Arc<dyn TypeSerializer>> {
        let (_, handle) = self.root::<T>()?;
        self.registry.serializer(handle)
    }

    pub fn to_string<T: XmlType>(&self, value: &T) -> XmlResult<String> {
        let mut buffer = Vec::new();
        self.to_writer(value, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| XmlError::Write(format!("Invalid UTF-8 output: {}", e)))
    }

    pub fn to_writer<T: XmlType, W: Write>(&self, value: &T, output: W) -> XmlResult<()> {
        let (descriptor, handle) = self.root::<T>()?;
        let serializer = self.registry.serializer(handle)?;
        let mut writer = match self.indent {
            Some(indent) => XmlWriter::with_indent(output, indent),
            None => XmlWriter::new(output),
        };
        if self.declaration {
            writer.write_declaration()?;
        }

        let mut state = SerializationState::new(&self.registry, &self.options);
        state.start_element(&mut writer, descriptor.name())?;
        match descriptor.adapter().view(value)? {
            Some(value) => {
                state.with_member(&descriptor, |state| serializer.serialize(value, &mut writer, state))?
            }
            None => debug!("Writing null {} as an empty root", descriptor.identifier()),
        }
        state.end_element(&mut writer)?;
        writer.finish()
    }

    pub fn to_path<T: XmlType, P: AsRef<Path>>(&self, value: &T, path: P) -> XmlResult<()> {
        let file = File::create(path)?;
        self.to_writer(value, BufWriter::new(file))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str<T: XmlType>(&self, xml: &str) -> XmlResult<T> {
        self.read(XmlReader::from_str(xml))
    }

    pub fn from_reader<T: XmlType, R: Read>(&self, input: R) -> XmlResult<T> {
        self.read(XmlReader::from_reader(input))
    }

    pub fn from_path<T: XmlType, P: AsRef<Path>>(&self, path: P) -> XmlResult<T> {
        let file = File::open(path)?;
        self.from_reader(file)
    }

    fn read<T: XmlType>(&self, mut reader: XmlReader<'_>) -> XmlResult<T> {
        let (descriptor, handle) = self.root::<T>()?;
        let serializer = self.registry.serializer(handle)?;
        reader.move_to_content()?;

        let empty = {
            let tag = reader.start()?;
            if tag.name.local != descriptor.name().local {
                debug!(
                    "Root element <{}> read as {}",
                    tag.name,
                    descriptor.identifier()
                );
            }
            tag.empty && tag.attributes.is_empty()
        };
        let mut state = SerializationState::new(&self.registry, &self.options);
        let value = match descriptor.adapter().null()? {
            Some(null) if empty => null,
            _ => {
                let decoded =
                    state.with_member(&descriptor, |state| serializer.deserialize(&mut reader, state))?;
                descriptor.adapter().wrap(decoded)?
            }
        };
        value
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| XmlError::unexpected_value(std::any::type_name::<T>()))
    }

    fn root<T: XmlType>(&self) -> XmlResult<(Arc<MemberDescriptor>, SerializerHandle)> {
        let descriptor = self.registry.describe_root(TypeInfo::of::<T>(), &self.options)?;
        let handle = match descriptor.serializer_override() {
            Some(handle) => handle,
            None => self.registry.get_dynamic(
                descriptor.return_type(),
                &self.options,
                Some(descriptor.as_ref()),
            )?,
        };
        Ok((descriptor, handle))
    }
}

/// Builder of an [`XmlMapper`].
///
/// Mappers built with the same registry share every serializer built for
/// the same options.
#[derive(Default)]
pub struct XmlMapperBuilder {
    options: SerializerOptions,
    registry: Option<Arc<TypeSerializerRegistry>>,
    indent: Option<usize>,
    declaration: bool,
}

impl XmlMapperBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: SerializerOptions) -> Self {
        self.options = options;
        self
    }

    /// Shares `registry` instead of creating one.
    pub fn registry(mut self, registry: Arc<TypeSerializerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Indents nested elements by `indent` spaces.
    pub fn indent(mut self, indent: usize) -> Self {
        self.indent = Some(indent);
        self
    }

    /// Starts documents with an XML declaration.
    pub fn declaration(mut self, declaration: bool) -> Self {
        self.declaration = declaration;
        self
    }

    pub fn build(self) -> XmlMapper {
        XmlMapper {
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(TypeSerializerRegistry::new())),
            options: self.options,
            indent: self.indent,
            declaration: self.declaration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_roots_are_named_after_their_type() {
        let mapper = XmlMapper::new();

        let xml = mapper.to_string(&42u32).unwrap();

        assert_eq!(xml, "<u32>42</u32>");
        assert_eq!(mapper.from_str::<u32>(&xml).unwrap(), 42);
    }

    #[test]
    fn null_root_is_an_empty_element() {
        let mapper = XmlMapper::new();

        let xml = mapper.to_string(&None::<String>).unwrap();

        assert_eq!(xml, "<String/>");
        assert_eq!(mapper.from_str::<Option<String>>(&xml).unwrap(), None);
    }

    #[test]
    fn declaration_is_written_on_request() {
        let mapper = XmlMapper::builder().declaration(true).build();

        let xml = mapper.to_string(&true).unwrap();

        assert_eq!(xml, r#"<?xml version="1.0" encoding="utf-8"?><bool>true</bool>"#);
    }

    #[test]
    fn mappers_share_a_registry() {
        let registry = Arc::new(TypeSerializerRegistry::new());
        let first = XmlMapper::builder().registry(registry.clone()).build();
        let second = XmlMapper::builder().registry(registry.clone()).build();

        let a = first.serializer_for::<u64>().unwrap();
        let b = second.serializer_for::<u64>().unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }
}
