use std::io::Write;

use quick_xml::{
    Writer,
    events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};

use crate::error::{XmlError, XmlResult};

/// A push-style XML writer.
///
/// A start tag stays open until the first content is written, so attributes can
/// be added after [`start_element`](XmlWriter::start_element). An element that
/// receives no content is written as an empty element (`<tag/>`).
///
/// Names are passed fully qualified (`prefix:local`); namespace prefixes are
/// managed by [`SerializationState`](crate::core::state::SerializationState).
///
/// # Examples
///
/// ```
/// use xml_mapper::xml::XmlWriter;
///
/// let mut buffer = Vec::new();
/// let mut writer = XmlWriter::new(&mut buffer);
/// writer.start_element("farm").unwrap();
/// writer.write_attribute("name", "Tum").unwrap();
/// writer.start_element("pig").unwrap();
/// writer.end_element().unwrap();
/// writer.end_element().unwrap();
/// writer.finish().unwrap();
///
/// assert_eq!(String::from_utf8(buffer).unwrap(), r#"<farm name="Tum"><pig/></farm>"#);
/// ```
pub struct XmlWriter<'w> {
    inner: Writer<Box<dyn Write + 'w>>,
    pending: Option<BytesStart<'static>>,
    open: Vec<String>,
}

impl<'w> XmlWriter<'w> {
    pub fn new<W: Write + 'w>(output: W) -> Self {
        let boxed: Box<dyn Write + 'w> = Box::new(output);
        Self {
            inner: Writer::new(boxed),
            pending: None,
            open: Vec::new(),
        }
    }

    /// Creates a writer indenting nested elements by `indent` spaces.
    pub fn with_indent<W: Write + 'w>(output: W, indent: usize) -> Self {
        let boxed: Box<dyn Write + 'w> = Box::new(output);
        Self {
            inner: Writer::new_with_indent(boxed, b' ', indent),
            pending: None,
            open: Vec::new(),
        }
    }

    /// Writes `<?xml version="1.0" encoding="utf-8"?>`.
    pub fn write_declaration(&mut self) -> XmlResult<()> {
        self.emit(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
    }

    pub fn start_element(&mut self, name: &str) -> XmlResult<()> {
        self.flush_pending()?;
        self.pending = Some(BytesStart::new(name.to_string()));
        self.open.push(name.to_string());
        Ok(())
    }

    /// Adds an attribute to the start tag that is still open.
    pub fn write_attribute(&mut self, name: &str, value: &str) -> XmlResult<()> {
        match self.pending.as_mut() {
            Some(start) => {
                start.push_attribute((name, value));
                Ok(())
            }
            None => Err(XmlError::Write(format!(
                "Attribute {} written outside of a start tag",
                name
            ))),
        }
    }

    pub fn write_text(&mut self, text: &str) -> XmlResult<()> {
        self.flush_pending()?;
        self.emit(Event::Text(BytesText::new(text)))
    }

    /// Writes `text` as CDATA, splitting it where it contains `]]>`.
    pub fn write_cdata(&mut self, text: &str) -> XmlResult<()> {
        self.flush_pending()?;
        let mut rest = text;
        while let Some(index) = rest.find("]]>") {
            // "]]" closes this section, ">" opens the next one
            self.emit(Event::CData(BytesCData::new(&rest[..index + 2])))?;
            rest = &rest[index + 2..];
        }
        self.emit(Event::CData(BytesCData::new(rest)))
    }

    pub fn end_element(&mut self) -> XmlResult<()> {
        let name = self
            .open
            .pop()
            .ok_or_else(|| XmlError::Write("No open element to close".to_string()))?;
        match self.pending.take() {
            Some(start) => self.emit(Event::Empty(start)),
            None => self.emit(Event::End(BytesEnd::new(name))),
        }
    }

    /// Number of elements currently open.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Checks that every element was closed and flushes the output.
    pub fn finish(mut self) -> XmlResult<()> {
        if let Some(name) = self.open.last() {
            return Err(XmlError::Write(format!("Element {} was never closed", name)));
        }
        self.inner
            .get_mut()
            .flush()
            .map_err(|e| XmlError::Write(format!("Failed to flush XML output: {}", e)))
    }

    fn flush_pending(&mut self) -> XmlResult<()> {
        match self.pending.take() {
            Some(start) => self.emit(Event::Start(start)),
            None => Ok(()),
        }
    }

    fn emit(&mut self, event: Event<'_>) -> XmlResult<()> {
        self.inner
            .write_event(event)
            .map_err(|e| XmlError::Write(format!("Failed to write XML event: {}", e)))
    }
}
