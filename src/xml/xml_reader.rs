use std::io::{BufRead, BufReader, Read};
use std::str;

use log::debug;
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

use super::node::{StartTag, XmlAttribute, XmlContent, XmlName, XmlNode};
use crate::error::{XmlError, XmlResult};

/// The node the [`XmlReader`] cursor is positioned on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    /// Nothing has been read yet.
    StartDocument,
    Start(StartTag),
    End(XmlName),
    /// Merged run of text, CDATA and entity references. Whitespace-only runs
    /// are dropped unless they are the whole content of an element.
    Text(String),
    Eof,
}

enum Raw {
    Event(XmlEvent),
    Text(String),
}

/// A pull-style cursor over an XML document.
///
/// The reader wraps a `quick-xml` [`NsReader`] so element and attribute names
/// come out namespace-resolved. Adjacent text, CDATA and entity references are
/// merged into a single [`XmlEvent::Text`].
///
/// # Examples
///
/// ```
/// use xml_mapper::xml::{XmlEvent, XmlReader};
///
/// let mut reader = XmlReader::from_str(r#"<farm name="Tum"><pig/></farm>"#);
/// reader.move_to_content().unwrap();
///
/// let farm = reader.start().unwrap();
/// assert_eq!(farm.name.local, "farm");
/// assert_eq!(farm.attribute("name"), Some("Tum"));
///
/// assert!(reader.enter().unwrap());
/// assert!(matches!(reader.event(), XmlEvent::Start(tag) if tag.empty));
/// ```
pub struct XmlReader<'r> {
    inner: NsReader<Box<dyn BufRead + 'r>>,
    buffer: Vec<u8>,
    current: XmlEvent,
    lookahead: Option<XmlEvent>,
}

impl<'r> XmlReader<'r> {
    /// Creates a reader over an in-memory document.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(xml: &'r str) -> Self {
        Self::from_buf_read(xml.as_bytes())
    }

    /// Creates a reader over any [`Read`] source.
    pub fn from_reader<R: Read + 'r>(reader: R) -> Self {
        Self::from_buf_read(BufReader::with_capacity(1024, reader))
    }

    fn from_buf_read<B: BufRead + 'r>(source: B) -> Self {
        let boxed: Box<dyn BufRead + 'r> = Box::new(source);
        Self {
            inner: NsReader::from_reader(boxed),
            buffer: Vec::with_capacity(1024),
            current: XmlEvent::StartDocument,
            lookahead: None,
        }
    }

    /// The node the cursor is positioned on.
    pub fn event(&self) -> &XmlEvent {
        &self.current
    }

    /// The start tag the cursor is positioned on.
    pub fn start(&self) -> XmlResult<&StartTag> {
        match &self.current {
            XmlEvent::Start(tag) => Ok(tag),
            other => Err(XmlError::Read(format!(
                "Expected a start element, found {:?}",
                other
            ))),
        }
    }

    /// Advances to the first element of the document.
    pub fn move_to_content(&mut self) -> XmlResult<()> {
        loop {
            match &self.current {
                XmlEvent::Start(_) => return Ok(()),
                XmlEvent::Eof => {
                    return Err(XmlError::Read(
                        "Document has no root element".to_string(),
                    ));
                }
                _ => self.advance()?,
            }
        }
    }

    /// Moves the cursor to the next node.
    pub fn advance(&mut self) -> XmlResult<()> {
        let opened = matches!(&self.current, XmlEvent::Start(tag) if !tag.empty);
        let mut text: Option<String> = None;
        loop {
            let raw = match self.lookahead.take() {
                Some(event) => Raw::Event(event),
                None => self.next_raw()?,
            };
            match raw {
                Raw::Text(chunk) => text.get_or_insert_with(String::new).push_str(&chunk),
                Raw::Event(event) => {
                    // whitespace is content only when nothing but an end tag follows
                    let sole = opened && matches!(event, XmlEvent::End(_));
                    match text {
                        Some(text) if sole || !text.trim().is_empty() => {
                            self.lookahead = Some(event);
                            self.current = XmlEvent::Text(text);
                        }
                        _ => self.current = event,
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Consumes the current start tag.
    ///
    /// Returns `false` when the element was empty (`<tag/>`); the cursor is then
    /// already past the element. Otherwise the cursor is on the first child node.
    pub fn enter(&mut self) -> XmlResult<bool> {
        let empty = self.start()?.empty;
        self.advance()?;
        Ok(!empty)
    }

    /// Reads the text content of the current element and moves past its end tag.
    pub fn read_element_text(&mut self) -> XmlResult<String> {
        let mut text = String::new();
        if !self.enter()? {
            return Ok(text);
        }
        loop {
            match &self.current {
                XmlEvent::Text(chunk) => {
                    text.push_str(chunk);
                    self.advance()?;
                }
                XmlEvent::End(_) => {
                    self.advance()?;
                    return Ok(text);
                }
                XmlEvent::Start(tag) => {
                    return Err(XmlError::Read(format!(
                        "Unexpected element <{}> inside text content",
                        tag.name
                    )));
                }
                XmlEvent::Eof | XmlEvent::StartDocument => return Err(Self::unexpected_eof()),
            }
        }
    }

    /// Captures the current element and its subtree, moving past its end tag.
    pub fn read_node(&mut self) -> XmlResult<XmlNode> {
        let tag = self.start()?.clone();
        let mut node = XmlNode::new(tag.name);
        node.attributes = tag.attributes;
        if !self.enter()? {
            return Ok(node);
        }
        loop {
            match &self.current {
                XmlEvent::Start(_) => {
                    let child = self.read_node()?;
                    node.children.push(XmlContent::Element(child));
                }
                XmlEvent::Text(text) => {
                    node.children.push(XmlContent::Text(text.clone()));
                    self.advance()?;
                }
                XmlEvent::End(_) => {
                    self.advance()?;
                    return Ok(node);
                }
                XmlEvent::Eof | XmlEvent::StartDocument => return Err(Self::unexpected_eof()),
            }
        }
    }

    /// Consumes the current element and its subtree.
    pub fn skip_element(&mut self) -> XmlResult<()> {
        let name = self.start()?.name.clone();
        debug!("Skipping element {}", name);
        self.read_node().map(|_| ())
    }

    pub(crate) fn unexpected_eof() -> XmlError {
        XmlError::Read("Unexpected end of file".to_string())
    }

    fn next_raw(&mut self) -> XmlResult<Raw> {
        loop {
            self.buffer.clear();
            let (namespace, event) = {
                let (resolved, event) = self
                    .inner
                    .read_resolved_event_into(&mut self.buffer)
                    .map_err(|e| XmlError::Read(format!("XML parsing error: {}", e)))?;
                (namespace_uri(&resolved), event)
            };

            match event {
                Event::Start(ref start) => {
                    let tag = Self::start_tag(&self.inner, namespace, start, false)?;
                    return Ok(Raw::Event(XmlEvent::Start(tag)));
                }
                Event::Empty(ref start) => {
                    let tag = Self::start_tag(&self.inner, namespace, start, true)?;
                    return Ok(Raw::Event(XmlEvent::Start(tag)));
                }
                Event::End(ref end) => {
                    let local = utf8(end.local_name().as_ref())?.to_string();
                    return Ok(Raw::Event(XmlEvent::End(XmlName { namespace, local })));
                }
                Event::Text(ref text) => {
                    let raw = utf8(text.as_ref())?;
                    let unescaped = unescape(raw)
                        .map_err(|e| XmlError::Read(format!("Invalid escape in text: {}", e)))?;
                    return Ok(Raw::Text(unescaped.into_owned()));
                }
                Event::CData(ref cdata) => {
                    return Ok(Raw::Text(utf8(cdata.as_ref())?.to_string()));
                }
                Event::GeneralRef(ref reference) => {
                    if let Some(ch) = reference
                        .resolve_char_ref()
                        .map_err(|e| XmlError::Read(format!("Invalid character reference: {}", e)))?
                    {
                        return Ok(Raw::Text(ch.to_string()));
                    }
                    let name = utf8(reference.as_ref())?;
                    return match resolve_predefined_entity(name) {
                        Some(value) => Ok(Raw::Text(value.to_string())),
                        None => Err(XmlError::Read(format!("Unknown entity &{};", name))),
                    };
                }
                Event::Eof => return Ok(Raw::Event(XmlEvent::Eof)),
                // declarations, comments, processing instructions and doctypes carry no data
                _ => continue,
            }
        }
    }

    fn start_tag(
        inner: &NsReader<Box<dyn BufRead + 'r>>,
        namespace: Option<String>,
        start: &BytesStart<'_>,
        empty: bool,
    ) -> XmlResult<StartTag> {
        let local = utf8(start.local_name().as_ref())?.to_string();
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute
                .map_err(|e| XmlError::Read(format!("Malformed attribute in <{}>: {}", local, e)))?;
            let key = attribute.key;
            if key.as_ref() == b"xmlns" || key.as_ref().starts_with(b"xmlns:") {
                continue;
            }
            let (resolved, attribute_local) = inner.resolve_attribute(key);
            let value = unescape(utf8(&attribute.value)?)
                .map_err(|e| XmlError::Read(format!("Invalid escape in attribute: {}", e)))?;
            attributes.push(XmlAttribute {
                name: XmlName {
                    namespace: namespace_uri(&resolved),
                    local: utf8(attribute_local.as_ref())?.to_string(),
                },
                value: value.into_owned(),
            });
        }
        Ok(StartTag {
            name: XmlName { namespace, local },
            attributes,
            empty,
        })
    }
}

fn namespace_uri(resolved: &ResolveResult<'_>) -> Option<String> {
    match resolved {
        ResolveResult::Bound(namespace) => {
            Some(String::from_utf8_lossy(namespace.as_ref()).into_owned())
        }
        ResolveResult::Unbound => None,
        ResolveResult::Unknown(prefix) => {
            debug!(
                "Unknown namespace prefix '{}'",
                String::from_utf8_lossy(prefix)
            );
            None
        }
    }
}

fn utf8(bytes: &[u8]) -> XmlResult<&str> {
    str::from_utf8(bytes).map_err(|e| XmlError::Read(format!("Invalid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_text_cdata_and_entities() {
        let mut reader = XmlReader::from_str("<a>x &amp; <![CDATA[<y>]]>&#33;</a>");
        reader.move_to_content().unwrap();

        assert_eq!(reader.read_element_text().unwrap(), "x & <y>!");
        assert_eq!(reader.event(), &XmlEvent::Eof);
    }

    #[test]
    fn empty_element_has_no_children() {
        let mut reader = XmlReader::from_str("<root><a/><b>1</b></root>");
        reader.move_to_content().unwrap();
        assert!(reader.enter().unwrap());

        assert!(reader.start().unwrap().empty);
        assert_eq!(reader.read_element_text().unwrap(), "");

        assert_eq!(reader.start().unwrap().name.local, "b");
        assert_eq!(reader.read_element_text().unwrap(), "1");
        assert!(matches!(reader.event(), XmlEvent::End(name) if name.local == "root"));
    }

    #[test]
    fn resolves_namespaces_of_elements_and_attributes() {
        let xml = r#"<f:farm xmlns:f="urn:farm" f:id="7" plain="x"><f:pig/></f:farm>"#;
        let mut reader = XmlReader::from_str(xml);
        reader.move_to_content().unwrap();

        let tag = reader.start().unwrap().clone();
        assert_eq!(tag.name, XmlName::qualified("urn:farm", "farm"));
        assert_eq!(tag.attributes.len(), 2);
        assert_eq!(tag.attribute_ns(Some("urn:farm"), "id"), Some("7"));
        assert_eq!(tag.attribute("plain"), Some("x"));

        assert!(reader.enter().unwrap());
        assert_eq!(
            reader.start().unwrap().name,
            XmlName::qualified("urn:farm", "pig")
        );
    }

    #[test]
    fn read_node_captures_subtree() {
        let mut reader = XmlReader::from_str(r#"<x a="1"><y>t</y>tail<z/></x><after/>"#);
        reader.move_to_content().unwrap();

        let node = reader.read_node().unwrap();
        assert_eq!(node.attribute("a"), Some("1"));
        assert_eq!(node.children.len(), 3);
        assert_eq!(node.text(), "tail");
        assert_eq!(reader.start().unwrap().name.local, "after");
    }

    #[test]
    fn whitespace_is_kept_only_as_whole_element_content() {
        let mut reader = XmlReader::from_str("<root>\n  <a>   </a>\n  <b> 1 </b>\n</root>");
        reader.move_to_content().unwrap();
        assert!(reader.enter().unwrap());

        assert_eq!(reader.start().unwrap().name.local, "a");
        assert_eq!(reader.read_element_text().unwrap(), "   ");
        assert_eq!(reader.read_element_text().unwrap(), " 1 ");
        assert!(matches!(reader.event(), XmlEvent::End(name) if name.local == "root"));
    }

    #[test]
    fn text_with_child_element_is_an_error() {
        let mut reader = XmlReader::from_str("<a>text<b/></a>");
        reader.move_to_content().unwrap();

        assert!(reader.read_element_text().is_err());
    }

    #[test]
    fn document_without_root_is_an_error() {
        let mut reader = XmlReader::from_str("<?xml version=\"1.0\"?>");

        assert!(reader.move_to_content().is_err());
    }

    #[test]
    fn malformed_document_is_an_error() {
        let mut reader = XmlReader::from_str("<a><b></a>");
        reader.move_to_content().unwrap();

        assert!(reader.read_node().is_err());
    }
}
