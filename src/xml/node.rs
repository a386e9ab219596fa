use std::fmt;

/// A namespace-qualified XML name.
///
/// Names compare by namespace URI and local name; the prefix used on the wire
/// is not part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct XmlName {
    pub namespace: Option<String>,
    pub local: String,
}

impl XmlName {
    /// Creates a name without namespace.
    pub fn local<S: Into<String>>(local: S) -> Self {
        Self {
            namespace: None,
            local: local.into(),
        }
    }

    /// Creates a name bound to the given namespace URI.
    pub fn qualified<N: Into<String>, S: Into<String>>(namespace: N, local: S) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local: local.into(),
        }
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn matches(&self, namespace: Option<&str>, local: &str) -> bool {
        self.namespace.as_deref() == namespace && self.local == local
    }

    /// Whether `local` can stand as an unprefixed element or attribute name.
    pub fn is_valid_local(local: &str) -> bool {
        let mut chars = local.chars();
        match chars.next() {
            Some(first) if first.is_alphabetic() || first == '_' => chars
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.')),
            _ => false,
        }
    }
}

impl fmt::Display for XmlName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local),
            None => f.write_str(&self.local),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub name: XmlName,
    pub value: String,
}

/// The start tag the reader is positioned on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    pub name: XmlName,
    pub attributes: Vec<XmlAttribute>,
    /// `true` for `<tag/>`.
    pub empty: bool,
}

impl StartTag {
    /// Looks up an attribute without namespace.
    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attribute_ns(None, local)
    }

    pub fn attribute_ns(&self, namespace: Option<&str>, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name.matches(namespace, local))
            .map(|attr| attr.value.as_str())
    }
}

/// Content of an [`XmlNode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlContent {
    Element(XmlNode),
    Text(String),
}

/// An owned XML element subtree.
///
/// Used for raw passthrough members and to hand unrecognized markup to
/// [`UnhandledMarkup`](crate::core::capability::UnhandledMarkup) collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlNode {
    pub name: XmlName,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlContent>,
}

impl Default for XmlName {
    fn default() -> Self {
        XmlName::local("")
    }
}

impl XmlNode {
    pub fn new(name: XmlName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name.matches(None, local))
            .map(|attr| attr.value.as_str())
    }

    /// Concatenated text of the direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                XmlContent::Text(text) => Some(text.as_str()),
                XmlContent::Element(_) => None,
            })
            .collect()
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter().filter_map(|child| match child {
            XmlContent::Element(node) => Some(node),
            XmlContent::Text(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_compare_by_namespace_and_local_part() {
        assert_eq!(XmlName::local("a"), XmlName::local("a"));
        assert_ne!(XmlName::local("a"), XmlName::qualified("urn:x", "a"));
        assert_eq!(XmlName::qualified("urn:x", "a").to_string(), "{urn:x}a");
    }

    #[test]
    fn node_text_skips_child_elements() {
        let mut node = XmlNode::new(XmlName::local("p"));
        node.children.push(XmlContent::Text("a".to_string()));
        node.children
            .push(XmlContent::Element(XmlNode::new(XmlName::local("b"))));
        node.children.push(XmlContent::Text("c".to_string()));

        assert_eq!(node.text(), "ac");
        assert_eq!(node.elements().count(), 1);
    }

    #[test]
    fn local_names_must_start_with_a_letter() {
        assert!(XmlName::is_valid_local("hay"));
        assert!(XmlName::is_valid_local("_x-1.b"));
        assert!(!XmlName::is_valid_local("1"));
        assert!(!XmlName::is_valid_local("a b"));
        assert!(!XmlName::is_valid_local("p:x"));
        assert!(!XmlName::is_valid_local(""));
    }
}
