//! Typed XML document tree and serializer.
//!
//! The ALTO and METS generators build documents out of [`XmlElement`] values
//! instead of string templating, so element structure, attribute order, and
//! namespace declarations are explicit data. Serialization is deterministic:
//! attributes and children render in insertion order, which is what makes
//! re-running the pipeline against identical inputs reproduce byte-identical
//! XML.
//!
//! Namespace declarations are ordered configuration ([`Namespace`] slices)
//! applied to the root element, not literals scattered across builder calls.

use quick_xml::escape::escape;

/// An XML namespace binding declared on a root element.
#[derive(Debug, Clone, Copy)]
pub struct Namespace {
    pub prefix: &'static str,
    pub uri: &'static str,
}

/// A node in the document tree: either a child element or a text run.
#[derive(Debug, Clone)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An XML element with ordered attributes and children.
#[derive(Debug, Clone)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Append an attribute. Attributes render in insertion order.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Declare namespace bindings as `xmlns:prefix` attributes, in order.
    pub fn namespaces(mut self, bindings: &[Namespace]) -> Self {
        for ns in bindings {
            self.attributes
                .push((format!("xmlns:{}", ns.prefix), ns.uri.to_string()));
        }
        self
    }

    /// Append a child element.
    pub fn child(mut self, element: XmlElement) -> Self {
        self.children.push(XmlNode::Element(element));
        self
    }

    /// Append every element from an iterator as a child.
    pub fn children(mut self, elements: impl IntoIterator<Item = XmlElement>) -> Self {
        self.children
            .extend(elements.into_iter().map(XmlNode::Element));
        self
    }

    /// Append a text node.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// Serialize as a standalone document with an XML declaration.
    pub fn to_document(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        self.render(&mut out);
        out.push('\n');
        out
    }

    fn render(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (name, value) in &self.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for node in &self.children {
            match node {
                XmlNode::Element(element) => element.render(out),
                XmlNode::Text(text) => out.push_str(&escape(text.as_str())),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}
