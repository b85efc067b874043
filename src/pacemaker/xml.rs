//! XML Fragment Builder
//!
//! Immutable builder for the configuration fragments submitted to the
//! cluster manager. Fragments are constructed whole and rendered once; the
//! agent never edits a parsed document in place.

use std::fmt;

/// An XML element with attributes and child elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add an attribute
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Append a child element
    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Append several child elements
    pub fn children<I: IntoIterator<Item = Element>>(mut self, children: I) -> Self {
        self.children.extend(children);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn child_elements(&self) -> &[Element] {
        &self.children
    }

    /// Depth-first search for the first descendant (or self) with this name
    pub fn find(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    /// Render as a compact XML string
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// An identity-only copy (`<name id="..."/>`) used to address deletions
    pub fn reference(&self) -> Element {
        let mut el = Element::new(self.name.clone());
        if let Some(id) = self.attribute("id") {
            el = el.attr("id", id);
        }
        el
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        for (k, v) in &self.attributes {
            write!(f, " {}=\"{}\"", k, escape(v))?;
        }
        if self.children.is_empty() {
            return write!(f, "/>");
        }
        write!(f, ">")?;
        for child in &self.children {
            write!(f, "{}", child)?;
        }
        write!(f, "</{}>", self.name)
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// `<nvpair>` entry for an attribute set
pub fn nvpair(set_id: &str, name: &str, value: &str) -> Element {
    Element::new("nvpair")
        .attr("id", format!("{}-{}", set_id, name))
        .attr("name", name)
        .attr("value", value)
}

/// Attribute set (`instance_attributes` / `meta_attributes`) of a resource
pub fn attribute_set(kind: &str, owner_id: &str, pairs: &[(&str, &str)]) -> Element {
    let set_id = format!("{}-{}", owner_id, kind);
    let nvpairs: Vec<Element> = pairs
        .iter()
        .map(|(name, value)| nvpair(&set_id, name, value))
        .collect();
    Element::new(kind).attr("id", set_id.clone()).children(nvpairs)
}
