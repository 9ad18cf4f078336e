//! Output xml tree: just enough of a writer for the registry dialect.
//!
//! Elements whose children include text are written inline so mixed
//! content like `<member>const <type>T</type>* <name>p</name></member>`
//! keeps its exact spacing. Element-only content is indented.

use std::fmt::Write;

/// A child of an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Element(Element),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Content>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder form of [`set_attr`](Self::set_attr).
    pub fn attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder form of [`push_text`](Self::push_text).
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.push_text(text);
        self
    }

    /// Builder form of [`push`](Self::push).
    pub fn child(mut self, element: Element) -> Self {
        self.push(element);
        self
    }

    /// Set `key`, replacing any earlier value.
    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    pub fn push(&mut self, element: Element) {
        self.children.push(Content::Element(element));
    }

    /// Append text, merging with a preceding text run. Empty text is dropped.
    pub fn push_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        if let Some(Content::Text(last)) = self.children.last_mut() {
            last.push_str(&text);
        } else {
            self.children.push(Content::Text(text));
        }
    }

    /// Shorthand for `<name>text</name>`.
    pub fn push_text_element(&mut self, name: &str, text: &str) {
        self.push(Element::new(name).text(text));
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Serialize as a standalone document with an xml declaration.
    pub fn to_document(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n");
        self.write_to(&mut out, 0);
        out.push('\n');
        out
    }

    fn write_to(&self, out: &mut String, depth: usize) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            let _ = write!(out, " {key}=\"{}\"", escape(value, true));
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');

        let mixed = self.children.iter().any(|c| matches!(c, Content::Text(_)));
        for child in &self.children {
            match child {
                Content::Text(text) => out.push_str(&escape(text, false)),
                Content::Element(element) if mixed => element.write_to(out, depth + 1),
                Content::Element(element) => {
                    out.push('\n');
                    indent(out, depth + 1);
                    element.write_to(out, depth + 1);
                }
            }
        }
        if !mixed {
            out.push('\n');
            indent(out, depth);
        }
        let _ = write!(out, "</{}>", self.name);
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("    ");
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}
