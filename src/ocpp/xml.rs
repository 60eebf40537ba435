//! Minimal namespace-aware XML element tree.
//!
//! Parsing resolves every element to `{namespace}local`; serialization declares all used
//! namespaces on the root element with caller-preferred prefixes, so the output is
//! deterministic for a given tree.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use std::fmt::{self, Write as _};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XmlError {
    #[error("malformed xml: {0}")]
    Syntax(String),
    #[error("undeclared namespace prefix `{0}`")]
    UnknownPrefix(String),
    #[error("unbalanced end tag")]
    Unbalanced,
    #[error("element `{0}` is never closed")]
    Unclosed(String),
    #[error("document has no root element")]
    NoRoot,
    #[error("document has more than one root element")]
    MultipleRoots,
}

impl From<quick_xml::Error> for XmlError {
    fn from(err: quick_xml::Error) -> Self {
        XmlError::Syntax(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(namespace: &str, local: &str) -> Self {
        Self {
            namespace: Some(namespace.to_owned()),
            local: local.to_owned(),
        }
    }

    pub fn unqualified(local: &str) -> Self {
        Self {
            namespace: None,
            local: local.to_owned(),
        }
    }

    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.local == local && self.namespace.as_deref() == Some(namespace)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local),
            None => f.write_str(&self.local),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: QName,
    /// Unqualified attributes; namespace declarations are not kept.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    text: String,
}

impl XmlElement {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
            text: String::new(),
        }
    }

    pub fn qualified(namespace: &str, local: &str) -> Self {
        Self::new(QName::new(namespace, local))
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.push((key.to_owned(), value.to_owned()));
        self
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    /// Trimmed character content.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.name.is(namespace, local)
    }

    pub fn child(&self, namespace: &str, local: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.is(namespace, local))
    }

    /// First direct child with the given local name, in any namespace.
    pub fn child_local(&self, local: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name.local == local)
    }

    pub fn children_local<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name.local == local)
    }

    /// Depth-first search below (and including) this element.
    pub fn descendant(&self, namespace: &str, local: &str) -> Option<&XmlElement> {
        if self.is(namespace, local) {
            return Some(self);
        }
        self.children
            .iter()
            .find_map(|c| c.descendant(namespace, local))
    }

    pub fn parse(input: &str) -> Result<XmlElement, XmlError> {
        let mut reader = NsReader::from_str(input);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let (resolved, event) = reader.read_resolved_event()?;
            match event {
                Event::Start(start) => {
                    let element = open_element(resolved, &start)?;
                    stack.push(element);
                }
                Event::Empty(start) => {
                    let element = open_element(resolved, &start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or(XmlError::Unbalanced)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.pop() {
            return Err(XmlError::Unclosed(open.name.to_string()));
        }
        root.ok_or(XmlError::NoRoot)
    }

    /// Serializes the tree. `prefixes` maps namespace URIs to preferred prefixes; other
    /// namespaces get `ns0`, `ns1`, ... in order of first appearance.
    pub fn to_xml_string(&self, prefixes: &[(&str, &str)]) -> String {
        let mut namespaces: Vec<String> = Vec::new();
        self.collect_namespaces(&mut namespaces);

        let mut bindings: Vec<(String, String)> = Vec::with_capacity(namespaces.len());
        let mut generated = 0usize;
        for ns in namespaces {
            let prefix = match prefixes.iter().find(|(uri, _)| *uri == ns) {
                Some((_, prefix)) => (*prefix).to_owned(),
                None => loop {
                    let candidate = format!("ns{generated}");
                    generated += 1;
                    if !prefixes.iter().any(|(_, p)| *p == candidate) {
                        break candidate;
                    }
                },
            };
            bindings.push((ns, prefix));
        }

        let mut out = String::new();
        self.write(&mut out, &bindings, true);
        out
    }

    fn collect_namespaces(&self, seen: &mut Vec<String>) {
        if let Some(ns) = &self.name.namespace {
            if !seen.iter().any(|s| s == ns) {
                seen.push(ns.clone());
            }
        }
        for child in &self.children {
            child.collect_namespaces(seen);
        }
    }

    fn write(&self, out: &mut String, bindings: &[(String, String)], root: bool) {
        let tag = match &self.name.namespace {
            Some(ns) => match bindings.iter().find(|(uri, _)| uri == ns) {
                Some((_, prefix)) => format!("{}:{}", prefix, self.name.local),
                None => self.name.local.clone(),
            },
            None => self.name.local.clone(),
        };

        out.push('<');
        out.push_str(&tag);
        if root {
            for (uri, prefix) in bindings {
                let _ = write!(out, " xmlns:{}=\"{}\"", prefix, escape(uri.as_str()));
            }
        }
        for (key, value) in &self.attributes {
            let _ = write!(out, " {}=\"{}\"", key, escape(value.as_str()));
        }

        if self.children.is_empty() && self.text.is_empty() {
            out.push_str("/>");
            return;
        }

        out.push('>');
        out.push_str(&escape(self.text.as_str()));
        for child in &self.children {
            child.write(out, bindings, false);
        }
        out.push_str("</");
        out.push_str(&tag);
        out.push('>');
    }
}

impl fmt::Display for XmlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml_string(&[]))
    }
}

fn open_element(resolved: ResolveResult<'_>, start: &BytesStart<'_>) -> Result<XmlElement, XmlError> {
    let namespace = match resolved {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.0).into_owned()),
        ResolveResult::Unbound => None,
        ResolveResult::Unknown(prefix) => {
            return Err(XmlError::UnknownPrefix(
                String::from_utf8_lossy(&prefix).into_owned(),
            ))
        }
    };
    let local = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

    let mut element = XmlElement::new(QName { namespace, local });
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| XmlError::Syntax(e.to_string()))?;
        let key = attribute.key;
        if key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let name = String::from_utf8_lossy(key.local_name().as_ref()).into_owned();
        let value = attribute.unescape_value()?.into_owned();
        element.attributes.push((name, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(XmlError::MultipleRoots),
    }
}
