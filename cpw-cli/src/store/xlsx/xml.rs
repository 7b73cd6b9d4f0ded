//! Shallow XML element trees over raw package text
//!
//! An element is split into its start tag attributes and its direct
//! children, each child kept as the exact source text. Editing one child
//! and serializing again leaves every other byte of the part untouched.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::errors::SyntaxError;
use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;

pub type XmlResult<T> = Result<T, quick_xml::Error>;

/// Attribute list with values kept escaped, as they appear in the source
pub type Attrs = Vec<(String, String)>;

/// A direct child of a [`Tree`]: an element or any other markup/text
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Qualified element name; empty for text, comments and the like
    pub name: String,
    pub attrs: Attrs,
    pub raw: String,
}

impl Node {
    pub fn element(raw: String) -> XmlResult<Self> {
        let tree = Tree::parse(&raw)?;
        Ok(Self {
            name: tree.name,
            attrs: tree.attrs,
            raw,
        })
    }

    pub fn is_element(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn local(&self) -> &str {
        local_name(&self.name)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        find_attr(&self.attrs, key)
    }

    /// Unescaped attribute value
    pub fn value(&self, key: &str) -> Option<Cow<'_, str>> {
        self.attr(key).map(unescape_lossy)
    }

    pub fn tree(&self) -> XmlResult<Tree> {
        Tree::parse(&self.raw)
    }
}

/// One element with its direct children
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    /// Everything before the root element (declaration, comments)
    prolog: String,
    pub name: String,
    pub attrs: Attrs,
    pub children: Vec<Node>,
    /// End tag plus anything after it
    tail: String,
}

impl Tree {
    pub fn parse(xml: &str) -> XmlResult<Self> {
        let mut reader = Reader::from_str(xml);

        let (prolog, name, attrs, empty) = loop {
            let start = reader.buffer_position() as usize;
            match reader.read_event()? {
                Event::Start(e) => break (&xml[..start], qname(&e), attrs_of(&e)?, false),
                Event::Empty(e) => break (&xml[..start], qname(&e), attrs_of(&e)?, true),
                Event::Eof => return Err(unclosed()),
                _ => {}
            }
        };

        if empty {
            let end = reader.buffer_position() as usize;
            return Ok(Self {
                prolog: prolog.to_string(),
                tail: format!("</{}>{}", name, &xml[end..]),
                name,
                attrs,
                children: Vec::new(),
            });
        }

        let mut children = Vec::new();
        let tail = loop {
            let start = reader.buffer_position() as usize;
            match reader.read_event()? {
                Event::Start(e) => {
                    let (name, attrs) = (qname(&e), attrs_of(&e)?);
                    reader.read_to_end(QName(name.as_bytes()))?;
                    let end = reader.buffer_position() as usize;
                    children.push(Node {
                        name,
                        attrs,
                        raw: xml[start..end].to_string(),
                    });
                }
                Event::Empty(e) => {
                    let end = reader.buffer_position() as usize;
                    children.push(Node {
                        name: qname(&e),
                        attrs: attrs_of(&e)?,
                        raw: xml[start..end].to_string(),
                    });
                }
                Event::End(_) => break &xml[start..],
                Event::Eof => return Err(unclosed()),
                _ => {
                    let end = reader.buffer_position() as usize;
                    children.push(Node {
                        name: String::new(),
                        attrs: Vec::new(),
                        raw: xml[start..end].to_string(),
                    });
                }
            }
        };

        Ok(Self {
            prolog: prolog.to_string(),
            name,
            attrs,
            children,
            tail: tail.to_string(),
        })
    }

    pub fn local(&self) -> &str {
        local_name(&self.name)
    }

    /// `x:` for a root named `x:worksheet`, empty otherwise
    pub fn prefix(&self) -> &str {
        match self.name.find(':') {
            Some(i) => &self.name[..=i],
            None => "",
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        find_attr(&self.attrs, key)
    }

    /// Set an attribute to an already escaped value
    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        set_attr(&mut self.attrs, key, value);
    }

    pub fn remove_attr(&mut self, key: &str) {
        self.attrs.retain(|(k, _)| k != key);
    }

    pub fn child(&self, local: &str) -> Option<&Node> {
        self.children.iter().find(|n| n.local() == local)
    }

    pub fn position(&self, local: &str) -> Option<usize> {
        self.children.iter().position(|n| n.local() == local)
    }

    pub fn elements<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |n| n.local() == local)
    }

    /// Unescaped text content of a leaf element
    pub fn text(&self) -> String {
        let raw: String = self
            .children
            .iter()
            .filter(|n| !n.is_element())
            .map(|n| n.raw.as_str())
            .collect();
        match raw
            .strip_prefix("<![CDATA[")
            .and_then(|r| r.strip_suffix("]]>"))
        {
            Some(cdata) => cdata.to_string(),
            None => unescape_lossy(&raw).into_owned(),
        }
    }

    pub fn to_xml(&self) -> String {
        let body: usize = self.children.iter().map(|c| c.raw.len()).sum();
        let mut out = String::with_capacity(self.prolog.len() + body + self.tail.len() + 64);
        out.push_str(&self.prolog);
        out.push_str(&start_tag(&self.name, &self.attrs, false));
        for child in &self.children {
            out.push_str(&child.raw);
        }
        out.push_str(&self.tail);
        out
    }

    /// Re-serialize as a child node of another tree
    pub fn into_node(self) -> Node {
        let raw = self.to_xml();
        Node {
            name: self.name,
            attrs: self.attrs,
            raw,
        }
    }
}

fn unclosed() -> quick_xml::Error {
    quick_xml::Error::Syntax(SyntaxError::UnclosedTag)
}

fn qname(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn attrs_of(e: &BytesStart<'_>) -> XmlResult<Attrs> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        attrs.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            String::from_utf8_lossy(&attr.value).into_owned(),
        ));
    }
    Ok(attrs)
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Exact key first, then by local name (`r:id` matches `id`)
fn find_attr<'a>(attrs: &'a Attrs, key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .or_else(|| {
            (!key.contains(':'))
                .then(|| attrs.iter().find(|(k, _)| k.contains(':') && local_name(k) == key))
                .flatten()
        })
        .map(|(_, v)| v.as_str())
}

pub fn set_attr(attrs: &mut Attrs, key: &str, value: impl Into<String>) {
    let value = value.into();
    match attrs.iter_mut().find(|(k, _)| k == key) {
        Some(slot) => slot.1 = value,
        None => attrs.push((key.to_string(), value)),
    }
}

/// `<name a="1">`, or `<name a="1"/>` when `empty`
pub fn start_tag(name: &str, attrs: &Attrs, empty: bool) -> String {
    let mut out = format!("<{}", name);
    for (key, value) in attrs {
        let quote = if value.contains('"') { '\'' } else { '"' };
        out.push_str(&format!(" {}={}{}{}", key, quote, value, quote));
    }
    out.push_str(if empty { "/>" } else { ">" });
    out
}

pub fn escape_text(text: &str) -> Cow<'_, str> {
    escape(text)
}

pub fn unescape_lossy(raw: &str) -> Cow<'_, str> {
    match unescape(raw) {
        Ok(text) => text,
        Err(e) => {
            log::debug!("Keeping undecodable XML text as is: {}", e);
            Cow::Borrowed(raw)
        }
    }
}

/// True for `1` and `true`, the two spellings of `xsd:boolean` true
pub fn is_true(value: Option<&str>) -> bool {
    matches!(value, Some("1") | Some("true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><dimension ref="A1:B2"/><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c></row></sheetData><mergeCells count="1"><mergeCell ref="A1:B1"/></mergeCells></worksheet>"#;

    #[test]
    fn test_untouched_tree_serializes_byte_for_byte() {
        let tree = Tree::parse(SHEET).unwrap();
        assert_eq!(tree.local(), "worksheet");
        let names: Vec<_> = tree.children.iter().map(|c| c.local()).collect();
        assert_eq!(names, vec!["dimension", "sheetData", "mergeCells"]);
        assert_eq!(tree.to_xml(), SHEET);
    }

    #[test]
    fn test_child_edit_keeps_siblings() {
        let mut tree = Tree::parse(SHEET).unwrap();
        let at = tree.position("dimension").unwrap();
        tree.children[at] = Node::element(r#"<dimension ref="A1:C9"/>"#.to_string()).unwrap();

        let xml = tree.to_xml();
        assert!(xml.contains(r#"<dimension ref="A1:C9"/>"#));
        assert!(xml.contains(r#"<mergeCell ref="A1:B1"/>"#));
        assert!(xml.starts_with("<?xml"));
    }

    #[test]
    fn test_attributes_by_local_name() {
        let tree = Tree::parse(r#"<sheet name="R&amp;D" sheetId="2" r:id="rId7"/>"#).unwrap();
        let node = tree.clone().into_node();
        assert_eq!(tree.attr("id"), Some("rId7"));
        assert_eq!(tree.attr("sheetId"), Some("2"));
        assert_eq!(node.value("name").as_deref(), Some("R&D"));
        assert_eq!(tree.to_xml(), r#"<sheet name="R&amp;D" sheetId="2" r:id="rId7"></sheet>"#);
    }

    #[test]
    fn test_text_joins_entity_references() {
        let tree = Tree::parse("<f>IF(A1&gt;0,&quot;x&quot;,B1)</f>").unwrap();
        assert_eq!(tree.text(), r#"IF(A1>0,"x",B1)"#);
    }

    #[test]
    fn test_prefixed_root() {
        let xml = r#"<x:worksheet xmlns:x="urn:x"><x:sheetData/></x:worksheet>"#;
        let tree = Tree::parse(xml).unwrap();
        assert_eq!(tree.prefix(), "x:");
        assert!(tree.child("sheetData").is_some());
    }
}
