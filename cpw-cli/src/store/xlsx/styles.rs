//! Cell format (`cellXfs`) lookups and derived variants
//!
//! Locking a column span on save needs locked and unlocked variants of
//! whatever formats the cells already use. Variants are appended to
//! `cellXfs` once and reused; existing indices never move.

use std::collections::HashMap;

use super::xml::{Node, Tree, XmlResult};

const UNLOCKED: &str = r#"<protection locked="0"/>"#;
/// Built-in `m/d/yy h:mm`
pub const DATE_TIME_FORMAT: u32 = 22;

#[derive(Debug)]
pub struct StyleBook {
    styles: Option<Tree>,
    xfs: Vec<Tree>,
    /// Serialized xf to index, for reuse of identical variants
    known: HashMap<String, u32>,
    locking: HashMap<(u32, bool), u32>,
    original: usize,
}

impl StyleBook {
    pub fn parse(xml: Option<&str>) -> XmlResult<Self> {
        let mut book = Self {
            styles: None,
            xfs: Vec::new(),
            known: HashMap::new(),
            locking: HashMap::new(),
            original: 0,
        };
        let Some(xml) = xml else {
            return Ok(book);
        };

        let styles = Tree::parse(xml)?;
        if let Some(node) = styles.child("cellXfs") {
            for xf in node.tree()?.elements("xf") {
                let xf = xf.tree()?;
                book.known.entry(xf.to_xml()).or_insert(book.xfs.len() as u32);
                book.xfs.push(xf);
            }
            book.styles = Some(styles);
        }
        book.original = book.xfs.len();
        Ok(book)
    }

    pub fn is_modified(&self) -> bool {
        self.xfs.len() > self.original
    }

    pub fn number_format(&self, style: u32) -> u32 {
        self.xfs
            .get(style as usize)
            .and_then(|xf| xf.attr("numFmtId"))
            .and_then(|id| id.parse().ok())
            .unwrap_or(0)
    }

    pub fn is_locked(&self, style: u32) -> bool {
        let Some(xf) = self.xfs.get(style as usize) else {
            return true;
        };
        match xf.child("protection").map(|p| p.attr("locked")) {
            Some(Some(value)) => !matches!(value, "0" | "false"),
            _ => true,
        }
    }

    /// Index of `style` with its locked flag set to `locked`
    pub fn with_locking(&mut self, style: u32, locked: bool) -> XmlResult<u32> {
        if self.is_locked(style) == locked {
            return Ok(style);
        }
        if let Some(&variant) = self.locking.get(&(style, locked)) {
            return Ok(variant);
        }
        let Some(mut xf) = self.xfs.get(style as usize).cloned() else {
            return Ok(style);
        };

        match xf.position("protection") {
            Some(at) => {
                let mut protection = xf.children[at].tree()?;
                if locked {
                    protection.remove_attr("locked");
                } else {
                    protection.set_attr("locked", "0");
                }
                if protection.attrs.is_empty() {
                    xf.children.remove(at);
                } else {
                    xf.children[at] = Node::element(empty_element(&protection))?;
                }
            }
            None => {
                let at = xf.position("extLst").unwrap_or(xf.children.len());
                xf.children.insert(at, Node::element(UNLOCKED.to_string())?);
            }
        }
        xf.set_attr("applyProtection", "1");
        let variant = self.intern(xf);
        self.locking.insert((style, locked), variant);
        Ok(variant)
    }

    /// Index of `style` showing its number as `format`
    pub fn with_number_format(&mut self, style: u32, format: u32) -> u32 {
        if self.number_format(style) == format {
            return style;
        }
        let Some(mut xf) = self.xfs.get(style as usize).cloned() else {
            return style;
        };
        xf.set_attr("numFmtId", format.to_string());
        xf.set_attr("applyNumberFormat", "1");
        self.intern(xf)
    }

    fn intern(&mut self, xf: Tree) -> u32 {
        let key = xf.to_xml();
        if let Some(&index) = self.known.get(&key) {
            return index;
        }
        let index = self.xfs.len() as u32;
        self.known.insert(key, index);
        self.xfs.push(xf);
        index
    }

    /// Serialized styles part with the appended variants, if any were made
    pub fn to_xml(&self) -> XmlResult<Option<String>> {
        let Some(styles) = &self.styles else {
            return Ok(None);
        };
        if !self.is_modified() {
            return Ok(None);
        }

        let mut styles = styles.clone();
        let Some(at) = styles.position("cellXfs") else {
            return Ok(None);
        };
        let mut cell_xfs = styles.children[at].tree()?;
        for xf in &self.xfs[self.original..] {
            cell_xfs.children.push(Node::element(xf.to_xml())?);
        }
        cell_xfs.set_attr("count", self.xfs.len().to_string());
        styles.children[at] = cell_xfs.into_node();
        Ok(Some(styles.to_xml()))
    }
}

fn empty_element(tree: &Tree) -> String {
    super::xml::start_tag(&tree.name, &tree.attrs, true)
}
