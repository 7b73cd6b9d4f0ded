//! Worksheet part patching
//!
//! Only the elements backed by the document model are regenerated:
//! `dimension`, `cols`, `sheetData` and `sheetProtection`. Cells whose value
//! and formula did not change keep their source XML (shared strings, rich
//! text and styles included). Merged ranges, validations, conditional
//! formats, drawings and everything else pass through as-is.

use std::collections::{BTreeMap, BTreeSet};

use crate::store::document::{Cell, MAX_COLS, Protection, Sheet};
use crate::store::protection::ProtectionKey;
use crate::store::{CellRef, CellValue};

use super::styles::{DATE_TIME_FORMAT, StyleBook};
use super::xml::{Attrs, Node, Tree, XmlResult, escape_text, is_true, set_attr, start_tag};

const DEFAULT_COL_WIDTH: &str = "9.140625";

/// Column definitions of a `<cols>` element as `(min, max, attributes)`
#[derive(Debug, Default, Clone)]
pub struct ColumnDefs {
    runs: Vec<(u32, u32, Attrs)>,
}

impl ColumnDefs {
    pub fn parse(cols: &Node) -> XmlResult<Self> {
        let mut runs = Vec::new();
        for col in cols.tree()?.elements("col") {
            let bound = |key: &str| col.attr(key).and_then(|v| v.parse::<u32>().ok());
            let (Some(min), Some(max)) = (bound("min"), bound("max")) else {
                continue;
            };
            let attrs = col
                .attrs
                .iter()
                .filter(|(k, _)| k != "min" && k != "max")
                .cloned()
                .collect();
            runs.push((min, max.min(MAX_COLS), attrs));
        }
        Ok(Self { runs })
    }

    fn attrs_of(&self, col: u32) -> Option<&Attrs> {
        self.runs
            .iter()
            .find(|(min, max, _)| col >= *min && col <= *max)
            .map(|(_, _, attrs)| attrs)
    }

    pub fn style_of(&self, col: u32) -> Option<u32> {
        self.attrs_of(col).and_then(|a| attr_u32(a, "style"))
    }

    pub fn hidden(&self) -> BTreeSet<u32> {
        self.runs
            .iter()
            .filter(|(_, _, attrs)| is_true(find(attrs, "hidden")))
            .flat_map(|(min, max, _)| *min..=*max)
            .collect()
    }

    fn last(&self) -> u32 {
        self.runs.iter().map(|(_, max, _)| *max).max().unwrap_or(0)
    }

    /// `<cols>` reflecting the sheet's hidden set and lock mask, `None` when
    /// no column needs a definition
    fn render(
        &self,
        sheet: &Sheet,
        styles: &mut StyleBook,
        default_width: &str,
        prefix: &str,
    ) -> XmlResult<Option<String>> {
        let hidden_last = sheet.hidden_columns.iter().next_back().copied().unwrap_or(0);
        let limit = match sheet.locked_columns {
            Some(_) => MAX_COLS,
            None => self.last().max(hidden_last),
        };

        let mut resolved: Vec<(u32, Option<Attrs>)> = Vec::with_capacity(limit as usize);
        for col in 1..=limit {
            let mut attrs = self.attrs_of(col).cloned();
            let blank = || vec![("width".to_string(), default_width.to_string())];

            if sheet.hidden_columns.contains(&col) {
                set_attr(attrs.get_or_insert_with(blank), "hidden", "1");
            } else if let Some(attrs) = attrs.as_mut() {
                attrs.retain(|(k, _)| k != "hidden");
            }

            if sheet.locked_columns.is_some() {
                let style = attrs.as_ref().and_then(|a| attr_u32(a, "style")).unwrap_or(0);
                let variant = styles.with_locking(style, sheet.is_locked(col))?;
                if variant != style {
                    set_attr(attrs.get_or_insert_with(blank), "style", variant.to_string());
                }
            }
            resolved.push((col, attrs));
        }

        let mut out = String::new();
        let mut i = 0;
        while i < resolved.len() {
            let mut j = i;
            while j + 1 < resolved.len() && resolved[j + 1].1 == resolved[i].1 {
                j += 1;
            }
            if let Some(attrs) = &resolved[i].1 {
                let mut all = vec![
                    ("min".to_string(), resolved[i].0.to_string()),
                    ("max".to_string(), resolved[j].0.to_string()),
                ];
                all.extend(attrs.iter().cloned());
                out.push_str(&start_tag(&format!("{}col", prefix), &all, true));
            }
            i = j + 1;
        }

        if out.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!("<{p}cols>{}</{p}cols>", out, p = prefix)))
    }
}

/// Rewrite worksheet XML so it matches `sheet`. `baseline` is the state the
/// XML was loaded as; cells equal to it keep their source markup.
pub fn patch_sheet(
    xml: &str,
    sheet: &Sheet,
    baseline: &Sheet,
    styles: &mut StyleBook,
) -> XmlResult<String> {
    let mut tree = Tree::parse(xml)?;
    let prefix = tree.prefix().to_string();
    let masked = sheet.locked_columns.is_some();

    let columns = match tree.child("cols") {
        Some(node) => ColumnDefs::parse(node)?,
        None => ColumnDefs::default(),
    };
    let default_width = tree
        .child("sheetFormatPr")
        .and_then(|n| n.attr("defaultColWidth"))
        .unwrap_or(DEFAULT_COL_WIDTH)
        .to_string();

    if masked || sheet.hidden_columns != baseline.hidden_columns {
        let rendered = columns.render(sheet, styles, &default_width, &prefix)?;
        match (tree.position("cols"), rendered) {
            (Some(at), Some(cols)) => tree.children[at] = Node::element(cols)?,
            (Some(at), None) => {
                tree.children.remove(at);
            }
            (None, Some(cols)) => {
                let at = tree.position("sheetData").unwrap_or(tree.children.len());
                tree.children.insert(at, Node::element(cols)?);
            }
            (None, None) => {}
        }
    }

    if masked || !sheet.cells().eq(baseline.cells()) {
        let at = match tree.position("sheetData") {
            Some(at) => at,
            None => {
                let preceding = ["sheetPr", "dimension", "sheetViews", "sheetFormatPr", "cols"];
                let at = after(&tree, &preceding);
                let data = Node::element(format!("<{}sheetData/>", prefix))?;
                tree.children.insert(at, data);
                at
            }
        };
        let data = tree.children[at].tree()?;
        let raw = render_data(&data, sheet, baseline, &columns, styles)?;
        tree.children[at] = Node {
            name: data.name,
            attrs: data.attrs,
            raw,
        };

        if let Some(at) = tree.position("dimension") {
            let dimension = format!(r#"<{}dimension ref="{}"/>"#, prefix, dimension_ref(sheet));
            tree.children[at] = Node::element(dimension)?;
        }
    }

    if sheet.protection != baseline.protection {
        let rendered = sheet.protection.as_ref().map(|p| protection_xml(p, &prefix));
        match (tree.position("sheetProtection"), rendered) {
            (Some(at), Some(protection)) => tree.children[at] = Node::element(protection)?,
            (Some(at), None) => {
                tree.children.remove(at);
            }
            (None, Some(protection)) => {
                let at = after(&tree, &["sheetData", "sheetCalcPr"]);
                tree.children.insert(at, Node::element(protection)?);
            }
            (None, None) => {}
        }
    }

    Ok(tree.to_xml())
}

/// Index just past the last child named in `preceding`, 0 when none exist
fn after(tree: &Tree, preceding: &[&str]) -> usize {
    tree.children
        .iter()
        .rposition(|n| preceding.contains(&n.local()))
        .map(|i| i + 1)
        .unwrap_or(0)
}

fn dimension_ref(sheet: &Sheet) -> String {
    match sheet.extent() {
        (0, _) | (_, 0) => "A1".to_string(),
        (1, 1) => "A1".to_string(),
        (rows, cols) => format!("A1:{}", CellRef::new(rows, cols)),
    }
}

struct SourceCell {
    node: Node,
    style: Option<u32>,
    /// Part of a shared formula group, so it cannot be kept on its own
    shared: bool,
}

#[derive(Default)]
struct RowOut {
    attrs: Attrs,
    /// `s` of a row with `customFormat`: the format of its blank cells
    style: Option<u32>,
    source: BTreeMap<u32, SourceCell>,
    cells: Vec<String>,
    existed: bool,
}

fn render_data(
    data: &Tree,
    sheet: &Sheet,
    baseline: &Sheet,
    columns: &ColumnDefs,
    styles: &mut StyleBook,
) -> XmlResult<String> {
    let prefix = data.prefix().to_string();
    let mut rows: BTreeMap<u32, RowOut> = BTreeMap::new();

    let mut next_row = 1;
    for node in data.elements("row") {
        let row = node.tree()?;
        let r = row.attr("r").and_then(|v| v.parse().ok()).unwrap_or(next_row);
        next_row = r + 1;

        let mut attrs: Attrs = row
            .attrs
            .iter()
            .filter(|(k, _)| k != "spans")
            .cloned()
            .collect();
        set_attr(&mut attrs, "r", r.to_string());
        let style = is_true(row.attr("customFormat"))
            .then(|| row.attr("s").and_then(|s| s.parse().ok()))
            .flatten();

        let mut source = BTreeMap::new();
        let mut next_col = 1;
        for c in row.elements("c") {
            let col = c
                .attr("r")
                .and_then(CellRef::parse)
                .map(|at| at.col)
                .unwrap_or(next_col);
            next_col = col + 1;
            let shared = c
                .tree()?
                .child("f")
                .is_some_and(|f| f.attr("t") == Some("shared"));
            source.insert(
                col,
                SourceCell {
                    node: c.clone(),
                    style: c.attr("s").and_then(|s| s.parse().ok()),
                    shared,
                },
            );
        }

        rows.insert(
            r,
            RowOut {
                attrs,
                style,
                source,
                cells: Vec::new(),
                existed: true,
            },
        );
    }

    let mut positions: BTreeSet<CellRef> = sheet
        .cells()
        .chain(baseline.cells())
        .map(|(at, _)| *at)
        .collect();
    for (r, row) in &rows {
        positions.extend(row.source.keys().map(|c| CellRef::new(*r, *c)));
    }

    for at in positions {
        let row = rows.entry(at.row).or_insert_with(|| RowOut {
            attrs: vec![("r".to_string(), at.row.to_string())],
            ..Default::default()
        });
        let source = row.source.get(&at.col);
        let current = sheet.cell(at.row, at.col);
        let lock = sheet.locked_columns.map(|_| sheet.is_locked(at.col));

        let kept = match source {
            Some(src) if !src.shared && current == baseline.cell(at.row, at.col) => Some(src),
            _ => None,
        };

        let rendered = if let Some(src) = kept {
            match lock {
                Some(locked) => {
                    let style = styles.with_locking(src.style.unwrap_or(0), locked)?;
                    if Some(style) == src.style || (style == 0 && src.style.is_none()) {
                        Some(src.node.raw.clone())
                    } else {
                        let mut tree = src.node.tree()?;
                        tree.set_attr("s", style.to_string());
                        Some(tree.to_xml())
                    }
                }
                None => Some(src.node.raw.clone()),
            }
        } else {
            let base = source
                .and_then(|s| s.style)
                .or(row.style)
                .or_else(|| columns.style_of(at.col));
            match current {
                Some(cell) => {
                    let mut style = base;
                    let plain = style.unwrap_or(0);
                    if matches!(cell.value, CellValue::DateTime(_))
                        && styles.number_format(plain) == 0
                    {
                        style = Some(styles.with_number_format(plain, DATE_TIME_FORMAT));
                    }
                    if let Some(locked) = lock {
                        style = Some(styles.with_locking(style.unwrap_or(0), locked)?);
                    }
                    Some(cell_xml(at, cell, style.filter(|s| *s != 0), &prefix))
                }
                // Cleared: a formatted cell stays as an empty styled cell
                None => match source.and_then(|s| s.style) {
                    Some(style) => {
                        let style = match lock {
                            Some(locked) => styles.with_locking(style, locked)?,
                            None => style,
                        };
                        Some(format!(r#"<{}c r="{}" s="{}"/>"#, prefix, at, style))
                    }
                    None => None,
                },
            }
        };

        if let Some(xml) = rendered {
            row.cells.push(xml);
        }
    }

    let row_name = format!("{}row", prefix);
    let mut body = String::new();
    for row in rows.values() {
        if row.cells.is_empty() {
            if row.existed {
                body.push_str(&start_tag(&row_name, &row.attrs, true));
            }
            continue;
        }
        body.push_str(&start_tag(&row_name, &row.attrs, false));
        for cell in &row.cells {
            body.push_str(cell);
        }
        body.push_str(&format!("</{}>", row_name));
    }

    if body.is_empty() {
        return Ok(start_tag(&data.name, &data.attrs, true));
    }
    Ok(format!(
        "{}{}</{}>",
        start_tag(&data.name, &data.attrs, false),
        body,
        data.name
    ))
}

/// A `<c>` element for a value written through the store
fn cell_xml(at: CellRef, cell: &Cell, style: Option<u32>, prefix: &str) -> String {
    let mut attrs: Attrs = vec![("r".to_string(), at.to_string())];
    if let Some(style) = style {
        attrs.push(("s".to_string(), style.to_string()));
    }

    let formula = cell
        .formula
        .as_deref()
        .map(|f| f.strip_prefix('=').unwrap_or(f));
    let mut body = match formula {
        Some(f) => format!("<{p}f>{}</{p}f>", escape_text(f), p = prefix),
        None => String::new(),
    };

    let kind = match &cell.value {
        CellValue::Empty => None,
        CellValue::String(s) if formula.is_none() => {
            body.push_str(&format!(
                r#"<{p}is><{p}t xml:space="preserve">{}</{p}t></{p}is>"#,
                escape_text(s),
                p = prefix
            ));
            Some("inlineStr")
        }
        CellValue::String(s) => {
            body.push_str(&value(prefix, &escape_text(s)));
            Some("str")
        }
        CellValue::Number(n) | CellValue::DateTime(n) if !n.is_finite() => {
            body.push_str(&value(prefix, "#NUM!"));
            Some("e")
        }
        CellValue::Number(n) | CellValue::DateTime(n) => {
            body.push_str(&value(prefix, &n.to_string()));
            None
        }
        CellValue::Bool(b) => {
            body.push_str(&value(prefix, if *b { "1" } else { "0" }));
            Some("b")
        }
        CellValue::Error(e) => {
            body.push_str(&value(prefix, &escape_text(e)));
            Some("e")
        }
    };
    if let Some(kind) = kind {
        attrs.push(("t".to_string(), kind.to_string()));
    }

    let name = format!("{}c", prefix);
    if body.is_empty() {
        return start_tag(&name, &attrs, true);
    }
    format!("{}{}</{}>", start_tag(&name, &attrs, false), body, name)
}

fn value(prefix: &str, text: &str) -> String {
    format!("<{p}v>{}</{p}v>", text, p = prefix)
}

fn protection_xml(protection: &Protection, prefix: &str) -> String {
    let mut attrs: Attrs = Vec::new();
    let mut push = |key: &str, value: String| attrs.push((key.to_string(), value));

    match &protection.key {
        ProtectionKey::Hashed {
            algorithm,
            hash,
            salt,
            spin_count,
        } => {
            push("algorithmName", escape_text(algorithm).into_owned());
            push("hashValue", escape_text(hash).into_owned());
            push("saltValue", escape_text(salt).into_owned());
            push("spinCount", spin_count.to_string());
        }
        key => {
            if let Some(hash) = key.legacy() {
                push("password", format!("{:04X}", hash));
            }
        }
    }
    if protection.flags.contents {
        push("sheet", "1".to_string());
    }
    if protection.flags.drawing_objects {
        push("objects", "1".to_string());
    }
    if protection.flags.scenarios {
        push("scenarios", "1".to_string());
    }
    start_tag(&format!("{}sheetProtection", prefix), &attrs, true)
}

/// Protection as stored in a `<sheetProtection>` element; `None` when the
/// sheet itself is not protected
pub fn read_protection(node: &Node) -> Option<Protection> {
    if !is_true(node.attr("sheet")) {
        return None;
    }

    let hashed = (
        node.value("algorithmName"),
        node.value("hashValue"),
        node.value("saltValue"),
    );
    let key = match hashed {
        (Some(algorithm), Some(hash), Some(salt)) => ProtectionKey::Hashed {
            algorithm: algorithm.into_owned(),
            hash: hash.into_owned(),
            salt: salt.into_owned(),
            spin_count: node
                .attr("spinCount")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        },
        _ => match node
            .attr("password")
            .and_then(|v| u16::from_str_radix(v, 16).ok())
        {
            Some(hash) => ProtectionKey::Legacy(hash),
            None => ProtectionKey::Open,
        },
    };

    Some(Protection {
        key,
        flags: crate::store::ProtectionFlags {
            drawing_objects: is_true(node.attr("objects")),
            contents: true,
            scenarios: is_true(node.attr("scenarios")),
        },
    })
}

fn find<'a>(attrs: &'a Attrs, key: &str) -> Option<&'a str> {
    attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn attr_u32(attrs: &Attrs, key: &str) -> Option<u32> {
    find(attrs, key).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ProtectionFlags;

    const STYLES: &str = r#"<styleSheet><cellXfs count="2"><xf numFmtId="0" fontId="0"/><xf numFmtId="0" fontId="1" applyFont="1"/></cellXfs></styleSheet>"#;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1:B2"/><sheetFormatPr defaultRowHeight="15"/><cols><col min="1" max="1" width="30" customWidth="1"/></cols><sheetData><row r="1" spans="1:2"><c r="A1" s="1" t="s"><v>0</v></c><c r="B1" s="1" t="s"><v>1</v></c></row><row r="2" spans="1:2"><c r="A2"><v>5</v></c><c r="B2"><f>A2*2</f><v>10</v></c></row></sheetData><sheetProtection password="CC3D" sheet="1" objects="1" scenarios="1"/><mergeCells count="1"><mergeCell ref="A1:B1"/></mergeCells><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#;

    fn baseline() -> Sheet {
        let mut sheet = Sheet::new("Oracle");
        sheet.set_value(1, 1, CellValue::text("Name"));
        sheet.set_value(1, 2, CellValue::text("Hours"));
        sheet.set_value(2, 1, CellValue::Number(5.0));
        sheet.set_value(2, 2, CellValue::Number(10.0));
        sheet.set_formula(2, 2, "A2*2");
        sheet.protection = Some(Protection {
            key: ProtectionKey::Legacy(0xCC3D),
            flags: ProtectionFlags::ALL,
        });
        sheet
    }

    #[test]
    fn test_unchanged_sheet_keeps_source_markup() {
        let base = baseline();
        let mut styles = StyleBook::parse(Some(STYLES)).unwrap();
        let xml = patch_sheet(SHEET, &base, &base, &mut styles).unwrap();
        assert_eq!(xml, SHEET);
    }

    #[test]
    fn test_appended_row_keeps_existing_cells_and_merges() {
        let base = baseline();
        let mut sheet = base.clone();
        sheet.set_value(3, 1, CellValue::text("Alice & Bob"));
        sheet.set_value(3, 2, CellValue::Number(7.5));
        let mut styles = StyleBook::parse(Some(STYLES)).unwrap();

        let xml = patch_sheet(SHEET, &sheet, &base, &mut styles).unwrap();

        assert!(xml.contains(r#"<c r="A1" s="1" t="s"><v>0</v></c>"#));
        assert!(xml.contains(r#"<c r="B2"><f>A2*2</f><v>10</v></c>"#));
        assert!(xml.contains(
            r#"<row r="3"><c r="A3" t="inlineStr"><is><t xml:space="preserve">Alice &amp; Bob</t></is></c><c r="B3"><v>7.5</v></c></row>"#
        ));
        assert!(xml.contains(r#"<dimension ref="A1:B3"/>"#));
        assert!(xml.contains(r#"<mergeCell ref="A1:B1"/>"#));
        assert!(xml.contains(r#"<col min="1" max="1" width="30" customWidth="1"/>"#));
        assert!(xml.contains(
            r#"<sheetProtection password="CC3D" sheet="1" objects="1" scenarios="1"/>"#
        ));
        assert!(!xml.contains("spans="));
    }

    #[test]
    fn test_overwritten_cell_keeps_its_format() {
        let base = baseline();
        let mut sheet = base.clone();
        sheet.set_value(1, 2, CellValue::text("Total"));
        let mut styles = StyleBook::parse(Some(STYLES)).unwrap();

        let xml = patch_sheet(SHEET, &sheet, &base, &mut styles).unwrap();
        assert!(xml.contains(
            r#"<c r="B1" s="1" t="inlineStr"><is><t xml:space="preserve">Total</t></is></c>"#
        ));
    }

    #[test]
    fn test_hidden_columns_and_protection_changes() {
        let base = baseline();
        let mut sheet = base.clone();
        sheet.hidden_columns.insert(3);
        sheet.protection = None;
        let mut styles = StyleBook::parse(Some(STYLES)).unwrap();

        let xml = patch_sheet(SHEET, &sheet, &base, &mut styles).unwrap();
        assert!(xml.contains(
            r#"<cols><col min="1" max="1" width="30" customWidth="1"/><col min="3" max="3" width="9.140625" hidden="1"/></cols>"#
        ));
        assert!(!xml.contains("sheetProtection"));
        // Cells untouched, so sheetData is kept verbatim
        assert!(xml.contains(r#"<row r="1" spans="1:2">"#));
    }

    #[test]
    fn test_lock_mask_unlocks_columns_outside_span() {
        let base = baseline();
        let mut sheet = base.clone();
        sheet.locked_columns = Some((1, 1));
        let mut styles = StyleBook::parse(Some(STYLES)).unwrap();

        let xml = patch_sheet(SHEET, &sheet, &base, &mut styles).unwrap();

        // Columns come first: xf 0 gains unlocked variant 2, xf 1 gains 3
        assert!(xml.contains(r#"<c r="A1" s="1" t="s">"#));
        assert!(xml.contains(r#"<c r="A2"><v>5</v></c>"#));
        assert!(xml.contains(r#"<c r="B1" s="3" t="s">"#));
        assert!(xml.contains(r#"<c r="B2" s="2"><f>A2*2</f>"#));
        assert!(xml.contains(r#"<col min="2" max="16384" width="9.140625" style="2"/>"#));
        assert!(!styles.is_locked(2));
        assert!(!styles.is_locked(3));
    }

    #[test]
    fn test_new_sheet_from_blank_part() {
        let blank = r#"<worksheet xmlns="urn:main"><dimension ref="A1"/><sheetData/></worksheet>"#;
        let base = Sheet::new("Resource List");
        let mut sheet = base.clone();
        sheet.set_value(2, 2, CellValue::Bool(true));
        sheet.set_value(2, 3, CellValue::Number(f64::NAN));
        sheet.protection = Some(Protection::new("1234", ProtectionFlags::ALL));
        let mut styles = StyleBook::parse(None).unwrap();

        let xml = patch_sheet(blank, &sheet, &base, &mut styles).unwrap();
        assert_eq!(
            xml,
            r#"<worksheet xmlns="urn:main"><dimension ref="A1:C2"/><sheetData><row r="2"><c r="B2" t="b"><v>1</v></c><c r="C2" t="e"><v>#NUM!</v></c></row></sheetData><sheetProtection password="CC3D" sheet="1" objects="1" scenarios="1"/></worksheet>"#
        );
    }

    #[test]
    fn test_read_protection_variants() {
        let node = |xml: &str| Node::element(xml.to_string()).unwrap();

        let legacy = r#"<sheetProtection password="CC3D" sheet="1" objects="1"/>"#;
        let legacy = read_protection(&node(legacy)).unwrap();
        assert_eq!(legacy.key, ProtectionKey::Legacy(0xCC3D));
        assert!(legacy.flags.drawing_objects);
        assert!(!legacy.flags.scenarios);

        let hashed = read_protection(&node(
            r#"<sheetProtection algorithmName="SHA-512" hashValue="aGFzaA==" saltValue="c2FsdA==" spinCount="100000" sheet="1"/>"#,
        ))
        .unwrap();
        assert!(matches!(hashed.key, ProtectionKey::Hashed { spin_count: 100000, .. }));

        let open = read_protection(&node(r#"<sheetProtection sheet="true"/>"#)).unwrap();
        assert_eq!(open.key, ProtectionKey::Open);

        assert!(read_protection(&node(r#"<sheetProtection objects="1"/>"#)).is_none());
    }
}
