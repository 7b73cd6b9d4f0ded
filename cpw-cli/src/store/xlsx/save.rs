//! Saving a document back into the package it was loaded from
//!
//! Parts that did not change are copied byte for byte, still compressed,
//! so macros, drawings, defined names and custom XML survive untouched.

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use std::path::Path;

use quick_xml::escape::escape;
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::store::document::{Document, Sheet, TableDef};
use crate::store::{CellRef, StoreError};

use super::package::{CONTENT_TYPES, Origin, PackageError, dir_of, names_part, resolve};
use super::sheet_xml::patch_sheet;
use super::styles::StyleBook;
use super::xml::{Node, Tree, start_tag};

const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const WORKSHEET_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const WORKSHEET_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

const BLANK_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><dimension ref="A1"/><sheetViews><sheetView workbookViewId="0"/></sheetViews><sheetFormatPr defaultRowHeight="15"/><sheetData/><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#;

/// Parts to rewrite, drop or add when copying the package
#[derive(Debug, Default)]
struct Edits {
    replaced: HashMap<String, String>,
    removed: HashSet<String>,
    added: Vec<(String, String)>,
}

pub fn save_patched(path: &Path, origin: &Origin, document: &Document) -> Result<(), StoreError> {
    let edits = plan(origin, document).map_err(|e| StoreError::format(path, e))?;
    log::debug!(
        "Saving {}: {} parts rewritten, {} added, {} dropped",
        path.display(),
        edits.replaced.len(),
        edits.added.len(),
        edits.removed.len()
    );
    write_package(path, origin, &edits)
}

fn plan(origin: &Origin, document: &Document) -> Result<Edits, PackageError> {
    let mut edits = Edits::default();
    let mut styles = StyleBook::parse(origin.styles.as_ref().map(|p| p.xml.as_str()))?;
    let mut workbook = WorkbookEdit::new(origin)?;
    let mut cells_changed = false;

    for sheet in &document.sheets {
        let Some(source) = sheet.part().and_then(|i| origin.sheets.get(i)) else {
            cells_changed |= sheet.extent() != (0, 0);
            let path = workbook.add_sheet(&sheet.name)?;
            let xml = patch_sheet(BLANK_SHEET, sheet, &Sheet::new(&sheet.name), &mut styles)?;
            edits.added.push((path, xml));
            continue;
        };

        let baseline = &source.baseline;
        if sheet.name != baseline.name {
            workbook.rename(&source.rel_id, &sheet.name)?;
        }

        let cells_differ = !sheet.cells().eq(baseline.cells());
        cells_changed |= cells_differ;
        if cells_differ
            || sheet.locked_columns.is_some()
            || sheet.hidden_columns != baseline.hidden_columns
            || sheet.protection != baseline.protection
        {
            let xml = patch_sheet(&source.part.xml, sheet, baseline, &mut styles)?;
            edits.replaced.insert(source.part.path.clone(), xml);
        }

        for table in &source.tables {
            let (Some(now), Some(before)) = (sheet.table(&table.name), baseline.table(&table.name))
            else {
                continue;
            };
            if now.last_row != before.last_row {
                let xml = resize_table(&table.part.xml, now, table.totals)?;
                edits.replaced.insert(table.part.path.clone(), xml);
            }
        }
    }

    if cells_changed {
        workbook.recalculate_on_load(&mut edits);
    }
    if let (Some(xml), Some(part)) = (styles.to_xml()?, &origin.styles) {
        edits.replaced.insert(part.path.clone(), xml);
    }
    workbook.finish(&mut edits)?;
    Ok(edits)
}

/// New table and filter range after the data rows moved to `def.last_row`
fn resize_table(xml: &str, def: &TableDef, totals: u32) -> Result<String, PackageError> {
    let mut tree = Tree::parse(xml)?;
    let top = CellRef::new(def.header_row, def.first_col);
    let last_col = def.last_col();

    tree.set_attr(
        "ref",
        format!("{}:{}", top, CellRef::new(def.last_row + totals, last_col)),
    );
    if let Some(at) = tree.position("autoFilter") {
        let mut filter = tree.children[at].tree()?;
        filter.set_attr("ref", format!("{}:{}", top, CellRef::new(def.last_row, last_col)));
        tree.children[at] = filter.into_node();
    }
    Ok(tree.to_xml())
}

/// Pending changes to `workbook.xml`, its relationships and the content types
struct WorkbookEdit<'a> {
    origin: &'a Origin,
    workbook: Tree,
    sheets: Tree,
    sheets_at: usize,
    rels: Tree,
    types: Tree,
    workbook_changed: bool,
    rels_changed: bool,
    types_changed: bool,
    next_sheet_id: u32,
    next_rel_id: u32,
    added: Vec<String>,
}

impl<'a> WorkbookEdit<'a> {
    fn new(origin: &'a Origin) -> Result<Self, PackageError> {
        let workbook = Tree::parse(&origin.workbook.xml)?;
        let sheets_at = workbook
            .position("sheets")
            .ok_or_else(|| PackageError::Invalid("workbook lists no sheets".to_string()))?;
        let sheets = workbook.children[sheets_at].tree()?;
        let rels = Tree::parse(&origin.workbook_rels.xml)?;

        let next_sheet_id = sheets
            .elements("sheet")
            .filter_map(|s| s.attr("sheetId")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let next_rel_id = rels
            .elements("Relationship")
            .filter_map(|r| r.attr("Id")?.strip_prefix("rId")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;

        Ok(Self {
            origin,
            types: Tree::parse(&origin.content_types)?,
            workbook,
            sheets,
            sheets_at,
            rels,
            workbook_changed: false,
            rels_changed: false,
            types_changed: false,
            next_sheet_id,
            next_rel_id,
            added: Vec::new(),
        })
    }

    fn rename(&mut self, rel_id: &str, name: &str) -> Result<(), PackageError> {
        let Some(at) = self
            .sheets
            .children
            .iter()
            .position(|n| n.local() == "sheet" && n.attr("id") == Some(rel_id))
        else {
            return Err(PackageError::Invalid(format!("no sheet entry for '{}'", rel_id)));
        };
        let mut entry = self.sheets.children[at].tree()?;
        entry.set_attr("name", escape(name).into_owned());
        self.sheets.children[at] = Node::element(start_tag(&entry.name, &entry.attrs, true))?;
        self.workbook_changed = true;
        Ok(())
    }

    /// Register a new worksheet part and return its name
    fn add_sheet(&mut self, name: &str) -> Result<String, PackageError> {
        let dir = dir_of(&self.origin.workbook.path);
        let (path, target) = (1..=u32::MAX)
            .map(|k| {
                (
                    format!("{}worksheets/sheet{}.xml", dir, k),
                    format!("worksheets/sheet{}.xml", k),
                )
            })
            .find(|(path, _)| !self.origin.entries.contains(path) && !self.added.contains(path))
            .ok_or_else(|| PackageError::Invalid("no free worksheet part name".to_string()))?;

        let rel_id = format!("rId{}", self.next_rel_id);
        self.next_rel_id += 1;
        let relationship = format!(
            r#"<{}Relationship Id="{}" Type="{}" Target="{}"/>"#,
            self.rels.prefix(),
            rel_id,
            WORKSHEET_REL,
            target
        );
        self.rels.children.push(Node::element(relationship)?);
        self.rels_changed = true;

        let relationships_prefix = self.relationships_prefix();
        let entry = format!(
            r#"<{}sheet name="{}" sheetId="{}" {}:id="{}"/>"#,
            self.sheets.prefix(),
            escape(name),
            self.next_sheet_id,
            relationships_prefix,
            rel_id
        );
        self.next_sheet_id += 1;
        self.sheets.children.push(Node::element(entry)?);
        self.workbook_changed = true;

        let override_part = format!(
            r#"<{}Override PartName="/{}" ContentType="{}"/>"#,
            self.types.prefix(),
            path,
            WORKSHEET_TYPE
        );
        self.types.children.push(Node::element(override_part)?);
        self.types_changed = true;

        self.added.push(path.clone());
        Ok(path)
    }

    /// Prefix bound to the relationships namespace, declared when missing
    fn relationships_prefix(&mut self) -> String {
        let declared = self.workbook.attrs.iter().find_map(|(key, value)| {
            (value == RELATIONSHIPS_NS)
                .then(|| key.strip_prefix("xmlns:"))
                .flatten()
                .map(str::to_string)
        });
        match declared {
            Some(prefix) => prefix,
            None => {
                self.workbook.set_attr("xmlns:r", RELATIONSHIPS_NS);
                "r".to_string()
            }
        }
    }

    /// Drop the calculation chain and have Excel recalculate on open; cached
    /// formula results may be stale after cell edits
    fn recalculate_on_load(&mut self, edits: &mut Edits) {
        if let Some(chain) = &self.origin.calc_chain {
            edits.removed.insert(chain.clone());
            let workbook_path = &self.origin.workbook.path;
            self.rels.children.retain(|n| {
                !(n.local() == "Relationship"
                    && n.value("Target")
                        .is_some_and(|t| resolve(workbook_path, &t) == *chain))
            });
            self.types
                .children
                .retain(|n| !(n.local() == "Override" && names_part(n.attr("PartName"), chain)));
            self.rels_changed = true;
            self.types_changed = true;
        }

        match self.workbook.position("calcPr") {
            Some(at) => {
                if let Ok(mut calc) = self.workbook.children[at].tree() {
                    calc.set_attr("fullCalcOnLoad", "1");
                    self.workbook.children[at] = calc.into_node();
                }
            }
            None => {
                let preceding = ["sheets", "functionGroups", "externalReferences", "definedNames"];
                let at = self
                    .workbook
                    .children
                    .iter()
                    .rposition(|n| preceding.contains(&n.local()))
                    .map(|i| i + 1)
                    .unwrap_or(self.workbook.children.len());
                let calc = format!(r#"<{}calcPr fullCalcOnLoad="1"/>"#, self.workbook.prefix());
                if let Ok(node) = Node::element(calc) {
                    self.workbook.children.insert(at, node);
                }
            }
        }
        self.workbook_changed = true;
    }

    fn finish(mut self, edits: &mut Edits) -> Result<(), PackageError> {
        if self.workbook_changed {
            self.workbook.children[self.sheets_at] = self.sheets.into_node();
            edits
                .replaced
                .insert(self.origin.workbook.path.clone(), self.workbook.to_xml());
        }
        if self.rels_changed {
            edits
                .replaced
                .insert(self.origin.workbook_rels.path.clone(), self.rels.to_xml());
        }
        if self.types_changed {
            edits
                .replaced
                .insert(CONTENT_TYPES.to_string(), self.types.to_xml());
        }
        Ok(())
    }
}

fn deflated() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Copy the source package into a temporary file next to `path` with
/// `edits` applied, then move it into place
fn write_package(path: &Path, origin: &Origin, edits: &Edits) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let zip_err = |e: zip::result::ZipError| StoreError::io(path, e);
    let io_err = |e: std::io::Error| StoreError::io(path, e);

    let mut source =
        ZipArchive::new(Cursor::new(origin.bytes())).map_err(|e| StoreError::format(path, e))?;
    let tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    let mut writer = ZipWriter::new(tmp);

    for i in 0..source.len() {
        let entry = source.by_index_raw(i).map_err(zip_err)?;
        let name = entry.name().to_string();
        if edits.removed.contains(&name) {
            continue;
        }
        match edits.replaced.get(&name) {
            Some(xml) => {
                writer.start_file(name, deflated()).map_err(zip_err)?;
                writer.write_all(xml.as_bytes()).map_err(io_err)?;
            }
            None => writer.raw_copy_file(entry).map_err(zip_err)?,
        }
    }
    for (name, xml) in &edits.added {
        writer.start_file(name.as_str(), deflated()).map_err(zip_err)?;
        writer.write_all(xml.as_bytes()).map_err(io_err)?;
    }

    let tmp = writer.finish().map_err(zip_err)?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}
