//! The xlsx/xlsm zip package: part lookup, relationships and the parts a
//! document keeps to be patched on save

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use zip::ZipArchive;

use crate::store::document::{Sheet, TableDef};
use crate::store::CellRef;

use super::sheet_xml::{ColumnDefs, read_protection};
use super::xml::{Tree, unescape_lossy};

pub const CONTENT_TYPES: &str = "[Content_Types].xml";
const ROOT_RELS: &str = "_rels/.rels";

/// Relationship type suffixes, after `.../relationships/`
pub const REL_OFFICE_DOCUMENT: &str = "/officeDocument";
pub const REL_WORKSHEET: &str = "/worksheet";
pub const REL_STYLES: &str = "/styles";
pub const REL_CALC_CHAIN: &str = "/calcChain";
pub const REL_TABLE: &str = "/table";

#[derive(Debug)]
pub enum PackageError {
    Zip(zip::result::ZipError),
    Xml(quick_xml::Error),
    Io(std::io::Error),
    /// A part the workbook cannot do without
    MissingPart(String),
    Invalid(String),
}

impl std::fmt::Display for PackageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageError::Zip(e) => write!(f, "zip: {}", e),
            PackageError::Xml(e) => write!(f, "xml: {}", e),
            PackageError::Io(e) => write!(f, "{}", e),
            PackageError::MissingPart(part) => write!(f, "missing part '{}'", part),
            PackageError::Invalid(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for PackageError {}

impl From<zip::result::ZipError> for PackageError {
    fn from(err: zip::result::ZipError) -> Self {
        PackageError::Zip(err)
    }
}

impl From<quick_xml::Error> for PackageError {
    fn from(err: quick_xml::Error) -> Self {
        PackageError::Xml(err)
    }
}

impl From<std::io::Error> for PackageError {
    fn from(err: std::io::Error) -> Self {
        PackageError::Io(err)
    }
}

/// A part name and its XML
#[derive(Debug, Clone)]
pub struct Part {
    pub path: String,
    pub xml: String,
}

#[derive(Debug, Clone)]
pub struct TablePart {
    pub name: String,
    /// Rows of the totals row below the data, 0 or 1
    pub totals: u32,
    pub part: Part,
}

#[derive(Debug, Clone)]
pub struct SheetPart {
    /// `r:id` of the sheet's relationship from the workbook part
    pub rel_id: String,
    pub part: Part,
    pub tables: Vec<TablePart>,
    /// The sheet exactly as loaded
    pub baseline: Sheet,
}

/// A loaded package: the original bytes plus every part a save may patch
pub struct Origin {
    bytes: Vec<u8>,
    pub entries: Vec<String>,
    pub workbook: Part,
    pub workbook_rels: Part,
    pub content_types: String,
    pub styles: Option<Part>,
    pub calc_chain: Option<String>,
    pub sheets: Vec<SheetPart>,
}

impl std::fmt::Debug for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Origin")
            .field("bytes", &self.bytes.len())
            .field("workbook", &self.workbook.path)
            .field(
                "sheets",
                &self.sheets.iter().map(|s| s.part.path.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

struct Relationship {
    id: String,
    kind: String,
    target: String,
}

impl Origin {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Parse the package structure. Sheets come back with protection, hidden
    /// columns and tables; cell contents are left to the caller.
    pub fn read(bytes: Vec<u8>) -> Result<Self, PackageError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice()))?;
        let entries: Vec<String> = archive.file_names().map(str::to_string).collect();

        let root_rels = required(&mut archive, ROOT_RELS)?;
        let workbook_path = relationships(&root_rels)?
            .into_iter()
            .find(|r| r.kind.ends_with(REL_OFFICE_DOCUMENT))
            .map(|r| resolve("", &r.target))
            .ok_or_else(|| PackageError::Invalid("no officeDocument relationship".to_string()))?;

        let workbook = Part {
            xml: required(&mut archive, &workbook_path)?,
            path: workbook_path,
        };
        let rels_path = rels_of(&workbook.path);
        let workbook_rels = Part {
            xml: required(&mut archive, &rels_path)?,
            path: rels_path,
        };
        let content_types = required(&mut archive, CONTENT_TYPES)?;

        let rels = relationships(&workbook_rels.xml)?;
        let target_of = |suffix: &str| {
            rels.iter()
                .find(|r| r.kind.ends_with(suffix))
                .map(|r| resolve(&workbook.path, &r.target))
        };
        let calc_chain = target_of(REL_CALC_CHAIN);
        let styles = match target_of(REL_STYLES) {
            Some(path) => optional(&mut archive, &path)?.map(|xml| Part { path, xml }),
            None => None,
        };
        let worksheets: HashMap<&str, String> = rels
            .iter()
            .filter(|r| r.kind.ends_with(REL_WORKSHEET))
            .map(|r| (r.id.as_str(), resolve(&workbook.path, &r.target)))
            .collect();

        let tree = Tree::parse(&workbook.xml)?;
        let listed = match tree.child("sheets") {
            Some(node) => node.tree()?,
            None => return Err(PackageError::Invalid("workbook lists no sheets".to_string())),
        };

        let mut sheets = Vec::new();
        for entry in listed.elements("sheet") {
            let (Some(name), Some(rel_id)) = (entry.value("name"), entry.attr("id")) else {
                continue;
            };
            // Chart sheets and dialog sheets have no grid to patch
            let Some(path) = worksheets.get(rel_id) else {
                continue;
            };
            let xml = required(&mut archive, path)?;
            let mut baseline = Sheet::new(&name);
            read_sheet_state(&xml, &mut baseline)?;

            let mut tables = Vec::new();
            if let Some(sheet_rels) = optional(&mut archive, &rels_of(path))? {
                for rel in relationships(&sheet_rels)?
                    .into_iter()
                    .filter(|r| r.kind.ends_with(REL_TABLE))
                {
                    let table_path = resolve(path, &rel.target);
                    let Some(table_xml) = optional(&mut archive, &table_path)? else {
                        continue;
                    };
                    if let Some((def, totals)) = read_table(&table_xml)? {
                        tables.push(TablePart {
                            name: def.name.clone(),
                            totals,
                            part: Part {
                                path: table_path,
                                xml: table_xml,
                            },
                        });
                        baseline.tables.push(def);
                    }
                }
            }

            sheets.push(SheetPart {
                rel_id: rel_id.to_string(),
                part: Part {
                    path: path.clone(),
                    xml,
                },
                tables,
                baseline,
            });
        }

        drop(archive);
        Ok(Self {
            bytes,
            entries,
            workbook,
            workbook_rels,
            content_types,
            styles,
            calc_chain,
            sheets,
        })
    }
}

fn required<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<String, PackageError> {
    optional(archive, name)?.ok_or_else(|| PackageError::MissingPart(name.to_string()))
}

fn optional<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, PackageError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut xml = String::new();
    file.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

fn relationships(xml: &str) -> Result<Vec<Relationship>, PackageError> {
    let tree = Tree::parse(xml)?;
    Ok(tree
        .elements("Relationship")
        .filter(|r| r.attr("TargetMode") != Some("External"))
        .filter_map(|r| {
            Some(Relationship {
                id: r.attr("Id")?.to_string(),
                kind: r.attr("Type")?.to_string(),
                target: r.value("Target")?.into_owned(),
            })
        })
        .collect())
}

/// `xl/worksheets/sheet1.xml` -> `xl/worksheets/_rels/sheet1.xml.rels`
pub fn rels_of(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Directory of a part, with a trailing slash (`xl/`), empty at the root
pub fn dir_of(part: &str) -> &str {
    match part.rfind('/') {
        Some(i) => &part[..=i],
        None => "",
    }
}

/// Resolve a relationship target against the part that owns it
pub fn resolve(source: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = dir_of(source).split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Protection and hidden columns from worksheet XML
fn read_sheet_state(xml: &str, sheet: &mut Sheet) -> Result<(), PackageError> {
    let tree = Tree::parse(xml)?;
    if let Some(cols) = tree.child("cols") {
        sheet.hidden_columns = ColumnDefs::parse(cols)?.hidden();
    }
    sheet.protection = tree.child("sheetProtection").and_then(read_protection);
    Ok(())
}

/// Table definition plus its totals row count. Tables without a header row
/// are skipped.
fn read_table(xml: &str) -> Result<Option<(TableDef, u32)>, PackageError> {
    let tree = Tree::parse(xml)?;
    let count = |key: &str, default: u32| {
        tree.attr(key)
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(default)
    };
    if count("headerRowCount", 1) == 0 {
        log::debug!("Skipping table without header row");
        return Ok(None);
    }
    let totals = count("totalsRowCount", 0);

    let name = match tree.attr("displayName").or_else(|| tree.attr("name")) {
        Some(name) => unescape_lossy(name).into_owned(),
        None => return Ok(None),
    };
    let Some((top, bottom)) = tree.attr("ref").and_then(parse_range) else {
        log::warn!("Skipping table '{}' with unreadable range", name);
        return Ok(None);
    };

    let mut def = TableDef {
        name,
        header_row: top.row,
        first_col: top.col,
        last_row: bottom.row.saturating_sub(totals).max(top.row),
        ..Default::default()
    };
    if let Some(columns) = tree.child("tableColumns") {
        for (i, column) in columns.tree()?.elements("tableColumn").enumerate() {
            def.columns
                .push(column.value("name").map(|n| n.into_owned()).unwrap_or_default());
            if let Some(formula) = column.tree()?.child("calculatedColumnFormula") {
                def.calculated
                    .insert(top.col + i as u32, formula.tree()?.text());
            }
        }
    }
    Ok(Some((def, totals)))
}

/// `B4:E7`; a single cell is a one-cell range
pub fn parse_range(range: &str) -> Option<(CellRef, CellRef)> {
    match range.split_once(':') {
        Some((top, bottom)) => Some((CellRef::parse(top)?, CellRef::parse(bottom)?)),
        None => CellRef::parse(range).map(|at| (at, at)),
    }
}

/// True when the `<Override>`/`<Relationship>` node refers to `part`
pub fn names_part(value: Option<&str>, part: &str) -> bool {
    value.is_some_and(|v| v.trim_start_matches('/') == part)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relationship_targets() {
        assert_eq!(resolve("", "xl/workbook.xml"), "xl/workbook.xml");
        assert_eq!(resolve("xl/workbook.xml", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(
            resolve("xl/worksheets/sheet1.xml", "../tables/table1.xml"),
            "xl/tables/table1.xml"
        );
        assert_eq!(resolve("xl/workbook.xml", "/xl/styles.xml"), "xl/styles.xml");
        assert_eq!(rels_of("xl/workbook.xml"), "xl/_rels/workbook.xml.rels");
    }

    #[test]
    fn test_read_table_with_totals_and_calculated_column() {
        let xml = r#"<table xmlns="urn:main" id="1" name="Table1" displayName="ProjectRaw6" ref="B4:D9" totalsRowCount="1"><autoFilter ref="B4:D8"/><tableColumns count="3"><tableColumn id="1" name="Index"/><tableColumn id="2" name="R&amp;D"/><tableColumn id="3" name="Double"><calculatedColumnFormula>ProjectRaw6[[#This Row],[Index]]*2</calculatedColumnFormula></tableColumn></tableColumns></table>"#;

        let (def, totals) = read_table(xml).unwrap().unwrap();
        assert_eq!(totals, 1);
        assert_eq!(def.name, "ProjectRaw6");
        assert_eq!((def.header_row, def.first_col, def.last_row), (4, 2, 8));
        assert_eq!(def.columns, vec!["Index", "R&D", "Double"]);
        assert_eq!(
            def.calculated.get(&4).map(String::as_str),
            Some("ProjectRaw6[[#This Row],[Index]]*2")
        );
    }

    #[test]
    fn test_headerless_table_is_skipped() {
        let xml = r#"<table name="T" displayName="T" ref="A1:B3" headerRowCount="0"/>"#;
        assert!(read_table(xml).unwrap().is_none());
    }
}
