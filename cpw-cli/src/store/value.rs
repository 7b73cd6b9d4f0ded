//! Scalar cell values and 1-based cell coordinates

use serde::{Deserialize, Serialize};

/// A single spreadsheet cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "value")]
pub enum CellValue {
    /// Empty cell
    #[default]
    Empty,
    /// Text
    String(String),
    /// Any numeric cell (Excel stores integers as floats too)
    Number(f64),
    /// Boolean
    Bool(bool),
    /// Excel serial date/time
    DateTime(f64),
    /// Error value such as `#N/A`
    Error(String),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::String(value.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Empty cells and empty strings both count as blank
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Blank after trimming whitespace
    pub fn is_blank_trimmed(&self) -> bool {
        match self {
            CellValue::String(s) => s.trim().is_empty(),
            other => other.is_blank(),
        }
    }

    /// Truthiness of the cell as a spreadsheet macro would test it:
    /// blank, zero and `false` are falsy
    pub fn is_truthy(&self) -> bool {
        match self {
            CellValue::Empty => false,
            CellValue::String(s) => !s.is_empty(),
            CellValue::Number(n) | CellValue::DateTime(n) => *n != 0.0,
            CellValue::Bool(b) => *b,
            CellValue::Error(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::String(s) => write!(f, "{}", s),
            CellValue::Number(n) | CellValue::DateTime(n) => write!(f, "{}", format_number(*n)),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Error(e) => write!(f, "{}", e),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<u32> for CellValue {
    fn from(value: u32) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<calamine::Data> for CellValue {
    fn from(value: calamine::Data) -> Self {
        CellValue::from(&value)
    }
}

impl From<&calamine::Data> for CellValue {
    fn from(value: &calamine::Data) -> Self {
        use calamine::Data;

        match value {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::String(s.clone()),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => CellValue::DateTime(dt.as_f64()),
            Data::DateTimeIso(s) => CellValue::String(s.clone()),
            Data::DurationIso(s) => CellValue::String(s.clone()),
            Data::Error(e) => CellValue::Error(e.to_string()),
        }
    }
}

/// Render a float the way a spreadsheet shows a general-format number:
/// integral values lose the fractional part
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

/// A 1-based cell coordinate (row 1 / column 1 is `A1`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse an A1-style reference; `$` anchors are ignored
    pub fn parse(reference: &str) -> Option<Self> {
        let reference = reference.replace('$', "");
        let split = reference.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = reference.split_at(split);
        let col = parse_column(letters)?;
        let row: u32 = digits.parse().ok()?;
        (row > 0).then_some(Self { row, col })
    }
}

impl std::fmt::Display for CellRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row)
    }
}

/// Convert a 1-based column number to letters: 1 -> "A", 27 -> "AA"
pub fn column_letters(col: u32) -> String {
    let mut n = col;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Parse column letters back to a 1-based column number
pub fn parse_column(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A') as u32 + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }
    Some(col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(702), "ZZ");
        assert_eq!(parse_column("AA"), Some(27));
        assert_eq!(parse_column("e"), Some(5));
        assert_eq!(parse_column("A1"), None);
    }

    #[test]
    fn test_parse_cell_reference() {
        assert_eq!(CellRef::parse("B5"), Some(CellRef::new(5, 2)));
        assert_eq!(CellRef::parse("$AA$10"), Some(CellRef::new(10, 27)));
        assert_eq!(CellRef::parse("A0"), None);
        assert_eq!(CellRef::parse("17"), None);
        assert_eq!(CellRef::parse("C"), None);
    }

    #[test]
    fn test_display_renders_integral_numbers_without_fraction() {
        assert_eq!(CellValue::Number(1234.0).to_string(), "1234");
        assert_eq!(CellValue::Number(1234.5).to_string(), "1234.5");
        assert_eq!(CellValue::Empty.to_string(), "");
        assert_eq!(CellRef::new(5, 2).to_string(), "B5");
    }

    #[test]
    fn test_blank_and_truthy() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::text("").is_blank());
        assert!(!CellValue::text(" ").is_blank());
        assert!(CellValue::text("  ").is_blank_trimmed());
        assert!(!CellValue::Number(0.0).is_truthy());
        assert!(CellValue::text("Alice").is_truthy());
    }
}
