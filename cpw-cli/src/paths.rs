//! Directory derivation for the CPW package layout
//!
//! ```text
//! <root>/
//!   01 Data Processing/Project Financial Plan (PFP)/
//!     Raw Data/<raw extract>.xlsx
//!     Project Plan Analysis-continuous.xlsx
//!     OLD PFP/Project Plan Analysis-continuous-YYYY-MM-DD.xlsx
//!     NEW PFP/New_PFP_YYYY-MM-DD.xlsx
//!   02 GBA Workbooks/CPW Tool_<GBA>_Main.xlsm
//!   03 Department Workbooks/CPW Tool_<Team>_Team.xlsm
//! ```

use std::path::{Component, Path, PathBuf};

use chrono::NaiveDate;

pub const CONTINUOUS_SNAPSHOT: &str = "Project Plan Analysis-continuous.xlsx";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    AnchorNotFound { anchor: String, path: PathBuf },
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::AnchorNotFound { anchor, path } => write!(
                f,
                "Could not find '{}' folder in path: {}",
                anchor,
                path.display()
            ),
        }
    }
}

impl std::error::Error for PathError {}

/// Root directory derived from where `anchor` appears in `source`.
///
/// The path text is cut right after the first occurrence of `anchor`, then
/// `trim` trailing characters are dropped. With the default trims that
/// removes the anchor folder and its leading separator, so the anchor must
/// sit exactly one level below the root. If trimming consumes the whole
/// prefix, the parent of the prefix is used instead.
pub fn derive_from_anchor(source: &Path, anchor: &str, trim: usize) -> Result<PathBuf, PathError> {
    let text = source.to_string_lossy();
    let at = text.find(anchor).ok_or_else(|| PathError::AnchorNotFound {
        anchor: anchor.to_string(),
        path: source.to_path_buf(),
    })?;

    let prefix = &text[..at + anchor.len()];
    let keep = prefix.chars().count().saturating_sub(trim);
    let derived = if keep == 0 {
        Path::new(prefix)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    } else {
        PathBuf::from(prefix.chars().take(keep).collect::<String>())
    };

    if let Some(expected) = parent_of_component(source, anchor) {
        if expected != derived {
            log::warn!(
                "Derived root {} differs from the folder containing '{}' ({}); \
                 check the trim length",
                derived.display(),
                anchor,
                expected.display()
            );
        }
    }

    Ok(derived)
}

/// Directory holding the first path component named exactly `anchor`
fn parent_of_component(source: &Path, anchor: &str) -> Option<PathBuf> {
    let mut root = PathBuf::new();
    for component in source.components() {
        if let Component::Normal(name) = component {
            if name == anchor {
                return Some(root);
            }
        }
        root.push(component.as_os_str());
    }
    None
}

/// Strip whitespace and the quotes Explorer's "Copy as path" adds
pub fn clean_path(input: &str) -> PathBuf {
    PathBuf::from(input.trim().trim_matches('"').trim_matches('\''))
}

/// Replace characters Windows forbids in file names with `_`
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Folder layout around one PFP extract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PfpLayout {
    pub pfp_folder: PathBuf,
}

impl PfpLayout {
    /// `raw` lives in `<pfp>/Raw Data/`
    pub fn from_raw_file(raw: &Path) -> Self {
        let raw_data = raw.parent().unwrap_or(Path::new(""));
        Self::from_pfp_folder(raw_data.parent().unwrap_or(Path::new("")))
    }

    pub fn from_pfp_folder(pfp_folder: &Path) -> Self {
        Self {
            pfp_folder: pfp_folder.to_path_buf(),
        }
    }

    /// Unique-coded, uncleaned copy of the latest extract
    pub fn continuous_snapshot(&self) -> PathBuf {
        self.pfp_folder.join(CONTINUOUS_SNAPSHOT)
    }

    pub fn old_pfp_folder(&self, folder_name: &str) -> PathBuf {
        self.pfp_folder.join(folder_name)
    }

    /// Dated cleaned snapshot in the OLD PFP folder
    pub fn cleaned_snapshot(&self, folder_name: &str, date: NaiveDate) -> PathBuf {
        self.old_pfp_folder(folder_name).join(format!(
            "Project Plan Analysis-continuous-{}.xlsx",
            date.format("%Y-%m-%d")
        ))
    }
}

/// Delta file, in a `new_folder` sibling of the folder holding `previous`
pub fn delta_snapshot(previous: &Path, new_folder: &str, date: NaiveDate) -> PathBuf {
    let old_folder = previous.parent().unwrap_or(Path::new(""));
    let base = old_folder.parent().unwrap_or(Path::new(""));
    base.join(new_folder)
        .join(format!("New_PFP_{}.xlsx", date.format("%Y-%m-%d")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = concat!(
        "/data/BA/CPW FINAL PACKAGE/01 Data Processing/",
        "Project Financial Plan (PFP)/Raw Data/file.xlsx"
    );

    #[test]
    fn test_derive_gba_root() {
        let root = derive_from_anchor(Path::new(RAW), "01 Data Processing", 19).unwrap();
        assert_eq!(root, PathBuf::from("/data/BA/CPW FINAL PACKAGE"));
    }

    #[test]
    fn test_derive_team_root() {
        let gba =
            Path::new("/data/BA/CPW FINAL PACKAGE/02 GBA Workbooks/CPW Tool_Mobility_Main.xlsm");
        let root = derive_from_anchor(gba, "02 GBA Workbooks", 17).unwrap();
        assert_eq!(root, PathBuf::from("/data/BA/CPW FINAL PACKAGE"));
    }

    #[test]
    fn test_derive_missing_anchor() {
        let path = Path::new("/data/elsewhere/file.xlsx");
        let err = derive_from_anchor(path, "01 Data Processing", 19).unwrap_err();
        assert!(matches!(err, PathError::AnchorNotFound { .. }));
    }

    #[test]
    fn test_derive_keeps_fixed_trim_output() {
        // The anchor matches inside a longer folder name; the char trim wins
        let path = Path::new("/x/A01 Data Processing/f.xlsx");
        let root = derive_from_anchor(path, "01 Data Processing", 19).unwrap();
        assert_eq!(root, PathBuf::from("/x/"));
    }

    #[test]
    fn test_derive_falls_back_to_parent_when_trim_consumes_prefix() {
        let path = Path::new("01 Data Processing/f.xlsx");
        let root = derive_from_anchor(path, "01 Data Processing", 19).unwrap();
        assert_eq!(root, PathBuf::new());
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path("  \"C:\\PFP\\file.xlsx\" "), PathBuf::from("C:\\PFP\\file.xlsx"));
        assert_eq!(clean_path("'/tmp/a.xlsx'"), PathBuf::from("/tmp/a.xlsx"));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("Rail / Track: Ops?"), "Rail _ Track_ Ops_");
        assert_eq!(sanitize_file_name(" Places "), "Places");
    }

    #[test]
    fn test_pfp_layout() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let layout = PfpLayout::from_raw_file(Path::new(RAW));
        let pfp = "/data/BA/CPW FINAL PACKAGE/01 Data Processing/Project Financial Plan (PFP)";

        assert_eq!(layout.continuous_snapshot(), Path::new(pfp).join(CONTINUOUS_SNAPSHOT));
        assert_eq!(
            layout.cleaned_snapshot("OLD PFP", date),
            Path::new(pfp).join("OLD PFP/Project Plan Analysis-continuous-2025-03-07.xlsx")
        );

        let previous = layout.cleaned_snapshot("OLD PFP", date);
        assert_eq!(
            delta_snapshot(&previous, "NEW PFP", date),
            Path::new(pfp).join("NEW PFP/New_PFP_2025-03-07.xlsx")
        );
    }
}
