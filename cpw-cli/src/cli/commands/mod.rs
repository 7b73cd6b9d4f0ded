//! Operator commands, one submodule per action group

pub mod delta;
pub mod export;
pub mod pfp;

use std::path::PathBuf;

use crate::paths::clean_path;

/// Accept paths pasted from Explorer's "Copy as path"
fn operator_path(raw: &str) -> anyhow::Result<PathBuf> {
    let path = clean_path(raw);
    if !path.is_file() {
        anyhow::bail!("File does not exist: {}", path.display());
    }
    Ok(path)
}
