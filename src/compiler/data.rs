//! Data directory loading.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;

use super::{DataSet, collect_files};
use crate::core::FileCategory;
use crate::utils::path::relative_slash_path;

/// Parse every `*.json` file under `dir` into a [`DataSet`].
///
/// Keys are the file path relative to `dir` without extension, with `/`
/// replaced by `.` (`data/menu/main.json` → `menu.main`). A missing
/// directory yields an empty set.
pub fn load_data(dir: &Path, root: &Path) -> Result<DataSet> {
    let mut data = DataSet::default();
    for path in collect_files(dir, FileCategory::is_data_file)? {
        let display = relative_slash_path(&path, root).unwrap_or_else(|| path.display().to_string());
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read data file `{display}`"))?;
        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse data file `{display}`"))?;

        data.files.insert(data_key(&path, dir), value);
    }

    Ok(data)
}

fn data_key(path: &Path, dir: &Path) -> String {
    let stem = path.with_extension("");
    relative_slash_path(&stem, dir)
        .unwrap_or_default()
        .replace('/', ".")
}
