//! Writing rendered files to the output directory.
//!
//! Content hashes (blake3) of written files are remembered so unchanged files
//! are not rewritten. Writes go through a temporary sibling that is renamed
//! into place; a reader never sees a half-written page.

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::OutputFile;

/// Output directory writer with content-hash freshness.
#[derive(Debug)]
pub struct OutputWriter {
    root: PathBuf,
    hashes: FxHashMap<PathBuf, blake3::Hash>,
}

impl OutputWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            hashes: FxHashMap::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `file` unless the output already has identical content.
    ///
    /// Returns whether the file was written.
    pub fn write(&mut self, file: &OutputFile) -> Result<bool> {
        let target = self.root.join(&file.path);
        let hash = blake3::hash(file.body.as_bytes());

        let known = match self.hashes.get(&file.path) {
            Some(known) => Some(*known),
            None => fs::read(&target).ok().map(|bytes| blake3::hash(&bytes)),
        };
        if known == Some(hash) && target.is_file() {
            self.hashes.insert(file.path.clone(), hash);
            return Ok(false);
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create `{}`", parent.display()))?;
        }
        let tmp = temp_sibling(&target);
        fs::write(&tmp, file.body.as_bytes())
            .with_context(|| format!("failed to write `{}`", tmp.display()))?;
        fs::rename(&tmp, &target)
            .with_context(|| format!("failed to replace `{}`", target.display()))?;

        self.hashes.insert(file.path.clone(), hash);
        Ok(true)
    }

    /// Remove a previously written file. Missing files are not an error.
    pub fn remove(&mut self, path: &Path) -> Result<()> {
        self.hashes.remove(path);
        let target = self.root.join(path);
        match fs::remove_file(&target) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to remove `{}`", target.display()));
            }
        }

        // Drop directories emptied by the removal, up to the output root.
        let mut dir = target.parent();
        while let Some(current) = dir {
            if current == self.root || fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }
        Ok(())
    }
}

fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.kiln-tmp"))
}
