//! Rendering for static site generation.
//!
//! - [`Renderer`]: the collaborator the build coordinator drives
//! - [`SiteRenderer`]: default implementation over `content/`, `data/`, `layouts/`
//! - [`DependencyIndex`], [`ArtifactStore`], [`OutputWriter`]: incremental state

mod artifact;
mod content;
mod data;
pub mod dependency;
mod layout;
mod output;
mod site;
mod store;

pub use artifact::{Artifact, ArtifactId, DataSet, OutputFile, PageSummary};
pub use dependency::{Dependency, DependencyIndex};
pub use output::OutputWriter;
pub use site::SiteRenderer;
pub use store::ArtifactStore;

use anyhow::{Context, Result, anyhow};
use jwalk::{Parallelism, WalkDir};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SiteConfig;
use crate::utils::path::is_temp_file;

/// Upper bound for waiting on an aggregate of the current generation.
///
/// Aggregates are published before pages render, so this only matters if a
/// caller renders out of stage order.
const AGGREGATE_WAIT: Duration = Duration::from_secs(30);

/// Produces artifacts for the build coordinator.
pub trait Renderer: Send + Sync {
    /// Every root artifact of a full build.
    fn discover(&self, config: &SiteConfig) -> Result<Vec<ArtifactId>>;

    /// Render one artifact. Never panics on bad input; errors go in the result.
    fn render(&self, id: &ArtifactId, ctx: &RenderContext<'_>) -> Rendered;
}

/// Result of [`Renderer::render`] plus what the render read.
pub struct Rendered {
    pub result: Result<Artifact>,
    pub reads: Vec<Dependency>,
}

impl Rendered {
    pub fn ok(artifact: Artifact, reads: Vec<Dependency>) -> Self {
        Self {
            result: Ok(artifact),
            reads,
        }
    }

    pub fn err(error: anyhow::Error, reads: Vec<Dependency>) -> Self {
        Self {
            result: Err(error),
            reads,
        }
    }
}

/// What a render may look at.
///
/// Aggregate reads are recorded so the dependency index sees them even when
/// the renderer does not list them itself.
pub struct RenderContext<'a> {
    pub config: &'a SiteConfig,
    pub generation: u64,
    store: &'a ArtifactStore,
    reads: RefCell<Vec<Dependency>>,
}

impl<'a> RenderContext<'a> {
    pub fn new(config: &'a SiteConfig, store: &'a ArtifactStore, generation: u64) -> Self {
        Self {
            config,
            generation,
            store,
            reads: RefCell::new(Vec::new()),
        }
    }

    /// Published value of another artifact of this generation.
    pub fn aggregate(&self, id: &ArtifactId) -> Result<Artifact> {
        self.reads.borrow_mut().push(Dependency::Artifact(id.clone()));

        let value = self
            .store
            .get(id)
            .ok_or_else(|| anyhow!("`{id}` is not part of this build"))?;
        match value.get_timeout(AGGREGATE_WAIT) {
            Some(Ok(artifact)) => Ok(artifact),
            Some(Err(err)) => Err(anyhow!("`{id}` failed: {err:#}")),
            None => Err(anyhow!("timed out waiting for `{id}`")),
        }
    }

    pub fn data(&self) -> Result<Arc<DataSet>> {
        match self.aggregate(&ArtifactId::Data)? {
            Artifact::Data(data) => Ok(data),
            _ => Err(anyhow!("`data` has an unexpected payload")),
        }
    }

    pub fn pages(&self) -> Result<Arc<Vec<PageSummary>>> {
        match self.aggregate(&ArtifactId::Pages)? {
            Artifact::Pages(pages) => Ok(pages),
            _ => Err(anyhow!("`pages` has an unexpected payload")),
        }
    }

    /// Aggregate reads made through this context.
    pub fn take_reads(&self) -> Vec<Dependency> {
        std::mem::take(&mut *self.reads.borrow_mut())
    }
}

const IGNORED_FILES: &[&str] = &[".DS_Store"];

/// Collect files under `dir` accepted by `filter`, sorted, skipping editor artifacts.
///
/// A missing directory has no files. The walk is serial: callers already run
/// on the rayon pool, and a parallel walk there can time out.
pub fn collect_files(dir: &Path, filter: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).parallelism(Parallelism::Serial) {
        let entry = entry.with_context(|| format!("failed to walk `{}`", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_str().unwrap_or_default();
        if IGNORED_FILES.contains(&name) {
            continue;
        }
        let path = entry.path();
        if !is_temp_file(&path) && filter(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
