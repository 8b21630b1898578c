//! One rebuild: plan, invalidate, render stage by stage, then commit or
//! carry the failure into the next attempt.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use arc_swap::ArcSwap;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

use super::BuildError;
use crate::actor::messages::{BuildKind, BuildOutcome};
use crate::compiler::{
    Artifact, ArtifactId, ArtifactStore, DependencyIndex, OutputWriter, RenderContext, Rendered,
    Renderer,
};
use crate::config::SiteConfig;
use crate::reload::RebuildRequest;

const INTERRUPTED: &str = "build interrupted by shutdown";
const SKIPPED: &str = "skipped: an earlier artifact of this build failed";

/// Incremental build state. Only one rebuild runs at a time.
pub struct Builder {
    renderer: Arc<dyn Renderer>,
    store: ArtifactStore,
    /// Index of the last good generation, swapped in on success
    index: Arc<ArcSwap<DependencyIndex>>,
    writer: Option<OutputWriter>,
    /// Output file each artifact last wrote
    outputs: FxHashMap<ArtifactId, PathBuf>,
    /// Last good generation
    generation: u64,
    /// Artifacts whose latest render never reached the output directory
    failed: BTreeSet<ArtifactId>,
    /// A full rebuild failed; the next one must be full too
    needs_full: bool,
    token: CancellationToken,
}

/// What a rebuild will touch.
struct Plan {
    kind: BuildKind,
    index: DependencyIndex,
    targets: BTreeSet<ArtifactId>,
    removed: Vec<ArtifactId>,
}

impl Builder {
    pub fn new(renderer: Arc<dyn Renderer>, token: CancellationToken) -> Self {
        Self {
            renderer,
            store: ArtifactStore::new(),
            index: Arc::new(ArcSwap::from_pointee(DependencyIndex::new())),
            writer: None,
            outputs: FxHashMap::default(),
            generation: 0,
            failed: BTreeSet::new(),
            needs_full: false,
            token,
        }
    }

    /// Last good generation (0 before the first success).
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Dependency index of the last good generation.
    pub fn index(&self) -> Arc<DependencyIndex> {
        self.index.load_full()
    }

    pub fn failed(&self) -> &BTreeSet<ArtifactId> {
        &self.failed
    }

    pub fn needs_full(&self) -> bool {
        self.needs_full
    }

    /// Run one rebuild for `request` against `config`.
    pub fn rebuild(&mut self, config: &SiteConfig, request: &RebuildRequest) -> BuildOutcome {
        let started = Instant::now();
        let kind = if request.is_full() || self.needs_full {
            BuildKind::Full
        } else {
            BuildKind::Partial
        };

        let plan = match self.plan(config, request, kind) {
            Ok(plan) => plan,
            Err(err) => return self.fail(kind, format!("{err:#}"), started),
        };

        if plan.kind == BuildKind::Partial && plan.targets.is_empty() && plan.removed.is_empty() {
            crate::debug!("build"; "nothing depends on the changed paths");
            return BuildOutcome {
                generation: self.generation,
                kind: plan.kind,
                error: None,
                affected: Vec::new(),
                written: 0,
                removed: 0,
                output_root: config.build.output.clone(),
                elapsed: started.elapsed(),
            };
        }

        self.execute(config, plan, started)
    }

    /// Record a failure that happened outside rendering (config reload,
    /// discovery, a panicked worker).
    pub fn fail(&mut self, kind: BuildKind, message: String, started: Instant) -> BuildOutcome {
        if kind == BuildKind::Full {
            self.needs_full = true;
        }
        BuildOutcome {
            generation: self.generation + 1,
            kind,
            error: Some(BuildError::Recoverable(message)),
            affected: Vec::new(),
            written: 0,
            removed: 0,
            output_root: self
                .writer
                .as_ref()
                .map(|writer| writer.root().to_path_buf())
                .unwrap_or_default(),
            elapsed: started.elapsed(),
        }
    }

    fn plan(
        &self,
        config: &SiteConfig,
        request: &RebuildRequest,
        kind: BuildKind,
    ) -> anyhow::Result<Plan> {
        let discovered: BTreeSet<ArtifactId> =
            self.renderer.discover(config)?.into_iter().collect();
        let known: BTreeSet<ArtifactId> = self.store.ids().into_iter().collect();
        let removed: Vec<ArtifactId> = known.difference(&discovered).cloned().collect();

        if kind == BuildKind::Full {
            // Start over: nothing recorded so far is trusted.
            return Ok(Plan {
                kind,
                index: DependencyIndex::new(),
                targets: discovered,
                removed,
            });
        }

        let index = DependencyIndex::clone(&self.index.load());
        let mut direct = match request {
            RebuildRequest::Partial(paths) => index.affected(paths.iter().map(PathBuf::as_path)),
            RebuildRequest::Full => BTreeSet::new(),
        };
        direct.extend(discovered.difference(&known).cloned());
        direct.extend(self.failed.iter().cloned());
        direct.extend(removed.iter().cloned());

        let mut targets = index.with_users(direct);
        targets.retain(|id| discovered.contains(id));

        Ok(Plan {
            kind,
            index,
            targets,
            removed,
        })
    }

    fn execute(&mut self, config: &SiteConfig, plan: Plan, started: Instant) -> BuildOutcome {
        let Plan {
            kind,
            mut index,
            targets,
            removed,
        } = plan;
        let generation = self.generation + 1;
        crate::debug!("build"; "{} rebuild #{}: {} artifacts", kind.name(), generation, targets.len());

        for id in &targets {
            self.store.get_or_create(id).invalidate();
        }

        let mut pending = targets.clone();
        let mut rendered: Vec<(ArtifactId, Artifact)> = Vec::with_capacity(targets.len());
        let mut failure: Option<String> = None;

        for stage in 0..ArtifactId::STAGES {
            if self.token.is_cancelled() {
                failure = Some(INTERRUPTED.to_string());
                break;
            }

            let ids: Vec<&ArtifactId> = targets.iter().filter(|id| id.stage() == stage).collect();
            let (renderer, store, token) = (&*self.renderer, &self.store, &self.token);
            let results: Vec<(ArtifactId, Rendered)> = ids
                .into_par_iter()
                .map(|id| (id.clone(), render_one(renderer, store, config, token, id, generation)))
                .collect();

            for (id, result) in results {
                index.record(&id, &result.reads);
                pending.remove(&id);
                let value = self.store.get_or_create(&id);
                match result.result {
                    Ok(artifact) => {
                        value.publish(Ok(artifact.clone()));
                        rendered.push((id, artifact));
                    }
                    Err(err) => {
                        let message = format!("{id}: {err:#}");
                        crate::debug!("build"; "{}", message);
                        value.publish(Err(Arc::new(err)));
                        failure.get_or_insert(message);
                    }
                }
            }

            // Later stages read this one; do not render them against errors.
            if failure.is_some() {
                break;
            }
        }

        if let Some(message) = failure {
            // Nobody may wait forever on a value this build will not produce.
            for id in &pending {
                if let Some(value) = self.store.get(id) {
                    value.publish(Err(Arc::new(anyhow!(SKIPPED))));
                }
            }
            return self.reject(kind, generation, targets, message, started);
        }

        match self.commit(config, &rendered, &removed, &mut index) {
            Ok((written, removed_files)) => {
                self.index.store(Arc::new(index));
                self.generation = generation;
                self.failed.clear();
                self.needs_full = false;
                BuildOutcome {
                    generation,
                    kind,
                    error: None,
                    affected: stage_ordered(targets),
                    written,
                    removed: removed_files,
                    output_root: config.build.output.clone(),
                    elapsed: started.elapsed(),
                }
            }
            Err(err) => self.reject(kind, generation, targets, format!("{err:#}"), started),
        }
    }

    /// Keep the previous generation and remember what must be retried.
    fn reject(
        &mut self,
        kind: BuildKind,
        generation: u64,
        targets: BTreeSet<ArtifactId>,
        message: String,
        started: Instant,
    ) -> BuildOutcome {
        if kind == BuildKind::Full {
            self.needs_full = true;
        }
        self.failed.extend(targets.iter().cloned());
        BuildOutcome {
            generation,
            kind,
            error: Some(BuildError::Recoverable(message)),
            affected: stage_ordered(targets),
            written: 0,
            removed: 0,
            output_root: self
                .writer
                .as_ref()
                .map(|writer| writer.root().to_path_buf())
                .unwrap_or_default(),
            elapsed: started.elapsed(),
        }
    }

    /// Write changed files and drop removed artifacts.
    fn commit(
        &mut self,
        config: &SiteConfig,
        rendered: &[(ArtifactId, Artifact)],
        removed: &[ArtifactId],
        index: &mut DependencyIndex,
    ) -> anyhow::Result<(usize, usize)> {
        if self.writer.as_ref().map(OutputWriter::root) != Some(config.build.output.as_path()) {
            self.outputs.clear();
            self.writer = None;
        }
        let writer = self
            .writer
            .get_or_insert_with(|| OutputWriter::new(config.build.output.clone()));

        let mut written = 0;
        for (id, artifact) in rendered {
            let Some(file) = artifact.as_file() else {
                continue;
            };
            if writer.write(file)? {
                written += 1;
            }
            if let Some(old) = self.outputs.insert(id.clone(), file.path.clone())
                && old != file.path
            {
                writer.remove(&old)?;
            }
        }

        let mut removed_files = 0;
        for id in removed {
            self.store.remove(id);
            index.remove_artifact(id);
            if let Some(path) = self.outputs.remove(id) {
                writer.remove(&path)?;
                removed_files += 1;
            }
            crate::debug!("build"; "removed {}", id);
        }

        Ok((written, removed_files))
    }
}

fn render_one(
    renderer: &dyn Renderer,
    store: &ArtifactStore,
    config: &SiteConfig,
    token: &CancellationToken,
    id: &ArtifactId,
    generation: u64,
) -> Rendered {
    if token.is_cancelled() {
        return Rendered::err(anyhow!(INTERRUPTED), Vec::new());
    }
    let ctx = RenderContext::new(config, store, generation);
    let mut rendered = renderer.render(id, &ctx);
    rendered.reads.extend(ctx.take_reads());
    rendered
}

fn stage_ordered(ids: BTreeSet<ArtifactId>) -> Vec<ArtifactId> {
    let mut ids: Vec<_> = ids.into_iter().collect();
    ids.sort_by_key(ArtifactId::stage);
    ids
}
