//! Dependency tracking for incremental builds.
//!
//! `DependencyIndex` maps inputs to the artifacts derived from them:
//! - exact source paths (`content/blog/post.md`)
//! - path prefixes, for directory classes (`data/` → anything under it)
//! - other artifacts, so a changed aggregate reaches every reader
//!
//! The coordinator never mutates the live index. It clones, updates the
//! clone during a build, and swaps it in after a successful generation.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::ArtifactId;

/// Something an artifact read while rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
    /// A single file.
    File(PathBuf),
    /// Every path under a directory.
    Prefix(PathBuf),
    /// Another artifact's published value.
    Artifact(ArtifactId),
}

type IdSet = FxHashSet<ArtifactId>;

/// Reverse index from inputs to artifacts, with a forward map kept in sync.
///
/// # Invariants
/// - Forward and reverse mappings are always consistent
/// - Self-references are excluded
/// - Paths are stored as given; callers pass normalized paths
#[derive(Debug, Default, Clone)]
pub struct DependencyIndex {
    /// Forward: artifact → everything it read
    forward: FxHashMap<ArtifactId, FxHashSet<Dependency>>,
    /// Reverse: exact file → artifacts
    files: FxHashMap<PathBuf, IdSet>,
    /// Reverse: directory → artifacts
    prefixes: FxHashMap<PathBuf, IdSet>,
    /// Reverse: artifact → artifacts that read it
    users: FxHashMap<ArtifactId, IdSet>,
}

impl DependencyIndex {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the full dependency set of `artifact`.
    pub fn record(&mut self, artifact: &ArtifactId, reads: &[Dependency]) {
        self.remove_artifact(artifact);
        for dep in reads {
            self.insert(artifact, dep.clone());
        }
    }

    /// Register an exact path. Idempotent.
    pub fn record_dependency(&mut self, path: &Path, artifact: &ArtifactId) {
        self.insert(artifact, Dependency::File(path.to_path_buf()));
    }

    /// Register a directory class. Idempotent.
    pub fn record_prefix(&mut self, dir: &Path, artifact: &ArtifactId) {
        self.insert(artifact, Dependency::Prefix(dir.to_path_buf()));
    }

    /// Artifacts affected by `changed` paths, including transitive readers.
    pub fn affected<'a>(&self, changed: impl IntoIterator<Item = &'a Path>) -> BTreeSet<ArtifactId> {
        let mut direct = BTreeSet::new();

        for path in changed {
            if let Some(ids) = self.files.get(path) {
                direct.extend(ids.iter().cloned());
            }
            // a path counts as under itself, so a removed directory matches too
            for dir in path.ancestors() {
                if let Some(ids) = self.prefixes.get(dir) {
                    direct.extend(ids.iter().cloned());
                }
            }
        }

        self.with_users(direct)
    }

    /// `ids` plus every artifact that transitively reads one of them.
    pub fn with_users(&self, ids: BTreeSet<ArtifactId>) -> BTreeSet<ArtifactId> {
        let mut result = ids;
        let mut stack: Vec<ArtifactId> = result.iter().cloned().collect();

        while let Some(id) = stack.pop() {
            let Some(readers) = self.users.get(&id) else {
                continue;
            };
            for reader in readers {
                if result.insert(reader.clone()) {
                    stack.push(reader.clone());
                }
            }
        }
        result
    }

    /// Dependencies recorded for `artifact`.
    #[inline]
    pub fn uses(&self, artifact: &ArtifactId) -> Option<&FxHashSet<Dependency>> {
        self.forward.get(artifact)
    }

    /// Artifacts registered on exactly `path`.
    #[inline]
    pub fn used_by(&self, path: &Path) -> Option<&IdSet> {
        self.files.get(path)
    }

    /// Number of artifacts with recorded dependencies.
    #[inline]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Clear all mappings.
    pub fn clear(&mut self) {
        self.forward.clear();
        self.files.clear();
        self.prefixes.clear();
        self.users.clear();
    }

    /// Drop an artifact and clean up its reverse mappings.
    ///
    /// Artifacts that read it keep their forward entry; it is replaced the
    /// next time they render.
    pub fn remove_artifact(&mut self, artifact: &ArtifactId) {
        let Some(old) = self.forward.remove(artifact) else {
            return;
        };

        for dep in old {
            match &dep {
                Dependency::File(path) => remove_from(&mut self.files, path, artifact),
                Dependency::Prefix(dir) => remove_from(&mut self.prefixes, dir, artifact),
                Dependency::Artifact(id) => remove_from(&mut self.users, id, artifact),
            }
        }
    }

    // -------------------------------------------------------------------------
    // Private
    // -------------------------------------------------------------------------

    fn insert(&mut self, artifact: &ArtifactId, dep: Dependency) {
        match &dep {
            Dependency::Artifact(id) if id == artifact => return,
            Dependency::Artifact(id) => {
                self.users
                    .entry(id.clone())
                    .or_default()
                    .insert(artifact.clone());
            }
            Dependency::File(path) => {
                self.files
                    .entry(path.clone())
                    .or_default()
                    .insert(artifact.clone());
            }
            Dependency::Prefix(dir) => {
                self.prefixes
                    .entry(dir.clone())
                    .or_default()
                    .insert(artifact.clone());
            }
        }
        self.forward.entry(artifact.clone()).or_default().insert(dep);
    }
}

/// Remove `artifact` from `map[key]`, dropping the key once empty.
fn remove_from<K>(map: &mut FxHashMap<K, IdSet>, key: &K, artifact: &ArtifactId)
where
    K: std::hash::Hash + Eq,
{
    if let Some(ids) = map.get_mut(key) {
        ids.remove(artifact);
        if ids.is_empty() {
            map.remove(key);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    fn page(s: &str) -> ArtifactId {
        ArtifactId::Page(path(s))
    }

    fn affected(index: &DependencyIndex, paths: &[&str]) -> Vec<ArtifactId> {
        let paths: Vec<PathBuf> = paths.iter().map(|p| path(p)).collect();
        index
            .affected(paths.iter().map(PathBuf::as_path))
            .into_iter()
            .collect()
    }

    mod dependency_index {
        use super::*;

        #[test]
        fn new_index_is_empty() {
            let index = DependencyIndex::new();
            assert!(index.is_empty());
            assert!(affected(&index, &["/site/content/a.md"]).is_empty());
        }

        #[test]
        fn exact_match() {
            let mut index = DependencyIndex::new();
            index.record_dependency(&path("/site/content/a.md"), &page("a.md"));

            assert_eq!(affected(&index, &["/site/content/a.md"]), vec![page("a.md")]);
            assert!(affected(&index, &["/site/content/b.md"]).is_empty());
        }

        #[test]
        fn prefix_match() {
            let mut index = DependencyIndex::new();
            index.record_prefix(&path("/site/data"), &ArtifactId::Data);

            assert_eq!(
                affected(&index, &["/site/data/nested/values.json"]),
                vec![ArtifactId::Data]
            );
            assert!(affected(&index, &["/site/database.json"]).is_empty());
        }

        #[test]
        fn idempotent_registration() {
            let mut index = DependencyIndex::new();
            let file = path("/site/content/a.md");
            index.record_dependency(&file, &page("a.md"));
            index.record_dependency(&file, &page("a.md"));

            assert_eq!(index.used_by(&file).unwrap().len(), 1);
            assert_eq!(index.uses(&page("a.md")).unwrap().len(), 1);
        }

        #[test]
        fn transitive_readers() {
            let mut index = DependencyIndex::new();
            index.record(&ArtifactId::Data, &[Dependency::Prefix(path("/site/data"))]);
            index.record(
                &ArtifactId::Home,
                &[Dependency::Artifact(ArtifactId::Data), Dependency::File(path("/site/layouts/index.html"))],
            );
            index.record(&page("a.md"), &[Dependency::File(path("/site/content/a.md"))]);

            let result = affected(&index, &["/site/data/testdata.json"]);
            assert_eq!(result, vec![ArtifactId::Data, ArtifactId::Home]);
        }

        #[test]
        fn self_reference_excluded() {
            let mut index = DependencyIndex::new();
            index.record(&ArtifactId::Pages, &[Dependency::Artifact(ArtifactId::Pages)]);

            assert!(index.uses(&ArtifactId::Pages).is_none());
            assert!(index.with_users(BTreeSet::from([ArtifactId::Pages])).len() == 1);
        }

        #[test]
        fn update_replaces_old_dependencies() {
            let mut index = DependencyIndex::new();
            let old = path("/site/layouts/old.html");
            let new = path("/site/layouts/new.html");

            index.record(&ArtifactId::Home, &[Dependency::File(old.clone())]);
            index.record(&ArtifactId::Home, &[Dependency::File(new.clone())]);

            assert!(index.used_by(&old).is_none());
            assert!(index.used_by(&new).unwrap().contains(&ArtifactId::Home));
        }

        #[test]
        fn remove_artifact_cleans_reverse_maps() {
            let mut index = DependencyIndex::new();
            index.record(
                &page("a.md"),
                &[
                    Dependency::File(path("/site/content/a.md")),
                    Dependency::Artifact(ArtifactId::Data),
                ],
            );

            index.remove_artifact(&page("a.md"));

            assert!(index.is_empty());
            assert!(affected(&index, &["/site/content/a.md"]).is_empty());
            assert!(index.with_users(BTreeSet::from([ArtifactId::Data])).len() == 1);
        }

        #[test]
        fn clear_removes_all() {
            let mut index = DependencyIndex::new();
            index.record_prefix(&path("/site/data"), &ArtifactId::Data);
            index.record_dependency(&path("/site/content/a.md"), &page("a.md"));

            index.clear();

            assert!(index.is_empty());
            assert!(affected(&index, &["/site/data/x.json", "/site/content/a.md"]).is_empty());
        }

        #[test]
        fn unrelated_change_yields_nothing() {
            let mut index = DependencyIndex::new();
            index.record_dependency(&path("/site/content/a.md"), &page("a.md"));
            assert!(affected(&index, &["/site/static/logo.png"]).is_empty());
        }
    }
}
