//! Default renderer over `content/`, `data/` and `layouts/`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::content::{PageSource, page_output_path, page_url};
use super::data::load_data;
use super::layout::{Layout, LayoutKind, Vars};
use super::{
    Artifact, ArtifactId, Dependency, OutputFile, PageSummary, RenderContext, Rendered, Renderer,
    collect_files,
};
use crate::config::{BuildMode, SiteConfig};
use crate::core::FileCategory;

/// Renders markdown pages and JSON data through HTML layouts.
#[derive(Debug, Default, Clone, Copy)]
pub struct SiteRenderer;

impl Renderer for SiteRenderer {
    fn discover(&self, config: &SiteConfig) -> Result<Vec<ArtifactId>> {
        let mut ids = vec![
            ArtifactId::Data,
            ArtifactId::Pages,
            ArtifactId::Home,
            ArtifactId::NotFound,
        ];
        ids.extend(page_sources(config)?.into_iter().map(ArtifactId::Page));
        Ok(ids)
    }

    fn render(&self, id: &ArtifactId, ctx: &RenderContext<'_>) -> Rendered {
        let mut reads = Vec::new();
        let result = match id {
            ArtifactId::Data => render_data(ctx.config, &mut reads),
            ArtifactId::Pages => render_pages(ctx.config, &mut reads),
            ArtifactId::Home => render_home(ctx, &mut reads),
            ArtifactId::Page(source) => render_page(ctx, source, &mut reads),
            ArtifactId::NotFound => render_not_found(ctx, &mut reads),
        };
        Rendered { result, reads }
    }
}

/// Content pages relative to the content directory. Drafts are skipped in
/// production.
fn page_sources(config: &SiteConfig) -> Result<Vec<PathBuf>> {
    let content = &config.build.content;
    let sources = collect_files(content, FileCategory::is_page_file)?
        .into_iter()
        .filter(|path| {
            config.build.mode == BuildMode::Development
                || PageSource::read(path).map_or(true, |page| !page.meta.draft)
        })
        .filter_map(|path| path.strip_prefix(content).ok().map(Path::to_path_buf))
        .collect();
    Ok(sources)
}

fn render_data(config: &SiteConfig, reads: &mut Vec<Dependency>) -> Result<Artifact> {
    reads.push(Dependency::Prefix(config.build.data.clone()));
    let data = load_data(&config.build.data, config.get_root())?;
    Ok(Artifact::Data(Arc::new(data)))
}

fn render_pages(config: &SiteConfig, reads: &mut Vec<Dependency>) -> Result<Artifact> {
    let content = &config.build.content;
    reads.push(Dependency::Prefix(content.clone()));

    let mut pages = Vec::new();
    for source in page_sources(config)? {
        let page = PageSource::read(&content.join(&source))?;
        pages.push(PageSummary {
            title: page.title(&source),
            url: page_url(&source),
            weight: page.meta.weight,
            source,
        });
    }
    pages.sort_by(|a, b| {
        (a.weight, &a.title, &a.url).cmp(&(b.weight, &b.title, &b.url))
    });

    Ok(Artifact::Pages(Arc::new(pages)))
}

fn render_home(ctx: &RenderContext<'_>, reads: &mut Vec<Dependency>) -> Result<Artifact> {
    let title = ctx.config.site.title.as_str();
    let html = render_layout(ctx, LayoutKind::Home, title, "", reads)?;
    Ok(file("index.html", html))
}

fn render_page(
    ctx: &RenderContext<'_>,
    source: &Path,
    reads: &mut Vec<Dependency>,
) -> Result<Artifact> {
    let path = ctx.config.build.content.join(source);
    reads.push(Dependency::File(path.clone()));

    let page = PageSource::read(&path)?;
    let title = page.title(source);
    let html = render_layout(ctx, LayoutKind::Page, &title, &page.to_html(), reads)
        .with_context(|| format!("failed to render `{}`", source.display()))?;
    Ok(file(page_output_path(source), html))
}

fn render_not_found(ctx: &RenderContext<'_>, reads: &mut Vec<Dependency>) -> Result<Artifact> {
    let html = render_layout(ctx, LayoutKind::NotFound, "Page not found", "", reads)?;
    Ok(file("404.html", html))
}

fn render_layout(
    ctx: &RenderContext<'_>,
    kind: LayoutKind,
    title: &str,
    content: &str,
    reads: &mut Vec<Dependency>,
) -> Result<String> {
    let config = ctx.config;
    let (layout, path) = Layout::load(kind, &config.build.layouts)?;
    reads.push(Dependency::File(path));

    let data = if layout.uses_data() { Some(ctx.data()?) } else { None };
    let pages = if layout.uses_pages() { Some(ctx.pages()?) } else { None };
    let base_url = config.base_url();

    Ok(layout.render(&Vars {
        site_title: &config.site.title,
        base_url: &base_url,
        title,
        content,
        mode: config.build.mode.as_str(),
        pages: pages.as_deref().map(Vec::as_slice),
        data: data.as_deref(),
    }))
}

fn file(path: impl Into<PathBuf>, html: String) -> Artifact {
    Artifact::File(OutputFile {
        path: path.into(),
        body: html.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ArtifactStore;
    use crate::config::Overrides;
    use std::fs;
    use tempfile::TempDir;

    fn site(files: &[(&str, &str)]) -> (TempDir, SiteConfig) {
        let dir = TempDir::new().unwrap();
        for (path, body) in files {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
        let config =
            SiteConfig::load_with(&dir.path().join("kiln.toml"), Overrides::default()).unwrap();
        (dir, config)
    }

    fn render_all(config: &SiteConfig, store: &ArtifactStore) -> Vec<(ArtifactId, Rendered)> {
        let mut ids = SiteRenderer.discover(config).unwrap();
        ids.sort_by_key(ArtifactId::stage);
        ids.into_iter()
            .map(|id| {
                let ctx = RenderContext::new(config, store, 1);
                let rendered = SiteRenderer.render(&id, &ctx);
                let published = match &rendered.result {
                    Ok(artifact) => Ok(artifact.clone()),
                    Err(err) => Err(Arc::new(anyhow::anyhow!("{err:#}"))),
                };
                store.get_or_create(&id).publish(published);
                (id, rendered)
            })
            .collect()
    }

    #[test]
    fn test_discover_lists_pages() {
        let (_dir, config) = site(&[
            ("kiln.toml", "[site]\ntitle = \"T\"\n"),
            ("content/a.md", "A"),
            ("content/blog/b.md", "B"),
            ("content/notes.txt", "not a page"),
        ]);
        let ids = SiteRenderer.discover(&config).unwrap();
        assert!(ids.contains(&ArtifactId::Page("a.md".into())));
        assert!(ids.contains(&ArtifactId::Page("blog/b.md".into())));
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn test_drafts_skipped_in_production() {
        let (_dir, config) = site(&[
            ("kiln.toml", "[build]\nmode = \"production\"\n"),
            ("content/a.md", "+++\ndraft = true\n+++\nA"),
            ("content/b.md", "B"),
        ]);
        let ids = SiteRenderer.discover(&config).unwrap();
        assert!(!ids.contains(&ArtifactId::Page("a.md".into())));
        assert!(ids.contains(&ArtifactId::Page("b.md".into())));
    }

    #[test]
    fn test_home_reads_data_and_records_dependencies() {
        let (dir, config) = site(&[
            ("kiln.toml", "[site]\ntitle = \"Hugo Rocks!\"\n"),
            (
                "layouts/index.html",
                "<h1>List: {{ site.title }}</h1>Environment: {{ mode }}<ul>{{#data.testdata}}<li>{{ key }}</li>{{/data.testdata}}</ul>",
            ),
            ("data/testdata.json", r#"{"a": "b"}"#),
        ]);
        let store = ArtifactStore::new();
        let rendered = render_all(&config, &store);

        let (_, home) = rendered.iter().find(|(id, _)| *id == ArtifactId::Home).unwrap();
        let artifact = home.result.as_ref().unwrap();
        let body = &artifact.as_file().unwrap().body;
        assert!(body.contains("List: Hugo Rocks!"));
        assert!(body.contains("Environment: development"));
        assert!(body.contains("<li>a</li>"));

        let layout = dir.path().canonicalize().unwrap().join("layouts/index.html");
        assert!(home.reads.contains(&Dependency::File(layout)));
    }

    #[test]
    fn test_page_output_and_listing() {
        let (_dir, config) = site(&[
            ("kiln.toml", ""),
            ("content/b.md", "+++\ntitle = \"Second\"\nweight = 2\n+++\n*b*"),
            ("content/a.md", "+++\ntitle = \"First\"\nweight = 1\n+++\n*a*"),
        ]);
        let store = ArtifactStore::new();
        let rendered = render_all(&config, &store);

        let (_, pages) = rendered.iter().find(|(id, _)| *id == ArtifactId::Pages).unwrap();
        let Ok(Artifact::Pages(pages)) = &pages.result else {
            panic!("pages failed");
        };
        let titles: Vec<_> = pages.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["First", "Second"]);

        let (_, page) = rendered
            .iter()
            .find(|(id, _)| *id == ArtifactId::Page("a.md".into()))
            .unwrap();
        let file = page.result.as_ref().unwrap().as_file().unwrap().clone();
        assert_eq!(file.path, PathBuf::from("a/index.html"));
        assert!(file.body.contains("<em>a</em>"));
    }

    #[test]
    fn test_broken_data_fails_data_artifact() {
        let (_dir, config) = site(&[("kiln.toml", ""), ("data/testdata.json", "{")]);
        let store = ArtifactStore::new();
        let ctx = RenderContext::new(&config, &store, 1);
        let rendered = SiteRenderer.render(&ArtifactId::Data, &ctx);
        let err = rendered.result.unwrap_err();
        assert!(format!("{err:#}").contains("data/testdata.json"));
        assert_eq!(rendered.reads, vec![Dependency::Prefix(config.build.data.clone())]);
    }

    #[test]
    fn test_not_found_page() {
        let (_dir, config) = site(&[("kiln.toml", "[site]\ntitle = \"S\"\n")]);
        let store = ArtifactStore::new();
        let ctx = RenderContext::new(&config, &store, 1);
        let rendered = SiteRenderer.render(&ArtifactId::NotFound, &ctx);
        let artifact = rendered.result.unwrap();
        let file = artifact.as_file().unwrap();
        assert_eq!(file.path, PathBuf::from("404.html"));
        assert!(file.body.contains("404 Page not found"));
    }
}
