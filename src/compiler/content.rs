//! Markdown pages with TOML front matter.

use anyhow::{Context, Result};
use pulldown_cmark::{Options, Parser, html};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Page metadata from the `+++` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub weight: i64,
    pub draft: bool,
}

/// A parsed content page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSource {
    pub meta: FrontMatter,
    pub body: String,
}

impl PageSource {
    /// Parse `text`, treating a leading `+++ ... +++` block as TOML front matter.
    pub fn parse(text: &str) -> Result<Self> {
        match split_front_matter(text) {
            Some((front, body)) => {
                let meta = toml::from_str(front).context("invalid TOML front matter")?;
                Ok(Self {
                    meta,
                    body: body.to_string(),
                })
            }
            None => Ok(Self {
                meta: FrontMatter::default(),
                body: text.to_string(),
            }),
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        Self::parse(&text).with_context(|| format!("in `{}`", path.display()))
    }

    /// Title from front matter, falling back to the file stem.
    pub fn title(&self, source: &Path) -> String {
        self.meta.title.clone().unwrap_or_else(|| {
            source
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }

    pub fn to_html(&self) -> String {
        render_markdown(&self.body)
    }
}

/// Split `+++` front matter from the body. Returns `(front_matter, body)`.
fn split_front_matter(content: &str) -> Option<(&str, &str)> {
    let trimmed = content.trim_start();
    let rest = trimmed.strip_prefix("+++")?;
    let end = rest.find("\n+++")?;
    let front = rest[..end].trim();
    let body = rest[end + 4..].trim_start_matches(['\r', '\n']);
    Some((front, body))
}

/// Render markdown to HTML with the common extensions enabled.
pub fn render_markdown(body: &str) -> String {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_FOOTNOTES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(body, opts);
    let mut out = String::with_capacity(body.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Output path of a page: `blog/post.md` → `blog/post/index.html`.
pub fn page_output_path(source: &Path) -> PathBuf {
    source.with_extension("").join("index.html")
}

/// Site-absolute URL of a page: `blog/post.md` → `/blog/post/`.
pub fn page_url(source: &Path) -> String {
    let stem = source.with_extension("");
    let parts: Vec<_> = stem
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    format!("/{}/", parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_front_matter() {
        let page = PageSource::parse("+++\ntitle = \"Hello\"\nweight = 2\n+++\n\n# Body\n").unwrap();
        assert_eq!(page.meta.title.as_deref(), Some("Hello"));
        assert_eq!(page.meta.weight, 2);
        assert!(!page.meta.draft);
        assert_eq!(page.body, "# Body\n");
        assert!(page.to_html().contains("<h1>Body</h1>"));
    }

    #[test]
    fn test_no_front_matter() {
        let page = PageSource::parse("plain *text*").unwrap();
        assert_eq!(page.meta, FrontMatter::default());
        assert_eq!(page.title(Path::new("blog/first.md")), "first");
        assert!(page.to_html().contains("<em>text</em>"));
    }

    #[test]
    fn test_invalid_front_matter() {
        let err = PageSource::parse("+++\ntitle = \n+++\nbody").unwrap_err();
        assert!(format!("{err:#}").contains("front matter"));
    }

    #[test]
    fn test_page_routes() {
        let source = Path::new("blog/post.md");
        assert_eq!(page_output_path(source), PathBuf::from("blog/post/index.html"));
        assert_eq!(page_url(source), "/blog/post/");
    }
}
