//! Minimal HTML layouts.
//!
//! Layouts are plain HTML with placeholders:
//!
//! | Placeholder                         | Value                           |
//! |-------------------------------------|---------------------------------|
//! | `{{ site.title }}`                  | `[site] title` (escaped)        |
//! | `{{ site.base_url }}`               | base URL (escaped)              |
//! | `{{ title }}`                       | page title (escaped)            |
//! | `{{ content }}`                     | rendered markdown (raw)         |
//! | `{{ mode }}`                        | `development` / `production`    |
//! | `{{ pages }}`                       | page listing as `<ul>` (raw)    |
//! | `{{#data.NAME}}..{{/data.NAME}}`    | repeated per entry of data NAME |
//! | `{{ key }}`, `{{ value }}`          | current entry, inside a block   |
//!
//! Unknown placeholders are errors, so typos fail the build instead of
//! silently rendering nothing.

use anyhow::{Result, bail};
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::{DataSet, PageSummary};
use crate::utils::html::escape;

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{[ \t]*([#/]?)[ \t]*([A-Za-z0-9_.\-]+)[ \t]*\}\}").unwrap()
});

const DEFAULT_HOME: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{{ site.title }}</title></head>
<body>
<h1>{{ site.title }}</h1>
{{ pages }}
</body>
</html>
"#;

const DEFAULT_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{{ title }} | {{ site.title }}</title></head>
<body>
<article>
<h1>{{ title }}</h1>
{{ content }}
</article>
</body>
</html>
"#;

const DEFAULT_NOT_FOUND: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Page not found | {{ site.title }}</title></head>
<body>
<h1>404 Page not found</h1>
<p><a href="/">Back to {{ site.title }}</a></p>
</body>
</html>
"#;

/// Which layout file an artifact renders through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    Home,
    Page,
    NotFound,
}

impl LayoutKind {
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Home => "index.html",
            Self::Page => "page.html",
            Self::NotFound => "404.html",
        }
    }

    const fn default_source(self) -> &'static str {
        match self {
            Self::Home => DEFAULT_HOME,
            Self::Page => DEFAULT_PAGE,
            Self::NotFound => DEFAULT_NOT_FOUND,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Var {
    SiteTitle,
    BaseUrl,
    Title,
    Content,
    Mode,
    Pages,
    Key,
    Value,
}

impl Var {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "site.title" => Self::SiteTitle,
            "site.base_url" => Self::BaseUrl,
            "title" => Self::Title,
            "content" => Self::Content,
            "mode" => Self::Mode,
            "pages" => Self::Pages,
            "key" => Self::Key,
            "value" => Self::Value,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Var(Var),
    /// `{{#data.NAME}}`, with the data key `NAME`.
    Section { name: String, body: Vec<Node> },
}

/// Values available to a layout.
#[derive(Debug, Default, Clone, Copy)]
pub struct Vars<'a> {
    pub site_title: &'a str,
    pub base_url: &'a str,
    pub title: &'a str,
    pub content: &'a str,
    pub mode: &'a str,
    pub pages: Option<&'a [PageSummary]>,
    pub data: Option<&'a DataSet>,
}

/// A parsed layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    nodes: Vec<Node>,
}

impl Layout {
    /// Load `dir/<kind file>`, falling back to the built-in layout.
    ///
    /// Returns the layout and the path it was (or would have been) read from.
    pub fn load(kind: LayoutKind, dir: &Path) -> Result<(Self, PathBuf)> {
        let path = dir.join(kind.file_name());
        let source: Cow<'_, str> = match fs::read_to_string(&path) {
            Ok(text) => Cow::Owned(text),
            Err(err) if err.kind() == ErrorKind::NotFound => Cow::Borrowed(kind.default_source()),
            Err(err) => bail!("failed to read layout `{}`: {err}", path.display()),
        };

        let layout = Self::parse(&source)
            .map_err(|err| err.context(format!("in layout `{}`", kind.file_name())))?;
        Ok((layout, path))
    }

    pub fn parse(source: &str) -> Result<Self> {
        // Stack of open sections: (name, nodes collected so far)
        let mut stack: Vec<(String, Vec<Node>)> = Vec::new();
        let mut nodes = Vec::new();
        let mut last = 0;

        for caps in TAG.captures_iter(source) {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let sigil = caps.get(1).map_or("", |m| m.as_str());
            let name = caps.get(2).map_or("", |m| m.as_str());

            let in_block = !stack.is_empty();
            let current = stack.last_mut().map_or(&mut nodes, |(_, body)| body);
            if whole.start > last {
                current.push(Node::Text(source[last..whole.start].to_string()));
            }
            last = whole.end;

            match sigil {
                "#" => {
                    let Some(key) = name.strip_prefix("data.") else {
                        bail!("unknown block `{{{{#{name}}}}}`, expected `{{{{#data.NAME}}}}`");
                    };
                    if !stack.is_empty() {
                        bail!("nested block `{{{{#{name}}}}}` is not supported");
                    }
                    stack.push((key.to_string(), Vec::new()));
                }
                "/" => {
                    let Some((open, body)) = stack.pop() else {
                        bail!("unexpected closing `{{{{/{name}}}}}`");
                    };
                    if name.strip_prefix("data.") != Some(open.as_str()) {
                        bail!("`{{{{/{name}}}}}` does not close `{{{{#data.{open}}}}}`");
                    }
                    nodes.push(Node::Section { name: open, body });
                }
                _ => {
                    let Some(var) = Var::from_name(name) else {
                        bail!("unknown placeholder `{{{{ {name} }}}}`");
                    };
                    if matches!(var, Var::Key | Var::Value) && !in_block {
                        bail!("`{{{{ {name} }}}}` used outside a data block");
                    }
                    current.push(Node::Var(var));
                }
            }
        }

        if let Some((open, _)) = stack.pop() {
            bail!("unclosed block `{{{{#data.{open}}}}}`");
        }
        if last < source.len() {
            nodes.push(Node::Text(source[last..].to_string()));
        }

        Ok(Self { nodes })
    }

    /// Whether rendering reads the data aggregate.
    pub fn uses_data(&self) -> bool {
        self.nodes.iter().any(|n| matches!(n, Node::Section { .. }))
    }

    /// Whether rendering reads the page listing.
    pub fn uses_pages(&self) -> bool {
        self.nodes.iter().any(|n| matches!(n, Node::Var(Var::Pages)))
    }

    pub fn render(&self, vars: &Vars<'_>) -> String {
        let mut out = String::new();
        render_nodes(&self.nodes, vars, None, &mut out);
        out
    }
}

fn render_nodes(nodes: &[Node], vars: &Vars<'_>, entry: Option<(&str, &Value)>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var(var) => render_var(*var, vars, entry, out),
            Node::Section { name, body } => {
                let Some(value) = vars.data.and_then(|data| data.get(name)) else {
                    continue;
                };
                for_each_entry(name, value, |key, value| {
                    render_nodes(body, vars, Some((key, value)), out);
                });
            }
        }
    }
}

fn render_var(var: Var, vars: &Vars<'_>, entry: Option<(&str, &Value)>, out: &mut String) {
    match var {
        Var::SiteTitle => out.push_str(&escape(vars.site_title)),
        Var::BaseUrl => out.push_str(&escape(vars.base_url)),
        Var::Title => out.push_str(&escape(vars.title)),
        Var::Content => out.push_str(vars.content),
        Var::Mode => out.push_str(&escape(vars.mode)),
        Var::Pages => out.push_str(&pages_html(vars.pages.unwrap_or_default())),
        Var::Key => {
            if let Some((key, _)) = entry {
                out.push_str(&escape(key));
            }
        }
        Var::Value => {
            if let Some((_, value)) = entry {
                out.push_str(&escape(&value_text(value)));
            }
        }
    }
}

/// Iterate object members in source order, array items by index, or a
/// scalar as a single entry keyed by the block name.
fn for_each_entry(name: &str, value: &Value, mut f: impl FnMut(&str, &Value)) {
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                f(key, value);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                f(&index.to_string(), value);
            }
        }
        scalar => f(name, scalar),
    }
}

fn value_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s),
        Value::Null => Cow::Borrowed(""),
        other => Cow::Owned(other.to_string()),
    }
}

fn pages_html(pages: &[PageSummary]) -> String {
    let mut out = String::from("<ul class=\"pages\">\n");
    for page in pages {
        out.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            escape(&page.url),
            escape(&page.title)
        ));
    }
    out.push_str("</ul>");
    out
}
