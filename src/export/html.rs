//! Standalone HTML export.

use std::io;

use comrak::nodes::{AstNode, NodeHtmlBlock, NodeValue};
use comrak::{Arena, Options, format_html, parse_document};

use super::{ExportOptions, enable_extensions};
use crate::config::ThemeMode;
use crate::highlight::{HighlightBackground, escape_html, highlight_code_html, language_token};

const DEFAULT_TITLE: &str = "Exported Document";

const BASE_CSS: &str = "\
body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    max-width: 800px;
    margin: 0 auto;
    padding: 2rem;
    line-height: 1.6;
}
h1, h2, h3, h4, h5, h6 { margin-top: 2rem; margin-bottom: 1rem; }
p { margin-bottom: 1rem; }
pre { padding: 1rem; border-radius: 6px; overflow-x: auto; }
code { padding: 0.2rem 0.4rem; border-radius: 3px; }
pre code { padding: 0; }
table { border-collapse: collapse; }
th, td { border: 1px solid var(--rule); padding: 0.3rem 0.6rem; }
blockquote { margin-left: 0; padding-left: 1rem; border-left: 4px solid var(--rule); }
";

const LIGHT_VARS: &str = "--fg: #1f2328; --bg: #ffffff; --code-bg: #f5f5f5; --rule: #d0d7de;";
const DARK_VARS: &str = "--fg: #e6edf3; --bg: #0d1117; --code-bg: #161b22; --rule: #30363d;";

fn theme_css(theme: ThemeMode) -> String {
    let palette = match theme {
        ThemeMode::Light => format!(":root {{ {LIGHT_VARS} }}"),
        ThemeMode::Dark => format!(":root {{ {DARK_VARS} }}"),
        ThemeMode::System => format!(
            ":root {{ {LIGHT_VARS} }}\n@media (prefers-color-scheme: dark) {{ :root {{ {DARK_VARS} }} }}"
        ),
    };
    format!(
        "{palette}\nbody {{ color: var(--fg); background: var(--bg); }}\ncode {{ background: var(--code-bg); }}\n{BASE_CSS}"
    )
}

/// Render markdown into a complete HTML page.
///
/// Fenced code blocks are pre-highlighted and spliced in as raw HTML, so
/// raw HTML rendering is enabled for the document body.
pub fn render_html(markdown: &str, options: &ExportOptions) -> io::Result<String> {
    let arena = Arena::new();
    let mut comrak_options = Options::default();
    enable_extensions(&mut comrak_options);
    comrak_options.render.unsafe_ = true;

    let root = parse_document(&arena, markdown, &comrak_options);
    highlight_code_blocks(root, options.theme.into());

    let title = first_heading_text(root)
        .or_else(|| options.fallback_title.clone())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let mut body = Vec::new();
    format_html(root, &comrak_options, &mut body)?;
    let body = String::from_utf8(body).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

    Ok(format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>{}</title>\n<style>\n{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(&title),
        theme_css(options.theme),
        body
    ))
}

fn highlight_code_blocks<'a>(root: &'a AstNode<'a>, background: HighlightBackground) {
    for node in root.descendants() {
        let highlighted = match &node.data.borrow().value {
            NodeValue::CodeBlock(block) => Some(highlight_code_html(
                language_token(&block.info),
                &block.literal,
                background,
            )),
            _ => None,
        };
        if let Some(literal) = highlighted {
            node.data.borrow_mut().value = NodeValue::HtmlBlock(NodeHtmlBlock {
                block_type: 0,
                literal,
            });
        }
    }
}

fn first_heading_text<'a>(root: &'a AstNode<'a>) -> Option<String> {
    let heading = root
        .descendants()
        .find(|node| matches!(node.data.borrow().value, NodeValue::Heading(_)))?;
    let mut text = String::new();
    for node in heading.descendants() {
        match &node.data.borrow().value {
            NodeValue::Text(t) => text.push_str(t),
            NodeValue::Code(code) => text.push_str(&code.literal),
            _ => {}
        }
    }
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(markdown: &str) -> String {
        render_html(markdown, &ExportOptions::default()).unwrap()
    }

    #[test]
    fn test_renders_standalone_document() {
        let html = render("# Hello\n\nworld");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<meta charset=\"UTF-8\">"));
        assert!(html.contains("<h1>"));
        assert!(html.contains("Hello</h1>"));
        assert!(html.contains("<p>world</p>"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_title_comes_from_first_heading() {
        let html = render("intro\n\n## The `Plan` & more\n\n# Later");
        assert!(html.contains("<title>The Plan &amp; more</title>"));
    }

    #[test]
    fn test_title_falls_back_to_file_name() {
        let options = ExportOptions {
            fallback_title: Some("todo.md".to_string()),
            ..ExportOptions::default()
        };
        let html = render_html("no headings", &options).unwrap();
        assert!(html.contains("<title>todo.md</title>"));
        assert!(render("").contains(&format!("<title>{DEFAULT_TITLE}</title>")));
    }

    #[test]
    fn test_code_blocks_are_highlighted() {
        let html = render("```rust\nlet x = \"<tag>\";\n```\n");
        assert!(html.contains("<pre style="));
        assert!(html.contains("&lt;tag&gt;"));
        assert!(!html.contains("<code class=\"language-rust\">"));
    }

    #[test]
    fn test_gfm_extensions_enabled() {
        let html = render("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~\n\n- [x] done\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("type=\"checkbox\""));
    }

    #[test]
    fn test_theme_selects_palette() {
        let dark = render_html(
            "x",
            &ExportOptions {
                theme: ThemeMode::Dark,
                ..ExportOptions::default()
            },
        )
        .unwrap();
        assert!(dark.contains("#0d1117"));
        assert!(!dark.contains("prefers-color-scheme"));
        assert!(render("x").contains("prefers-color-scheme: dark"));
    }
}
