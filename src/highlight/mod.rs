//! Syntax highlighting for exported code blocks.
//!
//! Uses syntect for highlighting with Sublime Text syntax definitions and
//! emits HTML with inline styles so exports stay self-contained.

use std::sync::OnceLock;

use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::{SyntaxReference, SyntaxSet};

use crate::config::ThemeMode;

const LIGHT_THEME: &str = "InspiredGitHub";
const DARK_THEME: &str = "base16-ocean.dark";

/// Background the highlighted code is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightBackground {
    Light,
    Dark,
}

impl From<ThemeMode> for HighlightBackground {
    /// Exports are static files, so `system` resolves to the light palette.
    fn from(mode: ThemeMode) -> Self {
        match mode {
            ThemeMode::Dark => Self::Dark,
            ThemeMode::Light | ThemeMode::System => Self::Light,
        }
    }
}

fn syntax_set() -> &'static SyntaxSet {
    static SYNTAXES: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAXES.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn theme(background: HighlightBackground) -> &'static Theme {
    static THEMES: OnceLock<ThemeSet> = OnceLock::new();
    let themes = THEMES.get_or_init(ThemeSet::load_defaults);
    let name = match background {
        HighlightBackground::Light => LIGHT_THEME,
        HighlightBackground::Dark => DARK_THEME,
    };
    &themes.themes[name]
}

/// First word of a fence info string, e.g. `rust` for ```` ```rust,ignore ````.
pub fn language_token(info: &str) -> Option<&str> {
    info.split(|c: char| c.is_whitespace() || c == ',')
        .next()
        .filter(|token| !token.is_empty())
}

fn find_syntax(language: Option<&str>) -> &'static SyntaxReference {
    let syntaxes = syntax_set();
    language
        .and_then(|lang| {
            syntaxes
                .find_syntax_by_token(lang)
                .or_else(|| syntaxes.find_syntax_by_extension(lang))
        })
        .unwrap_or_else(|| syntaxes.find_syntax_plain_text())
}

/// Render a code block as a styled `<pre>` element.
///
/// Unknown languages are rendered as plain text.
pub fn highlight_code_html(
    language: Option<&str>,
    code: &str,
    background: HighlightBackground,
) -> String {
    let syntax = find_syntax(language);
    match highlighted_html_for_string(code, syntax_set(), syntax, theme(background)) {
        Ok(html) => html,
        Err(err) => {
            tracing::warn!(?language, %err, "highlighting failed, emitting plain block");
            format!("<pre><code>{}</code></pre>\n", escape_html(code))
        }
    }
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_rust_produces_colored_spans() {
        let html = highlight_code_html(
            Some("rust"),
            "fn main() {\n    let x = 1;\n}\n",
            HighlightBackground::Light,
        );
        assert!(html.starts_with("<pre"));
        assert!(html.contains("<span style=\"color:"));
        assert!(html.contains("main"));
    }

    #[test]
    fn test_highlight_unknown_language_falls_back_to_plain() {
        let html = highlight_code_html(Some("nope"), "a < b", HighlightBackground::Light);
        assert!(html.contains("a &lt; b"));
    }

    #[test]
    fn test_dark_and_light_backgrounds_differ() {
        let code = "fn main() {}\n";
        let light = highlight_code_html(Some("rust"), code, HighlightBackground::Light);
        let dark = highlight_code_html(Some("rust"), code, HighlightBackground::Dark);
        assert_ne!(light, dark);
    }

    #[test]
    fn test_language_token_takes_first_word() {
        assert_eq!(language_token("rust,ignore"), Some("rust"));
        assert_eq!(language_token("python title=x"), Some("python"));
        assert_eq!(language_token(""), None);
    }

    #[test]
    fn test_system_theme_exports_light() {
        assert_eq!(
            HighlightBackground::from(ThemeMode::System),
            HighlightBackground::Light
        );
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }
}
