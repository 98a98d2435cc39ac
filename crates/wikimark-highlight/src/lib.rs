//! Syntax highlighting for fenced code blocks, shaped to the compiler's
//! highlight hook: given raw code and an optional language token, return
//! replacement HTML, or `None` to decline and leave the code to plain
//! escaping.

use once_cell::sync::Lazy;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme as SyntectTheme, ThemeSet};
use syntect::html::{IncludeBackground, styled_line_to_highlighted_html};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

#[derive(Debug, Clone, Copy, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Highlights `code` with the default light theme.
pub fn highlight(code: &str, lang: Option<&str>) -> Option<String> {
    highlight_with_theme(code, lang, Theme::Light)
}

/// Highlights `code` as `lang` under the given theme. Declines when no
/// language is given, the language token is unknown, or syntect reports an
/// error mid-stream.
pub fn highlight_with_theme(code: &str, lang: Option<&str>, theme: Theme) -> Option<String> {
    let syntax = SYNTAX_SET.find_syntax_by_token(lang?)?;
    let mut highlighter = HighlightLines::new(syntax, pick_theme(theme));

    let mut out = String::with_capacity(code.len() * 2);
    for line in LinesWithEndings::from(code) {
        let ranges = highlighter.highlight_line(line, &SYNTAX_SET).ok()?;
        let html = styled_line_to_highlighted_html(&ranges, IncludeBackground::No).ok()?;
        out.push_str(&html);
    }
    Some(out)
}

fn pick_theme(theme: Theme) -> &'static SyntectTheme {
    let candidates = match theme {
        Theme::Light => ["InspiredGitHub", "Solarized (light)", "base16-ocean.light"],
        Theme::Dark => ["base16-ocean.dark", "Solarized (dark)", "base16-eighties.dark"],
    };
    for name in candidates {
        if let Some(found) = THEME_SET.themes.get(name) {
            return found;
        }
    }
    THEME_SET
        .themes
        .values()
        .next()
        .expect("theme set has at least one theme")
}

#[cfg(test)]
mod tests {
    use super::{Theme, highlight, highlight_with_theme};

    #[test]
    fn known_language_gets_styled_spans() {
        let html = highlight("let x = 1;\n", Some("rust")).expect("highlighted");
        assert!(html.contains("style=\""));
        assert!(html.contains("let"));
    }

    #[test]
    fn declines_without_language() {
        assert_eq!(highlight("let x = 1;\n", None), None);
    }

    #[test]
    fn declines_unknown_language() {
        assert_eq!(highlight("let x = 1;\n", Some("nosuchlang")), None);
    }

    #[test]
    fn escapes_markup_inside_code() {
        let html = highlight("vec<int> v;\n", Some("cpp")).expect("highlighted");
        assert!(html.contains("&lt;int&gt;"));
        assert!(!html.contains("<int>"));
    }

    #[test]
    fn dark_theme_also_highlights() {
        let html =
            highlight_with_theme("x = 1\n", Some("py"), Theme::Dark).expect("highlighted");
        assert!(html.contains("style=\""));
    }
}
