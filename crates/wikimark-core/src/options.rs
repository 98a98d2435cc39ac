use std::fmt;
use std::sync::Arc;

/// Replaces the literal text of a code block with pre-rendered markup.
///
/// Returning `None`, or the input unchanged, means "no replacement"; the
/// original text is escaped as usual. A returned replacement is trusted and
/// emitted without further escaping.
pub type HighlightFn = dyn Fn(&str, Option<&str>) -> Option<String> + Send + Sync;

/// Per-call compile configuration.
///
/// Callers clone `Options::default()` and override fields; nothing is ever
/// mutated in place once a compile call starts.
#[derive(Clone)]
pub struct Options {
    /// Use the GitHub-flavored rule tables (fences, autolinked URLs,
    /// strikethrough).
    pub gfm: bool,
    /// Enable the table rules (requires `gfm`).
    pub tables: bool,
    /// Emit `<br>` for every newline inside a paragraph (requires `gfm`).
    pub breaks: bool,
    /// Match the original markdown.pl quirks: whitespace-delimited emphasis
    /// and fixed 4-column list de-indentation.
    pub pedantic: bool,
    /// Treat raw HTML blocks as paragraphs and escape inline tags.
    pub sanitize: bool,
    /// End a list early when the next item's bullet class changes, and
    /// re-parse the remainder as a fresh list.
    pub smart_lists: bool,
    /// Typographic replacement in plain text runs: `--`, quotes, `...`.
    pub smartypants: bool,
    /// On an internal structural failure, return a fallback HTML fragment
    /// instead of an error.
    pub silent: bool,
    /// Prefix for the CSS class carrying a fenced code block's language.
    pub lang_prefix: String,
    /// Optional code-highlight hook, see [`HighlightFn`].
    pub highlight: Option<Arc<HighlightFn>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            gfm: true,
            tables: true,
            breaks: false,
            pedantic: false,
            sanitize: false,
            smart_lists: false,
            smartypants: false,
            silent: false,
            lang_prefix: "lang-".to_string(),
            highlight: None,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("gfm", &self.gfm)
            .field("tables", &self.tables)
            .field("breaks", &self.breaks)
            .field("pedantic", &self.pedantic)
            .field("sanitize", &self.sanitize)
            .field("smart_lists", &self.smart_lists)
            .field("smartypants", &self.smartypants)
            .field("silent", &self.silent)
            .field("lang_prefix", &self.lang_prefix)
            .field("highlight", &self.highlight.is_some())
            .finish()
    }
}
