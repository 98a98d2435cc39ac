//! Pattern composition: every grammar rule is assembled from small named
//! fragments whose `{{name}}` placeholders are substituted recursively, then
//! compiled once into per-dialect rule tables behind `Lazy` statics.

use std::collections::BTreeMap;

use fancy_regex::Regex;
use once_cell::sync::Lazy;

use crate::options::Options;

/// Named pattern fragments for one dialect. Fragments reference each other by
/// `{{name}}` and must form a DAG; a cycle is a configuration error that
/// fails at table initialization, never during parsing.
pub(crate) struct Fragments {
    map: BTreeMap<&'static str, &'static str>,
}

impl Fragments {
    fn new(base: &[(&'static str, &'static str)]) -> Self {
        Self {
            map: base.iter().copied().collect(),
        }
    }

    fn with_overrides(&self, overrides: &[(&'static str, &'static str)]) -> Self {
        let mut map = self.map.clone();
        for &(name, source) in overrides {
            map.insert(name, source);
        }
        Self { map }
    }

    fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Substitutes placeholders until none remain. Substitution order is
    /// irrelevant because every placeholder resolves to the same fixed point.
    fn resolve(&self, name: &str) -> String {
        let mut stack = Vec::new();
        self.resolve_inner(name, &mut stack)
    }

    fn resolve_inner(&self, name: &str, stack: &mut Vec<String>) -> String {
        if stack.iter().any(|seen| seen == name) {
            panic!(
                "fragment cycle: {} -> {}",
                stack.join(" -> "),
                name
            );
        }
        let source = self
            .map
            .get(name)
            .unwrap_or_else(|| panic!("unknown fragment `{name}`"));
        stack.push(name.to_string());
        let mut out = String::with_capacity(source.len());
        let mut rest: &str = source;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .unwrap_or_else(|| panic!("unterminated placeholder in `{name}`"));
            let spliced = self.resolve_inner(&after[..end], stack);
            out.push_str(&strip_anchor(&spliced));
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        stack.pop();
        out
    }
}

// A spliced fragment must not carry its own start-of-string anchor into the
// middle of the outer pattern: drop every `^` not preceded by `[`.
fn strip_anchor(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut prev = '\0';
    for ch in source.chars() {
        if ch == '^' && prev != '[' {
            prev = ch;
            continue;
        }
        out.push(ch);
        prev = ch;
    }
    out
}

fn compile_pattern(pattern: &str, name: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("rule `{name}` failed to compile: {err}"))
}

fn compile_rule(frags: &Fragments, name: &str) -> Regex {
    compile_pattern(&frags.resolve(name), name)
}

fn compile_optional(frags: &Fragments, name: &str) -> Option<Regex> {
    frags.contains(name).then(|| compile_rule(frags, name))
}

const BLOCK_BASE: &[(&str, &str)] = &[
    ("newline", r"^\n+"),
    ("code", r"^( {4}[^\n]+\n*)+"),
    ("hr", r"^( *[-*_]){3,} *(?:\n+|$)"),
    ("heading", r"^ *(#{1,6}) *([^\n]+?) *#* *(?:\n+|$)"),
    ("lheading", r"^([^\n]+)\n *(=|-){3,} *\n*"),
    ("blockquote", r"^( *>[^\n]+(\n[^\n]+)*\n*)+"),
    ("bull", r"(?:[*+-]|\d+\.)"),
    (
        "list",
        r"^( *)({{bull}}) [\s\S]+?(?:{{list_hr}}|\n{2,}(?! )(?!\1{{bull}} )\n*|\s*$)",
    ),
    ("list_hr", r"\n+(?=(?: *[-*_]){3,} *(?:\n+|$))"),
    (
        "item",
        r"^( *)({{bull}}) [^\n]*(?:\n(?!\1{{bull}} )[^\n]*)*",
    ),
    (
        "tag",
        r"(?!(?:a|em|strong|small|s|cite|q|dfn|abbr|data|time|code|var|samp|kbd|sub|sup|i|b|u|mark|ruby|rt|rp|bdi|bdo|span|br|wbr|ins|del|img)\b)\w+(?!:/|@)\b",
    ),
    ("comment", r"<!--[\s\S]*?-->"),
    ("closed", r"<({{tag}})[\s\S]+?</\1>"),
    ("closing", r#"<{{tag}}(?:"[^"]*"|'[^']*'|[^'">])*?>"#),
    (
        "html",
        r"^ *(?:{{comment}}|{{closed}}|{{closing}}) *(?:\n{2,}|\s*$)",
    ),
    (
        "def",
        r#"^ *\[([^\]]+)\]: *<?([^\s>]+)>?(?: +["(]([^\n]+)[")])? *(?:\n+|$)"#,
    ),
    (
        "paragraph",
        r"^((?:[^\n]+\n?(?!{{hr}}|{{heading}}|{{lheading}}|{{blockquote}}|<{{tag}}|{{def}}))+)\n*",
    ),
    ("text", r"^[^\n]+"),
];

const GFM_BLOCK_OVERRIDES: &[(&str, &str)] = &[
    (
        "fences",
        r"^ *(`{3,}|~{3,}) *(\S+)? *\n([\s\S]+?)\s*\1 *(?:\n+|$)",
    ),
    // Fence pattern spliced into the paragraph-interrupt lookahead; its
    // back-reference is pre-shifted to account for the paragraph's own
    // capture group.
    (
        "fences_interrupt",
        r" *(`{3,}|~{3,}) *(\S+)? *\n([\s\S]+?)\s*\2 *(?:\n+|$)",
    ),
    (
        "paragraph",
        r"^((?:[^\n]+\n?(?!{{fences_interrupt}}|{{hr}}|{{heading}}|{{lheading}}|{{blockquote}}|<{{tag}}|{{def}}))+)\n*",
    ),
];

const TABLES_BLOCK_OVERRIDES: &[(&str, &str)] = &[
    (
        "nptable",
        r"^ *(\S.*\|.*)\n *([-:]+ *\|[-| :]*)\n((?:.*\|.*(?:\n|$))*)\n*",
    ),
    (
        "table",
        r"^ *\|(.+)\n *\|( *[-:]+[-| :]*)\n((?: *\|.*(?:\n|$))*)\n*",
    ),
];

/// Compiled block rule table for one dialect. Rules with no definition in a
/// dialect (fences and tables outside GFM) are `None` and simply never match.
pub(crate) struct BlockRules {
    pub newline: Regex,
    pub code: Regex,
    pub fences: Option<Regex>,
    pub hr: Regex,
    pub heading: Regex,
    pub nptable: Option<Regex>,
    pub lheading: Regex,
    pub blockquote: Regex,
    pub list: Regex,
    pub item: Regex,
    pub bullet: Regex,
    pub html: Regex,
    pub def: Regex,
    pub table: Option<Regex>,
    pub paragraph: Regex,
    pub text: Regex,
}

impl BlockRules {
    fn build(frags: &Fragments) -> Self {
        Self {
            newline: compile_rule(frags, "newline"),
            code: compile_rule(frags, "code"),
            fences: compile_optional(frags, "fences"),
            hr: compile_rule(frags, "hr"),
            heading: compile_rule(frags, "heading"),
            nptable: compile_optional(frags, "nptable"),
            lheading: compile_rule(frags, "lheading"),
            blockquote: compile_rule(frags, "blockquote"),
            list: compile_rule(frags, "list"),
            // Items are split out of a matched list region line by line.
            item: compile_pattern(&format!("(?m){}", frags.resolve("item")), "item"),
            bullet: compile_rule(frags, "bull"),
            html: compile_rule(frags, "html"),
            def: compile_rule(frags, "def"),
            table: compile_optional(frags, "table"),
            paragraph: compile_rule(frags, "paragraph"),
            text: compile_rule(frags, "text"),
        }
    }

    pub(crate) fn select(options: &Options) -> &'static BlockRules {
        if options.gfm {
            if options.tables {
                &TABLES_BLOCK
            } else {
                &GFM_BLOCK
            }
        } else {
            &NORMAL_BLOCK
        }
    }
}

static BLOCK_FRAGMENTS: Lazy<Fragments> = Lazy::new(|| Fragments::new(BLOCK_BASE));

static NORMAL_BLOCK: Lazy<BlockRules> = Lazy::new(|| BlockRules::build(&BLOCK_FRAGMENTS));

static GFM_BLOCK: Lazy<BlockRules> =
    Lazy::new(|| BlockRules::build(&BLOCK_FRAGMENTS.with_overrides(GFM_BLOCK_OVERRIDES)));

static TABLES_BLOCK: Lazy<BlockRules> = Lazy::new(|| {
    BlockRules::build(
        &BLOCK_FRAGMENTS
            .with_overrides(GFM_BLOCK_OVERRIDES)
            .with_overrides(TABLES_BLOCK_OVERRIDES),
    )
});

const INLINE_BASE: &[(&str, &str)] = &[
    ("escape", r"^\\([\\`*{}\[\]()#+\-.!_>])"),
    ("autolink", r"^<([^ >]+(@|:/)[^ >]+)>"),
    (
        "tag",
        r#"^<!--[\s\S]*?-->|^</?\w+(?:"[^"]*"|'[^']*'|[^'">])*?>"#,
    ),
    ("inside", r"(?:\[[^\]]*\]|[^\]]|\](?=[^\[]*\]))*"),
    ("href", r#"\s*<?(.*?)>?(?:\s+['"]([\s\S]*?)['"])?\s*"#),
    ("link", r"^!?\[({{inside}})\]\({{href}}\)"),
    ("reflink", r"^!?\[({{inside}})\]\s*\[([^\]]*)\]"),
    ("nolink", r"^!?\[((?:\[[^\]]*\]|[^\[\]])*)\]"),
    ("strong", r"^__([\s\S]+?)__(?!_)|^\*\*([\s\S]+?)\*\*(?!\*)"),
    ("em", r"^\b_((?:__|[\s\S])+?)_\b|^\*((?:\*\*|[\s\S])+?)\*(?!\*)"),
    ("code", r"^(`+)\s*([\s\S]*?[^`])\s*\1(?!`)"),
    ("br", r"^ {2,}\n(?!\s*$)"),
    ("text", r"^[\s\S]+?(?=[\\<!\[_*`]| {2,}\n|$)"),
];

const PEDANTIC_INLINE_OVERRIDES: &[(&str, &str)] = &[
    (
        "strong",
        r"^__(?=\S)([\s\S]*?\S)__(?!_)|^\*\*(?=\S)([\s\S]*?\S)\*\*(?!\*)",
    ),
    (
        "em",
        r"^_(?=\S)([\s\S]*?\S)_(?!_)|^\*(?=\S)([\s\S]*?\S)\*(?!\*)",
    ),
];

const GFM_INLINE_OVERRIDES: &[(&str, &str)] = &[
    ("escape", r"^\\([\\`*{}\[\]()#+\-.!_>~|])"),
    ("url", r#"^(https?://[^\s<]+[^<.,:;"')\]\s])"#),
    ("del", r"^~~(?=\S)([\s\S]*?\S)~~"),
    ("text", r"^[\s\S]+?(?=[\\<!\[_*`~]|https?://| {2,}\n|$)"),
];

const BREAKS_INLINE_OVERRIDES: &[(&str, &str)] = &[
    ("br", r"^ *\n(?!\s*$)"),
    ("text", r"^[\s\S]+?(?=[\\<!\[_*`~]|https?://| *\n|$)"),
];

/// Compiled inline rule table for one dialect.
pub(crate) struct InlineRules {
    pub escape: Regex,
    pub autolink: Regex,
    pub url: Option<Regex>,
    pub tag: Regex,
    pub link: Regex,
    pub reflink: Regex,
    pub nolink: Regex,
    pub strong: Regex,
    pub em: Regex,
    pub code: Regex,
    pub br: Regex,
    pub del: Option<Regex>,
    pub text: Regex,
}

impl InlineRules {
    fn build(frags: &Fragments) -> Self {
        Self {
            escape: compile_rule(frags, "escape"),
            autolink: compile_rule(frags, "autolink"),
            url: compile_optional(frags, "url"),
            tag: compile_rule(frags, "tag"),
            link: compile_rule(frags, "link"),
            reflink: compile_rule(frags, "reflink"),
            nolink: compile_rule(frags, "nolink"),
            strong: compile_rule(frags, "strong"),
            em: compile_rule(frags, "em"),
            code: compile_rule(frags, "code"),
            br: compile_rule(frags, "br"),
            del: compile_optional(frags, "del"),
            text: compile_rule(frags, "text"),
        }
    }

    pub(crate) fn select(options: &Options) -> &'static InlineRules {
        if options.gfm {
            if options.breaks {
                &BREAKS_INLINE
            } else {
                &GFM_INLINE
            }
        } else if options.pedantic {
            &PEDANTIC_INLINE
        } else {
            &NORMAL_INLINE
        }
    }
}

static INLINE_FRAGMENTS: Lazy<Fragments> = Lazy::new(|| Fragments::new(INLINE_BASE));

static NORMAL_INLINE: Lazy<InlineRules> = Lazy::new(|| InlineRules::build(&INLINE_FRAGMENTS));

static PEDANTIC_INLINE: Lazy<InlineRules> =
    Lazy::new(|| InlineRules::build(&INLINE_FRAGMENTS.with_overrides(PEDANTIC_INLINE_OVERRIDES)));

static GFM_INLINE: Lazy<InlineRules> =
    Lazy::new(|| InlineRules::build(&INLINE_FRAGMENTS.with_overrides(GFM_INLINE_OVERRIDES)));

static BREAKS_INLINE: Lazy<InlineRules> = Lazy::new(|| {
    InlineRules::build(
        &INLINE_FRAGMENTS
            .with_overrides(GFM_INLINE_OVERRIDES)
            .with_overrides(BREAKS_INLINE_OVERRIDES),
    )
});

/// Anchored-match helpers. The lexers only ever test rules at the current
/// cursor position; a runtime engine error (backtrack limit) is treated as
/// "no match" so the next rule gets a chance.
pub(crate) fn captures<'t>(re: &Regex, text: &'t str) -> Option<fancy_regex::Captures<'t>> {
    re.captures(text).ok().flatten()
}

pub(crate) fn find<'t>(re: &Regex, text: &'t str) -> Option<fancy_regex::Match<'t>> {
    re.find(text).ok().flatten()
}

pub(crate) fn find_all<'t>(re: &Regex, text: &'t str) -> Vec<&'t str> {
    re.find_iter(text)
        .filter_map(Result::ok)
        .map(|m| m.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_substitute_recursively() {
        let frags = Fragments::new(&[("a", "^x{{b}}z"), ("b", "{{c}}y"), ("c", "^q")]);
        assert_eq!(frags.resolve("a"), "^xqyz");
    }

    #[test]
    fn spliced_anchor_is_stripped_but_class_negation_kept() {
        let frags = Fragments::new(&[("outer", "^a{{inner}}"), ("inner", "^[^b]+")]);
        assert_eq!(frags.resolve("outer"), "^a[^b]+");
    }

    #[test]
    fn resolution_is_confluent() {
        let frags = Fragments::new(&[("a", "{{b}}{{c}}"), ("b", "1{{c}}"), ("c", "2")]);
        // Resolving a dependent first must not change the result.
        assert_eq!(frags.resolve("c"), "2");
        assert_eq!(frags.resolve("a"), "122");
        assert_eq!(frags.resolve("a"), "122");
    }

    #[test]
    #[should_panic(expected = "fragment cycle")]
    fn cyclic_fragments_fail_fast() {
        let frags = Fragments::new(&[("a", "{{b}}"), ("b", "{{a}}")]);
        frags.resolve("a");
    }

    #[test]
    #[should_panic(expected = "unknown fragment")]
    fn missing_fragment_fails_fast() {
        let frags = Fragments::new(&[("a", "{{nope}}")]);
        frags.resolve("a");
    }

    #[test]
    fn all_rule_tables_compile() {
        let _ = &*NORMAL_BLOCK;
        let _ = &*GFM_BLOCK;
        let _ = &*TABLES_BLOCK;
        let _ = &*NORMAL_INLINE;
        let _ = &*PEDANTIC_INLINE;
        let _ = &*GFM_INLINE;
        let _ = &*BREAKS_INLINE;
    }

    #[test]
    fn dialect_selection_follows_flags() {
        let mut options = Options::default();
        assert!(BlockRules::select(&options).table.is_some());
        options.tables = false;
        let rules = BlockRules::select(&options);
        assert!(rules.table.is_none());
        assert!(rules.fences.is_some());
        options.gfm = false;
        let rules = BlockRules::select(&options);
        assert!(rules.fences.is_none());
    }

    #[test]
    fn gfm_paragraph_is_interrupted_by_fences() {
        let rules = BlockRules::select(&Options::default());
        let cap = captures(&rules.paragraph, "para\n```\ncode\n```\n").expect("match");
        assert_eq!(cap.get(1).map(|m| m.as_str()), Some("para"));
    }
}
