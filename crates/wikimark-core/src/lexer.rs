//! Block lexer: turns raw document text into the flat token sequence.
//!
//! The lexer repeatedly tries an ordered list of rules against the remaining
//! input; the first rule matching at the current position (anchored, never
//! searched) consumes its whole match and appends zero or more tokens.
//! Container content is lexed by explicit recursion carrying the `top` flag
//! as an argument.

use once_cell::sync::Lazy;

use crate::error::CompileError;
use crate::grammar::{BlockRules, captures, find, find_all};
use crate::options::Options;
use crate::token::{LinkDef, LinkTable, TableAlign, Token, normalize_label};

/// Token sequence plus the link-reference table collected alongside it.
pub struct LexResult {
    pub tokens: Vec<Token>,
    pub links: LinkTable,
}

/// Lexes a whole document at top level.
pub fn lex(src: &str, options: &Options) -> Result<LexResult, CompileError> {
    log::debug!(
        "block lexing: gfm={} tables={} pedantic={}",
        options.gfm,
        options.tables,
        options.pedantic
    );
    let mut lexer = BlockLexer {
        rules: BlockRules::select(options),
        options,
        tokens: Vec::new(),
        links: LinkTable::new(),
    };
    lexer.token(&preprocess(src), true)?;
    Ok(LexResult {
        tokens: lexer.tokens,
        links: lexer.links,
    })
}

fn preprocess(src: &str) -> String {
    src.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\t', "    ")
        .replace('\u{00a0}', " ")
        .replace('\u{2424}', "\n")
}

static BLANK_LINE: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"(?m)^ +$").unwrap());
static CODE_OUTDENT: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"(?m)^ {4}").unwrap());
static TRAILING_NEWLINES: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"\n+$").unwrap());
static BQ_PREFIX: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"(?m)^ *> ?").unwrap());
static BULLET_STRIP: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"^ *(?:[*+-]|\d+\.) +").unwrap());
// An item is loose when a blank line separates it from what follows, unless
// only trailing whitespace remains.
static ITEM_LOOSE: Lazy<fancy_regex::Regex> =
    Lazy::new(|| fancy_regex::Regex::new(r"\n\n(?!\s*$)").unwrap());

static HEADER_TRIM: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"^ *| *\| *$").unwrap());
static ALIGN_TRIM: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"^ *|\| *$").unwrap());
static CELL_SPLIT: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r" *\| *").unwrap());
static ROW_PIPE_TRIM: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"^ *\| *| *\| *$").unwrap());
static TABLE_ROWS_TRAIL: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"(?: *\| *)?\n$").unwrap());
static NPTABLE_ROWS_TRAIL: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"\n$").unwrap());

static ALIGN_RIGHT: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"^ *-+: *$").unwrap());
static ALIGN_CENTER: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"^ *:-+: *$").unwrap());
static ALIGN_LEFT: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"^ *:-+ *$").unwrap());

struct BlockLexer<'a> {
    rules: &'static BlockRules,
    options: &'a Options,
    tokens: Vec<Token>,
    links: LinkTable,
}

impl BlockLexer<'_> {
    fn token(&mut self, src: &str, top: bool) -> Result<(), CompileError> {
        let mut remaining = BLANK_LINE.replace_all(src, "").into_owned();
        let base_len = remaining.len();

        while !remaining.is_empty() {
            // blank-line run
            if let Some(m) = find(&self.rules.newline, &remaining) {
                let len = m.as_str().len();
                remaining.drain(..len);
                if len > 1 {
                    self.tokens.push(Token::Space);
                }
                continue;
            }

            // indented code block
            if let Some(m) = find(&self.rules.code, &remaining) {
                let matched = m.as_str().to_string();
                remaining.drain(..matched.len());
                let text = CODE_OUTDENT.replace_all(&matched, "");
                let text = if self.options.pedantic {
                    text.into_owned()
                } else {
                    TRAILING_NEWLINES.replace_all(&text, "").into_owned()
                };
                self.tokens.push(Token::Code { text });
                continue;
            }

            // fenced code block
            if let Some(re) = &self.rules.fences {
                if let Some(cap) = captures(re, &remaining) {
                    let len = cap.get(0).map_or(0, |m| m.as_str().len());
                    let lang = cap.get(2).map(|m| m.as_str().to_string());
                    let text = cap.get(3).map_or(String::new(), |m| m.as_str().to_string());
                    remaining.drain(..len);
                    self.tokens.push(Token::Fences { lang, text });
                    continue;
                }
            }

            // heading
            if let Some(cap) = captures(&self.rules.heading, &remaining) {
                let len = cap.get(0).map_or(0, |m| m.as_str().len());
                let depth = cap.get(1).map_or(0, |m| m.as_str().len()) as u8;
                let text = cap.get(2).map_or(String::new(), |m| m.as_str().to_string());
                remaining.drain(..len);
                self.tokens.push(Token::Heading { depth, text });
                continue;
            }

            // table without leading pipe
            if top {
                if let Some(re) = &self.rules.nptable {
                    if let Some(cap) = captures(re, &remaining) {
                        let len = cap.get(0).map_or(0, |m| m.as_str().len());
                        let header = split_cells(
                            &HEADER_TRIM.replace_all(cap.get(1).map_or("", |m| m.as_str()), ""),
                        );
                        let align = parse_align(cap.get(2).map_or("", |m| m.as_str()));
                        let rows = NPTABLE_ROWS_TRAIL
                            .replace(cap.get(3).map_or("", |m| m.as_str()), "")
                            .into_owned();
                        remaining.drain(..len);
                        let cells = rows.split('\n').map(split_cells).collect();
                        self.tokens.push(Token::Table {
                            header,
                            align,
                            cells,
                        });
                        continue;
                    }
                }
            }

            // setext heading
            if let Some(cap) = captures(&self.rules.lheading, &remaining) {
                let len = cap.get(0).map_or(0, |m| m.as_str().len());
                let depth = if cap.get(2).map_or("", |m| m.as_str()) == "=" {
                    1
                } else {
                    2
                };
                let text = cap.get(1).map_or(String::new(), |m| m.as_str().to_string());
                remaining.drain(..len);
                self.tokens.push(Token::Heading { depth, text });
                continue;
            }

            // thematic break
            if let Some(m) = find(&self.rules.hr, &remaining) {
                let len = m.as_str().len();
                remaining.drain(..len);
                self.tokens.push(Token::Hr);
                continue;
            }

            // blockquote
            if let Some(m) = find(&self.rules.blockquote, &remaining) {
                let matched = m.as_str().to_string();
                remaining.drain(..matched.len());
                self.tokens.push(Token::BlockquoteStart);
                let inner = BQ_PREFIX.replace_all(&matched, "");
                // Keep the caller's top-level state, so a quoted heading is
                // parsed with the surrounding semantics.
                self.token(&inner, top)?;
                self.tokens.push(Token::BlockquoteEnd);
                continue;
            }

            // list
            if let Some(cap) = captures(&self.rules.list, &remaining) {
                let matched = cap.get(0).map_or("", |m| m.as_str()).to_string();
                let bull = cap.get(2).map_or("", |m| m.as_str()).to_string();
                remaining.drain(..matched.len());
                self.tokens.push(Token::ListStart {
                    ordered: bull.len() > 1,
                });

                let items = find_all(&self.rules.item, &matched);
                let count = items.len();
                let mut next_loose = false;
                let mut i = 0;
                while i < count {
                    let raw = items[i];
                    let mut space = raw.len();
                    let mut item = BULLET_STRIP.replace(raw, "").into_owned();

                    // De-indent continuation lines by the bullet prefix
                    // width, or a fixed four columns in pedantic mode.
                    if item.contains("\n ") {
                        space -= item.len();
                        let width = if self.options.pedantic { 4 } else { space };
                        item = outdent(&item, width);
                    }

                    // When the next item's bullet class differs, stop this
                    // list early and re-inject the unconsumed items for a
                    // fresh parse pass.
                    if self.options.smart_lists && i != count - 1 {
                        let next_bull = find(&self.rules.bullet, items[i + 1])
                            .map_or("", |m| m.as_str())
                            .to_string();
                        if bull != next_bull && !(bull.len() > 1 && next_bull.len() > 1) {
                            let tail = items[i + 1..].join("\n");
                            log::debug!(
                                "smart-list backpedal: re-injecting {} item(s)",
                                count - i - 1
                            );
                            remaining.insert_str(0, &tail);
                            i = count - 1;
                        }
                    }

                    let mut loose = next_loose || find(&ITEM_LOOSE, &item).is_some();
                    if i != count - 1 {
                        next_loose = item.ends_with('\n');
                        if !loose {
                            loose = next_loose;
                        }
                    }

                    self.tokens.push(Token::ListItemStart { loose });
                    self.token(&item, false)?;
                    self.tokens.push(Token::ListItemEnd);
                    i += 1;
                }

                self.tokens.push(Token::ListEnd);
                continue;
            }

            // raw HTML block
            if let Some(cap) = captures(&self.rules.html, &remaining) {
                let text = cap.get(0).map_or("", |m| m.as_str()).to_string();
                let pre = matches!(
                    cap.get(1).map(|m| m.as_str()),
                    Some("pre") | Some("script")
                );
                remaining.drain(..text.len());
                if self.options.sanitize {
                    self.tokens.push(Token::Paragraph { text });
                } else {
                    self.tokens.push(Token::Html { text, pre });
                }
                continue;
            }

            // link-reference definition
            if top {
                if let Some(cap) = captures(&self.rules.def, &remaining) {
                    let len = cap.get(0).map_or(0, |m| m.as_str().len());
                    let label = normalize_label(cap.get(1).map_or("", |m| m.as_str()));
                    let href = cap.get(2).map_or(String::new(), |m| m.as_str().to_string());
                    let title = cap.get(3).map(|m| m.as_str().to_string());
                    remaining.drain(..len);
                    self.links.insert(label, LinkDef { href, title });
                    continue;
                }
            }

            // piped table
            if top {
                if let Some(re) = &self.rules.table {
                    if let Some(cap) = captures(re, &remaining) {
                        let len = cap.get(0).map_or(0, |m| m.as_str().len());
                        let header = split_cells(
                            &HEADER_TRIM.replace_all(cap.get(1).map_or("", |m| m.as_str()), ""),
                        );
                        let align = parse_align(cap.get(2).map_or("", |m| m.as_str()));
                        let rows = TABLE_ROWS_TRAIL
                            .replace(cap.get(3).map_or("", |m| m.as_str()), "")
                            .into_owned();
                        remaining.drain(..len);
                        let cells = rows
                            .split('\n')
                            .map(|row| split_cells(&ROW_PIPE_TRIM.replace_all(row, "")))
                            .collect();
                        self.tokens.push(Token::Table {
                            header,
                            align,
                            cells,
                        });
                        continue;
                    }
                }
            }

            // top-level paragraph
            if top {
                if let Some(cap) = captures(&self.rules.paragraph, &remaining) {
                    let len = cap.get(0).map_or(0, |m| m.as_str().len());
                    let mut text = cap.get(1).map_or(String::new(), |m| m.as_str().to_string());
                    remaining.drain(..len);
                    if text.ends_with('\n') {
                        text.pop();
                    }
                    self.tokens.push(Token::Paragraph { text });
                    continue;
                }
            }

            // fallback text line; unreachable at top level
            if let Some(m) = find(&self.rules.text, &remaining) {
                let text = m.as_str().to_string();
                remaining.drain(..text.len());
                self.tokens.push(Token::Text { text });
                continue;
            }

            let offset = base_len.saturating_sub(remaining.len());
            return Err(CompileError::StructuralLex {
                offset,
                byte: remaining.as_bytes()[0],
            });
        }

        Ok(())
    }
}

fn outdent(text: &str, width: usize) -> String {
    text.split('\n')
        .map(|line| {
            let strip = line
                .bytes()
                .take(width)
                .take_while(|&b| b == b' ')
                .count();
            &line[strip..]
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_cells(row: &str) -> Vec<String> {
    CELL_SPLIT.split(row).map(String::from).collect()
}

fn parse_align(src: &str) -> Vec<TableAlign> {
    let trimmed = ALIGN_TRIM.replace_all(src, "");
    CELL_SPLIT
        .split(&trimmed)
        .map(|cell| {
            if ALIGN_RIGHT.is_match(cell) {
                TableAlign::Right
            } else if ALIGN_CENTER.is_match(cell) {
                TableAlign::Center
            } else if ALIGN_LEFT.is_match(cell) {
                TableAlign::Left
            } else {
                TableAlign::None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        lex(src, &Options::default()).expect("lex").tokens
    }

    #[test]
    fn heading_and_paragraph() {
        let toks = tokens("# Title\n\nBody text\n");
        assert_eq!(
            toks,
            vec![
                Token::Heading {
                    depth: 1,
                    text: "Title".to_string()
                },
                Token::Paragraph {
                    text: "Body text".to_string()
                },
            ]
        );
    }

    #[test]
    fn alignment_row_maps_to_align_variants() {
        let toks = tokens("| a | b | c |\n| :-- | --: | :-: |\n| 1 | 2 | 3 |\n");
        match &toks[0] {
            Token::Table {
                header,
                align,
                cells,
            } => {
                assert_eq!(header, &["a", "b", "c"]);
                assert_eq!(
                    align,
                    &[TableAlign::Left, TableAlign::Right, TableAlign::Center]
                );
                assert_eq!(cells, &[vec!["1", "2", "3"]]);
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn pipeless_table_needs_top_level() {
        let toks = tokens("a | b\n- | -\n1 | 2\n");
        assert!(matches!(toks[0], Token::Table { .. }));
    }

    #[test]
    fn definitions_are_collected_with_normalized_labels() {
        let result = lex("[ Foo  BAR ]: /x \"T\"\n", &Options::default()).expect("lex");
        let def = result.links.get("foo bar").expect("definition");
        assert_eq!(def.href, "/x");
        assert_eq!(def.title.as_deref(), Some("T"));
        assert!(result.tokens.is_empty());
    }

    #[test]
    fn quoted_heading_keeps_surrounding_semantics() {
        let toks = tokens("> # Quote\n");
        assert_eq!(
            toks,
            vec![
                Token::BlockquoteStart,
                Token::Heading {
                    depth: 1,
                    text: "Quote".to_string()
                },
                Token::BlockquoteEnd,
            ]
        );
    }

    #[test]
    fn tight_and_loose_items() {
        let toks = tokens("- a\n- b\n");
        assert!(toks.contains(&Token::ListItemStart { loose: false }));
        assert!(!toks.contains(&Token::ListItemStart { loose: true }));

        let toks = tokens("- a\n\n- b\n");
        assert!(toks.contains(&Token::ListItemStart { loose: true }));
        assert!(!toks.contains(&Token::ListItemStart { loose: false }));
    }

    #[test]
    fn smart_lists_backpedal_on_bullet_class_change() {
        let options = Options {
            smart_lists: true,
            ..Options::default()
        };
        let toks = lex("- a\n1. b\n", &options).expect("lex").tokens;
        let starts: Vec<_> = toks
            .iter()
            .filter_map(|t| match t {
                Token::ListStart { ordered } => Some(*ordered),
                _ => None,
            })
            .collect();
        assert_eq!(starts, vec![false, true]);
    }

    #[test]
    fn without_smart_lists_one_list_swallows_both() {
        let toks = tokens("- a\n1. b\n");
        let start_count = toks
            .iter()
            .filter(|t| matches!(t, Token::ListStart { .. }))
            .count();
        assert_eq!(start_count, 1);
    }

    #[test]
    fn backpedal_inside_nested_list_stays_balanced() {
        let options = Options {
            smart_lists: true,
            ..Options::default()
        };
        let toks = lex("- outer\n  - a\n  1. b\n", &options).expect("lex").tokens;
        let mut depth = 0i32;
        for t in &toks {
            match t {
                Token::ListStart { .. } | Token::ListItemStart { .. } | Token::BlockquoteStart => {
                    depth += 1
                }
                Token::ListEnd | Token::ListItemEnd | Token::BlockquoteEnd => depth -= 1,
                _ => {}
            }
            assert!(depth >= 0, "end marker before its start");
        }
        assert_eq!(depth, 0, "unclosed container in token stream");
    }

    #[test]
    fn sanitize_turns_html_block_into_paragraph() {
        let options = Options {
            sanitize: true,
            ..Options::default()
        };
        let toks = lex("<div>x</div>", &options).expect("lex").tokens;
        assert!(matches!(toks[0], Token::Paragraph { .. }));
    }

    #[test]
    fn html_block_marks_pre() {
        let toks = tokens("<pre>x</pre>\n");
        assert_eq!(
            toks,
            vec![Token::Html {
                text: "<pre>x</pre>\n".to_string(),
                pre: true
            }]
        );
    }

    #[test]
    fn inline_only_tags_fall_through_to_paragraph() {
        let toks = tokens("<em>x</em> rest\n");
        assert!(matches!(toks[0], Token::Paragraph { .. }));
    }

    #[test]
    fn indented_code_outdents_and_trims() {
        let toks = tokens("    let x;\n    let y;\n");
        assert_eq!(
            toks,
            vec![Token::Code {
                text: "let x;\nlet y;".to_string()
            }]
        );
    }

    #[test]
    fn crlf_and_tabs_are_preprocessed() {
        let toks = tokens("# A\r\n\r\n\tcode\n");
        assert_eq!(
            toks,
            vec![
                Token::Heading {
                    depth: 1,
                    text: "A".to_string()
                },
                Token::Code {
                    text: "code".to_string()
                },
            ]
        );
    }
}
