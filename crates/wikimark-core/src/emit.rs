//! Block renderer: a single-pass, stack-free walk over the token sequence.
//!
//! The renderer exclusively owns the token sequence once lexing hands it
//! off; consumption happens through a forward index cursor with one-token
//! lookahead, and container tokens recurse until their matching end marker.

use std::collections::HashMap;

use crate::error::CompileError;
use crate::escape::escape;
use crate::inline::InlineLexer;
use crate::options::Options;
use crate::token::{LinkTable, TableAlign, Token};

pub(crate) fn render(
    tokens: &[Token],
    links: &LinkTable,
    options: &Options,
) -> Result<String, CompileError> {
    let mut renderer = Renderer {
        tokens,
        pos: 0,
        highlights: collect_highlights(tokens, options),
        inline: InlineLexer::new(links, options),
        options,
    };
    renderer.parse()
}

// Dry run for the highlight hook: one pending request per code token, all
// issued before any HTML is assembled. Completion order does not matter; a
// request returning `None` or the unchanged text leaves no entry, and the
// original text is escaped during assembly.
fn collect_highlights(tokens: &[Token], options: &Options) -> HashMap<usize, String> {
    let mut replacements = HashMap::new();
    let Some(hook) = options.highlight.as_ref() else {
        return replacements;
    };
    for (idx, token) in tokens.iter().enumerate() {
        let (text, lang) = match token {
            Token::Code { text } => (text, None),
            Token::Fences { lang, text } => (text, lang.as_deref()),
            _ => continue,
        };
        if let Some(replacement) = hook(text, lang) {
            if replacement != *text {
                replacements.insert(idx, replacement);
            }
        }
    }
    replacements
}

struct Renderer<'a> {
    tokens: &'a [Token],
    pos: usize,
    highlights: HashMap<usize, String>,
    inline: InlineLexer<'a>,
    options: &'a Options,
}

impl<'a> Renderer<'a> {
    fn parse(&mut self) -> Result<String, CompileError> {
        let mut out = String::new();
        while let Some(token) = self.next() {
            out.push_str(&self.tok(token, self.pos - 1)?);
        }
        Ok(out)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn tok(&mut self, token: &'a Token, idx: usize) -> Result<String, CompileError> {
        match token {
            Token::Space => Ok(String::new()),
            Token::Hr => Ok("<hr>\n".to_string()),
            Token::Heading { depth, text } => {
                let content = self.inline.output(text)?;
                Ok(format!("<h{depth}>{content}</h{depth}>\n"))
            }
            Token::Code { text } => self.code_block(idx, text, None),
            Token::Fences { lang, text } => self.code_block(idx, text, lang.as_deref()),
            Token::Table {
                header,
                align,
                cells,
            } => {
                let mut body = String::from("<thead>\n<tr>\n");
                for (i, cell) in header.iter().enumerate() {
                    let content = self.inline.output(cell)?;
                    body.push_str(&cell_markup("th", align.get(i).copied(), &content));
                }
                body.push_str("</tr>\n</thead>\n<tbody>\n");
                for row in cells {
                    body.push_str("<tr>\n");
                    for (j, cell) in row.iter().enumerate() {
                        let content = self.inline.output(cell)?;
                        body.push_str(&cell_markup("td", align.get(j).copied(), &content));
                    }
                    body.push_str("</tr>\n");
                }
                body.push_str("</tbody>\n");
                Ok(format!("<table>\n{body}</table>\n"))
            }
            Token::BlockquoteStart => {
                let body = self.container(|t| matches!(t, Token::BlockquoteEnd))?;
                Ok(format!("<blockquote>\n{body}</blockquote>\n"))
            }
            Token::ListStart { ordered } => {
                let tag = if *ordered { "ol" } else { "ul" };
                let body = self.container(|t| matches!(t, Token::ListEnd))?;
                Ok(format!("<{tag}>\n{body}</{tag}>\n"))
            }
            Token::ListItemStart { loose: false } => {
                let mut body = String::new();
                while let Some(inner) = self.next() {
                    if matches!(inner, Token::ListItemEnd) {
                        break;
                    }
                    let idx = self.pos - 1;
                    // Adjacent text lines inside a tight item are joined and
                    // inline-compiled as one unit, so a span broken across
                    // physical lines keeps its boundaries.
                    let piece = match inner {
                        Token::Text { text } => self.parse_text(text)?,
                        _ => self.tok(inner, idx)?,
                    };
                    body.push_str(&piece);
                }
                Ok(format!("<li>{body}</li>\n"))
            }
            Token::ListItemStart { loose: true } => {
                let body = self.container(|t| matches!(t, Token::ListItemEnd))?;
                Ok(format!("<li>{body}</li>\n"))
            }
            Token::Html { text, pre } => {
                if !*pre && !self.options.pedantic {
                    self.inline.output(text)
                } else {
                    Ok(text.clone())
                }
            }
            Token::Paragraph { text } => {
                let content = self.inline.output(text)?;
                Ok(format!("<p>{content}</p>\n"))
            }
            Token::Text { text } => {
                let content = self.parse_text(text)?;
                Ok(format!("<p>{content}</p>\n"))
            }
            // Stray end markers cannot appear in a well-nested sequence;
            // container arms consume them.
            Token::BlockquoteEnd | Token::ListEnd | Token::ListItemEnd => Ok(String::new()),
        }
    }

    fn container(&mut self, is_end: impl Fn(&Token) -> bool) -> Result<String, CompileError> {
        let mut body = String::new();
        while let Some(inner) = self.next() {
            if is_end(inner) {
                break;
            }
            let idx = self.pos - 1;
            body.push_str(&self.tok(inner, idx)?);
        }
        Ok(body)
    }

    fn parse_text(&mut self, first: &str) -> Result<String, CompileError> {
        let mut body = first.to_string();
        while let Some(Token::Text { text }) = self.peek() {
            self.pos += 1;
            body.push('\n');
            body.push_str(text);
        }
        self.inline.output(&body)
    }

    fn code_block(
        &self,
        idx: usize,
        text: &str,
        lang: Option<&str>,
    ) -> Result<String, CompileError> {
        let body = match self.highlights.get(&idx) {
            Some(replacement) => replacement.clone(),
            None => escape(text, true),
        };
        let class = lang
            .map(|l| format!(" class=\"{}{}\"", self.options.lang_prefix, escape(l, false)))
            .unwrap_or_default();
        Ok(format!("<pre><code{class}>{body}</code></pre>\n"))
    }
}

fn cell_markup(tag: &str, align: Option<TableAlign>, content: &str) -> String {
    match align.and_then(|a| a.attr()) {
        Some(dir) => format!("<{tag} align=\"{dir}\">{content}</{tag}>\n"),
        None => format!("<{tag}>{content}</{tag}>\n"),
    }
}
