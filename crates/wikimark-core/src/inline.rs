//! Inline lexer and compiler: turns one text span into inline HTML.

use std::cell::Cell;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};

use once_cell::sync::Lazy;

use crate::error::CompileError;
use crate::escape::escape;
use crate::grammar::{InlineRules, captures, find};
use crate::options::Options;
use crate::token::{LinkDef, LinkTable, normalize_label};

static SINGLE_QUOTES: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"'([^']*)'").unwrap());
static DOUBLE_QUOTES: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r#""([^"]*)""#).unwrap());

pub(crate) struct InlineLexer<'a> {
    rules: &'static InlineRules,
    links: &'a LinkTable,
    options: &'a Options,
    rng: Cell<u64>,
}

impl<'a> InlineLexer<'a> {
    pub(crate) fn new(links: &'a LinkTable, options: &'a Options) -> Self {
        Self {
            rules: InlineRules::select(options),
            links,
            options,
            rng: Cell::new(RandomState::new().build_hasher().finish() | 1),
        }
    }

    /// Compiles one span, trying each rule anchored at the cursor.
    pub(crate) fn output(&self, span: &str) -> Result<String, CompileError> {
        let base_len = span.len();
        let mut src = span;
        let mut out = String::with_capacity(span.len());

        while !src.is_empty() {
            // escaped character
            if let Some(cap) = captures(&self.rules.escape, src) {
                let len = cap.get(0).map_or(0, |m| m.as_str().len());
                out.push_str(cap.get(1).map_or("", |m| m.as_str()));
                src = &src[len..];
                continue;
            }

            // autolink
            if let Some(cap) = captures(&self.rules.autolink, src) {
                let len = cap.get(0).map_or(0, |m| m.as_str().len());
                let target = cap.get(1).map_or("", |m| m.as_str());
                let (href, text) = if cap.get(2).map_or("", |m| m.as_str()) == "@" {
                    let text = self.mangle(target.strip_prefix("mailto:").unwrap_or(target));
                    (format!("{}{}", self.mangle("mailto:"), text), text)
                } else {
                    let text = escape(target, false);
                    (text.clone(), text)
                };
                out.push_str(&format!("<a href=\"{href}\">{text}</a>"));
                src = &src[len..];
                continue;
            }

            // bare URL
            if let Some(re) = &self.rules.url {
                if let Some(cap) = captures(re, src) {
                    let len = cap.get(0).map_or(0, |m| m.as_str().len());
                    let text = escape(cap.get(1).map_or("", |m| m.as_str()), false);
                    out.push_str(&format!("<a href=\"{text}\">{text}</a>"));
                    src = &src[len..];
                    continue;
                }
            }

            // raw inline tag
            if let Some(m) = find(&self.rules.tag, src) {
                let raw = m.as_str();
                if self.options.sanitize {
                    out.push_str(&escape(raw, false));
                } else {
                    out.push_str(raw);
                }
                src = &src[raw.len()..];
                continue;
            }

            // link or image with inline target
            if let Some(cap) = captures(&self.rules.link, src) {
                let whole = cap.get(0).map_or("", |m| m.as_str());
                let def = LinkDef {
                    href: cap.get(2).map_or(String::new(), |m| m.as_str().to_string()),
                    title: cap.get(3).map(|m| m.as_str().to_string()),
                };
                let text = cap.get(1).map_or("", |m| m.as_str());
                let rendered = self.output_link(whole.starts_with('!'), text, &def)?;
                out.push_str(&rendered);
                src = &src[whole.len()..];
                continue;
            }

            // reference-style link or image
            if let Some(cap) = captures(&self.rules.reflink, src)
                .or_else(|| captures(&self.rules.nolink, src))
            {
                let whole = cap.get(0).map_or("", |m| m.as_str());
                let label = match cap.get(2) {
                    Some(m) if !m.as_str().is_empty() => m.as_str(),
                    _ => cap.get(1).map_or("", |m| m.as_str()),
                };
                match self.links.get(&normalize_label(label)) {
                    Some(def) if !def.href.is_empty() => {
                        let text = cap.get(1).map_or("", |m| m.as_str());
                        let rendered = self.output_link(whole.starts_with('!'), text, def)?;
                        out.push_str(&rendered);
                        src = &src[whole.len()..];
                    }
                    _ => {
                        // Undefined label: emit the leading bracket literally
                        // and re-lex from the next character.
                        out.push(whole.chars().next().unwrap_or('['));
                        src = &src[1..];
                    }
                }
                continue;
            }

            // bold
            if let Some(cap) = captures(&self.rules.strong, src) {
                let len = cap.get(0).map_or(0, |m| m.as_str().len());
                let inner = cap.get(2).or(cap.get(1)).map_or("", |m| m.as_str());
                let rendered = self.output(inner)?;
                out.push_str(&format!("<strong>{rendered}</strong>"));
                src = &src[len..];
                continue;
            }

            // italic
            if let Some(cap) = captures(&self.rules.em, src) {
                let len = cap.get(0).map_or(0, |m| m.as_str().len());
                let inner = cap.get(2).or(cap.get(1)).map_or("", |m| m.as_str());
                let rendered = self.output(inner)?;
                out.push_str(&format!("<em>{rendered}</em>"));
                src = &src[len..];
                continue;
            }

            // code span
            if let Some(cap) = captures(&self.rules.code, src) {
                let len = cap.get(0).map_or(0, |m| m.as_str().len());
                let inner = escape(cap.get(2).map_or("", |m| m.as_str()), true);
                out.push_str(&format!("<code>{inner}</code>"));
                src = &src[len..];
                continue;
            }

            // explicit line break
            if let Some(m) = find(&self.rules.br, src) {
                out.push_str("<br>");
                src = &src[m.as_str().len()..];
                continue;
            }

            // strikethrough
            if let Some(re) = &self.rules.del {
                if let Some(cap) = captures(re, src) {
                    let len = cap.get(0).map_or(0, |m| m.as_str().len());
                    let rendered = self.output(cap.get(1).map_or("", |m| m.as_str()))?;
                    out.push_str(&format!("<del>{rendered}</del>"));
                    src = &src[len..];
                    continue;
                }
            }

            // plain text run
            if let Some(m) = find(&self.rules.text, src) {
                let raw = m.as_str();
                out.push_str(&escape(&self.smartypants(raw), false));
                src = &src[raw.len()..];
                continue;
            }

            return Err(CompileError::StructuralLex {
                offset: base_len.saturating_sub(src.len()),
                byte: src.as_bytes()[0],
            });
        }

        Ok(out)
    }

    fn output_link(&self, image: bool, text: &str, def: &LinkDef) -> Result<String, CompileError> {
        let href = escape(&def.href, false);
        let title = def
            .title
            .as_deref()
            .map(|t| format!(" title=\"{}\"", escape(t, false)))
            .unwrap_or_default();
        if image {
            Ok(format!(
                "<img src=\"{href}\" alt=\"{}\"{title}>",
                escape(text, false)
            ))
        } else {
            Ok(format!("<a href=\"{href}\"{title}>{}</a>", self.output(text)?))
        }
    }

    fn smartypants(&self, text: &str) -> String {
        if !self.options.smartypants {
            return text.to_string();
        }
        let text = text.replace("--", "—");
        let text = SINGLE_QUOTES.replace_all(&text, "‘$1’");
        let text = DOUBLE_QUOTES.replace_all(&text, "“$1”");
        text.replace("...", "…")
    }

    // Obfuscates a mailto target: each character becomes a decimal or hex
    // numeric reference, picked at random per character.
    fn mangle(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() * 5);
        for ch in text.chars() {
            let code = ch as u32;
            if self.next_rand() & 1 == 1 {
                out.push_str(&format!("&#x{code:x};"));
            } else {
                out.push_str(&format!("&#{code};"));
            }
        }
        out
    }

    fn next_rand(&self) -> u64 {
        let mut x = self.rng.get();
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng.set(x);
        x
    }
}
