//! A configurable Markdown-dialect-to-HTML compiler.
//!
//! Raw text goes through a two-phase lexer: the block lexer produces a flat,
//! well-nested token sequence and a link-reference table, and the renderer
//! walks the sequence once, delegating span text to the inline compiler.

mod emit;
mod error;
mod escape;
mod grammar;
mod inline;
mod lexer;
mod options;
mod token;

pub use error::CompileError;
pub use lexer::{LexResult, lex};
pub use options::{HighlightFn, Options};
pub use token::{LinkDef, LinkTable, TableAlign, Token};

/// Compiles a document to HTML.
///
/// With `options.silent` set, an internal structural failure yields a
/// fallback fragment carrying the escaped error message instead of an `Err`.
pub fn compile(src: &str, options: &Options) -> Result<String, CompileError> {
    match compile_inner(src, options) {
        Ok(html) => Ok(html),
        Err(err) if options.silent => {
            log::warn!("structural failure, emitting fallback: {err}");
            Ok(error_fallback(&err))
        }
        Err(err) => Err(err),
    }
}

/// Callback-style variant of [`compile`], for callers wired to a
/// completion-passing highlighter surface. Same semantics otherwise.
pub fn compile_with<F>(src: &str, options: &Options, done: F)
where
    F: FnOnce(Result<String, CompileError>),
{
    done(compile(src, options));
}

fn compile_inner(src: &str, options: &Options) -> Result<String, CompileError> {
    let LexResult { tokens, links } = lexer::lex(src, options)?;
    emit::render(&tokens, &links, options)
}

fn error_fallback(err: &CompileError) -> String {
    format!(
        "<p>An error occurred:</p><pre>{}</pre>",
        escape::escape(&err.to_string(), true)
    )
}
