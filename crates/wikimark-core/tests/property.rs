//! Randomized totality tests: whatever printable soup comes in, the
//! compiler must return cleanly and the token stream must stay well nested.

use wikimark_core::{Options, Token, compile, lex};

const CASES: usize = 200;
const MAX_LEN: usize = 400;

const CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 \n#*`_->|[]()!~:.=+\"'\\";

struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    fn gen_range(&mut self, bound: usize) -> usize {
        (self.next_u64() >> 33) as usize % bound
    }
}

fn random_document(rng: &mut Lcg) -> String {
    let len = rng.gen_range(MAX_LEN + 1);
    (0..len)
        .map(|_| CHARSET[rng.gen_range(CHARSET.len())] as char)
        .collect()
}

#[test]
fn compile_is_total_on_printable_input() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = Lcg::new(0x51ab_3c6e_9d24_7f01);
    for case in 0..CASES {
        let source = random_document(&mut rng);
        if let Err(err) = compile(&source, &Options::default()) {
            return Err(format!("case {case}: {err}\nsource:\n{source:?}").into());
        }
    }
    Ok(())
}

#[test]
fn compile_is_total_across_dialects() -> Result<(), Box<dyn std::error::Error>> {
    let dialects = [
        Options {
            gfm: false,
            tables: false,
            ..Options::default()
        },
        Options {
            tables: false,
            ..Options::default()
        },
        Options {
            gfm: false,
            tables: false,
            pedantic: true,
            ..Options::default()
        },
        Options {
            breaks: true,
            smart_lists: true,
            smartypants: true,
            ..Options::default()
        },
        Options {
            sanitize: true,
            ..Options::default()
        },
    ];
    let mut rng = Lcg::new(0x0dd0_91c5_44e2_b713);
    for case in 0..CASES / 2 {
        let source = random_document(&mut rng);
        for (i, options) in dialects.iter().enumerate() {
            if let Err(err) = compile(&source, options) {
                return Err(format!("case {case} dialect {i}: {err}\nsource:\n{source:?}").into());
            }
        }
    }
    Ok(())
}

#[test]
fn token_stream_stays_well_nested() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = Lcg::new(0x7e3f_a90b_1c56_d2e9);
    for case in 0..CASES {
        let source = random_document(&mut rng);
        let tokens = lex(&source, &Options::default())
            .map_err(|err| format!("case {case}: {err}"))?
            .tokens;
        check_nesting(&tokens).map_err(|err| format!("case {case}: {err}\nsource:\n{source:?}"))?;
    }
    Ok(())
}

fn check_nesting(tokens: &[Token]) -> Result<(), String> {
    let mut stack: Vec<&'static str> = Vec::new();
    for token in tokens {
        let (open, close) = match token {
            Token::BlockquoteStart => (Some("blockquote"), None),
            Token::ListStart { .. } => (Some("list"), None),
            Token::ListItemStart { .. } => (Some("item"), None),
            Token::BlockquoteEnd => (None, Some("blockquote")),
            Token::ListEnd => (None, Some("list")),
            Token::ListItemEnd => (None, Some("item")),
            _ => (None, None),
        };
        if let Some(kind) = open {
            stack.push(kind);
        }
        if let Some(kind) = close {
            match stack.pop() {
                Some(top) if top == kind => {}
                other => {
                    return Err(format!("closed {kind} but innermost open was {other:?}"));
                }
            }
        }
    }
    if stack.is_empty() {
        Ok(())
    } else {
        Err(format!("unclosed containers at end of stream: {stack:?}"))
    }
}
