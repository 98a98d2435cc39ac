use std::collections::HashMap;

/// One block-level construct produced by the lexer.
///
/// The sequence is flat and strictly well-nested: every `*Start` variant has
/// exactly one matching `*End` later in the sequence. It is produced once per
/// compile call and consumed by the renderer through a forward cursor, never
/// mutated.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Token {
    Space,
    Code {
        text: String,
    },
    Fences {
        lang: Option<String>,
        text: String,
    },
    Heading {
        depth: u8,
        text: String,
    },
    Table {
        header: Vec<String>,
        align: Vec<TableAlign>,
        cells: Vec<Vec<String>>,
    },
    Hr,
    BlockquoteStart,
    BlockquoteEnd,
    ListStart {
        ordered: bool,
    },
    ListEnd,
    ListItemStart {
        loose: bool,
    },
    ListItemEnd,
    Html {
        text: String,
        pre: bool,
    },
    Paragraph {
        text: String,
    },
    Text {
        text: String,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TableAlign {
    None,
    Left,
    Center,
    Right,
}

impl TableAlign {
    pub(crate) fn attr(self) -> Option<&'static str> {
        match self {
            TableAlign::None => None,
            TableAlign::Left => Some("left"),
            TableAlign::Center => Some("center"),
            TableAlign::Right => Some("right"),
        }
    }
}

/// Target of a reference-style link definition.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LinkDef {
    pub href: String,
    pub title: Option<String>,
}

/// Label-to-target table, populated during the top-level block lex pass and
/// read-only afterwards. A reference appearing before its definition in the
/// document still resolves, because rendering starts only once lexing is done.
pub type LinkTable = HashMap<String, LinkDef>;

/// Trim, collapse internal whitespace, case-fold.
pub(crate) fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::normalize_label;

    #[test]
    fn labels_normalize() {
        assert_eq!(normalize_label("  Foo   BAR "), "foo bar");
        assert_eq!(normalize_label("x"), "x");
    }
}
