//! Template tokenizer.
//!
//! Splits template source into literal text, block markers and
//! interpolations. Every token keeps its raw text so unmatched markers can be
//! written back verbatim.

/// Structural block kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    If,
    Unless,
    Each,
}

impl BlockKind {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "if" => Some(BlockKind::If),
            "unless" => Some(BlockKind::Unless),
            "each" => Some(BlockKind::Each),
            _ => None,
        }
    }
}

/// Which placeholder syntax an interpolation used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Braces {
    /// `{{expr}}`
    Double,
    /// Legacy `{path}`
    Single,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    Text(&'a str),
    Open {
        kind: BlockKind,
        arg: &'a str,
        raw: &'a str,
    },
    Else {
        raw: &'a str,
    },
    Close {
        kind: BlockKind,
        raw: &'a str,
    },
    Expr {
        source: &'a str,
        braces: Braces,
        raw: &'a str,
    },
}

/// Tokenize template source. Never fails; anything that is not a
/// recognizable marker is text.
pub fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;
    let mut closers_left = true;
    let bytes = source.as_bytes();

    while pos < bytes.len() {
        if bytes[pos] != b'{' {
            pos += 1;
            continue;
        }

        let (token, end) = if bytes.get(pos + 1) == Some(&b'{') {
            let closer = if closers_left {
                source[pos + 2..].find("}}")
            } else {
                None
            };
            match closer {
                Some(offset) => {
                    let end = pos + 2 + offset + 2;
                    let inner = &source[pos + 2..end - 2];
                    (classify(inner, &source[pos..end]), end)
                }
                // Lone `{{` is text; legacy placeholders after it still count
                None => {
                    closers_left = false;
                    (None, pos + 2)
                }
            }
        } else {
            match single_brace(&source[pos..]) {
                Some(len) => {
                    let raw = &source[pos..pos + len];
                    (
                        Some(Token::Expr {
                            source: raw[1..len - 1].trim(),
                            braces: Braces::Single,
                            raw,
                        }),
                        pos + len,
                    )
                }
                None => (None, pos + 1),
            }
        };

        // Unknown `{{#...}}` markers stay part of the surrounding text
        if let Some(token) = token {
            if text_start < pos {
                tokens.push(Token::Text(&source[text_start..pos]));
            }
            tokens.push(token);
            text_start = end;
        }
        pos = end;
    }

    if text_start < source.len() {
        tokens.push(Token::Text(&source[text_start..]));
    }
    tokens
}

fn classify<'a>(inner: &'a str, raw: &'a str) -> Option<Token<'a>> {
    let trimmed = inner.trim();

    if let Some(rest) = trimmed.strip_prefix('#') {
        let (keyword, arg) = split_keyword(rest);
        return BlockKind::from_keyword(keyword).map(|kind| Token::Open { kind, arg, raw });
    }

    if let Some(rest) = trimmed.strip_prefix('/') {
        return BlockKind::from_keyword(rest.trim()).map(|kind| Token::Close { kind, raw });
    }

    if trimmed == "else" {
        return Some(Token::Else { raw });
    }

    Some(Token::Expr {
        source: trimmed,
        braces: Braces::Double,
        raw,
    })
}

fn split_keyword(rest: &str) -> (&str, &str) {
    match rest.find(char::is_whitespace) {
        Some(idx) => (&rest[..idx], rest[idx..].trim()),
        None => (rest, ""),
    }
}

/// Length of a legacy `{path}` placeholder at the start of `s`, if any.
///
/// The inner text must be a dotted identifier path.
fn single_brace(s: &str) -> Option<usize> {
    let close = s.find('}')?;
    let inner = s[1..close].trim();
    if is_path(inner) {
        Some(close + 1)
    } else {
        None
    }
}

pub(crate) fn is_path(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        })
}
