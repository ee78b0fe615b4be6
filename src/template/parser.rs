//! Builds a node tree from tokens.

use super::lexer::{tokenize, BlockKind, Braces, Token};

/// Deepest block nesting built into the tree. Openers beyond it, and their
/// matching closers, stay literal text so evaluation and drop stay bounded.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Expr {
        source: String,
        braces: Braces,
        raw: String,
    },
    Block {
        kind: BlockKind,
        arg: String,
        body: Vec<Node>,
        otherwise: Option<Vec<Node>>,
    },
}

struct Frame<'a> {
    kind: BlockKind,
    arg: &'a str,
    open_raw: &'a str,
    body: Vec<Node>,
    else_raw: Option<&'a str>,
    otherwise: Vec<Node>,
}

impl<'a> Frame<'a> {
    fn push(&mut self, node: Node) {
        if self.else_raw.is_some() {
            self.otherwise.push(node);
        } else {
            self.body.push(node);
        }
    }

    fn into_block(self) -> Node {
        Node::Block {
            kind: self.kind,
            arg: self.arg.to_string(),
            body: self.body,
            otherwise: self.else_raw.map(|_| self.otherwise),
        }
    }

    /// An unclosed block degrades to its literal markers around its children
    fn into_literal(self) -> Vec<Node> {
        let mut nodes = Vec::with_capacity(self.body.len() + self.otherwise.len() + 2);
        nodes.push(Node::Text(self.open_raw.to_string()));
        nodes.extend(self.body);
        if let Some(raw) = self.else_raw {
            nodes.push(Node::Text(raw.to_string()));
            nodes.extend(self.otherwise);
        }
        nodes
    }
}

/// Parse template source into nodes.
///
/// Blocks nest up to [`MAX_DEPTH`]. Stray closers and `{{else}}` markers
/// outside a block are kept as text, as are openers never closed.
pub fn parse(source: &str) -> Vec<Node> {
    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<Frame<'_>> = Vec::new();
    // Kinds of openers past the depth limit, still awaiting their closers
    let mut overflow: Vec<BlockKind> = Vec::new();

    fn emit(root: &mut Vec<Node>, stack: &mut [Frame<'_>], node: Node) {
        match stack.last_mut() {
            Some(frame) => frame.push(node),
            None => push_node(root, node),
        }
    }

    for token in tokenize(source) {
        match token {
            Token::Text(text) => emit(&mut root, &mut stack, Node::Text(text.to_string())),
            Token::Expr { source, braces, raw } => emit(
                &mut root,
                &mut stack,
                Node::Expr {
                    source: source.to_string(),
                    braces,
                    raw: raw.to_string(),
                },
            ),
            Token::Open { kind, raw, .. } if stack.len() >= MAX_DEPTH => {
                if overflow.is_empty() {
                    tracing::warn!(max_depth = MAX_DEPTH, "Template nesting too deep, keeping inner blocks as text");
                }
                overflow.push(kind);
                emit(&mut root, &mut stack, Node::Text(raw.to_string()));
            }
            Token::Open { kind, arg, raw } => stack.push(Frame {
                kind,
                arg,
                open_raw: raw,
                body: Vec::new(),
                else_raw: None,
                otherwise: Vec::new(),
            }),
            Token::Else { raw } => match stack.last_mut() {
                Some(frame) if overflow.is_empty() && frame.else_raw.is_none() => {
                    frame.else_raw = Some(raw)
                }
                _ => emit(&mut root, &mut stack, Node::Text(raw.to_string())),
            },
            Token::Close { kind, raw } if overflow.last() == Some(&kind) => {
                overflow.pop();
                emit(&mut root, &mut stack, Node::Text(raw.to_string()));
            }
            Token::Close { kind, raw } => {
                if overflow.is_empty() && stack.last().map(|frame| frame.kind) == Some(kind) {
                    if let Some(frame) = stack.pop() {
                        emit(&mut root, &mut stack, frame.into_block());
                    }
                } else {
                    emit(&mut root, &mut stack, Node::Text(raw.to_string()));
                }
            }
        }
    }

    while let Some(frame) = stack.pop() {
        for node in frame.into_literal() {
            emit(&mut root, &mut stack, node);
        }
    }

    root
}

/// Append a node, merging adjacent text
fn push_node(nodes: &mut Vec<Node>, node: Node) {
    if let (Some(Node::Text(last)), Node::Text(text)) = (nodes.last_mut(), &node) {
        last.push_str(text);
        return;
    }
    nodes.push(node);
}
