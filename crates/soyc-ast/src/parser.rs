//! Parser for the HTML-relevant subset of the template language.
//!
//! Handles text, HTML open/close/self-closing tags (static or `{$expr}`
//! names), comments, prints and the block commands that shape control flow:
//! `if`/`elseif`/`else`, `switch`/`case`/`default`, `for`, `call`/`param`,
//! `msg`, `let` and `velog`. Attribute text is kept verbatim and not
//! interpreted.

use serde::Serialize;
use soyc_source::LineIndex;
use soyc_source::Span;
use thiserror::Error;

use crate::BlockKind;
use crate::Expr;
use crate::HtmlTag;
use crate::NodeId;
use crate::NodeKind;
use crate::TagName;
use crate::Tree;

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
pub enum ParseError {
    #[error("Unterminated command")]
    UnterminatedCommand { span: Span },
    #[error("Unterminated HTML tag")]
    UnterminatedTag { span: Span },
    #[error("Unexpected '{{{command}}}'")]
    UnexpectedCommand { command: String, span: Span },
    #[error("'{{{command}}}' is never closed")]
    UnclosedCommand { command: String, span: Span },
    #[error("Invalid '{{{command}}}': {message}")]
    InvalidCommand {
        command: String,
        message: String,
        span: Span,
    },
    #[error("Invalid expression: {message}")]
    InvalidExpression { message: String, span: Span },
}

impl ParseError {
    #[must_use]
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnterminatedCommand { span }
            | ParseError::UnterminatedTag { span }
            | ParseError::UnexpectedCommand { span, .. }
            | ParseError::UnclosedCommand { span, .. }
            | ParseError::InvalidCommand { span, .. }
            | ParseError::InvalidExpression { span, .. } => *span,
        }
    }
}

/// Parse template source into a [`Tree`].
pub fn parse_template(source: &str) -> Result<Tree, ParseError> {
    Parser::new(source).parse()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameKind {
    Root,
    If,
    IfBranch,
    Switch,
    SwitchBranch,
    For,
    Call,
    Block(BlockKind),
}

impl FrameKind {
    fn command(self) -> &'static str {
        match self {
            FrameKind::Root => "template",
            FrameKind::If | FrameKind::IfBranch => "if",
            FrameKind::Switch | FrameKind::SwitchBranch => "switch",
            FrameKind::For => "for",
            FrameKind::Call => "call",
            FrameKind::Block(kind) => kind.command(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Frame {
    node: NodeId,
    kind: FrameKind,
    start: usize,
}

struct Parser<'s> {
    source: &'s str,
    pos: usize,
    text_start: Option<usize>,
    tree: Tree,
    stack: Vec<Frame>,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str) -> Self {
        let tree = Tree::new("template");
        let root = Frame {
            node: tree.root(),
            kind: FrameKind::Root,
            start: 0,
        };
        Self {
            source,
            pos: 0,
            text_start: None,
            tree,
            stack: vec![root],
        }
    }

    fn parse(mut self) -> Result<Tree, ParseError> {
        while self.pos < self.source.len() {
            let rest = &self.source[self.pos..];

            if rest.starts_with("<!--") {
                self.text_start.get_or_insert(self.pos);
                self.pos += rest.find("-->").map_or(rest.len(), |end| end + 3);
            } else if rest.starts_with('{') {
                self.flush_text();
                self.command()?;
            } else if rest.starts_with("</") {
                self.flush_text();
                self.close_tag()?;
            } else if rest.starts_with('<')
                && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic() || c == '{')
            {
                self.flush_text();
                self.open_tag()?;
            } else {
                self.text_start.get_or_insert(self.pos);
                self.pos += rest.chars().next().map_or(1, char::len_utf8);
            }
        }
        self.flush_text();

        if let Some(frame) = self.stack.last().filter(|f| f.kind != FrameKind::Root) {
            return Err(ParseError::UnclosedCommand {
                command: frame.kind.command().to_string(),
                span: self.tree.span(frame.node),
            });
        }

        let root = self.tree.root();
        self.tree.set_span(root, Span::from_parts(0, self.source.len()));
        Ok(self.tree.with_line_index(LineIndex::from_text(self.source)))
    }

    fn parent(&self) -> NodeId {
        self.stack.last().map_or(self.tree.root(), |frame| frame.node)
    }

    fn top_kind(&self) -> FrameKind {
        self.stack.last().map_or(FrameKind::Root, |frame| frame.kind)
    }

    fn flush_text(&mut self) {
        if let Some(start) = self.text_start.take() {
            let parent = self.parent();
            self.tree.append_child(
                parent,
                NodeKind::Text {
                    text: self.source[start..self.pos].to_string(),
                },
                Span::from_bounds(start, self.pos),
            );
        }
    }

    fn push(&mut self, kind: FrameKind, node_kind: NodeKind, start: usize, span: Span) {
        let parent = self.parent();
        let node = self.tree.append_child(parent, node_kind, span);
        self.stack.push(Frame { node, kind, start });
    }

    /// Pop the innermost frame, which must be of `kind`, and stretch its
    /// node's span to `end`.
    fn pop(&mut self, kind: FrameKind, command: &str, span: Span) -> Result<(), ParseError> {
        match self.stack.last() {
            Some(frame) if frame.kind == kind => {
                let frame = *frame;
                self.stack.pop();
                self.tree.set_span(
                    frame.node,
                    Span::from_bounds(frame.start, span.end() as usize),
                );
                Ok(())
            }
            _ => Err(ParseError::UnexpectedCommand {
                command: command.to_string(),
                span,
            }),
        }
    }

    fn command(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let Some(end) = scan_delimited(self.source, start) else {
            return Err(ParseError::UnterminatedCommand {
                span: Span::from_bounds(start, self.source.len()),
            });
        };
        self.pos = end + 1;

        let span = Span::from_bounds(start, end + 1);
        let inner = &self.source[start + 1..end];
        let lead = inner.len() - inner.trim_start().len();
        let body = inner.trim();
        let word_len = body.find(char::is_whitespace).unwrap_or(body.len());
        let word = &body[..word_len];
        let args = body[word_len..].trim_start();
        let args_offset = start + 1 + lead + (body.len() - args.len());

        match word {
            "if" => {
                let condition = expr(args, args_offset)?;
                self.push(FrameKind::If, NodeKind::If, start, span);
                self.push(FrameKind::IfBranch, NodeKind::IfCond { condition }, start, span);
            }
            "elseif" | "else" => {
                let if_node = self.stack.iter().rev().nth(1).map(|frame| frame.node);
                let after_else = if_node.is_some_and(|node| {
                    self.tree
                        .children(node)
                        .last()
                        .is_some_and(|last| matches!(self.tree.kind(*last), NodeKind::IfElse))
                });
                if self.top_kind() != FrameKind::IfBranch || after_else {
                    return Err(ParseError::UnexpectedCommand {
                        command: word.to_string(),
                        span,
                    });
                }
                let kind = if word == "else" {
                    NodeKind::IfElse
                } else {
                    NodeKind::IfCond {
                        condition: expr(args, args_offset)?,
                    }
                };
                self.pop(FrameKind::IfBranch, word, span)?;
                self.push(FrameKind::IfBranch, kind, start, span);
            }
            "/if" => {
                self.pop(FrameKind::IfBranch, word, span)?;
                self.pop(FrameKind::If, word, span)?;
            }
            "switch" => {
                let expr = expr(args, args_offset)?;
                self.push(FrameKind::Switch, NodeKind::Switch { expr }, start, span);
            }
            "case" | "default" => {
                if self.top_kind() == FrameKind::SwitchBranch {
                    self.pop(FrameKind::SwitchBranch, word, span)?;
                }
                if self.top_kind() != FrameKind::Switch {
                    return Err(ParseError::UnexpectedCommand {
                        command: word.to_string(),
                        span,
                    });
                }
                let kind = if word == "default" {
                    NodeKind::SwitchDefault
                } else {
                    NodeKind::SwitchCase {
                        values: expr_list(args, args_offset)?,
                    }
                };
                self.push(FrameKind::SwitchBranch, kind, start, span);
            }
            "/switch" => {
                if self.top_kind() == FrameKind::SwitchBranch {
                    self.pop(FrameKind::SwitchBranch, word, span)?;
                }
                self.pop(FrameKind::Switch, word, span)?;
            }
            "for" => {
                let Some((var, iterable)) = args.split_once(" in ") else {
                    return Err(ParseError::InvalidCommand {
                        command: word.to_string(),
                        message: "expected `$var in expr`".to_string(),
                        span,
                    });
                };
                let Some(var) = var.trim().strip_prefix('$') else {
                    return Err(ParseError::InvalidCommand {
                        command: word.to_string(),
                        message: "loop variable must start with `$`".to_string(),
                        span,
                    });
                };
                let iterable_offset = args_offset + (args.len() - iterable.len());
                let kind = NodeKind::For {
                    var: var.to_string(),
                    expr: expr(iterable, iterable_offset)?,
                };
                self.push(FrameKind::For, kind, start, span);
            }
            "call" => {
                let self_closing = args.ends_with('/');
                let callee = args.trim_end_matches('/').trim().to_string();
                if self_closing {
                    let parent = self.parent();
                    self.tree.append_child(parent, NodeKind::Call { callee }, span);
                } else {
                    self.push(FrameKind::Call, NodeKind::Call { callee }, start, span);
                }
            }
            "msg" | "let" | "param" | "velog" => {
                let kind = match word {
                    "msg" => BlockKind::Msg,
                    "let" => BlockKind::Let,
                    "param" => BlockKind::Param,
                    _ => BlockKind::VeLog,
                };
                // `{let $x: expr /}` and `{param p: expr /}` carry no markup.
                if args.ends_with('/') {
                    return Ok(());
                }
                let header = args.to_string();
                self.push(
                    FrameKind::Block(kind),
                    NodeKind::Block { kind, header },
                    start,
                    span,
                );
            }
            "/for" => {
                self.pop(FrameKind::For, word, span)?;
            }
            "/call" => {
                self.pop(FrameKind::Call, word, span)?;
            }
            "/msg" | "/let" | "/param" | "/velog" => {
                let kind = match word {
                    "/msg" => BlockKind::Msg,
                    "/let" => BlockKind::Let,
                    "/param" => BlockKind::Param,
                    _ => BlockKind::VeLog,
                };
                self.pop(FrameKind::Block(kind), word, span)?;
            }
            _ if word.starts_with('/') => {
                return Err(ParseError::UnexpectedCommand {
                    command: word.to_string(),
                    span,
                });
            }
            _ => {
                let expr = expr(body, start + 1 + lead)?;
                let parent = self.parent();
                self.tree.append_child(parent, NodeKind::Print { expr }, span);
            }
        }

        Ok(())
    }

    fn tag_name(&self, at: usize) -> Result<(TagName, usize), ParseError> {
        let rest = &self.source[at..];
        if rest.starts_with('{') {
            let Some(end) = scan_delimited(self.source, at) else {
                return Err(ParseError::UnterminatedCommand {
                    span: Span::from_bounds(at, self.source.len()),
                });
            };
            let name = expr(&self.source[at + 1..end], at + 1)?;
            return Ok((TagName::Dynamic(name), end + 1));
        }

        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == ':'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(ParseError::UnterminatedTag {
                span: Span::from_bounds(at.saturating_sub(1), at),
            });
        }
        Ok((TagName::new_static(&rest[..len]), at + len))
    }

    fn open_tag(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let (name, after_name) = self.tag_name(start + 1)?;
        let Some(end) = scan_tag_end(self.source, after_name) else {
            return Err(ParseError::UnterminatedTag {
                span: Span::from_bounds(start, self.source.len()),
            });
        };
        self.pos = end + 1;

        let raw = &self.source[after_name..end];
        let tag = match raw.strip_suffix('/') {
            Some(attributes) => HtmlTag::new(name).with_attributes(attributes).self_closing(),
            None => HtmlTag::new(name).with_attributes(raw),
        };
        let parent = self.parent();
        self.tree.append_child(
            parent,
            NodeKind::OpenTag(tag),
            Span::from_bounds(start, end + 1),
        );
        Ok(())
    }

    fn close_tag(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let (name, after_name) = self.tag_name(start + 2)?;
        let rest = &self.source[after_name..];
        let gap = rest.len() - rest.trim_start().len();
        if !rest[gap..].starts_with('>') {
            return Err(ParseError::UnterminatedTag {
                span: Span::from_bounds(start, after_name + gap),
            });
        }
        let end = after_name + gap + 1;
        self.pos = end;

        let parent = self.parent();
        self.tree.append_child(
            parent,
            NodeKind::CloseTag(HtmlTag::new(name)),
            Span::from_bounds(start, end),
        );
        Ok(())
    }
}

fn expr(text: &str, offset: usize) -> Result<Expr, ParseError> {
    Expr::parse(text, u32::try_from(offset).unwrap_or(u32::MAX))
}

/// Parse `a, b, f(c, d)` splitting only on top-level commas.
fn expr_list(text: &str, offset: usize) -> Result<Vec<Expr>, ParseError> {
    let mut values = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut item_start = 0;

    for (idx, ch) in text.char_indices() {
        match ch {
            '\'' | '"' if quote == Some(ch) => quote = None,
            '\'' | '"' if quote.is_none() => quote = Some(ch),
            '(' if quote.is_none() => depth += 1,
            ')' if quote.is_none() => depth = depth.saturating_sub(1),
            ',' if quote.is_none() && depth == 0 => {
                values.push(expr(&text[item_start..idx], offset + item_start)?);
                item_start = idx + 1;
            }
            _ => {}
        }
    }
    values.push(expr(&text[item_start..], offset + item_start)?);

    Ok(values)
}

/// Index of the `}` closing the `{` at `start`, skipping quoted text and
/// nested braces.
fn scan_delimited(source: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (idx, ch) in source[start..].char_indices() {
        match ch {
            '\'' | '"' if quote == Some(ch) => quote = None,
            '\'' | '"' if quote.is_none() && depth > 0 => quote = Some(ch),
            '{' if quote.is_none() => depth += 1,
            '}' if quote.is_none() => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + idx);
                }
            }
            _ => {}
        }
    }

    None
}

/// Index of the `>` ending a start tag whose attributes begin at `from`.
fn scan_tag_end(source: &str, from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut braces = 0usize;

    for (idx, ch) in source[from..].char_indices() {
        match ch {
            '\'' | '"' if quote == Some(ch) => quote = None,
            '\'' | '"' if quote.is_none() => quote = Some(ch),
            '{' if quote.is_none() => braces += 1,
            '}' if quote.is_none() => braces = braces.saturating_sub(1),
            '>' if quote.is_none() && braces == 0 => return Some(from + idx),
            _ => {}
        }
    }

    None
}
