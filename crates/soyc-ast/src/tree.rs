use std::fmt;
use std::fmt::Write;

use serde::Serialize;
use soyc_source::LineCol;
use soyc_source::LineIndex;
use soyc_source::Span;

use crate::Expr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn id(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The name of an HTML element as written in a template.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TagName {
    /// A literal name, stored lower-cased.
    Static(String),
    /// A name computed by a print expression, e.g. `<{$tag}>`.
    Dynamic(Expr),
}

impl TagName {
    #[must_use]
    pub fn new_static(name: &str) -> Self {
        TagName::Static(name.to_ascii_lowercase())
    }

    #[must_use]
    pub fn is_static(&self) -> bool {
        matches!(self, TagName::Static(_))
    }

    #[must_use]
    pub fn static_name(&self) -> Option<&str> {
        match self {
            TagName::Static(name) => Some(name),
            TagName::Dynamic(_) => None,
        }
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagName::Static(name) => f.write_str(name),
            TagName::Dynamic(expr) => write!(f, "{{{expr}}}"),
        }
    }
}

/// Whether a tag was written by the template author or inserted by a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TagExistence {
    Authored,
    Synthetic,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HtmlTag {
    pub name: TagName,
    /// Raw attribute text between the name and the closing `>`.
    pub attributes: String,
    pub self_closing: bool,
    pub existence: TagExistence,
    /// Tags this one was matched with. Written once by tag matching.
    pub paired: Vec<NodeId>,
}

impl HtmlTag {
    #[must_use]
    pub fn new(name: TagName) -> Self {
        Self {
            name,
            attributes: String::new(),
            self_closing: false,
            existence: TagExistence::Authored,
            paired: Vec::new(),
        }
    }

    #[must_use]
    pub fn synthetic(name: TagName) -> Self {
        Self {
            existence: TagExistence::Synthetic,
            ..Self::new(name)
        }
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: impl Into<String>) -> Self {
        self.attributes = attributes.into();
        self
    }

    #[must_use]
    pub fn self_closing(mut self) -> Self {
        self.self_closing = true;
        self
    }

    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.existence == TagExistence::Synthetic
    }
}

/// Template constructs whose content is an HTML fragment of its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum BlockKind {
    Msg,
    Let,
    Param,
    VeLog,
}

impl BlockKind {
    #[must_use]
    pub fn command(self) -> &'static str {
        match self {
            BlockKind::Msg => "msg",
            BlockKind::Let => "let",
            BlockKind::Param => "param",
            BlockKind::VeLog => "velog",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    Template { name: String },
    Text { text: String },
    Print { expr: Expr },
    OpenTag(HtmlTag),
    CloseTag(HtmlTag),
    /// Children are `IfCond` branches optionally followed by one `IfElse`.
    If,
    IfCond { condition: Expr },
    IfElse,
    /// Children are `SwitchCase` branches optionally followed by `SwitchDefault`.
    Switch { expr: Expr },
    SwitchCase { values: Vec<Expr> },
    SwitchDefault,
    For { var: String, expr: Expr },
    /// Children are `Block { kind: Param }` nodes.
    Call { callee: String },
    Block { kind: BlockKind, header: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Node {
    kind: NodeKind,
    span: Span,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[must_use]
    pub fn span(&self) -> Span {
        self.span
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// An arena of template nodes.
///
/// Node ids are arena indices and are never reused, so the arena doubles as
/// the id generator for nodes that passes insert after parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tree {
    nodes: Vec<Node>,
    line_index: LineIndex,
}

impl Tree {
    #[must_use]
    pub fn new(name: &str) -> Self {
        let root = Node {
            kind: NodeKind::Template {
                name: name.to_string(),
            },
            span: Span::default(),
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            line_index: LineIndex::default(),
        }
    }

    #[must_use]
    pub fn with_line_index(mut self, line_index: LineIndex) -> Self {
        self.line_index = line_index;
        self
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[must_use]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    #[must_use]
    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    #[must_use]
    pub fn line_col(&self, span: Span) -> LineCol {
        self.line_index.line_col(span.start())
    }

    /// The open or close tag stored at `id`, if it is one.
    #[must_use]
    pub fn html_tag(&self, id: NodeId) -> Option<&HtmlTag> {
        match self.kind(id) {
            NodeKind::OpenTag(tag) | NodeKind::CloseTag(tag) => Some(tag),
            _ => None,
        }
    }

    fn html_tag_mut(&mut self, id: NodeId) -> Option<&mut HtmlTag> {
        match &mut self.nodes[id.index()].kind {
            NodeKind::OpenTag(tag) | NodeKind::CloseTag(tag) => Some(tag),
            _ => None,
        }
    }

    fn alloc(&mut self, kind: NodeKind, span: Span, parent: NodeId) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(Node {
            kind,
            span,
            parent: Some(parent),
            children: Vec::new(),
        });
        id
    }

    pub fn append_child(&mut self, parent: NodeId, kind: NodeKind, span: Span) -> NodeId {
        let id = self.alloc(kind, span, parent);
        self.nodes[parent.index()].children.push(id);
        id
    }

    /// Insert a new node as the sibling immediately before `anchor`.
    ///
    /// The root has no siblings; inserting before it appends to it instead.
    pub fn insert_before(&mut self, anchor: NodeId, kind: NodeKind, span: Span) -> NodeId {
        let Some(parent) = self.parent(anchor) else {
            return self.append_child(anchor, kind, span);
        };
        let id = self.alloc(kind, span, parent);
        let siblings = &mut self.nodes[parent.index()].children;
        let position = siblings
            .iter()
            .position(|child| *child == anchor)
            .unwrap_or(siblings.len());
        siblings.insert(position, id);
        id
    }

    pub fn set_span(&mut self, id: NodeId, span: Span) {
        self.nodes[id.index()].span = span;
    }

    /// Record the tags `id` was matched with. Non-tag nodes are ignored.
    pub fn set_pairs(&mut self, id: NodeId, pairs: Vec<NodeId>) {
        if let Some(tag) = self.html_tag_mut(id) {
            tag.paired = pairs;
        }
    }

    /// All nodes below `id` in document order, excluding `id` itself.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut pending: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = pending.pop() {
            out.push(next);
            pending.extend(self.children(next).iter().rev());
        }
        out
    }

    /// Reconstruct template source from the tree, synthetic tags included.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_node(self.root(), &mut out);
        out
    }

    fn render_children(&self, id: NodeId, out: &mut String) {
        for child in self.children(id) {
            self.render_node(*child, out);
        }
    }

    fn render_node(&self, id: NodeId, out: &mut String) {
        // Writing to a String cannot fail.
        let _ = self.write_node(id, out);
    }

    fn write_node(&self, id: NodeId, out: &mut String) -> fmt::Result {
        match self.kind(id) {
            NodeKind::Template { .. } => self.render_children(id, out),
            NodeKind::Text { text } => out.push_str(text),
            NodeKind::Print { expr } => write!(out, "{{{expr}}}")?,
            NodeKind::OpenTag(tag) => {
                write!(out, "<{}{}", tag.name, tag.attributes)?;
                out.push_str(if tag.self_closing { "/>" } else { ">" });
            }
            NodeKind::CloseTag(tag) => write!(out, "</{}>", tag.name)?,
            NodeKind::If => {
                for (i, branch) in self.children(id).iter().enumerate() {
                    match self.kind(*branch) {
                        NodeKind::IfCond { condition } if i == 0 => {
                            write!(out, "{{if {condition}}}")?;
                        }
                        NodeKind::IfCond { condition } => write!(out, "{{elseif {condition}}}")?,
                        _ => out.push_str("{else}"),
                    }
                    self.render_children(*branch, out);
                }
                out.push_str("{/if}");
            }
            NodeKind::IfCond { .. } | NodeKind::IfElse => self.render_children(id, out),
            NodeKind::Switch { expr } => {
                write!(out, "{{switch {expr}}}")?;
                for branch in self.children(id) {
                    match self.kind(*branch) {
                        NodeKind::SwitchCase { values } => {
                            out.push_str("{case ");
                            for (i, value) in values.iter().enumerate() {
                                if i > 0 {
                                    out.push_str(", ");
                                }
                                write!(out, "{value}")?;
                            }
                            out.push('}');
                        }
                        _ => out.push_str("{default}"),
                    }
                    self.render_children(*branch, out);
                }
                out.push_str("{/switch}");
            }
            NodeKind::SwitchCase { .. } | NodeKind::SwitchDefault => {
                self.render_children(id, out);
            }
            NodeKind::For { var, expr } => {
                write!(out, "{{for ${var} in {expr}}}")?;
                self.render_children(id, out);
                out.push_str("{/for}");
            }
            NodeKind::Call { callee } => {
                write!(out, "{{call {callee}}}")?;
                self.render_children(id, out);
                out.push_str("{/call}");
            }
            NodeKind::Block { kind, header } => {
                let command = kind.command();
                if header.is_empty() {
                    write!(out, "{{{command}}}")?;
                } else {
                    write!(out, "{{{command} {header}}}")?;
                }
                self.render_children(id, out);
                write!(out, "{{/{command}}}")?;
            }
        }
        Ok(())
    }
}
