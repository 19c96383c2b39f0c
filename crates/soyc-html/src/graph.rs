//! Control-flow graph over the HTML-relevant nodes of a template.
//!
//! All nodes of one template live in a single arena. The fragments a pass
//! may need to look at on their own (the body of an `{if}` branch, the
//! contents of a `{msg}`) are [`Region`]s of that arena rather than separate
//! graphs, so nested content is built exactly once.

use std::cell::OnceCell;

use rustc_hash::FxHashMap;
use soyc_ast::BinaryOp;
use soyc_ast::Expr;
use soyc_ast::NodeId;
use soyc_ast::NodeKind;
use soyc_ast::Tree;

use crate::tags::TagNameExt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphNodeId(u32);

impl GraphNodeId {
    fn new(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interned identity of a condition expression. Structurally equal
/// expressions share a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConditionKey(u32);

impl ConditionKey {
    fn new(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A sub-walk of the graph: start at `entry`, and treat reaching `exit` (or
/// running out of edges) as the end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub entry: Option<GraphNodeId>,
    pub exit: Option<GraphNodeId>,
}

impl Region {
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.entry.is_none() || self.entry == self.exit
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TagKind {
    Open,
    Close,
    /// Self-closing, or a void element. Never pushed.
    Void,
}

#[derive(Clone, Debug)]
pub struct TagNode {
    pub tag: NodeId,
    pub kind: TagKind,
    pub next: Option<GraphNodeId>,
}

#[derive(Clone, Debug)]
pub struct ConditionNode {
    /// The `IfCond` or `SwitchCase` this test guards.
    pub source: NodeId,
    pub key: ConditionKey,
    pub on_true: Option<GraphNodeId>,
    pub on_false: Option<GraphNodeId>,
    /// The guarded branch, ending at the join of the whole `if`/`switch`.
    pub branch: Region,
    balanced: OnceCell<bool>,
}

impl ConditionNode {
    fn new(source: NodeId, key: ConditionKey) -> Self {
        Self {
            source,
            key,
            on_true: None,
            on_false: None,
            branch: Region {
                entry: None,
                exit: None,
            },
            balanced: OnceCell::new(),
        }
    }

    /// Whether the branch leaves any entry stack as it found it. Computed by
    /// `probe` at most once.
    pub fn is_internally_balanced(&self, probe: impl FnOnce() -> bool) -> bool {
        *self.balanced.get_or_init(probe)
    }
}

#[derive(Clone, Debug)]
pub struct BlockNode {
    /// The `Block` or `For` node whose body this is.
    pub block: NodeId,
    pub label: &'static str,
    pub body: Region,
    pub next: Option<GraphNodeId>,
}

#[derive(Clone, Debug)]
pub enum GraphNode {
    Tag(TagNode),
    Condition(ConditionNode),
    Block(BlockNode),
    Accumulator { next: Option<GraphNodeId> },
}

impl GraphNode {
    /// Outgoing edges, true edge first.
    #[must_use]
    pub fn successors(&self) -> Vec<GraphNodeId> {
        match self {
            GraphNode::Tag(TagNode { next, .. })
            | GraphNode::Block(BlockNode { next, .. })
            | GraphNode::Accumulator { next } => next.iter().copied().collect(),
            GraphNode::Condition(condition) => condition
                .on_true
                .into_iter()
                .chain(condition.on_false)
                .collect(),
        }
    }
}

#[derive(Clone, Debug)]
struct Interned {
    expr: Expr,
    uses: u32,
    /// The test of this key latest in document order.
    last_test: Option<GraphNodeId>,
}

#[derive(Clone, Debug)]
pub struct HtmlGraph {
    nodes: Vec<GraphNode>,
    conditions: Vec<Interned>,
    root: Region,
}

impl HtmlGraph {
    /// Build the graph for the children of `container`.
    #[must_use]
    pub fn build(tree: &Tree, container: NodeId) -> Self {
        let mut builder = GraphBuilder {
            tree,
            nodes: Vec::new(),
            keys: FxHashMap::default(),
            conditions: Vec::new(),
        };
        let root = builder.region(container);

        tracing::debug!(
            nodes = builder.nodes.len(),
            conditions = builder.conditions.len(),
            "built html graph"
        );

        Self {
            nodes: builder.nodes,
            conditions: builder.conditions,
            root,
        }
    }

    #[must_use]
    pub fn root(&self) -> Region {
        self.root
    }

    #[must_use]
    pub fn node(&self, id: GraphNodeId) -> &GraphNode {
        &self.nodes[id.index()]
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (GraphNodeId, &GraphNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (GraphNodeId::new(index), node))
    }

    #[must_use]
    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }

    #[must_use]
    pub fn condition_expr(&self, key: ConditionKey) -> Option<&Expr> {
        self.conditions.get(key.index()).map(|interned| &interned.expr)
    }

    /// Whether `key` is tested more than once, so a branch decision made on
    /// it constrains later tests on the same path.
    #[must_use]
    pub fn is_correlated(&self, key: ConditionKey) -> bool {
        self.conditions
            .get(key.index())
            .is_some_and(|interned| interned.uses > 1)
    }

    /// Whether no test of `key` follows the condition node `test`. Edges only
    /// lead forward through the template, so past this node the outcome of
    /// `key` no longer matters.
    #[must_use]
    pub fn is_last_test(&self, key: ConditionKey, test: GraphNodeId) -> bool {
        self.conditions
            .get(key.index())
            .is_some_and(|interned| interned.last_test == Some(test))
    }
}

/// An edge that still needs a target.
#[derive(Clone, Copy, Debug)]
enum Edge {
    Next(GraphNodeId),
    True(GraphNodeId),
    False(GraphNodeId),
}

struct GraphBuilder<'t> {
    tree: &'t Tree,
    nodes: Vec<GraphNode>,
    keys: FxHashMap<Expr, ConditionKey>,
    conditions: Vec<Interned>,
}

impl GraphBuilder<'_> {
    /// Add `node` and point every dangling edge at it.
    fn alloc(&mut self, node: GraphNode, dangling: &mut Vec<Edge>) -> GraphNodeId {
        let id = GraphNodeId::new(self.nodes.len());
        self.nodes.push(node);
        for edge in dangling.drain(..) {
            self.connect(edge, id);
        }
        id
    }

    fn connect(&mut self, edge: Edge, target: GraphNodeId) {
        let (from, on_true) = match edge {
            Edge::Next(from) | Edge::True(from) => (from, true),
            Edge::False(from) => (from, false),
        };
        match &mut self.nodes[from.index()] {
            GraphNode::Tag(TagNode { next, .. })
            | GraphNode::Block(BlockNode { next, .. })
            | GraphNode::Accumulator { next } => *next = Some(target),
            GraphNode::Condition(condition) if on_true => condition.on_true = Some(target),
            GraphNode::Condition(condition) => condition.on_false = Some(target),
        }
    }

    fn intern(&mut self, expr: Expr) -> ConditionKey {
        let next = ConditionKey::new(self.conditions.len());
        let key = *self.keys.entry(expr.clone()).or_insert(next);
        if key == next {
            self.conditions.push(Interned {
                expr,
                uses: 0,
                last_test: None,
            });
        }
        self.conditions[key.index()].uses += 1;
        key
    }

    /// A standalone region for the children of `container`, opened by an
    /// accumulator so it always has an entry.
    fn region(&mut self, container: NodeId) -> Region {
        let entry = self.alloc(GraphNode::Accumulator { next: None }, &mut Vec::new());
        let mut dangling = vec![Edge::Next(entry)];
        self.children(container, &mut dangling);
        Region {
            entry: Some(entry),
            exit: None,
        }
    }

    fn children(&mut self, parent: NodeId, dangling: &mut Vec<Edge>) {
        let tree = self.tree;
        for child in tree.children(parent) {
            self.node(*child, dangling);
        }
    }

    fn node(&mut self, id: NodeId, dangling: &mut Vec<Edge>) {
        let tree = self.tree;
        match tree.kind(id) {
            NodeKind::OpenTag(tag) => {
                let kind = if tag.self_closing || tag.name.is_void() {
                    TagKind::Void
                } else {
                    TagKind::Open
                };
                self.tag(id, kind, dangling);
            }
            NodeKind::CloseTag(_) => self.tag(id, TagKind::Close, dangling),
            NodeKind::If => self.branches(id, None, dangling),
            NodeKind::Switch { expr } => self.branches(id, Some(expr), dangling),
            NodeKind::For { .. } => self.block(id, "for", dangling),
            NodeKind::Block { kind, .. } => self.block(id, kind.command(), dangling),
            NodeKind::Template { .. }
            | NodeKind::Call { .. }
            | NodeKind::IfCond { .. }
            | NodeKind::IfElse
            | NodeKind::SwitchCase { .. }
            | NodeKind::SwitchDefault => self.children(id, dangling),
            NodeKind::Text { .. } | NodeKind::Print { .. } => {}
        }
    }

    fn tag(&mut self, tag: NodeId, kind: TagKind, dangling: &mut Vec<Edge>) {
        let node = self.alloc(
            GraphNode::Tag(TagNode {
                tag,
                kind,
                next: None,
            }),
            dangling,
        );
        dangling.push(Edge::Next(node));
    }

    fn block(&mut self, block: NodeId, label: &'static str, dangling: &mut Vec<Edge>) {
        let body = self.region(block);
        let node = self.alloc(
            GraphNode::Block(BlockNode {
                block,
                label,
                body,
                next: None,
            }),
            dangling,
        );
        dangling.push(Edge::Next(node));
    }

    /// Lower an `{if}` or `{switch}` into a chain of tests whose branches all
    /// meet at one accumulator.
    fn branches(&mut self, id: NodeId, subject: Option<&Expr>, dangling: &mut Vec<Edge>) {
        let tree = self.tree;
        let mut pending = std::mem::take(dangling);
        let mut exits = Vec::new();
        let mut tests = Vec::new();

        for branch in tree.children(id) {
            let condition = match tree.kind(*branch) {
                NodeKind::IfCond { condition } => Some(condition.clone()),
                NodeKind::SwitchCase { values } => Some(case_condition(subject, values)),
                _ => None,
            };

            if let Some(condition) = condition {
                let key = self.intern(condition);
                let test = self.alloc(
                    GraphNode::Condition(ConditionNode::new(*branch, key)),
                    &mut pending,
                );
                self.conditions[key.index()].last_test = Some(test);
                tests.push(test);

                let mut body = vec![Edge::True(test)];
                self.children(*branch, &mut body);
                exits.append(&mut body);
                pending.push(Edge::False(test));
            } else {
                self.children(*branch, &mut pending);
                exits.append(&mut pending);
            }
        }
        exits.append(&mut pending);

        let join = self.alloc(GraphNode::Accumulator { next: None }, &mut exits);
        for test in tests {
            if let GraphNode::Condition(condition) = &mut self.nodes[test.index()] {
                condition.branch = Region {
                    entry: condition.on_true,
                    exit: Some(join),
                };
            }
        }
        dangling.push(Edge::Next(join));
    }
}

/// `{case a, b}` under `{switch $x}` tests `$x == a or $x == b`.
fn case_condition(subject: Option<&Expr>, values: &[Expr]) -> Expr {
    let subject = subject.cloned().unwrap_or(Expr::Null);
    values
        .iter()
        .map(|value| Expr::binary(BinaryOp::Eq, subject.clone(), value.clone()))
        .reduce(|lhs, rhs| Expr::binary(BinaryOp::Or, lhs, rhs))
        .unwrap_or(Expr::Bool(false))
}
