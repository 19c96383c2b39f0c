//! Path-sensitive matching of HTML open and close tags.
//!
//! A pass walks a [`Region`] of the [`HtmlGraph`] with an explicit FIFO work
//! queue of [`Visit`]s. Each visit carries its own persistent open-tag stack
//! and the branch decisions taken on its path, so both sides of a condition
//! start from the same state without copying it. Nothing here recurses per
//! conditional: recursion only follows the nesting of blocks and branch
//! probes in the template.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;
use soyc_ast::NodeId;
use soyc_ast::TagName;
use soyc_ast::Tree;
use soyc_source::Span;

use crate::errors::BlockQualifier;
use crate::errors::HtmlTagError;
use crate::graph::ConditionKey;
use crate::graph::ConditionNode;
use crate::graph::GraphNode;
use crate::graph::GraphNodeId;
use crate::graph::HtmlGraph;
use crate::graph::Region;
use crate::graph::TagKind;
use crate::rewrites::Anchor;
use crate::rewrites::Rewrites;
use crate::rewrites::TagKey;
use crate::stack::OpenTagStack;
use crate::tags::close_closes_optional;
use crate::tags::may_close_optional;
use crate::tags::open_closes_optional;
use crate::tags::TagNameExt;

/// Distinct states a pass lets reach one graph node. Paths past the limit
/// are dropped and reported as [`HtmlTagError::TooManyPaths`].
const MAX_PATHS_PER_NODE: usize = 256;

/// Branch decisions taken on one path, for conditions tested more than once.
type Conditions = BTreeMap<ConditionKey, bool>;

#[derive(Clone, Copy, Debug)]
struct Scope {
    region: Region,
    /// Receives synthetic closes for optional tags still open at the end.
    container: NodeId,
    block: BlockQualifier,
    /// Probing a condition branch: no rewrites, and the first error settles
    /// the verdict.
    in_condition: bool,
}

#[derive(Debug)]
struct Visit {
    node: Option<GraphNodeId>,
    conditions: Conditions,
    stack: OpenTagStack,
}

/// Everything that determines what happens from a visit onwards.
#[derive(PartialEq, Eq, Hash)]
struct VisitKey {
    node: Option<GraphNodeId>,
    stack: Vec<NodeId>,
    foreign_depth: u32,
    conditions: Vec<(ConditionKey, bool)>,
}

/// Matches the tags of one template.
///
/// Diagnostics are returned from [`TagMatcher::run`]; tree edits accumulate
/// in a [`Rewrites`] log for the caller to apply once the borrow of the tree
/// ends.
pub struct TagMatcher<'t> {
    tree: &'t Tree,
    rewrites: Rewrites,
    /// Blocks and balanced branches that have already had their own pass.
    visited: FxHashSet<GraphNodeId>,
}

impl<'t> TagMatcher<'t> {
    #[must_use]
    pub fn new(tree: &'t Tree) -> Self {
        Self {
            tree,
            rewrites: Rewrites::default(),
            visited: FxHashSet::default(),
        }
    }

    /// Match every tag reachable from the graph's root region.
    pub fn run(&mut self, graph: &HtmlGraph) -> Vec<HtmlTagError> {
        let scope = Scope {
            region: graph.root(),
            container: self.tree.root(),
            block: BlockQualifier::none(),
            in_condition: false,
        };
        let pass = self.run_scope(graph, scope, OpenTagStack::empty(0));

        tracing::debug!(
            errors = pass.errors.len(),
            synthetic = self.rewrites.synthetic_count(),
            pairs = self.rewrites.pair_count(),
            "matched html tags"
        );
        pass.errors
    }

    #[must_use]
    pub fn rewrites(&self) -> &Rewrites {
        &self.rewrites
    }

    #[must_use]
    pub fn into_rewrites(self) -> Rewrites {
        self.rewrites
    }

    fn run_scope(&mut self, graph: &HtmlGraph, scope: Scope, stack: OpenTagStack) -> Pass {
        let mut pass = Pass::new(scope);
        pass.enqueue(scope.region.entry, Conditions::new(), stack);
        pass.drain(self, graph);
        pass.finish(self);
        pass
    }

    fn is_balanced(&mut self, graph: &HtmlGraph, condition: &ConditionNode) -> bool {
        condition.is_internally_balanced(|| {
            let scope = Scope {
                region: condition.branch,
                container: condition.source,
                block: BlockQualifier::none(),
                in_condition: true,
            };
            let pass = self.run_scope(graph, scope, OpenTagStack::empty(0));
            let balanced = !pass.failed();
            tracing::trace!(branch = ?condition.source, balanced, "probed condition branch");
            balanced
        })
    }

    /// Give a block body or balanced branch its own pass, once.
    fn run_nested(
        &mut self,
        graph: &HtmlGraph,
        id: GraphNodeId,
        scope: Scope,
        foreign_depth: u32,
    ) -> Vec<HtmlTagError> {
        if !self.visited.insert(id) {
            return Vec::new();
        }
        self.run_scope(graph, scope, OpenTagStack::empty(foreign_depth))
            .errors
    }
}

struct Pass {
    scope: Scope,
    queue: VecDeque<Visit>,
    seen: FxHashSet<VisitKey>,
    paths: FxHashMap<Option<GraphNodeId>, usize>,
    overflowed: bool,
    /// Every partner an open tag got on some path; `None` where a path left
    /// it unmatched.
    partners: BTreeMap<NodeId, BTreeSet<Option<TagKey>>>,
    errors: Vec<HtmlTagError>,
    reported: FxHashSet<(&'static str, Span)>,
    /// A probed branch reached below its own entry stack.
    escaped: bool,
}

impl Pass {
    fn new(scope: Scope) -> Self {
        Self {
            scope,
            queue: VecDeque::new(),
            seen: FxHashSet::default(),
            paths: FxHashMap::default(),
            overflowed: false,
            partners: BTreeMap::new(),
            errors: Vec::new(),
            reported: FxHashSet::default(),
            escaped: false,
        }
    }

    fn failed(&self) -> bool {
        self.escaped || self.overflowed || !self.errors.is_empty()
    }

    fn enqueue(&mut self, node: Option<GraphNodeId>, conditions: Conditions, stack: OpenTagStack) {
        let key = VisitKey {
            node,
            stack: stack.iter().collect(),
            foreign_depth: stack.foreign_depth(),
            conditions: conditions.iter().map(|(k, v)| (*k, *v)).collect(),
        };
        if !self.seen.insert(key) {
            return;
        }

        let paths = self.paths.entry(node).or_default();
        *paths += 1;
        if *paths > MAX_PATHS_PER_NODE {
            self.overflowed = true;
            return;
        }
        self.queue.push_back(Visit {
            node,
            conditions,
            stack,
        });
    }

    fn drain(&mut self, cx: &mut TagMatcher<'_>, graph: &HtmlGraph) {
        while let Some(visit) = self.queue.pop_front() {
            if self.scope.in_condition && self.failed() {
                break;
            }

            let Visit {
                node,
                conditions,
                stack,
            } = visit;
            let Some(id) = node.filter(|id| Some(*id) != self.scope.region.exit) else {
                self.end_of_path(cx, &stack);
                continue;
            };

            match graph.node(id) {
                GraphNode::Tag(tag) => {
                    let stack = match tag.kind {
                        TagKind::Open => self.open_tag(cx, tag.tag, stack),
                        TagKind::Close => self.close_tag(cx, tag.tag, stack),
                        TagKind::Void => {
                            self.void_tag(cx, tag.tag, &stack);
                            stack
                        }
                    };
                    self.enqueue(tag.next, conditions, stack);
                }
                GraphNode::Condition(condition) => {
                    self.condition(cx, graph, id, condition, &conditions, &stack);
                }
                GraphNode::Block(block) => {
                    // A probe only cares about its own stack; the block gets
                    // its pass when the real traversal reaches it.
                    if !self.scope.in_condition {
                        let scope = Scope {
                            region: block.body,
                            container: block.block,
                            block: BlockQualifier::block(block.label),
                            in_condition: false,
                        };
                        let errors = cx.run_nested(graph, id, scope, stack.foreign_depth());
                        self.extend(errors);
                    }
                    self.enqueue(block.next, conditions, stack);
                }
                GraphNode::Accumulator { next } => self.enqueue(*next, conditions, stack),
            }
        }
    }

    fn condition(
        &mut self,
        cx: &mut TagMatcher<'_>,
        graph: &HtmlGraph,
        id: GraphNodeId,
        condition: &ConditionNode,
        conditions: &Conditions,
        stack: &OpenTagStack,
    ) {
        // A balanced branch hands the join the stack it was given.
        let on_true = if cx.is_balanced(graph, condition) {
            if !self.scope.in_condition {
                let scope = Scope {
                    region: condition.branch,
                    container: condition.source,
                    block: self.scope.block,
                    in_condition: false,
                };
                let errors = cx.run_nested(graph, id, scope, stack.foreign_depth());
                self.extend(errors);
            }
            condition.branch.exit
        } else {
            condition.on_true
        };

        let key = condition.key;
        let known = conditions.get(&key).copied();
        let remember = graph.is_correlated(key) && !graph.is_last_test(key, id);
        for (value, next) in [(true, on_true), (false, condition.on_false)] {
            if known.is_some_and(|known| known != value) {
                continue;
            }
            let mut branch = conditions.clone();
            if remember {
                branch.insert(key, value);
            } else {
                branch.remove(&key);
            }
            self.enqueue(next, branch, stack.clone());
        }
    }

    fn void_tag(&mut self, cx: &TagMatcher<'_>, id: NodeId, stack: &OpenTagStack) {
        let Some(tag) = cx.tree.html_tag(id) else {
            return;
        };
        let name = &tag.name;
        if tag.self_closing
            && stack.foreign_depth() == 0
            && name.is_static()
            && !name.is_void()
            && !name.is_foreign_content()
        {
            self.report(HtmlTagError::InvalidSelfClosingTag {
                tag: name.to_string(),
                span: cx.tree.span(id),
                block: self.scope.block,
            });
        }
    }

    fn open_tag(&mut self, cx: &mut TagMatcher<'_>, id: NodeId, stack: OpenTagStack) -> OpenTagStack {
        let tree = cx.tree;
        let Some(tag) = tree.html_tag(id) else {
            return stack;
        };

        let mut stack = stack;
        while let Some(top) = stack.top() {
            let Some(open) = tree.html_tag(top) else {
                break;
            };
            if !(open.name.is_definitely_optional() && open_closes_optional(&tag.name, &open.name))
            {
                break;
            }
            self.implied_close(cx, top, &open.name, Anchor::Before(id));
            stack = stack.pop();
        }

        if self.scope.in_condition && stack.is_empty() && may_close_optional(&tag.name) {
            self.escaped = true;
        }

        stack.push(id, tag.name.is_foreign_content())
    }

    fn close_tag(&mut self, cx: &mut TagMatcher<'_>, id: NodeId, stack: OpenTagStack) -> OpenTagStack {
        let tree = cx.tree;
        let Some(close) = tree.html_tag(id) else {
            return stack;
        };
        let span = tree.span(id);
        let block = self.scope.block;

        if close.name.is_void() {
            self.report(HtmlTagError::VoidCloseTag {
                tag: close.name.to_string(),
                span,
                block,
            });
            return stack;
        }

        let excluded = close.name.is_excluded_optional();
        let mut stack = stack;
        loop {
            let Some(top) = stack.top() else {
                if excluded {
                    self.escaped |= self.scope.in_condition;
                } else {
                    self.report(HtmlTagError::UnexpectedCloseTag { span, block });
                }
                return stack;
            };
            let Some(open) = tree.html_tag(top) else {
                return stack.pop();
            };

            if open.name.is_static() && close.name.is_wildcard() {
                self.report(HtmlTagError::ExpectedTagName { span, block });
                self.record(top, Some(TagKey::Authored(id)));
                return stack.pop();
            }

            if open.name == close.name || close.name.is_wildcard() {
                self.record(top, Some(TagKey::Authored(id)));
                return stack.pop();
            }

            if open.name.is_definitely_optional() && close_closes_optional(&close.name, &open.name) {
                self.implied_close(cx, top, &open.name, Anchor::Before(id));
                stack = stack.pop();
                continue;
            }

            if excluded {
                return stack;
            }

            let open_span = tree.span(top);
            self.record(top, None);
            self.report(HtmlTagError::MismatchedCloseTag {
                open: open.name.to_string(),
                open_position: tree.line_col(open_span),
                open_span,
                span,
                block,
            });
            return stack.pop();
        }
    }

    fn end_of_path(&mut self, cx: &mut TagMatcher<'_>, stack: &OpenTagStack) {
        let tree = cx.tree;
        for open in stack.iter() {
            match tree.html_tag(open) {
                Some(tag) if tag.name.is_definitely_optional() && !self.scope.in_condition => {
                    let key =
                        cx.rewrites
                            .synthesize(open, &tag.name, Anchor::EndOf(self.scope.container));
                    self.record(open, Some(key));
                }
                _ => self.record(open, None),
            }
        }
    }

    fn implied_close(&mut self, cx: &mut TagMatcher<'_>, open: NodeId, name: &TagName, anchor: Anchor) {
        if self.scope.in_condition {
            return;
        }
        let key = cx.rewrites.synthesize(open, name, anchor);
        self.record(open, Some(key));
    }

    fn record(&mut self, open: NodeId, partner: Option<TagKey>) {
        self.partners.entry(open).or_default().insert(partner);
    }

    fn report(&mut self, error: HtmlTagError) {
        if self.reported.insert((error.diagnostic_code(), error.span())) {
            self.errors.push(error);
        }
    }

    fn extend(&mut self, errors: Vec<HtmlTagError>) {
        for error in errors {
            self.report(error);
        }
    }

    /// Report open tags left unmatched on some path, then hand every
    /// successful pairing to the rewrite log.
    fn finish(&mut self, cx: &mut TagMatcher<'_>) {
        if self.scope.in_condition && self.failed() {
            return;
        }

        let tree = cx.tree;
        if self.overflowed {
            tracing::debug!(container = ?self.scope.container, "dropped paths past the limit");
            self.report(HtmlTagError::TooManyPaths {
                span: tree.span(self.scope.container),
                block: self.scope.block,
            });
        }

        let partners = std::mem::take(&mut self.partners);
        for (open, matched) in &partners {
            if !matched.contains(&None) {
                continue;
            }
            let tag = tree
                .html_tag(*open)
                .map(|tag| tag.name.to_string())
                .unwrap_or_default();
            let span = tree.span(*open);
            let block = self.scope.block;
            self.report(if matched.len() == 1 {
                HtmlTagError::UnmatchedOpenTag { tag, span, block }
            } else {
                HtmlTagError::InconsistentOpenTag { tag, span, block }
            });
        }

        if self.scope.in_condition {
            return;
        }
        for (open, matched) in partners {
            for close in matched.into_iter().flatten() {
                cx.rewrites.pair(open, close);
            }
        }
    }
}
