//! HTML tag-balance verification for templates.
//!
//! [`check_html_tags`] decides, for every execution path through a
//! template's control flow, whether each HTML open tag is matched by exactly
//! one close tag. Close tags HTML lets authors omit are inserted
//! into the tree as synthetic tags, and both partners of every pairing are
//! annotated with each other, so later passes can treat the markup as fully
//! balanced.

use soyc_ast::Tree;
use soyc_conf::Settings;

mod diagnostics;
mod errors;
mod graph;
mod matcher;
mod rewrites;
mod stack;
mod tags;

pub use diagnostics::render_diagnostics;
pub use diagnostics::render_html_error;
pub use diagnostics::to_diagnostic;
pub use diagnostics::DiagnosticSink;
pub use errors::BlockQualifier;
pub use errors::HtmlTagError;
pub use graph::BlockNode;
pub use graph::ConditionKey;
pub use graph::ConditionNode;
pub use graph::GraphNode;
pub use graph::GraphNodeId;
pub use graph::HtmlGraph;
pub use graph::Region;
pub use graph::TagKind;
pub use graph::TagNode;
pub use matcher::TagMatcher;
pub use rewrites::Anchor;
pub use rewrites::Rewrites;
pub use rewrites::TagKey;
pub use stack::OpenTagStack;
pub use tags::close_closes_optional;
pub use tags::may_close_optional;
pub use tags::open_closes_optional;
pub use tags::TagNameExt;

/// Check and rewrite `tree`, returning every diagnostic found.
pub fn check_html_tags(tree: &mut Tree) -> Vec<HtmlTagError> {
    let mut errors = Vec::new();
    check_html_tags_with(tree, &mut errors);
    errors
}

/// Check and rewrite `tree`, returning the diagnostics `settings` leaves
/// switched on.
pub fn check_html_tags_with_settings(tree: &mut Tree, settings: &Settings) -> Vec<HtmlTagError> {
    let mut errors = check_html_tags(tree);
    errors.retain(|error| settings.diagnostics.is_enabled(error.diagnostic_code()));
    errors
}

/// Check and rewrite `tree`, handing each diagnostic to `sink`.
pub fn check_html_tags_with(tree: &mut Tree, sink: &mut dyn DiagnosticSink) {
    let graph = HtmlGraph::build(tree, tree.root());
    let mut matcher = TagMatcher::new(tree);
    let errors = matcher.run(&graph);
    let rewrites = matcher.into_rewrites();

    rewrites.apply(tree);
    for error in errors {
        sink.report(error);
    }
}
