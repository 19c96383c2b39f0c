//! Template syntax tree for HTML tag checking.
//!
//! A [`Tree`] is an arena of [`Node`]s addressed by [`NodeId`]. Passes hold
//! ids rather than references and apply their edits through the tree's
//! mutation methods once analysis is done.

mod expr;
mod parser;
mod tree;

pub use expr::BinaryOp;
pub use expr::Expr;
pub use expr::UnaryOp;
pub use parser::parse_template;
pub use parser::ParseError;
pub use tree::BlockKind;
pub use tree::HtmlTag;
pub use tree::Node;
pub use tree::NodeId;
pub use tree::NodeKind;
pub use tree::TagExistence;
pub use tree::TagName;
pub use tree::Tree;
