use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;
use soyc_ast::HtmlTag;
use soyc_ast::NodeId;
use soyc_ast::NodeKind;
use soyc_ast::TagName;
use soyc_ast::Tree;
use soyc_source::Span;

/// Where a synthetic close tag goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// Immediately before the tag that implied the close.
    Before(NodeId),
    /// As the last child of the template root or enclosing block.
    EndOf(NodeId),
}

/// A tag that takes part in a pairing: one already in the tree, or one
/// waiting to be inserted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagKey {
    Authored(NodeId),
    Synthetic(u32),
}

#[derive(Clone, Debug)]
struct SyntheticClose {
    name: TagName,
    anchor: Anchor,
}

/// Tree edits collected while matching, applied in one step afterwards.
#[derive(Clone, Debug, Default)]
pub struct Rewrites {
    synthetic: Vec<SyntheticClose>,
    by_anchor: FxHashMap<(NodeId, Anchor), TagKey>,
    pairs: Vec<(NodeId, TagKey)>,
    seen_pairs: FxHashSet<(NodeId, TagKey)>,
}

impl Rewrites {
    /// Record a synthetic close for `open` at `anchor`. Asking again for
    /// the same open and anchor returns the close already recorded.
    pub fn synthesize(&mut self, open: NodeId, name: &TagName, anchor: Anchor) -> TagKey {
        if let Some(key) = self.by_anchor.get(&(open, anchor)) {
            return *key;
        }

        let key = TagKey::Synthetic(u32::try_from(self.synthetic.len()).unwrap_or(u32::MAX));
        self.synthetic.push(SyntheticClose {
            name: name.clone(),
            anchor,
        });
        self.by_anchor.insert((open, anchor), key);
        tracing::trace!(?open, ?anchor, "synthesized close tag");
        key
    }

    /// Record that `open` was matched with `close`.
    pub fn pair(&mut self, open: NodeId, close: TagKey) {
        if self.seen_pairs.insert((open, close)) {
            self.pairs.push((open, close));
        }
    }

    #[must_use]
    pub fn synthetic_count(&self) -> usize {
        self.synthetic.len()
    }

    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.synthetic.is_empty() && self.pairs.is_empty()
    }

    /// Insert every synthetic close into `tree` and write tag-pair
    /// annotations on both partners of every pairing.
    pub fn apply(self, tree: &mut Tree) {
        let inserted: Vec<NodeId> = self
            .synthetic
            .into_iter()
            .map(|close| {
                let kind = NodeKind::CloseTag(HtmlTag::synthetic(close.name));
                match close.anchor {
                    Anchor::Before(anchor) => {
                        let span = Span::empty_at(tree.span(anchor).start());
                        tree.insert_before(anchor, kind, span)
                    }
                    Anchor::EndOf(container) => {
                        let span = Span::empty_at(tree.span(container).end());
                        tree.append_child(container, kind, span)
                    }
                }
            })
            .collect();

        let mut partners: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
        for (open, close) in self.pairs {
            let close = match close {
                TagKey::Authored(id) => Some(id),
                TagKey::Synthetic(index) => inserted.get(index as usize).copied(),
            };
            if let Some(close) = close {
                partners.entry(open).or_default().push(close);
                partners.entry(close).or_default().push(open);
            }
        }

        tracing::debug!(
            synthetic = inserted.len(),
            annotated = partners.len(),
            "applied html tag rewrites"
        );

        for (tag, mut paired) in partners {
            paired.sort_unstable();
            paired.dedup();
            tree.set_pairs(tag, paired);
        }
    }
}

#[cfg(test)]
mod tests {
    use soyc_ast::parse_template;

    use super::*;

    fn tags(tree: &Tree) -> Vec<NodeId> {
        tree.descendants(tree.root())
            .into_iter()
            .filter(|id| tree.html_tag(*id).is_some())
            .collect()
    }

    #[test]
    fn synthesize_dedups_by_open_and_anchor() {
        let mut rewrites = Rewrites::default();
        let name = TagName::new_static("li");
        let open = NodeId::new(1);
        let first = rewrites.synthesize(open, &name, Anchor::Before(NodeId::new(3)));
        let again = rewrites.synthesize(open, &name, Anchor::Before(NodeId::new(3)));
        let other = rewrites.synthesize(open, &name, Anchor::EndOf(NodeId::new(0)));

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(rewrites.synthetic_count(), 2);
    }

    #[test]
    fn apply_inserts_and_pairs() {
        let mut tree = parse_template("<ul><li>A<li>B</ul>").unwrap();
        let &[ul, li_a, li_b, close_ul] = &tags(&tree)[..] else {
            panic!("expected four tags");
        };

        let mut rewrites = Rewrites::default();
        let name = TagName::new_static("li");
        let a = rewrites.synthesize(li_a, &name, Anchor::Before(li_b));
        let b = rewrites.synthesize(li_b, &name, Anchor::Before(close_ul));
        rewrites.pair(li_a, a);
        rewrites.pair(li_b, b);
        rewrites.pair(ul, TagKey::Authored(close_ul));
        rewrites.pair(ul, TagKey::Authored(close_ul));
        assert_eq!(rewrites.pair_count(), 3);

        rewrites.apply(&mut tree);

        assert_eq!(tree.render(), "<ul><li>A</li><li>B</li></ul>");
        assert_eq!(tree.html_tag(ul).unwrap().paired, vec![close_ul]);
        assert_eq!(tree.html_tag(close_ul).unwrap().paired, vec![ul]);

        let synthetic: Vec<_> = tags(&tree)
            .into_iter()
            .filter(|id| tree.html_tag(*id).is_some_and(HtmlTag::is_synthetic))
            .collect();
        assert_eq!(synthetic.len(), 2);
        assert_eq!(tree.html_tag(synthetic[0]).unwrap().paired, vec![li_a]);
        assert_eq!(tree.html_tag(li_b).unwrap().paired, vec![synthetic[1]]);
        assert!(tree.span(synthetic[0]).is_empty());
    }

    #[test]
    fn end_of_container_appends() {
        let mut tree = parse_template("{msg}<p>x{/msg}").unwrap();
        let block = tree.children(tree.root())[0];
        let p = tags(&tree)[0];

        let mut rewrites = Rewrites::default();
        let key = rewrites.synthesize(p, &TagName::new_static("p"), Anchor::EndOf(block));
        rewrites.pair(p, key);
        rewrites.apply(&mut tree);

        assert_eq!(tree.render(), "{msg}<p>x</p>{/msg}");
    }
}
