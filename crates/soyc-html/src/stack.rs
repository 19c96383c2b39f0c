use std::rc::Rc;

use soyc_ast::NodeId;

#[derive(Debug)]
struct Frame {
    tag: NodeId,
    /// Foreign-content depth once `tag` is open.
    foreign_depth: u32,
    len: u32,
    prev: Option<Rc<Frame>>,
}

/// A persistent stack of open tags.
///
/// `push` and `pop` return new stacks that share their tail with `self`, so
/// one stack value can seed any number of branch explorations. Nothing ever
/// mutates a frame once it is built.
#[derive(Clone, Debug, Default)]
pub struct OpenTagStack {
    head: Option<Rc<Frame>>,
    base_depth: u32,
}

impl OpenTagStack {
    /// An empty stack that is already `foreign_depth` levels inside foreign
    /// content.
    #[must_use]
    pub fn empty(foreign_depth: u32) -> Self {
        Self {
            head: None,
            base_depth: foreign_depth,
        }
    }

    #[must_use]
    pub fn push(&self, tag: NodeId, opens_foreign_content: bool) -> Self {
        let foreign_depth = self.foreign_depth() + u32::from(opens_foreign_content);
        Self {
            head: Some(Rc::new(Frame {
                tag,
                foreign_depth,
                len: self.len() + 1,
                prev: self.head.clone(),
            })),
            base_depth: self.base_depth,
        }
    }

    /// The stack without its top frame. Popping an empty stack yields an
    /// empty stack.
    #[must_use]
    pub fn pop(&self) -> Self {
        Self {
            head: self.head.as_ref().and_then(|frame| frame.prev.clone()),
            base_depth: self.base_depth,
        }
    }

    #[must_use]
    pub fn top(&self) -> Option<NodeId> {
        self.head.as_ref().map(|frame| frame.tag)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    #[must_use]
    pub fn len(&self) -> u32 {
        self.head.as_ref().map_or(0, |frame| frame.len)
    }

    #[must_use]
    pub fn foreign_depth(&self) -> u32 {
        self.head
            .as_ref()
            .map_or(self.base_depth, |frame| frame.foreign_depth)
    }

    /// Open tags from the top of the stack down.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.head.as_deref(), |&frame| frame.prev.as_deref())
            .map(|frame| frame.tag)
    }
}

impl Drop for OpenTagStack {
    fn drop(&mut self) {
        // Unlink uniquely owned frames one at a time so a tall stack does not
        // recurse through `Rc` drops.
        let mut next = self.head.take();
        while let Some(frame) = next {
            match Rc::try_unwrap(frame) {
                Ok(mut frame) => next = frame.prev.take(),
                Err(_) => break,
            }
        }
    }
}
