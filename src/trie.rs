//! Twelve-way prefix tree over phone number symbols.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]; the root is always
//! slot 0 and is never freed. Each node knows its parent and the symbol under
//! which it hangs, so unlinking is O(1) and upward pruning needs no search.
//!
//! The same structure backs both trees of the engine:
//! - forward: a node's payload holds at most one string (the redirect target)
//!   and its [`Backlink`] names the matching entry in the reverse tree;
//! - reverse: a node's payload holds every source prefix redirected onto it.
//!
//! Like [`Sequence`], the arena keeps `free.capacity() >= nodes.len()`, so
//! deleting and pruning never allocate and therefore never fail.

use std::collections::TryReserveError;

use crate::number::SYMBOLS;
use crate::sequence::{Handle, Sequence};

/// Index of a node in its trie's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    #[inline]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Cross-reference from a forward node to the reverse-tree entry that
/// records its redirect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backlink {
    /// Reverse-tree node at the redirect target's path.
    pub node: NodeId,
    /// Entry inside that node's payload.
    pub entry: Handle,
}

#[derive(Clone)]
struct Node {
    children: [Option<NodeId>; SYMBOLS],
    parent: Option<NodeId>,
    /// Slot in the parent's child array.
    symbol: u8,
    payload: Option<Sequence>,
    backlink: Option<Backlink>,
}

impl Node {
    const VACANT: Node = Node {
        children: [None; SYMBOLS],
        parent: None,
        symbol: 0,
        payload: None,
        backlink: None,
    };
}

/// Result of [`Trie::find_or_create_path`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathEnd {
    /// Node at the end of the path.
    pub node: NodeId,
    /// Topmost node created by the call, if any. Deleting its subtree undoes
    /// the call.
    pub created: Option<NodeId>,
}

pub struct Trie {
    nodes: Vec<Node>,
    free: Vec<u32>,
    live: usize,
}

impl Trie {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::VACANT],
            free: Vec::with_capacity(1),
            live: 1,
        }
    }

    /// Creates a trie with room for `capacity` nodes besides the root.
    pub fn with_capacity(capacity: usize) -> Result<Self, TryReserveError> {
        let mut nodes = Vec::new();
        nodes.try_reserve(capacity.saturating_add(1))?;
        let mut free = Vec::new();
        free.try_reserve(capacity.saturating_add(1))?;
        nodes.push(Node::VACANT);
        Ok(Self {
            nodes,
            free,
            live: 1,
        })
    }

    /// Live nodes, the root included.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.idx()].parent
    }

    #[inline]
    pub fn child(&self, node: NodeId, symbol: usize) -> Option<NodeId> {
        self.nodes[node.idx()].children[symbol]
    }

    /// Existing children with their symbols, lowest symbol first.
    pub fn children(&self, node: NodeId) -> impl DoubleEndedIterator<Item = (usize, NodeId)> + '_ {
        self.nodes[node.idx()]
            .children
            .iter()
            .enumerate()
            .filter_map(|(symbol, child)| child.map(|c| (symbol, c)))
    }

    #[inline]
    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.nodes[node.idx()].children.iter().all(Option::is_none)
    }

    #[inline]
    pub fn first_nonempty_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.idx()].children.iter().find_map(|c| *c)
    }

    #[inline]
    pub fn payload(&self, node: NodeId) -> Option<&Sequence> {
        self.nodes[node.idx()].payload.as_ref()
    }

    #[inline]
    pub fn has_payload(&self, node: NodeId) -> bool {
        self.payload(node).is_some_and(|p| !p.is_empty())
    }

    #[inline]
    pub fn backlink(&self, node: NodeId) -> Option<Backlink> {
        self.nodes[node.idx()].backlink
    }

    /// Redirect target stored at a forward node.
    pub fn redirect(&self, node: NodeId) -> Option<&str> {
        let payload = self.payload(node)?;
        payload.get(payload.first()?)
    }

    /// Allocates a node and hangs it under `parent` at `symbol`.
    pub fn new_node(&mut self, parent: NodeId, symbol: usize) -> Result<NodeId, TryReserveError> {
        debug_assert!(self.child(parent, symbol).is_none());

        let id = match self.free.pop() {
            Some(idx) => NodeId(idx),
            None => {
                // Reserve the free-list slot together with the node so later
                // deletes cannot fail.
                self.free.try_reserve(self.nodes.len() + 1)?;
                self.nodes.try_reserve(1)?;
                debug_assert!(self.nodes.len() < u32::MAX as usize);
                self.nodes.push(Node::VACANT);
                NodeId((self.nodes.len() - 1) as u32)
            }
        };

        let node = &mut self.nodes[id.idx()];
        node.parent = Some(parent);
        node.symbol = symbol as u8;
        self.nodes[parent.idx()].children[symbol] = Some(id);
        self.live += 1;
        Ok(id)
    }

    /// Walks `symbols` from the root, creating missing nodes.
    ///
    /// On failure every node created by this call is deleted again.
    pub fn find_or_create_path<I>(&mut self, symbols: I) -> Result<PathEnd, TryReserveError>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut cur = NodeId::ROOT;
        let mut created = None;
        for symbol in symbols {
            cur = match self.child(cur, symbol) {
                Some(child) => child,
                None => match self.new_node(cur, symbol) {
                    Ok(child) => {
                        created.get_or_insert(child);
                        child
                    }
                    Err(err) => {
                        if let Some(first) = created {
                            // Fresh nodes carry no redirects.
                            self.delete_subtree(first, |_| {});
                        }
                        return Err(err);
                    }
                },
            };
        }
        Ok(PathEnd { node: cur, created })
    }

    /// Node at the end of `symbols`, if the whole path exists.
    pub fn find_path<I>(&self, symbols: I) -> Option<NodeId>
    where
        I: IntoIterator<Item = usize>,
    {
        symbols
            .into_iter()
            .try_fold(NodeId::ROOT, |cur, symbol| self.child(cur, symbol))
    }

    /// Existing nodes along `symbols` paired with how many symbols lead to
    /// them. Stops at the first missing node; the root is not yielded.
    pub fn walk<I>(&self, symbols: I) -> Walk<'_, I::IntoIter>
    where
        I: IntoIterator<Item = usize>,
    {
        Walk {
            trie: self,
            symbols: symbols.into_iter(),
            cur: Some(NodeId::ROOT),
            consumed: 0,
        }
    }

    /// Deepest node along `symbols` carrying a redirect, with the number of
    /// symbols consumed to reach it.
    pub fn longest_match<I>(&self, symbols: I) -> Option<(NodeId, usize)>
    where
        I: IntoIterator<Item = usize>,
    {
        self.walk(symbols)
            .filter(|&(_, node)| self.has_payload(node))
            .last()
            .map(|(consumed, node)| (node, consumed))
    }

    /// Frees `node` and everything below it, deepest nodes first.
    ///
    /// Every backlink found on the way is handed to `on_backlink` before the
    /// node holding it is released. The root is emptied but never freed.
    pub fn delete_subtree<F>(&mut self, node: NodeId, mut on_backlink: F)
    where
        F: FnMut(Backlink),
    {
        let mut cur = node;
        loop {
            while let Some(child) = self.first_nonempty_child(cur) {
                cur = child;
            }
            let parent = self.parent(cur);
            if let Some(link) = self.release(cur) {
                on_backlink(link);
            }
            if cur == node {
                break;
            }
            match parent {
                Some(parent) => cur = parent,
                None => break,
            }
        }
    }

    /// Walks upward from `node`, freeing nodes with neither payload nor
    /// children. Stops at the first node that still holds something, or at
    /// the root.
    pub fn prune_dead_branch(&mut self, node: NodeId) {
        let mut cur = node;
        while let Some(parent) = self.parent(cur) {
            if self.has_payload(cur) || !self.is_leaf(cur) {
                break;
            }
            self.release(cur);
            cur = parent;
        }
    }

    /// Drops a node's payload and backlink; non-root nodes are also unlinked
    /// and returned to the free list.
    fn release(&mut self, id: NodeId) -> Option<Backlink> {
        debug_assert!(self.is_leaf(id));
        let node = &mut self.nodes[id.idx()];
        let link = node.backlink.take();
        node.payload = None;

        if let Some(parent) = node.parent {
            let symbol = node.symbol as usize;
            *node = Node::VACANT;
            self.nodes[parent.idx()].children[symbol] = None;
            debug_assert!(self.free.len() < self.free.capacity());
            self.free.push(id.0);
            self.live -= 1;
        }
        link
    }

    /// Makes sure `node` can take one more payload entry without allocating.
    ///
    /// Returns true if the payload sequence had to be created, so a rollback
    /// knows to drop it again.
    pub fn reserve_payload(&mut self, node: NodeId) -> Result<bool, TryReserveError> {
        let slot = &mut self.nodes[node.idx()].payload;
        match slot {
            Some(payload) => {
                payload.try_reserve(1)?;
                Ok(false)
            }
            None => {
                let mut payload = Sequence::new();
                payload.try_reserve(1)?;
                *slot = Some(payload);
                Ok(true)
            }
        }
    }

    /// Undoes [`Trie::reserve_payload`] for a payload that stayed empty.
    pub fn release_empty_payload(&mut self, node: NodeId) {
        let slot = &mut self.nodes[node.idx()].payload;
        if slot.as_ref().is_some_and(Sequence::is_empty) {
            *slot = None;
        }
    }

    /// Appends a reverse-tree entry into reserved capacity.
    pub fn push_entry_reserved(&mut self, node: NodeId, source: String) -> Handle {
        self.nodes[node.idx()]
            .payload
            .get_or_insert_with(Sequence::new)
            .append_reserved(Some(source))
    }

    /// Installs `target` as the only payload entry of a forward node, with
    /// `link` as its backlink. Returns the backlink of the replaced redirect.
    ///
    /// The payload must have been reserved.
    pub fn set_redirect(&mut self, node: NodeId, target: String, link: Backlink) -> Option<Backlink> {
        let node = &mut self.nodes[node.idx()];
        let payload = node.payload.get_or_insert_with(Sequence::new);
        if let Some(old) = payload.first() {
            payload.remove(old);
        }
        payload.append_reserved(Some(target));
        debug_assert_eq!(payload.len(), 1);
        node.backlink.replace(link)
    }

    /// Removes the reverse-tree entry named by `link` and prunes the branch
    /// if that left the node empty.
    pub fn remove_backlink(&mut self, link: Backlink) {
        let node = &mut self.nodes[link.node.idx()];
        let Some(payload) = node.payload.as_mut() else {
            return;
        };
        payload.remove(link.entry);
        if payload.is_empty() {
            node.payload = None;
            self.prune_dead_branch(link.node);
        }
    }

    pub fn memory_usage(&self) -> usize {
        self.nodes.capacity() * std::mem::size_of::<Node>()
            + self.free.capacity() * std::mem::size_of::<u32>()
            + self
                .nodes
                .iter()
                .filter_map(|n| n.payload.as_ref())
                .map(Sequence::memory_usage)
                .sum::<usize>()
    }

    pub fn shrink_to_fit(&mut self) {
        self.nodes.shrink_to_fit();
        self.free.shrink_to(self.nodes.len());
        for payload in self.nodes.iter_mut().filter_map(|n| n.payload.as_mut()) {
            payload.shrink_to_fit();
        }
    }
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Trie {
    fn clone(&self) -> Self {
        let mut free = Vec::with_capacity(self.nodes.len());
        free.extend_from_slice(&self.free);
        Self {
            nodes: self.nodes.clone(),
            free,
            live: self.live,
        }
    }
}

/// Iterator returned by [`Trie::walk`].
pub struct Walk<'a, I> {
    trie: &'a Trie,
    symbols: I,
    cur: Option<NodeId>,
    consumed: usize,
}

impl<I> Iterator for Walk<'_, I>
where
    I: Iterator<Item = usize>,
{
    type Item = (usize, NodeId);

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.cur?;
        let symbol = self.symbols.next()?;
        self.cur = self.trie.child(cur, symbol);
        self.consumed += 1;
        self.cur.map(|node| (self.consumed, node))
    }
}
