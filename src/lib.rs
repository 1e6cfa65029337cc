//! # phone-forward
//!
//! A prefix-based phone number forwarding index.
//!
//! Rules say "every number starting with `num1` is rewritten by replacing that
//! prefix with `num2`". Lookups apply the most specific (longest) matching
//! rule, exactly once. Two cross-linked tries keep the rules (forward) and
//! their inverses (reverse), so both directions are answered by walking a
//! single path.
//!
//! Numbers are strings over `0`-`9`, `*` and `#`.
//!
//! ## Example
//!
//! ```rust
//! use phone_forward::PhoneForward;
//!
//! let mut pf = PhoneForward::new();
//! pf.add("123", "999").unwrap();
//! assert_eq!(pf.get("1234").unwrap().get(0), Some("9994"));
//!
//! // Adding the same prefix again replaces the rule.
//! pf.add("123", "4").unwrap();
//! assert_eq!(pf.get("1234").unwrap().get(0), Some("44"));
//!
//! let rev = pf.reverse("44").unwrap();
//! assert_eq!(rev.iter().collect::<Vec<_>>(), ["1234", "44"]);
//!
//! pf.remove("123");
//! assert_eq!(pf.get("1234").unwrap().get(0), Some("1234"));
//! ```
//!
//! ## Failure model
//!
//! Every allocation made by [`PhoneForward::add`], [`PhoneForward::get`],
//! [`PhoneForward::reverse`] and [`PhoneForward::get_reverse`] goes through
//! `try_reserve`. When the allocator refuses, the call returns
//! [`Error::AllocationFailure`] and the index is exactly as it was before the
//! call. Removal never allocates and cannot fail.

#![forbid(unsafe_code)]

pub mod error;
pub mod number;
mod reverse;
pub mod sequence;
pub mod trie;

pub use error::{Error, InvalidArgument, Result};
pub use number::Number;
pub use sequence::{Handle, Sequence};

use std::collections::TryReserveError;
use std::fmt;

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use number::{try_concat, ALPHABET};
use trie::{Backlink, NodeId, PathEnd, Trie};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a [`PhoneForward`] index.
#[derive(Debug, Clone)]
pub struct Config {
    /// Node capacity reserved up front in the forward (rule) tree.
    pub forward_nodes: usize,
    /// Node capacity reserved up front in the reverse (backlink) tree.
    pub reverse_nodes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            forward_nodes: 64,
            reverse_nodes: 64,
        }
    }
}

/// Size statistics for an index.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    /// Live forward-tree nodes, root included
    pub forward_nodes: usize,
    /// Live reverse-tree nodes, root included
    pub reverse_nodes: usize,
    /// Active redirect rules
    pub redirects: usize,
    /// Approximate heap bytes held by both trees
    pub memory_bytes: usize,
}

// =============================================================================
// Query results
// =============================================================================

/// Numbers produced by a query.
///
/// An invalid `get` argument yields an empty result. `reverse` and
/// `get_reverse` report "no match" as a single placeholder entry that
/// [`PhoneNumbers::get`] returns as `None`.
#[derive(Clone)]
pub struct PhoneNumbers {
    numbers: Sequence,
}

impl PhoneNumbers {
    fn empty() -> Self {
        Self {
            numbers: Sequence::new(),
        }
    }

    fn no_match() -> std::result::Result<Self, TryReserveError> {
        let mut numbers = Sequence::new();
        numbers.append(None)?;
        Ok(Self { numbers })
    }

    fn single(number: String) -> std::result::Result<Self, TryReserveError> {
        let mut numbers = Sequence::new();
        numbers.append(Some(number))?;
        Ok(Self { numbers })
    }

    fn from_vec(list: Vec<String>) -> std::result::Result<Self, TryReserveError> {
        let mut numbers = Sequence::new();
        numbers.try_reserve(list.len())?;
        for number in list {
            numbers.append_reserved(Some(number));
        }
        Ok(Self { numbers })
    }

    /// Number of entries, the "no match" placeholder included.
    #[inline]
    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    /// True for an invalid `get` argument; a "no match" result is not empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    /// The number at `idx`; `None` when out of bounds or for the placeholder.
    #[inline]
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.numbers.nth(idx)
    }

    /// True for the single-placeholder result of a reverse query.
    pub fn is_no_match(&self) -> bool {
        self.numbers.len() == 1 && self.numbers.iter().next() == Some(None)
    }

    /// The numbers in order, placeholder skipped.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.numbers.iter().flatten()
    }
}

impl fmt::Debug for PhoneNumbers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.numbers.fmt(f)
    }
}

// =============================================================================
// Undo log
// =============================================================================

#[derive(Clone, Copy, Debug)]
enum Side {
    Forward,
    Reverse,
}

#[derive(Clone, Copy, Debug)]
enum Undo {
    /// Delete a subtree created by `find_or_create_path`.
    Path(Side, NodeId),
    /// Drop a payload sequence created by `reserve_payload`.
    Payload(Side, NodeId),
}

/// Steps taken while staging a mutation, unwound newest first on failure.
///
/// A staged `add` records at most four steps, so the log never leaves its
/// inline storage.
#[derive(Default)]
struct UndoLog(SmallVec<[Undo; 4]>);

impl UndoLog {
    fn path(&mut self, side: Side, end: PathEnd) {
        if let Some(first) = end.created {
            self.0.push(Undo::Path(side, first));
        }
    }

    fn payload(&mut self, side: Side, node: NodeId, created: bool) {
        if created {
            self.0.push(Undo::Payload(side, node));
        }
    }

    fn unwind(self, pf: &mut PhoneForward) {
        for undo in self.0.into_iter().rev() {
            match undo {
                Undo::Path(side, first) => pf.tree_mut(side).delete_subtree(first, |_| {}),
                Undo::Payload(side, node) => pf.tree_mut(side).release_empty_payload(node),
            }
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Phone number forwarding index.
///
/// Owns the forward tree (one node per rule prefix, carrying the redirect
/// target) and the reverse tree (one node per target prefix, listing every
/// source redirected onto it). Dropping the index releases both.
#[derive(Clone)]
pub struct PhoneForward {
    forward: Trie,
    reverse: Trie,
    redirects: usize,
}

impl PhoneForward {
    /// Creates an index with no redirects.
    pub fn new() -> Self {
        Self {
            forward: Trie::new(),
            reverse: Trie::new(),
            redirects: 0,
        }
    }

    /// Creates an index, reserving node capacity as `config` asks.
    pub fn with_config(config: Config) -> Result<Self> {
        Ok(Self {
            forward: Trie::with_capacity(config.forward_nodes)?,
            reverse: Trie::with_capacity(config.reverse_nodes)?,
            redirects: 0,
        })
    }

    /// Number of active redirect rules.
    #[inline]
    pub fn len(&self) -> usize {
        self.redirects
    }

    /// True when no redirect rule is active.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.redirects == 0
    }

    /// Node counts, rule count and approximate heap usage.
    pub fn stats(&self) -> Stats {
        Stats {
            forward_nodes: self.forward.node_count(),
            reverse_nodes: self.reverse.node_count(),
            redirects: self.redirects,
            memory_bytes: self.forward.memory_usage() + self.reverse.memory_usage(),
        }
    }

    /// Releases spare arena capacity in both trees.
    pub fn shrink_to_fit(&mut self) {
        self.forward.shrink_to_fit();
        self.reverse.shrink_to_fit();
    }

    fn tree_mut(&mut self, side: Side) -> &mut Trie {
        match side {
            Side::Forward => &mut self.forward,
            Side::Reverse => &mut self.reverse,
        }
    }

    /// Redirects every number starting with `num1` to the same number with
    /// that prefix replaced by `num2`, replacing any earlier rule for `num1`.
    ///
    /// Fails with [`Error::InvalidArgument`] if either number is invalid or
    /// both are equal, and with [`Error::AllocationFailure`] if memory runs
    /// out. On failure nothing changes, the earlier rule included.
    pub fn add(&mut self, num1: &str, num2: &str) -> Result<()> {
        let source = Number::parse(num1)?;
        let target = Number::parse(num2)?;
        if source == target {
            return Err(InvalidArgument::SelfRedirect.into());
        }

        // Owned copies first: nothing to undo if they fail.
        let source_entry = try_concat(&[source.as_str()])?;
        let target_entry = try_concat(&[target.as_str()])?;

        let mut log = UndoLog::default();
        let (f, r) = match self.stage_add(source, target, &mut log) {
            Ok(nodes) => nodes,
            Err(err) => {
                warn!(source = num1, target = num2, "Allocation failed, add rolled back");
                log.unwind(self);
                return Err(err.into());
            }
        };

        // Commit. Every step below runs in reserved capacity.
        let entry = self.reverse.push_entry_reserved(r, source_entry);
        let link = Backlink { node: r, entry };
        match self.forward.set_redirect(f, target_entry, link) {
            Some(old) => {
                self.reverse.remove_backlink(old);
                debug!(source = num1, target = num2, "Redirect replaced");
            }
            None => {
                self.redirects += 1;
                debug!(source = num1, target = num2, "Redirect added");
            }
        }
        Ok(())
    }

    /// Creates both paths and reserves both payload slots, logging each step.
    fn stage_add(
        &mut self,
        source: Number<'_>,
        target: Number<'_>,
        log: &mut UndoLog,
    ) -> std::result::Result<(NodeId, NodeId), TryReserveError> {
        let f = self.forward.find_or_create_path(source.symbols())?;
        log.path(Side::Forward, f);
        if !self.forward.has_payload(f.node) {
            let created = self.forward.reserve_payload(f.node)?;
            log.payload(Side::Forward, f.node, created);
        }

        let r = self.reverse.find_or_create_path(target.symbols())?;
        log.path(Side::Reverse, r);
        let created = self.reverse.reserve_payload(r.node)?;
        log.payload(Side::Reverse, r.node, created);

        Ok((f.node, r.node))
    }

    /// Removes every rule whose prefix starts with `num`. Returns how many
    /// rules were removed; invalid or unknown numbers remove nothing.
    pub fn remove(&mut self, num: &str) -> usize {
        let Ok(number) = Number::parse(num) else {
            return 0;
        };
        let Some(node) = self.forward.find_path(number.symbols()) else {
            return 0;
        };

        let father = self.forward.parent(node);
        let reverse = &mut self.reverse;
        let mut removed = 0usize;
        self.forward.delete_subtree(node, |link| {
            reverse.remove_backlink(link);
            removed += 1;
        });
        if let Some(father) = father {
            self.forward.prune_dead_branch(father);
        }

        self.redirects -= removed;
        debug!(prefix = num, removed, "Redirects removed");
        removed
    }

    /// Applies the longest matching rule to `num`.
    ///
    /// The result holds exactly one number: the rewritten one, or `num`
    /// itself if no rule matches. It is empty if `num` is not a valid number.
    pub fn get(&self, num: &str) -> Result<PhoneNumbers> {
        let Ok(number) = Number::parse(num) else {
            return Ok(PhoneNumbers::empty());
        };
        let resolved = try_concat(&self.resolve(number))?;
        trace!(number = num, resolved = %resolved, "Resolved");
        Ok(PhoneNumbers::single(resolved)?)
    }

    /// `get(num)` as a prefix and suffix borrowed from the index and `num`.
    fn resolve<'a>(&'a self, number: Number<'a>) -> [&'a str; 2] {
        self.forward
            .longest_match(number.symbols())
            .and_then(|(node, consumed)| Some([self.forward.redirect(node)?, number.suffix(consumed)]))
            .unwrap_or([number.as_str(), ""])
    }

    /// Active rules as `(prefix, target)`, in symbol order of the prefix.
    pub fn iter(&self) -> Rules<'_> {
        let mut stack = Vec::new();
        stack.extend(self.forward.children(NodeId::ROOT).rev().map(|(s, c)| (c, 1, s)));
        Rules {
            trie: &self.forward,
            stack,
            path: String::new(),
        }
    }
}

impl Default for PhoneForward {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PhoneForward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Iterator returned by [`PhoneForward::iter`].
pub struct Rules<'a> {
    trie: &'a Trie,
    /// (node, depth, symbol under which it hangs)
    stack: Vec<(NodeId, usize, usize)>,
    path: String,
}

impl<'a> Iterator for Rules<'a> {
    type Item = (String, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, depth, symbol)) = self.stack.pop() {
            self.path.truncate(depth - 1);
            self.path.push(char::from(ALPHABET[symbol]));
            self.stack.extend(
                self.trie
                    .children(node)
                    .rev()
                    .map(|(s, c)| (c, depth + 1, s)),
            );
            if let Some(target) = self.trie.redirect(node) {
                return Some((self.path.clone(), target));
            }
        }
        None
    }
}


#[cfg(test)]
mod proptests;
