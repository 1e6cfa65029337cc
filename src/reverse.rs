//! Inverse queries: which numbers end up at a given number.
//!
//! Both queries build candidates the same way. `num` itself is one; for every
//! prefix of `num` whose reverse-tree node lists sources, each source with the
//! rest of `num` appended is another. [`PhoneForward::reverse`] keeps them all,
//! so it reports rules that a longer rule may shadow during `get`.
//! [`PhoneForward::get_reverse`] keeps only candidates that really resolve to
//! `num`.

use std::collections::TryReserveError;

use tracing::trace;

use crate::number::{compare_numbers, symbol_indices, try_concat, Number};
use crate::{PhoneForward, PhoneNumbers, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Filter {
    /// Every backlink counts.
    Structural,
    /// Only candidates `c` with `get(c) == num`.
    Verified,
}

impl PhoneForward {
    /// Numbers that a rule maps onto `num`, plus `num` itself.
    ///
    /// For every rule `x -> y` where `y` is a prefix of `num`, the result
    /// holds `x` followed by the part of `num` after `y`. Rules are taken as
    /// stored, without checking whether a longer rule overrides them for that
    /// particular number. Sorted and free of duplicates; an invalid `num`
    /// yields the "no match" placeholder.
    pub fn reverse(&self, num: &str) -> Result<PhoneNumbers> {
        self.inverse(num, Filter::Structural)
    }

    /// Every number `x` with `get(x) == num`, sorted and free of duplicates.
    ///
    /// When no number maps to `num` (or `num` is invalid) the result is the
    /// "no match" placeholder.
    pub fn get_reverse(&self, num: &str) -> Result<PhoneNumbers> {
        self.inverse(num, Filter::Verified)
    }

    fn inverse(&self, num: &str, filter: Filter) -> Result<PhoneNumbers> {
        let Ok(number) = Number::parse(num) else {
            return Ok(PhoneNumbers::no_match()?);
        };

        let mut found = self.candidates(number, filter)?;
        found.sort_unstable_by(|a, b| compare_numbers(a, b));
        found.dedup();
        trace!(number = num, ?filter, found = found.len(), "Inverse resolved");

        if found.is_empty() {
            return Ok(PhoneNumbers::no_match()?);
        }
        Ok(PhoneNumbers::from_vec(found)?)
    }

    fn candidates(
        &self,
        number: Number<'_>,
        filter: Filter,
    ) -> std::result::Result<Vec<String>, TryReserveError> {
        let keep = |head: &str, tail: &str| match filter {
            Filter::Structural => true,
            Filter::Verified => self.resolves_to(head, tail, number.as_str()),
        };

        let mut found = Vec::new();
        if keep(number.as_str(), "") {
            found.try_reserve(1)?;
            found.push(try_concat(&[number.as_str()])?);
        }

        for (consumed, node) in self.reverse.walk(number.symbols()) {
            let Some(sources) = self.reverse.payload(node) else {
                continue;
            };
            let tail = number.suffix(consumed);
            for source in sources.iter().flatten() {
                if keep(source, tail) {
                    found.try_reserve(1)?;
                    found.push(try_concat(&[source, tail])?);
                }
            }
        }
        Ok(found)
    }

    /// Whether `get(head ++ tail) == num`, without building either string.
    fn resolves_to(&self, head: &str, tail: &str, num: &str) -> bool {
        let symbols = symbol_indices(head).chain(symbol_indices(tail));
        let (target, consumed) = self
            .forward
            .longest_match(symbols)
            .and_then(|(node, consumed)| Some((self.forward.redirect(node)?, consumed)))
            .unwrap_or(("", 0));

        // What is left of `head ++ tail` after the matched prefix.
        let rest_head = head.get(consumed..).unwrap_or("");
        let rest_tail = &tail[consumed.saturating_sub(head.len())..];

        num.len() == target.len() + rest_head.len() + rest_tail.len()
            && num.starts_with(target)
            && num[target.len()..].starts_with(rest_head)
            && num.ends_with(rest_tail)
    }
}
