use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use crate::number::compare_numbers;

/// Checks every structural invariant of both trees.
fn validate_index(pf: &PhoneForward) {
    let forward = &pf.forward;
    let reverse = &pf.reverse;

    let mut links = HashSet::new();
    let mut redirects = 0usize;
    let mut stack = vec![(NodeId::ROOT, String::new())];
    let mut forward_nodes = 0usize;

    while let Some((node, path)) = stack.pop() {
        forward_nodes += 1;
        validate_node(forward, node);

        let payload_len = forward.payload(node).map_or(0, Sequence::len);
        assert!(payload_len <= 1, "forward payload holds {payload_len} entries");
        assert_eq!(
            forward.has_payload(node),
            forward.backlink(node).is_some(),
            "redirect and backlink must come together at {path:?}"
        );

        if let Some(link) = forward.backlink(node) {
            redirects += 1;
            assert!(links.insert((link.node, link.entry)), "shared backlink");

            let target = forward.redirect(node).expect("redirect");
            assert_ne!(target, path, "self redirect stored");
            let target_node = reverse.find_path(number::symbol_indices(target));
            assert_eq!(target_node, Some(link.node), "backlink node off target path");
            let entry = reverse
                .payload(link.node)
                .and_then(|p| p.get(link.entry));
            assert_eq!(entry, Some(path.as_str()), "backlink entry mismatch");
        }

        for (symbol, child) in forward.children(node) {
            assert_eq!(forward.parent(child), Some(node));
            let mut child_path = path.clone();
            child_path.push(char::from(ALPHABET[symbol]));
            stack.push((child, child_path));
        }
    }

    let mut entries = 0usize;
    let mut reverse_nodes = 0usize;
    let mut stack = vec![NodeId::ROOT];
    while let Some(node) = stack.pop() {
        reverse_nodes += 1;
        validate_node(reverse, node);
        assert!(reverse.backlink(node).is_none());
        entries += reverse.payload(node).map_or(0, Sequence::len);
        for (_, child) in reverse.children(node) {
            assert_eq!(reverse.parent(child), Some(node));
            stack.push(child);
        }
    }

    assert_eq!(redirects, pf.len(), "redirect count");
    assert_eq!(entries, pf.len(), "every reverse entry backs one redirect");
    assert_eq!(forward_nodes, forward.node_count());
    assert_eq!(reverse_nodes, reverse.node_count());
}

fn validate_node(trie: &Trie, node: NodeId) {
    if let Some(payload) = trie.payload(node) {
        assert!(!payload.is_empty(), "empty payload sequence retained");
    }
    if node != NodeId::ROOT {
        assert!(
            trie.has_payload(node) || !trie.is_leaf(node),
            "dead node retained"
        );
    } else {
        assert!(trie.parent(node).is_none());
    }
}

fn is_number(s: &str) -> bool {
    Number::parse(s).is_ok()
}

fn naive_get(rules: &BTreeMap<String, String>, num: &str) -> Option<String> {
    if !is_number(num) {
        return None;
    }
    let resolved = (1..=num.len())
        .rev()
        .find_map(|i| rules.get(&num[..i]).map(|t| format!("{t}{}", &num[i..])))
        .unwrap_or_else(|| num.to_string());
    Some(resolved)
}

fn naive_inverse(rules: &BTreeMap<String, String>, num: &str, verified: bool) -> Option<Vec<String>> {
    if !is_number(num) {
        return None;
    }
    let mut out = vec![num.to_string()];
    for (source, target) in rules {
        if let Some(rest) = num.strip_prefix(target.as_str()) {
            out.push(format!("{source}{rest}"));
        }
    }
    if verified {
        out.retain(|x| naive_get(rules, x).as_deref() == Some(num));
    }
    out.sort_by(|a, b| compare_numbers(a, b));
    out.dedup();
    (!out.is_empty()).then_some(out)
}

fn collect(res: &PhoneNumbers) -> Option<Vec<String>> {
    if res.is_no_match() {
        return None;
    }
    Some(res.iter().map(str::to_owned).collect())
}

fn assert_strictly_increasing(list: &[String]) {
    for pair in list.windows(2) {
        assert_eq!(compare_numbers(&pair[0], &pair[1]), Ordering::Less);
    }
}

fn number_strategy() -> impl Strategy<Value = String> + Clone {
    // A small alphabet keeps prefixes colliding.
    "[0-2*#]{1,4}"
}

fn input_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        18 => number_strategy(),
        1 => Just(String::new()),
        1 => "[0-2a+]{1,3}",
    ]
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 5)]
    Add(
        #[proptest(strategy = "input_strategy()")] String,
        #[proptest(strategy = "input_strategy()")] String,
    ),
    #[proptest(weight = 2)]
    Remove(#[proptest(strategy = "input_strategy()")] String),
    #[proptest(weight = 2)]
    Get(#[proptest(strategy = "input_strategy()")] String),
    Reverse(#[proptest(strategy = "input_strategy()")] String),
    GetReverse(#[proptest(strategy = "input_strategy()")] String),
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in prop::collection::vec(any::<Op>(), 0..=300)) {
        let mut pf = PhoneForward::new();
        let mut rules: BTreeMap<String, String> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Add(a, b) => {
                    let valid = is_number(&a) && is_number(&b) && a != b;
                    let res = pf.add(&a, &b);
                    prop_assert_eq!(res.is_ok(), valid);
                    if valid {
                        rules.insert(a, b);
                    } else {
                        prop_assert!(res.unwrap_err().is_invalid_argument());
                    }
                }
                Op::Remove(a) => {
                    let before = rules.len();
                    if is_number(&a) {
                        rules.retain(|k, _| !k.starts_with(a.as_str()));
                    }
                    prop_assert_eq!(pf.remove(&a), before - rules.len());
                }
                Op::Get(a) => {
                    let res = pf.get(&a).unwrap();
                    let got: Vec<String> = res.iter().map(str::to_owned).collect();
                    let expected: Vec<String> = naive_get(&rules, &a).into_iter().collect();
                    prop_assert_eq!(got, expected);
                }
                Op::Reverse(a) => {
                    let got = collect(&pf.reverse(&a).unwrap());
                    if let Some(list) = &got {
                        assert_strictly_increasing(list);
                        prop_assert!(list.contains(&a));
                    }
                    prop_assert_eq!(got, naive_inverse(&rules, &a, false));
                }
                Op::GetReverse(a) => {
                    let got = collect(&pf.get_reverse(&a).unwrap());
                    if let Some(list) = &got {
                        assert_strictly_increasing(list);
                        for x in list {
                            let resolved = naive_get(&rules, x);
                            prop_assert_eq!(resolved.as_deref(), Some(a.as_str()));
                        }
                    }
                    prop_assert_eq!(got, naive_inverse(&rules, &a, true));
                }
            }

            prop_assert_eq!(pf.len(), rules.len());
        }

        validate_index(&pf);
        let got: Vec<(String, String)> = pf.iter().map(|(k, v)| (k, v.to_string())).collect();
        let mut expected: Vec<(String, String)> = rules.into_iter().collect();
        expected.sort_by(|a, b| compare_numbers(&a.0, &b.0));
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_get_reverse_contains_preimage(
        rules in prop::collection::vec((number_strategy(), number_strategy()), 0..=40),
        probe in number_strategy(),
    ) {
        let mut pf = PhoneForward::new();
        for (a, b) in &rules {
            let _ = pf.add(a, b);
        }

        let image = pf.get(&probe).unwrap().get(0).map(str::to_owned).expect("valid probe");
        let preimages = pf.get_reverse(&image).unwrap();
        prop_assert!(preimages.iter().any(|x| x == probe));
        for x in preimages.iter() {
            let resolved = pf.get(x).unwrap();
            prop_assert_eq!(resolved.get(0), Some(image.as_str()));
        }
        prop_assert!(pf.reverse(&image).unwrap().iter().any(|x| x == image));
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

const SMALL_RULES: [(&str, &str); 6] = [
    ("1", "2"),
    ("12", "2"),
    ("123", "21"),
    ("2", "1"),
    ("21", "*"),
    ("#", "12"),
];

#[test]
fn exhaustive_add_order_small_set() {
    let mut expected: Option<Vec<(String, String)>> = None;

    for_each_permutation(&SMALL_RULES, |perm| {
        let mut pf = PhoneForward::new();
        for (a, b) in perm {
            pf.add(a, b).unwrap();
        }
        validate_index(&pf);

        let rules: Vec<(String, String)> = pf.iter().map(|(k, v)| (k, v.to_string())).collect();
        match &expected {
            Some(e) => assert_eq!(&rules, e),
            None => expected = Some(rules),
        }
        // "2" lists "1" and "12"; "21" lists "123".
        assert_eq!(
            collect(&pf.reverse("21").unwrap()).unwrap(),
            vec!["11", "121", "123", "21"]
        );
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    let mut base = PhoneForward::new();
    for (a, b) in SMALL_RULES {
        base.add(a, b).unwrap();
    }
    validate_index(&base);

    for_each_permutation(&SMALL_RULES, |perm| {
        let mut pf = base.clone();
        for (a, _) in perm {
            pf.remove(a);
            validate_index(&pf);
        }
        assert!(pf.is_empty());
        let stats = pf.stats();
        assert_eq!((stats.forward_nodes, stats.reverse_nodes), (1, 1));
    });
}

#[test]
fn replace_chain_leaves_single_backlink() {
    let mut pf = PhoneForward::new();
    for target in ["9", "99", "9", "*", "#1", "0"] {
        pf.add("5", target).unwrap();
        validate_index(&pf);
    }
    assert_eq!(pf.len(), 1);
    assert_eq!(pf.stats().reverse_nodes, 2);
    assert_eq!(collect(&pf.reverse("0").unwrap()).unwrap(), vec!["0", "5"]);
}
