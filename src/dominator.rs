//! Immediate dominators, dominator tree, and dominance frontiers.
//!
//! Uses the Cooper-Harvey-Kennedy iterative algorithm: number blocks by
//! reverse postorder, then repeatedly intersect each block's processed
//! predecessors' `idom` until a fixed point. No path-compressed union-find
//! is needed at this scale; the finger-walk `intersect` below is the
//! textbook formulation.

use crate::cfg::{postorder, EdgeMaps};
use crate::error::{BackendError, Result};
use crate::label::Label;
use rustc_hash::FxHashMap;

/// Reverse-postorder numbering: `rpo[label]` is smaller for blocks closer
/// to ENTRY in the DFS postorder sense.
fn reverse_postorder(edges: &EdgeMaps, entry: Label) -> (Vec<Label>, FxHashMap<Label, usize>) {
    let mut order = postorder(edges, entry);
    order.reverse();
    let numbers: FxHashMap<Label, usize> = order.iter().enumerate().map(|(i, l)| (*l, i)).collect();
    (order, numbers)
}

/// `idom[label]` for every block reachable from `entry`. ENTRY has no
/// immediate dominator and is absent from the map.
#[derive(Debug, Clone)]
pub struct DominatorTree {
    idom: FxHashMap<Label, Label>,
    children: FxHashMap<Label, Vec<Label>>,
    entry: Label,
}

impl DominatorTree {
    /// The immediate dominator of `label`, or `None` for `entry` itself.
    pub fn idom(&self, label: Label) -> Option<Label> {
        self.idom.get(&label).copied()
    }

    /// Blocks immediately dominated by `label`, in ascending label order.
    pub fn children(&self, label: Label) -> &[Label] {
        self.children.get(&label).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Does `a` dominate `b`? Every block dominates itself.
    pub fn dominates(&self, a: Label, b: Label) -> bool {
        if a == b {
            return true;
        }
        let mut cur = b;
        while let Some(idom) = self.idom(cur) {
            if idom == a {
                return true;
            }
            cur = idom;
        }
        false
    }

    pub fn entry(&self) -> Label {
        self.entry
    }
}

/// Compute immediate dominators for every block reachable from `entry`.
///
/// Returns [`BackendError::UnreachableAssumption`] only if queried later
/// for a block this tree never reached; the construction itself simply
/// skips unreachable blocks, mirroring how dead blocks are preserved but
/// left outside the dominance relation.
pub fn compute_idom(edges: &EdgeMaps, entry: Label) -> DominatorTree {
    log::debug!("compute_idom: entry = {entry:?}");
    let (rpo_order, rpo_number) = reverse_postorder(edges, entry);

    let mut idom: FxHashMap<Label, Label> = FxHashMap::default();
    idom.insert(entry, entry);

    let mut changed = true;
    while changed {
        changed = false;
        for &block in rpo_order.iter().skip(1) {
            // entry is rpo_order[0]
            let mut preds: Vec<Label> = edges
                .pred(block)
                .iter()
                .copied()
                .filter(|p| idom.contains_key(p))
                .collect();
            preds.sort_unstable_by_key(|p| rpo_number[p]);

            let Some(&first) = preds.first() else {
                continue;
            };
            let mut new_idom = first;
            for &pred in &preds[1..] {
                new_idom = intersect(&idom, &rpo_number, new_idom, pred);
            }

            if idom.get(&block) != Some(&new_idom) {
                idom.insert(block, new_idom);
                changed = true;
            }
        }
    }

    idom.remove(&entry);

    let mut children: FxHashMap<Label, Vec<Label>> = FxHashMap::default();
    for (&block, &parent) in &idom {
        children.entry(parent).or_default().push(block);
    }
    for kids in children.values_mut() {
        kids.sort_unstable();
    }

    DominatorTree { idom, children, entry }
}

/// Walk two blocks' dominator-tree ancestry up to their common ancestor,
/// using RPO numbers as the finger height (lower number = closer to the
/// root, since entry has number 0).
fn intersect(
    idom: &FxHashMap<Label, Label>,
    rpo_number: &FxHashMap<Label, usize>,
    mut a: Label,
    mut b: Label,
) -> Label {
    while a != b {
        while rpo_number[&a] > rpo_number[&b] {
            a = idom[&a];
        }
        while rpo_number[&b] > rpo_number[&a] {
            b = idom[&b];
        }
    }
    a
}

/// Get the immediate dominator of a specific block, erroring if it was
/// never reached from ENTRY.
pub fn idom_of(tree: &DominatorTree, label: Label) -> Result<Label> {
    if label == tree.entry() {
        return Err(BackendError::UnreachableAssumption(label));
    }
    tree.idom(label)
        .ok_or(BackendError::UnreachableAssumption(label))
}

/// `DF[n]` per the standard definition: `n` is in `DF[m]` iff `m`
/// dominates a predecessor of `n` but does not strictly dominate `n`
/// itself.
pub fn dominance_frontier(
    edges: &EdgeMaps,
    tree: &DominatorTree,
    reachable: &[Label],
) -> FxHashMap<Label, Vec<Label>> {
    let mut df: FxHashMap<Label, Vec<Label>> = FxHashMap::default();
    for &n in reachable {
        if edges.pred(n).len() < 2 {
            continue;
        }
        for &pred in edges.pred(n) {
            if !reachable.contains(&pred) {
                continue;
            }
            let mut runner = pred;
            while Some(runner) != tree.idom(n) {
                df.entry(runner).or_default().push(n);
                match tree.idom(runner) {
                    Some(next) => runner = next,
                    None => break,
                }
            }
        }
    }
    for entries in df.values_mut() {
        entries.sort_unstable();
        entries.dedup();
    }
    df
}
