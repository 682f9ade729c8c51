//! Control-flow graph construction: partitioning a linear instruction
//! stream into basic blocks, fall-through elimination, predecessor and
//! successor edge maps, critical-edge splitting, and postorder.

use crate::error::{BackendError, Result};
use crate::instr::Instruction;
use crate::label::{Label, LabelFactory};
use rustc_hash::{FxHashMap, FxHashSet};

/// A single basic block: a label followed by straight-line code ending
/// in exactly one control-flow instruction.
#[derive(Debug, Clone)]
pub struct BasicBlock<I: Instruction> {
    pub label: Label,
    pub instrs: Vec<I>,
}

impl<I: Instruction> BasicBlock<I> {
    /// The block's single terminator, i.e. its last instruction.
    ///
    /// Panics if the block is malformed (empty, or not ending in a
    /// control instruction) -- callers that accept untrusted input should
    /// validate with [`build_bb`], which never produces a block violating
    /// this.
    pub fn terminator(&self) -> &I {
        self.instrs.last().expect("basic block has no instructions")
    }
}

/// `Label -> BasicBlock` map with distinguished ENTRY/EXIT labels.
#[derive(Debug, Clone)]
pub struct BlockMap<I: Instruction> {
    blocks: FxHashMap<Label, BasicBlock<I>>,
    entry: Label,
    exit: Label,
}

impl<I: Instruction> BlockMap<I> {
    pub fn entry(&self) -> Label {
        self.entry
    }

    pub fn exit(&self) -> Label {
        self.exit
    }

    pub fn get(&self, label: Label) -> Option<&BasicBlock<I>> {
        self.blocks.get(&label)
    }

    pub fn get_mut(&mut self, label: Label) -> Option<&mut BasicBlock<I>> {
        self.blocks.get_mut(&label)
    }

    pub fn contains(&self, label: Label) -> bool {
        self.blocks.contains_key(&label)
    }

    pub fn insert(&mut self, block: BasicBlock<I>) {
        self.blocks.insert(block.label, block);
    }

    pub fn labels(&self) -> impl Iterator<Item = Label> + '_ {
        self.blocks.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Predecessor/successor edge maps for a [`BlockMap`]. Both directions
/// are kept as mutual inverses: `v in out[u] <=> u in in_[v]`.
#[derive(Debug, Clone, Default)]
pub struct EdgeMaps {
    pub out_edges: FxHashMap<Label, FxHashSet<Label>>,
    pub in_edges: FxHashMap<Label, FxHashSet<Label>>,
}

impl EdgeMaps {
    pub fn succ(&self, label: Label) -> &FxHashSet<Label> {
        static EMPTY: once_empty::Empty = once_empty::Empty;
        self.out_edges.get(&label).unwrap_or(EMPTY.get())
    }

    pub fn pred(&self, label: Label) -> &FxHashSet<Label> {
        static EMPTY: once_empty::Empty = once_empty::Empty;
        self.in_edges.get(&label).unwrap_or(EMPTY.get())
    }

    fn add_edge(&mut self, from: Label, to: Label) {
        self.out_edges.entry(from).or_default().insert(to);
        self.in_edges.entry(to).or_default().insert(from);
        self.out_edges.entry(to).or_default();
        self.in_edges.entry(from).or_default();
    }

    fn remove_edge(&mut self, from: Label, to: Label) {
        if let Some(s) = self.out_edges.get_mut(&from) {
            s.remove(&to);
        }
        if let Some(s) = self.in_edges.get_mut(&to) {
            s.remove(&from);
        }
    }
}

/// Tiny helper so `succ`/`pred` can return `&FxHashSet<Label>` for labels
/// with no recorded edges without allocating a fresh empty set per call.
mod once_empty {
    use rustc_hash::FxHashSet;
    use std::sync::OnceLock;

    pub struct Empty;
    impl Empty {
        pub fn get(&self) -> &'static FxHashSet<super::Label> {
            static CELL: OnceLock<FxHashSet<super::Label>> = OnceLock::new();
            CELL.get_or_init(FxHashSet::default)
        }
    }
}

/// For every adjacent pair `(i_k, i_{k+1})` where `i_k` is not a
/// control-flow instruction and `i_{k+1}` is a label, insert `jump(L)`
/// between them. Idempotent: running this twice is the same as running
/// it once.
pub fn eliminate_fall_through<I: Instruction>(instrs: &[I]) -> Vec<I> {
    let mut out = Vec::with_capacity(instrs.len());
    for (idx, instr) in instrs.iter().enumerate() {
        out.push(instr.clone());
        if !instr.is_control() {
            if let Some(next) = instrs.get(idx + 1) {
                if let Some(label) = next.get_label() {
                    out.push(I::jump(label));
                }
            }
        }
    }
    out
}

/// Partition a linear instruction sequence into basic blocks, synthesizing
/// ENTRY and EXIT blocks.
///
/// A new block starts at each label instruction; it terminates at the
/// first jump/cjump/ret encountered after that label. If the original
/// sequence ends without a terminator, a `jump(EXIT)` is appended.
pub fn build_bb<I: Instruction>(
    labels: &mut LabelFactory,
    instrs: &[I],
) -> Result<BlockMap<I>> {
    log::debug!("build_bb: {} input instructions", instrs.len());

    let entry = labels.entry();
    let exit = labels.exit();
    let mut blocks: FxHashMap<Label, BasicBlock<I>> = FxHashMap::default();

    // If the program doesn't start with a label, a synthesized one is
    // minted for the leading dead-code run below and used as ENTRY's
    // jump target instead.
    let first_real_label = instrs.first().and_then(|i| i.get_label());

    // Partition into (label, body) groups. A "dead" run of instructions
    // that appears after a terminator but before the next label is kept
    // as a block with a synthesized label so it survives as documented
    // ("preserved as dead blocks").
    let mut cursor = instrs.iter();
    let mut current_label: Option<Label> = None;
    let mut current_body: Vec<I> = Vec::new();
    let mut synthesized_first: Option<Label> = None;

    let flush = |blocks: &mut FxHashMap<Label, BasicBlock<I>>,
                 label: Label,
                 mut body: Vec<I>,
                 labels: &mut LabelFactory| {
        if body.is_empty() {
            return;
        }
        if !body.last().unwrap().is_control() {
            body.push(I::jump(exit));
            let _ = labels; // exit already minted; no fresh label needed
        }
        if blocks.contains_key(&label) {
            return; // duplicate label handled by caller via error path
        }
        blocks.insert(label, BasicBlock { label, instrs: body });
    };

    while let Some(instr) = cursor.next() {
        if instr.is_label() {
            // Flush whatever was accumulated under the previous label.
            if let Some(lbl) = current_label.take() {
                flush(&mut blocks, lbl, std::mem::take(&mut current_body), labels);
            } else if !current_body.is_empty() {
                // Dead code before the very first label: give it a
                // synthesized label so it isn't silently dropped.
                let dead_label = labels.fresh_named("dead_entry");
                synthesized_first.get_or_insert(dead_label);
                flush(&mut blocks, dead_label, std::mem::take(&mut current_body), labels);
            }
            let lbl = instr.get_label().ok_or_else(|| {
                BackendError::MalformedCFG("label instruction with no label".into())
            })?;
            if blocks.contains_key(&lbl) {
                return Err(BackendError::MalformedCFG(format!(
                    "duplicate label {lbl:?}"
                )));
            }
            current_label = Some(lbl);
            current_body.push(instr.clone());
        } else {
            current_body.push(instr.clone());
            if instr.is_control() {
                if let Some(lbl) = current_label.take() {
                    flush(&mut blocks, lbl, std::mem::take(&mut current_body), labels);
                } else {
                    let dead_label = labels.fresh_named("dead_entry");
                    synthesized_first.get_or_insert(dead_label);
                    flush(&mut blocks, dead_label, std::mem::take(&mut current_body), labels);
                }
            }
        }
    }
    // Trailing instructions with no terminator: synthesize jump(EXIT).
    if let Some(lbl) = current_label.take() {
        flush(&mut blocks, lbl, std::mem::take(&mut current_body), labels);
    } else if !current_body.is_empty() {
        let dead_label = labels.fresh_named("dead_tail");
        flush(&mut blocks, dead_label, std::mem::take(&mut current_body), labels);
    }

    let target_of_first_block = first_real_label.or(synthesized_first).ok_or_else(|| {
        BackendError::MalformedCFG("empty function body".into())
    })?;

    blocks.insert(
        entry,
        BasicBlock {
            label: entry,
            instrs: vec![I::label(entry), I::jump(target_of_first_block)],
        },
    );
    blocks.insert(
        exit,
        BasicBlock {
            label: exit,
            instrs: vec![I::label(exit), I::ret()],
        },
    );

    for (label, block) in &blocks {
        if block.instrs.is_empty() {
            return Err(BackendError::MalformedCFG(format!(
                "block {label:?} has no instructions"
            )));
        }
        if !block.instrs.last().unwrap().is_control() {
            return Err(BackendError::MalformedCFG(format!(
                "block {label:?} lacks a terminator"
            )));
        }
        for inner in &block.instrs[1..] {
            if inner.is_label() {
                return Err(BackendError::MalformedCFG(format!(
                    "block {label:?} contains an interior label"
                )));
            }
        }
    }

    Ok(BlockMap { blocks, entry, exit })
}

/// For each block's terminator, add an edge to every label its `next()`
/// names. A `ret` terminator carries no explicit target (its constructor
/// takes no label), so it is special-cased to an edge into EXIT; every
/// other control instruction is handled purely through `next()`. Both
/// maps include every block label as a key.
pub fn build_ino<I: Instruction>(bbmap: &BlockMap<I>) -> EdgeMaps {
    let mut edges = EdgeMaps::default();
    for label in bbmap.labels() {
        edges.out_edges.entry(label).or_default();
        edges.in_edges.entry(label).or_default();
    }
    for (label, block) in &bbmap.blocks {
        let terminator = block.terminator();
        if terminator.is_return() {
            if *label != bbmap.exit() {
                edges.add_edge(*label, bbmap.exit());
            }
            continue;
        }
        for succ in terminator.next() {
            edges.add_edge(*label, succ);
        }
    }
    edges
}

/// `(u, v)` is critical iff it is an edge, `u` has 2+ successors, and `v`
/// has 2+ predecessors.
pub fn is_critical_edge(u: Label, v: Label, edges: &EdgeMaps) -> bool {
    edges.succ(u).contains(&v) && edges.succ(u).len() >= 2 && edges.pred(v).len() >= 2
}

/// Split the edge `(u, v)` by inserting a fresh block `M: jump(v)` and
/// rewriting `u`'s terminator to target `M` instead of `v`.
pub fn split_edge<I: Instruction>(
    labels: &mut LabelFactory,
    bbmap: &mut BlockMap<I>,
    edges: &mut EdgeMaps,
    u: Label,
    v: Label,
) -> Result<Label> {
    if !edges.succ(u).contains(&v) {
        return Err(BackendError::NoSuchEdge { from: u, to: v });
    }

    let m = labels.fresh_named("split");
    bbmap.insert(BasicBlock {
        label: m,
        instrs: vec![I::label(m), I::jump(v)],
    });

    let block = bbmap
        .get_mut(u)
        .ok_or_else(|| BackendError::MalformedCFG(format!("no block for {u:?}")))?;
    let term = block.instrs.last_mut().unwrap();
    if term.is_jump() {
        term.replace_target(m);
    } else if term.is_cjump() {
        term.replace_ctarget(v, m);
    } else {
        return Err(BackendError::InternalInvariant(
            "split_edge: terminator is neither jump nor cjump",
        ));
    }

    edges.remove_edge(u, v);
    edges.add_edge(u, m);
    edges.add_edge(m, v);

    Ok(m)
}

/// Deterministic postorder DFS from ENTRY over the successor map: each
/// node is emitted after all of its successors. Ties among sibling
/// successors are broken by ascending label order.
pub fn postorder(edges: &EdgeMaps, entry: Label) -> Vec<Label> {
    let mut visited: FxHashSet<Label> = FxHashSet::default();
    let mut order = Vec::new();

    // (label, index of next successor to visit)
    let mut stack: Vec<(Label, usize)> = Vec::new();
    visited.insert(entry);
    stack.push((entry, 0));

    while let Some(&mut (label, ref mut next_idx)) = stack.last_mut() {
        let mut succs: Vec<Label> = edges.succ(label).iter().copied().collect();
        succs.sort_unstable();

        if *next_idx < succs.len() {
            let succ = succs[*next_idx];
            *next_idx += 1;
            if visited.insert(succ) {
                stack.push((succ, 0));
            }
        } else {
            order.push(label);
            stack.pop();
        }
    }

    order
}

/// Concatenate block instruction lists in the given order.
pub fn to_instrs<I: Instruction>(bbmap: &BlockMap<I>, order: &[Label]) -> Vec<I> {
    let mut out = Vec::new();
    for label in order {
        if let Some(block) = bbmap.get(*label) {
            out.extend(block.instrs.iter().cloned());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::fixtures::AbsInstr;
    use crate::temp::Temp;

    fn t(n: i64) -> Temp {
        Temp::from_raw(n)
    }

    #[test]
    fn fall_through_elimination_is_idempotent() {
        let mut labels = LabelFactory::new();
        let l0 = labels.fresh_named("L0");
        let instrs = vec![
            AbsInstr::Label(l0),
            AbsInstr::Imm { dst: t(1), value: 1 },
            AbsInstr::Return(None),
        ];
        let once = eliminate_fall_through(&instrs);
        let twice = eliminate_fall_through(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn fall_through_inserts_jump_before_label() {
        let mut labels = LabelFactory::new();
        let l0 = labels.fresh_named("L0");
        let l1 = labels.fresh_named("L1");
        let instrs = vec![
            AbsInstr::Label(l0),
            AbsInstr::Imm { dst: t(1), value: 1 },
            AbsInstr::Label(l1),
            AbsInstr::Return(None),
        ];
        let fixed = eliminate_fall_through(&instrs);
        assert!(matches!(fixed[2], AbsInstr::Jump(l) if l == l1));
    }

    #[test]
    fn linear_block_scenario() {
        // L0; mov t1<-1; mov t2<-2; ret
        let mut labels = LabelFactory::new();
        let l0 = labels.fresh_named("L0");
        let instrs = vec![
            AbsInstr::Label(l0),
            AbsInstr::Imm { dst: t(1), value: 1 },
            AbsInstr::Imm { dst: t(2), value: 2 },
            AbsInstr::Return(None),
        ];
        let bbmap = build_bb(&mut labels, &instrs).unwrap();
        assert_eq!(bbmap.len(), 3); // ENTRY, L0, EXIT
        let edges = build_ino(&bbmap);
        assert_eq!(edges.succ(bbmap.entry()).iter().copied().collect::<Vec<_>>(), vec![l0]);
        assert_eq!(edges.succ(l0).iter().copied().collect::<Vec<_>>(), vec![bbmap.exit()]);
    }

    #[test]
    fn edge_maps_are_mutual_inverses() {
        let mut labels = LabelFactory::new();
        let l0 = labels.fresh_named("L0");
        let l1 = labels.fresh_named("L1");
        let instrs = vec![
            AbsInstr::Label(l0),
            AbsInstr::Jump(l1),
            AbsInstr::Label(l1),
            AbsInstr::Return(None),
        ];
        let bbmap = build_bb(&mut labels, &instrs).unwrap();
        let edges = build_ino(&bbmap);
        for u in bbmap.labels() {
            for v in edges.succ(u).iter().copied() {
                assert!(edges.pred(v).contains(&u));
            }
        }
    }

    fn diamond() -> (LabelFactory, Vec<AbsInstr>, Label, Label, Label, Label) {
        let mut labels = LabelFactory::new();
        let l0 = labels.fresh_named("L0");
        let l1 = labels.fresh_named("L1");
        let l2 = labels.fresh_named("L2");
        let l3 = labels.fresh_named("L3");
        let instrs = vec![
            AbsInstr::Label(l0),
            AbsInstr::CJump { cond: t(1), then_label: l1, else_label: l2 },
            AbsInstr::Label(l1),
            AbsInstr::Jump(l3),
            AbsInstr::Label(l2),
            AbsInstr::Jump(l3),
            AbsInstr::Label(l3),
            AbsInstr::Return(None),
        ];
        (labels, instrs, l0, l1, l2, l3)
    }

    #[test]
    fn critical_edge_detected_and_split() {
        let (mut labels, instrs, l0, _l1, _l2, l3) = diamond();
        let mut bbmap = build_bb(&mut labels, &instrs).unwrap();
        // Rewrite L0's cjump else-branch to jump straight to L3 as well,
        // giving L3 three predecessors and making (L0, L3) critical once
        // L0 also branches elsewhere (it already has 2 successors via cjump).
        {
            let block = bbmap.get_mut(l0).unwrap();
            let term = block.instrs.last_mut().unwrap();
            if let AbsInstr::CJump { else_label, .. } = term {
                *else_label = l3;
            }
        }
        let mut edges = build_ino(&bbmap);
        assert!(is_critical_edge(l0, l3, &edges));
        let m = split_edge(&mut labels, &mut bbmap, &mut edges, l0, l3).unwrap();
        assert!(!is_critical_edge(l0, l3, &edges));
        assert_eq!(edges.succ(m).iter().copied().collect::<Vec<_>>(), vec![l3]);
        assert!(edges.pred(l3).contains(&m));
    }

    #[test]
    fn split_edge_rejects_non_edge() {
        let (mut labels, instrs, l0, l1, _l2, _l3) = diamond();
        let mut bbmap = build_bb(&mut labels, &instrs).unwrap();
        let mut edges = build_ino(&bbmap);
        let err = split_edge(&mut labels, &mut bbmap, &mut edges, l1, l0).unwrap_err();
        assert_eq!(err, BackendError::NoSuchEdge { from: l1, to: l0 });
    }

    #[test]
    fn postorder_visits_every_reachable_label_once() {
        let (mut labels, instrs, ..) = diamond();
        let bbmap = build_bb(&mut labels, &instrs).unwrap();
        let edges = build_ino(&bbmap);
        let order = postorder(&edges, bbmap.entry());
        let mut seen = FxHashSet::default();
        for l in &order {
            assert!(seen.insert(*l), "label visited twice");
        }
        assert_eq!(seen.len(), order.len());
        // ENTRY is the root of the DFS, so it is emitted last.
        assert_eq!(*order.last().unwrap(), bbmap.entry());
    }

    #[test]
    fn to_instrs_concatenates_blocks_in_given_order() {
        let mut labels = LabelFactory::new();
        let l0 = labels.fresh_named("L0");
        let instrs = vec![
            AbsInstr::Label(l0),
            AbsInstr::Imm { dst: t(1), value: 1 },
            AbsInstr::Return(None),
        ];
        let bbmap = build_bb(&mut labels, &instrs).unwrap();
        let order = vec![bbmap.entry(), l0, bbmap.exit()];
        let flat = to_instrs(&bbmap, &order);
        assert_eq!(flat.first().unwrap().get_label(), Some(bbmap.entry()));
        assert_eq!(flat.len(), bbmap.get(bbmap.entry()).unwrap().instrs.len()
            + bbmap.get(l0).unwrap().instrs.len()
            + bbmap.get(bbmap.exit()).unwrap().instrs.len());
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let mut labels = LabelFactory::new();
        let l0 = labels.fresh_named("L0");
        let instrs = vec![
            AbsInstr::Label(l0),
            AbsInstr::Jump(l0),
            AbsInstr::Label(l0),
            AbsInstr::Return(None),
        ];
        assert!(build_bb(&mut labels, &instrs).is_err());
    }
}
