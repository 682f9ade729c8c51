//! Per-instruction (line-level) gen/kill derivation and the backward-may
//! dataflow solver that fills in live-out sets.

use crate::convention::RegInfo;
use crate::instr::Instruction;
use crate::interference::Vertex;
use crate::label::Label;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::collections::VecDeque;

/// `line_number -> label` for every label instruction in `instrs`, used
/// to resolve jump/cjump targets to a line index.
fn index_labels<I: Instruction>(instrs: &[I]) -> FxHashMap<Label, usize> {
    instrs
        .iter()
        .enumerate()
        .filter_map(|(i, instr)| instr.get_label().map(|l| (l, i)))
        .collect()
}

/// Successor lines of instruction at `line`, per the line-level
/// semantics: straight-line and label instructions fall through to
/// `line + 1`; jumps and cjumps resolve every target `next()` names
/// (both of a cjump's explicit branches, none implicit, this
/// instruction model has no fallthrough branch the way a single-target
/// conditional jump would); returns have no successor line.
fn line_successors<I: Instruction>(
    instrs: &[I],
    line: usize,
    label_lines: &FxHashMap<Label, usize>,
) -> SmallVec<[usize; 2]> {
    let instr = &instrs[line];
    let mut out = SmallVec::new();

    if instr.is_return() {
        return out;
    }

    if instr.is_jump() || instr.is_cjump() {
        for target in instr.next() {
            if let Some(&l) = label_lines.get(&target) {
                out.push(l);
            }
        }
        return out;
    }

    if line + 1 < instrs.len() {
        out.push(line + 1);
    }
    out
}

/// Run the liveness solver over `instrs`, returning one [`RegInfo`] per
/// instruction with `live_out` filled in.
///
/// `reg_info` must yield one record per instruction, in order, with
/// `uses`/`defines` already populated and `live_out` empty.
pub fn analyze<I: Instruction>(instrs: &[I], mut lines: Vec<RegInfo>) -> Vec<RegInfo> {
    debug_assert_eq!(instrs.len(), lines.len());
    log::debug!("liveness::analyze: {} instructions", instrs.len());

    let label_lines = index_labels(instrs);
    let gen: Vec<FxHashSet<Vertex>> = lines
        .iter()
        .map(|l| l.uses.iter().filter_map(|o| o.as_vertex()).collect())
        .collect();
    let kill: Vec<FxHashSet<Vertex>> = lines
        .iter()
        .enumerate()
        .map(|(i, l)| {
            l.defines
                .iter()
                .filter_map(|o| o.as_vertex())
                .filter(|v| !gen[i].contains(v))
                .collect()
        })
        .collect();
    let succs: Vec<SmallVec<[usize; 2]>> = (0..instrs.len())
        .map(|i| line_successors(instrs, i, &label_lines))
        .collect();

    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); instrs.len()];
    for (line, ss) in succs.iter().enumerate() {
        for &s in ss {
            preds[s].push(line);
        }
    }

    let mut in_sets: Vec<FxHashSet<Vertex>> = vec![FxHashSet::default(); instrs.len()];
    let mut out_sets: Vec<FxHashSet<Vertex>> = vec![FxHashSet::default(); instrs.len()];

    let mut worklist: VecDeque<usize> = (0..instrs.len()).rev().collect();
    let mut queued: Vec<bool> = vec![true; instrs.len()];
    let mut iterations: u64 = 0;

    while let Some(line) = worklist.pop_front() {
        queued[line] = false;
        iterations += 1;

        let mut new_out: FxHashSet<Vertex> = FxHashSet::default();
        for &s in &succs[line] {
            new_out.extend(in_sets[s].iter().copied());
        }

        let mut new_in = gen[line].clone();
        new_in.extend(new_out.difference(&kill[line]).copied());

        let in_grew = new_in.len() != in_sets[line].len() || !new_in.iter().all(|v| in_sets[line].contains(v));
        out_sets[line] = new_out;
        if in_grew {
            in_sets[line] = new_in;
            for &p in &preds[line] {
                if !queued[p] {
                    queued[p] = true;
                    worklist.push_back(p);
                }
            }
        }
    }

    log::trace!("liveness::analyze: fixed point after {iterations} worklist pops");

    for (i, line) in lines.iter_mut().enumerate() {
        let mut out: Vec<Vertex> = out_sets[i].iter().copied().collect();
        out.sort_unstable();
        line.live_out = out;
    }
    lines
}
