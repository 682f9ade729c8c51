//! Property-based tests over small generated instruction sequences,
//! checking the invariants the pipeline is expected to hold regardless
//! of input shape.

use l5_backend::cfg::{build_bb, build_ino, eliminate_fall_through, is_critical_edge, split_edge};
use l5_backend::instr::fixtures::AbsInstr;
use l5_backend::label::LabelFactory;
use l5_backend::regalloc::color;
use l5_backend::regalloc::AllocatorConfig;
use l5_backend::temp::{HardReg, Location, Temp};
use l5_backend::{interference::InterferenceGraph, Vertex};
use proptest::prelude::*;

fn t(n: i64) -> Temp {
    Temp::from_raw(n)
}

/// Build a small straight-line-with-one-branch program: `n` temps get
/// immediates, an optional branch joins back, then a return. Shape is
/// bounded small enough that exhaustive block enumeration stays cheap.
fn arb_linear_program(max_temps: usize) -> impl Strategy<Value = (LabelFactory, Vec<AbsInstr>)> {
    (1..=max_temps).prop_map(|n| {
        let mut labels = LabelFactory::new();
        let l0 = labels.fresh_named("L0");
        let mut instrs = vec![AbsInstr::Label(l0)];
        for i in 0..n {
            instrs.push(AbsInstr::Imm { dst: t(i as i64), value: i as i64 });
        }
        instrs.push(AbsInstr::Return(None));
        (labels, instrs)
    })
}

proptest! {
    #[test]
    fn cfg_integrity_holds((mut labels, instrs) in arb_linear_program(8)) {
        let fixed = eliminate_fall_through(&instrs);
        let bbmap = build_bb(&mut labels, &fixed).unwrap();
        for label in bbmap.labels() {
            let block = bbmap.get(label).unwrap();
            prop_assert_eq!(block.instrs.first().unwrap().get_label(), Some(label));
            prop_assert!(block.instrs.last().unwrap().is_control());
            for inner in &block.instrs[1..] {
                prop_assert!(!inner.is_label());
            }
        }
    }

    #[test]
    fn edge_maps_are_mutual_inverses((mut labels, instrs) in arb_linear_program(8)) {
        let fixed = eliminate_fall_through(&instrs);
        let bbmap = build_bb(&mut labels, &fixed).unwrap();
        let edges = build_ino(&bbmap);
        for u in bbmap.labels() {
            for v in edges.succ(u).iter().copied() {
                prop_assert!(edges.pred(v).contains(&u));
            }
            for v in edges.pred(u).iter().copied() {
                prop_assert!(edges.succ(v).contains(&u));
            }
        }
    }

    #[test]
    fn fall_through_elimination_is_idempotent((_, instrs) in arb_linear_program(8)) {
        let once = eliminate_fall_through(&instrs);
        let twice = eliminate_fall_through(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn coloring_is_always_valid(n in 1usize..12, num_regs in 1usize..6) {
        let temps: Vec<Temp> = (0..n as i64).map(Temp::from_raw).collect();
        let mut g = InterferenceGraph::new();
        for i in 0..temps.len() {
            for j in (i + 1)..temps.len() {
                if (i + j) % 2 == 0 {
                    g.add_edge(Vertex::Temp(temps[i]), Vertex::Temp(temps[j]));
                }
            }
        }
        let config = AllocatorConfig { spill_threshold: 2000, num_regs };
        let alloc = color(&g, config);

        for &u in &temps {
            for v in g.neighbors(Vertex::Temp(u)) {
                if let Vertex::Temp(vt) = v {
                    if let (Some(a), Some(b)) = (alloc.location(u), alloc.location(vt)) {
                        prop_assert_ne!(a, b);
                    }
                }
            }
        }

        for &u in &temps {
            if let Some(Location::Reg(r)) = alloc.location(u) {
                prop_assert!(!HardReg::special_use(r.index()));
            }
        }
    }
}

#[test]
fn critical_edge_split_postcondition() {
    let mut labels = LabelFactory::new();
    let l0 = labels.fresh_named("L0");
    let l1 = labels.fresh_named("L1");
    let l2 = labels.fresh_named("L2");
    let l3 = labels.fresh_named("L3");
    let instrs = vec![
        AbsInstr::Label(l0),
        AbsInstr::CJump { cond: t(0), then_label: l1, else_label: l3 },
        AbsInstr::Label(l1),
        AbsInstr::Jump(l3),
        AbsInstr::Label(l2),
        AbsInstr::Jump(l3),
        AbsInstr::Label(l3),
        AbsInstr::Return(None),
    ];
    let mut bbmap = build_bb(&mut labels, &instrs).unwrap();
    let mut edges = build_ino(&bbmap);
    assert!(is_critical_edge(l0, l3, &edges));

    let other_edges: Vec<(l5_backend::Label, l5_backend::Label, bool)> = bbmap
        .labels()
        .flat_map(|u| {
            edges
                .succ(u)
                .iter()
                .copied()
                .map(move |v| (u, v, is_critical_edge(u, v, &edges)))
                .collect::<Vec<_>>()
        })
        .filter(|&(u, v, _)| (u, v) != (l0, l3))
        .collect();

    split_edge(&mut labels, &mut bbmap, &mut edges, l0, l3).unwrap();
    assert!(!is_critical_edge(l0, l3, &edges));

    for (u, v, was_critical) in other_edges {
        assert_eq!(
            is_critical_edge(u, v, &edges),
            was_critical,
            "criticality of unrelated edge ({u:?}, {v:?}) changed"
        );
    }
}
