//! The interference graph consumed by register allocation.

use crate::temp::{HardReg, Temp};
use rustc_hash::{FxHashMap, FxHashSet};

/// A vertex in the interference graph: either a pre-bound hard register
/// or an ordinary temp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Vertex {
    Reg(HardReg),
    Temp(Temp),
}

/// Undirected graph over [`Vertex`]. Adjacency is kept symmetric and
/// loop-free: `v in adj[u] <=> u in adj[v]`, and `u` is never its own
/// neighbour.
#[derive(Debug, Clone, Default)]
pub struct InterferenceGraph {
    adj: FxHashMap<Vertex, FxHashSet<Vertex>>,
}

impl InterferenceGraph {
    pub fn new() -> Self {
        InterferenceGraph { adj: FxHashMap::default() }
    }

    /// Register `v` as a vertex even if it ends up with no neighbours.
    pub fn add_vertex(&mut self, v: Vertex) {
        self.adj.entry(v).or_default();
    }

    /// Add an undirected edge. No-op if `a == b`.
    pub fn add_edge(&mut self, a: Vertex, b: Vertex) {
        if a == b {
            return;
        }
        self.adj.entry(a).or_default().insert(b);
        self.adj.entry(b).or_default().insert(a);
    }

    pub fn neighbors(&self, v: Vertex) -> impl Iterator<Item = Vertex> + '_ {
        self.adj.get(&v).into_iter().flat_map(|s| s.iter().copied())
    }

    pub fn contains(&self, v: Vertex) -> bool {
        self.adj.contains_key(&v)
    }

    pub fn vertices(&self) -> impl Iterator<Item = Vertex> + '_ {
        self.adj.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.adj.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adj.is_empty()
    }

    pub fn degree(&self, v: Vertex) -> usize {
        self.adj.get(&v).map_or(0, |s| s.len())
    }

    /// Verify the symmetry/loop-free invariant. Intended for tests and
    /// debug assertions, not the hot path.
    pub fn is_symmetric(&self) -> bool {
        self.adj.iter().all(|(&u, neighbors)| {
            !neighbors.contains(&u)
                && neighbors
                    .iter()
                    .all(|v| self.adj.get(v).is_some_and(|back| back.contains(&u)))
        })
    }
}

/// Build the interference graph from a sequence of [`crate::convention::RegInfo`]
/// lines already annotated with live-out sets, per the three rules:
/// def-def, def-live-out, and def-use on the same line.
pub fn build<'a>(lines: impl IntoIterator<Item = &'a crate::convention::RegInfo>) -> InterferenceGraph {
    let mut graph = InterferenceGraph::new();
    for line in lines {
        let defs: Vec<Vertex> = line.defines.iter().filter_map(|o| o.as_vertex()).collect();
        let uses: Vec<Vertex> = line.uses.iter().filter_map(|o| o.as_vertex()).collect();

        for &v in &defs {
            graph.add_vertex(v);
        }
        for &v in &uses {
            graph.add_vertex(v);
        }
        for &v in &line.live_out {
            graph.add_vertex(v);
        }

        for i in 0..defs.len() {
            for j in (i + 1)..defs.len() {
                graph.add_edge(defs[i], defs[j]);
            }
        }
        for &d in &defs {
            for &lo in &line.live_out {
                if d != lo {
                    graph.add_edge(d, lo);
                }
            }
        }
        for &d in &defs {
            for &u in &uses {
                if d != u {
                    graph.add_edge(d, u);
                }
            }
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convention::Operand;
    use crate::temp::Temp;

    fn t(n: i64) -> Temp {
        Temp::from_raw(n)
    }

    #[test]
    fn symmetry_holds_after_add_edge() {
        let mut g = InterferenceGraph::new();
        g.add_edge(Vertex::Temp(t(0)), Vertex::Temp(t(1)));
        assert!(g.is_symmetric());
        assert!(g.neighbors(Vertex::Temp(t(0))).any(|v| v == Vertex::Temp(t(1))));
        assert!(g.neighbors(Vertex::Temp(t(1))).any(|v| v == Vertex::Temp(t(0))));
    }

    #[test]
    fn no_self_loops() {
        let mut g = InterferenceGraph::new();
        g.add_edge(Vertex::Temp(t(0)), Vertex::Temp(t(0)));
        assert_eq!(g.degree(Vertex::Temp(t(0))), 0);
    }

    #[test]
    fn def_def_edges_from_same_line() {
        let mut line = crate::convention::RegInfo::default();
        line.defines = smallvec::SmallVec::from_slice(&[Operand::Temp(t(0)), Operand::Temp(t(1))]);
        let g = build([&line]);
        assert!(g.neighbors(Vertex::Temp(t(0))).any(|v| v == Vertex::Temp(t(1))));
    }

    #[test]
    fn def_live_out_edges() {
        let mut line = crate::convention::RegInfo::default();
        line.defines = smallvec::SmallVec::from_slice(&[Operand::Temp(t(0))]);
        line.live_out = vec![Vertex::Temp(t(1)), Vertex::Temp(t(2))];
        let g = build([&line]);
        assert!(g.neighbors(Vertex::Temp(t(0))).any(|v| v == Vertex::Temp(t(1))));
        assert!(g.neighbors(Vertex::Temp(t(0))).any(|v| v == Vertex::Temp(t(2))));
        // live-out temps don't interfere with each other by this rule alone.
        assert!(!g.neighbors(Vertex::Temp(t(1))).any(|v| v == Vertex::Temp(t(2))));
    }
}
