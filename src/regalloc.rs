//! Graph-coloring register allocation: Maximum Cardinality Search,
//! greedy coloring, and the deterministic spill-all fast path.

use crate::interference::{InterferenceGraph, Vertex};
use crate::temp::{HardReg, Location, SpillSlot, Temp};
use rustc_hash::{FxHashMap, FxHashSet};

/// Tunables for the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Vertex count above which allocation skips graph construction and
    /// spills every temp to a distinct slot.
    pub spill_threshold: usize,
    /// Number of addressable hard registers in the target machine.
    pub num_regs: usize,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        AllocatorConfig { spill_threshold: 2000, num_regs: 16 }
    }
}

/// A completed allocation: every temp's assigned location. Hard-register
/// vertices are not present (they're already concrete).
#[derive(Debug, Clone, Default)]
pub struct Allocation {
    locations: FxHashMap<Temp, Location>,
}

impl Allocation {
    pub fn location(&self, t: Temp) -> Option<Location> {
        self.locations.get(&t).copied()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Temp, Location)> + '_ {
        self.locations.iter().map(|(&t, &l)| (t, l))
    }
}

/// Maximum Cardinality Search: returns a simplicial elimination ordering
/// over every vertex in `graph`. Ties in weight are broken by ascending
/// vertex order for determinism.
pub fn mcs(graph: &InterferenceGraph) -> Vec<Vertex> {
    let mut weight: FxHashMap<Vertex, u32> = graph.vertices().map(|v| (v, 0)).collect();
    let mut processed: FxHashSet<Vertex> = FxHashSet::default();
    let mut order = Vec::with_capacity(graph.len());

    for _ in 0..graph.len() {
        let next = weight
            .iter()
            .filter(|(v, _)| !processed.contains(*v))
            .max_by(|(va, wa), (vb, wb)| wa.cmp(wb).then_with(|| vb.cmp(va)))
            .map(|(v, _)| *v)
            .expect("weight map covers every vertex");

        processed.insert(next);
        order.push(next);

        for neighbor in graph.neighbors(next) {
            if !processed.contains(&neighbor) {
                *weight.entry(neighbor).or_insert(0) += 1;
            }
        }
    }

    order
}

fn forbidden_for(
    graph: &InterferenceGraph,
    v: Vertex,
    assigned: &FxHashMap<Vertex, usize>,
    num_regs: usize,
) -> FxHashSet<usize> {
    let mut forbidden: FxHashSet<usize> = FxHashSet::default();
    for neighbor in graph.neighbors(v) {
        if let Vertex::Reg(r) = neighbor {
            forbidden.insert(r.index());
        }
        if let Some(&idx) = assigned.get(&neighbor) {
            forbidden.insert(idx);
        }
    }
    for idx in 0..num_regs {
        if HardReg::special_use(idx) {
            forbidden.insert(idx);
        }
    }
    forbidden
}

fn smallest_free(forbidden: &FxHashSet<usize>) -> usize {
    let mut k = 0;
    while forbidden.contains(&k) {
        k += 1;
    }
    k
}

/// Greedy color `graph` along the order produced by [`mcs`], pre-coloring
/// hard-register vertices by identity.
pub fn color(graph: &InterferenceGraph, config: AllocatorConfig) -> Allocation {
    log::debug!("regalloc::color: {} vertices", graph.len());
    let order = mcs(graph);
    let mut assigned: FxHashMap<Vertex, usize> = FxHashMap::default();
    let mut locations = FxHashMap::default();

    for v in order {
        match v {
            Vertex::Reg(r) => {
                assigned.insert(v, r.index());
            }
            Vertex::Temp(t) => {
                let forbidden = forbidden_for(graph, v, &assigned, config.num_regs);
                let k = smallest_free(&forbidden);
                assigned.insert(v, k);
                let location = if k < config.num_regs {
                    Location::Reg(HardReg::from_index(k))
                } else {
                    Location::Spill(SpillSlot { index: k })
                };
                locations.insert(t, location);
            }
        }
    }

    Allocation { locations }
}

/// Assign every temp vertex a distinct spill slot, skipping graph
/// construction entirely. Used above [`AllocatorConfig::spill_threshold`].
pub fn spill_all(temps: impl IntoIterator<Item = Temp>, num_regs: usize) -> Allocation {
    log::debug!("regalloc::spill_all: trivial spill path");
    let mut locations = FxHashMap::default();
    let mut next_index = num_regs;
    for t in temps {
        locations.insert(t, Location::Spill(SpillSlot { index: next_index }));
        next_index += 1;
    }
    Allocation { locations }
}

/// Build the interference graph and color it, taking the spill-all fast
/// path if `graph.len() + extra_temps.len()` exceeds `config.spill_threshold`.
///
/// `extra_temps` covers temps that never appear as a graph vertex (e.g.
/// defined but never used and dead on entry), which the fast path must
/// still spill to preserve the contract that every temp gets a location.
pub fn allocate(
    graph: &InterferenceGraph,
    extra_temps: impl IntoIterator<Item = Temp>,
    config: AllocatorConfig,
) -> Allocation {
    let extra: Vec<Temp> = extra_temps.into_iter().collect();
    let total = graph.len() + extra.len();

    if total > config.spill_threshold {
        log::debug!(
            "regalloc::allocate: {total} vertices exceeds threshold {}, taking fast path",
            config.spill_threshold
        );
        let graph_temps = graph.vertices().filter_map(|v| match v {
            Vertex::Temp(t) => Some(t),
            Vertex::Reg(_) => None,
        });
        return spill_all(graph_temps.chain(extra), config.num_regs);
    }

    let mut allocation = color(graph, config);
    for t in extra {
        allocation
            .locations
            .entry(t)
            .or_insert(Location::Spill(SpillSlot { index: config.num_regs }));
    }
    allocation
}
