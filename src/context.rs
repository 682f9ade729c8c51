//! Owns one function's worth of compilation state and runs the full
//! CFG -> dominance -> liveness -> interference -> allocation pipeline.

use crate::cfg::{self, BlockMap, EdgeMaps};
use crate::convention::{RegConvention, RegInfo};
use crate::dominator::{self, DominatorTree};
use crate::error::Result;
use crate::interference::{self, InterferenceGraph};
use crate::label::LabelFactory;
use crate::liveness;
use crate::regalloc::{self, Allocation, AllocatorConfig};
use crate::temp::TempFactory;

/// Per-function compilation state, reused across functions via [`Context::clear`]
/// rather than reallocated.
#[derive(Debug)]
pub struct Context<I: RegConvention> {
    pub labels: LabelFactory,
    pub temps: TempFactory,
    cfg: Option<BlockMap<I>>,
    edges: Option<EdgeMaps>,
    dominators: Option<DominatorTree>,
    liveness: Option<Vec<RegInfo>>,
    interference: Option<InterferenceGraph>,
    allocation: Option<Allocation>,
}

impl<I: RegConvention> Default for Context<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: RegConvention> Context<I> {
    pub fn new() -> Self {
        Context {
            labels: LabelFactory::new(),
            temps: TempFactory::new(),
            cfg: None,
            edges: None,
            dominators: None,
            liveness: None,
            interference: None,
            allocation: None,
        }
    }

    pub fn cfg(&self) -> Option<&BlockMap<I>> {
        self.cfg.as_ref()
    }

    pub fn edges(&self) -> Option<&EdgeMaps> {
        self.edges.as_ref()
    }

    pub fn dominators(&self) -> Option<&DominatorTree> {
        self.dominators.as_ref()
    }

    pub fn interference(&self) -> Option<&InterferenceGraph> {
        self.interference.as_ref()
    }

    pub fn allocation(&self) -> Option<&Allocation> {
        self.allocation.as_ref()
    }

    /// Run the full pipeline with the default [`AllocatorConfig`].
    pub fn compile(&mut self, instrs: &[I]) -> Result<Allocation> {
        self.compile_with_config(instrs, AllocatorConfig::default())
    }

    /// Run CFG construction, dominance, liveness, interference, and
    /// coloring in sequence, committing intermediate results into `self`
    /// only once every pass has succeeded.
    pub fn compile_with_config(&mut self, instrs: &[I], config: AllocatorConfig) -> Result<Allocation> {
        log::debug!("Context::compile: {} instructions", instrs.len());

        let fallthrough_free = cfg::eliminate_fall_through(instrs);
        let bbmap = cfg::build_bb(&mut self.labels, &fallthrough_free)?;
        let edges = cfg::build_ino(&bbmap);
        let dom_tree = dominator::compute_idom(&edges, bbmap.entry());

        let lines: Vec<RegInfo> = fallthrough_free.iter().map(RegInfo::from_instr).collect();
        let lines = liveness::analyze(&fallthrough_free, lines);

        let graph = interference::build(lines.iter());
        let extra_temps = self.temps_with_no_graph_presence(&lines, &graph);
        let allocation = regalloc::allocate(&graph, extra_temps, config);

        self.cfg = Some(bbmap);
        self.edges = Some(edges);
        self.dominators = Some(dom_tree);
        self.liveness = Some(lines);
        self.interference = Some(graph);
        self.allocation = Some(allocation.clone());

        Ok(allocation)
    }

    fn temps_with_no_graph_presence(
        &self,
        lines: &[RegInfo],
        graph: &InterferenceGraph,
    ) -> Vec<crate::temp::Temp> {
        use crate::interference::Vertex;
        let mut out = Vec::new();
        for line in lines {
            for operand in line.defines.iter().chain(line.uses.iter()) {
                if let Some(Vertex::Temp(t)) = operand.as_vertex() {
                    if !graph.contains(Vertex::Temp(t)) {
                        out.push(t);
                    }
                }
            }
        }
        out
    }

    /// Reset every field to its empty state, reusing backing storage.
    pub fn clear(&mut self) {
        self.labels.clear();
        self.temps.clear();
        self.cfg = None;
        self.edges = None;
        self.dominators = None;
        self.liveness = None;
        self.interference = None;
        self.allocation = None;
    }
}
