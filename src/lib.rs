//! Control-flow graph construction, dominator analysis, liveness
//! dataflow, and graph-coloring register allocation for a small
//! imperative compiler's backend middle-end.
//!
//! Lexing, parsing, type checking, instruction selection, and final
//! assembly emission live outside this crate; it picks up once a
//! function has been lowered to a linear sequence of instructions
//! implementing [`Instruction`] and hands back a register/spill
//! assignment for every temp.

pub mod cfg;
pub mod context;
pub mod convention;
pub mod dominator;
pub mod error;
pub mod instr;
pub mod interference;
pub mod label;
pub mod liveness;
pub mod regalloc;
pub mod temp;

pub use cfg::{BasicBlock, BlockMap, EdgeMaps};
pub use context::Context;
pub use convention::{Operand, RegConvention, RegInfo};
pub use dominator::DominatorTree;
pub use error::{BackendError, Result};
pub use instr::Instruction;
pub use interference::{InterferenceGraph, Vertex};
pub use label::{Label, LabelFactory};
pub use regalloc::{Allocation, AllocatorConfig};
pub use temp::{HardReg, Location, SpillSlot, Temp, TempFactory};
