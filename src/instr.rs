//! The abstract instruction capability trait.
//!
//! Instruction selection ("munching" to pseudo- or abs-assembly) lives
//! outside this crate. What the CFG builder, dominator analysis, and
//! liveness solver need from a lowered instruction is the small surface
//! captured here. The crate is monomorphised per concrete instruction
//! flavour rather than boxing `dyn Instruction`, so a caller with both an
//! abs-asm and a pseudo-asm instruction set gets two independent
//! instantiations with no virtual dispatch at the per-instruction level.

use crate::label::Label;
use smallvec::SmallVec;

/// The capability a lowered instruction type must provide to participate
/// in CFG construction, dominance, and liveness.
pub trait Instruction: Clone + core::fmt::Debug {
    /// Construct a label pseudo-instruction for `l`.
    fn label(l: Label) -> Self;

    /// Construct an unconditional jump to `l`.
    fn jump(l: Label) -> Self;

    /// Construct a return.
    fn ret() -> Self;

    fn is_label(&self) -> bool;
    fn is_jump(&self) -> bool;
    fn is_cjump(&self) -> bool;
    fn is_return(&self) -> bool;
    fn is_assert(&self) -> bool;

    /// Is this any kind of control-flow terminator?
    fn is_control(&self) -> bool {
        self.is_jump() || self.is_cjump() || self.is_return()
    }

    /// The label carried by a `label` instruction. `None` for any other
    /// instruction, including `jump`/`cjump` (see `next` for their
    /// targets).
    fn get_label(&self) -> Option<Label>;

    /// Successor labels implied by this instruction: empty for
    /// non-control instructions, one label for `jump`, up to two for
    /// `cjump`, none for `ret`.
    fn next(&self) -> SmallVec<[Label; 2]>;

    /// Rewrite the (sole) jump target of a `jump` instruction in place.
    /// No-op on instructions without a single unconditional target.
    fn replace_target(&mut self, new_target: Label);

    /// Rewrite one branch of a `cjump` instruction in place, replacing
    /// `old` with `new` wherever it appears among the targets. No-op if
    /// `old` isn't one of this instruction's targets.
    fn replace_ctarget(&mut self, old: Label, new: Label);
}

/// A minimal instruction set used throughout this crate's own test
/// suite: enough to exercise every CFG/dominator/liveness/regalloc code
/// path without depending on a real instruction-selection layer.
///
/// Not behind `#[cfg(test)]` so integration tests under `tests/` can use
/// it too: a plain, non-test-gated module consumed by both unit and
/// integration tests.
pub mod fixtures {
    use super::*;
    use crate::temp::Temp;

    /// A trivial three-address instruction set: moves, binary ops,
    /// labels, and the three control terminators.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum AbsInstr {
        Label(Label),
        Move { dst: Temp, src: Temp },
        Imm { dst: Temp, value: i64 },
        Binop { dst: Temp, lhs: Temp, rhs: Temp },
        Jump(Label),
        CJump { cond: Temp, then_label: Label, else_label: Label },
        Return(Option<Temp>),
        Assert(Temp),
    }

    impl Instruction for AbsInstr {
        fn label(l: Label) -> Self {
            AbsInstr::Label(l)
        }

        fn jump(l: Label) -> Self {
            AbsInstr::Jump(l)
        }

        fn ret() -> Self {
            AbsInstr::Return(None)
        }

        fn is_label(&self) -> bool {
            matches!(self, AbsInstr::Label(_))
        }

        fn is_jump(&self) -> bool {
            matches!(self, AbsInstr::Jump(_))
        }

        fn is_cjump(&self) -> bool {
            matches!(self, AbsInstr::CJump { .. })
        }

        fn is_return(&self) -> bool {
            matches!(self, AbsInstr::Return(_))
        }

        fn is_assert(&self) -> bool {
            matches!(self, AbsInstr::Assert(_))
        }

        fn get_label(&self) -> Option<Label> {
            match self {
                AbsInstr::Label(l) => Some(*l),
                _ => None,
            }
        }

        fn next(&self) -> SmallVec<[Label; 2]> {
            match self {
                AbsInstr::Jump(l) => SmallVec::from_slice(&[*l]),
                AbsInstr::CJump { then_label, else_label, .. } => {
                    SmallVec::from_slice(&[*then_label, *else_label])
                }
                _ => SmallVec::new(),
            }
        }

        fn replace_target(&mut self, new_target: Label) {
            if let AbsInstr::Jump(l) = self {
                *l = new_target;
            }
        }

        fn replace_ctarget(&mut self, old: Label, new: Label) {
            if let AbsInstr::CJump { then_label, else_label, .. } = self {
                if *then_label == old {
                    *then_label = new;
                }
                if *else_label == old {
                    *else_label = new;
                }
            }
        }
    }
}
