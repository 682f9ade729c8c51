//! Virtual registers (`Temp`), physical registers (`HardReg`), and spill
//! slots.

use std::fmt;

/// A virtual register.
///
/// Non-negative ids name ordinary temps minted by a [`TempFactory`];
/// negative ids are reserved for pre-bound hard registers injected into
/// the same numbering space so they can sit as vertices in an
/// [`crate::interference::InterferenceGraph`] alongside real temps.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Temp(i64);

impl Temp {
    /// Wrap a raw id. Negative ids denote a pre-bound hard register.
    pub fn from_raw(id: i64) -> Self {
        Temp(id)
    }

    /// The raw id.
    pub fn raw(self) -> i64 {
        self.0
    }

    /// Is this id reserved for a hard register rather than an ordinary
    /// temp?
    pub fn is_hard(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Debug for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%t{}", self.0)
    }
}

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Mints fresh, non-negative temps for one function's compilation.
#[derive(Debug, Default)]
pub struct TempFactory {
    next: i64,
}

impl TempFactory {
    pub fn new() -> Self {
        TempFactory { next: 0 }
    }

    /// Mint a fresh temp.
    pub fn fresh(&mut self) -> Temp {
        let id = self.next;
        self.next += 1;
        Temp(id)
    }

    /// Number of temps minted so far.
    pub fn len(&self) -> usize {
        self.next as usize
    }

    pub fn is_empty(&self) -> bool {
        self.next == 0
    }

    /// Reset to mint temp ids from zero again.
    pub fn clear(&mut self) {
        self.next = 0;
    }
}

/// The 16 general-purpose x86-64 registers, in the conventional encoding
/// order (RAX=0 .. R15=15) used by the ModRM/REX byte layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum HardReg {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

const ALL_HARD_REGS: [HardReg; 16] = [
    HardReg::Rax,
    HardReg::Rcx,
    HardReg::Rdx,
    HardReg::Rbx,
    HardReg::Rsp,
    HardReg::Rbp,
    HardReg::Rsi,
    HardReg::Rdi,
    HardReg::R8,
    HardReg::R9,
    HardReg::R10,
    HardReg::R11,
    HardReg::R12,
    HardReg::R13,
    HardReg::R14,
    HardReg::R15,
];

/// Number of addressable hard registers in the target machine's register
/// file, independent of how many of them are actually allocatable.
pub const NUM_HARD_REGS: usize = ALL_HARD_REGS.len();

impl HardReg {
    /// Index into the bijection `index <-> reg`, 0..NUM_HARD_REGS.
    pub fn index(self) -> usize {
        self as u8 as usize
    }

    /// Invert `index()`. Panics if `idx >= NUM_HARD_REGS`.
    pub fn from_index(idx: usize) -> HardReg {
        ALL_HARD_REGS[idx]
    }

    /// Registers whose allocation is reserved by the calling convention:
    /// the stack pointer, the base/frame pointer, and (conventionally)
    /// R11, used by the munch layer as a scratch register for
    /// materializing large immediates and is kept out of allocation to
    /// simplify the instruction-selection contract at the boundary of
    /// this crate.
    pub fn special_use(idx: usize) -> bool {
        matches!(
            ALL_HARD_REGS.get(idx),
            Some(HardReg::Rsp) | Some(HardReg::Rbp) | Some(HardReg::R11)
        )
    }

    /// Iterate over all 16 hard registers in index order.
    pub fn all() -> impl Iterator<Item = HardReg> {
        ALL_HARD_REGS.iter().copied()
    }
}

impl fmt::Display for HardReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HardReg::Rax => "rax",
            HardReg::Rcx => "rcx",
            HardReg::Rdx => "rdx",
            HardReg::Rbx => "rbx",
            HardReg::Rsp => "rsp",
            HardReg::Rbp => "rbp",
            HardReg::Rsi => "rsi",
            HardReg::Rdi => "rdi",
            HardReg::R8 => "r8",
            HardReg::R9 => "r9",
            HardReg::R10 => "r10",
            HardReg::R11 => "r11",
            HardReg::R12 => "r12",
            HardReg::R13 => "r13",
            HardReg::R14 => "r14",
            HardReg::R15 => "r15",
        };
        f.write_str(name)
    }
}

/// The word size, in bytes, used to compute spill slot offsets.
pub const WORD_SIZE: i64 = 8;

/// A stack location assigned to a temp that couldn't be colored into a
/// hard register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpillSlot {
    /// The coloring index, `>= num_regs`, this slot was assigned at.
    pub index: usize,
}

impl SpillSlot {
    /// Byte offset from the frame base for this slot, given the number of
    /// allocatable hard registers.
    pub fn offset(self, num_regs: usize) -> i64 {
        (self.index as i64 - num_regs as i64 + 1) * WORD_SIZE
    }
}

/// Where a temp ended up after register allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Reg(HardReg),
    Spill(SpillSlot),
}
