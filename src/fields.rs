// Operand representation and the decoded-instruction container. The decoder
// (decode.rs) is the only code that constructs these; everything else reads
// them.

use crate::isa::{CoreVariant, InstructionClass, Opcode, Width};
use std::fmt;

/// An addressing-mode operand, post-folding. The
/// decoder never hands back `Indexed(PC, _)`, `Indexed(SR, _)`,
/// `Indirect(SR)`, `IndirectInc(SR)`, or a constant-generator register
/// slot — those are folded into `Symbolic`, `Absolute` or `Immediate`
/// before the caller ever sees them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operand {
    Register(usize),
    Indexed(usize, i32),
    Indirect(usize),
    IndirectInc(usize),
    Immediate(u32),
    Symbolic(u32),
    Absolute(u32),
}

impl Operand {
    pub fn register(&self) -> Option<usize> {
        match self {
            Operand::Register(r) | Operand::Indexed(r, _) | Operand::Indirect(r) | Operand::IndirectInc(r) => Some(*r),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Operand::Immediate(_))
    }
}

/// Source of the repeat count for a `RepeatExt`-modified double-operand
/// instruction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RepeatCount {
    Immediate(u32),
    Register(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInstruction {
    pub opcode: Opcode,
    pub class: InstructionClass,
    pub width: Width,
    pub src: Option<Operand>,
    pub dst: Option<Operand>,
    pub offset: u32,
    pub len: u32,
    pub repeat: Option<RepeatCount>,
}

impl DecodedInstruction {
    pub fn next_offset(&self) -> u32 {
        self.offset + self.len
    }
}

/// Rendering an operand to assembly-like text requires resolving symbol
/// names, which is the job of `crate::symbols::Symbols`; formatting lives
/// in `disasm.rs` so it can take that collaborator as an argument. This
/// `Display` impl only covers the collaborator-free, numeric-only case used
/// by quick debug output (e.g. `{:?}`-adjacent logging).
impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use crate::isa::register_name;
        match self {
            Operand::Register(r) => write!(f, "{}", register_name(*r)),
            Operand::Indexed(r, disp) => write!(f, "{:#x}({})", disp, register_name(*r)),
            Operand::Indirect(r) => write!(f, "@{}", register_name(*r)),
            Operand::IndirectInc(r) => write!(f, "@{}+", register_name(*r)),
            Operand::Immediate(v) => write!(f, "#{:#x}", v),
            Operand::Symbolic(addr) => write!(f, "{:#06x}", addr),
            Operand::Absolute(addr) => write!(f, "&{:#06x}", addr),
        }
    }
}

pub fn variant_allows_extended(variant: CoreVariant) -> bool {
    variant == CoreVariant::Extended
}
