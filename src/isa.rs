// Closed enumerations for the target ISA: opcodes, registers, data widths
// and instruction classes. The decoder (decode.rs) builds these; nothing
// here performs any decoding itself.

use std::fmt;

/// A 20-entry-wide register file has only 16 addressable slots; PC/SP/SR and
/// the second constant generator are fixed at indices 0..3.
pub const NUM_REGS: usize = 16;

pub const REG_PC: usize = 0;
pub const REG_SP: usize = 1;
pub const REG_SR: usize = 2;
pub const REG_CG2: usize = 3;

/// Status register bit positions within `regs[REG_SR]`.
pub mod sr_bits {
    pub const C: u32 = 0;
    pub const Z: u32 = 1;
    pub const N: u32 = 2;
    pub const GIE: u32 = 3;
    pub const CPUOFF: u32 = 4;
    pub const OSCOFF: u32 = 5;
    pub const SCG0: u32 = 6;
    pub const SCG1: u32 = 7;
    pub const V: u32 = 8;
}

pub fn register_name(r: usize) -> String {
    match r {
        REG_PC => "PC".to_string(),
        REG_SP => "SP".to_string(),
        REG_SR => "SR".to_string(),
        n => format!("R{}", n),
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Width {
    Byte,
    Word,
    AWord, // 20-bit address word, used by extended-core MOVA/CALLA/etc.
}

impl Width {
    pub fn bytes(&self) -> u32 {
        match self {
            Width::Byte => 1,
            Width::Word => 2,
            Width::AWord => 4,
        }
    }
    pub fn suffix(&self) -> &'static str {
        match self {
            Width::Byte => ".b",
            Width::Word => "",
            Width::AWord => ".a",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InstructionClass {
    NoArg,
    Jump,
    Single,
    Double,
    AddressExt,
    RepeatExt,
}

/// Real opcodes plus their emulated aliases. Aliases are
/// distinct variants so formatting and the canonical-table test (TP4) can
/// check them directly rather than re-deriving the alias from operands.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum Opcode {
    // Double-operand
    MOV,
    ADD,
    ADDC,
    SUBC,
    SUB,
    CMP,
    DADD,
    BIT,
    BIC,
    BIS,
    XOR,
    AND,
    // Single-operand
    RRC,
    SWPB,
    RRA,
    SXT,
    PUSH,
    CALL,
    RETI,
    // Jump
    JNE,
    JEQ,
    JNC,
    JC,
    JN,
    JGE,
    JL,
    JMP,
    // Emulated
    ADC,
    BR,
    CLR,
    CLRC,
    CLRN,
    CLRZ,
    DADC,
    DEC,
    DECD,
    DINT,
    EINT,
    INC,
    INCD,
    INV,
    NOP,
    POP,
    RET,
    RLA,
    RLC,
    SBC,
    SETC,
    SETN,
    SETZ,
    TST,
    // Extended (20-bit) core
    MOVA,
    CMPA,
    ADDA,
    SUBA,
    CALLA,
    PUSHM,
    POPM,
    RRCM,
    RRAM,
    RRUM,
    RLAM,
}

impl Opcode {
    pub fn mnemonic(&self) -> &'static str {
        use Opcode::*;
        match self {
            MOV => "MOV",
            ADD => "ADD",
            ADDC => "ADDC",
            SUBC => "SUBC",
            SUB => "SUB",
            CMP => "CMP",
            DADD => "DADD",
            BIT => "BIT",
            BIC => "BIC",
            BIS => "BIS",
            XOR => "XOR",
            AND => "AND",
            RRC => "RRC",
            SWPB => "SWPB",
            RRA => "RRA",
            SXT => "SXT",
            PUSH => "PUSH",
            CALL => "CALL",
            RETI => "RETI",
            JNE => "JNE",
            JEQ => "JEQ",
            JNC => "JNC",
            JC => "JC",
            JN => "JN",
            JGE => "JGE",
            JL => "JL",
            JMP => "JMP",
            ADC => "ADC",
            BR => "BR",
            CLR => "CLR",
            CLRC => "CLRC",
            CLRN => "CLRN",
            CLRZ => "CLRZ",
            DADC => "DADC",
            DEC => "DEC",
            DECD => "DECD",
            DINT => "DINT",
            EINT => "EINT",
            INC => "INC",
            INCD => "INCD",
            INV => "INV",
            NOP => "NOP",
            POP => "POP",
            RET => "RET",
            RLA => "RLA",
            RLC => "RLC",
            SBC => "SBC",
            SETC => "SETC",
            SETN => "SETN",
            SETZ => "SETZ",
            TST => "TST",
            MOVA => "MOVA",
            CMPA => "CMPA",
            ADDA => "ADDA",
            SUBA => "SUBA",
            CALLA => "CALLA",
            PUSHM => "PUSHM",
            POPM => "POPM",
            RRCM => "RRCM",
            RRAM => "RRAM",
            RRUM => "RRUM",
            RLAM => "RLAM",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Condition {
    Ne,
    Eq,
    Nc,
    C,
    N,
    Ge,
    L,
    Always,
}

impl Condition {
    pub fn from_jump_opcode(op: Opcode) -> Option<Self> {
        use Opcode::*;
        Some(match op {
            JNE => Condition::Ne,
            JEQ => Condition::Eq,
            JNC => Condition::Nc,
            JC => Condition::C,
            JN => Condition::N,
            JGE => Condition::Ge,
            JL => Condition::L,
            JMP => Condition::Always,
            _ => return None,
        })
    }

    pub fn holds(&self, sr: u32) -> bool {
        let bit = |b: u32| sr & (1 << b) != 0;
        match self {
            Condition::Ne => !bit(sr_bits::Z),
            Condition::Eq => bit(sr_bits::Z),
            Condition::Nc => !bit(sr_bits::C),
            Condition::C => bit(sr_bits::C),
            Condition::N => bit(sr_bits::N),
            Condition::Ge => bit(sr_bits::N) == bit(sr_bits::V),
            Condition::L => bit(sr_bits::N) != bit(sr_bits::V),
            Condition::Always => true,
        }
    }
}

/// Which CPU variant is being decoded for / simulated. The extended core
/// accepts the 20-bit address instructions and the `0x18xx` extension word;
/// the base core does not.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CoreVariant {
    Base,
    Extended,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_ge_matches_signed_not_overflowed() {
        let sr = 0; // N=0 V=0
        assert!(Condition::Ge.holds(sr));
        let sr_n = 1 << sr_bits::N;
        assert!(!Condition::Ge.holds(sr_n));
        let sr_nv = (1 << sr_bits::N) | (1 << sr_bits::V);
        assert!(Condition::Ge.holds(sr_nv));
    }

    #[test]
    fn register_names_are_canonical() {
        assert_eq!(register_name(REG_PC), "PC");
        assert_eq!(register_name(REG_SP), "SP");
        assert_eq!(register_name(REG_SR), "SR");
        assert_eq!(register_name(4), "R4");
    }
}
