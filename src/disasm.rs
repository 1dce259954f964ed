// Text rendering of decoded instructions and
// `DecodeError`-tolerant scanning over a byte range.
//
// Formatting needs a `Symbols` collaborator to turn addresses back into
// names; scanning needs nothing but a decoder and a recovery rule for when
// the decoder fails partway through a range.

use crate::decode::decode;
use crate::error::DecodeError;
use crate::fields::{DecodedInstruction, Operand};
use crate::isa::{register_name, CoreVariant, InstructionClass};
use crate::symbols::Symbols;

/// Addresses in this range are assumed to be RAM/flash-resident code or
/// data rather than small immediates or peripheral registers, so the
/// formatter prefers resolving them through `Symbols` and falling back to
/// hex rather than printing them as bare small numbers.
const LIKELY_ADDRESS_RANGE: std::ops::Range<u32> = 0x200..0xfff0;

fn looks_like_address(v: u32) -> bool {
    LIKELY_ADDRESS_RANGE.contains(&v)
}

/// ANSI SGR codes used for the demo binary's terminal output. Kept narrow
/// and named rather than a generic styling abstraction since this crate
/// formats exactly one thing: disassembly lines.
mod color {
    pub const MNEMONIC: &str = "\x1b[1;36m";
    pub const OPERAND: &str = "\x1b[0;33m";
    pub const SYMBOL: &str = "\x1b[0;32m";
    pub const RESET: &str = "\x1b[0m";
}

fn format_operand(op: &Operand, symbols: &dyn Symbols, colorize: bool) -> String {
    let raw = match op {
        Operand::Register(r) => register_name(*r),
        Operand::Indexed(r, disp) => format!("{:#x}({})", disp, register_name(*r)),
        Operand::Indirect(r) => format!("@{}", register_name(*r)),
        Operand::IndirectInc(r) => format!("@{}+", register_name(*r)),
        Operand::Immediate(v) => {
            if looks_like_address(*v) {
                if let Some(name) = symbols.lookup(*v) {
                    return if colorize {
                        format!("{}#{}{}", color::SYMBOL, name, color::RESET)
                    } else {
                        format!("#{}", name)
                    };
                }
            }
            format!("#{:#x}", v)
        }
        Operand::Symbolic(addr) | Operand::Absolute(addr) => {
            let prefix = if matches!(op, Operand::Absolute(_)) { "&" } else { "" };
            if let Some(name) = symbols.lookup(*addr) {
                return if colorize {
                    format!("{}{}{}{}", color::SYMBOL, prefix, name, color::RESET)
                } else {
                    format!("{}{}", prefix, name)
                };
            }
            format!("{}{:#06x}", prefix, addr)
        }
    };
    if colorize {
        format!("{}{}{}", color::OPERAND, raw, color::RESET)
    } else {
        raw
    }
}

/// Render one decoded instruction as assembly-like text, e.g.
/// `MOV.B  #0x12, R5` or, with a resolved symbol, `MOV  #vector_table, PC`.
pub fn format_instruction(insn: &DecodedInstruction, symbols: &dyn Symbols, colorize: bool) -> String {
    let mnemonic = if colorize {
        format!("{}{}{}{}", color::MNEMONIC, insn.opcode, insn.width.suffix(), color::RESET)
    } else {
        format!("{}{}", insn.opcode, insn.width.suffix())
    };

    let mut operands = Vec::new();
    if let Some(src) = &insn.src {
        operands.push(format_operand(src, symbols, colorize));
    }
    if let Some(dst) = &insn.dst {
        operands.push(format_operand(dst, symbols, colorize));
    }

    if operands.is_empty() {
        mnemonic
    } else {
        format!("{}\t{}", mnemonic, operands.join(", "))
    }
}

/// One entry produced while scanning a byte range: either a successfully
/// decoded instruction, or a placeholder recovered from a `DecodeError`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEntry {
    Decoded(DecodedInstruction),
    Unknown { offset: u32, len: u32, error: DecodeError },
}

impl ScanEntry {
    pub fn offset(&self) -> u32 {
        match self {
            ScanEntry::Decoded(insn) => insn.offset,
            ScanEntry::Unknown { offset, .. } => *offset,
        }
    }

    pub fn len(&self) -> u32 {
        match self {
            ScanEntry::Decoded(insn) => insn.len,
            ScanEntry::Unknown { len, .. } => *len,
        }
    }
}

/// Format one scan entry, rendering undecodable words as `???`.
pub fn format_entry(entry: &ScanEntry, symbols: &dyn Symbols, colorize: bool) -> String {
    match entry {
        ScanEntry::Decoded(insn) => format_instruction(insn, symbols, colorize),
        ScanEntry::Unknown { .. } => {
            if colorize {
                format!("{}???{}", color::MNEMONIC, color::RESET)
            } else {
                "???".to_string()
            }
        }
    }
}

/// Scan `code`, which begins at virtual address `start_offset`, decoding
/// instructions back to back. On a `DecodeError` the scan does not abort:
/// it emits a `???` placeholder for the offending word and resumes
/// decoding two bytes later, matching the original disassembler's
/// best-effort behaviour over data mixed in with code.
pub fn scan(code: &[u8], start_offset: u32, variant: CoreVariant) -> Vec<ScanEntry> {
    let mut entries = Vec::new();
    let mut pos: usize = 0;
    while pos + 2 <= code.len() {
        let offset = start_offset + pos as u32;
        match decode(&code[pos..], offset, code.len() - pos, variant) {
            Ok(insn) => {
                pos += insn.len as usize;
                entries.push(ScanEntry::Decoded(insn));
            }
            Err(error) => {
                entries.push(ScanEntry::Unknown { offset, len: 2, error });
                pos += 2;
            }
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::MemTable;

    #[test]
    fn formats_plain_mov() {
        let mut syms = MemTable::new();
        syms.define("reset_vec", 0xfffe);
        let insn = decode(&[0xB2, 0x40, 0x34, 0x12, 0x78, 0x56], 0x8000, 6, CoreVariant::Base).unwrap();
        let text = format_instruction(&insn, &syms, false);
        assert_eq!(text, "MOV\t#0x1234, &0x5678");
    }

    #[test]
    fn resolves_symbol_in_address_range() {
        let mut syms = MemTable::new();
        syms.define("start", 0x2000);
        // MOV #0x2000, R5 — 0x2000 is inside the "looks like an address" band.
        let word: u16 = 0x4000 | (0 << 8) | (3 << 4) | 5;
        let mut encoded = word.to_le_bytes().to_vec();
        encoded.extend_from_slice(&0x2000u16.to_le_bytes());
        let insn = decode(&encoded, 0, encoded.len(), CoreVariant::Base).unwrap();
        let text = format_instruction(&insn, &syms, false);
        assert_eq!(text, "MOV\t#start, R5");
    }

    #[test]
    fn scan_recovers_from_bad_word_and_keeps_going() {
        // invalid word (0x0000, base variant) followed by a real MOV.
        let mut code = vec![0x00, 0x00];
        let word: u16 = 0x4000 | (3 << 4) | 5; // MOV #imm, R5 (src reg PC)
        code.extend_from_slice(&word.to_le_bytes());
        code.extend_from_slice(&0x1234u16.to_le_bytes());
        let entries = scan(&code, 0, CoreVariant::Base);
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[0], ScanEntry::Unknown { offset: 0, len: 2, .. }));
        assert!(matches!(&entries[1], ScanEntry::Decoded(insn) if insn.offset == 2));
    }
}
