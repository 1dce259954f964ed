// The instruction decoder. `decode` is a pure function:
// bytes in, a decoded instruction and its length out, or a `DecodeError`.
//
// Dispatch is by the top nibble (and a couple of sub-ranges) of the first
// 16-bit word. Constant-generator folding and PC/SR addressing folding
// happen inline while operands are built, so callers never see the raw
// special-case forms.

use crate::fields::{DecodedInstruction, Operand, RepeatCount};
use crate::isa::{CoreVariant, InstructionClass, Opcode, Width, REG_CG2, REG_PC, REG_SP, REG_SR};
use crate::error::DecodeError;

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    max_len: usize,
    base_offset: u32,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8], base_offset: u32, max_len: usize) -> Self {
        Cursor { bytes, pos: 0, max_len, base_offset }
    }

    fn next_word(&mut self) -> Result<u16, DecodeError> {
        if self.pos + 2 > self.max_len || self.pos + 2 > self.bytes.len() {
            return Err(DecodeError::Truncated { offset: self.base_offset + self.pos as u32 });
        }
        let w = u16::from_le_bytes([self.bytes[self.pos], self.bytes[self.pos + 1]]);
        self.pos += 2;
        Ok(w)
    }

    fn consumed(&self) -> u32 {
        self.pos as u32
    }
}

/// Decode one instruction starting at `code[0]`, which represents the byte
/// at virtual address `offset`. At most `max_len` bytes of `code` may be
/// consumed. Returns the decoded instruction; `instruction.len` gives the
/// number of bytes actually consumed.
pub fn decode(code: &[u8], offset: u32, max_len: usize, variant: CoreVariant) -> Result<DecodedInstruction, DecodeError> {
    let mut cur = Cursor::new(code, offset, max_len.min(code.len()));
    let first = cur.next_word()?;

    // 0x18xx extension word prefix (extended core only): carries 20-bit
    // address-bit extension and an optional repeat prefix; the real
    // instruction follows immediately. This is a documented, simplified bit
    // layout rather than a silicon-exact one.
    let mut addr_high: u32 = 0;
    let mut repeat: Option<RepeatCount> = None;
    if variant == CoreVariant::Extended && (first >> 8) == 0x18 {
        addr_high = ((first >> 4) & 0xf) as u32;
        let repeat_is_register = first & 0x8 != 0;
        let repeat_field = (first & 0x7) as u32;
        if repeat_is_register {
            repeat = Some(RepeatCount::Register(repeat_field as usize));
        } else if repeat_field != 0 {
            repeat = Some(RepeatCount::Immediate(repeat_field + 1));
        }
        let inner_offset = offset + cur.consumed();
        let inner = decode_body(&mut cur, inner_offset, variant)?;
        return Ok(apply_extension(inner, addr_high, repeat));
    }

    decode_body_from_word(&mut cur, first, offset, variant)
}

fn decode_body(cur: &mut Cursor, instr_offset: u32, variant: CoreVariant) -> Result<DecodedInstruction, DecodeError> {
    let word = cur.next_word()?;
    decode_body_from_word(cur, word, instr_offset, variant)
}

fn apply_extension(mut insn: DecodedInstruction, addr_high: u32, repeat: Option<RepeatCount>) -> DecodedInstruction {
    let extend = |op: Operand| -> Operand {
        match op {
            Operand::Immediate(v) => Operand::Immediate(v | (addr_high << 16)),
            Operand::Absolute(v) => Operand::Absolute(v | (addr_high << 16)),
            Operand::Symbolic(v) => Operand::Symbolic(v | (addr_high << 16)),
            other => other,
        }
    };
    insn.src = insn.src.map(extend);
    insn.dst = insn.dst.map(extend);
    if addr_high != 0 {
        insn.width = Width::AWord;
    }
    if repeat.is_some() {
        insn.class = InstructionClass::RepeatExt;
        insn.repeat = repeat;
    }
    insn
}

fn decode_body_from_word(cur: &mut Cursor, first: u16, instr_offset: u32, variant: CoreVariant) -> Result<DecodedInstruction, DecodeError> {
    if (first & 0xf000) == 0x1000 {
        decode_single(cur, first, instr_offset)
    } else if (first & 0xf000) >= 0x2000 && (first & 0xf000) < 0x4000 {
        Ok(decode_jump(first, instr_offset))
    } else if (first & 0xf000) >= 0x4000 {
        decode_double(cur, first, instr_offset)
    } else if (first & 0xf000) == 0x0000 {
        if variant != CoreVariant::Extended {
            return Err(DecodeError::Invalid { word: first, offset: instr_offset });
        }
        decode_address_ext(first, instr_offset)
    } else {
        Err(DecodeError::Invalid { word: first, offset: instr_offset })
    }
}

const SINGLE_OPS: &[(u16, Opcode)] = &[
    (0x0, Opcode::RRC),
    (0x1, Opcode::SWPB),
    (0x2, Opcode::RRA),
    (0x3, Opcode::SXT),
    (0x4, Opcode::PUSH),
    (0x5, Opcode::CALL),
    (0x6, Opcode::RETI),
];

fn decode_single(cur: &mut Cursor, first: u16, instr_offset: u32) -> Result<DecodedInstruction, DecodeError> {
    let sub = (first >> 7) & 0x7;
    let opcode = SINGLE_OPS
        .iter()
        .find(|(code, _)| *code == sub)
        .map(|(_, op)| *op)
        .ok_or(DecodeError::Invalid { word: first, offset: instr_offset })?;

    // RETI carries no operand: the mode/register bits below it are
    // reserved on real silicon. Decoding it with a class of its own keeps
    // the executor's dispatch from having to
    // special-case "a Single-class opcode that is actually NoArg".
    if opcode == Opcode::RETI {
        return Ok(DecodedInstruction {
            opcode,
            class: InstructionClass::NoArg,
            width: Width::Word,
            src: None,
            dst: None,
            offset: instr_offset,
            len: cur.consumed(),
            repeat: None,
        });
    }

    let byte_op = first & 0x0040 != 0;
    let width = if byte_op { Width::Byte } else { Width::Word };
    let mode = ((first >> 4) & 0x3) as u8;
    let reg = (first & 0xf) as usize;

    let dst = decode_operand(cur, mode, reg, instr_offset, true)?;

    let mut insn = DecodedInstruction {
        opcode,
        class: InstructionClass::Single,
        width,
        src: None,
        dst: Some(dst),
        offset: instr_offset,
        len: cur.consumed(),
        repeat: None,
    };
    find_emulated_single(&mut insn);
    Ok(insn)
}

const DOUBLE_OPS: &[(u16, Opcode)] = &[
    (0x4, Opcode::MOV),
    (0x5, Opcode::ADD),
    (0x6, Opcode::ADDC),
    (0x7, Opcode::SUBC),
    (0x8, Opcode::SUB),
    (0x9, Opcode::CMP),
    (0xa, Opcode::DADD),
    (0xb, Opcode::BIT),
    (0xc, Opcode::BIC),
    (0xd, Opcode::BIS),
    (0xe, Opcode::XOR),
    (0xf, Opcode::AND),
];

fn decode_double(cur: &mut Cursor, first: u16, instr_offset: u32) -> Result<DecodedInstruction, DecodeError> {
    let family = (first >> 12) & 0xf;
    let opcode = DOUBLE_OPS
        .iter()
        .find(|(code, _)| *code == family)
        .map(|(_, op)| *op)
        .ok_or(DecodeError::Invalid { word: first, offset: instr_offset })?;
    let byte_op = first & 0x0040 != 0;
    let width = if byte_op { Width::Byte } else { Width::Word };
    let src_reg = ((first >> 8) & 0xf) as usize;
    let src_mode = ((first >> 4) & 0x3) as u8;
    let dst_mode_bit = (first >> 7) & 0x1;
    let dst_reg = (first & 0xf) as usize;

    let src = decode_operand(cur, src_mode, src_reg, instr_offset, true)?;
    let dst_mode = if dst_mode_bit == 0 { 0u8 } else { 1u8 };
    let dst = decode_operand(cur, dst_mode, dst_reg, instr_offset, false)?;

    let mut insn = DecodedInstruction {
        opcode,
        class: InstructionClass::Double,
        width,
        src: Some(src),
        dst: Some(dst),
        offset: instr_offset,
        len: cur.consumed(),
        repeat: None,
    };
    find_emulated_double(&mut insn);
    Ok(insn)
}

fn decode_jump(first: u16, instr_offset: u32) -> DecodedInstruction {
    let op = (first >> 10) & 0x3f;
    let opcode = match op & 0x7 {
        0 => Opcode::JNE,
        1 => Opcode::JEQ,
        2 => Opcode::JNC,
        3 => Opcode::JC,
        4 => Opcode::JN,
        5 => Opcode::JGE,
        6 => Opcode::JL,
        _ => Opcode::JMP,
    };
    let mut disp = (first & 0x3ff) as i32;
    if disp & 0x200 != 0 {
        disp -= 0x400;
    }
    let dst_addr = (instr_offset as i64 + 2 + (disp as i64) * 2) as u32;
    DecodedInstruction {
        opcode,
        class: InstructionClass::Jump,
        width: Width::Word,
        src: None,
        dst: Some(Operand::Symbolic(dst_addr)),
        offset: instr_offset,
        len: 2,
        repeat: None,
    }
}

/// Decode the extended-core `0x0xxx` address-class instructions (MOVA,
/// CMPA, ADDA, SUBA, CALLA, RETI, PUSHM, POPM, RRCM, RRAM, RRUM, RLAM). These
/// use an intentionally simplified, documented bit layout (register-register
/// and immediate-count forms only) rather than the full addressing-mode
/// space real silicon supports.
fn decode_address_ext(first: u16, instr_offset: u32) -> Result<DecodedInstruction, DecodeError> {
    let sub = (first >> 8) & 0xf;
    let reg_a = ((first >> 4) & 0xf) as usize;
    let reg_b = (first & 0xf) as usize;

    let (opcode, class, width, src, dst) = match sub {
        0 => (Opcode::MOVA, InstructionClass::AddressExt, Width::AWord, Some(Operand::Register(reg_b)), Some(Operand::Register(reg_a))),
        1 => (Opcode::CMPA, InstructionClass::AddressExt, Width::AWord, Some(Operand::Register(reg_b)), Some(Operand::Register(reg_a))),
        2 => (Opcode::ADDA, InstructionClass::AddressExt, Width::AWord, Some(Operand::Register(reg_b)), Some(Operand::Register(reg_a))),
        3 => (Opcode::SUBA, InstructionClass::AddressExt, Width::AWord, Some(Operand::Register(reg_b)), Some(Operand::Register(reg_a))),
        4 => (Opcode::CALLA, InstructionClass::AddressExt, Width::AWord, None, Some(Operand::Register(reg_a))),
        5 => (Opcode::RETI, InstructionClass::NoArg, Width::AWord, None, None),
        6 => {
            let aword = reg_b & 0x8 != 0;
            let count = (reg_b & 0x7) + 1;
            (
                Opcode::PUSHM,
                InstructionClass::AddressExt,
                if aword { Width::AWord } else { Width::Word },
                Some(Operand::Immediate(count as u32)),
                Some(Operand::Register(reg_a)),
            )
        }
        7 => {
            let aword = reg_b & 0x8 != 0;
            let count = (reg_b & 0x7) + 1;
            (
                Opcode::POPM,
                InstructionClass::AddressExt,
                if aword { Width::AWord } else { Width::Word },
                Some(Operand::Immediate(count as u32)),
                Some(Operand::Register(reg_a)),
            )
        }
        op @ 8..=11 => {
            let opcode = match op {
                8 => Opcode::RRCM,
                9 => Opcode::RRAM,
                10 => Opcode::RRUM,
                _ => Opcode::RLAM,
            };
            let aword = reg_b & 0x8 != 0;
            let shift = (reg_b & 0x3) + 1;
            (
                opcode,
                InstructionClass::AddressExt,
                if aword { Width::AWord } else { Width::Word },
                Some(Operand::Immediate(shift as u32)),
                Some(Operand::Register(reg_a)),
            )
        }
        _ => return Err(DecodeError::Invalid { word: first, offset: instr_offset }),
    };

    Ok(DecodedInstruction { opcode, class, width, src, dst, offset: instr_offset, len: 2, repeat: None })
}

/// Decode one operand and apply constant-generator / PC-SR folding.
/// Constant-generator folding only applies to source
/// operands — on real silicon R2/R3 as a *destination* still addresses the
/// actual register, since "writing to a constant" is meaningless. The
/// PC/SR symbolic-address fold, by contrast, applies to both sides; the
/// formula itself (`offset + 2 + disp`) uses the instruction's own starting
/// offset for both.
fn decode_operand(cur: &mut Cursor, mode: u8, reg: usize, instr_offset: u32, is_src: bool) -> Result<Operand, DecodeError> {
    if is_src {
        // R3 folds in every mode, SR only in Indirect/IndirectInc.
        if reg == REG_CG2 {
            return Ok(Operand::Immediate(match mode {
                0 => 0,
                1 => 1,
                2 => 2,
                _ => 0xffff,
            }));
        }
        if reg == REG_SR {
            match mode {
                2 => return Ok(Operand::Immediate(4)),
                3 => return Ok(Operand::Immediate(8)),
                _ => {}
            }
        }
    }

    match mode {
        0 => Ok(Operand::Register(reg)),
        1 => {
            let disp = cur.next_word()? as i16 as i32;
            if reg == REG_PC {
                Ok(Operand::Symbolic((instr_offset as i64 + 2 + disp as i64) as u32))
            } else if reg == REG_SR {
                Ok(Operand::Absolute(disp as u32 & 0xffff))
            } else {
                Ok(Operand::Indexed(reg, disp))
            }
        }
        2 => Ok(Operand::Indirect(reg)),
        3 => {
            if reg == REG_PC {
                let imm = cur.next_word()?;
                Ok(Operand::Immediate(imm as u32))
            } else {
                Ok(Operand::IndirectInc(reg))
            }
        }
        _ => unreachable!("mode is a 2-bit field"),
    }
}

/// Recognise emulated single-operand aliases.
fn find_emulated_single(insn: &mut DecodedInstruction) {
    // Single-operand emulations only arise from folding a double-operand
    // real instruction (see find_emulated_double); this hook exists so the
    // call site reads symmetrically and stays a no-op for genuine
    // single-operand opcodes (PUSH/CALL/etc. never alias further).
    let _ = insn;
}

fn find_emulated_double(insn: &mut DecodedInstruction) {
    use Opcode::*;
    let src = insn.src;
    let dst = insn.dst;
    match insn.opcode {
        ADD => {
            if let Some(Operand::Immediate(1)) = src {
                insn.opcode = INC;
                insn.class = InstructionClass::Single;
                insn.src = None;
            } else if let Some(Operand::Immediate(2)) = src {
                insn.opcode = INCD;
                insn.class = InstructionClass::Single;
                insn.src = None;
            } else if src == dst {
                insn.opcode = RLA;
                insn.class = InstructionClass::Single;
                insn.src = None;
            }
        }
        ADDC => {
            if let Some(Operand::Immediate(0)) = src {
                insn.opcode = ADC;
                insn.class = InstructionClass::Single;
                insn.src = None;
            } else if src == dst {
                insn.opcode = RLC;
                insn.class = InstructionClass::Single;
                insn.src = None;
            }
        }
        BIC => {
            if dst == Some(Operand::Register(REG_SR)) {
                if let Some(Operand::Immediate(v)) = src {
                    let op = match v {
                        1 => Some(CLRC),
                        4 => Some(CLRN),
                        2 => Some(CLRZ),
                        8 => Some(DINT),
                        _ => None,
                    };
                    if let Some(op) = op {
                        insn.opcode = op;
                        insn.class = InstructionClass::NoArg;
                        insn.src = None;
                        insn.dst = None;
                    }
                }
            }
        }
        BIS => {
            if dst == Some(Operand::Register(REG_SR)) {
                if let Some(Operand::Immediate(v)) = src {
                    let op = match v {
                        1 => Some(SETC),
                        4 => Some(SETN),
                        2 => Some(SETZ),
                        8 => Some(EINT),
                        _ => None,
                    };
                    if let Some(op) = op {
                        insn.opcode = op;
                        insn.class = InstructionClass::NoArg;
                        insn.src = None;
                        insn.dst = None;
                    }
                }
            }
        }
        CMP => {
            if let Some(Operand::Immediate(0)) = src {
                insn.opcode = TST;
                insn.class = InstructionClass::Single;
                insn.src = None;
            }
        }
        DADD => {
            if let Some(Operand::Immediate(0)) = src {
                insn.opcode = DADC;
                insn.class = InstructionClass::Single;
                insn.src = None;
            }
        }
        MOV => {
            if src == Some(Operand::IndirectInc(REG_SP)) {
                if dst == Some(Operand::Register(REG_PC)) {
                    insn.opcode = RET;
                    insn.class = InstructionClass::NoArg;
                    insn.src = None;
                    insn.dst = None;
                } else {
                    insn.opcode = POP;
                    insn.class = InstructionClass::Single;
                    insn.src = None;
                }
            } else if dst == Some(Operand::Register(REG_PC)) {
                insn.opcode = BR;
                insn.class = InstructionClass::Single;
                insn.dst = insn.src;
                insn.src = None;
            } else if src == Some(Operand::Immediate(0)) {
                insn.opcode = CLR;
                insn.class = InstructionClass::Single;
                insn.src = None;
            }
        }
        SUB => {
            if let Some(Operand::Immediate(1)) = src {
                insn.opcode = DEC;
                insn.class = InstructionClass::Single;
                insn.src = None;
            } else if let Some(Operand::Immediate(2)) = src {
                insn.opcode = DECD;
                insn.class = InstructionClass::Single;
                insn.src = None;
            }
        }
        SUBC => {
            if let Some(Operand::Immediate(0)) = src {
                insn.opcode = SBC;
                insn.class = InstructionClass::Single;
                insn.src = None;
            }
        }
        XOR => {
            if let Some(Operand::Immediate(0xffff)) = src {
                insn.opcode = INV;
                insn.class = InstructionClass::Single;
                insn.src = None;
            }
        }
        _ => {}
    }
    // NOP is a special case of MOV #0, R3 that also matches the CLR
    // pattern above (dst is R3 via constant-generator folding would never
    // happen since R3 as a *destination* register is never folded); check
    // it directly against the original operands.
    if insn.opcode == CLR && dst == Some(Operand::Register(REG_CG2)) {
        insn.opcode = NOP;
        insn.class = InstructionClass::NoArg;
        insn.dst = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::CoreVariant;

    fn d(bytes: &[u8], offset: u32) -> DecodedInstruction {
        decode(bytes, offset, bytes.len(), CoreVariant::Base).expect("decode failed")
    }

    #[test]
    fn s1_mov_immediate_to_absolute() {
        // MOV #0x1234, &0x5678
        let bytes = [0xB2, 0x40, 0x34, 0x12, 0x78, 0x56];
        let insn = d(&bytes, 0x8000);
        assert_eq!(insn.opcode, Opcode::MOV);
        assert_eq!(insn.len, 6);
        assert_eq!(insn.src, Some(Operand::Immediate(0x1234)));
        assert_eq!(insn.dst, Some(Operand::Absolute(0x5678)));
    }

    #[test]
    fn s2_br_emulated_from_mov_pc() {
        // MOV #0x9000, PC  (encoded as 30 40 00 90 per spec S2)
        let bytes = [0x30, 0x40, 0x00, 0x90];
        let insn = d(&bytes, 0x8000);
        assert_eq!(insn.opcode, Opcode::BR);
        assert_eq!(insn.len, 4);
        assert_eq!(insn.dst, Some(Operand::Immediate(0x9000)));
    }

    #[test]
    fn constant_generator_folds_all_six_values() {
        // src_reg=SR(2), modes Register/Indexed aren't constant-gen folds;
        // only Indirect->4 and IndirectInc->8. src_reg=R3(CG2) folds all
        // four modes to {0,1,2,0xffff}.
        // MOV @SR, R5  (mode=2, reg=2) -> immediate 4
        let bytes = [0x25, 0x42];
        let insn = d(&bytes, 0);
        assert_eq!(insn.src, Some(Operand::Immediate(4)));

        // MOV @SR+, R5 (mode=3, reg=2) -> immediate 8
        let bytes = [0x35, 0x42];
        let insn = d(&bytes, 0);
        assert_eq!(insn.src, Some(Operand::Immediate(8)));

        // MOV R3, R5 (mode=0, reg=3) -> immediate 0
        let word: u16 = 0x4000 | (3 << 8) | (5 << 0);
        let bytes = word.to_le_bytes();
        let insn = d(&bytes, 0);
        assert_eq!(insn.src, Some(Operand::Immediate(0)));
    }

    #[test]
    fn jump_displacement_is_signed() {
        // JMP with maximally negative displacement
        let word: u16 = 0x3C00 | 0x200;
        let bytes = word.to_le_bytes();
        let insn = d(&bytes, 0x8000);
        assert_eq!(insn.opcode, Opcode::JMP);
        assert_eq!(insn.dst, Some(Operand::Symbolic(0x8000 + 2 - 0x400)));
    }

    #[test]
    fn truncated_stream_is_reported() {
        // MOV #imm, &abs (see s1_mov_immediate_to_absolute) needs two more
        // words than are actually available here.
        let bytes = [0xB2, 0x40, 0x34];
        let err = decode(&bytes, 0x8000, bytes.len(), CoreVariant::Base).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let bytes = [0x00, 0x00];
        let err = decode(&bytes, 0, bytes.len(), CoreVariant::Base).unwrap_err();
        assert!(matches!(err, DecodeError::Invalid { .. }));
    }

    #[test]
    fn ret_emulated_from_mov_sp_indirect_inc_pc() {
        // MOV @SP+, PC
        let word: u16 = 0x4000 | (1 << 8) | (3 << 4) | 0x0;
        let bytes = word.to_le_bytes();
        let insn = d(&bytes, 0);
        assert_eq!(insn.opcode, Opcode::RET);
        assert_eq!(insn.class, InstructionClass::NoArg);
    }
}
