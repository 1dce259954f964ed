// Hardware multiplier: writing the second operand to one of
// four "kind" registers latches the requested operation and makes the
// 32-bit result available through RESLO/RESHI, the same contract real
// MSP430 code uses (write operand 1, write operand 2 to the op-select
// address, read back the result).

use super::Peripheral;

const BASE: u32 = 0x0130;
const MPY: u32 = BASE; // unsigned multiply
const MPYS: u32 = BASE + 2; // signed multiply
const MAC: u32 = BASE + 4; // unsigned multiply-accumulate
const MACS: u32 = BASE + 6; // signed multiply-accumulate
const OP2: u32 = BASE + 8;
const RESLO: u32 = BASE + 10;
const RESHI: u32 = BASE + 12;
const SUMEXT: u32 = BASE + 14;

#[derive(Copy, Clone, PartialEq, Eq)]
enum Kind {
    Unsigned,
    Signed,
    UnsignedMac,
    SignedMac,
}

pub struct HwMult {
    kind: Kind,
    op1: u16,
    result: u32,
    sumext: u16,
    byte_lo: Option<u8>,
}

impl HwMult {
    pub fn new() -> Self {
        HwMult { kind: Kind::Unsigned, op1: 0, result: 0, sumext: 0, byte_lo: None }
    }

    fn compute(&mut self, op2: u16) {
        let (product, carry_ext): (u32, u16) = match self.kind {
            Kind::Unsigned => (self.op1 as u32 * op2 as u32, 0),
            Kind::Signed => {
                let p = (self.op1 as i16 as i32) * (op2 as i16 as i32);
                (p as u32, if p < 0 { 0xffff } else { 0 })
            }
            Kind::UnsignedMac => {
                let sum = self.result as u64 + (self.op1 as u64 * op2 as u64);
                let carry = if sum > 0xffff_ffff { 1 } else { 0 };
                (sum as u32, carry)
            }
            Kind::SignedMac => {
                let p = (self.op1 as i16 as i64) * (op2 as i16 as i64);
                let sum = self.result as i64 + p;
                (sum as u32, if sum < 0 { 0xffff } else { 0 })
            }
        };
        self.result = product;
        self.sumext = carry_ext;
    }
}

impl Default for HwMult {
    fn default() -> Self {
        HwMult::new()
    }
}

impl Peripheral for HwMult {
    fn contains(&self, addr: u32) -> bool {
        (BASE..BASE + 16).contains(&addr)
    }

    fn read(&mut self, addr: u32) -> u8 {
        let word = match addr & !1 {
            RESLO => self.result as u16,
            RESHI => (self.result >> 16) as u16,
            SUMEXT => self.sumext,
            _ => 0,
        };
        if addr & 1 == 0 {
            word as u8
        } else {
            (word >> 8) as u8
        }
    }

    fn write(&mut self, addr: u32, val: u8) {
        // The multiplier's registers are word-wide; this peripheral is
        // fed one byte at a time through the bus, so low and high bytes
        // are staged until both halves of a word arrive.
        let base_word = addr & !1;
        let lo_half = addr & 1 == 0;
        if lo_half {
            self.byte_lo = Some(val);
            return;
        }
        let lo = self.byte_lo.take().unwrap_or(0);
        let word = u16::from_le_bytes([lo, val]);
        match base_word {
            MPY => {
                self.kind = Kind::Unsigned;
                self.op1 = word;
            }
            MPYS => {
                self.kind = Kind::Signed;
                self.op1 = word;
            }
            MAC => {
                self.kind = Kind::UnsignedMac;
                self.op1 = word;
            }
            MACS => {
                self.kind = Kind::SignedMac;
                self.op1 = word;
            }
            OP2 => self.compute(word),
            _ => {}
        }
    }

    fn tick(&mut self, _cycles: u64) -> bool {
        false
    }

    fn vector(&self) -> u32 {
        0
    }

    fn name(&self) -> &'static str {
        "hwmult"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_word(m: &mut HwMult, addr: u32, val: u16) {
        let [lo, hi] = val.to_le_bytes();
        m.write(addr, lo);
        m.write(addr + 1, hi);
    }

    fn read_word(m: &mut HwMult, addr: u32) -> u16 {
        u16::from_le_bytes([m.read(addr), m.read(addr + 1)])
    }

    #[test]
    fn unsigned_multiply() {
        let mut m = HwMult::new();
        write_word(&mut m, MPY, 1000);
        write_word(&mut m, OP2, 1000);
        assert_eq!(read_word(&mut m, RESLO), 1_000_000u32 as u16);
        assert_eq!(read_word(&mut m, RESHI), (1_000_000u32 >> 16) as u16);
    }

    #[test]
    fn signed_multiply_of_two_negatives_is_positive() {
        let mut m = HwMult::new();
        write_word(&mut m, MPYS, (-5i16) as u16);
        write_word(&mut m, OP2, (-3i16) as u16);
        assert_eq!(read_word(&mut m, RESLO), 15);
        assert_eq!(read_word(&mut m, SUMEXT), 0);
    }

    #[test]
    fn unsigned_mac_accumulates_across_calls() {
        let mut m = HwMult::new();
        write_word(&mut m, MAC, 10);
        write_word(&mut m, OP2, 10);
        write_word(&mut m, MAC, 5);
        write_word(&mut m, OP2, 5);
        assert_eq!(read_word(&mut m, RESLO), 125);
    }
}
