// JTAG sequences: the device-specific debug protocol layered
// on top of the TAP core (`tap.rs`) or, for the MehFET probe, directly on a
// `Transport` via batched commands. `JtagDevice` is the `Device`
// implementation the command layer drives identically to `sim::Simulator`.
//
// Every sequence here is grounded on `drivers/jtaglib.c`'s corresponding
// `jtag_*` function; the DR/IR constant values are the canonical
// (non-bit-reversed) forms documented in that file's comments — bit order
// on the wire is handled once, inside `TapCore`/`MehFet`, rather than baked
// into every call site as it is in the original.

use crate::device::{Breakpoint, BreakpointKind, ConfigFuses, Ctl, Device, DeviceState, EraseKind, RunStatus};
use crate::error::{DeviceError, TransportError, UsageError};
use crate::isa::{CoreVariant, NUM_REGS, REG_PC};
use crate::tap::{TapCore, TapDriver};
use crate::transport::{recv_exact, Transport};

/// IR opcodes (canonical form; see module doc).
mod ir {
    pub const CNTRL_SIG_16BIT: u8 = 0x13;
    pub const CNTRL_SIG_CAPTURE: u8 = 0x14;
    pub const CNTRL_SIG_RELEASE: u8 = 0x15;
    pub const DATA_16BIT: u8 = 0x41;
    pub const DATA_QUICK: u8 = 0x43;
    pub const ADDR_16BIT: u8 = 0x83;
    pub const ADDR_CAPTURE: u8 = 0x84;
    pub const DATA_TO_ADDR: u8 = 0x85;
    pub const DATA_PSA: u8 = 0x44;
    pub const SHIFT_OUT_PSA: u8 = 0x46;
    pub const EMEX_WRITE_CONTROL: u8 = 0x0c;
    pub const EMEX_READ_CONTROL: u8 = 0x0b;
}

/// DR control words for `IR_CNTRL_SIG_16BIT`.
mod ctl_dr {
    pub const RELEASE: u16 = 0x2401;
    pub const HALT: u16 = 0x2409;
    pub const READ_WORD: u16 = 0x2409;
    pub const READ_BYTE: u16 = 0x2419;
    pub const WRITE_WORD: u16 = 0x2408;
    pub const WRITE_BYTE: u16 = 0x2418;
}

const JMP_MINUS_ZERO: u16 = 0x3fff; // `JMP $`, injected to park the CPU while halted.
const PSA_POLYNOMIAL: u32 = 0x0805;

pub const JTAG_ID_BASE: u8 = 0x89;
pub const JTAG_ID_EXTENDED: u8 = 0x91;

const FLASH_START: u32 = 0x8000;
const SEGMENT_SIZE: u32 = 512;
const MASS_ERASE_THRESHOLD_KB: u32 = 64;
const MASS_ERASE_REPEAT_LARGE: u32 = 19;
const MASS_ERASE_REPEAT_SMALL: u32 = 1;

const MAX_BREAKPOINT_SLOTS: usize = 2;
const CPU_SYNC_ATTEMPTS: u32 = 50;

/// Software-side PSA: the same LFSR the chip's
/// hardware shifter computes, run over `data` (or, with `data == None`, the
/// erase-check mask `0xffff` per word, as `jtag_verify_psa` does when its
/// `data` pointer is null).
pub fn psa(start_addr: u32, words: Option<&[u16]>, len: usize) -> u16 {
    let mut crc = start_addr.wrapping_sub(2) & 0xffff;
    for i in 0..len {
        if crc & 0x8000 != 0 {
            crc = ((crc ^ PSA_POLYNOMIAL) << 1) | 1;
        } else {
            crc <<= 1;
        }
        crc &= 0xffff;
        let word = match words {
            Some(w) => w[i] as u32,
            None => 0xffff,
        };
        crc ^= word;
        crc &= 0xffff;
    }
    crc as u16
}

/// The batched operations a JTAG back-end must support, whether it gets
/// there by bit-banging a `TapDriver` (`TapCore`) or by sending whole-shift
/// commands to a MehFET probe (`mehfet::MehFet`).
pub trait JtagLink {
    fn reset_tap(&mut self);
    fn shift_ir(&mut self, bits: u8) -> u8;
    fn shift_dr_16(&mut self, bits: u16) -> u16;
    fn tclk_edge(&mut self);
    fn tclk_burst(&mut self, n: u32);
    fn power(&mut self, tst: bool, rst: bool);
}

impl<D: TapDriver> JtagLink for TapCore<D> {
    fn reset_tap(&mut self) {
        TapCore::reset_tap(self)
    }
    fn shift_ir(&mut self, bits: u8) -> u8 {
        TapCore::shift_ir(self, bits)
    }
    fn shift_dr_16(&mut self, bits: u16) -> u16 {
        TapCore::shift_dr_16(self, bits)
    }
    fn tclk_edge(&mut self) {
        TapCore::tclk_edge(self)
    }
    fn tclk_burst(&mut self, n: u32) {
        TapCore::tclk_burst(self, n)
    }
    fn power(&mut self, tst: bool, rst: bool) {
        TapCore::power(self, tst, rst)
    }
}

/// `Device` implementation driving real (or modeled) silicon over JTAG.
/// Generic over `JtagLink` so the same sequence logic runs whether the
/// underlying transport is a bit-banged `TapDriver` or a MehFET probe.
pub struct JtagDevice<L> {
    link: L,
    state: DeviceState,
    variant: CoreVariant,
    breakpoints: [Option<Breakpoint>; MAX_BREAKPOINT_SLOTS],
    flash_kb: u32,
    ram_kb: u32,
}

impl<L: JtagLink> JtagDevice<L> {
    /// Enter JTAG control: assert TEST/RST, shift CNTRL_SIG_CAPTURE to read
    /// back the JTAG ID, and fail if it matches neither known core variant.
    pub fn open(mut link: L, flash_kb: u32, ram_kb: u32) -> Result<Self, DeviceError> {
        link.power(true, false);
        link.reset_tap();
        let id = link.shift_ir(ir::CNTRL_SIG_CAPTURE);
        let variant = match id {
            JTAG_ID_BASE => CoreVariant::Base,
            JTAG_ID_EXTENDED => CoreVariant::Extended,
            other => return Err(DeviceError::BadJtagId(other)),
        };
        Ok(JtagDevice {
            link,
            state: DeviceState::Closed,
            variant,
            breakpoints: [None; MAX_BREAKPOINT_SLOTS],
            flash_kb,
            ram_kb,
        })
    }

    pub fn variant(&self) -> CoreVariant {
        self.variant
    }

    /// Shift `IR=CTRL_SIG_CAPTURE, DR=0xAAAA` and check for the fuse-blown
    /// echo `0x5555`.
    pub fn check_fuse(&mut self) -> Result<bool, DeviceError> {
        self.link.shift_ir(ir::CNTRL_SIG_CAPTURE);
        let captured = self.link.shift_dr_16(0xaaaa);
        if captured == 0x5555 {
            return Err(DeviceError::FuseBlown);
        }
        Ok(false)
    }

    /// Halt the CPU: inject `JMP $` so it cannot run away, then set the
    /// JTAG_HALT control bit.
    fn halt_cpu(&mut self) {
        self.link.tclk_edge();
        self.link.shift_ir(ir::CNTRL_SIG_16BIT);
        self.link.shift_dr_16(ctl_dr::RELEASE);
        self.link.shift_ir(ir::DATA_16BIT);
        self.link.shift_dr_16(JMP_MINUS_ZERO);
        self.link.tclk_edge();
        self.link.shift_ir(ir::CNTRL_SIG_16BIT);
        self.link.shift_dr_16(ctl_dr::HALT);
        self.link.tclk_edge();
    }

    fn release_cpu(&mut self) {
        self.link.shift_ir(ir::CNTRL_SIG_16BIT);
        self.link.shift_dr_16(ctl_dr::RELEASE);
        self.link.shift_ir(ir::ADDR_CAPTURE);
    }

    fn read_word_jtag(&mut self, addr: u32) -> u16 {
        self.halt_cpu();
        self.link.shift_ir(ir::CNTRL_SIG_16BIT);
        self.link.shift_dr_16(ctl_dr::READ_WORD);
        self.link.shift_ir(ir::ADDR_16BIT);
        self.link.shift_dr_16(addr as u16);
        self.link.shift_ir(ir::DATA_TO_ADDR);
        self.link.tclk_edge();
        self.link.shift_dr_16(0)
    }

    fn write_word_jtag(&mut self, addr: u32, value: u16) {
        self.halt_cpu();
        self.link.shift_ir(ir::CNTRL_SIG_16BIT);
        self.link.shift_dr_16(ctl_dr::WRITE_WORD);
        self.link.shift_ir(ir::ADDR_16BIT);
        self.link.shift_dr_16(addr as u16);
        self.link.shift_ir(ir::DATA_TO_ADDR);
        self.link.shift_dr_16(value);
        self.link.tclk_edge();
    }

    fn read_byte_jtag(&mut self, addr: u32) -> u8 {
        self.halt_cpu();
        self.link.shift_ir(ir::CNTRL_SIG_16BIT);
        self.link.shift_dr_16(ctl_dr::READ_BYTE);
        self.link.shift_ir(ir::ADDR_16BIT);
        self.link.shift_dr_16(addr as u16);
        self.link.shift_ir(ir::DATA_TO_ADDR);
        self.link.tclk_edge();
        (self.link.shift_dr_16(0) & 0xff) as u8
    }

    /// Park the PC with `jmp $-4`, `mov Rn, &0x01fe`, then capture the
    /// value that appears on the simulated data bus.
    fn read_register(&mut self, reg: usize) -> u32 {
        self.halt_cpu();
        self.link.shift_ir(ir::DATA_16BIT);
        self.link.shift_dr_16(0x4030 | (reg as u16) << 8);
        self.link.tclk_edge();
        self.link.tclk_edge();
        self.link.shift_ir(ir::DATA_TO_ADDR);
        self.link.shift_dr_16(0) as u32
    }

    fn write_register(&mut self, reg: usize, value: u32) {
        self.halt_cpu();
        self.link.shift_ir(ir::DATA_16BIT);
        // `mov #value, Rn`
        self.link.shift_dr_16(0x4030 | (reg as u16) << 8);
        self.link.tclk_edge();
        self.link.shift_dr_16(value as u16);
        self.link.tclk_edge();
    }

    /// Strobe TCLK until the CPU reaches its next instruction fetch, up to
    /// `CPU_SYNC_ATTEMPTS` times, so a dead device can never hang this call.
    fn sync_to_fetch(&mut self) -> Result<(), DeviceError> {
        for _ in 0..CPU_SYNC_ATTEMPTS {
            self.link.shift_ir(ir::CNTRL_SIG_CAPTURE);
            let sig = self.link.shift_dr_16(0);
            if sig & 0x0001 != 0 {
                return Ok(());
            }
            self.link.tclk_edge();
        }
        Err(DeviceError::Timeout)
    }

    fn single_step(&mut self) -> Result<(), DeviceError> {
        self.link.shift_ir(ir::CNTRL_SIG_16BIT);
        self.link.shift_dr_16(ctl_dr::RELEASE);
        self.link.shift_ir(ir::DATA_QUICK);
        self.sync_to_fetch()?;
        self.halt_cpu();
        Ok(())
    }

    /// Write FCTL1/2/3 to enable the flash write state machine, matching
    /// `drivers/jtaglib.c`'s FCTL preamble.
    fn flash_write_begin(&mut self) {
        self.write_word_jtag(0x0128, 0xa540); // FCTL1 = WRT
        self.write_word_jtag(0x012a, 0xa540); // FCTL2 = MCLK/1
        self.write_word_jtag(0x012c, 0xa500); // FCTL3 = clear LOCK
    }

    fn flash_write_end(&mut self) {
        self.write_word_jtag(0x0128, 0xa500);
    }

    fn flash_write_word(&mut self, addr: u32, value: u16) {
        self.write_word_jtag(addr, value);
        self.link.tclk_burst(35);
    }

    fn mass_erase_repeats(&self) -> u32 {
        if self.flash_kb > MASS_ERASE_THRESHOLD_KB {
            MASS_ERASE_REPEAT_LARGE
        } else {
            MASS_ERASE_REPEAT_SMALL
        }
    }

    fn erase_sequence(&mut self, fctl1: u16, addr: u32, repeats: u32) {
        for _ in 0..repeats {
            self.flash_write_begin();
            self.write_word_jtag(0x0128, fctl1);
            self.write_word_jtag(addr, 0xffff);
            self.link.tclk_burst(5000);
            self.flash_write_end();
        }
    }

    /// Program the EEM trigger block for breakpoint slot `i`:
    /// `MBTRIGi.VAL = addr`, `.CTL = MAB|EQUAL`, `.MSK = 0`, `.CMB = 1<<i`.
    fn program_breakpoint(&mut self, slot: usize, bp: &Breakpoint) {
        const TB_BASE: u16 = 0x0;
        const TB_STRIDE: u16 = 0x8;
        let base = TB_BASE + slot as u16 * TB_STRIDE;
        const MAB: u16 = 0x0000;
        const CMP_EQUAL: u16 = 0x0000;
        self.link.shift_ir(ir::EMEX_WRITE_CONTROL);
        self.link.shift_dr_16(base); // MBTRIGx.VAL select
        self.link.shift_dr_16(bp.addr as u16);
        self.link.shift_dr_16(base + 2);
        self.link.shift_dr_16(MAB | CMP_EQUAL);
        self.link.shift_dr_16(base + 4);
        self.link.shift_dr_16(0); // MSK = 0: exact match
        self.link.shift_dr_16(base + 6);
        self.link.shift_dr_16(1 << slot); // CMB
    }

    fn reprogram_dirty_breakpoints(&mut self) {
        let mut breakreact: u16 = 0;
        for (i, slot) in self.breakpoints.iter().enumerate() {
            if let Some(bp) = slot {
                if bp.enabled {
                    if bp.dirty {
                        self.program_breakpoint(i, bp);
                    }
                    breakreact |= 1 << i;
                }
            }
        }
        self.link.shift_ir(ir::EMEX_WRITE_CONTROL);
        self.link.shift_dr_16(breakreact);
        for slot in self.breakpoints.iter_mut().flatten() {
            slot.dirty = false;
        }
    }

    fn code_breakpoint_at(&self, pc: u32) -> bool {
        self.breakpoints.iter().flatten().any(|bp| bp.kind == BreakpointKind::Code && bp.matches(pc))
    }
}

impl<L: JtagLink> Device for JtagDevice<L> {
    fn state(&self) -> DeviceState {
        self.state
    }

    fn ctl(&mut self, op: Ctl) -> Result<(), DeviceError> {
        match op {
            Ctl::Reset => {
                self.halt_cpu();
                let reset_vec = self.read_word_jtag(0xfffe) as u32;
                self.write_register(REG_PC, reset_vec);
                self.state = DeviceState::Halted;
            }
            Ctl::Halt => {
                self.halt_cpu();
                self.state = DeviceState::Halted;
            }
            Ctl::Step => {
                self.single_step()?;
            }
            Ctl::Run => {
                self.reprogram_dirty_breakpoints();
                let pc = self.read_register(REG_PC);
                if self.code_breakpoint_at(pc) {
                    self.single_step()?;
                }
                self.release_cpu();
                self.state = DeviceState::Running;
            }
        }
        Ok(())
    }

    fn poll(&mut self) -> Result<RunStatus, DeviceError> {
        self.link.shift_ir(ir::CNTRL_SIG_CAPTURE);
        let sig = self.link.shift_dr_16(0);
        let halted = sig & 0x0001 == 0;
        if halted {
            self.halt_cpu();
            self.state = DeviceState::Halted;
            return Ok(RunStatus::Halted);
        }
        Ok(RunStatus::Running)
    }

    fn read_mem(&mut self, addr: u32, out: &mut [u8]) -> Result<(), DeviceError> {
        if self.state != DeviceState::Halted {
            self.halt_cpu();
            self.state = DeviceState::Halted;
        }
        let mut i = 0;
        while i < out.len() {
            if i + 1 < out.len() && (addr as usize + i) % 2 == 0 {
                let w = self.read_word_jtag(addr + i as u32);
                out[i] = (w & 0xff) as u8;
                out[i + 1] = (w >> 8) as u8;
                i += 2;
            } else {
                out[i] = self.read_byte_jtag(addr + i as u32);
                i += 1;
            }
        }
        Ok(())
    }

    fn write_mem(&mut self, addr: u32, data: &[u8]) -> Result<(), DeviceError> {
        if self.state != DeviceState::Halted {
            self.halt_cpu();
            self.state = DeviceState::Halted;
        }
        if addr < FLASH_START {
            let mut i = 0;
            while i < data.len() {
                if i + 1 < data.len() {
                    let w = u16::from_le_bytes([data[i], data[i + 1]]);
                    self.write_word_jtag(addr + i as u32, w);
                    i += 2;
                } else {
                    // Odd trailing byte on RAM: read-modify-write the word.
                    let w = self.read_word_jtag(addr + i as u32);
                    let merged = (w & 0xff00) | data[i] as u16;
                    self.write_word_jtag(addr + i as u32, merged);
                    i += 1;
                }
            }
            return Ok(());
        }
        if data.len() % 2 != 0 {
            return Err(UsageError::OddFlashWrite.into());
        }
        self.flash_write_begin();
        for (i, pair) in data.chunks(2).enumerate() {
            let w = u16::from_le_bytes([pair[0], pair[1]]);
            self.flash_write_word(addr + (i * 2) as u32, w);
        }
        self.flash_write_end();
        Ok(())
    }

    fn get_regs(&mut self) -> Result<[u32; NUM_REGS], DeviceError> {
        let mut regs = [0u32; NUM_REGS];
        for (i, slot) in regs.iter_mut().enumerate() {
            *slot = self.read_register(i);
        }
        Ok(regs)
    }

    fn set_regs(&mut self, regs: &[u32; NUM_REGS]) -> Result<(), DeviceError> {
        for (i, v) in regs.iter().enumerate() {
            self.write_register(i, *v);
        }
        Ok(())
    }

    fn erase(&mut self, kind: EraseKind, addr: u32) -> Result<(), DeviceError> {
        let repeats = self.mass_erase_repeats();
        match kind {
            EraseKind::All => self.erase_sequence(0xa506, FLASH_START, repeats),
            EraseKind::Main => self.erase_sequence(0xa504, FLASH_START, repeats),
            EraseKind::Segment => {
                let base = (addr / SEGMENT_SIZE) * SEGMENT_SIZE;
                self.erase_sequence(0xa502, base, 1);
            }
        }
        Ok(())
    }

    fn set_breakpoint(&mut self, slot: usize, bp: Option<Breakpoint>) -> Result<(), UsageError> {
        if slot >= MAX_BREAKPOINT_SLOTS {
            return Err(UsageError::BadBreakpointSlot { slot, max: MAX_BREAKPOINT_SLOTS });
        }
        self.breakpoints[slot] = bp;
        Ok(())
    }

    fn get_config_fuses(&mut self) -> Result<ConfigFuses, DeviceError> {
        let locked = self.check_fuse()?;
        Ok(ConfigFuses { locked, flash_size: self.flash_kb * 1024, ram_size: self.ram_kb * 1024 })
    }

    fn breakpoint_slots(&self) -> usize {
        MAX_BREAKPOINT_SLOTS
    }
}

/// MehFET framing: `send [cmd, LEB128 length, payload...]`,
/// `reply [status, LEB128 length, payload...]`. Any non-ok status aborts
/// the operation with the payload treated as diagnostic text.
pub mod mehfet {
    use super::*;

    pub mod cmd {
        pub const RESET_TAP: u8 = 0x0c;
        pub const IRSHIFT: u8 = 0x0d;
        pub const DRSHIFT: u8 = 0x0e;
        pub const TCLK_EDGE: u8 = 0x0a;
        pub const TCLK_BURST: u8 = 0x0b;
    }

    pub mod status {
        pub const OK: u8 = 0x00;
        pub const BADARGS: u8 = 0x7b;
        pub const NOCAPS: u8 = 0x7c;
        pub const BADSTATE: u8 = 0x7d;
        pub const INVALIDCMD: u8 = 0x7e;
        pub const ERROR: u8 = 0x7f;
    }

    fn status_text(status: u8) -> &'static str {
        match status {
            status::BADARGS => "bad arguments",
            status::NOCAPS => "probe lacks required capability",
            status::BADSTATE => "probe in wrong state",
            status::INVALIDCMD => "unrecognized command",
            status::ERROR => "probe reported a generic error",
            _ => "unknown status",
        }
    }

    fn leb128_encode(mut value: u64, out: &mut Vec<u8>) {
        loop {
            let mut byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            out.push(byte);
            if value == 0 {
                break;
            }
        }
    }

    fn leb128_decode<T: Transport>(t: &mut T) -> Result<u64, TransportError> {
        let mut result: u64 = 0;
        let mut shift = 0;
        loop {
            let mut byte = [0u8; 1];
            recv_exact(t, &mut byte)?;
            result |= ((byte[0] & 0x7f) as u64) << shift;
            if byte[0] & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        Ok(result)
    }

    /// A JTAG link realized entirely through MehFET probe commands rather
    /// than per-pin bit-banging — the probe's firmware does the TAP walk.
    pub struct MehFet<T> {
        transport: T,
    }

    impl<T: Transport> MehFet<T> {
        pub fn new(transport: T) -> Self {
            MehFet { transport }
        }

        fn command(&mut self, cmd: u8, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
            let mut frame = vec![cmd];
            leb128_encode(payload.len() as u64, &mut frame);
            frame.extend_from_slice(payload);
            self.transport.send(&frame)?;
            self.transport.flush()?;

            let mut status = [0u8; 1];
            recv_exact(&mut self.transport, &mut status)?;
            let len = leb128_decode(&mut self.transport)? as usize;
            let mut reply = vec![0u8; len];
            recv_exact(&mut self.transport, &mut reply)?;

            if status[0] != status::OK {
                let message = String::from_utf8_lossy(&reply).into_owned();
                let message = if message.is_empty() { status_text(status[0]).to_string() } else { message };
                return Err(TransportError::MehfetStatus { status: status[0], message });
            }
            Ok(reply)
        }
    }

    impl<T: Transport> super::JtagLink for MehFet<T> {
        fn reset_tap(&mut self) {
            let _ = self.command(cmd::RESET_TAP, &[1]);
        }

        fn shift_ir(&mut self, bits: u8) -> u8 {
            self.command(cmd::IRSHIFT, &[bits]).ok().and_then(|r| r.first().copied()).unwrap_or(0)
        }

        fn shift_dr_16(&mut self, bits: u16) -> u16 {
            let payload = [16, (bits & 0xff) as u8, (bits >> 8) as u8];
            match self.command(cmd::DRSHIFT, &payload) {
                Ok(r) if r.len() >= 2 => u16::from_le_bytes([r[0], r[1]]),
                _ => 0,
            }
        }

        fn tclk_edge(&mut self) {
            let _ = self.command(cmd::TCLK_EDGE, &[1]);
        }

        fn tclk_burst(&mut self, n: u32) {
            let _ = self.command(cmd::TCLK_BURST, &n.to_le_bytes());
        }

        fn power(&mut self, _tst: bool, _rst: bool) {
            // MehFET probes manage TEST/RST power sequencing internally as
            // part of `connect`; no discrete command corresponds to this.
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::transport::LoopbackTransport;

        #[test]
        fn command_round_trips_ok_status() {
            let mut t = LoopbackTransport::new();
            t.queue_reply(&[status::OK, 0x02, 0xaa, 0xbb]);
            let mut link = MehFet::new(t);
            let reply = link.command(cmd::IRSHIFT, &[0x13]).unwrap();
            assert_eq!(reply, vec![0xaa, 0xbb]);
        }

        #[test]
        fn non_ok_status_surfaces_as_transport_error() {
            let mut t = LoopbackTransport::new();
            let message = b"bad address";
            let mut reply = vec![status::BADARGS, message.len() as u8];
            reply.extend_from_slice(message);
            t.queue_reply(&reply);
            let mut link = MehFet::new(t);
            let err = link.command(cmd::IRSHIFT, &[0x13]).unwrap_err();
            match err {
                TransportError::MehfetStatus { status, message } => {
                    assert_eq!(status, status::BADARGS);
                    assert_eq!(message, "bad address");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn psa_of_empty_range_is_just_the_seed_folded_once() {
        // With length 0 the loop never runs; the seed passes through untouched.
        assert_eq!(psa(0x8000, None, 0), (0x8000u32.wrapping_sub(2) & 0xffff) as u16);
    }

    #[test]
    fn psa_erase_check_is_deterministic_and_order_sensitive() {
        let a = psa(0x8000, None, 4);
        let b = psa(0x8000, None, 5);
        assert_ne!(a, b);
    }

    #[test]
    fn psa_matches_for_identical_data_and_start() {
        let words = [0x4030u16, 0x1234, 0x5678];
        let a = psa(0x8000, Some(&words), 3);
        let b = psa(0x8000, Some(&words), 3);
        assert_eq!(a, b);
    }
}
