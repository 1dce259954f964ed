// The cycle-accurate simulator: a `Device` implementation
// that hosts `Cpu` + `Memory` + the breakpoint table instead of talking to
// real silicon over JTAG. `jtag::JtagDevice` is the other `Device`
// implementor; both are driven identically by `device::run_to_halt` and
// friends.

pub mod cpu;
pub mod memory;
pub mod peripherals;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::decode::decode;
use crate::device::{Breakpoint, BreakpointKind, ConfigFuses, Ctl, Device, DeviceState, EraseKind, RunStatus};
use crate::error::DeviceError;
use crate::isa::{sr_bits, CoreVariant, NUM_REGS, REG_PC, REG_SR};
use cpu::Cpu;
use memory::Memory;

/// `poll` burst size (spec §4.5/§5: "order 10^6 instructions").
const POLL_BUDGET: u32 = 1_000_000;

/// How often the burst loop re-checks the cancellation flag. Checking every
/// instruction would be correct but wastes an atomic load per step; this
/// keeps the worst-case response latency at `CANCEL_CHECK_STRIDE`
/// instructions, which at any realistic simulated clock rate is still well
/// under the ~100ms budget spec §5 requires.
const CANCEL_CHECK_STRIDE: u32 = 4096;

const BREAKPOINT_SLOTS: usize = 8;

/// Default segment size used by `erase(Segment, addr)`; matches the
/// smallest flash segment on the FR/F2xx families this crate targets.
const SEGMENT_SIZE: u32 = 512;

pub struct Simulator {
    cpu: Cpu,
    memory: Memory,
    state: DeviceState,
    breakpoints: [Option<Breakpoint>; BREAKPOINT_SLOTS],
    pending_irq: Option<(u32, bool)>,
    cancel: Arc<AtomicBool>,
}

impl Simulator {
    pub fn new(variant: CoreVariant) -> Self {
        Simulator {
            cpu: Cpu::new(variant),
            memory: Memory::new(variant),
            state: DeviceState::Closed,
            breakpoints: [None; BREAKPOINT_SLOTS],
            pending_irq: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A shared flag the caller can hand to a signal handler (or any other
    /// thread) and set to interrupt a long-running `poll` (spec §5: "the
    /// only concurrent entity the core must tolerate is an asynchronous
    /// cancellation flag"). `poll` clears it once observed.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Direct access for callers that load a program image before the first
    /// `ctl(Reset)` (the programmer and the demo binary both do this).
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn console_output(&self) -> std::cell::Ref<'_, Vec<u8>> {
        self.memory.bus.console_output()
    }

    fn sync_watches(&mut self) {
        let watches: Vec<Breakpoint> = self
            .breakpoints
            .iter()
            .flatten()
            .filter(|bp| bp.kind != BreakpointKind::Code)
            .copied()
            .collect();
        self.memory.set_watches(watches);
    }

    fn code_breakpoint_at(&self, pc: u32) -> bool {
        self.breakpoints
            .iter()
            .flatten()
            .any(|bp| bp.kind == BreakpointKind::Code && bp.matches(pc))
    }

    /// Perform at most one of the three `step_system` actions:
    /// interrupt dispatch, instruction execution, or an idle cycle while
    /// asleep. Returns `None` on a clean step, `Some(RunStatus::Error)` on a
    /// decode failure.
    fn step_system(&mut self) -> Option<RunStatus> {
        if let Some((vector, non_maskable)) = self.pending_irq.take() {
            let gie = self.cpu.regs[REG_SR] & (1 << sr_bits::GIE) != 0;
            if gie || non_maskable {
                self.dispatch_interrupt(vector);
                self.pending_irq = self.memory.bus.tick(6);
                if self.memory.bus.take_reset_request() {
                    self.perform_puc();
                }
                return None;
            }
            // GIE is off and the interrupt is maskable: leave it pending
            // for the next step to re-check.
            self.pending_irq = Some((vector, non_maskable));
        }

        let cpuoff = self.cpu.regs[REG_SR] & (1 << sr_bits::CPUOFF) != 0;
        if !cpuoff {
            let pc = self.cpu.regs[REG_PC];
            let mut window = [0u8; 8];
            self.memory.read_range(pc, &mut window);
            let insn = match decode(&window, pc, window.len(), self.cpu.variant) {
                Ok(insn) => insn,
                Err(_) => return Some(RunStatus::Error),
            };
            let cycles = self.cpu.execute(&insn, &mut self.memory);
            if let Some(v) = self.memory.bus.tick(cycles) {
                self.pending_irq = Some(v);
            }
        } else if let Some(v) = self.memory.bus.tick(1) {
            self.pending_irq = Some(v);
        }
        if self.memory.bus.take_reset_request() {
            self.perform_puc();
        }
        None
    }

    fn dispatch_interrupt(&mut self, vector: u32) {
        let pc = self.cpu.regs[REG_PC] as u16;
        let sr = self.cpu.regs[REG_SR] as u16;
        self.cpu.push_word_pub(&mut self.memory, pc);
        self.cpu.push_word_pub(&mut self.memory, sr);
        self.cpu.regs[REG_SR] &= !((1 << sr_bits::GIE) | (1 << sr_bits::CPUOFF));
        self.cpu.regs[REG_PC] = self.memory.read_word(vector) as u32;
    }

    /// Power-Up Clear: reload every register and fetch PC from the reset
    /// vector, same as `ctl(Reset)`. Shared with the watchdog's timer-mode
    /// expiry (spec §4.6/SPEC_FULL.md's RST pin modelling), which drives the
    /// same reset path a debugger-issued `ctl(Reset)` does.
    fn perform_puc(&mut self) {
        self.cpu.regs = [0; NUM_REGS];
        self.cpu.regs[REG_PC] = self.memory.read_word(0xfffe) as u32;
        self.pending_irq = None;
    }
}

impl Device for Simulator {
    fn state(&self) -> DeviceState {
        self.state
    }

    fn ctl(&mut self, op: Ctl) -> Result<(), DeviceError> {
        match op {
            Ctl::Reset => {
                self.perform_puc();
                self.state = DeviceState::Halted;
            }
            Ctl::Run => {
                let pc = self.cpu.regs[REG_PC];
                self.sync_watches();
                if self.code_breakpoint_at(pc) {
                    self.step_system();
                }
                self.state = DeviceState::Running;
            }
            Ctl::Halt => {
                self.state = DeviceState::Halted;
            }
            Ctl::Step => {
                self.step_system();
            }
        }
        Ok(())
    }

    fn poll(&mut self) -> Result<RunStatus, DeviceError> {
        for i in 0..POLL_BUDGET {
            if i % CANCEL_CHECK_STRIDE == 0 && self.cancel.swap(false, Ordering::Relaxed) {
                return Ok(RunStatus::Interrupted);
            }
            if let Some(status) = self.step_system() {
                self.state = DeviceState::Halted;
                return Ok(status);
            }
            if self.code_breakpoint_at(self.cpu.regs[REG_PC]) {
                self.state = DeviceState::Halted;
                return Ok(RunStatus::Halted);
            }
            if self.memory.take_watch_hit().is_some() {
                self.state = DeviceState::Halted;
                return Ok(RunStatus::Halted);
            }
        }
        Ok(RunStatus::Running)
    }

    fn read_mem(&mut self, addr: u32, out: &mut [u8]) -> Result<(), DeviceError> {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.memory.read_byte(addr.wrapping_add(i as u32));
        }
        Ok(())
    }

    fn write_mem(&mut self, addr: u32, data: &[u8]) -> Result<(), DeviceError> {
        for (i, b) in data.iter().enumerate() {
            self.memory.write_byte(addr.wrapping_add(i as u32), *b);
        }
        Ok(())
    }

    fn get_regs(&mut self) -> Result<[u32; NUM_REGS], DeviceError> {
        Ok(self.cpu.regs)
    }

    fn set_regs(&mut self, regs: &[u32; NUM_REGS]) -> Result<(), DeviceError> {
        self.cpu.regs = *regs;
        Ok(())
    }

    fn erase(&mut self, kind: EraseKind, addr: u32) -> Result<(), DeviceError> {
        match kind {
            EraseKind::All | EraseKind::Main => {
                self.memory.erase_range(0, memory::MEM_SIZE as u32);
            }
            EraseKind::Segment => {
                let base = (addr / SEGMENT_SIZE) * SEGMENT_SIZE;
                self.memory.erase_range(base, SEGMENT_SIZE);
            }
        }
        Ok(())
    }

    fn set_breakpoint(&mut self, slot: usize, bp: Option<Breakpoint>) -> Result<(), crate::error::UsageError> {
        if slot >= BREAKPOINT_SLOTS {
            return Err(crate::error::UsageError::BadBreakpointSlot { slot, max: BREAKPOINT_SLOTS });
        }
        self.breakpoints[slot] = bp;
        Ok(())
    }

    fn get_config_fuses(&mut self) -> Result<ConfigFuses, DeviceError> {
        Ok(ConfigFuses { locked: false, flash_size: memory::MEM_SIZE as u32, ram_size: 0x800 })
    }

    fn breakpoint_slots(&self) -> usize {
        BREAKPOINT_SLOTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booted(program: &[u8], reset_vector: u16) -> Simulator {
        let mut sim = Simulator::new(CoreVariant::Base);
        sim.memory.load(0x8000, program);
        sim.memory.load(0xfffe, &reset_vector.to_le_bytes());
        sim.ctl(Ctl::Reset).unwrap();
        sim
    }

    #[test]
    fn reset_loads_pc_from_reset_vector() {
        let sim = booted(&[], 0x8000);
        assert_eq!(sim.cpu.regs[REG_PC], 0x8000);
        assert_eq!(sim.state(), DeviceState::Halted);
    }

    #[test]
    fn single_step_advances_past_one_instruction() {
        // MOV #0x1234, R5
        let bytes = [0x35, 0x40, 0x34, 0x12];
        let mut sim = booted(&bytes, 0x8000);
        sim.ctl(Ctl::Step).unwrap();
        assert_eq!(sim.get_regs().unwrap()[5], 0x1234);
        assert_eq!(sim.cpu.regs[REG_PC], 0x8004);
    }

    #[test]
    fn code_breakpoint_halts_poll_at_the_right_pc() {
        // Two back-to-back NOPs (MOV #0, R3 folds to NOP).
        let bytes = [0x03, 0x43, 0x03, 0x43];
        let mut sim = booted(&bytes, 0x8000);
        sim.set_breakpoint(0, Some(Breakpoint::exact(0x8002))).unwrap();
        sim.ctl(Ctl::Run).unwrap();
        let status = sim.poll().unwrap();
        assert_eq!(status, RunStatus::Halted);
        assert_eq!(sim.cpu.regs[REG_PC], 0x8002);
    }

    #[test]
    fn erase_segment_clears_only_its_own_block() {
        let mut sim = booted(&[], 0x8000);
        sim.memory.load(0x1000, &[0xaa; 4]);
        sim.memory.load(0x1200, &[0xbb; 4]);
        sim.erase(EraseKind::Segment, 0x1002).unwrap();
        let mut out = [0u8; 4];
        sim.read_mem(0x1000, &mut out).unwrap();
        assert_eq!(out, [0, 0, 0, 0]);
        sim.read_mem(0x1200, &mut out).unwrap();
        assert_eq!(out, [0xbb; 4]);
    }

    #[test]
    fn raising_the_cancel_flag_interrupts_a_running_poll() {
        // A tight self-loop (`JMP $`) never halts on its own; only the
        // cancellation flag can make `poll` return.
        let bytes = [0x3f, 0xff];
        let mut sim = booted(&bytes, 0x8000);
        let cancel = sim.cancel_handle();
        cancel.store(true, std::sync::atomic::Ordering::Relaxed);
        sim.ctl(Ctl::Run).unwrap();
        let status = sim.poll().unwrap();
        assert_eq!(status, RunStatus::Interrupted);
        assert_eq!(sim.state(), DeviceState::Running);
    }

    #[test]
    fn write_watch_breakpoint_halts_run_on_matching_store() {
        // MOV #0x55, &0x1000
        let bytes = [0xB2, 0x40, 0x55, 0x00, 0x00, 0x10];
        let mut sim = booted(&bytes, 0x8000);
        sim.set_breakpoint(
            0,
            Some(Breakpoint { addr: 0x1000, range_end: None, kind: BreakpointKind::WriteWatch, enabled: true, dirty: true }),
        )
        .unwrap();
        sim.ctl(Ctl::Run).unwrap();
        let status = sim.poll().unwrap();
        assert_eq!(status, RunStatus::Halted);
    }
}
