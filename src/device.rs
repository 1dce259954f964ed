// The polymorphic device contract. `sim::Simulator` and
// `jtag::JtagDevice` are the two concrete implementations; everything above
// this layer (the programmer, the demo binary) is written against `Device`
// alone so it works unmodified against either.

use crate::error::{DeviceError, UsageError};
use crate::isa::NUM_REGS;

/// `Device::poll` result. Only meaningful while the device is `Running`;
/// calling it from any other state is a logic error the caller is expected
/// not to make.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Halted,
    Interrupted,
    Error,
}

/// The device's own state, independent of what `poll` last reported. A
/// fresh device (just opened, JTAG not yet entered, or a simulator not yet
/// reset) is `Closed`; `ctl(Reset)` is the only way out of it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeviceState {
    Closed,
    Halted,
    Running,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Ctl {
    Reset,
    Run,
    Halt,
    Step,
}

/// What kind of access a breakpoint slot traps on. `Code` traps
/// on instruction fetch; the `Watch` variants trap on a data access at the
/// given address regardless of what instruction performs it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BreakpointKind {
    Code,
    Watch,
    ReadWatch,
    WriteWatch,
}

/// One hardware breakpoint slot. `enabled` tracks whether it currently
/// traps; `range` lets a single slot cover an address range (used by the
/// EEM range-breakpoint trigger blocks), with `None` meaning an exact
/// single-address match. `dirty` is the JTAG back-end's signal to
/// reprogram the hardware match registers lazily at the next `ctl(Run)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub addr: u32,
    pub range_end: Option<u32>,
    pub kind: BreakpointKind,
    pub enabled: bool,
    pub dirty: bool,
}

impl Breakpoint {
    pub fn exact(addr: u32) -> Self {
        Breakpoint { addr, range_end: None, kind: BreakpointKind::Code, enabled: true, dirty: true }
    }

    pub fn matches(&self, addr: u32) -> bool {
        self.enabled && addr >= self.addr && addr <= self.range_end.unwrap_or(self.addr)
    }
}

/// `Device::erase`'s scope. `Segment` erases a single flash
/// segment containing `addr`; `Main` erases all of main flash; `All` also
/// erases the information segment.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EraseKind {
    All,
    Main,
    Segment,
}

/// Device configuration fuses read back during identification:
/// whether JTAG access is locked out, and the device's flash/RAM sizing
/// used to bound erase/program operations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ConfigFuses {
    pub locked: bool,
    pub flash_size: u32,
    pub ram_size: u32,
}

/// The contract shared by every target the rest of this crate talks to.
/// Implementors own the `Closed -> Halted -> Running -> Halted` state
/// machine; callers are expected to call `ctl` before relying on a
/// particular state rather than poke at state directly.
pub trait Device {
    fn state(&self) -> DeviceState;

    fn ctl(&mut self, op: Ctl) -> Result<(), DeviceError>;

    /// Only legal while `state() == Running`.
    fn poll(&mut self) -> Result<RunStatus, DeviceError>;

    fn read_mem(&mut self, addr: u32, out: &mut [u8]) -> Result<(), DeviceError>;

    fn write_mem(&mut self, addr: u32, data: &[u8]) -> Result<(), DeviceError>;

    fn get_regs(&mut self) -> Result<[u32; NUM_REGS], DeviceError>;

    fn set_regs(&mut self, regs: &[u32; NUM_REGS]) -> Result<(), DeviceError>;

    fn erase(&mut self, kind: EraseKind, addr: u32) -> Result<(), DeviceError>;

    fn set_breakpoint(&mut self, slot: usize, bp: Option<Breakpoint>) -> Result<(), UsageError>;

    fn get_config_fuses(&mut self) -> Result<ConfigFuses, DeviceError>;

    fn breakpoint_slots(&self) -> usize;
}

/// Run the device until it halts (naturally or via a breakpoint), driving
/// `poll()` in a loop. Shared by the simulator-as-standalone-target path
/// and any JTAG-backed device, so both get identical run-to-completion
/// semantics rather than hand-rolling the poll loop twice.
pub fn run_to_halt<D: Device + ?Sized>(dev: &mut D) -> Result<RunStatus, DeviceError> {
    dev.ctl(crate::device::Ctl::Run)?;
    loop {
        match dev.poll()? {
            RunStatus::Running => continue,
            other => return Ok(other),
        }
    }
}

/// Single-step past whatever is currently at `pc` if a breakpoint sits
/// there, so that resuming with `ctl(Run)` does not immediately retrap on
/// the same instruction.
pub fn step_over_breakpoint<D: Device + ?Sized>(dev: &mut D, pc: u32, breakpoints: &[Option<Breakpoint>]) -> Result<(), DeviceError> {
    if breakpoints.iter().flatten().any(|bp| bp.matches(pc)) {
        dev.ctl(Ctl::Step)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoint_matches_exact_address_only() {
        let bp = Breakpoint::exact(0x1000);
        assert!(bp.matches(0x1000));
        assert!(!bp.matches(0x1001));
    }

    #[test]
    fn breakpoint_matches_within_range() {
        let bp = Breakpoint { addr: 0x1000, range_end: Some(0x1010), kind: BreakpointKind::Code, enabled: true, dirty: true };
        assert!(bp.matches(0x1000));
        assert!(bp.matches(0x1008));
        assert!(bp.matches(0x1010));
        assert!(!bp.matches(0x1011));
    }

    #[test]
    fn disabled_breakpoint_never_matches() {
        let mut bp = Breakpoint::exact(0x2000);
        bp.enabled = false;
        assert!(!bp.matches(0x2000));
    }
}
