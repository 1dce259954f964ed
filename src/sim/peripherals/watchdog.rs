// Watchdog+: password-gated control register, counting down and
// asserting either a reset or an NMI depending on mode, mirroring the real
// WDTCTL/password scheme so a simulated program that forgets to feed the
// dog observes the same consequence a real board would.

use super::Peripheral;

/// WDTCTL is word-wide: the low byte carries the control bits, the high
/// byte the write-only password. The bus only ever calls `write` one byte
/// at a time, so the low byte is staged until its companion high byte
/// arrives (same pattern as `hwmult.rs`'s staged word registers).
const WDTCTL_LO: u32 = 0x0120;
const WDTCTL_HI: u32 = 0x0121;
const WDT_PASSWORD: u8 = 0x5a;

/// Divider selecting how many ticks elapse between counter decrements;
/// values mirror WDTCTL's WDTIS field (shrunk to a 4-entry table instead of
/// the full 8 since nothing here cares about sub-millisecond accuracy).
const INTERVALS: [u64; 4] = [32768, 8192, 512, 64];

pub struct Watchdog {
    hold: bool,
    nmi_mode: bool,
    interval_sel: usize,
    counter: u64,
    pub reset_asserted: bool,
    pub nmi_pending: bool,
    pending_lo: Option<u8>,
}

impl Watchdog {
    pub fn new() -> Self {
        Watchdog {
            hold: false,
            nmi_mode: false,
            interval_sel: 0,
            counter: INTERVALS[0],
            reset_asserted: false,
            nmi_pending: false,
            pending_lo: None,
        }
    }

    pub fn feed(&mut self) {
        self.counter = INTERVALS[self.interval_sel];
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Watchdog::new()
    }
}

impl Peripheral for Watchdog {
    fn contains(&self, addr: u32) -> bool {
        addr == WDTCTL_LO || addr == WDTCTL_HI
    }

    fn read(&mut self, addr: u32) -> u8 {
        if addr == WDTCTL_HI {
            // The password byte is write-only on real silicon.
            return 0;
        }
        let mut v = 0u8;
        if self.hold {
            v |= 0x80;
        }
        if self.nmi_mode {
            v |= 0x40;
        }
        v | self.interval_sel as u8
    }

    fn write(&mut self, addr: u32, val: u8) {
        if addr == WDTCTL_LO {
            self.pending_lo = Some(val);
            return;
        }
        // addr == WDTCTL_HI: this byte is the password. Reassemble the
        // word the same way a real word write lands on the bus and gate
        // the control update on it; a wrong password is a PUC, exactly
        // as the original's password-gated control register does.
        let control = self.pending_lo.take().unwrap_or(0);
        let word = u16::from_le_bytes([control, val]);
        if !check_password(word) {
            self.reset_asserted = true;
            return;
        }
        self.hold = control & 0x80 != 0;
        self.nmi_mode = control & 0x40 != 0;
        self.interval_sel = (control & 0x03) as usize;
        self.counter = INTERVALS[self.interval_sel];
    }

    fn tick(&mut self, cycles: u64) -> bool {
        if self.hold {
            return false;
        }
        if self.counter <= cycles {
            if self.nmi_mode {
                self.nmi_pending = true;
                self.counter = INTERVALS[self.interval_sel];
                return true;
            }
            self.reset_asserted = true;
            self.counter = INTERVALS[self.interval_sel];
            return false;
        }
        self.counter -= cycles;
        false
    }

    fn vector(&self) -> u32 {
        0xfff4
    }

    fn name(&self) -> &'static str {
        "watchdog"
    }

    fn non_maskable(&self) -> bool {
        self.nmi_mode
    }

    fn take_reset_request(&mut self) -> bool {
        std::mem::take(&mut self.reset_asserted)
    }
}

/// Validate a 16-bit WDTCTL write's password byte.
pub fn check_password(word: u16) -> bool {
    (word >> 8) as u8 == WDT_PASSWORD
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Write a full WDTCTL word the way the bus splits it: low byte first,
    /// password high byte second.
    fn write_ctl(wdt: &mut Watchdog, control: u8) {
        wdt.write(WDTCTL_LO, control);
        wdt.write(WDTCTL_HI, WDT_PASSWORD);
    }

    #[test]
    fn held_watchdog_never_expires() {
        let mut wdt = Watchdog::new();
        write_ctl(&mut wdt, 0x80);
        assert!(!wdt.tick(u64::MAX));
        assert!(!wdt.reset_asserted);
    }

    #[test]
    fn expiry_in_timer_mode_asserts_reset_not_interrupt() {
        let mut wdt = Watchdog::new();
        write_ctl(&mut wdt, 0x03); // fastest interval, not held, reset mode
        assert!(!wdt.tick(INTERVALS[3] - 1));
        assert!(!wdt.reset_asserted);
        let fired = wdt.tick(1);
        assert!(!fired);
        assert!(wdt.reset_asserted);
        assert!(wdt.take_reset_request());
        assert!(!wdt.take_reset_request());
    }

    #[test]
    fn expiry_in_nmi_mode_raises_interrupt_not_reset() {
        let mut wdt = Watchdog::new();
        write_ctl(&mut wdt, 0x40 | 0x03);
        assert!(wdt.non_maskable());
        let fired = wdt.tick(INTERVALS[3]);
        assert!(fired);
        assert!(wdt.nmi_pending);
        assert!(!wdt.reset_asserted);
    }

    #[test]
    fn wrong_password_triggers_a_reset_instead_of_applying_control_bits() {
        let mut wdt = Watchdog::new();
        wdt.write(WDTCTL_LO, 0x80); // hold bit
        wdt.write(WDTCTL_HI, 0x00); // wrong password
        assert!(wdt.reset_asserted);
        assert!(!wdt.hold);
    }

    #[test]
    fn password_byte_reads_back_as_zero() {
        let mut wdt = Watchdog::new();
        assert_eq!(wdt.read(WDTCTL_HI), 0);
    }

    #[test]
    fn password_check_rejects_wrong_high_byte() {
        assert!(check_password(0x5a00));
        assert!(!check_password(0x1234));
    }
}
