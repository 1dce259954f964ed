// Two 8-bit digital I/O ports, P1 and P2, with IN/OUT/DIR/IFG/IES/IE/SEL/REN
// registers. P1 can raise a port interrupt; P2 is present for symmetry but
// not wired to an interrupt vector here since nothing in this crate
// exercises it.

use super::Peripheral;

const BASE: u32 = 0x0020;
const P1IN: u32 = BASE;
const P1OUT: u32 = BASE + 1;
const P1DIR: u32 = BASE + 2;
const P1IFG: u32 = BASE + 3;
const P1IES: u32 = BASE + 4;
const P1IE: u32 = BASE + 5;
const P1SEL: u32 = BASE + 6;
const P1REN: u32 = BASE + 7;
const P2IN: u32 = BASE + 8;
const P2OUT: u32 = BASE + 9;
const P2DIR: u32 = BASE + 10;
const P2IFG: u32 = BASE + 11;
const P2IES: u32 = BASE + 12;
const P2IE: u32 = BASE + 13;
const P2SEL: u32 = BASE + 14;
const P2REN: u32 = BASE + 15;

pub struct Gpio {
    p1_in: u8,
    p1_out: u8,
    p1_dir: u8,
    p1_ifg: u8,
    p1_ies: u8,
    p1_ie: u8,
    p1_sel: u8,
    p1_ren: u8,
    p2_in: u8,
    p2_out: u8,
    p2_dir: u8,
    p2_ifg: u8,
    p2_ies: u8,
    p2_ie: u8,
    p2_sel: u8,
    p2_ren: u8,
}

impl Gpio {
    pub fn new() -> Self {
        Gpio {
            p1_in: 0,
            p1_out: 0,
            p1_dir: 0,
            p1_ifg: 0,
            p1_ies: 0,
            p1_ie: 0,
            p1_sel: 0,
            p1_ren: 0,
            p2_in: 0,
            p2_out: 0,
            p2_dir: 0,
            p2_ifg: 0,
            p2_ies: 0,
            p2_ie: 0,
            p2_sel: 0,
            p2_ren: 0,
        }
    }

    /// Drive an external-pin-change event onto P1, as a test harness or a
    /// simulated peripheral stimulus would. Sets the pin's IFG bit only when
    /// the transition matches P1IES's selected edge (0 = low-to-high,
    /// 1 = high-to-low), same as the real port's edge-select logic. A
    /// direction-input pin with REN set and no driven level pulls to the
    /// level selected by P1OUT instead of floating.
    pub fn drive_p1_input(&mut self, bit: u8, level: bool) {
        let mask = 1 << bit;
        if self.p1_dir & mask != 0 {
            return;
        }
        let was = self.p1_in & mask != 0;
        if level {
            self.p1_in |= mask;
        } else {
            self.p1_in &= !mask;
        }
        let falling = self.p1_ies & mask != 0;
        let edge_matches = was != level && (falling == !level);
        if edge_matches {
            self.p1_ifg |= mask;
        }
    }

    /// Resolved input level of a P1 pin: the driven level if direction is
    /// input, or the REN-selected pull from P1OUT if it's configured as an
    /// input with its pull resistor enabled and nothing has driven it yet.
    pub fn p1_pin_level(&self, bit: u8) -> bool {
        let mask = 1 << bit;
        if self.p1_dir & mask != 0 {
            return self.p1_out & mask != 0;
        }
        if self.p1_ren & mask != 0 && self.p1_in & mask == 0 {
            return self.p1_out & mask != 0;
        }
        self.p1_in & mask != 0
    }
}

impl Default for Gpio {
    fn default() -> Self {
        Gpio::new()
    }
}

impl Peripheral for Gpio {
    fn contains(&self, addr: u32) -> bool {
        (BASE..BASE + 16).contains(&addr)
    }

    fn read(&mut self, addr: u32) -> u8 {
        match addr {
            P1IN => self.p1_in,
            P1OUT => self.p1_out,
            P1DIR => self.p1_dir,
            P1IFG => self.p1_ifg,
            P1IES => self.p1_ies,
            P1IE => self.p1_ie,
            P1SEL => self.p1_sel,
            P1REN => self.p1_ren,
            P2IN => self.p2_in,
            P2OUT => self.p2_out,
            P2DIR => self.p2_dir,
            P2IFG => self.p2_ifg,
            P2IES => self.p2_ies,
            P2IE => self.p2_ie,
            P2SEL => self.p2_sel,
            P2REN => self.p2_ren,
            _ => 0,
        }
    }

    fn write(&mut self, addr: u32, val: u8) {
        match addr {
            P1OUT => self.p1_out = val,
            P1DIR => self.p1_dir = val,
            P1IFG => self.p1_ifg = val,
            P1IES => self.p1_ies = val,
            P1IE => self.p1_ie = val,
            P1SEL => self.p1_sel = val,
            P1REN => self.p1_ren = val,
            P2OUT => self.p2_out = val,
            P2DIR => self.p2_dir = val,
            P2IFG => self.p2_ifg = val,
            P2IES => self.p2_ies = val,
            P2IE => self.p2_ie = val,
            P2SEL => self.p2_sel = val,
            P2REN => self.p2_ren = val,
            _ => {}
        }
    }

    fn tick(&mut self, _cycles: u64) -> bool {
        self.p1_ifg & self.p1_ie != 0
    }

    fn vector(&self) -> u32 {
        0xfff8
    }

    fn name(&self) -> &'static str {
        "gpio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_pin_rising_edge_sets_ifg_when_ies_selects_rising() {
        let mut gpio = Gpio::new();
        gpio.drive_p1_input(3, true);
        assert_eq!(gpio.read(P1IFG) & 0x08, 0x08);
    }

    #[test]
    fn rising_edge_does_not_set_ifg_when_ies_selects_falling() {
        let mut gpio = Gpio::new();
        gpio.write(P1IES, 0x08);
        gpio.drive_p1_input(3, true);
        assert_eq!(gpio.read(P1IFG) & 0x08, 0);
    }

    #[test]
    fn falling_edge_sets_ifg_when_ies_selects_falling() {
        let mut gpio = Gpio::new();
        gpio.drive_p1_input(3, true); // establish a high starting level
        gpio.write(P1IFG, 0); // clear the rising-edge flag just raised
        gpio.write(P1IES, 0x08);
        gpio.drive_p1_input(3, false);
        assert_eq!(gpio.read(P1IFG) & 0x08, 0x08);
    }

    #[test]
    fn ifg_only_fires_when_enabled() {
        let mut gpio = Gpio::new();
        gpio.drive_p1_input(0, true);
        assert!(!gpio.tick(1));
        gpio.write(P1IE, 0x01);
        assert!(gpio.tick(1));
    }

    #[test]
    fn output_pin_does_not_set_ifg() {
        let mut gpio = Gpio::new();
        gpio.write(P1DIR, 0xff);
        gpio.drive_p1_input(0, true);
        assert_eq!(gpio.read(P1IFG), 0);
    }

    #[test]
    fn ren_pulls_an_undriven_input_pin_to_out() {
        let mut gpio = Gpio::new();
        gpio.write(P1REN, 0x01);
        gpio.write(P1OUT, 0x01);
        assert!(gpio.p1_pin_level(0));
    }

    #[test]
    fn sel_register_is_independently_addressable_storage() {
        let mut gpio = Gpio::new();
        gpio.write(P1SEL, 0xaa);
        gpio.write(P2SEL, 0x55);
        assert_eq!(gpio.read(P1SEL), 0xaa);
        assert_eq!(gpio.read(P2SEL), 0x55);
    }
}
