// Peripheral bus. Each peripheral claims a fixed address range
// and is ticked once per simulated cycle; `Bus` just dispatches reads,
// writes and ticks to whichever peripheral (if any) owns an address.

pub mod console;
pub mod gpio;
pub mod hwmult;
pub mod timer;
pub mod tracer;
pub mod watchdog;

use tracer::{TraceEvent, Tracer};

/// One memory-mapped peripheral. `tick` advances internal state (timers
/// counting, watchdog counting down) independently of whether the CPU
/// touches the peripheral's registers that cycle.
pub trait Peripheral {
    fn contains(&self, addr: u32) -> bool;
    fn read(&mut self, addr: u32) -> u8;
    fn write(&mut self, addr: u32, val: u8);
    /// Returns `true` if this tick should raise an interrupt request.
    fn tick(&mut self, cycles: u64) -> bool;
    /// Interrupt vector address to push when this peripheral's tick raised
    /// a request.
    fn vector(&self) -> u32;
    fn name(&self) -> &'static str;
    /// Whether the request this peripheral just raised bypasses the GIE
    /// gate (spec §4.5: "either `GIE` is set or the interrupt is
    /// non-maskable"). Only the watchdog's NMI mode overrides the default.
    fn non_maskable(&self) -> bool {
        false
    }
    /// Consume and report a pending request for a full device reset (the
    /// watchdog's RST half, asserted on timer-mode expiry). Defaults to
    /// false; only the watchdog overrides it.
    fn take_reset_request(&mut self) -> bool {
        false
    }
}

pub struct Bus {
    peripherals: Vec<Box<dyn Peripheral>>,
    console_out: std::rc::Rc<std::cell::RefCell<Vec<u8>>>,
    /// The tracer never claims an address (see `tracer::Tracer::contains`),
    /// so it lives outside `peripherals` and is driven directly by `Memory`
    /// on every access plus by `Bus::tick` for its clock counters.
    tracer: Tracer,
}

impl Bus {
    pub fn new() -> Self {
        let console_out = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        Bus {
            peripherals: vec![
                Box::new(gpio::Gpio::new()),
                Box::new(watchdog::Watchdog::new()),
                Box::new(hwmult::HwMult::new()),
                Box::new(timer::TimerA::new()),
                Box::new(console::Console::new(console_out.clone())),
            ],
            console_out,
            tracer: Tracer::default(),
        }
    }

    /// Bytes the simulated console has emitted so far.
    pub fn console_output(&self) -> std::cell::Ref<'_, Vec<u8>> {
        self.console_out.borrow()
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn tracer_mut(&mut self) -> &mut Tracer {
        &mut self.tracer
    }

    pub fn read(&mut self, addr: u32) -> u8 {
        self.tracer.record(TraceEvent::Read8 { addr });
        for p in &mut self.peripherals {
            if p.contains(addr) {
                return p.read(addr);
            }
        }
        0
    }

    pub fn write(&mut self, addr: u32, val: u8) {
        self.tracer.record(TraceEvent::Write8 { addr, val });
        for p in &mut self.peripherals {
            if p.contains(addr) {
                p.write(addr, val);
                return;
            }
        }
    }

    /// Advance every peripheral (and the tracer's clock counters) by
    /// `cycles`, returning the vector of the first one that asserted an
    /// interrupt request, along with whether that request is non-maskable.
    pub fn tick(&mut self, cycles: u64) -> Option<(u32, bool)> {
        let mut pending = None;
        if self.tracer.tick(cycles) {
            pending = Some((self.tracer.vector(), false));
        }
        for _ in 0..cycles {
            for p in &mut self.peripherals {
                if p.tick(1) && pending.is_none() {
                    pending = Some((p.vector(), p.non_maskable()));
                }
            }
        }
        pending
    }

    /// Whether any peripheral is asserting a PUC-style reset request since
    /// the last call (watchdog timer-mode expiry). Consumes every
    /// peripheral's request rather than short-circuiting, so an unrelated
    /// peripheral's pending flag is never left stale behind the watchdog's.
    pub fn take_reset_request(&mut self) -> bool {
        let mut any = false;
        for p in &mut self.peripherals {
            if p.take_reset_request() {
                any = true;
            }
        }
        any
    }
}

impl Default for Bus {
    fn default() -> Self {
        Bus::new()
    }
}
