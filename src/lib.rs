//! Host-side core for a JTAG/Spy-Bi-Wire debugging and programming toolkit
//! for a 16/20-bit microcontroller family: instruction decoder and
//! disassembler, cycle-accurate functional simulator, the polymorphic
//! `Device` back-end contract shared by the simulator and a JTAG driver,
//! binary-image ingest for four object-file formats, and the programmer
//! built on top of it.
//!
//! The full command parser/reader loop, terminal coloring beyond the
//! disassembler's own ANSI escapes, the GDB remote serial protocol server,
//! and production USB/serial transport drivers live outside this crate;
//! `src/main.rs` wires just enough of the pieces below together to exercise
//! the core end to end.

pub mod binfmt;
pub mod decode;
pub mod device;
pub mod disasm;
pub mod error;
pub mod fields;
pub mod isa;
pub mod jtag;
pub mod programmer;
pub mod sim;
pub mod symbols;
pub mod tap;
pub mod transport;

pub use device::Device;
pub use error::Error;
pub use fields::DecodedInstruction;
