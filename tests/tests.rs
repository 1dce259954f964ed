// Crate-level integration tests covering the scenarios exercised across
// decode, simulate, program and ingest, driven only through the public API
// the way an embedding command layer would use it.

use std::sync::atomic::Ordering;

use msp430_core::binfmt::{self, hexout, Chunk};
use msp430_core::decode::decode;
use msp430_core::device::{Breakpoint, Ctl, Device, RunStatus};
use msp430_core::fields::Operand;
use msp430_core::isa::{CoreVariant, Opcode};
use msp430_core::programmer::{Programmer, ProgrammerFlags};
use msp430_core::sim::Simulator;
use msp430_core::symbols::{MemTable, Symbols};

#[test]
fn decodes_mov_immediate_to_absolute_address() {
    // `MOV #0x1234, &0x5678` at offset 0x8000, encoded little-endian.
    let bytes = [0xB2, 0x40, 0x34, 0x12, 0x78, 0x56];
    let insn = decode(&bytes, 0x8000, bytes.len(), CoreVariant::Base).unwrap();
    assert_eq!(insn.opcode, Opcode::MOV);
    assert_eq!(insn.len, 6);
    assert_eq!(insn.src, Some(Operand::Immediate(0x1234)));
    assert_eq!(insn.dst, Some(Operand::Absolute(0x5678)));
}

#[test]
fn decodes_br_as_the_emulated_form_of_mov_to_pc() {
    let bytes = [0x30, 0x40, 0x00, 0x90];
    let insn = decode(&bytes, 0x8000, bytes.len(), CoreVariant::Base).unwrap();
    assert_eq!(insn.opcode, Opcode::BR);
    assert_eq!(insn.len, 4);
    assert_eq!(insn.dst, Some(Operand::Immediate(0x9000)));
}

#[test]
fn programmer_coalesces_two_adjacent_chunks_into_one_write_and_one_erase() {
    let mut sim = Simulator::new(CoreVariant::Base);
    sim.ctl(Ctl::Reset).unwrap();
    let mut prog = Programmer::new(ProgrammerFlags { erase: true, verify: true });

    prog.feed(&mut sim, Chunk { addr: 0x8000, data: vec![0x11, 0x22], section: None }).unwrap();
    prog.feed(&mut sim, Chunk { addr: 0x8002, data: vec![0x33, 0x44], section: None }).unwrap();
    prog.finish(&mut sim).unwrap();

    let stats = prog.stats();
    assert_eq!(stats.writes_issued, 1);
    assert_eq!(stats.erases_issued, 1);

    let mut readback = [0u8; 4];
    sim.read_mem(0x8000, &mut readback).unwrap();
    assert_eq!(readback, [0x11, 0x22, 0x33, 0x44]);
}

#[test]
fn intel_hex_round_trips_through_ingest_and_hexout() {
    let text = ":020000040001F9\n:0200000034127E\n:00000001FF\n";
    let mut symbols = MemTable::new();
    let mut chunks = Vec::new();
    binfmt::ingest(text.as_bytes(), &mut symbols, |c| {
        chunks.push(c);
        Ok(())
    })
    .unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].addr, 0x1_0000);
    assert_eq!(chunks[0].data, vec![0x34, 0x12]);

    let regenerated = hexout(&[(chunks[0].addr, chunks[0].data.clone())]);

    let mut reingested = Vec::new();
    binfmt::ingest(regenerated.as_bytes(), &mut symbols, |c| {
        reingested.push(c);
        Ok(())
    })
    .unwrap();
    assert_eq!(reingested.len(), 1);
    assert_eq!(reingested[0].addr, chunks[0].addr);
    assert_eq!(reingested[0].data, chunks[0].data);
}

/// A `JMP $` self-loop at 0x8002, reached from a reset vector at 0x8000,
/// never halts on its own — only the cancellation flag stops `poll`.
#[test]
fn simulator_runs_to_a_self_loop_and_only_stops_on_cancellation() {
    // 0x8000: NOP (MOV #0, R3 folds to NOP). 0x8002: JMP $ (self-loop).
    let bytes = [0x03, 0x43, 0xFF, 0x3F];
    let mut sim = Simulator::new(CoreVariant::Base);
    sim.memory_mut().load(0x8000, &bytes);
    sim.memory_mut().load(0xfffe, &0x8000u16.to_le_bytes());
    sim.ctl(Ctl::Reset).unwrap();

    sim.ctl(Ctl::Run).unwrap();
    let cancel = sim.cancel_handle();
    cancel.store(true, Ordering::Relaxed);
    let status = sim.poll().unwrap();
    assert_eq!(status, RunStatus::Interrupted);

    // The self-loop never advances PC past the JMP instruction itself.
    let regs = sim.get_regs().unwrap();
    assert_eq!(regs[0], 0x8002);
}

/// A code breakpoint halts `poll` with PC at the breakpoint address (not
/// past it); a second `Run` silently steps over it before resuming so the
/// loop can re-break on its next iteration.
#[test]
fn code_breakpoint_halts_exactly_at_its_address_and_steps_over_on_rerun() {
    // 0x8000: NOP. 0x8002: NOP (breakpoint here). 0x8004: JMP back to 0x8000.
    let bytes = [0x03, 0x43, 0x03, 0x43, 0xFD, 0x3F];
    let mut sim = Simulator::new(CoreVariant::Base);
    sim.memory_mut().load(0x8000, &bytes);
    sim.memory_mut().load(0xfffe, &0x8000u16.to_le_bytes());
    sim.ctl(Ctl::Reset).unwrap();

    sim.set_breakpoint(0, Some(Breakpoint::exact(0x8002))).unwrap();
    sim.ctl(Ctl::Run).unwrap();
    let status = sim.poll().unwrap();
    assert_eq!(status, RunStatus::Halted);
    assert_eq!(sim.get_regs().unwrap()[0], 0x8002);

    // Resuming steps silently past the breakpoint instead of retrapping
    // immediately, then loops all the way back around to it again.
    sim.ctl(Ctl::Run).unwrap();
    let status = sim.poll().unwrap();
    assert_eq!(status, RunStatus::Halted);
    assert_eq!(sim.get_regs().unwrap()[0], 0x8002);
}

#[test]
fn elf_symbols_surface_through_the_shared_symbols_contract() {
    let mut symbols = MemTable::new();
    symbols.define("main", 0x8000);
    assert_eq!(symbols.resolve("main"), Some(0x8000));
    assert_eq!(symbols.lookup(0x8000), Some("main"));
}
