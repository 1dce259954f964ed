// The programmer: buffers an arbitrary-order `Chunk`
// stream, coalesces contiguous runs, issues a mass erase before the first
// write, and flushes in device-sized blocks through the `Device` contract.

use crate::binfmt::Chunk;
use crate::device::{Ctl, Device, EraseKind};
use crate::error::DeviceError;

/// Flush threshold: `PROG_BUFSIZE`.
pub const PROG_BUFSIZE: usize = 4096;

#[derive(Debug, Clone, Copy, Default)]
pub struct ProgrammerFlags {
    pub erase: bool,
    pub verify: bool,
}

/// Running totals a caller can use to report progress. Every flush updates
/// them so a command layer can show "N bytes written, M verified" without
/// re-deriving it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgrammerStats {
    pub bytes_written: u64,
    pub writes_issued: u64,
    pub erases_issued: u64,
}

/// Programmer session state. The invariant the
/// spec calls out — `pending_buf` non-empty implies it is a contiguous run
/// starting at `pending_addr` — is maintained entirely by `feed`/`flush`
/// below; nothing else in this struct is ever mutated directly.
pub struct Programmer {
    pending_buf: Vec<u8>,
    pending_addr: u32,
    pending_section: Option<String>,
    have_erased: bool,
    flags: ProgrammerFlags,
    stats: ProgrammerStats,
}

impl Programmer {
    pub fn new(flags: ProgrammerFlags) -> Self {
        Programmer {
            pending_buf: Vec::new(),
            pending_addr: 0,
            pending_section: None,
            have_erased: false,
            flags,
            stats: ProgrammerStats::default(),
        }
    }

    pub fn stats(&self) -> ProgrammerStats {
        self.stats
    }

    /// Accept one chunk, in any order relative to others. May trigger a flush if the chunk does not extend the pending
    /// run, or several flushes if appending it crosses `PROG_BUFSIZE`.
    pub fn feed<D: Device>(&mut self, dev: &mut D, chunk: Chunk) -> Result<(), DeviceError> {
        let contiguous = !self.pending_buf.is_empty()
            && self.pending_addr.wrapping_add(self.pending_buf.len() as u32) == chunk.addr
            && self.pending_section == chunk.section;
        if !self.pending_buf.is_empty() && !contiguous {
            self.flush(dev)?;
        }
        if self.pending_buf.is_empty() {
            self.pending_addr = chunk.addr;
            self.pending_section = chunk.section;
        }

        let mut rest = &chunk.data[..];
        while !rest.is_empty() {
            let room = PROG_BUFSIZE - self.pending_buf.len();
            let take = room.min(rest.len());
            self.pending_buf.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.pending_buf.len() == PROG_BUFSIZE {
                self.flush(dev)?;
                if !rest.is_empty() {
                    self.pending_addr = chunk.addr + (chunk.data.len() - rest.len()) as u32;
                    self.pending_section = chunk.section.clone();
                }
            }
        }
        Ok(())
    }

    /// Flush the pending run: erase once if requested,
    /// write, optionally verify, then clear the buffer.
    pub fn flush<D: Device>(&mut self, dev: &mut D) -> Result<(), DeviceError> {
        if self.pending_buf.is_empty() {
            return Ok(());
        }
        if self.flags.erase && !self.have_erased {
            dev.erase(EraseKind::Main, 0)?;
            self.have_erased = true;
            self.stats.erases_issued += 1;
        }
        dev.write_mem(self.pending_addr, &self.pending_buf)?;
        self.stats.writes_issued += 1;
        self.stats.bytes_written += self.pending_buf.len() as u64;

        if self.flags.verify {
            let mut readback = vec![0u8; self.pending_buf.len()];
            dev.read_mem(self.pending_addr, &mut readback)?;
            if readback != self.pending_buf {
                return Err(DeviceError::ReadbackMismatch { addr: self.pending_addr });
            }
        }

        self.pending_buf.clear();
        self.pending_section = None;
        Ok(())
    }

    /// Final flush plus a device reset.
    pub fn finish<D: Device>(&mut self, dev: &mut D) -> Result<(), DeviceError> {
        self.flush(dev)?;
        dev.ctl(Ctl::Reset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::CoreVariant;
    use crate::sim::Simulator;

    fn booted() -> Simulator {
        let mut sim = Simulator::new(CoreVariant::Base);
        sim.ctl(Ctl::Reset).unwrap();
        sim
    }

    #[test]
    fn adjacent_chunks_coalesce_into_a_single_write() {
        let mut sim = booted();
        let mut prog = Programmer::new(ProgrammerFlags { erase: true, verify: false });
        prog.feed(&mut sim, Chunk { addr: 0x8000, data: vec![0x11, 0x22], section: None }).unwrap();
        prog.feed(&mut sim, Chunk { addr: 0x8002, data: vec![0x33, 0x44], section: None }).unwrap();
        prog.finish(&mut sim).unwrap();

        let stats = prog.stats();
        assert_eq!(stats.writes_issued, 1);
        assert_eq!(stats.erases_issued, 1);
        let mut out = [0u8; 4];
        sim.read_mem(0x8000, &mut out).unwrap();
        assert_eq!(out, [0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn non_contiguous_chunk_forces_a_flush_first() {
        let mut sim = booted();
        let mut prog = Programmer::new(ProgrammerFlags { erase: false, verify: false });
        prog.feed(&mut sim, Chunk { addr: 0x8000, data: vec![1, 2], section: None }).unwrap();
        prog.feed(&mut sim, Chunk { addr: 0x9000, data: vec![3, 4], section: None }).unwrap();
        prog.finish(&mut sim).unwrap();
        assert_eq!(prog.stats().writes_issued, 2);
    }

    #[test]
    fn erase_happens_exactly_once_across_many_flushes() {
        let mut sim = booted();
        let mut prog = Programmer::new(ProgrammerFlags { erase: true, verify: false });
        for i in 0..5u32 {
            prog.feed(&mut sim, Chunk { addr: 0x8000 + i * 0x1000, data: vec![i as u8], section: None }).unwrap();
        }
        prog.finish(&mut sim).unwrap();
        assert_eq!(prog.stats().erases_issued, 1);
    }

    #[test]
    fn a_run_spanning_exactly_one_bufsize_flushes_once() {
        let mut sim = booted();
        let mut prog = Programmer::new(ProgrammerFlags { erase: false, verify: true });
        let data = vec![0xab; PROG_BUFSIZE];
        prog.feed(&mut sim, Chunk { addr: 0x8000, data, section: None }).unwrap();
        prog.finish(&mut sim).unwrap();
        assert_eq!(prog.stats().writes_issued, 1);
        assert_eq!(prog.stats().bytes_written, PROG_BUFSIZE as u64);
    }

    #[test]
    fn a_run_one_byte_over_bufsize_issues_two_writes() {
        let mut sim = booted();
        let mut prog = Programmer::new(ProgrammerFlags { erase: false, verify: false });
        let data = vec![0xcd; PROG_BUFSIZE + 1];
        prog.feed(&mut sim, Chunk { addr: 0x8000, data, section: None }).unwrap();
        prog.finish(&mut sim).unwrap();
        assert_eq!(prog.stats().writes_issued, 2);
    }
}
