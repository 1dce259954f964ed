// Demo binary: just enough command-line plumbing to prove the core links
// and runs end to end. Loads an object file into the
// simulator through the same `binfmt`/`programmer` pipeline a real JTAG
// back-end would use, then either disassembles it or runs it to
// completion, printing through `log` rather than `println!`.

use std::path::PathBuf;

use log::{error, info, LevelFilter};
use simplelog::{Config as LogConfig, TermLogger, TerminalMode};
use structopt::StructOpt;

use msp430_core::binfmt;
use msp430_core::device::{run_to_halt, Ctl, Device, RunStatus};
use msp430_core::disasm::scan;
use msp430_core::error::Error;
use msp430_core::isa::CoreVariant;
use msp430_core::programmer::{Programmer, ProgrammerFlags};
use msp430_core::sim::Simulator;
use msp430_core::symbols::{MemTable, Symbols};

#[derive(Debug, StructOpt)]
#[structopt(name = "msp430-demo", about = "Exercises the decoder/simulator/programmer core")]
struct Options {
    #[structopt(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: LevelFilter,

    #[structopt(long)]
    extended_core: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Disassemble every byte of an object file, scanning past undecodable
    /// words with a `???` placeholder.
    Disasm { file: PathBuf },
    /// Program an object file into the simulator and run it to either a
    /// breakpoint or a self-loop.
    Run {
        file: PathBuf,
        /// Halt the run after this many poll cycles even if the CPU has
        /// not halted itself (each cycle covers up to ~10^6 instructions).
        #[structopt(long, default_value = "10")]
        max_polls: u32,
    },
}

fn variant(opts: &Options) -> CoreVariant {
    if opts.extended_core {
        CoreVariant::Extended
    } else {
        CoreVariant::Base
    }
}

fn load_chunks(bytes: &[u8], symbols: &mut dyn Symbols) -> Result<Vec<binfmt::Chunk>, Error> {
    let mut chunks = Vec::new();
    binfmt::ingest(bytes, symbols, |c| {
        chunks.push(c);
        Ok(())
    })?;
    Ok(chunks)
}

fn run_disasm(opts: &Options, file: &PathBuf) -> Result<(), Error> {
    let bytes = std::fs::read(file).map_err(msp430_core::error::BinfileError::from)?;
    let mut symbols = MemTable::new();
    let chunks = load_chunks(&bytes, &mut symbols)?;
    for chunk in chunks {
        info!("; section {:?} @ {:#06x}", chunk.section, chunk.addr);
        for entry in scan(&chunk.data, chunk.addr, variant(opts)) {
            let text = msp430_core::disasm::format_entry(&entry, &symbols, false);
            info!("{:#06x}\t{}", entry.offset(), text);
        }
    }
    Ok(())
}

fn run_program(opts: &Options, file: &PathBuf, max_polls: u32) -> Result<(), Error> {
    let bytes = std::fs::read(file).map_err(msp430_core::error::BinfileError::from)?;
    let mut symbols = MemTable::new();
    let chunks = load_chunks(&bytes, &mut symbols)?;

    let mut sim = Simulator::new(variant(opts));
    sim.ctl(Ctl::Reset)?;
    let mut prog = Programmer::new(ProgrammerFlags { erase: false, verify: true });
    for chunk in chunks {
        prog.feed(&mut sim, chunk)?;
    }
    prog.finish(&mut sim)?;

    info!("programmed {} bytes across {} writes", prog.stats().bytes_written, prog.stats().writes_issued);

    let mut status = RunStatus::Running;
    for _ in 0..max_polls {
        status = run_to_halt(&mut sim)?;
        match status {
            RunStatus::Halted => break,
            RunStatus::Interrupted => continue,
            RunStatus::Error => {
                error!("simulator hit a decode error while running");
                break;
            }
            RunStatus::Running => unreachable!("run_to_halt only returns once the device has left Running"),
        }
    }
    if status == RunStatus::Interrupted {
        info!("stopped after {max_polls} interrupted run(s) without halting");
    }

    let regs = sim.get_regs()?;
    info!("final PC = {:#06x}, SP = {:#06x}, SR = {:#06x}", regs[0], regs[1], regs[2]);
    Ok(())
}

fn main() {
    let opts = Options::from_args();
    let _ = TermLogger::init(opts.log_level, LogConfig::default(), TerminalMode::Mixed);

    let result = match &opts.command {
        Command::Disasm { file } => run_disasm(&opts, file),
        Command::Run { file, max_polls } => run_program(&opts, file, *max_polls),
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}
