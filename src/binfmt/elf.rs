// ELF32 ingest. Parsing itself is delegated to `goblin`; this module owns
// the policy on top of it: which sections become `Chunk`s, the `e_machine`
// check, and feeding `SYMTAB` entries to the `Symbols` collaborator.

use goblin::elf::section_header::{SHF_ALLOC, SHT_PROGBITS};
use goblin::elf::Elf;

use super::Chunk;
use crate::error::BinfileError;
use crate::symbols::Symbols;

/// The vendor's registered ELF machine number.
const E_MACHINE: u16 = 105;

fn parse_err(message: impl Into<String>) -> BinfileError {
    BinfileError::Parse { file: "<elf>".to_string(), line: 0, message: message.into() }
}

pub fn parse(
    bytes: &[u8],
    symbols: &mut dyn Symbols,
    on_chunk: &mut dyn FnMut(Chunk) -> Result<(), BinfileError>,
) -> Result<(), BinfileError> {
    let elf = Elf::parse(bytes).map_err(|e| parse_err(e.to_string()))?;
    if elf.header.e_machine != E_MACHINE {
        return Err(parse_err(format!(
            "unexpected e_machine {} (expected {E_MACHINE})",
            elf.header.e_machine
        )));
    }

    for sh in &elf.section_headers {
        if sh.sh_type != SHT_PROGBITS {
            continue;
        }
        if sh.sh_flags as u32 & SHF_ALLOC == 0 {
            continue;
        }
        if sh.sh_size == 0 {
            log::warn!("elf32: skipping zero-length section");
            continue;
        }
        let name = elf.shdr_strtab.get_at(sh.sh_name).map(|s| s.to_string());
        let start = sh.sh_offset as usize;
        let end = start
            .checked_add(sh.sh_size as usize)
            .ok_or_else(|| parse_err("section size overflows file offset"))?;
        let data = bytes
            .get(start..end)
            .ok_or_else(|| parse_err(format!("section '{:?}' extends past end of file", name)))?
            .to_vec();
        on_chunk(Chunk { addr: sh.sh_addr as u32, data, section: name })?;
    }

    for sym in elf.syms.iter() {
        if sym.st_name == 0 {
            continue; // unnamed symbol, e.g. a section symbol; nothing to define.
        }
        let name = elf
            .strtab
            .get_at(sym.st_name)
            .ok_or_else(|| parse_err("symbol name index overflows the string table"))?;
        symbols.define(name, sym.st_value as u32);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::MemTable;

    #[test]
    fn rejects_non_matching_machine_type() {
        // Not a real ELF file; goblin's own parse error is expected to
        // surface before the machine check does, which is fine — both are
        // `BinfileError::Parse`.
        let mut syms = MemTable::new();
        let result = parse(b"not an elf file at all", &mut syms, &mut |_| Ok(()));
        assert!(result.is_err());
    }
}
