// Binary-image ingest: detect one of four object-file
// formats and extract it into a uniform `Chunk{addr, data, section}`
// stream. Each format lives in its own submodule; this module only owns
// format sniffing, the shared `Chunk` type, and the `hexout` operation
// that runs the pipeline in reverse for Intel HEX.

pub mod elf;
pub mod ihex;
pub mod srecord;
pub mod ti_txt;

use crate::error::BinfileError;
use crate::symbols::Symbols;

/// One contiguous run of bytes recovered from an image file, tagged with
/// the section name it came from when the format carries one (ELF32; the
/// other three formats leave it `None`). Chunks may be any length and a
/// parser may emit them in any order — the programmer (`programmer.rs`) is
/// what imposes the ordering a `Device` needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub addr: u32,
    pub data: Vec<u8>,
    pub section: Option<String>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Format {
    Elf32,
    IntelHex,
    TiText,
    SRecord,
}

/// Sniff a format from the first few bytes of a file. Returns `None` for anything that matches none of the four.
pub fn sniff(bytes: &[u8]) -> Option<Format> {
    if bytes.len() >= 5 && bytes[0..4] == [0x7f, 0x45, 0x4c, 0x46] && bytes[4] == 1 {
        return Some(Format::Elf32);
    }
    match bytes.first() {
        Some(b':') => Some(Format::IntelHex),
        Some(b'@') => Some(Format::TiText),
        Some(b'S') => Some(Format::SRecord),
        _ => None,
    }
}

/// Sniff `bytes` and run the matching parser, feeding every emitted
/// `Chunk` to `on_chunk` and every discovered symbol (ELF32 only) to
/// `symbols`. This is the single entry point the command layer and the
/// programmer are expected to call; nothing else in this crate re-detects
/// formats independently.
pub fn ingest(
    bytes: &[u8],
    symbols: &mut dyn Symbols,
    mut on_chunk: impl FnMut(Chunk) -> Result<(), BinfileError>,
) -> Result<(), BinfileError> {
    match sniff(bytes) {
        Some(Format::Elf32) => elf::parse(bytes, symbols, &mut on_chunk),
        Some(Format::IntelHex) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| BinfileError::Parse { file: "<hex>".to_string(), line: 0, message: e.to_string() })?;
            ihex::parse(text, &mut on_chunk)
        }
        Some(Format::TiText) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| BinfileError::Parse { file: "<ti-txt>".to_string(), line: 0, message: e.to_string() })?;
            ti_txt::parse(text, &mut on_chunk)
        }
        Some(Format::SRecord) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| BinfileError::Parse { file: "<srec>".to_string(), line: 0, message: e.to_string() })?;
            srecord::parse(text, &mut on_chunk)
        }
        None => Err(BinfileError::Parse { file: "<input>".to_string(), line: 0, message: "unrecognized image format".to_string() }),
    }
}

/// Produce Intel HEX text for `(addr, bytes)` pairs: 32-byte data records, an Extended Linear Address record
/// whenever the 64 KiB window changes, terminated by `:00000001FF`.
pub fn hexout(regions: &[(u32, Vec<u8>)]) -> String {
    const RECORD_LEN: usize = 32;
    let mut records = Vec::new();
    let mut last_base: Option<u32> = None;
    for (addr, data) in regions {
        for (i, chunk) in data.chunks(RECORD_LEN).enumerate() {
            let chunk_addr = addr.wrapping_add((i * RECORD_LEN) as u32);
            let base = chunk_addr & 0xffff_0000;
            if last_base != Some(base) {
                records.push(::ihex::Record::ExtendedLinearAddress((base >> 16) as u16));
                last_base = Some(base);
            }
            records.push(::ihex::Record::Data { offset: (chunk_addr & 0xffff) as u16, value: chunk.to_vec() });
        }
    }
    records.push(::ihex::Record::EndOfFile);
    ::ihex::create_object_file_representation(&records).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_each_format_by_leading_bytes() {
        assert_eq!(sniff(&[0x7f, 0x45, 0x4c, 0x46, 0x01, 0x02]), Some(Format::Elf32));
        assert_eq!(sniff(b":10000000"), Some(Format::IntelHex));
        assert_eq!(sniff(b"@8000"), Some(Format::TiText));
        assert_eq!(sniff(b"S1130000"), Some(Format::SRecord));
        assert_eq!(sniff(b"garbage"), None);
    }

    #[test]
    fn hexout_emits_a_linear_address_record_once_per_64k_window() {
        let text = hexout(&[(0x1_0010, vec![1, 2, 3, 4])]);
        assert!(text.contains(":02000004"));
        assert!(text.ends_with(":00000001FF\n") || text.trim_end().ends_with(":00000001FF"));
    }
}
