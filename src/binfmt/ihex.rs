// Intel HEX ingest. Record (de)serialization and per-line
// checksum verification are delegated to the `ihex` crate; this module owns
// the parts the crate doesn't know about: tracking the segment/linear base
// across records and turning each `Data` record into a `Chunk` at its
// fully-resolved 32-bit address.

use ihex::{Reader, Record};

use super::Chunk;
use crate::error::BinfileError;

/// Parse Intel HEX `text`, feeding one `Chunk` per `Data` record. Record
/// type 02 (`ExtendedSegmentAddress`) sets a 16-byte-granular segment base;
/// type 04 (`ExtendedLinearAddress`) sets a 64 KiB linear base.
/// Start-address records (03/05) carry no information this crate uses and
/// are logged as a skippable event rather than treated as an error.
pub fn parse(text: &str, on_chunk: &mut dyn FnMut(Chunk) -> Result<(), BinfileError>) -> Result<(), BinfileError> {
    let mut base: u32 = 0;
    for (line_no, record) in Reader::new(text).enumerate() {
        let record = record.map_err(|e| BinfileError::Parse {
            file: "<hex>".to_string(),
            line: line_no + 1,
            message: e.to_string(),
        })?;
        match record {
            Record::Data { offset, value } => {
                on_chunk(Chunk { addr: base.wrapping_add(offset as u32), data: value, section: None })?;
            }
            Record::EndOfFile => break,
            Record::ExtendedSegmentAddress(seg) => base = (seg as u32) << 4,
            Record::ExtendedLinearAddress(hi) => base = (hi as u32) << 16,
            Record::StartSegmentAddress { .. } | Record::StartLinearAddress(_) => {
                log::warn!("ihex: ignoring unsupported start-address record at line {}", line_no + 1);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_records_resolve_against_the_linear_base() {
        let text = ":020000040001F9\n:0200000034127E\n:00000001FF\n";
        let mut chunks = Vec::new();
        parse(text, &mut |c| {
            chunks.push(c);
            Ok(())
        })
        .unwrap();
        assert_eq!(chunks, vec![Chunk { addr: 0x1_0000, data: vec![0x34, 0x12], section: None }]);
    }

    #[test]
    fn segment_base_is_scaled_by_sixteen() {
        let text = ":020000021000EC\n:02000000CAFE24\n:00000001FF\n";
        let mut chunks = Vec::new();
        parse(text, &mut |c| {
            chunks.push(c);
            Ok(())
        })
        .unwrap();
        assert_eq!(chunks[0].addr, 0x1000 * 16);
    }

    #[test]
    fn bad_checksum_is_a_parse_error() {
        let text = ":0200000034127F\n:00000001FF\n"; // wrong checksum byte
        let result = parse(text, &mut |_| Ok(()));
        assert!(result.is_err());
    }
}
