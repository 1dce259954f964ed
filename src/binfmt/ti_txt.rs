// TI-TXT ingest: `@hhhh` address lines followed by
// whitespace-separated hex byte lines, optionally terminated by a bare
// `q`. There is no checksum in this format; the only failure modes are a
// malformed address/byte token or data appearing before the first `@`
// line.

use super::Chunk;
use crate::error::BinfileError;

pub fn parse(text: &str, on_chunk: &mut dyn FnMut(Chunk) -> Result<(), BinfileError>) -> Result<(), BinfileError> {
    let mut run_start: Option<u32> = None;
    let mut buf: Vec<u8> = Vec::new();

    let flush = |run_start: &mut Option<u32>, buf: &mut Vec<u8>, on_chunk: &mut dyn FnMut(Chunk) -> Result<(), BinfileError>| {
        if let Some(addr) = run_start.take() {
            if !buf.is_empty() {
                return on_chunk(Chunk { addr, data: std::mem::take(buf), section: None });
            }
        }
        Ok(())
    };

    for (line_no, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("q") {
            break;
        }
        if let Some(hex) = line.strip_prefix('@') {
            flush(&mut run_start, &mut buf, on_chunk)?;
            let addr = u32::from_str_radix(hex.trim(), 16).map_err(|e| BinfileError::Parse {
                file: "<ti-txt>".to_string(),
                line: line_no + 1,
                message: format!("bad address '{hex}': {e}"),
            })?;
            run_start = Some(addr);
            continue;
        }
        if run_start.is_none() {
            return Err(BinfileError::Parse {
                file: "<ti-txt>".to_string(),
                line: line_no + 1,
                message: "data bytes before the first @address line".to_string(),
            });
        }
        for tok in line.split_whitespace() {
            let byte = u8::from_str_radix(tok, 16).map_err(|e| BinfileError::Parse {
                file: "<ti-txt>".to_string(),
                line: line_no + 1,
                message: format!("bad byte '{tok}': {e}"),
            })?;
            buf.push(byte);
        }
    }
    flush(&mut run_start, &mut buf, on_chunk)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_runs_and_stops_at_q() {
        let text = "@8000\n31 40 00 90\n@9000\nFF 3F\nq\n@a000\n01\n";
        let mut chunks = Vec::new();
        parse(text, &mut |c| {
            chunks.push(c);
            Ok(())
        })
        .unwrap();
        assert_eq!(
            chunks,
            vec![
                Chunk { addr: 0x8000, data: vec![0x31, 0x40, 0x00, 0x90], section: None },
                Chunk { addr: 0x9000, data: vec![0xff, 0x3f], section: None },
            ]
        );
    }

    #[test]
    fn data_before_any_address_line_is_an_error() {
        let text = "31 40\n@8000\n00 90\n";
        assert!(parse(text, &mut |_| Ok(())).is_err());
    }
}
