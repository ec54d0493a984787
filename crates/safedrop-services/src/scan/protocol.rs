//! clamd INSTREAM wire format.
//!
//! Command `nINSTREAM\n`, then frames of `u32` big-endian length followed by
//! that many bytes, closed by a zero-length frame. The daemon answers with a
//! single newline-terminated line.

use super::ScanResult;
use std::io::{self, BufRead, Read, Write};

pub const INSTREAM_COMMAND: &[u8] = b"nINSTREAM\n";
pub const PING_COMMAND: &[u8] = b"nPING\n";
pub const PONG_REPLY: &str = "PONG";

/// Upper bound on a reply line; clamd replies are short.
const MAX_REPLY_LEN: u64 = 4096;

/// Stream `reader` to `writer` as INSTREAM frames and write the terminator.
///
/// Returns the number of payload bytes sent.
pub fn write_instream<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
) -> io::Result<u64> {
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;

    writer.write_all(INSTREAM_COMMAND)?;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let len = u32::try_from(n)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "chunk exceeds u32"))?;
        writer.write_all(&len.to_be_bytes())?;
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
    writer.write_all(&0u32.to_be_bytes())?;
    writer.flush()?;

    Ok(total)
}

/// Read one reply line, stripping the trailing newline and any NUL padding.
pub fn read_reply<R: BufRead>(reader: R) -> io::Result<String> {
    let mut raw = Vec::new();
    reader.take(MAX_REPLY_LEN).read_until(b'\n', &mut raw)?;
    let line = String::from_utf8_lossy(&raw);
    Ok(line
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string())
}

/// Interpret a scan reply line.
///
/// `stream: OK` is clean, `stream: <name> FOUND` is infected with `<name>`,
/// anything else is an unknown outcome carrying the raw line.
pub fn parse_response(line: &str) -> ScanResult {
    let line = line.trim_matches(|c: char| c == '\0' || c.is_whitespace());

    if line.ends_with(": OK") {
        return ScanResult::Clean;
    }

    if let Some(rest) = line.strip_suffix(" FOUND") {
        if let Some((_, signature)) = rest.split_once(": ") {
            let signature = signature.trim();
            if !signature.is_empty() {
                return ScanResult::Infected(signature.to_string());
            }
        }
    }

    ScanResult::Unknown(format!("unexpected response: {}", line))
}
