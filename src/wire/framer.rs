//! Lexer/Framer: reassembles one complete IMAP response packet from a
//! line-oriented transport, honoring synchronizing literals.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Read one complete response packet: a line, plus — for every line
/// ending in a synchronizing literal marker `{N}\r\n` — exactly `N`
/// further raw bytes followed by the continuation line, repeated
/// until a terminating line carries no further literal marker.
///
/// # Errors
///
/// Returns an `UnexpectedEof` io error if the transport closes before
/// a complete packet (including a promised literal) has been read.
pub async fn read_packet<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut packet = Vec::new();
    loop {
        let mut line = Vec::new();
        let n = reader.read_until(b'\n', &mut line).await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "transport closed while reading a response packet",
            ));
        }
        packet.extend_from_slice(&line);

        match literal_len(&line) {
            LiteralMarker::None => break,
            LiteralMarker::Malformed => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "literal length prefix is not a base-10 integer",
                ));
            }
            LiteralMarker::Bytes(n) => {
                let mut buf = vec![0u8; n];
                reader.read_exact(&mut buf).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::UnexpectedEof {
                        std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            "transport closed mid-literal",
                        )
                    } else {
                        e
                    }
                })?;
                packet.extend_from_slice(&buf);
            }
        }
    }
    Ok(packet)
}

enum LiteralMarker {
    None,
    Bytes(usize),
    Malformed,
}

/// Detect a trailing `{N}\r\n` (or `{N}\n`) literal marker on a
/// just-read line. `N` is a byte count, not a character count — a
/// deliberate correction of source behavior this crate's design notes
/// call out explicitly.
fn literal_len(line: &[u8]) -> LiteralMarker {
    let trimmed = line
        .strip_suffix(b"\r\n")
        .or_else(|| line.strip_suffix(b"\n"))
        .unwrap_or(line);
    let Some(open) = trimmed.iter().rposition(|&b| b == b'{') else {
        return LiteralMarker::None;
    };
    let Some(b'}') = trimmed.last().copied() else {
        return LiteralMarker::None;
    };
    let digits = &trimmed[open + 1..trimmed.len() - 1];
    if digits.is_empty() {
        return LiteralMarker::None;
    }
    if !digits.iter().all(u8::is_ascii_digit) {
        return LiteralMarker::Malformed;
    }
    match std::str::from_utf8(digits).unwrap_or_default().parse::<usize>() {
        Ok(n) => LiteralMarker::Bytes(n),
        Err(_) => LiteralMarker::Malformed,
    }
}
