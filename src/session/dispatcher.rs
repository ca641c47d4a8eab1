//! Command dispatcher: tag allocation, astring quoting, and writing
//! the serialized command to the transport.

use crate::error::{Error, Result};
use crate::session::state::{Session, TagEntry, TagKind};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Quote an IMAP astring. Rejects CR/LF outright — literals for such
/// strings would be needed to send them safely, which this dispatcher
/// does not yet support (see `DESIGN.md`). Otherwise escapes `\` and
/// `"` and wraps the result in double quotes.
pub fn quote_astring(value: &str) -> Result<String> {
    if value.contains('\r') || value.contains('\n') {
        return Err(Error::Protocol(
            "astring must not contain CR or LF".to_string(),
        ));
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    Ok(format!("\"{escaped}\""))
}

/// Reserve the next tag, write `{tag} {command}\r\n`, and install a
/// [`TagEntry`] so the matching tagged response can be routed back to
/// the right continuation.
pub async fn send(session: &mut Session, command: &str, kind: TagKind) -> Result<u32> {
    let tag = session.next_tag;
    session.next_tag += 1;
    let line = format!("{tag} {command}\r\n");
    debug!(tag, command, "sending command");
    session
        .transport
        .write_all(line.as_bytes())
        .await
        .map_err(Error::Io)?;
    session.transport.flush().await.map_err(Error::Io)?;
    session.tags.insert(
        tag,
        TagEntry {
            command_text: command.to_string(),
            kind,
        },
    );
    Ok(tag)
}

/// Write raw bytes with no tag and no table entry — used only for the
/// `DONE\r\n` line that ends an `IDLE` period, which carries no tag of
/// its own (the tag stays attached to the `IDLE` command sent earlier).
pub async fn send_raw(session: &mut Session, line: &str) -> Result<()> {
    debug!(line, "sending untagged line");
    session
        .transport
        .write_all(line.as_bytes())
        .await
        .map_err(Error::Io)?;
    session.transport.flush().await.map_err(Error::Io)
}
