use super::super::io::write_line;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Reply to `NOOP` with just the tagged completion -- the fake server
/// never has unsolicited data queued up for a plain poll.
pub async fn handle_noop<S: AsyncRead + AsyncWrite + Unpin>(tag: &str, stream: &mut BufReader<S>) {
    let _ = write_line(stream, &format!("{tag} OK NOOP completed\r\n")).await;
}
