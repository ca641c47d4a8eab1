use super::super::io::write_line;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Reply to `LOGOUT`: the untagged `BYE` plus the tagged completion,
/// per RFC 3501 §7.1.5.
pub async fn handle_logout<S: AsyncRead + AsyncWrite + Unpin>(tag: &str, stream: &mut BufReader<S>) {
    if write_line(stream, "* BYE logging out\r\n").await.is_err() {
        return;
    }
    let _ = write_line(stream, &format!("{tag} OK LOGOUT completed\r\n")).await;
}
