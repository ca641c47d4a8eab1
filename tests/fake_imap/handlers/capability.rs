use super::super::io::write_line;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Reply to `CAPABILITY`. `starttls` controls whether `STARTTLS` is
/// advertised -- real servers stop advertising it once the connection
/// is already encrypted, though nothing requires that here.
pub async fn handle_capability<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    starttls: bool,
    stream: &mut BufReader<S>,
) {
    let caps = if starttls {
        "* CAPABILITY IMAP4rev1 STARTTLS IDLE\r\n"
    } else {
        "* CAPABILITY IMAP4rev1 IDLE\r\n"
    };
    if write_line(stream, caps).await.is_err() {
        return;
    }
    let _ = write_line(stream, &format!("{tag} OK CAPABILITY completed\r\n")).await;
}
