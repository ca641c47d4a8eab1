use super::super::io::write_line;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Reply to `LOGIN`. Accepts any credentials -- the fake server has no
/// interest in exercising authentication failure paths, only the
/// lifecycle that follows a successful login.
pub async fn handle_login<S: AsyncRead + AsyncWrite + Unpin>(tag: &str, stream: &mut BufReader<S>) -> bool {
    write_line(stream, &format!("{tag} OK LOGIN completed\r\n")).await.is_ok()
}
