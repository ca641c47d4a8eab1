use super::super::io::write_line;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Reply to `IDLE` with the continuation request that opens the idle
/// period. The caller is responsible for the rest of the exchange:
/// watching for new mail to push unsolicited data, and for the `DONE`
/// line that ends it.
pub async fn handle_idle<S: AsyncRead + AsyncWrite + Unpin>(stream: &mut BufReader<S>) -> bool {
    write_line(stream, "+ idling\r\n").await.is_ok()
}
