use super::super::io::write_line;
use super::super::mailbox::Mailbox;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Reply to `LIST reference pattern`. Glob matching is deliberately
/// crude: a pattern containing a wildcard (`*` or `%`) matches every
/// folder, otherwise only an exact name match is listed -- enough to
/// exercise the client's `LIST` round trip without implementing RFC
/// 3501's full mailbox-name wildcard grammar.
pub async fn handle_list<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    mailbox: &Mailbox,
    pattern: &str,
    stream: &mut BufReader<S>,
) {
    let wildcard = pattern.contains('*') || pattern.contains('%');
    for folder in &mailbox.folders {
        if wildcard || folder.name == pattern {
            let line = format!("* LIST (\\HasNoChildren) \"/\" \"{}\"\r\n", folder.name);
            if write_line(stream, &line).await.is_err() {
                return;
            }
        }
    }
    let _ = write_line(stream, &format!("{tag} OK LIST completed\r\n")).await;
}
