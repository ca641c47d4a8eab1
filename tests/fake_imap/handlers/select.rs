use super::super::io::write_line;
use super::super::mailbox::Folder;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Reply to `SELECT`, returning whether the folder exists (selection
/// only succeeds when it does).
pub async fn handle_select<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    folder: Option<&Folder>,
    stream: &mut BufReader<S>,
) -> bool {
    let Some(folder) = folder else {
        let _ = write_line(stream, &format!("{tag} NO SELECT no such mailbox\r\n")).await;
        return false;
    };

    let exists = folder.messages.len();
    let recent = folder.messages.iter().filter(|m| m.flags.is_empty()).count();
    let lines = [
        "* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n".to_string(),
        "* OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)] Limited\r\n".to_string(),
        format!("* {exists} EXISTS\r\n"),
        format!("* {recent} RECENT\r\n"),
        "* OK [UIDVALIDITY 1]\r\n".to_string(),
        format!("* OK [UIDNEXT {}]\r\n", exists + 1),
    ];
    for line in &lines {
        if write_line(stream, line).await.is_err() {
            return false;
        }
    }
    write_line(stream, &format!("{tag} OK [READ-WRITE] SELECT completed\r\n"))
        .await
        .is_ok()
}
