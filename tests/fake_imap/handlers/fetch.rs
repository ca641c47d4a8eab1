use super::super::io::{write_bytes, write_line};
use super::super::mailbox::TestEmail;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Split `"Display Name <user@host>"` (or bare `"user@host"`) into the
/// three fields an `ENVELOPE` address needs.
fn parse_address(from: &str) -> (Option<String>, String, String) {
    let (name, addr) = match from.split_once('<') {
        Some((name, rest)) => (
            Some(name.trim().trim_matches('"').to_string()).filter(|n| !n.is_empty()),
            rest.trim_end_matches('>').trim(),
        ),
        None => (None, from.trim()),
    };
    match addr.split_once('@') {
        Some((mailbox, host)) => (name, mailbox.to_string(), host.to_string()),
        None => (name, addr.to_string(), String::new()),
    }
}

fn flags_paren(flags: &[String]) -> String {
    format!("({})", flags.join(" "))
}

fn envelope_literal(email: &TestEmail) -> String {
    let (name, mailbox, host) = parse_address(&email.from);
    let name = name.map_or("NIL".to_string(), |n| format!("\"{n}\""));
    let address = format!("(({name} NIL \"{mailbox}\" \"{host}\"))");
    format!(
        "NIL \"{}\" {address} {address} {address} NIL NIL NIL NIL NIL",
        email.subject
    )
}

fn bodystructure_literal(email: &TestEmail) -> String {
    format!(
        "\"TEXT\" \"PLAIN\" (\"CHARSET\" \"US-ASCII\") NIL NIL \"7BIT\" {}",
        email.body.len()
    )
}

/// Reply to a sequence-number `FETCH`, producing exactly the
/// attributes present in `attrs` (a whitespace-split, already-
/// uppercased token list such as `["FLAGS", "ENVELOPE"]` or
/// `["BODY.PEEK[1]"]`).
pub async fn handle_fetch<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    seq: u32,
    attrs: &[String],
    email: &TestEmail,
    stream: &mut BufReader<S>,
) {
    let mut parts = Vec::new();
    for attr in attrs {
        let upper = attr.to_uppercase();
        if upper == "FLAGS" {
            parts.push(format!("FLAGS {}", flags_paren(&email.flags)));
        } else if upper == "ENVELOPE" {
            parts.push(format!("ENVELOPE ({})", envelope_literal(email)));
        } else if upper == "BODY" {
            parts.push(format!("BODY ({})", bodystructure_literal(email)));
        } else if upper.starts_with("BODY.PEEK[") || upper.starts_with("BODY[") {
            let path = upper
                .trim_start_matches("BODY.PEEK")
                .trim_start_matches("BODY")
                .to_string();
            let header = format!("* {seq} FETCH (BODY{path} {{{}}}\r\n", email.body.len());
            if write_bytes(stream, header.as_bytes()).await.is_err() {
                return;
            }
            if write_bytes(stream, email.body.as_bytes()).await.is_err() {
                return;
            }
            if write_bytes(stream, b")\r\n").await.is_err() {
                return;
            }
            let _ = write_line(stream, &format!("{tag} OK FETCH completed\r\n")).await;
            return;
        }
    }

    if !parts.is_empty() {
        let line = format!("* {seq} FETCH ({})\r\n", parts.join(" "));
        if write_line(stream, &line).await.is_err() {
            return;
        }
    }
    let _ = write_line(stream, &format!("{tag} OK FETCH completed\r\n")).await;
}
