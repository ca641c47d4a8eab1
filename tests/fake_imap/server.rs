//! In-process fake IMAP server for integration testing
//!
//! # How IMAP works (educational overview)
//!
//! IMAP (Internet Message Access Protocol, RFC 3501) is a text-based
//! protocol for accessing email on a remote server. Unlike POP3, IMAP
//! keeps messages on the server and supports folders, flags, and
//! server-side search.
//!
//! ## Connection lifecycle
//!
//! ```text
//!   Client connects via TCP
//!       |
//!   Server sends greeting: "* OK IMAP4rev1 ready\r\n"
//!       |
//!   Client sends CAPABILITY, then STARTTLS to upgrade the connection
//!       |
//!   TLS handshake (after this, all traffic is encrypted)
//!       |
//!   Client sends LOGIN, then CAPABILITY again, then SELECT
//!       |
//!   Client alternates IDLE/DONE with NOOP/FETCH until LOGOUT
//! ```
//!
//! ## Command format
//!
//! Every client command starts with a numeric **tag** the client
//! allocates (`imap_watch` uses plain increasing integers: `1`, `2`,
//! ...). The server echoes this tag in its completion response so the
//! client can match responses to commands:
//!
//! ```text
//!   Client:  1 LOGIN "alice" "hunter2"
//!   Server:  1 OK LOGIN completed
//! ```
//!
//! Lines prefixed with `*` are **untagged** responses -- data the
//! server sends before the final tagged OK/NO/BAD.
//!
//! ## FETCH and literals
//!
//! Message bodies are transferred as **counted literals**:
//! `{bytecount}\r\n` followed by exactly that many raw bytes, so the
//! client knows exactly where the content ends even if it contains
//! bytes that would otherwise look like protocol syntax.

use super::handlers::{
    handle_capability, handle_fetch, handle_idle, handle_list, handle_login, handle_logout,
    handle_noop, handle_select,
};
use super::io::write_line;
use super::mailbox::Mailbox;
use rcgen::generate_simple_self_signed;
use rustls::pki_types::PrivatePkcs8KeyDer;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_rustls::TlsAcceptor;

/// A fake IMAP server that runs on localhost with an OS-assigned port.
///
/// The server generates a self-signed TLS certificate at startup using
/// `rcgen`, so no cert files are needed. It speaks enough of the IMAP
/// protocol to exercise a session's full connection lifecycle:
/// greeting -> CAPABILITY -> STARTTLS -> TLS -> LOGIN -> CAPABILITY ->
/// SELECT -> IDLE/NOOP/FETCH -> LOGOUT.
pub struct FakeImapServer {
    port: u16,
    mailbox: Arc<Mutex<Mailbox>>,
    new_mail: Arc<Notify>,
    /// Handle to the background task so it lives as long as the server.
    _handle: tokio::task::JoinHandle<()>,
}

impl FakeImapServer {
    /// Start a new fake IMAP server with the given mailbox state.
    pub async fn start(mailbox: Mailbox) -> Self {
        let _ = rustls::crypto::ring::default_provider().install_default();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let cert = generate_simple_self_signed(vec!["127.0.0.1".to_string()])
            .expect("generate self-signed cert");
        let cert_der = cert.cert.der().clone();
        let key_der = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

        let tls_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der], key_der.into())
            .expect("build server TLS config");

        let acceptor = TlsAcceptor::from(Arc::new(tls_config));
        let mailbox = Arc::new(Mutex::new(mailbox));
        let new_mail = Arc::new(Notify::new());

        let accept_mailbox = mailbox.clone();
        let accept_new_mail = new_mail.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _addr)) = listener.accept().await else {
                    break;
                };
                let acceptor = acceptor.clone();
                let mailbox = accept_mailbox.clone();
                let new_mail = accept_new_mail.clone();
                tokio::spawn(async move {
                    handle_connection(stream, acceptor, &mailbox, &new_mail).await;
                });
            }
        });

        Self {
            port,
            mailbox,
            new_mail,
            _handle: handle,
        }
    }

    /// The port the server is listening on.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Append a message to `folder` and wake any connection currently
    /// idling, so it can push the resulting `EXISTS` unsolicited.
    pub fn deliver(&self, folder: &str, email: super::mailbox::TestEmail) {
        let mut mailbox = self.mailbox.lock().unwrap();
        if let Some(folder) = mailbox.get_folder_mut(folder) {
            folder.messages.push(email);
        }
        drop(mailbox);
        self.new_mail.notify_waiters();
    }
}

/// Handle a single IMAP client connection: plaintext greeting and
/// STARTTLS negotiation, then the authenticated session over TLS.
async fn handle_connection(
    stream: tokio::net::TcpStream,
    acceptor: TlsAcceptor,
    mailbox: &Mutex<Mailbox>,
    new_mail: &Notify,
) {
    let mut reader = BufReader::new(stream);

    if write_line(&mut reader, "* OK IMAP4rev1 Fake server ready\r\n")
        .await
        .is_err()
    {
        return;
    }

    // Pre-TLS loop: CAPABILITY may be issued any number of times
    // before STARTTLS ends this phase.
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await.is_err() {
            return;
        }
        let Some((tag, verb, _rest)) = split_command(&line) else {
            return;
        };
        match verb.as_str() {
            "CAPABILITY" => handle_capability(&tag, true, &mut reader).await,
            "STARTTLS" => {
                let resp = format!("{tag} OK Begin TLS negotiation now\r\n");
                if write_line(&mut reader, &resp).await.is_err() {
                    return;
                }
                break;
            }
            _ => {
                let resp = format!("{tag} BAD Expected STARTTLS\r\n");
                let _ = write_line(&mut reader, &resp).await;
                return;
            }
        }
    }

    let tcp = reader.into_inner();
    let Ok(tls_stream) = acceptor.accept(tcp).await else {
        return;
    };

    handle_imap_session(tls_stream, mailbox, new_mail).await;
}

/// Split `"<tag> <VERB> <rest>"` into its parts, uppercasing the verb.
/// Returns `None` for a blank or malformed line.
fn split_command(line: &str) -> Option<(String, String, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut parts = trimmed.splitn(3, ' ');
    let tag = parts.next()?.to_string();
    let verb = parts.next().unwrap_or_default().to_uppercase();
    let rest = parts.next().unwrap_or_default().to_string();
    Some((tag, verb, rest))
}

/// Extract the quoted argument tokens from a command's remainder,
/// e.g. `"\"INBOX\""` -> `["INBOX"]`. Good enough for the astrings
/// this client ever sends (no embedded literals).
fn quoted_args(rest: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            let mut s = String::new();
            for c2 in chars.by_ref() {
                if c2 == '"' {
                    break;
                }
                s.push(c2);
            }
            out.push(s);
        }
    }
    out
}

/// Parse `"<seq> (<attr> <attr> ...)"` into `(seq, attrs)`.
fn parse_fetch_args(rest: &str) -> Option<(u32, Vec<String>)> {
    let (seq_str, paren) = rest.split_once(' ')?;
    let seq: u32 = seq_str.parse().ok()?;
    let inner = paren.trim().trim_start_matches('(').trim_end_matches(')');
    let attrs = inner.split_whitespace().map(str::to_string).collect();
    Some((seq, attrs))
}

/// Run the authenticated IMAP command loop over an established TLS
/// stream: LOGIN, CAPABILITY, SELECT, then steady-state commands.
async fn handle_imap_session<S: AsyncRead + AsyncWrite + Unpin>(
    stream: S,
    mailbox: &Mutex<Mailbox>,
    new_mail: &Notify,
) {
    let mut reader = BufReader::new(stream);
    let mut selected_folder: Option<String> = None;

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let Some((tag, verb, rest)) = split_command(&line) else {
            continue;
        };

        match verb.as_str() {
            "CAPABILITY" => handle_capability(&tag, false, &mut reader).await,
            "LOGIN" => {
                if !handle_login(&tag, &mut reader).await {
                    return;
                }
            }
            "SELECT" => {
                let args = quoted_args(&rest);
                let name = args.first().cloned().unwrap_or_default();
                let snap = mailbox.lock().unwrap().clone();
                let folder = snap.get_folder(&name);
                if handle_select(&tag, folder, &mut reader).await {
                    selected_folder = Some(name);
                } else {
                    selected_folder = None;
                }
            }
            "LIST" => {
                let snap = mailbox.lock().unwrap().clone();
                let args = quoted_args(&rest);
                let pattern = args.get(1).cloned().unwrap_or_default();
                handle_list(&tag, &snap, &pattern, &mut reader).await;
            }
            "NOOP" => handle_noop(&tag, &mut reader).await,
            "FETCH" => {
                let Some(folder_name) = selected_folder.as_deref() else {
                    let _ = write_line(&mut reader, &format!("{tag} BAD no mailbox selected\r\n")).await;
                    continue;
                };
                let Some((seq, attrs)) = parse_fetch_args(&rest) else {
                    let _ = write_line(&mut reader, &format!("{tag} BAD malformed FETCH\r\n")).await;
                    continue;
                };
                let snap = mailbox.lock().unwrap().clone();
                let Some(email) = snap
                    .get_folder(folder_name)
                    .and_then(|f| f.messages.get(usize::try_from(seq - 1).unwrap_or(usize::MAX)))
                else {
                    let _ = write_line(&mut reader, &format!("{tag} BAD no such message\r\n")).await;
                    continue;
                };
                handle_fetch(&tag, seq, &attrs, email, &mut reader).await;
            }
            "IDLE" => {
                if !handle_idle(&mut reader).await {
                    return;
                }
                if !run_idle_period(&tag, &mut reader, mailbox, new_mail, &mut selected_folder).await {
                    return;
                }
            }
            "LOGOUT" => {
                handle_logout(&tag, &mut reader).await;
                return;
            }
            _ => {
                let resp = format!("{tag} BAD Unknown command\r\n");
                if write_line(&mut reader, &resp).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// Stay in the idle period started by `IDLE`: watch for new mail and
/// push `EXISTS` unsolicited, until the client sends the bare `DONE`
/// line, then send the tagged completion for the original `IDLE` tag.
async fn run_idle_period<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    reader: &mut BufReader<S>,
    mailbox: &Mutex<Mailbox>,
    new_mail: &Notify,
    selected_folder: &mut Option<String>,
) -> bool {
    loop {
        let mut line = String::new();
        tokio::select! {
            result = reader.read_line(&mut line) => {
                match result {
                    Ok(0) | Err(_) => return false,
                    Ok(_) => {}
                }
                if line.trim().eq_ignore_ascii_case("DONE") {
                    let resp = format!("{tag} OK IDLE completed\r\n");
                    return write_line(reader, &resp).await.is_ok();
                }
                // Anything else during IDLE is a client error; ignore it.
            }
            () = new_mail.notified() => {
                let Some(name) = selected_folder.as_deref() else { continue };
                let exists = mailbox.lock().unwrap().get_folder(name).map_or(0, |f| f.messages.len());
                let line = format!("* {exists} EXISTS\r\n");
                if write_line(reader, &line).await.is_err() {
                    return false;
                }
            }
        }
    }
}
