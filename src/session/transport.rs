//! The TCP/TLS byte-stream a session is driven over.
//!
//! [`Connection`] is a thin enum over a plain or TLS-wrapped socket so
//! STARTTLS can replace the transport in place: a session configured
//! for implicit TLS (port 993, the default) never constructs the
//! `Plain` variant at all.

use crate::config::{Config, SslVerify};
use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, BufReader, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

pub enum Connection {
    Plain(BufReader<TcpStream>),
    Tls(BufReader<TlsStream<TcpStream>>),
    /// Transient placeholder used only while swapping `Plain` for
    /// `Tls` in place during a `STARTTLS` upgrade; never observed
    /// outside that single non-yielding swap.
    Empty,
}

impl Connection {
    /// Connect to `config.server:config.port`. If `config.tls` and the
    /// port is the implicit-TLS default (993), the TLS handshake
    /// happens immediately; otherwise the connection starts in the
    /// clear and [`Connection::upgrade_tls`] is expected to follow a
    /// successful `STARTTLS`.
    pub async fn connect(config: &Config) -> Result<Self> {
        let addr = format!("{}:{}", config.server, config.port);
        debug!(server = %config.server, port = config.port, "connecting");
        let tcp = TcpStream::connect(&addr).await.map_err(Error::Io)?;
        if config.tls && config.port == 993 {
            let tls = handshake(tcp, config).await?;
            Ok(Self::Tls(BufReader::new(tls)))
        } else {
            Ok(Self::Plain(BufReader::new(tcp)))
        }
    }

    /// Perform the TLS handshake over an existing plaintext
    /// connection, as directed by a successful `STARTTLS`. A no-op if
    /// the connection is already TLS.
    pub async fn upgrade_tls(self, config: &Config) -> Result<Self> {
        match self {
            Self::Plain(reader) => {
                let tcp = reader.into_inner();
                let tls = handshake(tcp, config).await?;
                Ok(Self::Tls(BufReader::new(tls)))
            }
            tls @ Self::Tls(_) => Ok(tls),
            Self::Empty => unreachable!("Empty is never observed outside a single swap"),
        }
    }

    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

async fn handshake(tcp: TcpStream, config: &Config) -> Result<TlsStream<TcpStream>> {
    let tls_config = client_config(config.ssl_verify)?;
    let connector = TlsConnector::from(Arc::new(tls_config));
    let server_name = ServerName::try_from(config.server.clone())
        .map_err(|e| Error::Tls(format!("invalid server name {:?}: {e}", config.server)))?;
    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| Error::Tls(e.to_string()))
}

fn client_config(verify: SslVerify) -> Result<rustls::ClientConfig> {
    match verify {
        SslVerify::Peer => {
            let mut roots = rustls::RootCertStore::empty();
            let loaded = rustls_native_certs::load_native_certs();
            for err in &loaded.errors {
                tracing::warn!("failed to load a native root certificate: {err}");
            }
            for cert in loaded.certs {
                roots
                    .add(cert)
                    .map_err(|e| Error::Tls(format!("invalid native root certificate: {e}")))?;
            }
            Ok(rustls::ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth())
        }
        SslVerify::None => Ok(rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
            .with_no_client_auth()),
    }
}

/// Certificate verifier that accepts any certificate. Only reachable
/// via the explicit `SslVerify::None` opt-in (e.g. against a known
/// host presenting a self-signed certificate, such as a local bridge).
#[derive(Debug)]
struct AcceptAnyCert;

impl rustls::client::danger::ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Self::Tls(s) => Pin::new(s).poll_read(cx, buf),
            Self::Empty => unreachable!("Empty is never observed outside a single swap"),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Self::Tls(s) => Pin::new(s).poll_write(cx, buf),
            Self::Empty => unreachable!("Empty is never observed outside a single swap"),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_flush(cx),
            Self::Tls(s) => Pin::new(s).poll_flush(cx),
            Self::Empty => unreachable!("Empty is never observed outside a single swap"),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Self::Tls(s) => Pin::new(s).poll_shutdown(cx),
            Self::Empty => unreachable!("Empty is never observed outside a single swap"),
        }
    }
}

impl AsyncBufRead for Connection {
    fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_fill_buf(cx),
            Self::Tls(s) => Pin::new(s).poll_fill_buf(cx),
            Self::Empty => unreachable!("Empty is never observed outside a single swap"),
        }
    }

    fn consume(self: Pin<&mut Self>, amt: usize) {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).consume(amt),
            Self::Tls(s) => Pin::new(s).consume(amt),
            Self::Empty => unreachable!("Empty is never observed outside a single swap"),
        }
    }
}
