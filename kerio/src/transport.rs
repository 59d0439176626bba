//! Socket transport: one TCP (optionally TLS) connection per request.
//!
//! A [`Connection`] is opened for every round trip, the request is written
//! in full, and the reply is read until the server closes the stream. The
//! connection is shut down when it goes out of scope, on every exit path.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, ring};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{
    ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme,
    StreamOwned,
};
use tracing::trace;

use crate::error::{Error, Result};

/// Performs one blocking request/response exchange.
///
/// Implementations own the socket for the duration of the call and must
/// release it before returning.
pub trait Transport: std::fmt::Debug + Send {
    /// Sends `request` to `host:port` and returns every byte the server
    /// wrote before closing the connection.
    fn round_trip(&mut self, host: &str, port: u16, request: &[u8]) -> Result<Vec<u8>>;

    /// Whether the exchange is TLS-wrapped; picks the scheme in error messages.
    fn is_encrypted(&self) -> bool {
        true
    }
}

/// TCP transport with optional TLS.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    /// Connect timeout, also applied to reads and writes.
    timeout: Duration,
    /// TLS settings; `None` means plain TCP.
    tls: Option<Arc<ClientConfig>>,
}

impl TcpTransport {
    /// Creates a plain-TCP transport.
    pub const fn plain(timeout: Duration) -> Self {
        Self { timeout, tls: None }
    }

    /// Creates a TLS transport.
    ///
    /// With `verify` off, any server certificate is accepted, which is how
    /// appliances with self-signed certificates are reached.
    pub fn tls(timeout: Duration, verify: bool) -> Result<Self> {
        let provider = Arc::new(ring::default_provider());
        let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()?;

        let config = if verify {
            let roots = RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            };
            builder.with_root_certificates(roots).with_no_client_auth()
        } else {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyCert(provider)))
                .with_no_client_auth()
        };

        Ok(Self {
            timeout,
            tls: Some(Arc::new(config)),
        })
    }
}

impl Transport for TcpTransport {
    fn round_trip(&mut self, host: &str, port: u16, request: &[u8]) -> Result<Vec<u8>> {
        let mut conn = Connection::open(host, port, self.timeout, self.tls.as_ref())?;
        conn.write_all(request)?;
        conn.flush()?;
        conn.read_to_eof()
    }

    fn is_encrypted(&self) -> bool {
        self.tls.is_some()
    }
}

/// Byte stream of one connection.
#[derive(Debug)]
enum Stream {
    /// Unencrypted TCP.
    Plain(TcpStream),
    /// TLS over TCP.
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

/// A single open connection; closed on drop.
#[derive(Debug)]
struct Connection {
    /// The underlying stream.
    stream: Stream,
}

impl Connection {
    /// Resolves `host` and connects to the first reachable address.
    fn open(
        host: &str,
        port: u16,
        timeout: Duration,
        tls: Option<&Arc<ClientConfig>>,
    ) -> Result<Self> {
        let connect_err = |source| Error::Connect {
            host: host.to_owned(),
            port,
            source,
        };

        let addrs = (host, port).to_socket_addrs().map_err(connect_err)?;
        let mut last = io::Error::new(io::ErrorKind::NotFound, "no addresses resolved");
        let mut tcp = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(s) => {
                    tcp = Some(s);
                    break;
                }
                Err(e) => last = e,
            }
        }
        let tcp = tcp.ok_or_else(|| connect_err(last))?;
        tcp.set_read_timeout(Some(timeout))?;
        tcp.set_write_timeout(Some(timeout))?;
        trace!("connected to {host}:{port}");

        let stream = match tls {
            None => Stream::Plain(tcp),
            Some(config) => {
                let name = ServerName::try_from(host.to_owned())
                    .map_err(|e| Error::Config(format!("invalid TLS server name {host:?}: {e}")))?;
                let conn = ClientConnection::new(Arc::clone(config), name)?;
                Stream::Tls(Box::new(StreamOwned::new(conn, tcp)))
            }
        };
        Ok(Self { stream })
    }

    /// Reads until the peer closes the stream.
    ///
    /// A TLS peer that closes without `close_notify` still ends the reply.
    fn read_to_eof(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        match self.read_to_end(&mut buf) {
            Ok(_) => Ok(buf),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && !buf.is_empty() => Ok(buf),
            Err(e) => Err(e.into()),
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.stream {
            Stream::Plain(s) => s.read(buf),
            Stream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.stream {
            Stream::Plain(s) => s.write(buf),
            Stream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.stream {
            Stream::Plain(s) => s.flush(),
            Stream::Tls(s) => s.flush(),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let tcp = match &mut self.stream {
            Stream::Plain(s) => s,
            Stream::Tls(s) => {
                s.conn.send_close_notify();
                let _ = s.conn.complete_io(&mut s.sock);
                &mut s.sock
            }
        };
        let _ = tcp.shutdown(Shutdown::Both);
        trace!("connection closed");
    }
}

/// Certificate verifier that trusts every server certificate but still
/// checks handshake signatures.
#[derive(Debug)]
struct AcceptAnyCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
