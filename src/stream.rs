//! The two concrete transports a [`crate::connection::Connection`] can run
//! over. Mirrors the teacher's `SocketFlowStream`, but only needs the client
//! half of rustls since accepting upgrades is out of scope here.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls_pemfile::{certs, pkcs8_private_keys};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpStream, UnixStream};
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::{client::TlsStream, TlsConnector};

use crate::config::WebSocketConfig;
use crate::error::Error;

pub enum ClientStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    Unix(UnixStream),
}

impl AsyncRead for ClientStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ClientStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            ClientStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
            ClientStream::Unix(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ClientStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            ClientStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            ClientStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
            ClientStream::Unix(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ClientStream::Plain(s) => Pin::new(s).poll_flush(cx),
            ClientStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
            ClientStream::Unix(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ClientStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            ClientStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
            ClientStream::Unix(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Build the rustls client config from [`WebSocketConfig`]'s TLS knobs:
/// platform roots plus an optional extra CA bundle, an optional client
/// certificate for mutual TLS, and `reject_unauthorized` gating whether
/// server certificates are actually checked.
fn build_tls_connector(config: &WebSocketConfig) -> Result<TlsConnector, Error> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(ca_pem) = &config.ca_file {
        let mut reader = io::BufReader::new(ca_pem.as_bytes());
        for cert in certs(&mut reader) {
            let cert = cert.map_err(|e| Error::TlsConfigError(e.to_string()))?;
            let _ = roots.add(cert);
        }
    }

    let builder = ClientConfig::builder().with_root_certificates(roots);

    let tls_config = match (&config.tls_cert, &config.tls_key) {
        (Some(cert_pem), Some(key_pem)) => {
            let mut cert_reader = io::BufReader::new(cert_pem.as_bytes());
            let chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader)
                .collect::<Result<_, _>>()
                .map_err(|e| Error::TlsConfigError(e.to_string()))?;

            let mut key_reader = io::BufReader::new(key_pem.as_bytes());
            let key: PrivateKeyDer<'static> = pkcs8_private_keys(&mut key_reader)
                .next()
                .ok_or_else(|| Error::TlsConfigError("no private key found".into()))?
                .map_err(|e| Error::TlsConfigError(e.to_string()))?
                .into();

            builder
                .with_client_auth_cert(chain, key)
                .map_err(|e| Error::TlsConfigError(e.to_string()))?
        }
        _ => builder.with_no_client_auth(),
    };

    let mut tls_config = tls_config;
    if !config.reject_unauthorized {
        tls_config
            .dangerous()
            .set_certificate_verifier(Arc::new(danger::NoVerifier));
    }

    Ok(TlsConnector::from(Arc::new(tls_config)))
}

/// Connect a plain TCP socket, upgrading to TLS when `use_tls` is set.
pub async fn connect(host_with_port: &str, host: &str, use_tls: bool, config: &WebSocketConfig) -> Result<ClientStream, Error> {
    let tcp = TcpStream::connect(host_with_port).await?;
    if !use_tls {
        return Ok(ClientStream::Plain(tcp));
    }

    let connector = build_tls_connector(config)?;
    let server_name = ServerName::try_from(host.to_string())?;
    let tls_stream = connector.connect(server_name, tcp).await?;
    Ok(ClientStream::Tls(Box::new(tls_stream)))
}

/// Connect over a UNIX domain socket, for callers that configured
/// `unix_socket_path` instead of dialing `host:port` over TCP. The HTTP
/// request still carries a `Host` header derived from the URL; only the
/// transport changes.
pub async fn connect_unix(path: &str) -> Result<ClientStream, Error> {
    let stream = UnixStream::connect(path).await?;
    Ok(ClientStream::Unix(stream))
}

/// Only reachable when `reject_unauthorized = false`; skips all certificate
/// validation, matching the teacher's `reject_unauthorized` knob from
/// `ClientConfig`.
mod danger {
    use tokio_rustls::rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use tokio_rustls::rustls::{DigitallySignedStruct, Error as RustlsError, SignatureScheme};

    #[derive(Debug)]
    pub struct NoVerifier;

    impl ServerCertVerifier for NoVerifier {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, RustlsError> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, RustlsError> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, RustlsError> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            vec![
                SignatureScheme::RSA_PKCS1_SHA256,
                SignatureScheme::ECDSA_NISTP256_SHA256,
                SignatureScheme::RSA_PSS_SHA256,
                SignatureScheme::ED25519,
            ]
        }
    }
}
