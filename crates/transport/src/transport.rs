// crates/transport/src/transport.rs
//! Network transport - one plaintext or TLS exchange per call

use async_trait::async_trait;
use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls;
use tokio_rustls::TlsConnector;
use tracing::{debug, instrument};

use tcp1620_common::{
    Exchange, ExchangeFailure, ExchangeReport, ProbeError, ProbeOptions, ProbeTarget, Protocol,
    TrafficAccountant, Transport,
};

use crate::request::build_request_head;
use crate::tls;

/// Step of an exchange, used to label timeouts and classify I/O errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Connect,
    Handshake,
    RequestHead,
    Body,
    Drain,
}

impl Stage {
    const fn as_str(self) -> &'static str {
        match self {
            Stage::Connect => "connect",
            Stage::Handshake => "tls handshake",
            Stage::RequestHead => "request head",
            Stage::Body => "request body",
            Stage::Drain => "response drain",
        }
    }
}

/// Bytes moved and observations made so far in one exchange.
#[derive(Debug, Default)]
struct Tally {
    sent: u64,
    received: u64,
    server_waits_for_body: bool,
}

/// Real socket transport over TCP, optionally wrapped in TLS.
pub struct NetworkTransport {
    request_timeout: Duration,
    waits_for_body_timeout: Duration,
    recv_buffer: usize,
    accountant: Arc<TrafficAccountant>,
}

impl NetworkTransport {
    /// Create a transport with default timings.
    pub fn new(accountant: Arc<TrafficAccountant>) -> Self {
        Self::from_options(&ProbeOptions::default(), accountant)
    }

    pub fn from_options(options: &ProbeOptions, accountant: Arc<TrafficAccountant>) -> Self {
        Self {
            request_timeout: options.request_timeout,
            waits_for_body_timeout: options.waits_for_body_timeout,
            recv_buffer: options.recv_buffer.max(1),
            accountant,
        }
    }

    /// Set the bound applied to every connect, handshake, write and read.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the short window of the early-response check.
    pub fn with_waits_for_body_timeout(mut self, timeout: Duration) -> Self {
        self.waits_for_body_timeout = timeout;
        self
    }

    #[instrument(skip(self, exchange, tally), fields(probe = %exchange.target, method = %exchange.method))]
    async fn run(&self, exchange: Exchange<'_>, tally: &mut Tally) -> Result<(), ProbeError> {
        let target = exchange.target;
        let addr = SocketAddr::from((target.ip, target.port));

        let stream = match timeout(self.request_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(classify_io(e, Stage::Connect)),
            Err(_) => return Err(ProbeError::Timeout(Stage::Connect.as_str())),
        };

        match target.protocol {
            Protocol::Plain => self.converse(stream, exchange, tally).await,
            Protocol::Tls => {
                let stream = self.handshake(stream, target).await?;
                self.converse(stream, exchange, tally).await
            }
        }
    }

    async fn handshake(&self, stream: TcpStream, target: &ProbeTarget) -> Result<TlsStream<TcpStream>, ProbeError> {
        let version = target
            .tls_version
            .ok_or_else(|| ProbeError::Internal("TLS target without a pinned version".into()))?;
        let config = tls::client_config(version, target.sni.is_some())
            .map_err(|e| ProbeError::Internal(format!("TLS configuration: {}", e)))?;
        let server_name = tls::server_name(target)?;
        let connector = TlsConnector::from(Arc::new(config));

        match timeout(self.request_timeout, connector.connect(server_name, stream)).await {
            Ok(Ok(tls)) => Ok(tls),
            Ok(Err(e)) => Err(classify_io(e, Stage::Handshake)),
            Err(_) => Err(ProbeError::Timeout(Stage::Handshake.as_str())),
        }
    }

    /// Head, early-response check, body, optional drain.
    async fn converse<S>(&self, mut stream: S, exchange: Exchange<'_>, tally: &mut Tally) -> Result<(), ProbeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let head = build_request_head(
            exchange.method,
            exchange.target.host_header.as_deref(),
            exchange.body.len(),
        );
        self.send(&mut stream, &head, Stage::RequestHead).await?;
        tally.sent += head.len() as u64;

        let waits = self.server_waits_for_body(&mut stream, tally).await;
        tally.server_waits_for_body = waits;

        self.send(&mut stream, exchange.body, Stage::Body).await?;
        tally.sent += exchange.body.len() as u64;

        if exchange.drain {
            self.drain(&mut stream, tally).await?;
        }
        Ok(())
    }

    async fn send<S>(&self, stream: &mut S, bytes: &[u8], stage: Stage) -> Result<(), ProbeError>
    where
        S: AsyncWrite + Unpin,
    {
        let write = async {
            stream.write_all(bytes).await?;
            stream.flush().await
        };
        match timeout(self.request_timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(classify_io(e, stage)),
            Err(_) => Err(ProbeError::Timeout(stage.as_str())),
        }
    }

    /// One-byte read bounded by the short window. Only silence counts as
    /// waiting; a byte, EOF, or any other error means the server already
    /// reacted.
    async fn server_waits_for_body<S>(&self, stream: &mut S, tally: &mut Tally) -> bool
    where
        S: AsyncRead + Unpin,
    {
        let mut probe = [0u8; 1];
        match timeout(self.waits_for_body_timeout, stream.read(&mut probe)).await {
            Err(_) => true,
            Ok(Ok(n)) => {
                tally.received += n as u64;
                false
            }
            Ok(Err(e)) => {
                debug!(error = %e, "early read failed");
                matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
            }
        }
    }

    /// Read until the peer closes, discarding the payload.
    async fn drain<S>(&self, stream: &mut S, tally: &mut Tally) -> Result<(), ProbeError>
    where
        S: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; self.recv_buffer];
        loop {
            match timeout(self.request_timeout, stream.read(&mut buf)).await {
                Ok(Ok(0)) => return Ok(()),
                Ok(Ok(n)) => tally.received += n as u64,
                // TLS peers often close without close_notify.
                Ok(Err(e)) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
                Ok(Err(e)) => return Err(classify_io(e, Stage::Drain)),
                Err(_) => return Err(ProbeError::Timeout(Stage::Drain.as_str())),
            }
        }
    }
}

#[async_trait]
impl Transport for NetworkTransport {
    async fn exchange(&self, exchange: Exchange<'_>) -> Result<ExchangeReport, ExchangeFailure> {
        let mut tally = Tally::default();
        let result = self.run(exchange, &mut tally).await;
        self.accountant.record_traffic(tally.sent, tally.received);

        match result {
            Ok(()) => Ok(ExchangeReport {
                server_waits_for_body: tally.server_waits_for_body,
                bytes_sent: tally.sent,
                bytes_received: tally.received,
            }),
            Err(error) => {
                debug!(probe = %exchange.target, %error, "exchange failed");
                Err(ExchangeFailure {
                    error,
                    server_waits_for_body: tally.server_waits_for_body,
                })
            }
        }
    }
}

/// Map an I/O error onto the probe failure taxonomy.
fn classify_io(err: io::Error, stage: Stage) -> ProbeError {
    if let Some(tls_err) = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        return ProbeError::Tls(tls_err.to_string());
    }
    match err.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => ProbeError::Timeout(stage.as_str()),
        ErrorKind::UnexpectedEof if stage == Stage::Handshake => {
            ProbeError::Tls(format!("peer closed during handshake: {}", err))
        }
        ErrorKind::InvalidData if stage == Stage::Handshake => ProbeError::Tls(err.to_string()),
        _ => ProbeError::Connection(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tcp1620_common::{FailureKind, HttpMethod, TlsVersion};
    use tokio::net::TcpListener;
    use tokio_rustls::rustls::crypto::ring;
    use tokio_rustls::rustls::ServerConfig;
    use tokio_rustls::TlsAcceptor;

    const RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

    fn transport(accountant: Arc<TrafficAccountant>) -> NetworkTransport {
        NetworkTransport::new(accountant)
            .with_timeout(Duration::from_millis(1500))
            .with_waits_for_body_timeout(Duration::from_millis(200))
    }

    /// Read a request head, returning its text and declared body length.
    async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> (String, usize) {
        let mut head = Vec::new();
        let mut byte = [0u8; 1];
        while !head.ends_with(b"\r\n\r\n") {
            let n = stream.read(&mut byte).await.unwrap();
            assert_eq!(n, 1, "peer closed before end of head");
            head.push(byte[0]);
        }
        let text = String::from_utf8(head).unwrap();
        let len = text
            .lines()
            .find_map(|l| l.strip_prefix("Content-Length: "))
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        (text, len)
    }

    async fn read_body<S: AsyncRead + Unpin>(stream: &mut S, len: usize) {
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await.unwrap();
    }

    async fn listener() -> (TcpListener, Ipv4Addr, u16) {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, Ipv4Addr::LOCALHOST, port)
    }

    #[tokio::test]
    async fn early_response_means_not_waiting() {
        let (listener, ip, port) = listener().await;
        let server = tokio::spawn(async move {
            let (mut s, _) = listener.accept().await.unwrap();
            let (head, len) = read_head(&mut s).await;
            s.write_all(RESPONSE).await.unwrap();
            read_body(&mut s, len).await;
            head
        });

        let accountant = Arc::new(TrafficAccountant::new());
        let t = transport(Arc::clone(&accountant));
        let target = ProbeTarget::plain(ip, port, Some("example.org".into()));
        let body = vec![7u8; 1024];
        let report = t.exchange(Exchange::body_probe(&target, &body)).await.unwrap();

        assert!(!report.server_waits_for_body);
        assert_eq!(report.bytes_received, RESPONSE.len() as u64);

        let head = server.await.unwrap();
        assert!(head.starts_with("POST / HTTP/1.1\r\nHost: example.org\r\n"));
        assert_eq!(report.bytes_sent, head.len() as u64 + 1024);

        let stats = accountant.snapshot();
        assert_eq!(stats.bytes_sent, report.bytes_sent);
        assert_eq!(stats.bytes_received, report.bytes_received);
        assert_eq!(stats.probes_completed, 0);
    }

    #[tokio::test]
    async fn silence_until_body_means_waiting() {
        let (listener, ip, port) = listener().await;
        tokio::spawn(async move {
            let (mut s, _) = listener.accept().await.unwrap();
            let (_, len) = read_head(&mut s).await;
            read_body(&mut s, len).await;
            s.write_all(RESPONSE).await.unwrap();
        });

        let t = transport(Arc::new(TrafficAccountant::new()));
        let target = ProbeTarget::plain(ip, port, None);
        let body = vec![1u8; 4096];
        let report = t.exchange(Exchange::body_probe(&target, &body)).await.unwrap();

        assert!(report.server_waits_for_body);
        assert_eq!(report.bytes_received, RESPONSE.len() as u64);
    }

    #[tokio::test]
    async fn liveness_does_not_drain() {
        let (listener, ip, port) = listener().await;
        tokio::spawn(async move {
            let (mut s, _) = listener.accept().await.unwrap();
            let (head, _) = read_head(&mut s).await;
            assert!(head.starts_with("HEAD / HTTP/1.1\r\n"));
            assert!(head.contains("Content-Length: 0\r\n"));
            s.write_all(RESPONSE).await.unwrap();
        });

        let t = transport(Arc::new(TrafficAccountant::new()));
        let target = ProbeTarget::plain(ip, port, None);
        let report = t.exchange(Exchange::liveness(&target)).await.unwrap();

        assert!(!report.server_waits_for_body);
        // Only the single early-response byte was consumed.
        assert_eq!(report.bytes_received, 1);
    }

    #[tokio::test]
    async fn stalled_stream_times_out() {
        let (listener, ip, port) = listener().await;
        tokio::spawn(async move {
            let (mut s, _) = listener.accept().await.unwrap();
            let (_, len) = read_head(&mut s).await;
            read_body(&mut s, len).await;
            // Hold the connection open without answering.
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(s);
        });

        let accountant = Arc::new(TrafficAccountant::new());
        let t = NetworkTransport::new(Arc::clone(&accountant))
            .with_timeout(Duration::from_millis(400))
            .with_waits_for_body_timeout(Duration::from_millis(100));
        let target = ProbeTarget::plain(ip, port, None);
        let body = vec![0u8; 2048];
        let failure = t
            .exchange(Exchange::body_probe(&target, &body))
            .await
            .unwrap_err();

        assert!(failure.error.is_timeout());
        assert!(failure.server_waits_for_body);
        // Head and body were sent before the stall and are still accounted.
        assert!(accountant.snapshot().bytes_sent > 2048);
    }

    #[tokio::test]
    async fn refused_is_connection_error() {
        let (listener, ip, port) = listener().await;
        drop(listener);

        let accountant = Arc::new(TrafficAccountant::new());
        let t = transport(Arc::clone(&accountant));
        let target = ProbeTarget::plain(ip, port, None);
        let failure = t.exchange(Exchange::liveness(&target)).await.unwrap_err();

        assert_eq!(failure.error.kind(), Some(FailureKind::ConnectionError));
        assert_eq!(accountant.snapshot().bytes_sent, 0);
    }

    fn tls_acceptor(version: TlsVersion) -> TlsAcceptor {
        let rcgen::CertifiedKey { cert, signing_key } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let cert_der = rustls_pki_types::CertificateDer::from(cert.der().to_vec());
        let key_der = rustls_pki_types::PrivateKeyDer::Pkcs8(
            rustls_pki_types::PrivatePkcs8KeyDer::from(signing_key.serialize_der()),
        );
        let config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
            .with_protocol_versions(tls::protocol_versions(version))
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der], key_der)
            .unwrap();
        TlsAcceptor::from(Arc::new(config))
    }

    #[tokio::test]
    async fn tls_exchange_with_decoy_sni() {
        let (listener, ip, port) = listener().await;
        let acceptor = tls_acceptor(TlsVersion::V1_3);
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut s = acceptor.accept(tcp).await.unwrap();
            let (_, len) = read_head(&mut s).await;
            read_body(&mut s, len).await;
            s.write_all(RESPONSE).await.unwrap();
            s.shutdown().await.unwrap();
        });

        let t = transport(Arc::new(TrafficAccountant::new()));
        let target = ProbeTarget::tls(
            ip,
            port,
            TlsVersion::V1_3,
            Some("k2j4h5g6f7d8s9a.com".into()),
            Some("k2j4h5g6f7d8s9a.com".into()),
        );
        let body = vec![3u8; 8192];
        let report = t.exchange(Exchange::body_probe(&target, &body)).await.unwrap();

        assert!(report.server_waits_for_body);
        assert_eq!(report.bytes_received, RESPONSE.len() as u64);
    }

    #[tokio::test]
    async fn tls_version_mismatch_is_tls_error() {
        let (listener, ip, port) = listener().await;
        let acceptor = tls_acceptor(TlsVersion::V1_3);
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let _ = acceptor.accept(tcp).await;
        });

        let t = transport(Arc::new(TrafficAccountant::new()));
        let target = ProbeTarget::tls(ip, port, TlsVersion::V1_2, None, None);
        let failure = t.exchange(Exchange::liveness(&target)).await.unwrap_err();

        assert_eq!(failure.error.kind(), Some(FailureKind::TlsError));
    }

    #[test]
    fn classify_plain_errors() {
        let refused = io::Error::from(ErrorKind::ConnectionRefused);
        assert!(matches!(classify_io(refused, Stage::Connect), ProbeError::Connection(_)));

        let timed_out = io::Error::from(ErrorKind::TimedOut);
        assert!(classify_io(timed_out, Stage::Drain).is_timeout());

        let eof = io::Error::from(ErrorKind::UnexpectedEof);
        assert!(matches!(classify_io(eof, Stage::Handshake), ProbeError::Tls(_)));
    }

    #[test]
    fn classify_wrapped_rustls_error() {
        let err = io::Error::new(ErrorKind::InvalidData, rustls::Error::DecryptError);
        assert!(matches!(classify_io(err, Stage::Drain), ProbeError::Tls(_)));
    }

    #[test]
    fn method_labels_match_wire() {
        assert_eq!(HttpMethod::Head.as_str(), "HEAD");
    }
}
