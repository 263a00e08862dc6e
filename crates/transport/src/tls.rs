//! TLS client configuration
//!
//! Each probe pins exactly one protocol version and accepts any server
//! certificate: a mismatched certificate must not hide interference.

use std::net::IpAddr;
use std::sync::Arc;

use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::crypto::{ring, CryptoProvider};
use tokio_rustls::rustls::{
    self, ClientConfig, DigitallySignedStruct, SignatureScheme, SupportedProtocolVersion,
};

use tcp1620_common::{ProbeError, ProbeTarget, TlsVersion};

static TLS12_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS12];
static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

pub(crate) fn protocol_versions(version: TlsVersion) -> &'static [&'static SupportedProtocolVersion] {
    match version {
        TlsVersion::V1_2 => TLS12_ONLY,
        TlsVersion::V1_3 => TLS13_ONLY,
    }
}

/// Client config pinned to `version`. The SNI extension is only sent when
/// `send_sni` is set.
pub fn client_config(version: TlsVersion, send_sni: bool) -> Result<ClientConfig, rustls::Error> {
    let provider = Arc::new(ring::default_provider());
    let mut config = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_protocol_versions(protocol_versions(version))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }))
        .with_no_client_auth();
    config.enable_sni = send_sni;
    Ok(config)
}

/// Name handed to the handshake: the SNI value, or the bare address when
/// no SNI is to be sent.
pub fn server_name(target: &ProbeTarget) -> Result<ServerName<'static>, ProbeError> {
    match &target.sni {
        Some(sni) => ServerName::try_from(sni.clone())
            .map_err(|e| ProbeError::Internal(format!("invalid SNI {:?}: {}", sni, e))),
        None => Ok(ServerName::from(IpAddr::V4(target.ip))),
    }
}

/// Certificate verifier that accepts every server certificate.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn config_pins_single_version() {
        let config = client_config(TlsVersion::V1_2, true).unwrap();
        assert!(config.enable_sni);
        let config = client_config(TlsVersion::V1_3, false).unwrap();
        assert!(!config.enable_sni);
    }

    #[test]
    fn server_name_falls_back_to_ip() {
        let target = ProbeTarget::tls(Ipv4Addr::new(1, 2, 3, 4), 443, TlsVersion::V1_3, None, None);
        let name = server_name(&target).unwrap();
        assert!(matches!(name, ServerName::IpAddress(_)));
    }

    #[test]
    fn server_name_uses_sni() {
        let target = ProbeTarget::tls(
            Ipv4Addr::new(1, 2, 3, 4),
            443,
            TlsVersion::V1_2,
            Some("abc123.com".into()),
            None,
        );
        assert!(matches!(server_name(&target).unwrap(), ServerName::DnsName(_)));
    }

    #[test]
    fn invalid_sni_is_internal() {
        let target = ProbeTarget::tls(
            Ipv4Addr::new(1, 2, 3, 4),
            443,
            TlsVersion::V1_2,
            Some("bad name with spaces".into()),
            None,
        );
        assert!(matches!(server_name(&target), Err(ProbeError::Internal(_))));
    }
}
