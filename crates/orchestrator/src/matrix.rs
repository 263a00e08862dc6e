//! Task matrix - every port/TLS/SNI/Host combination for one target

use std::collections::HashSet;
use std::net::Ipv4Addr;

use tcp1620_common::{
    DecoyIdentity, ProbeTarget, Tcp1620Error, Tcp1620Result, TlsVersion, HTTPS_PORT, HTTP_PORT,
};

/// Number of targets `generate` yields.
#[must_use]
pub const fn expected_len(host_is_ip: bool) -> usize {
    let (hosts, snis) = if host_is_ip { (3, 2) } else { (4, 3) };
    hosts * (snis * TlsVersion::ALL.len() + 2)
}

/// Build the full probe matrix.
///
/// Per Host-header option, in submission order: every TLS variant on 443
/// (SNI x version), plaintext on 443, plaintext on 80. When `host` is the
/// address itself, the "real host" options are dropped since they would
/// duplicate the IP ones.
pub fn generate(ip: Ipv4Addr, host: &str, decoy: &DecoyIdentity) -> Tcp1620Result<Vec<ProbeTarget>> {
    let ip_str = ip.to_string();
    let decoy = decoy.as_str().to_string();
    let host_is_ip = host == ip_str;

    let host_headers: Vec<Option<String>> = if host_is_ip {
        vec![Some(ip_str), Some(decoy.clone()), None]
    } else {
        vec![Some(host.to_string()), Some(ip_str), Some(decoy.clone()), None]
    };
    let snis: Vec<Option<String>> = if host_is_ip {
        vec![Some(decoy), None]
    } else {
        vec![Some(host.to_string()), Some(decoy), None]
    };

    let mut targets = Vec::with_capacity(expected_len(host_is_ip));
    for host_header in &host_headers {
        for sni in &snis {
            for version in TlsVersion::ALL {
                targets.push(ProbeTarget::tls(
                    ip,
                    HTTPS_PORT,
                    version,
                    sni.clone(),
                    host_header.clone(),
                ));
            }
        }
        targets.push(ProbeTarget::plain(ip, HTTPS_PORT, host_header.clone()));
        targets.push(ProbeTarget::plain(ip, HTTP_PORT, host_header.clone()));
    }

    validate(&targets)?;
    Ok(targets)
}

fn validate(targets: &[ProbeTarget]) -> Tcp1620Result<()> {
    let mut seen = HashSet::with_capacity(targets.len());
    for target in targets {
        if !seen.insert(target) {
            return Err(Tcp1620Error::InvalidMatrix(format!("duplicate target {}", target)));
        }
    }
    Ok(())
}
