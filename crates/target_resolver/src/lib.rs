//! Target Resolver - host lookup and informational A-record enumeration
//!
//! Turns the operator's host string (and optional forced address) into the
//! single IPv4 address every probe is sent to. A-record enumeration is
//! informational only; its failure never aborts a run.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};
use tracing::{debug, warn};
use trust_dns_resolver::system_conf::read_system_conf;
use trust_dns_resolver::TokioAsyncResolver;

use tcp1620_common::Tcp1620Error;

/// Outcome of pre-flight resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub host: String,
    pub ip: Ipv4Addr,
    /// Distinct A records seen (always contains `ip` when non-empty).
    pub a_records: Vec<Ipv4Addr>,
    /// `ip` came from the operator rather than DNS.
    pub forced: bool,
}

impl ResolvedTarget {
    /// True when the host string is the address itself.
    #[inline]
    #[must_use]
    pub fn host_is_ip(&self) -> bool {
        self.host == self.ip.to_string()
    }
}

pub struct TargetResolver;

impl TargetResolver {
    pub fn new() -> Self { Self }

    /// Resolve `host`, or take `forced_ip` verbatim when given.
    ///
    /// A records are only enumerated for real host names resolved via DNS.
    pub async fn resolve(host: &str, forced_ip: Option<&str>, depth: usize) -> Result<ResolvedTarget> {
        let host = host.trim();
        if host.is_empty() {
            return Err(Tcp1620Error::InvalidTarget("empty host".into()).into());
        }

        if let Some(raw) = forced_ip {
            let ip = parse_ipv4(raw)?;
            debug!(%host, %ip, "using operator-forced address");
            return Ok(ResolvedTarget {
                host: host.to_string(),
                ip,
                a_records: Vec::new(),
                forced: true,
            });
        }

        let ip = Self::lookup_ip(host).await?;
        let mut resolved = ResolvedTarget {
            host: host.to_string(),
            ip,
            a_records: Vec::new(),
            forced: false,
        };

        if !resolved.host_is_ip() && depth > 0 {
            match Self::fetch_a_records(host, ip, depth).await {
                Ok(records) => resolved.a_records = records,
                Err(e) => warn!(%host, error = %e, "A record enumeration failed"),
            }
        }

        Ok(resolved)
    }

    /// Resolve a host to one IPv4 address using the system resolver.
    ///
    /// IPv4 literals are returned unchanged. The lookup runs inside
    /// `tokio::task::spawn_blocking` to keep the runtime free.
    pub async fn lookup_ip(host: &str) -> Result<Ipv4Addr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return match ip {
                IpAddr::V4(v4) => Ok(v4),
                IpAddr::V6(_) => Err(Tcp1620Error::InvalidTarget(format!(
                    "{} is an IPv6 address; only IPv4 is probed",
                    host
                ))
                .into()),
            };
        }

        let owned = host.to_string();
        let addrs = tokio::task::spawn_blocking(move || {
            (owned.as_str(), 0)
                .to_socket_addrs()
                .map(|it| it.map(|a| a.ip()).collect::<Vec<IpAddr>>())
        })
        .await
        .context("Blocking DNS resolution failed")?
        .with_context(|| format!("Failed to resolve {}", host))?;

        addrs
            .into_iter()
            .find_map(|ip| match ip {
                IpAddr::V4(v4) => Some(v4),
                IpAddr::V6(_) => None,
            })
            .ok_or_else(|| Tcp1620Error::Resolve(format!("no IPv4 address for {}", host)).into())
    }

    /// Query the system nameservers `depth` times and collect every distinct
    /// A record, together with `lookup`. Caching is disabled so repeated
    /// queries can surface round-robin answers.
    pub async fn fetch_a_records(host: &str, lookup: Ipv4Addr, depth: usize) -> Result<Vec<Ipv4Addr>> {
        let (config, mut opts) = read_system_conf().context("Failed to read system DNS configuration")?;
        opts.cache_size = 0;
        let resolver = TokioAsyncResolver::tokio(config, opts);

        let mut records = BTreeSet::new();
        records.insert(lookup);
        for _ in 0..depth {
            let answer = resolver
                .ipv4_lookup(host)
                .await
                .with_context(|| format!("A lookup for {} failed", host))?;
            records.extend(answer.iter().map(|a| a.0));
        }

        debug!(%host, count = records.len(), "collected A records");
        Ok(records.into_iter().collect())
    }
}

/// Parse an operator-supplied IPv4 address.
pub fn parse_ipv4(raw: &str) -> Result<Ipv4Addr> {
    raw.trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| Tcp1620Error::InvalidTarget(format!("{} is not an IPv4 address", raw)).into())
}

impl Default for TargetResolver { fn default() -> Self { Self::new() } }
