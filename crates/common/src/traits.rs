//! Core traits for tcp1620 components
//!
//! `Transport` is one request/response exchange over a fresh connection;
//! `Prober` turns a target into a finished outcome. The scheduler only
//! knows about `Prober`, the two-phase state machine only about `Transport`.

use async_trait::async_trait;
use std::fmt;

use crate::error::ExchangeFailure;
use crate::types::{ProbeOutcome, ProbeTarget};

/// Request methods used by the two probe phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Head,
    Post,
}

impl HttpMethod {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hand-built request to send to a target.
#[derive(Debug, Clone, Copy)]
pub struct Exchange<'a> {
    pub target: &'a ProbeTarget,
    pub method: HttpMethod,
    pub body: &'a [u8],
    /// Read the response until the peer closes.
    pub drain: bool,
}

impl<'a> Exchange<'a> {
    /// Liveness request: HEAD, no body, no drain.
    #[inline]
    #[must_use]
    pub fn liveness(target: &'a ProbeTarget) -> Self {
        Self {
            target,
            method: HttpMethod::Head,
            body: &[],
            drain: false,
        }
    }

    /// Interference request: POST with `body`, response drained.
    #[inline]
    #[must_use]
    pub fn body_probe(target: &'a ProbeTarget, body: &'a [u8]) -> Self {
        Self {
            target,
            method: HttpMethod::Post,
            body,
            drain: true,
        }
    }
}

/// What a successful exchange observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeReport {
    /// No byte arrived within the short window after the headers were sent.
    pub server_waits_for_body: bool,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// A single connection-level exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn exchange(&self, exchange: Exchange<'_>) -> Result<ExchangeReport, ExchangeFailure>;
}

/// Runs a complete probe against one target.
///
/// Implementations never fail: every network error ends up in the outcome.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &ProbeTarget) -> ProbeOutcome;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    struct Unreachable;

    #[async_trait]
    impl Prober for Unreachable {
        async fn probe(&self, _target: &ProbeTarget) -> ProbeOutcome {
            ProbeOutcome::Dead { error: None }
        }

        fn name(&self) -> &str {
            "unreachable"
        }
    }

    #[tokio::test]
    async fn prober_trait_object() {
        let prober: Box<dyn Prober> = Box::new(Unreachable);
        let target = ProbeTarget::plain(Ipv4Addr::LOCALHOST, 80, None);
        let outcome = prober.probe(&target).await;
        assert!(!outcome.alive());
        assert_eq!(prober.name(), "unreachable");
    }

    #[test]
    fn exchange_shapes() {
        let target = ProbeTarget::plain(Ipv4Addr::LOCALHOST, 80, None);
        let live = Exchange::liveness(&target);
        assert_eq!(live.method, HttpMethod::Head);
        assert!(live.body.is_empty());
        assert!(!live.drain);

        let body = [0u8; 16];
        let post = Exchange::body_probe(&target, &body);
        assert_eq!(post.method.as_str(), "POST");
        assert_eq!(post.body.len(), 16);
        assert!(post.drain);
    }
}
