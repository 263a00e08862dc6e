//! tcp1620 transport - raw HTTP/1.1 exchanges and the two-phase prober
//!
//! This crate owns every socket the prober opens:
//! - hand-built request heads (`request`)
//! - version-pinned, verification-free TLS clients (`tls`)
//! - the timed exchange with its early-response check (`transport`)
//! - the liveness/body-probe state machine (`prober`)

pub mod prober;
pub mod request;
pub mod tls;
pub mod transport;

pub use prober::TwoPhaseProber;
pub use request::build_request_head;
pub use transport::NetworkTransport;

use std::sync::Arc;
use tcp1620_common::{ProbeOptions, TrafficAccountant};

/// Build the production prober for `options`, sharing `accountant`.
pub fn network_prober(options: &ProbeOptions, accountant: Arc<TrafficAccountant>) -> TwoPhaseProber<NetworkTransport> {
    let transport = NetworkTransport::from_options(options, Arc::clone(&accountant));
    TwoPhaseProber::new(transport, accountant).with_body_size(options.body_size)
}
