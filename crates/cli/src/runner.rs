// runner.rs
use anyhow::{Context, Result};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::info;

use crate::args::{Cli, Preset};
use crate::output::{print_progress, print_report, Report};
use tcp1620_common::{DecoyIdentity, ProbeOptions, TrafficAccountant};
use tcp1620_orchestrator::{matrix, Scheduler};
use tcp1620_target_resolver::TargetResolver;
use tcp1620_transport::network_prober;

pub async fn run_probe(cli: Cli) -> Result<()> {
    let options = build_options(&cli)?;

    info!("Resolving {}...", cli.host);
    let resolved = TargetResolver::resolve(&cli.host, cli.ip.as_deref(), options.dns_fetch_depth)
        .await
        .with_context(|| format!("Failed to resolve target '{}'", cli.host))?;
    info!("Target {} -> {}", resolved.host, resolved.ip);

    let decoy = DecoyIdentity::generate(options.decoy_label_len, &options.decoy_tld);
    let targets = matrix::generate(resolved.ip, &resolved.host, &decoy)
        .context("Failed to build the probe matrix")?;
    info!("Decoy identity: {}", decoy);
    info!("Probe matrix: {} combinations", targets.len());

    let accountant = Arc::new(TrafficAccountant::new());
    let prober = Arc::new(network_prober(&options, Arc::clone(&accountant)));
    let scheduler = Scheduler::new(prober, accountant, &options).with_progress(Arc::new(print_progress));

    let started = Instant::now();
    let result = scheduler.run(targets).await?;
    let elapsed = started.elapsed();

    let report = Report {
        resolved: &resolved,
        decoy: &decoy,
        options: &options,
        result: &result,
        elapsed,
    };
    print_report(&report, cli.output)?;
    Ok(())
}

/// Start from the preset and apply explicit flag overrides.
fn build_options(cli: &Cli) -> Result<ProbeOptions> {
    let mut options = match cli.preset {
        Preset::Default => ProbeOptions::default(),
        Preset::Fast => ProbeOptions::fast(),
        Preset::Careful => ProbeOptions::careful(),
    };

    if let Some(secs) = cli.timeout {
        options = options.with_request_timeout(Duration::from_secs(secs));
    }
    if let Some(ms) = cli.wait_timeout {
        options = options.with_waits_for_body_timeout(Duration::from_millis(ms));
    }
    if let Some(ms) = cli.delay {
        options = options.with_submit_delay(Duration::from_millis(ms));
    }
    if let Some(workers) = cli.workers {
        options = options.with_max_in_flight(workers);
    }
    if let Some(depth) = cli.dns_depth {
        options.dns_fetch_depth = depth;
    }

    options.validate().context("Invalid probe options")?;
    Ok(options)
}
