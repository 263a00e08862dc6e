use clap::{Parser, ValueEnum};

#[derive(Parser)]
#[command(name = "tcp1620")]
#[command(version)]
#[command(about = "Detects size-triggered middlebox interference on HTTP and TLS", long_about = None)]
pub struct Cli {
    /// Host to probe (name or IPv4 address). Example: example.com
    #[arg(long, required = true)]
    pub host: String,

    /// Probe this IPv4 address instead of resolving the host
    #[arg(long)]
    pub ip: Option<String>,

    /// Request timeout in seconds (overrides the preset)
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Early-response window in milliseconds (overrides the preset)
    #[arg(long)]
    pub wait_timeout: Option<u64>,

    /// Delay between probe submissions in milliseconds (overrides the preset)
    #[arg(long)]
    pub delay: Option<u64>,

    /// Max probes in flight (overrides the preset)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Number of DNS queries used to enumerate A records (0 disables)
    #[arg(long)]
    pub dns_depth: Option<usize>,

    /// Timing preset
    #[arg(long, value_enum, default_value_t = Preset::Default)]
    pub preset: Preset,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    Default,
    Fast,
    Careful,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_is_required() {
        assert!(Cli::try_parse_from(["tcp1620"]).is_err());
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["tcp1620", "--host", "example.com"]).unwrap();
        assert_eq!(cli.host, "example.com");
        assert_eq!(cli.preset, Preset::Default);
        assert_eq!(cli.output, OutputFormat::Text);
        assert!(cli.ip.is_none());
        assert!(cli.timeout.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn all_flags() {
        let cli = Cli::try_parse_from([
            "tcp1620",
            "--host",
            "example.com",
            "--ip",
            "93.184.216.34",
            "-t",
            "10",
            "--wait-timeout",
            "2000",
            "--delay",
            "0",
            "--workers",
            "8",
            "--dns-depth",
            "3",
            "--preset",
            "careful",
            "-o",
            "json",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.ip.as_deref(), Some("93.184.216.34"));
        assert_eq!(cli.timeout, Some(10));
        assert_eq!(cli.wait_timeout, Some(2000));
        assert_eq!(cli.delay, Some(0));
        assert_eq!(cli.workers, Some(8));
        assert_eq!(cli.dns_depth, Some(3));
        assert_eq!(cli.preset, Preset::Careful);
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn unknown_output_is_rejected() {
        assert!(Cli::try_parse_from(["tcp1620", "--host", "a", "-o", "xml"]).is_err());
    }
}
