//! kvmscan - KVM-over-IP appliance fingerprinting
//!
//! This is the entry point for the `kvmscan` binary. It loads the indicator
//! document, wires the platform's probe adapters into the correlation engine
//! and writes the report to stdout.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use kvmscan_common::config::{Config, MdnsMode};
use kvmscan_common::logging::{init_logging_with_config, LogConfig, LogFormat};
use kvmscan_core::{MdnsResolver, Platform};
use kvmscan_engine::{CorrelationEngine, EngineSettings, Probes};
use kvmscan_indicators::load_knowledgebase;
use kvmscan_network::{ArpTableProbe, NativeMdnsResolver, SubprocessMdnsResolver};
use kvmscan_usb::UsbEnumerator;
use kvmscan_webapp::{WebConfig, WebProber};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// kvmscan KVM appliance scanner
#[derive(Parser, Debug)]
#[command(name = "kvmscan")]
#[command(version)]
#[command(about = "Fingerprint KVM-over-IP appliances by MAC, mDNS, USB and HTTP indicators", long_about = None)]
struct Args {
    /// Indicator document (YAML)
    #[arg(short, long, default_value = "indicators.yaml")]
    indicators: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Resolve mDNS names through the platform resolver instead of opening sockets
    #[arg(short = 'm', long)]
    no_mdns_listen: bool,

    /// Run configuration file path
    #[arg(short, long, default_value = "kvmscan.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, json, compact); overrides the config file
    #[arg(long)]
    log_format: Option<String>,

    /// Report format written to stdout
    #[arg(long, value_enum, default_value_t = Output::Json)]
    output: Output,

    /// Modality to leave out of the scan (repeatable)
    #[arg(long, value_enum)]
    skip: Vec<Stage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    Json,
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Stage {
    Arp,
    Mdns,
    Usb,
    Http,
}

impl Args {
    fn runs(&self, stage: Stage) -> bool {
        !self.skip.contains(&stage)
    }

    fn log_config(&self, config: &Config) -> LogConfig {
        let level = if self.debug {
            String::from("debug")
        } else {
            self.log_level
                .clone()
                .unwrap_or_else(|| config.logging.level.clone())
        };
        let format: LogFormat = self
            .log_format
            .as_deref()
            .unwrap_or(config.logging.format.as_str())
            .parse()
            .unwrap_or_default();

        let log_config = LogConfig::new().level(level).format(format);
        if self.debug {
            log_config.with_file()
        } else {
            log_config
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config_found = Path::new(&args.config).exists();
    let config = if config_found {
        Config::from_file(&args.config)
            .with_context(|| format!("Failed to load run configuration {}", args.config))?
    } else {
        Config::default()
    };
    let config = config.merge_env();

    // Initialize logging
    init_logging_with_config(args.log_config(&config));

    info!("kvmscan starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    if !config_found {
        info!(path = %args.config, "Config file not found, using defaults");
    }

    let kb = load_knowledgebase(&args.indicators)
        .with_context(|| format!("Failed to load indicator document {}", args.indicators))?;

    let platform = Platform::current();
    let probes = build_probes(&args, &config, platform);
    let settings = EngineSettings::from_config(&config.scan, platform);

    let engine = CorrelationEngine::new(Arc::new(kb), settings, probes);
    let report = engine.run().await;

    match args.output {
        Output::Json => println!("{}", report.to_json()?),
        Output::Summary => print!("{}", report),
    }

    Ok(())
}

/// Wire the platform's adapters for every modality not skipped on the
/// command line. A modality whose adapter cannot be built is left out.
fn build_probes(args: &Args, config: &Config, platform: Platform) -> Probes {
    let scan = &config.scan;
    let mut probes = Probes::new();

    if args.runs(Stage::Arp) {
        probes = probes.with_arp(Arc::new(ArpTableProbe::new(
            platform,
            &scan.excluded_ips,
            scan.command_timeout(),
        )));
    }

    if args.runs(Stage::Mdns) {
        if let Some(resolver) = mdns_resolver(args, config, platform) {
            probes = probes.with_mdns(resolver);
        }
    }

    if args.runs(Stage::Usb) {
        probes = probes.with_usb(Arc::new(UsbEnumerator::new(platform, scan.command_timeout())));
    }

    if args.runs(Stage::Http) {
        match WebProber::new(&WebConfig::from(scan)) {
            Ok(prober) => probes = probes.with_http(Arc::new(prober)),
            Err(e) => error!(modality = "HTTP", "Failed to build HTTP client: {}", e),
        }
    }

    probes
}

fn mdns_resolver(
    args: &Args,
    config: &Config,
    platform: Platform,
) -> Option<Arc<dyn MdnsResolver>> {
    let mode = if args.no_mdns_listen {
        MdnsMode::Subprocess
    } else {
        config.scan.mdns_mode
    };

    match mode {
        MdnsMode::Native => Some(Arc::new(NativeMdnsResolver::new())),
        MdnsMode::Subprocess => {
            match SubprocessMdnsResolver::for_platform(platform, config.scan.command_timeout()) {
                Some(resolver) => Some(Arc::new(resolver)),
                None => {
                    warn!(os = %platform, "No mDNS resolver command on this OS, skipping mDNS");
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_flags() {
        let args = Args::try_parse_from(["kvmscan", "-i", "kb.yaml", "-d", "-m"]).unwrap();
        assert_eq!(args.indicators, "kb.yaml");
        assert!(args.debug);
        assert!(args.no_mdns_listen);
        assert_eq!(args.output, Output::Json);
        assert!(args.skip.is_empty());
    }

    #[test]
    fn test_skip_is_repeatable() {
        let args =
            Args::try_parse_from(["kvmscan", "--skip", "usb", "--skip", "http", "--output", "summary"])
                .unwrap();
        assert!(args.runs(Stage::Arp));
        assert!(args.runs(Stage::Mdns));
        assert!(!args.runs(Stage::Usb));
        assert!(!args.runs(Stage::Http));
        assert_eq!(args.output, Output::Summary);
    }

    #[test]
    fn test_unknown_modality_rejected() {
        assert!(Args::try_parse_from(["kvmscan", "--skip", "bluetooth"]).is_err());
    }

    #[test]
    fn test_log_level_precedence() {
        let mut config = Config::default();
        config.logging.level = String::from("warn");

        let args = Args::try_parse_from(["kvmscan"]).unwrap();
        assert_eq!(args.log_config(&config).level, "warn");

        let args = Args::try_parse_from(["kvmscan", "--log-level", "trace"]).unwrap();
        assert_eq!(args.log_config(&config).level, "trace");

        let args = Args::try_parse_from(["kvmscan", "-d", "--log-level", "trace"]).unwrap();
        assert_eq!(args.log_config(&config).level, "debug");
    }

    #[test]
    fn test_skipped_modalities_have_no_probe() {
        let args = Args::try_parse_from([
            "kvmscan", "--skip", "arp", "--skip", "mdns", "--skip", "usb", "--skip", "http",
        ])
        .unwrap();
        let probes = build_probes(&args, &Config::default(), Platform::Linux);
        assert!(probes.arp.is_none());
        assert!(probes.mdns.is_none());
        assert!(probes.usb.is_none());
        assert!(probes.http.is_none());
    }

    #[test]
    fn test_subprocess_resolver_unavailable_on_windows() {
        let args = Args::try_parse_from(["kvmscan", "-m"]).unwrap();
        assert!(mdns_resolver(&args, &Config::default(), Platform::Windows).is_none());
        assert!(mdns_resolver(&args, &Config::default(), Platform::Linux).is_some());
    }
}
