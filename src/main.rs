//! blast-radius - show what else is affected when one AWS resource changes

mod cli;

use anyhow::{Context, Result, anyhow};
use blast_radius::cloud::{AwsApi, CloudClients, SnapshotApi};
use blast_radius::config::{Config, ConfigLoader, split_list};
use blast_radius::discover::Discoverer;
use blast_radius::output::{self, OutputFormat};
use clap::{Parser, Subcommand};
use cli::ConfigSubcommand;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Discover the blast radius of an AWS resource
#[derive(Parser, Debug)]
#[command(name = "blast-radius")]
#[command(
    about = "Discover what else in an AWS account is affected when one resource changes",
    long_about = None
)]
#[command(args_conflicts_with_subcommands = true)]
struct Args {
    /// Resource ARN or friendly name (e.g. "my-alb", "cluster/service", "orders-db")
    resource: Option<String>,

    /// Maximum traversal depth (root is 0)
    #[arg(long)]
    depth: Option<usize>,

    /// Maximum number of resources to discover
    #[arg(long)]
    max_nodes: Option<usize>,

    /// Comma-separated heuristics to enable (e.g. rds-endpoint)
    #[arg(long)]
    heuristics: Option<String>,

    /// Output format
    #[arg(long, short = 'f', value_enum)]
    format: Option<OutputFormat>,

    /// Resources expanded at once within a level
    #[arg(long)]
    concurrency: Option<usize>,

    /// Give up after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Account snapshot (YAML or JSON) to discover against instead of the live account
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// AWS shared-config profile for live discovery
    #[arg(long)]
    profile: Option<String>,

    /// AWS region for live discovery
    #[arg(long)]
    region: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'd')]
    debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

/// Main commands
#[derive(Subcommand, Debug)]
enum Command {
    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
    /// Display version information
    Version,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = cli::init_logging(args.debug, args.log_file.as_deref()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(2);
    }

    if let Err(e) = run(args).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(mut args: Args) -> Result<()> {
    match args.command.take() {
        Some(Command::Config { subcommand }) => return cli::handle_config_command(subcommand),
        Some(Command::Version) => {
            cli::display_version();
            return Ok(());
        }
        None => {}
    }

    let config = ConfigLoader::load().context("Failed to load configuration")?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    discover_command(&args, config, &mut out).await
}

/// Run one discovery with `args` layered over `config` and render the graph to `out`
async fn discover_command(args: &Args, mut config: Config, out: &mut dyn Write) -> Result<()> {
    let resource = args
        .resource
        .as_deref()
        .ok_or_else(|| anyhow!("A resource ARN or name is required (see --help)"))?;

    apply_flags(args, &mut config);
    let clients = connect(args, &config).await?;

    let discoverer = Discoverer::new(clients, config.discovery.to_options());
    let discovery = discoverer.discover(resource).await?;

    for failure in &discovery.failures {
        tracing::debug!("Partial expansion of {}: {}", failure.node_id, failure.source);
    }
    if !discovery.failures.is_empty() {
        tracing::warn!(
            "{} resources could not be fully expanded; the graph may be incomplete",
            discovery.failures.len()
        );
    }

    output::render(config.output.format, out, &discovery.graph, &discovery.root_id)?;
    Ok(())
}

/// Command-line flags win over the loaded configuration
fn apply_flags(args: &Args, config: &mut Config) {
    if let Some(depth) = args.depth {
        config.discovery.max_depth = depth;
    }
    if let Some(max_nodes) = args.max_nodes {
        config.discovery.max_nodes = max_nodes;
    }
    if let Some(heuristics) = &args.heuristics {
        config.discovery.heuristics = split_list(heuristics);
    }
    if let Some(concurrency) = args.concurrency {
        config.discovery.concurrency = concurrency;
    }
    if let Some(timeout) = args.timeout {
        config.discovery.timeout_seconds = Some(timeout);
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if let Some(snapshot) = &args.snapshot {
        config.snapshot = Some(snapshot.clone());
    }
}

/// Snapshot clients when a snapshot is configured, live AWS clients otherwise
async fn connect(args: &Args, config: &Config) -> Result<CloudClients> {
    if let Some(snapshot) = config.snapshot.as_deref() {
        if args.profile.is_some() || args.region.is_some() {
            tracing::warn!("--profile and --region are ignored when discovering from a snapshot");
        }
        let api = SnapshotApi::load(snapshot)?;
        return Ok(CloudClients::from_shared(Arc::new(api)));
    }

    let api = AwsApi::connect(args.profile.as_deref(), args.region.as_deref()).await;
    let Some(region) = api.region() else {
        return Err(anyhow!("No AWS region configured; pass --region or set AWS_REGION"));
    };
    tracing::info!("Discovering against the live account in {}", region);
    Ok(CloudClients::from_shared(Arc::new(api)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use std::path::Path;

    const DEMO: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/snapshots/demo.yaml");

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("blast-radius").chain(argv.iter().copied())).unwrap()
    }

    async fn discover_text(argv: &[&str], config: Config) -> String {
        let mut out = Vec::new();
        discover_command(&parse(argv), config, &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    async fn discover_json(argv: &[&str], config: Config) -> serde_json::Value {
        serde_json::from_str(&discover_text(argv, config).await).unwrap()
    }

    fn node_count(doc: &serde_json::Value) -> usize {
        doc["nodes"].as_array().unwrap().len()
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse(&[
            "web",
            "--depth",
            "1",
            "--max-nodes",
            "7",
            "--heuristics",
            "rds-endpoint, ,",
            "-f",
            "dot",
            "--concurrency",
            "2",
            "--timeout",
            "30",
            "--snapshot",
            DEMO,
        ]);
        let mut config = Config::default();
        config.discovery.max_depth = 5;
        config.discovery.max_nodes = 100;

        apply_flags(&args, &mut config);

        assert_eq!(config.discovery.max_depth, 1);
        assert_eq!(config.discovery.max_nodes, 7);
        assert_eq!(config.discovery.heuristics, vec!["rds-endpoint".to_string()]);
        assert_eq!(config.discovery.concurrency, 2);
        assert_eq!(config.discovery.timeout_seconds, Some(30));
        assert_eq!(config.output.format, OutputFormat::Dot);
        assert_eq!(config.snapshot.as_deref(), Some(Path::new(DEMO)));
    }

    #[test]
    fn test_unset_flags_keep_config() {
        let mut config = Config::default();
        config.discovery.max_nodes = 12;
        config.output.format = OutputFormat::Json;
        let expected = config.clone();

        apply_flags(&parse(&["web"]), &mut config);

        assert_eq!(config, expected);
    }

    #[test]
    fn test_invalid_format_rejected() {
        let err = Args::try_parse_from(["blast-radius", "web", "--format", "yaml"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);

        let err = Args::try_parse_from(["blast-radius", "web", "-f", "svg"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_account_flags_parse() {
        let args = parse(&["--profile", "prod", "--region", "eu-west-1", "orders-db"]);
        assert_eq!(args.profile.as_deref(), Some("prod"));
        assert_eq!(args.region.as_deref(), Some("eu-west-1"));
        assert_eq!(args.resource.as_deref(), Some("orders-db"));
        assert!(args.snapshot.is_none());
    }

    #[test]
    fn test_config_subcommand_parses() {
        let args = parse(&["config", "path"]);
        assert!(matches!(args.command, Some(Command::Config { .. })));
        assert!(args.resource.is_none());
    }

    #[tokio::test]
    async fn test_max_nodes_flag_caps_demo_run() {
        let mut config = Config::default();
        config.discovery.max_nodes = 250;

        let argv = ["web", "--max-nodes", "4", "-f", "json", "--snapshot", DEMO];
        let doc = discover_json(&argv, config).await;

        assert_eq!(node_count(&doc), 4);
    }

    #[tokio::test]
    async fn test_depth_flag_beats_config() {
        let mut shallow = Config::default();
        shallow.discovery.max_depth = 0;
        let argv = ["web", "--depth", "2", "-f", "json", "--snapshot", DEMO];
        let full = discover_json(&argv, shallow).await;
        assert_eq!(node_count(&full), 10);

        let mut deep = Config::default();
        deep.discovery.max_depth = 5;
        let argv = ["web", "--depth", "0", "-f", "json", "--snapshot", DEMO];
        let cut = discover_json(&argv, deep).await;
        assert!(node_count(&cut) < 10);
    }

    #[tokio::test]
    async fn test_snapshot_from_config() {
        let mut config = Config::default();
        config.snapshot = Some(DEMO.into());
        config.output.format = OutputFormat::Json;

        let doc = discover_json(&["web"], config).await;

        assert_eq!(node_count(&doc), 10);
    }

    #[tokio::test]
    async fn test_heuristics_flag_adds_dashed_edges() {
        let argv = ["orders-db", "--heuristics", "rds-endpoint", "-f", "dot", "--snapshot", DEMO];
        let text = discover_text(&argv, Config::default()).await;
        assert!(text.contains("(heuristic)"));

        let mut config = Config::default();
        config.snapshot = Some(DEMO.into());
        config.output.format = OutputFormat::Dot;
        let plain = discover_text(&argv[..1], config).await;
        assert!(!plain.contains("(heuristic)"));
    }

    #[tokio::test]
    async fn test_missing_resource_is_an_error() {
        let mut out = Vec::new();
        let err = discover_command(&parse(&["--snapshot", DEMO]), Config::default(), &mut out)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("resource"));
        assert!(out.is_empty());
    }
}
