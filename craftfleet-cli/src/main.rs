use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use env_logger::{Env, Target};
use log::{debug, info};
use similar::{ChangeTag, TextDiff};

use craftfleet_core::config::{StackConfig, parse_flag};
use craftfleet_core::resolver::{
    CONTROL_PLANE_REGION, CachedResolver, ParameterKey, ParameterResolver, StaticResolver,
};
use craftfleet_core::stack;
use craftfleet_core::topology::{Owner, Topology};
use craftfleet_provider_aws::SsmParameterResolver;

#[derive(Parser)]
#[command(name = "craftfleet")]
#[command(about = "Build the topology of an on-demand Minecraft server fleet", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use --param values instead of reading parameters from SSM
    #[arg(long, global = true)]
    offline: bool,

    /// Parameter value for offline builds (NAME=VALUE or NAME@REGION=VALUE)
    #[arg(long = "param", value_name = "NAME=VALUE", global = true, value_parser = parse_param)]
    params: Vec<(ParameterKey, String)>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the configuration and build the topology
    Validate,
    /// Show the topology grouped by owner
    Plan,
    /// Render the topology as JSON
    Synth {
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Compare the topology with a previously synthesized document
    Diff {
        /// Path to a document written by `synth`
        #[arg(long)]
        against: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let debug_env = std::env::var("DEBUG").is_ok_and(|v| parse_flag(&v));
    init_logging(cli.verbose || debug_env);

    let result = match &cli.command {
        Commands::Validate => run_validate(&cli).await,
        Commands::Plan => run_plan(&cli).await,
        Commands::Synth { out } => run_synth(&cli, out.as_deref()).await,
        Commands::Diff { against } => run_diff(&cli, against).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` always wins over the verbosity flag
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_module_path(false)
        .target(Target::Stderr)
        .init();
}

fn parse_param(raw: &str) -> Result<(ParameterKey, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let (name, region) = name.split_once('@').unwrap_or((name, CONTROL_PLANE_REGION));
    if name.is_empty() || region.is_empty() {
        return Err(format!("parameter name and region must not be empty in '{}'", raw));
    }
    if value.is_empty() {
        return Err(format!("parameter '{}' has an empty value", name));
    }
    Ok((ParameterKey::new(name, region), value.to_string()))
}

fn offline_resolver(params: &[(ParameterKey, String)]) -> StaticResolver {
    let mut resolver = StaticResolver::new();
    for (key, value) in params {
        resolver.insert(key.clone(), value.as_str());
    }
    resolver
}

fn get_resolver(cli: &Cli) -> Box<dyn ParameterResolver> {
    if cli.offline {
        info!("Using offline parameters ({} given)", cli.params.len());
        Box::new(offline_resolver(&cli.params))
    } else {
        info!("Using SSM parameter store");
        Box::new(SsmParameterResolver::new())
    }
}

async fn synthesize(cli: &Cli) -> Result<(StackConfig, Topology), String> {
    let config = StackConfig::from_env().map_err(|e| e.to_string())?;
    debug!(
        "Loaded configuration for {} with {} servers",
        config.domain_name,
        config.servers.len()
    );

    let resolver = CachedResolver::new(get_resolver(cli));
    let topology = stack::synthesize(&config, &resolver)
        .await
        .map_err(|e| e.to_string())?;
    debug!("{} parameter lookups", resolver.lookup_count());

    Ok((config, topology))
}

async fn run_validate(cli: &Cli) -> Result<(), String> {
    println!("{}", "Validating...".cyan());

    let (config, topology) = synthesize(cli).await?;

    println!(
        "{}",
        format!(
            "✓ {} servers validated successfully ({} edition, {}).",
            topology.tenant_count(),
            config.edition,
            config.domain_name
        )
        .green()
        .bold()
    );

    for nodes in topology.tenants() {
        println!("  • {} -> {} ({})", nodes.key, nodes.hostname, nodes.service.name);
    }
    println!("  Notifications: {}", notification_channels(&config));

    Ok(())
}

fn notification_channels(config: &StackConfig) -> String {
    let mut channels = Vec::new();
    if config.notification_email.is_some() {
        channels.push("email");
    }
    if config.sms.is_configured() {
        channels.push("sms");
    }
    if channels.is_empty() {
        "none".to_string()
    } else {
        channels.join(", ")
    }
}

async fn run_plan(cli: &Cli) -> Result<(), String> {
    let (_, topology) = synthesize(cli).await?;
    print_topology(&topology);
    Ok(())
}

fn print_topology(topology: &Topology) {
    println!("{}", "Topology:".cyan().bold());
    println!();

    for (owner, resources) in topology.group_by_owner() {
        let header = match &owner {
            Owner::Shared => owner.to_string().bold(),
            Owner::Tenant(_) => owner.to_string().yellow().bold(),
        };
        println!("{}", header);

        for resource in resources {
            let marker = if resource.is_data_source() {
                "?".normal()
            } else {
                "+".green().bold()
            };
            println!(
                "  {} {}.{}",
                marker,
                resource.id.resource_type.cyan().bold(),
                resource.id.name
            );
        }
        println!();
    }

    let summary = topology.summary();
    println!(
        "Topology: {} shared, {} per-server across {} servers, {} lookups.",
        summary.shared.to_string().green(),
        summary.per_tenant.to_string().green(),
        summary.tenants.to_string().yellow(),
        summary.lookups
    );
}

fn render(topology: &Topology) -> Result<String, String> {
    serde_json::to_string_pretty(&topology.to_json())
        .map(|mut json| {
            json.push('\n');
            json
        })
        .map_err(|e| format!("Failed to render topology: {}", e))
}

fn write_output(path: &Path, content: &str) -> Result<(), String> {
    fs::write(path, content).map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}

async fn run_synth(cli: &Cli, out: Option<&Path>) -> Result<(), String> {
    let (_, topology) = synthesize(cli).await?;
    let json = render(&topology)?;

    match out {
        Some(path) => {
            write_output(path, &json)?;
            println!(
                "{}",
                format!("✓ Wrote {} resources to {}", topology.len(), path.display())
                    .green()
                    .bold()
            );
        }
        None => print!("{}", json),
    }
    Ok(())
}

async fn run_diff(cli: &Cli, against: &Path) -> Result<(), String> {
    let previous = fs::read_to_string(against)
        .map_err(|e| format!("Failed to read {}: {}", against.display(), e))?;
    let (_, topology) = synthesize(cli).await?;
    let current = render(&topology)?;

    let counts = print_diff(against, &previous, &current);
    println!();
    if counts.is_empty() {
        println!("{}", "No changes.".green());
    } else if counts.removed == 0 {
        println!(
            "{}",
            format!("{} lines added, none removed.", counts.added).green()
        );
    } else {
        println!(
            "{}",
            format!(
                "{} lines added, {} removed. Existing resources change.",
                counts.added, counts.removed
            )
            .yellow()
        );
    }
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct DiffCounts {
    added: usize,
    removed: usize,
}

impl DiffCounts {
    fn is_empty(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

fn count_changes(original: &str, current: &str) -> DiffCounts {
    let mut counts = DiffCounts::default();
    for change in TextDiff::from_lines(original, current).iter_all_changes() {
        match change.tag() {
            ChangeTag::Delete => counts.removed += 1,
            ChangeTag::Insert => counts.added += 1,
            ChangeTag::Equal => {}
        }
    }
    counts
}

fn print_diff(file: &Path, original: &str, current: &str) -> DiffCounts {
    println!("\n{} {}:", "Diff against".cyan().bold(), file.display());

    let diff = TextDiff::from_lines(original, current);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-".red(),
            ChangeTag::Insert => "+".green(),
            ChangeTag::Equal => continue,
        };
        print!("{}{}", sign, change);
    }
    count_changes(original, current)
}
