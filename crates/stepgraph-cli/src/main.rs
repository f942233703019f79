use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use stepgraph_core::intake;
use stepgraph_core::{
    AbilityCatalog, FlowGraph, Step, flow_to_service, service_to_flow, validate_flow,
    validate_steps,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// ── CLI ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "stepgraph",
    about = "Convert workflows between step lists and flow graphs"
)]
struct Cli {
    /// Also write JSON logs to a daily-rotated file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a generated step list into a flow graph
    ToFlow {
        /// Step list file, or `-` for stdin
        input: PathBuf,

        /// JSON array of `{"title", "type"}` abilities used to categorize nodes
        #[arg(long)]
        abilities: Option<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Convert a flow graph back into a numbered step list
    ToSteps {
        /// Flow graph file, or `-` for stdin
        input: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Validate a step list or flow graph without writing anything
    Check {
        /// Step list or flow graph file, or `-` for stdin
        input: PathBuf,
    },
}

#[derive(clap::Args)]
struct OutputArgs {
    /// Write the result here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Emit single-line JSON
    #[arg(long)]
    compact: bool,
}

// ── Logging ─────────────────────────────────────────────────────

fn init_logging(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let (file, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log dir: {}", dir.display()))?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("stepgraph")
                .filename_suffix("txt")
                .build(dir)
                .context("Failed to create log file appender")?;
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new("trace"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(console).with(file).init();
    Ok(guard)
}

// ── Input / output ──────────────────────────────────────────────

fn read_input(input: &Path) -> Result<String> {
    if input == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read input: {}", input.display()))
}

fn load_catalog(path: &Path) -> Result<AbilityCatalog> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read abilities: {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse abilities: {}", path.display()))?;
    let catalog = AbilityCatalog::from_value(&value);
    info!("Loaded {} abilities from {}", catalog.len(), path.display());
    Ok(catalog)
}

fn render<T: Serialize>(value: &T, compact: bool) -> Result<String> {
    let text = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    text.context("Failed to serialize output")
}

fn write_output<T: Serialize>(value: &T, args: &OutputArgs) -> Result<()> {
    let text = render(value, args.compact)?;
    match &args.output {
        Some(path) => std::fs::write(path, text + "\n")
            .with_context(|| format!("Failed to write output: {}", path.display())),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

/// Editor submissions carry a `nodes` key; anything else is a step list.
fn is_flow_graph(text: &str) -> bool {
    serde_json::from_str::<Value>(intake::extract_json(text))
        .is_ok_and(|value| value.get("nodes").is_some())
}

// ── Commands ────────────────────────────────────────────────────

fn steps_to_flow(text: &str, catalog: Option<&AbilityCatalog>) -> Result<FlowGraph> {
    let list = intake::parse_step_list(text).context("Failed to read step list")?;
    if !list.warnings.is_empty() {
        warn!("{} step(s) or link(s) were skipped", list.warnings.len());
    }
    if let Err(e) = validate_steps(&list.steps) {
        warn!("Step list is incomplete: {}", e);
    }
    Ok(service_to_flow(&list.steps, catalog))
}

fn flow_to_steps(text: &str) -> Result<Vec<Step>> {
    let graph = intake::parse_flow_graph(text).context("Failed to read flow graph")?;
    flow_to_service(&graph).context("Failed to convert flow graph")
}

fn check(text: &str) -> Result<String> {
    if is_flow_graph(text) {
        let graph = intake::parse_flow_graph(text).context("Failed to read flow graph")?;
        validate_flow(&graph).context("Flow graph is invalid")?;
        let steps = flow_to_service(&graph)?;
        return Ok(format!(
            "Flow graph OK: {} nodes, {} edges, {} reachable from the trigger",
            graph.nodes.len(),
            graph.edges.len(),
            steps.len()
        ));
    }

    let list = intake::parse_step_list(text).context("Failed to read step list")?;
    validate_steps(&list.steps).context("Step list is invalid")?;
    let flow = service_to_flow(&list.steps, None);
    let mut summary = format!(
        "Step list OK: {} steps, {} links",
        list.steps.len(),
        flow.edges.len()
    );
    if !list.warnings.is_empty() {
        summary.push_str(&format!(", {} skipped", list.warnings.len()));
    }
    Ok(summary)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.log_dir.as_deref())?;

    match cli.command {
        Command::ToFlow {
            input,
            abilities,
            output,
        } => {
            let catalog = abilities.as_deref().map(load_catalog).transpose()?;
            let flow = steps_to_flow(&read_input(&input)?, catalog.as_ref())?;
            write_output(&flow, &output)
        }
        Command::ToSteps { input, output } => {
            let steps = flow_to_steps(&read_input(&input)?)?;
            write_output(&steps, &output)
        }
        Command::Check { input } => {
            println!("{}", check(&read_input(&input)?)?);
            Ok(())
        }
    }
}
