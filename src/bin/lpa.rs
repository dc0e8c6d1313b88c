use std::process::ExitCode;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use london_property_atlas::app::{App, ProgressSink};
use london_property_atlas::boundary::{BoundaryClient, BoundaryHttpClient};
use london_property_atlas::config::{AggregateSettings, BoundarySettings, ConfigLoader};
use london_property_atlas::error::AtlasError;
use london_property_atlas::output::{ConsoleOutput, JsonOutput, OutputMode};

#[derive(Parser)]
#[command(name = "lpa")]
#[command(about = "Builds London postcode boundaries and property/metric lookup tables")]
#[command(version)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download and merge postcode district boundaries")]
    Boundaries(BoundaryArgs),
    #[command(about = "Aggregate price and metric spreadsheets into JSON lookups")]
    Aggregate(AggregateArgs),
    #[command(about = "Run boundaries, then aggregate")]
    All(AllArgs),
}

#[derive(Args, Clone)]
struct BoundaryArgs {
    #[arg(long)]
    output: Option<String>,

    #[arg(long)]
    insecure: bool,
}

#[derive(Args, Clone)]
struct AggregateArgs {
    #[arg(long)]
    prices: Option<String>,

    #[arg(long)]
    metrics: Option<String>,

    #[arg(long)]
    out_dir: Option<String>,
}

#[derive(Args, Clone)]
struct AllArgs {
    #[command(flatten)]
    boundaries: BoundaryArgs,

    #[command(flatten)]
    aggregate: AggregateArgs,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<AtlasError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &AtlasError) -> u8 {
    match error {
        AtlasError::ConfigRead(_)
        | AtlasError::ConfigParse(_)
        | AtlasError::SheetOpen { .. }
        | AtlasError::EmptyWorkbook(_)
        | AtlasError::UnsupportedFormat(_)
        | AtlasError::MissingColumn { .. }
        | AtlasError::CellType { .. } => 2,
        AtlasError::HttpClient(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let resolved = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Boundaries(args) => {
            let settings = boundary_settings(resolved.boundaries, args);
            run_boundaries(&settings, output_mode)
        }
        Commands::Aggregate(args) => {
            let settings = aggregate_settings(resolved.aggregate, args);
            run_aggregate(&settings, output_mode)
        }
        Commands::All(args) => {
            let boundaries = boundary_settings(resolved.boundaries, args.boundaries);
            let aggregate = aggregate_settings(resolved.aggregate, args.aggregate);
            run_boundaries(&boundaries, output_mode)?;
            run_aggregate(&aggregate, output_mode)
        }
    }
}

fn boundary_settings(mut settings: BoundarySettings, args: BoundaryArgs) -> BoundarySettings {
    if let Some(output) = args.output {
        settings.output = Utf8PathBuf::from(output);
    }
    settings.insecure |= args.insecure;
    settings
}

fn aggregate_settings(settings: AggregateSettings, args: AggregateArgs) -> AggregateSettings {
    let mut resolved = match args.out_dir.as_deref() {
        Some(dir) => AggregateSettings {
            prices_input: settings.prices_input,
            metrics_input: settings.metrics_input,
            ..AggregateSettings::with_out_dir(Utf8Path::new(dir))
        },
        None => settings,
    };
    if let Some(prices) = args.prices {
        resolved.prices_input = Utf8PathBuf::from(prices);
    }
    if let Some(metrics) = args.metrics {
        resolved.metrics_input = Utf8PathBuf::from(metrics);
    }
    resolved
}

fn run_boundaries(settings: &BoundarySettings, output_mode: OutputMode) -> miette::Result<()> {
    let client = BoundaryHttpClient::new(settings.insecure)?;
    let app = App::new(client);
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.fetch_boundaries(settings, &JsonOutput)?;
            JsonOutput::print_boundaries(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let result = app.fetch_boundaries(settings, &ConsoleOutput)?;
            ConsoleOutput::print_boundaries(&result);
        }
    }
    Ok(())
}

fn run_aggregate(settings: &AggregateSettings, output_mode: OutputMode) -> miette::Result<()> {
    let app = App::new(NopBoundary);
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::NonInteractive => &JsonOutput,
        OutputMode::Interactive => &ConsoleOutput,
    };
    let result = app.aggregate(settings, sink)?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_aggregate(&result).into_diagnostic()?,
        OutputMode::Interactive => ConsoleOutput::print_aggregate(&result),
    }
    Ok(())
}

#[derive(Clone, Copy)]
struct NopBoundary;

impl BoundaryClient for NopBoundary {
    fn fetch_document(&self, _url: &str) -> Result<serde_json::Value, AtlasError> {
        Err(AtlasError::BoundaryHttp(
            "boundary client not configured".to_string(),
        ))
    }
}
