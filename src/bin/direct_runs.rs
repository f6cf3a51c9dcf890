use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use direct_runs::algorithms::JsonAlgorithms;
use direct_runs::app::App;
use direct_runs::config::{ConfigLoader, InstrumentDefaults};
use direct_runs::error::ReductionError;
use direct_runs::finder::SearchPathResolver;
use direct_runs::output::{JsonOutput, OutputMode, TextOutput};
use direct_runs::services::Services;
use direct_runs::store::MemoryStore;
use direct_runs::value::PropertyValue;

#[derive(Parser)]
#[command(name = "direct-runs")]
#[command(about = "Reduction properties and run resolution for direct-geometry inelastic instruments")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Instrument defaults file (default: instrument-defaults.json)
    #[arg(long, global = true)]
    defaults: Option<String>,

    /// Additional directory to search for data and calibration files
    #[arg(long = "search-dir", global = true)]
    search_dirs: Vec<Utf8PathBuf>,

    /// Property override, `name=value`; may be repeated
    #[arg(long = "set", global = true, value_parser = parse_override)]
    overrides: Vec<(String, PropertyValue)>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Inspect and check reduction properties")]
    Props(PropsArgs),
    #[command(about = "Resolve run properties to datasets")]
    Run(RunArgs),
}

#[derive(Args)]
struct PropsArgs {
    #[command(subcommand)]
    command: PropsCommand,
}

#[derive(Subcommand)]
enum PropsCommand {
    #[command(about = "Show all properties with their current values")]
    Show,
    #[command(about = "Check that the files named by file properties exist")]
    CheckFiles(CheckFilesArgs),
    #[command(about = "Migrate defaults from another defaults file")]
    Migrate(MigrateArgs),
}

#[derive(Args)]
struct CheckFilesArgs {
    #[arg(long)]
    abs_units: bool,
}

#[derive(Args)]
struct MigrateArgs {
    from: String,

    #[arg(long)]
    ignore_changes: bool,
}

#[derive(Args)]
struct RunArgs {
    #[command(subcommand)]
    command: RunCommand,
}

#[derive(Subcommand)]
enum RunCommand {
    #[command(about = "Load, sum and calibrate a run property")]
    Resolve(ResolveArgs),
}

#[derive(Args)]
struct ResolveArgs {
    property: String,

    /// Action suffix appended to the dataset name, e.g. SPE
    #[arg(long)]
    suffix: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<ReductionError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ReductionError) -> u8 {
    match error {
        ReductionError::MissingConfig
        | ReductionError::ConfigRead(_)
        | ReductionError::ConfigParse(_) => 2,
        ReductionError::UndeclaredProperty(_) | ReductionError::InvalidValue { .. } => 2,
        ReductionError::FileNotFound(_)
        | ReductionError::FilesMissing { .. }
        | ReductionError::CalibrationSource(_) => 3,
        _ => 1,
    }
}

fn parse_override(text: &str) -> Result<(String, PropertyValue), String> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {text}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing property name in {text}"));
    }
    Ok((name.to_string(), PropertyValue::parse_cli(value.trim())))
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

    let defaults = ConfigLoader::resolve(cli.defaults.as_deref())?;
    let mut app = build_app(defaults, cli.search_dirs)?;
    app.apply_overrides(&cli.overrides)?;

    match cli.command {
        Commands::Props(args) => run_props(args.command, &mut app, output_mode),
        Commands::Run(args) => run_run(args.command, &mut app, output_mode),
    }
}

fn build_app(
    defaults: InstrumentDefaults,
    search_dirs: Vec<Utf8PathBuf>,
) -> Result<App, ReductionError> {
    let mut finder =
        SearchPathResolver::with_default_dirs()?.with_data_extensions(defaults.data_extensions.clone());
    for dir in search_dirs {
        finder.add_dir(dir);
    }
    let services = Services::new(MemoryStore::new(), finder, JsonAlgorithms);
    Ok(App::new(defaults, services))
}

fn run_props(
    command: PropsCommand,
    app: &mut App,
    output_mode: OutputMode,
) -> miette::Result<()> {
    match command {
        PropsCommand::Show => {
            let result = app.show()?;
            let printed = match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_properties(&result),
                OutputMode::Interactive => TextOutput::print_properties(&result),
            };
            printed.into_diagnostic()
        }
        PropsCommand::CheckFiles(args) => {
            let result = app.check_files(args.abs_units)?;
            let printed = match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_check_files(&result),
                OutputMode::Interactive => TextOutput::print_check_files(&result),
            };
            printed.into_diagnostic()
        }
        PropsCommand::Migrate(args) => {
            let other = ConfigLoader::resolve(Some(args.from.as_str()))?;
            let result = app.migrate(&other, args.ignore_changes)?;
            let printed = match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_migrate(&result),
                OutputMode::Interactive => TextOutput::print_migrate(&result),
            };
            printed.into_diagnostic()
        }
    }
}

fn run_run(command: RunCommand, app: &mut App, output_mode: OutputMode) -> miette::Result<()> {
    match command {
        RunCommand::Resolve(args) => {
            let result = app.resolve(&args.property, args.suffix.as_deref())?;
            let printed = match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_resolve(&result),
                OutputMode::Interactive => TextOutput::print_resolve(&result),
            };
            printed.into_diagnostic()
        }
    }
}
