use std::path::PathBuf;

use clap::{ArgAction, Args, Command, FromArgMatches as _};

use crate::config::ModelConfig;
use crate::context::Context;
use crate::error::NowcastError;
use crate::log::{apply_log_spec, info, LevelFilter, LogSpec};

/// Command line arguments for a nowcast run
#[derive(Args, Debug, Clone)]
pub struct BaseArgs {
    /// Path to the observation feed (headerless CSV: date,dnc,tests,positivity,deaths,occupancy)
    #[arg(short, long, value_name = "PATH")]
    pub input: PathBuf,

    /// Optional path for a JSON model config file (population and parameter grid)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory for report output
    #[arg(short, long, default_value = ".", value_name = "PATH")]
    pub output_dir: PathBuf,

    /// Prefix for report file names
    #[arg(long, default_value = "")]
    pub file_prefix: String,

    /// Replace existing report files
    #[arg(short, long)]
    pub force_overwrite: bool,

    /// Enable logging at a global level and/or per module, e.g. `info` or
    /// `debug,epi_nowcast::scenario=trace`
    #[arg(short, long, value_name = "SPEC")]
    pub log_level: Option<String>,

    /// Increase logging verbosity (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Worker threads for running scenarios. Defaults to all logical cores.
    #[arg(short, long, default_value = "0", value_name = "NUM")]
    pub threads: usize,

    /// Do not print the execution summary
    #[arg(long)]
    pub no_stats: bool,

    /// Do not draw the scenario progress bar
    #[arg(long)]
    pub no_progress: bool,
}

fn create_nowcast_cli() -> Command {
    let cli = Command::new("epi-nowcast")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"));
    BaseArgs::augment_args(cli)
}

fn verbosity_level(verbose: u8) -> Option<LevelFilter> {
    match verbose {
        0 => None,
        1 => Some(LevelFilter::Info),
        2 => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    }
}

// Logging stays off unless asked for. An explicit global level beats `-v`.
fn configure_logging(args: &BaseArgs) -> Result<(), NowcastError> {
    let mut spec = match &args.log_level {
        Some(text) => LogSpec::parse(text)?,
        None => LogSpec::default(),
    };
    spec.global = spec.global.or_else(|| verbosity_level(args.verbose));
    apply_log_spec(&spec);
    Ok(())
}

/// Parses the command line and runs the whole nowcast.
///
/// # Errors
/// Returns an error if argument parsing or any stage of the run fails
#[allow(clippy::missing_errors_doc)]
pub fn run_with_args() -> Result<Context, Box<dyn std::error::Error>> {
    let matches = create_nowcast_cli().get_matches();
    let args = BaseArgs::from_arg_matches(&matches)?;
    run_with_args_internal(args)
}

fn run_with_args_internal(args: BaseArgs) -> Result<Context, Box<dyn std::error::Error>> {
    configure_logging(&args)?;

    let config = match &args.config {
        Some(path) => ModelConfig::load_from_json(path)?,
        None => {
            let config = ModelConfig::default();
            config.validate()?;
            config
        }
    };

    let mut context = Context::new(config);
    context
        .report_options()
        .directory(args.output_dir.clone())
        .file_prefix(args.file_prefix.clone())
        .overwrite(args.force_overwrite);
    context.set_threads(args.threads);
    context.set_show_progress(!args.no_progress);

    context.load(&args.input)?;
    for path in context.execute()? {
        info!("Report written: {}", path.display());
    }

    if !args.no_stats {
        context.print_execution_statistics();
    }
    Ok(context)
}
