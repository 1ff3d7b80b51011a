use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cmr_harvester::app::{Harvester, ProgressSink};
use cmr_harvester::cmr::CmrHttpClient;
use cmr_harvester::config::{ConfigLoader, ContextLoader, DEFAULT_CONTEXT_FILE, HarvestConfig};
use cmr_harvester::dedup::GrqIndexClient;
use cmr_harvester::dispatch::{
    DEFAULT_JOB_NAME, DEFAULT_JOB_VERSION, DEFAULT_PRIORITY, DEFAULT_QUEUE, JobSpec, MozartClient,
    default_params, default_tag_template, dispatch_all,
};
use cmr_harvester::domain::ShortName;
use cmr_harvester::error::HarvestError;
use cmr_harvester::output::{JsonOutput, LogOutput, OutputMode};
use cmr_harvester::store::ProductStore;

#[derive(Parser)]
#[command(name = "cmr-harvest")]
#[command(about = "Harvest CMR granule metadata into deduplicated dataset products")]
#[command(version)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Scrape CMR for the granules described by a run context")]
    Scrape(ScrapeArgs),
    #[command(about = "Submit one scrape job per area of interest")]
    Submit(SubmitArgs),
}

#[derive(Args)]
struct ScrapeArgs {
    #[arg(long, default_value = DEFAULT_CONTEXT_FILE)]
    context: PathBuf,

    #[arg(long)]
    product_root: Option<Utf8PathBuf>,

    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct SubmitArgs {
    #[arg(short = 's', long)]
    short_name: String,

    #[arg(short = 'j', long, default_value = DEFAULT_JOB_NAME)]
    job_name: String,

    #[arg(short = 'v', long = "job-version", default_value = DEFAULT_JOB_VERSION)]
    job_version: String,

    #[arg(short = 'q', long, default_value = DEFAULT_QUEUE)]
    queue: String,

    #[arg(short = 'r', long, default_value_t = DEFAULT_PRIORITY)]
    priority: u8,

    #[arg(short = 'g', long)]
    tags: Option<String>,

    #[arg(short = 'p', long)]
    params: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<HarvestError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HarvestError) -> u8 {
    if error.is_configuration() {
        2
    } else if error.is_remote() {
        3
    } else {
        1
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Log
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Scrape(args) => run_scrape(args, config, output_mode),
        Commands::Submit(args) => run_submit(args, &config, output_mode),
    }
}

fn run_scrape(
    args: ScrapeArgs,
    mut config: HarvestConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    if let Some(root) = args.product_root {
        config.product_root = root;
    }
    if args.strict {
        config.strict_records = true;
    }

    let context = ContextLoader::load(&args.context)?;
    let catalog = CmrHttpClient::new(&config.cmr_url)?;
    let index = GrqIndexClient::new(&config.grq_es_url, &config.dedup_index_template)?;
    let store = ProductStore::new(config.product_root.clone());
    let harvester = Harvester::new(&config, catalog, index, store);

    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Log => &LogOutput,
    };
    let report = harvester.run(&context, sink)?;

    match output_mode {
        OutputMode::Json => JsonOutput::print_report(&report).map_err(miette::Report::msg)?,
        OutputMode::Log => info!(
            short_name = %report.short_name,
            fetched = report.fetched,
            written = report.written.len(),
            existing = report.skipped_existing.len(),
            invalid = report.skipped_invalid,
            "scrape finished"
        ),
    }
    Ok(())
}

fn run_submit(
    args: SubmitArgs,
    config: &HarvestConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let short_name: ShortName = args.short_name.parse()?;
    let mozart_rest_url = config.require_mozart_rest_url()?;

    let params = match args.params {
        Some(raw) => serde_json::from_str::<Map<String, Value>>(&raw)
            .map_err(|err| HarvestError::ConfigParse(format!("job params: {err}")))?,
        None => default_params(),
    };
    let tag_template = args
        .tags
        .unwrap_or_else(|| default_tag_template(chrono::Local::now().date_naive()));
    let spec = JobSpec {
        job_name: args.job_name,
        job_version: args.job_version,
        queue: args.queue,
        priority: args.priority,
        tag_template,
        params,
    };

    let client = MozartClient::new(&config.grq_es_url, mozart_rest_url)?;
    let submitted = dispatch_all(&client, &spec, &short_name)?;

    match output_mode {
        OutputMode::Json => JsonOutput::print_submitted(&submitted).map_err(miette::Report::msg)?,
        OutputMode::Log => info!(jobs = submitted.len(), "submission finished"),
    }
    Ok(())
}
