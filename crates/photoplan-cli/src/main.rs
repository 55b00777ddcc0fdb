use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use photoplan_core::{
    execute_plan, spawn_analysis, AppState, CancellationToken, Config, CopyReport,
    ExtensionFilter, NominatimResolver, OpenAiChat, PlanFile, ProgressCallback,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "photoplan", version, about = "Organize photos into folders planned by a language model from their EXIF place and date")]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print place and capture date of every photo in a folder
    Scan {
        /// Folder to scan
        input: PathBuf,

        #[command(flatten)]
        scan: ScanArgs,
    },
    /// Scan a folder and ask the model where each photo should go
    Analyze(AnalyzeArgs),
    /// Copy files according to a saved plan
    Copy {
        /// Plan file written by `analyze --save-plan`
        #[arg(long)]
        plan: PathBuf,

        /// Replace files that already exist at the destination
        #[arg(long)]
        overwrite: bool,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// Extensions to include (jpg, jpeg, png, tiff, nef, cr2, arw, raf)
    #[arg(long, value_delimiter = ',')]
    ext: Vec<String>,

    /// Reverse geocoding endpoint
    #[arg(long, env = "PHOTOPLAN_GEOCODER_URL")]
    geocoder_url: Option<String>,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Folder with the photos to organize
    input: PathBuf,

    /// Destination folder
    output: PathBuf,

    #[command(flatten)]
    scan: ScanArgs,

    /// Put every photo into one folder
    #[arg(long)]
    single_folder: bool,

    /// Tell the model what the destination folder already contains
    #[arg(long)]
    include_destination: bool,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Write the reviewed plan to this file
    #[arg(long)]
    save_plan: Option<PathBuf>,

    /// Copy right after planning
    #[arg(long)]
    copy: bool,

    /// Replace files that already exist at the destination
    #[arg(long)]
    overwrite: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let t_total = Instant::now();

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        warn!("cancelling");
        handler_token.cancel();
    })
    .context("failed to install Ctrl-C handler")?;

    match cli.command {
        Command::Scan { input, scan } => run_scan(&input, scan, &token)?,
        Command::Analyze(args) => run_analyze(args, &token)?,
        Command::Copy { plan, overwrite } => run_copy(&plan, overwrite, &token)?,
    }

    eprintln!("Done! ({:.2}s)", t_total.elapsed().as_secs_f64());
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "photoplan=debug,photoplan_core=debug"
    } else {
        "photoplan=info,photoplan_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(scan: &ScanArgs) -> Config {
    let mut config = Config::from_env();
    if let Some(url) = &scan.geocoder_url {
        config.geocoder.base_url = url.clone();
    }
    config
}

fn progress_bar() -> anyhow::Result<(ProgressBar, Arc<ProgressCallback<'static>>)> {
    let pb = ProgressBar::new(0);
    pb.set_style(ProgressStyle::default_bar().template("[{bar:40}] {pos}/{len} {prefix} {wide_msg}")?);
    let bar = pb.clone();
    let callback: Arc<ProgressCallback<'static>> =
        Arc::new(move |stage: &str, current: u64, total: u64, message: &str| {
            bar.set_length(total);
            bar.set_position(current + 1);
            bar.set_prefix(stage.to_string());
            bar.set_message(message.to_string());
        });
    Ok((pb, callback))
}

fn run_scan(input: &Path, scan: ScanArgs, token: &CancellationToken) -> anyhow::Result<()> {
    let config = load_config(&scan);
    let filter = ExtensionFilter::new(&scan.ext)?;
    let resolver = NominatimResolver::new(&config.geocoder)?;

    let (pb, progress) = progress_bar()?;
    let records =
        photoplan_core::scan::scan_folder(input, &filter, &resolver, progress.as_ref(), Some(token))?;
    pb.finish_and_clear();

    for record in &records {
        let date = record
            .captured_at
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{}\t{}\t{}", record.file_path.display(), record.place, date);
    }
    info!(
        files = records.len(),
        located = records.iter().filter(|r| r.has_place()).count(),
        dated = records.iter().filter(|r| r.captured_at.is_some()).count(),
        "scan finished"
    );
    Ok(())
}

fn run_analyze(args: AnalyzeArgs, token: &CancellationToken) -> anyhow::Result<()> {
    let mut config = load_config(&args.scan);
    if args.api_key.is_some() {
        config.llm.api_key = args.api_key.clone();
    }
    if let Some(model) = &args.model {
        config.llm.model = model.clone();
    }

    let mut state = AppState::new();
    state.select_import_folder(&args.input);
    state.select_target_folder(&args.output);
    state.multiple_folders = !args.single_folder;
    state.include_destination = args.include_destination;
    state.overwrite = args.overwrite;
    state.extensions = ExtensionFilter::new(&args.scan.ext)?;

    let options = state
        .analyze_options()
        .context("output folder must not be the input folder or inside it")?;
    let resolver = Arc::new(NominatimResolver::new(&config.geocoder)?);
    let backend = Arc::new(OpenAiChat::new(&config.llm)?);

    let (pb, progress) = progress_bar()?;
    let handle = spawn_analysis(options, resolver, backend, Arc::clone(&progress), token.clone());
    let plan = handle.join();
    pb.finish_and_clear();
    let plan = state.accept_plan(plan?);

    if plan.is_empty() {
        info!("nothing to copy");
        return Ok(());
    }
    for placement in plan.iter() {
        println!(
            "{} -> {}",
            placement.source.display(),
            plan.relative_destination(placement).display()
        );
    }

    if let Some(path) = &args.save_plan {
        PlanFile::new((*plan).clone())?
            .save(path)
            .with_context(|| format!("failed to save plan to {}", path.display()))?;
        info!(path = %path.display(), "plan saved");
    }

    if args.copy {
        let (pb, progress) = progress_bar()?;
        let report = state.copy(progress.as_ref(), Some(token));
        pb.finish_and_clear();
        print_report(&report?)?;
    }
    Ok(())
}

fn run_copy(path: &Path, overwrite: bool, token: &CancellationToken) -> anyhow::Result<()> {
    let plan = PlanFile::load(path)
        .with_context(|| format!("failed to load plan {}", path.display()))?
        .into_current_plan()?;

    let (pb, progress) = progress_bar()?;
    let report = execute_plan(&plan, overwrite, progress.as_ref(), Some(token));
    pb.finish_and_clear();
    print_report(&report?)
}

fn print_report(report: &CopyReport) -> anyhow::Result<()> {
    for (path, error) in &report.failed {
        warn!(path = %path.display(), %error, "not copied");
    }
    eprintln!(
        "{} files copied, {} skipped, {} failed",
        report.copied.len(),
        report.skipped.len(),
        report.failed.len()
    );
    if !report.failed.is_empty() {
        bail!("{} files could not be copied", report.failed.len());
    }
    Ok(())
}
