use clap::{Parser, Subcommand};
use imgshift::config::{self, AppConfig};
use imgshift::convert::BatchPolicy;
use imgshift::download::DirectorySink;
use imgshift::imaging::{IcoMode, Quality, RustBackend, TargetFormat};
use imgshift::output;
use imgshift::selection::{self, SelectionStore};
use imgshift::session::ConversionSession;
use imgshift::usage::{Audience, UsageTracker};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "imgshift")]
#[command(about = "Convert images to JPEG, PNG, WEBP or ICO")]
#[command(long_about = "\
Convert images to JPEG, PNG, WEBP or ICO

Every input image becomes one output file named after it, with the new
extension: photo.v1.png → photo.v1.webp. Non-image files are skipped.

Format notes:
  jpg, webp   quality 1-100 applies (default 90)
  png         lossless, quality ignored
  ico         stretched to 256x256, quality ignored

By default a batch is all-or-nothing: if any image fails, nothing is saved.
Pass --partial to save whatever converted.

Run 'imgshift gen-config' to generate a documented imgshift.toml.")]
#[command(version)]
struct Cli {
    /// Directory containing imgshift.toml
    #[arg(long, default_value = ".", global = true)]
    config: PathBuf,

    /// Log debug detail to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Input files and directories.
#[derive(clap::Args, Clone)]
struct InputArgs {
    /// Image files or directories
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,
}

#[derive(clap::Args, Clone)]
struct ConvertArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Output format: jpg, png, webp or ico
    #[arg(long, value_name = "FORMAT")]
    to: Option<TargetFormat>,

    /// Quality for jpg/webp output (1-100)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=100))]
    quality: Option<u32>,

    /// Output directory
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Write a real ICO container instead of a PNG payload
    #[arg(long)]
    ico_container: bool,

    /// Save the images that converted even if others failed
    #[arg(long)]
    partial: bool,

    /// Count this run against the signed-in user quota
    #[arg(long)]
    user: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Convert images and save the results
    Convert(ConvertArgs),
    /// Show which files would be selected
    List(InputArgs),
    /// Show or reset today's usage counter
    Usage {
        /// Show the signed-in user counter instead of the guest one
        #[arg(long)]
        user: bool,
        /// Clear all recorded usage
        #[arg(long)]
        reset: bool,
    },
    /// Print a stock imgshift.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Convert(args) => {
            let app_config = config::load_config(&cli.config)?;
            run_convert(args, &cli.config, &app_config)?;
        }
        Command::List(args) => {
            let files = selection::files_from_paths(&args.paths, args.recursive)?;
            let mut store = SelectionStore::new();
            store.add(files)?;
            output::print_selection(&store);
        }
        Command::Usage { user, reset } => {
            let app_config = config::load_config(&cli.config)?;
            let mut tracker = open_tracker(&cli.config, &app_config)?;
            if reset {
                tracker.reset()?;
                println!("Usage counters cleared");
            }
            let audience = audience(user);
            output::print_usage(
                audience,
                tracker.usage_count(audience),
                tracker.remaining_quota(audience),
                tracker.limits().for_audience(audience),
            );
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn run_convert(
    args: ConvertArgs,
    config_dir: &Path,
    app_config: &AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = args
        .to
        .or(app_config.convert.format)
        .ok_or("no output format: pass --to or set convert.format in imgshift.toml")?;

    let audience = audience(args.user);
    let mut tracker = open_tracker(config_dir, app_config)?;
    if app_config.usage.enforce && tracker.remaining_quota(audience) == 0 {
        return Err(format!(
            "daily limit of {} conversions reached for {}",
            tracker.limits().for_audience(audience),
            audience
        )
        .into());
    }

    init_thread_pool(&app_config.processing);
    let files = selection::files_from_paths(&args.input.paths, args.input.recursive)?;
    let out_dir = args.out.unwrap_or_else(|| app_config.output.dir.clone());
    let sink = DirectorySink::new(out_dir);

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_event(&event);
        }
    });

    let mut session = ConversionSession::new(RustBackend::new()).with_events(tx);
    let mut request = app_config.request_for(format);
    if let Some(quality) = args.quality {
        request.quality = Quality::new(quality);
    }
    if args.ico_container {
        request.ico_mode = IcoMode::Container;
    }
    session.apply_request(request);
    session.set_policy(if args.partial {
        BatchPolicy::Partial
    } else {
        app_config.convert.policy
    });

    let result = session.add(files).and_then(|_| session.convert(&sink));
    // Dropping the session closes the channel so the printer can finish.
    drop(session);
    printer.join().map_err(|_| "output thread panicked")?;

    if let Some(report) = result? {
        let used = tracker.increment(audience)?;
        info!(
            batch = %report.batch,
            saved = report.saved.len(),
            %audience,
            used,
            "usage recorded"
        );
    }
    Ok(())
}

fn audience(user: bool) -> Audience {
    if user { Audience::User } else { Audience::Guest }
}

fn open_tracker(
    config_dir: &Path,
    app_config: &AppConfig,
) -> Result<UsageTracker, Box<dyn std::error::Error>> {
    Ok(UsageTracker::open(
        app_config.usage.state_path(config_dir),
        app_config.usage.limits(),
    )?)
}

/// Structured logs go to stderr; `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init()
        .ok();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
