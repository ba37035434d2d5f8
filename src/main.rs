use augmentor::config::{self, Overrides, Tool};
use augmentor::{logging, output, process, scan};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "augmentor")]
#[command(about = "Batch image augmentation for training-image datasets")]
#[command(long_about = "\
Batch image augmentation for training-image datasets

Writes N transformed variants of every source image. Steps run in a fixed
order, whatever order the config file lists them in:

  resize → crop_to_ratio → rotate → flip_horizontal → flip_vertical →
  shear → blur → noise → brightness → exposure → cutout

Two presets:

  process   a folder of photos, fixed transforms, names like cat_aug.jpg
  create    one photo, random fill-scale rotations, names like versione_0001.jpg

Settings are layered: preset ← --config file ← command-line flags.
Run 'augmentor gen-config --tool creator' for a documented config file.")]
#[command(version)]
struct Cli {
    /// Config file (TOML) layered over the tool preset
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum ToolArg {
    Processor,
    Creator,
}

impl From<ToolArg> for Tool {
    fn from(tool: ToolArg) -> Self {
        match tool {
            ToolArg::Processor => Tool::Processor,
            ToolArg::Creator => Tool::Creator,
        }
    }
}

/// Shared flags for commands that write variants.
#[derive(clap::Args, Clone)]
struct RunArgs {
    /// Source image file or folder
    #[arg(long)]
    source: Option<PathBuf>,

    /// Destination folder
    #[arg(long)]
    output: Option<PathBuf>,

    /// Variants per source image
    #[arg(long)]
    copies: Option<u32>,

    /// Write a JSON run report to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Augment every image of a file or folder
    Process {
        #[command(flatten)]
        run: RunArgs,

        /// Descend into subfolders (`--recursive false` to stay at the top level)
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        recursive: Option<bool>,
    },
    /// Create a dataset of numbered versions of one image file
    Create {
        #[command(flatten)]
        run: RunArgs,
    },
    /// List sources and the resolved steps without writing anything
    Check {
        /// Source image file or folder
        #[arg(long)]
        source: Option<PathBuf>,

        /// Preset to check against
        #[arg(long, value_enum, default_value = "processor")]
        tool: ToolArg,
    },
    /// Print a stock config file with all options documented
    GenConfig {
        #[arg(long, value_enum, default_value = "processor")]
        tool: ToolArg,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Command::Process { run, recursive } => {
            let overrides = Overrides {
                recursive: *recursive,
                ..overrides_from(run)
            };
            run_batch(&cli, Tool::Processor, &overrides, run.report.as_deref())?;
        }
        Command::Create { run } => {
            run_batch(&cli, Tool::Creator, &overrides_from(run), run.report.as_deref())?;
        }
        Command::Check { source, tool } => {
            let overrides = Overrides {
                source: source.clone(),
                ..Overrides::default()
            };
            let config = config::layered_config((*tool).into(), cli.config.as_deref(), &overrides)?;
            config.validate_options()?;
            config.validate_source_for((*tool).into())?;
            logging::init_from_config(&config.logging, cli.verbose, cli.json_logs);

            let source = config
                .source
                .path
                .as_deref()
                .ok_or("no source given (set source.path or pass --source)")?;
            println!("==> Checking {}", source.display());
            let sources = scan::discover_sources(
                source,
                config.source.recursive,
                config.output.destination.as_deref(),
            )?;
            output::print_check(&config, &sources, &config.steps.resolve());
        }
        Command::GenConfig { tool } => {
            print!("{}", config::stock_config_toml((*tool).into()));
        }
    }

    Ok(())
}

fn overrides_from(run: &RunArgs) -> Overrides {
    Overrides {
        source: run.source.clone(),
        destination: run.output.clone(),
        recursive: None,
        copies: run.copies,
    }
}

/// Load config, run the batch with a progress printer, then print the summary.
fn run_batch(
    cli: &Cli,
    tool: Tool,
    overrides: &Overrides,
    report: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config(tool, cli.config.as_deref(), overrides)?;
    logging::init_from_config(&config.logging, cli.verbose, cli.json_logs);
    init_thread_pool(&config.processing);

    let source_root = display_root(config.source.path.as_deref().unwrap_or(Path::new(".")));
    let destination = config
        .output
        .destination
        .as_deref()
        .unwrap_or(Path::new("."));
    println!("==> Augmenting {} → {}", source_root.display(), destination.display());

    let (tx, rx) = std::sync::mpsc::channel();
    let printer_root = source_root.clone();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_batch_event(&event, &printer_root);
        }
    });
    let result = process::run_batch(&config, Some(tx));
    printer
        .join()
        .map_err(|_| "progress printer thread panicked")?;
    let result = result?;

    println!();
    output::print_summary(&result, &source_root);
    if let Some(report) = report {
        process::write_report(&result, report)?;
        println!("Report: {}", report.display());
    }
    Ok(())
}

/// Folder that progress paths are shown relative to.
fn display_root(source: &Path) -> PathBuf {
    if source.is_file() {
        source.parent().map(Path::to_path_buf).unwrap_or_default()
    } else {
        source.to_path_buf()
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
