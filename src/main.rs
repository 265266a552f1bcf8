use batch_expand::batch::BatchRunner;
use batch_expand::export::{self, ExportError};
use batch_expand::imaging::GeometryError;
use batch_expand::intake::{self, IntakeReport};
use batch_expand::jobs::JobQueue;
use batch_expand::service::{ExpansionAdapter, GeminiClient};
use batch_expand::types::{AspectRatio, OutputFormat};
use batch_expand::{config, output};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "batch-expand")]
#[command(about = "Expand photos to a new aspect ratio with a generative image model")]
#[command(long_about = "\
Expand photos to a new aspect ratio with a generative image model

Each image keeps its original pixels untouched in the centre of a larger
canvas; the model paints only the new border. Results are packaged into a
zip archive (or written as separate files).

  batch-expand expand photos/ --ratio 16:9 --format jpg
  batch-expand check photos/ --ratio 4:5
  batch-expand ratios

The API key is read from the environment variable named by service.api_key_env
(default GEMINI_API_KEY). Set RUST_LOG=info or RUST_LOG=debug for diagnostics.

Run 'batch-expand gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Directory containing config.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Inputs and ratio shared by commands that read images.
#[derive(clap::Args, Clone)]
struct InputArgs {
    /// Image files or directories (searched recursively)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Target aspect ratio as W:H (default from config)
    #[arg(long)]
    ratio: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Expand every image and export the results
    Expand {
        #[command(flatten)]
        input: InputArgs,

        /// Download format (default from config)
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        /// Output directory for the archive or files
        #[arg(long, default_value = ".")]
        output: PathBuf,

        /// Write one file per image instead of a zip archive
        #[arg(long)]
        separate: bool,
    },
    /// Validate images and show the planned canvases without calling the model
    Check(InputArgs),
    /// List aspect ratio presets
    Ratios,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Expand {
            input,
            format,
            output: output_dir,
            separate,
        } => {
            let app_config = config::load_config(&cli.config_dir)?;
            let ratio = resolve_ratio(input.ratio, &app_config)?;
            let format = format.unwrap_or(app_config.export.format);
            let api_key = app_config.api_key()?;

            let report = read_inputs(&input.inputs, &app_config).await;
            if report.accepted.is_empty() {
                println!("==> Nothing to expand");
                return Ok(());
            }

            let mut queue = JobQueue::new();
            queue.select_ratio(ratio.as_str());
            queue.select_format(format);
            queue.enqueue(report.accepted);
            let queue = queue.into_shared();

            let client = GeminiClient::new(app_config.gemini_config(api_key))?;
            log::info!("using model {}", client.model());
            let expander = Arc::new(ExpansionAdapter::new(client));
            init_thread_pool(&app_config.processing);

            println!("==> Expanding to {}", ratio);
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_batch_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let runner = BatchRunner::new(queue.clone(), expander, app_config.batch_settings())
                .with_events(tx);
            let outcome = runner.run_all().await;
            drop(runner);
            printer.join().map_err(|_| "progress printer panicked")?;
            output::print_batch_outcome(&outcome);

            let (completed, format) = {
                let q = queue.lock();
                (q.completed(), q.format())
            };
            println!("==> Exporting {} → {}", format, output_dir.display());
            let settings = app_config.export_settings();
            let exported = if separate {
                export::export_separate(&completed, format, &settings)
                    .and_then(|(entries, report)| {
                        let paths = write_entries(&output_dir, &entries)?;
                        Ok(output::format_files_written(&paths, &report))
                    })
            } else {
                export::package(&completed, format, &settings).and_then(|archive| {
                    std::fs::create_dir_all(&output_dir)?;
                    let path = output_dir.join(&archive.name);
                    std::fs::write(&path, &archive.bytes)?;
                    Ok(output::format_archive_written(&path, &archive.report))
                })
            };
            match exported {
                Ok(lines) => lines.iter().for_each(|l| println!("{}", l)),
                Err(ExportError::NothingToExport) => {
                    queue
                        .lock()
                        .set_notice(Some(ExportError::NothingToExport.to_string()));
                }
                Err(e) => return Err(e.into()),
            }

            output::print_job_table(&queue.lock());
        }
        Command::Check(input) => {
            let app_config = config::load_config(&cli.config_dir)?;
            let ratio = resolve_ratio(input.ratio, &app_config)?;
            let report = read_inputs(&input.inputs, &app_config).await;
            output::print_check_plan(&report.accepted, &ratio, app_config.expansion.max_dimension);
        }
        Command::Ratios => {
            let app_config = config::load_config(&cli.config_dir)?;
            output::print_ratios(&app_config.expansion.default_ratio);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// CLI ratio if given, else the configured default. Must parse as `W:H`.
fn resolve_ratio(cli_ratio: Option<String>, app_config: &config::AppConfig) -> Result<String, GeometryError> {
    let ratio = cli_ratio.unwrap_or_else(|| app_config.expansion.default_ratio.clone());
    match AspectRatio::parse(&ratio) {
        Some(_) => Ok(ratio.trim().to_string()),
        None => Err(GeometryError::InvalidRatio(ratio)),
    }
}

async fn read_inputs(inputs: &[PathBuf], app_config: &config::AppConfig) -> IntakeReport {
    let limits = app_config.intake_limits();
    let files = intake::collect_inputs(inputs);
    println!("==> Reading {} file(s)", files.len());
    let report = intake::intake_paths(&files, &limits).await;
    output::print_intake(&report, &limits);
    report
}

fn write_entries(dir: &Path, entries: &[export::ExportEntry]) -> Result<Vec<PathBuf>, ExportError> {
    std::fs::create_dir_all(dir)?;
    entries
        .iter()
        .map(|entry| {
            let path = dir.join(&entry.name);
            std::fs::write(&path, &entry.bytes)?;
            Ok(path)
        })
        .collect()
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores — user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
