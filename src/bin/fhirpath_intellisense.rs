//! Command-line front end for FHIRPath completion, diagnostics and symbol search

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use octofhir_fhirpath_intellisense::config::Config;
use octofhir_fhirpath_intellisense::diagnostics::{DiagnosticFormatter, Format, Severity};
use octofhir_fhirpath_intellisense::model::InMemoryTypeProvider;
use octofhir_fhirpath_intellisense::symbols::CancellationFlag;
use octofhir_fhirpath_intellisense::IntellisenseService;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "fhirpath-intellisense")]
#[command(about = "Completion, diagnostics and symbol search for FHIRPath documents")]
#[command(version)]
#[command(author = "OctoFHIR Team <funyloony@gmail.com>")]
struct Cli {
    /// JSON schema of type definitions (defaults to the bundled FHIR R4 core types)
    #[arg(long, global = true)]
    schema: Option<PathBuf>,
    /// Configuration file (defaults to .fhirpath-intellisense.toml in the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List completions at a byte offset of a document
    Complete {
        /// Document to complete in
        file: PathBuf,
        /// Byte offset of the cursor (defaults to the end of the document)
        #[arg(short, long)]
        offset: Option<usize>,
        /// Character that triggered completion
        #[arg(short, long)]
        trigger: Option<char>,
    },
    /// Report diagnostics for a document
    Check {
        /// Document to check
        file: PathBuf,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Index a workspace and search its symbols
    Symbols {
        /// Workspace root
        dir: PathBuf,
        /// Search query
        query: String,
        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
    Compact,
}

impl From<OutputFormat> for Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => Format::Json,
            OutputFormat::Text => Format::Text,
            OutputFormat::Compact => Format::Compact,
        }
    }
}

#[tokio::main]
async fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(2);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let config = load_config(cli.config.as_deref())?;
    let provider = match &cli.schema {
        Some(path) => InMemoryTypeProvider::from_file(path)
            .with_context(|| format!("Failed to load schema: {}", path.display()))?,
        None => InMemoryTypeProvider::fhir_r4_core(),
    };
    let service = IntellisenseService::new(Arc::new(provider), config);

    match cli.command {
        Commands::Complete {
            file,
            offset,
            trigger,
        } => {
            let text = read_document(&file)?;
            let offset = offset.unwrap_or(text.len());
            let candidates = service
                .complete_with(&text, offset, trigger, file.parent())
                .await;
            print_json(&candidates)?;
            Ok(0)
        }
        Commands::Check { file, format } => {
            let text = read_document(&file)?;
            let dir = file.parent().unwrap_or(Path::new("."));
            let diagnostics = service.diagnose_in(&text, dir).await;
            let formatter =
                DiagnosticFormatter::new(format.into()).with_origin(file.display().to_string());
            if !diagnostics.is_empty() || matches!(format, OutputFormat::Json) {
                println!("{}", formatter.format_all(&diagnostics, &text));
            }
            let failed = diagnostics.iter().any(|d| d.severity == Severity::Error);
            Ok(i32::from(failed))
        }
        Commands::Symbols { dir, query, limit } => {
            let report = service
                .index_workspace(&dir, &CancellationFlag::new())
                .await;
            log::info!("{report:?}");
            let mut options = service.config().search.clone();
            if let Some(limit) = limit {
                options.max_results = limit;
            }
            let results = service.search(&query, Some(&options));
            print_json(results.as_slice())?;
            Ok(0)
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let cwd = std::env::current_dir().context("Failed to read working directory")?;
            Config::find_config_file(&cwd)
        }
    };
    match path {
        Some(path) => Config::from_file(&path),
        None => Ok(Config::default()),
    }
}

fn read_document(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read '{}'", path.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}
