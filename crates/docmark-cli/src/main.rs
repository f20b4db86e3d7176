//! docmark command-line interface.
//!
//! A thin shim over the library: flags map onto [`ConversionConfig`], results go to stdout
//! and failures are printed as a structured JSON error report on stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use docmark::{ConversionConfig, DocmarkError, DocumentConverter, ErrorReport, FormatSniffer, InputDocument};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "docmark",
    version,
    about = "Convert documents, web pages, data files and media to Markdown",
    arg_required_else_help = true
)]
struct Cli {
    /// Enable DEBUG-level logs on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a file to Markdown.
    Convert {
        file: PathBuf,

        /// Declared content type, e.g. `text/csv`.
        #[arg(long)]
        content_type: Option<String>,

        /// Configuration file (toml, yaml or json). Defaults to a discovered `docmark.toml`.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Keep inline `data:` images instead of truncating them.
        #[arg(long)]
        keep_data_uris: bool,

        /// Downscale kept inline images above this size in KiB.
        #[arg(long)]
        max_image_size_kb: Option<u64>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,

        /// Write the result here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the candidate formats detected for a file.
    Detect {
        file: PathBuf,

        #[arg(long)]
        content_type: Option<String>,
    },

    /// List the registered converters.
    Converters {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Convert {
            file,
            content_type,
            config,
            keep_data_uris,
            max_image_size_kb,
            format,
            output,
        } => {
            let mut config = load_config(config.as_deref())?;
            if keep_data_uris {
                config.keep_data_uris = true;
            }
            if max_image_size_kb.is_some() {
                config.max_image_size_kb = max_image_size_kb;
            }

            let converter = DocumentConverter::with_builtins(config)?;
            let result = converter.convert_file(&file, content_type.as_deref()).await?;
            for warning in &result.warnings {
                tracing::warn!("{}", warning);
            }

            let rendered = match format {
                OutputFormat::Markdown => result.markdown,
                OutputFormat::Json => {
                    let mut json = serde_json::to_string_pretty(&result).context("Failed to serialize result")?;
                    json.push('\n');
                    json
                }
            };
            write_output(output.as_deref(), &rendered)
        }

        Command::Detect { file, content_type } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let filename = file.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
            let document = InputDocument::new(bytes, filename);
            let document = match content_type {
                Some(content_type) => document.with_content_type(content_type),
                None => document,
            };

            let config = load_config(None)?;
            let sniffer = FormatSniffer::new(config.sniff_window_bytes);
            for candidate in sniffer.sniff_document(&document) {
                println!("{}\t{:?}", candidate.format, candidate.source);
            }
            Ok(())
        }

        Command::Converters { config } => {
            let config = load_config(config.as_deref())?;
            let converter = DocumentConverter::with_builtins(config)?;
            for info in converter.registry().infos() {
                let formats = info
                    .formats
                    .map(|formats| formats.join(","))
                    .unwrap_or_else(|| "*".to_string());
                let capabilities = info
                    .capabilities
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                println!("{}\t{}\t{}\t{}", info.id, info.priority, formats, capabilities);
            }
            Ok(())
        }
    }
}

/// Explicit file, else a discovered `docmark.toml`, else defaults; then environment overrides.
fn load_config(path: Option<&Path>) -> Result<ConversionConfig> {
    let mut config = match path {
        Some(path) => ConversionConfig::from_file(path)?,
        None => ConversionConfig::discover()?.unwrap_or_default(),
    };
    config.tools.apply_env_overrides();
    Ok(config)
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), bytes = content.len(), "Wrote output");
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(content.as_bytes())
                .context("Failed to write to stdout")?;
            handle.flush().context("Failed to flush stdout")?;
        }
    }
    Ok(())
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<DocmarkError>() {
        Some(docmark_error) => {
            let report = ErrorReport::from(docmark_error);
            match serde_json::to_string_pretty(&report) {
                Ok(json) => eprintln!("{}", json),
                Err(_) => eprintln!("Error: {}", docmark_error),
            }
        }
        None => eprintln!("Error: {:#}", err),
    }
}
