use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sheetbook_core::{CodecConfig, Document, MergePolicy};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod formatter;

#[derive(Parser)]
#[command(name = "sheetbook")]
#[command(about = "Convert and inspect SpreadsheetML and ODS workbooks", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a workbook and save it in the format of the output extension
    Convert {
        /// Source file (.xml or .ods)
        #[arg(value_name = "IN")]
        input: PathBuf,

        /// Destination file (.xml or .ods)
        #[arg(value_name = "OUT")]
        output: PathBuf,

        /// Reject writes into covered cells of merged regions
        #[arg(long)]
        strict_merges: bool,

        /// Drop styles no cell, row, column or table references before saving
        #[arg(long)]
        clear_unused_styles: bool,
    },
    /// Print sheets, styles and load diagnostics of a workbook
    Inspect {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Convert {
            input,
            output,
            strict_merges,
            clear_unused_styles,
        } => {
            let mut config = config;
            if strict_merges {
                config.global.merge_policy = MergePolicy::Strict;
                config.sheets.clear();
            }
            convert(config, &input, &output, clear_unused_styles)
        }
        Command::Inspect { file } => inspect(config, &file),
    }
}

fn load_config(path: Option<&Path>) -> Result<CodecConfig> {
    if let Some(config_path) = path {
        return CodecConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()));
    }
    // Try to load default config from current directory if it exists
    let default_config_path = PathBuf::from("sheetbook.toml");
    if default_config_path.exists() {
        CodecConfig::from_file(&default_config_path).with_context(|| {
            format!(
                "Failed to load config from {}",
                default_config_path.display()
            )
        })
    } else {
        Ok(CodecConfig::default())
    }
}

fn convert(config: CodecConfig, input: &Path, output: &Path, clear_unused: bool) -> Result<()> {
    debug!(input = %input.display(), output = %output.display(), clear_unused, "converting");
    let mut document = Document::with_config(config);
    let workbook = document
        .load(input)?
        .with_context(|| format!("Cannot open {}", input.display()))?;

    let loaded: Vec<_> = workbook.diagnostics().cloned().collect();
    let removed = if clear_unused {
        workbook.clear_unused_styles()
    } else {
        Vec::new()
    };

    let saved = document
        .save_as(output)
        .with_context(|| format!("Failed to convert {}", input.display()))?;

    formatter::print_conversion(input, output, &removed);
    formatter::print_diagnostics("Load", &loaded);
    formatter::print_diagnostics("Save", &saved);
    Ok(())
}

fn inspect(config: CodecConfig, file: &Path) -> Result<()> {
    let mut document = Document::with_config(config);
    let workbook = document
        .load(file)?
        .with_context(|| format!("Cannot open {}", file.display()))?;

    formatter::print_summary(file, workbook);
    let diagnostics: Vec<_> = workbook.diagnostics().cloned().collect();
    formatter::print_diagnostics("Load", &diagnostics);
    Ok(())
}
