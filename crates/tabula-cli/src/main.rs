//! Tabula CLI - render CSV templates against JSON data

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tabula::prelude::*;
use tabula::{CsvReadOptions, CsvWriteOptions};
use tracing::info;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "tabula")]
#[command(author, version, about = "Spreadsheet template renderer")]
struct Cli {
    /// More log output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a CSV template and write the result as CSV
    Render {
        /// Template CSV file
        #[arg(short, long)]
        template: PathBuf,

        /// JSON object whose keys become template variables
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Region to repeat, as NAME=A2:C3 (repeatable)
        #[arg(short, long = "name", value_name = "NAME=RANGE")]
        names: Vec<String>,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Field delimiter for input and output
        #[arg(long, default_value = ",")]
        delimiter: char,

        /// Deepest region nesting that is still expanded
        #[arg(long, default_value = "16")]
        max_depth: usize,

        /// Exit with status 2 when the template recorded errors
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Render {
            template,
            data,
            names,
            output,
            delimiter,
            max_depth,
            strict,
        } => {
            let failed = render(
                &template,
                data.as_deref(),
                &names,
                output.as_deref(),
                delimiter,
                max_depth,
            )?;
            if strict && failed {
                std::process::exit(2);
            }
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Render one template; returns whether any template error was recorded
fn render(
    template: &Path,
    data: Option<&Path>,
    names: &[String],
    output: Option<&Path>,
    delimiter: char,
    max_depth: usize,
) -> Result<bool> {
    let read_options = CsvReadOptions::default()
        .with_delimiter(delimiter)
        .context("Invalid delimiter")?;
    let mut workbook = CsvReader::read_file(template, &read_options)
        .with_context(|| format!("Failed to open '{}'", template.display()))?;
    let sheet = read_options.sheet_name.clone();

    for arg in names {
        let (name, range) = parse_name(arg)?;
        workbook
            .define_name(name, &format!("{}!{}", sheet, range))
            .with_context(|| format!("Invalid region '{}'", arg))?;
    }

    let options = RenderOptions {
        max_depth,
        ..RenderOptions::default()
    };
    let mut report = ReportTemplate::with_options(workbook, options);
    if let Some(path) = data {
        for (name, value) in load_data(path)? {
            report.add_variable(name, value);
        }
    }

    let errors = report.render().context("Failed to render template")?;
    for error in errors.iter() {
        eprintln!("{}", error);
    }

    let workbook = report.into_workbook();
    let sheet = workbook
        .worksheet(0)
        .context("Template has no worksheet")?;
    let write_options = CsvWriteOptions::default()
        .with_delimiter(delimiter)
        .context("Invalid delimiter")?;
    match output {
        Some(path) => {
            CsvWriter::write_file(sheet, path, &write_options)
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            info!(path = %path.display(), errors = errors.len(), "wrote report");
        }
        None => {
            let text = CsvWriter::write_string(sheet, &write_options)?;
            io::stdout().write_all(text.as_bytes())?;
        }
    }
    Ok(!errors.is_empty())
}

/// Split `NAME=A2:C3`
fn parse_name(spec: &str) -> Result<(&str, &str)> {
    match spec.split_once('=') {
        Some((name, range)) if !name.trim().is_empty() && !range.trim().is_empty() => {
            Ok((name.trim(), range.trim()))
        }
        _ => bail!("Expected NAME=RANGE, got '{}'", spec),
    }
}

/// Top-level keys of a JSON object, as variables
fn load_data(path: &Path) -> Result<Vec<(String, Value)>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    let json: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid JSON in '{}'", path.display()))?;
    let serde_json::Value::Object(map) = json else {
        bail!("'{}' must hold a JSON object", path.display());
    };
    Ok(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
}
