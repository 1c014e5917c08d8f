//! Statements CLI - clean commission statements into Excel workbooks
//!
//! # Commands
//!
//! ```bash
//! statements serve                          # Start HTTP server (port 10000)
//! statements columns q1.csv                 # List the columns of a file
//! statements transform q1.csv -c Carrier    # Clean one file
//! statements batch q1.csv q2.xlsx --out-dir outputs
//! ```

use clap::{Parser, Subcommand};
use statements::{
    output_filename, process_batch, read_headers, transform, PipelineConfig, ServerConfig,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "statements")]
#[command(about = "Clean commission statements into Excel workbooks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "10000")]
        port: u16,
    },

    /// Print the column names of a statement file
    Columns {
        /// Input CSV or Excel file
        input: PathBuf,
    },

    /// Clean one statement file
    Transform {
        /// Input CSV or Excel file
        input: PathBuf,

        /// Output workbook (default: <input>_filtered.xlsx next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Column to keep, repeatable (default: all columns)
        #[arg(short, long = "column")]
        columns: Vec<String>,
    },

    /// Clean several files with one column selection
    Batch {
        /// Input CSV or Excel files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory for the generated workbooks
        #[arg(long)]
        out_dir: PathBuf,

        /// Column to keep, repeatable (default: all columns of the first file)
        #[arg(short, long = "column")]
        columns: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { port } => cmd_serve(port).await,

        Commands::Columns { input } => cmd_columns(&input),

        Commands::Transform {
            input,
            output,
            columns,
        } => cmd_transform(&input, output.as_deref(), columns),

        Commands::Batch {
            inputs,
            out_dir,
            columns,
        } => cmd_batch(&inputs, &out_dir, columns),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_serve(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    statements::server::start_server(ServerConfig::from_env(port), PipelineConfig::from_env())
        .await
}

fn cmd_columns(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    for column in read_headers(input)? {
        println!("{}", column);
    }
    Ok(())
}

fn cmd_transform(
    input: &Path,
    output: Option<&Path>,
    columns: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = match output {
        Some(p) => p.to_path_buf(),
        None => input.with_file_name(output_filename(input)),
    };
    let columns = columns_or_all(columns, input)?;

    let report = transform(input, &output, &columns, &PipelineConfig::from_env())?;

    eprintln!("\n📊 Rows written:    {}", report.rows_written);
    eprintln!("   Columns written: {}", report.columns_written.join(", "));
    match report.summary_rows {
        Some(n) => eprintln!("   Summary rows:    {}", n),
        None => eprintln!("   Summary:         skipped (no date column)"),
    }
    eprintln!("💾 Output written to: {}", report.output.display());
    Ok(())
}

fn cmd_batch(
    inputs: &[PathBuf],
    out_dir: &Path,
    columns: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(out_dir)?;
    let columns = match inputs.first() {
        Some(first) => columns_or_all(columns, first)?,
        None => columns,
    };

    let report = process_batch(inputs, out_dir, &columns, &PipelineConfig::from_env());

    for name in &report.outputs {
        eprintln!("💾 {}", out_dir.join(name).display());
    }
    if !report.failures.is_empty() {
        for failure in &report.failures {
            eprintln!("❌ {}: {}", failure.filename, failure.error);
        }
        return Err(format!("{} of {} files failed", report.failures.len(), inputs.len()).into());
    }
    Ok(())
}

/// An empty selection means every column of `input`.
fn columns_or_all(columns: Vec<String>, input: &Path) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    if columns.is_empty() {
        Ok(read_headers(input)?)
    } else {
        Ok(columns)
    }
}
