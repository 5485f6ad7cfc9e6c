//! Command-line front end for the traffic importer.
//!
//! Usage:
//! ```text
//! traffic_import --storage-path ./traffic_data import capture.har --program 1
//! traffic_import --storage-path ./traffic_data jobs
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::FmtSubscriber;
use traffic_import::api::import_api;

#[derive(Parser)]
#[command(name = "traffic_import")]
#[command(about = "Import HAR and Burp XML captures into a traffic catalog")]
#[command(version)]
struct Cli {
    /// Directory holding the catalog database
    #[arg(long, global = true, default_value = "./traffic_data")]
    storage_path: PathBuf,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a .har or Burp .xml file
    Import {
        /// File to import
        file: PathBuf,

        /// Program the imported endpoints and exchanges belong to
        #[arg(long)]
        program: i64,

        /// Comma-separated header names to leave out of identity hashes
        #[arg(long, default_value = "")]
        ignore_headers: String,
    },

    /// List import jobs, oldest first
    Jobs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    import_api::init_store(&cli.storage_path)?;

    match cli.command {
        Commands::Import {
            file,
            program,
            ignore_headers,
        } => {
            let job_id = import_api::import_file_from_path(&file, program, &ignore_headers).await?;
            let job = import_api::get_import_job(job_id).await?;
            let exchanges = import_api::list_job_exchanges(job_id).await?;
            let linked = exchanges.iter().filter(|e| e.endpoint.is_some()).count();
            println!(
                "job {}: {} ({}%), {} exchanges, {} linked to endpoints",
                job.id,
                job.title,
                job.progress,
                exchanges.len(),
                linked
            );
        }
        Commands::Jobs => {
            let jobs = import_api::list_import_jobs().await?;
            if jobs.is_empty() {
                println!("no import jobs");
            }
            for job in jobs {
                println!(
                    "{:>5}  {:<16} {:>3}%  {}  {}",
                    job.id, job.job_type, job.progress, job.created_at, job.title
                );
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr) // stdout carries command output
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
