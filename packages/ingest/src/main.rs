#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for importing CSV datapoint files.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use haver_database::db;
use haver_ingest::ingest_file;
use haver_ingest_models::{CommitPolicy, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_UPLOAD_DIR, UploadSettings};

#[derive(Parser)]
#[command(name = "haver_ingest", about = "CSV datapoint import tool")]
struct Cli {
    /// Path of the `SQLite` database (overrides `DATABASE_PATH` env var)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database tables if they don't exist
    Schema,
    /// Import a CSV file into a project's datapoints
    Import {
        /// Project identifier every row is attached to
        project_id: i64,
        /// CSV file whose first row names the columns
        file: PathBuf,
        /// Commit each row on its own instead of the whole file at once
        #[arg(long)]
        per_row: bool,
        /// Keep the staged copy of the file after import
        #[arg(long)]
        retain: bool,
        /// Directory the file is staged in before decoding
        #[arg(long, default_value = DEFAULT_UPLOAD_DIR)]
        upload_dir: PathBuf,
        /// Largest accepted file in bytes
        #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
        max_bytes: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let db_path = cli.database.unwrap_or_else(db::path_from_env);
    let db = db::open(&db_path).await?;

    match cli.command {
        Commands::Schema => {
            log::info!("Schema is ready at {}", db_path.display());
        }
        Commands::Import {
            project_id,
            file,
            per_row,
            retain,
            upload_dir,
            max_bytes,
        } => {
            let settings = UploadSettings {
                upload_dir,
                max_upload_bytes: max_bytes,
                retain_uploads: retain,
                commit_policy: if per_row {
                    CommitPolicy::PerRow
                } else {
                    CommitPolicy::Atomic
                },
            };

            let summary = ingest_file(db.as_ref(), &settings, project_id, &file).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
