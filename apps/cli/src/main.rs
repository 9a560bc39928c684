use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    config::{load_settings, normalize_base_url},
    FileSelection, FsFileSource, HttpConversionService, LocalFile, MissingConversionService,
    UploadSession,
};
use shared::domain::SessionPhase;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Convert one column of a CSV file with the remote conversion service")]
struct Cli {
    /// Conversion service base address; overrides converter.toml and the environment.
    #[arg(long, global = true)]
    service_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the columns found in the header line of FILE.
    Columns {
        file: PathBuf,
        #[arg(long)]
        media_type: Option<String>,
    },
    /// Upload FILE and convert COLUMN.
    Convert {
        file: PathBuf,
        #[arg(long)]
        column: String,
        #[arg(long)]
        media_type: Option<String>,
        /// Save the converted file as processed-<name> in the working directory.
        #[arg(long)]
        download: bool,
        /// Save the converted file to this path.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings()?;
    if let Some(url) = cli.service_url {
        settings.service_base_url = normalize_base_url(&url);
    }
    tracing::debug!(
        service_base_url = settings.service_base_url.as_str(),
        "cli: settings loaded"
    );

    match cli.command {
        Command::Columns { file, media_type } => {
            let mut session =
                UploadSession::new(Arc::new(MissingConversionService), Arc::new(FsFileSource));
            open_file(&mut session, file, media_type).await?;
            for column in session.available_columns() {
                println!("{column}");
            }
        }
        Command::Convert {
            file,
            column,
            media_type,
            download,
            output,
        } => {
            let service = Arc::new(
                HttpConversionService::from_settings(&settings)
                    .context("failed to build conversion service client")?,
            );
            let mut session = UploadSession::new(service.clone(), Arc::new(FsFileSource));
            open_file(&mut session, file, media_type).await?;

            if !session.select_column(&column) {
                bail!(
                    "column '{column}' not found; available columns: {}",
                    session.available_columns().join(", ")
                );
            }
            session.submit();
            session.settle().await;

            if session.phase() != SessionPhase::Completed {
                let message = session
                    .validation_error()
                    .unwrap_or("conversion did not complete");
                bail!("{message}");
            }
            let reference = session
                .result_reference()
                .cloned()
                .context("conversion completed without a result reference")?;
            println!("{reference}");

            if download || output.is_some() {
                let path = output.unwrap_or_else(|| PathBuf::from(session.download_file_name()));
                let bytes = service.download(&reference).await?;
                tokio::fs::write(&path, bytes)
                    .await
                    .with_context(|| format!("failed to write '{}'", path.display()))?;
                println!("saved {}", path.display());
            }
        }
    }

    Ok(())
}

async fn open_file(
    session: &mut UploadSession,
    path: PathBuf,
    media_type: Option<String>,
) -> Result<()> {
    let mut file = LocalFile::new(path);
    if let Some(media_type) = media_type {
        file = file.with_media_type(media_type);
    }
    if session.select_file(Some(file)) == FileSelection::Rejected {
        bail!(
            "{}",
            session.validation_error().unwrap_or("file was rejected")
        );
    }
    session.settle().await;
    if let Some(message) = session.validation_error() {
        bail!("{message}");
    }
    Ok(())
}
