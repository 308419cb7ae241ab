//! RVW CLI - Command-line interface
//!
//! Usage:
//!   rvw inspect [path]
//!   rvw ingest [path]
//!   rvw ask <question> [--session <id>]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rvw_core::{AppConfig, RagRequest};
use rvw_parser::ReviewConverter;
use rvw_rag::{ConversationalRag, DataIngestor};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rvw")]
#[command(about = "Product review assistant CLI")]
#[command(version)]
struct Cli {
    /// TOML config file (environment variables still take precedence)
    #[arg(long, global = true, env = "RVW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a review file and print the documents without uploading
    Inspect {
        /// Review file (defaults to the configured data path)
        path: Option<PathBuf>,

        /// Number of documents to print
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Ingest a review file into the vector store
    Ingest {
        /// Review file (defaults to the configured data path)
        path: Option<PathBuf>,
    },
    /// Ask one question against the ingested reviews
    Ask {
        /// Question to ask
        question: String,

        /// Session to continue
        #[arg(long)]
        session: Option<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = &config.logging.level;
            format!("rvw_cli={level},rvw_rag={level},rvw_vector={level}").into()
        }))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { path, limit } => {
            let path = path.unwrap_or_else(|| config.ingest.data_path.clone());
            let documents = ReviewConverter::new(&path).convert()?;

            println!("{} documents in {}", documents.len(), path.display());
            for document in documents.iter().take(limit) {
                println!("{}", serde_json::to_string(document)?);
            }
        }
        Commands::Ingest { path } => {
            config.validate()?;
            let path = path.unwrap_or_else(|| config.ingest.data_path.clone());
            let store = rvw_vector::create_document_store(&config)?;

            let report = DataIngestor::new(store).ingest_path(&path).await?;
            println!(
                "Ingested {} documents from {} in {} ms",
                report.documents,
                path.display(),
                report.elapsed_ms
            );
        }
        Commands::Ask { question, session } => {
            config.validate()?;
            let store = rvw_vector::create_document_store(&config)?;
            let rag = ConversationalRag::from_config(&config, store)?;

            let session_id = session.unwrap_or_else(|| config.rag.default_session_id.clone());
            let response = rag.answer(&RagRequest::new(question, session_id)).await?;

            println!("{}", response.answer);
            tracing::info!(
                standalone_question = %response.standalone_question,
                sources = response.sources.len(),
                processing_time_ms = response.processing_time_ms,
                "Answered"
            );
        }
    }

    Ok(())
}
