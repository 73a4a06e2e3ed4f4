//! # pet-tagger CLI
//!
//! ## Usage
//!
//! ```bash
//! pet-tagger [--env-file ./.env] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pet-tagger serve` | Start the HTTP API server |
//! | `pet-tagger analyze <image>` | Label a local image and show its `ai_tags` |
//! | `pet-tagger search <term>...` | Rank stored posts by tag relevance |
//!
//! ## Examples
//!
//! ```bash
//! # Start the server on the default address (0.0.0.0:5000)
//! pet-tagger serve
//!
//! # Check what the labeling service sees in a photo
//! pet-tagger analyze ./photos/rex.jpg
//!
//! # Find posts tagged Dog and/or Puppy
//! pet-tagger search Dog Puppy
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pet_tagger::config::{load_env_file, log_filter, Config};
use pet_tagger::labels::{animal_tags, filter_relevant_labels};
use pet_tagger::models::Label;
use pet_tagger::search::search_by_tags;
use pet_tagger::server::run_server;
use pet_tagger::traits::Services;

/// pet-tagger: tags pet photos and ranks listings by tag relevance.
///
/// Settings are read from environment variables, after loading a `.env`
/// file if one exists.
#[derive(Parser)]
#[command(name = "pet-tagger", version, about)]
struct Cli {
    /// Path to an env file to load before reading the environment.
    ///
    /// Defaults to `./.env` when present.
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve {
        /// Address to bind, overriding `BIND_ADDR`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Label a local image file.
    ///
    /// Prints every detected label and the subset kept as `ai_tags`.
    Analyze {
        /// Path to a JPEG or PNG image.
        image: PathBuf,
    },

    /// Rank stored posts by how many of the given tags they carry.
    Search {
        /// Tags to search for (exact, case-sensitive).
        #[arg(required = true)]
        terms: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    load_env_file(cli.env_file.as_deref())?;
    tracing_subscriber::fmt().with_env_filter(log_filter()).init();

    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            run_server(config).await?;
        }
        Commands::Analyze { image } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("Failed to read image: {}", image.display()))?;
            let services = Services::connect(config)?;

            let labeling = &services.config.labeling;
            let raw = services
                .labeler
                .detect_labels(&bytes, labeling.max_labels, labeling.min_confidence)
                .await?;
            let ai_tags = filter_relevant_labels(&raw, animal_tags());
            let labels: Vec<Label> = raw.iter().map(Label::from).collect();

            let output = serde_json::json!({
                "labels": labels,
                "ai_tags": ai_tags,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Search { terms } => {
            let services = Services::connect(config)?;
            let results = search_by_tags(&services, &terms).await?;
            if results.is_empty() {
                println!("No posts found.");
            }
            for (i, result) in results.iter().enumerate() {
                println!(
                    "{}. [{:.0}%] {} {}",
                    i + 1,
                    result.relevance_score,
                    result.item.id().unwrap_or("?"),
                    result.item.ai_tags().collect::<Vec<_>>().join(", ")
                );
                if let Some(caption) = result.item.caption() {
                    println!("    {}", caption);
                }
            }
        }
    }

    Ok(())
}
