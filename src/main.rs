use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wenzhen::config::Config;
use wenzhen::graph::Neo4jStore;
use wenzhen::llm::OllamaClient;
use wenzhen::models::{AnswerMode, Facet, QueryOptions};
use wenzhen::pipeline::Pipeline;
use wenzhen::recognizer::HttpRecognizer;

#[derive(Parser)]
#[command(
    name = "wenzhen",
    version,
    about = "Medical knowledge-graph question answering with facet-aware retrieval and LLM fallback",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a medical question through the retrieval cascade
    Answer {
        /// The question to answer
        question: String,

        /// Facet override (definition, symptoms, treatments)
        #[arg(short, long)]
        facet: Option<String>,

        /// Topic hint, prioritized over recognized entities
        #[arg(short, long)]
        topic: Option<String>,

        /// Answer mode (research, user)
        #[arg(short, long, default_value = "research")]
        mode: String,

        /// Skip LLM generation and answer from the graph template
        #[arg(long, default_value = "false")]
        lite: bool,

        /// Cap on concepts whose evidence is combined
        #[arg(long, default_value = "1")]
        max_k: usize,

        /// Facet-specific override for the evidence cap
        #[arg(long)]
        facet_k: Option<usize>,

        /// Disable the facet-insufficiency fallback tier
        #[arg(long, default_value = "false")]
        no_facet_fallback: bool,

        /// Model override for this request
        #[arg(long)]
        model: Option<String>,
    },

    /// Classify the facet of a question without answering it
    Classify {
        /// The question to classify
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate()?;

    match cli.command {
        Commands::Answer {
            question,
            facet,
            topic,
            mode,
            lite,
            max_k,
            facet_k,
            no_facet_fallback,
            model,
        } => {
            tracing::info!(
                facet = ?facet,
                mode = %mode,
                lite = %lite,
                "Starting answer command"
            );
            answer(
                &config,
                question,
                facet,
                topic,
                mode,
                lite,
                max_k,
                facet_k,
                no_facet_fallback,
                model,
            )
            .await?;
        }

        Commands::Classify { question } => {
            let facet = wenzhen::facet::classify(&question);
            println!("{facet}");
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("wenzhen=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("wenzhen=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn answer(
    config: &Config,
    question: String,
    facet: Option<String>,
    topic: Option<String>,
    mode: String,
    lite: bool,
    max_k: usize,
    facet_k: Option<usize>,
    no_facet_fallback: bool,
    model: Option<String>,
) -> Result<()> {
    let facet_hint = match facet.as_deref() {
        Some(raw) => {
            Some(Facet::parse(raw).ok_or_else(|| anyhow::anyhow!("unknown facet: {raw}"))?)
        }
        None => None,
    };
    let mode =
        AnswerMode::parse(&mode).ok_or_else(|| anyhow::anyhow!("unknown mode: {mode}"))?;

    let pipeline = Pipeline::new(
        Arc::new(HttpRecognizer::new(config.recognizer.clone())?),
        Arc::new(Neo4jStore::new(config.graph.clone())?),
        Arc::new(OllamaClient::new(config.ollama.clone())?),
        config,
    );

    let options = QueryOptions {
        facet_hint,
        topic_hint: topic,
        mode,
        lite,
        max_k: Some(max_k),
        facet_k,
        no_facet_fallback,
        model,
    };

    let record = pipeline.answer(&question, options).await?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
