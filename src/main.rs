// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use futures::stream::{self, StreamExt};
use relief_rag::utils::logging::{format_error, format_heading, format_info, format_success, format_warning};
use relief_rag::{
    Answer, Config, ContextRetriever, HealthCheck, HealthReport, HealthStatus, Ingestor,
    RagPipeline, VectorStore, WebScraper, connect_store,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

const DEFAULT_CONFIG: &str = "config/default.toml";

#[derive(Parser)]
#[command(name = "relief_rag")]
#[command(author = "cipher")]
#[command(version)]
#[command(about = "Disaster relief information assistant grounded in retrieved documents", long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Skip the network location lookup and search with the raw query
    #[arg(long, action = ArgAction::SetTrue)]
    no_location: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive question loop (default); type 'quit' to exit
    Chat,

    /// Answer one or more questions and exit
    Ask {
        #[arg(required = true)]
        queries: Vec<String>,

        #[arg(long)]
        show_sources: bool,
    },

    /// Show the documents retrieved for a query without generating an answer
    Search {
        query: String,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Create the collection and ingest relief pages
    Setup {
        #[arg(long = "url", value_name = "URL")]
        urls: Vec<String>,
    },

    /// Check connectivity to the vector store, model endpoint and geolocation
    Verify,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    colored::control::set_override(cli.color);
    relief_rag::utils::logging::init_logger(cli.color, cli.verbose);

    let config = load_config(&cli.config).context("Failed to load configuration")?;

    let store = connect_store(&config)
        .await
        .context("Failed to open vector store")?;
    info!(
        "Using {} collection {}",
        store.name(),
        store.collection()
    );

    let result = match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let pipeline = RagPipeline::from_config(&config, store.clone(), !cli.no_location)?;
            cmd_chat(&pipeline).await
        }
        Commands::Ask {
            queries,
            show_sources,
        } => {
            let pipeline = RagPipeline::from_config(&config, store.clone(), !cli.no_location)?;
            cmd_ask(&pipeline, &queries, show_sources, config.pipeline.max_concurrent_queries).await
        }
        Commands::Search { query, limit } => {
            cmd_search(&config, store.clone(), &query, limit).await
        }
        Commands::Setup { urls } => cmd_setup(&config, store.clone(), urls).await,
        Commands::Verify => cmd_verify(&config, store.clone(), !cli.no_location).await,
    };

    drop(store);
    debug!("Released vector store handle");

    result
}

fn load_config(path: &Path) -> relief_rag::Result<Config> {
    if path.exists() {
        info!("Loading configuration from: {}", path.display());
        Config::load(Some(path))
    } else if path == Path::new(DEFAULT_CONFIG) {
        warn!("Config file {} not found, using built-in defaults", path.display());
        Config::load(None)
    } else {
        Err(relief_rag::PipelineError::Config(format!(
            "config file {} not found",
            path.display()
        )))
    }
}

async fn cmd_chat(pipeline: &RagPipeline) -> Result<()> {
    println!("{}", format_heading("Disaster Relief Information Assistant"));
    println!("Ask any question about disaster relief, emergency resources, or current situations.");
    println!("Type 'quit' to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\nWhat would you like to know about disaster relief? ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let query = line.trim();
        if query.eq_ignore_ascii_case("quit") {
            break;
        }
        if query.is_empty() {
            continue;
        }

        match pipeline.answer_with_deadline(query).await {
            Ok(answer) => println!("\nResponse: {}", answer.text),
            Err(e) if e.is_recoverable() => {
                println!(
                    "\n{}",
                    format_error(&format!(
                        "Error: {}. Please try again with a different query.",
                        e.one_line()
                    ))
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!("{}", format_info("Goodbye. Stay safe."));
    Ok(())
}

async fn cmd_ask(
    pipeline: &RagPipeline,
    queries: &[String],
    show_sources: bool,
    max_concurrent: usize,
) -> Result<()> {
    let results: Vec<(String, relief_rag::Result<Answer>)> = stream::iter(queries.iter().cloned())
        .map(|query| {
            let pipeline = pipeline.clone();
            async move {
                let result = pipeline.answer_with_deadline(&query).await;
                (query, result)
            }
        })
        .buffered(max_concurrent.max(1))
        .collect()
        .await;

    let mut failed = 0;

    for (query, result) in results {
        if queries.len() > 1 {
            println!("\n{}", format_heading(&query));
        }

        match result {
            Ok(answer) => {
                println!("{}", answer.text);
                if show_sources {
                    print_sources(&answer);
                }
            }
            Err(e) => {
                failed += 1;
                println!("{}", format_error(&format!("Error: {}", e.one_line())));
            }
        }
    }

    if failed > 0 {
        return Err(anyhow::anyhow!("{} of {} queries failed", failed, queries.len()));
    }
    Ok(())
}

fn print_sources(answer: &Answer) {
    println!("\n{}", format_info(&format!("Retrieval query: {}", answer.enriched_query)));
    if answer.documents.is_empty() {
        println!("{}", format_warning("No documents were retrieved"));
    }
    for (idx, doc) in answer.documents.iter().enumerate() {
        println!("  {}. {} ({}) {}", idx + 1, doc.title, doc.source, doc.url);
    }
}

async fn cmd_search(
    config: &Config,
    store: Arc<dyn VectorStore>,
    query: &str,
    limit: Option<usize>,
) -> Result<()> {
    relief_rag::Validator::validate_query(query)?;
    info!("Searching for: {}", query);

    let retriever =
        ContextRetriever::with_limit(store, limit.unwrap_or(config.vector_store.result_limit))?;
    let documents = retriever
        .retrieve(query)
        .await
        .context("Vector search failed")?;

    if documents.is_empty() {
        println!("\nNo results found for query: \"{}\"", query);
        println!("Check that `relief_rag setup` has ingested documents.");
        return Ok(());
    }

    println!("\nSearch Results for: \"{}\"\n", query);
    println!("{}", "=".repeat(80));

    for (idx, doc) in documents.iter().enumerate() {
        println!("\n{}. {}", idx + 1, doc.format_summary(300));
    }

    println!("{}", "=".repeat(80));
    Ok(())
}

async fn cmd_setup(config: &Config, store: Arc<dyn VectorStore>, urls: Vec<String>) -> Result<()> {
    let urls = if urls.is_empty() {
        config.ingest.urls.clone()
    } else {
        urls
    };

    let scraper = WebScraper::new(Duration::from_secs(config.ingest.timeout_secs))?;
    let ingestor = Ingestor::new(store, scraper, Duration::from_millis(config.ingest.delay_ms));

    let stats = ingestor.run(&urls).await.context("Ingestion failed")?;

    if stats.collection_created {
        println!("{}", format_success("Created collection"));
    } else {
        println!("{}", format_info("Collection already exists"));
    }
    println!(
        "{}",
        format_success(&format!(
            "Inserted {} of {} pages ({} failures)",
            stats.documents_inserted,
            urls.len(),
            stats.failures
        ))
    );

    Ok(())
}

async fn cmd_verify(config: &Config, store: Arc<dyn VectorStore>, use_location: bool) -> Result<()> {
    let pipeline = RagPipeline::from_config(config, store.clone(), use_location)?;

    let mut checks = vec![
        HealthCheck::probe(store.name(), store.ping()).await,
        HealthCheck::probe(pipeline.generator().model(), pipeline.generator().ping()).await,
    ];

    let start = Instant::now();
    let lookup = pipeline.locator().resolve().await;
    checks.push(match lookup.as_location() {
        Some(location) => HealthCheck::healthy(
            &format!("location ({} {} {})", location.city(), location.state(), location.country()),
            start.elapsed(),
        ),
        None => HealthCheck::degraded(
            "location",
            "no location available, queries will not be enriched".to_string(),
            start.elapsed(),
        ),
    });

    let report = HealthReport::new(checks, env!("CARGO_PKG_VERSION").to_string());
    println!("{}", report.format());

    if report.overall_status == HealthStatus::Unhealthy {
        return Err(anyhow::anyhow!("health check failed"));
    }
    Ok(())
}
