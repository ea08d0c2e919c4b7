use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use review_miner::{
    fetch_all, Config, Extractor, FetchParams, JsonlWriter, OllamaGenerator, ReviewRecord,
    SteamClient,
};

#[derive(Parser)]
#[command(name = "review-miner")]
#[command(about = "Steam review ingestion and structured task extraction pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(long, default_value = ".review-miner/config.yml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch reviews for an app into the raw corpus
    Fetch {
        /// The appid of the target game
        #[arg(long)]
        appid: u32,

        /// Max reviews to fetch
        #[arg(long, default_value_t = 80_000)]
        max: usize,

        /// Review language filter
        #[arg(long, default_value = "english")]
        lang: String,

        /// 1=filter review-bomb periods, 0=include
        #[arg(long, default_value_t = 1)]
        offtopic: u8,

        /// Overwrite an existing raw corpus for this appid
        #[arg(long)]
        overwrite: bool,

        /// Directory for the raw corpus and summary files
        #[arg(long, default_value = "out_reviews")]
        out_dir: PathBuf,
    },

    /// Run structured extraction over fetched review texts
    Extract {
        /// Raw corpus to read review texts from (reviews_<appid>.jsonl)
        #[arg(long)]
        input: PathBuf,

        /// Structured corpus to append results to
        #[arg(long, default_value = "analysis_out/review_summaries.jsonl")]
        output: PathBuf,

        /// Concurrent worker invocations (overrides config)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Per-review timeout in seconds (overrides config)
        #[arg(long)]
        timeout: Option<u64>,

        /// Worker model name (overrides config)
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("review_miner=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Fetch {
            appid,
            max,
            lang,
            offtopic,
            overwrite,
            out_dir,
        } => {
            run_fetch(config, appid, max, lang, offtopic, overwrite, out_dir).await?;
        }
        Commands::Extract {
            input,
            output,
            concurrency,
            timeout,
            model,
        } => {
            run_extract(config, input, output, concurrency, timeout, model).await?;
        }
    }

    Ok(())
}

async fn run_fetch(
    config: Config,
    appid: u32,
    max: usize,
    lang: String,
    offtopic: u8,
    overwrite: bool,
    out_dir: PathBuf,
) -> Result<()> {
    if offtopic > 1 {
        anyhow::bail!("--offtopic must be 0 or 1");
    }

    let client = SteamClient::new(config.fetch)?;
    let params = FetchParams {
        appid,
        max_items: max,
        language: lang,
        filter_offtopic: offtopic,
        overwrite,
    };

    let outcome = fetch_all(&client, &params, &out_dir).await?;

    println!(
        "Done. {} reviews saved to {}",
        outcome.total,
        outcome.corpus_path.display()
    );
    if let Some(summary) = outcome.summary_path {
        println!("Query summary saved to {}", summary.display());
    }

    Ok(())
}

async fn run_extract(
    config: Config,
    input: PathBuf,
    output: PathBuf,
    concurrency: Option<usize>,
    timeout: Option<u64>,
    model: Option<String>,
) -> Result<()> {
    let mut extract_config = config.extract;
    if let Some(concurrency) = concurrency {
        extract_config.concurrency = concurrency;
    }
    if let Some(timeout) = timeout {
        extract_config.timeout_secs = timeout;
    }
    if let Some(model) = model {
        extract_config.model = model;
    }

    let texts = load_review_texts(&input)?;
    info!(count = texts.len(), input = %input.display(), "Loaded review texts");

    let generator = OllamaGenerator::new(
        &extract_config.model,
        Duration::from_secs(extract_config.timeout_secs),
    );
    let extractor = Extractor::new(generator, extract_config);

    let mut sink = JsonlWriter::append(&output)?;
    let stats = extractor.summarize_all(texts, &mut sink).await?;

    println!(
        "Done. {} records written ({} inputs skipped) to {}",
        stats.written,
        stats.skipped,
        output.display()
    );

    Ok(())
}

/// Pull the free-text review field out of each raw corpus line.
/// Lines that fail to parse are skipped so one bad record cannot
/// sink a whole extraction run.
fn load_review_texts(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read raw corpus: {}", path.display()))?;

    let mut texts = Vec::new();
    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ReviewRecord>(line) {
            Ok(record) => texts.push(record.review),
            Err(err) => {
                warn!(line = number + 1, error = %err, "Skipping malformed corpus line");
            }
        }
    }

    Ok(texts)
}
