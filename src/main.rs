//! RagBuddy - Main CLI Entry Point

use anyhow::Result;
use bytes::Bytes;
use clap::Parser;
use colored::Colorize;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;

use ragbuddy::{
    chunking::RecursiveChunker,
    cli::{Args, Commands, IngestSource},
    config::Config,
    index::{Embedder, LazyIndex, OllamaEmbedder, QdrantIndex},
    ingest::{HttpFetcher, IngestPipeline, Normalizer},
    rag::{AnswerPipeline, RetryPolicy},
    streaming::OllamaClient,
    telemetry,
    types::IngestInput,
    RagError,
};

/// Long-lived collaborators shared by every command
struct Services {
    model: Arc<OllamaClient>,
    index: Arc<LazyIndex<QdrantIndex>>,
    fetcher: Arc<HttpFetcher>,
}

fn build_services(config: &Config) -> Result<Services> {
    let model = OllamaClient::with_config(&config.ollama_url(), &config.ollama.model)?
        .with_temperature(config.ollama.temperature)
        .with_timeout(config.request_timeout());

    let embedder: Arc<dyn Embedder> = Arc::new(OllamaEmbedder::new(
        config.ollama_url(),
        config.ollama.embedding_model.clone(),
    )?);

    let index_config = config.index.clone();
    let index = LazyIndex::new(move || {
        let embedder = embedder.clone();
        let index_config = index_config.clone();
        async move {
            QdrantIndex::connect(
                &index_config.qdrant_url,
                index_config.collection,
                index_config.embedding_dim,
                embedder,
            )
            .await
        }
    });

    let fetcher = HttpFetcher::new(config.fetch_timeout(), &config.fetch.user_agent)?;

    Ok(Services {
        model: Arc::new(model),
        index: Arc::new(index),
        fetcher: Arc::new(fetcher),
    })
}

fn answer_pipeline(config: &Config, services: &Services) -> AnswerPipeline {
    AnswerPipeline::with_config(
        services.index.clone(),
        services.model.clone(),
        config.retrieval.clone(),
        RetryPolicy::from(&config.retry),
    )
}

/// Spinner on stderr, unless output must stay machine-readable
fn spinner(args: &Args, message: String) -> Option<ProgressBar> {
    if args.json || !args.verbosity().show_progress() {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

async fn read_input(source: &IngestSource) -> Result<IngestInput> {
    let input = match source {
        IngestSource::File { path, media_type } => {
            let data = tokio::fs::read(path).await.map_err(RagError::Io)?;
            IngestInput::File {
                file_name: file_name(path),
                media_type: media_type.clone(),
                data: Bytes::from(data),
            }
        }
        IngestSource::Text { text } if text == "-" => {
            let mut buffer = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buffer)
                .await
                .map_err(RagError::Io)?;
            IngestInput::Text(buffer)
        }
        IngestSource::Text { text } => IngestInput::Text(text.clone()),
        IngestSource::Url { url } => IngestInput::Url(url.clone()),
    };
    Ok(input)
}

async fn run_ingest(args: &Args, config: &Config, source: &IngestSource) -> Result<()> {
    let services = build_services(config)?;
    let pipeline = IngestPipeline::new(
        Normalizer::new(services.fetcher.clone()),
        RecursiveChunker::with_config(config.chunking.clone())?,
        services.index.clone(),
    );

    let input = read_input(source).await?;
    let pb = spinner(args, format!("Ingesting {}", input.label()));
    let report = pipeline.ingest(input).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let report = report?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} Ingested {} ({} chunks)",
            "✓".green(),
            report.origin_id.bold(),
            report.chunk_count
        );
    }
    Ok(())
}

async fn run_ask(args: &Args, config: &Config, question: &str, no_stream: bool) -> Result<()> {
    let services = build_services(config)?;
    let pipeline = answer_pipeline(config, &services);

    if no_stream || args.json {
        let pb = spinner(args, "Thinking...".to_string());
        let answer = pipeline.answer_once(question).await;
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        let answer = answer?;

        if args.json {
            println!("{}", serde_json::json!({ "answer": answer }));
        } else {
            println!("{}", answer);
        }
        return Ok(());
    }

    let mut stream = pipeline.answer_streaming(question).await?;
    let mut stdout = std::io::stdout();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                stream.cancel();
                eprintln!("\n{}", "Interrupted".yellow());
                break;
            }
            delta = stream.next() => match delta {
                Some(Ok(text)) => {
                    write!(stdout, "{}", text)?;
                    stdout.flush()?;
                }
                Some(Err(e)) => {
                    println!();
                    return Err(e.into());
                }
                None => break,
            },
        }
    }
    println!();
    Ok(())
}

async fn run_summarize(args: &Args, config: &Config) -> Result<()> {
    let services = build_services(config)?;
    let pipeline = answer_pipeline(config, &services);

    let pb = spinner(args, "Summarizing sources...".to_string());
    let summary = pipeline.summarize().await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let summary = summary?;

    if args.json {
        println!("{}", serde_json::json!({ "summary": summary }));
    } else {
        println!("{}", summary);
    }
    Ok(())
}

async fn run_doctor(config: &Config) -> Result<()> {
    let services = build_services(config)?;
    let mut healthy = true;

    println!("\n{}\n", "RagBuddy health checks".bold());

    let model = &services.model;
    if model.health_check().await? {
        println!(
            "  {} Ollama reachable at {} (model {})",
            "✓".green(),
            model.base_url(),
            model.model()
        );
    } else {
        healthy = false;
        println!("  {} Ollama not reachable at {}", "✗".red(), model.base_url());
        println!("    Start it with: ollama serve");
    }

    match services.index.get().await {
        Ok(index) => match index.point_count().await {
            Ok(count) => println!(
                "  {} Qdrant collection '{}' ({} chunks)",
                "✓".green(),
                index.collection(),
                count
            ),
            Err(e) => {
                healthy = false;
                println!("  {} {}", "✗".red(), e);
            }
        },
        Err(e) => {
            healthy = false;
            println!("  {} {}", "✗".red(), e);
        }
    }
    println!();

    if !healthy {
        anyhow::bail!("health checks failed");
    }
    Ok(())
}

fn show_config(args: &Args, config: &Config) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!("{}", "RagBuddy Configuration".bold());
    match (&args.config, Config::default_path()) {
        (Some(path), _) => println!("# from {}\n", path.display()),
        (None, Some(path)) if path.exists() => println!("# from {}\n", path.display()),
        _ => println!("# built-in defaults\n"),
    }
    println!("{}", config.to_toml()?);
    Ok(())
}

/// Effective configuration: file or defaults, then CLI overrides
fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::load(args.config.clone())?;
    args.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

async fn run(args: &Args) -> Result<()> {
    let config = load_config(args)?;

    telemetry::init(&telemetry::filter_for(
        &config.logging.filter,
        args.verbosity(),
    ))?;

    match &args.command {
        Commands::Ingest { source } => run_ingest(args, &config, source).await,
        Commands::Ask {
            question,
            no_stream,
        } => run_ask(args, &config, question, *no_stream).await,
        Commands::Summarize => run_summarize(args, &config).await,
        Commands::Doctor => run_doctor(&config).await,
        Commands::Config => show_config(args, &config),
    }
}

/// Structured report for `--json`; `None` means print the error for humans
fn json_failure(e: &anyhow::Error, json: bool) -> Option<String> {
    match e.downcast_ref::<RagError>() {
        Some(err) if json => serde_json::to_string(&err.report()).ok(),
        _ => None,
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(&args).await {
        match json_failure(&e, args.json) {
            Some(report) => println!("{}", report),
            None => eprintln!("{} {:#}", "Error:".red().bold(), e),
        }
        std::process::exit(1);
    }
}
