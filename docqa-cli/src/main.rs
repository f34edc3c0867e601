use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use docqa_core::config::{Config, EmbeddingBackend};
use docqa_core::rag::{IngestReport, Pipeline, RagError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

#[derive(Parser)]
#[command(name = "docqa")]
#[command(about = "Ask questions about a PDF, answered only from its contents", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Embed locally with character n-gram hashing instead of the configured backend
    #[arg(long, global = true)]
    local_embeddings: bool,

    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Ingest a document and answer one question")]
    Ask {
        #[arg(help = "PDF or text file")]
        file: PathBuf,
        question: String,
    },

    #[command(about = "Ingest a document and answer questions interactively")]
    Chat {
        #[arg(help = "PDF or text file")]
        file: PathBuf,
    },

    #[command(about = "Show which segments would be used to answer a question")]
    Retrieve {
        file: PathBuf,
        question: String,
    },

    #[command(about = "Configuration commands")]
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    #[command(about = "Model management commands")]
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    #[command(about = "Show effective configuration")]
    Show,
}

#[derive(Subcommand)]
enum ModelCommands {
    #[command(about = "Set the answering model")]
    Set {
        #[arg(help = "Model name (e.g., 'llama3.2' or 'gemini-pro')")]
        model: String,
    },

    #[command(about = "List available models from Ollama")]
    List {
        #[arg(short, long, default_value = "http://localhost:11434")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Ask { ref file, ref question } => {
            let pipeline = build_pipeline(&cli)?;
            ingest_file(&pipeline, file).await?;
            let answer = pipeline.ask(question).await.map_err(explain)?;
            println!("{}", answer);
            Ok(())
        }
        Commands::Chat { ref file } => {
            let pipeline = build_pipeline(&cli)?;
            ingest_file(&pipeline, file).await?;
            chat_loop(&pipeline).await
        }
        Commands::Retrieve { ref file, ref question } => {
            let pipeline = build_pipeline(&cli)?;
            ingest_file(&pipeline, file).await?;
            show_segments(&pipeline, question).await
        }
        Commands::Config { command: ConfigCommands::Show } => show_config(&load_config(&cli)?),
        Commands::Model { command } => match command {
            ModelCommands::Set { model } => set_model(&cli.config, &model),
            ModelCommands::List { url } => list_models(&url).await,
        },
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("docqa_core={}", level).parse().unwrap_or_default())
        .add_directive(format!("docqa={}", level).parse().unwrap_or_default());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the config file if present, defaults otherwise.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_if_exists(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    debug!(
        path = %cli.config.display(),
        found = cli.config.exists(),
        llm = ?config.llm.provider,
        embedding = ?config.embedding.provider,
        "Loaded configuration"
    );

    if cli.local_embeddings {
        debug!("Using local hashing embeddings");
        config.embedding.provider = EmbeddingBackend::Hashing;
    }
    Ok(config)
}

fn build_pipeline(cli: &Cli) -> Result<Pipeline> {
    let config = load_config(cli)?;
    Pipeline::from_config(&config).context("Failed to set up pipeline")
}

async fn ingest_file(pipeline: &Pipeline, path: &Path) -> Result<IngestReport> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let report = pipeline
        .ingest_named(&name, &bytes)
        .await
        .with_context(|| format!("Failed to ingest {}", path.display()))?;

    eprintln!(
        "{} Loaded {} ({} segments, {}-dim vectors)",
        "✓".green().bold(),
        report.name.cyan(),
        report.segments,
        report.dimension
    );
    Ok(report)
}

/// Adds a hint for errors the user can fix directly.
fn explain(error: RagError) -> anyhow::Error {
    let hint = match &error {
        RagError::NoActiveDocument => Some("load a document first"),
        RagError::Llm(_) | RagError::EmptyResponse => Some("the language model failed; try again"),
        RagError::Embedding(_) => Some("the embedding backend failed; check it is running"),
        _ => None,
    };

    match hint {
        Some(hint) => anyhow::Error::new(error).context(hint),
        None => anyhow::Error::new(error),
    }
}

async fn chat_loop(pipeline: &Pipeline) -> Result<()> {
    println!(
        "Ask a question. Commands: {} {} {} {}",
        ":load <file>".bold(),
        ":clear".bold(),
        ":status".bold(),
        "exit".bold()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", ">".blue().bold());
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        match input {
            "" => continue,
            "exit" | "quit" => break,
            ":clear" => {
                pipeline.clear().await;
                println!("{}", "Document removed.".yellow());
            }
            ":status" => match pipeline.status().await {
                Some(status) => println!(
                    "{} ({} segments, sha256 {})",
                    status.name.cyan(),
                    status.segments,
                    &status.fingerprint[..12]
                ),
                None => println!("{}", "No document loaded.".yellow()),
            },
            _ if input.starts_with(":load ") => {
                let path = PathBuf::from(input.trim_start_matches(":load ").trim());
                if let Err(e) = ingest_file(pipeline, &path).await {
                    println!("{} {:#}", "✗".red().bold(), e);
                }
            }
            question => match pipeline.ask(question).await {
                Ok(answer) => println!("{}\n", answer),
                Err(e) => println!("{} {:#}\n", "✗".red().bold(), explain(e)),
            },
        }
    }

    Ok(())
}

async fn show_segments(pipeline: &Pipeline, question: &str) -> Result<()> {
    let segments = pipeline.retrieve(question).await.map_err(explain)?;
    let retriever = pipeline.retriever();

    println!(
        "{} (k={}, fetch_k={})",
        "Selected segments:".bold().green(),
        retriever.k(),
        retriever.fetch_k()
    );
    for (rank, segment) in segments.iter().enumerate() {
        println!();
        println!(
            "{} segment {} @ char {}",
            format!("[{}]", rank + 1).cyan(),
            segment.id,
            segment.source_offset
        );
        println!("{}", segment.text);
    }
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "LLM:".bold());
    println!("  Provider:        {:?}", config.llm.provider);
    println!("  Model:           {}", config.llm.model.cyan());
    println!("  Base URL:        {}", config.llm.base_url);
    println!("  Temperature:     {}", config.llm.temperature);
    println!();
    println!("{}", "Embedding:".bold());
    println!("  Provider:        {:?}", config.embedding.provider);
    println!("  Model:           {}", config.embedding.model.cyan());
    println!("  Normalized:      {}", config.embedding.normalized);
    println!("  Batch Size:      {}", config.embedding.batch_size);
    println!();
    println!("{}", "RAG:".bold());
    println!("  Chunk Size:      {}", config.rag.chunk_size);
    println!("  Chunk Overlap:   {}", config.rag.chunk_overlap);
    println!("  Search Type:     {:?}", config.rag.retrieval.search_type);
    println!("  K:               {}", config.rag.retrieval.k);
    println!("  Fetch K:         {}", config.rag.retrieval.fetch_k);
    println!("  Lambda:          {}", config.rag.retrieval.lambda);

    Ok(())
}

fn set_model(config_path: &Path, model: &str) -> Result<()> {
    let content = if config_path.exists() {
        std::fs::read_to_string(config_path).context("Failed to read config file")?
    } else {
        String::new()
    };

    let mut config: serde_yaml::Value = if content.trim().is_empty() {
        serde_yaml::Value::Mapping(Default::default())
    } else {
        serde_yaml::from_str(&content).context("Failed to parse config")?
    };

    let root = config
        .as_mapping_mut()
        .context("Config file must be a YAML mapping")?;
    let llm = root
        .entry(serde_yaml::Value::String("llm".to_string()))
        .or_insert_with(|| serde_yaml::Value::Mapping(Default::default()));
    if let Some(llm_map) = llm.as_mapping_mut() {
        llm_map.insert(
            serde_yaml::Value::String("model".to_string()),
            serde_yaml::Value::String(model.to_string()),
        );
    }

    let updated_content = serde_yaml::to_string(&config)
        .context("Failed to serialize config")?;

    std::fs::write(config_path, updated_content)
        .context("Failed to write config file")?;

    println!(
        "{} Model updated to: {}",
        "✓".green().bold(),
        model.cyan()
    );

    Ok(())
}

async fn list_models(base_url: &str) -> Result<()> {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct OllamaModel {
        name: String,
        size: u64,
    }

    #[derive(Deserialize)]
    struct OllamaResponse {
        models: Vec<OllamaModel>,
    }

    let url = format!("{}/api/tags", base_url.trim_end_matches('/'));

    println!("{} Fetching models from {}...", "→".blue(), base_url);
    println!();

    let response = reqwest::get(&url)
        .await
        .context("Failed to connect to Ollama. Is it running?")?;

    if !response.status().is_success() {
        anyhow::bail!("Ollama returned error: {}", response.status());
    }

    let data: OllamaResponse = response
        .json()
        .await
        .context("Failed to parse Ollama response")?;

    if data.models.is_empty() {
        println!("{}", "No models found. Pull a model with 'ollama pull <model>'".yellow());
        return Ok(());
    }

    println!("{}", "Available models:".bold().green());
    println!();

    for model in data.models {
        let size_gb = model.size as f64 / (1024.0 * 1024.0 * 1024.0);
        println!(
            "  {} {} ({:.2} GB)",
            "•".cyan(),
            model.name.bold(),
            size_gb
        );
    }

    println!();
    println!("Use {} to set a model", "docqa -c config.yaml model set <model>".bold());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_flag_accepted_after_subcommand() {
        let cli = Cli::try_parse_from(["docqa", "config", "show", "--config", "other.yaml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("other.yaml"));

        let cli = Cli::try_parse_from(["docqa", "chat", "paper.pdf", "-c", "x.yaml", "--verbose"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("x.yaml"));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Chat { .. }));
    }

    #[test]
    fn test_config_flag_defaults() {
        let cli = Cli::try_parse_from(["docqa", "--local-embeddings", "ask", "a.pdf", "Why?"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        assert!(cli.local_embeddings);
    }

    #[test]
    fn test_local_embeddings_flag_overrides_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "embedding:\n  provider: ollama\n").unwrap();

        let cli = Cli::try_parse_from([
            "docqa",
            "config",
            "show",
            "--local-embeddings",
            "--config",
            path.to_str().unwrap(),
        ])
        .unwrap();
        assert_eq!(load_config(&cli).unwrap().embedding.provider, EmbeddingBackend::Hashing);
    }
}
