use clap::Parser;
use tracing_subscriber::EnvFilter;

use lore::{
    AnswerGenerator, Config, EmbeddingStore, ExtractorRegistry, Ingestor,
    Library, OllamaClient,
    cli::{AskArgs, Cli, Command, StatusArgs},
    error::Result,
    inference::InferenceConfig,
    query::{self, Answer},
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("LORE_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let root = Library::resolve_root(cli.data_dir.as_deref())?;
    let config = Config::load(&Library::config_file(&root))?;
    let library = Library::open(&root, &config.paths)?;
    let store = EmbeddingStore::new(library.store_file().to_path_buf());

    match cli.command {
        Command::Ingest => {
            let client = build_client(&config, false)?;
            let registry = ExtractorRegistry::with_builtins();
            let ingestor = Ingestor::new(
                &library,
                &registry,
                config.chunking,
                &config.supported_extensions,
                &client,
                &store,
            );
            ingestor.recover_interrupted()?;
            let summary = ingestor.drain().await?;
            println!("Ingest finished: {summary}");
        }
        Command::Watch => {
            let client = build_client(&config, false)?;
            let registry = ExtractorRegistry::with_builtins();
            let ingestor = Ingestor::new(
                &library,
                &registry,
                config.chunking,
                &config.supported_extensions,
                &client,
                &store,
            );
            ingestor.recover_interrupted()?;
            let summary = ingestor.watch().await?;
            println!("Watch finished: {summary}");
        }
        Command::Ask(args) => {
            cmd_ask(&config, &store, &args).await?;
        }
        Command::Status(args) => {
            cmd_status(&config, &library, &store, &args)?;
        }
        Command::Completions(_) => unreachable!("handled above"),
    }

    Ok(())
}

fn build_client(config: &Config, reasoning: bool) -> Result<OllamaClient> {
    let answer_model = if reasoning {
        config.models.reasoning.clone()
    } else {
        config.models.general.clone()
    };
    OllamaClient::new(InferenceConfig {
        endpoint: config.endpoint.clone(),
        embedding_model: config.models.embedding.clone(),
        answer_model,
        max_retries: config.max_retries,
        retry_delay: config.retry_delay(),
    })
}

async fn cmd_ask(
    config: &Config,
    store: &EmbeddingStore,
    args: &AskArgs,
) -> Result<()> {
    let client = build_client(config, args.reasoning)?;
    let generator = AnswerGenerator::new(client.clone());
    let k = args.count.unwrap_or(config.top_k);

    let answer =
        query::ask(&args.question, k, &client, &generator, store).await?;

    match answer {
        Answer::NoRelevantContent => {
            if args.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "question": args.question,
                        "answer": null,
                        "status": "no_relevant_content",
                    })
                );
            } else {
                println!(
                    "No relevant information found in the knowledge base."
                );
            }
        }
        Answer::Generated { text, citations } => {
            if args.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "question": args.question,
                        "answer": text,
                        "status": "answered",
                        "citations": citations,
                    })
                );
            } else {
                println!("{text}");
                if args.sources {
                    println!("\nSources:");
                    for (i, c) in citations.iter().enumerate() {
                        println!(
                            "{:>3}. [{:.3}] {}",
                            i + 1,
                            c.similarity,
                            c.source_file
                        );
                    }
                }
            }
        }
    }
    Ok(())
}

fn cmd_status(
    config: &Config,
    library: &Library,
    store: &EmbeddingStore,
    args: &StatusArgs,
) -> Result<()> {
    let records = store.load_all()?;
    let documents: std::collections::HashSet<&str> = records
        .iter()
        .map(|r| r.metadata.source_file.as_str())
        .collect();
    let pending = library.file_count(library.input())?;
    let errored = library.file_count(library.error_area())?;

    if args.json {
        println!(
            "{}",
            serde_json::json!({
                "data_dir": library.root().display().to_string(),
                "endpoint": config.endpoint,
                "models": {
                    "embedding": config.models.embedding,
                    "general": config.models.general,
                    "reasoning": config.models.reasoning,
                },
                "chunks": records.len(),
                "documents": documents.len(),
                "pending_files": pending,
                "errored_files": errored,
            })
        );
    } else {
        println!("Data directory: {}", library.root().display());
        println!("Endpoint: {}", config.endpoint);
        println!(
            "Models: embedding={} general={} reasoning={}",
            config.models.embedding,
            config.models.general,
            config.models.reasoning
        );
        println!("Documents: {}", documents.len());
        println!("Chunks: {}", records.len());
        println!("Pending files: {pending}");
        println!("Errored files: {errored}");
    }
    Ok(())
}
