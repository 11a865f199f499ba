//! agentic-rag command-line interface
//!
//! Run with: cargo run -p agentic-rag --features cli -- --help

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use agentic_rag::{AgenticRag, AnswerOutcome, Document, RagConfig};
use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "agentic-rag", version, about = "Contextual RAG with conversational agents")]
struct Cli {
    /// TOML configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index a text file
    Index {
        file: PathBuf,
        /// Document id (defaults to the file name)
        #[arg(long)]
        doc_id: Option<String>,
    },
    /// Answer a single question
    Ask {
        query: String,
        /// Passages fetched before reranking
        #[arg(long)]
        top_k: Option<usize>,
        /// Restrict retrieval to these document ids
        #[arg(long = "doc")]
        docs: Vec<String>,
        /// Index these files first
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },
    /// Interactive agent conversation over stdin
    Chat {
        /// Restrict retrieval to these document ids
        #[arg(long = "doc")]
        docs: Vec<String>,
        /// Index these files first
        #[arg(long = "file")]
        files: Vec<PathBuf>,
        /// Conversation id
        #[arg(long, default_value = "cli")]
        conversation: String,
    },
    /// Check that the vector index and passage store agree
    Audit {
        /// Delete inconsistent ids
        #[arg(long)]
        repair: bool,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RagConfig> {
    match path {
        Some(path) => Ok(RagConfig::from_file(path)?),
        None => {
            let mut config = RagConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }
}

async fn index_file(manager: &AgenticRag, file: &Path, doc_id: Option<String>) -> anyhow::Result<String> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let doc_id = doc_id.unwrap_or_else(|| {
        file.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string())
    });

    let document = Document::new(doc_id.clone(), text)
        .with_metadata("path", serde_json::json!(file.display().to_string()));
    let passages = manager.add_document(&doc_id, &document).await?;
    println!("Indexed {} as {} passages", doc_id, passages.len());
    Ok(doc_id)
}

fn allow_list(docs: Vec<String>) -> Option<Vec<String>> {
    if docs.is_empty() {
        None
    } else {
        Some(docs)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentic_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - LLM: {:?} {}", config.llm.service, config.llm.model());
    tracing::info!(
        "  - Embeddings: {:?} {}",
        config.embeddings.service,
        config.embeddings.model()
    );
    tracing::info!("  - Reranker: {:?} (top_n {})", config.reranker.service, config.reranker.top_n);

    let manager = AgenticRag::new(&config)?;

    match cli.command {
        Command::Index { file, doc_id } => {
            index_file(&manager, &file, doc_id).await?;
        }
        Command::Ask {
            query,
            top_k,
            docs,
            files,
        } => {
            for file in &files {
                index_file(&manager, file, None).await?;
            }
            let allowed = allow_list(docs);
            let top_k = top_k.unwrap_or(config.retrieval.top_k);
            let result = manager
                .rag()
                .contextual_search(&query, top_k, allowed.as_deref())
                .await?;

            match &result.outcome {
                AnswerOutcome::Answered(answer) => {
                    println!("{}", answer.result);
                    if answer.is_chat_false {
                        println!("\n(marked as not supported by the documents)");
                    }
                }
                AnswerOutcome::NoAnswer { attempts } => {
                    println!("Could not produce an answer after {} attempts.", attempts);
                }
            }
            if !result.passages.is_empty() {
                println!("\nSources:");
                for passage in &result.passages {
                    println!("  [{:.3}] {} ({})", passage.score, passage.document_id, passage.id);
                }
            }
        }
        Command::Chat {
            docs,
            files,
            conversation,
        } => {
            for file in &files {
                index_file(&manager, file, None).await?;
            }
            manager.ensure_session(&conversation, allow_list(docs), Vec::new())?;

            let stdin = std::io::stdin();
            let mut stdout = std::io::stdout();
            loop {
                print!("> ");
                stdout.flush()?;
                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 {
                    break;
                }
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    break;
                }
                match manager.chat(&conversation, line).await {
                    Ok(reply) => println!("{}\n", reply),
                    Err(e) => eprintln!("error: {}\n", e),
                }
            }
        }
        Command::Audit { repair } => {
            let report = if repair {
                manager.rag().repair().await?
            } else {
                manager.rag().audit().await?
            };
            if report.is_consistent() {
                println!("Stores are consistent");
            } else {
                println!("Orphan vectors:    {}", report.orphan_vectors.len());
                println!("Orphan passages:   {}", report.orphan_passages.len());
                println!("Document mismatch: {}", report.document_mismatches.len());
                if repair {
                    println!("Inconsistent ids removed");
                }
            }
        }
    }

    manager.shutdown().await;
    Ok(())
}
