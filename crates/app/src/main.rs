use casescribe_core::{
    analyze_gaps, cover_prompt, draft_case_study, load_folder, suggest_diagram_prompts,
    ImageClient, OpenAiGateway, RetrievalPipeline, VectorStore, DEFAULT_INDEX_FILE,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "casescribe", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the vector index file.
    #[arg(long, env = "CASESCRIBE_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Source tag recorded on ingested chunks.
    #[arg(long, env = "CASESCRIBE_SOURCE", default_value = "user_upload")]
    source: String,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, chunk, embed, and index every document in a folder.
    Ingest {
        /// Folder scanned recursively for pdf/docx/txt/md files.
        #[arg(long)]
        folder: PathBuf,
    },
    /// Retrieve the chunks most similar to a query text.
    Query {
        /// Query text.
        #[arg(long)]
        text: String,
        /// Number of chunks to return.
        #[arg(long, default_value = "6")]
        top_k: usize,
    },
    /// Ask the chat model which case-study information is still missing.
    Analyze {
        /// Folder of uploaded material to sample.
        #[arg(long)]
        folder: PathBuf,
    },
    /// Draft the case study from retrieved context and user answers.
    Draft {
        /// Topic hint used to retrieve grounding context.
        #[arg(long, default_value = "finance transformation, case study")]
        topic: String,
        /// File of `key: value` answer lines from the gap questions.
        #[arg(long)]
        answers: PathBuf,
        /// Number of grounding chunks to retrieve.
        #[arg(long, default_value = "8")]
        top_k: usize,
    },
    /// Generate a cover illustration for the case study.
    Cover {
        /// Illustration style, e.g. "flat illustration" or "isometric".
        #[arg(long, default_value = "flat illustration")]
        style: String,
        /// Theme keywords woven into the image prompt.
        #[arg(
            long,
            default_value = "public finance, collaboration, knowledge sharing, AI assistance, case studies"
        )]
        theme: String,
        /// Image size descriptor.
        #[arg(long, default_value = "1024x1024")]
        size: String,
        /// Output path for the image bytes.
        #[arg(long, default_value = "cover.png")]
        out: PathBuf,
    },
    /// Suggest diagram prompts from an already drafted case study.
    Diagrams {
        /// Markdown file holding the draft.
        #[arg(long)]
        draft: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let index_path = cli.data_dir.join(DEFAULT_INDEX_FILE);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "casescribe boot"
    );

    match cli.command {
        Command::Ingest { folder } => {
            let documents = load_folder(&folder, &cli.source)
                .map_err(|error| anyhow::anyhow!("{error}"))?;
            info!(folder = %folder.display(), documents = documents.len(), "ingesting documents");
            for document in &documents {
                info!(filename = %document.filename, checksum = %document.checksum, "loaded document");
            }

            let gateway = OpenAiGateway::from_env().map_err(|error| anyhow::anyhow!("{error}"))?;
            let store =
                VectorStore::open(&index_path).map_err(|error| anyhow::anyhow!("{error}"))?;
            let mut pipeline = RetrievalPipeline::new(store, gateway);
            let report = pipeline
                .ingest(&documents)
                .await
                .map_err(|error| anyhow::anyhow!("{error}"))?;

            for degraded in &report.degraded {
                warn!(
                    filename = %degraded.filename,
                    reason = %degraded.reason,
                    "extraction fell back to raw decoding"
                );
            }

            println!(
                "{} chunks indexed from {} document(s) at {}",
                report.chunks_indexed,
                report.documents,
                Utc::now().to_rfc3339()
            );
        }
        Command::Query { text, top_k } => {
            let gateway = OpenAiGateway::from_env().map_err(|error| anyhow::anyhow!("{error}"))?;
            let store =
                VectorStore::open(&index_path).map_err(|error| anyhow::anyhow!("{error}"))?;
            let pipeline = RetrievalPipeline::new(store, gateway);
            let hits = pipeline
                .query(&text, top_k)
                .await
                .map_err(|error| anyhow::anyhow!("{error}"))?;

            if hits.is_empty() {
                println!("no results (is the index empty?)");
            }
            for (rank, hit) in hits.iter().enumerate() {
                println!("[{}] file={} source={}", rank + 1, hit.filename, hit.source);
                println!("  {}", hit.text);
            }
        }
        Command::Analyze { folder } => {
            let documents = load_folder(&folder, &cli.source)
                .map_err(|error| anyhow::anyhow!("{error}"))?;
            let texts: Vec<String> = documents
                .iter()
                .map(|document| {
                    casescribe_core::extract_text(&document.bytes, &document.filename).text
                })
                .collect();

            let gateway = OpenAiGateway::from_env().map_err(|error| anyhow::anyhow!("{error}"))?;
            let questions = analyze_gaps(&gateway, &texts)
                .await
                .map_err(|error| anyhow::anyhow!("{error}"))?;
            for question in questions {
                println!("- {question}");
            }
        }
        Command::Draft {
            topic,
            answers,
            top_k,
        } => {
            let embed_gateway =
                OpenAiGateway::from_env().map_err(|error| anyhow::anyhow!("{error}"))?;
            let chat_gateway =
                OpenAiGateway::from_env().map_err(|error| anyhow::anyhow!("{error}"))?;

            let store =
                VectorStore::open(&index_path).map_err(|error| anyhow::anyhow!("{error}"))?;
            let pipeline = RetrievalPipeline::new(store, embed_gateway);
            let context = pipeline
                .query(&topic, top_k)
                .await
                .map_err(|error| anyhow::anyhow!("{error}"))?;
            if context.is_empty() {
                warn!("no grounding context retrieved; drafting from answers only");
            }

            let parsed_answers = read_answers(&answers)?;
            let draft = draft_case_study(&chat_gateway, &context, &parsed_answers)
                .await
                .map_err(|error| anyhow::anyhow!("{error}"))?;
            println!("{draft}");
        }
        Command::Cover {
            style,
            theme,
            size,
            out,
        } => {
            let prompt = cover_prompt(&style, &theme);
            info!(%prompt, %size, "generating cover image");

            let gateway = OpenAiGateway::from_env().map_err(|error| anyhow::anyhow!("{error}"))?;
            let bytes = gateway
                .generate_image(&prompt, &size)
                .await
                .map_err(|error| anyhow::anyhow!("{error}"))?;
            tokio::fs::write(&out, &bytes).await?;
            println!("cover image written to {} ({} bytes)", out.display(), bytes.len());
        }
        Command::Diagrams { draft } => {
            let markdown = tokio::fs::read_to_string(&draft).await?;
            let gateway = OpenAiGateway::from_env().map_err(|error| anyhow::anyhow!("{error}"))?;
            let prompts = suggest_diagram_prompts(&gateway, &markdown)
                .await
                .map_err(|error| anyhow::anyhow!("{error}"))?;
            for prompt in prompts {
                println!("- {prompt}");
            }
        }
    }

    Ok(())
}

/// Parses `key: value` lines; blank lines and lines without a colon are
/// skipped.
fn read_answers(path: &Path) -> anyhow::Result<Vec<(String, String)>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect())
}
