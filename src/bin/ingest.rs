use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use docrag::extract::{extract_raw_text, file_name_only};
use docrag::{logging, PgVectorStore, PipelineError, Settings, VectorStore};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(
    name = "docrag-ingest",
    about = "Extract, chunk, embed, and store local documents in pgvector"
)]
struct IngestCli {
    /// PDF, .txt, or .md files to ingest
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Store under this name instead of the file name (single file only)
    #[arg(long)]
    document: Option<String>,

    #[command(flatten)]
    settings: Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = IngestCli::parse();
    if cli.document.is_some() && cli.paths.len() > 1 {
        bail!("--document can only be used with a single path");
    }

    let store = Arc::new(PgVectorStore::connect(cli.settings.store_config()?).await?);
    let pipeline = cli.settings.build_pipeline(store.clone())?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut failures = 0usize;
    for path in &cli.paths {
        let document = match &cli.document {
            Some(name) => name.clone(),
            None => file_name_only(&path.to_string_lossy()),
        };
        let text = extract_raw_text(path)
            .await
            .with_context(|| format!("failed to extract {}", path.display()))?;
        match pipeline.ingest(&document, &text, &cancel).await {
            Ok(report) => println!(
                "{}: saved {}/{} chunks",
                report.document, report.chunks_saved, report.chunks_total
            ),
            Err(PipelineError::Cancelled) => bail!("interrupted"),
            Err(err) => {
                failures += 1;
                tracing::error!(document = %document, error = %err, "ingest failed");
            }
        }
    }

    let total = store.count().await.context("failed to count stored chunks")?;
    println!("{} now holds {total} chunks", store.table().qualified());
    if store
        .ensure_index()
        .await
        .context("failed to build vector index")?
    {
        println!("ivfflat index in place; search is approximate");
    }
    if failures > 0 {
        bail!("{failures} of {} documents failed", cli.paths.len());
    }
    Ok(())
}
