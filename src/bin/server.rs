use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use docrag::api::{router, AppState};
use docrag::{logging, InMemoryVectorStore, PgVectorStore, Settings, VectorStore};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    /// pgvector-backed table (persistent)
    Pg,
    /// Process-local exact search (lost on exit)
    Memory,
}

#[derive(Parser, Debug)]
#[command(
    name = "docrag-server",
    about = "HTTP API for ingesting documents and answering questions over them"
)]
struct ServerCli {
    /// Address to bind the HTTP server to (host:port).
    #[arg(long, env = "DOCRAG_BIND", default_value = "127.0.0.1:8080")]
    bind: String,

    /// Vector store backend.
    #[arg(long, env = "DOCRAG_STORE", value_enum, default_value_t = StoreKind::Pg)]
    store: StoreKind,

    /// Directory where uploaded files are kept.
    #[arg(long, env = "DOCRAG_UPLOAD_DIR", default_value = "data/pdfs")]
    upload_dir: PathBuf,

    #[command(flatten)]
    settings: Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = ServerCli::parse();

    let store: Arc<dyn VectorStore> = match cli.store {
        StoreKind::Pg => {
            let config = cli.settings.store_config()?;
            tracing::info!(table = %config.table.qualified(), metric = %config.metric, "connecting to pgvector");
            Arc::new(PgVectorStore::connect(config).await?)
        }
        StoreKind::Memory => {
            tracing::warn!("using in-memory store; ingested documents are lost on exit");
            Arc::new(InMemoryVectorStore::new(
                cli.settings.embed_dimensions,
                cli.settings.metric,
            ))
        }
    };
    let pipeline = cli.settings.build_pipeline(store)?;
    let app = router(AppState::new(Arc::new(pipeline), cli.upload_dir));

    let addr: SocketAddr = cli
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", cli.bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "docrag-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server shutdown")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
