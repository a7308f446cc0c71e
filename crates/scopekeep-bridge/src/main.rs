//! Scopekeep host bridge
//!
//! Serves the bookmark method channel as JSON lines: one `MethodCall` per
//! stdin line, one `MethodResponse` per stdout line, in request order.
//! Logs go to stderr.

use anyhow::Context;
use scopekeep_core::{
    BookmarkService, BookmarkStore, ChannelServer, MethodCall, MethodHandler, MethodResponse,
    ScopeConfig,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn build_handler(config: &ScopeConfig) -> anyhow::Result<MethodHandler> {
    let service = Arc::new(BookmarkService::with_file_bookmarks(config.clone()));

    if !config.persist_tokens {
        return Ok(MethodHandler::new(service));
    }

    match config.resolved_database_path() {
        Some(db_path) => {
            let store = BookmarkStore::from_path(db_path.clone())
                .with_context(|| format!("opening bookmark store at {:?}", db_path))?;
            Ok(MethodHandler::with_store(service, Arc::new(store)))
        }
        None => {
            warn!("No data directory available, token store disabled");
            Ok(MethodHandler::new(service))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Scopekeep bridge v{}", env!("CARGO_PKG_VERSION"));

    let config = ScopeConfig::from_env().context("loading configuration")?;
    let handler = build_handler(&config)?;
    let channel = ChannelServer::spawn(handler, config.channel_name.clone(), config.channel_buffer);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<MethodCall>(&line) {
            Ok(call) => channel.call(call).await?,
            Err(e) => {
                warn!("Rejecting malformed request: {}", e);
                MethodResponse::error("ARG", format!("malformed request: {}", e))
            }
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        stdout.write_all(&out).await.context("writing stdout")?;
        stdout.flush().await?;
    }

    info!("Stdin closed, shutting down");
    Ok(())
}
