//! Async channel server
//!
//! The host pushes calls onto an mpsc queue together with a oneshot reply
//! sender. Every call runs on the blocking pool, so slow bookmark primitives
//! never stall the executor and independent calls proceed concurrently.

use super::protocol::{MethodCall, MethodHandler, MethodResponse};
use crate::error::{Error, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// A queued call and where to send its reply
pub type ChannelRequest = (MethodCall, oneshot::Sender<MethodResponse>);

/// Cloneable sender side of a running channel
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    name: Arc<str>,
    tx: mpsc::Sender<ChannelRequest>,
}

impl ChannelHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send a call and wait for its reply
    pub async fn call(&self, call: MethodCall) -> Result<MethodResponse> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((call, reply_tx))
            .await
            .map_err(|_| Error::Internal(format!("channel {} is closed", self.name)))?;

        reply_rx
            .await
            .map_err(|_| Error::Internal(format!("channel {} dropped a reply", self.name)))
    }
}

/// Serves a [`MethodHandler`] on the current tokio runtime
pub struct ChannelServer;

impl ChannelServer {
    pub fn spawn(handler: MethodHandler, name: impl Into<String>, buffer: usize) -> ChannelHandle {
        let name: Arc<str> = Arc::from(name.into());
        let (tx, mut rx) = mpsc::channel::<ChannelRequest>(buffer.max(1));
        let handler = Arc::new(handler);

        info!("Serving method channel: {}", name);

        let server_name = Arc::clone(&name);
        tokio::spawn(async move {
            while let Some((call, reply_tx)) = rx.recv().await {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    let method = call.method.clone();
                    let response =
                        match tokio::task::spawn_blocking(move || handler.handle(&call)).await {
                            Ok(response) => response,
                            Err(e) => {
                                error!("Channel method {} panicked: {}", method, e);
                                MethodResponse::error("INTERNAL", e.to_string())
                            }
                        };

                    debug!("Handled channel method: {}", method);
                    let _ = reply_tx.send(response);
                });
            }
            info!("Method channel {} closed", server_name);
        });

        ChannelHandle { name, tx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScopeConfig;
    use crate::scope::BookmarkService;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    fn spawn() -> ChannelHandle {
        let service = Arc::new(BookmarkService::with_file_bookmarks(ScopeConfig::default()));
        ChannelServer::spawn(MethodHandler::new(service), "security_scoped", 8)
    }

    #[tokio::test]
    async fn test_round_trip_over_channel() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.md");
        std::fs::write(&file, "# notes").unwrap();
        let channel = spawn();
        assert_eq!(channel.name(), "security_scoped");

        let created = channel
            .call(MethodCall::new("createBookmark", json!(file.to_str().unwrap())))
            .await
            .unwrap();
        let MethodResponse::Ok(token) = created else {
            panic!("expected token, got {:?}", created);
        };

        let resolved = channel
            .call(MethodCall::new("resolveBookmark", token))
            .await
            .unwrap();
        let MethodResponse::Ok(value) = resolved else {
            panic!("expected path, got {:?}", resolved);
        };
        assert_eq!(value["stale"], json!(false));

        let stopped = channel
            .call(MethodCall::new("stopAccess", value["path"].clone()))
            .await
            .unwrap();
        assert_eq!(stopped, MethodResponse::Ok(Value::Null));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_resolves_share_one_bracket() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("report.pdf");
        std::fs::write(&file, "pdf").unwrap();

        let service = Arc::new(BookmarkService::with_file_bookmarks(ScopeConfig::default()));
        let channel = ChannelServer::spawn(MethodHandler::new(Arc::clone(&service)), "scoped", 16);

        let MethodResponse::Ok(token) = channel
            .call(MethodCall::new("createBookmark", json!(file.to_str().unwrap())))
            .await
            .unwrap()
        else {
            panic!("createBookmark failed");
        };

        let calls: Vec<_> = (0..10)
            .map(|_| {
                let channel = channel.clone();
                let token = token.clone();
                tokio::spawn(async move {
                    channel
                        .call(MethodCall::new("resolveBookmark", token))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut path = String::new();
        for call in calls {
            let MethodResponse::Ok(value) = call.await.unwrap() else {
                panic!("resolveBookmark failed");
            };
            path = value["path"].as_str().unwrap().to_string();
        }
        assert_eq!(service.open_holders(&path), 10);
        assert_eq!(service.registrar().open_scopes().len(), 1);

        for _ in 0..11 {
            channel
                .call(MethodCall::new("stopAccess", json!(path)))
                .await
                .unwrap();
        }
        assert_eq!(service.open_holders(&path), 0);
        assert!(service.registrar().open_scopes().is_empty());
    }
}
