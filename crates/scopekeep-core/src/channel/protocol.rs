//! Method channel wire types and dispatch

use crate::error::{Error, Result};
use crate::scope::BookmarkService;
use crate::storage::{self, BookmarkStore};
use crate::types::Token;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error};

/// Methods understood on the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    CreateBookmark,
    ResolveBookmark,
    StopAccess,
    SaveBookmark,
    LoadBookmark,
    ListBookmarks,
    DeleteBookmark,
}

impl Method {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "createBookmark" => Some(Self::CreateBookmark),
            "resolveBookmark" => Some(Self::ResolveBookmark),
            "stopAccess" => Some(Self::StopAccess),
            "saveBookmark" => Some(Self::SaveBookmark),
            "loadBookmark" => Some(Self::LoadBookmark),
            "listBookmarks" => Some(Self::ListBookmarks),
            "deleteBookmark" => Some(Self::DeleteBookmark),
            _ => None,
        }
    }
}

/// A call from the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// Coded failure reported back to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelError {
    pub code: String,
    pub message: String,
}

/// Reply to a [`MethodCall`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodResponse {
    Ok(Value),
    Error(ChannelError),
}

impl MethodResponse {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error(ChannelError {
            code: code.into(),
            message: message.into(),
        })
    }

    pub fn not_implemented(method: &str) -> Self {
        Self::error("NOT_IMPLEMENTED", format!("method not implemented: {}", method))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Ok(_) => None,
            Self::Error(e) => Some(&e.code),
        }
    }
}

impl From<Result<Value>> for MethodResponse {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(e) => Self::error(e.channel_code(), e.to_string()),
        }
    }
}

/// Routes channel calls to the bookmark service and, when attached, the store
pub struct MethodHandler {
    service: Arc<BookmarkService>,
    store: Option<Arc<BookmarkStore>>,
}

impl MethodHandler {
    pub fn new(service: Arc<BookmarkService>) -> Self {
        Self {
            service,
            store: None,
        }
    }

    pub fn with_store(service: Arc<BookmarkService>, store: Arc<BookmarkStore>) -> Self {
        Self {
            service,
            store: Some(store),
        }
    }

    pub fn service(&self) -> &Arc<BookmarkService> {
        &self.service
    }

    /// Handle one call. Blocking; runs the bookmark primitives inline.
    pub fn handle(&self, call: &MethodCall) -> MethodResponse {
        let Some(method) = Method::parse(&call.method) else {
            debug!("Unknown channel method: {}", call.method);
            return MethodResponse::not_implemented(&call.method);
        };

        let result = match method {
            Method::CreateBookmark => self.create_bookmark(&call.arguments),
            Method::ResolveBookmark => self.resolve_bookmark(&call.arguments),
            Method::StopAccess => {
                // Releasing must never surface an error to the host
                if let Some(path) = call.arguments.as_str() {
                    self.service.release_access(path);
                }
                Ok(Value::Null)
            }
            Method::SaveBookmark
            | Method::LoadBookmark
            | Method::ListBookmarks
            | Method::DeleteBookmark => match &self.store {
                Some(store) => self.handle_store(method, store, &call.arguments),
                None => return MethodResponse::not_implemented(&call.method),
            },
        };

        if let Err(e) = &result {
            error!("Channel method {} failed: {}", call.method, e);
        }
        result.into()
    }

    fn create_bookmark(&self, arguments: &Value) -> Result<Value> {
        let path = required_str(arguments, "path")?;
        let token = self.service.create_token(path)?;
        Ok(Value::String(token.to_base64()))
    }

    fn resolve_bookmark(&self, arguments: &Value) -> Result<Value> {
        let token = Token::from_base64(required_str(arguments, "token")?)?;
        let resolved = self.service.resolve_token(&token)?;
        Ok(serde_json::to_value(resolved)?)
    }

    fn handle_store(
        &self,
        method: Method,
        store: &BookmarkStore,
        arguments: &Value,
    ) -> Result<Value> {
        let conn = store.connection()?;

        match method {
            Method::SaveBookmark => {
                let label = field_str(arguments, "label")?;
                let token = Token::from_base64(field_str(arguments, "token")?)?;
                let path = arguments.get("path").and_then(Value::as_str);
                storage::save_bookmark(&conn, label, &token, path)?;
                Ok(Value::Null)
            }
            Method::LoadBookmark => {
                let label = required_str(arguments, "label")?;
                let stored = storage::get_bookmark(&conn, label)?;
                Ok(stored
                    .map(|b| Value::String(b.token.to_base64()))
                    .unwrap_or(Value::Null))
            }
            Method::ListBookmarks => Ok(serde_json::to_value(storage::list_bookmarks(&conn)?)?),
            Method::DeleteBookmark => {
                let label = required_str(arguments, "label")?;
                Ok(json!(storage::delete_bookmark(&conn, label)?))
            }
            _ => Err(Error::Internal(format!("{:?} is not a store method", method))),
        }
    }
}

/// Plain string argument, e.g. the path for `createBookmark`
fn required_str<'a>(arguments: &'a Value, what: &str) -> Result<&'a str> {
    arguments
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::invalid_argument(format!("missing {}", what)))
}

/// Named string field of an object argument
fn field_str<'a>(arguments: &'a Value, field: &str) -> Result<&'a str> {
    arguments
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::invalid_argument(format!("missing {}", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScopeConfig;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn handler() -> MethodHandler {
        let service = Arc::new(BookmarkService::with_file_bookmarks(ScopeConfig::default()));
        let store = Arc::new(BookmarkStore::in_memory().unwrap());
        MethodHandler::with_store(service, store)
    }

    #[test]
    fn test_response_wire_shape() {
        let ok = serde_json::to_value(MethodResponse::Ok(json!("x"))).unwrap();
        assert_eq!(ok, json!({"ok": "x"}));

        let err = serde_json::to_value(MethodResponse::error("ARG", "Missing path")).unwrap();
        assert_eq!(err, json!({"error": {"code": "ARG", "message": "Missing path"}}));
    }

    #[test]
    fn test_create_resolve_stop() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("report.pdf");
        std::fs::write(&file, "pdf").unwrap();
        let handler = handler();

        let call = MethodCall::new("createBookmark", json!(file.to_str().unwrap()));
        let created = handler.handle(&call);
        let MethodResponse::Ok(Value::String(token)) = created else {
            panic!("expected token, got {:?}", created);
        };

        let resolved = handler.handle(&MethodCall::new("resolveBookmark", json!(token)));
        let MethodResponse::Ok(value) = resolved else {
            panic!("expected path, got {:?}", resolved);
        };
        assert_eq!(value["stale"], json!(false));
        let path = value["path"].as_str().unwrap().to_string();
        assert_eq!(handler.service().open_holders(&path), 1);

        let stopped = handler.handle(&MethodCall::new("stopAccess", json!(path)));
        assert_eq!(stopped, MethodResponse::Ok(Value::Null));
        assert_eq!(handler.service().open_holders(&path), 0);
    }

    #[test]
    fn test_argument_errors() {
        let handler = handler();

        let missing = handler.handle(&MethodCall::new("createBookmark", Value::Null));
        assert_eq!(missing.code(), Some("ARG"));

        let not_base64 = handler.handle(&MethodCall::new("resolveBookmark", json!("%%%")));
        assert_eq!(not_base64.code(), Some("ARG"));

        let garbage = handler.handle(&MethodCall::new("resolveBookmark", json!("Z2FyYmFnZQ==")));
        assert_eq!(garbage.code(), Some("RESOLVE"));
    }

    #[test]
    fn test_create_missing_path_is_bookmark_error() {
        let dir = tempdir().unwrap();
        let handler = handler();

        let response = handler.handle(&MethodCall::new(
            "createBookmark",
            json!(dir.path().join("nope.txt").to_str().unwrap()),
        ));
        assert_eq!(response.code(), Some("BOOKMARK"));
        assert!(handler.service().registrar().open_scopes().is_empty());
    }

    #[test]
    fn test_stop_access_never_fails() {
        let handler = handler();
        assert!(handler.handle(&MethodCall::new("stopAccess", json!(42))).is_ok());
        assert!(handler
            .handle(&MethodCall::new("stopAccess", json!("/not/open")))
            .is_ok());
    }

    #[test]
    fn test_unknown_method() {
        let handler = handler();
        let response = handler.handle(&MethodCall::new("openFile", Value::Null));
        assert_eq!(response.code(), Some("NOT_IMPLEMENTED"));
    }

    #[test]
    fn test_store_methods() {
        let handler = handler();

        let saved = handler.handle(&MethodCall::new(
            "saveBookmark",
            json!({"label": "repo", "token": "AAEC/w==", "path": "/src/repo"}),
        ));
        assert!(saved.is_ok());

        let loaded = handler.handle(&MethodCall::new("loadBookmark", json!("repo")));
        assert_eq!(loaded, MethodResponse::Ok(json!("AAEC/w==")));

        let listed = handler.handle(&MethodCall::new("listBookmarks", Value::Null));
        let MethodResponse::Ok(Value::Array(items)) = listed else {
            panic!("expected list, got {:?}", listed);
        };
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["label"], json!("repo"));

        let deleted = handler.handle(&MethodCall::new("deleteBookmark", json!("repo")));
        assert_eq!(deleted, MethodResponse::Ok(json!(true)));
        let gone = handler.handle(&MethodCall::new("loadBookmark", json!("repo")));
        assert_eq!(gone, MethodResponse::Ok(Value::Null));
    }

    #[test]
    fn test_store_methods_need_a_store() {
        let service = Arc::new(BookmarkService::with_file_bookmarks(ScopeConfig::default()));
        let handler = MethodHandler::new(service);
        let response = handler.handle(&MethodCall::new("loadBookmark", json!("repo")));
        assert_eq!(response.code(), Some("NOT_IMPLEMENTED"));
    }
}
