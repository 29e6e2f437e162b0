//! Request handlers
//!
//! Store calls block on file I/O and locks, so every one runs on tokio's
//! blocking pool.

use std::io::{self, Write};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::CollectError;
use crate::users::{User, UserStore};

use super::error::ApiError;

/// Backup chunks buffered ahead of the client
const BACKUP_CHANNEL_DEPTH: usize = 16;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<UserStore>,
}

// =============================================================================
// Response Bodies
// =============================================================================

/// `{"id":N}`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdResponse {
    pub id: u64,
}

/// `{"ids":[...]}`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    pub ids: Vec<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    email: Option<String>,
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FuzzyParams {
    #[serde(default)]
    email: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /users
pub async fn add_user(
    State(state): State<AppState>,
    payload: Result<Json<User>, JsonRejection>,
) -> Result<(StatusCode, Json<IdResponse>), ApiError> {
    let Json(user) = payload?;
    let id = blocking(move || state.store.add_user(user)).await?;
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

/// GET /users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let id: u64 = raw_id
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("could not parse user id {:?}: {}", raw_id, e)))?;

    let user = blocking(move || state.store.get_user(id)).await?;
    Ok(Json(user))
}

/// GET /users/search?email= or ?phone=
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<IdResponse>, ApiError> {
    let id = match (params.email, params.phone) {
        (Some(email), _) => blocking(move || state.store.get_user_id_by_email(&email)).await?,
        (None, Some(phone)) => blocking(move || state.store.get_user_id_by_phone(&phone)).await?,
        (None, None) => {
            return Err(ApiError::BadRequest(
                "search needs an email or phone parameter".to_string(),
            ))
        }
    };
    Ok(Json(IdResponse { id }))
}

/// GET /users/fuzzysearch?email=
pub async fn fuzzy_search(
    State(state): State<AppState>,
    Query(params): Query<FuzzyParams>,
) -> Result<Json<SearchResult>, ApiError> {
    let ids = blocking(move || {
        state
            .store
            .get_user_ids_matching_email_prefix(&params.email)
    })
    .await?;
    Ok(Json(SearchResult { ids }))
}

/// GET /backup
///
/// The length is taken from the same pinned snapshot that is streamed, so
/// `Content-Length` always matches the body.
pub async fn backup(State(state): State<AppState>) -> Result<Response, ApiError> {
    let store = Arc::clone(&state.store);
    let (snapshot, size) = blocking(move || {
        let snapshot = store.snapshot()?;
        let size = snapshot.size()?;
        Ok((snapshot, size))
    })
    .await?;

    let (tx, rx) = mpsc::channel(BACKUP_CHANNEL_DEPTH);
    tokio::task::spawn_blocking(move || {
        let mut sink = ChannelSink { tx };
        if let Err(e) = snapshot.write_to(&mut sink) {
            tracing::warn!("Backup of txid {} aborted: {}", snapshot.txid(), e);
            let _ = sink
                .tx
                .blocking_send(Err(io::Error::new(io::ErrorKind::Other, e.to_string())));
        }
    });

    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (
            header::CONTENT_DISPOSITION,
            r#"attachment; filename="backup.db""#.to_string(),
        ),
        (header::CONTENT_LENGTH, size.to_string()),
    ];
    let body = Body::from_stream(ReceiverStream::new(rx));
    Ok((StatusCode::OK, headers, body).into_response())
}

// =============================================================================
// Helpers
// =============================================================================

/// Run a store call on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => Err(ApiError::Store(CollectError::StorageUnavailable(format!(
            "store task failed: {}",
            e
        )))),
    }
}

/// `io::Write` adapter feeding the response body channel
struct ChannelSink {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl Write for ChannelSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "backup client went away"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
