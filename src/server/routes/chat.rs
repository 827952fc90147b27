use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::message;
use crate::db::Db;
use crate::error::{CimsError, LlmError};
use crate::llm::TextStream;
use crate::llm::prompts::chat_prompt;
use crate::server::extract::{ApiJson, ApiQuery};
use crate::server::guards::auth::CurrentUser;
use crate::server::router::{CimsState, X_SESSION_ID};

const ROLE_USER: &str = "user";
const ROLE_MODEL: &str = "model";

pub fn router() -> Router<CimsState> {
    Router::new()
        .route("/chat/stream", post(chat_stream))
        .route("/chat/history", get(chat_history))
        .route("/chat/history/{session_id}", delete(clear_history))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatMessageView {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// The reply being relayed; stored once the upstream stream ends cleanly.
struct PendingReply {
    db: Db,
    user_id: i64,
    session_id: String,
    text: String,
}

impl PendingReply {
    async fn persist(self) {
        if let Err(e) = self
            .db
            .append_chat_message(self.user_id, &self.session_id, ROLE_MODEL, &self.text)
            .await
        {
            error!(session_id = %self.session_id, error = %e, "Failed to store chat reply");
        }
    }
}

fn error_chunk(err: &LlmError) -> String {
    format!("Error: {}", err.public_message())
}

/// Forward model chunks to the client; upstream failures become a final `Error: …` chunk.
fn relay(
    upstream: TextStream,
    reply: PendingReply,
) -> impl futures::Stream<Item = Result<String, Infallible>> + Send {
    stream::unfold(Some((upstream, reply)), |state| async move {
        let (mut upstream, mut reply) = state?;
        match upstream.next().await {
            Some(Ok(chunk)) => {
                reply.text.push_str(&chunk);
                Some((Ok(chunk), Some((upstream, reply))))
            }
            Some(Err(e)) => {
                warn!(session_id = %reply.session_id, error = %e.public_message(), "Chat stream failed");
                Some((Ok(error_chunk(&e)), None))
            }
            None => {
                debug!(session_id = %reply.session_id, chars = reply.text.len(), "Chat stream finished");
                reply.persist().await;
                None
            }
        }
    })
}

/// POST /api/chat/stream: chunked `text/plain` reply, session id in `X-Session-Id`.
async fn chat_stream(
    State(state): State<CimsState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<ChatRequest>,
) -> Result<Response, CimsError> {
    if body.message.trim().is_empty() {
        return Err(CimsError::bad_request("Message is required"));
    }
    let session_id = match body.session_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => Uuid::new_v4().to_string(),
    };
    let session_header = HeaderValue::from_str(&session_id)
        .map_err(|_| CimsError::bad_request("Invalid session_id"))?;

    let inventory = state.db.list_equipment_for_context().await?;
    let history: Vec<(String, String)> = state
        .db
        .chat_history(user.id, Some(&session_id))
        .await?
        .into_iter()
        .map(|m| (m.role, m.content))
        .collect();
    state
        .db
        .append_chat_message(user.id, &session_id, ROLE_USER, &body.message)
        .await?;

    let prompt = chat_prompt(&inventory, &history, &body.message);
    let chunks = match state.llm.stream(&prompt).await {
        Ok(upstream) => relay(
            upstream,
            PendingReply {
                db: state.db.clone(),
                user_id: user.id,
                session_id: session_id.clone(),
                text: String::new(),
            },
        )
        .boxed(),
        Err(e) => {
            warn!(session_id = %session_id, error = %e.public_message(), "Chat stream could not start");
            stream::once(async move { Ok::<_, Infallible>(error_chunk(&e)) }).boxed()
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8")),
            (X_SESSION_ID, session_header),
        ],
        Body::from_stream(chunks),
    )
        .into_response())
}

/// GET /api/chat/history?session_id
async fn chat_history(
    State(state): State<CimsState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<Vec<ChatMessageView>>, CimsError> {
    let session = query.session_id.as_deref().filter(|s| !s.is_empty());
    let messages = state.db.chat_history(user.id, session).await?;
    Ok(Json(
        messages
            .into_iter()
            .map(|m| ChatMessageView {
                role: m.role,
                content: m.content,
                timestamp: m.timestamp,
            })
            .collect(),
    ))
}

async fn clear_history(
    State(state): State<CimsState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, CimsError> {
    let removed = state.db.clear_chat_session(user.id, &session_id).await?;
    debug!(session_id = %session_id, removed, "Chat history cleared");
    Ok(message("Chat history cleared"))
}
