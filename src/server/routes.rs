//! HTTP route handlers for the chat relay API.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::{ChatInput, ChatReply};
use crate::conversation::{Message, ROLE_USER};

use super::error::ApiError;
use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/chat", post(chat))
        .route("/chat/", post(chat))
        .route("/chat/{conversation_id}", get(conversation_history))
        .route("/chat/{conversation_id}/end", post(end_conversation))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "chat-relay",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.model_name,
        "conversations": state.chat.store().len(),
    }))
}

fn default_role() -> String {
    ROLE_USER.to_string()
}

/// Chat request.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The message text.
    pub message: String,
    /// Role tag; `user` when omitted.
    #[serde(default = "default_role")]
    pub role: String,
    /// Conversation key.
    pub conversation_id: String,
}

impl From<ChatRequest> for ChatInput {
    fn from(request: ChatRequest) -> Self {
        Self::new(request.conversation_id, request.message).with_role(request.role)
    }
}

/// Chat response.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// The generated reply.
    pub response: String,
    /// Echo of the conversation key.
    pub conversation_id: String,
}

impl From<ChatReply> for ChatResponse {
    fn from(reply: ChatReply) -> Self {
        Self {
            response: reply.response,
            conversation_id: reply.conversation_id,
        }
    }
}

/// Handle one chat turn. Body rejections keep axum's status but use the `detail` shape.
async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;
    let reply = state.chat.handle_chat(request.into()).await?;
    Ok(Json(reply.into()))
}

/// Conversation history response.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Conversation key.
    pub conversation_id: String,
    /// Whether the conversation still accepts messages.
    pub active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Messages in order, seed prompt first.
    pub messages: Vec<Message>,
}

/// Return the history of a known conversation without creating one.
async fn conversation_history(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let handle = state
        .chat
        .store()
        .get(&conversation_id)
        .ok_or_else(|| ApiError::conversation_not_found(&conversation_id))?;
    let conversation = handle.lock().await;

    Ok(Json(HistoryResponse {
        active: conversation.is_active(),
        created_at: conversation.created_at(),
        messages: conversation.messages().to_vec(),
        conversation_id,
    }))
}

/// Close a conversation for good.
async fn end_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.chat.store().close(&conversation_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::conversation_not_found(&conversation_id))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, Response, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::chat::ChatService;
    use crate::conversation::{ConversationStore, SYSTEM_PROMPT};
    use crate::llm::CompletionClient;
    use crate::llm::scripted::ScriptedClient;

    fn app(client: &Arc<ScriptedClient>) -> Router {
        let client: Arc<dyn CompletionClient> = Arc::clone(client) as Arc<dyn CompletionClient>;
        let chat = ChatService::new(
            Arc::new(ConversationStore::new()),
            client,
            Duration::from_secs(5),
        );
        create_router(AppState::new(chat, "test-model"))
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap_or_default()
    }

    fn request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap_or_default()
    }

    async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
        app.clone()
            .oneshot(request)
            .await
            .unwrap_or_else(|never| match never {})
    }

    async fn json_body(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        serde_json::from_slice(&bytes).unwrap_or_default()
    }

    #[tokio::test]
    async fn test_chat_returns_reply_and_echoes_id() {
        let client = Arc::new(ScriptedClient::new().reply(&["Hi", " there"]));
        let app = app(&client);

        let response = send(
            &app,
            post_json("/chat/", &json!({"message": "hello", "conversation_id": "c1"})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"response": "Hi there", "conversation_id": "c1"})
        );
    }

    #[tokio::test]
    async fn test_turns_accumulate_history_upstream() {
        let client = Arc::new(ScriptedClient::new().reply(&["one"]).reply(&["two"]));
        let app = app(&client);

        for message in ["first", "second"] {
            let response = send(
                &app,
                post_json("/chat/", &json!({"message": message, "conversation_id": "c1"})),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1],
            vec![
                Message::system(SYSTEM_PROMPT),
                Message::user("first"),
                Message::system("one"),
                Message::user("second"),
            ]
        );
    }

    #[tokio::test]
    async fn test_role_defaults_to_user_and_history_is_exposed() {
        let client = Arc::new(ScriptedClient::new().reply(&["ok"]).reply(&["ok"]));
        let app = app(&client);

        let _ = send(
            &app,
            post_json("/chat", &json!({"message": "hello", "conversation_id": "c1"})),
        )
        .await;
        let _ = send(
            &app,
            post_json(
                "/chat/",
                &json!({"message": "note", "role": "assistant", "conversation_id": "c1"}),
            ),
        )
        .await;

        let response = send(&app, request("GET", "/chat/c1")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;

        assert_eq!(body["conversation_id"], "c1");
        assert_eq!(body["active"], true);
        assert_eq!(body["messages"][0]["content"], SYSTEM_PROMPT);
        assert_eq!(body["messages"][1], json!({"role": "user", "content": "hello"}));
        assert_eq!(body["messages"][2], json!({"role": "system", "content": "ok"}));
        assert_eq!(body["messages"][3]["role"], "assistant");
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(5));
    }

    #[tokio::test]
    async fn test_closed_conversation_returns_400() {
        let client = Arc::new(ScriptedClient::new().reply(&["ok"]));
        let app = app(&client);

        let _ = send(
            &app,
            post_json("/chat/", &json!({"message": "hello", "conversation_id": "c1"})),
        )
        .await;
        let ended = send(&app, request("POST", "/chat/c1/end")).await;
        assert_eq!(ended.status(), StatusCode::NO_CONTENT);

        let response = send(
            &app,
            post_json("/chat/", &json!({"message": "again", "conversation_id": "c1"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({"detail": "Conversation has ended."})
        );

        let history = json_body(send(&app, request("GET", "/chat/c1")).await).await;
        assert_eq!(history["active"], false);
        assert_eq!(history["messages"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn test_upstream_failure_returns_500_with_detail() {
        let client = Arc::new(ScriptedClient::new().fail("Invalid API Key"));
        let app = app(&client);

        let response = send(
            &app,
            post_json("/chat/", &json!({"message": "hello", "conversation_id": "c1"})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(
            body["detail"]
                .as_str()
                .is_some_and(|detail| detail.contains("Invalid API Key"))
        );
    }

    #[tokio::test]
    async fn test_unknown_conversation_is_404_and_not_created() {
        let client = Arc::new(ScriptedClient::new());
        let app = app(&client);

        let history = send(&app, request("GET", "/chat/ghost")).await;
        assert_eq!(history.status(), StatusCode::NOT_FOUND);

        let ended = send(&app, request("POST", "/chat/ghost/end")).await;
        assert_eq!(ended.status(), StatusCode::NOT_FOUND);

        let health = json_body(send(&app, request("GET", "/health")).await).await;
        assert_eq!(health["conversations"], 0);
        assert_eq!(health["model"], "test-model");
    }

    #[tokio::test]
    async fn test_missing_conversation_id_is_rejected() {
        let client = Arc::new(ScriptedClient::new());
        let app = app(&client);

        let response = send(&app, post_json("/chat/", &json!({"message": "hello"}))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert!(
            body["detail"]
                .as_str()
                .is_some_and(|detail| detail.contains("conversation_id"))
        );
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_is_400_with_detail() {
        let client = Arc::new(ScriptedClient::new());
        let app = app(&client);

        let request = Request::builder()
            .method("POST")
            .uri("/chat/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"message\": "))
            .unwrap_or_default();
        let response = send(&app, request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["detail"].is_string());
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_missing_content_type_is_415_with_detail() {
        let client = Arc::new(ScriptedClient::new());
        let app = app(&client);

        let request = Request::builder()
            .method("POST")
            .uri("/chat/")
            .body(Body::from(
                json!({"message": "hello", "conversation_id": "c1"}).to_string(),
            ))
            .unwrap_or_default();
        let response = send(&app, request).await;

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(json_body(response).await["detail"].is_string());
    }
}
