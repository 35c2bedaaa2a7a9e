//! Streaming client for Groq's OpenAI-compatible chat completions API.

use std::time::Duration;

use serde::Serialize;

use crate::config::UpstreamConfig;
use crate::conversation::Message;

use super::error::{LlmError, LlmResult};
use super::sse::decode_fragments;
use super::{CompletionClient, CompletionFuture, FragmentStream};

/// Sampling temperature sent with every request.
const TEMPERATURE: f32 = 1.0;
/// Token budget for a single reply.
const MAX_TOKENS: u32 = 1024;
/// Nucleus-sampling parameter.
const TOP_P: f32 = 1.0;
/// TCP connect timeout. The overall call is bounded by the caller.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
    stop: Option<Vec<String>>,
}

impl<'a> ChatCompletionRequest<'a> {
    const fn streaming(model: &'a str, messages: &'a [Message]) -> Self {
        Self {
            model,
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            top_p: TOP_P,
            stream: true,
            stop: None,
        }
    }
}

/// Groq chat-completion client. No retries are attempted.
pub struct GroqClient {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl GroqClient {
    /// Create a client for the configured endpoint.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: UpstreamConfig) -> LlmResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client, config })
    }

    /// Model identifier used for every request.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

impl CompletionClient for GroqClient {
    fn stream_completion<'a>(
        &'a self,
        messages: &'a [Message],
    ) -> CompletionFuture<'a, LlmResult<FragmentStream>> {
        Box::pin(async move {
            let request = ChatCompletionRequest::streaming(&self.config.model, messages);
            tracing::debug!(
                model = %self.config.model,
                messages = messages.len(),
                "sending streaming completion request"
            );

            let response = self
                .client
                .post(self.completions_url())
                .bearer_auth(self.config.api_key())
                .json(&request)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let fragments: FragmentStream =
                Box::pin(decode_fragments(Box::pin(response.bytes_stream())));
            Ok(fragments)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;

    use super::*;
    use crate::llm::collect_fragments;

    #[test]
    fn test_request_body_matches_wire_format() {
        let messages = vec![Message::system("seed"), Message::user("hello")];
        let request = ChatCompletionRequest::streaming("llama-3.1-8b-instant", &messages);
        let json = serde_json::to_value(&request).unwrap_or_default();

        assert_eq!(
            json,
            serde_json::json!({
                "model": "llama-3.1-8b-instant",
                "messages": [
                    {"role": "system", "content": "seed"},
                    {"role": "user", "content": "hello"}
                ],
                "temperature": 1.0,
                "max_tokens": 1024,
                "top_p": 1.0,
                "stream": true,
                "stop": null
            })
        );
    }

    #[test]
    fn test_completions_url_tolerates_trailing_slash() {
        let config = UpstreamConfig::new("k").with_base_url("http://localhost:1/v1/");
        let client = GroqClient::new(config);
        assert!(client.is_ok());
        if let Ok(client) = client {
            assert_eq!(client.completions_url(), "http://localhost:1/v1/chat/completions");
        }
    }

    async fn spawn_upstream(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await;
        let Ok(listener) = listener else {
            return String::new();
        };
        let addr = listener.local_addr().map(|a| a.to_string()).unwrap_or_default();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}/openai/v1")
    }

    #[tokio::test]
    async fn test_streams_reply_from_sse_endpoint() {
        let seen_auth = Arc::new(Mutex::new(None::<String>));
        let seen = Arc::clone(&seen_auth);
        let app = Router::new().route(
            "/openai/v1/chat/completions",
            post(move |headers: HeaderMap| {
                let seen = Arc::clone(&seen);
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    if let Ok(mut slot) = seen.lock() {
                        *slot = auth;
                    }
                    concat!(
                        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
                        "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
                        "data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n",
                        "data: [DONE]\n\n",
                    )
                }
            }),
        );
        let base_url = spawn_upstream(app).await;

        let client = GroqClient::new(UpstreamConfig::new("gsk_test").with_base_url(base_url));
        assert!(client.is_ok());
        let Ok(client) = client else { return };

        let messages = vec![Message::user("hello")];
        let reply = match client.stream_completion(&messages).await {
            Ok(fragments) => collect_fragments(fragments).await.unwrap_or_default(),
            Err(err) => err.to_string(),
        };

        assert_eq!(reply, "Hi there");
        let auth = seen_auth.lock().ok().and_then(|slot| slot.clone());
        assert_eq!(auth.as_deref(), Some("Bearer gsk_test"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let app = Router::new().route(
            "/openai/v1/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, "Invalid API Key") }),
        );
        let base_url = spawn_upstream(app).await;

        let client = GroqClient::new(UpstreamConfig::new("bad").with_base_url(base_url));
        let Ok(client) = client else { return };

        let messages = vec![Message::user("hello")];
        let result = client.stream_completion(&messages).await;
        assert!(matches!(
            result,
            Err(LlmError::Status { status: 401, ref body }) if body == "Invalid API Key"
        ));
    }
}
