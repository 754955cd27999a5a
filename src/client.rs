use async_trait::async_trait;
use reqwest::{Client, Request, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

use crate::error::ChatError;
use crate::message::ChatMessage;

/// Body of a chat completions request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// A request ready to go out, together with the credential to send it with.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub api_key: String,
    pub body: CompletionRequest,
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("api_key", &"[REDACTED]")
            .field("body", &self.body)
            .finish()
    }
}

/// Something that turns a transcript into the assistant's next reply.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &PendingRequest) -> Result<String, ChatError>;
}

/// Client for an OpenAI-compatible chat completions endpoint (OpenRouter by default).
#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client,
    endpoint: String,
}

impl OpenRouterClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the POST for `request` without sending it.
    pub fn build_request(&self, request: &PendingRequest) -> Result<Request, ChatError> {
        let built = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", request.api_key))
            .header("Content-Type", "application/json")
            .json(&request.body)
            .build()?;
        Ok(built)
    }
}

#[async_trait]
impl CompletionService for OpenRouterClient {
    async fn complete(&self, request: &PendingRequest) -> Result<String, ChatError> {
        debug!(
            endpoint = %self.endpoint,
            model = %request.body.model,
            messages = request.body.messages.len(),
            "Sending completion request"
        );

        let http_request = self.build_request(request)?;
        let response = self.client.execute(http_request).await?;

        let status = response.status();
        let body = response.text().await?;

        let result = interpret_response(status, &body);
        match &result {
            Ok(content) => debug!(chars = content.chars().count(), "Received completion"),
            Err(e) => warn!(%status, "Completion request failed: {}", e),
        }
        result
    }
}

/// Turn a raw HTTP response into the assistant's reply or a user-facing error.
///
/// Success bodies are read leniently: a missing `choices[0].message.content`
/// gives an empty reply. Only a body that isn't JSON at all is an error.
/// For failed requests `error.message` wins, then the status reason phrase,
/// then a generic message; an unparseable error body counts as empty.
pub fn interpret_response(status: StatusCode, body: &str) -> Result<String, ChatError> {
    if !status.is_success() {
        let error_body: Value = serde_json::from_str(body).unwrap_or(Value::Null);
        if let Some(message) = error_body["error"]["message"]
            .as_str()
            .filter(|m| !m.is_empty())
        {
            return Err(ChatError::Api(message.to_string()));
        }
        return Err(match status.canonical_reason() {
            Some(reason) => ChatError::Status(reason.to_string()),
            None => ChatError::Unknown,
        });
    }

    let json: Value =
        serde_json::from_str(body).map_err(|e| ChatError::Malformed(e.to_string()))?;

    Ok(json["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_first_choice() {
        let body = r#"{"choices":[{"message":{"content":"Hi there"}},{"message":{"content":"second"}}]}"#;
        assert_eq!(interpret_response(StatusCode::OK, body).unwrap(), "Hi there");
    }

    #[test]
    fn test_empty_choices_is_empty_reply() {
        let body = r#"{"choices":[]}"#;
        assert_eq!(interpret_response(StatusCode::OK, body).unwrap(), "");
    }

    #[test]
    fn test_missing_or_null_content_is_empty_reply() {
        assert_eq!(interpret_response(StatusCode::OK, "{}").unwrap(), "");
        let body = r#"{"choices":[{"message":{"content":null}}]}"#;
        assert_eq!(interpret_response(StatusCode::OK, body).unwrap(), "");
    }

    #[test]
    fn test_non_json_success_body_is_malformed() {
        let err = interpret_response(StatusCode::OK, "<html>").unwrap_err();
        assert!(matches!(err, ChatError::Malformed(_)));
    }

    #[test]
    fn test_error_prefers_service_message() {
        let body = r#"{"error":{"message":"rate limited","code":429}}"#;
        let err = interpret_response(StatusCode::TOO_MANY_REQUESTS, body).unwrap_err();
        assert_eq!(err.to_string(), "rate limited");
    }

    #[test]
    fn test_unparseable_error_body_uses_status_text() {
        let err = interpret_response(StatusCode::BAD_GATEWAY, "upstream exploded").unwrap_err();
        assert_eq!(err, ChatError::Status("Bad Gateway".into()));
        assert_eq!(err.to_string(), "Bad Gateway");
    }

    #[test]
    fn test_error_without_message_uses_status_text() {
        let err = interpret_response(StatusCode::UNAUTHORIZED, r#"{"error":{}}"#).unwrap_err();
        assert_eq!(err.to_string(), "Unauthorized");
    }

    #[test]
    fn test_unknown_status_without_reason_is_generic() {
        let status = StatusCode::from_u16(599).unwrap();
        let err = interpret_response(status, "").unwrap_err();
        assert_eq!(err, ChatError::Unknown);
    }

    #[test]
    fn test_request_body_shape() {
        let body = CompletionRequest {
            model: "openai/gpt-4o-mini".into(),
            messages: vec![ChatMessage::user("hello"), ChatMessage::assistant("hi")],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "openai/gpt-4o-mini",
                "messages": [
                    {"role": "user", "content": "hello"},
                    {"role": "assistant", "content": "hi"},
                ]
            })
        );
    }

    #[test]
    fn test_build_request_contract() {
        let client = OpenRouterClient::new(crate::config::DEFAULT_ENDPOINT);
        let pending = PendingRequest {
            api_key: "sk-test".into(),
            body: CompletionRequest {
                model: "openai/gpt-4o-mini".into(),
                messages: vec![
                    ChatMessage::user("hello"),
                    ChatMessage::assistant("hi"),
                    ChatMessage::user("again"),
                ],
            },
        };

        let request = client.build_request(&pending).unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(
            request.url().as_str(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
        assert_eq!(
            request.headers().get(reqwest::header::AUTHORIZATION).unwrap(),
            "Bearer sk-test"
        );
        let content_types: Vec<_> = request
            .headers()
            .get_all(reqwest::header::CONTENT_TYPE)
            .iter()
            .collect();
        assert_eq!(content_types, vec!["application/json"]);

        let bytes = request.body().and_then(|b| b.as_bytes()).unwrap();
        let sent: Value = serde_json::from_slice(bytes).unwrap();
        assert_eq!(sent, serde_json::to_value(&pending.body).unwrap());
    }

    #[test]
    fn test_build_request_uses_configured_endpoint() {
        let client = OpenRouterClient::new("http://localhost:8080/v1/chat/completions");
        let pending = PendingRequest {
            api_key: "k".into(),
            body: CompletionRequest { model: "m".into(), messages: vec![] },
        };
        let request = client.build_request(&pending).unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_pending_request_debug_redacts_key() {
        let request = PendingRequest {
            api_key: "sk-secret".into(),
            body: CompletionRequest { model: "m".into(), messages: vec![] },
        };
        assert!(!format!("{:?}", request).contains("sk-secret"));
    }
}
