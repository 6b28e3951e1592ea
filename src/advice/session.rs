//! Advice service and per-prediction conversation

use std::sync::Arc;

use tracing::{info, warn};

use super::client::{AdviceError, ChatClient, ChatMessage};
use super::prompt::{follow_up_prompt, initial_prompt};
use super::{AdviceConfig, AdviceOutcome};

/// The advice collaborator, decided once from configuration
#[derive(Debug, Clone)]
pub enum AdviceService {
    /// No API key configured; never performs I/O
    Disabled,
    Remote(Arc<ChatClient>),
}

impl AdviceService {
    pub fn from_config(config: &AdviceConfig) -> Self {
        let Some(api_key) = config.api_key() else {
            info!("No advice API key configured, AI advice disabled");
            return AdviceService::Disabled;
        };

        match ChatClient::new(config, api_key) {
            Ok(client) => {
                info!("AI advice enabled via {}", client.endpoint());
                AdviceService::Remote(Arc::new(client))
            }
            Err(e) => {
                warn!("AI advice disabled: {}", e);
                AdviceService::Disabled
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, AdviceService::Remote(_))
    }

    /// Start a conversation about one prediction
    pub fn session(&self, crop: &str, label: &str) -> AdviceSession {
        AdviceSession {
            service: self.clone(),
            crop: crop.to_string(),
            label: label.to_string(),
            history: Vec::new(),
        }
    }
}

/// Conversation about one crop + label
///
/// Successful turns are appended to the history and replayed with every
/// follow-up. Failed turns leave the history untouched.
#[derive(Debug, Clone)]
pub struct AdviceSession {
    service: AdviceService,
    crop: String,
    label: String,
    history: Vec<ChatMessage>,
}

impl AdviceSession {
    pub fn crop(&self) -> &str {
        &self.crop
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Concise cause / treatment / prevention advice for the prediction
    pub async fn initial(&mut self) -> AdviceOutcome {
        let prompt = initial_prompt(&self.crop, &self.label);
        self.send(prompt).await
    }

    /// Ask a follow-up question in the context of the conversation so far
    pub async fn follow_up(&mut self, question: &str) -> AdviceOutcome {
        if question.trim().is_empty() {
            return AdviceOutcome::Unavailable("empty question".to_string());
        }
        let prompt = follow_up_prompt(&self.crop, question);
        self.send(prompt).await
    }

    async fn send(&mut self, prompt: String) -> AdviceOutcome {
        let client = match &self.service {
            AdviceService::Disabled => return AdviceOutcome::Disabled,
            AdviceService::Remote(client) => Arc::clone(client),
        };

        let mut messages = self.history.clone();
        messages.push(ChatMessage::user(prompt));

        match client.complete(&messages).await {
            Ok(reply) => {
                messages.push(ChatMessage::assistant(reply.clone()));
                self.history = messages;
                AdviceOutcome::Advice(reply)
            }
            Err(e) => {
                warn!(
                    "Advice request for {} / {} failed ({:?}): {}",
                    self.crop,
                    self.label,
                    e.category(),
                    e
                );
                AdviceOutcome::Unavailable(describe(&e))
            }
        }
    }
}

fn describe(err: &AdviceError) -> String {
    match err {
        AdviceError::Timeout => "the advice service did not respond in time".to_string(),
        AdviceError::Status { status, .. } => format!("the advice service returned HTTP {status}"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ErrorCategory;
    use axum::{
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::time::Duration;

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v1", addr)
    }

    fn config(base_url: String) -> AdviceConfig {
        AdviceConfig {
            api_key: Some("test-key".to_string()),
            base_url,
            timeout_secs: 1,
            ..AdviceConfig::default()
        }
    }

    /// Replies with the number of messages it received and the bearer token
    async fn echo(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
        let count = body["messages"].as_array().map(|m| m.len()).unwrap_or(0);
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        Json(json!({
            "choices": [{"message": {"role": "assistant", "content": format!("{count} messages, {auth}")}}]
        }))
    }

    #[test]
    fn test_advice_errors_are_external_service_failures() {
        let errors = [
            AdviceError::Timeout,
            AdviceError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            },
            AdviceError::InvalidResponse("no choices".to_string()),
        ];
        for err in &errors {
            assert_eq!(err.category(), ErrorCategory::ExternalService);
        }
        assert_eq!(describe(&errors[1]), "the advice service returned HTTP 502");
    }

    #[tokio::test]
    async fn test_disabled_service_does_nothing() {
        let service = AdviceService::from_config(&AdviceConfig::default());
        assert!(!service.is_enabled());

        let mut session = service.session("Potato", "Potato___healthy");
        assert_eq!(session.initial().await, AdviceOutcome::Disabled);
        assert_eq!(session.follow_up("When to water?").await, AdviceOutcome::Disabled);
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_initial_and_follow_up_replay_history() {
        let base = spawn_server(Router::new().route("/v1/chat/completions", post(echo))).await;
        let service = AdviceService::from_config(&config(base));
        assert!(service.is_enabled());

        let mut session = service.session("Potato", "Potato___Late_blight");
        assert_eq!(
            session.initial().await,
            AdviceOutcome::Advice("1 messages, Bearer test-key".to_string())
        );
        assert_eq!(session.history().len(), 2);

        assert_eq!(
            session.follow_up("Is it safe to eat the tubers?").await,
            AdviceOutcome::Advice("3 messages, Bearer test-key".to_string())
        );
        assert_eq!(session.history().len(), 4);
        assert!(session.history()[2].content.contains("Is it safe to eat the tubers?"));
    }

    #[tokio::test]
    async fn test_error_status_is_unavailable_and_not_recorded() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let base = spawn_server(router).await;
        let mut session = AdviceService::from_config(&config(base)).session("Rice", "Brownspot");

        match session.initial().await {
            AdviceOutcome::Unavailable(reason) => assert!(reason.contains("429")),
            other => panic!("expected unavailable, got {:?}", other),
        }
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_is_unavailable() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({"choices": []})) }),
        );
        let base = spawn_server(router).await;
        let mut session = AdviceService::from_config(&config(base)).session("Rice", "Leafsmut");

        assert!(matches!(session.initial().await, AdviceOutcome::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"choices": [{"message": {"content": "late"}}]}))
            }),
        );
        let base = spawn_server(router).await;
        let mut session = AdviceService::from_config(&config(base)).session("Peanut", "Peanut_rust");

        assert!(matches!(session.initial().await, AdviceOutcome::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut session = AdviceService::from_config(&config(format!("http://{}", addr)))
            .session("Tomato", "Tomato__blight");
        assert!(matches!(session.initial().await, AdviceOutcome::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_empty_follow_up_is_rejected_locally() {
        let service = AdviceService::from_config(&config("http://127.0.0.1:9".to_string()));
        let mut session = service.session("Grapes", "ESCA");
        assert!(matches!(
            session.follow_up("   ").await,
            AdviceOutcome::Unavailable(_)
        ));
    }
}
