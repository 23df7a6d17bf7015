//! Remote chat services a [`Conversation`](super::Conversation) can talk to.

use async_trait::async_trait;

use crate::client::SessionClient;
use crate::request::{RequestOptions, RequestOutcome};
use crate::types::{AdvisorRequest, AssistantRequest, ChatAnalytics, ChatPayload};

use super::message::AssistantReply;

pub const ASSISTANT_ENDPOINT: &str = "/api/chatbot/message";
pub const ADVISOR_ENDPOINT: &str = "/api/chat";
pub const ANALYTICS_ENDPOINT: &str = "/api/ai/analytics";

/// A chat service that turns one user message into one assistant reply.
#[async_trait]
pub trait ChatEndpoint: Send + Sync {
    /// Short name for logs and `/stats`.
    fn name(&self) -> &'static str;

    /// Sends `message` and waits for the reply.
    async fn reply(&self, message: &str) -> RequestOutcome<AssistantReply>;

    /// Usage figures for the service, when it publishes any.  Failures are
    /// logged and reported as `None`.
    async fn analytics(&self) -> Option<ChatAnalytics> {
        None
    }
}

/// The general assistant at `POST /api/chatbot/message`.  Replies carry text
/// only.
#[derive(Debug, Clone)]
pub struct AssistantEndpoint {
    client: SessionClient,
    context: serde_json::Map<String, serde_json::Value>,
}

impl AssistantEndpoint {
    pub fn new(client: SessionClient) -> Self {
        Self {
            client,
            context: serde_json::Map::new(),
        }
    }

    /// Adds a key to the context object sent with every message.
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

#[async_trait]
impl ChatEndpoint for AssistantEndpoint {
    fn name(&self) -> &'static str {
        "assistant"
    }

    async fn reply(&self, message: &str) -> RequestOutcome<AssistantReply> {
        let request = AssistantRequest {
            message: message.to_string(),
            context: self.context.clone(),
        };
        send(&self.client, ASSISTANT_ENDPOINT, &request).await
    }
}

/// The classifying advisor at `POST /api/chat`.  Replies may carry a
/// category, confidence, severity, actions, suggestions and emergency
/// contacts.
#[derive(Debug, Clone)]
pub struct AdvisorEndpoint {
    client: SessionClient,
    location: Option<String>,
}

impl AdvisorEndpoint {
    pub fn new(client: SessionClient) -> Self {
        Self {
            client,
            location: None,
        }
    }

    /// City used to localise blood bank and emergency answers.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

#[async_trait]
impl ChatEndpoint for AdvisorEndpoint {
    fn name(&self) -> &'static str {
        "advisor"
    }

    async fn reply(&self, message: &str) -> RequestOutcome<AssistantReply> {
        let request = AdvisorRequest {
            message: message.to_string(),
            user_id: self.client.user().await.map(|user| user.id.to_string()),
            location: self.location.clone(),
        };
        send(&self.client, ADVISOR_ENDPOINT, &request).await
    }

    async fn analytics(&self) -> Option<ChatAnalytics> {
        match self.client.get_json(ANALYTICS_ENDPOINT).await {
            Ok(analytics) => Some(analytics),
            Err(err) => {
                tracing::warn!(error = %err, "could not load chat analytics");
                None
            }
        }
    }
}

async fn send<B: serde::Serialize>(
    client: &SessionClient,
    endpoint: &str,
    body: &B,
) -> RequestOutcome<AssistantReply> {
    let options = match RequestOptions::post_json(body) {
        Ok(options) => options,
        Err(err) => return RequestOutcome::Failed(err),
    };
    match client.authenticated_request(endpoint, options).await {
        RequestOutcome::Success(body) => body
            .into_json::<ChatPayload>()
            .map(AssistantReply::from)
            .into(),
        RequestOutcome::Unauthenticated => RequestOutcome::Unauthenticated,
        RequestOutcome::Failed(err) => RequestOutcome::Failed(err),
    }
}
