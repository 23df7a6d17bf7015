//! The chat transcript and the send/reply cycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::observability::{CHAT_MESSAGES_SENT, CHAT_REPLY_DURATION, CHAT_REPLY_ERRORS};
use crate::request::RequestOutcome;
use crate::types::ChatAnalytics;

use super::endpoint::ChatEndpoint;
use super::message::{AssistantReply, ChatEntry, greeting};

/// How a call to [`Conversation::send_and_await_reply`] ended.
///
/// Every variant but `Empty` has already been recorded in the transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum SendStatus {
    /// The message was blank and nothing was sent.
    Empty,
    /// The endpoint answered.
    Delivered(AssistantReply),
    /// The endpoint could not be reached or rejected the message; an error
    /// reply stands in for the answer.
    Failed(AssistantReply),
    /// The session expired while sending; an error reply stands in for the
    /// answer and the member must sign in again.
    SessionExpired(AssistantReply),
}

impl SendStatus {
    /// The reply appended to the transcript, if any.
    pub fn reply(&self) -> Option<&AssistantReply> {
        match self {
            SendStatus::Empty => None,
            SendStatus::Delivered(reply)
            | SendStatus::Failed(reply)
            | SendStatus::SessionExpired(reply) => Some(reply),
        }
    }
}

/// Counters describing a conversation so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationStats {
    pub endpoint: &'static str,
    pub entries: usize,
    pub user_messages: usize,
    pub replies: usize,
    pub failed_replies: usize,
    pub pending_replies: usize,
    /// The latest figures published by the endpoint, if any were loaded.
    pub analytics: Option<ChatAnalytics>,
}

/// An ordered, append-only chat transcript bound to one chat endpoint.
///
/// All methods take `&self`; several sends may be outstanding at once and the
/// composing indicator stays on until the last of them settles.
pub struct Conversation {
    endpoint: Arc<dyn ChatEndpoint>,
    greeting: String,
    entries: Mutex<Vec<ChatEntry>>,
    composing: AtomicUsize,
    analytics: Arc<Mutex<Option<ChatAnalytics>>>,
}

impl Conversation {
    /// Starts a conversation holding the generic greeting.
    pub fn new(endpoint: Arc<dyn ChatEndpoint>) -> Self {
        Self::with_greeting(endpoint, greeting(None))
    }

    /// Starts a conversation with a custom opening line.
    pub fn with_greeting(endpoint: Arc<dyn ChatEndpoint>, greeting: impl Into<String>) -> Self {
        let greeting = greeting.into();
        let entries = vec![ChatEntry::assistant(AssistantReply::plain(greeting.clone()))];
        Self {
            endpoint,
            greeting,
            entries: Mutex::new(entries),
            composing: AtomicUsize::new(0),
            analytics: Arc::new(Mutex::new(None)),
        }
    }

    /// Replaces the opening line used by the next [`clear`](Self::clear).
    pub fn set_greeting(&mut self, greeting: impl Into<String>) {
        self.greeting = greeting.into();
    }

    /// Appends a user message.  Blank text is refused and leaves the
    /// transcript unchanged.
    pub fn append_user_message(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        self.lock().push(ChatEntry::user(text));
        true
    }

    /// Appends `text`, asks the endpoint for a reply and appends that reply.
    ///
    /// Failures are recorded as an error reply rather than returned.
    pub async fn send_and_await_reply(&self, text: &str) -> SendStatus {
        if !self.append_user_message(text) {
            return SendStatus::Empty;
        }
        CHAT_MESSAGES_SENT.click();
        let _composing = Composing::start(&self.composing);

        let start = Instant::now();
        let outcome = self.endpoint.reply(text).await;
        CHAT_REPLY_DURATION.add(start.elapsed().as_secs_f64());

        let status = match outcome {
            RequestOutcome::Success(reply) => SendStatus::Delivered(reply),
            RequestOutcome::Unauthenticated => {
                CHAT_REPLY_ERRORS.click();
                tracing::info!(endpoint = self.endpoint.name(), "chat session expired");
                SendStatus::SessionExpired(AssistantReply::error())
            }
            RequestOutcome::Failed(err) => {
                CHAT_REPLY_ERRORS.click();
                tracing::warn!(endpoint = self.endpoint.name(), error = %err, "chat reply failed");
                SendStatus::Failed(AssistantReply::error())
            }
        };
        if let Some(reply) = status.reply() {
            self.lock().push(ChatEntry::assistant(reply.clone()));
        }
        if matches!(status, SendStatus::Delivered(_)) {
            self.refresh_analytics_in_background();
        }
        status
    }

    /// Reloads the endpoint's analytics.  Failures keep the previous figures.
    pub async fn refresh_analytics(&self) -> Option<ChatAnalytics> {
        let analytics = self.endpoint.analytics().await;
        store_analytics(&self.analytics, analytics)
    }

    /// Reloads the analytics on a separate task so the caller never waits
    /// for them.  Outside a tokio runtime nothing is reloaded.
    fn refresh_analytics_in_background(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let endpoint = Arc::clone(&self.endpoint);
        let slot = Arc::clone(&self.analytics);
        runtime.spawn(async move {
            let analytics = endpoint.analytics().await;
            store_analytics(&slot, analytics);
        });
    }

    /// The latest analytics loaded for this conversation.
    pub fn analytics(&self) -> Option<ChatAnalytics> {
        self.analytics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drops the transcript and starts over with the greeting.
    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.clear();
        entries.push(ChatEntry::assistant(AssistantReply::plain(
            self.greeting.clone(),
        )));
    }

    /// A snapshot of the transcript.
    pub fn entries(&self) -> Vec<ChatEntry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// True while any reply is outstanding.
    pub fn is_composing(&self) -> bool {
        self.composing.load(Ordering::Acquire) > 0
    }

    /// Follow-up prompts offered by the latest assistant reply that has any.
    pub fn last_suggestions(&self) -> Vec<String> {
        self.lock()
            .iter()
            .rev()
            .filter_map(ChatEntry::reply)
            .find(|reply| !reply.suggestions.is_empty())
            .map(|reply| reply.suggestions.clone())
            .unwrap_or_default()
    }

    pub fn endpoint_name(&self) -> &'static str {
        self.endpoint.name()
    }

    pub fn stats(&self) -> ConversationStats {
        let entries = self.lock();
        let user_messages = entries.iter().filter(|e| e.is_user()).count();
        let failed_replies = entries
            .iter()
            .filter_map(ChatEntry::reply)
            .filter(|reply| reply.is_error())
            .count();
        ConversationStats {
            endpoint: self.endpoint.name(),
            entries: entries.len(),
            user_messages,
            replies: entries.len() - user_messages,
            failed_replies,
            pending_replies: self.composing.load(Ordering::Acquire),
            analytics: self.analytics(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ChatEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn store_analytics(
    slot: &Mutex<Option<ChatAnalytics>>,
    analytics: Option<ChatAnalytics>,
) -> Option<ChatAnalytics> {
    let mut current = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if analytics.is_some() {
        *current = analytics;
    }
    current.clone()
}

/// Holds the composing indicator on for as long as it lives, so a dropped
/// send still clears it.
struct Composing<'a>(&'a AtomicUsize);

impl<'a> Composing<'a> {
    fn start(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for Composing<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
