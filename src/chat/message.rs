//! Transcript entries and the assistant reply model.

use time::OffsetDateTime;

use crate::types::{ChatPayload, EmergencyContact, SuggestedAction, User, UserRole};

/// Text shown in place of a reply when the chat endpoint could not be reached.
pub const REPLY_ERROR_TEXT: &str = "Sorry, I encountered an error. Please try again.";

/// What an assistant reply asks the reader to look at besides its text.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyKind {
    /// An informational answer.
    PlainText,
    /// An answer with a call to action.
    ActionSuggestion(SuggestedAction),
    /// An urgent answer listing phone lines to call.
    EmergencyContacts(Vec<EmergencyContact>),
    /// Stand-in for a reply that never arrived.
    Error,
}

/// One assistant turn: text, kind-specific extras and shared metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub text: String,
    pub kind: ReplyKind,
    pub category: Option<String>,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: Option<f64>,
    pub severity: Option<String>,
    /// Follow-up prompts the reader can send next.
    pub suggestions: Vec<String>,
    pub related_topics: Vec<String>,
}

impl AssistantReply {
    /// A reply with no metadata.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: ReplyKind::PlainText,
            category: None,
            confidence: None,
            severity: None,
            suggestions: Vec::new(),
            related_topics: Vec::new(),
        }
    }

    /// The synthetic reply recorded when sending failed.
    pub fn error() -> Self {
        Self {
            kind: ReplyKind::Error,
            ..Self::plain(REPLY_ERROR_TEXT)
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, ReplyKind::Error)
    }

    pub fn action(&self) -> Option<&SuggestedAction> {
        match &self.kind {
            ReplyKind::ActionSuggestion(action) => Some(action),
            _ => None,
        }
    }

    pub fn emergency_contacts(&self) -> &[EmergencyContact] {
        match &self.kind {
            ReplyKind::EmergencyContacts(contacts) => contacts,
            _ => &[],
        }
    }
}

impl From<ChatPayload> for AssistantReply {
    fn from(payload: ChatPayload) -> Self {
        let contacts = payload.emergency_contacts.filter(|c| !c.is_empty());
        let kind = match (contacts, payload.ai_actions) {
            (Some(contacts), _) => ReplyKind::EmergencyContacts(contacts),
            (None, Some(action)) => ReplyKind::ActionSuggestion(action),
            (None, None) => ReplyKind::PlainText,
        };
        Self {
            text: payload.response,
            kind,
            category: payload.ai_category,
            confidence: payload.confidence,
            severity: payload.severity,
            suggestions: payload.suggested_queries.unwrap_or_default(),
            related_topics: payload.related_topics.unwrap_or_default(),
        }
    }
}

/// One entry in a conversation transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEntry {
    User {
        text: String,
        timestamp: OffsetDateTime,
    },
    Assistant {
        reply: AssistantReply,
        timestamp: OffsetDateTime,
    },
}

impl ChatEntry {
    pub fn user(text: impl Into<String>) -> Self {
        ChatEntry::User {
            text: text.into(),
            timestamp: now(),
        }
    }

    pub fn assistant(reply: AssistantReply) -> Self {
        ChatEntry::Assistant {
            reply,
            timestamp: now(),
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, ChatEntry::User { .. })
    }

    pub fn text(&self) -> &str {
        match self {
            ChatEntry::User { text, .. } => text,
            ChatEntry::Assistant { reply, .. } => &reply.text,
        }
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        match self {
            ChatEntry::User { timestamp, .. } | ChatEntry::Assistant { timestamp, .. } => {
                *timestamp
            }
        }
    }

    pub fn reply(&self) -> Option<&AssistantReply> {
        match self {
            ChatEntry::User { .. } => None,
            ChatEntry::Assistant { reply, .. } => Some(reply),
        }
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// The opening line of a fresh conversation, personalised when the member is
/// known.
pub fn greeting(user: Option<&User>) -> String {
    match user {
        Some(user) => {
            let topic = match user.user_type {
                UserRole::Donor => "donations",
                UserRole::Patient => "medical needs",
            };
            format!(
                "Hello {}! I'm your ThalAssist AI assistant. I can help you with information \
                 about your {topic}, blood availability, and answer any questions you have. \
                 How can I assist you today?",
                user.name
            )
        }
        None => "Hello! I'm your ThalAssist AI assistant. I can help with thalassemia care, \
                 blood donation and blood availability. How can I assist you today?"
            .to_string(),
    }
}
