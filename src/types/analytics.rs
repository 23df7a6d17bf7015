//! Usage figures published by the chat service.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Body of `GET /api/ai/analytics`.  Every figure is optional; fields the
/// service adds later are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatAnalytics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_conversations: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_blood_requests: Option<u64>,
    /// Reported either as a number or as preformatted text such as `"94%"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_routing_accuracy: Option<serde_json::Value>,
}

impl fmt::Display for ChatAnalytics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = |n: Option<u64>| n.map_or_else(|| "-".to_string(), |n| n.to_string());
        let accuracy = match &self.ai_routing_accuracy {
            Some(serde_json::Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => "-".to_string(),
        };
        write!(
            f,
            "conversations {} | active requests {} | routing accuracy {}",
            count(self.total_conversations),
            count(self.active_blood_requests),
            accuracy
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_figures() {
        let analytics: ChatAnalytics = serde_json::from_str(
            r#"{"total_conversations": 42, "ai_routing_accuracy": "94%", "uptime": "3d"}"#,
        )
        .unwrap();
        assert_eq!(analytics.total_conversations, Some(42));
        assert_eq!(analytics.active_blood_requests, None);
        assert_eq!(
            analytics.to_string(),
            "conversations 42 | active requests - | routing accuracy 94%"
        );
    }

    #[test]
    fn numeric_accuracy() {
        let analytics: ChatAnalytics =
            serde_json::from_str(r#"{"active_blood_requests": 3, "ai_routing_accuracy": 0.9}"#)
                .unwrap();
        assert_eq!(
            analytics.to_string(),
            "conversations - | active requests 3 | routing accuracy 0.9"
        );
    }
}
