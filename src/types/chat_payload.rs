//! Wire shapes for the two chat endpoints.

use serde::{Deserialize, Deserializer, Serialize};

/// Body of `POST /api/chatbot/message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantRequest {
    pub message: String,
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// A button the assistant offers alongside its answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedAction {
    /// Label of the main call to action, e.g. `"Start Blood Bridge"`.
    pub primary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
}

/// A phone line surfaced for urgent situations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub service: String,
    pub number: String,
}

/// Everything either chat endpoint may send back.
///
/// `/api/chatbot/message` only fills `response`; `/api/chat` may fill any of
/// the optional fields depending on how the question was classified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatPayload {
    pub response: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_action",
        skip_serializing_if = "Option::is_none"
    )]
    pub ai_actions: Option<SuggestedAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_topics: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_queries: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_contacts",
        skip_serializing_if = "Option::is_none"
    )]
    pub emergency_contacts: Option<Vec<EmergencyContact>>,
}

/// Any object is accepted for `ai_actions`; one without a usable `primary`
/// label is dropped instead of failing the whole reply.
fn deserialize_action<'de, D>(deserializer: D) -> Result<Option<SuggestedAction>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|value| serde_json::from_value::<SuggestedAction>(value).ok())
        .filter(|action| !action.primary.trim().is_empty()))
}

/// Contacts arrive either as a list of `{service, number}` objects or as a
/// `{service: number}` map; both become a list.
fn deserialize_contacts<'de, D>(
    deserializer: D,
) -> Result<Option<Vec<EmergencyContact>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Contacts {
        List(Vec<EmergencyContact>),
        Map(serde_json::Map<String, serde_json::Value>),
    }

    let contacts = Option::<Contacts>::deserialize(deserializer)?;
    Ok(contacts.map(|contacts| match contacts {
        Contacts::List(list) => list,
        Contacts::Map(map) => map
            .into_iter()
            .map(|(service, number)| EmergencyContact {
                service,
                number: match number {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                },
            })
            .collect(),
    }))
}
