use serde::{Deserialize, Serialize};
use time::Date;
use time::macros::format_description;

use crate::types::{BloodGroup, UserRole};

/// Days a donor must wait between whole-blood donations.
pub const DONATION_INTERVAL_DAYS: i64 = 90;

/// The profile of the signed-in platform member.
///
/// The server sends one flat object for both roles; patient-only and
/// donor-only fields are absent (or `null`) for the other role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Server-assigned identifier.
    pub id: i64,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub user_type: UserRole,
    pub blood_group: BloodGroup,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub join_date: Option<String>,

    // Patient fields
    #[serde(default)]
    pub medical_history: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<String>,
    #[serde(default)]
    pub last_transfusion: Option<String>,
    #[serde(default)]
    pub urgency_level: Option<String>,

    // Donor fields
    #[serde(default)]
    pub weight: Option<u32>,
    #[serde(default)]
    pub last_donation: Option<String>,
    #[serde(default)]
    pub total_donations: Option<u32>,
    #[serde(default)]
    pub next_eligible: Option<String>,
}

fn default_true() -> bool {
    true
}

/// How soon a patient is likely to need the next transfusion.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TransfusionUrgency {
    Low,
    Medium,
    High,
    /// Not a patient, or no transfusion on record.
    Unknown,
}

impl std::fmt::Display for TransfusionUrgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransfusionUrgency::Low => write!(f, "Low"),
            TransfusionUrgency::Medium => write!(f, "Medium"),
            TransfusionUrgency::High => write!(f, "High"),
            TransfusionUrgency::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Who a member can give blood to and take blood from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloodCompatibility {
    pub can_donate_to: &'static [BloodGroup],
    pub can_receive_from: &'static [BloodGroup],
}

impl User {
    pub fn is_donor(&self) -> bool {
        self.user_type == UserRole::Donor
    }

    pub fn is_patient(&self) -> bool {
        self.user_type == UserRole::Patient
    }

    /// The compatibility lists for this member's blood group.
    pub fn blood_compatibility(&self) -> BloodCompatibility {
        BloodCompatibility {
            can_donate_to: self.blood_group.can_donate_to(),
            can_receive_from: self.blood_group.can_receive_from(),
        }
    }

    /// Days until a donor may donate again, counted from `today`.
    ///
    /// Returns `None` for patients and for donors without a parseable last
    /// donation date.  Never negative.
    pub fn days_until_eligible(&self, today: Date) -> Option<i64> {
        if !self.is_donor() {
            return None;
        }
        let last = parse_date(self.last_donation.as_deref()?)?;
        let elapsed = (today - last).whole_days();
        Some((DONATION_INTERVAL_DAYS - elapsed).max(0))
    }

    /// Urgency of a patient's next transfusion, judged from the last one.
    pub fn transfusion_urgency(&self, today: Date) -> TransfusionUrgency {
        if !self.is_patient() {
            return TransfusionUrgency::Unknown;
        }
        let Some(last) = self.last_transfusion.as_deref().and_then(parse_date) else {
            return TransfusionUrgency::Unknown;
        };
        match (today - last).whole_days() {
            d if d > 28 => TransfusionUrgency::High,
            d if d > 21 => TransfusionUrgency::Medium,
            _ => TransfusionUrgency::Low,
        }
    }
}

/// Parses the date part of an ISO-8601 date or datetime such as
/// `2024-03-01T10:15:00`.
fn parse_date(value: &str) -> Option<Date> {
    let day = value.get(..10)?;
    Date::parse(day, format_description!("[year]-[month]-[day]")).ok()
}
