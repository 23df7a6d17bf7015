// Public modules
pub mod analytics;
pub mod auth;
pub mod blood_group;
pub mod chat_payload;
pub mod profile_update;
pub mod registration;
pub mod user;
pub mod user_role;

// Re-exports
pub use analytics::ChatAnalytics;
pub use auth::{AuthResponse, LoginRequest, RefreshRequest, RefreshResponse};
pub use blood_group::{BloodGroup, BloodGroupParseError};
pub use chat_payload::{
    AdvisorRequest, AssistantRequest, ChatPayload, EmergencyContact, SuggestedAction,
};
pub use profile_update::ProfileUpdate;
pub use registration::RegistrationForm;
pub use user::{BloodCompatibility, DONATION_INTERVAL_DAYS, TransfusionUrgency, User};
pub use user_role::{UserRole, UserRoleParseError};
