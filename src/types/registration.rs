use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::Result;
use crate::types::{BloodGroup, UserRole};
use crate::validation::{MIN_DONOR_WEIGHT_KG, check, rejection};

/// Fields in the order the form shows them.
const FORM_ORDER: [&str; 8] = [
    "name",
    "email",
    "password",
    "confirm_password",
    "phone",
    "date_of_birth",
    "blood_group",
    "city",
];

/// Everything the registration form collects.
///
/// Serializes to the body of `POST /api/auth/register`; the confirmation
/// password never leaves the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "check_registration"))]
pub struct RegistrationForm {
    #[validate(
        custom(function = "crate::validation::not_blank", message = "Email is required"),
        email(message = "Email is invalid")
    )]
    pub email: String,
    #[validate(
        custom(function = "crate::validation::present", message = "Password is required"),
        length(min = 6, message = "Password must be at least 6 characters")
    )]
    pub password: String,
    #[serde(skip)]
    #[validate(custom(
        function = "crate::validation::present",
        message = "Please confirm password"
    ))]
    pub confirm_password: String,
    #[validate(custom(function = "crate::validation::not_blank", message = "Name is required"))]
    pub name: String,
    #[validate(custom(
        function = "crate::validation::not_blank",
        message = "Phone number is required"
    ))]
    pub phone: String,
    pub user_type: UserRole,
    #[validate(required(message = "Blood group is required"))]
    pub blood_group: Option<BloodGroup>,
    #[validate(custom(function = "crate::validation::not_blank", message = "City is required"))]
    pub city: String,
    #[validate(required(message = "Date of birth is required"))]
    pub date_of_birth: Option<String>,

    // Patient
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_history: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<String>,

    // Donor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_donation: Option<String>,
}

impl RegistrationForm {
    /// Creates an empty form for the given role.
    pub fn new(user_type: UserRole) -> Self {
        Self {
            email: String::new(),
            password: String::new(),
            confirm_password: String::new(),
            name: String::new(),
            phone: String::new(),
            user_type,
            blood_group: None,
            city: String::new(),
            date_of_birth: None,
            medical_history: None,
            emergency_contact: None,
            weight: None,
            last_donation: None,
        }
    }

    /// Checks the form field by field, reporting the first problem found.
    pub fn validate_fields(&self) -> Result<()> {
        check(self, &FORM_ORDER)
    }
}

fn check_registration(form: &RegistrationForm) -> std::result::Result<(), ValidationError> {
    if form.confirm_password != form.password {
        return Err(rejection("confirm_password", "Passwords do not match"));
    }
    if form
        .date_of_birth
        .as_deref()
        .is_some_and(|dob| dob.trim().is_empty())
    {
        return Err(rejection("date_of_birth", "Date of birth is required"));
    }
    match form.user_type {
        UserRole::Donor => {
            if form.weight.is_none_or(|w| w < MIN_DONOR_WEIGHT_KG) {
                return Err(rejection(
                    "weight",
                    "Weight must be at least 45 kg for donation",
                ));
            }
        }
        UserRole::Patient => {
            if form
                .emergency_contact
                .as_deref()
                .is_none_or(|c| c.trim().is_empty())
            {
                return Err(rejection(
                    "emergency_contact",
                    "Emergency contact is required",
                ));
            }
        }
    }
    Ok(())
}
