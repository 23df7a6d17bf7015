use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use BloodGroup::*;

/// The eight ABO/Rh blood groups.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodGroup {
    /// A positive.
    #[serde(rename = "A+")]
    APositive,
    /// A negative.
    #[serde(rename = "A-")]
    ANegative,
    /// B positive.
    #[serde(rename = "B+")]
    BPositive,
    /// B negative.
    #[serde(rename = "B-")]
    BNegative,
    /// AB positive.
    #[serde(rename = "AB+")]
    AbPositive,
    /// AB negative.
    #[serde(rename = "AB-")]
    AbNegative,
    /// O positive.
    #[serde(rename = "O+")]
    OPositive,
    /// O negative.
    #[serde(rename = "O-")]
    ONegative,
}

impl BloodGroup {
    /// Every group, in the order registration forms list them.
    pub const ALL: [BloodGroup; 8] = [
        APositive, ANegative, BPositive, BNegative, AbPositive, AbNegative, OPositive, ONegative,
    ];

    /// The canonical label, e.g. `"AB-"`.
    pub fn label(self) -> &'static str {
        match self {
            APositive => "A+",
            ANegative => "A-",
            BPositive => "B+",
            BNegative => "B-",
            AbPositive => "AB+",
            AbNegative => "AB-",
            OPositive => "O+",
            ONegative => "O-",
        }
    }

    /// Groups that can receive red cells from this group.
    pub fn can_donate_to(self) -> &'static [BloodGroup] {
        match self {
            ONegative => &[
                ONegative, OPositive, ANegative, APositive, BNegative, BPositive, AbNegative,
                AbPositive,
            ],
            OPositive => &[OPositive, APositive, BPositive, AbPositive],
            ANegative => &[ANegative, APositive, AbNegative, AbPositive],
            APositive => &[APositive, AbPositive],
            BNegative => &[BNegative, BPositive, AbNegative, AbPositive],
            BPositive => &[BPositive, AbPositive],
            AbNegative => &[AbNegative, AbPositive],
            AbPositive => &[AbPositive],
        }
    }

    /// Groups whose red cells this group can receive.
    pub fn can_receive_from(self) -> &'static [BloodGroup] {
        match self {
            ONegative => &[ONegative],
            OPositive => &[ONegative, OPositive],
            ANegative => &[ONegative, ANegative],
            APositive => &[ONegative, OPositive, ANegative, APositive],
            BNegative => &[ONegative, BNegative],
            BPositive => &[ONegative, OPositive, BNegative, BPositive],
            AbNegative => &[ONegative, ANegative, BNegative, AbNegative],
            AbPositive => &[
                ONegative, OPositive, ANegative, APositive, BNegative, BPositive, AbNegative,
                AbPositive,
            ],
        }
    }

    /// True when `recipient` can safely receive blood from this group.
    pub fn is_compatible_with(self, recipient: BloodGroup) -> bool {
        self.can_donate_to().contains(&recipient)
    }

    /// O- donates to every group.
    pub fn is_universal_donor(self) -> bool {
        self == ONegative
    }

    /// AB+ receives from every group.
    pub fn is_universal_recipient(self) -> bool {
        self == AbPositive
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Error returned when parsing an unrecognized blood group label.
#[derive(Debug)]
pub struct BloodGroupParseError {
    /// The invalid string value that could not be parsed.
    pub invalid_value: String,
}

impl fmt::Display for BloodGroupParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown blood group: {}", self.invalid_value)
    }
}

impl std::error::Error for BloodGroupParseError {}

impl FromStr for BloodGroup {
    type Err = BloodGroupParseError;

    /// Accepts the canonical labels and the spellings blood banks use:
    /// `A+Ve`, `A POSITIVE`, `A POS`, `APOSITIVE`, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();
        let compact = compact
            .strip_suffix("VE")
            .filter(|rest| rest.ends_with('+') || rest.ends_with('-'))
            .unwrap_or(&compact);

        let (abo, rh) = if let Some(abo) = compact.strip_suffix("POSITIVE") {
            (abo, '+')
        } else if let Some(abo) = compact.strip_suffix("NEGATIVE") {
            (abo, '-')
        } else if let Some(abo) = compact.strip_suffix("POS") {
            (abo, '+')
        } else if let Some(abo) = compact.strip_suffix("NEG") {
            (abo, '-')
        } else if let Some(abo) = compact.strip_suffix('+') {
            (abo, '+')
        } else if let Some(abo) = compact.strip_suffix('-') {
            (abo, '-')
        } else {
            return Err(BloodGroupParseError {
                invalid_value: s.to_string(),
            });
        };

        match (abo, rh) {
            ("A", '+') => Ok(APositive),
            ("A", '-') => Ok(ANegative),
            ("B", '+') => Ok(BPositive),
            ("B", '-') => Ok(BNegative),
            ("AB", '+') => Ok(AbPositive),
            ("AB", '-') => Ok(AbNegative),
            ("O", '+') => Ok(OPositive),
            ("O", '-') => Ok(ONegative),
            _ => Err(BloodGroupParseError {
                invalid_value: s.to_string(),
            }),
        }
    }
}
