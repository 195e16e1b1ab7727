use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Domain used whenever a caller does not name one.
pub const DEFAULT_DOMAIN: &str = "messages";

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(TransUnitId);

/// Review status of a translation unit.
///
/// Any status may be overwritten by any other; the integer codes are the
/// persisted representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransUnitStatus {
    Invalid,
    Waiting,
    Validated,
}

impl TransUnitStatus {
    pub const ALL: [TransUnitStatus; 3] = [
        TransUnitStatus::Invalid,
        TransUnitStatus::Waiting,
        TransUnitStatus::Validated,
    ];

    pub fn code(self) -> i64 {
        match self {
            TransUnitStatus::Invalid => 1,
            TransUnitStatus::Waiting => 2,
            TransUnitStatus::Validated => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(TransUnitStatus::Invalid),
            2 => Some(TransUnitStatus::Waiting),
            3 => Some(TransUnitStatus::Validated),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransUnitStatus::Invalid => "invalid",
            TransUnitStatus::Waiting => "waiting",
            TransUnitStatus::Validated => "validated",
        }
    }

    /// Maps the verb used in admin routes (`validate`, `waiting`,
    /// `invalidate`) to the status it sets.
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "validate" => Some(TransUnitStatus::Validated),
            "waiting" => Some(TransUnitStatus::Waiting),
            "invalidate" => Some(TransUnitStatus::Invalid),
            _ => None,
        }
    }
}

impl fmt::Display for TransUnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransUnitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code).ok_or_else(|| format!("unknown status code {code}"));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "invalid" => Ok(TransUnitStatus::Invalid),
            "waiting" => Ok(TransUnitStatus::Waiting),
            "validated" => Ok(TransUnitStatus::Validated),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// Widget the grid uses to edit translation contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridInputType {
    #[default]
    Text,
    Textarea,
}

impl FromStr for GridInputType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(GridInputType::Text),
            "textarea" => Ok(GridInputType::Textarea),
            other => Err(format!("unknown grid input type '{other}'")),
        }
    }
}

/// Resolves an optional domain to the one actually addressed. A supplied
/// domain is returned untouched, even when blank.
pub fn domain_or_default(domain: Option<&str>) -> &str {
    domain.unwrap_or(DEFAULT_DOMAIN)
}
