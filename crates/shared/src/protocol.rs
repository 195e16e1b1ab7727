use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{GridInputType, TransUnitId, TransUnitStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationPayload {
    pub locale: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransUnitSummary {
    pub id: TransUnitId,
    pub key: String,
    pub domain: String,
    pub status: TransUnitStatus,
    pub created_at: DateTime<Utc>,
    pub translations: Vec<TranslationPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransUnitPage {
    pub total: u64,
    pub page: u32,
    pub rows: u32,
    pub units: Vec<TransUnitSummary>,
}

/// Which submit control of the new-translation form was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitAction {
    #[default]
    Save,
    SaveAdd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransUnitRequest {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Contents keyed by locale.
    #[serde(default)]
    pub translations: BTreeMap<String, String>,
    #[serde(default)]
    pub submit: SubmitAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainStatusChange {
    pub domain: String,
    pub status: TransUnitStatus,
    pub updated: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Success,
    Warning,
    Error,
}

impl FlashLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Warning => "warning",
            FlashLevel::Error => "error",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "success" => Some(FlashLevel::Success),
            "warning" => Some(FlashLevel::Warning),
            "error" => Some(FlashLevel::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub message: String,
}

/// Acknowledgment returned to AJAX callers instead of a redirect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridView {
    pub layout: String,
    pub input_type: GridInputType,
    pub toggle_similar: bool,
    pub locales: Vec<String>,
    #[serde(default)]
    pub flashes: Vec<FlashMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainsView {
    pub layout: String,
    pub domains: Vec<String>,
    #[serde(default)]
    pub flashes: Vec<FlashMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransUnitView {
    pub layout: String,
    pub locales: Vec<String>,
    pub domains: Vec<String>,
    #[serde(default)]
    pub flashes: Vec<FlashMessage>,
}
