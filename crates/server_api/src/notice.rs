use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shared::domain::TransUnitStatus;

/// Language the confirmation messages are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLocale {
    #[default]
    En,
    Fr,
}

impl FromStr for NoticeLocale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(NoticeLocale::En),
            "fr" => Ok(NoticeLocale::Fr),
            other => Err(format!("no confirmation messages for locale '{other}'")),
        }
    }
}

/// Confirmation shown to the admin after a successful action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    CacheRemoved,
    TranslationAdded,
    TranslationsRefreshed,
    UnitStatusChanged(TransUnitStatus),
    DomainStatusChanged(TransUnitStatus),
}

impl Notice {
    pub fn text(self, locale: NoticeLocale) -> &'static str {
        use TransUnitStatus::*;

        match (locale, self) {
            (NoticeLocale::En, Notice::CacheRemoved) => "Translation cache removed.",
            (NoticeLocale::En, Notice::TranslationAdded) => "Translation successfully added.",
            (NoticeLocale::En, Notice::TranslationsRefreshed) => {
                "Translations exported, cache cleared."
            }
            (NoticeLocale::En, Notice::UnitStatusChanged(Validated)) => "Translation validated!",
            (NoticeLocale::En, Notice::UnitStatusChanged(Waiting)) => "Translation put on hold!",
            (NoticeLocale::En, Notice::UnitStatusChanged(Invalid)) => "Translation revoked!",
            (NoticeLocale::En, Notice::DomainStatusChanged(Validated)) => {
                "Every translation of the domain has been validated."
            }
            (NoticeLocale::En, Notice::DomainStatusChanged(Waiting)) => {
                "Every translation of the domain has been put on hold."
            }
            (NoticeLocale::En, Notice::DomainStatusChanged(Invalid)) => {
                "Every translation of the domain has been revoked."
            }
            (NoticeLocale::Fr, Notice::CacheRemoved) => "Cache des traductions supprimé.",
            (NoticeLocale::Fr, Notice::TranslationAdded) => "Traduction ajoutée avec succès.",
            (NoticeLocale::Fr, Notice::TranslationsRefreshed) => "Trads à jour, bravo !",
            (NoticeLocale::Fr, Notice::UnitStatusChanged(Validated)) => "Traduction validée !",
            (NoticeLocale::Fr, Notice::UnitStatusChanged(Waiting)) => {
                "Traduction mise en attente !"
            }
            (NoticeLocale::Fr, Notice::UnitStatusChanged(Invalid)) => "Traduction révoquée !",
            (NoticeLocale::Fr, Notice::DomainStatusChanged(Validated)) => {
                "Toutes les traductions du domaine ont été validées."
            }
            (NoticeLocale::Fr, Notice::DomainStatusChanged(Waiting)) => {
                "Toutes les traductions du domaine ont été mises en attente."
            }
            (NoticeLocale::Fr, Notice::DomainStatusChanged(Invalid)) => {
                "Toutes les traductions du domaine ont été révoquées."
            }
        }
    }
}
